//! Rain condition detection from today's hourly samples.

use chrono::{DateTime, FixedOffset, Timelike};
use serde::{Deserialize, Serialize};

use crate::config::Thresholds;
use crate::weather::{Condition, ForecastSample};

/// How a probability is compared against its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    /// `value >= threshold`
    Inclusive,
    /// `value > threshold`
    Exclusive,
}

impl Comparison {
    pub fn passes(&self, value: u8, threshold: u8) -> bool {
        match self {
            Comparison::Inclusive => value >= threshold,
            Comparison::Exclusive => value > threshold,
        }
    }
}

/// Pick the sample for `hour`. When several share the hour, the one whose
/// timestamp is closest to `now` wins; ties go to the earliest in the input.
pub fn sample_for_hour<'a>(
    samples: &'a [ForecastSample],
    hour: u32,
    now: &DateTime<FixedOffset>,
) -> Option<&'a ForecastSample> {
    let now = now.naive_local();
    samples
        .iter()
        .filter(|s| s.hour == hour)
        .min_by_key(|s| (s.time - now).num_seconds().abs())
}

pub fn detect(
    samples: &[ForecastSample],
    now: &DateTime<FixedOffset>,
    thresholds: &Thresholds,
) -> Condition {
    let now_hour = now.hour();
    let mut cond = Condition {
        now_hour,
        next_hour: (now_hour + 1) % 24,
        ..Default::default()
    };

    if let Some(row) = sample_for_hour(samples, now_hour, now) {
        if row.precipitation_rate >= thresholds.rate_notice {
            cond.raining_now = true;
            cond.now_rate = row.precipitation_rate;
        }
    }

    if let Some(row) = sample_for_hour(samples, cond.next_hour, now) {
        let probable = thresholds
            .pop_comparison
            .passes(row.precipitation_probability, thresholds.pop_urgent);
        if probable || row.precipitation_rate >= thresholds.rate_moderate {
            cond.likely_next_hour = true;
            cond.next_pop = row.precipitation_probability;
            cond.next_rate = row.precipitation_rate;
        }
    }

    cond
}
