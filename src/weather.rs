use std::fmt;

use chrono::{NaiveDateTime, Timelike};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// One hourly row of today's forecast for a location.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSample {
    pub time: NaiveDateTime,
    pub hour: u32,
    /// Percent, 0-100.
    pub precipitation_probability: u8,
    /// mm/h.
    pub precipitation_rate: f64,
    pub temperature: Option<f64>,
}

impl ForecastSample {
    pub fn new(
        time: NaiveDateTime,
        precipitation_probability: u8,
        precipitation_rate: f64,
        temperature: Option<f64>,
    ) -> Self {
        Self {
            time,
            hour: time.hour(),
            precipitation_probability: precipitation_probability.min(100),
            precipitation_rate: precipitation_rate.max(0.0),
            temperature,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayForecast {
    pub current_temperature: Option<f64>,
    pub samples: Vec<ForecastSample>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Partition key for cooldown and dedup state. Must be unique per run.
    pub key: String,
    pub display_name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Fix accuracy in metres, only for GPS devices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_m: Option<f64>,
}

impl Location {
    pub fn named(name: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            key: name.to_string(),
            display_name: name.to_string(),
            latitude,
            longitude,
            accuracy_m: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Raining,
    NextHour,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Raining => "RAINING",
            AlertKind::NextHour => "NEXT1H",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Full-day summary, then a gate pass and an optional recheck.
    #[value(alias = "daily")]
    Digest,
    /// Gate pass only.
    Watch,
}

/// Rain evidence derived for one clock time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Condition {
    pub raining_now: bool,
    pub now_rate: f64,
    pub now_hour: u32,
    pub likely_next_hour: bool,
    pub next_hour: u32,
    pub next_pop: u8,
    pub next_rate: f64,
}

impl Condition {
    /// The alert kind this condition selects. An in-progress event wins over a forecast.
    pub fn kind(&self) -> Option<AlertKind> {
        if self.raining_now {
            Some(AlertKind::Raining)
        } else if self.likely_next_hour {
            Some(AlertKind::NextHour)
        } else {
            None
        }
    }

    /// Hour the selected kind refers to.
    pub fn hour_for(&self, kind: AlertKind) -> u32 {
        match kind {
            AlertKind::Raining => self.now_hour,
            AlertKind::NextHour => self.next_hour,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raining_now_takes_priority() {
        let cond = Condition {
            raining_now: true,
            likely_next_hour: true,
            now_hour: 10,
            next_hour: 11,
            ..Default::default()
        };
        assert_eq!(cond.kind(), Some(AlertKind::Raining));
        assert_eq!(cond.hour_for(AlertKind::Raining), 10);

        let cond = Condition {
            likely_next_hour: true,
            next_hour: 11,
            ..Default::default()
        };
        assert_eq!(cond.kind(), Some(AlertKind::NextHour));
        assert_eq!(Condition::default().kind(), None);
    }
}
