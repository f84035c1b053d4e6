//! Decides whether a detected condition may become a message.

use std::fmt;

use chrono::{DateTime, FixedOffset, Timelike};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::GateConfig;
use crate::state::GateState;
use crate::weather::{AlertKind, Condition, RunMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockTime {
    pub hour: u32,
    pub minute: u32,
}

impl ClockTime {
    pub const fn new(hour: u32, minute: u32) -> Self {
        Self { hour, minute }
    }

    fn minute_of_day(&self) -> u32 {
        self.hour * 60 + self.minute
    }
}

/// Half-open wall-clock interval `[start, end)`, which may wrap past midnight.
/// Equal bounds mean there is no quiet window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietWindow {
    pub start: ClockTime,
    pub end: ClockTime,
}

impl QuietWindow {
    pub fn contains(&self, hour: u32, minute: u32) -> bool {
        let t = hour * 60 + minute;
        let (start, end) = (self.start.minute_of_day(), self.end.minute_of_day());
        if start <= end {
            start <= t && t < end
        } else {
            t >= start || t < end
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlackoutScope {
    /// One digest silences watch alerts for every location.
    Global,
    /// Each location is silenced by the digest that covered it.
    PerLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    Quiet,
    PostDigestBlackout,
    NoCondition,
    DuplicateEvent,
    Cooldown,
}

impl SuppressReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuppressReason::Quiet => "quiet",
            SuppressReason::PostDigestBlackout => "post-digest-blackout",
            SuppressReason::NoCondition => "no-condition",
            SuppressReason::DuplicateEvent => "duplicate-event",
            SuppressReason::Cooldown => "cooldown",
        }
    }
}

impl fmt::Display for SuppressReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow { kind: AlertKind, event_key: String },
    Suppress(SuppressReason),
}

#[cfg(test)]
impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow { .. })
    }
}

/// Fingerprint of one forecasted hour's condition at one location.
pub fn event_key(
    now: &DateTime<FixedOffset>,
    location_key: &str,
    kind: AlertKind,
    hour: u32,
) -> String {
    format!(
        "{}|{}|{}|{:02}",
        now.date_naive().format("%Y-%m-%d"),
        location_key,
        kind,
        hour
    )
}

pub struct AlertGate {
    config: GateConfig,
}

impl AlertGate {
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    pub fn is_quiet(&self, now: &DateTime<FixedOffset>) -> bool {
        self.config.quiet.contains(now.hour(), now.minute())
    }

    /// True when a watch run at `now` is inside the blackout that follows a digest
    /// stamped at `stamp`.
    fn blacked_out(&self, stamp: i64, now: &DateTime<FixedOffset>) -> bool {
        stamp > 0 && now.timestamp() - stamp < self.config.blackout_seconds
    }

    /// Process-wide blackout check, usable before any forecast is fetched.
    pub fn in_global_blackout(&self, state: &GateState, now: &DateTime<FixedOffset>) -> bool {
        self.config.blackout_scope == BlackoutScope::Global
            && self.blacked_out(state.last_daily_run_epoch_seconds, now)
    }

    pub fn decide(
        &self,
        now: &DateTime<FixedOffset>,
        location_key: &str,
        condition: &Condition,
        mode: RunMode,
        state: &GateState,
    ) -> Decision {
        let decision = self.evaluate(now, location_key, condition, mode, state);
        match &decision {
            Decision::Allow { event_key, .. } => {
                debug!("gate: {location_key} allowed as {event_key}")
            }
            Decision::Suppress(reason) => debug!("gate: {location_key} suppressed ({reason})"),
        }
        decision
    }

    fn evaluate(
        &self,
        now: &DateTime<FixedOffset>,
        location_key: &str,
        condition: &Condition,
        mode: RunMode,
        state: &GateState,
    ) -> Decision {
        if self.is_quiet(now) {
            return Decision::Suppress(SuppressReason::Quiet);
        }

        let record = state.record(location_key);

        if mode == RunMode::Watch {
            let stamp = match self.config.blackout_scope {
                BlackoutScope::Global => state.last_daily_run_epoch_seconds,
                BlackoutScope::PerLocation => record.last_digest_epoch_seconds,
            };
            if self.blacked_out(stamp, now) {
                return Decision::Suppress(SuppressReason::PostDigestBlackout);
            }
        }

        let Some(kind) = condition.kind() else {
            return Decision::Suppress(SuppressReason::NoCondition);
        };

        let key = event_key(now, location_key, kind, condition.hour_for(kind));
        if key == record.last_event_key {
            return Decision::Suppress(SuppressReason::DuplicateEvent);
        }

        if record.last_alert_epoch_seconds > 0
            && now.timestamp() - record.last_alert_epoch_seconds < self.config.cooldown_seconds
        {
            return Decision::Suppress(SuppressReason::Cooldown);
        }

        Decision::Allow { kind, event_key: key }
    }

    /// Record an allowed alert. Suppressions leave the state untouched.
    pub fn commit(
        &self,
        state: &mut GateState,
        location_key: &str,
        now: &DateTime<FixedOffset>,
        decision: &Decision,
    ) {
        let Decision::Allow { event_key, .. } = decision else {
            return;
        };
        let record = state.records.entry(location_key.to_string()).or_default();
        record.last_alert_epoch_seconds = record.last_alert_epoch_seconds.max(now.timestamp());
        record.last_event_key = event_key.clone();
        info!("gate: committed {event_key}");
    }

    /// Start the blackout timer after a digest run, whether or not it alerted.
    pub fn stamp_digest<'a, I>(&self, state: &mut GateState, now: &DateTime<FixedOffset>, keys: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let ts = now.timestamp();
        state.last_daily_run_epoch_seconds = ts;
        if self.config.blackout_scope == BlackoutScope::PerLocation {
            for key in keys {
                state.records.entry(key.to_string()).or_default().last_digest_epoch_seconds = ts;
            }
        }
    }
}
