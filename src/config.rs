//! Run configuration. Secrets come from the environment, see `telegram` and `gps`.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::detect::Comparison;
use crate::error::{Error, Result};
use crate::gate::{BlackoutScope, ClockTime, QuietWindow};
use crate::weather::Location;

const HOUR: i64 = 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// IANA name passed to the forecast provider so hourly rows are in local time.
    pub timezone: String,
    /// Offset used for the local clock. Must agree with `timezone`.
    pub utc_offset_seconds: i32,
    pub locations: Vec<Location>,
    /// GPS device ids resolved through the worker at run start.
    pub devices: Vec<String>,
    pub state_file: PathBuf,
    pub gate: GateConfig,
    pub thresholds: Thresholds,
    pub digest: DigestConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: "Asia/Ho_Chi_Minh".to_string(),
            utc_offset_seconds: 7 * 3600,
            locations: vec![
                Location::named("Di An (Binh Duong)", 10.9087, 106.7690),
                Location::named("Duc Tho (Ha Tinh)", 18.5401307, 105.5855438),
            ],
            devices: Vec::new(),
            state_file: PathBuf::from(".state").join("last_alert.json"),
            gate: GateConfig::default(),
            thresholds: Thresholds::default(),
            digest: DigestConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Minimum gap between two allowed alerts for one location.
    pub cooldown_seconds: i64,
    /// Watch runs stay silent this long after a digest.
    pub blackout_seconds: i64,
    /// Global by default: one digest silences every location.
    pub blackout_scope: BlackoutScope,
    pub quiet: QuietWindow,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: 3 * HOUR,
            blackout_seconds: 3 * HOUR,
            blackout_scope: BlackoutScope::Global,
            quiet: QuietWindow {
                start: ClockTime::new(21, 0),
                end: ClockTime::new(7, 30),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub pop_notice: u8,
    pub pop_high: u8,
    /// Probability that makes the next hour "likely".
    pub pop_urgent: u8,
    /// Inclusive (`>=`) by default.
    pub pop_comparison: Comparison,
    /// mm/h counted as rain at all.
    pub rate_notice: f64,
    /// mm/h that makes the next hour "likely" regardless of probability.
    pub rate_moderate: f64,
    pub rate_heavy: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            pop_notice: 30,
            pop_high: 50,
            pop_urgent: 70,
            pop_comparison: Comparison::Inclusive,
            rate_notice: 0.2,
            rate_moderate: 1.0,
            rate_heavy: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    /// First and last hour (inclusive) summarised by the digest.
    pub start_hour: u32,
    pub end_hour: u32,
    pub night_start_hour: u32,
    pub night_end_hour: u32,
    pub cold_notice: f64,
    pub cold_alert: f64,
    /// Pause before the post-digest recheck. Zero disables it.
    pub recheck_delay_seconds: u64,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            start_hour: 9,
            end_hour: 23,
            night_start_hour: 18,
            night_end_hour: 6,
            cold_notice: 18.0,
            cold_alert: 15.0,
            recheck_delay_seconds: 10,
        }
    }
}

impl DigestConfig {
    pub fn is_night(&self, hour: u32) -> bool {
        let (start, end) = (self.night_start_hour, self.night_end_hour);
        if start <= end {
            start <= hour && hour < end
        } else {
            hour >= start || hour < end
        }
    }

    pub fn in_window(&self, hour: u32) -> bool {
        (self.start_hour..=self.end_hour).contains(&hour)
    }
}

impl Config {
    /// Load from `path`, or use the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                debug!("reading config from {:?}", path);
                let text = fs::read_to_string(path)?;
                serde_json::from_str::<Config>(&text)?
            }
            None => Config::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let quiet = &self.gate.quiet;
        for (name, time) in [("quiet.start", quiet.start), ("quiet.end", quiet.end)] {
            if time.hour > 23 || time.minute > 59 {
                return Err(Error::Config(format!("{name} is not a valid clock time")));
            }
        }
        let d = &self.digest;
        for (name, hour) in [
            ("digest.start_hour", d.start_hour),
            ("digest.end_hour", d.end_hour),
            ("digest.night_start_hour", d.night_start_hour),
            ("digest.night_end_hour", d.night_end_hour),
        ] {
            if hour > 23 {
                return Err(Error::Config(format!("{name} must be 0-23, got {hour}")));
            }
        }
        if d.start_hour > d.end_hour {
            return Err(Error::Config("digest window starts after it ends".to_string()));
        }
        if self.gate.cooldown_seconds < 0 || self.gate.blackout_seconds < 0 {
            return Err(Error::Config("durations must not be negative".to_string()));
        }
        let t = &self.thresholds;
        if t.pop_notice > 100 || t.pop_high > 100 || t.pop_urgent > 100 {
            return Err(Error::Config("probabilities must be 0-100".to_string()));
        }

        let mut keys = HashSet::new();
        let all_keys = self
            .locations
            .iter()
            .map(|l| l.key.as_str())
            .chain(self.devices.iter().map(String::as_str));
        for key in all_keys {
            if !keys.insert(key) {
                return Err(Error::Config(format!("duplicate location key {key:?}")));
            }
        }
        self.offset().map(|_| ())
    }

    pub fn offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_seconds).ok_or_else(|| {
            Error::Config(format!(
                "utc_offset_seconds {} is out of range",
                self.utc_offset_seconds
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.gate.cooldown_seconds, 10800);
        assert_eq!(config.thresholds.pop_urgent, 70);
        assert_eq!(config.offset().unwrap().local_minus_utc(), 25200);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config: Config = serde_json::from_str(
            r#"{
                "gate": { "cooldown_seconds": 600, "blackout_scope": "per_location" },
                "thresholds": { "pop_comparison": "exclusive" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.gate.cooldown_seconds, 600);
        assert_eq!(config.gate.blackout_seconds, 10800);
        assert_eq!(config.gate.blackout_scope, BlackoutScope::PerLocation);
        assert_eq!(config.thresholds.pop_comparison, Comparison::Exclusive);
        assert_eq!(config.thresholds.pop_urgent, 70);
        assert_eq!(config.locations.len(), 2);
    }

    #[test]
    fn duplicate_keys_rejected() {
        let mut config = Config::default();
        config.devices.push(config.locations[0].key.clone());
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn bad_windows_rejected() {
        let mut config = Config::default();
        config.digest.start_hour = 20;
        config.digest.end_hour = 8;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.gate.quiet.end = ClockTime::new(7, 75);
        assert!(config.validate().is_err());
    }

    #[test]
    fn night_hours_wrap() {
        let digest = DigestConfig::default();
        assert!(digest.is_night(18));
        assert!(digest.is_night(3));
        assert!(!digest.is_night(6));
        assert!(!digest.is_night(17));
        assert!(digest.in_window(9) && digest.in_window(23));
        assert!(!digest.in_window(8));
    }

    #[test]
    fn night_hours_same_day() {
        let digest = DigestConfig {
            night_start_hour: 1,
            night_end_hour: 5,
            ..Default::default()
        };
        assert!(digest.is_night(1) && digest.is_night(4));
        assert!(!digest.is_night(5));
        assert!(!digest.is_night(12));
        assert!(!digest.is_night(0));
    }
}
