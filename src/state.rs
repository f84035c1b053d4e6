//! Per-location alert history, kept in one JSON file between runs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertRecord {
    /// Zero means "never alerted".
    pub last_alert_epoch_seconds: i64,
    pub last_event_key: String,
    /// Only used when the post-digest blackout is scoped per location.
    #[serde(skip_serializing_if = "is_zero")]
    pub last_digest_epoch_seconds: i64,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GateState {
    #[serde(deserialize_with = "lenient_records")]
    pub records: BTreeMap<String, AlertRecord>,
    pub last_daily_run_epoch_seconds: i64,
}

impl GateState {
    /// The record for `key`, or the "never alerted" default.
    pub fn record(&self, key: &str) -> AlertRecord {
        self.records.get(key).cloned().unwrap_or_default()
    }
}

/// A malformed entry becomes a default record instead of failing the whole file.
fn lenient_records<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, AlertRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, value)| {
            let record = serde_json::from_value::<AlertRecord>(value).unwrap_or_else(|e| {
                warn!("state: resetting malformed record for {key:?}: {e}");
                AlertRecord::default()
            });
            (key, record)
        })
        .collect())
}

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> GateState {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("state: no file at {:?}, starting fresh", self.path);
                return GateState::default();
            }
            Err(e) => {
                warn!("state: failed to read {:?}: {}", self.path, e);
                return GateState::default();
            }
        };

        match serde_json::from_str::<GateState>(&text) {
            Ok(state) => state,
            Err(e) => {
                warn!("state: failed to parse {:?}, resetting: {}", self.path, e);
                GateState::default()
            }
        }
    }

    /// Write the whole state through a temporary sibling and rename it into place,
    /// so a concurrent `load` sees either the old or the new file.
    pub fn save(&self, state: &GateState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, serde_json::to_string_pretty(state)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!("state: saved {} record(s) to {:?}", state.records.len(), self.path);
        Ok(())
    }
}
