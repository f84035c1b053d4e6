use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::weather::Location;

#[derive(Deserialize, Debug)]
pub struct Fix {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Accuracy in metres.
    pub acc: Option<f64>,
    pub ts: Option<i64>,
}

impl Fix {
    pub fn into_location(self, device_id: &str) -> Result<Location> {
        match (self.lat, self.lon) {
            (Some(latitude), Some(longitude)) => Ok(Location {
                key: device_id.to_string(),
                display_name: format!("{device_id} ({latitude:.4}, {longitude:.4})"),
                latitude,
                longitude,
                accuracy_m: self.acc,
            }),
            _ => Err(Error::Gps(format!("no coordinates for device {device_id:?}"))),
        }
    }
}

pub struct Worker {
    client: Client,
    base_url: String,
}

impl Worker {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder().user_agent("rainwatch").build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Reads `WORKER_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("WORKER_BASE_URL")
            .ok()
            .filter(|u| !u.trim().is_empty())
            .ok_or(Error::MissingEnv("WORKER_BASE_URL"))?;
        Self::new(&url)
    }

    pub fn locate(&self, device_id: &str) -> Result<Location> {
        let fix: Fix = self
            .client
            .get(format!("{}/get", self.base_url))
            .query(&[("device_id", device_id)])
            .send()?
            .error_for_status()?
            .json()?;
        debug!(
            "gps: {device_id} at {:?},{:?} (acc {:?}, ts {:?})",
            fix.lat, fix.lon, fix.acc, fix.ts
        );
        fix.into_location(device_id)
    }

    /// Resolve every device, dropping the ones that fail.
    pub fn locate_all(&self, devices: &[String]) -> Vec<Location> {
        devices
            .iter()
            .filter_map(|id| match self.locate(id) {
                Ok(location) => Some(location),
                Err(e) => {
                    warn!("gps: skipping device {id}: {e}");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fix_becomes_location_keyed_by_device() {
        let fix: Fix =
            serde_json::from_str(r#"{"lat": 10.5, "lon": 106.25, "acc": 12.0, "ts": 1700000000}"#)
                .unwrap();
        let location = fix.into_location("phone1").unwrap();
        assert_eq!(location.key, "phone1");
        assert_eq!(location.latitude, 10.5);
        assert_eq!(location.longitude, 106.25);
        assert_eq!(location.accuracy_m, Some(12.0));
    }

    #[test]
    fn fix_without_accuracy() {
        let fix: Fix = serde_json::from_str(r#"{"lat": 10.5, "lon": 106.25}"#).unwrap();
        assert_eq!(fix.into_location("phone1").unwrap().accuracy_m, None);
    }

    #[test]
    fn fix_without_coordinates_is_an_error() {
        let fix: Fix = serde_json::from_str(r#"{"lat": 10.5}"#).unwrap();
        assert!(matches!(fix.into_location("phone1"), Err(Error::Gps(_))));
    }
}
