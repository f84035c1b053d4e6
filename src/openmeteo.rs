use chrono::{NaiveDate, NaiveDateTime};
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::weather::{DayForecast, ForecastSample, Location};

const BASE_URL: &str = "https://api.open-meteo.com/v1/forecast";
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Where today's hourly samples come from.
pub trait ForecastSource {
    fn fetch_today(&self, location: &Location, today: NaiveDate) -> Result<DayForecast>;
}

pub mod forecast {
    use super::*;

    #[derive(Deserialize, Debug, Default)]
    pub struct Forecast {
        #[serde(default)]
        pub current: Current,

        #[serde(default)]
        pub hourly: Hourly,
    }

    #[derive(Deserialize, Debug, Default)]
    pub struct Current {
        pub temperature_2m: Option<f64>,
    }

    #[derive(Deserialize, Debug, Default)]
    pub struct Hourly {
        #[serde(default)]
        pub time: Vec<String>,

        #[serde(default)]
        pub temperature_2m: Vec<Option<f64>>,

        #[serde(default)]
        pub precipitation_probability: Vec<Option<f64>>,

        #[serde(default)]
        pub precipitation: Vec<Option<f64>>,
    }

    impl Forecast {
        /// Keep only rows dated `today`. Null probability and rate read as zero.
        pub fn into_day(self, today: NaiveDate) -> DayForecast {
            let h = self.hourly;
            let rows = h
                .time
                .iter()
                .zip(h.temperature_2m.iter())
                .zip(h.precipitation_probability.iter())
                .zip(h.precipitation.iter());

            let mut samples = Vec::new();
            for (((time, temp), pop), mm) in rows {
                let time = match NaiveDateTime::parse_from_str(time, TIME_FORMAT) {
                    Ok(t) => t,
                    Err(e) => {
                        warn!("open-meteo: skipping row with bad time {time:?}: {e}");
                        continue;
                    }
                };
                if time.date() != today {
                    continue;
                }
                let pop = pop.unwrap_or(0.0).round().clamp(0.0, 100.0) as u8;
                samples.push(ForecastSample::new(time, pop, mm.unwrap_or(0.0), *temp));
            }

            DayForecast {
                current_temperature: self.current.temperature_2m,
                samples,
            }
        }
    }
}

pub struct OpenMeteo {
    client: Client,
    timezone: String,
}

impl OpenMeteo {
    pub fn new(timezone: &str) -> Result<Self> {
        let client = Client::builder().user_agent("rainwatch").build()?;
        Ok(Self {
            client,
            timezone: timezone.to_string(),
        })
    }

    fn get_web_json(&self, location: &Location) -> std::result::Result<Response, reqwest::Error> {
        let lat = location.latitude.to_string();
        let lon = location.longitude.to_string();
        self.client
            .get(BASE_URL)
            .query(&[
                ("latitude", lat.as_str()),
                ("longitude", lon.as_str()),
                ("timezone", self.timezone.as_str()),
                ("forecast_days", "1"),
                ("current", "temperature_2m"),
                ("hourly", "temperature_2m,precipitation_probability,precipitation"),
            ])
            .send()
    }
}

impl ForecastSource for OpenMeteo {
    fn fetch_today(&self, location: &Location, today: NaiveDate) -> Result<DayForecast> {
        let raw: forecast::Forecast = self.get_web_json(location)?.error_for_status()?.json()?;
        let day = raw.into_day(today);
        debug!(
            "open-meteo: {} sample(s) for {} on {}",
            day.samples.len(),
            location.key,
            today
        );
        Ok(day)
    }
}
