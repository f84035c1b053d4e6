use std::thread;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::detect::detect;
use crate::error::Result;
use crate::gate::{AlertGate, Decision};
use crate::message;
use crate::openmeteo::ForecastSource;
use crate::state::{GateState, StateStore};
use crate::telegram::MessageSink;
use crate::weather::{DayForecast, Location, RunMode};

/// What one evaluation pass over all locations produced.
#[derive(Debug, Default, PartialEq)]
pub struct Burst {
    /// Event keys committed during the pass.
    pub allowed: Vec<String>,
    pub messages_sent: usize,
}

pub struct App<'a> {
    config: &'a Config,
    gate: AlertGate,
    source: &'a dyn ForecastSource,
    sink: &'a dyn MessageSink,
    store: StateStore,
}

impl<'a> App<'a> {
    pub fn new(
        config: &'a Config,
        source: &'a dyn ForecastSource,
        sink: &'a dyn MessageSink,
        store: StateStore,
    ) -> Self {
        Self {
            config,
            gate: AlertGate::new(config.gate.clone()),
            source,
            sink,
            store,
        }
    }

    /// One scheduled run. `clock` is read at start and again after the recheck pause.
    pub fn run(
        &self,
        mode: RunMode,
        locations: &[Location],
        clock: &dyn Fn() -> DateTime<FixedOffset>,
    ) -> Result<()> {
        let now = clock();
        info!("{mode:?} run at {now} for {} location(s)", locations.len());
        debug!("state file {:?}", self.store.path());

        match mode {
            RunMode::Watch => {
                if self.gate.is_quiet(&now) {
                    info!("quiet hours, nothing to do");
                    return Ok(());
                }
                let mut state = self.store.load();
                if self.gate.in_global_blackout(&state, &now) {
                    info!("inside post-digest blackout, nothing to do");
                    return Ok(());
                }
                let burst = self.watch(&mut state, locations, &now);
                if !burst.allowed.is_empty() {
                    self.store.save(&state)?;
                }
            }
            RunMode::Digest => {
                let mut state = self.store.load();
                self.digest(&mut state, locations, &now);
                self.store.save(&state)?;

                let delay = self.config.digest.recheck_delay_seconds;
                if delay > 0 {
                    debug!("sleeping {delay}s before recheck");
                    thread::sleep(Duration::from_secs(delay));
                    let now = clock();
                    let burst = self.recheck(&mut state, locations, &now);
                    if !burst.allowed.is_empty() {
                        self.store.save(&state)?;
                    }
                }
            }
        }
        Ok(())
    }

    pub fn watch(
        &self,
        state: &mut GateState,
        locations: &[Location],
        now: &DateTime<FixedOffset>,
    ) -> Burst {
        self.alert_pass(state, locations, now, RunMode::Watch)
    }

    /// Second look right after a digest. Runs in digest mode so the blackout the
    /// digest just started does not hide a change.
    pub fn recheck(
        &self,
        state: &mut GateState,
        locations: &[Location],
        now: &DateTime<FixedOffset>,
    ) -> Burst {
        self.alert_pass(state, locations, now, RunMode::Digest)
    }

    pub fn digest(
        &self,
        state: &mut GateState,
        locations: &[Location],
        now: &DateTime<FixedOffset>,
    ) -> Burst {
        let cfg = self.config;
        let mut burst = Burst::default();
        let mut blocks = Vec::with_capacity(locations.len());

        for location in locations {
            let Some(forecast) = self.fetch(location, now) else {
                blocks.push(message::no_data_block(location));
                continue;
            };
            let cond = detect(&forecast.samples, now, &cfg.thresholds);
            blocks.push(message::digest_block(
                location,
                &forecast,
                &cond,
                &cfg.digest,
                &cfg.thresholds,
            ));

            // The digest reports the condition itself, so an allow only needs recording.
            let decision = self.gate.decide(now, &location.key, &cond, RunMode::Digest, state);
            if let Decision::Allow { event_key, .. } = &decision {
                self.gate.commit(state, &location.key, now, &decision);
                burst.allowed.push(event_key.clone());
            }
        }

        let header = message::digest_header(now, &cfg.digest);
        if self.send(&message::digest(&header, &blocks)) {
            burst.messages_sent += 1;
        }
        self.gate.stamp_digest(state, now, locations.iter().map(|l| l.key.as_str()));
        burst
    }

    fn alert_pass(
        &self,
        state: &mut GateState,
        locations: &[Location],
        now: &DateTime<FixedOffset>,
        mode: RunMode,
    ) -> Burst {
        let mut burst = Burst::default();
        let mut alerts = Vec::new();

        for location in locations {
            let Some(forecast) = self.fetch(location, now) else {
                continue;
            };
            let cond = detect(&forecast.samples, now, &self.config.thresholds);
            let decision = self.gate.decide(now, &location.key, &cond, mode, state);
            if let Decision::Allow { kind, event_key } = &decision {
                alerts.push(message::alert(location, now, *kind, &cond, &self.config.digest));
                burst.allowed.push(event_key.clone());
                self.gate.commit(state, &location.key, now, &decision);
            }
        }

        if !alerts.is_empty() && self.send(&message::join_alerts(&alerts)) {
            burst.messages_sent += 1;
        }
        burst
    }

    fn fetch(&self, location: &Location, now: &DateTime<FixedOffset>) -> Option<DayForecast> {
        match self.source.fetch_today(location, now.date_naive()) {
            Ok(forecast) => Some(forecast),
            Err(e) => {
                warn!("forecast for {} unavailable: {}", location.key, e);
                None
            }
        }
    }

    /// Delivery failures are logged only; committed state stays committed.
    fn send(&self, text: &str) -> bool {
        match self.sink.deliver(text) {
            Ok(()) => true,
            Err(e) => {
                error!("failed to deliver message: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::weather::ForecastSample;
    use chrono::{NaiveDate, TimeZone};
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeSource {
        days: HashMap<String, DayForecast>,
        calls: Cell<usize>,
    }

    impl FakeSource {
        fn with(mut self, key: &str, samples: Vec<ForecastSample>) -> Self {
            self.days.insert(
                key.to_string(),
                DayForecast {
                    current_temperature: Some(28.0),
                    samples,
                },
            );
            self
        }
    }

    impl ForecastSource for FakeSource {
        fn fetch_today(&self, location: &Location, _today: NaiveDate) -> Result<DayForecast> {
            self.calls.set(self.calls.get() + 1);
            self.days
                .get(&location.key)
                .cloned()
                .ok_or_else(|| Error::Config(format!("no data for {}", location.key)))
        }
    }

    #[derive(Default)]
    struct Outbox {
        sent: RefCell<Vec<String>>,
        broken: bool,
    }

    impl MessageSink for Outbox {
        fn deliver(&self, text: &str) -> Result<()> {
            if self.broken {
                return Err(Error::MissingEnv("TELEGRAM_BOT_TOKEN"));
            }
            self.sent.borrow_mut().push(text.to_string());
            Ok(())
        }
    }

    fn at(hour: u32, minute: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 1, hour, minute, 0)
            .unwrap()
    }

    fn sample(hour: u32, pop: u8, rate: f64) -> ForecastSample {
        let time = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap();
        ForecastSample::new(time, pop, rate, Some(26.0))
    }

    fn locations() -> Vec<Location> {
        vec![
            Location::named("home", 10.9, 106.7),
            Location::named("farm", 18.5, 105.5),
        ]
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.digest.recheck_delay_seconds = 0;
        config
    }

    fn store() -> (tempfile::TempDir, StateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join(".state").join("last_alert.json"));
        (dir, store)
    }

    #[test]
    fn watch_alerts_once_per_event() {
        let config = config();
        let source = FakeSource::default()
            .with("home", vec![sample(10, 0, 0.6)])
            .with("farm", vec![sample(10, 0, 0.0), sample(11, 10, 0.0)]);
        let outbox = Outbox::default();
        let (_dir, store) = store();
        let app = App::new(&config, &source, &outbox, store.clone());

        app.run(RunMode::Watch, &locations(), &|| at(10, 0)).unwrap();
        let state = store.load();
        assert_eq!(
            state.record("home").last_event_key,
            "2024-06-01|home|RAINING|10"
        );
        assert!(!state.records.contains_key("farm"));
        assert_eq!(outbox.sent.borrow().len(), 1);
        assert!(outbox.sent.borrow()[0].contains("RAINING NOW"));

        app.run(RunMode::Watch, &locations(), &|| at(10, 20)).unwrap();
        assert_eq!(outbox.sent.borrow().len(), 1);
    }

    #[test]
    fn watch_in_quiet_hours_skips_fetch() {
        let config = config();
        let source = FakeSource::default().with("home", vec![sample(22, 0, 9.0)]);
        let outbox = Outbox::default();
        let (_dir, store) = store();
        let app = App::new(&config, &source, &outbox, store.clone());

        app.run(RunMode::Watch, &locations(), &|| at(22, 0)).unwrap();
        assert_eq!(source.calls.get(), 0);
        assert!(outbox.sent.borrow().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn digest_stamps_and_blacks_out_watch() {
        let config = config();
        let source = FakeSource::default()
            .with("home", vec![sample(8, 0, 0.0), sample(9, 20, 0.0), sample(10, 90, 0.0)])
            .with("farm", vec![sample(10, 0, 0.0)]);
        let outbox = Outbox::default();
        let (_dir, store) = store();
        let app = App::new(&config, &source, &outbox, store.clone());

        app.run(RunMode::Digest, &locations(), &|| at(8, 0)).unwrap();
        let state = store.load();
        assert_eq!(state.last_daily_run_epoch_seconds, at(8, 0).timestamp());
        assert!(state.records.is_empty());
        assert_eq!(outbox.sent.borrow().len(), 1);
        assert!(outbox.sent.borrow()[0].contains("WEATHER FORECAST"));

        // 09:30 is inside the three hour blackout.
        app.run(RunMode::Watch, &locations(), &|| at(9, 30)).unwrap();
        assert_eq!(outbox.sent.borrow().len(), 1);

        app.run(RunMode::Watch, &locations(), &|| at(11, 0)).unwrap();
        assert_eq!(outbox.sent.borrow().len(), 1, "no condition at 11:00");
    }

    #[test]
    fn digest_records_allowed_conditions() {
        let config = config();
        let source =
            FakeSource::default().with("home", vec![sample(9, 0, 0.0), sample(10, 85, 0.0)]);
        let outbox = Outbox::default();
        let (_dir, store) = store();
        let app = App::new(&config, &source, &outbox, store);

        let mut state = GateState::default();
        let burst = app.digest(&mut state, &locations(), &at(9, 10));
        assert_eq!(burst.allowed, vec!["2024-06-01|home|NEXT1H|10".to_string()]);
        assert_eq!(burst.messages_sent, 1);

        let sent = outbox.sent.borrow();
        assert!(sent[0].contains("HOME"));
        assert!(sent[0].contains("No forecast data"), "farm fetch failed");
    }

    #[test]
    fn recheck_reports_only_new_events() {
        let config = config();
        let source = FakeSource::default()
            .with("home", vec![sample(9, 0, 0.0), sample(10, 85, 0.0)])
            .with("farm", vec![sample(9, 0, 2.0)]);
        let outbox = Outbox::default();
        let (_dir, store) = store();
        let app = App::new(&config, &source, &outbox, store);

        let mut state = GateState::default();
        let first = app.digest(&mut state, &locations(), &at(9, 10));
        assert_eq!(first.allowed.len(), 2);

        let again = app.recheck(&mut state, &locations(), &at(9, 10));
        assert!(again.allowed.is_empty());
        assert_eq!(again.messages_sent, 0);
        assert_eq!(outbox.sent.borrow().len(), 1);
    }

    #[test]
    fn recheck_after_pause_saves_new_event() {
        let mut config = config();
        config.digest.recheck_delay_seconds = 1;
        let source = FakeSource::default()
            .with("home", vec![sample(9, 0, 0.0), sample(10, 0, 0.0)])
            .with("farm", vec![sample(9, 0, 0.0), sample(10, 0, 0.0), sample(11, 0, 2.0)]);
        let outbox = Outbox::default();
        let (_dir, store) = store();
        let app = App::new(&config, &source, &outbox, store.clone());

        let ticks = Cell::new(0);
        let clock = || {
            ticks.set(ticks.get() + 1);
            if ticks.get() == 1 {
                at(9, 10)
            } else {
                at(11, 10)
            }
        };
        app.run(RunMode::Digest, &locations(), &clock).unwrap();

        assert_eq!(ticks.get(), 2);
        let state = store.load();
        assert_eq!(state.last_daily_run_epoch_seconds, at(9, 10).timestamp());
        let farm = state.record("farm");
        assert_eq!(farm.last_event_key, "2024-06-01|farm|RAINING|11");
        assert_eq!(farm.last_alert_epoch_seconds, at(11, 10).timestamp());
        assert!(!state.records.contains_key("home"));

        let sent = outbox.sent.borrow();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].contains("WEATHER FORECAST"));
        assert!(sent[1].contains("RAINING NOW"));
    }

    #[test]
    fn quiet_recheck_leaves_file_alone() {
        let mut config = config();
        let samples = vec![sample(9, 0, 2.0), sample(10, 0, 0.0)];
        let expected = {
            let source = FakeSource::default().with("farm", samples.clone());
            let (_dir, store) = store();
            App::new(&config, &source, &Outbox::default(), store.clone())
                .run(RunMode::Digest, &locations(), &|| at(9, 10))
                .unwrap();
            std::fs::read_to_string(store.path()).unwrap()
        };

        config.digest.recheck_delay_seconds = 1;
        let source = FakeSource::default().with("farm", samples);
        let outbox = Outbox::default();
        let (_dir, store) = store();
        let app = App::new(&config, &source, &outbox, store.clone());

        // Same hour again: the digest already recorded this event.
        let ticks = Cell::new(0);
        let clock = || {
            ticks.set(ticks.get() + 1);
            if ticks.get() == 1 {
                at(9, 10)
            } else {
                at(9, 40)
            }
        };
        app.run(RunMode::Digest, &locations(), &clock).unwrap();

        assert_eq!(ticks.get(), 2);
        assert_eq!(source.calls.get(), 4);
        assert_eq!(outbox.sent.borrow().len(), 1);
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), expected);
        assert_eq!(
            store.load().record("farm").last_event_key,
            "2024-06-01|farm|RAINING|09"
        );
    }

    #[test]
    fn failed_delivery_still_commits() {
        let config = config();
        let source = FakeSource::default().with("home", vec![sample(14, 0, 3.0)]);
        let outbox = Outbox {
            broken: true,
            ..Default::default()
        };
        let (_dir, store) = store();
        let app = App::new(&config, &source, &outbox, store.clone());

        app.run(RunMode::Watch, &locations(), &|| at(14, 0)).unwrap();
        assert_eq!(
            store.load().record("home").last_alert_epoch_seconds,
            at(14, 0).timestamp()
        );
    }

    #[test]
    fn empty_forecast_is_no_condition() {
        let config = config();
        let source = FakeSource::default().with("home", Vec::new());
        let outbox = Outbox::default();
        let (_dir, store) = store();
        let app = App::new(&config, &source, &outbox, store);

        let mut state = GateState::default();
        let burst = app.watch(&mut state, &locations(), &at(12, 0));
        assert_eq!(burst, Burst::default());
        assert!(state.records.is_empty());
    }
}
