use std::error::Error;

use chrono::{DateTime, FixedOffset, Utc};
use clap::Parser;
use tracing::{error, warn};

mod app;
mod cli;
mod config;
mod detect;
mod error;
mod gate;
mod gps;
mod logging;
mod message;
mod openmeteo;
mod state;
mod telegram;
mod units;
mod weather;

use crate::app::App;
use crate::cli::Args;
use crate::config::Config;
use crate::openmeteo::OpenMeteo;
use crate::state::StateStore;
use crate::telegram::{Console, MessageSink, Telegram};

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    logging::init_tracing(args.verbose);

    let config = Config::load(args.config.as_deref())?;
    let offset = config.offset()?;
    let clock = move || -> DateTime<FixedOffset> { Utc::now().with_timezone(&offset) };

    let mut locations = config.locations.clone();
    if !config.devices.is_empty() {
        match gps::Worker::from_env() {
            Ok(worker) => locations.extend(worker.locate_all(&config.devices)),
            Err(e) => warn!("skipping GPS devices: {e}"),
        }
    }

    let sink: Box<dyn MessageSink> = if args.dry_run {
        Box::new(Console)
    } else {
        Box::new(Telegram::from_env()?)
    };
    let source = OpenMeteo::new(&config.timezone)?;
    let store = StateStore::new(args.state.unwrap_or_else(|| config.state_file.clone()));

    let app = App::new(&config, &source, sink.as_ref(), store);
    if let Err(err) = app.run(args.mode, &locations, &clock) {
        error!("run failed: {err}");
        return Err(err.into());
    }

    Ok(())
}
