use std::path::PathBuf;

use clap::builder::{styling::AnsiColor, Styles};
use clap::{ArgAction, Parser};

use crate::weather::RunMode;

const ABOUT: &str = "Rain alerts for fixed locations";

const LONG_ABOUT: &str = "
Checks today's hourly forecast for each configured location and pushes a Telegram message when it
is raining now or rain is likely within the next hour.

Alerts respect quiet hours, a per-location cooldown and a blackout after the daily digest. The
alert history is kept in a small JSON state file between runs, so `rainwatch` is meant to be
started by an external scheduler (cron, CI) rather than left running.

The bot token and chat id are read from TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID.
";

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default())
    .usage(AnsiColor::Green.on_default())
    .literal(AnsiColor::Green.on_default())
    .placeholder(AnsiColor::Green.on_default());

#[derive(Parser, Debug)]
#[command(version, styles=STYLES, about=ABOUT, long_about = LONG_ABOUT)]
pub struct Args {
    #[arg(long, value_enum, env = "MODE", default_value_t = RunMode::Digest, ignore_case = true)]
    pub mode: RunMode,

    #[arg(long, help = "JSON configuration file (defaults are used when omitted)")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Override the state file location from the configuration")]
    pub state: Option<PathBuf>,

    #[arg(long, help = "Print messages instead of sending them")]
    pub dry_run: bool,

    #[arg(short, long, action = ArgAction::Count, help = "More logging (-v, -vv, -vvv)")]
    pub verbose: u8,
}
