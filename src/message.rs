use chrono::{DateTime, FixedOffset};

use crate::config::{DigestConfig, Thresholds};
use crate::units::hours::{compress, format_ranges};
use crate::units::rain::{classify, RainIntensity};
use crate::weather::{AlertKind, Condition, DayForecast, ForecastSample, Location};

const DIVIDER: &str = "──────────────";
const BIG_DIVIDER: &str = "━━━━━━━━━━━━━━━━━━━━";
const MISSING: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DigestLevel {
    Dry,
    PossibleRain,
    RainLikely,
    ModerateRain,
    HeavyRain,
    VeryHeavyRain,
}

impl DigestLevel {
    pub fn label(&self) -> &'static str {
        match self {
            DigestLevel::Dry => "DRY",
            DigestLevel::PossibleRain => "POSSIBLE RAIN",
            DigestLevel::RainLikely => "RAIN LIKELY",
            DigestLevel::ModerateRain => "MODERATE RAIN",
            DigestLevel::HeavyRain => "HEAVY RAIN",
            DigestLevel::VeryHeavyRain => "VERY HEAVY RAIN",
        }
    }
}

/// Rain and temperature figures for the digest window of one location.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySummary {
    pub likely_hours: Vec<u32>,
    pub possible_hours: Vec<u32>,
    pub max_rate: f64,
    pub max_pop: u8,
    /// (temperature, hour)
    pub warmest: Option<(f64, u32)>,
    pub coldest: Option<(f64, u32)>,
    pub level: DigestLevel,
}

impl DaySummary {
    /// `None` when no sample falls inside the window.
    pub fn from_samples(
        samples: &[ForecastSample],
        digest: &DigestConfig,
        t: &Thresholds,
    ) -> Option<Self> {
        let window: Vec<&ForecastSample> =
            samples.iter().filter(|s| digest.in_window(s.hour)).collect();
        if window.is_empty() {
            return None;
        }

        let mut likely_hours = Vec::new();
        let mut possible_hours = Vec::new();
        for s in &window {
            let (rate, pop) = (s.precipitation_rate, s.precipitation_probability);
            if rate >= t.rate_moderate || pop >= t.pop_high {
                likely_hours.push(s.hour);
            } else if rate >= t.rate_notice || pop >= t.pop_notice {
                possible_hours.push(s.hour);
            }
        }

        let max_rate = window.iter().map(|s| s.precipitation_rate).fold(0.0, f64::max);
        let max_pop = window.iter().map(|s| s.precipitation_probability).max().unwrap_or(0);

        let temps = window.iter().filter_map(|s| s.temperature.map(|v| (v, s.hour)));
        let warmest = temps.clone().fold(None, |best: Option<(f64, u32)>, cur| match best {
            Some(b) if b.0 >= cur.0 => Some(b),
            _ => Some(cur),
        });
        let coldest = temps.fold(None, |best: Option<(f64, u32)>, cur| match best {
            Some(b) if b.0 <= cur.0 => Some(b),
            _ => Some(cur),
        });

        let level = if classify(max_rate) == RainIntensity::Violent {
            DigestLevel::VeryHeavyRain
        } else if max_rate >= t.rate_heavy {
            DigestLevel::HeavyRain
        } else if max_rate >= t.rate_moderate {
            DigestLevel::ModerateRain
        } else if max_rate >= t.rate_notice || max_pop >= t.pop_high {
            DigestLevel::RainLikely
        } else if max_pop >= t.pop_notice {
            DigestLevel::PossibleRain
        } else {
            DigestLevel::Dry
        };

        Some(Self {
            likely_hours,
            possible_hours,
            max_rate,
            max_pop,
            warmest,
            coldest,
            level,
        })
    }
}

fn location_title(location: &Location) -> String {
    format!("📍 <b>{}</b>", location.display_name.to_uppercase())
}

/// Map link and accuracy for GPS fixes; empty for configured places.
fn fix_lines(location: &Location) -> String {
    match location.accuracy_m {
        Some(acc) => {
            let link = format!(
                "https://www.google.com/maps?q={},{}",
                location.latitude, location.longitude
            );
            format!("\n🎯 <b>Accuracy</b>: ~{acc:.1} m • <a href=\"{link}\">map</a>")
        }
        None => String::new(),
    }
}

fn sent_at(now: &DateTime<FixedOffset>) -> String {
    now.format("%Y-%m-%d %H:%M").to_string()
}

fn hint(night: bool, intensity: RainIntensity) -> String {
    let base = if intensity.is_severe() {
        "⚠️ <b>Note</b>: heavy rain possible, avoid travel and watch for flooding."
    } else {
        "🚦 <b>Note</b>: roads may be slippery, ride slowly."
    };
    if night {
        format!("🌙 {base}")
    } else {
        base.to_string()
    }
}

fn prefix(night: bool) -> &'static str {
    if night {
        "🔴🌙🌧️"
    } else {
        "🔴🌧️"
    }
}

pub fn alert(
    location: &Location,
    now: &DateTime<FixedOffset>,
    kind: AlertKind,
    cond: &Condition,
    digest: &DigestConfig,
) -> String {
    let hour = cond.hour_for(kind);
    let night = digest.is_night(hour);
    match kind {
        AlertKind::Raining => {
            let intensity = classify(cond.now_rate);
            format!(
                "{} <b>RAINING NOW</b>\n\
                 🕒 <b>Sent</b>: {}\n\
                 {DIVIDER}\n\
                 {}{}\n\
                 ⏰ <b>Data</b>: <b>{:02}:00</b>\n\
                 🌧️ <b>Status</b>: <b>RAINING</b> • <i>{}</i>\n\
                 💧 <b>Rate</b>: <b>{:.1} mm/h</b>\n\
                 {}",
                prefix(night),
                sent_at(now),
                location_title(location),
                fix_lines(location),
                hour,
                intensity,
                cond.now_rate,
                hint(night, intensity),
            )
        }
        AlertKind::NextHour => {
            let intensity = classify(cond.next_rate);
            format!(
                "{} <b>RAIN EXPECTED WITHIN THE HOUR</b>\n\
                 🕒 <b>Sent</b>: {}\n\
                 {DIVIDER}\n\
                 {}{}\n\
                 ⏰ <b>Expected</b>: <b>{:02}:00</b>\n\
                 ☔ <b>Chance</b>: <b>{}%</b>\n\
                 🌧️ <b>Type</b>: <i>{}</i> • <b>{:.1} mm/h</b>\n\
                 {}",
                prefix(night),
                sent_at(now),
                location_title(location),
                fix_lines(location),
                hour,
                cond.next_pop,
                intensity,
                cond.next_rate,
                hint(night, intensity),
            )
        }
    }
}

pub fn join_alerts(alerts: &[String]) -> String {
    alerts.join(&format!("\n\n{BIG_DIVIDER}\n\n"))
}

pub fn digest_header(now: &DateTime<FixedOffset>, digest: &DigestConfig) -> String {
    format!(
        "🌦️ <b>WEATHER FORECAST & ALERTS</b>\n\
         🕒 {}\n\
         ⏰ <b>Window</b>: {:02}:00–{:02}:00\n\
         {BIG_DIVIDER}\n",
        sent_at(now),
        digest.start_hour,
        digest.end_hour,
    )
}

pub fn digest_block(
    location: &Location,
    forecast: &DayForecast,
    cond: &Condition,
    digest: &DigestConfig,
    t: &Thresholds,
) -> String {
    let Some(summary) = DaySummary::from_samples(&forecast.samples, digest, t) else {
        return no_data_block(location);
    };

    let mut lines = vec![location_title(location)];
    let current = forecast
        .current_temperature
        .map(|v| format!("{v:.0}°C"))
        .unwrap_or_else(|| MISSING.to_string());
    lines.push(format!("🌡️ <b>Now</b>: {current}"));

    if cond.raining_now {
        lines.push(format!(
            "🔴 <b>STATUS</b>: <b>RAINING</b> • <i>{}</i> • <b>{:.1} mm/h</b>",
            classify(cond.now_rate),
            cond.now_rate
        ));
    } else {
        lines.push("🟢 <b>STATUS</b>: <b>DRY</b>".to_string());
    }

    let peak = format!(
        "☔ <b>Peak</b>: {}% | 🌧️ {:.1} mm/h • <i>{}</i>",
        summary.max_pop,
        summary.max_rate,
        classify(summary.max_rate)
    );
    if !summary.likely_hours.is_empty() {
        lines.push(format!(
            "🔴 <b>RAIN</b>: likely ({})",
            format_ranges(&compress(summary.likely_hours.iter().copied()))
        ));
        lines.push(peak);
        lines.push("🧥 <b>Reminder</b>: take a raincoat or umbrella.".to_string());
    } else if !summary.possible_hours.is_empty() {
        lines.push(format!(
            "🟠 <b>RAIN</b>: possible ({})",
            format_ranges(&compress(summary.possible_hours.iter().copied()))
        ));
        lines.push(peak);
        lines.push("🧥 <b>Reminder</b>: a spare raincoat would not hurt.".to_string());
    } else {
        lines.push("🟢 <b>RAIN</b>: nothing significant.".to_string());
    }

    if let Some((temp, hour)) = summary.warmest {
        lines.push(format!("🔥 <b>High</b>: {temp:.0}°C • {hour:02}:00"));
    }
    if let Some((temp, hour)) = summary.coldest {
        lines.push(format!("❄️ <b>Low</b>: {temp:.0}°C • {hour:02}:00"));
        if temp <= digest.cold_alert {
            lines.push("🧣 <b>Reminder</b>: it is cold, dress warmly.".to_string());
        } else if temp <= digest.cold_notice {
            lines.push("🧣 <b>Reminder</b>: chilly later, bring a jacket.".to_string());
        }
    }

    lines.push(format!("✅ <b>Outlook</b>: {}", summary.level.label()));
    lines.join("\n")
}

pub fn no_data_block(location: &Location) -> String {
    format!("{}\n⚠️ No forecast data.", location_title(location))
}

pub fn digest(header: &str, blocks: &[String]) -> String {
    format!("{header}{}", blocks.join(&format!("\n{BIG_DIVIDER}\n")))
}
