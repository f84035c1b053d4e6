use reqwest::blocking::Client;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

const API_URL: &str = "https://api.telegram.org";

/// Where composed messages go. Failures are reported, never retried.
pub trait MessageSink {
    fn deliver(&self, text: &str) -> Result<()>;
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

pub struct Telegram {
    client: Client,
    bot_token: String,
    chat_id: String,
}

impl Telegram {
    pub fn new(bot_token: String, chat_id: String) -> Result<Self> {
        let client = Client::builder().user_agent("rainwatch").build()?;
        Ok(Self {
            client,
            bot_token,
            chat_id,
        })
    }

    /// Reads `TELEGRAM_BOT_TOKEN` and `TELEGRAM_CHAT_ID`.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| Error::MissingEnv("TELEGRAM_BOT_TOKEN"))?;
        let chat = std::env::var("TELEGRAM_CHAT_ID")
            .map_err(|_| Error::MissingEnv("TELEGRAM_CHAT_ID"))?;
        Self::new(token, chat)
    }
}

impl MessageSink for Telegram {
    fn deliver(&self, text: &str) -> Result<()> {
        let url = format!("{API_URL}/bot{}/sendMessage", self.bot_token);
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        self.client.post(&url).json(&payload).send()?.error_for_status()?;
        debug!("telegram: delivered {} byte(s)", text.len());
        Ok(())
    }
}

/// Prints to stdout instead of sending, for dry runs.
pub struct Console;

impl MessageSink for Console {
    fn deliver(&self, text: &str) -> Result<()> {
        println!("{text}\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_shape() {
        let payload = SendMessage {
            chat_id: "42",
            text: "<b>hi</b>",
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["chat_id"], "42");
        assert_eq!(json["parse_mode"], "HTML");
        assert_eq!(json["disable_web_page_preview"], true);
    }
}
