use crate::error::NotifyError;
use crate::models::Listing;
use crate::notify::{format_message, Notifier};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

const API_BASE: &str = "https://api.telegram.org";

/// Sends alerts through a Telegram bot
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base: API_BASE.to_string(),
            bot_token,
            chat_id,
        })
    }

    /// Build from `TELEGRAM_BOT_TOKEN` and `TELEGRAM_CHAT_ID`
    pub fn from_env(timeout: Duration) -> Result<Self, NotifyError> {
        let bot_token = non_empty_var("TELEGRAM_BOT_TOKEN")?;
        let chat_id = non_empty_var("TELEGRAM_CHAT_ID")?;
        Self::new(bot_token, chat_id, timeout)
    }

    /// Point at a different Bot API host
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }

    async fn send(&self, listing: &Listing) -> Result<(), NotifyError> {
        let text = format_message(listing);
        let form = [
            ("chat_id", self.chat_id.as_str()),
            ("text", text.as_str()),
            ("parse_mode", "Markdown"),
            ("disable_web_page_preview", "false"),
        ];

        let response = self.client.post(self.endpoint()).form(&form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Telegram accepted alert for {}", listing.id);
        Ok(())
    }
}

fn non_empty_var(name: &'static str) -> Result<String, NotifyError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(NotifyError::MissingCredential(name))
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn deliver(&self, listing: &Listing) -> bool {
        match self.send(listing).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Telegram delivery for {} failed (chat {}): {e}", listing.id, self.chat_id);
                false
            }
        }
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}
