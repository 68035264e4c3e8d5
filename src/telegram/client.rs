use super::format::{MAX_MESSAGE_CHARS, format_failure, format_report, split_message};
use super::types::{ApiResponse, SendMessageRequest};
use crate::config::{ChatId, SyncConfig, TelegramConfig};
use crate::error::{AppError, Result};
use crate::models::Period;
use crate::sink::ReportSink;
use crate::sync::SyncReport;
use async_trait::async_trait;
use chrono::FixedOffset;
use reqwest::Client;
use tracing::{debug, info, instrument};

const PARSE_MODE: &str = "Markdown";

/// Sends reports to a Telegram chat through a bot.
pub struct TelegramNotifier {
    client: Client,
    api_base_url: String,
    token: String,
    chat_id: ChatId,
    offset: FixedOffset,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig, sync: &SyncConfig) -> Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(sync.http_timeout())
            .build()
            .map_err(|e| AppError::Telegram(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url(),
            token: config.token.clone(),
            chat_id: config.chat_id.clone(),
            offset: sync.utc_offset()?,
        })
    }

    async fn send_message(&self, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base_url, self.token);
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            parse_mode: PARSE_MODE,
            disable_web_page_preview: true,
        };

        // The bot token is part of the URL, so keep it out of transport errors
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| e.without_url())?;

        let status = response.status();
        let body = response.text().await.map_err(|e| e.without_url())?;
        let parsed: Option<ApiResponse> = serde_json::from_str(&body).ok();

        match parsed {
            Some(ApiResponse { ok: true, .. }) if status.is_success() => Ok(()),
            Some(ApiResponse {
                description: Some(description),
                ..
            }) => Err(AppError::Telegram(format!(
                "Failed to send message: {} - {}",
                status, description
            ))),
            _ => Err(AppError::Telegram(format!(
                "Failed to send message: {} - {}",
                status, body
            ))),
        }
    }

    async fn send_all(&self, message: &str) -> Result<()> {
        let parts = split_message(message, MAX_MESSAGE_CHARS);
        info!(chat_id = %self.chat_id, parts = parts.len(), "Sending Telegram notification");

        for (i, part) in parts.iter().enumerate() {
            debug!(part = i + 1, chars = part.chars().count(), "Sending message part");
            self.send_message(part).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl ReportSink for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    #[instrument(name = "Notifying Telegram", skip_all)]
    async fn deliver(&self, report: &SyncReport) -> Result<()> {
        self.send_all(&format_report(report, self.offset)).await
    }

    #[instrument(name = "Notifying Telegram of failure", skip_all)]
    async fn deliver_failure(&self, period: &Period, error: &str) -> Result<()> {
        self.send_all(&format_failure(period, error, self.offset))
            .await
    }
}
