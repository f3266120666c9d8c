//! Telegram Bot API transport.
//!
//! Long-polls `getUpdates` for commands, replies with `sendMessage` and
//! uploads photos with a multipart `sendPhoto`. Handles 429 rate limits by
//! respecting the `parameters.retry_after` field returned in the JSON body.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use super::{InboundMessage, Transport, UpdateBatch};
use crate::config::{AppConfig, Secret};
use crate::delivery::MediaMessage;
use crate::{Error, Result};

/// Maximum number of retries for rate-limited requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Telegram `sendMessage` text limit (UTF-8 characters).
const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// Telegram media caption limit (UTF-8 characters).
const TELEGRAM_CAPTION_LIMIT: usize = 1024;

/// Timeout for send requests.
const SEND_TIMEOUT: Duration = Duration::from_secs(60);

/// Extra time granted to a long poll beyond its server-side timeout.
const POLL_GRACE: Duration = Duration::from_secs(15);

/// Telegram transport configuration.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Telegram Bot API token.
    pub bot_token: Secret,
    /// API base URL without trailing slash.
    pub api_url: String,
    /// Optional proxy URL for all requests.
    pub proxy: Option<String>,
}

impl TelegramConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            bot_token: config.telegram_token.clone(),
            api_url: config.api_url.clone(),
            proxy: config.proxy.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    message_id: i64,
    chat: Chat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct User {
    first_name: String,
    username: Option<String>,
}

/// Telegram Bot API client.
pub struct TelegramTransport {
    config: TelegramConfig,
    client: Client,
}

impl TelegramTransport {
    /// Create a new Telegram transport.
    pub fn new(config: TelegramConfig) -> Result<Self> {
        install_rustls_provider();

        let mut builder = Client::builder().connect_timeout(Duration::from_secs(10));
        if let Some(proxy_url) = config.proxy.as_deref() {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| Error::config(format!("Invalid proxy URL: {}", e.without_url())))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| Error::transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_url,
            self.config.bot_token.expose(),
            method
        )
    }

    /// Send a request with rate limit handling and decode its `result`.
    ///
    /// `build` is called once per attempt, since multipart bodies cannot be
    /// replayed.
    async fn send_with_retry<T, F>(&self, method: &str, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn(&Client, String) -> RequestBuilder,
    {
        let mut attempts = 0;

        loop {
            attempts += 1;

            // reqwest errors carry the URL, which embeds the token.
            let response = build(&self.client, self.method_url(method))
                .send()
                .await
                .map_err(|e| {
                    Error::transport(format!("Telegram {} request failed: {}", method, e.without_url()))
                })?;

            let status = response.status();
            let body: ApiResponse<T> = response.json().await.map_err(|e| {
                Error::transport(format!(
                    "Telegram {} returned an unreadable body ({}): {}",
                    method,
                    status,
                    e.without_url()
                ))
            })?;

            if status.is_success()
                && body.ok
                && let Some(result) = body.result
            {
                return Ok(result);
            }

            if status.as_u16() == 429 {
                let retry_after = body
                    .parameters
                    .and_then(|p| p.retry_after)
                    .map(Duration::from_secs);

                if attempts >= MAX_RATE_LIMIT_RETRIES {
                    warn!(
                        "Telegram rate limit: max retries ({}) exceeded, last retry_after was {:?}",
                        MAX_RATE_LIMIT_RETRIES, retry_after
                    );
                    return Err(Error::transport(format!(
                        "Telegram rate limit exceeded after {} retries",
                        MAX_RATE_LIMIT_RETRIES
                    )));
                }

                let wait_duration = retry_after.unwrap_or(Duration::from_secs(1));
                debug!(
                    "Telegram rate limited (429), waiting {:?} before retry (attempt {}/{})",
                    wait_duration, attempts, MAX_RATE_LIMIT_RETRIES
                );
                tokio::time::sleep(wait_duration).await;
                continue;
            }

            let description = body.description.unwrap_or_default();
            warn!("Telegram {} failed: {} - {}", method, status, description);
            return Err(Error::transport(format!(
                "Telegram {} failed: {} - {}",
                method, status, description
            )));
        }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    fn transport_type(&self) -> &'static str {
        "telegram"
    }

    async fn verify(&self) -> Result<String> {
        let me: User = self
            .send_with_retry("getMe", |client, url| client.post(url).timeout(SEND_TIMEOUT))
            .await?;
        Ok(me.username.unwrap_or(me.first_name))
    }

    async fn poll_updates(&self, offset: Option<i64>, timeout: Duration) -> Result<UpdateBatch> {
        let mut payload = json!({
            "timeout": timeout.as_secs(),
            "allowed_updates": ["message"],
        });
        if let Some(offset) = offset {
            payload["offset"] = json!(offset);
        }

        let updates: Vec<Update> = self
            .send_with_retry("getUpdates", |client, url| {
                client.post(url).json(&payload).timeout(timeout + POLL_GRACE)
            })
            .await?;

        Ok(batch_from_updates(updates))
    }

    async fn send_text(&self, chat_id: &str, text: &str, reply_to: Option<i64>) -> Result<()> {
        let mut payload = json!({
            "chat_id": chat_id,
            "text": truncate_text(text, TELEGRAM_MESSAGE_LIMIT),
        });
        if let Some(message_id) = reply_to {
            payload["reply_parameters"] = reply_parameters(message_id);
        }

        let _: serde_json::Value = self
            .send_with_retry("sendMessage", |client, url| {
                client.post(url).json(&payload).timeout(SEND_TIMEOUT)
            })
            .await?;

        debug!("Telegram text sent");
        Ok(())
    }

    async fn send_media(
        &self,
        chat_id: &str,
        message: &MediaMessage,
        reply_to: Option<i64>,
    ) -> Result<()> {
        let caption = truncate_text(&message.caption, TELEGRAM_CAPTION_LIMIT);
        let reply = reply_to.map(|id| reply_parameters(id).to_string());

        let _: serde_json::Value = self
            .send_with_retry("sendPhoto", |client, url| {
                let photo = Part::bytes(message.content.to_vec()).file_name(message.file_name.clone());
                let mut form = Form::new()
                    .text("chat_id", chat_id.to_string())
                    .text("caption", caption.clone())
                    .part("photo", photo);
                if let Some(reply) = reply.as_ref() {
                    form = form.text("reply_parameters", reply.clone());
                }
                client.post(url).multipart(form).timeout(SEND_TIMEOUT)
            })
            .await?;

        debug!(file = %message.file_name, bytes = message.content.len(), "Telegram photo sent");
        Ok(())
    }
}

fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Safe to ignore: can happen if another crate installed it first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

fn reply_parameters(message_id: i64) -> serde_json::Value {
    json!({
        "message_id": message_id,
        "allow_sending_without_reply": true,
    })
}

/// Keep text updates, and acknowledge everything.
fn batch_from_updates(updates: Vec<Update>) -> UpdateBatch {
    let next_offset = updates.iter().map(|u| u.update_id + 1).max();
    let messages = updates
        .into_iter()
        .filter_map(|update| {
            let message = update.message?;
            Some(InboundMessage {
                update_id: update.update_id,
                chat_id: message.chat.id.to_string(),
                message_id: message.message_id,
                text: message.text?,
            })
        })
        .collect();

    UpdateBatch {
        next_offset,
        messages,
    }
}

/// Truncate text to fit within a Telegram character limit.
pub fn truncate_text(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let suffix = "…";
    let budget = limit - suffix.chars().count();
    let truncated: String = text.chars().take(budget).collect();
    format!("{truncated}{suffix}")
}
