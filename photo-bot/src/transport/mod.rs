//! Chat transports.
//!
//! The bot core talks to the chat network only through the [`Transport`]
//! trait. [`TelegramTransport`] implements it over the Telegram Bot API.

mod telegram;

pub use telegram::{TelegramConfig, TelegramTransport, truncate_text};

use std::time::Duration;

use async_trait::async_trait;

use crate::Result;
use crate::delivery::MediaMessage;

/// A text message received from a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Monotonic update id, used to acknowledge the message.
    pub update_id: i64,
    /// Chat the message came from; this is the requester identity.
    pub chat_id: String,
    pub message_id: i64,
    pub text: String,
}

/// Result of one long-poll round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateBatch {
    /// Offset acknowledging every update in this batch, including ones that
    /// carried no text.
    pub next_offset: Option<i64>,
    pub messages: Vec<InboundMessage>,
}

/// Outbound and inbound message plumbing.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Get the transport type name.
    fn transport_type(&self) -> &'static str;

    /// Validate the credential. Returns the bot account name.
    async fn verify(&self) -> Result<String>;

    /// Wait up to `timeout` for updates with `update_id >= offset`.
    async fn poll_updates(&self, offset: Option<i64>, timeout: Duration) -> Result<UpdateBatch>;

    /// Send a text message, optionally as a reply.
    async fn send_text(&self, chat_id: &str, text: &str, reply_to: Option<i64>) -> Result<()>;

    /// Upload a media message, optionally as a reply.
    async fn send_media(
        &self,
        chat_id: &str,
        message: &MediaMessage,
        reply_to: Option<i64>,
    ) -> Result<()>;
}
