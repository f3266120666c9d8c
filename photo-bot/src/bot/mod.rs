//! Inbound command handling.
//!
//! Requests flow through a chain of [`Handler`]s: the [`AccessGate`] first,
//! then the [`CommandRouter`]. The [`UpdatePoller`] feeds the chain from the
//! transport and sends replies back.

mod commands;
mod gate;
mod poller;

pub use commands::{ACCESS_DENIED, BEER_REPLY, CommandRouter, PHOTO_FAILED, help_text};
pub use gate::{AccessGate, authorize};
pub use poller::{UpdatePoller, dispatch};

use async_trait::async_trait;

use crate::Result;
use crate::delivery::MediaMessage;

/// A recognised bot command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Photo,
    Beer,
    /// Any other `/word`; answered with silence.
    Unknown(String),
}

impl Command {
    /// Parse the first token of a message.
    ///
    /// Returns `None` for text that is not a command. A `@botname` suffix is
    /// ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let token = text.split_whitespace().next()?;
        let name = token.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        if name.is_empty() {
            return None;
        }

        Some(match name.to_ascii_lowercase().as_str() {
            "help" | "start" => Self::Help,
            "photo" => Self::Photo,
            "beer" => Self::Beer,
            other => Self::Unknown(other.to_string()),
        })
    }
}

/// One inbound command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Requester identity (chat id).
    pub chat_id: String,
    /// Message being answered.
    pub message_id: i64,
    pub command: Command,
}

/// What to send back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Media(MediaMessage),
    Nothing,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

/// A request handler. Decorators wrap another handler.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, request: &Request) -> Result<Reply>;
}
