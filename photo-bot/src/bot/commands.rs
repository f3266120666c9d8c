//! Command handlers.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{Command, Handler, Reply, Request};
use crate::Result;
use crate::delivery::DeliveryPipeline;

/// Reply for requesters other than the authorized recipient.
pub const ACCESS_DENIED: &str = "Access denied";

/// Reply when `/photo` could not produce a photo.
pub const PHOTO_FAILED: &str = "Failed to pick a photo";

/// Placeholder reply for `/beer`.
pub const BEER_REPLY: &str = "still no beer 🍺";

/// Usage text for `/help`.
pub fn help_text(chat_id: &str) -> String {
    let mut msg = String::from("Random photo bot.\n");
    msg.push_str(&format!("Chat ID: {chat_id}\nCommands:\n"));
    msg.push_str("/help - show this help\n");
    msg.push_str("/photo - random photo\n");
    msg.push_str("/beer - implement me\n");
    msg
}

/// Routes commands to their handlers.
pub struct CommandRouter {
    pipeline: Arc<DeliveryPipeline>,
}

impl CommandRouter {
    pub fn new(pipeline: Arc<DeliveryPipeline>) -> Self {
        Self { pipeline }
    }

    async fn handle_photo(&self) -> Result<Reply> {
        let message = self.pipeline.compose().await?;
        info!(caption = %message.caption, "Photo selected");
        Ok(Reply::Media(message))
    }
}

#[async_trait]
impl Handler for CommandRouter {
    async fn handle(&self, request: &Request) -> Result<Reply> {
        debug!(command = ?request.command, ">>");
        let reply = match &request.command {
            Command::Help => Ok(Reply::Text(help_text(&request.chat_id))),
            Command::Photo => self.handle_photo().await,
            Command::Beer => Ok(Reply::text(BEER_REPLY)),
            Command::Unknown(name) => {
                debug!(command = %name, "Ignoring unknown command");
                Ok(Reply::Nothing)
            }
        };
        debug!(command = ?request.command, "<<");
        reply
    }
}
