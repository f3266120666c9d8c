//! Media delivery.
//!
//! Turns a selected path into a transport-agnostic [`MediaMessage`] and hands
//! it to the transport. Transport errors are returned to the caller, which
//! logs them; nothing is retried here.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info};

use crate::config::AuthorizedRecipient;
use crate::selector::{Selector, pick_blocking};
use crate::transport::Transport;
use crate::{Error, Result};

/// Caption prefix for scheduled deliveries.
pub const SCHEDULED_CAPTION_PREFIX: &str = "Photo of the day: ";

/// A photo ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaMessage {
    /// Path relative to the media root, `/`-separated.
    pub caption: String,
    /// File name presented to the recipient.
    pub file_name: String,
    pub content: Bytes,
}

impl MediaMessage {
    /// Prepend `prefix` to the caption.
    pub fn with_caption_prefix(mut self, prefix: &str) -> Self {
        self.caption = format!("{prefix}{}", self.caption);
        self
    }
}

/// Caption for `path`: its location relative to `root`.
///
/// Paths outside `root` fall back to the file name.
pub fn caption_for(path: &Path, root: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) => rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

/// Read `path` and wrap it with a caption relative to `root`.
pub async fn build_media_message(path: &Path, root: &Path) -> Result<MediaMessage> {
    let content = tokio::fs::read(path)
        .await
        .map_err(|e| Error::io_path("reading media file", path, e))?;

    Ok(MediaMessage {
        caption: caption_for(path, root),
        file_name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo.jpg".to_string()),
        content: Bytes::from(content),
    })
}

/// Selection → message → transport.
pub struct DeliveryPipeline {
    selector: Arc<dyn Selector>,
    transport: Arc<dyn Transport>,
    root: PathBuf,
}

impl DeliveryPipeline {
    pub fn new(selector: Arc<dyn Selector>, transport: Arc<dyn Transport>, root: PathBuf) -> Self {
        Self {
            selector,
            transport,
            root,
        }
    }

    /// Pick a file and build its message.
    pub async fn compose(&self) -> Result<MediaMessage> {
        let path = pick_blocking(Arc::clone(&self.selector)).await?;
        debug!(file = %path.display(), selector = self.selector.name(), "Selected file");
        build_media_message(&path, &self.root).await
    }

    /// Hand `message` to the transport for `recipient`. Failures are
    /// returned for the caller to log.
    pub async fn deliver(
        &self,
        message: &MediaMessage,
        recipient: &AuthorizedRecipient,
    ) -> Result<()> {
        self.transport
            .send_media(recipient.chat_id(), message, None)
            .await
    }

    /// One scheduled delivery: compose, prefix the caption, deliver.
    pub async fn deliver_scheduled(&self, recipient: &AuthorizedRecipient) -> Result<()> {
        let message = self
            .compose()
            .await?
            .with_caption_prefix(SCHEDULED_CAPTION_PREFIX);
        self.deliver(&message, recipient).await?;
        info!(caption = %message.caption, recipient = %recipient, "Scheduled photo delivered");
        Ok(())
    }
}
