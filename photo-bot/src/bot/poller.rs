//! Long-poll loop feeding the handler chain.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::commands::PHOTO_FAILED;
use super::{Command, Handler, Reply, Request};
use crate::transport::{InboundMessage, Transport};

/// Pause after a failed poll before trying again.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Handle one request and send its reply.
///
/// Handler errors become the generic failure reply; send errors are logged.
pub async fn dispatch(handler: &dyn Handler, transport: &dyn Transport, request: Request) {
    let reply = match handler.handle(&request).await {
        Ok(reply) => reply,
        Err(e) if e.is_selection_miss() => {
            warn!(command = ?request.command, error = %e, "Nothing to select");
            Reply::text(PHOTO_FAILED)
        }
        Err(e) => {
            error!(command = ?request.command, error = %e, "Handler failed");
            Reply::text(PHOTO_FAILED)
        }
    };

    let sent = match &reply {
        Reply::Text(text) => {
            transport
                .send_text(&request.chat_id, text, Some(request.message_id))
                .await
        }
        Reply::Media(message) => {
            transport
                .send_media(&request.chat_id, message, Some(request.message_id))
                .await
        }
        Reply::Nothing => Ok(()),
    };

    if let Err(e) = sent {
        warn!(command = ?request.command, error = %e, "Failed to send reply");
    }
}

/// Pulls updates from the transport and handles each on its own task.
pub struct UpdatePoller {
    transport: Arc<dyn Transport>,
    handler: Arc<dyn Handler>,
    poll_timeout: Duration,
    cancellation_token: CancellationToken,
    tracker: TaskTracker,
}

impl UpdatePoller {
    pub fn new(
        transport: Arc<dyn Transport>,
        handler: Arc<dyn Handler>,
        poll_timeout: Duration,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            transport,
            handler,
            poll_timeout,
            cancellation_token,
            tracker: TaskTracker::new(),
        }
    }

    /// Run until the cancellation token fires, then wait for in-flight
    /// requests up to `drain_timeout`.
    pub async fn run(self, drain_timeout: Duration) {
        info!(transport = self.transport.transport_type(), "Update poller started");
        let mut offset: Option<i64> = None;

        loop {
            let polled = tokio::select! {
                _ = self.cancellation_token.cancelled() => break,
                polled = self.transport.poll_updates(offset, self.poll_timeout) => polled,
            };

            match polled {
                Ok(batch) => {
                    if batch.next_offset.is_some() {
                        offset = batch.next_offset;
                    }
                    for message in batch.messages {
                        self.spawn_request(message);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Polling updates failed");
                    tokio::select! {
                        _ = self.cancellation_token.cancelled() => break,
                        _ = tokio::time::sleep(POLL_ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        self.tracker.close();
        if tokio::time::timeout(drain_timeout, self.tracker.wait())
            .await
            .is_err()
        {
            warn!("Timed out waiting for in-flight requests");
        }
        info!("Update poller stopped");
    }

    fn spawn_request(&self, message: InboundMessage) {
        let Some(command) = Command::parse(&message.text) else {
            debug!(update_id = message.update_id, "Ignoring non-command message");
            return;
        };

        let request = Request {
            chat_id: message.chat_id,
            message_id: message.message_id,
            command,
        };
        let handler = Arc::clone(&self.handler);
        let transport = Arc::clone(&self.transport);

        self.tracker.spawn(async move {
            dispatch(handler.as_ref(), transport.as_ref(), request).await;
        });
    }
}
