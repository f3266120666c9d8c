//! Single-recipient access control.

use async_trait::async_trait;
use tracing::warn;

use super::commands::ACCESS_DENIED;
use super::{Handler, Reply, Request};
use crate::Result;
use crate::config::{AuthorizedRecipient, mask};

/// Whether `identity` is the authorized recipient. Exact string equality.
pub fn authorize(identity: &str, allowed: &AuthorizedRecipient) -> bool {
    allowed.matches(identity)
}

/// Wraps a handler and answers every other requester with "Access denied".
///
/// The wrapped handler is never invoked for a denied request.
pub struct AccessGate<H> {
    inner: H,
    allowed: AuthorizedRecipient,
}

impl<H: Handler> AccessGate<H> {
    pub fn new(inner: H, allowed: AuthorizedRecipient) -> Self {
        Self { inner, allowed }
    }
}

#[async_trait]
impl<H: Handler> Handler for AccessGate<H> {
    async fn handle(&self, request: &Request) -> Result<Reply> {
        if !authorize(&request.chat_id, &self.allowed) {
            warn!(
                requester = %mask(&request.chat_id),
                command = ?request.command,
                "Not whitelisted. Access denied"
            );
            return Ok(Reply::text(ACCESS_DENIED));
        }
        self.inner.handle(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::Command;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default, Clone)]
    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl Handler for Counting {
        async fn handle(&self, _request: &Request) -> Result<Reply> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Reply::text("inner"))
        }
    }

    fn request(chat_id: &str) -> Request {
        Request {
            chat_id: chat_id.to_string(),
            message_id: 1,
            command: Command::Photo,
        }
    }

    #[test]
    fn test_authorize_exact_match() {
        let allowed = AuthorizedRecipient::new("-1001");
        assert!(authorize("-1001", &allowed));
        assert!(!authorize("1001", &allowed));
        assert!(!authorize("", &allowed));
    }

    #[tokio::test]
    async fn test_denied_request_short_circuits() {
        let counter = Counting::default();
        let gate = AccessGate::new(counter.clone(), AuthorizedRecipient::new("-1001"));

        let reply = gate.handle(&request("42")).await.unwrap();

        assert_eq!(reply, Reply::text(ACCESS_DENIED));
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_allowed_request_reaches_inner() {
        let counter = Counting::default();
        let gate = AccessGate::new(counter.clone(), AuthorizedRecipient::new("-1001"));

        let reply = gate.handle(&request("-1001")).await.unwrap();

        assert_eq!(reply, Reply::text("inner"));
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }
}
