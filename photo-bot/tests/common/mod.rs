//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use photo_bot::config::AppConfig;
use photo_bot::delivery::MediaMessage;
use photo_bot::random::{RandomSource, ThreadRandom};
use photo_bot::selector::Selector;
use photo_bot::transport::{InboundMessage, Transport, UpdateBatch};
use photo_bot::{Error, Result};

pub const AUTHORIZED_CHAT: &str = "-1001234567890";
pub const STRANGER_CHAT: &str = "424242";

/// Something the fake transport was asked to send.
#[derive(Debug, Clone)]
pub enum Sent {
    Text {
        chat_id: String,
        text: String,
        reply_to: Option<i64>,
    },
    Media {
        chat_id: String,
        caption: String,
        content: Vec<u8>,
        reply_to: Option<i64>,
        at: tokio::time::Instant,
    },
}

/// In-memory transport that records outbound messages and replays queued
/// update batches.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
    updates: Mutex<VecDeque<UpdateBatch>>,
    fail_sends: bool,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail_sends: true,
            ..Default::default()
        })
    }

    pub fn queue(&self, messages: Vec<InboundMessage>) {
        let next_offset = messages.iter().map(|m| m.update_id + 1).max();
        self.updates.lock().push_back(UpdateBatch {
            next_offset,
            messages,
        });
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    fn transport_type(&self) -> &'static str {
        "recording"
    }

    async fn verify(&self) -> Result<String> {
        Ok("test_bot".to_string())
    }

    async fn poll_updates(&self, _offset: Option<i64>, timeout: Duration) -> Result<UpdateBatch> {
        let queued = self.updates.lock().pop_front();
        match queued {
            Some(batch) => Ok(batch),
            None => {
                tokio::time::sleep(timeout.min(Duration::from_millis(50))).await;
                Ok(UpdateBatch::default())
            }
        }
    }

    async fn send_text(&self, chat_id: &str, text: &str, reply_to: Option<i64>) -> Result<()> {
        if self.fail_sends {
            return Err(Error::transport("send refused"));
        }
        self.sent.lock().push(Sent::Text {
            chat_id: chat_id.to_string(),
            text: text.to_string(),
            reply_to,
        });
        Ok(())
    }

    async fn send_media(
        &self,
        chat_id: &str,
        message: &MediaMessage,
        reply_to: Option<i64>,
    ) -> Result<()> {
        if self.fail_sends {
            return Err(Error::transport("send refused"));
        }
        self.sent.lock().push(Sent::Media {
            chat_id: chat_id.to_string(),
            caption: message.caption.clone(),
            content: message.content.to_vec(),
            reply_to,
            at: tokio::time::Instant::now(),
        });
        Ok(())
    }
}

/// Counts draws, delegating to the thread generator.
#[derive(Default)]
pub struct CountingRandom {
    draws: AtomicUsize,
}

impl CountingRandom {
    pub fn draws(&self) -> usize {
        self.draws.load(Ordering::SeqCst)
    }
}

impl RandomSource for CountingRandom {
    fn below(&self, upper: u64) -> u64 {
        self.draws.fetch_add(1, Ordering::SeqCst);
        ThreadRandom.below(upper)
    }
}

/// Always draws the same value, clamped to the range.
pub struct FixedRandom(pub u64);

impl RandomSource for FixedRandom {
    fn below(&self, upper: u64) -> u64 {
        self.0.min(upper - 1)
    }
}

/// Always picks the same file and counts how often it was asked.
pub struct CountingSelector {
    path: PathBuf,
    picks: AtomicUsize,
}

impl CountingSelector {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            picks: AtomicUsize::new(0),
        }
    }

    pub fn picks(&self) -> usize {
        self.picks.load(Ordering::SeqCst)
    }
}

impl Selector for CountingSelector {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn pick(&self) -> Result<PathBuf> {
        self.picks.fetch_add(1, Ordering::SeqCst);
        Ok(self.path.clone())
    }
}

/// Create `rel` under `root` with some bytes.
pub fn touch(root: &Path, rel: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, rel.as_bytes()).unwrap();
}

/// The tree used by the walkthrough scenario.
pub fn example_tree(root: &Path) {
    touch(root, "a.jpg");
    touch(root, "b/png_not_really.txt");
    touch(root, "b/c.png");
}

/// Configuration for a media root with optional extra variables.
pub fn test_config(root: &Path, extra: &[(&str, &str)]) -> AppConfig {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("TELEGRAM_TOKEN".into(), "123:TEST".into());
    vars.insert("TELEGRAM_CHATID".into(), AUTHORIZED_CHAT.into());
    for (key, value) in extra {
        vars.insert(key.to_string(), value.to_string());
    }
    AppConfig::from_lookup(|key| vars.get(key).cloned(), root).expect("valid test config")
}

pub fn message(update_id: i64, chat_id: &str, text: &str) -> InboundMessage {
    InboundMessage {
        update_id,
        chat_id: chat_id.to_string(),
        message_id: update_id * 10,
        text: text.to_string(),
    }
}

/// Poll `check` until it holds or five seconds pass.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    check()
}
