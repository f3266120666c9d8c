//! Process configuration loaded from environment variables.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use tracing::info;

use super::secret::{AuthorizedRecipient, Secret};
use crate::scheduler::DeliverySchedule;
use crate::{Error, Result};

pub const ENV_TELEGRAM_TOKEN: &str = "TELEGRAM_TOKEN";
pub const ENV_TELEGRAM_CHATID: &str = "TELEGRAM_CHATID";
pub const ENV_CRON_SPEC: &str = "CRON_SPEC";
pub const ENV_CRON_JITTER_SEC: &str = "CRON_JITTER_SEC";
pub const ENV_MEDIA_ROOT: &str = "MEDIA_ROOT";
pub const ENV_REBUILD_INTERVAL_SEC: &str = "INDEX_REBUILD_INTERVAL_SEC";
pub const ENV_SELECTOR_STRATEGY: &str = "SELECTOR_STRATEGY";
pub const ENV_POLL_TIMEOUT_SEC: &str = "TELEGRAM_POLL_TIMEOUT_SEC";
pub const ENV_API_URL: &str = "TELEGRAM_API_URL";
pub const ENV_PROXY: &str = "TELEGRAM_PROXY";
pub const ENV_LOG_DIR: &str = "LOG_DIR";

/// Default index rebuild cadence (hourly).
const DEFAULT_REBUILD_INTERVAL_SECS: u64 = 60 * 60;

/// Default long-poll timeout.
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 10;

/// Default Bot API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Which selection strategy answers `/photo` and scheduled deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectorStrategy {
    /// Uniform pick over the persisted index.
    #[default]
    Index,
    /// Randomized directory descent, no index needed.
    Tree,
}

impl FromStr for SelectorStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "index" => Ok(Self::Index),
            "tree" => Ok(Self::Tree),
            other => Err(Error::config(format!(
                "{ENV_SELECTOR_STRATEGY} must be 'index' or 'tree', got '{other}'"
            ))),
        }
    }
}

/// Immutable configuration, built once at startup and shared by reference.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Absolute path of the MediaRoot.
    pub media_root: PathBuf,
    pub telegram_token: Secret,
    pub recipient: AuthorizedRecipient,
    /// Delivery schedule; `None` disables scheduled delivery.
    pub cron_spec: Option<String>,
    /// Exclusive upper bound of the delivery jitter, in seconds.
    pub cron_jitter_secs: u64,
    pub rebuild_interval: Duration,
    pub selector_strategy: SelectorStrategy,
    pub poll_timeout: Duration,
    pub api_url: String,
    pub proxy: Option<String>,
    pub log_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// The transport token is removed from the environment once read, so child
    /// processes and later `env` dumps cannot see it.
    ///
    /// Must be called before any other thread is started.
    pub fn from_env() -> Result<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| Error::config(format!("cannot resolve working directory: {e}")))?;
        let config = Self::from_lookup(|key| std::env::var(key).ok(), &cwd)?;

        // SAFETY: called from `main` before the tokio runtime (or any other
        // thread) exists, so no concurrent environment access is possible.
        unsafe { std::env::remove_var(ENV_TELEGRAM_TOKEN) };

        Ok(config)
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// `default_root` is used when `MEDIA_ROOT` is not set.
    pub fn from_lookup<F>(lookup: F, default_root: &Path) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let telegram_token = get(ENV_TELEGRAM_TOKEN)
            .map(Secret::new)
            .ok_or_else(|| Error::config(format!("{ENV_TELEGRAM_TOKEN} is not set")))?;

        let recipient = get(ENV_TELEGRAM_CHATID)
            .map(|v| AuthorizedRecipient::new(v.trim()))
            .ok_or_else(|| Error::config(format!("{ENV_TELEGRAM_CHATID} is not set")))?;

        let cron_spec = get(ENV_CRON_SPEC).map(|v| v.trim().to_string());
        if let Some(spec) = cron_spec.as_deref() {
            DeliverySchedule::parse(spec)?;
        }

        let cron_jitter_secs = parse_u64(ENV_CRON_JITTER_SEC, get(ENV_CRON_JITTER_SEC), 0)?;

        let rebuild_secs = parse_u64(
            ENV_REBUILD_INTERVAL_SEC,
            get(ENV_REBUILD_INTERVAL_SEC),
            DEFAULT_REBUILD_INTERVAL_SECS,
        )?;
        if rebuild_secs == 0 {
            return Err(Error::config(format!(
                "{ENV_REBUILD_INTERVAL_SEC} must be greater than zero"
            )));
        }

        let poll_secs = parse_u64(
            ENV_POLL_TIMEOUT_SEC,
            get(ENV_POLL_TIMEOUT_SEC),
            DEFAULT_POLL_TIMEOUT_SECS,
        )?;

        let selector_strategy = get(ENV_SELECTOR_STRATEGY)
            .map(|v| v.parse())
            .transpose()?
            .unwrap_or_default();

        let media_root = resolve_media_root(get(ENV_MEDIA_ROOT), default_root)?;

        let api_url = get(ENV_API_URL)
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Ok(Self {
            media_root,
            telegram_token,
            recipient,
            cron_spec,
            cron_jitter_secs,
            rebuild_interval: Duration::from_secs(rebuild_secs),
            selector_strategy,
            poll_timeout: Duration::from_secs(poll_secs),
            api_url,
            proxy: get(ENV_PROXY),
            log_dir: get(ENV_LOG_DIR).map(PathBuf::from),
        })
    }

    /// Log the effective configuration without secrets.
    pub fn log_summary(&self) {
        info!(
            media_root = %self.media_root.display(),
            recipient = %self.recipient,
            cron_spec = self.cron_spec.as_deref().unwrap_or("<disabled>"),
            cron_jitter_secs = self.cron_jitter_secs,
            rebuild_interval = ?self.rebuild_interval,
            selector = ?self.selector_strategy,
            "Configuration loaded"
        );
    }
}

fn parse_u64(name: &str, value: Option<String>, default: u64) -> Result<u64> {
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
            Error::config(format!("{name} is not a valid non-negative number: {e}"))
        }),
    }
}

fn resolve_media_root(value: Option<String>, default_root: &Path) -> Result<PathBuf> {
    let root = value
        .map(PathBuf::from)
        .unwrap_or_else(|| default_root.to_path_buf());
    let root = std::path::absolute(&root)
        .map_err(|e| Error::config(format!("cannot resolve {}: {e}", root.display())))?;
    if !root.is_dir() {
        return Err(Error::config(format!(
            "media root {} is not a directory",
            root.display()
        )));
    }
    Ok(root)
}
