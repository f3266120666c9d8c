//! Scheduler service.
//!
//! Drives two independent timers:
//! - index rebuild at a fixed interval (first run immediately)
//! - photo delivery on a cron schedule, each firing delayed by a random jitter
//!
//! Firings are not synchronized with rebuilds. A delivery may read the index
//! from before or after a concurrent rebuild; both are complete listings.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use parking_lot::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::{DeliverySchedule, JitterPolicy};
use crate::config::{AppConfig, AuthorizedRecipient};
use crate::delivery::DeliveryPipeline;
use crate::index::PathIndex;
use crate::random::SharedRandom;
use crate::{Error, Result};

/// Lifecycle of one timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Stopped,
    Running,
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => f.write_str("stopped"),
            Self::Running => f.write_str("running"),
        }
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Index rebuild cadence.
    pub rebuild_interval: Duration,
    /// Delivery schedule; `None` disables scheduled delivery.
    pub delivery: Option<DeliverySchedule>,
    pub jitter: JitterPolicy,
}

impl SchedulerConfig {
    pub fn from_app_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            rebuild_interval: config.rebuild_interval,
            delivery: config
                .cron_spec
                .as_deref()
                .map(DeliverySchedule::parse)
                .transpose()?,
            jitter: JitterPolicy::from_secs(config.cron_jitter_secs),
        })
    }
}

/// Timer states plus the token that stops the current run.
struct Lifecycle {
    rebuild: TimerState,
    delivery: TimerState,
    run_token: Option<CancellationToken>,
}

/// Periodic index rebuild and scheduled delivery.
pub struct Scheduler {
    config: SchedulerConfig,
    index: Arc<PathIndex>,
    pipeline: Arc<DeliveryPipeline>,
    recipient: AuthorizedRecipient,
    rng: SharedRandom,
    /// Parent token; cancelling it stops every run.
    cancellation_token: CancellationToken,
    tracker: TaskTracker,
    lifecycle: Mutex<Lifecycle>,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        index: Arc<PathIndex>,
        pipeline: Arc<DeliveryPipeline>,
        recipient: AuthorizedRecipient,
        rng: SharedRandom,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            config,
            index,
            pipeline,
            recipient,
            rng,
            cancellation_token,
            tracker: TaskTracker::new(),
            lifecycle: Mutex::new(Lifecycle {
                rebuild: TimerState::Stopped,
                delivery: TimerState::Stopped,
                run_token: None,
            }),
        }
    }

    pub fn rebuild_state(&self) -> TimerState {
        self.lifecycle.lock().rebuild
    }

    pub fn delivery_state(&self) -> TimerState {
        self.lifecycle.lock().delivery
    }

    /// Start both timers. The delivery timer stays stopped when no schedule
    /// is configured.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let token = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.rebuild != TimerState::Stopped {
                return Err(Error::InvalidStateTransition {
                    from: lifecycle.rebuild.to_string(),
                    to: TimerState::Running.to_string(),
                });
            }
            let token = self.cancellation_token.child_token();
            lifecycle.run_token = Some(token.clone());
            lifecycle.rebuild = TimerState::Running;
            if self.config.delivery.is_some() {
                lifecycle.delivery = TimerState::Running;
            }
            token
        };

        self.tracker.reopen();

        let this = Arc::clone(self);
        let rebuild_token = token.clone();
        self.tracker
            .spawn(async move { this.rebuild_loop(rebuild_token).await });

        match self.config.delivery.clone() {
            Some(schedule) => {
                info!(
                    cron_spec = schedule.expression(),
                    jitter = ?self.config.jitter.bound(),
                    "Scheduled delivery enabled"
                );
                let this = Arc::clone(self);
                self.tracker
                    .spawn(async move { this.delivery_loop(schedule, token).await });
            }
            None => info!("Scheduled delivery disabled"),
        }

        info!(rebuild_interval = ?self.config.rebuild_interval, "Scheduler started");
        Ok(())
    }

    /// Stop both timers and wait up to `timeout` for in-flight work.
    ///
    /// Pending jitter delays are abandoned. A rebuild already on the blocking
    /// pool runs to completion; its rename is atomic either way.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        let token = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.rebuild != TimerState::Running {
                return Err(Error::InvalidStateTransition {
                    from: lifecycle.rebuild.to_string(),
                    to: TimerState::Stopped.to_string(),
                });
            }
            lifecycle.rebuild = TimerState::Stopped;
            lifecycle.delivery = TimerState::Stopped;
            lifecycle.run_token.take()
        };

        info!("Shutting down scheduler (timeout: {:?})", timeout);
        if let Some(token) = token {
            token.cancel();
        }

        self.tracker.close();
        if tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_err()
        {
            warn!("Scheduler shutdown timeout reached, abandoning in-flight tasks");
        }

        info!("Scheduler stopped");
        Ok(())
    }

    /// One rebuild. Failures are logged and the previous index is kept.
    pub async fn run_rebuild_cycle(&self) -> Option<usize> {
        match self.index.rebuild_blocking().await {
            Ok(count) => Some(count),
            Err(e) => {
                error!(error = %e, "Index rebuild failed; keeping previous index");
                None
            }
        }
    }

    /// One scheduled delivery: jitter, then select and send.
    ///
    /// Returns `Ok(false)` if cancelled during the jitter delay.
    pub async fn fire_delivery(&self, cancel: &CancellationToken) -> Result<bool> {
        debug!("Delivery fired");
        if self.config.jitter.is_enabled() {
            let delay = self.config.jitter.draw(self.rng.as_ref());
            info!(jitter = ?delay, "Delaying delivery");
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Delivery abandoned during jitter");
                    return Ok(false);
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.pipeline.deliver_scheduled(&self.recipient).await?;
        Ok(true)
    }

    async fn rebuild_loop(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.rebuild_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Rebuild timer shutting down");
                    break;
                }
                _ = ticker.tick() => {}
            }
            self.run_rebuild_cycle().await;
        }
    }

    async fn delivery_loop(self: Arc<Self>, schedule: DeliverySchedule, cancel: CancellationToken) {
        let mut cursor = Local::now();

        loop {
            let Some((next, wait)) = schedule.wait_from(&cursor, &Local::now()) else {
                warn!(cron_spec = schedule.expression(), "Schedule has no upcoming occurrence");
                break;
            };
            debug!(next = %next, "Next delivery");

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Delivery timer shutting down");
                    break;
                }
                _ = tokio::time::sleep(wait) => {}
            }

            // Skip occurrences missed while the host was suspended.
            cursor = next.max(Local::now());

            // Each firing runs on its own task so a long jitter never delays
            // the next occurrence.
            let this = Arc::clone(&self);
            let fire_token = cancel.clone();
            self.tracker.spawn(async move {
                if let Err(e) = this.fire_delivery(&fire_token).await {
                    warn!(
                        recipient = %this.recipient,
                        error = %e,
                        "Scheduled delivery failed"
                    );
                }
            });
        }
    }
}
