//! Service container for dependency injection.
//!
//! The ServiceContainer builds every component from the startup
//! configuration and manages their lifecycle.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::Result;
use crate::bot::{AccessGate, CommandRouter, Handler, UpdatePoller};
use crate::config::AppConfig;
use crate::delivery::DeliveryPipeline;
use crate::index::PathIndex;
use crate::random::{SharedRandom, thread_random};
use crate::scheduler::{Scheduler, SchedulerConfig};
use crate::selector::{Selector, build_selector};
use crate::transport::{TelegramConfig, TelegramTransport, Transport};

/// Default shutdown timeout.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Service container holding all application services.
pub struct ServiceContainer {
    pub config: AppConfig,
    pub index: Arc<PathIndex>,
    pub selector: Arc<dyn Selector>,
    pub pipeline: Arc<DeliveryPipeline>,
    pub scheduler: Arc<Scheduler>,
    pub transport: Arc<dyn Transport>,
    /// Inbound handler chain, access gate outermost.
    pub handler: Arc<dyn Handler>,
    /// Cancellation token for graceful shutdown.
    cancellation_token: CancellationToken,
    poller_task: Mutex<Option<JoinHandle<()>>>,
}

impl ServiceContainer {
    /// Build the container with the Telegram transport.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let transport = Arc::new(TelegramTransport::new(TelegramConfig::from_app_config(
            &config,
        ))?);
        Self::with_transport(config, transport, thread_random())
    }

    /// Build the container around an arbitrary transport and random source.
    pub fn with_transport(
        config: AppConfig,
        transport: Arc<dyn Transport>,
        rng: SharedRandom,
    ) -> Result<Self> {
        info!("Initializing service container");

        let index = Arc::new(PathIndex::new(config.media_root.clone()));
        let selector = build_selector(config.selector_strategy, index.clone(), rng.clone());
        let pipeline = Arc::new(DeliveryPipeline::new(
            selector.clone(),
            transport.clone(),
            config.media_root.clone(),
        ));

        let handler: Arc<dyn Handler> = Arc::new(AccessGate::new(
            CommandRouter::new(pipeline.clone()),
            config.recipient.clone(),
        ));

        let cancellation_token = CancellationToken::new();
        let scheduler = Arc::new(Scheduler::new(
            SchedulerConfig::from_app_config(&config)?,
            index.clone(),
            pipeline.clone(),
            config.recipient.clone(),
            rng,
            cancellation_token.clone(),
        ));

        info!(selector = selector.name(), "Service container initialized");

        Ok(Self {
            config,
            index,
            selector,
            pipeline,
            scheduler,
            transport,
            handler,
            cancellation_token,
            poller_task: Mutex::new(None),
        })
    }

    /// Verify the transport, then start the timers and the update poller.
    pub async fn start(&self) -> Result<()> {
        let account = self.transport.verify().await?;
        info!(
            account = %account,
            transport = self.transport.transport_type(),
            "Transport verified"
        );

        self.scheduler.start()?;

        let poller = UpdatePoller::new(
            self.transport.clone(),
            self.handler.clone(),
            self.config.poll_timeout,
            self.cancellation_token.child_token(),
        );
        let handle = tokio::spawn(poller.run(DEFAULT_SHUTDOWN_TIMEOUT));
        *self.poller_task.lock() = Some(handle);

        info!("Bot started");
        Ok(())
    }

    /// Shutdown all services gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT).await
    }

    /// Shutdown all services gracefully with a custom timeout.
    pub async fn shutdown_with_timeout(&self, timeout: Duration) -> Result<()> {
        info!("Shutting down services (timeout: {:?})", timeout);

        // Signal all background tasks to stop
        self.cancellation_token.cancel();

        self.scheduler.shutdown(timeout).await?;

        let poller_task = self.poller_task.lock().take();
        if let Some(handle) = poller_task
            && tokio::time::timeout(timeout, handle).await.is_err()
        {
            warn!("Shutdown timeout reached, abandoning update poller");
        }

        info!("Services shut down");
        Ok(())
    }

    /// Get the cancellation token for external use.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Check if shutdown has been requested.
    pub fn is_shutting_down(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
