//! Periodic background execution of the notifier.
//!
//! The host decides when a registered task actually runs; the interval is a
//! minimum, not a promise. Registration is idempotent and is skipped when the host
//! reports background execution as restricted or denied.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::errors::AppError;
use crate::notifier::TickOutcome;

pub const TASK_NAME: &str = "background-sheet-poll";
pub const DEFAULT_MINIMUM_INTERVAL: Duration = Duration::from_secs(180);

/// Whether the host currently allows background work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BackgroundStatus {
    Available,
    Restricted,
    Denied,
}

impl BackgroundStatus {
    pub fn is_available(self) -> bool {
        self == BackgroundStatus::Available
    }
}

impl fmt::Display for BackgroundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackgroundStatus::Available => f.write_str("available"),
            BackgroundStatus::Restricted => f.write_str("restricted"),
            BackgroundStatus::Denied => f.write_str("denied"),
        }
    }
}

impl FromStr for BackgroundStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(BackgroundStatus::Available),
            "restricted" => Ok(BackgroundStatus::Restricted),
            "denied" => Ok(BackgroundStatus::Denied),
            other => Err(AppError::Validation(format!(
                "Invalid background policy: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BackgroundOptions {
    /// Lower bound between runs. The host may run less often.
    pub minimum_interval: Duration,
    /// Keep running after the foreground process goes away.
    pub stop_on_terminate: bool,
    /// Re-arm after a restart.
    pub start_on_boot: bool,
}

impl Default for BackgroundOptions {
    fn default() -> Self {
        Self {
            minimum_interval: DEFAULT_MINIMUM_INTERVAL,
            stop_on_terminate: false,
            start_on_boot: true,
        }
    }
}

/// Work invoked by the host on every tick.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn run(&self) -> TickOutcome;
}

/// Background execution facility.
#[async_trait]
pub trait BackgroundHost: Send + Sync {
    async fn status(&self) -> BackgroundStatus;
    async fn is_registered(&self, name: &str) -> bool;
    async fn register(
        &self,
        name: &str,
        options: BackgroundOptions,
        handler: Arc<dyn TaskHandler>,
    ) -> Result<(), AppError>;
    /// Returns whether a task was removed.
    async fn unregister(&self, name: &str) -> bool;
}

/// Runs each registered task in its own tokio task. Runs of one task never overlap.
pub struct TokioBackgroundHost {
    status: BackgroundStatus,
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl TokioBackgroundHost {
    pub fn new(status: BackgroundStatus) -> Self {
        Self {
            status,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Forget tasks whose loop has ended, e.g. after a handler panic.
    fn prune_finished(tasks: &mut HashMap<String, JoinHandle<()>>) {
        tasks.retain(|name, handle| {
            let finished = handle.is_finished();
            if finished {
                tracing::warn!("Background task {} stopped unexpectedly", name);
            }
            !finished
        });
    }
}

#[async_trait]
impl BackgroundHost for TokioBackgroundHost {
    async fn status(&self) -> BackgroundStatus {
        self.status
    }

    async fn is_registered(&self, name: &str) -> bool {
        let mut tasks = self.tasks.lock().await;
        Self::prune_finished(&mut tasks);
        tasks.contains_key(name)
    }

    async fn register(
        &self,
        name: &str,
        options: BackgroundOptions,
        handler: Arc<dyn TaskHandler>,
    ) -> Result<(), AppError> {
        if options.minimum_interval.is_zero() {
            return Err(AppError::Validation(
                "Minimum interval must be positive".to_string(),
            ));
        }

        let mut tasks = self.tasks.lock().await;
        Self::prune_finished(&mut tasks);
        if tasks.contains_key(name) {
            return Ok(());
        }

        let task_name = name.to_string();
        let period = options.minimum_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let outcome = handler.run().await;
                tracing::debug!("Background task {} finished: {:?}", task_name, outcome);
            }
        });

        tasks.insert(name.to_string(), handle);
        Ok(())
    }

    async fn unregister(&self, name: &str) -> bool {
        match self.tasks.lock().await.remove(name) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Background execution is {0}")]
    Unavailable(BackgroundStatus),
    #[error(transparent)]
    Host(#[from] AppError),
}

impl From<SchedulerError> for AppError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::Unavailable(_) => AppError::Unavailable(err.to_string()),
            SchedulerError::Host(e) => e,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Registration {
    Registered,
    AlreadyRegistered,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub task_name: &'static str,
    pub status: BackgroundStatus,
    pub registered: bool,
    pub minimum_interval_secs: u64,
    pub stop_on_terminate: bool,
    pub start_on_boot: bool,
}

/// Registers the notifier tick with a background host.
pub struct PeriodicScheduler {
    host: Arc<dyn BackgroundHost>,
    handler: Arc<dyn TaskHandler>,
    options: BackgroundOptions,
}

impl PeriodicScheduler {
    pub fn new(
        host: Arc<dyn BackgroundHost>,
        handler: Arc<dyn TaskHandler>,
        options: BackgroundOptions,
    ) -> Self {
        Self {
            host,
            handler,
            options,
        }
    }

    pub async fn register(&self) -> Result<Registration, SchedulerError> {
        let status = self.host.status().await;
        if !status.is_available() {
            tracing::warn!("Background fetch not available: {}", status);
            return Err(SchedulerError::Unavailable(status));
        }

        if self.host.is_registered(TASK_NAME).await {
            return Ok(Registration::AlreadyRegistered);
        }

        self.host
            .register(TASK_NAME, self.options, self.handler.clone())
            .await?;
        tracing::info!(
            "Registered {} every {}s (best effort)",
            TASK_NAME,
            self.options.minimum_interval.as_secs()
        );
        Ok(Registration::Registered)
    }

    pub async fn unregister(&self) -> bool {
        let removed = self.host.unregister(TASK_NAME).await;
        if removed {
            tracing::info!("Unregistered {}", TASK_NAME);
        }
        removed
    }

    pub async fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            task_name: TASK_NAME,
            status: self.host.status().await,
            registered: self.host.is_registered(TASK_NAME).await,
            minimum_interval_secs: self.options.minimum_interval.as_secs(),
            stop_on_terminate: self.options.stop_on_terminate,
            start_on_boot: self.options.start_on_boot,
        }
    }
}
