//! Lifecycle surface for the workspace's long-running feed producers.

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Start/stop lifecycle of a feed producer.
///
/// `start` spawns the producer on its own runtime and returns immediately;
/// `stop` requests a cooperative exit and joins it. Feed engines are
/// one-shot: a stopped engine reports failure instead of rerunning.
pub trait Engine: Send + Sync {
    fn start(&self) -> EngineResult<()>;
    fn stop(&self) -> EngineResult<()>;
    fn health(&self) -> EngineHealth;
}

/// Phase of a feed run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedPhase {
    /// Constructed but not started.
    Idle,
    /// Day loop running; batches are being produced.
    Loading,
    /// Day loop finished; bridges still hold data for the consumer.
    Draining,
    /// Run complete or stopped.
    Stopped,
}

/// Operator-visible snapshot of a feed engine.
#[derive(Clone, Debug)]
pub struct EngineHealth {
    pub phase: FeedPhase,
    /// Last merge frontier the producer published, if any.
    pub loaded_frontier_ns: Option<i64>,
    pub detail: Option<String>,
}

impl EngineHealth {
    pub fn idle() -> Self {
        Self {
            phase: FeedPhase::Idle,
            loaded_frontier_ns: None,
            detail: None,
        }
    }

    pub fn loading(loaded_frontier_ns: Option<i64>) -> Self {
        Self {
            phase: FeedPhase::Loading,
            loaded_frontier_ns,
            detail: None,
        }
    }

    pub fn draining(loaded_frontier_ns: Option<i64>) -> Self {
        Self {
            phase: FeedPhase::Draining,
            loaded_frontier_ns,
            detail: None,
        }
    }

    pub fn stopped() -> Self {
        Self {
            phase: FeedPhase::Stopped,
            loaded_frontier_ns: None,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("feed engine is already running")]
    AlreadyRunning,
    #[error("feed engine is not running")]
    NotRunning,
    #[error("feed engine failed: {source}")]
    Failure {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
