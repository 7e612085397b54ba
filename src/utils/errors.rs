use thiserror::Error;

use crate::browser::BrowserError;

/// Errors surfaced by the scrape pipeline
///
/// Only `Session`, `Batch` and the configuration variants ever reach the
/// batch caller. `Navigation`, `ActivationNotFound` and `InvalidTarget` are
/// converted into per-target failure outcomes by the orchestrator.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("session error: {0}")]
    Session(#[from] BrowserError),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("activation target not found")]
    ActivationNotFound,

    #[error("invalid target identifier {0:?}")]
    InvalidTarget(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("batch aborted after {completed} target(s): {reason}")]
    Batch { completed: usize, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ScrapeError {
    /// Classify a browser error raised while servicing a single target.
    pub(crate) fn from_target_browser_error(err: BrowserError) -> Self {
        if err.is_fatal() {
            ScrapeError::Session(err)
        } else {
            ScrapeError::Navigation(err.to_string())
        }
    }

    /// Whether the batch can continue with the next target.
    pub fn is_target_scoped(&self) -> bool {
        matches!(
            self,
            ScrapeError::Navigation(_) | ScrapeError::ActivationNotFound | ScrapeError::InvalidTarget(_)
        )
    }
}

pub type ScrapeResult<T> = Result<T, ScrapeError>;
