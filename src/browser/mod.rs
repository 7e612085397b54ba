//! Browser infrastructure for launching and owning a single Chrome instance

mod wrapper;

pub use crate::browser_setup::{download_managed_browser, find_browser_executable};
pub use wrapper::{BrowserWrapper, launch_browser};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Failed to find browser executable: {0}")]
    NotFound(String),

    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Failed to create page: {0}")]
    PageCreationFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Navigation to {url} timed out after {timeout_ms}ms")]
    NavigationTimeout { url: String, timeout_ms: u64 },

    #[error("Page evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("Browser session is closed")]
    Closed,
}

impl BrowserError {
    /// Errors after which no further target can be serviced by this session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BrowserError::NotFound(_)
                | BrowserError::LaunchFailed(_)
                | BrowserError::PageCreationFailed(_)
                | BrowserError::Closed
        )
    }
}

impl BrowserError {
    /// Recover a typed error from the launch plumbing, defaulting to `LaunchFailed`.
    pub(crate) fn from_launch(err: anyhow::Error) -> Self {
        match err.downcast::<BrowserError>() {
            Ok(typed) => typed,
            Err(other) => BrowserError::LaunchFailed(format!("{other:#}")),
        }
    }
}

pub type BrowserResult<T> = Result<T, BrowserError>;
