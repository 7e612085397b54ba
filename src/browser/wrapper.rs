//! Browser lifecycle management for a scrape batch
//!
//! Owns the chromiumoxide browser, its event handler task and the temporary
//! profile directory. Exactly one wrapper exists per batch.

use anyhow::Result;
use chromiumoxide::browser::Browser;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::BrowserConfig;

/// Wrapper for Browser and its event handler task
///
/// Handler MUST be aborted to prevent it running indefinitely after
/// browser is closed. `Drop` does that, but only `shutdown()` closes the
/// Chrome process and removes the profile directory.
pub struct BrowserWrapper {
    browser: Browser,
    handler: JoinHandle<()>,
    user_data_dir: Option<PathBuf>,
}

impl BrowserWrapper {
    pub(crate) fn new(browser: Browser, handler: JoinHandle<()>, user_data_dir: PathBuf) -> Self {
        Self {
            browser,
            handler,
            user_data_dir: Some(user_data_dir),
        }
    }

    /// Get reference to inner browser
    pub(crate) fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Health check via the CDP `Browser.getVersion` command
    pub async fn is_alive(&self) -> bool {
        match self.browser.version().await {
            Ok(_) => true,
            Err(e) => {
                warn!("Browser health check failed: {}", e);
                false
            }
        }
    }

    /// Close the browser process, wait for it to exit and remove the profile.
    ///
    /// Both `close()` and `wait()` are required: dropping the wrapper only
    /// aborts the handler task and leaves Chrome running as a zombie.
    pub async fn shutdown(mut self) {
        info!("Shutting down browser");

        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }

        if let Err(e) = self.browser.wait().await {
            warn!("Failed to wait for browser exit: {}", e);
        }

        self.cleanup_temp_dir();
    }

    /// Clean up temp directory (blocking operation)
    ///
    /// MUST be called AFTER `browser.wait()` completes so Chrome has released
    /// all file handles.
    fn cleanup_temp_dir(&mut self) {
        if let Some(path) = self.user_data_dir.take() {
            info!("Cleaning up temp directory: {}", path.display());
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!(
                    "Failed to clean up temp directory {}: {}. Manual cleanup may be required.",
                    path.display(),
                    e
                );
            }
        }
    }
}

impl Drop for BrowserWrapper {
    fn drop(&mut self) {
        self.handler.abort();

        if let Some(path) = self.user_data_dir.as_ref() {
            warn!(
                "BrowserWrapper dropped without explicit shutdown. \
                Temp directory will be orphaned: {}",
                path.display()
            );
        }
    }
}

/// Launch a browser for one batch.
///
/// Each launch gets its own profile directory so concurrent scraper
/// processes never contend for a Chrome profile lock.
pub async fn launch_browser(config: &BrowserConfig) -> Result<BrowserWrapper> {
    let user_data_dir = std::env::temp_dir().join(format!(
        "insights_scraper_{}_{}",
        std::process::id(),
        uuid::Uuid::new_v4().simple()
    ));

    let (browser, handler) =
        crate::browser_setup::launch_browser(config, Some(user_data_dir.clone())).await?;

    Ok(BrowserWrapper::new(browser, handler, user_data_dir))
}
