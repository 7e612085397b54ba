//! Batch scraper for artist audience-insights pages
//!
//! Drives one headless Chrome session through a list of target identifiers,
//! clicks open the insights dialog on each page and extracts a fixed set of
//! fields via XPath/CSS fallback chains.

pub mod aggregator;
mod browser;
pub mod browser_setup;
pub mod extractor;
pub mod locator;
pub mod orchestrator;
pub mod retry;
pub mod session;
mod utils;

#[cfg(test)]
mod test_support;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

use crate::extractor::ExtractionSchema;
use crate::utils::constants::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    /// Page URL for one target; `{id}` is replaced with the encoded identifier
    #[serde(default = "default_target_url_template")]
    pub target_url_template: String,

    #[serde(default)]
    pub schema: ExtractionSchema,
}

/// Browser security and launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Disable web security features (Same-Origin Policy, etc.)
    /// WARNING: Only enable for trusted content
    #[serde(default)]
    pub disable_security: bool,

    /// Launch with `--no-sandbox`; required when running as root
    #[serde(default = "default_no_sandbox")]
    pub no_sandbox: bool,

    #[serde(default)]
    pub window: WindowConfig,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Skip discovery and launch this binary
    #[serde(default)]
    pub executable: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_width")]
    pub width: u32,

    #[serde(default = "default_window_height")]
    pub height: u32,
}

/// Every wait in the pipeline, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    #[serde(default = "default_activation_attempts")]
    pub activation_attempts: u32,

    #[serde(default = "default_activation_retry_delay_ms")]
    pub activation_retry_delay_ms: u64,

    #[serde(default = "default_activation_settle_ms")]
    pub activation_settle_ms: u64,

    #[serde(default = "default_pacing_delay_ms")]
    pub pacing_delay_ms: u64,

    /// Only applied when inspection is requested for a run
    #[serde(default = "default_inspection_pause_ms")]
    pub inspection_pause_ms: u64,
}

fn default_target_url_template() -> String {
    DEFAULT_TARGET_URL_TEMPLATE.to_string()
}

fn default_headless() -> bool {
    true
}

fn default_no_sandbox() -> bool {
    true
}

fn default_user_agent() -> String {
    CHROME_USER_AGENT.to_string()
}

fn default_window_width() -> u32 {
    DEFAULT_WINDOW_WIDTH
}

fn default_window_height() -> u32 {
    DEFAULT_WINDOW_HEIGHT
}

fn default_navigation_timeout_ms() -> u64 {
    DEFAULT_NAVIGATION_TIMEOUT_MS
}

fn default_settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}

fn default_activation_attempts() -> u32 {
    DEFAULT_ACTIVATION_ATTEMPTS
}

fn default_activation_retry_delay_ms() -> u64 {
    DEFAULT_ACTIVATION_RETRY_DELAY_MS
}

fn default_activation_settle_ms() -> u64 {
    DEFAULT_ACTIVATION_SETTLE_MS
}

fn default_pacing_delay_ms() -> u64 {
    DEFAULT_PACING_DELAY_MS
}

fn default_inspection_pause_ms() -> u64 {
    DEFAULT_INSPECTION_PAUSE_MS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser: BrowserConfig::default(),
            timing: TimingConfig::default(),
            target_url_template: default_target_url_template(),
            schema: ExtractionSchema::default(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            disable_security: false,
            no_sandbox: default_no_sandbox(),
            window: WindowConfig::default(),
            user_agent: default_user_agent(),
            executable: None,
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_window_width(),
            height: default_window_height(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: default_navigation_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            activation_attempts: default_activation_attempts(),
            activation_retry_delay_ms: default_activation_retry_delay_ms(),
            activation_settle_ms: default_activation_settle_ms(),
            pacing_delay_ms: default_pacing_delay_ms(),
            inspection_pause_ms: default_inspection_pause_ms(),
        }
    }
}

impl Config {
    /// Check every value a run depends on before any browser is launched.
    pub fn validate(&self) -> ScrapeResult<()> {
        let timing = &self.timing;

        validate_navigation_timeout(timing.navigation_timeout_ms)?;
        if timing.activation_attempts == 0 {
            return Err(ScrapeError::InvalidConfig(
                "activation_attempts must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("settle_delay_ms", timing.settle_delay_ms),
            ("activation_retry_delay_ms", timing.activation_retry_delay_ms),
            ("activation_settle_ms", timing.activation_settle_ms),
            ("pacing_delay_ms", timing.pacing_delay_ms),
            ("inspection_pause_ms", timing.inspection_pause_ms),
        ] {
            validate_fixed_delay(name, value)?;
        }

        if self.browser.window.width == 0 || self.browser.window.height == 0 {
            return Err(ScrapeError::InvalidConfig(
                "window dimensions must be non-zero".to_string(),
            ));
        }

        if !self.target_url_template.contains(TARGET_ID_PLACEHOLDER) {
            return Err(ScrapeError::InvalidConfig(format!(
                "target_url_template {:?} has no {} placeholder",
                self.target_url_template, TARGET_ID_PLACEHOLDER
            )));
        }

        self.schema.validate()
    }

    /// Page URL for one target identifier.
    ///
    /// # Errors
    /// `InvalidTarget` for blank identifiers or when the result is not a URL.
    pub fn target_url(&self, id: &str) -> ScrapeResult<String> {
        if id.trim().is_empty() {
            return Err(ScrapeError::InvalidTarget(id.to_string()));
        }

        let url = self
            .target_url_template
            .replace(TARGET_ID_PLACEHOLDER, &urlencoding::encode(id));

        Url::parse(&url).map_err(|_| ScrapeError::InvalidTarget(id.to_string()))?;
        Ok(url)
    }
}

/// Load config from a YAML file. A missing file yields the defaults.
pub fn load_config(path: &Path) -> ScrapeResult<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let contents = fs::read_to_string(path)?;
    let config: Config = serde_yaml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

/// Load config from config.yaml in package root
pub fn load_yaml_config() -> ScrapeResult<Config> {
    load_config(&PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config.yaml"))
}

pub use aggregator::{BatchAggregator, BatchResult, Outcome};
pub use browser::{
    BrowserError, BrowserResult, BrowserWrapper, download_managed_browser,
    find_browser_executable, launch_browser,
};
pub use extractor::{ExtractionRecord, FieldSpec, FieldValue, GroupEntry, GroupSpec, extract};
pub use locator::{Locator, LocatorChain, Property};
pub use orchestrator::{Orchestrator, RunOptions};
pub use session::{BrowserSession, DomContext, ScrapeSession};
pub use utils::{ScrapeError, ScrapeResult, validate_fixed_delay, validate_navigation_timeout};
