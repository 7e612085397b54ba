//! Locating, downloading and launching Chrome/Chromium

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use chromiumoxide::handler::viewport::Viewport;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tracing::{error, info, trace, warn};

use crate::BrowserConfig;
use crate::browser::BrowserError;

/// Environment variables consulted before any platform search path.
const EXECUTABLE_ENV_VARS: [&str; 2] = ["CHROME_PATH", "CHROMIUM_PATH"];

/// RAII guard for the profile directory.
///
/// Removes the directory on drop unless consumed by `into_path()`, so every
/// launch failure path cleans up after itself.
struct TempDirGuard {
    path: PathBuf,
    keep: bool,
}

impl TempDirGuard {
    fn new(path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&path).context("Failed to create user data directory")?;
        Ok(Self { path, keep: false })
    }

    /// Hand ownership of the directory to the caller.
    fn into_path(mut self) -> PathBuf {
        self.keep = true;
        self.path.clone()
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => info!("Cleaned up temp dir after launch failure: {}", self.path.display()),
            Err(e) => warn!("Failed to clean up temp dir {}: {}", self.path.display(), e),
        }
    }
}

/// Platform install locations, most common first.
fn candidate_paths() -> Vec<PathBuf> {
    if cfg!(target_os = "windows") {
        let mut roots: Vec<PathBuf> = ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"]
            .iter()
            .filter_map(|var| std::env::var_os(var).map(PathBuf::from))
            .collect();
        roots.push(PathBuf::from(r"C:\Program Files"));
        roots
            .into_iter()
            .flat_map(|root| {
                [
                    root.join(r"Google\Chrome\Application\chrome.exe"),
                    root.join(r"Chromium\Application\chrome.exe"),
                ]
            })
            .collect()
    } else if cfg!(target_os = "macos") {
        let mut paths = vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
            PathBuf::from("/opt/homebrew/bin/chromium"),
        ];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join("Applications/Google Chrome.app/Contents/MacOS/Google Chrome"));
            paths.push(home.join("Applications/Chromium.app/Contents/MacOS/Chromium"));
        }
        paths
    } else {
        [
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/usr/local/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
        .iter()
        .map(PathBuf::from)
        .collect()
    }
}

/// Ask `which` for any of the usual Chrome binary names (Unix only).
fn which_browser() -> Option<PathBuf> {
    if cfg!(target_os = "windows") {
        return None;
    }

    ["chromium", "chromium-browser", "google-chrome", "chrome"]
        .iter()
        .filter_map(|cmd| Command::new("which").arg(cmd).output().ok())
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .find(|path| !path.is_empty())
        .map(PathBuf::from)
}

/// Find Chrome/Chromium executable on the system.
///
/// Order: `CHROME_PATH`/`CHROMIUM_PATH`, platform install paths, `which`.
pub async fn find_browser_executable() -> Result<PathBuf> {
    for var in EXECUTABLE_ENV_VARS {
        if let Some(path) = std::env::var_os(var).map(PathBuf::from) {
            if path.exists() {
                info!("Using browser from {}: {}", var, path.display());
                return Ok(path);
            }
            warn!("{} points to non-existent file: {}", var, path.display());
        }
    }

    if let Some(path) = candidate_paths().into_iter().find(|p| p.exists()) {
        info!("Found browser at: {}", path.display());
        return Ok(path);
    }

    if let Some(path) = which_browser() {
        info!("Found browser using 'which' command: {}", path.display());
        return Ok(path);
    }

    warn!("No Chrome/Chromium executable found. Will download and use fetcher.");
    Err(anyhow::anyhow!("Chrome/Chromium executable not found"))
}

/// Downloads a managed Chromium into the user cache directory.
pub async fn download_managed_browser() -> Result<PathBuf> {
    info!("Downloading managed Chromium browser...");

    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(|| std::env::temp_dir().join(".cache"))
        .join("insights_scraper/chromium");

    std::fs::create_dir_all(&cache_dir).context("Failed to create cache directory")?;

    let fetcher = BrowserFetcher::new(
        BrowserFetcherOptions::builder()
            .with_path(&cache_dir)
            .build()
            .context("Failed to build fetcher options")?,
    );

    let revision_info = fetcher.fetch().await.context("Failed to fetch browser")?;

    info!("Downloaded Chromium to: {}", revision_info.folder_path.display());

    Ok(revision_info.executable_path)
}

/// Pick the binary to launch: configured override, local install, then download.
///
/// Fails with [`BrowserError::NotFound`] when none of them yields a binary.
async fn resolve_executable(config: &BrowserConfig) -> Result<PathBuf> {
    if let Some(path) = config.executable.as_ref() {
        if path.exists() {
            return Ok(path.clone());
        }
        return Err(BrowserError::NotFound(format!(
            "configured executable does not exist: {}",
            path.display()
        ))
        .into());
    }

    if let Ok(path) = find_browser_executable().await {
        return Ok(path);
    }

    download_managed_browser().await.map_err(|e| {
        anyhow::Error::from(BrowserError::NotFound(format!(
            "no local Chrome/Chromium and download failed: {e:#}"
        )))
    })
}

/// Launch Chrome with the fixed identity of a scrape session.
///
/// # Arguments
/// * `config` - Headless mode, viewport, user agent and executable override
/// * `chrome_data_dir` - Profile directory. If None, a per-process directory is used.
pub async fn launch_browser(
    config: &BrowserConfig,
    chrome_data_dir: Option<PathBuf>,
) -> Result<(Browser, JoinHandle<()>)> {
    let chrome_path = resolve_executable(config).await?;

    let user_data_dir_path = chrome_data_dir.unwrap_or_else(|| {
        std::env::temp_dir().join(format!("insights_scraper_{}", std::process::id()))
    });

    let temp_guard = TempDirGuard::new(user_data_dir_path)?;
    let user_data_dir = temp_guard.path.clone();

    let width = config.window.width;
    let height = config.window.height;

    let mut config_builder = BrowserConfigBuilder::default()
        .request_timeout(Duration::from_secs(30))
        .window_size(width, height)
        .viewport(Viewport {
            width,
            height,
            ..Viewport::default()
        })
        .user_data_dir(user_data_dir)
        .chrome_executable(chrome_path);

    if config.headless {
        config_builder = config_builder.headless_mode(HeadlessMode::default());
    } else {
        config_builder = config_builder.with_head();
    }

    for arg in identity_args(config) {
        config_builder = config_builder.arg(arg);
    }

    let browser_config = config_builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

    info!("Launching browser with config: {:?}", browser_config);
    let (browser, mut handler) = Browser::launch(browser_config)
        .await
        .context("Failed to launch browser")?;

    let handler_task = task::spawn(async move {
        while let Some(event) = handler.next().await {
            let Err(e) = event else { continue };
            let error_msg = e.to_string();

            // Chrome emits CDP events chromiumoxide cannot deserialize.
            // https://github.com/mattsse/chromiumoxide/issues/167
            if error_msg.contains("data did not match any variant of untagged enum Message")
                || error_msg.contains("Failed to deserialize WS response")
            {
                trace!("Suppressed benign CDP serialization error: {}", error_msg);
            } else {
                error!("Browser handler error: {:?}", e);
            }
        }
        info!("Browser handler task completed");
    });

    // BrowserWrapper owns the directory from here on
    temp_guard.into_path();

    Ok((browser, handler_task))
}

/// Command line flags derived from the browser configuration.
fn identity_args(config: &BrowserConfig) -> Vec<String> {
    let mut args = vec![
        format!("--user-agent={}", config.user_agent),
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-infobars".to_string(),
        "--disable-notifications".to_string(),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-extensions".to_string(),
        "--disable-background-timer-throttling".to_string(),
        "--disable-backgrounding-occluded-windows".to_string(),
        "--disable-breakpad".to_string(),
        "--disable-features=TranslateUI".to_string(),
        "--password-store=basic".to_string(),
        "--use-mock-keychain".to_string(),
        "--hide-scrollbars".to_string(),
        "--mute-audio".to_string(),
    ];

    if config.disable_security {
        info!("WARNING: Disabling browser security features (disable_security=true)");
        args.push("--disable-web-security".to_string());
        args.push("--ignore-certificate-errors".to_string());
    }

    if config.no_sandbox
        || config.disable_security
        || should_disable_sandbox(Path::new("/.dockerenv"))
    {
        args.push("--no-sandbox".to_string());
        args.push("--disable-setuid-sandbox".to_string());
    }

    args
}

/// setuid sandboxing does not work inside containers.
fn should_disable_sandbox(dockerenv: &Path) -> bool {
    dockerenv.exists()
        || std::env::var("container").is_ok()
        || std::env::var("KUBERNETES_SERVICE_HOST").is_ok()
}
