//! Session driver: one browser process, one page
//!
//! [`DomContext`] is the DOM-evaluation seam the locator, retry and
//! extraction code is written against. [`ScrapeSession`] adds navigation
//! and lifecycle. [`BrowserSession`] implements both on top of chromiumoxide.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::browser::{BrowserError, BrowserResult, BrowserWrapper, launch_browser};
use crate::locator::{Locator, Property};
use crate::utils::js_scripts;
use crate::Config;

/// Quiet period without finished resource loads that counts as network idle
const NETWORK_QUIET_MS: u64 = 500;

/// Result of probing one locator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// No node matched
    Missing,
    /// A node matched; carries the requested property, `None` if absent
    Found(Option<String>),
}

/// Zero-or-one node queries and activation against the current document
#[async_trait]
pub trait DomContext: Send + Sync {
    /// Look up `locator` and read `property` from the first match.
    async fn probe(&self, locator: &Locator, property: &Property) -> BrowserResult<Probe>;

    /// Look up `locator` and simulate a click on the first match.
    ///
    /// Returns `Ok(false)` when nothing matched.
    async fn activate(&self, locator: &Locator) -> BrowserResult<bool>;
}

/// A navigable page owned exclusively by one batch
#[async_trait]
pub trait ScrapeSession: DomContext {
    /// Load `url`, wait for network idle, then wait the settle delay.
    ///
    /// Never retried here; the caller decides what a failure means.
    async fn navigate(&mut self, url: &str) -> BrowserResult<()>;

    /// Whether the underlying browser still answers.
    async fn is_alive(&self) -> bool;

    /// Release the browser. Calling it again is a no-op.
    async fn close(&mut self) -> BrowserResult<()>;
}

#[derive(Debug, Deserialize)]
struct ProbeReply {
    found: bool,
    value: Option<String>,
}

/// chromiumoxide-backed session
pub struct BrowserSession {
    wrapper: Option<BrowserWrapper>,
    page: Option<Page>,
    navigation_timeout: Duration,
    settle_delay: Duration,
}

impl BrowserSession {
    /// Launch the browser and open the single page used for the whole batch.
    ///
    /// # Errors
    /// `NotFound` if no browser binary is available, `LaunchFailed` if Chrome
    /// cannot start, `PageCreationFailed` if the page cannot be opened or
    /// configured. In the last case the browser is shut down first.
    pub async fn open(config: &Config) -> BrowserResult<Self> {
        let wrapper = launch_browser(&config.browser)
            .await
            .map_err(BrowserError::from_launch)?;

        let page = match Self::configure_page(&wrapper, config).await {
            Ok(page) => page,
            Err(e) => {
                wrapper.shutdown().await;
                return Err(e);
            }
        };

        info!(
            "Session open ({}x{}, headless: {})",
            config.browser.window.width, config.browser.window.height, config.browser.headless
        );

        Ok(Self {
            wrapper: Some(wrapper),
            page: Some(page),
            navigation_timeout: Duration::from_millis(config.timing.navigation_timeout_ms),
            settle_delay: Duration::from_millis(config.timing.settle_delay_ms),
        })
    }

    async fn configure_page(wrapper: &BrowserWrapper, config: &Config) -> BrowserResult<Page> {
        let page = wrapper
            .browser()
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::PageCreationFailed(e.to_string()))?;

        page.set_user_agent(SetUserAgentOverrideParams::new(config.browser.user_agent.clone()))
            .await
            .map_err(|e| BrowserError::PageCreationFailed(format!("failed to set user agent: {e}")))?;

        Ok(page)
    }

    fn page(&self) -> BrowserResult<&Page> {
        self.page.as_ref().ok_or(BrowserError::Closed)
    }

    /// Run a page-context function with one JSON argument and deserialize its result.
    ///
    /// Side effects stay inside this page's DOM.
    pub async fn evaluate<T: DeserializeOwned>(
        &self,
        function: &str,
        args: serde_json::Value,
    ) -> BrowserResult<T> {
        let page = self.page()?;

        let params = EvaluateParams::builder()
            .expression(js_scripts::invocation(function, &args))
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(BrowserError::EvaluationFailed)?;

        page.evaluate_expression(params)
            .await
            .map_err(|e| BrowserError::EvaluationFailed(e.to_string()))?
            .into_value::<T>()
            .map_err(|e| BrowserError::EvaluationFailed(format!("unexpected result shape: {e}")))
    }

    async fn load(&self, url: &str) -> BrowserResult<()> {
        let page = self.page()?;

        page.goto(url)
            .await
            .map_err(|e| BrowserError::NavigationFailed(format!("{url}: {e}")))?;

        page.wait_for_navigation()
            .await
            .map_err(|e| BrowserError::NavigationFailed(format!("{url}: {e}")))?;

        self.evaluate::<bool>(
            js_scripts::WAIT_NETWORK_QUIET,
            json!({ "quietMs": NETWORK_QUIET_MS }),
        )
        .await?;

        Ok(())
    }
}

fn locator_args(locator: &Locator, property: Option<&Property>) -> serde_json::Value {
    let attribute = match property {
        Some(Property::Attribute(name)) => json!(name),
        _ => serde_json::Value::Null,
    };
    json!({
        "kind": locator.kind(),
        "expr": locator.expr(),
        "attribute": attribute,
    })
}

#[async_trait]
impl DomContext for BrowserSession {
    async fn probe(&self, locator: &Locator, property: &Property) -> BrowserResult<Probe> {
        let reply: ProbeReply = self
            .evaluate(js_scripts::PROBE_NODE, locator_args(locator, Some(property)))
            .await?;

        Ok(if reply.found {
            Probe::Found(reply.value)
        } else {
            Probe::Missing
        })
    }

    async fn activate(&self, locator: &Locator) -> BrowserResult<bool> {
        self.evaluate(js_scripts::ACTIVATE_NODE, locator_args(locator, None))
            .await
    }
}

#[async_trait]
impl ScrapeSession for BrowserSession {
    async fn navigate(&mut self, url: &str) -> BrowserResult<()> {
        let started = Instant::now();

        match tokio::time::timeout(self.navigation_timeout, self.load(url)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(BrowserError::NavigationTimeout {
                    url: url.to_string(),
                    timeout_ms: self.navigation_timeout.as_millis() as u64,
                });
            }
        }

        debug!("Loaded {} in {}ms", url, started.elapsed().as_millis());
        tokio::time::sleep(self.settle_delay).await;
        Ok(())
    }

    async fn is_alive(&self) -> bool {
        match self.wrapper.as_ref() {
            Some(wrapper) => wrapper.is_alive().await,
            None => false,
        }
    }

    async fn close(&mut self) -> BrowserResult<()> {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!("Page close failed (browser may already be gone): {}", e);
            }
        }

        if let Some(wrapper) = self.wrapper.take() {
            wrapper.shutdown().await;
        }

        Ok(())
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if self.wrapper.is_some() {
            warn!("BrowserSession dropped without close(); browser process is being killed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locator_args_for_text_content() {
        let args = locator_args(&Locator::xpath("//h1"), Some(&Property::TextContent));
        assert_eq!(args, json!({ "kind": "xpath", "expr": "//h1", "attribute": null }));
    }

    #[test]
    fn locator_args_for_attribute() {
        let args = locator_args(
            &Locator::css("img.avatar"),
            Some(&Property::Attribute("src".into())),
        );
        assert_eq!(args, json!({ "kind": "css", "expr": "img.avatar", "attribute": "src" }));
    }

    #[test]
    fn probe_reply_tolerates_null_value() {
        let reply: ProbeReply = serde_json::from_value(json!({ "found": true, "value": null })).unwrap();
        assert!(reply.found);
        assert_eq!(reply.value, None);
    }
}
