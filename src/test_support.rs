//! In-memory DOM and session used by unit tests

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

use crate::browser::{BrowserError, BrowserResult};
use crate::locator::{Locator, Property};
use crate::session::{DomContext, Probe, ScrapeSession};

#[derive(Debug, Default)]
struct Node {
    text: String,
    attributes: HashMap<String, String>,
}

/// Synthetic document keyed by locator expression
///
/// Every probe and activation is logged so tests can assert on evaluation
/// order and short-circuiting.
#[derive(Debug, Default)]
pub struct FakeDom {
    nodes: HashMap<String, Node>,
    broken: HashSet<String>,
    /// Clickable expressions and how many more clicks fail before one lands
    clickable: Mutex<HashMap<String, usize>>,
    probed: Mutex<Vec<String>>,
    activated: Mutex<Vec<String>>,
}

impl FakeDom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, expr: &str, text: &str) -> Self {
        self.nodes.entry(expr.to_string()).or_default().text = text.to_string();
        self
    }

    pub fn with_attribute(mut self, expr: &str, name: &str, value: &str) -> Self {
        self.nodes
            .entry(expr.to_string())
            .or_default()
            .attributes
            .insert(name.to_string(), value.to_string());
        self
    }

    /// Every evaluation of `expr` errors.
    pub fn with_broken(mut self, expr: &str) -> Self {
        self.broken.insert(expr.to_string());
        self
    }

    pub fn with_clickable(self, expr: &str) -> Self {
        self.with_clickable_after(expr, 0)
    }

    /// `expr` only appears after `failures_before_success` clicks found nothing.
    pub fn with_clickable_after(self, expr: &str, failures_before_success: usize) -> Self {
        lock(&self.clickable).insert(expr.to_string(), failures_before_success);
        self
    }

    /// Probed expressions in evaluation order
    pub fn probed(&self) -> Vec<String> {
        lock(&self.probed).clone()
    }

    /// Activated expressions in evaluation order, including misses
    pub fn activated(&self) -> Vec<String> {
        lock(&self.activated).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl DomContext for FakeDom {
    async fn probe(&self, locator: &Locator, property: &Property) -> BrowserResult<Probe> {
        let expr = locator.expr();
        lock(&self.probed).push(expr.to_string());

        if self.broken.contains(expr) {
            return Err(BrowserError::EvaluationFailed(format!("bad expression {expr}")));
        }

        Ok(match self.nodes.get(expr) {
            None => Probe::Missing,
            Some(node) => Probe::Found(match property {
                Property::TextContent => Some(node.text.clone()),
                Property::Attribute(name) => node.attributes.get(name).cloned(),
            }),
        })
    }

    async fn activate(&self, locator: &Locator) -> BrowserResult<bool> {
        let expr = locator.expr();
        lock(&self.activated).push(expr.to_string());

        if self.broken.contains(expr) {
            return Err(BrowserError::EvaluationFailed(format!("bad expression {expr}")));
        }

        let mut clickable = lock(&self.clickable);
        match clickable.get_mut(expr) {
            Some(0) => Ok(true),
            Some(remaining) => {
                *remaining -= 1;
                Ok(false)
            }
            None => Ok(false),
        }
    }
}

/// Scripted session: one [`FakeDom`] per URL
#[derive(Default)]
pub struct FakeSession {
    pages: HashMap<String, FakeDom>,
    blank: FakeDom,
    current: Option<String>,
    failing: HashSet<String>,
    crash_on: HashSet<String>,
    crash_after_click: HashSet<String>,
    fatal_navigation: HashSet<String>,
    cancel_on: HashMap<String, CancellationToken>,
    alive: AtomicBool,
    navigations: Vec<String>,
    closes: usize,
}

impl FakeSession {
    pub fn new() -> Self {
        Self {
            alive: AtomicBool::new(true),
            ..Self::default()
        }
    }

    pub fn with_page(mut self, url: &str, dom: FakeDom) -> Self {
        self.pages.insert(url.to_string(), dom);
        self
    }

    /// Navigating to `url` fails with a network error.
    pub fn with_failing_navigation(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    /// The browser dies while loading `url`.
    pub fn with_crash_on(mut self, url: &str) -> Self {
        self.crash_on.insert(url.to_string());
        self
    }

    /// The browser dies right after a successful click on `url`.
    pub fn with_crash_after_click(mut self, url: &str) -> Self {
        self.crash_after_click.insert(url.to_string());
        self
    }

    /// Navigating to `url` fails with a fatal session error while the
    /// browser still answers health checks.
    pub fn with_fatal_navigation(mut self, url: &str) -> Self {
        self.fatal_navigation.insert(url.to_string());
        self
    }

    /// Fire `token` once `url` has been loaded.
    pub fn with_cancel_on(mut self, url: &str, token: CancellationToken) -> Self {
        self.cancel_on.insert(url.to_string(), token);
        self
    }

    pub fn navigations(&self) -> &[String] {
        &self.navigations
    }

    pub fn closes(&self) -> usize {
        self.closes
    }

    pub fn page(&self, url: &str) -> Option<&FakeDom> {
        self.pages.get(url)
    }

    fn alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn dom(&self) -> BrowserResult<&FakeDom> {
        if !self.alive() {
            return Err(BrowserError::Closed);
        }
        Ok(self
            .current
            .as_ref()
            .and_then(|url| self.pages.get(url))
            .unwrap_or(&self.blank))
    }
}

#[async_trait]
impl DomContext for FakeSession {
    async fn probe(&self, locator: &Locator, property: &Property) -> BrowserResult<Probe> {
        self.dom()?.probe(locator, property).await
    }

    async fn activate(&self, locator: &Locator) -> BrowserResult<bool> {
        let clicked = self.dom()?.activate(locator).await?;
        let crashes = self
            .current
            .as_ref()
            .is_some_and(|url| self.crash_after_click.contains(url));
        if clicked && crashes {
            self.alive.store(false, Ordering::SeqCst);
        }
        Ok(clicked)
    }
}

#[async_trait]
impl ScrapeSession for FakeSession {
    async fn navigate(&mut self, url: &str) -> BrowserResult<()> {
        if !self.alive() {
            return Err(BrowserError::Closed);
        }
        self.navigations.push(url.to_string());

        if self.fatal_navigation.contains(url) {
            return Err(BrowserError::Closed);
        }
        if self.crash_on.contains(url) {
            self.alive.store(false, Ordering::SeqCst);
            return Err(BrowserError::NavigationFailed(format!("{url}: target crashed")));
        }
        if self.failing.contains(url) {
            return Err(BrowserError::NavigationFailed(format!("{url}: net::ERR_CONNECTION_RESET")));
        }

        self.current = Some(url.to_string());
        if let Some(token) = self.cancel_on.get(url) {
            token.cancel();
        }
        Ok(())
    }

    async fn is_alive(&self) -> bool {
        self.alive()
    }

    async fn close(&mut self) -> BrowserResult<()> {
        self.closes += 1;
        self.current = None;
        Ok(())
    }
}
