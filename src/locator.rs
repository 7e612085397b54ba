//! Locators and ordered fallback chains
//!
//! A [`Locator`] is an opaque selection expression. Nothing in this module
//! interprets it; the [`DomContext`] implementation decides what an XPath or
//! CSS expression means. Chains are evaluated strictly in order and the
//! first match wins.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::session::{DomContext, Probe};
use crate::utils::constants::GROUP_INDEX_PLACEHOLDER;
use crate::utils::{ScrapeError, ScrapeResult};

/// Expression identifying at most one DOM node
///
/// Written as a one-key map in config: `xpath: //h1` or `css: h1.title`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LocatorRepr", into = "LocatorRepr")]
pub enum Locator {
    XPath(String),
    Css(String),
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct LocatorRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    xpath: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    css: Option<String>,
}

impl TryFrom<LocatorRepr> for Locator {
    type Error = String;

    fn try_from(repr: LocatorRepr) -> Result<Self, Self::Error> {
        match (repr.xpath, repr.css) {
            (Some(expr), None) => Ok(Locator::XPath(expr)),
            (None, Some(expr)) => Ok(Locator::Css(expr)),
            (Some(_), Some(_)) => Err("locator must set only one of `xpath` or `css`".to_string()),
            (None, None) => Err("locator must set one of `xpath` or `css`".to_string()),
        }
    }
}

impl From<Locator> for LocatorRepr {
    fn from(locator: Locator) -> Self {
        match locator {
            Locator::XPath(expr) => LocatorRepr {
                xpath: Some(expr),
                css: None,
            },
            Locator::Css(expr) => LocatorRepr {
                xpath: None,
                css: Some(expr),
            },
        }
    }
}

impl Locator {
    pub fn xpath(expr: impl Into<String>) -> Self {
        Locator::XPath(expr.into())
    }

    pub fn css(expr: impl Into<String>) -> Self {
        Locator::Css(expr.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Locator::XPath(_) => "xpath",
            Locator::Css(_) => "css",
        }
    }

    pub fn expr(&self) -> &str {
        match self {
            Locator::XPath(expr) | Locator::Css(expr) => expr,
        }
    }

    /// Substitute `{index}` for grouped fields.
    pub fn with_index(&self, index: u32) -> Self {
        let expr = self.expr().replace(GROUP_INDEX_PLACEHOLDER, &index.to_string());
        match self {
            Locator::XPath(_) => Locator::XPath(expr),
            Locator::Css(_) => Locator::Css(expr),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.expr())
    }
}

/// Ordered, non-empty list of alternative locators for one logical element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Locator>", into = "Vec<Locator>")]
pub struct LocatorChain(Vec<Locator>);

impl LocatorChain {
    pub fn new(locators: Vec<Locator>) -> ScrapeResult<Self> {
        if locators.is_empty() {
            return Err(ScrapeError::InvalidConfig(
                "locator chain must contain at least one locator".to_string(),
            ));
        }
        if let Some(blank) = locators.iter().find(|l| l.expr().trim().is_empty()) {
            return Err(ScrapeError::InvalidConfig(format!(
                "locator chain contains an empty {} expression",
                blank.kind()
            )));
        }
        Ok(Self(locators))
    }

    pub fn single(locator: Locator) -> Self {
        Self(vec![locator])
    }

    /// Append a fallback tried after every existing entry.
    pub fn or(mut self, fallback: Locator) -> Self {
        self.0.push(fallback);
        self
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Locator> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Instantiate every entry for one index of a grouped field.
    pub fn with_index(&self, index: u32) -> Self {
        Self(self.0.iter().map(|l| l.with_index(index)).collect())
    }
}

impl TryFrom<Vec<Locator>> for LocatorChain {
    type Error = ScrapeError;

    fn try_from(locators: Vec<Locator>) -> Result<Self, Self::Error> {
        Self::new(locators)
    }
}

impl From<LocatorChain> for Vec<Locator> {
    fn from(chain: LocatorChain) -> Self {
        chain.0
    }
}

impl<'a> IntoIterator for &'a LocatorChain {
    type Item = &'a Locator;
    type IntoIter = std::slice::Iter<'a, Locator>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Which part of a matched node is read
///
/// Config form: `text_content` or `attribute: src`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PropertyRepr", into = "PropertyRepr")]
pub enum Property {
    #[default]
    TextContent,
    Attribute(String),
}

const TEXT_CONTENT: &str = "text_content";

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PropertyRepr {
    Named(String),
    Attribute { attribute: String },
}

impl TryFrom<PropertyRepr> for Property {
    type Error = String;

    fn try_from(repr: PropertyRepr) -> Result<Self, Self::Error> {
        match repr {
            PropertyRepr::Named(name) if name == TEXT_CONTENT => Ok(Property::TextContent),
            PropertyRepr::Named(name) => Err(format!(
                "unknown property {name:?}, expected `{TEXT_CONTENT}` or `attribute: <name>`"
            )),
            PropertyRepr::Attribute { attribute } => Ok(Property::Attribute(attribute)),
        }
    }
}

impl From<Property> for PropertyRepr {
    fn from(property: Property) -> Self {
        match property {
            Property::TextContent => PropertyRepr::Named(TEXT_CONTENT.to_string()),
            Property::Attribute(attribute) => PropertyRepr::Attribute { attribute },
        }
    }
}

/// A chain entry that matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Position of the matching locator in the chain
    pub index: usize,
    /// Property value; `None` when the node lacks the attribute
    pub value: Option<String>,
}

/// Evaluate `chain` in order and return the first match.
///
/// Entries after the first match are never evaluated. An evaluation error
/// on one entry counts as a miss for that entry only.
pub async fn resolve<D>(dom: &D, chain: &LocatorChain, property: &Property) -> Option<Resolved>
where
    D: DomContext + ?Sized,
{
    for (index, locator) in chain.iter().enumerate() {
        match dom.probe(locator, property).await {
            Ok(Probe::Found(value)) => return Some(Resolved { index, value }),
            Ok(Probe::Missing) => {
                debug!("Locator {} returned no result", locator);
            }
            Err(e) => {
                debug!("Locator {} failed to evaluate: {}", locator, e);
            }
        }
    }
    None
}
