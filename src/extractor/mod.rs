//! Field extraction for one settled page
//!
//! Every [`FieldSpec`] is evaluated the same way: resolve its locator chain,
//! read the configured property, parse it. Any failure along that path
//! substitutes the field default and is logged, never raised, so one missing
//! field cannot affect the rest of the record.

mod parse;
mod schema;

pub use parse::{ParseFailure, Parser, parse_count};
pub use schema::ExtractionSchema;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::locator::{LocatorChain, Property, resolve};
use crate::session::DomContext;

/// Typed value of one extracted field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Count(u64),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            FieldValue::Count(_) => None,
        }
    }

    pub fn as_count(&self) -> Option<u64> {
        match self {
            FieldValue::Count(count) => Some(*count),
            FieldValue::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Count(count) => write!(f, "{}", count),
            FieldValue::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(text: &str) -> Self {
        FieldValue::Text(text.to_string())
    }
}

impl From<u64> for FieldValue {
    fn from(count: u64) -> Self {
        FieldValue::Count(count)
    }
}

/// One named extraction unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub locators: LocatorChain,
    #[serde(default)]
    pub property: Property,
    #[serde(default)]
    pub parser: Parser,
    /// Used when no locator matches or parsing fails
    pub default: FieldValue,
}

impl FieldSpec {
    pub fn text(name: impl Into<String>, locators: LocatorChain, default: &str) -> Self {
        Self {
            name: name.into(),
            locators,
            property: Property::TextContent,
            parser: Parser::Text,
            default: FieldValue::from(default),
        }
    }

    pub fn count(name: impl Into<String>, locators: LocatorChain) -> Self {
        Self {
            name: name.into(),
            locators,
            property: Property::TextContent,
            parser: Parser::Count,
            default: FieldValue::Count(0),
        }
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.property = property;
        self
    }

    pub fn with_parser(mut self, parser: Parser) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_default(mut self, default: FieldValue) -> Self {
        self.default = default;
        self
    }
}

/// A fixed-length list of `{label, count}` records built from two
/// co-indexed field specs whose locators contain `{index}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub name: String,
    /// First value substituted for `{index}`
    pub first_index: u32,
    /// Last value substituted for `{index}`, inclusive
    pub last_index: u32,
    pub label: FieldSpec,
    pub count: FieldSpec,
}

impl GroupSpec {
    /// Number of entries this group always produces
    pub fn entry_count(&self) -> usize {
        (self.last_index.saturating_sub(self.first_index) + 1) as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub label: FieldValue,
    pub count: FieldValue,
}

/// Structured result of one target
///
/// Serializes as one flat object: plain fields and groups side by side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionRecord {
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
    #[serde(flatten)]
    pub groups: BTreeMap<String, Vec<GroupEntry>>,
    /// Fields that fell back to their default
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub defaulted: Vec<String>,
}

impl ExtractionRecord {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    pub fn count(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(FieldValue::as_count)
    }

    pub fn group(&self, name: &str) -> Option<&[GroupEntry]> {
        self.groups.get(name).map(Vec::as_slice)
    }
}

/// Why a field fell back to its default
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultReason {
    Unresolved,
    MissingProperty,
    Unparseable(ParseFailure),
}

impl fmt::Display for DefaultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultReason::Unresolved => f.write_str("no locator matched"),
            DefaultReason::MissingProperty => f.write_str("matched node lacks the property"),
            DefaultReason::Unparseable(failure) => write!(f, "unparseable value: {}", failure),
        }
    }
}

/// Evaluate `spec` through `locators`, its own chain or an indexed instance of it.
async fn extract_value<D>(
    dom: &D,
    spec: &FieldSpec,
    locators: &LocatorChain,
) -> Result<FieldValue, DefaultReason>
where
    D: DomContext + ?Sized,
{
    let resolved = resolve(dom, locators, &spec.property)
        .await
        .ok_or(DefaultReason::Unresolved)?;
    let raw = resolved.value.ok_or(DefaultReason::MissingProperty)?;
    spec.parser.parse(&raw).map_err(DefaultReason::Unparseable)
}

struct RecordBuilder<'a> {
    target: &'a str,
    record: ExtractionRecord,
}

impl RecordBuilder<'_> {
    async fn value<D>(&mut self, dom: &D, spec: &FieldSpec, locators: &LocatorChain, label: &str) -> FieldValue
    where
        D: DomContext + ?Sized,
    {
        match extract_value(dom, spec, locators).await {
            Ok(value) => value,
            Err(reason) => {
                debug!(
                    target_id = self.target,
                    field = label,
                    tried = locators.len(),
                    "Field defaulted: {}",
                    reason
                );
                self.record.defaulted.push(label.to_string());
                spec.default.clone()
            }
        }
    }
}

/// Extract every field and group of `schema` from the current document.
///
/// Total: every field and every group entry is present in the result,
/// either with a real value or its default.
pub async fn extract<D>(dom: &D, schema: &ExtractionSchema, target: &str) -> ExtractionRecord
where
    D: DomContext + ?Sized,
{
    let mut builder = RecordBuilder {
        target,
        record: ExtractionRecord::default(),
    };

    for spec in &schema.fields {
        let value = builder.value(dom, spec, &spec.locators, &spec.name).await;
        builder.record.fields.insert(spec.name.clone(), value);
    }

    for group in &schema.groups {
        let mut entries = Vec::with_capacity(group.entry_count());
        for index in group.first_index..=group.last_index {
            let position = index - group.first_index + 1;

            let label_name = format!("{}[{}].{}", group.name, position, group.label.name);
            let label_chain = group.label.locators.with_index(index);
            let label = builder.value(dom, &group.label, &label_chain, &label_name).await;

            let count_name = format!("{}[{}].{}", group.name, position, group.count.name);
            let count_chain = group.count.locators.with_index(index);
            let count = builder.value(dom, &group.count, &count_chain, &count_name).await;

            entries.push(GroupEntry { label, count });
        }
        builder.record.groups.insert(group.name.clone(), entries);
    }

    builder.record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::Locator;
    use crate::test_support::FakeDom;

    fn xpath_chain(exprs: &[&str]) -> LocatorChain {
        LocatorChain::new(exprs.iter().map(|e| Locator::xpath(*e)).collect()).unwrap()
    }

    fn schema(fields: Vec<FieldSpec>, groups: Vec<GroupSpec>) -> ExtractionSchema {
        ExtractionSchema {
            activation: xpath_chain(&["//button"]),
            fields,
            groups,
        }
    }

    fn cities_group() -> GroupSpec {
        GroupSpec {
            name: "cities".into(),
            first_index: 3,
            last_index: 7,
            label: FieldSpec::text(
                "label",
                xpath_chain(&["//row[{index}]/name", "//alt[{index}]/name"]),
                "Unknown",
            ),
            count: FieldSpec::count(
                "count",
                xpath_chain(&["//row[{index}]/n", "//alt[{index}]/n"]),
            ),
        }
    }

    #[tokio::test]
    async fn unmatched_field_defaults_without_affecting_others() {
        let dom = FakeDom::new()
            .with_text("//name", "  Some Artist ")
            .with_text("//followers", "1,234 followers");

        let schema = schema(
            vec![
                FieldSpec::text("artist_name", xpath_chain(&["//name"]), "Unknown Artist"),
                FieldSpec::text("username", xpath_chain(&["//missing", "//also-missing"]), "No username found"),
                FieldSpec::count("followers", xpath_chain(&["//followers"])),
            ],
            vec![],
        );

        let record = extract(&dom, &schema, "A").await;

        assert_eq!(record.text("artist_name"), Some("Some Artist"));
        assert_eq!(record.text("username"), Some("No username found"));
        assert_eq!(record.count("followers"), Some(1234));
        assert_eq!(record.defaulted, vec!["username".to_string()]);
    }

    #[tokio::test]
    async fn missing_attribute_and_parse_failure_use_defaults() {
        let dom = FakeDom::new()
            .with_attribute("//img", "alt", "cover")
            .with_text("//huge", "99999999999999999999999");

        let schema = schema(
            vec![
                FieldSpec::text("image_url", xpath_chain(&["//img"]), "No image found")
                    .with_property(Property::Attribute("src".into())),
                FieldSpec::count("monthly_listeners", xpath_chain(&["//huge"]))
                    .with_default(FieldValue::Count(7)),
            ],
            vec![],
        );

        let record = extract(&dom, &schema, "A").await;
        assert_eq!(record.text("image_url"), Some("No image found"));
        assert_eq!(record.count("monthly_listeners"), Some(7));
        assert_eq!(record.defaulted.len(), 2);
    }

    #[tokio::test]
    async fn all_non_digit_count_is_zero_not_default() {
        let dom = FakeDom::new().with_text("//followers", "no followers");
        let schema = schema(
            vec![FieldSpec::count("followers", xpath_chain(&["//followers"]))
                .with_default(FieldValue::Count(42))],
            vec![],
        );

        let record = extract(&dom, &schema, "A").await;
        assert_eq!(record.count("followers"), Some(0));
        assert!(record.defaulted.is_empty());
    }

    #[tokio::test]
    async fn group_length_is_fixed_when_only_some_indices_resolve() {
        let dom = FakeDom::new()
            .with_text("//row[3]/name", "Berlin")
            .with_text("//row[3]/n", "10,000")
            .with_text("//alt[4]/name", "Paris")
            .with_text("//alt[4]/n", "9,001");

        let record = extract(&dom, &schema(vec![], vec![cities_group()]), "A").await;
        let cities = record.group("cities").unwrap();

        assert_eq!(cities.len(), 5);
        assert_eq!(
            cities[0],
            GroupEntry {
                label: "Berlin".into(),
                count: FieldValue::Count(10_000)
            }
        );
        assert_eq!(
            cities[1],
            GroupEntry {
                label: "Paris".into(),
                count: FieldValue::Count(9_001)
            }
        );
        for entry in &cities[2..] {
            assert_eq!(
                entry,
                &GroupEntry {
                    label: "Unknown".into(),
                    count: FieldValue::Count(0)
                }
            );
        }
        assert!(record.defaulted.contains(&"cities[5].label".to_string()));
        assert!(record.defaulted.contains(&"cities[5].count".to_string()));
    }

    #[tokio::test]
    async fn extraction_is_idempotent_for_identical_dom() {
        let dom = FakeDom::new()
            .with_text("//name", "Artist")
            .with_text("//row[5]/n", "77");
        let schema = schema(
            vec![FieldSpec::text("artist_name", xpath_chain(&["//name"]), "Unknown Artist")],
            vec![cities_group()],
        );

        let first = extract(&dom, &schema, "A").await;
        let second = extract(&dom, &schema, "A").await;
        assert_eq!(first, second);
    }

    #[test]
    fn record_serializes_flat_with_nested_groups() {
        let mut record = ExtractionRecord::default();
        record.fields.insert("artist_name".into(), "Artist".into());
        record.fields.insert("followers".into(), FieldValue::Count(12));
        record.groups.insert(
            "cities".into(),
            vec![GroupEntry {
                label: "Unknown".into(),
                count: FieldValue::Count(0),
            }],
        );

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "artist_name": "Artist",
                "followers": 12,
                "cities": [{ "label": "Unknown", "count": 0 }]
            })
        );
    }

    #[test]
    fn field_value_untagged_yaml() {
        let text: FieldValue = serde_yaml::from_str("'Unknown'").unwrap();
        let count: FieldValue = serde_yaml::from_str("0").unwrap();
        assert_eq!(text, FieldValue::Text("Unknown".into()));
        assert_eq!(count, FieldValue::Count(0));
    }
}
