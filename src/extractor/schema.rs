//! Extraction schema and the built-in artist audience-insights layout

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{FieldSpec, FieldValue, GroupSpec, Parser};
use crate::locator::{Locator, LocatorChain, Property};
use crate::utils::constants::GROUP_INDEX_PLACEHOLDER;
use crate::utils::{ScrapeError, ScrapeResult};

/// Everything the pipeline needs to know about one page layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionSchema {
    /// Element clicked to reveal the data before extraction
    pub activation: LocatorChain,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub groups: Vec<GroupSpec>,
}

impl Default for ExtractionSchema {
    fn default() -> Self {
        Self::artist_insights()
    }
}

// Absolute path to the profile section and its main-view relative twin
const SECTION: &str = "/html/body/div[4]/div/div[2]/div[6]/div/div[2]/div[1]/div/main/section/div/div[2]/div[3]";
const MAIN_VIEW_SECTION: &str =
    "//*[@id=\"main-view\"]/div/div[2]/div[1]/div/main/section/div/div[2]/div[3]";

fn xpaths([primary, fallback]: [String; 2]) -> LocatorChain {
    LocatorChain::single(Locator::XPath(primary)).or(Locator::XPath(fallback))
}

impl ExtractionSchema {
    /// Audience-insights dialog of an artist profile page.
    ///
    /// Every field has a primary locator and one fallback; cities are the
    /// five rows at dialog indices 3 through 7.
    pub fn artist_insights() -> Self {
        let activation = xpaths([
            format!("{MAIN_VIEW_SECTION}/div[3]/div/div/button"),
            format!("{MAIN_VIEW_SECTION}/div[2]/div/div/button"),
        ]);

        let fields = vec![
            FieldSpec::text(
                "artist_name",
                xpaths([
                    format!("{SECTION}/div[2]/div/dialog/div/div[1]/div/div/div[2]/div[2]/div"),
                    "//div[@data-encore-id=\"text\" and contains(text(), \"Posted By\")]".to_string(),
                ]),
                "Unknown Artist",
            )
            .with_parser(Parser::StripPrefix {
                prefix: "Posted By ".to_string(),
            }),
            FieldSpec::text(
                "image_url",
                xpaths([
                    format!("{SECTION}/div[2]/div/dialog/div/div[1]/div/div/div[2]/div[2]/figure/div/img"),
                    "//img[@class[contains(., \"mMx2LUixlnN_Fu45JpFB\")]]".to_string(),
                ]),
                "No image found",
            )
            .with_property(Property::Attribute("src".to_string())),
            FieldSpec::text(
                "username",
                xpaths([
                    format!("{SECTION}/div[2]/div/dialog/div/div[1]/div/div/div[2]/div[1]/p"),
                    "//p[@data-encore-id=\"type\" and starts-with(text(), \"@\")]".to_string(),
                ]),
                "No username found",
            ),
            FieldSpec::count(
                "followers",
                xpaths([
                    format!("{SECTION}/div[3]/div/dialog/div/div[1]/div[2]/div/div[1]/div[1]/div[1]"),
                    format!("{MAIN_VIEW_SECTION}/div[2]/div/dialog/div/div[1]/div/div/div[1]/div[1]/div[1]"),
                ]),
            ),
            FieldSpec::count(
                "monthly_listeners",
                xpaths([
                    format!("{SECTION}/div[3]/div/dialog/div/div[1]/div[2]/div/div[1]/div[2]/div[1]"),
                    format!("{SECTION}/div[2]/div/dialog/div/div[1]/div/div/div[1]/div[2]/div[1]"),
                ]),
            ),
            FieldSpec::text(
                "social_link",
                xpaths([
                    format!("{MAIN_VIEW_SECTION}/div[2]/div/dialog/div/div[1]/div/div/div[1]/div[8]/a"),
                    "//a[contains(@href, \"instagram.com\") or contains(@href, \"facebook.com\")]"
                        .to_string(),
                ]),
                "No social link found",
            )
            .with_property(Property::Attribute("href".to_string())),
        ];

        let city_row = |column: u32| {
            xpaths([
                format!(
                    "{SECTION}/div[3]/div/dialog/div/div[1]/div[2]/div/div[1]/div[{GROUP_INDEX_PLACEHOLDER}]/div[{column}]"
                ),
                format!(
                    "{MAIN_VIEW_SECTION}/div[2]/div/dialog/div/div[1]/div/div/div[1]/div[{GROUP_INDEX_PLACEHOLDER}]/div[{column}]"
                ),
            ])
        };

        let groups = vec![GroupSpec {
            name: "cities".to_string(),
            first_index: 3,
            last_index: 7,
            label: FieldSpec::text("label", city_row(1), "Unknown"),
            count: FieldSpec::count("count", city_row(2)),
        }];

        Self {
            activation,
            fields,
            groups,
        }
    }

    /// Reject schemas whose output shape would be ambiguous or whose
    /// defaults contradict their parsers.
    pub fn validate(&self) -> ScrapeResult<()> {
        let mut names = HashSet::new();

        for spec in &self.fields {
            validate_field(spec)?;
            if !names.insert(spec.name.as_str()) {
                return Err(invalid(format!("duplicate output name {:?}", spec.name)));
            }
        }

        for group in &self.groups {
            if group.name.trim().is_empty() {
                return Err(invalid("group name must not be empty".to_string()));
            }
            if !names.insert(group.name.as_str()) {
                return Err(invalid(format!("duplicate output name {:?}", group.name)));
            }
            if group.first_index > group.last_index {
                return Err(invalid(format!(
                    "group {:?} has first_index {} after last_index {}",
                    group.name, group.first_index, group.last_index
                )));
            }
            for member in [&group.label, &group.count] {
                validate_field(member)?;
                if !member
                    .locators
                    .iter()
                    .any(|l| l.expr().contains(GROUP_INDEX_PLACEHOLDER))
                {
                    return Err(invalid(format!(
                        "group {:?} member {:?} has no {} placeholder",
                        group.name, member.name, GROUP_INDEX_PLACEHOLDER
                    )));
                }
            }
        }

        Ok(())
    }
}

fn invalid(message: String) -> ScrapeError {
    ScrapeError::InvalidConfig(message)
}

fn validate_field(spec: &FieldSpec) -> ScrapeResult<()> {
    if spec.name.trim().is_empty() {
        return Err(invalid("field name must not be empty".to_string()));
    }
    let default_is_count = matches!(spec.default, FieldValue::Count(_));
    if spec.parser.is_numeric() != default_is_count {
        return Err(invalid(format!(
            "field {:?} default {:?} does not match its {:?} parser",
            spec.name, spec.default, spec.parser
        )));
    }
    Ok(())
}
