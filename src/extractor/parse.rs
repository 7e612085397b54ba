//! Raw text → typed value parsers
//!
//! Parsers are pure and total over their input: a failure is reported as
//! [`ParseFailure`] and the caller substitutes the field default.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::FieldValue;

/// How a raw node value becomes a [`FieldValue`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Parser {
    /// Trimmed text
    #[default]
    Text,
    /// Digits only, e.g. `"1,234 listeners"` → `1234`
    Count,
    /// Trimmed text with a leading label removed
    StripPrefix { prefix: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure(pub String);

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Parser {
    pub fn parse(&self, raw: &str) -> Result<FieldValue, ParseFailure> {
        match self {
            Parser::Text => Ok(FieldValue::Text(raw.trim().to_string())),
            Parser::Count => parse_count(raw).map(FieldValue::Count),
            Parser::StripPrefix { prefix } => {
                let trimmed = raw.trim();
                let stripped = trimmed.strip_prefix(prefix.as_str()).unwrap_or(trimmed);
                Ok(FieldValue::Text(stripped.trim().to_string()))
            }
        }
    }

    /// Whether this parser yields counts rather than text.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Parser::Count)
    }
}

/// Strip every non-digit and read the rest as an integer.
///
/// A string without digits is zero. Overflowing `u64` is a failure.
pub fn parse_count(raw: &str) -> Result<u64, ParseFailure> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Ok(0);
    }
    digits
        .parse::<u64>()
        .map_err(|e| ParseFailure(format!("{:?} is not a representable count: {}", raw, e)))
}
