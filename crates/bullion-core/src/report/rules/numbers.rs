//! Numeric token extraction and parsing.

use regex::Regex;

use crate::error::ConfigError;

/// Parse a numeric token, stripping `,` and `，` grouping.
///
/// Sign and decimals are preserved. Anything that is not a finite number
/// after stripping yields `None`.
pub fn parse_number(token: &str) -> Option<f64> {
    let cleaned: String = token
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '，')
        .collect();

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Collapse every whitespace run to one space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Finds numeric tokens with a configurable pattern.
#[derive(Debug, Clone)]
pub struct NumberExtractor {
    pattern: Regex,
}

impl NumberExtractor {
    /// Extractor using a custom pattern.
    pub fn with_pattern(pattern: &str) -> Result<Self, ConfigError> {
        let regex = Regex::new(pattern).map_err(|e| ConfigError::pattern(pattern, e))?;
        if regex.is_match("") {
            return Err(ConfigError::Pattern {
                pattern: pattern.to_string(),
                reason: "pattern matches the empty string".to_string(),
            });
        }
        Ok(Self { pattern: regex })
    }

    /// The pattern source.
    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }

    /// Raw numeric tokens in order of appearance.
    pub fn tokens<'t>(&self, text: &'t str) -> Vec<&'t str> {
        self.pattern.find_iter(text).map(|m| m.as_str()).collect()
    }
}
