//! Label-anchored numeric row extraction.
//!
//! A report row is found by its label and the numbers on the same line.
//! When line structure is lost (wrapped table cells), the whole text is
//! collapsed and searched once more for the label followed directly by its
//! numbers.

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::numbers::{normalize_whitespace, parse_number, NumberExtractor};
use crate::error::ConfigError;
use crate::models::record::FieldValues;

/// A label to search for and the numeric fields expected after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSpec {
    /// Human-readable name used in logs and rows.
    pub label: String,
    /// Regex matching the label, case-insensitive.
    pub pattern: String,
    /// Field names bound in order to the first numbers on the label's line.
    pub fields: Vec<String>,
    /// Numbers required on the line; defaults to the number of fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_values: Option<usize>,
    /// Only match the label at the start of a line.
    #[serde(default)]
    pub line_start: bool,
}

impl LabelSpec {
    pub fn new<I, S>(label: impl Into<String>, pattern: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            label: label.into(),
            pattern: pattern.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            min_values: None,
            line_start: false,
        }
    }

    pub fn with_min_values(mut self, min_values: usize) -> Self {
        self.min_values = Some(min_values);
        self
    }

    pub fn at_line_start(mut self) -> Self {
        self.line_start = true;
        self
    }

    /// Numbers that must follow the label for a line to bind.
    pub fn required_values(&self) -> usize {
        self.min_values.unwrap_or(self.fields.len())
    }

    fn invalid(&self, reason: impl Into<String>) -> ConfigError {
        ConfigError::LabelSpec {
            label: self.label.clone(),
            reason: reason.into(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pattern.is_empty() {
            return Err(self.invalid("empty label pattern"));
        }
        if self.fields.is_empty() {
            return Err(self.invalid("no fields to bind"));
        }
        if self.required_values() < self.fields.len() {
            return Err(self.invalid(format!(
                "min_values {} is less than the {} bound fields",
                self.required_values(),
                self.fields.len()
            )));
        }
        if self.fields.iter().any(|f| f.trim().is_empty()) {
            return Err(self.invalid("blank field name"));
        }
        Ok(())
    }
}

/// Restricts the search to a window of text after a section heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionScope {
    /// Heading that starts the section.
    pub marker: String,
    /// Characters searched from the heading onward.
    pub window_chars: usize,
}

impl SectionScope {
    pub fn new(marker: impl Into<String>, window_chars: usize) -> Self {
        Self {
            marker: marker.into(),
            window_chars,
        }
    }

    /// The window after the marker, or the whole text if the marker is absent.
    pub fn apply<'t>(&self, text: &'t str) -> &'t str {
        let Some(start) = text.find(&self.marker) else {
            return text;
        };
        let rest = &text[start..];
        let end = rest
            .char_indices()
            .nth(self.window_chars)
            .map_or(rest.len(), |(i, _)| i);
        &rest[..end]
    }
}

/// Which pass produced a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Label and numbers found on one normalized line.
    LineScan,
    /// Label and numbers found in the collapsed text.
    Collapsed,
}

/// A label with the numbers bound after it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericRow {
    pub label: String,
    pub values: Vec<f64>,
    pub strategy: MatchStrategy,
}

/// Result of running every label spec over a text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFields {
    values: FieldValues,
    rows: Vec<NumericRow>,
}

impl ExtractedFields {
    pub fn get(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied()
    }

    pub fn values(&self) -> &FieldValues {
        &self.values
    }

    pub fn into_values(self) -> FieldValues {
        self.values
    }

    pub fn rows(&self) -> &[NumericRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn bind(&mut self, fields: &[String], row: NumericRow) {
        for (field, value) in fields.iter().zip(&row.values) {
            self.values.insert(field.clone(), *value);
        }
        self.rows.push(row);
    }
}

#[derive(Debug, Clone)]
struct CompiledLabel {
    spec: LabelSpec,
    label: Regex,
    collapsed: Regex,
}

impl CompiledLabel {
    fn compile(spec: &LabelSpec, number_pattern: &str) -> Result<Self, ConfigError> {
        let anchor = if spec.line_start { "^" } else { "" };
        let label_source = format!("(?i){}(?:{})", anchor, spec.pattern);
        let label = Regex::new(&label_source).map_err(|e| ConfigError::pattern(&spec.pattern, e))?;
        if label.is_match("") {
            return Err(spec.invalid("label pattern matches the empty string"));
        }

        // In collapsed text a line start can only be recovered as "preceded by space".
        let prefix = if spec.line_start { r"(?:^|\s)" } else { "" };
        let numbers = (0..spec.required_values())
            .map(|i| format!(r"(?P<v{}>(?:{}))", i, number_pattern))
            .collect::<Vec<_>>()
            .join(r"\s+");
        let collapsed_source = format!(r"(?i){}(?:{})\s*{}", prefix, spec.pattern, numbers);
        let collapsed =
            Regex::new(&collapsed_source).map_err(|e| ConfigError::pattern(&collapsed_source, e))?;

        Ok(Self {
            spec: spec.clone(),
            label,
            collapsed,
        })
    }

    fn row(&self, tokens: &[&str], strategy: MatchStrategy) -> Option<NumericRow> {
        let values = tokens
            .iter()
            .take(self.spec.fields.len())
            .map(|t| parse_number(t))
            .collect::<Option<Vec<f64>>>()?;

        Some(NumericRow {
            label: self.spec.label.clone(),
            values,
            strategy,
        })
    }

    fn scan_lines(&self, lines: &[String], numbers: &NumberExtractor) -> Option<NumericRow> {
        lines.iter().find_map(|line| {
            if !self.label.is_match(line) {
                return None;
            }
            // Numbers anywhere on the line count and bind from its start.
            let tokens = numbers.tokens(line);
            trace!("label {:?} on line {:?}, {} numbers", self.spec.label, line, tokens.len());
            if tokens.len() < self.spec.required_values() {
                return None;
            }
            self.row(&tokens, MatchStrategy::LineScan)
        })
    }

    fn scan_collapsed(&self, collapsed: &str) -> Option<NumericRow> {
        let caps = self.collapsed.captures(collapsed)?;
        let tokens = (0..self.spec.fields.len())
            .map(|i| caps.name(&format!("v{}", i)).map(|m| m.as_str()))
            .collect::<Option<Vec<&str>>>()?;
        self.row(&tokens, MatchStrategy::Collapsed)
    }
}

/// Extracts labelled numeric rows from page text.
#[derive(Debug, Clone)]
pub struct RowExtractor {
    labels: Vec<CompiledLabel>,
    numbers: NumberExtractor,
    section: Option<SectionScope>,
}

impl RowExtractor {
    /// Compile label specs against a numeric token pattern.
    ///
    /// Fails on empty field lists, `min_values` below the field count,
    /// field names bound by more than one spec, or patterns that do not compile.
    pub fn new(specs: &[LabelSpec], number_pattern: &str) -> Result<Self, ConfigError> {
        if specs.is_empty() {
            return Err(ConfigError::Invalid("no label specs configured".to_string()));
        }

        let numbers = NumberExtractor::with_pattern(number_pattern)?;
        let mut bound = HashSet::new();
        let mut labels = Vec::with_capacity(specs.len());

        for spec in specs {
            spec.validate()?;
            for field in &spec.fields {
                if !bound.insert(field.as_str()) {
                    return Err(spec.invalid(format!("field {:?} is bound more than once", field)));
                }
            }
            labels.push(CompiledLabel::compile(spec, number_pattern)?);
        }

        Ok(Self {
            labels,
            numbers,
            section: None,
        })
    }

    /// Only search the window after a section heading when it is present.
    pub fn with_section(mut self, section: Option<SectionScope>) -> Self {
        self.section = section;
        self
    }

    /// Run every label spec over `text`.
    ///
    /// Labels that are missing, or not followed by enough numbers, leave
    /// their fields absent.
    pub fn extract(&self, text: &str) -> ExtractedFields {
        let scoped = match &self.section {
            Some(section) => section.apply(text),
            None => text,
        };

        let lines: Vec<String> = scoped.lines().map(normalize_whitespace).collect();
        let mut collapsed: Option<String> = None;
        let mut fields = ExtractedFields::default();

        for label in &self.labels {
            let row = label.scan_lines(&lines, &self.numbers).or_else(|| {
                let text = collapsed.get_or_insert_with(|| normalize_whitespace(scoped));
                label.scan_collapsed(text)
            });

            match row {
                Some(row) => fields.bind(&label.spec.fields, row),
                None => debug!("label {:?} not found", label.spec.label),
            }
        }

        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::rules::patterns::{SIGNED_NUMBER_PATTERN, UNSIGNED_NUMBER_PATTERN};
    use pretty_assertions::assert_eq;

    fn monthly_extractor() -> RowExtractor {
        RowExtractor::new(
            &[
                LabelSpec::new(
                    "present month",
                    r"Withdrawal Volume\s*\(Present Month\)",
                    ["gold", "silver"],
                ),
                LabelSpec::new(
                    "accumulative total",
                    r"Withdrawal Volume\s*\(Accumulative Total\)",
                    ["gold_ytd", "silver_ytd"],
                ),
            ],
            UNSIGNED_NUMBER_PATTERN,
        )
        .unwrap()
    }

    fn weekly_extractor() -> RowExtractor {
        RowExtractor::new(
            &[LabelSpec::new("silver", r"白银\s", ["last", "change", "now"]).at_line_start()],
            SIGNED_NUMBER_PATTERN,
        )
        .unwrap()
        .with_section(Some(SectionScope::new("上交所交收库白银库存周度数据", 3000)))
    }

    #[test]
    fn test_line_scan_binds_in_order() {
        let text = "Report\nWithdrawal  Volume (Present Month)   125,781.40   321,660.00\n\
                    Withdrawal Volume (Accumulative Total) 1,381,000.5 3,100,200";
        let fields = monthly_extractor().extract(text);

        assert_eq!(fields.get("gold"), Some(125781.40));
        assert_eq!(fields.get("silver"), Some(321660.0));
        assert_eq!(fields.get("gold_ytd"), Some(1381000.5));
        assert_eq!(fields.get("silver_ytd"), Some(3100200.0));
        assert_eq!(fields.rows()[0].strategy, MatchStrategy::LineScan);
    }

    #[test]
    fn test_numbers_before_label_count_toward_row() {
        let text = "7 Withdrawal Volume (Present Month) 125,781.40";
        let fields = monthly_extractor().extract(text);

        assert_eq!(fields.get("gold"), Some(7.0));
        assert_eq!(fields.get("silver"), Some(125781.40));
        assert_eq!(fields.rows()[0].strategy, MatchStrategy::LineScan);
    }

    #[test]
    fn test_label_is_case_insensitive() {
        let fields = monthly_extractor().extract("WITHDRAWAL VOLUME (PRESENT MONTH) 1 2");
        assert_eq!(fields.get("gold"), Some(1.0));
        assert_eq!(fields.get("silver"), Some(2.0));
    }

    #[test]
    fn test_label_without_numbers_leaves_fields_absent() {
        let fields = monthly_extractor().extract("Withdrawal Volume (Present Month)\nsee appendix");
        assert!(fields.is_empty());
        assert_eq!(fields.get("gold"), None);
    }

    #[test]
    fn test_too_few_numbers_is_all_or_nothing() {
        let fields = monthly_extractor().extract("Withdrawal Volume (Present Month) 125,781.40");
        assert_eq!(fields.get("gold"), None);
        assert_eq!(fields.get("silver"), None);
    }

    #[test]
    fn test_collapsed_fallback_for_wrapped_rows() {
        let text = "Withdrawal Volume\n(Present Month)\n125,781.40\n321,660.00";
        let fields = monthly_extractor().extract(text);

        assert_eq!(fields.get("gold"), Some(125781.40));
        assert_eq!(fields.get("silver"), Some(321660.0));
        assert_eq!(fields.rows()[0].strategy, MatchStrategy::Collapsed);
    }

    #[test]
    fn test_first_binding_line_wins() {
        let text = "Withdrawal Volume (Present Month) 1 2\nWithdrawal Volume (Present Month) 3 4";
        let fields = monthly_extractor().extract(text);
        assert_eq!(fields.get("gold"), Some(1.0));
    }

    #[test]
    fn test_weekly_row_keeps_sign() {
        let text = "上交所交收库白银库存周度数据\n品种 上周库存 增减 本周库存\n白银 12345.6 +10.2 12355.8";
        let fields = weekly_extractor().extract(text);

        assert_eq!(fields.get("last"), Some(12345.6));
        assert_eq!(fields.get("change"), Some(10.2));
        assert_eq!(fields.get("now"), Some(12355.8));
    }

    #[test]
    fn test_weekly_label_must_start_line() {
        let fields = weekly_extractor().extract("黄金白银 1 2 3");
        assert!(fields.is_empty());
    }

    #[test]
    fn test_weekly_collapsed_fallback() {
        let text = "上交所交收库白银库存周度数据 白银\n1,234\n-5\n1,229";
        let fields = weekly_extractor().extract(text);

        assert_eq!(fields.get("last"), Some(1234.0));
        assert_eq!(fields.get("change"), Some(-5.0));
        assert_eq!(fields.get("now"), Some(1229.0));
    }

    #[test]
    fn test_section_window_limits_search() {
        let mut text = String::from("上交所交收库白银库存周度数据\n");
        text.push_str(&"x".repeat(4000));
        text.push_str("\n白银 1 2 3");

        assert!(weekly_extractor().extract(&text).is_empty());
    }

    #[test]
    fn test_section_absent_searches_whole_text() {
        let fields = weekly_extractor().extract("白银 1 -2 3");
        assert_eq!(fields.get("change"), Some(-2.0));
    }

    #[test]
    fn test_section_window_counts_chars() {
        let scope = SectionScope::new("库存", 3);
        assert_eq!(scope.apply("白银库存周度数据"), "库存周");
        assert_eq!(scope.apply("no marker"), "no marker");
    }

    #[test]
    fn test_malformed_specs_rejected() {
        let empty = LabelSpec::new("x", "x", Vec::<String>::new());
        assert!(matches!(
            RowExtractor::new(&[empty], SIGNED_NUMBER_PATTERN),
            Err(ConfigError::LabelSpec { .. })
        ));

        let short = LabelSpec::new("x", "x", ["a", "b"]).with_min_values(1);
        assert!(RowExtractor::new(&[short], SIGNED_NUMBER_PATTERN).is_err());

        let bad_regex = LabelSpec::new("x", "(x", ["a"]);
        assert!(matches!(
            RowExtractor::new(&[bad_regex], SIGNED_NUMBER_PATTERN),
            Err(ConfigError::Pattern { .. })
        ));

        let dup = [LabelSpec::new("x", "x", ["a"]), LabelSpec::new("y", "y", ["a"])];
        assert!(RowExtractor::new(&dup, SIGNED_NUMBER_PATTERN).is_err());

        assert!(RowExtractor::new(&[], SIGNED_NUMBER_PATTERN).is_err());
    }

    #[test]
    fn test_min_values_above_field_count() {
        let extractor = RowExtractor::new(
            &[LabelSpec::new("total", "total", ["first"]).with_min_values(2)],
            SIGNED_NUMBER_PATTERN,
        )
        .unwrap();

        assert_eq!(extractor.extract("total 5").get("first"), None);
        assert_eq!(extractor.extract("total 5 6").get("first"), Some(5.0));
    }

    #[test]
    fn test_specs_do_not_share_state() {
        let a = RowExtractor::new(&[LabelSpec::new("a", "alpha", ["v"])], SIGNED_NUMBER_PATTERN).unwrap();
        let b = RowExtractor::new(&[LabelSpec::new("b", "beta", ["v"])], SIGNED_NUMBER_PATTERN).unwrap();
        let text = "alpha 1\nbeta 2";

        assert_eq!(a.extract(text).get("v"), Some(1.0));
        assert_eq!(b.extract(text).get("v"), Some(2.0));
    }
}
