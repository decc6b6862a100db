//! Calendar keys, source documents and extraction records.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Named numeric fields; a missing key means the field is absent.
pub type FieldValues = BTreeMap<String, f64>;

/// The calendar period a report covers.
///
/// Ordering is chronological within a variant, which is all the pipeline
/// needs since one report type only ever produces one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalendarKey {
    /// A calendar month.
    Month { year: i32, month: u32 },
    /// A reporting week, both ends inclusive.
    Week { start: NaiveDate, end: NaiveDate },
    /// A single trading day.
    Day { date: NaiveDate },
}

impl CalendarKey {
    /// A month key; `None` unless the year has four digits and the month is 1-12.
    pub fn month(year: i32, month: u32) -> Option<Self> {
        if (1000..=9999).contains(&year) && (1..=12).contains(&month) {
            Some(CalendarKey::Month { year, month })
        } else {
            None
        }
    }

    /// A week key; `None` when the week ends before it starts.
    pub fn week(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (end >= start).then_some(CalendarKey::Week { start, end })
    }

    /// A trading-day key.
    pub fn day(date: NaiveDate) -> Self {
        CalendarKey::Day { date }
    }

    /// Calendar year of the period (the start year for weeks).
    pub fn year(&self) -> i32 {
        use chrono::Datelike;
        match self {
            CalendarKey::Month { year, .. } => *year,
            CalendarKey::Week { start, .. } => start.year(),
            CalendarKey::Day { date } => date.year(),
        }
    }

    /// Calendar month of the period (the start month for weeks).
    pub fn month_number(&self) -> u32 {
        use chrono::Datelike;
        match self {
            CalendarKey::Month { month, .. } => *month,
            CalendarKey::Week { start, .. } => start.month(),
            CalendarKey::Day { date } => date.month(),
        }
    }

    /// Week bounds, if this is a week key.
    pub fn week_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        match self {
            CalendarKey::Week { start, end } => Some((*start, *end)),
            _ => None,
        }
    }
}

impl fmt::Display for CalendarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalendarKey::Month { year, month } => write!(f, "{}-{:02}", year, month),
            CalendarKey::Week { start, end } => {
                write!(f, "{}-{}", start.format("%Y%m%d"), end.format("%Y%m%d"))
            }
            CalendarKey::Day { date } => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

/// A document handed over by link discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Absolute document URL.
    pub url: String,
    /// Link title as shown on the listing page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Listing page the link was found on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_page: Option<String>,
    /// Week range already parsed from the title or URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week: Option<(NaiveDate, NaiveDate)>,
    /// Local copy of the downloaded document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_path: Option<PathBuf>,
}

impl SourceDocument {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            source_page: None,
            week: None,
            cached_path: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_source_page(mut self, page: impl Into<String>) -> Self {
        self.source_page = Some(page.into());
        self
    }

    pub fn with_week(mut self, week: Option<(NaiveDate, NaiveDate)>) -> Self {
        self.week = week;
        self
    }

    pub fn with_cached_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cached_path = Some(path.into());
        self
    }
}

/// The final, immutable unit of output.
///
/// Only [`RecordAssembler`](crate::report::RecordAssembler) builds these,
/// and only when a calendar key and at least one primary field are present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionRecord {
    key: CalendarKey,
    fields: FieldValues,
    source: SourceDocument,
}

impl ExtractionRecord {
    pub(crate) fn new(key: CalendarKey, fields: FieldValues, source: SourceDocument) -> Self {
        Self { key, fields, source }
    }

    pub fn key(&self) -> CalendarKey {
        self.key
    }

    /// Value of a named field, `None` if absent.
    pub fn field(&self, name: &str) -> Option<f64> {
        self.fields.get(name).copied()
    }

    pub fn fields(&self) -> &FieldValues {
        &self.fields
    }

    pub fn source(&self) -> &SourceDocument {
        &self.source
    }

    pub fn source_url(&self) -> &str {
        &self.source.url
    }

    pub fn title(&self) -> Option<&str> {
        self.source.title.as_deref()
    }

    pub fn source_page(&self) -> Option<&str> {
        self.source.source_page.as_deref()
    }

    pub fn cached_path(&self) -> Option<&Path> {
        self.source.cached_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_key_validation() {
        assert!(CalendarKey::month(2017, 11).is_some());
        assert!(CalendarKey::month(2017, 0).is_none());
        assert!(CalendarKey::month(2017, 13).is_none());
        assert!(CalendarKey::month(17, 5).is_none());
    }

    #[test]
    fn test_week_key_rejects_reversed_range() {
        assert!(CalendarKey::week(date(2024, 1, 7), date(2024, 1, 1)).is_none());
        assert!(CalendarKey::week(date(2024, 1, 1), date(2024, 1, 1)).is_some());
    }

    #[test]
    fn test_key_display() {
        assert_eq!(CalendarKey::month(2018, 3).unwrap().to_string(), "2018-03");
        assert_eq!(
            CalendarKey::week(date(2024, 1, 1), date(2024, 1, 7)).unwrap().to_string(),
            "20240101-20240107"
        );
        assert_eq!(CalendarKey::day(date(2024, 2, 5)).to_string(), "2024-02-05");
    }

    #[test]
    fn test_month_keys_sort_chronologically() {
        let mut keys = vec![
            CalendarKey::month(2018, 1).unwrap(),
            CalendarKey::month(2017, 12).unwrap(),
            CalendarKey::month(2017, 2).unwrap(),
        ];
        keys.sort();
        assert_eq!(keys[0], CalendarKey::month(2017, 2).unwrap());
        assert_eq!(keys[2], CalendarKey::month(2018, 1).unwrap());
    }
}
