//! Calendar key resolution from URLs, titles and body text.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::patterns::{FILENAME_MONTH, WEEK_RANGE};
use super::{ExtractionMatch, FieldExtractor};
use crate::error::ConfigError;
use crate::models::record::CalendarKey;

/// Case-insensitive month name to month number map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonthVocabulary {
    names: BTreeMap<String, u32>,
}

impl MonthVocabulary {
    /// Full English month names and their common abbreviations.
    pub fn english() -> Self {
        let names = [
            ("january", 1),
            ("february", 2),
            ("march", 3),
            ("april", 4),
            ("may", 5),
            ("june", 6),
            ("july", 7),
            ("august", 8),
            ("september", 9),
            ("october", 10),
            ("november", 11),
            ("december", 12),
            ("jan", 1),
            ("feb", 2),
            ("mar", 3),
            ("apr", 4),
            ("jun", 6),
            ("jul", 7),
            ("aug", 8),
            ("sep", 9),
            ("sept", 9),
            ("oct", 10),
            ("nov", 11),
            ("dec", 12),
        ]
        .into_iter()
        .map(|(name, month)| (name.to_string(), month))
        .collect();

        Self { names }
    }

    /// Build a vocabulary from name/month pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let vocabulary = Self {
            names: pairs
                .into_iter()
                .map(|(name, month)| (name.into().to_lowercase(), month))
                .collect(),
        };
        vocabulary.validate()?;
        Ok(vocabulary)
    }

    /// Reject empty vocabularies, blank names and months outside 1-12.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.names.is_empty() {
            return Err(ConfigError::Vocabulary("no month names".to_string()));
        }
        for (name, month) in &self.names {
            if name.trim().is_empty() {
                return Err(ConfigError::Vocabulary("blank month name".to_string()));
            }
            if !(1..=12).contains(month) {
                return Err(ConfigError::Vocabulary(format!(
                    "{:?} maps to month {}",
                    name, month
                )));
            }
        }
        Ok(())
    }

    /// Month number for a name, ignoring case.
    pub fn lookup(&self, name: &str) -> Option<u32> {
        let name = name.to_lowercase();
        self.names
            .iter()
            .find(|(known, _)| known.to_lowercase() == name)
            .map(|(_, month)| *month)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Regex alternation of all names, longest first.
    fn alternation(&self) -> String {
        let mut names: Vec<&str> = self.names.keys().map(String::as_str).collect();
        names.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
        names
            .into_iter()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|")
    }
}

impl Default for MonthVocabulary {
    fn default() -> Self {
        Self::english()
    }
}

/// One way of finding a calendar key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateStrategy {
    /// `--<Month>, <YYYY>.pdf` in a URL's file name.
    FilenameMonth,
    /// `<Month> <YYYY>` anywhere in text.
    BodyMonth,
    /// `YYYYMMDD-YYYYMMDD` in a URL or text.
    WeekRange,
}

/// Where a date may come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource<'a> {
    Url(&'a str),
    Text(&'a str),
}

/// Finds `YYYYMMDD-YYYYMMDD` week ranges with valid, ordered dates.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeekRangeExtractor;

impl FieldExtractor for WeekRangeExtractor {
    type Output = ExtractionMatch<(NaiveDate, NaiveDate)>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        WEEK_RANGE
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let start = NaiveDate::parse_from_str(&caps[1], "%Y%m%d").ok()?;
                let end = NaiveDate::parse_from_str(&caps[2], "%Y%m%d").ok()?;
                (end >= start).then(|| {
                    ExtractionMatch::new((start, end), whole.as_str())
                        .with_position(whole.start(), whole.end())
                })
            })
            .collect()
    }
}

/// First valid week range in `text`.
pub fn parse_week_range(text: &str) -> Option<(NaiveDate, NaiveDate)> {
    WeekRangeExtractor.extract(text).map(|m| m.value)
}

/// Resolves a calendar key from an ordered list of sources.
#[derive(Debug, Clone)]
pub struct DateResolver {
    vocabulary: HashMap<String, u32>,
    strategies: Vec<DateStrategy>,
    body_month: Regex,
}

impl DateResolver {
    /// Compile the month patterns for a vocabulary.
    pub fn new(vocabulary: &MonthVocabulary, strategies: Vec<DateStrategy>) -> Result<Self, ConfigError> {
        vocabulary.validate()?;

        let pattern = format!(r"(?i)\b({})[,.\s]*(\d{{4}})\b", vocabulary.alternation());
        let body_month = Regex::new(&pattern).map_err(|e| ConfigError::pattern(&pattern, e))?;

        Ok(Self {
            vocabulary: vocabulary
                .names
                .iter()
                .map(|(name, month)| (name.to_lowercase(), *month))
                .collect(),
            strategies,
            body_month,
        })
    }

    /// Try each strategy in order over every applicable source; first hit wins.
    pub fn resolve(&self, sources: &[DateSource<'_>]) -> Option<CalendarKey> {
        for strategy in &self.strategies {
            for source in sources {
                if let Some(key) = self.apply(*strategy, *source) {
                    debug!("resolved {} via {:?}", key, strategy);
                    return Some(key);
                }
            }
        }
        trace!("no date found in {} sources", sources.len());
        None
    }

    fn apply(&self, strategy: DateStrategy, source: DateSource<'_>) -> Option<CalendarKey> {
        match (strategy, source) {
            (DateStrategy::FilenameMonth, DateSource::Url(url)) => self.filename_month(url),
            (DateStrategy::BodyMonth, DateSource::Text(text)) => self.body_month(text),
            (DateStrategy::WeekRange, DateSource::Url(s) | DateSource::Text(s)) => {
                parse_week_range(s).and_then(|(start, end)| CalendarKey::week(start, end))
            }
            _ => None,
        }
    }

    fn month_key(&self, name: &str, year: &str) -> Option<CalendarKey> {
        let month = *self.vocabulary.get(&name.to_lowercase())?;
        let year = year.parse().ok()?;
        CalendarKey::month(year, month)
    }

    fn filename_month(&self, url: &str) -> Option<CalendarKey> {
        let name = url_file_name(url);
        let caps = FILENAME_MONTH.captures(&name)?;
        self.month_key(&caps[1], &caps[2])
    }

    fn body_month(&self, text: &str) -> Option<CalendarKey> {
        self.body_month
            .captures_iter(text)
            .find_map(|caps| self.month_key(&caps[1], &caps[2]))
    }
}

/// Last path segment of a URL, query and fragment removed, percent-decoded.
fn url_file_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let name = path.rsplit('/').next().unwrap_or(path);
    match urlencoding::decode(name) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => name.to_string(),
    }
}
