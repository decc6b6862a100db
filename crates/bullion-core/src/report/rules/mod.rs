//! Rule-based extractors for report text.

pub mod dates;
pub mod labels;
pub mod numbers;
pub mod patterns;

pub use dates::{parse_week_range, DateResolver, DateSource, DateStrategy, MonthVocabulary, WeekRangeExtractor};
pub use labels::{ExtractedFields, LabelSpec, MatchStrategy, NumericRow, RowExtractor, SectionScope};
pub use numbers::{normalize_whitespace, parse_number, NumberExtractor};

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the first occurrence of the field from text.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Extract all occurrences of the field.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}

/// A value found in text, with where it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionMatch<T> {
    /// Extracted value.
    pub value: T,
    /// Byte range in the source text.
    pub position: Option<(usize, usize)>,
    /// Source text that was matched.
    pub source: String,
}

impl<T> ExtractionMatch<T> {
    pub fn new(value: T, source: impl Into<String>) -> Self {
        Self {
            value,
            position: None,
            source: source.into(),
        }
    }

    pub fn with_position(mut self, start: usize, end: usize) -> Self {
        self.position = Some((start, end));
        self
    }
}
