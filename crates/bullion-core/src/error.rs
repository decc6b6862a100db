//! Error types for the bullion-core library.

use thiserror::Error;

/// Main error type for the bullion library.
#[derive(Error, Debug)]
pub enum BullionError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Invalid report or layout configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Field extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// Failed to decode a page content stream.
    #[error("failed to decode content stream of page {page}: {reason}")]
    Content { page: u32, reason: String },

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),
}

/// Contract violations in report configuration.
///
/// These are raised when a pipeline is built, never per document.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A label or numeric pattern failed to compile.
    #[error("invalid pattern {pattern:?}: {reason}")]
    Pattern { pattern: String, reason: String },

    /// A label spec is malformed.
    #[error("invalid label spec {label:?}: {reason}")]
    LabelSpec { label: String, reason: String },

    /// The month vocabulary is empty or maps outside 1-12.
    #[error("invalid month vocabulary: {0}")]
    Vocabulary(String),

    /// Layout tuning values are out of range.
    #[error("invalid layout setting {name}: {value}")]
    Layout { name: &'static str, value: f32 },

    /// Anything else that makes a report configuration unusable.
    #[error("{0}")]
    Invalid(String),
}

/// Errors related to field extraction.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The document payload has an unexpected shape.
    #[error("unexpected payload: {0}")]
    Payload(String),

    /// Failed to parse a value.
    #[error("failed to parse {field}: {value}")]
    Parse { field: String, value: String },
}

impl ConfigError {
    pub(crate) fn pattern(pattern: &str, err: regex::Error) -> Self {
        ConfigError::Pattern {
            pattern: pattern.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Result type for the bullion library.
pub type Result<T> = std::result::Result<T, BullionError>;
