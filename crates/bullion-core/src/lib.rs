//! Core library for bullion market report extraction.
//!
//! This crate provides:
//! - PDF processing (native text and positioned glyphs)
//! - Word reconstruction from glyph positions
//! - Label-anchored numeric row extraction and date resolution
//! - Report configurations for SGE monthly and weekly reports and SHFE
//!   daily open interest, run through one generic pipeline

pub mod error;
pub mod layout;
pub mod models;
pub mod pdf;
pub mod report;

pub use error::{BullionError, Result};
pub use layout::{PositionedFragment, ReconstructedLine, WordReconstructor};
pub use models::{
    BullionConfig, CalendarKey, CellValue, ExtractionMode, ExtractionRecord, OutputSchema, ReportConfig,
    ReportKind, SchemaRow, SourceDocument,
};
pub use pdf::{PdfExtractor, PdfProcessor};
pub use report::{finalize, Finalized, Outcome, ReportPipeline, RunSummary, SkipReason};
