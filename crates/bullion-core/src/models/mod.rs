//! Data models for report extraction.

pub mod config;
pub mod record;
pub mod report;
pub mod schema;

pub use config::{BullionConfig, FetchConfig, LayoutConfig, OutputConfig, SourcesConfig};
pub use record::{CalendarKey, ExtractionRecord, FieldValues, SourceDocument};
pub use report::{ExtractionMode, ReportConfig, ReportKind};
pub use schema::{CellValue, Column, ColumnSource, OutputSchema, SchemaRow};
