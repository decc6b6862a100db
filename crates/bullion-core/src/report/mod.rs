//! Report extraction: rules, assembly and the pipeline that ties them together.

pub mod assembler;
pub mod open_interest;
pub mod pipeline;
pub mod rules;

pub use assembler::{DerivedField, RecordAssembler};
pub use open_interest::{extract_open_interest, OpenInterestSpec};
pub use pipeline::{finalize, Finalized, Outcome, ReportPipeline, RunSummary, SkipReason};
