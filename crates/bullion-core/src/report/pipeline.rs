//! The report pipeline: one document in, one record or skip reason out.

use std::collections::HashSet;
use std::fmt;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::assembler::RecordAssembler;
use super::open_interest::extract_open_interest;
use super::rules::{DateResolver, DateSource, DateStrategy, RowExtractor};
use crate::error::ConfigError;
use crate::layout::WordReconstructor;
use crate::models::config::LayoutConfig;
use crate::models::record::{CalendarKey, ExtractionRecord, FieldValues, SourceDocument};
use crate::models::report::{ExtractionMode, ReportConfig};
use crate::pdf::PdfProcessor;

/// Why a document produced no record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The document has no text at all.
    NoText,
    /// The report section marker is missing, even after reconstruction.
    MarkerAbsent,
    /// No primary field could be extracted.
    FieldsMissing,
    /// No calendar key could be found.
    DateUnresolved,
    /// The document could not be read.
    Unreadable(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoText => f.write_str("no text"),
            SkipReason::MarkerAbsent => f.write_str("report section not found"),
            SkipReason::FieldsMissing => f.write_str("values not parsed"),
            SkipReason::DateUnresolved => f.write_str("could not determine date"),
            SkipReason::Unreadable(reason) => write!(f, "unreadable: {}", reason),
        }
    }
}

/// Result of processing one document.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Record(ExtractionRecord),
    Skipped(SkipReason),
}

impl Outcome {
    pub fn record(self) -> Option<ExtractionRecord> {
        match self {
            Outcome::Record(record) => Some(record),
            Outcome::Skipped(_) => None,
        }
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            Outcome::Record(_) => None,
            Outcome::Skipped(reason) => Some(reason),
        }
    }
}

/// Records after de-duplication and ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Finalized {
    /// One record per calendar key, ascending.
    pub records: Vec<ExtractionRecord>,
    /// Later records whose key was already taken.
    pub duplicates: Vec<ExtractionRecord>,
}

/// Keep the first record seen for each key, then sort ascending by key.
pub fn finalize(records: impl IntoIterator<Item = ExtractionRecord>) -> Finalized {
    let mut seen = HashSet::new();
    let mut finalized = Finalized::default();

    for record in records {
        if seen.insert(record.key()) {
            finalized.records.push(record);
        } else {
            warn!("duplicate {} from {}, keeping the first", record.key(), record.source_url());
            finalized.duplicates.push(record);
        }
    }

    finalized.records.sort_by_key(ExtractionRecord::key);
    finalized
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub discovered: usize,
    pub processed: usize,
    pub skipped: usize,
    pub duplicates: usize,
    pub written: usize,
}

impl RunSummary {
    pub fn new(discovered: usize) -> Self {
        Self {
            discovered,
            ..Self::default()
        }
    }

    /// Count one document outcome.
    pub fn observe(&mut self, outcome: &Outcome) {
        self.processed += 1;
        if outcome.skip_reason().is_some() {
            self.skipped += 1;
        }
    }

    /// Count a document that failed before reaching the pipeline.
    pub fn observe_failure(&mut self) {
        self.processed += 1;
        self.skipped += 1;
    }

    pub fn finish(&mut self, finalized: &Finalized) {
        self.duplicates = finalized.duplicates.len();
        self.written = finalized.records.len();
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "discovered {}, processed {}, skipped {}, duplicates {}, written {}",
            self.discovered, self.processed, self.skipped, self.duplicates, self.written
        )
    }
}

/// Runs one report configuration over documents.
#[derive(Debug, Clone)]
pub struct ReportPipeline {
    config: ReportConfig,
    reconstructor: WordReconstructor,
    rows: Option<RowExtractor>,
    dates: DateResolver,
    assembler: RecordAssembler,
}

impl ReportPipeline {
    /// Validate and compile a report configuration.
    pub fn new(config: ReportConfig, layout: &LayoutConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let rows = match &config.extraction {
            ExtractionMode::Labels {
                specs,
                number_pattern,
                section,
            } => Some(RowExtractor::new(specs, number_pattern)?.with_section(section.clone())),
            ExtractionMode::OpenInterest(_) => None,
        };

        Ok(Self {
            reconstructor: WordReconstructor::from_config(layout)?,
            rows,
            dates: DateResolver::new(&config.months, config.date_strategies.clone())?,
            assembler: RecordAssembler::new(
                config.primary_fields.clone(),
                config.derived_fields.clone(),
            )?,
            config,
        })
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Extract a record from a loaded PDF.
    ///
    /// When the marker is missing from the native text, every page is rebuilt
    /// from positioned glyphs and the rebuilt text is used if it has the marker.
    pub fn process_pdf(&self, doc: &SourceDocument, pdf: &dyn PdfProcessor) -> Outcome {
        let native = match pdf.extract_text() {
            Ok(text) => text,
            Err(e) if self.config.marker.is_some() => {
                warn!("native text extraction failed for {}: {}", doc.url, e);
                String::new()
            }
            Err(e) => return self.skip(doc, SkipReason::Unreadable(e.to_string())),
        };

        let text = match self.config.marker.as_deref() {
            Some(marker) if !native.contains(marker) => {
                debug!("marker {:?} not in native text of {}, rebuilding from glyphs", marker, doc.url);
                let rebuilt = self.reconstructed_text(pdf);
                if rebuilt.contains(marker) {
                    rebuilt
                } else if native.trim().is_empty() && rebuilt.trim().is_empty() {
                    return self.skip(doc, SkipReason::NoText);
                } else {
                    return self.skip(doc, SkipReason::MarkerAbsent);
                }
            }
            _ => native,
        };

        self.process_text(doc, &text)
    }

    /// Extract a record from already extracted text.
    pub fn process_text(&self, doc: &SourceDocument, text: &str) -> Outcome {
        let Some(rows) = &self.rows else {
            return self.skip(doc, SkipReason::Unreadable(format!("{} is not a text report", self.config.name)));
        };
        if text.trim().is_empty() {
            return self.skip(doc, SkipReason::NoText);
        }
        if let Some(marker) = self.config.marker.as_deref() {
            if !text.contains(marker) {
                return self.skip(doc, SkipReason::MarkerAbsent);
            }
        }

        let fields = rows.extract(text);
        for row in fields.rows() {
            debug!("{}: {} bound {:?} via {:?}", doc.url, row.label, row.values, row.strategy);
        }
        if !self.assembler.has_primary(fields.values()) {
            return self.skip(doc, SkipReason::FieldsMissing);
        }

        let key = self.resolve_key(doc, text);
        self.assemble(doc, fields.into_values(), key)
    }

    /// Extract a record from one day of a JSON trading data feed.
    pub fn process_json(&self, doc: &SourceDocument, payload: &Value, key: CalendarKey) -> Outcome {
        let ExtractionMode::OpenInterest(spec) = &self.config.extraction else {
            return self.skip(doc, SkipReason::Unreadable(format!("{} is not a JSON report", self.config.name)));
        };

        match extract_open_interest(payload, spec) {
            Ok(Some(total)) => {
                let mut fields = FieldValues::new();
                fields.insert(spec.field.clone(), total);
                self.assemble(doc, fields, Some(key))
            }
            // Non-trading days have no rows; not worth a warning.
            Ok(None) => {
                debug!("no {} rows in {}", spec.product_id, doc.url);
                Outcome::Skipped(SkipReason::FieldsMissing)
            }
            Err(e) => self.skip(doc, SkipReason::Unreadable(e.to_string())),
        }
    }

    /// Week parsed during discovery first, then URL, title and body.
    fn resolve_key(&self, doc: &SourceDocument, body: &str) -> Option<CalendarKey> {
        if self.config.date_strategies.contains(&DateStrategy::WeekRange) {
            if let Some(key) = doc.week.and_then(|(start, end)| CalendarKey::week(start, end)) {
                return Some(key);
            }
        }

        let mut sources = vec![DateSource::Url(&doc.url)];
        if let Some(title) = doc.title.as_deref() {
            sources.push(DateSource::Text(title));
        }
        sources.push(DateSource::Text(body));

        self.dates.resolve(&sources)
    }

    fn assemble(&self, doc: &SourceDocument, fields: FieldValues, key: Option<CalendarKey>) -> Outcome {
        if key.is_none() {
            return self.skip(doc, SkipReason::DateUnresolved);
        }
        match self.assembler.assemble(fields, key, doc.clone()) {
            Some(record) => {
                info!("{} {} from {}", self.config.name, record.key(), doc.url);
                Outcome::Record(record)
            }
            None => self.skip(doc, SkipReason::FieldsMissing),
        }
    }

    fn reconstructed_text(&self, pdf: &dyn PdfProcessor) -> String {
        let mut pages = Vec::new();
        for page in 1..=pdf.page_count() {
            match pdf.extract_fragments(page) {
                Ok(fragments) => pages.push(self.reconstructor.page_text(&fragments)),
                Err(e) => warn!("page {}: {}", page, e),
            }
        }
        pages.join("\n")
    }

    fn skip(&self, doc: &SourceDocument, reason: SkipReason) -> Outcome {
        warn!("skipped {}: {}", doc.url, reason);
        Outcome::Skipped(reason)
    }
}
