//! Report configurations.
//!
//! Every supported report is one [`ReportConfig`] value run through the same
//! pipeline. Label patterns, number patterns and month names are data, so a
//! config can be loaded from JSON as well as built in code.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::schema::{Column, ColumnSource, OutputSchema};
use crate::error::ConfigError;
use crate::report::assembler::DerivedField;
use crate::report::open_interest::OpenInterestSpec;
use crate::report::rules::patterns::{SIGNED_NUMBER_PATTERN, UNSIGNED_NUMBER_PATTERN};
use crate::report::rules::{DateStrategy, LabelSpec, MonthVocabulary, SectionScope};

/// The built-in report types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportKind {
    /// SGE monthly data highlights: gold and silver withdrawals.
    SgeMonthly,
    /// SGE weekly report: silver inventory in exchange vaults.
    SgeWeekly,
    /// SHFE daily trading data: silver futures open interest.
    ShfeOpenInterest,
}

impl ReportKind {
    pub fn config(self) -> ReportConfig {
        match self {
            ReportKind::SgeMonthly => ReportConfig::sge_monthly(),
            ReportKind::SgeWeekly => ReportConfig::sge_weekly(),
            ReportKind::ShfeOpenInterest => ReportConfig::shfe_open_interest(),
        }
    }

    /// Stem of the default output file names.
    pub fn file_stem(self) -> &'static str {
        match self {
            ReportKind::SgeMonthly => "sge_monthly_withdrawals",
            ReportKind::SgeWeekly => "sge_silver_inventory",
            ReportKind::ShfeOpenInterest => "shfe_silver_open_interest",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReportKind::SgeMonthly => "sge-monthly",
            ReportKind::SgeWeekly => "sge-weekly",
            ReportKind::ShfeOpenInterest => "shfe-open-interest",
        };
        f.write_str(name)
    }
}

/// How numeric fields are read from a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Labelled rows in PDF text.
    Labels {
        specs: Vec<LabelSpec>,
        number_pattern: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        section: Option<SectionScope>,
    },
    /// Product totals in a JSON trading data feed.
    OpenInterest(OpenInterestSpec),
}

impl ExtractionMode {
    /// Fields this mode can produce.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            ExtractionMode::Labels { specs, .. } => specs
                .iter()
                .flat_map(|s| s.fields.iter().map(String::as_str))
                .collect(),
            ExtractionMode::OpenInterest(spec) => vec![spec.field.as_str()],
        }
    }
}

/// Everything that distinguishes one report type from another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    pub kind: ReportKind,
    /// Display name, also used as the table title.
    pub name: String,
    /// Text that must occur for the document to contain the report section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
    pub extraction: ExtractionMode,
    #[serde(default)]
    pub months: MonthVocabulary,
    #[serde(default)]
    pub date_strategies: Vec<DateStrategy>,
    /// At least one of these must be present for a record to be emitted.
    pub primary_fields: Vec<String>,
    #[serde(default)]
    pub derived_fields: Vec<DerivedField>,
    pub schema: OutputSchema,
}

impl ReportConfig {
    /// SGE monthly data highlights.
    pub fn sge_monthly() -> Self {
        Self {
            kind: ReportKind::SgeMonthly,
            name: "Monthly Withdrawals".to_string(),
            marker: Some("Withdrawal".to_string()),
            extraction: ExtractionMode::Labels {
                specs: vec![
                    LabelSpec::new(
                        "Withdrawal Volume (Present Month)",
                        r"Withdrawal Volume\s*\(Present Month\)",
                        ["gold_withdrawal_kg", "silver_withdrawal_kg"],
                    ),
                    LabelSpec::new(
                        "Withdrawal Volume (Accumulative Total)",
                        r"Withdrawal Volume\s*\(Accumulative Total\)",
                        ["gold_withdrawal_ytd_kg", "silver_withdrawal_ytd_kg"],
                    ),
                ],
                number_pattern: UNSIGNED_NUMBER_PATTERN.to_string(),
                section: None,
            },
            months: MonthVocabulary::english(),
            date_strategies: vec![DateStrategy::FilenameMonth, DateStrategy::BodyMonth],
            primary_fields: vec![
                "gold_withdrawal_kg".to_string(),
                "silver_withdrawal_kg".to_string(),
            ],
            derived_fields: Vec::new(),
            schema: OutputSchema::new(vec![
                Column::new("Date", ColumnSource::Date),
                Column::new("Year", ColumnSource::Year),
                Column::new("Month", ColumnSource::Month),
                Column::field("Gold Withdrawal (kg)", "gold_withdrawal_kg"),
                Column::field("Silver Withdrawal (kg)", "silver_withdrawal_kg"),
                Column::field("Gold Withdrawal YTD (kg)", "gold_withdrawal_ytd_kg"),
                Column::field("Silver Withdrawal YTD (kg)", "silver_withdrawal_ytd_kg"),
                Column::new("PDF URL", ColumnSource::SourceUrl),
            ]),
        }
    }

    /// SGE weekly silver inventory.
    pub fn sge_weekly() -> Self {
        Self {
            kind: ReportKind::SgeWeekly,
            name: "Silver Inventory".to_string(),
            marker: Some("白银".to_string()),
            extraction: ExtractionMode::Labels {
                specs: vec![LabelSpec::new(
                    "白银",
                    r"白银\s",
                    ["last_week_inventory", "weekly_change", "this_week_inventory"],
                )
                .at_line_start()],
                number_pattern: SIGNED_NUMBER_PATTERN.to_string(),
                section: Some(SectionScope::new("上交所交收库白银库存周度数据", 3000)),
            },
            months: MonthVocabulary::english(),
            date_strategies: vec![DateStrategy::WeekRange],
            primary_fields: vec![
                "last_week_inventory".to_string(),
                "weekly_change".to_string(),
                "this_week_inventory".to_string(),
            ],
            // Reported in kilograms already; kept as its own column for consumers.
            derived_fields: vec![DerivedField::new(
                "this_week_inventory_kilograms",
                "this_week_inventory",
                1.0,
            )],
            schema: OutputSchema::new(vec![
                Column::new("title", ColumnSource::Title),
                Column::new("pdf_url", ColumnSource::SourceUrl),
                Column::new("source_page", ColumnSource::SourcePage),
                Column::new("week_start", ColumnSource::WeekStart),
                Column::new("week_end", ColumnSource::WeekEnd),
                Column::field("last_week_inventory", "last_week_inventory"),
                Column::field("weekly_change", "weekly_change"),
                Column::field("this_week_inventory", "this_week_inventory"),
                Column::field("this_week_inventory_kilograms", "this_week_inventory_kilograms"),
                Column::new("pdf_path", ColumnSource::CachedPath),
            ]),
        }
    }

    /// SHFE daily silver open interest.
    pub fn shfe_open_interest() -> Self {
        let spec = OpenInterestSpec::silver();
        let field = spec.field.clone();

        Self {
            kind: ReportKind::ShfeOpenInterest,
            name: "Silver Open Interest".to_string(),
            marker: None,
            extraction: ExtractionMode::OpenInterest(spec),
            months: MonthVocabulary::english(),
            date_strategies: Vec::new(),
            primary_fields: vec![field.clone()],
            derived_fields: Vec::new(),
            schema: OutputSchema::new(vec![
                Column::new("trading_date", ColumnSource::Date),
                Column::field("silver_total_open_interest", field),
                Column::new("source", ColumnSource::SourceUrl),
            ]),
        }
    }

    /// Check that fields referenced anywhere are produced somewhere.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut produced: HashSet<&str> = self.extraction.fields().into_iter().collect();

        if self.primary_fields.is_empty() {
            return Err(ConfigError::Invalid(format!("{}: no primary fields", self.name)));
        }
        if let Some(field) = self.primary_fields.iter().find(|f| !produced.contains(f.as_str())) {
            return Err(ConfigError::Invalid(format!(
                "{}: primary field {:?} is never extracted",
                self.name, field
            )));
        }

        for derived in &self.derived_fields {
            if !produced.contains(derived.from.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "{}: derived field {:?} reads unknown field {:?}",
                    self.name, derived.name, derived.from
                )));
            }
            if !produced.insert(derived.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "{}: derived field {:?} shadows another field",
                    self.name, derived.name
                )));
            }
        }

        if let Some(field) = self.schema.field_names().find(|f| !produced.contains(f)) {
            return Err(ConfigError::Invalid(format!(
                "{}: column reads unknown field {:?}",
                self.name, field
            )));
        }

        if matches!(self.extraction, ExtractionMode::Labels { .. }) && self.date_strategies.is_empty() {
            return Err(ConfigError::Invalid(format!("{}: no date strategies", self.name)));
        }

        Ok(())
    }
}
