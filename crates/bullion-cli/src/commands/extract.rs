//! Extract command - run a report over local files.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use console::style;
use glob::glob;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

use bullion_core::{
    CalendarKey, ExtractionMode, Outcome, ReportConfig, ReportKind, ReportPipeline, RunSummary,
    SkipReason, SourceDocument,
};

use super::{finish_report, load_config, process_pdf_file, progress_bar, OutputArgs};

lazy_static! {
    static ref FILE_DAY: Regex = Regex::new(r"(\d{8})").unwrap();
}

/// Built-in report types.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ReportArg {
    /// SGE monthly data highlights (PDF)
    SgeMonthly,
    /// SGE weekly silver inventory (PDF)
    SgeWeekly,
    /// SHFE daily trading data (JSON)
    ShfeOpenInterest,
}

impl From<ReportArg> for ReportKind {
    fn from(arg: ReportArg) -> Self {
        match arg {
            ReportArg::SgeMonthly => ReportKind::SgeMonthly,
            ReportArg::SgeWeekly => ReportKind::SgeWeekly,
            ReportArg::ShfeOpenInterest => ReportKind::ShfeOpenInterest,
        }
    }
}

/// Arguments for the extract command.
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Report type
    #[arg(short, long, value_enum, required_unless_present = "report_config")]
    report: Option<ReportArg>,

    /// Report configuration JSON, replacing the built-in one
    #[arg(long)]
    report_config: Option<PathBuf>,

    #[command(flatten)]
    output: OutputArgs,
}

fn load_report(args: &ExtractArgs) -> anyhow::Result<ReportConfig> {
    if let Some(path) = &args.report_config {
        let content = fs::read_to_string(path)?;
        return Ok(serde_json::from_str(&content)?);
    }
    match args.report {
        Some(report) => Ok(ReportKind::from(report).config()),
        None => anyhow::bail!("Either --report or --report-config is required"),
    }
}

/// Trading day named in a feed file such as `kx20240308.dat`.
fn day_from_file_name(path: &Path) -> Option<NaiveDate> {
    let name = path.file_name()?.to_str()?;
    FILE_DAY
        .captures_iter(name)
        .find_map(|caps| NaiveDate::parse_from_str(&caps[1], "%Y%m%d").ok())
}

fn process_json_file(pipeline: &ReportPipeline, doc: &SourceDocument, path: &Path) -> Outcome {
    let Some(day) = day_from_file_name(path) else {
        warn!("skipped {}: no YYYYMMDD date in file name", path.display());
        return Outcome::Skipped(SkipReason::DateUnresolved);
    };

    let payload = fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|content| Ok(serde_json::from_str::<serde_json::Value>(&content)?));
    match payload {
        Ok(payload) => pipeline.process_json(doc, &payload, CalendarKey::day(day)),
        Err(e) => {
            warn!("skipped {}: {}", path.display(), e);
            Outcome::Skipped(SkipReason::Unreadable(e.to_string()))
        }
    }
}

pub async fn run(args: ExtractArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let report = load_report(&args)?;
    let pipeline = ReportPipeline::new(report.clone(), &config.layout)?;
    let json_feed = matches!(report.extraction, ExtractionMode::OpenInterest(_));

    // Expand glob pattern
    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            json_feed || ext.eq_ignore_ascii_case("pdf")
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    let mut summary = RunSummary::new(files.len());
    let mut records = Vec::new();
    let pb = progress_bar(files.len(), "files");

    for path in files {
        let doc = SourceDocument::new(path.display().to_string()).with_cached_path(&path);
        let outcome = if json_feed {
            process_json_file(&pipeline, &doc, &path)
        } else {
            process_pdf_file(&pipeline, &doc, &path)
        };

        summary.observe(&outcome);
        if let Some(record) = outcome.record() {
            records.push(record);
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    finish_report(&report, records, summary, &args.output, &config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bullion_core::models::LayoutConfig;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_day_from_file_name() {
        assert_eq!(
            day_from_file_name(Path::new("cache/kx20240308.dat")),
            NaiveDate::from_ymd_opt(2024, 3, 8)
        );
        assert_eq!(day_from_file_name(Path::new("kx.dat")), None);
        assert_eq!(day_from_file_name(Path::new("kx20241340.dat")), None);
    }

    #[test]
    fn test_json_file_becomes_daily_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kx20240308.dat");
        fs::write(
            &path,
            r#"{"o_curinstrument": [
                {"PRODUCTID": "ag_f", "DELIVERYMONTH": "2404", "OPENINTEREST": 1000},
                {"PRODUCTID": "ag_f", "DELIVERYMONTH": "2406", "OPENINTEREST": "250"},
                {"PRODUCTID": "au_f", "DELIVERYMONTH": "2404", "OPENINTEREST": 99}
            ]}"#,
        )
        .unwrap();

        let pipeline =
            ReportPipeline::new(ReportConfig::shfe_open_interest(), &LayoutConfig::default()).unwrap();
        let doc = SourceDocument::new(path.display().to_string());
        let record = process_json_file(&pipeline, &doc, &path).record().unwrap();

        assert_eq!(
            record.key(),
            CalendarKey::day(NaiveDate::from_ymd_opt(2024, 3, 8).unwrap())
        );
        assert_eq!(record.field("silver_total_open_interest"), Some(1250.0));
    }

    #[test]
    fn test_json_file_without_date_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.dat");
        fs::write(&path, "{}").unwrap();

        let pipeline =
            ReportPipeline::new(ReportConfig::shfe_open_interest(), &LayoutConfig::default()).unwrap();
        let doc = SourceDocument::new("feed.dat");
        let outcome = process_json_file(&pipeline, &doc, &path);

        assert_eq!(outcome.skip_reason(), Some(&SkipReason::DateUnresolved));
    }
}
