//! CLI subcommands and the plumbing they share.

pub mod config;
pub mod extract;
pub mod monthly;
pub mod open_interest;
pub mod paj;
pub mod weekly;

use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use bullion_core::{
    finalize, BullionConfig, ExtractionRecord, Outcome, PdfExtractor, ReportConfig, ReportPipeline,
    RunSummary, SkipReason, SourceDocument,
};

use crate::net::HttpClient;
use crate::output::{self, OutputFormat, Table};

/// Output options shared by every report command.
#[derive(Args, Debug)]
pub struct OutputArgs {
    /// Output formats, comma separated
    #[arg(short, long, value_enum, value_delimiter = ',', default_value = "csv")]
    pub format: Vec<OutputFormat>,

    /// Output directory (default: data directory from config)
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,
}

/// Load the file given with `--config`, else the default file, else defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<BullionConfig> {
    if let Some(path) = config_path {
        return Ok(BullionConfig::from_file(Path::new(path))?);
    }

    let default_path = config::default_config_path();
    if default_path.exists() {
        debug!("Using config file {}", default_path.display());
        Ok(BullionConfig::from_file(&default_path)?)
    } else {
        Ok(BullionConfig::default())
    }
}

/// Progress bar in the style used by every command.
pub fn progress_bar(len: usize, unit: &str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} {{msg}}",
                unit
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb
}

/// Run one local PDF through the pipeline.
pub fn process_pdf_file(pipeline: &ReportPipeline, doc: &SourceDocument, path: &Path) -> Outcome {
    let pdf = fs::read(path)
        .map_err(anyhow::Error::from)
        .and_then(|data| Ok(PdfExtractor::from_bytes(&data)?));

    match pdf {
        Ok(pdf) => pipeline.process_pdf(doc, &pdf),
        Err(e) => {
            warn!("skipped {}: {}", doc.url, e);
            Outcome::Skipped(SkipReason::Unreadable(e.to_string()))
        }
    }
}

/// Download and process discovered PDFs one at a time, pausing between them.
pub async fn process_remote_pdfs(
    http: &HttpClient,
    pipeline: &ReportPipeline,
    documents: Vec<SourceDocument>,
    cache_dir: &Path,
) -> (Vec<ExtractionRecord>, RunSummary) {
    let mut summary = RunSummary::new(documents.len());
    let mut records = Vec::new();
    let pb = progress_bar(documents.len(), "reports");

    for doc in documents {
        pb.set_message(crate::net::cache_file_name(&doc.url));

        match http.download_cached(&doc.url, cache_dir).await {
            Ok(path) => {
                let doc = doc.with_cached_path(&path);
                let outcome = process_pdf_file(pipeline, &doc, &path);
                summary.observe(&outcome);
                if let Some(record) = outcome.record() {
                    records.push(record);
                }
            }
            Err(e) => {
                warn!("Failed to download {}: {}", doc.url, e);
                summary.observe_failure();
            }
        }

        pb.inc(1);
        http.pause().await;
    }

    pb.finish_and_clear();
    (records, summary)
}

/// De-duplicate, sort, write every requested format and print the run summary.
///
/// Fails when nothing was discovered or nothing could be written.
pub fn finish_report(
    report: &ReportConfig,
    records: Vec<ExtractionRecord>,
    mut summary: RunSummary,
    args: &OutputArgs,
    config: &BullionConfig,
) -> anyhow::Result<()> {
    if summary.discovered == 0 {
        anyhow::bail!("No {} documents found", report.name);
    }

    let finalized = finalize(records);
    summary.finish(&finalized);

    if finalized.records.is_empty() {
        println!("{} {}", style("✗").red(), summary);
        anyhow::bail!("No {} records extracted", report.name);
    }

    let table = Table::from_records(report, &finalized.records);
    write_table(&table, report.kind.file_stem(), args, config)?;

    println!("{} {}", style("ℹ").blue(), summary);
    Ok(())
}

/// Write a table in every requested format under the output directory.
pub fn write_table(
    table: &Table,
    stem: &str,
    args: &OutputArgs,
    config: &BullionConfig,
) -> anyhow::Result<()> {
    let out_dir = args.out_dir.as_deref().unwrap_or(&config.output.data_dir);
    for format in &args.format {
        let path = output::default_path(out_dir, stem, *format);
        output::write(&path, *format, table)?;
        println!("{} Wrote {}", style("✓").green(), path.display());
    }
    Ok(())
}
