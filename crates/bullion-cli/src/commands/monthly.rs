//! Monthly command - SGE gold and silver withdrawals.

use std::path::PathBuf;

use clap::Args;
use console::style;

use bullion_core::{ReportConfig, ReportPipeline};

use super::{finish_report, load_config, process_remote_pdfs, OutputArgs};
use crate::listing;
use crate::net::HttpClient;

/// Arguments for the monthly command.
#[derive(Args, Debug)]
pub struct MonthlyArgs {
    /// Maximum listing pages to crawl
    #[arg(long)]
    max_pages: Option<usize>,

    /// Directory for downloaded PDFs
    #[arg(long)]
    pdf_dir: Option<PathBuf>,

    #[command(flatten)]
    output: OutputArgs,
}

pub async fn run(args: MonthlyArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(max_pages) = args.max_pages {
        config.sources.sge_monthly_max_pages = max_pages;
    }
    let pdf_dir = args
        .pdf_dir
        .clone()
        .unwrap_or_else(|| config.output.monthly_pdf_dir.clone());

    let report = ReportConfig::sge_monthly();
    let pipeline = ReportPipeline::new(report.clone(), &config.layout)?;
    let http = HttpClient::new(&config.fetch)?;

    let documents = listing::discover_monthly(&http, &config.sources).await?;
    println!(
        "{} Found {} monthly reports",
        style("ℹ").blue(),
        documents.len()
    );

    let (records, summary) = process_remote_pdfs(&http, &pipeline, documents, &pdf_dir).await;
    finish_report(&report, records, summary, &args.output, &config)
}
