//! Weekly command - SGE silver inventory.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Args;
use console::style;

use bullion_core::{ReportConfig, ReportPipeline};

use super::{finish_report, load_config, process_remote_pdfs, OutputArgs};
use crate::listing;
use crate::net::HttpClient;

/// Arguments for the weekly command.
#[derive(Args, Debug)]
pub struct WeeklyArgs {
    /// First listing page to crawl
    #[arg(long)]
    start_url: Option<String>,

    /// Maximum listing pages to visit
    #[arg(long)]
    max_pages: Option<usize>,

    /// Keep only the newest N reports (0 keeps all)
    #[arg(long, default_value_t = 0)]
    max_reports: usize,

    /// Earliest week end to keep (YYYYMMDD)
    #[arg(long, value_parser = parse_week_date, default_value = "20130101")]
    from_week: NaiveDate,

    /// Latest week end to keep (YYYYMMDD)
    #[arg(long, value_parser = parse_week_date)]
    to_week: Option<NaiveDate>,

    /// Directory for downloaded PDFs
    #[arg(long)]
    pdf_dir: Option<PathBuf>,

    #[command(flatten)]
    output: OutputArgs,
}

fn parse_week_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y%m%d")
        .map_err(|e| format!("expected YYYYMMDD, got {:?}: {}", value, e))
}

pub async fn run(args: WeeklyArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(start_url) = &args.start_url {
        config.sources.sge_weekly_start = start_url.clone();
    }
    if let Some(max_pages) = args.max_pages {
        config.sources.sge_weekly_max_pages = max_pages;
    }
    let pdf_dir = args
        .pdf_dir
        .clone()
        .unwrap_or_else(|| config.output.weekly_pdf_dir.clone());

    let report = ReportConfig::sge_weekly();
    let pipeline = ReportPipeline::new(report.clone(), &config.layout)?;
    let http = HttpClient::new(&config.fetch)?;

    let discovered = listing::discover_weekly(&http, &config.sources).await?;
    let found = discovered.len();
    let documents = listing::filter_weekly(
        discovered,
        Some(args.from_week),
        args.to_week,
        Some(args.max_reports),
    );
    println!(
        "{} Found {} weekly reports, {} in range",
        style("ℹ").blue(),
        found,
        documents.len()
    );

    let (records, summary) = process_remote_pdfs(&http, &pipeline, documents, &pdf_dir).await;
    finish_report(&report, records, summary, &args.output, &config)
}
