//! Open interest command - SHFE daily silver futures open interest.

use std::time::Duration;

use chrono::{Local, NaiveDate};
use clap::Args;
use console::style;
use futures_util::stream::{self, StreamExt};
use tracing::{info, warn};

use bullion_core::models::SourcesConfig;
use bullion_core::{
    CalendarKey, ExtractionRecord, Outcome, ReportConfig, ReportPipeline, RunSummary, SkipReason,
    SourceDocument,
};

use super::{finish_report, load_config, progress_bar, OutputArgs};
use crate::net::HttpClient;

/// Days covered when no start date is given.
const DEFAULT_SPAN_DAYS: i64 = 730;

/// Arguments for the open-interest command.
#[derive(Args, Debug)]
pub struct OpenInterestArgs {
    /// First day to fetch, YYYY-MM-DD (default: two years before the end date)
    #[arg(long)]
    start_date: Option<NaiveDate>,

    /// Last day to fetch, YYYY-MM-DD (default: today)
    #[arg(long)]
    end_date: Option<NaiveDate>,

    /// Concurrent requests
    #[arg(short = 'j', long)]
    workers: Option<usize>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    #[command(flatten)]
    output: OutputArgs,
}

/// Every day from `start` to `end` inclusive.
fn days_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|day| *day <= end).collect()
}

async fn fetch_day(
    http: &HttpClient,
    pipeline: &ReportPipeline,
    sources: &SourcesConfig,
    day: NaiveDate,
) -> Outcome {
    let url = sources.shfe_daily_url(day);
    let doc = SourceDocument::new(url.as_str());

    match http.get_json_status(&url, Some(&sources.shfe_referer)).await {
        Ok(Some(payload)) => pipeline.process_json(&doc, &payload, CalendarKey::day(day)),
        // Weekends and holidays have no file.
        Ok(None) => Outcome::Skipped(SkipReason::NoText),
        Err(e) => {
            warn!("Failed to fetch {}: {}", url, e);
            Outcome::Skipped(SkipReason::Unreadable(e.to_string()))
        }
    }
}

pub async fn run(args: OpenInterestArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    let end = args.end_date.unwrap_or_else(|| Local::now().date_naive());
    let start = args
        .start_date
        .unwrap_or(end - chrono::Duration::days(DEFAULT_SPAN_DAYS));
    if start > end {
        anyhow::bail!("Start date {} is after end date {}", start, end);
    }

    let report = ReportConfig::shfe_open_interest();
    let pipeline = ReportPipeline::new(report.clone(), &config.layout)?;
    let mut http = HttpClient::new(&config.fetch)?;
    if let Some(timeout) = args.timeout {
        http = http.with_timeout(Duration::from_secs(timeout));
    }
    let workers = args.workers.unwrap_or(config.fetch.workers).max(1);

    let days = days_between(start, end);
    println!(
        "{} Fetching {} days ({} to {}) with {} workers",
        style("ℹ").blue(),
        days.len(),
        start,
        end,
        workers
    );

    let mut summary = RunSummary::new(days.len());
    let pb = progress_bar(days.len(), "days");
    let outcomes: Vec<Outcome> = stream::iter(days)
        .map(|day| fetch_day(&http, &pipeline, &config.sources, day))
        .buffer_unordered(workers)
        .inspect(|_| pb.inc(1))
        .collect()
        .await;
    pb.finish_and_clear();

    let mut records: Vec<ExtractionRecord> = Vec::new();
    for outcome in outcomes {
        summary.observe(&outcome);
        if let Some(record) = outcome.record() {
            records.push(record);
        }
    }
    info!("{} trading days with data", records.len());

    finish_report(&report, records, summary, &args.output, &config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_days_between_is_inclusive() {
        let start = NaiveDate::from_ymd_opt(2024, 2, 28).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let days = days_between(start, end);
        assert_eq!(days.len(), 3);
        assert_eq!(days[1], NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(days[2], end);
    }

    #[test]
    fn test_days_between_single_day() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 8).unwrap();
        assert_eq!(days_between(day, day), vec![day]);
    }
}
