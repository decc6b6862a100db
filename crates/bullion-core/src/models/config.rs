//! Configuration structures for fetching and extraction.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for bullion runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BullionConfig {
    /// HTTP client configuration.
    pub fetch: FetchConfig,

    /// Word reconstruction tuning.
    pub layout: LayoutConfig,

    /// Report source locations.
    pub sources: SourcesConfig,

    /// Output locations.
    pub output: OutputConfig,
}

/// HTTP client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// User-Agent header sent with every request.
    pub user_agent: String,

    /// Timeout for listing pages and JSON feeds, in seconds.
    pub timeout_secs: u64,

    /// Timeout for PDF downloads, in seconds.
    pub download_timeout_secs: u64,

    /// Pause between sequential requests, in milliseconds.
    pub delay_ms: u64,

    /// Parallel workers for the daily feed.
    pub workers: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                         AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0 Safari/537.36"
                .to_string(),
            timeout_secs: 30,
            download_timeout_secs: 60,
            delay_ms: 300,
            workers: 8,
        }
    }
}

/// Word reconstruction tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Vertical band used to group fragments into lines.
    pub line_band: f32,

    /// Multiple of the median gap that counts as a word boundary.
    pub gap_multiplier: f32,

    /// Minimum word-boundary gap.
    pub min_gap: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            line_band: 2.0,
            gap_multiplier: 1.5,
            min_gap: 2.0,
        }
    }
}

/// Report source locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Base URL of the SGE English site.
    pub sge_monthly_base: String,

    /// Paginated monthly listing endpoint (`?p=N` is appended).
    pub sge_monthly_listing: String,

    /// Listing pages to crawl for monthly reports.
    pub sge_monthly_max_pages: usize,

    /// First weekly listing page.
    pub sge_weekly_start: String,

    /// Listing pages to crawl for weekly reports.
    pub sge_weekly_max_pages: usize,

    /// Base URL of the SHFE site.
    pub shfe_base: String,

    /// Daily data file path; `{date}` is replaced by `YYYYMMDD`.
    pub shfe_daily_path: String,

    /// Referer sent with daily data requests.
    pub shfe_referer: String,

    /// PAJ terms page; also the Referer of the acceptance form.
    pub paj_guidelines: String,

    /// PAJ weekly statistics page.
    pub paj_tables: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            sge_monthly_base: "https://en.sge.com.cn".to_string(),
            sge_monthly_listing: "https://en.sge.com.cn/data_MonthlyReport_load".to_string(),
            sge_monthly_max_pages: 15,
            sge_weekly_start: "https://www.sge.com.cn/sjzx/hqzb".to_string(),
            sge_weekly_max_pages: 300,
            shfe_base: "https://www.shfe.com.cn".to_string(),
            shfe_daily_path: "/data/tradedata/future/dailydata/kx{date}.dat".to_string(),
            shfe_referer: "https://www.shfe.com.cn/eng/reports/StatisticalData/DailyData/"
                .to_string(),
            paj_guidelines: "https://stats.paj.gr.jp/en/guidelines".to_string(),
            paj_tables: "https://stats.paj.gr.jp/en/pub/current_en_n2.html".to_string(),
        }
    }
}

impl SourcesConfig {
    /// Daily data URL for one trading day.
    pub fn shfe_daily_url(&self, date: chrono::NaiveDate) -> String {
        let path = self
            .shfe_daily_path
            .replace("{date}", &date.format("%Y%m%d").to_string());
        format!("{}{}", self.shfe_base.trim_end_matches('/'), path)
    }
}

/// Output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for output tables.
    pub data_dir: PathBuf,

    /// Directory for cached monthly PDFs.
    pub monthly_pdf_dir: PathBuf,

    /// Directory for cached weekly PDFs.
    pub weekly_pdf_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            monthly_pdf_dir: PathBuf::from("data/monthly_pdfs"),
            weekly_pdf_dir: PathBuf::from("data/pdfs"),
        }
    }
}

impl BullionConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}
