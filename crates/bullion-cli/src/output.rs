//! CSV, JSON and Excel writers for extracted tables.

use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use rust_xlsxwriter::{Format, Workbook};
use tracing::debug;

use bullion_core::{CellValue, ExtractionRecord, ReportConfig, SchemaRow};

/// Excel's limit on worksheet name length.
const MAX_SHEET_NAME: usize = 31;

/// Output formats for report tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// CSV table
    Csv,
    /// Pretty-printed JSON array
    Json,
    /// Excel workbook with one sheet
    Xlsx,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::Xlsx => "xlsx",
        }
    }
}

/// A rendered table: a name, headers and rows in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Sheet name in workbooks.
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<SchemaRow>,
}

impl Table {
    /// Render records with a report's schema; the sheet is named after the report.
    pub fn from_records(report: &ReportConfig, records: &[ExtractionRecord]) -> Self {
        Self {
            name: report.name.clone(),
            headers: report.schema.headers().into_iter().map(String::from).collect(),
            rows: records.iter().map(|record| report.schema.row(record)).collect(),
        }
    }
}

/// Default output path for a file stem in `dir`.
pub fn default_path(dir: &Path, stem: &str, format: OutputFormat) -> PathBuf {
    dir.join(format!("{}.{}", stem, format.extension()))
}

/// Render a table as CSV with its headers.
pub fn to_csv(table: &Table) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(&table.headers)?;
    for row in &table.rows {
        wtr.write_record(row.csv_fields())?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

/// Render a table as a JSON array of objects keyed by header.
pub fn to_json(table: &Table) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&table.rows)?)
}

/// Save a table as a one-sheet workbook with a bold header row.
pub fn to_xlsx(table: &Table, path: &Path) -> anyhow::Result<()> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let sheet_name: String = table.name.chars().take(MAX_SHEET_NAME).collect();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;

    for (col, title) in table.headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, title, &header)?;
    }
    for (i, row) in table.rows.iter().enumerate() {
        let row_num = i as u32 + 1;
        for (col, (_, value)) in row.cells().iter().enumerate() {
            let col = col as u16;
            match value {
                CellValue::Text(s) => {
                    worksheet.write_string(row_num, col, s)?;
                }
                CellValue::Integer(n) => {
                    worksheet.write_number(row_num, col, *n as f64)?;
                }
                CellValue::Number(n) => {
                    worksheet.write_number(row_num, col, *n)?;
                }
                CellValue::Empty => {}
            }
        }
    }
    worksheet.autofit();

    workbook.save(path)?;
    Ok(())
}

/// Write a table to `path`, creating parent directories.
pub fn write(path: &Path, format: OutputFormat, table: &Table) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    match format {
        OutputFormat::Csv => fs::write(path, to_csv(table)?)?,
        OutputFormat::Json => fs::write(path, to_json(table)?)?,
        OutputFormat::Xlsx => to_xlsx(table, path)?,
    }

    debug!("Wrote {} rows to {}", table.rows.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bullion_core::models::LayoutConfig;
    use bullion_core::{ReportKind, ReportPipeline, SourceDocument};
    use calamine::{open_workbook, Data, Reader, Xlsx};
    use pretty_assertions::assert_eq;

    fn weekly_table() -> Table {
        let config = ReportConfig::sge_weekly();
        let pipeline = ReportPipeline::new(config.clone(), &LayoutConfig::default()).unwrap();
        let doc = SourceDocument::new("https://www.sge.com.cn/upload/20240101-20240107.pdf")
            .with_title("周报")
            .with_source_page("https://www.sge.com.cn/sjzx/hqzb");
        let record = pipeline
            .process_text(&doc, "白银 12345.6 +10.2 12355.8")
            .record()
            .unwrap();
        Table::from_records(&config, &[record])
    }

    fn monthly_table() -> (ReportConfig, Table) {
        let config = ReportConfig::sge_monthly();
        let pipeline = ReportPipeline::new(config.clone(), &LayoutConfig::default()).unwrap();
        let doc = SourceDocument::new("https://en.sge.com.cn/upload/Data Highlights--March, 2018.pdf");
        let record = pipeline
            .process_text(&doc, "Withdrawal Volume (Present Month) 125,781.40 321,660.00")
            .record()
            .unwrap();
        let table = Table::from_records(&config, &[record]);
        (config, table)
    }

    #[test]
    fn test_csv_rows_follow_schema() {
        let csv = to_csv(&weekly_table()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "title,pdf_url,source_page,week_start,week_end,last_week_inventory,weekly_change,\
             this_week_inventory,this_week_inventory_kilograms,pdf_path"
        );
        assert!(lines[1].starts_with("周报,https://www.sge.com.cn/upload/20240101-20240107.pdf,"));
        assert!(lines[1].contains(",20240101,20240107,12345.6,10.2,12355.8,"));
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_json_keys_in_column_order() {
        let json = to_json(&weekly_table()).unwrap();

        let title = json.find("\"title\"").unwrap();
        let week_end = json.find("\"week_end\"").unwrap();
        let pdf_path = json.find("\"pdf_path\"").unwrap();
        assert!(title < week_end && week_end < pdf_path);
        assert!(json.contains("\"pdf_path\": null"));
    }

    #[test]
    fn test_xlsx_sheet_named_after_report_with_schema_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monthly.xlsx");
        let (config, table) = monthly_table();

        write(&path, OutputFormat::Xlsx, &table).unwrap();

        let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["Monthly Withdrawals".to_string()]);

        let range = workbook.worksheet_range("Monthly Withdrawals").unwrap();
        let mut rows = range.rows();
        let headers: Vec<String> = rows.next().unwrap().iter().map(|c| c.to_string()).collect();
        assert_eq!(headers, config.schema.headers());

        let first = rows.next().unwrap();
        assert!(first.contains(&Data::Float(321660.0)));
        assert!(rows.next().is_none());
    }

    #[test]
    fn test_long_table_names_are_truncated_for_sheets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.xlsx");
        let table = Table {
            name: "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghij".to_string(),
            headers: vec!["index".to_string()],
            rows: vec![SchemaRow::new(vec![("index".to_string(), CellValue::Text("Crude".to_string()))])],
        };

        to_xlsx(&table, &path).unwrap();

        let workbook: Xlsx<_> = open_workbook(&path).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["ABCDEFGHIJKLMNOPQRSTUVWXYZabcde".to_string()]);
    }

    #[test]
    fn test_write_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");

        write(&path, OutputFormat::Csv, &weekly_table()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_default_path() {
        assert_eq!(
            default_path(Path::new("data"), ReportKind::ShfeOpenInterest.file_stem(), OutputFormat::Xlsx),
            PathBuf::from("data/shfe_silver_open_interest.xlsx")
        );
    }
}
