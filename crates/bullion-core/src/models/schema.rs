//! Output schemas: named, ordered columns per report type.
//!
//! Column names and order are what downstream spreadsheets key on, so they
//! are data here rather than struct field names.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use super::record::{CalendarKey, ExtractionRecord};

/// Where a column takes its value from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "from", content = "name", rename_all = "snake_case")]
pub enum ColumnSource {
    /// The calendar key rendered as a date label.
    Date,
    /// Calendar year of the key.
    Year,
    /// Calendar month of the key.
    Month,
    /// Week start as `YYYYMMDD`.
    WeekStart,
    /// Week end as `YYYYMMDD`.
    WeekEnd,
    /// A named numeric field.
    Field(String),
    /// Document URL.
    SourceUrl,
    /// Link title.
    Title,
    /// Listing page URL.
    SourcePage,
    /// Local cached file path.
    CachedPath,
}

/// One output column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub header: String,
    pub source: ColumnSource,
}

impl Column {
    pub fn new(header: impl Into<String>, source: ColumnSource) -> Self {
        Self {
            header: header.into(),
            source,
        }
    }

    pub fn field(header: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(header, ColumnSource::Field(field.into()))
    }
}

/// A single rendered cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Number(f64),
    Empty,
}

impl CellValue {
    /// Render for a CSV cell; absent values become empty cells.
    ///
    /// Numbers always carry a fractional part (`321660.0`).
    pub fn to_csv_field(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Integer(i) => i.to_string(),
            CellValue::Number(n) => format!("{:?}", n),
            CellValue::Empty => String::new(),
        }
    }
}

/// Ordered column list for one report type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSchema {
    pub columns: Vec<Column>,
}

impl OutputSchema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.header.as_str()).collect()
    }

    /// Field names referenced by the schema.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().filter_map(|c| match &c.source {
            ColumnSource::Field(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Render one record in column order.
    pub fn row(&self, record: &ExtractionRecord) -> SchemaRow {
        let cells = self
            .columns
            .iter()
            .map(|column| (column.header.clone(), cell(&column.source, record)))
            .collect();
        SchemaRow { cells }
    }
}

fn cell(source: &ColumnSource, record: &ExtractionRecord) -> CellValue {
    let key = record.key();
    let optional_text = |value: Option<&str>| {
        value.map_or(CellValue::Empty, |s| CellValue::Text(s.to_string()))
    };

    match source {
        ColumnSource::Date => CellValue::Text(key.to_string()),
        ColumnSource::Year => CellValue::Integer(i64::from(key.year())),
        ColumnSource::Month => CellValue::Integer(i64::from(key.month_number())),
        ColumnSource::WeekStart => week_bound(key, |(start, _)| start),
        ColumnSource::WeekEnd => week_bound(key, |(_, end)| end),
        ColumnSource::Field(name) => record.field(name).map_or(CellValue::Empty, CellValue::Number),
        ColumnSource::SourceUrl => CellValue::Text(record.source_url().to_string()),
        ColumnSource::Title => optional_text(record.title()),
        ColumnSource::SourcePage => optional_text(record.source_page()),
        ColumnSource::CachedPath => record
            .cached_path()
            .map_or(CellValue::Empty, |p| CellValue::Text(p.display().to_string())),
    }
}

fn week_bound(
    key: CalendarKey,
    pick: impl Fn((chrono::NaiveDate, chrono::NaiveDate)) -> chrono::NaiveDate,
) -> CellValue {
    key.week_bounds()
        .map(|bounds| CellValue::Text(pick(bounds).format("%Y%m%d").to_string()))
        .unwrap_or(CellValue::Empty)
}

/// A rendered record; serializes as a JSON object with keys in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaRow {
    cells: Vec<(String, CellValue)>,
}

impl SchemaRow {
    /// A row from cells already in column order.
    pub fn new(cells: Vec<(String, CellValue)>) -> Self {
        Self { cells }
    }

    pub fn cells(&self) -> &[(String, CellValue)] {
        &self.cells
    }

    pub fn csv_fields(&self) -> Vec<String> {
        self.cells.iter().map(|(_, v)| v.to_csv_field()).collect()
    }
}

impl Serialize for SchemaRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (header, value) in &self.cells {
            map.serialize_entry(header, value)?;
        }
        map.end()
    }
}
