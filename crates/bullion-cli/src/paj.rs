//! Petroleum Association of Japan weekly statistics tables.
//!
//! The statistics page sits behind a terms-of-use form. The form is accepted
//! once per session, after which the page's HTML tables are read and the
//! crude oil and petroleum products tables are reshaped to fixed columns.

use std::collections::BTreeMap;

use anyhow::{anyhow, bail};
use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use bullion_core::models::SourcesConfig;
use bullion_core::report::rules::parse_number;
use bullion_core::{CellValue, SchemaRow};

use crate::net::HttpClient;
use crate::output::Table;

lazy_static! {
    static ref ACCEPT_FORM: Selector = Selector::parse(r#"form[action="/en/accept_guidelines"]"#).unwrap();
    static ref TOKEN_INPUT: Selector = Selector::parse(r#"input[name="authenticity_token"]"#).unwrap();
    static ref TABLE: Selector = Selector::parse("table").unwrap();
    static ref ROW: Selector = Selector::parse("tr").unwrap();
    static ref CELL: Selector = Selector::parse("th, td").unwrap();
}

const GUIDELINES_PATH: &str = "/en/guidelines";

/// Position and columns of one table on the statistics page.
#[derive(Debug, Clone, Copy)]
pub struct TableShape {
    pub name: &'static str,
    pub stem: &'static str,
    /// Zero-based index among the page's tables.
    pub index: usize,
    pub columns: &'static [&'static str],
}

pub const PRODUCTS: TableShape = TableShape {
    name: "Petroleum Products",
    stem: "paj_petroleum_products",
    index: 3,
    columns: &["index", "sulfur", "Current Week", "Last Week", "Change from Last Week"],
};

pub const CRUDE: TableShape = TableShape {
    name: "Crude Oil",
    stem: "paj_crude_oil",
    index: 4,
    columns: &["index", "Current Week", "Last Week", "Change from Last Week"],
};

/// The terms acceptance form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptForm {
    pub action: String,
    pub token: String,
}

/// The acceptance form on `html`, if the page carries one.
///
/// A form without its authenticity token is an error: posting it would fail.
pub fn accept_form(html: &str) -> anyhow::Result<Option<AcceptForm>> {
    let document = Html::parse_document(html);
    let Some(form) = document.select(&ACCEPT_FORM).next() else {
        return Ok(None);
    };

    let action = form.value().attr("action").unwrap_or_default().to_string();
    let token = form
        .select(&TOKEN_INPUT)
        .next()
        .and_then(|input| input.value().attr("value"))
        .ok_or_else(|| anyhow!("terms form has no authenticity token"))?
        .to_string();

    Ok(Some(AcceptForm { action, token }))
}

/// Fetch the statistics page, accepting the terms first when redirected to them.
pub async fn fetch_tables_page(http: &HttpClient, sources: &SourcesConfig) -> anyhow::Result<String> {
    let (landed, html) = http.get_page(&sources.paj_tables).await?;
    let on_guidelines = landed.as_str().contains(GUIDELINES_PATH);
    let form = accept_form(&html)?;
    if !on_guidelines && form.is_none() {
        return Ok(html);
    }

    let form = match form {
        Some(form) => Some(form),
        None => accept_form(&http.get_text(&sources.paj_guidelines).await?)?,
    };
    match form {
        Some(form) => {
            let action = Url::parse(&sources.paj_guidelines)?.join(&form.action)?;
            info!("Accepting terms at {}", action);
            http.post_form(
                action.as_str(),
                &sources.paj_guidelines,
                &[
                    ("authenticity_token", form.token.as_str()),
                    ("accept_terms", "1"),
                    ("commit", "Agree"),
                ],
            )
            .await?;
        }
        None => warn!("Redirected to {} but found no terms form", landed),
    }

    http.get_text(&sources.paj_tables).await
}

/// One HTML table with row and column spans expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlTable {
    /// Leading rows that form the column header.
    pub header_rows: usize,
    pub rows: Vec<Vec<String>>,
}

impl HtmlTable {
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Rows below the header.
    pub fn body(&self) -> &[Vec<String>] {
        &self.rows[self.header_rows..]
    }
}

struct SpanCell {
    text: String,
    colspan: usize,
    rowspan: usize,
}

struct RawRow {
    in_thead: bool,
    all_th: bool,
    cells: Vec<SpanCell>,
}

fn span(cell: &ElementRef<'_>, attr: &str) -> usize {
    cell.value()
        .attr(attr)
        .and_then(|v| v.trim().parse().ok())
        .filter(|n| *n > 0)
        .unwrap_or(1)
}

fn cell_text(cell: &ElementRef<'_>) -> String {
    cell.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

fn raw_row(row: ElementRef<'_>) -> RawRow {
    let in_thead = row
        .parent()
        .and_then(ElementRef::wrap)
        .is_some_and(|parent| parent.value().name() == "thead");
    let cells: Vec<ElementRef<'_>> = row.select(&CELL).collect();
    let all_th = !cells.is_empty() && cells.iter().all(|c| c.value().name() == "th");

    RawRow {
        in_thead,
        all_th,
        cells: cells
            .iter()
            .map(|c| SpanCell {
                text: cell_text(c),
                colspan: span(c, "colspan"),
                rowspan: span(c, "rowspan"),
            })
            .collect(),
    }
}

/// Repeat spanned cells into every grid position they cover.
fn expand_spans(rows: Vec<Vec<SpanCell>>) -> Vec<Vec<String>> {
    // column -> (text, rows still covered)
    let mut carried: BTreeMap<usize, (String, usize)> = BTreeMap::new();
    let mut grid = Vec::with_capacity(rows.len());

    for cells in rows {
        let mut row: Vec<String> = Vec::new();
        let mut cells = cells.into_iter();
        loop {
            let col = row.len();
            if let Some((text, left)) = carried.get_mut(&col) {
                row.push(text.clone());
                *left -= 1;
                if *left == 0 {
                    carried.remove(&col);
                }
                continue;
            }
            let Some(cell) = cells.next() else {
                break;
            };
            for _ in 0..cell.colspan {
                if cell.rowspan > 1 {
                    carried.insert(row.len(), (cell.text.clone(), cell.rowspan - 1));
                }
                row.push(cell.text.clone());
            }
        }
        grid.push(row);
    }

    grid
}

/// Every table on the page, in document order.
///
/// Header rows are the `thead` rows, or else the leading rows made only of
/// `th` cells.
pub fn parse_tables(html: &str) -> Vec<HtmlTable> {
    let document = Html::parse_document(html);
    document
        .select(&TABLE)
        .map(|table| {
            let raw: Vec<RawRow> = table.select(&ROW).map(raw_row).filter(|r| !r.cells.is_empty()).collect();
            let in_thead = raw.iter().take_while(|r| r.in_thead).count();
            let header_rows = if in_thead > 0 {
                in_thead
            } else {
                raw.iter().take_while(|r| r.all_th).count()
            };
            let rows = expand_spans(raw.into_iter().map(|r| r.cells).collect());
            HtmlTable { header_rows, rows }
        })
        .collect()
}

fn cell_value(text: &str) -> CellValue {
    if text.is_empty() {
        return CellValue::Empty;
    }
    parse_number(text).map_or_else(|| CellValue::Text(text.to_string()), CellValue::Number)
}

impl TableShape {
    /// Pick this shape's table, rename its columns and drop the first body row.
    pub fn apply(&self, tables: &[HtmlTable]) -> anyhow::Result<Table> {
        let table = tables.get(self.index).ok_or_else(|| {
            anyhow!(
                "{} table expected at position {}, page has {} tables",
                self.name,
                self.index + 1,
                tables.len()
            )
        })?;
        if table.width() != self.columns.len() {
            bail!(
                "{} table has {} columns, expected {}",
                self.name,
                table.width(),
                self.columns.len()
            );
        }

        // The first body row holds units or dates rather than data.
        let rows: Vec<SchemaRow> = table
            .body()
            .iter()
            .skip(1)
            .map(|cells| {
                let row = self
                    .columns
                    .iter()
                    .enumerate()
                    .map(|(i, header)| {
                        let value = cells.get(i).map_or(CellValue::Empty, |text| cell_value(text));
                        (header.to_string(), value)
                    })
                    .collect();
                SchemaRow::new(row)
            })
            .collect();
        debug!("{}: {} rows", self.name, rows.len());

        Ok(Table {
            name: self.name.to_string(),
            headers: self.columns.iter().map(|c| c.to_string()).collect(),
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::to_csv;
    use bullion_core::models::FetchConfig;
    use pretty_assertions::assert_eq;

    const CURRENT_PAGE: &str = include_str!("../tests/fixtures/paj_current_en_n2.html");

    const GUIDELINES_PAGE: &str = r#"<html><body>
        <form action="/en/accept_guidelines" method="post">
          <input type="hidden" name="authenticity_token" value="tok123">
          <input type="checkbox" name="accept_terms" value="1">
          <input type="submit" name="commit" value="Agree">
        </form></body></html>"#;

    #[test]
    fn test_accept_form_reads_action_and_token() {
        assert_eq!(
            accept_form(GUIDELINES_PAGE).unwrap(),
            Some(AcceptForm {
                action: "/en/accept_guidelines".to_string(),
                token: "tok123".to_string(),
            })
        );
        assert_eq!(accept_form(CURRENT_PAGE).unwrap(), None);
    }

    #[test]
    fn test_accept_form_without_token_fails() {
        let html = r#"<form action="/en/accept_guidelines"><input name="commit"></form>"#;
        assert!(accept_form(html).is_err());
    }

    #[test]
    fn test_parse_tables_in_document_order() {
        let tables = parse_tables(CURRENT_PAGE);
        assert_eq!(tables.len(), 5);
        assert_eq!(tables[0].header_rows, 0);
        assert_eq!(tables[1].header_rows, 1);
        assert_eq!(tables[2].header_rows, 1);
        assert_eq!(tables[3].header_rows, 2);
        assert_eq!(tables[4].header_rows, 1);
    }

    #[test]
    fn test_spans_fill_the_grid() {
        let products = &parse_tables(CURRENT_PAGE)[3];

        assert_eq!(products.width(), 5);
        assert_eq!(
            products.rows[1],
            vec!["Products", "Sulfur", "Current Week", "Last Week", "Change from Last Week"]
        );
        assert_eq!(products.rows[0][3], "Inventory (kl)");
        assert_eq!(products.body()[4], vec!["Gas Oil", "High", "11,203", "10,998", "205"]);
    }

    #[test]
    fn test_products_shape() {
        let table = PRODUCTS.apply(&parse_tables(CURRENT_PAGE)).unwrap();

        assert_eq!(table.headers, vec!["index", "sulfur", "Current Week", "Last Week", "Change from Last Week"]);
        assert_eq!(table.rows.len(), 4);
        assert_eq!(
            table.rows[1].cells()[4],
            ("Change from Last Week".to_string(), CellValue::Number(-106222.0))
        );
        assert_eq!(table.rows[0].cells()[1], ("sulfur".to_string(), CellValue::Empty));
    }

    #[test]
    fn test_crude_shape_to_csv() {
        let table = CRUDE.apply(&parse_tables(CURRENT_PAGE)).unwrap();
        let csv = to_csv(&table).unwrap();

        assert_eq!(
            csv.lines().collect::<Vec<_>>(),
            vec![
                "index,Current Week,Last Week,Change from Last Week",
                "Inventory,11234567.0,11500000.0,-265433.0",
                "Processed,2601234.0,2588765.0,12469.0",
            ]
        );
    }

    #[test]
    fn test_missing_or_misshapen_table() {
        let tables = parse_tables(CURRENT_PAGE);
        assert!(CRUDE.apply(&tables[..4]).is_err());

        let swapped = TableShape { index: 3, ..CRUDE };
        assert!(swapped.apply(&tables).is_err());
    }

    #[tokio::test]
    async fn test_fetch_accepts_terms_then_reads_tables() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/en/pub/current_en_n2.html")
            .match_header("cookie", mockito::Matcher::Missing)
            .with_status(302)
            .with_header("location", "/en/guidelines")
            .create_async()
            .await;
        server
            .mock("GET", "/en/guidelines")
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body(GUIDELINES_PAGE)
            .create_async()
            .await;
        let accept = server
            .mock("POST", "/en/accept_guidelines")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("authenticity_token".into(), "tok123".into()),
                mockito::Matcher::UrlEncoded("accept_terms".into(), "1".into()),
                mockito::Matcher::UrlEncoded("commit".into(), "Agree".into()),
            ]))
            .with_header("set-cookie", "_paj_session=accepted; Path=/")
            .with_body("thanks")
            .create_async()
            .await;
        server
            .mock("GET", "/en/pub/current_en_n2.html")
            .match_header("cookie", "_paj_session=accepted")
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body(CURRENT_PAGE)
            .create_async()
            .await;

        let sources = SourcesConfig {
            paj_guidelines: format!("{}/en/guidelines", server.url()),
            paj_tables: format!("{}/en/pub/current_en_n2.html", server.url()),
            ..SourcesConfig::default()
        };
        let http = HttpClient::new(&FetchConfig::default()).unwrap();

        let html = fetch_tables_page(&http, &sources).await.unwrap();

        accept.assert_async().await;
        assert_eq!(parse_tables(&html).len(), 5);
    }

    #[tokio::test]
    async fn test_fetch_without_terms_reads_page_once() {
        let mut server = mockito::Server::new_async().await;
        let page = server
            .mock("GET", "/en/pub/current_en_n2.html")
            .with_body(CURRENT_PAGE)
            .expect(1)
            .create_async()
            .await;

        let sources = SourcesConfig {
            paj_tables: format!("{}/en/pub/current_en_n2.html", server.url()),
            ..SourcesConfig::default()
        };
        let http = HttpClient::new(&FetchConfig::default()).unwrap();

        let html = fetch_tables_page(&http, &sources).await.unwrap();

        page.assert_async().await;
        assert_eq!(html, CURRENT_PAGE);
    }
}
