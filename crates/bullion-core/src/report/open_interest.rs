//! Open interest totals from the SHFE daily trading data feed.
//!
//! Each daily file lists one row per contract month under `o_curinstrument`.
//! A product's total is its subtotal row when the feed carries one, or the
//! sum of its contract-month rows otherwise.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use super::rules::numbers::parse_number;
use crate::error::ExtractionError;

const ROWS: &str = "o_curinstrument";
const PRODUCT: &str = "PRODUCTID";
const DELIVERY_MONTH: &str = "DELIVERYMONTH";
const OPEN_INTEREST: &str = "OPENINTEREST";

/// Which product to total and how its subtotal rows are labelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenInterestSpec {
    /// Product id, compared trimmed and lower-cased.
    pub product_id: String,
    /// Substrings marking a subtotal row in the delivery month column.
    pub subtotal_markers: Vec<String>,
    /// Prefix marking a subtotal row in the delivery month column.
    pub subtotal_prefix: String,
    /// Output field the total is bound to.
    pub field: String,
}

impl OpenInterestSpec {
    /// Silver futures.
    ///
    /// The feed has been seen to label subtotals with the UTF-8 bytes of
    /// "小计" read as Latin-1; both spellings are accepted. The mis-decoded
    /// form has not been confirmed against current files.
    pub fn silver() -> Self {
        Self {
            product_id: "ag_f".to_string(),
            subtotal_markers: vec!["å°è®¡".to_string(), "小计".to_string()],
            subtotal_prefix: "sub".to_string(),
            field: "silver_total_open_interest".to_string(),
        }
    }

    fn is_subtotal(&self, month: &str) -> bool {
        let month = month.trim().to_lowercase();
        self.subtotal_markers
            .iter()
            .any(|m| month.contains(&m.to_lowercase()))
            || month.starts_with(&self.subtotal_prefix.to_lowercase())
    }
}

/// Total open interest of one product, `None` if the feed has no usable rows.
pub fn extract_open_interest(
    payload: &Value,
    spec: &OpenInterestSpec,
) -> Result<Option<f64>, ExtractionError> {
    let object = payload
        .as_object()
        .ok_or_else(|| ExtractionError::Payload("expected a JSON object".to_string()))?;

    let rows = match object.get(ROWS) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(rows)) => rows,
        Some(_) => return Err(ExtractionError::Payload(format!("{} is not an array", ROWS))),
    };

    let product = spec.product_id.trim().to_lowercase();
    let matching: Vec<&Value> = rows
        .iter()
        .filter(|row| cell_text(row, PRODUCT).trim().to_lowercase() == product)
        .collect();
    trace!("{} rows for product {}", matching.len(), product);

    if matching.is_empty() {
        return Ok(None);
    }

    if let Some(row) = matching
        .iter()
        .find(|row| spec.is_subtotal(&cell_text(row, DELIVERY_MONTH)))
    {
        return to_float(row.get(OPEN_INTEREST)).map(Some);
    }

    let mut total = 0.0;
    let mut count = 0;
    for row in matching {
        let month = cell_text(row, DELIVERY_MONTH);
        let month = month.trim();
        if !month.is_empty() && month.chars().all(|c| c.is_ascii_digit()) {
            total += to_float(row.get(OPEN_INTEREST))?;
            count += 1;
        }
    }

    Ok((count > 0).then_some(total))
}

/// A cell as text; missing and null cells are empty.
fn cell_text(row: &Value, key: &str) -> String {
    match row.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Numeric cell value; missing, null and blank cells count as zero.
fn to_float(value: Option<&Value>) -> Result<f64, ExtractionError> {
    match value {
        None | Some(Value::Null) => Ok(0.0),
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| parse_error(&n.to_string())),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(0.0),
        Some(Value::String(s)) => parse_number(s).ok_or_else(|| parse_error(s)),
        Some(other) => Err(parse_error(&other.to_string())),
    }
}

fn parse_error(value: &str) -> ExtractionError {
    ExtractionError::Parse {
        field: OPEN_INTEREST.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subtotal_row_wins() {
        let payload = json!({
            "o_curinstrument": [
                {"PRODUCTID": "ag_f  ", "DELIVERYMONTH": "2406", "OPENINTEREST": 100},
                {"PRODUCTID": "AG_F", "DELIVERYMONTH": "小计", "OPENINTEREST": "1,234"},
                {"PRODUCTID": "au_f", "DELIVERYMONTH": "小计", "OPENINTEREST": 9}
            ]
        });

        assert_eq!(extract_open_interest(&payload, &OpenInterestSpec::silver()).unwrap(), Some(1234.0));
    }

    #[test]
    fn test_mis_decoded_and_prefixed_subtotals() {
        let spec = OpenInterestSpec::silver();
        for month in ["å°è®¡", "Subtotal"] {
            let payload = json!({
                "o_curinstrument": [
                    {"PRODUCTID": "ag_f", "DELIVERYMONTH": "2406", "OPENINTEREST": 1},
                    {"PRODUCTID": "ag_f", "DELIVERYMONTH": month, "OPENINTEREST": 77}
                ]
            });
            assert_eq!(extract_open_interest(&payload, &spec).unwrap(), Some(77.0), "{}", month);
        }
    }

    #[test]
    fn test_sum_of_contract_months_without_subtotal() {
        let payload = json!({
            "o_curinstrument": [
                {"PRODUCTID": "ag_f", "DELIVERYMONTH": "2406", "OPENINTEREST": 100},
                {"PRODUCTID": "ag_f", "DELIVERYMONTH": "2407", "OPENINTEREST": "2,000"},
                {"PRODUCTID": "ag_f", "DELIVERYMONTH": "2408", "OPENINTEREST": ""},
                {"PRODUCTID": "ag_f", "DELIVERYMONTH": "2409", "OPENINTEREST": null},
                {"PRODUCTID": "ag_f", "DELIVERYMONTH": "", "OPENINTEREST": 5000}
            ]
        });

        assert_eq!(extract_open_interest(&payload, &OpenInterestSpec::silver()).unwrap(), Some(2100.0));
    }

    #[test]
    fn test_absent_product_or_rows() {
        let spec = OpenInterestSpec::silver();
        assert_eq!(extract_open_interest(&json!({}), &spec).unwrap(), None);
        assert_eq!(
            extract_open_interest(&json!({"o_curinstrument": [{"PRODUCTID": "cu_f"}]}), &spec).unwrap(),
            None
        );
        assert_eq!(
            extract_open_interest(
                &json!({"o_curinstrument": [{"PRODUCTID": "ag_f", "DELIVERYMONTH": "total"}]}),
                &spec
            )
            .unwrap(),
            None
        );
    }

    #[test]
    fn test_malformed_payload() {
        let spec = OpenInterestSpec::silver();
        assert!(matches!(
            extract_open_interest(&json!([1, 2]), &spec),
            Err(ExtractionError::Payload(_))
        ));
        assert!(matches!(
            extract_open_interest(
                &json!({"o_curinstrument": [{"PRODUCTID": "ag_f", "DELIVERYMONTH": "2406", "OPENINTEREST": "n/a"}]}),
                &spec
            ),
            Err(ExtractionError::Parse { .. })
        ));
    }
}
