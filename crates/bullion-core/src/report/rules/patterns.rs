//! Common regex patterns for report extraction.

use lazy_static::lazy_static;
use regex::Regex;

/// Signed number with `,` or full-width `，` grouping and optional decimals.
pub const SIGNED_NUMBER_PATTERN: &str = r"[+-]?\d[\d,，]*(?:\.\d+)?";

/// Unsigned number with `,` grouping and optional decimals.
pub const UNSIGNED_NUMBER_PATTERN: &str = r"\d[\d,]*(?:\.\d+)?";

lazy_static! {
    // Week range as it appears in weekly report titles and file names: 20240101-20240107
    pub static ref WEEK_RANGE: Regex = Regex::new(r"(\d{8})-(\d{8})").unwrap();

    // Descriptive monthly file names: "Data Highlights--November, 2017.pdf"
    pub static ref FILENAME_MONTH: Regex = Regex::new(r"(?i)--\s*(\w+)[,\s]+(\d{4})\.pdf").unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_token_keeps_sign_and_grouping() {
        let tokens: Vec<&str> = Regex::new(SIGNED_NUMBER_PATTERN)
            .unwrap()
            .find_iter("白银 12,345.6 +10.2 -3，000")
            .map(|m| m.as_str())
            .collect();
        assert_eq!(tokens, vec!["12,345.6", "+10.2", "-3，000"]);
    }

    #[test]
    fn test_filename_month() {
        let caps = FILENAME_MONTH.captures("Data Highlights--November, 2017.pdf").unwrap();
        assert_eq!(&caps[1], "November");
        assert_eq!(&caps[2], "2017");
    }
}
