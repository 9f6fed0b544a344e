use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

pub fn parse_date(value: &str, field: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .with_context(|| format!("failed to parse {field} '{value}'"))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_use_iso_format() {
        let date = parse_date("2024-03-04", "date").unwrap();
        assert_eq!(format_date(date), "2024-03-04");
        assert!(parse_date("2024-3-4x", "date").is_err());
        assert!(parse_date("2024-02-30", "date").is_err());
    }

    #[test]
    fn negative_counts_are_rejected() {
        assert!(to_u64(-1, "steps").is_err());
        assert_eq!(to_u64(42, "steps").unwrap(), 42);
        assert!(to_i64(u64::MAX).is_err());
    }
}
