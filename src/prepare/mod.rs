//! Dataset preparation.
//!
//! - **retail**: merged sales table → time-indexed table with calendar
//!   fields and sales totals
//! - **energy**: German daily power table → time-indexed table with a
//!   combined wind and solar column and no missing values
//!
//! Shared here: timestamp parsing and calendar field derivation.

pub mod energy;
pub mod retail;

pub use energy::prep_german_data;
pub use retail::prep_store_data;

use polars::prelude::*;
use thiserror::Error;

use crate::models::{Table, TableError};

/// Errors raised while preparing a dataset.
#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("Schema mismatch: {0}")]
    Table(#[from] TableError),

    #[error("Dataframe error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Cannot parse {column} value {value:?} with format {format:?}")]
    DateParse {
        column: String,
        value: String,
        format: String,
    },
}

/// Zone names accepted for a trailing `%Z`. All of them mean UTC.
const UTC_ZONES: &[&str] = &["GMT", "UTC", "UT", "Z"];

/// Split a trailing UTC zone name off a timestamp.
///
/// Returns the rest of the value, or `None` when the last token is not a
/// UTC zone name.
pub fn strip_utc_zone(value: &str) -> Option<&str> {
    let (head, zone) = value.trim_end().rsplit_once(char::is_whitespace)?;
    UTC_ZONES.contains(&zone).then(|| head.trim_end())
}

/// Replace a text column with parsed timestamps (microseconds, naive UTC).
///
/// Date-only formats yield midnight. A format ending in `%Z` requires a
/// UTC zone name in that position. Nulls stay null; any other value that
/// does not match `format` fails with the first offending value.
pub fn parse_datetime_column(
    table: &mut Table,
    name: &str,
    format: &str,
) -> Result<(), PrepareError> {
    let column = table.column(name)?;
    if matches!(column.dtype(), DataType::Datetime(_, _)) {
        return Ok(());
    }
    let text = column.cast(&DataType::String)?;
    let text = text.str()?;
    let date_error = |value: &str| PrepareError::DateParse {
        column: name.to_string(),
        value: value.to_string(),
        format: format.to_string(),
    };

    let (naive_format, input) = match format.strip_suffix("%Z") {
        Some(prefix) => {
            let stripped = text
                .into_iter()
                .map(|v| v.map(|s| strip_utc_zone(s).ok_or_else(|| date_error(s))).transpose())
                .collect::<Result<Vec<Option<&str>>, _>>()?;
            (prefix.trim_end(), Series::new(name.into(), stripped))
        }
        None => (format, text.clone().into_series()),
    };

    let options = StrptimeOptions {
        format: Some(naive_format.into()),
        strict: false,
        exact: true,
        ..Default::default()
    };
    let parsed = input
        .into_frame()
        .lazy()
        .select([col(name).str().to_datetime(
            Some(TimeUnit::Microseconds),
            None,
            options,
            lit("raise"),
        )])
        .collect()?;
    let parsed = parsed.column(name)?;

    let unparsed = parsed.is_null();
    for (row, (value, missing)) in text.into_iter().zip(unparsed.into_iter()).enumerate() {
        if let (Some(value), Some(true)) = (value, missing) {
            tracing::debug!("{} row {} does not match {:?}", name, row, format);
            return Err(date_error(value));
        }
    }

    table.set_column(parsed.clone())?;
    Ok(())
}

/// Month number (1-12) of each timestamp in datetime column `index`.
pub fn month_column(name: &str, index: &str) -> Expr {
    col(index).dt().month().cast(DataType::Int64).alias(name)
}

/// Calendar year of each timestamp in datetime column `index`.
pub fn year_column(name: &str, index: &str) -> Expr {
    col(index).dt().year().cast(DataType::Int64).alias(name)
}

/// English weekday name of each timestamp in datetime column `index`.
pub fn weekday_name_column(name: &str, index: &str) -> Expr {
    col(index).dt().to_string("%A").alias(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    const SALE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %Z";

    fn micros(y: i32, m: u32, d: u32) -> i64 {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_micros()
    }

    fn timestamps(table: &Table, name: &str) -> Vec<Option<i64>> {
        table
            .column(name)
            .unwrap()
            .cast(&DataType::Int64)
            .unwrap()
            .i64()
            .unwrap()
            .into_iter()
            .collect()
    }

    #[test]
    fn test_strip_utc_zone() {
        assert_eq!(
            strip_utc_zone("Tue, 01 Jan 2013 00:00:00 GMT"),
            Some("Tue, 01 Jan 2013 00:00:00")
        );
        assert_eq!(strip_utc_zone("Tue, 01 Jan 2013 00:00:00 PST"), None);
        assert_eq!(strip_utc_zone("GMT"), None);
    }

    #[test]
    fn test_parse_datetime_column_with_zone() {
        let mut table = Table::new(
            df!("sale_date" => [Some("Tue, 01 Jan 2013 00:00:00 GMT"), None]).unwrap(),
        );

        parse_datetime_column(&mut table, "sale_date", SALE_FORMAT).unwrap();

        assert!(matches!(
            table.column("sale_date").unwrap().dtype(),
            DataType::Datetime(TimeUnit::Microseconds, None)
        ));
        assert_eq!(
            timestamps(&table, "sale_date"),
            vec![Some(micros(2013, 1, 1)), None]
        );
    }

    #[test]
    fn test_parse_datetime_column_date_only() {
        let mut table = Table::new(df!("date" => ["2006-01-01"]).unwrap());
        parse_datetime_column(&mut table, "date", "%Y-%m-%d").unwrap();
        assert_eq!(timestamps(&table, "date"), vec![Some(micros(2006, 1, 1))]);
    }

    #[test]
    fn test_parse_datetime_column_rejects_unknown_zone() {
        let mut table =
            Table::new(df!("sale_date" => ["Tue, 01 Jan 2013 00:00:00 PST"]).unwrap());

        let err = parse_datetime_column(&mut table, "sale_date", SALE_FORMAT).unwrap_err();
        match err {
            PrepareError::DateParse { value, .. } => {
                assert_eq!(value, "Tue, 01 Jan 2013 00:00:00 PST")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_datetime_column_reports_value() {
        let mut table = Table::new(
            df!("sale_date" => ["Tue, 01 Jan 2013 00:00:00 GMT", "2013-01-01 00:00:00 GMT"])
                .unwrap(),
        );

        let err = parse_datetime_column(&mut table, "sale_date", SALE_FORMAT).unwrap_err();
        match err {
            PrepareError::DateParse { value, .. } => assert_eq!(value, "2013-01-01 00:00:00 GMT"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_calendar_columns() {
        let mut table = Table::new(df!("date" => [Some("2017-12-31"), None]).unwrap());
        parse_datetime_column(&mut table, "date", "%Y-%m-%d").unwrap();

        table
            .with_columns(vec![
                month_column("month", "date"),
                year_column("year", "date"),
                weekday_name_column("day_of_week", "date"),
            ])
            .unwrap();

        assert_eq!(table.value(0, "month"), Some(AnyValue::Int64(12)));
        assert_eq!(table.value(1, "month"), Some(AnyValue::Null));
        assert_eq!(table.value(0, "year"), Some(AnyValue::Int64(2017)));
        assert_eq!(
            table.column("day_of_week").unwrap().str().unwrap().get(0),
            Some("Sunday")
        );
    }
}
