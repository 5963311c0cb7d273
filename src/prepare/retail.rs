//! Retail sales preparation.

use polars::prelude::*;
use tracing::{debug, info};

use super::{month_column, parse_datetime_column, weekday_name_column, PrepareError};
use crate::calculate::{elementwise_product, first_difference};
use crate::models::Table;

/// Identifier columns re-typed to opaque string labels.
pub const IDENTIFIER_COLUMNS: &[&str] = &[
    "sale_id",
    "store_id",
    "store_zipcode",
    "item_id",
    "item_upc12",
    "item_upc14",
];

/// Calendar columns re-typed to string labels.
pub const CALENDAR_COLUMNS: &[&str] = &["month", "day_of_week"];

/// Prepare the merged store table.
///
/// Parses `sale_date` with `sale_date_format` and makes it the sorted
/// index, derives `month` and `day_of_week`, renames `sale_amount` to
/// `quantity`, adds `sales_total` and `sales_diff`, and re-types the
/// identifier and calendar columns.
///
/// `sales_diff` is a plain lag-1 difference over the whole table in time
/// order, not grouped by store or item.
pub fn prep_store_data(mut df: Table, sale_date_format: &str) -> Result<Table, PrepareError> {
    parse_datetime_column(&mut df, "sale_date", sale_date_format)?;
    df.set_index("sale_date")?;
    df.sort_by_index()?;
    debug!("Sorted {} sales by sale_date", df.len());

    df.with_columns(vec![
        month_column("month", "sale_date"),
        weekday_name_column("day_of_week", "sale_date"),
    ])?;

    df.rename_columns(&[("sale_amount", "quantity")])?;

    add_sales_total(&mut df)?;
    add_sales_diff(&mut df)?;

    let casts: Vec<(&str, DataType)> = IDENTIFIER_COLUMNS
        .iter()
        .chain(CALENDAR_COLUMNS)
        .map(|name| (*name, DataType::String))
        .collect();
    df.cast_columns(&casts)?;

    info!("Prepared store data: {} rows, {} columns", df.len(), df.width());
    Ok(df)
}

/// `sales_total = quantity * item_price`, as floats.
pub fn add_sales_total(df: &mut Table) -> Result<(), PrepareError> {
    df.column("quantity")?;
    df.column("item_price")?;
    df.with_columns(vec![
        elementwise_product("quantity", "item_price").alias("sales_total")
    ])?;
    Ok(())
}

/// `sales_diff` = change in `sales_total` from the previous row.
pub fn add_sales_diff(df: &mut Table) -> Result<(), PrepareError> {
    df.column("sales_total")?;
    df.with_columns(vec![first_difference("sales_total").alias("sales_diff")])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FORMAT: &str = "%a, %d %b %Y %H:%M:%S %Z";

    fn merged(rows: &[(i64, i64, f64, &str)]) -> Table {
        let n = rows.len();
        Table::new(
            df!(
                "sale_id" => rows.iter().map(|r| r.0).collect::<Vec<_>>(),
                "sale_amount" => rows.iter().map(|r| r.1).collect::<Vec<_>>(),
                "item_price" => rows.iter().map(|r| r.2).collect::<Vec<_>>(),
                "sale_date" => rows.iter().map(|r| r.3).collect::<Vec<_>>(),
                "store_id" => vec![1i64; n],
                "store_zipcode" => vec![78253i64; n],
                "item_id" => vec![1i64; n],
                "item_upc12" => vec![35200264013i64; n],
                "item_upc14" => vec![35200264013i64; n]
            )
            .unwrap(),
        )
    }

    fn floats(table: &Table, name: &str) -> Vec<Option<f64>> {
        table
            .column(name)
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect()
    }

    fn strs(table: &Table, name: &str) -> Vec<Option<String>> {
        table
            .column(name)
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect()
    }

    #[test]
    fn test_prep_sorts_by_sale_date_and_derives_fields() {
        let df = merged(&[
            (2, 3, 1.5, "Wed, 03 Jan 2018 00:00:00 GMT"),
            (1, 5, 2.0, "Mon, 01 Jan 2018 00:00:00 GMT"),
            (3, 1, 4.0, "Thu, 01 Feb 2018 00:00:00 GMT"),
        ]);

        let out = prep_store_data(df, FORMAT).unwrap();

        assert_eq!(out.index_name(), Some("sale_date"));
        assert!(matches!(
            out.index_column().unwrap().dtype(),
            DataType::Datetime(_, _)
        ));
        assert_eq!(
            strs(&out, "sale_id"),
            vec![Some("1".into()), Some("2".into()), Some("3".into())]
        );
        assert_eq!(
            strs(&out, "month"),
            vec![Some("1".into()), Some("1".into()), Some("2".into())]
        );
        assert_eq!(strs(&out, "day_of_week")[1], Some("Wednesday".into()));
        assert!(!out.has_column("sale_amount"));
        assert_eq!(out.value(0, "quantity"), Some(AnyValue::Int64(5)));
    }

    #[test]
    fn test_sales_total_is_quantity_times_price() {
        let df = merged(&[
            (1, 5, 2.0, "Mon, 01 Jan 2018 00:00:00 GMT"),
            (2, 3, 1.5, "Tue, 02 Jan 2018 00:00:00 GMT"),
            (3, 7, 0.1, "Wed, 03 Jan 2018 00:00:00 GMT"),
        ]);

        let out = prep_store_data(df, FORMAT).unwrap();

        assert_eq!(
            floats(&out, "sales_total"),
            vec![Some(5.0 * 2.0), Some(3.0 * 1.5), Some(7.0 * 0.1)]
        );
    }

    #[test]
    fn test_sales_diff_is_lag_one_in_time_order() {
        let df = merged(&[
            (2, 3, 1.0, "Tue, 02 Jan 2018 00:00:00 GMT"),
            (1, 5, 2.0, "Mon, 01 Jan 2018 00:00:00 GMT"),
            (3, 4, 1.0, "Wed, 03 Jan 2018 00:00:00 GMT"),
        ]);

        let out = prep_store_data(df, FORMAT).unwrap();

        assert_eq!(floats(&out, "sales_diff"), vec![None, Some(-7.0), Some(1.0)]);
    }

    #[test]
    fn test_identifier_and_calendar_retyping() {
        let df = merged(&[(1, 5, 2.0, "Mon, 01 Jan 2018 00:00:00 GMT")]);
        let out = prep_store_data(df, FORMAT).unwrap();

        for name in IDENTIFIER_COLUMNS.iter().chain(CALENDAR_COLUMNS) {
            assert_eq!(out.column(name).unwrap().dtype(), &DataType::String);
        }
        assert_eq!(out.column("quantity").unwrap().dtype(), &DataType::Int64);
        assert_eq!(out.column("item_upc12").unwrap().str().unwrap().get(0), Some("35200264013"));
    }

    #[test]
    fn test_bad_sale_date_fails() {
        let df = merged(&[(1, 5, 2.0, "2018-01-01T00:00:00Z")]);
        assert!(matches!(
            prep_store_data(df, FORMAT),
            Err(PrepareError::DateParse { .. })
        ));
    }

    #[test]
    fn test_missing_identifier_column_fails() {
        let mut df = merged(&[(1, 5, 2.0, "Mon, 01 Jan 2018 00:00:00 GMT")]);
        df.drop_columns(&["item_upc14"]).unwrap();
        assert!(matches!(
            prep_store_data(df, FORMAT),
            Err(PrepareError::Table(_))
        ));
    }

    #[test]
    fn test_single_row_sales_diff_is_null_float() {
        let df = merged(&[(1, 5, 2.0, "Mon, 01 Jan 2018 00:00:00 GMT")]);
        let out = prep_store_data(df, FORMAT).unwrap();

        assert_eq!(floats(&out, "sales_total"), vec![Some(10.0)]);
        assert_eq!(floats(&out, "sales_diff"), vec![None]);
        assert_eq!(out.column("sales_diff").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn test_null_price_gives_float_nulls() {
        let mut df = Table::new(
            df!(
                "quantity" => [Some(5i64), None],
                "item_price" => [None::<f64>, None]
            )
            .unwrap(),
        );

        add_sales_total(&mut df).unwrap();
        add_sales_diff(&mut df).unwrap();

        assert_eq!(df.column("sales_total").unwrap().dtype(), &DataType::Float64);
        assert_eq!(floats(&df, "sales_total"), vec![None, None]);
        assert_eq!(floats(&df, "sales_diff"), vec![None, None]);
    }
}
