//! German daily power generation preparation.

use polars::prelude::*;
use tracing::info;

use super::{month_column, parse_datetime_column, year_column, PrepareError};
use crate::calculate::elementwise_sum;
use crate::models::Table;

/// Upstream column replaced by [`WIND_AND_SOLAR`].
pub const UPSTREAM_WIND_SOLAR: &str = "wind+solar";

/// Combined wind and solar output column.
pub const WIND_AND_SOLAR: &str = "wind_&_solar";

/// Prepare the energy table.
///
/// Lower-cases column names, replaces the upstream `wind+solar` column
/// with `wind_&_solar`, makes the parsed `date` the sorted index, derives
/// `month` and `year`, then fills every remaining null with zero.
pub fn prep_german_data(mut df: Table, date_format: &str) -> Result<Table, PrepareError> {
    df.map_column_names(|name| name.to_lowercase())?;

    combine_wind_solar(&mut df)?;
    df.drop_columns(&[UPSTREAM_WIND_SOLAR])?;

    parse_datetime_column(&mut df, "date", date_format)?;
    df.set_index("date")?;
    df.sort_by_index()?;

    df.with_columns(vec![month_column("month", "date"), year_column("year", "date")])?;

    df.fill_nulls_with_zero()?;

    info!("Prepared energy data: {} rows, {} columns", df.len(), df.width());
    Ok(df)
}

/// Add `wind_&_solar = wind + solar`, null wherever either input is null.
pub fn combine_wind_solar(df: &mut Table) -> Result<(), PrepareError> {
    df.column("wind")?;
    df.column("solar")?;
    df.with_columns(vec![elementwise_sum("wind", "solar").alias(WIND_AND_SOLAR)])?;
    Ok(())
}
