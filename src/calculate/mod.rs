//! Column arithmetic and distribution summaries.
//!
//! - Null-propagating sums and products as polars expressions
//! - Lag-1 differences
//! - Equal-width histograms of numeric columns

use std::fmt;

use polars::prelude::*;

use crate::models::Table;

/// `a + b` as `Float64`; null where either side is null.
pub fn elementwise_sum(a: &str, b: &str) -> Expr {
    col(a).cast(DataType::Float64) + col(b).cast(DataType::Float64)
}

/// `a * b` as `Float64`; null where either side is null.
pub fn elementwise_product(a: &str, b: &str) -> Expr {
    col(a).cast(DataType::Float64) * col(b).cast(DataType::Float64)
}

/// `x[i] - x[i - 1]`; the first row has no predecessor and is null, as is
/// any difference touching a null.
pub fn first_difference(name: &str) -> Expr {
    col(name) - col(name).shift(lit(1))
}

/// One histogram bucket, `[lower, upper)`; the last bucket is closed.
#[derive(Debug, Clone, PartialEq)]
pub struct Bin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Distribution of one numeric column.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub column: String,
    pub bins: Vec<Bin>,

    /// Null cells left out of the counts
    pub missing: usize,
}

impl Histogram {
    /// Build a histogram of a column's numeric cells.
    pub fn of_column(column: &Column, bins: usize) -> PolarsResult<Self> {
        let floats = column.cast(&DataType::Float64)?;
        let values: Vec<f64> = floats.f64()?.into_iter().flatten().collect();
        Ok(Self {
            column: column.name().to_string(),
            bins: histogram(&values, bins),
            missing: column.len() - values.len(),
        })
    }

    pub fn total(&self) -> usize {
        self.bins.iter().map(|b| b.count).sum()
    }
}

impl fmt::Display for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const BAR_WIDTH: usize = 40;
        writeln!(f, "Distribution of {}", self.column)?;
        let peak = self.bins.iter().map(|b| b.count).max().unwrap_or(0).max(1);
        for bin in &self.bins {
            let bar = "#".repeat(bin.count * BAR_WIDTH / peak);
            writeln!(
                f,
                "  [{:>12.3}, {:>12.3}) {:>7} {}",
                bin.lower, bin.upper, bin.count, bar
            )?;
        }
        if self.missing > 0 {
            writeln!(f, "  missing: {}", self.missing)?;
        }
        Ok(())
    }
}

/// Equal-width histogram over the value range.
///
/// A constant input gets the range `[v - 0.5, v + 0.5]`. Empty input or zero
/// bins yield no buckets.
pub fn histogram(values: &[f64], bins: usize) -> Vec<Bin> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || bins == 0 {
        return Vec::new();
    }

    let mut lo = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let mut hi = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / bins as f64;

    let mut out: Vec<Bin> = (0..bins)
        .map(|i| Bin {
            lower: lo + width * i as f64,
            upper: if i + 1 == bins {
                hi
            } else {
                lo + width * (i + 1) as f64
            },
            count: 0,
        })
        .collect();

    for v in finite {
        let slot = (((v - lo) / width) as usize).min(bins - 1);
        out[slot].count += 1;
    }
    out
}

/// Histograms of every numeric data column; identifier and label columns
/// are skipped.
pub fn numeric_histograms(table: &Table, bins: usize) -> PolarsResult<Vec<Histogram>> {
    table
        .columns()
        .filter(|c| c.dtype().is_integer() || c.dtype().is_float())
        .map(|c| Histogram::of_column(c, bins))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluate(df: DataFrame, expr: Expr) -> Vec<Option<f64>> {
        let out = df.lazy().select([expr.alias("out")]).collect().unwrap();
        out.column("out")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect()
    }

    #[test]
    fn test_elementwise_sum_propagates_nulls() {
        let df = df!(
            "a" => [Some(1.0), None, Some(3.0)],
            "b" => [Some(2.0), Some(5.0), None]
        )
        .unwrap();
        assert_eq!(
            evaluate(df, elementwise_sum("a", "b")),
            vec![Some(3.0), None, None]
        );
    }

    #[test]
    fn test_elementwise_product_widens_integers() {
        let df = df!(
            "q" => [Some(5i64), Some(2)],
            "p" => [Some(2.0), None]
        )
        .unwrap();
        assert_eq!(
            evaluate(df, elementwise_product("q", "p")),
            vec![Some(10.0), None]
        );
    }

    #[test]
    fn test_first_difference() {
        let df = df!("x" => [Some(10.0), Some(4.0), None, Some(7.5)]).unwrap();
        assert_eq!(
            evaluate(df, first_difference("x")),
            vec![None, Some(-6.0), None, None]
        );

        let single = df!("x" => [1.0]).unwrap();
        assert_eq!(evaluate(single, first_difference("x")), vec![None]);
    }

    #[test]
    fn test_histogram_counts_every_value() {
        let values = [0.0, 1.0, 2.0, 3.0, 4.0, 10.0];
        let bins = histogram(&values, 5);

        assert_eq!(bins.len(), 5);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 6);
        assert_eq!(bins[0].lower, 0.0);
        assert_eq!(bins[4].upper, 10.0);
        assert_eq!(bins[4].count, 1);
    }

    #[test]
    fn test_histogram_constant_values() {
        let bins = histogram(&[3.0, 3.0], 2);
        assert_eq!(bins[0].lower, 2.5);
        assert_eq!(bins[1].upper, 3.5);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 2);
    }

    #[test]
    fn test_histogram_empty() {
        assert!(histogram(&[], 10).is_empty());
        assert!(histogram(&[1.0], 0).is_empty());
    }

    #[test]
    fn test_numeric_histograms_skip_non_numeric() {
        let table = Table::new(
            df!(
                "sale_id" => ["1", "2"],
                "sales_total" => [Some(1.0), None],
                "day_of_week" => ["Monday", "Tuesday"]
            )
            .unwrap(),
        );

        let hists = numeric_histograms(&table, 4).unwrap();

        assert_eq!(hists.len(), 1);
        assert_eq!(hists[0].column, "sales_total");
        assert_eq!(hists[0].missing, 1);
        assert_eq!(hists[0].total(), 1);
        assert!(hists[0].to_string().starts_with("Distribution of sales_total"));
    }
}
