//! # Retail Prep
//!
//! Acquires and prepares two tabular datasets for exploratory analysis.
//!
//! ## Architecture
//!
//! - **models**: Indexed tables over polars dataframes
//! - **fetch**: HTTP page source and the paginated retail API client
//! - **storage**: CSV-backed table cache
//! - **acquire**: Cached acquisition and the sales/stores/items merge
//! - **prepare**: Retail and energy preparation (dates, derived columns, retyping)
//! - **calculate**: Column arithmetic and histograms
//! - **config**: Configuration loading and validation

pub mod acquire;
pub mod calculate;
pub mod config;
pub mod fetch;
pub mod models;
pub mod prepare;
pub mod storage;

pub use models::*;
