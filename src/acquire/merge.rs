//! Denormalizing join of sales, stores and items.

use tracing::{info, warn};

use crate::models::{Table, TableError};

/// Foreign-key pairs used by [`merge_store_data`].
#[derive(Debug, Clone)]
pub struct MergeKeys {
    pub sale_store: String,
    pub store_id: String,
    pub sale_item: String,
    pub item_id: String,
}

impl Default for MergeKeys {
    fn default() -> Self {
        Self {
            sale_store: "store".to_string(),
            store_id: "store_id".to_string(),
            sale_item: "item".to_string(),
            item_id: "item_id".to_string(),
        }
    }
}

/// `sales ⋈ stores` on `store == store_id`, then `⋈ items` on
/// `item == item_id`, dropping the sales-side foreign keys.
///
/// Both joins are inner: a sale whose store or item is unknown is dropped,
/// so the result never has more rows than `sales` when the id columns are
/// unique. Row order follows `sales`.
pub fn merge_store_data(
    sales: &Table,
    stores: &Table,
    items: &Table,
    keys: &MergeKeys,
) -> Result<Table, TableError> {
    let mut df = sales.inner_join(stores, &keys.sale_store, &keys.store_id)?;
    df.drop_columns(&[keys.sale_store.as_str()])?;

    let mut df = df.inner_join(items, &keys.sale_item, &keys.item_id)?;
    df.drop_columns(&[keys.sale_item.as_str()])?;

    let dropped = sales.len().saturating_sub(df.len());
    if dropped > 0 {
        warn!("Dropped {} sales with an unknown store or item", dropped);
    }
    info!(
        "Merged {} sales with {} stores and {} items into {} rows",
        sales.len(),
        stores.len(),
        items.len(),
        df.len()
    );
    Ok(df)
}
