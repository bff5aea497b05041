//! Classifies which rows of a fetched batch are genuinely new.

use crate::store::error::StoreError;
use polars::prelude::*;

/// Returns the rows of `batch` whose identity-key tuple does not occur in
/// `existing`. Key equality only: two rows with the same key but different
/// payload columns still count as the same observation.
///
/// An anti join keeps the batch's own schema, column order and rows, so the
/// result can be appended as-is without reconciling join artifacts.
pub(crate) fn left_only(
    batch: &DataFrame,
    existing: &DataFrame,
    key_columns: &[&str],
) -> Result<DataFrame, StoreError> {
    for column in key_columns {
        for frame in [batch, existing] {
            if frame.column(column).is_err() {
                return Err(StoreError::MissingIdentityColumn {
                    column: column.to_string(),
                });
            }
        }
    }
    let keys: Vec<Expr> = key_columns.iter().map(|name| col(*name)).collect();
    let fresh = batch
        .clone()
        .lazy()
        .join(
            existing.clone().lazy(),
            keys.clone(),
            keys,
            JoinArgs::new(JoinType::Anti),
        )
        .collect()?;
    Ok(fresh)
}
