use crate::obs_data::error::ObsDataError;
use crate::store::error::StoreError;
use polars::error::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TidestoreError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    ObsData(#[from] ObsDataError),

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),

    #[error("Failed to determine a local data directory for the store")]
    StoreDirResolution,
}
