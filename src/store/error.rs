use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to create store directory '{0}'")]
    StoreDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to scan table file '{0}'")]
    ParquetScan(PathBuf, #[source] PolarsError),

    #[error("I/O error writing table file '{0}'")]
    ParquetWriteIo(PathBuf, #[source] std::io::Error),

    #[error("Encoding error writing table file '{0}'")]
    ParquetWritePolars(PathBuf, #[source] PolarsError),

    #[error("Failed to replace table file '{0}'")]
    PersistTempFile(PathBuf, #[source] std::io::Error),

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),

    #[error("Batch column '{column}' does not exist in table '{table}'")]
    UnknownColumn { table: &'static str, column: String },

    #[error("Identity column '{column}' is missing from the batch")]
    MissingIdentityColumn { column: String },

    #[error("Column '{column}' has dtype {dtype}, expected a timestamp or string column")]
    NotATimestamp { column: String, dtype: String },

    #[error("Could not parse '{value}' as a timestamp")]
    TimestampParse { value: String },

    // The find-or-insert re-read coming back empty means the write was lost;
    // there is no retry path.
    #[error("No '{code}' row found in table '{table}' after insert")]
    LookupFailure { table: &'static str, code: String },

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
