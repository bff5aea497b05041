use polars::error::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObsDataError {
    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to read response body for {0}")]
    BodyRead(String, #[source] reqwest::Error),

    #[error("Service error for product '{product}': {message}")]
    Api {
        product: &'static str,
        message: String,
    },

    #[error("Failed to parse JSON response for product '{product}'")]
    JsonParse {
        product: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Could not parse '{value}' in field '{field}' as a number")]
    ValueParse {
        field: &'static str,
        value: String,
    },

    #[error("Response carried observations but no site metadata for product '{0}'")]
    MissingMetadata(&'static str),

    #[error("I/O error processing CSV data for station '{station}'")]
    CsvReadIo {
        station: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parsing error processing CSV data for station '{station}'")]
    CsvReadPolars {
        station: String,
        #[source]
        source: PolarsError,
    },

    #[error("Column '{column}' is missing from the CSV response for station '{station}'")]
    MissingCsvColumn {
        station: String,
        column: &'static str,
    },

    #[error("No variable is known for code '{0}'")]
    UnknownVariableCode(String),

    #[error("No tide extreme is known for tag '{0}'")]
    UnknownExtremeTag(String),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),
}
