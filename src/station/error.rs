use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Station directory '{0}' does not exist or is not a directory")]
    StationDirectoryNotFound(PathBuf),

    #[error("Failed to list station directory '{0}'")]
    DirectoryRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to read descriptive record '{0}'")]
    MetadataRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to read log file '{path}'")]
    LogRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Log file '{path}' is empty")]
    EmptyLog { path: PathBuf },

    #[error("Log file '{path}' lacks timestamp columns (found: {found:?})")]
    MissingTimestampColumns { path: PathBuf, found: Vec<String> },

    #[error("Failed to write station series to '{0}'")]
    SeriesWrite(PathBuf, #[source] PolarsError),

    #[error("I/O error writing station series to '{0}'")]
    SeriesWriteIo(PathBuf, #[source] std::io::Error),

    #[error("Station series index is invalid: {0}")]
    InvalidIndex(String),

    #[error("Station '{station}' produced no readings")]
    EmptySeries { station: String },

    #[error("Required column '{0}' not found in station series")]
    ColumnNotFound(String, #[source] PolarsError),

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
