use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GridError {
    #[error("Source directory '{0}' does not exist")]
    SourceDirectoryMissing(PathBuf),

    #[error("Failed to list source directory '{0}'")]
    SourceDirectoryRead(PathBuf, #[source] std::io::Error),

    #[error("Source directory '{0}' is empty")]
    EmptySourceDirectory(PathBuf),

    #[error("Source directory '{0}' contains no convertible grid files")]
    NoConvertibleFiles(PathBuf),

    #[error("Merging produced no output file at '{0}'")]
    MergeProducedNoOutput(PathBuf),

    #[error("Failed to decode grid file '{path}': {message}")]
    Decode { path: PathBuf, message: String },

    #[error("Failed to read grid file '{0}'")]
    FileRead(PathBuf, #[source] std::io::Error),

    #[error("I/O error writing grid file '{0}'")]
    FileWriteIo(PathBuf, #[source] std::io::Error),

    #[error("Encoding error writing grid file '{0}'")]
    FileWritePolars(PathBuf, #[source] PolarsError),

    #[error("Latitude axis is not strictly descending")]
    LatitudeNotDescending,

    #[error("Longitude axis has a duplicate value at {0}")]
    LongitudeNotUnique(f64),

    #[error("Time axis is not strictly increasing at index {0}")]
    TimeNotIncreasing(usize),

    #[error("Channel '{channel}' has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        channel: String,
        expected: (usize, usize, usize),
        found: Vec<usize>,
    },

    #[error("Grids cannot be merged: {0}")]
    AxisMismatch(String),

    #[error("Grid has no channel '{0}'")]
    ChannelNotFound(String),

    #[error("Channel '{0}' could not be converted: {1}")]
    ChannelConversion(String, String),

    #[error("Window size must be positive")]
    InvalidWindow,

    #[error("{axis} window {start}..={end} exceeds the grid's {len} cells")]
    WindowOutOfBounds {
        axis: &'static str,
        start: i64,
        end: i64,
        len: usize,
    },

    #[error("Grid has an empty {0} axis")]
    EmptyAxis(&'static str),

    #[error("No grid timesteps overlap the station series")]
    NoOverlappingTimesteps,

    #[error("Training pair is inconsistent: {0}")]
    TrainingPairMismatch(String),

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
