use crate::acquisition::error::AcquisitionError;
use crate::grid::error::GridError;
use crate::station::error::IngestError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StationTwinError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error("Station '{0}' has no known coordinate; cannot align it with a grid")]
    StationWithoutCoordinate(String),

    #[error("Failed to read options file '{0}'")]
    ConfigRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse options file '{0}'")]
    ConfigParse(PathBuf, #[source] serde_json::Error),

    #[error("Failed to create scratch directory '{0}'")]
    ScratchDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Scratch path '{0}' exists but is not a directory")]
    ScratchPathNotDirectory(PathBuf),

    #[error("Failed to determine scratch directory")]
    ScratchDirResolution,
}
