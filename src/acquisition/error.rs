use crate::acquisition::downloader::DownloadError;
use crate::acquisition::request::AcquisitionRequest;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("Request for {request} failed")]
    RequestFailed {
        request: AcquisitionRequest,
        #[source]
        source: DownloadError,
    },

    #[error("Request for {request} reported success but wrote no file at '{path}'")]
    MissingOutput {
        request: AcquisitionRequest,
        path: PathBuf,
    },

    #[error("Failed to create download directory '{0}'")]
    DestinationCreation(PathBuf, #[source] std::io::Error),
}
