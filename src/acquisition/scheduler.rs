use crate::acquisition::downloader::Downloader;
use crate::acquisition::error::AcquisitionError;
use crate::acquisition::request::AcquisitionRequest;
use crate::progress::ProgressSink;
use log::{error, info};
use std::path::{Path, PathBuf};

/// Issues acquisition requests one after another through a [`Downloader`].
///
/// The first failing request aborts the run; nothing after it is attempted.
pub struct AcquisitionScheduler<'a, D: Downloader> {
    downloader: &'a D,
    file_extension: String,
}

impl<'a, D: Downloader> AcquisitionScheduler<'a, D> {
    pub fn new(downloader: &'a D, file_extension: impl Into<String>) -> Self {
        Self {
            downloader,
            file_extension: file_extension.into(),
        }
    }

    pub fn destination(&self, request: &AcquisitionRequest, directory: &Path) -> PathBuf {
        directory.join(format!("{}.{}", request.file_stem(), self.file_extension))
    }

    /// Runs every request in order, writing one file per request into `directory`.
    ///
    /// Returns the written files in request order.
    pub async fn run(
        &self,
        requests: &[AcquisitionRequest],
        directory: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<PathBuf>, AcquisitionError> {
        tokio::fs::create_dir_all(directory)
            .await
            .map_err(|e| AcquisitionError::DestinationCreation(directory.to_path_buf(), e))?;

        progress.set_phase("downloading reanalysis data");
        let mut written = Vec::with_capacity(requests.len());
        for (i, request) in requests.iter().enumerate() {
            let destination = self.destination(request, directory);
            info!("Fetching {} ({}/{})", request, i + 1, requests.len());

            let result = match request {
                AcquisitionRequest::Hours { date, hours } => {
                    self.downloader.fetch_hours(*date, hours, &destination).await
                }
                AcquisitionRequest::Month(month) => {
                    self.downloader.fetch_month(*month, &destination).await
                }
                AcquisitionRequest::Year(year) => {
                    self.downloader.fetch_year(*year, &destination).await
                }
            };
            if let Err(source) = result {
                error!("Request for {} failed: {}", request, source);
                return Err(AcquisitionError::RequestFailed {
                    request: request.clone(),
                    source,
                });
            }
            if tokio::fs::metadata(&destination).await.is_err() {
                return Err(AcquisitionError::MissingOutput {
                    request: request.clone(),
                    path: destination,
                });
            }

            written.push(destination);
            progress.set_percentage((i + 1) as f64 / requests.len() as f64 * 100.0);
        }
        Ok(written)
    }
}
