//! The capability that fetches reanalysis files, and an HTTP implementation
//! speaking the ERA5 single-levels request format.

use crate::types::location::{normalize_longitude, LatLon};
use crate::types::period::{days_in_month, Month, Year};
use bon::Builder;
use chrono::{Datelike, NaiveDate};
use futures_util::TryStreamExt;
use log::{info, warn};
use reqwest::Client;
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Network request failed for {url}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to write download to '{0}'")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Provider rejected the request: {0}")]
    Rejected(String),
}

/// Fetches one provider-native file per call and writes it to `destination`.
///
/// Implementations must either write the file completely or return an error.
pub trait Downloader: Send + Sync {
    /// Selected hours (0-23) of one day.
    fn fetch_hours(
        &self,
        date: NaiveDate,
        hours: &[u32],
        destination: &Path,
    ) -> impl Future<Output = Result<(), DownloadError>> + Send;

    fn fetch_month(
        &self,
        month: Month,
        destination: &Path,
    ) -> impl Future<Output = Result<(), DownloadError>> + Send;

    fn fetch_year(
        &self,
        year: Year,
        destination: &Path,
    ) -> impl Future<Output = Result<(), DownloadError>> + Send;
}

fn default_variables() -> Vec<String> {
    [
        "2m_temperature",
        "total_precipitation",
        "10m_u_component_of_wind",
        "10m_v_component_of_wind",
        "surface_pressure",
    ]
    .iter()
    .map(|v| v.to_string())
    .collect()
}

/// Body of one ERA5 retrieval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Era5Request {
    pub dataset: String,
    pub product_type: String,
    pub format: String,
    pub variable: Vec<String>,
    /// North, west, south, east. Longitudes in `[0, 360)`.
    pub area: [f64; 4],
    pub year: Vec<String>,
    pub month: Vec<String>,
    pub day: Vec<String>,
    pub time: Vec<String>,
}

fn padded(values: impl IntoIterator<Item = u32>) -> Vec<String> {
    values.into_iter().map(|v| format!("{:02}", v)).collect()
}

fn times(hours: impl IntoIterator<Item = u32>) -> Vec<String> {
    hours.into_iter().map(|h| format!("{:02}:00", h)).collect()
}

/// Downloads ERA5 files for a box around one station through an HTTP API.
///
/// ```
/// use station_twin::{Era5HttpDownloader, LatLon};
///
/// let downloader = Era5HttpDownloader::builder()
///     .endpoint("https://example.org/api/retrieve")
///     .location(LatLon(13.2, -59.5))
///     .margin(2.0)
///     .build();
/// ```
#[derive(Debug, Clone, Builder)]
pub struct Era5HttpDownloader {
    #[builder(into)]
    endpoint: String,
    location: LatLon,
    /// Degrees added around the station on every side.
    #[builder(default = 1.0)]
    margin: f64,
    #[builder(default = default_variables())]
    variables: Vec<String>,
    #[builder(into, default = "reanalysis-era5-single-levels".to_string())]
    dataset: String,
    #[builder(into, default = "netcdf".to_string())]
    format: String,
    #[builder(default)]
    client: Client,
}

impl Era5HttpDownloader {
    fn area(&self) -> [f64; 4] {
        let north = (self.location.latitude() + self.margin).min(90.0);
        let south = (self.location.latitude() - self.margin).max(-90.0);
        let west = normalize_longitude(self.location.longitude() - self.margin);
        let east = normalize_longitude(self.location.longitude() + self.margin);
        [north, west, south, east]
    }

    fn request(&self, year: i32, month: Vec<String>, day: Vec<String>, time: Vec<String>) -> Era5Request {
        Era5Request {
            dataset: self.dataset.clone(),
            product_type: "reanalysis".to_string(),
            format: self.format.clone(),
            variable: self.variables.clone(),
            area: self.area(),
            year: vec![format!("{:04}", year)],
            month,
            day,
            time,
        }
    }

    pub fn hours_request(&self, date: NaiveDate, hours: &[u32]) -> Era5Request {
        self.request(
            date.year(),
            padded([date.month()]),
            padded([date.day()]),
            times(hours.iter().copied()),
        )
    }

    pub fn month_request(&self, month: Month) -> Era5Request {
        let days = days_in_month(month.year(), month.month()).unwrap_or(31);
        self.request(month.year(), padded([month.month()]), padded(1..=days), times(0..24))
    }

    pub fn year_request(&self, year: Year) -> Era5Request {
        self.request(year.get(), padded(1..=12), padded(1..=31), times(0..24))
    }

    /// Posts a request and streams the response body into `destination`.
    ///
    /// The body lands in a `.part` file first and is renamed on completion, so
    /// `destination` never holds a partial download.
    async fn retrieve(&self, body: &Era5Request, destination: &Path) -> Result<(), DownloadError> {
        let url = self.endpoint.clone();
        info!("Requesting {} {:?}/{:?} into {}", body.dataset, body.year, body.month, destination.display());

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| DownloadError::Network {
                url: url.clone(),
                source: e,
            })?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", url, e);
                return Err(if let Some(status) = e.status() {
                    DownloadError::HttpStatus {
                        url,
                        status,
                        source: e,
                    }
                } else {
                    DownloadError::Network { url, source: e }
                });
            }
        };

        let partial = destination.with_extension("part");
        let stream = response.bytes_stream().map_err(std::io::Error::other);
        let mut reader = StreamReader::new(stream);
        let mut file = tokio::fs::File::create(&partial)
            .await
            .map_err(|e| DownloadError::Io(partial.clone(), e))?;
        let written = tokio::io::copy(&mut reader, &mut file)
            .await
            .map_err(|e| DownloadError::Io(partial.clone(), e))?;
        file.flush()
            .await
            .map_err(|e| DownloadError::Io(partial.clone(), e))?;
        drop(file);
        tokio::fs::rename(&partial, destination)
            .await
            .map_err(|e| DownloadError::Io(destination.to_path_buf(), e))?;

        info!("Downloaded {} bytes to {}", written, destination.display());
        Ok(())
    }
}

impl Downloader for Era5HttpDownloader {
    async fn fetch_hours(
        &self,
        date: NaiveDate,
        hours: &[u32],
        destination: &Path,
    ) -> Result<(), DownloadError> {
        let body = self.hours_request(date, hours);
        self.retrieve(&body, destination).await
    }

    async fn fetch_month(&self, month: Month, destination: &Path) -> Result<(), DownloadError> {
        let body = self.month_request(month);
        self.retrieve(&body, destination).await
    }

    async fn fetch_year(&self, year: Year, destination: &Path) -> Result<(), DownloadError> {
        let body = self.year_request(year);
        self.retrieve(&body, destination).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn downloader() -> Era5HttpDownloader {
        Era5HttpDownloader::builder()
            .endpoint("http://localhost:9/retrieve")
            .location(LatLon(13.2, -0.5))
            .build()
    }

    #[test]
    fn test_area_wraps_longitudes() {
        let area = downloader().area();
        assert!((area[0] - 14.2).abs() < 1e-9);
        assert!((area[1] - 358.5).abs() < 1e-9);
        assert!((area[2] - 12.2).abs() < 1e-9);
        assert!((area[3] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_request_lists_are_zero_padded() {
        let date = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
        let hours = downloader().hours_request(date, &[5, 6, 7]);
        assert_eq!(hours.year, vec!["2020"]);
        assert_eq!(hours.month, vec!["01"]);
        assert_eq!(hours.day, vec!["02"]);
        assert_eq!(hours.time, vec!["05:00", "06:00", "07:00"]);

        let february = downloader().month_request(Month::new(2, 2020));
        assert_eq!(february.day.len(), 29);
        assert_eq!(february.time.len(), 24);

        let year = downloader().year_request(Year(2021));
        assert_eq!(year.month.len(), 12);
        assert_eq!(year.day.last().map(String::as_str), Some("31"));
    }

    #[test]
    fn test_request_serializes_as_provider_json() {
        let body = downloader().month_request(Month::new(3, 2021));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["product_type"], "reanalysis");
        assert_eq!(json["variable"][0], "2m_temperature");
        assert_eq!(json["area"].as_array().map(Vec::len), Some(4));
        assert_eq!(json["format"], "netcdf");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_a_network_error() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("year_2021.nc");
        let result = downloader().fetch_year(Year(2021), &destination).await;
        assert!(matches!(result, Err(DownloadError::Network { .. })));
        assert!(!destination.exists());
    }
}
