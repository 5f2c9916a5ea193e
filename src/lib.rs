mod error;
pub mod acquisition;
pub mod grid;
pub mod options;
pub mod pipeline;
pub mod progress;
pub mod station;
pub mod types;
mod utils;

pub use error::StationTwinError;
pub use pipeline::*;

pub use options::{AcquisitionOptions, CropOptions, IngestOptions, PipelineOptions};
pub use progress::{LogProgress, NoProgress, ProgressSink, ProgressStatus};

pub use types::channel::{ChannelKind, DATETIME_COLUMN, UNIFIED_TEMPERATURE};
pub use types::location::{LatLon, StationMetadata};
pub use types::period::{Month, Year};

pub use station::error::IngestError;
pub use station::gaps::GapList;
pub use station::series::StationSeries;
pub use station::station_data::StationData;

pub use acquisition::downloader::{DownloadError, Downloader, Era5HttpDownloader};
pub use acquisition::error::AcquisitionError;
pub use acquisition::request::AcquisitionRequest;
pub use acquisition::scheduler::AcquisitionScheduler;

pub use grid::bridge::FormatBridge;
pub use grid::cropper::{GridCropper, GridLocation};
pub use grid::error::GridError;
pub use grid::reanalysis::ReanalysisGrid;
#[cfg(feature = "netcdf")]
pub use grid::netcdf_decoder::NetcdfGridDecoder;
