//! Tunable knobs for ingestion, acquisition and cropping.
//!
//! Every struct has a `bon` builder with the defaults listed on its fields and
//! deserializes from JSON, with missing keys falling back to those defaults.

use crate::error::StationTwinError;
use bon::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_plausible_ranges() -> HashMap<String, (f64, f64)> {
    HashMap::from([
        ("htu_hum".to_string(), (0.0, 100.0)),
        ("bmp280_pres".to_string(), (900.0, 1200.0)),
        ("bmp180_pres".to_string(), (700.0, 1000.0)),
    ])
}

/// Options for turning raw station logs into an hourly series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[serde(default)]
pub struct IngestOptions {
    /// Only read the first `max_files` log files (sorted by name).
    pub max_files: Option<usize>,
    /// Upper bound on log files parsed concurrently.
    #[builder(default = default_workers())]
    pub workers: usize,
    /// Raw value standing for "no reading" in any channel.
    #[builder(default = -999.99)]
    pub missing_sentinel: f64,
    /// Plausible range of a single temperature sensor, in °C.
    #[builder(default = (-45.0, 45.0))]
    pub temperature_range: (f64, f64),
    /// Extra per-column plausibility ranges applied before aggregation.
    #[builder(default = default_plausible_ranges())]
    pub plausible_ranges: HashMap<String, (f64, f64)>,
    /// An hour with more missing samples than this is missing.
    #[builder(default = 20)]
    pub max_missing_per_hour: u32,
    /// An hour whose samples take this many distinct values or fewer is treated
    /// as a frozen sensor (precipitation excluded).
    #[builder(default = 3)]
    pub frozen_distinct_values: u32,
    /// Keep the concatenated raw readings next to the hourly series.
    #[builder(default = false)]
    pub keep_original: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Options for planning and issuing reanalysis requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[serde(default)]
pub struct AcquisitionOptions {
    /// A year with at least this many months of station data is fetched in
    /// one whole-year request; sparser years are fetched month by month.
    #[builder(default = 12)]
    pub year_request_min_months: usize,
    /// Extension given to downloaded provider files.
    #[builder(default = "nc".to_string())]
    pub file_extension: String,
}

impl Default for AcquisitionOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Options for carving a station window out of a reanalysis grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[serde(default)]
pub struct CropOptions {
    /// Side length N of the square N×N window.
    #[builder(default = 8)]
    pub window: usize,
    /// Channel the reconstruction model is trained on.
    #[builder(default = crate::types::channel::UNIFIED_TEMPERATURE.to_string())]
    pub target_channel: String,
}

impl Default for CropOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Builder)]
#[serde(default)]
pub struct PipelineOptions {
    #[builder(default)]
    pub ingest: IngestOptions,
    #[builder(default)]
    pub acquisition: AcquisitionOptions,
    #[builder(default)]
    pub crop: CropOptions,
    /// Parent of the per-run scratch directories. Defaults to the user cache dir.
    pub scratch_root: Option<PathBuf>,
}

impl PipelineOptions {
    /// Loads options from a JSON file; absent keys keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, StationTwinError> {
        let bytes = std::fs::read(path)
            .map_err(|e| StationTwinError::ConfigRead(path.to_path_buf(), e))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| StationTwinError::ConfigParse(path.to_path_buf(), e))
    }
}
