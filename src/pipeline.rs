//! End-to-end preparation of one station: from its log directory to grids the
//! reconstruction model can train or be evaluated on.
//!
//! Each [`StationTwin`] owns a private scratch directory that is removed when
//! it is dropped, so several stations can be processed side by side.

use crate::acquisition::downloader::Downloader;
use crate::acquisition::planner::{plan_full_period, plan_gap_only};
use crate::acquisition::request::AcquisitionRequest;
use crate::acquisition::scheduler::AcquisitionScheduler;
use crate::error::StationTwinError;
use crate::grid::bridge::FormatBridge;
use crate::grid::cropper::{GridCropper, GridLocation};
use crate::grid::error::GridError;
use crate::grid::fill::{cleaned_copy, fill_channel_from_series, validate_training_pair};
use crate::grid::grid_file::write_grid;
use crate::grid::reanalysis::ReanalysisGrid;
use crate::options::PipelineOptions;
use crate::progress::ProgressSink;
use crate::station::gaps::GapList;
use crate::station::station_data::StationData;
use crate::types::location::LatLon;
use crate::utils::{ensure_dir_exists, get_scratch_root};
use log::{info, warn};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::task;

/// Paired grids for one training run.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    /// Reanalysis window around the station, restricted to hours the station observed.
    pub input: ReanalysisGrid,
    /// The same window with the target channel replaced by the station's own values.
    pub target: ReanalysisGrid,
    pub input_path: PathBuf,
    pub target_path: PathBuf,
}

/// Grids covering the hours a station is missing.
#[derive(Debug, Clone)]
pub struct EvaluationSet {
    pub gaps: GapList,
    /// Reanalysis window around the station at the missing hours.
    pub input: ReanalysisGrid,
    /// The input with the target channel blanked, to be filled by the model.
    pub cleaned: ReanalysisGrid,
    pub location: GridLocation,
    pub input_path: PathBuf,
}

pub struct StationTwin<D: Downloader> {
    station: StationData,
    downloader: D,
    bridge: FormatBridge,
    options: PipelineOptions,
    scratch: TempDir,
}

impl<D: Downloader> StationTwin<D> {
    /// Wraps an already loaded station and creates its scratch directory.
    pub async fn new(
        station: StationData,
        downloader: D,
        options: PipelineOptions,
    ) -> Result<Self, StationTwinError> {
        let root = match &options.scratch_root {
            Some(root) => root.clone(),
            None => get_scratch_root()?,
        };
        ensure_dir_exists(&root).await?;
        let scratch = tempfile::Builder::new()
            .prefix(&format!("{}-", station.name()))
            .tempdir_in(&root)
            .map_err(|e| StationTwinError::ScratchDirCreation(root.clone(), e))?;
        info!(
            "Scratch directory for station {}: {}",
            station.name(),
            scratch.path().display()
        );
        Ok(Self {
            station,
            downloader,
            bridge: FormatBridge::default(),
            options,
            scratch,
        })
    }

    /// Loads the station directory, then creates the pipeline.
    pub async fn load(
        name: &str,
        directory: &Path,
        downloader: D,
        options: PipelineOptions,
        progress: &dyn ProgressSink,
    ) -> Result<Self, StationTwinError> {
        let station = StationData::load(name, directory, &options.ingest, progress).await?;
        Self::new(station, downloader, options).await
    }

    /// Replaces the decoders used to read downloaded files.
    pub fn with_bridge(mut self, bridge: FormatBridge) -> Self {
        self.bridge = bridge;
        self
    }

    pub fn station(&self) -> &StationData {
        &self.station
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    fn coordinate(&self) -> Result<LatLon, StationTwinError> {
        self.station
            .metadata()
            .coordinate()
            .ok_or_else(|| StationTwinError::StationWithoutCoordinate(self.station.name().to_string()))
    }

    async fn download_and_merge(
        &self,
        stage: &str,
        requests: &[AcquisitionRequest],
        progress: &dyn ProgressSink,
    ) -> Result<ReanalysisGrid, StationTwinError> {
        let stage_dir = self.scratch.path().join(stage);
        let download_dir = stage_dir.join("downloads");
        AcquisitionScheduler::new(&self.downloader, &self.options.acquisition.file_extension)
            .run(requests, &download_dir, progress)
            .await?;

        progress.set_phase("merging reanalysis files");
        let merged = self
            .bridge
            .merge_directory(&download_dir, &stage_dir.join("merged.parquet"))
            .await?;
        Ok(merged)
    }

    /// Fetches reanalysis data for every month the station observed and pairs
    /// it with the station's own values.
    pub async fn prepare_training(
        &self,
        progress: &dyn ProgressSink,
    ) -> Result<TrainingSet, StationTwinError> {
        let station = self.coordinate()?;
        let cropper = GridCropper::new(self.options.crop.window)?;
        let requests = plan_full_period(
            &self.station.months(),
            self.options.acquisition.year_request_min_months,
        );
        info!(
            "Training data for {} needs {} requests",
            self.station.name(),
            requests.len()
        );
        let merged = self.download_and_merge("training", &requests, progress).await?;

        progress.set_phase("cropping to the station window");
        let input_path = self.scratch.path().join("training").join("input.parquet");
        let target_path = self.scratch.path().join("training").join("target.parquet");
        let series = self.station.series().clone();
        let gaps = self.station.find_gaps();
        let channel = self.options.crop.target_channel.clone();
        let (input_out, target_out) = (input_path.clone(), target_path.clone());

        let (input, target) = task::spawn_blocking(move || {
            let input = cropper.crop(&merged, station, &series, &gaps)?;
            let target = fill_channel_from_series(&input, &series, &channel)?;
            validate_training_pair(&input, &target)?;
            write_grid(&input, &input_out)?;
            if let Err(e) = write_grid(&target, &target_out) {
                // a pair is written whole or not at all
                if let Err(remove) = std::fs::remove_file(&input_out) {
                    warn!("Could not remove {}: {}", input_out.display(), remove);
                }
                return Err(e);
            }
            Ok::<_, GridError>((input, target))
        })
        .await
        .map_err(GridError::from)??;

        Ok(TrainingSet {
            input,
            target,
            input_path,
            target_path,
        })
    }

    /// Fetches reanalysis data for the hours the station is missing.
    ///
    /// Returns `None` when the station has no gaps.
    pub async fn prepare_evaluation(
        &self,
        progress: &dyn ProgressSink,
    ) -> Result<Option<EvaluationSet>, StationTwinError> {
        let gaps = self.station.find_gaps();
        if gaps.is_empty() {
            info!("Station {} has no gaps to fill", self.station.name());
            return Ok(None);
        }
        let station = self.coordinate()?;
        let cropper = GridCropper::new(self.options.crop.window)?;
        let requests = plan_gap_only(&gaps);
        info!(
            "{} missing hours of {} fall on {} days",
            gaps.len(),
            self.station.name(),
            requests.len()
        );
        let merged = self.download_and_merge("evaluation", &requests, progress).await?;

        progress.set_phase("cropping to the station window");
        let input_path = self.scratch.path().join("evaluation").join("input.parquet");
        let channel = self.options.crop.target_channel.clone();
        let input_out = input_path.clone();
        let gap_hours = gaps.clone();

        let (input, cleaned, location) = task::spawn_blocking(move || {
            let at_gaps = merged.retain_times(|time| gap_hours.contains(&time));
            if at_gaps.times().is_empty() {
                return Err(GridError::NoOverlappingTimesteps);
            }
            let (input, location) = cropper.crop_space(&at_gaps, station)?;
            let cleaned = cleaned_copy(&input, &channel)?;
            write_grid(&input, &input_out)?;
            Ok((input, cleaned, location))
        })
        .await
        .map_err(GridError::from)??;

        Ok(Some(EvaluationSet {
            gaps,
            input,
            cleaned,
            location,
            input_path,
        }))
    }
}
