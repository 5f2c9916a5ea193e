//! Loading of one station directory: descriptive record plus sensor logs.

use crate::options::IngestOptions;
use crate::progress::ProgressSink;
use crate::station::error::IngestError;
use crate::station::gaps::GapList;
use crate::station::log_reader::{read_log_file, read_raw_log_file, LOG_EXTENSION};
use crate::station::metadata::{extract_metadata, find_records};
use crate::station::normalizer::normalize;
use crate::station::series::StationSeries;
use crate::types::channel::DATETIME_COLUMN;
use crate::types::location::StationMetadata;
use crate::types::period::Month;
use futures_util::{stream, StreamExt};
use log::{info, warn};
use polars::prelude::*;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::task;

#[derive(Debug, Clone)]
pub struct StationData {
    name: String,
    directory: PathBuf,
    metadata: StationMetadata,
    record: Option<PathBuf>,
    log_files: Vec<PathBuf>,
    loaded_files: Vec<PathBuf>,
    series: StationSeries,
    original: Option<DataFrame>,
}

type ParsedLog = (
    PathBuf,
    Result<DataFrame, IngestError>,
    Option<Result<DataFrame, IngestError>>,
);

impl StationData {
    /// Reads every log file of the station in parallel and normalizes them.
    ///
    /// Log files that cannot be parsed are logged and skipped. Fails if the
    /// directory is missing or no file yields a single reading.
    pub async fn load(
        name: &str,
        directory: &Path,
        options: &IngestOptions,
        progress: &dyn ProgressSink,
    ) -> Result<Self, IngestError> {
        match tokio::fs::metadata(directory).await {
            Ok(meta) if meta.is_dir() => {}
            _ => return Err(IngestError::StationDirectoryNotFound(directory.to_path_buf())),
        }

        let metadata = extract_metadata(directory)?;
        let record = find_records(directory)?.into_iter().next();
        let log_files = find_log_files(directory, options.max_files)?;
        info!(
            "Loading station {} from {} ({} log files)",
            name,
            directory.display(),
            log_files.len()
        );

        progress.set_phase("reading station logs");
        let total = log_files.len();
        let keep_original = options.keep_original;
        let mut parsed = stream::iter(log_files.clone())
            .map(|path| {
                let options = options.clone();
                task::spawn_blocking(move || -> ParsedLog {
                    let cleaned = read_log_file(&path, &options);
                    let raw = keep_original.then(|| read_raw_log_file(&path));
                    (path, cleaned, raw)
                })
            })
            .buffer_unordered(options.workers.max(1));

        let mut frames = Vec::with_capacity(total);
        let mut raw_frames = Vec::new();
        let mut loaded_files = Vec::with_capacity(total);
        let mut done = 0usize;
        while let Some(joined) = parsed.next().await {
            let (path, cleaned, raw) = joined?;
            done += 1;
            match cleaned {
                Ok(df) if df.height() > 0 => {
                    frames.push(df);
                    loaded_files.push(path.clone());
                }
                Ok(_) => warn!("Log file {} has no readings", path.display()),
                Err(e) => warn!("Skipping log file {}: {}", path.display(), e),
            }
            match raw {
                Some(Ok(df)) if df.height() > 0 => raw_frames.push(df),
                Some(Err(e)) => warn!("No raw readings kept for {}: {}", path.display(), e),
                _ => {}
            }
            progress.set_percentage(done as f64 / total as f64 * 100.0);
        }

        if frames.is_empty() {
            return Err(IngestError::EmptySeries {
                station: name.to_string(),
            });
        }
        loaded_files.sort();

        progress.set_phase("normalizing to hourly steps");
        let ingest_options = options.clone();
        let hourly = task::spawn_blocking(move || normalize(frames, &ingest_options)).await??;
        if hourly.height() == 0 {
            return Err(IngestError::EmptySeries {
                station: name.to_string(),
            });
        }
        let series = StationSeries::new(hourly)?;

        let original = if keep_original && !raw_frames.is_empty() {
            Some(concat_sorted(raw_frames)?)
        } else {
            None
        };

        info!(
            "Station {} spans {} to {} with {} hourly rows",
            name,
            series.start(),
            series.end(),
            series.len()
        );

        Ok(Self {
            name: name.to_string(),
            directory: directory.to_path_buf(),
            metadata,
            record,
            log_files,
            loaded_files,
            series,
            original,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn metadata(&self) -> &StationMetadata {
        &self.metadata
    }

    pub fn series(&self) -> &StationSeries {
        &self.series
    }

    /// Raw readings of every log file, sorted by time. Only kept with
    /// [`IngestOptions::keep_original`].
    pub fn original(&self) -> Option<&DataFrame> {
        self.original.as_ref()
    }

    /// Every log file found, including ones that yielded no readings.
    pub fn log_files(&self) -> &[PathBuf] {
        &self.log_files
    }

    /// Log files that contributed readings, sorted.
    pub fn loaded_files(&self) -> &[PathBuf] {
        &self.loaded_files
    }

    pub fn find_gaps(&self) -> GapList {
        GapList::find(&self.series)
    }

    pub fn months(&self) -> BTreeSet<Month> {
        self.series.months()
    }

    /// A name for the station snapshot built from the descriptive record's
    /// file name and the digits of the first and last loaded log file name,
    /// e.g. `bathsheba_20200101-20201231`.
    pub fn dataset_name(&self) -> String {
        let stem = self
            .record
            .as_ref()
            .and_then(|record| record.file_stem())
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.clone());
        let stem = stem
            .replace([' ', '_'], "-")
            .replace("metadata", "")
            .trim_matches('-')
            .to_string();

        let digits = |path: Option<&PathBuf>| -> String {
            path.and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().chars().filter(char::is_ascii_digit).collect())
                .unwrap_or_default()
        };
        format!(
            "{}_{}-{}",
            stem,
            digits(self.loaded_files.first()),
            digits(self.loaded_files.last())
        )
    }
}

/// Sorted `*.dat` files of a station directory, capped at `max_files`.
pub fn find_log_files(dir: &Path, max_files: Option<usize>) -> Result<Vec<PathBuf>, IngestError> {
    let entries =
        std::fs::read_dir(dir).map_err(|e| IngestError::DirectoryRead(dir.to_path_buf(), e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| IngestError::DirectoryRead(dir.to_path_buf(), e))?
            .path();
        if path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(LOG_EXTENSION))
        {
            files.push(path);
        }
    }
    files.sort();
    if let Some(max) = max_files {
        files.truncate(max);
    }
    Ok(files)
}

fn concat_sorted(frames: Vec<DataFrame>) -> Result<DataFrame, IngestError> {
    let lazy_frames: Vec<LazyFrame> = frames.into_iter().map(|df| df.lazy()).collect();
    Ok(concat_lf_diagonal(lazy_frames, UnionArgs::default())?
        .sort([DATETIME_COLUMN], SortMultipleOptions::default())
        .collect()?)
}
