//! Conversion of a directory of provider downloads into one internal grid file.

use crate::grid::decoder::{rename_variable, CsvGridDecoder, GridDecoder, ParquetGridDecoder};
use crate::grid::error::GridError;
use crate::grid::grid_file::write_grid;
use crate::grid::reanalysis::ReanalysisGrid;
use async_compression::tokio::bufread::GzipDecoder;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::{fs, task};

const GZIP_SUFFIX: &str = ".gz";

/// Decodes every convertible file of a directory, renames provider variables
/// and merges the results along time.
#[derive(Clone)]
pub struct FormatBridge {
    decoders: Vec<Arc<dyn GridDecoder>>,
}

impl Default for FormatBridge {
    fn default() -> Self {
        let mut decoders: Vec<Arc<dyn GridDecoder>> =
            vec![Arc::new(CsvGridDecoder), Arc::new(ParquetGridDecoder)];
        #[cfg(feature = "netcdf")]
        decoders.push(Arc::new(crate::grid::netcdf_decoder::NetcdfGridDecoder));
        Self { decoders }
    }
}

impl FormatBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a decoder, consulted after the ones already registered.
    pub fn with_decoder(mut self, decoder: impl GridDecoder + 'static) -> Self {
        self.decoders.push(Arc::new(decoder));
        self
    }

    fn decoder_for(&self, file_name: &str) -> Option<Arc<dyn GridDecoder>> {
        self.decoders
            .iter()
            .find(|decoder| decoder.accepts(file_name))
            .cloned()
    }

    async fn read_bytes(path: &Path, gzipped: bool) -> Result<Vec<u8>, GridError> {
        if !gzipped {
            return fs::read(path)
                .await
                .map_err(|e| GridError::FileRead(path.to_path_buf(), e));
        }
        let file = fs::File::open(path)
            .await
            .map_err(|e| GridError::FileRead(path.to_path_buf(), e))?;
        let mut decoder = GzipDecoder::new(BufReader::new(file));
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .await
            .map_err(|e| GridError::FileRead(path.to_path_buf(), e))?;
        Ok(decompressed)
    }

    async fn list_files(source: &Path) -> Result<Vec<PathBuf>, GridError> {
        match fs::metadata(source).await {
            Ok(meta) if meta.is_dir() => {}
            _ => return Err(GridError::SourceDirectoryMissing(source.to_path_buf())),
        }
        let mut entries = fs::read_dir(source)
            .await
            .map_err(|e| GridError::SourceDirectoryRead(source.to_path_buf(), e))?;
        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| GridError::SourceDirectoryRead(source.to_path_buf(), e))?
        {
            let path = entry.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Converts every file in `source` and writes the merged grid to `target`.
    ///
    /// Files no decoder understands are skipped with a warning. Errors if the
    /// directory is missing or empty, if nothing could be converted, or if the
    /// merged file did not appear at `target`.
    pub async fn merge_directory(
        &self,
        source: &Path,
        target: &Path,
    ) -> Result<ReanalysisGrid, GridError> {
        let files = Self::list_files(source).await?;
        if files.is_empty() {
            return Err(GridError::EmptySourceDirectory(source.to_path_buf()));
        }

        let mut grids = Vec::with_capacity(files.len());
        for path in files {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let gzipped = file_name.to_ascii_lowercase().ends_with(GZIP_SUFFIX);
            let inner_name = if gzipped {
                &file_name[..file_name.len() - GZIP_SUFFIX.len()]
            } else {
                file_name.as_str()
            };
            let Some(decoder) = self.decoder_for(inner_name) else {
                warn!("No decoder for {}, skipping", path.display());
                continue;
            };

            let bytes = Self::read_bytes(&path, gzipped).await?;
            let decode_path = path.clone();
            let grid = task::spawn_blocking(move || decoder.decode(&decode_path, bytes)).await??;
            let grid = grid.rename_channels(rename_variable);
            info!(
                "Decoded {} with {} timesteps and channels {:?}",
                path.display(),
                grid.times().len(),
                grid.channel_names()
            );
            grids.push(grid);
        }

        if grids.is_empty() {
            return Err(GridError::NoConvertibleFiles(source.to_path_buf()));
        }

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| GridError::FileWriteIo(target.to_path_buf(), e))?;
        }
        let target_owned = target.to_path_buf();
        let merged = task::spawn_blocking(move || {
            let merged = ReanalysisGrid::concat_time(grids)?;
            write_grid(&merged, &target_owned)?;
            Ok::<ReanalysisGrid, GridError>(merged)
        })
        .await??;

        if fs::metadata(target).await.is_err() {
            return Err(GridError::MergeProducedNoOutput(target.to_path_buf()));
        }
        info!(
            "Merged grid with {} timesteps written to {}",
            merged.times().len(),
            target.display()
        );
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::grid_file::read_grid;
    use crate::grid::reanalysis::tests::t;
    use async_compression::tokio::write::GzipEncoder;
    use tokio::io::AsyncWriteExt;

    fn csv_for(hour: u32) -> String {
        let mut text = String::from("time,latitude,longitude,t2m\n");
        for (lat, lon) in [(14.0, 300.0), (14.0, 301.0), (13.0, 300.0), (13.0, 301.0)] {
            text.push_str(&format!("2020-01-01 {hour:02}:00:00,{lat},{lon},{}\n", 270.0 + hour as f64));
        }
        text
    }

    async fn gzip(text: &str) -> Vec<u8> {
        let mut encoder = GzipEncoder::new(Vec::new());
        encoder.write_all(text.as_bytes()).await.unwrap();
        encoder.shutdown().await.unwrap();
        encoder.into_inner()
    }

    #[tokio::test]
    async fn test_merges_plain_and_gzipped_files() -> Result<(), Box<dyn std::error::Error>> {
        let source = tempfile::tempdir()?;
        std::fs::write(source.path().join("hours_20200101_b.csv"), csv_for(3))?;
        std::fs::write(source.path().join("hours_20200101_a.csv.gz"), gzip(&csv_for(1)).await)?;
        std::fs::write(source.path().join("notes.txt"), "ignored")?;

        let out = tempfile::tempdir()?;
        let target = out.path().join("merged").join("grid.parquet");
        let merged = FormatBridge::new().merge_directory(source.path(), &target).await?;

        assert_eq!(merged.times(), &[t(1), t(3)]);
        assert_eq!(merged.channel_names(), vec!["tas".to_string()]);
        assert_eq!(merged.channel("tas").unwrap()[[1, 0, 0]], 273.0);
        assert_eq!(read_grid(&target)?, merged);
        Ok(())
    }

    #[cfg(feature = "netcdf")]
    #[tokio::test]
    async fn test_merges_gzipped_netcdf_download() -> Result<(), Box<dyn std::error::Error>> {
        let fixture = tempfile::tempdir()?;
        let plain = fixture.path().join("hours_20200101.nc");
        crate::grid::netcdf_decoder::tests::write_fixture(&plain)?;

        let source = tempfile::tempdir()?;
        let mut encoder = GzipEncoder::new(Vec::new());
        encoder.write_all(&std::fs::read(&plain)?).await?;
        encoder.shutdown().await?;
        std::fs::write(source.path().join("hours_20200101.nc.gz"), encoder.into_inner())?;

        let target = source.path().join("merged.parquet");
        let merged = FormatBridge::default().merge_directory(source.path(), &target).await?;
        assert_eq!(merged.times(), &[t(0), t(1)]);
        assert_eq!(merged.channel_names(), vec!["tas".to_string()]);
        assert_eq!(merged.lat(), &[14.0, 13.0]);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_directory_fails() {
        let source = tempfile::tempdir().unwrap();
        let result = FormatBridge::new()
            .merge_directory(source.path(), &source.path().join("out.parquet"))
            .await;
        assert!(matches!(result, Err(GridError::EmptySourceDirectory(_))));
    }

    #[tokio::test]
    async fn test_no_convertible_files_fails() {
        let source = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("year_2021.grib"), b"GRIB").unwrap();
        let result = FormatBridge::new()
            .merge_directory(source.path(), &source.path().join("out.parquet"))
            .await;
        assert!(matches!(result, Err(GridError::NoConvertibleFiles(_))));
    }

    #[tokio::test]
    async fn test_missing_directory_fails() {
        let result = FormatBridge::new()
            .merge_directory(Path::new("/no/such/source"), Path::new("/tmp/out.parquet"))
            .await;
        assert!(matches!(result, Err(GridError::SourceDirectoryMissing(_))));
    }
}
