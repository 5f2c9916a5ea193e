use crate::error::StationTwinError;
use log::info;
use std::io;
use std::path::{Path, PathBuf};

const SCRATCH_DIR_NAME: &str = "station_twin";

pub fn get_scratch_root() -> Result<PathBuf, StationTwinError> {
    dirs::cache_dir()
        .map(|p| p.join(SCRATCH_DIR_NAME))
        .ok_or(StationTwinError::ScratchDirResolution)
}

pub async fn ensure_dir_exists(path: &Path) -> Result<(), StationTwinError> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => {
            if !metadata.is_dir() {
                return Err(StationTwinError::ScratchPathNotDirectory(path.to_path_buf()));
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Creating scratch directory: {}", path.display());
            tokio::fs::create_dir_all(path)
                .await
                .map_err(|e| StationTwinError::ScratchDirCreation(path.to_path_buf(), e))
        }
        Err(e) => Err(StationTwinError::ScratchDirCreation(path.to_path_buf(), e)),
    }
}
