//! Extraction of station coordinates from the free-text descriptive record
//! (`*.rtf`) that ships next to the log files.

use crate::station::error::IngestError;
use crate::types::location::StationMetadata;
use log::{debug, warn};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub const RECORD_EXTENSION: &str = "rtf";

static LOCATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Location:\s*([\d.-]+)\s*deg\s*Lat,\s*([\d.-]+)\s*deg\s*Lon")
        .expect("location pattern is valid")
});

static ELEVATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Elevation:\s*(-?\d+)\s*m").expect("elevation pattern is valid"));

/// Parses latitude, longitude and elevation out of a descriptive record.
///
/// Fields whose pattern is absent or unparsable are left as `None`.
pub fn parse_metadata(text: &str) -> StationMetadata {
    let mut metadata = StationMetadata::default();

    if let Some(captures) = LOCATION_PATTERN.captures(text) {
        let latitude = captures[1].parse::<f64>().ok();
        let longitude = captures[2].parse::<f64>().ok();
        // Both or neither: a lone axis is not a usable position.
        if let (Some(lat), Some(lon)) = (latitude, longitude) {
            metadata.latitude = Some(lat);
            metadata.longitude = Some(lon);
        }
    }

    if let Some(captures) = ELEVATION_PATTERN.captures(text) {
        metadata.elevation = captures[1].parse::<i32>().ok();
    }

    metadata
}

/// Descriptive record files in `dir`, sorted by file name.
pub fn find_records(dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
    let entries =
        std::fs::read_dir(dir).map_err(|e| IngestError::DirectoryRead(dir.to_path_buf(), e))?;
    let mut records = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| IngestError::DirectoryRead(dir.to_path_buf(), e))?
            .path();
        if path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(RECORD_EXTENSION))
        {
            records.push(path);
        }
    }
    records.sort();
    Ok(records)
}

/// Reads the station's descriptive record and extracts its metadata.
///
/// A directory without a record yields empty metadata. With several records the
/// first one by name is used.
pub fn extract_metadata(dir: &Path) -> Result<StationMetadata, IngestError> {
    let records = find_records(dir)?;
    let Some(record) = records.first() else {
        warn!("No descriptive record found in {}", dir.display());
        return Ok(StationMetadata::default());
    };
    if records.len() > 1 {
        warn!(
            "Found {} descriptive records in {}, using {}",
            records.len(),
            dir.display(),
            record.display()
        );
    }

    // Records are occasionally saved in a legacy 8-bit encoding.
    let bytes =
        std::fs::read(record).map_err(|e| IngestError::MetadataRead(record.clone(), e))?;
    let metadata = parse_metadata(&String::from_utf8_lossy(&bytes));
    if metadata.coordinate().is_none() {
        warn!("No location found in {}", record.display());
    }
    debug!("Metadata for {}: {:?}", dir.display(), metadata);
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &str = r"{\rtf1\ansi Station Bathsheba\par
Location: 13.2093 deg Lat, -59.5231 deg Lon\par
Elevation: 12 m\par}";

    #[test]
    fn test_parse_full_record() {
        let metadata = parse_metadata(RECORD);
        assert_eq!(metadata.latitude, Some(13.2093));
        assert_eq!(metadata.longitude, Some(-59.5231));
        assert_eq!(metadata.elevation, Some(12));
    }

    #[test]
    fn test_parse_missing_fields_are_absent() {
        let metadata = parse_metadata("Elevation: 340 m");
        assert_eq!(metadata.latitude, None);
        assert_eq!(metadata.longitude, None);
        assert_eq!(metadata.elevation, Some(340));

        assert!(parse_metadata("nothing useful").is_empty());
    }

    #[test]
    fn test_extract_from_directory() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("b_metadata.rtf"), "Location: 1 deg Lat, 2 deg Lon")?;
        std::fs::write(dir.path().join("a_metadata.rtf"), RECORD)?;
        std::fs::write(dir.path().join("log.dat"), "year mon day hour min\n")?;

        let metadata = extract_metadata(dir.path())?;
        assert_eq!(metadata.latitude, Some(13.2093));
        Ok(())
    }

    #[test]
    fn test_extract_without_record() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        assert!(extract_metadata(dir.path())?.is_empty());
        Ok(())
    }
}
