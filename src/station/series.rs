//! The hourly station series produced by the normalizer.

use crate::grid::error::GridError;
use crate::grid::reanalysis::ReanalysisGrid;
use crate::station::error::IngestError;
use crate::types::channel::DATETIME_COLUMN;
use crate::types::hours::{physical_to_datetime, truncate_to_hour};
use crate::types::location::{normalize_longitude, LatLon};
use crate::types::period::Month;
use chrono::NaiveDateTime;
use ndarray::Array3;
use polars::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// One row per hour, one column per channel, plus the `datetime` index column.
///
/// The index is guaranteed non-empty, strictly increasing and truncated to the
/// hour.
#[derive(Debug, Clone)]
pub struct StationSeries {
    frame: DataFrame,
    hours: Vec<NaiveDateTime>,
}

/// How much of the station's observed span actually carries data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coverage {
    /// Hours in the closed span between the first and last observation.
    pub expected_hours: usize,
    /// Hours with a row in the series.
    pub present_hours: usize,
    /// Non-missing hourly values per channel.
    pub channel_values: BTreeMap<String, usize>,
}

impl Coverage {
    pub fn present_ratio(&self) -> f64 {
        if self.expected_hours == 0 {
            return 0.0;
        }
        self.present_hours as f64 / self.expected_hours as f64
    }
}

impl StationSeries {
    pub fn new(frame: DataFrame) -> Result<Self, IngestError> {
        let column = frame
            .column(DATETIME_COLUMN)
            .map_err(|e| IngestError::ColumnNotFound(DATETIME_COLUMN.to_string(), e))?;
        let datetimes = column.datetime()?;
        let unit = datetimes.time_unit();

        let mut hours = Vec::with_capacity(datetimes.len());
        for value in datetimes.into_iter() {
            let hour = value
                .and_then(|v| physical_to_datetime(v, unit))
                .ok_or_else(|| IngestError::InvalidIndex("null or out-of-range timestamp".into()))?;
            if truncate_to_hour(hour) != hour {
                return Err(IngestError::InvalidIndex(format!(
                    "{hour} is not truncated to the hour"
                )));
            }
            if hours.last().is_some_and(|previous| *previous >= hour) {
                return Err(IngestError::InvalidIndex(format!(
                    "{hour} does not follow the previous row"
                )));
            }
            hours.push(hour);
        }
        if hours.is_empty() {
            return Err(IngestError::InvalidIndex("series has no rows".into()));
        }

        Ok(Self { frame, hours })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn hours(&self) -> &[NaiveDateTime] {
        &self.hours
    }

    pub fn len(&self) -> usize {
        self.hours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hours.is_empty()
    }

    pub fn start(&self) -> NaiveDateTime {
        self.hours[0]
    }

    pub fn end(&self) -> NaiveDateTime {
        self.hours[self.hours.len() - 1]
    }

    pub fn contains(&self, hour: NaiveDateTime) -> bool {
        self.hours.binary_search(&hour).is_ok()
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() != DATETIME_COLUMN)
            .map(|name| name.to_string())
            .collect()
    }

    /// Hourly values of one channel, aligned with [`Self::hours`].
    pub fn channel(&self, name: &str) -> Result<Vec<Option<f64>>, IngestError> {
        let column = self
            .frame
            .column(name)
            .map_err(|e| IngestError::ColumnNotFound(name.to_string(), e))?
            .cast(&DataType::Float64)?;
        Ok(column.f64()?.into_iter().collect())
    }

    /// Distinct calendar months with at least one row, in order.
    pub fn months(&self) -> BTreeSet<Month> {
        self.hours.iter().map(|hour| Month::of(*hour)).collect()
    }

    pub fn coverage(&self) -> Result<Coverage, IngestError> {
        let expected_hours = ((self.end() - self.start()).num_hours() + 1) as usize;
        let mut channel_values = BTreeMap::new();
        for name in self.channel_names() {
            let present = self.channel(&name)?.iter().filter(|v| v.is_some()).count();
            channel_values.insert(name, present);
        }
        Ok(Coverage {
            expected_hours,
            present_hours: self.hours.len(),
            channel_values,
        })
    }

    /// The series as a 1×1 grid located at the station. Missing values become NaN.
    pub fn to_point_grid(&self, location: LatLon) -> Result<ReanalysisGrid, GridError> {
        let mut channels = BTreeMap::new();
        for name in self.channel_names() {
            let values: Vec<f64> = self
                .channel(&name)
                .map_err(|e| GridError::ChannelConversion(name.clone(), e.to_string()))?
                .into_iter()
                .map(|v| v.unwrap_or(f64::NAN))
                .collect();
            channels.insert(name, Array3::from_shape_vec((self.hours.len(), 1, 1), values)?);
        }
        ReanalysisGrid::new(
            self.hours.clone(),
            vec![location.latitude()],
            vec![normalize_longitude(location.longitude())],
            channels,
        )
    }

    /// Writes the series to a parquet file.
    pub fn write_parquet(&self, path: &Path) -> Result<(), IngestError> {
        let file = std::fs::File::create(path)
            .map_err(|e| IngestError::SeriesWriteIo(path.to_path_buf(), e))?;
        let mut frame = self.frame.clone();
        ParquetWriter::new(file)
            .with_compression(ParquetCompression::Snappy)
            .finish(&mut frame)
            .map_err(|e| IngestError::SeriesWrite(path.to_path_buf(), e))?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::hours::datetime_to_ms;
    use chrono::NaiveDate;

    pub(crate) fn hour(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    /// A series with a `tas` channel whose value is the row number.
    pub(crate) fn series_at(hours: &[NaiveDateTime]) -> StationSeries {
        let ms: Vec<i64> = hours.iter().map(|h| datetime_to_ms(*h)).collect();
        let tas: Vec<Option<f64>> = (0..hours.len()).map(|i| Some(i as f64)).collect();
        let frame = DataFrame::new(vec![
            Series::new(DATETIME_COLUMN.into(), ms)
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
                .unwrap()
                .into_column(),
            Series::new("tas".into(), tas).into_column(),
        ])
        .unwrap();
        StationSeries::new(frame).unwrap()
    }

    #[test]
    fn test_rejects_unsorted_or_untruncated_index() {
        let build = |times: Vec<NaiveDateTime>| {
            let ms: Vec<i64> = times.iter().map(|h| datetime_to_ms(*h)).collect();
            let frame = DataFrame::new(vec![Series::new(DATETIME_COLUMN.into(), ms)
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
                .unwrap()
                .into_column()])
            .unwrap();
            StationSeries::new(frame)
        };
        assert!(build(vec![hour(1, 2), hour(1, 1)]).is_err());
        assert!(build(vec![hour(1, 1), hour(1, 1)]).is_err());
        assert!(build(vec![hour(1, 1) + chrono::Duration::minutes(5)]).is_err());
        assert!(build(vec![]).is_err());
        assert!(build(vec![hour(1, 1), hour(1, 3)]).is_ok());
    }

    #[test]
    fn test_months_and_coverage() {
        let series = series_at(&[hour(1, 0), hour(1, 1), hour(1, 3)]);
        assert_eq!(series.months().into_iter().collect::<Vec<_>>(), vec![Month::new(1, 2020)]);

        let coverage = series.coverage().unwrap();
        assert_eq!(coverage.expected_hours, 4);
        assert_eq!(coverage.present_hours, 3);
        assert_eq!(coverage.channel_values.get("tas"), Some(&3));
        assert!((coverage.present_ratio() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_point_grid_carries_values() {
        let series = series_at(&[hour(1, 0), hour(1, 1)]);
        let grid = series.to_point_grid(LatLon(13.2, -59.5)).unwrap();
        assert_eq!(grid.lon(), &[300.5]);
        let tas = grid.channel("tas").unwrap();
        assert_eq!(tas.shape(), &[2, 1, 1]);
        assert_eq!(tas[[1, 0, 0]], 1.0);
    }

    #[test]
    fn test_write_parquet() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("series.parquet");
        series_at(&[hour(1, 0)]).write_parquet(&path)?;
        let df = ParquetReader::new(std::fs::File::open(&path)?).finish()?;
        assert_eq!(df.height(), 1);
        Ok(())
    }
}
