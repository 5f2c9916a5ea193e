//! The internal grid file: a parquet table in long format with one row per
//! `(time, lat, lon)` cell and one column per channel.

use crate::grid::error::GridError;
use crate::grid::reanalysis::ReanalysisGrid;
use crate::types::hours::{datetime_to_ms, physical_to_datetime};
use crate::types::location::normalize_longitude;
use chrono::NaiveDateTime;
use ndarray::Array3;
use ordered_float::OrderedFloat;
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

pub const TIME_COLUMN: &str = "time";
pub const LAT_COLUMN: &str = "lat";
pub const LON_COLUMN: &str = "lon";

/// Orders longitudes so that neighbouring cells stay neighbours across the
/// antimeridian: the axis is cut at its widest gap.
///
/// `[0, 1, 358, 359]` becomes `[358, 359, 0, 1]`.
pub(crate) fn contiguous_longitudes(mut lon: Vec<f64>) -> Vec<f64> {
    lon.sort_by(|a, b| a.total_cmp(b));
    if lon.len() < 2 {
        return lon;
    }
    let wrap_gap = lon[0] + 360.0 - lon[lon.len() - 1];
    let (widest, _) = lon
        .windows(2)
        .map(|w| w[1] - w[0])
        .enumerate()
        .fold((None, wrap_gap), |(best, best_gap), (i, gap)| {
            if gap > best_gap {
                (Some(i), gap)
            } else {
                (best, best_gap)
            }
        });
    if let Some(i) = widest {
        lon.rotate_left(i + 1);
    }
    lon
}

/// Builds a grid from a long table. Cells absent from the table are NaN.
///
/// Latitudes end up descending, longitudes folded into `[0, 360)` and ordered
/// by [`contiguous_longitudes`].
pub(crate) fn grid_from_frame(
    df: &DataFrame,
    time_column: &str,
    lat_column: &str,
    lon_column: &str,
) -> Result<ReanalysisGrid, GridError> {
    let datetimes = df.column(time_column)?.datetime()?;
    let unit = datetimes.time_unit();
    let times: Vec<Option<NaiveDateTime>> = datetimes
        .into_iter()
        .map(|v| v.and_then(|v| physical_to_datetime(v, unit)))
        .collect();
    let lats: Vec<Option<f64>> = df
        .column(lat_column)?
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .collect();
    let lons: Vec<Option<f64>> = df
        .column(lon_column)?
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .map(|v| v.map(normalize_longitude))
        .collect();

    let mut channel_values: Vec<(String, Vec<Option<f64>>)> = Vec::new();
    for column in df.get_columns() {
        let name = column.name().as_str();
        if name == time_column || name == lat_column || name == lon_column {
            continue;
        }
        if !(column.dtype().is_float() || column.dtype().is_integer()) {
            continue;
        }
        let values = column.cast(&DataType::Float64)?.f64()?.into_iter().collect();
        channel_values.push((name.to_string(), values));
    }

    let time_axis: Vec<NaiveDateTime> = times
        .iter()
        .flatten()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let mut lat_axis: Vec<f64> = lats
        .iter()
        .flatten()
        .map(|v| OrderedFloat(*v))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|v| v.0)
        .collect();
    lat_axis.reverse();
    let lon_axis = contiguous_longitudes(
        lons.iter()
            .flatten()
            .map(|v| OrderedFloat(*v))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|v| v.0)
            .collect(),
    );

    let time_index: HashMap<NaiveDateTime, usize> =
        time_axis.iter().enumerate().map(|(i, t)| (*t, i)).collect();
    let lat_index: HashMap<OrderedFloat<f64>, usize> =
        lat_axis.iter().enumerate().map(|(i, v)| (OrderedFloat(*v), i)).collect();
    let lon_index: HashMap<OrderedFloat<f64>, usize> =
        lon_axis.iter().enumerate().map(|(i, v)| (OrderedFloat(*v), i)).collect();

    let shape = (time_axis.len(), lat_axis.len(), lon_axis.len());
    let mut channels: BTreeMap<String, Array3<f64>> = channel_values
        .iter()
        .map(|(name, _)| (name.clone(), Array3::from_elem(shape, f64::NAN)))
        .collect();

    for row in 0..df.height() {
        let (Some(t), Some(y), Some(x)) = (times[row], lats[row], lons[row]) else {
            continue;
        };
        let cell = [
            time_index[&t],
            lat_index[&OrderedFloat(y)],
            lon_index[&OrderedFloat(x)],
        ];
        for (name, values) in &channel_values {
            if let (Some(value), Some(array)) = (values[row], channels.get_mut(name)) {
                array[cell] = value;
            }
        }
    }

    ReanalysisGrid::new(time_axis, lat_axis, lon_axis, channels)
}

/// Flattens a grid into its long-format table.
pub fn grid_to_frame(grid: &ReanalysisGrid) -> Result<DataFrame, GridError> {
    let (nt, ny, nx) = grid.dim();
    let cells = nt * ny * nx;
    let mut times = Vec::with_capacity(cells);
    let mut lats = Vec::with_capacity(cells);
    let mut lons = Vec::with_capacity(cells);
    for time in grid.times() {
        for lat in grid.lat() {
            for lon in grid.lon() {
                times.push(datetime_to_ms(*time));
                lats.push(*lat);
                lons.push(*lon);
            }
        }
    }

    let mut columns = vec![
        Series::new(TIME_COLUMN.into(), times)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
            .into_column(),
        Series::new(LAT_COLUMN.into(), lats).into_column(),
        Series::new(LON_COLUMN.into(), lons).into_column(),
    ];
    for (name, array) in grid.channels() {
        // standard layout iterates in (time, lat, lon) order
        let values: Vec<f64> = array.iter().copied().collect();
        columns.push(Series::new(name.as_str().into(), values).into_column());
    }
    Ok(DataFrame::new(columns)?)
}

/// Writes a grid file. The file appears at `path` only once fully written.
pub fn write_grid(grid: &ReanalysisGrid, path: &Path) -> Result<(), GridError> {
    let mut df = grid_to_frame(grid)?;
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut temp_file = NamedTempFile::new_in(directory)
        .map_err(|e| GridError::FileWriteIo(path.to_path_buf(), e))?;
    ParquetWriter::new(temp_file.as_file_mut())
        .with_compression(ParquetCompression::Snappy)
        .finish(&mut df)
        .map_err(|e| GridError::FileWritePolars(path.to_path_buf(), e))?;
    temp_file
        .flush()
        .map_err(|e| GridError::FileWriteIo(path.to_path_buf(), e))?;
    temp_file
        .persist(path)
        .map_err(|e| GridError::FileWriteIo(path.to_path_buf(), e.error))?;
    Ok(())
}

pub fn read_grid(path: &Path) -> Result<ReanalysisGrid, GridError> {
    let file = std::fs::File::open(path).map_err(|e| GridError::FileRead(path.to_path_buf(), e))?;
    let df = ParquetReader::new(file).finish().map_err(|e| GridError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    grid_from_frame(&df, TIME_COLUMN, LAT_COLUMN, LON_COLUMN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::reanalysis::tests::{grid, t};

    #[test]
    fn test_contiguous_longitudes() {
        assert_eq!(contiguous_longitudes(vec![0.0, 1.0, 358.0, 359.0]), vec![358.0, 359.0, 0.0, 1.0]);
        assert_eq!(contiguous_longitudes(vec![12.0, 10.0, 11.0]), vec![10.0, 11.0, 12.0]);
        let global: Vec<f64> = (0..360).map(f64::from).collect();
        assert_eq!(contiguous_longitudes(global.clone()), global);
    }

    #[test]
    fn test_write_then_read_preserves_grid() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("grid.parquet");
        let original = grid(&[0, 1, 5], vec![2.0, 1.0, 0.0], vec![358.0, 359.0, 0.0, 1.0]);
        write_grid(&original, &path)?;
        let restored = read_grid(&path)?;
        assert_eq!(restored, original);
        Ok(())
    }

    #[test]
    fn test_frame_builder_sorts_axes_and_fills_nan() -> Result<(), Box<dyn std::error::Error>> {
        let times = Series::new(TIME_COLUMN.into(), vec![datetime_to_ms(t(1)), datetime_to_ms(t(0))])
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
        let df = DataFrame::new(vec![
            times.into_column(),
            Series::new(LAT_COLUMN.into(), vec![10.0, 20.0]).into_column(),
            Series::new(LON_COLUMN.into(), vec![-1.0, 5.0]).into_column(),
            Series::new("tas".into(), vec![280.0, 290.0]).into_column(),
        ])?;
        let built = grid_from_frame(&df, TIME_COLUMN, LAT_COLUMN, LON_COLUMN)?;
        assert_eq!(built.times(), &[t(0), t(1)]);
        assert_eq!(built.lat(), &[20.0, 10.0]);
        assert_eq!(built.lon(), &[359.0, 5.0]);
        let tas = built.channel("tas").unwrap();
        assert_eq!(tas[[0, 0, 1]], 290.0);
        assert_eq!(tas[[1, 1, 0]], 280.0);
        assert!(tas[[0, 1, 0]].is_nan());
        Ok(())
    }
}
