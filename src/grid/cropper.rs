//! Carving the station's neighbourhood out of a reanalysis grid.
//!
//! A crop runs three steps in order: restrict time to the station's observed
//! span, drop hours the station is missing, then cut an N×N window around the
//! grid cell nearest to the station.

use crate::grid::error::GridError;
use crate::grid::grid_file::write_grid;
use crate::grid::reanalysis::ReanalysisGrid;
use crate::grid::window::{window_range, AxisOrder, NearestSide};
use crate::station::gaps::GapList;
use crate::station::series::StationSeries;
use crate::types::location::{normalize_longitude, signed_longitude_delta, LatLon};
use haversine::{distance, Location as HaversineLocation, Units};
use log::{debug, info};
use std::ops::RangeInclusive;
use std::path::Path;

/// The grid cell nearest to a station and the window chosen around it.
#[derive(Debug, Clone, PartialEq)]
pub struct GridLocation {
    pub lat_index: usize,
    pub lon_index: usize,
    /// Coordinates of the nearest cell.
    pub cell: LatLon,
    pub distance_km: f64,
    pub lat_range: RangeInclusive<usize>,
    pub lon_range: RangeInclusive<usize>,
}

/// Index of the value in an ascending slice nearest to `target`. Ties go to
/// the lower index.
fn nearest_ascending(values: &[f64], target: f64) -> usize {
    let upper = values.partition_point(|v| *v < target);
    if upper == 0 {
        return 0;
    }
    if upper == values.len() {
        return values.len() - 1;
    }
    let below = target - values[upper - 1];
    let above = values[upper] - target;
    if above < below {
        upper
    } else {
        upper - 1
    }
}

/// Longitudes made monotone by adding 360 after every wrap.
fn unwrap_longitudes(lon: &[f64]) -> Result<Vec<f64>, GridError> {
    let mut unwrapped: Vec<f64> = Vec::with_capacity(lon.len());
    for (i, value) in lon.iter().enumerate() {
        match unwrapped.last() {
            None => unwrapped.push(*value),
            Some(previous) => {
                let step = (value - lon[i - 1]).rem_euclid(360.0);
                if step == 0.0 {
                    return Err(GridError::LongitudeNotUnique(*value));
                }
                unwrapped.push(previous + step);
            }
        }
    }
    Ok(unwrapped)
}

/// The station longitude shifted by a multiple of 360 to lie as close as
/// possible to the unwrapped axis.
fn align_longitude(axis: &[f64], station: f64) -> f64 {
    let (first, last) = (axis[0], axis[axis.len() - 1]);
    let outside = |v: f64| (first - v).max(v - last).max(0.0);
    [station - 360.0, station, station + 360.0, station + 720.0]
        .into_iter()
        .min_by(|a, b| outside(*a).total_cmp(&outside(*b)))
        .unwrap_or(station)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridCropper {
    window: usize,
}

impl GridCropper {
    pub fn new(window: usize) -> Result<Self, GridError> {
        if window == 0 {
            return Err(GridError::InvalidWindow);
        }
        Ok(Self { window })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Keeps the timesteps within the station's first and last hour.
    pub fn crop_time(&self, grid: &ReanalysisGrid, series: &StationSeries) -> ReanalysisGrid {
        let (start, end) = (series.start(), series.end());
        grid.retain_times(|time| time >= start && time <= end)
    }

    /// Removes the timesteps the station has no row for.
    pub fn drop_gaps(&self, grid: &ReanalysisGrid, gaps: &GapList) -> ReanalysisGrid {
        if gaps.is_empty() {
            return grid.clone();
        }
        let cropped = grid.retain_times(|time| !gaps.contains(&time));
        debug!(
            "Dropped {} gap timesteps",
            grid.times().len() - cropped.times().len()
        );
        cropped
    }

    /// Finds the cell nearest to the station and the window around it.
    pub fn locate(&self, grid: &ReanalysisGrid, station: LatLon) -> Result<GridLocation, GridError> {
        let lat = grid.lat();
        let lon = grid.lon();
        if lat.is_empty() {
            return Err(GridError::EmptyAxis("latitude"));
        }
        if lon.is_empty() {
            return Err(GridError::EmptyAxis("longitude"));
        }
        if lat.windows(2).any(|w| w[0] <= w[1]) {
            return Err(GridError::LatitudeNotDescending);
        }

        // Latitude: search the ascending reversal, then map back.
        let ascending: Vec<f64> = lat.iter().rev().copied().collect();
        let reversed_index = nearest_ascending(&ascending, station.latitude());
        let lat_index = lat.len() - 1 - reversed_index;
        let lat_side = NearestSide::from_delta(lat[lat_index] - station.latitude());
        let lat_range = window_range(
            "latitude",
            lat_index,
            self.window,
            lat_side,
            AxisOrder::Descending,
            lat.len(),
        )?;

        // Longitude: search the unwrapped axis so the antimeridian is just
        // another interval.
        let station_lon = normalize_longitude(station.longitude());
        let unwrapped = unwrap_longitudes(lon)?;
        let lon_index = nearest_ascending(&unwrapped, align_longitude(&unwrapped, station_lon));
        let lon_side = NearestSide::from_delta(signed_longitude_delta(lon[lon_index], station_lon));
        let lon_range = window_range(
            "longitude",
            lon_index,
            self.window,
            lon_side,
            AxisOrder::Ascending,
            lon.len(),
        )?;

        let cell = LatLon(lat[lat_index], lon[lon_index]);
        let distance_km = distance(
            HaversineLocation {
                latitude: station.latitude(),
                longitude: station.longitude(),
            },
            HaversineLocation {
                latitude: cell.latitude(),
                longitude: cell.longitude(),
            },
            Units::Kilometers,
        );

        Ok(GridLocation {
            lat_index,
            lon_index,
            cell,
            distance_km,
            lat_range,
            lon_range,
        })
    }

    /// Cuts the N×N window around the station.
    pub fn crop_space(
        &self,
        grid: &ReanalysisGrid,
        station: LatLon,
    ) -> Result<(ReanalysisGrid, GridLocation), GridError> {
        let location = self.locate(grid, station)?;
        info!(
            "Nearest cell to ({}, {}) is ({}, {}) at index ({}, {}), {:.1} km away",
            station.latitude(),
            station.longitude(),
            location.cell.latitude(),
            location.cell.longitude(),
            location.lat_index,
            location.lon_index,
            location.distance_km
        );
        let window = grid.slice_window(location.lat_range.clone(), location.lon_range.clone())?;
        Ok((window, location))
    }

    /// All three steps: time span, gap removal, spatial window.
    pub fn crop(
        &self,
        grid: &ReanalysisGrid,
        station: LatLon,
        series: &StationSeries,
        gaps: &GapList,
    ) -> Result<ReanalysisGrid, GridError> {
        let in_span = self.crop_time(grid, series);
        let without_gaps = self.drop_gaps(&in_span, gaps);
        if without_gaps.times().is_empty() {
            return Err(GridError::NoOverlappingTimesteps);
        }
        let (cropped, _) = self.crop_space(&without_gaps, station)?;
        info!(
            "Cropped grid to {} timesteps of {}x{} cells",
            cropped.times().len(),
            cropped.lat().len(),
            cropped.lon().len()
        );
        Ok(cropped)
    }

    /// Crops and writes the result to `target`. Nothing is written if any step fails.
    pub fn crop_to_file(
        &self,
        grid: &ReanalysisGrid,
        station: LatLon,
        series: &StationSeries,
        gaps: &GapList,
        target: &Path,
    ) -> Result<ReanalysisGrid, GridError> {
        let cropped = self.crop(grid, station, series, gaps)?;
        write_grid(&cropped, target)?;
        Ok(cropped)
    }
}
