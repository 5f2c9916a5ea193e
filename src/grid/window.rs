//! Placement of an N-cell window along one grid axis.
//!
//! An odd window is centred on the nearest cell. An even window cannot be, so
//! it leans toward the side of the nearest cell on which the station lies.
//! The rule is a lookup over (parity, direction) rather than arithmetic so each
//! case can be tested on its own.

use crate::grid::error::GridError;
use std::ops::RangeInclusive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisOrder {
    Ascending,
    Descending,
}

/// Where the nearest grid coordinate lies relative to the station coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NearestSide {
    /// The nearest cell's coordinate is smaller than the station's.
    BelowStation,
    /// The nearest cell's coordinate is larger than the station's.
    AboveStation,
    AtStation,
}

impl NearestSide {
    /// Side of `nearest` given the signed difference `nearest - station`.
    pub fn from_delta(delta: f64) -> Self {
        if delta < 0.0 {
            NearestSide::BelowStation
        } else if delta > 0.0 {
            NearestSide::AboveStation
        } else {
            NearestSide::AtStation
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parity {
    Even,
    Odd,
}

/// Direction, in index space, from the nearest cell to the station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StationDirection {
    HigherIndex,
    LowerIndex,
    OnCell,
}

fn station_direction(side: NearestSide, order: AxisOrder) -> StationDirection {
    match (side, order) {
        (NearestSide::AtStation, _) => StationDirection::OnCell,
        (NearestSide::BelowStation, AxisOrder::Ascending)
        | (NearestSide::AboveStation, AxisOrder::Descending) => StationDirection::HigherIndex,
        (NearestSide::AboveStation, AxisOrder::Ascending)
        | (NearestSide::BelowStation, AxisOrder::Descending) => StationDirection::LowerIndex,
    }
}

/// Offsets `(first, last)` of the window relative to the nearest index, as
/// multiples of `half = window / 2`.
fn offsets(parity: Parity, direction: StationDirection, half: i64) -> (i64, i64) {
    match (parity, direction) {
        (Parity::Odd, _) => (-half, half),
        (Parity::Even, StationDirection::HigherIndex) => (-half + 1, half),
        (Parity::Even, StationDirection::LowerIndex) => (-half, half - 1),
        (Parity::Even, StationDirection::OnCell) => (-half, half - 1),
    }
}

/// Inclusive index offsets of the window around the nearest cell.
pub fn window_offsets(window: usize, side: NearestSide, order: AxisOrder) -> (i64, i64) {
    let parity = if window % 2 == 0 { Parity::Even } else { Parity::Odd };
    offsets(parity, station_direction(side, order), (window / 2) as i64)
}

/// Inclusive index range of the window on an axis of `len` cells.
///
/// A window that does not fit is an error; it is never clipped.
pub fn window_range(
    axis: &'static str,
    nearest: usize,
    window: usize,
    side: NearestSide,
    order: AxisOrder,
    len: usize,
) -> Result<RangeInclusive<usize>, GridError> {
    if window == 0 {
        return Err(GridError::InvalidWindow);
    }
    let (first, last) = window_offsets(window, side, order);
    let start = nearest as i64 + first;
    let end = nearest as i64 + last;
    if start < 0 || end >= len as i64 {
        return Err(GridError::WindowOutOfBounds {
            axis,
            start,
            end,
            len,
        });
    }
    Ok(start as usize..=end as usize)
}
