//! In-memory reanalysis grid: named `(time, lat, lon)` arrays sharing one set
//! of coordinate axes.

use crate::grid::error::GridError;
use chrono::NaiveDateTime;
use log::warn;
use ndarray::{s, Array3, Axis};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

#[derive(Debug, Clone, PartialEq)]
pub struct ReanalysisGrid {
    times: Vec<NaiveDateTime>,
    lat: Vec<f64>,
    lon: Vec<f64>,
    channels: BTreeMap<String, Array3<f64>>,
}

impl ReanalysisGrid {
    /// Builds a grid, checking that every channel matches the axes and that
    /// time is strictly increasing.
    pub fn new(
        times: Vec<NaiveDateTime>,
        lat: Vec<f64>,
        lon: Vec<f64>,
        channels: BTreeMap<String, Array3<f64>>,
    ) -> Result<Self, GridError> {
        if let Some(i) = times.windows(2).position(|w| w[0] >= w[1]) {
            return Err(GridError::TimeNotIncreasing(i + 1));
        }
        let expected = (times.len(), lat.len(), lon.len());
        for (name, array) in &channels {
            if array.dim() != expected {
                return Err(GridError::ShapeMismatch {
                    channel: name.clone(),
                    expected,
                    found: array.shape().to_vec(),
                });
            }
        }
        Ok(Self {
            times,
            lat,
            lon,
            channels,
        })
    }

    pub fn times(&self) -> &[NaiveDateTime] {
        &self.times
    }

    pub fn lat(&self) -> &[f64] {
        &self.lat
    }

    pub fn lon(&self) -> &[f64] {
        &self.lon
    }

    /// `(time, lat, lon)` sizes.
    pub fn dim(&self) -> (usize, usize, usize) {
        (self.times.len(), self.lat.len(), self.lon.len())
    }

    pub fn channels(&self) -> &BTreeMap<String, Array3<f64>> {
        &self.channels
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.channels.keys().cloned().collect()
    }

    pub fn channel(&self, name: &str) -> Option<&Array3<f64>> {
        self.channels.get(name)
    }

    /// Adds or replaces a channel.
    pub fn with_channel(mut self, name: &str, array: Array3<f64>) -> Result<Self, GridError> {
        if array.dim() != self.dim() {
            return Err(GridError::ShapeMismatch {
                channel: name.to_string(),
                expected: self.dim(),
                found: array.shape().to_vec(),
            });
        }
        self.channels.insert(name.to_string(), array);
        Ok(self)
    }

    pub fn rename_channels(self, rename: impl Fn(&str) -> String) -> Self {
        let channels = self
            .channels
            .into_iter()
            .map(|(name, array)| (rename(&name), array))
            .collect();
        Self { channels, ..self }
    }

    /// Keeps the timesteps for which `keep` returns true.
    pub fn retain_times(&self, keep: impl Fn(NaiveDateTime) -> bool) -> Self {
        let indices: Vec<usize> = self
            .times
            .iter()
            .enumerate()
            .filter(|(_, t)| keep(**t))
            .map(|(i, _)| i)
            .collect();
        self.select_times(&indices)
    }

    /// Timesteps at the given indices, which must be increasing and in range.
    pub fn select_times(&self, indices: &[usize]) -> Self {
        Self {
            times: indices.iter().map(|&i| self.times[i]).collect(),
            lat: self.lat.clone(),
            lon: self.lon.clone(),
            channels: self
                .channels
                .iter()
                .map(|(name, array)| (name.clone(), array.select(Axis(0), indices)))
                .collect(),
        }
    }

    /// The spatial sub-window covering both inclusive index ranges.
    pub fn slice_window(
        &self,
        lat: RangeInclusive<usize>,
        lon: RangeInclusive<usize>,
    ) -> Result<Self, GridError> {
        for (axis, range, len) in [("latitude", &lat, self.lat.len()), ("longitude", &lon, self.lon.len())] {
            if range.is_empty() || *range.end() >= len {
                return Err(GridError::WindowOutOfBounds {
                    axis,
                    start: *range.start() as i64,
                    end: *range.end() as i64,
                    len,
                });
            }
        }
        let (lat_start, lat_end) = (*lat.start(), *lat.end());
        let (lon_start, lon_end) = (*lon.start(), *lon.end());
        Ok(Self {
            times: self.times.clone(),
            lat: self.lat[lat.clone()].to_vec(),
            lon: self.lon[lon.clone()].to_vec(),
            channels: self
                .channels
                .iter()
                .map(|(name, array)| {
                    let window = array.slice(s![.., lat_start..=lat_end, lon_start..=lon_end]);
                    (name.clone(), window.to_owned())
                })
                .collect(),
        })
    }

    /// Concatenates grids along time and sorts the result by time.
    ///
    /// All grids must share axes and channel names. Timesteps present in more
    /// than one grid are kept once, from the first grid containing them.
    pub fn concat_time(grids: Vec<Self>) -> Result<Self, GridError> {
        let mut grids = grids.into_iter();
        let Some(first) = grids.next() else {
            return Err(GridError::AxisMismatch("no grids to merge".into()));
        };
        let rest: Vec<Self> = grids.collect();
        for other in &rest {
            if other.lat != first.lat || other.lon != first.lon {
                return Err(GridError::AxisMismatch("spatial axes differ".into()));
            }
            if other.channels.keys().ne(first.channels.keys()) {
                return Err(GridError::AxisMismatch(format!(
                    "channels {:?} and {:?} differ",
                    first.channel_names(),
                    other.channel_names()
                )));
            }
        }

        let all: Vec<&Self> = std::iter::once(&first).chain(rest.iter()).collect();
        let times: Vec<NaiveDateTime> = all.iter().flat_map(|g| g.times.iter().copied()).collect();

        // stable sort keeps the first occurrence of a duplicated timestamp first
        let mut order: Vec<usize> = (0..times.len()).collect();
        order.sort_by_key(|&i| times[i]);
        let before = order.len();
        order.dedup_by_key(|i| times[*i]);
        if order.len() < before {
            warn!("Dropped {} duplicated timesteps while merging", before - order.len());
        }

        let mut channels = BTreeMap::new();
        for name in first.channels.keys() {
            let views: Vec<_> = all
                .iter()
                .filter_map(|g| g.channels.get(name))
                .map(|a| a.view())
                .collect();
            let stacked = ndarray::concatenate(Axis(0), &views)?;
            channels.insert(name.clone(), stacked.select(Axis(0), &order));
        }

        Self::new(
            order.iter().map(|&i| times[i]).collect(),
            first.lat.clone(),
            first.lon.clone(),
            channels,
        )
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    pub(crate) fn t(hour: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::hours(hour)
    }

    /// A grid whose `tas` value encodes `time*10000 + lat_index*100 + lon_index`.
    pub(crate) fn grid(hours: &[i64], lat: Vec<f64>, lon: Vec<f64>) -> ReanalysisGrid {
        let (nt, ny, nx) = (hours.len(), lat.len(), lon.len());
        let tas = Array3::from_shape_fn((nt, ny, nx), |(ti, yi, xi)| {
            (hours[ti] * 10000) as f64 + (yi * 100 + xi) as f64
        });
        ReanalysisGrid::new(
            hours.iter().map(|h| t(*h)).collect(),
            lat,
            lon,
            BTreeMap::from([("tas".to_string(), tas)]),
        )
        .unwrap()
    }

    #[test]
    fn test_new_validates_shape_and_time() {
        let bad_shape = ReanalysisGrid::new(
            vec![t(0)],
            vec![1.0],
            vec![1.0, 2.0],
            BTreeMap::from([("tas".to_string(), Array3::zeros((1, 1, 1)))]),
        );
        assert!(matches!(bad_shape, Err(GridError::ShapeMismatch { .. })));

        let bad_time = ReanalysisGrid::new(vec![t(1), t(0)], vec![], vec![], BTreeMap::new());
        assert!(matches!(bad_time, Err(GridError::TimeNotIncreasing(1))));
    }

    #[test]
    fn test_slice_window_is_inclusive() {
        let g = grid(&[0], vec![3.0, 2.0, 1.0, 0.0], vec![0.0, 1.0, 2.0, 3.0]);
        let window = g.slice_window(1..=2, 0..=1).unwrap();
        assert_eq!(window.lat(), &[2.0, 1.0]);
        assert_eq!(window.lon(), &[0.0, 1.0]);
        assert_eq!(window.channel("tas").unwrap()[[0, 0, 1]], 101.0);
        assert!(g.slice_window(2..=4, 0..=1).is_err());
    }

    #[test]
    fn test_concat_time_sorts_and_dedups() {
        let lat = vec![1.0, 0.0];
        let lon = vec![0.0, 1.0];
        let late = grid(&[2, 3], lat.clone(), lon.clone());
        let early = grid(&[0, 1, 2], lat.clone(), lon.clone());
        let merged = ReanalysisGrid::concat_time(vec![late, early]).unwrap();
        assert_eq!(merged.times(), &[t(0), t(1), t(2), t(3)]);
        assert_eq!(merged.channel("tas").unwrap()[[3, 1, 1]], 30101.0);

        let other_axes = grid(&[5], vec![2.0], lon);
        assert!(ReanalysisGrid::concat_time(vec![merged, other_axes]).is_err());
    }

    #[test]
    fn test_retain_times() {
        let g = grid(&[0, 1, 2, 3], vec![0.0], vec![0.0]);
        let kept = g.retain_times(|time| time != t(1) && time != t(3));
        assert_eq!(kept.times(), &[t(0), t(2)]);
        assert_eq!(kept.channel("tas").unwrap()[[1, 0, 0]], 20000.0);
    }
}
