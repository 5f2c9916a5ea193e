use crate::grid::error::GridError;
use crate::grid::reanalysis::ReanalysisGrid;
use crate::station::series::StationSeries;
use log::{info, warn};
use ndarray::{Array3, Axis};

/// A copy of the grid with `channel` set to NaN everywhere.
pub fn cleaned_copy(grid: &ReanalysisGrid, channel: &str) -> Result<ReanalysisGrid, GridError> {
    if grid.channel(channel).is_none() {
        return Err(GridError::ChannelNotFound(channel.to_string()));
    }
    grid.clone()
        .with_channel(channel, Array3::from_elem(grid.dim(), f64::NAN))
}

/// Sets `channel` at every timestep to the station's value for that hour,
/// repeated over the whole spatial window. Hours without a station value
/// become NaN.
pub fn fill_channel_from_series(
    grid: &ReanalysisGrid,
    series: &StationSeries,
    channel: &str,
) -> Result<ReanalysisGrid, GridError> {
    let values = series
        .channel(channel)
        .map_err(|e| GridError::ChannelConversion(channel.to_string(), e.to_string()))?;
    let hours = series.hours();

    let mut filled = Array3::from_elem(grid.dim(), f64::NAN);
    for (time, mut plane) in grid.times().iter().zip(filled.axis_iter_mut(Axis(0))) {
        if let Some(value) = hours
            .binary_search(time)
            .ok()
            .and_then(|row| values[row])
        {
            plane.fill(value);
        }
    }
    grid.clone().with_channel(channel, filled)
}

/// Channels whose first timestep holds a single value over the whole window.
pub fn constant_channels(grid: &ReanalysisGrid) -> Vec<String> {
    if grid.times().is_empty() {
        return Vec::new();
    }
    grid.channels()
        .iter()
        .filter(|(_, array)| {
            let first = array.index_axis(Axis(0), 0);
            let mut values = first.iter();
            match values.next() {
                Some(head) => values.all(|v| v == head || (v.is_nan() && head.is_nan())),
                None => false,
            }
        })
        .map(|(name, _)| name.clone())
        .collect()
}

/// Checks that an input grid and its target can be used as one training sample.
pub fn validate_training_pair(
    input: &ReanalysisGrid,
    target: &ReanalysisGrid,
) -> Result<(), GridError> {
    if input.times() != target.times() {
        return Err(GridError::TrainingPairMismatch(format!(
            "input has {} timesteps, target has {}",
            input.times().len(),
            target.times().len()
        )));
    }
    if input.channels().is_empty() || target.channels().is_empty() {
        return Err(GridError::TrainingPairMismatch("a grid has no channels".into()));
    }
    for (role, grid) in [("input", input), ("target", target)] {
        let constant = constant_channels(grid);
        if !constant.is_empty() {
            warn!("{} channels constant over space at the first timestep: {:?}", role, constant);
        }
    }
    info!(
        "Training pair of {} timesteps with input {:?} and target {:?}",
        input.times().len(),
        input.channel_names(),
        target.channel_names()
    );
    Ok(())
}
