//! Resampling of raw readings into exact hourly buckets.
//!
//! Every channel gets an aggregator matching its physics (see
//! [`ChannelKind`]) and a per-hour quality gate that nulls out hours with too
//! many missing samples or a frozen sensor.

use crate::options::IngestOptions;
use crate::station::error::IngestError;
use crate::types::channel::{Aggregation, ChannelKind, DATETIME_COLUMN};
use crate::types::hours::MS_PER_HOUR;
use log::debug;
use polars::prelude::*;
use std::f64::consts::PI;

/// Circular mean of angles in degrees, folded into `[0, 360)`.
fn circular_mean_expr(column: Expr) -> Expr {
    let radians = column.drop_nulls() * lit(PI / 180.0);
    let degrees = radians
        .clone()
        .sin()
        .mean()
        .arctan2(radians.cos().mean())
        * lit(180.0 / PI);
    when(degrees.clone().lt(lit(0.0)))
        .then(degrees.clone() + lit(360.0))
        .otherwise(degrees)
}

fn aggregate_expr(name: &str, options: &IngestOptions) -> Expr {
    let kind = ChannelKind::classify(name);
    let column = col(name).cast(DataType::Float64);

    let aggregated = match kind.aggregation() {
        Aggregation::Sum => column.clone().sum(),
        Aggregation::Mean => column.clone().mean(),
        Aggregation::CircularMean => circular_mean_expr(column.clone()),
        Aggregation::Median => column.clone().median(),
    };

    let mut rejected = column
        .clone()
        .null_count()
        .gt(lit(options.max_missing_per_hour));
    if kind.checks_frozen_sensor() {
        rejected = rejected.or(column
            .drop_nulls()
            .n_unique()
            .lt_eq(lit(options.frozen_distinct_values)));
    }

    when(rejected)
        .then(lit(NULL).cast(DataType::Float64))
        .otherwise(aggregated)
        .alias(name)
}

/// Timestamp truncated to the start of its hour, staying a millisecond datetime.
fn hour_expr() -> Expr {
    (col(DATETIME_COLUMN)
        .cast(DataType::Int64)
        .floor_div(lit(MS_PER_HOUR))
        * lit(MS_PER_HOUR))
    .cast(DataType::Datetime(TimeUnit::Milliseconds, None))
    .alias(DATETIME_COLUMN)
}

/// Channel columns across all tables, in first-seen order.
fn channel_names(frames: &[DataFrame]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for frame in frames {
        for name in frame.get_column_names() {
            if name.as_str() != DATETIME_COLUMN && !names.iter().any(|n| n == name.as_str()) {
                names.push(name.to_string());
            }
        }
    }
    names
}

/// Concatenates per-file tables and resamples them to one row per hour.
///
/// Only hours with at least one raw sample get a row. The result is sorted by
/// time; an input without rows yields an empty frame.
pub fn normalize(frames: Vec<DataFrame>, options: &IngestOptions) -> Result<DataFrame, IngestError> {
    let names = channel_names(&frames);
    let frames: Vec<DataFrame> = frames.into_iter().filter(|df| df.height() > 0).collect();
    if frames.is_empty() {
        return Ok(DataFrame::empty());
    }
    let file_count = frames.len();

    let lazy_frames: Vec<LazyFrame> = frames.into_iter().map(|df| df.lazy()).collect();
    let aggregations: Vec<Expr> = names.iter().map(|name| aggregate_expr(name, options)).collect();

    let hourly = concat_lf_diagonal(lazy_frames, UnionArgs::default())?
        .with_column(hour_expr())
        .group_by([col(DATETIME_COLUMN)])
        .agg(aggregations)
        .sort([DATETIME_COLUMN], SortMultipleOptions::default())
        .collect()?;

    debug!(
        "Normalized {} tables into {} hourly rows with {} channels",
        file_count,
        hourly.height(),
        names.len()
    );
    Ok(hourly)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::hours::datetime_to_ms;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn frame(times: &[NaiveDateTime], channel: &str, values: Vec<Option<f64>>) -> DataFrame {
        let ms: Vec<i64> = times.iter().map(|t| datetime_to_ms(*t)).collect();
        DataFrame::new(vec![
            Series::new(DATETIME_COLUMN.into(), ms)
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
                .unwrap()
                .into_column(),
            Series::new(channel.into(), values).into_column(),
        ])
        .unwrap()
    }

    fn values(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
        df.column(name).unwrap().f64().unwrap().into_iter().collect()
    }

    fn minutes(hour: u32, count: u32) -> Vec<NaiveDateTime> {
        (0..count).map(|m| at(hour, m)).collect()
    }

    #[test]
    fn test_circular_mean_wraps_through_north() {
        let samples = vec![Some(350.0), Some(355.0), Some(5.0), Some(10.0)];
        let df = frame(&minutes(0, 4), "wind_dir", samples);
        let hourly = normalize(vec![df], &IngestOptions::default()).unwrap();
        let mean = values(&hourly, "wind_dir")[0].unwrap();
        assert!(mean < 1e-6 || (360.0 - mean) < 1e-6, "mean was {mean}");
    }

    #[test]
    fn test_circular_mean_is_order_independent() {
        let forward = vec![Some(10.0), Some(80.0), Some(200.0), Some(300.0)];
        let mut reversed = forward.clone();
        reversed.reverse();
        let a = normalize(vec![frame(&minutes(0, 4), "wind_dir", forward)], &IngestOptions::default()).unwrap();
        let b = normalize(vec![frame(&minutes(0, 4), "wind_dir", reversed)], &IngestOptions::default()).unwrap();
        let (a, b) = (values(&a, "wind_dir")[0].unwrap(), values(&b, "wind_dir")[0].unwrap());
        assert!((a - b).abs() < 1e-9);
        assert!((0.0..360.0).contains(&a));
    }

    #[test]
    fn test_hour_with_too_many_missing_samples_is_missing() {
        // 21 missing samples next to 10 distinct valid ones
        let mut samples: Vec<Option<f64>> = (0..10).map(|i| Some(i as f64)).collect();
        samples.extend(std::iter::repeat(None).take(21));
        let df = frame(&minutes(0, 31), "bmp280_pres", samples);
        let hourly = normalize(vec![df], &IngestOptions::default()).unwrap();
        assert_eq!(values(&hourly, "bmp280_pres"), vec![None]);
    }

    #[test]
    fn test_frozen_sensor_is_missing_but_precipitation_is_summed() {
        let times = minutes(0, 6);
        let frozen = frame(&times, "htu_hum", vec![Some(50.0); 6]);
        let rain = frame(&times, "tipping", vec![Some(0.2), Some(0.0), Some(0.0), Some(0.2), Some(0.0), Some(0.0)]);
        let hourly = normalize(vec![frozen, rain], &IngestOptions::default()).unwrap();
        assert_eq!(values(&hourly, "htu_hum"), vec![None]);
        let rain_sum = values(&hourly, "tipping")[0].unwrap();
        assert!((rain_sum - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_median_and_mean_per_hour_sorted() {
        let later = frame(
            &minutes(1, 4),
            "wind_speed",
            vec![Some(1.0), Some(2.0), Some(3.0), Some(10.0)],
        );
        let earlier = frame(
            &minutes(0, 5),
            "mcp9808",
            vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(100.0)],
        );
        let hourly = normalize(vec![later, earlier], &IngestOptions::default()).unwrap();
        assert_eq!(hourly.height(), 2);
        assert_eq!(values(&hourly, "mcp9808"), vec![Some(3.0), None]);
        assert_eq!(values(&hourly, "wind_speed"), vec![None, Some(4.0)]);
    }

    #[test]
    fn test_hours_without_samples_get_no_row() {
        let mut times = minutes(0, 4);
        times.extend(minutes(3, 4));
        let samples = vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)];
        let df = frame(&times, "mcp9808", [samples.clone(), samples].concat());
        let hourly = normalize(vec![df], &IngestOptions::default()).unwrap();
        assert_eq!(hourly.height(), 2);
    }

    #[test]
    fn test_no_rows_gives_empty_frame() {
        let hourly = normalize(vec![], &IngestOptions::default()).unwrap();
        assert_eq!(hourly.height(), 0);
    }
}
