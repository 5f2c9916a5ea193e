//! Parsing of whitespace-delimited station sensor logs (`*.dat`).
//!
//! The first non-empty line is a header naming every column. Five integer
//! columns (`year month day hour minute`, or the short `mon`/`min` aliases)
//! make up the timestamp; every other column is a numeric channel.

use crate::options::IngestOptions;
use crate::station::error::IngestError;
use crate::types::channel::{is_temperature_sensor, DATETIME_COLUMN, UNIFIED_TEMPERATURE};
use crate::types::hours::datetime_to_ms;
use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, warn};
use polars::prelude::*;
use std::path::Path;

pub const LOG_EXTENSION: &str = "dat";

const TIMESTAMP_COLUMNS: [&str; 5] = ["year", "month", "day", "hour", "minute"];
const KELVIN_OFFSET: f64 = 273.15;
/// Reports exactly 0.0 when it faults.
const ZERO_ON_FAULT_SENSOR: &str = "mcp9808";

fn canonical_column_name(name: &str) -> String {
    match name {
        "mon" => "month".to_string(),
        "min" => "minute".to_string(),
        other => other.to_string(),
    }
}

/// Reads one log file into a cleaned table of raw readings.
///
/// Sentinel values become null, implausible readings are discarded and a
/// unified `tas` channel (mean of the temperature sensors, in Kelvin) is added
/// when the log has at least one temperature sensor.
pub fn read_log_file(path: &Path, options: &IngestOptions) -> Result<DataFrame, IngestError> {
    let text = read_text(path)?;
    parse_log(&text, path, Some(options))
}

/// Reads one log file as-is: timestamps assembled, values untouched.
pub fn read_raw_log_file(path: &Path) -> Result<DataFrame, IngestError> {
    let text = read_text(path)?;
    parse_log(&text, path, None)
}

fn read_text(path: &Path) -> Result<String, IngestError> {
    let bytes = std::fs::read(path).map_err(|e| IngestError::LogRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn parse_timestamp(fields: &[f64; 5]) -> Option<NaiveDateTime> {
    if fields.iter().any(|v| v.fract() != 0.0 || *v < 0.0) {
        return None;
    }
    let [year, month, day, hour, minute] = *fields;
    NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)?
        .and_hms_opt(hour as u32, minute as u32, 0)
}

/// Parses log text. `options` of `None` skips all cleaning.
pub(crate) fn parse_log(
    text: &str,
    path: &Path,
    options: Option<&IngestOptions>,
) -> Result<DataFrame, IngestError> {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let header: Vec<String> = lines
        .next()
        .ok_or_else(|| IngestError::EmptyLog {
            path: path.to_path_buf(),
        })?
        .split_whitespace()
        .map(canonical_column_name)
        .collect();

    let mut timestamp_positions = [0usize; 5];
    for (slot, required) in timestamp_positions.iter_mut().zip(TIMESTAMP_COLUMNS) {
        *slot = header
            .iter()
            .position(|name| name == required)
            .ok_or_else(|| IngestError::MissingTimestampColumns {
                path: path.to_path_buf(),
                found: header.clone(),
            })?;
    }

    let channel_positions: Vec<usize> = (0..header.len())
        .filter(|i| !timestamp_positions.contains(i))
        .collect();

    let mut timestamps: Vec<i64> = Vec::new();
    let mut channels: Vec<Vec<Option<f64>>> = vec![Vec::new(); channel_positions.len()];
    let mut skipped = 0usize;

    for line in lines {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != header.len() {
            skipped += 1;
            continue;
        }
        let mut fields = [0f64; 5];
        let mut valid = true;
        for (field, &position) in fields.iter_mut().zip(&timestamp_positions) {
            match tokens[position].parse::<f64>() {
                Ok(value) => *field = value,
                Err(_) => valid = false,
            }
        }
        let Some(datetime) = valid.then(|| parse_timestamp(&fields)).flatten() else {
            skipped += 1;
            continue;
        };

        timestamps.push(datetime_to_ms(datetime));
        for (values, &position) in channels.iter_mut().zip(&channel_positions) {
            // `nan` and `inf` tokens count as missing, like the sentinel
            values.push(tokens[position].parse::<f64>().ok().filter(|v| v.is_finite()));
        }
    }

    if skipped > 0 {
        warn!("Skipped {} malformed lines in {}", skipped, path.display());
    }

    let names: Vec<&str> = channel_positions.iter().map(|&i| header[i].as_str()).collect();

    if let Some(options) = options {
        clean_channels(&names, &mut channels, options);
    }

    let mut columns = Vec::with_capacity(names.len() + 2);
    columns.push(
        Series::new(DATETIME_COLUMN.into(), timestamps)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
            .into_column(),
    );

    if options.is_some() {
        let sensors: Vec<&Vec<Option<f64>>> = names
            .iter()
            .zip(&channels)
            .filter(|(name, _)| is_temperature_sensor(name))
            .map(|(_, values)| values)
            .collect();
        if !sensors.is_empty() {
            let tas = unified_temperature(&sensors, columns[0].len());
            columns.push(Series::new(UNIFIED_TEMPERATURE.into(), tas).into_column());
        }
    }

    for (name, values) in names.iter().zip(channels) {
        if *name == UNIFIED_TEMPERATURE && options.is_some() {
            // derived above; a raw column of the same name would collide
            continue;
        }
        columns.push(Series::new((*name).into(), values).into_column());
    }

    let df = DataFrame::new(columns)?;
    debug!("Read {} rows from {}", df.height(), path.display());
    Ok(df)
}

fn clean_channels(names: &[&str], channels: &mut [Vec<Option<f64>>], options: &IngestOptions) {
    for (name, values) in names.iter().zip(channels.iter_mut()) {
        let range = if is_temperature_sensor(name) {
            Some(options.temperature_range)
        } else {
            options.plausible_ranges.get(*name).copied()
        };
        let zero_is_fault = name.eq_ignore_ascii_case(ZERO_ON_FAULT_SENSOR);
        for value in values.iter_mut() {
            *value = value.filter(|v| {
                (v - options.missing_sentinel).abs() > 1e-9
                    && !(zero_is_fault && *v == 0.0)
                    && range.is_none_or(|(low, high)| (low..=high).contains(v))
            });
        }
    }
}

/// Row-wise mean of the available sensor values, converted to Kelvin.
fn unified_temperature(sensors: &[&Vec<Option<f64>>], rows: usize) -> Vec<Option<f64>> {
    (0..rows)
        .map(|row| {
            let (sum, count) = sensors
                .iter()
                .filter_map(|values| values[row])
                .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
            (count > 0).then(|| sum / count as f64 + KELVIN_OFFSET)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "\
year mon day hour min mcp9808 bmp280_temp htu_hum tipping wind_dir
2020 1 1 0 0 20.0 22.0 55.0 0.0 350
2020 1 1 0 1 -999.99 21.0 56.0 0.2 10
2020 1 1 0 2 50.0 -999.99 140.0 0.0 20
";

    fn column(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
        df.column(name)
            .expect("column exists")
            .f64()
            .expect("float column")
            .into_iter()
            .collect()
    }

    #[test]
    fn test_parse_cleans_and_derives_tas() {
        let df = parse_log(LOG, Path::new("a.dat"), Some(&IngestOptions::default()))
            .expect("log parses");
        assert_eq!(df.height(), 3);
        assert!(df.column("year").is_err());
        assert!(df.column("mon").is_err());

        let tas = column(&df, "tas");
        assert!((tas[0].unwrap() - (21.0 + 273.15)).abs() < 1e-9);
        assert!((tas[1].unwrap() - (21.0 + 273.15)).abs() < 1e-9);
        // 50 °C is implausible and the other sensor is missing
        assert_eq!(tas[2], None);

        assert_eq!(column(&df, "mcp9808"), vec![Some(20.0), None, None]);
        assert_eq!(column(&df, "htu_hum"), vec![Some(55.0), Some(56.0), None]);
        assert_eq!(column(&df, "wind_dir"), vec![Some(350.0), Some(10.0), Some(20.0)]);
    }

    #[test]
    fn test_timestamps_are_composed() {
        let df = parse_log(LOG, Path::new("a.dat"), None).expect("log parses");
        let datetimes: Vec<Option<i64>> = df
            .column(DATETIME_COLUMN)
            .expect("datetime column")
            .datetime()
            .expect("datetime dtype")
            .into_iter()
            .collect();
        let first = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 1, 0)
            .unwrap();
        assert_eq!(datetimes[1], Some(datetime_to_ms(first)));
        // raw mode keeps sentinels and adds no derived channel
        assert_eq!(column(&df, "mcp9808")[1], Some(-999.99));
        assert!(df.column("tas").is_err());
    }

    #[test]
    fn test_missing_timestamp_columns() {
        let result = parse_log("year month day temp\n2020 1 1 3.0\n", Path::new("b.dat"), None);
        assert!(matches!(
            result,
            Err(IngestError::MissingTimestampColumns { .. })
        ));
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let text = "year month day hour minute temp\n2020 1 1 0 0 1.0\n2020 1 1 0\n2020 13 1 0 0 2.0\n";
        let df = parse_log(text, Path::new("c.dat"), Some(&IngestOptions::default()))
            .expect("log parses");
        assert_eq!(df.height(), 1);
    }

    #[test]
    fn test_log_without_temperature_sensor_has_no_tas() {
        let text = "year month day hour minute tipping\n2020 1 1 0 0 0.2\n";
        let df = parse_log(text, Path::new("d.dat"), Some(&IngestOptions::default()))
            .expect("log parses");
        assert!(df.column("tas").is_err());
        assert_eq!(df.width(), 2);
    }

    #[test]
    fn test_faulty_zero_reading_is_missing() {
        let text = "year mon day hour min mcp9808 bmp280_temp\n2020 1 1 0 0 0.0 22.0\n2020 1 1 0 1 0.5 0.0\n";
        let df = parse_log(text, Path::new("e.dat"), Some(&IngestOptions::default()))
            .expect("log parses");
        assert_eq!(column(&df, "mcp9808"), vec![None, Some(0.5)]);
        // only that sensor reports zero on fault
        assert_eq!(column(&df, "bmp280_temp"), vec![Some(22.0), Some(0.0)]);
        let tas = column(&df, "tas");
        assert!((tas[0].unwrap() - (22.0 + 273.15)).abs() < 1e-9);
    }

    #[test]
    fn test_nan_tokens_count_as_missing_samples() {
        let mut text = String::from("year mon day hour min wind_speed\n");
        for minute in 0..60 {
            let value = if minute < 21 { "nan".to_string() } else { format!("{}.5", minute % 7) };
            text.push_str(&format!("2020 1 1 0 {minute} {value}\n"));
        }
        let options = IngestOptions::default();
        let df = parse_log(&text, Path::new("f.dat"), Some(&options)).expect("log parses");
        let speeds = column(&df, "wind_speed");
        assert!(speeds[..21].iter().all(Option::is_none));
        assert_eq!(speeds[21], Some(0.5));

        let hourly = crate::station::normalizer::normalize(vec![df], &options).expect("normalizes");
        assert_eq!(column(&hourly, "wind_speed"), vec![None]);
    }
}
