//! NetCDF files as delivered by the ERA5 single-levels dataset.
//!
//! Every variable laid out over (time, latitude, longitude) becomes a channel.
//! Packed values are unpacked with `scale_factor`/`add_offset`, and
//! `_FillValue`/`missing_value` cells become NaN.

use crate::grid::decoder::{decode_error, parse_time, GridDecoder};
use crate::grid::error::GridError;
use crate::grid::grid_file::{grid_from_frame, LAT_COLUMN, LON_COLUMN, TIME_COLUMN};
use crate::grid::reanalysis::ReanalysisGrid;
use crate::types::hours::datetime_to_ms;
use log::debug;
use netcdf::AttributeValue;
use polars::prelude::*;
use std::io::Write;
use std::path::Path;

const TIME_VARIABLES: [&str; 2] = ["valid_time", "time"];
const LAT_VARIABLES: [&str; 2] = ["latitude", "lat"];
const LON_VARIABLES: [&str; 2] = ["longitude", "lon"];

#[derive(Debug, Clone, Copy, Default)]
pub struct NetcdfGridDecoder;

/// A coordinate variable with the dimension it spans.
struct Axis {
    dimension: String,
    values: Vec<f64>,
}

fn attribute_f64(var: &netcdf::Variable, name: &str) -> Option<f64> {
    match var.attribute_value(name)?.ok()? {
        AttributeValue::Double(v) => Some(v),
        AttributeValue::Float(v) => Some(v as f64),
        AttributeValue::Int(v) => Some(v as f64),
        AttributeValue::Short(v) => Some(v as f64),
        AttributeValue::Longlong(v) => Some(v as f64),
        _ => None,
    }
}

fn attribute_str(var: &netcdf::Variable, name: &str) -> Option<String> {
    match var.attribute_value(name)?.ok()? {
        AttributeValue::Str(v) => Some(v),
        _ => None,
    }
}

/// Milliseconds per step and the reference instant of CF units such as
/// `hours since 1900-01-01 00:00:00.0`.
fn parse_time_units(units: &str) -> Option<(f64, i64)> {
    let (step, reference) = units.split_once(" since ")?;
    let step_ms = match step.trim().to_ascii_lowercase().as_str() {
        "seconds" | "second" | "s" => 1_000.0,
        "minutes" | "minute" => 60_000.0,
        "hours" | "hour" | "h" => 3_600_000.0,
        "days" | "day" => 86_400_000.0,
        _ => return None,
    };
    // fractional seconds are not part of any reference ERA5 uses
    let reference = reference.trim().split('.').next()?;
    Some((step_ms, datetime_to_ms(parse_time(reference)?)))
}

impl NetcdfGridDecoder {
    fn read_axis(path: &Path, file: &netcdf::File, names: &[&str]) -> Result<Axis, GridError> {
        let var = names
            .iter()
            .find_map(|name| file.variable(name))
            .ok_or_else(|| decode_error(path, format!("no {} variable", names.join(" or "))))?;
        let dimension = match var.dimensions() {
            [dim] => dim.name(),
            _ => return Err(decode_error(path, format!("{} is not one-dimensional", var.name()))),
        };
        let values: Vec<f64> = var
            .get_values(..)
            .map_err(|e| decode_error(path, e.to_string()))?;
        Ok(Axis { dimension, values })
    }

    fn read_times(path: &Path, file: &netcdf::File) -> Result<(String, Vec<i64>), GridError> {
        let var = TIME_VARIABLES
            .iter()
            .find_map(|name| file.variable(name))
            .ok_or_else(|| decode_error(path, "no time variable"))?;
        let units = attribute_str(&var, "units").ok_or_else(|| decode_error(path, "time has no units"))?;
        let (step_ms, reference_ms) = parse_time_units(&units)
            .ok_or_else(|| decode_error(path, format!("unsupported time units '{units}'")))?;
        let axis = Self::read_axis(path, file, &TIME_VARIABLES)?;
        let millis = axis
            .values
            .iter()
            .map(|v| reference_ms + (v * step_ms).round() as i64)
            .collect();
        Ok((axis.dimension, millis))
    }

    fn to_internal_frame(path: &Path, file: &netcdf::File) -> Result<DataFrame, GridError> {
        let (time_dim, millis) = Self::read_times(path, file)?;
        let lat = Self::read_axis(path, file, &LAT_VARIABLES)?;
        let lon = Self::read_axis(path, file, &LON_VARIABLES)?;
        let (nt, ny, nx) = (millis.len(), lat.values.len(), lon.values.len());
        let cells = nt * ny * nx;
        let layout = [time_dim.as_str(), lat.dimension.as_str(), lon.dimension.as_str()];

        let mut columns = Vec::new();
        for var in file.variables() {
            // singleton dimensions such as `expver` or `number` are squeezed out
            let dims: Vec<String> = var
                .dimensions()
                .iter()
                .filter(|dim| dim.len() != 1 || layout.contains(&dim.name().as_str()))
                .map(|dim| dim.name())
                .collect();
            if dims != layout {
                continue;
            }
            let raw: Vec<f64> = var
                .get_values(..)
                .map_err(|e| decode_error(path, e.to_string()))?;
            if raw.len() != cells {
                return Err(decode_error(
                    path,
                    format!("{} holds {} values, expected {}", var.name(), raw.len(), cells),
                ));
            }
            let scale = attribute_f64(&var, "scale_factor").unwrap_or(1.0);
            let offset = attribute_f64(&var, "add_offset").unwrap_or(0.0);
            let fill = attribute_f64(&var, "_FillValue");
            let missing = attribute_f64(&var, "missing_value");
            let values: Vec<f64> = raw
                .into_iter()
                .map(|v| {
                    if Some(v) == fill || Some(v) == missing || v.is_nan() {
                        f64::NAN
                    } else {
                        v * scale + offset
                    }
                })
                .collect();
            debug!("{}: variable {} with {} cells", path.display(), var.name(), cells);
            columns.push(Column::new(var.name().into(), values));
        }
        if columns.is_empty() {
            return Err(decode_error(path, "no variable over time, latitude and longitude"));
        }

        let mut times = Vec::with_capacity(cells);
        let mut lats = Vec::with_capacity(cells);
        let mut lons = Vec::with_capacity(cells);
        for &ms in &millis {
            for &y in &lat.values {
                for &x in &lon.values {
                    times.push(ms);
                    lats.push(y);
                    lons.push(x);
                }
            }
        }
        let mut frame = vec![
            Column::new(TIME_COLUMN.into(), times)
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?,
            Column::new(LAT_COLUMN.into(), lats),
            Column::new(LON_COLUMN.into(), lons),
        ];
        frame.extend(columns);
        Ok(DataFrame::new(frame)?)
    }
}

impl GridDecoder for NetcdfGridDecoder {
    fn accepts(&self, file_name: &str) -> bool {
        let name = file_name.to_ascii_lowercase();
        name.ends_with(".nc") || name.ends_with(".netcdf")
    }

    fn decode(&self, path: &Path, bytes: Vec<u8>) -> Result<ReanalysisGrid, GridError> {
        // the library only opens files, and the bytes may have been gunzipped
        let mut copy = tempfile::Builder::new()
            .suffix(".nc")
            .tempfile()
            .map_err(|e| GridError::FileRead(path.to_path_buf(), e))?;
        copy.write_all(&bytes)
            .and_then(|_| copy.flush())
            .map_err(|e| GridError::FileRead(path.to_path_buf(), e))?;
        let file = netcdf::open(copy.path()).map_err(|e| decode_error(path, e.to_string()))?;
        let frame = Self::to_internal_frame(path, &file)?;
        grid_from_frame(&frame, TIME_COLUMN, LAT_COLUMN, LON_COLUMN)
    }
}
