//! Decoders for provider-native grid files.
//!
//! Reanalysis providers deliver point tables (one row per time and grid cell)
//! as CSV; previously converted files use the internal parquet layout. NetCDF
//! lives in [`crate::grid::netcdf_decoder`].

use crate::grid::error::GridError;
use crate::grid::grid_file::{grid_from_frame, LAT_COLUMN, LON_COLUMN, TIME_COLUMN};
use crate::grid::reanalysis::ReanalysisGrid;
use crate::types::channel::UNIFIED_TEMPERATURE;
use crate::types::hours::datetime_to_ms;
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::io::Cursor;
use std::path::Path;

pub trait GridDecoder: Send + Sync {
    /// Whether this decoder understands a file of this name (any `.gz` suffix
    /// already removed).
    fn accepts(&self, file_name: &str) -> bool;

    fn decode(&self, path: &Path, bytes: Vec<u8>) -> Result<ReanalysisGrid, GridError>;
}

const TIME_ALIASES: [&str; 3] = ["time", "valid_time", "date"];
const LAT_ALIASES: [&str; 2] = ["latitude", "lat"];
const LON_ALIASES: [&str; 2] = ["longitude", "lon"];

const TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Maps provider variable codes onto the internal channel vocabulary.
/// Unknown names pass through unchanged.
pub fn rename_variable(name: &str) -> String {
    match name {
        "var167" | "t2m" | "2t" => UNIFIED_TEMPERATURE.to_string(),
        "var228" | "tp" => "pr".to_string(),
        "var165" | "u10" | "10u" => "uas".to_string(),
        "var166" | "v10" | "10v" => "vas".to_string(),
        "var134" | "sp" => "ps".to_string(),
        "var168" | "d2m" | "2d" => "tdps".to_string(),
        other => other.to_string(),
    }
}

pub(crate) fn parse_time(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim().trim_end_matches('Z');
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn find_column<'a>(df: &'a DataFrame, aliases: &[&str]) -> Option<&'a str> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.as_str())
        .find(|name| aliases.iter().any(|alias| name.eq_ignore_ascii_case(alias)))
}

pub(crate) fn decode_error(path: &Path, message: impl Into<String>) -> GridError {
    GridError::Decode {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

/// Point tables in CSV with a header row.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvGridDecoder;

impl CsvGridDecoder {
    fn to_internal_frame(path: &Path, df: DataFrame) -> Result<DataFrame, GridError> {
        let time_name = find_column(&df, &TIME_ALIASES)
            .ok_or_else(|| decode_error(path, "no time column"))?
            .to_string();
        let lat_name = find_column(&df, &LAT_ALIASES)
            .ok_or_else(|| decode_error(path, "no latitude column"))?
            .to_string();
        let lon_name = find_column(&df, &LON_ALIASES)
            .ok_or_else(|| decode_error(path, "no longitude column"))?
            .to_string();

        let time_column = df.column(&time_name)?;
        let millis: Vec<Option<i64>> = match time_column.dtype() {
            DataType::String => time_column
                .str()?
                .into_iter()
                .map(|v| v.and_then(parse_time).map(datetime_to_ms))
                .collect(),
            DataType::Datetime(_, _) => time_column
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
                .datetime()?
                .into_iter()
                .collect(),
            other => {
                return Err(decode_error(path, format!("unsupported time column type {other}")));
            }
        };
        if millis.iter().all(Option::is_none) {
            return Err(decode_error(path, "no parsable timestamps"));
        }

        let mut columns = vec![
            Series::new(TIME_COLUMN.into(), millis)
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
                .into_column(),
            df.column(&lat_name)?.clone().with_name(LAT_COLUMN.into()),
            df.column(&lon_name)?.clone().with_name(LON_COLUMN.into()),
        ];
        for column in df.get_columns() {
            let name = column.name().as_str();
            if name == time_name || name == lat_name || name == lon_name {
                continue;
            }
            if column.dtype().is_float() || column.dtype().is_integer() {
                columns.push(column.clone());
            }
        }
        Ok(DataFrame::new(columns)?)
    }
}

impl GridDecoder for CsvGridDecoder {
    fn accepts(&self, file_name: &str) -> bool {
        file_name.to_ascii_lowercase().ends_with(".csv")
    }

    fn decode(&self, path: &Path, bytes: Vec<u8>) -> Result<ReanalysisGrid, GridError> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()
            .map_err(|e| decode_error(path, e.to_string()))?;
        let internal = Self::to_internal_frame(path, df)?;
        grid_from_frame(&internal, TIME_COLUMN, LAT_COLUMN, LON_COLUMN)
    }
}

/// Grid files already in the internal parquet layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetGridDecoder;

impl GridDecoder for ParquetGridDecoder {
    fn accepts(&self, file_name: &str) -> bool {
        file_name.to_ascii_lowercase().ends_with(".parquet")
    }

    fn decode(&self, path: &Path, bytes: Vec<u8>) -> Result<ReanalysisGrid, GridError> {
        let df = ParquetReader::new(Cursor::new(bytes))
            .finish()
            .map_err(|e| decode_error(path, e.to_string()))?;
        grid_from_frame(&df, TIME_COLUMN, LAT_COLUMN, LON_COLUMN)
    }
}
