pub mod error;
pub mod gaps;
pub mod log_reader;
pub mod metadata;
pub mod normalizer;
pub mod series;
pub mod station_data;
