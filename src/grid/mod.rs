pub mod bridge;
pub mod cropper;
pub mod decoder;
pub mod error;
pub mod fill;
pub mod grid_file;
#[cfg(feature = "netcdf")]
pub mod netcdf_decoder;
pub mod reanalysis;
pub mod window;
