//! Prepares training and evaluation grids for one station directory.
//!
//! Usage: `cargo run --example prepare_station -- <station_dir> <endpoint> [options.json]`

use station_twin::{
    Era5HttpDownloader, LogProgress, PipelineOptions, StationData, StationTwin, StationTwinError,
};
use std::env;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<(), StationTwinError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = env::args().skip(1);
    let (Some(dir), Some(endpoint)) = (args.next(), args.next()) else {
        eprintln!("usage: prepare_station <station_dir> <endpoint> [options.json]");
        return Ok(());
    };
    let options = match args.next() {
        Some(path) => PipelineOptions::from_json_file(&PathBuf::from(path))?,
        None => PipelineOptions::default(),
    };

    let dir = PathBuf::from(dir);
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "station".to_string());
    let station = StationData::load(&name, &dir, &options.ingest, &LogProgress).await?;
    let Some(location) = station.metadata().coordinate() else {
        return Err(StationTwinError::StationWithoutCoordinate(name));
    };
    println!("{} ({}): {} hourly rows", station.dataset_name(), name, station.series().len());

    let downloader = Era5HttpDownloader::builder()
        .endpoint(endpoint)
        .location(location)
        .build();
    let twin = StationTwin::new(station, downloader, options).await?;

    let training = twin.prepare_training(&LogProgress).await?;
    println!(
        "Training pair with {} timesteps at {} and {}",
        training.input.times().len(),
        training.input_path.display(),
        training.target_path.display()
    );

    match twin.prepare_evaluation(&LogProgress).await? {
        Some(evaluation) => println!(
            "{} missing hours, evaluation grid at {}",
            evaluation.gaps.len(),
            evaluation.input_path.display()
        ),
        None => println!("No missing hours"),
    }
    Ok(())
}
