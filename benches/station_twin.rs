use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array3;
use station_twin::station::log_reader::read_log_file;
use station_twin::station::normalizer::normalize;
use station_twin::{GridCropper, IngestOptions, LatLon, ReanalysisGrid};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// One day of minutely samples from two temperature sensors and a rain gauge.
fn log_text(day: u32) -> String {
    let mut text = String::from("year mon day hour min mcp9808 bmp280_temp tipping\n");
    for hour in 0..24 {
        for minute in 0..60 {
            let temp = 20.0 + (hour * 60 + minute) as f64 / 100.0;
            writeln!(text, "2020 1 {day} {hour} {minute} {temp:.2} {:.2} 0.2", temp + 0.3).unwrap();
        }
    }
    text
}

fn global_grid(hours: i64) -> ReanalysisGrid {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    let times = (0..hours).map(|h| start + Duration::hours(h)).collect();
    let lat: Vec<f64> = (0..181).map(|i| 90.0 - i as f64).collect();
    let lon: Vec<f64> = (0..360).map(|i| i as f64).collect();
    let tas = Array3::from_shape_fn((hours as usize, lat.len(), lon.len()), |(t, y, x)| {
        250.0 + t as f64 + y as f64 * 0.1 + x as f64 * 0.01
    });
    ReanalysisGrid::new(times, lat, lon, BTreeMap::from([("tas".to_string(), tas)])).unwrap()
}

fn bench_station_twin(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let options = IngestOptions::default();
    let frames: Vec<_> = (1..=7)
        .map(|day| {
            let path = dir.path().join(format!("log_2020010{day}.dat"));
            std::fs::write(&path, log_text(day)).unwrap();
            read_log_file(&path, &options).unwrap()
        })
        .collect();
    c.bench_function("normalize_week", |b| {
        b.iter(|| normalize(black_box(frames.clone()), &options))
    });

    let grid = global_grid(24);
    let cropper = GridCropper::new(8).unwrap();
    c.bench_function("crop_space_global", |b| {
        b.iter(|| cropper.crop_space(black_box(&grid), black_box(LatLon(-17.7, 179.6))))
    });
}

criterion_group!(benches, bench_station_twin);
criterion_main!(benches);
