//! Integration tests: write a series through `TimestepWriter` and read it back
//! with `BlockReader`, all in memory.

use grid_common::{Raster, SpatialGrid};
use netcdf_stream::{
    BlockReader, GlobalMetadata, GridDataset, MemoryDataset, PutRecord, ReaderConfig,
    StreamConfig, TimestepWriter, WriteMode,
};
use test_utils::{
    assert_raster_eq, create_precipitation_raster, create_raster_with_nans,
    create_sequence_raster, daily_axis, geographic_grid, init_test_tracing, utm_grid,
};

/// Write `steps` sequence rasters of `variable` and return the dataset.
fn write_series(
    grid: &SpatialGrid,
    steps: usize,
    max_buffer_steps: usize,
    variable: &str,
) -> MemoryDataset {
    let ds = MemoryDataset::new();
    let config = StreamConfig {
        crs: grid.crs.to_string(),
        max_buffer_steps,
        ..StreamConfig::default()
    };
    let mut writer = TimestepWriter::new(
        ds.clone(),
        "memory",
        grid,
        daily_axis(steps),
        config,
        &GlobalMetadata::new().with("title", "integration"),
        WriteMode::Output,
    )
    .unwrap();

    for t in 1..=steps {
        let raster = create_sequence_raster(grid.rows, grid.cols, t);
        writer.write(t, variable, "mm", variable, &raster).unwrap();
    }
    assert!(writer.finish().unwrap().is_clean());
    ds
}

#[test]
fn test_three_day_scenario() {
    init_test_tracing();
    let grid = geographic_grid(2, 2);
    let ds = write_series(&grid, 3, 2, "P");

    assert_eq!(
        ds.puts_for("P"),
        vec![
            PutRecord {
                variable: "P".to_string(),
                start: 0,
                count: 2
            },
            PutRecord {
                variable: "P".to_string(),
                start: 2,
                count: 1
            },
        ]
    );

    let mut reader = BlockReader::new(ds, "memory", &["P"], &ReaderConfig::default()).unwrap();
    let slice = reader.read(2, "P").unwrap();
    assert!(slice.found);
    assert_raster_eq!(
        slice.raster,
        Raster::from_rows(&[[5.0, 6.0], [7.0, 8.0]]).unwrap()
    );
}

#[test]
fn test_every_write_depth_reproduces_series() {
    let grid = geographic_grid(3, 4);
    let steps = 11;
    for depth in [1, 2, 3, 5, 11, 25] {
        let ds = write_series(&grid, steps, depth, "Q");

        let effective = depth.min(steps);
        let starts: Vec<usize> = ds.puts_for("Q").iter().map(|p| p.start).collect();
        let expected: Vec<usize> = (0..steps).step_by(effective).collect();
        assert_eq!(starts, expected, "flush points for depth {}", depth);

        for window in [1, 4, 11] {
            let config = ReaderConfig {
                window_steps: Some(window),
                ..ReaderConfig::default()
            };
            let mut reader = BlockReader::new(ds.clone(), "memory", &["Q"], &config).unwrap();
            for t in 1..=steps {
                let slice = reader.read(t, "Q").unwrap();
                assert_raster_eq!(slice.raster, create_sequence_raster(3, 4, t));
            }
        }
    }
}

#[test]
fn test_refill_counting() {
    let grid = geographic_grid(2, 3);
    let ds = write_series(&grid, 10, 4, "P");
    let config = ReaderConfig {
        window_steps: Some(4),
        ..ReaderConfig::default()
    };
    let mut reader = BlockReader::new(ds, "memory", &["P"], &config).unwrap();
    assert_eq!(reader.stats().refills, 0);

    reader.read(5, "P").unwrap();
    assert_eq!(reader.stats().refills, 1);
    reader.read(5, "P").unwrap();
    assert_eq!(reader.stats().refills, 1);
    assert_eq!(reader.stats().window_start, 5);
}

#[test]
fn test_missing_values_round_trip() {
    let grid = geographic_grid(3, 3);
    let ds = MemoryDataset::new();
    let mut writer = TimestepWriter::new(
        ds.clone(),
        "memory",
        &grid,
        daily_axis(2),
        StreamConfig::default(),
        &GlobalMetadata::new(),
        WriteMode::Output,
    )
    .unwrap();

    let first = create_raster_with_nans(3, 3, 2.5, &[(0, 0), (2, 1)]);
    let second = create_precipitation_raster(3, 3, 7);
    writer.write(1, "P", "mm", "precipitation", &first).unwrap();
    writer.write(2, "P", "mm", "precipitation", &second).unwrap();
    drop(writer);

    let mut reader = BlockReader::new(ds, "memory", &["P"], &ReaderConfig::default()).unwrap();
    assert_raster_eq!(reader.read(1, "P").unwrap().raster, first);
    let back = reader.read(2, "P").unwrap().raster;
    for (a, b) in back.data().iter().zip(second.data()) {
        assert_eq!(*a, *b as f32 as f64);
    }
}

#[test]
fn test_absent_variable_never_errors() {
    let grid = geographic_grid(2, 2);
    let ds = write_series(&grid, 4, 2, "P");
    let mut reader =
        BlockReader::new(ds, "memory", &["P", "TEMP"], &ReaderConfig::default()).unwrap();
    for t in 1..=4 {
        let slice = reader.read(t, "TEMP").unwrap();
        assert!(!slice.found);
        assert_eq!(slice.raster, Raster::zeros(2, 2));
    }
}

#[test]
fn test_projected_series() {
    let grid = utm_grid(3, 4);
    let ds = write_series(&grid, 3, 25, "run");

    assert_eq!(ds.variable_dims("run").unwrap(), vec!["time", "y", "x"]);
    assert_eq!(
        ds.attribute(Some("run"), "grid_mapping").unwrap().as_str(),
        Some("crs")
    );

    let mut reader = BlockReader::new(ds, "memory", &["run"], &ReaderConfig::default()).unwrap();
    assert_eq!(reader.shape(), (3, 4));
    assert_raster_eq!(
        reader.read(3, "run").unwrap().raster,
        create_sequence_raster(3, 4, 3)
    );
}

#[test]
fn test_state_mode_reports_dirty_buffers() {
    let grid = geographic_grid(2, 2);
    let ds = MemoryDataset::new();
    let config = StreamConfig {
        max_buffer_steps: 4,
        ..StreamConfig::default()
    };
    let mut writer = TimestepWriter::new(
        ds.clone(),
        "memory",
        &grid,
        daily_axis(8),
        config,
        &GlobalMetadata::new(),
        WriteMode::State,
    )
    .unwrap();
    for t in 1..=5 {
        writer
            .write(t, "SoilMoisture", "mm", "soil_moisture", &Raster::filled(2, 2, t as f64))
            .unwrap();
    }

    let report = writer.finish().unwrap();
    assert_eq!(report.flushes, 1);
    assert_eq!(report.unflushed, vec!["SoilMoisture".to_string()]);
    // Only the first block reached the dataset
    assert_eq!(ds.puts_for("SoilMoisture").len(), 1);
}
