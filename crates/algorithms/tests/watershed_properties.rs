//! End-to-end properties of the hydrology chain on synthetic DEMs:
//! condition, route, extract streams, snap and delineate.

use basinflow_algorithms::hydrology::{
    delineate, extract_streams, find_pits, resolve, route, snap_to_stream, FlowRouting,
    ResolveParams, StreamParams,
};
use basinflow_algorithms::statistics::masked_mean;
use basinflow_algorithms::terrain::{slope, SlopeParams};
use basinflow_core::raster::{FlowDir, GeoTransform, Raster};
use basinflow_core::io::{read_geotiff, write_geotiff};
use basinflow_core::{Error, CRS};
use geo_types::Coord;

const NODATA: f64 = -9999.0;

/// Valley draining south along the center column:
/// z = 10 * |col - mid| + (rows - 1 - row)
fn v_valley(rows: usize, cols: usize) -> Raster<f64> {
    let mid = cols / 2;
    let mut dem = Raster::new(rows, cols);
    dem.set_transform(GeoTransform::new(500_000.0, 4_000_000.0, 30.0, -30.0));
    dem.set_crs(Some(CRS::from_epsg(32633)));
    for row in 0..rows {
        for col in 0..cols {
            let z = 10.0 * col.abs_diff(mid) as f64 + (rows - 1 - row) as f64;
            dem.set(row, col, z).unwrap();
        }
    }
    dem
}

/// Rolling terrain with deterministic pseudo-random pits and a no-data hole
fn rough_terrain(rows: usize, cols: usize) -> Raster<f64> {
    let mut dem = Raster::new(rows, cols);
    dem.set_transform(GeoTransform::new(0.0, rows as f64 * 10.0, 10.0, -10.0));
    dem.set_nodata(Some(NODATA));
    for row in 0..rows {
        for col in 0..cols {
            let base = 200.0 + 0.5 * row as f64 + 8.0 * ((col as f64) / 4.0).sin();
            let noise = ((row * 7919 + col * 104_729) % 97) as f64 * 0.1;
            dem.set(row, col, base + noise).unwrap();
        }
    }
    for row in rows / 3..rows / 3 + 4 {
        for col in cols / 2..cols / 2 + 3 {
            dem.set(row, col, NODATA).unwrap();
        }
    }
    dem
}

fn downstream_of(routing: &FlowRouting, row: usize, col: usize) -> Option<(usize, usize)> {
    let (rows, cols) = routing.direction.shape();
    let n = routing.direction.get(row, col).ok()?.downstream(row, col, rows, cols)?;
    (routing.direction.data()[n] != FlowDir::NoData).then_some(n)
}

#[test]
fn conditioned_dem_has_no_pits() {
    let dem = rough_terrain(40, 30);
    assert!(!find_pits(&dem).unwrap().is_empty());

    for params in [
        ResolveParams::default(),
        ResolveParams { max_breach_length: 0, ..Default::default() },
        ResolveParams { flat_increment: 1e-5, ..Default::default() },
    ] {
        let conditioned = resolve(&dem, params).unwrap();
        assert!(find_pits(&conditioned).unwrap().is_empty());
        assert_eq!(conditioned.valid_count(), dem.valid_count());
    }
}

#[test]
fn accumulation_is_positive_and_monotone_downstream() {
    let dem = resolve(&rough_terrain(40, 30), ResolveParams::default()).unwrap();
    let routing = route(&dem).unwrap();
    let acc = &routing.accumulation;

    for ((row, col), &dir) in routing.direction.data().indexed_iter() {
        let a = acc.get(row, col).unwrap();
        if dir == FlowDir::NoData {
            assert_eq!(a, 0);
            continue;
        }
        assert!(a >= 1);
        if let Some(n) = downstream_of(&routing, row, col) {
            assert!(acc.data()[n] > a, "accumulation drops from ({}, {}) to {:?}", row, col, n);
        }
    }
}

#[test]
fn outlet_accumulation_sums_to_valid_cells() {
    let dem = resolve(&rough_terrain(40, 30), ResolveParams::default()).unwrap();
    let routing = route(&dem).unwrap();
    let total: u64 = routing
        .outlets()
        .into_iter()
        .map(|cell| routing.accumulation.data()[cell] as u64)
        .sum();
    assert_eq!(total, dem.valid_count() as u64);
}

#[test]
fn lowered_interior_cell_in_nodata_frame_is_filled_flat() {
    // 5x5 flat block framed by no-data, one cell off its corner lowered
    let mut dem = Raster::filled(7, 7, NODATA);
    dem.set_nodata(Some(NODATA));
    for row in 1..6 {
        for col in 1..6 {
            dem.set(row, col, 10.0).unwrap();
        }
    }
    dem.set(2, 2, 0.0).unwrap();

    // Nothing on the grid is below the pit, so breaching leaves it to the fill
    for params in [
        ResolveParams::default(),
        ResolveParams { max_breach_length: 0, ..Default::default() },
    ] {
        let conditioned = resolve(&dem, params).unwrap();
        for row in 1..6 {
            for col in 1..6 {
                assert_eq!(conditioned.get(row, col).unwrap(), 10.0, "cell ({}, {})", row, col);
            }
        }
        assert_eq!(conditioned.get(0, 0).unwrap(), NODATA);
    }
}

#[test]
fn lowered_corner_touching_nodata_stays_an_outlet() {
    // 5x5 grid whose outer ring is no-data, corner of the valid block lowered
    let mut dem = Raster::filled(5, 5, NODATA);
    dem.set_nodata(Some(NODATA));
    for row in 1..4 {
        for col in 1..4 {
            dem.set(row, col, 10.0).unwrap();
        }
    }
    dem.set(1, 1, 0.0).unwrap();

    // Cells next to no-data drain off the valid domain and are never pits,
    // so the corner keeps its elevation and the rest stays untouched
    let conditioned = resolve(&dem, ResolveParams::default()).unwrap();
    assert_eq!(conditioned.data(), dem.data());
    assert!(find_pits(&conditioned).unwrap().is_empty());

    let routing = route(&conditioned).unwrap();
    assert_eq!(routing.direction.get(1, 1).unwrap(), FlowDir::Outlet);
    for (row, col) in [(1, 2), (2, 1), (2, 2)] {
        assert_eq!(downstream_of(&routing, row, col), Some((1, 1)), "cell ({}, {})", row, col);
    }
    assert_eq!(routing.accumulation.get(1, 1).unwrap(), 4);
}

#[test]
fn v_valley_drains_to_center_column() {
    let (rows, cols) = (9, 11);
    let mid = cols / 2;
    let dem = v_valley(rows, cols);
    let routing = route(&resolve(&dem, ResolveParams::default()).unwrap()).unwrap();

    for row in 0..rows {
        for col in 0..cols {
            let dir = routing.direction.get(row, col).unwrap();
            let expected = if col < mid {
                FlowDir::East
            } else if col > mid {
                FlowDir::West
            } else if row < rows - 1 {
                FlowDir::South
            } else {
                FlowDir::Outlet
            };
            assert_eq!(dir, expected, "cell ({}, {})", row, col);
        }
    }
    assert_eq!(routing.accumulation.get(rows - 1, mid).unwrap() as usize, rows * cols);
}

#[test]
fn v_valley_watershed_covers_every_cell() {
    let dem = v_valley(9, 11);
    let routing = route(&dem).unwrap();
    let (x, y) = dem.pixel_to_geo(5, 8);

    let mask = delineate(&routing.direction, x, y).unwrap();
    assert!(mask.data().iter().all(|&m| m));

    // Mean slope over the full-basin mask is the plain mean
    let slopes = slope(&dem, SlopeParams::default()).unwrap();
    let mean = masked_mean(&slopes, &mask).unwrap();
    let plain = slopes.data().iter().sum::<f64>() / slopes.len() as f64;
    assert!((mean - plain).abs() < 1e-9);
}

#[test]
fn delineation_is_idempotent() {
    let dem = resolve(&rough_terrain(40, 30), ResolveParams::default()).unwrap();
    let routing = route(&dem).unwrap();
    let outlet = routing
        .outlets()
        .into_iter()
        .max_by_key(|&cell| routing.accumulation.data()[cell])
        .unwrap();
    let (x, y) = dem.pixel_to_geo(outlet.1, outlet.0);

    let first = delineate(&routing.direction, x, y).unwrap();
    let second = delineate(&routing.direction, x, y).unwrap();
    assert_eq!(first.data(), second.data());
    let count = first.data().iter().filter(|&&m| m).count();
    assert_eq!(count as u32, routing.accumulation.data()[outlet]);
}

#[test]
fn constant_accumulation_thresholds() {
    let acc: Raster<u32> = Raster::filled(6, 6, 500);
    let all = extract_streams(&acc, StreamParams { threshold: 300 }).unwrap();
    assert!(all.data().iter().all(|&s| s));
    let none = extract_streams(&acc, StreamParams { threshold: 600 }).unwrap();
    assert!(none.data().iter().all(|&s| !s));
}

#[test]
fn snapping_is_stable_on_streams() {
    let dem = v_valley(9, 11);
    let routing = route(&dem).unwrap();
    let streams = extract_streams(&routing.accumulation, StreamParams { threshold: 20 }).unwrap();

    for ((row, col), &is_stream) in streams.data().indexed_iter() {
        if !is_stream {
            continue;
        }
        let (x, y) = streams.pixel_to_geo(col, row);
        let snapped = snap_to_stream(Coord { x, y }, &streams, 0.0).unwrap();
        assert_eq!((snapped.x, snapped.y), (x, y));
    }

    // Off-stream points move onto the valley floor
    let (x, y) = streams.pixel_to_geo(3, 4);
    let snapped = snap_to_stream(Coord { x, y }, &streams, 90.0).unwrap();
    assert_eq!((snapped.x, snapped.y), streams.pixel_to_geo(5, 4));
    assert!(matches!(
        snap_to_stream(Coord { x, y }, &streams, 30.0),
        Err(Error::NoStreamWithinRadius { .. })
    ));
}

#[test]
fn mismatched_grids_are_rejected() {
    let dem = v_valley(9, 11);
    let routing = route(&dem).unwrap();
    let mut shifted = slope(&dem, SlopeParams::default()).unwrap();
    shifted.set_transform(GeoTransform::new(0.0, 0.0, 30.0, -30.0));
    let (x, y) = dem.pixel_to_geo(5, 8);
    let mask = delineate(&routing.direction, x, y).unwrap();
    assert!(matches!(masked_mean(&shifted, &mask), Err(Error::GridMismatch(_))));
}

#[test]
fn conditioned_dem_survives_geotiff_round_trip() {
    let dem = resolve(&rough_terrain(20, 16), ResolveParams::default()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conditioned.tif");
    write_geotiff(&dem, &path).unwrap();

    let restored: Raster<f64> = read_geotiff(&path).unwrap();
    restored.ensure_same_grid(&dem).unwrap();
    assert_eq!(restored.nodata(), Some(NODATA));
    assert_eq!(restored.data(), dem.data());

    let before = route(&dem).unwrap();
    let after = route(&restored).unwrap();
    assert_eq!(before.accumulation.data(), after.accumulation.data());
}
