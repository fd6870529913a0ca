//! Pour point snapping
//!
//! Moves an approximate outlet onto the nearest stream cell. Distances are
//! ground distances between cell centers, so a point already inside a
//! stream cell always snaps to that cell.

use basinflow_core::raster::{GeoTransform, Raster};
use basinflow_core::{Error, PourPoint, RasterElement, Result};
use geo_types::Coord;

/// Parameters for pour point snapping
#[derive(Debug, Clone)]
pub struct SnapParams {
    /// Search radius in map units of the stream grid
    pub max_distance: f64,
}

impl Default for SnapParams {
    fn default() -> Self {
        Self { max_distance: 100.0 }
    }
}

/// Snap a pour point onto the stream network.
///
/// Consumes the caller's point and returns the snapped one, located at the
/// chosen stream cell's center with `snap_distance` recording how far it
/// moved.
pub fn snap_pour_point(point: PourPoint, streams: &Raster<bool>, params: SnapParams) -> Result<PourPoint> {
    let snapped = snap_to_stream(point.location, streams, params.max_distance)?;
    let moved = (snapped.x - point.location.x).hypot(snapped.y - point.location.y);
    Ok(PourPoint {
        label: point.label,
        location: snapped,
        snap_distance: Some(moved),
    })
}

/// Center of the stream cell nearest to `point`, within `max_distance`.
///
/// Searches expanding square rings around the cell containing `point`.
/// Equidistant candidates resolve to the smallest row-major index.
///
/// # Errors
/// - `InvalidInput` for a non-finite or off-grid coordinate, or a negative
///   or non-finite `max_distance`
/// - `NoStreamWithinRadius` when no stream cell lies within `max_distance`
pub fn snap_to_stream(point: Coord<f64>, streams: &Raster<bool>, max_distance: f64) -> Result<Coord<f64>> {
    if !max_distance.is_finite() || max_distance < 0.0 {
        return Err(Error::InvalidInput(format!(
            "snap distance must be a non-negative number, got {}",
            max_distance
        )));
    }
    streams.transform().validate()?;

    let (row0, col0) = streams.cell_at(point.x, point.y).ok_or_else(|| {
        Error::InvalidInput(format!(
            "pour point ({}, {}) is not on the grid",
            point.x, point.y
        ))
    })?;

    let (rows, cols) = streams.shape();
    let gt = streams.transform();
    let ring_spacing = min_stretch(gt);
    let nodata = streams.nodata();
    let is_stream = |row: usize, col: usize| {
        let v = streams.data()[(row, col)];
        v && !v.is_nodata(nodata)
    };

    // (distance, row, col) of the best candidate so far
    let mut best: Option<(f64, usize, usize)> = None;
    let max_ring = rows.max(cols);

    for k in 0..=max_ring {
        let ring_min = k as f64 * ring_spacing;
        if ring_min > max_distance {
            break;
        }
        if let Some((d, _, _)) = best {
            if ring_min > d {
                break;
            }
        }

        let k = k as isize;
        for dr in -k..=k {
            let row = row0 as isize + dr;
            if row < 0 || row >= rows as isize {
                continue;
            }
            // Interior rows of the ring only contribute their two end cells
            let step = if dr.abs() == k { 1 } else { (2 * k).max(1) as usize };
            for dc in (-k..=k).step_by(step) {
                let col = col0 as isize + dc;
                if col < 0 || col >= cols as isize {
                    continue;
                }
                let (row, col) = (row as usize, col as usize);
                if !is_stream(row, col) {
                    continue;
                }
                let d = offset_distance(gt, dr, dc);
                if d > max_distance {
                    continue;
                }
                let better = match best {
                    None => true,
                    Some((bd, br, bc)) => d < bd || (d == bd && (row, col) < (br, bc)),
                };
                if better {
                    best = Some((d, row, col));
                }
            }
        }
    }

    match best {
        Some((_, row, col)) => {
            let (x, y) = streams.pixel_to_geo(col, row);
            Ok(Coord { x, y })
        }
        None => Err(Error::NoStreamWithinRadius {
            x: point.x,
            y: point.y,
            max_distance,
        }),
    }
}

/// Ground distance between centers of cells offset by (dr, dc)
fn offset_distance(gt: &GeoTransform, dr: isize, dc: isize) -> f64 {
    let (dr, dc) = (dr as f64, dc as f64);
    let dx = dc * gt.pixel_width + dr * gt.row_rotation;
    let dy = dc * gt.col_rotation + dr * gt.pixel_height;
    dx.hypot(dy)
}

/// Lower bound of the ground length of a unit pixel offset: the smallest
/// singular value of the transform's linear part
fn min_stretch(gt: &GeoTransform) -> f64 {
    let (a, b, c, d) = (gt.pixel_width, gt.row_rotation, gt.col_rotation, gt.pixel_height);
    let frob = a * a + b * b + c * c + d * d;
    let det = a * d - b * c;
    let disc = (frob * frob - 4.0 * det * det).max(0.0).sqrt();
    ((frob - disc) / 2.0).max(0.0).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// 10 x 10 grid of 30 m cells with a stream along column 6
    fn stream_grid() -> Raster<bool> {
        let mut streams = Raster::new(10, 10);
        streams.set_transform(GeoTransform::new(1000.0, 2000.0, 30.0, -30.0));
        for row in 0..10 {
            streams.set(row, 6, true).unwrap();
        }
        streams
    }

    #[test]
    fn test_snap_moves_to_nearest_stream() {
        let streams = stream_grid();
        let (x, y) = streams.pixel_to_geo(4, 3);
        let snapped = snap_to_stream(Coord { x, y }, &streams, 100.0).unwrap();
        let (sx, sy) = streams.pixel_to_geo(6, 3);
        assert_relative_eq!(snapped.x, sx);
        assert_relative_eq!(snapped.y, sy);
    }

    #[test]
    fn test_snap_is_stable_on_stream() {
        let streams = stream_grid();
        // Off-center point inside stream cell (5, 6)
        let x = 1000.0 + 6.0 * 30.0 + 2.0;
        let y = 2000.0 - 5.0 * 30.0 - 28.0;
        let snapped = snap_to_stream(Coord { x, y }, &streams, 0.0).unwrap();
        let (cx, cy) = streams.pixel_to_geo(6, 5);
        assert_relative_eq!(snapped.x, cx);
        assert_relative_eq!(snapped.y, cy);
    }

    #[test]
    fn test_ties_resolve_to_row_major_order() {
        let mut streams: Raster<bool> = Raster::new(5, 5);
        streams.set(1, 2, true).unwrap();
        streams.set(3, 2, true).unwrap();
        streams.set(2, 1, true).unwrap();
        let (x, y) = streams.pixel_to_geo(2, 2);
        let snapped = snap_to_stream(Coord { x, y }, &streams, 5.0).unwrap();
        let (ex, ey) = streams.pixel_to_geo(2, 1);
        assert_eq!((snapped.x, snapped.y), (ex, ey));
    }

    #[test]
    fn test_no_stream_within_radius() {
        let streams = stream_grid();
        let (x, y) = streams.pixel_to_geo(0, 0);
        match snap_to_stream(Coord { x, y }, &streams, 150.0) {
            Err(Error::NoStreamWithinRadius { max_distance, .. }) => {
                assert_eq!(max_distance, 150.0)
            }
            other => panic!("expected NoStreamWithinRadius, got {:?}", other),
        }
        // Six columns away is exactly 180 m
        assert!(snap_to_stream(Coord { x, y }, &streams, 180.0).is_ok());
    }

    #[test]
    fn test_invalid_coordinates() {
        let streams = stream_grid();
        let off_grid = Coord { x: 0.0, y: 0.0 };
        assert!(matches!(
            snap_to_stream(off_grid, &streams, 100.0),
            Err(Error::InvalidInput(_))
        ));
        let nan = Coord { x: f64::NAN, y: 1900.0 };
        assert!(matches!(
            snap_to_stream(nan, &streams, 100.0),
            Err(Error::InvalidInput(_))
        ));
        let (x, y) = streams.pixel_to_geo(6, 0);
        assert!(matches!(
            snap_to_stream(Coord { x, y }, &streams, -1.0),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_snap_pour_point_records_distance() {
        let streams = stream_grid();
        let (x, y) = streams.pixel_to_geo(5, 2);
        let point = PourPoint::new("gauge", x, y);
        let snapped = snap_pour_point(point, &streams, SnapParams::default()).unwrap();
        assert_eq!(snapped.label, "gauge");
        assert!(snapped.is_snapped());
        assert_relative_eq!(snapped.snap_distance.unwrap(), 30.0);
    }

    #[test]
    fn test_min_stretch_of_plain_grid() {
        assert_relative_eq!(min_stretch(&GeoTransform::new(0.0, 0.0, 30.0, -10.0)), 10.0, epsilon = 1e-9);
    }
}
