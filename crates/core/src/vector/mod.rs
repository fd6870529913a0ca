//! Point inputs: labelled pour points

use geo_types::Coord;
use serde::{Deserialize, Serialize};

/// An outlet coordinate with an identifying label.
///
/// Created from caller input and replaced exactly once by snapping onto
/// the stream network; the snapped value records how far it moved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PourPoint {
    /// Site label used to key reports
    pub label: String,
    /// Coordinate in the CRS of the grids it is applied to
    pub location: Coord<f64>,
    /// Distance moved by snapping, `None` until snapped
    pub snap_distance: Option<f64>,
}

impl PourPoint {
    /// Create an unsnapped pour point
    pub fn new(label: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            label: label.into(),
            location: Coord { x, y },
            snap_distance: None,
        }
    }

    /// Whether this point has been snapped onto a stream cell
    pub fn is_snapped(&self) -> bool {
        self.snap_distance.is_some()
    }

    pub fn x(&self) -> f64 {
        self.location.x
    }

    pub fn y(&self) -> f64 {
        self.location.y
    }
}
