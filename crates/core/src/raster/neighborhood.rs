//! D8 neighborhood and flow direction encoding

use super::RasterElement;

/// (row, col) offsets of the 8 neighbors in fixed scan order, clockwise
/// starting at east. Steepest-descent ties are resolved by this order.
pub const D8_OFFSETS: [(isize, isize); 8] = [
    (0, 1),   // E
    (1, 1),   // SE
    (1, 0),   // S
    (1, -1),  // SW
    (0, -1),  // W
    (-1, -1), // NW
    (-1, 0),  // N
    (-1, 1),  // NE
];

/// Distance multipliers matching [`D8_OFFSETS`]: 1 for cardinal, √2 for diagonal
pub const D8_DISTANCES: [f64; 8] = [
    1.0,
    std::f64::consts::SQRT_2,
    1.0,
    std::f64::consts::SQRT_2,
    1.0,
    std::f64::consts::SQRT_2,
    1.0,
    std::f64::consts::SQRT_2,
];

/// D8 flow direction of a single cell.
///
/// Persisted codes follow the counter-clockwise convention
/// ```text
///   4  3  2
///   5  0  1
///   6  7  8
/// ```
/// with `0` for outlets (no downslope neighbor) and `255` for no-data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowDir {
    East,
    NorthEast,
    North,
    NorthWest,
    West,
    SouthWest,
    South,
    SouthEast,
    /// No downslope neighbor: pit, flat or grid-edge outlet
    Outlet,
    NoData,
}

impl FlowDir {
    /// The 8 flowing directions in [`D8_OFFSETS`] order
    pub const ALL: [FlowDir; 8] = [
        FlowDir::East,
        FlowDir::SouthEast,
        FlowDir::South,
        FlowDir::SouthWest,
        FlowDir::West,
        FlowDir::NorthWest,
        FlowDir::North,
        FlowDir::NorthEast,
    ];

    /// Direction pointing to the neighbor at `D8_OFFSETS[index]`
    pub fn from_index(index: usize) -> FlowDir {
        Self::ALL[index % 8]
    }

    /// Index into [`D8_OFFSETS`], `None` for outlets and no-data
    pub fn index(self) -> Option<usize> {
        Self::ALL.iter().position(|&d| d == self)
    }

    /// (row, col) offset to the downstream neighbor
    pub fn offset(self) -> Option<(isize, isize)> {
        self.index().map(|i| D8_OFFSETS[i])
    }

    /// Whether this cell passes its flow to a neighbor
    pub fn flows(self) -> bool {
        self.index().is_some()
    }

    /// The direction pointing back at this cell from its downstream neighbor
    pub fn opposite(self) -> FlowDir {
        match self.index() {
            Some(i) => Self::from_index(i + 4),
            None => self,
        }
    }

    /// Downstream cell of (row, col), `None` when the cell does not flow or
    /// flows off a `rows` x `cols` grid
    pub fn downstream(self, row: usize, col: usize, rows: usize, cols: usize) -> Option<(usize, usize)> {
        let (dr, dc) = self.offset()?;
        let nr = row as isize + dr;
        let nc = col as isize + dc;
        if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
            None
        } else {
            Some((nr as usize, nc as usize))
        }
    }

    /// Persisted integer code
    pub fn code(self) -> u8 {
        match self {
            FlowDir::Outlet => 0,
            FlowDir::East => 1,
            FlowDir::NorthEast => 2,
            FlowDir::North => 3,
            FlowDir::NorthWest => 4,
            FlowDir::West => 5,
            FlowDir::SouthWest => 6,
            FlowDir::South => 7,
            FlowDir::SouthEast => 8,
            FlowDir::NoData => 255,
        }
    }

    /// Decode a persisted integer code
    pub fn from_code(code: u8) -> Option<FlowDir> {
        match code {
            0 => Some(FlowDir::Outlet),
            1 => Some(FlowDir::East),
            2 => Some(FlowDir::NorthEast),
            3 => Some(FlowDir::North),
            4 => Some(FlowDir::NorthWest),
            5 => Some(FlowDir::West),
            6 => Some(FlowDir::SouthWest),
            7 => Some(FlowDir::South),
            8 => Some(FlowDir::SouthEast),
            255 => Some(FlowDir::NoData),
            _ => None,
        }
    }
}

impl RasterElement for FlowDir {
    fn zero() -> Self {
        FlowDir::Outlet
    }

    fn default_nodata() -> Self {
        FlowDir::NoData
    }

    fn is_nodata(&self, _nodata: Option<Self>) -> bool {
        *self == FlowDir::NoData
    }

    fn is_float() -> bool {
        false
    }

    fn to_f64(self) -> f64 {
        self.code() as f64
    }

    fn from_f64(value: f64) -> Option<Self> {
        if value.fract() != 0.0 || !(0.0..=255.0).contains(&value) {
            return None;
        }
        FlowDir::from_code(value as u8)
    }
}
