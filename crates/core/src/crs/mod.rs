//! Coordinate reference system identifiers
//!
//! The engine never reprojects; a CRS only travels with a grid so that
//! co-processed grids can be checked for consistency and persisted intact.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System identifier.
///
/// Exactly one of the representations is populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CRS {
    /// Registered EPSG code
    Epsg(u32),
    /// OGC well-known text
    Wkt(String),
    /// PROJ definition string
    Proj(String),
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        CRS::Epsg(code)
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        CRS::Wkt(wkt.into())
    }

    /// Create a CRS from a PROJ string
    pub fn from_proj(proj: impl Into<String>) -> Self {
        CRS::Proj(proj.into())
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        CRS::Epsg(4326)
    }

    /// Parse the textual form produced by [`CRS::identifier`].
    ///
    /// Accepts `EPSG:<code>`, `WKT:<text>`, bare PROJ strings (`+proj=...`)
    /// and `PROJ:<text>`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some(code) = strip_prefix_ci(s, "EPSG:") {
            return code.trim().parse().ok().map(CRS::Epsg);
        }
        if let Some(wkt) = strip_prefix_ci(s, "WKT:") {
            return Some(CRS::Wkt(wkt.to_string()));
        }
        if let Some(proj) = strip_prefix_ci(s, "PROJ:") {
            return Some(CRS::Proj(proj.to_string()));
        }
        if s.starts_with("+proj") {
            return Some(CRS::Proj(s.to_string()));
        }
        None
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        match self {
            CRS::Epsg(code) => Some(*code),
            _ => None,
        }
    }

    /// Whether the EPSG code falls in the geographic (lat/lon) range
    pub fn is_geographic(&self) -> bool {
        matches!(self, CRS::Epsg(code) if (4000..5000).contains(code))
    }

    /// Check if two CRS are equivalent.
    ///
    /// Different representations are never considered equivalent; the
    /// engine does not resolve WKT to EPSG.
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        match (self, other) {
            (CRS::Epsg(a), CRS::Epsg(b)) => a == b,
            (CRS::Wkt(a), CRS::Wkt(b)) | (CRS::Proj(a), CRS::Proj(b)) => a.trim() == b.trim(),
            _ => false,
        }
    }

    /// Full string identifier for this CRS, parseable by [`CRS::parse`]
    pub fn identifier(&self) -> String {
        match self {
            CRS::Epsg(code) => format!("EPSG:{}", code),
            CRS::Wkt(wkt) => format!("WKT:{}", wkt),
            CRS::Proj(proj) => format!("PROJ:{}", proj),
        }
    }
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    match s.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => Some(&s[prefix.len()..]),
        _ => None,
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CRS::Wkt(wkt) if wkt.chars().count() > 50 => {
                let head: String = wkt.chars().take(50).collect();
                write!(f, "WKT:{}...", head)
            }
            _ => write!(f, "{}", self.identifier()),
        }
    }
}
