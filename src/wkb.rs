//! Parses the source geometry field of an input record: a hex-encoded WKB LineString into a
//! `geo::LineString`, the format the buffer overlay, adjuster and fraction computation all
//! consume.

use geo::{Geometry, LineString};
use geozero::ToGeo;
use geozero::wkb::Wkb;

use crate::error::GeometryError;

/// Decodes a hex-encoded WKB LineString, as carried by the `"geometry"` field of an input record.
pub fn parse_hex_wkb_linestring(hex: &str) -> Result<LineString<f64>, GeometryError> {
    let bytes = decode_hex(hex)?;

    let geometry = Wkb(bytes)
        .to_geo()
        .map_err(|error| GeometryError::InvalidWkb(error.to_string()))?;

    match geometry {
        Geometry::LineString(line) if line.0.len() >= 2 => Ok(line),
        Geometry::LineString(_) => Err(GeometryError::EmptyGeometry),
        other => Err(GeometryError::InvalidWkb(format!(
            "expected a WKB LineString, found {other:?}"
        ))),
    }
}

pub(crate) fn decode_hex(hex: &str) -> Result<Vec<u8>, GeometryError> {
    let hex = hex.trim();
    if hex.len() % 2 != 0 {
        return Err(GeometryError::InvalidWkb("odd-length hex string".to_string()));
    }

    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|error| GeometryError::InvalidWkb(error.to_string()))
        })
        .collect()
}
