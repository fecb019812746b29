//! Minimal WKT reading: just enough to compute the bounds of a geometry.
//!
//! Dataset metadata carries `geospatial_bounds` as WKT (POINT, LINESTRING,
//! POLYGON and their MULTI variants). Only the coordinate envelope is needed.

use crate::bbox::BoundingBox;
use crate::error::{AxdsError, AxdsResult};

const GEOMETRY_TYPES: &[&str] = &[
    "POINT",
    "LINESTRING",
    "POLYGON",
    "MULTIPOINT",
    "MULTILINESTRING",
    "MULTIPOLYGON",
    "GEOMETRYCOLLECTION",
];

/// Compute the bounding box of a WKT geometry.
pub fn wkt_bounds(wkt: &str) -> AxdsResult<BoundingBox> {
    let trimmed = wkt.trim();
    let open = trimmed
        .find('(')
        .ok_or_else(|| invalid(wkt, "no coordinate list"))?;

    let tag = trimmed[..open].trim().to_ascii_uppercase();
    let base = tag
        .split_whitespace()
        .next()
        .ok_or_else(|| invalid(wkt, "missing geometry type"))?;
    if !GEOMETRY_TYPES.contains(&base) {
        return Err(invalid(wkt, &format!("unsupported geometry type {}", base)));
    }

    let body: String = trimmed[open..]
        .chars()
        .map(|c| if c == '(' || c == ')' { ',' } else { c })
        .collect();

    let mut bounds: Option<BoundingBox> = None;
    for chunk in body.split(',') {
        let ordinates: Vec<&str> = chunk.split_whitespace().collect();
        match ordinates.first() {
            None => continue,
            // GEOMETRYCOLLECTION members start with their own type tag
            Some(first) if GEOMETRY_TYPES.contains(&first.to_ascii_uppercase().as_str()) => {
                continue
            }
            Some(_) => {}
        }

        let values = ordinates
            .iter()
            .map(|o| o.parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| invalid(wkt, &format!("bad coordinate '{}'", chunk.trim())))?;
        let [x, y, ..] = values.as_slice() else {
            return Err(invalid(wkt, &format!("bad coordinate '{}'", chunk.trim())));
        };

        let point = BoundingBox::from_point(*x, *y);
        bounds = Some(match bounds {
            Some(b) => b.union(&point),
            None => point,
        });
    }

    bounds.ok_or_else(|| invalid(wkt, "geometry has no coordinates"))
}

fn invalid(wkt: &str, reason: &str) -> AxdsError {
    AxdsError::MalformedResponse {
        url: "geospatial_bounds".to_string(),
        message: format!("{}: {}", reason, wkt),
    }
}
