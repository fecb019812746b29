//! Geographic bounding box types and operations.

use serde::{Deserialize, Serialize};

use crate::error::{AxdsError, AxdsResult};

/// A geographic bounding box in degrees (EPSG:4326).
///
/// Longitudes use the -180..180 convention the search API expects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates without validation.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Create a bounding box and check it is usable as a search filter.
    pub fn try_new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> AxdsResult<Self> {
        let bbox = Self::new(min_lon, min_lat, max_lon, max_lat);
        bbox.validate()?;
        Ok(bbox)
    }

    /// A degenerate box around a single point, as used for fixed stations.
    pub fn from_point(lon: f64, lat: f64) -> Self {
        Self::new(lon, lat, lon, lat)
    }

    /// Parse a "min_lon,min_lat,max_lon,max_lat" string.
    pub fn from_bbox_string(s: &str) -> Result<Self, BboxParseError> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(BboxParseError::InvalidFormat(s.to_string()));
        }

        let mut values = [0.0f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| BboxParseError::InvalidNumber(part.to_string()))?;
        }

        Ok(Self::new(values[0], values[1], values[2], values[3]))
    }

    /// Check coordinate ranges and ordering.
    pub fn validate(&self) -> AxdsResult<()> {
        let coords = [self.min_lon, self.min_lat, self.max_lon, self.max_lat];
        if coords.iter().any(|c| !c.is_finite()) {
            return Err(AxdsError::InvalidBbox(format!(
                "coordinates must be finite: {:?}",
                coords
            )));
        }
        if self.min_lon.abs() > 180.0 || self.max_lon.abs() > 180.0 {
            return Err(AxdsError::InvalidBbox(
                "`min_lon` and `max_lon` must be in the range -180 to 180.".to_string(),
            ));
        }
        if self.min_lat.abs() > 90.0 || self.max_lat.abs() > 90.0 {
            return Err(AxdsError::InvalidBbox(
                "`min_lat` and `max_lat` must be in the range -90 to 90.".to_string(),
            ));
        }
        if self.min_lon > self.max_lon {
            return Err(AxdsError::InvalidBbox(format!(
                "min_lon ({}) is greater than max_lon ({})",
                self.min_lon, self.max_lon
            )));
        }
        if self.min_lat > self.max_lat {
            return Err(AxdsError::InvalidBbox(format!(
                "min_lat ({}) is greater than max_lat ({})",
                self.min_lat, self.max_lat
            )));
        }
        Ok(())
    }

    /// Check if this bbox touches or overlaps another.
    ///
    /// Edges count as overlap so that point stations on a boundary match.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lon <= other.max_lon
            && self.max_lon >= other.min_lon
            && self.min_lat <= other.max_lat
            && self.max_lat >= other.min_lat
    }

    /// Smallest box covering both boxes.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_lon: self.min_lon.min(other.min_lon),
            min_lat: self.min_lat.min(other.min_lat),
            max_lon: self.max_lon.max(other.max_lon),
            max_lat: self.max_lat.max(other.max_lat),
        }
    }

    /// GeoJSON polygon for the search API `geom` parameter.
    ///
    /// The ring starts and ends at (min_lon, min_lat) and runs counter-clockwise.
    pub fn to_geojson_polygon(&self) -> String {
        format!(
            r#"{{"type":"Polygon","coordinates":[[[{min_lon},{min_lat}],[{max_lon},{min_lat}],[{max_lon},{max_lat}],[{min_lon},{max_lat}],[{min_lon},{min_lat}]]]}}"#,
            min_lon = self.min_lon,
            min_lat = self.min_lat,
            max_lon = self.max_lon,
            max_lat = self.max_lat,
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BboxParseError {
    #[error("Invalid bounding box format: {0}. Expected 'min_lon,min_lat,max_lon,max_lat'")]
    InvalidFormat(String),

    #[error("Invalid number in bounding box: {0}")]
    InvalidNumber(String),
}

impl From<BboxParseError> for AxdsError {
    fn from(err: BboxParseError) -> Self {
        AxdsError::InvalidBbox(err.to_string())
    }
}
