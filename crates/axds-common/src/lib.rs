//! Common types and utilities shared across the AXDS catalog crates.

pub mod bbox;
pub mod error;
pub mod time;
pub mod wkt;

pub use bbox::BoundingBox;
pub use error::{AxdsError, AxdsResult, ErrorCategory};
pub use time::TimeRange;
