//! Axiom Data Science (AXDS) catalog client
//!
//! Searches the AXDS search service for oceanographic datasets and exposes
//! the results as a catalog of lazily-read entries. Each entry reads into a
//! two-dimensional [`Table`] ("dataframe") or a labeled multidimensional
//! [`Dataset`] ("xarray").
//!
//! # Datatypes
//!
//! - `platform2`: gliders, moorings and other platforms, read from their CSV files
//! - `sensor_station`: fixed stations, read from the sensor API
//!
//! # Example
//!
//! ```rust,no_run
//! use axds_catalog::{open_axds_cat, CatalogConfig, Datatype, SearchKwargs};
//!
//! # async fn run() -> axds_catalog::AxdsResult<()> {
//! let config = CatalogConfig::new(Datatype::Platform2)
//!     .kwargs_search(SearchKwargs::default().bbox(-180.0, 50.0, -158.0, 66.0))
//!     .page_size(5);
//! let catalog = open_axds_cat(config).await?;
//! for source in &catalog {
//!     println!("{}: {}", source.name(), source.description());
//! }
//! # Ok(())
//! # }
//! ```

/// Log at INFO when the catalog is verbose, DEBUG otherwise.
macro_rules! verbose {
    ($on:expr, $($arg:tt)+) => {
        if $on {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}

pub mod array;
pub mod catalog;
pub mod client;
pub mod config;
pub mod metadata;
pub mod parameters;
pub mod search;
pub mod sensor;
pub mod source;
pub mod table;

pub use array::{Dataset, Dimension, Variable, VariableData};
pub use catalog::Catalog;
pub use client::{Fetcher, HttpFetcher};
pub use config::{
    BinInterval, CatalogConfig, Criteria, Datatype, Endpoints, OutType, Qartod, SearchFilter,
    SearchKwargs, DEFAULT_PAGE_SIZE,
};
pub use metadata::{DatatypeDetails, EntryMetadata, FileLink, VariableDetails};
pub use parameters::ParameterContext;
pub use source::{Output, Source, SourceTarget};
pub use table::{Cell, Column, ColumnData, Table};

pub use axds_common::{AxdsError, AxdsResult, BoundingBox, ErrorCategory, TimeRange};

/// Open a catalog, running the search.
pub async fn open_axds_cat(config: CatalogConfig) -> AxdsResult<Catalog> {
    Catalog::open(config).await
}

/// Every parameter name the search service knows.
pub async fn available_names(endpoints: &Endpoints) -> AxdsResult<Vec<String>> {
    let fetcher = HttpFetcher::new(endpoints.timeout)?;
    let context = ParameterContext::fetch(&fetcher, &endpoints.context_url).await?;
    Ok(context.available_names())
}
