//! Lazily-read catalog entries.
//!
//! A [`Source`] only holds references to remote data; nothing is fetched
//! until [`Source::read`] is awaited. The first successful read is cached
//! until [`Source::close`].

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::sync::Arc;

use bytes::Bytes;
use flate2::read::GzDecoder;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use axds_common::{AxdsError, AxdsResult};

use crate::array::Dataset;
use crate::client::Fetcher;
use crate::config::OutType;
use crate::metadata::{EntryMetadata, FileLink};
use crate::sensor::SensorRequest;
use crate::table::Table;

/// Preferred file of a platform.
pub const PLATFORM_CSV: &str = "data.csv.gz";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Pick the CSV file of a platform, `data.csv.gz` first.
pub fn csv_link(files: &BTreeMap<String, FileLink>) -> Option<&str> {
    files
        .get(PLATFORM_CSV)
        .or_else(|| {
            files
                .iter()
                .find(|(name, _)| name.ends_with(".csv.gz") || name.ends_with(".csv"))
                .map(|(_, link)| link)
        })
        .map(|link| link.url.as_str())
}

/// Where a source's data comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceTarget {
    /// A CSV file, optionally gzipped. `None` when the platform links no CSV.
    PlatformFile { urlpath: Option<String> },
    /// Observations from the sensor API.
    SensorStation(SensorRequest),
}

/// What `read` produces.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Table(Table),
    Dataset(Dataset),
}

impl Output {
    /// Container name: `dataframe` or `xarray`.
    pub fn container(&self) -> &'static str {
        match self {
            Output::Table(_) => OutType::Dataframe.as_str(),
            Output::Dataset(_) => OutType::Xarray.as_str(),
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Output::Table(t) => Some(t),
            Output::Dataset(_) => None,
        }
    }

    pub fn as_dataset(&self) -> Option<&Dataset> {
        match self {
            Output::Dataset(d) => Some(d),
            Output::Table(_) => None,
        }
    }
}

/// One catalog entry.
pub struct Source {
    name: String,
    description: String,
    metadata: EntryMetadata,
    outtype: OutType,
    target: SourceTarget,
    fetcher: Arc<dyn Fetcher>,
    cache: Mutex<Option<Output>>,
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("name", &self.name)
            .field("outtype", &self.outtype)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl Source {
    pub fn new(
        metadata: EntryMetadata,
        description: String,
        outtype: OutType,
        target: SourceTarget,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            name: metadata.dataset_id.clone(),
            description,
            metadata,
            outtype,
            target,
            fetcher,
            cache: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn metadata(&self) -> &EntryMetadata {
        &self.metadata
    }

    pub fn outtype(&self) -> OutType {
        self.outtype
    }

    pub fn target(&self) -> &SourceTarget {
        &self.target
    }

    /// File URL of a platform source.
    pub fn urlpath(&self) -> Option<&str> {
        match &self.target {
            SourceTarget::PlatformFile { urlpath } => urlpath.as_deref(),
            SourceTarget::SensorStation(_) => None,
        }
    }

    /// Fetch and convert the data, or return the cached result.
    #[instrument(skip(self), fields(name = %self.name))]
    pub async fn read(&self) -> AxdsResult<Output> {
        let mut cache = self.cache.lock().await;
        if let Some(output) = cache.as_ref() {
            debug!("Returning cached data");
            return Ok(output.clone());
        }

        let table = self.load_table().await?;
        debug!(rows = table.num_rows(), columns = table.num_columns(), "Loaded table");

        let output = match self.outtype {
            OutType::Dataframe => Output::Table(table),
            OutType::Xarray => {
                let attrs = self.metadata.to_json()?;
                Output::Dataset(Dataset::from_table(&table)?.with_attrs(attrs))
            }
        };

        *cache = Some(output.clone());
        Ok(output)
    }

    /// Drop cached data; the next read fetches again.
    pub async fn close(&self) {
        self.cache.lock().await.take();
    }

    /// True when a read result is cached.
    pub async fn is_loaded(&self) -> bool {
        self.cache.lock().await.is_some()
    }

    async fn load_table(&self) -> AxdsResult<Table> {
        match &self.target {
            SourceTarget::PlatformFile {
                urlpath: Some(urlpath),
            } => {
                let body = self.fetcher.get_bytes(urlpath).await?;
                read_platform_csv(urlpath, body)
            }
            SourceTarget::PlatformFile { urlpath: None } => Err(AxdsError::DataRead(format!(
                "dataset {} links no CSV file",
                self.name
            ))),
            SourceTarget::SensorStation(request) => request.load(self.fetcher.as_ref()).await,
        }
    }
}

/// Parse a platform CSV, gunzipping when the name or content says so, and
/// index it by time (and depth) when those columns exist.
pub fn read_platform_csv(urlpath: &str, body: Bytes) -> AxdsResult<Table> {
    let table = if urlpath.ends_with(".gz") || body.starts_with(&GZIP_MAGIC) {
        let mut decoder = GzDecoder::new(body.as_ref());
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| AxdsError::DataRead(format!("{}: {}", urlpath, e)))?;
        Table::from_csv(&decompressed)?
    } else {
        Table::from_csv(&body)?
    };

    let names: Vec<String> = table.column_names().iter().map(|s| s.to_string()).collect();
    let time = names.iter().find(|n| is_named(n, &["time"]));
    let z = names.iter().find(|n| is_named(n, &["z", "depth"]));

    match (time, z) {
        (Some(t), Some(z)) => table.set_index(&[t.as_str(), z.as_str()]),
        (Some(t), None) => table.set_index(&[t.as_str()]),
        _ => Ok(table),
    }
}

/// Matches `time`, `Time`, `time (UTC)` or `time [UTC]`.
fn is_named(column: &str, names: &[&str]) -> bool {
    let base = column
        .split(|c| c == ' ' || c == '(' || c == '[')
        .next()
        .unwrap_or(column)
        .to_ascii_lowercase();
    names.contains(&base.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use flate2::write::GzEncoder;
    use flate2::Compression;

    const CSV: &str = "time (UTC),depth (m),temperature\n\
                       2015-06-01T00:00:00Z,1,5.5\n\
                       2015-06-01T00:00:00Z,2,5.25\n";

    fn gzip(text: &str) -> Bytes {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(text.as_bytes()).unwrap();
        Bytes::from(encoder.finish().unwrap())
    }

    #[test]
    fn test_csv_link_prefers_data_csv_gz() {
        let mut files = BTreeMap::new();
        files.insert(
            "a.csv".to_string(),
            FileLink {
                url: "plain".to_string(),
            },
        );
        files.insert(
            "data.csv.gz".to_string(),
            FileLink {
                url: "gz".to_string(),
            },
        );
        assert_eq!(csv_link(&files), Some("gz"));

        files.remove("data.csv.gz");
        assert_eq!(csv_link(&files), Some("plain"));

        files.clear();
        assert_eq!(csv_link(&files), None);
    }

    #[test]
    fn test_gzipped_csv_indexed_by_time_and_depth() {
        let table = read_platform_csv("https://files.example/data.csv.gz", gzip(CSV)).unwrap();
        assert_eq!(table.index_names(), vec!["time (UTC)", "depth (m)"]);
        assert_eq!(table.column_names(), vec!["temperature"]);
    }

    #[test]
    fn test_gzip_detected_from_content() {
        let table = read_platform_csv("https://files.example/download", gzip(CSV)).unwrap();
        assert_eq!(table.num_rows(), 2);
    }

    #[test]
    fn test_plain_csv_without_time() {
        let body = Bytes::from_static(b"station,value\na,1\nb,2\n");
        let table = read_platform_csv("https://files.example/x.csv", body).unwrap();
        assert!(table.index_names().is_empty());
        assert_eq!(table.shape(), (2, 2));
    }

    #[test]
    fn test_is_named() {
        assert!(is_named("time", &["time"]));
        assert!(is_named("Time [UTC]", &["time"]));
        assert!(!is_named("timestamp", &["time"]));
        assert!(is_named("depth (m)", &["z", "depth"]));
    }
}
