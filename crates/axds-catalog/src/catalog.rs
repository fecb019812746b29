//! The catalog: search results turned into named, lazily-read sources.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Url;
use serde_json::{Map, Value};
use tracing::{instrument, warn};

use axds_common::{AxdsError, AxdsResult};

use crate::client::{decode, Fetcher, HttpFetcher};
use crate::config::{CatalogConfig, Datatype, OutType, SearchFilter};
use crate::metadata::{files_from_docs, EntryMetadata};
use crate::parameters::ParameterContext;
use crate::search::{docs_url, SearchRequest, SearchResponse};
use crate::sensor::{SensorOptions, SensorRequest};
use crate::source::{csv_link, Source, SourceTarget};

/// Catalog of AXDS datasets.
///
/// Entries keep the order the search service returned them in. With a `ttl`
/// the catalog goes stale after that long and [`Catalog::refresh_if_stale`]
/// searches again.
pub struct Catalog {
    config: CatalogConfig,
    filter: SearchFilter,
    pglabels: Option<Vec<String>>,
    metadata: Map<String, Value>,
    fetcher: Arc<dyn Fetcher>,
    entries: Vec<Arc<Source>>,
    positions: HashMap<String, usize>,
    loaded_at: Instant,
}

impl Catalog {
    /// Open a catalog against the configured endpoints.
    pub async fn open(config: CatalogConfig) -> AxdsResult<Self> {
        let fetcher = Arc::new(HttpFetcher::new(config.endpoints.timeout)?);
        Self::open_with_fetcher(config, fetcher).await
    }

    /// Open a catalog with a custom fetcher.
    ///
    /// Validates the configuration, resolves variable selections to parameter
    /// group labels and runs the search.
    pub async fn open_with_fetcher(
        config: CatalogConfig,
        fetcher: Arc<dyn Fetcher>,
    ) -> AxdsResult<Self> {
        let filter = config.validate()?;

        let pglabels = match (&config.keys_to_match, &config.standard_names) {
            (None, None) => None,
            (keys, names) => {
                let context =
                    ParameterContext::fetch(fetcher.as_ref(), &config.endpoints.context_url)
                        .await?;
                let labels = match (keys, names) {
                    (Some(keys), _) => context.match_keys(keys, &config.criteria)?,
                    (None, Some(names)) => context.match_standard_names(names)?,
                    (None, None) => Vec::new(),
                };
                verbose!(config.verbose, labels = ?labels, "Resolved parameter group labels");
                Some(labels)
            }
        };

        let metadata = match &config.metadata {
            Some(metadata) => metadata.clone(),
            None => {
                let mut metadata = Map::new();
                metadata.insert(
                    "kwargs_search".to_string(),
                    serde_json::to_value(&config.kwargs_search)?,
                );
                metadata.insert("pglabels".to_string(), serde_json::to_value(&pglabels)?);
                metadata
            }
        };

        let mut catalog = Self {
            config,
            filter,
            pglabels,
            metadata,
            fetcher,
            entries: Vec::new(),
            positions: HashMap::new(),
            loaded_at: Instant::now(),
        };
        catalog.reload().await?;
        Ok(catalog)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn description(&self) -> &str {
        &self.config.description
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Expiry of the loaded entries; `None` never expires.
    pub fn ttl(&self) -> Option<Duration> {
        self.config.ttl
    }

    pub fn page_size(&self) -> usize {
        self.config.page_size
    }

    pub fn outtype(&self) -> OutType {
        self.config.outtype
    }

    pub fn datatype(&self) -> Datatype {
        self.config.datatype
    }

    pub fn verbose(&self) -> bool {
        self.config.verbose
    }

    pub fn filter(&self) -> &SearchFilter {
        &self.filter
    }

    /// Parameter group labels searched for, if variables were selected.
    pub fn pglabels(&self) -> Option<&[String]> {
        self.pglabels.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry names in search order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|s| s.name()).collect()
    }

    pub fn entries(&self) -> std::slice::Iter<'_, Arc<Source>> {
        self.entries.iter()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    /// Look up an entry by exact name.
    pub fn get(&self, name: &str) -> AxdsResult<Arc<Source>> {
        self.positions
            .get(name)
            .map(|&i| Arc::clone(&self.entries[i]))
            .ok_or_else(|| AxdsError::EntryNotFound(name.to_string()))
    }

    /// Like [`Catalog::get`], refreshing a stale catalog first.
    pub async fn get_fresh(&mut self, name: &str) -> AxdsResult<Arc<Source>> {
        self.refresh_if_stale().await?;
        self.get(name)
    }

    /// Search URLs: one per parameter group label, or a single unfiltered one.
    pub fn search_urls(&self) -> AxdsResult<Vec<Url>> {
        let request = |pglabel: Option<&str>| {
            SearchRequest {
                search_base: &self.config.endpoints.search_base,
                datatype: self.config.datatype,
                page_size: self.config.page_size,
                filter: &self.filter,
                pglabel,
            }
            .url()
        };

        match &self.pglabels {
            Some(labels) => labels.iter().map(|l| request(Some(l))).collect(),
            None => Ok(vec![request(None)?]),
        }
    }

    pub fn is_stale(&self) -> bool {
        match self.config.ttl {
            Some(ttl) => self.loaded_at.elapsed() > ttl,
            None => false,
        }
    }

    /// Search again if the ttl has passed. Returns whether a reload happened.
    pub async fn refresh_if_stale(&mut self) -> AxdsResult<bool> {
        if !self.is_stale() {
            return Ok(false);
        }
        verbose!(self.config.verbose, name = %self.config.name, "Catalog is stale, reloading");
        self.reload().await?;
        Ok(true)
    }

    /// Run the search and rebuild every entry.
    #[instrument(skip(self), fields(name = %self.config.name, datatype = %self.config.datatype))]
    pub async fn reload(&mut self) -> AxdsResult<()> {
        let results = self.load_all_results().await?;
        let verbose = self.config.verbose;

        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        let mut positions = HashMap::new();

        for result in &results {
            let metadata = EntryMetadata::from_search_result(
                self.config.datatype,
                result,
                &self.config.endpoints.sensor_base,
            )?;
            let dataset_id = metadata.dataset_id.clone();

            if !seen.insert(dataset_id.clone()) {
                continue;
            }
            if metadata.is_webcam() {
                verbose!(verbose, dataset_id = %dataset_id, "Skipping webcam dataset");
                continue;
            }
            verbose!(verbose, dataset_id = %dataset_id, "Adding entry");

            let source = self.make_source(metadata).await?;
            positions.insert(dataset_id, entries.len());
            entries.push(Arc::new(source));
        }

        verbose!(
            verbose,
            results = results.len(),
            unique = seen.len(),
            entries = entries.len(),
            "Catalog loaded"
        );

        self.entries = entries;
        self.positions = positions;
        self.loaded_at = Instant::now();
        Ok(())
    }

    async fn load_all_results(&self) -> AxdsResult<Vec<Value>> {
        let mut all_results = Vec::new();
        for url in self.search_urls()? {
            let url = url.as_str();
            verbose!(self.config.verbose, url, "Searching");

            let response: SearchResponse = decode(url, self.fetcher.get_json(url).await?)?;
            let results = response.into_results(url, self.config.page_size)?;

            verbose!(
                self.config.verbose,
                url,
                found = results.len(),
                page_size = self.config.page_size,
                "Search returned results"
            );
            all_results.extend(results);
        }
        Ok(all_results)
    }

    /// Build the source of one entry. Problems that only matter for reading,
    /// like a missing CSV link or time range, surface from `Source::read`.
    async fn make_source(&self, mut metadata: EntryMetadata) -> AxdsResult<Source> {
        let datatype = self.config.datatype;
        let description = format!(
            "AXDS dataset_id {} of datatype {}",
            metadata.dataset_id, datatype
        );

        let target = match datatype {
            Datatype::Platform2 => {
                if metadata.files().map_or(true, |f| f.is_empty()) {
                    let url = docs_url(&self.config.endpoints.search_base, &metadata.dataset_id)?;
                    let url = url.as_str();
                    let files = files_from_docs(url, self.fetcher.get_json(url).await?)?;
                    metadata.set_files(files);
                }

                let urlpath = metadata.files().and_then(csv_link).map(str::to_string);
                if urlpath.is_none() {
                    warn!(dataset_id = %metadata.dataset_id, "Platform links no CSV file");
                }
                SourceTarget::PlatformFile { urlpath }
            }
            Datatype::SensorStation => {
                let options = SensorOptions {
                    qartod: self.config.qartod.clone(),
                    use_units: self.config.use_units,
                    bin_interval: self.config.bin_interval,
                };
                SourceTarget::SensorStation(SensorRequest::from_metadata(
                    &metadata,
                    self.filter.time.as_ref(),
                    options,
                    &self.config.endpoints.sensor_base,
                )?)
            }
        };

        Ok(Source::new(
            metadata,
            description,
            self.config.outtype,
            target,
            Arc::clone(&self.fetcher),
        ))
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a Arc<Source>;
    type IntoIter = std::slice::Iter<'a, Arc<Source>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("name", &self.config.name)
            .field("datatype", &self.config.datatype)
            .field("entries", &self.names())
            .finish()
    }
}
