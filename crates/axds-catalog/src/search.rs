//! Search and docs URLs for the AXDS search service.

use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use axds_common::{AxdsError, AxdsResult};

use crate::config::{Datatype, SearchFilter};

/// Parameters of one search request.
#[derive(Debug, Clone, Copy)]
pub struct SearchRequest<'a> {
    pub search_base: &'a str,
    pub datatype: Datatype,
    pub page_size: usize,
    pub filter: &'a SearchFilter,
    /// Parameter group label to restrict results to.
    pub pglabel: Option<&'a str>,
}

impl SearchRequest<'_> {
    /// Build the search URL.
    ///
    /// Only the first page is requested; `page_size` bounds the result count.
    pub fn url(&self) -> AxdsResult<Url> {
        let mut url = parse_base(self.search_base, "search")?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("portalId", "-1")
                .append_pair("page", "1")
                .append_pair("pageSize", &self.page_size.to_string())
                .append_pair("verbose", "true")
                .append_pair("type", self.datatype.as_str());

            if let Some(bbox) = &self.filter.bbox {
                query.append_pair("geom", &bbox.to_geojson_polygon());
            }

            if let Some(time) = &self.filter.time {
                query
                    .append_pair("startDateTime", &time.start_epoch_seconds().to_string())
                    .append_pair("endDateTime", &time.end_epoch_seconds().to_string());
            }

            if let Some(term) = &self.filter.search_for {
                query.append_pair("query", term);
            }

            if let Some(label) = self.pglabel {
                query.append_pair("tag", &format!("Parameter Group:{}", label));
            }
        }

        Ok(url)
    }
}

/// URL of the docs record for one dataset.
pub fn docs_url(search_base: &str, dataset_id: &str) -> AxdsResult<Url> {
    let mut url = parse_base(search_base, "docs")?;
    url.query_pairs_mut()
        .append_pair("verbose", "true")
        .append_pair("id", dataset_id);
    Ok(url)
}

fn parse_base(base: &str, path: &str) -> AxdsResult<Url> {
    let joined = format!("{}/{}", base.trim_end_matches('/'), path);
    Url::parse(&joined).map_err(|e| {
        AxdsError::invalid_parameter("search_base", format!("{}: {}", joined, e))
    })
}

/// Body of a search response. A missing `results` key means the search failed.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Option<Vec<Value>>,
}

impl SearchResponse {
    /// Results of a search, truncated to `page_size`.
    pub fn into_results(self, url: &str, page_size: usize) -> AxdsResult<Vec<Value>> {
        let mut results = self
            .results
            .ok_or_else(|| AxdsError::NoResults(url.to_string()))?;
        results.truncate(page_size);
        Ok(results)
    }
}
