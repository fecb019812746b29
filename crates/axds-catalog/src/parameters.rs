//! Parameter vocabulary: mapping variable names to AXDS parameter groups.
//!
//! The context endpoint lists every parameter (`parameterName` is a superset
//! of CF standard names) and the parameter group it belongs to. Searches can
//! be restricted by group label, so variable selections are resolved to
//! labels before the catalog queries the search service.

use std::collections::{BTreeSet, HashSet};

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, instrument};

use axds_common::{AxdsError, AxdsResult};

use crate::client::{decode, Fetcher};
use crate::config::Criteria;

/// One parameter of the vocabulary.
#[derive(Debug, Clone, Deserialize)]
pub struct Parameter {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(rename = "parameterName")]
    pub parameter_name: String,
    #[serde(rename = "idParameterGroup")]
    pub id_parameter_group: i64,
}

/// A parameter group, the unit the search service can filter on.
#[derive(Debug, Clone, Deserialize)]
pub struct ParameterGroup {
    pub id: i64,
    pub label: String,
}

/// Response of the context endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ParameterContext {
    pub parameters: Vec<Parameter>,
    #[serde(rename = "parameterGroups")]
    pub parameter_groups: Vec<ParameterGroup>,
}

impl ParameterContext {
    /// Fetch the vocabulary.
    #[instrument(skip(fetcher))]
    pub async fn fetch(fetcher: &dyn Fetcher, context_url: &str) -> AxdsResult<Self> {
        let value = fetcher.get_json(context_url).await?;
        let context: ParameterContext = decode(context_url, value)?;
        debug!(
            parameters = context.parameters.len(),
            groups = context.parameter_groups.len(),
            "Loaded parameter context"
        );
        Ok(context)
    }

    /// All `parameterName` values, in vocabulary order.
    pub fn available_names(&self) -> Vec<String> {
        self.parameters
            .iter()
            .map(|p| p.parameter_name.clone())
            .collect()
    }

    /// Group labels for exact parameter names.
    ///
    /// Every name must exist in the vocabulary.
    pub fn match_standard_names(&self, standard_names: &[String]) -> AxdsResult<Vec<String>> {
        let known: HashSet<&str> = self
            .parameters
            .iter()
            .map(|p| p.parameter_name.as_str())
            .collect();

        let unknown: Vec<String> = standard_names
            .iter()
            .filter(|name| !known.contains(name.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(AxdsError::UnknownStandardNames(unknown));
        }

        let names: Vec<&str> = standard_names.iter().map(String::as_str).collect();
        Ok(self.group_labels_for(&names))
    }

    /// Group labels for parameter names matched by the criteria of each key.
    pub fn match_keys(&self, keys: &[String], criteria: &Criteria) -> AxdsResult<Vec<String>> {
        let mut patterns = Vec::new();
        for key in keys {
            let attributes = criteria.get(key).ok_or_else(|| {
                AxdsError::invalid_parameter(
                    "keys_to_match",
                    format!("no criteria defined for key '{}'", key),
                )
            })?;
            for pattern in attributes.values() {
                let regex = Regex::new(pattern).map_err(|e| {
                    AxdsError::invalid_parameter(
                        "criteria",
                        format!("invalid pattern for key '{}': {}", key, e),
                    )
                })?;
                patterns.push(regex);
            }
        }

        let names: Vec<&str> = self
            .parameters
            .iter()
            .map(|p| p.parameter_name.as_str())
            .filter(|name| patterns.iter().any(|re| re.is_match(name)))
            .collect();

        debug!(matched = ?names, "Matched parameter names to keys");
        Ok(self.group_labels_for(&names))
    }

    /// Unique, sorted group labels for the given parameter names.
    fn group_labels_for(&self, names: &[&str]) -> Vec<String> {
        let group_ids: HashSet<i64> = self
            .parameters
            .iter()
            .filter(|p| names.contains(&p.parameter_name.as_str()))
            .map(|p| p.id_parameter_group)
            .collect();

        self.parameter_groups
            .iter()
            .filter(|g| group_ids.contains(&g.id))
            .map(|g| g.label.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
