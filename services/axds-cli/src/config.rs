//! Catalog definition files.
//!
//! A YAML file describes one catalog with the same keys as `CatalogConfig`:
//!
//! ```yaml
//! datatype: sensor_station
//! name: bodega
//! page_size: 5
//! ttl: 600
//! kwargs_search:
//!   min_lon: -124
//!   max_lon: -123
//!   min_lat: 38
//!   max_lat: 39
//! qartod:
//!   filter: [1, 2]
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use axds_catalog::{
    BinInterval, CatalogConfig, Criteria, Datatype, Endpoints, OutType, Qartod, SearchKwargs,
};

/// Root of a catalog file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogFile {
    pub datatype: Datatype,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default)]
    pub outtype: Option<OutType>,
    #[serde(default)]
    pub page_size: Option<usize>,
    /// Seconds.
    #[serde(default)]
    pub ttl: Option<u64>,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub kwargs_search: SearchKwargs,
    #[serde(default)]
    pub keys_to_match: Option<Vec<String>>,
    #[serde(default)]
    pub criteria: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    pub standard_names: Option<Vec<String>>,
    #[serde(default)]
    pub qartod: Qartod,
    #[serde(default)]
    pub use_units: Option<bool>,
    #[serde(default)]
    pub bin_interval: Option<BinInterval>,
    /// Replaces the environment-derived endpoints when present.
    #[serde(default)]
    pub endpoints: Option<Endpoints>,
}

impl CatalogFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
        let file: CatalogFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse catalog file: {}", path.display()))?;
        debug!(path = %path.display(), datatype = %file.datatype, "Loaded catalog file");
        Ok(file)
    }

    /// Turn the file into a catalog configuration.
    pub fn into_config(self, endpoints: Endpoints) -> CatalogConfig {
        let mut config = CatalogConfig::new(self.datatype)
            .kwargs_search(self.kwargs_search)
            .ttl(self.ttl.map(Duration::from_secs))
            .verbose(self.verbose)
            .qartod(self.qartod)
            .bin_interval(self.bin_interval)
            .endpoints(self.endpoints.unwrap_or(endpoints));

        if let Some(name) = self.name {
            config = config.name(name);
        }
        if let Some(description) = self.description {
            config = config.description(description);
        }
        if let Some(metadata) = self.metadata {
            config = config.metadata(metadata);
        }
        if let Some(outtype) = self.outtype {
            config = config.outtype(outtype);
        }
        if let Some(page_size) = self.page_size {
            config = config.page_size(page_size);
        }
        if let Some(use_units) = self.use_units {
            config = config.use_units(use_units);
        }
        if let Some(keys) = self.keys_to_match {
            let criteria: Criteria = self.criteria;
            config = config.keys_to_match(keys, criteria);
        }
        if let Some(names) = self.standard_names {
            config = config.standard_names(names);
        }
        config
    }
}

/// Parse a `--qartod` value: `off`, `columns`, or a comma list of flags to keep.
pub fn parse_qartod(value: &str) -> Result<Qartod> {
    match value.trim() {
        "off" => Ok(Qartod::Off),
        "columns" => Ok(Qartod::Columns),
        flags => {
            let flags = flags
                .split(',')
                .map(|f| f.trim().parse::<i64>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .with_context(|| {
                    format!("Invalid qartod value '{}': expected off, columns or flags like 1,2", value)
                })?;
            Ok(Qartod::Filter(flags))
        }
    }
}

/// Parse a `--criteria` value of the form `KEY.ATTRIBUTE=PATTERN`.
pub fn parse_criterion(value: &str) -> Result<(String, String, String)> {
    let parsed = value.split_once('=').and_then(|(target, pattern)| {
        let (key, attribute) = target.split_once('.')?;
        let (key, attribute) = (key.trim(), attribute.trim());
        (!key.is_empty() && !attribute.is_empty())
            .then(|| (key.to_string(), attribute.to_string(), pattern.to_string()))
    });
    parsed.with_context(|| {
        format!("Invalid criteria value '{}': expected KEY.ATTRIBUTE=PATTERN", value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_catalog_file() {
        let yaml = r#"
datatype: sensor_station
name: bodega
page_size: 5
ttl: 600
outtype: xarray
kwargs_search:
  min_lon: -124
  max_lon: -123
  min_lat: 38
  max_lat: 39
  min_time: 2021-4-1
  max_time: 2021-4-2
qartod:
  filter: [1, 2]
use_units: false
bin_interval: daily
"#;
        let file: CatalogFile = serde_yaml::from_str(yaml).unwrap();
        let config = file.into_config(Endpoints::default());

        assert_eq!(config.datatype, Datatype::SensorStation);
        assert_eq!(config.name, "bodega");
        assert_eq!(config.page_size, 5);
        assert_eq!(config.ttl, Some(Duration::from_secs(600)));
        assert_eq!(config.outtype, OutType::Xarray);
        assert_eq!(config.qartod, Qartod::Filter(vec![1, 2]));
        assert!(!config.use_units);
        assert_eq!(config.bin_interval, Some(BinInterval::Daily));
        assert_eq!(config.kwargs_search.min_time.as_deref(), Some("2021-4-1"));
        assert!(config.validate().unwrap().bbox.is_some());
    }

    #[test]
    fn test_minimal_file_uses_defaults() {
        let file: CatalogFile = serde_yaml::from_str("datatype: platform2\n").unwrap();
        let config = file.into_config(Endpoints::single_host("http://localhost:9000"));
        assert_eq!(config.name, "catalog");
        assert_eq!(config.page_size, 10);
        assert_eq!(config.qartod, Qartod::Off);
        assert_eq!(config.endpoints.search_base, "http://localhost:9000/v2");
    }

    #[test]
    fn test_unknown_datatype_rejected() {
        assert!(serde_yaml::from_str::<CatalogFile>("datatype: module\n").is_err());
    }

    #[test]
    fn test_keys_to_match_with_criteria() {
        let yaml = r#"
datatype: platform2
keys_to_match: [wind]
criteria:
  wind:
    standard_name: "^wind"
"#;
        let config = serde_yaml::from_str::<CatalogFile>(yaml)
            .unwrap()
            .into_config(Endpoints::default());
        assert_eq!(config.keys_to_match, Some(vec!["wind".to_string()]));
        assert_eq!(config.criteria["wind"]["standard_name"], "^wind");
    }

    #[test]
    fn test_load_from_disk() {
        let (_dir, path) = test_utils::temp_file("cat.yaml", "datatype: platform2\nverbose: true\n");
        let file = CatalogFile::load(&path).unwrap();
        assert!(file.verbose);
        assert!(CatalogFile::load(&path.with_file_name("missing.yaml")).is_err());
    }

    #[test]
    fn test_parse_criterion() {
        assert_eq!(
            parse_criterion("wind.standard_name=^wind.*=x").unwrap(),
            (
                "wind".to_string(),
                "standard_name".to_string(),
                "^wind.*=x".to_string()
            )
        );
        assert!(parse_criterion("wind=^wind").is_err());
        assert!(parse_criterion(".standard_name=x").is_err());
    }

    #[test]
    fn test_parse_qartod() {
        assert_eq!(parse_qartod("off").unwrap(), Qartod::Off);
        assert_eq!(parse_qartod("columns").unwrap(), Qartod::Columns);
        assert_eq!(parse_qartod("1, 3").unwrap(), Qartod::Filter(vec![1, 3]));
        assert!(parse_qartod("pass").is_err());
    }
}
