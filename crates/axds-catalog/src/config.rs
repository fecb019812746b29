//! Catalog configuration: datatypes, output shapes, search filters and endpoints.
//!
//! `CatalogConfig` replaces the keyword-argument soup of a dynamic plugin with
//! typed, optional fields. Validation happens once, when the catalog opens.

use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use axds_common::time::parse_datetime;
use axds_common::{AxdsError, AxdsResult, BoundingBox, TimeRange};

/// Default number of results per search request.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Kind of AXDS asset a catalog is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Datatype {
    /// Platforms (gliders, moorings, ...) served as data files.
    #[serde(rename = "platform2")]
    Platform2,
    /// Fixed sensor stations served through the sensor API.
    #[serde(rename = "sensor_station")]
    SensorStation,
}

impl Datatype {
    pub const ALLOWED: &'static [&'static str] = &["platform2", "sensor_station"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Datatype::Platform2 => "platform2",
            Datatype::SensorStation => "sensor_station",
        }
    }
}

impl FromStr for Datatype {
    type Err = AxdsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "platform2" => Ok(Datatype::Platform2),
            "sensor_station" => Ok(Datatype::SensorStation),
            other => Err(AxdsError::UnknownDatatype {
                got: other.to_string(),
                allowed: Self::ALLOWED,
            }),
        }
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Container shape produced by `Source::read`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutType {
    /// Two-dimensional labeled table.
    #[default]
    Dataframe,
    /// Labeled multidimensional array dataset.
    Xarray,
}

impl OutType {
    pub const ALLOWED: &'static [&'static str] = &["dataframe", "xarray"];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutType::Dataframe => "dataframe",
            OutType::Xarray => "xarray",
        }
    }
}

impl FromStr for OutType {
    type Err = AxdsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dataframe" => Ok(OutType::Dataframe),
            "xarray" => Ok(OutType::Xarray),
            other => Err(AxdsError::UnknownOutType {
                got: other.to_string(),
                allowed: Self::ALLOWED,
            }),
        }
    }
}

impl fmt::Display for OutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binning interval for the sensor API's binned observations endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinInterval {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl BinInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinInterval::Hourly => "hourly",
            BinInterval::Daily => "daily",
            BinInterval::Weekly => "weekly",
            BinInterval::Monthly => "monthly",
            BinInterval::Yearly => "yearly",
        }
    }
}

impl FromStr for BinInterval {
    type Err = AxdsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hourly" => Ok(BinInterval::Hourly),
            "daily" => Ok(BinInterval::Daily),
            "weekly" => Ok(BinInterval::Weekly),
            "monthly" => Ok(BinInterval::Monthly),
            "yearly" => Ok(BinInterval::Yearly),
            other => Err(AxdsError::invalid_parameter(
                "bin_interval",
                format!(
                    "expected one of hourly, daily, weekly, monthly, yearly but got {}",
                    other
                ),
            )),
        }
    }
}

/// How aggregate QARTOD quality flags are handled for sensor stations.
///
/// Flags are 1 pass, 2 not evaluated, 3 suspect, 4 fail, 9 missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Qartod {
    /// No flag columns.
    #[default]
    Off,
    /// Add a `{variable}_qc_agg` column next to every data column.
    Columns,
    /// Null data whose flag is not listed, then drop the flag columns.
    Filter(Vec<i64>),
}

impl Qartod {
    pub fn wants_flags(&self) -> bool {
        !matches!(self, Qartod::Off)
    }
}

/// Raw search keywords, each optional, as a user would supply them.
///
/// Converted into a validated [`SearchFilter`] when the catalog opens.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchKwargs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_lon: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_lon: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_for: Option<String>,
}

impl SearchKwargs {
    /// Set all four bounding box keys at once.
    pub fn bbox(mut self, min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        self.min_lon = Some(min_lon);
        self.min_lat = Some(min_lat);
        self.max_lon = Some(max_lon);
        self.max_lat = Some(max_lat);
        self
    }

    pub fn time(mut self, min_time: impl Into<String>, max_time: impl Into<String>) -> Self {
        self.min_time = Some(min_time.into());
        self.max_time = Some(max_time.into());
        self
    }

    pub fn search_for(mut self, term: impl Into<String>) -> Self {
        self.search_for = Some(term.into());
        self
    }

    /// Validate the keywords.
    ///
    /// Bounding box keys and time keys are all-or-nothing groups.
    pub fn to_filter(&self) -> AxdsResult<SearchFilter> {
        let lon_lat = [self.min_lon, self.max_lon, self.min_lat, self.max_lat];
        let bbox = match lon_lat {
            [Some(min_lon), Some(max_lon), Some(min_lat), Some(max_lat)] => {
                Some(BoundingBox::try_new(min_lon, min_lat, max_lon, max_lat)?)
            }
            [None, None, None, None] => None,
            _ => {
                return Err(AxdsError::invalid_parameter(
                    "kwargs_search",
                    "If any of [\"min_lon\", \"max_lon\", \"min_lat\", \"max_lat\"] are input, they all must be input.",
                ))
            }
        };

        let time = match (&self.min_time, &self.max_time) {
            (Some(start), Some(end)) => Some(TimeRange::try_new(
                parse_datetime(start)?,
                parse_datetime(end)?,
            )?),
            (None, None) => None,
            _ => {
                return Err(AxdsError::invalid_parameter(
                    "kwargs_search",
                    "If any of [\"min_time\", \"max_time\"] are input, they all must be input.",
                ))
            }
        };

        let search_for = match &self.search_for {
            Some(term) if term.trim().is_empty() => {
                return Err(AxdsError::invalid_parameter(
                    "search_for",
                    "search term must not be empty",
                ))
            }
            other => other.clone(),
        };

        Ok(SearchFilter {
            bbox,
            time,
            search_for,
        })
    }
}

/// Validated server-side search constraints. `None` means unconstrained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilter {
    pub bbox: Option<BoundingBox>,
    pub time: Option<TimeRange>,
    pub search_for: Option<String>,
}

/// Regex criteria per key: `key -> attribute -> pattern`.
///
/// A parameter name matches a key when any of the key's patterns match it.
pub type Criteria = BTreeMap<String, BTreeMap<String, String>>;

/// Where the remote services live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoints {
    /// Base of the search service, e.g. `https://search.axds.co/v2`.
    pub search_base: String,
    /// Base of the sensor API, e.g. `https://sensors.axds.co/api`.
    pub sensor_base: String,
    /// Parameter vocabulary endpoint.
    pub context_url: String,
    /// Per-request timeout.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            search_base: "https://search.axds.co/v2".to_string(),
            sensor_base: "https://sensors.axds.co/api".to_string(),
            context_url: "http://oikos.axds.co/rest/context".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl Endpoints {
    /// Defaults overridden by `AXDS_SEARCH_URL`, `AXDS_SENSOR_URL`,
    /// `AXDS_CONTEXT_URL` and `AXDS_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            search_base: env::var("AXDS_SEARCH_URL").unwrap_or(defaults.search_base),
            sensor_base: env::var("AXDS_SENSOR_URL").unwrap_or(defaults.sensor_base),
            context_url: env::var("AXDS_CONTEXT_URL").unwrap_or(defaults.context_url),
            timeout: env::var("AXDS_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    /// Point every service at one base URL (useful for a local mock server).
    pub fn single_host(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            search_base: format!("{}/v2", base),
            sensor_base: format!("{}/api", base),
            context_url: format!("{}/rest/context", base),
            timeout: Duration::from_secs(10),
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

/// Everything needed to open a catalog.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub datatype: Datatype,
    pub kwargs_search: SearchKwargs,
    pub outtype: OutType,
    pub page_size: usize,
    pub name: String,
    pub description: String,
    /// Catalog-level metadata; `None` means "derive it from the search".
    pub metadata: Option<Map<String, Value>>,
    /// Expiry of loaded results; `None` never expires.
    pub ttl: Option<Duration>,
    pub verbose: bool,
    pub keys_to_match: Option<Vec<String>>,
    pub criteria: Criteria,
    pub standard_names: Option<Vec<String>>,
    pub qartod: Qartod,
    pub use_units: bool,
    pub bin_interval: Option<BinInterval>,
    pub endpoints: Endpoints,
}

impl CatalogConfig {
    pub fn new(datatype: Datatype) -> Self {
        Self {
            datatype,
            kwargs_search: SearchKwargs::default(),
            outtype: OutType::default(),
            page_size: DEFAULT_PAGE_SIZE,
            name: "catalog".to_string(),
            description: "Catalog of Axiom assets.".to_string(),
            metadata: None,
            ttl: None,
            verbose: false,
            keys_to_match: None,
            criteria: Criteria::new(),
            standard_names: None,
            qartod: Qartod::default(),
            use_units: true,
            bin_interval: None,
            endpoints: Endpoints::default(),
        }
    }

    /// Start from a datatype name such as `"platform2"`.
    pub fn for_datatype(datatype: &str) -> AxdsResult<Self> {
        Ok(Self::new(datatype.parse()?))
    }

    pub fn kwargs_search(mut self, kwargs: SearchKwargs) -> Self {
        self.kwargs_search = kwargs;
        self
    }

    pub fn outtype(mut self, outtype: OutType) -> Self {
        self.outtype = outtype;
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn keys_to_match(mut self, keys: Vec<String>, criteria: Criteria) -> Self {
        self.keys_to_match = Some(keys);
        self.criteria = criteria;
        self
    }

    pub fn standard_names(mut self, names: Vec<String>) -> Self {
        self.standard_names = Some(names);
        self
    }

    pub fn qartod(mut self, qartod: Qartod) -> Self {
        self.qartod = qartod;
        self
    }

    pub fn use_units(mut self, use_units: bool) -> Self {
        self.use_units = use_units;
        self
    }

    pub fn bin_interval(mut self, interval: Option<BinInterval>) -> Self {
        self.bin_interval = interval;
        self
    }

    pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Check everything that can be checked without the network.
    pub fn validate(&self) -> AxdsResult<SearchFilter> {
        if self.page_size == 0 {
            return Err(AxdsError::invalid_parameter(
                "page_size",
                "must be at least 1",
            ));
        }
        if self.keys_to_match.is_some() && self.standard_names.is_some() {
            return Err(AxdsError::invalid_parameter(
                "keys_to_match",
                "Input either `keys_to_match` or `standard_names` but not both.",
            ));
        }
        if let Qartod::Filter(flags) = &self.qartod {
            if flags.is_empty() {
                return Err(AxdsError::invalid_parameter(
                    "qartod",
                    "filter needs at least one flag value",
                ));
            }
        }
        self.kwargs_search.to_filter()
    }
}
