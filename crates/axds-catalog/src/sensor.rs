//! Sensor API access for `sensor_station` entries.
//!
//! A station is read through one or more observation requests. Version 1
//! stations need one request per parameter group, version 2 stations answer
//! a single request for everything. Each response holds `groupedFeeds`, one
//! table per feed, which are outer-joined on their time (and z) index.

use std::collections::{BTreeMap, BTreeSet};

use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use axds_common::time::{parse_datetime, sensor_api_timestamp};
use axds_common::{AxdsError, AxdsResult, TimeRange};

use crate::client::{decode, Fetcher};
use crate::config::{BinInterval, Qartod};
use crate::metadata::{DatatypeDetails, EntryMetadata, VariableDetails};
use crate::table::{Column, ColumnData, Table};

/// Metadata URL of a station.
pub fn metadata_url(sensor_base: &str, internal_id: i64) -> AxdsResult<String> {
    let mut url = sensor_url(sensor_base, "metadata/filter/custom")?;
    url.query_pairs_mut()
        .append_pair("filter", &station_filter(internal_id, None));
    Ok(url.into())
}

fn sensor_url(base: &str, path: &str) -> AxdsResult<Url> {
    let joined = format!("{}/{}", base.trim_end_matches('/'), path);
    Url::parse(&joined)
        .map_err(|e| AxdsError::invalid_parameter("sensor_base", format!("{}: {}", joined, e)))
}

/// Filter document for the sensor API.
///
/// With a parameter group the station id is numeric, as version 1 stations
/// expect; otherwise it is a string.
fn station_filter(internal_id: i64, parameter_group: Option<i64>) -> String {
    match parameter_group {
        Some(pgid) => format!(
            r#"{{"stations":[{}],"parameterGroups":[{}]}}"#,
            internal_id, pgid
        ),
        None => format!(r#"{{"stations":["{}"]}}"#, internal_id),
    }
}

/// Column label, with units in brackets when wanted and known.
pub fn make_label(label: &str, units: Option<&str>, use_units: bool) -> String {
    match units {
        Some(units) if use_units => format!("{} [{}]", label, units),
        _ => label.to_string(),
    }
}

/// Read options that come from the catalog rather than the entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorOptions {
    pub qartod: Qartod,
    pub use_units: bool,
    pub bin_interval: Option<BinInterval>,
}

impl Default for SensorOptions {
    fn default() -> Self {
        Self {
            qartod: Qartod::Off,
            use_units: true,
            bin_interval: None,
        }
    }
}

/// Everything needed to read one station.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorRequest {
    pub dataset_id: String,
    pub internal_id: i64,
    pub version: u8,
    pub variables: BTreeMap<String, VariableDetails>,
    /// Catalog time filter; takes precedence over the station's own range.
    pub time: Option<TimeRange>,
    pub min_time: Option<String>,
    pub max_time: Option<String>,
    pub options: SensorOptions,
    pub sensor_base: String,
}

impl SensorRequest {
    /// Build a request from entry metadata.
    ///
    /// Nothing about the time window is checked here; see
    /// [`SensorRequest::time_range`].
    pub fn from_metadata(
        metadata: &EntryMetadata,
        time: Option<&TimeRange>,
        options: SensorOptions,
        sensor_base: &str,
    ) -> AxdsResult<Self> {
        let (internal_id, version, variables) = match &metadata.details {
            DatatypeDetails::SensorStation {
                internal_id,
                version,
                variables_details,
                ..
            } => (*internal_id, *version, variables_details.clone()),
            DatatypeDetails::Platform { .. } => {
                return Err(AxdsError::Internal(format!(
                    "{} is not a sensor station",
                    metadata.dataset_id
                )))
            }
        };

        Ok(Self {
            dataset_id: metadata.dataset_id.clone(),
            internal_id,
            version,
            variables,
            time: time.copied(),
            min_time: metadata.min_time.clone(),
            max_time: metadata.max_time.clone(),
            options,
            sensor_base: sensor_base.to_string(),
        })
    }

    /// Time window to request: the catalog's when it has one, else the
    /// station's own `minTime`/`maxTime`.
    pub fn time_range(&self) -> AxdsResult<TimeRange> {
        if let Some(range) = self.time {
            return Ok(range);
        }
        match (&self.min_time, &self.max_time) {
            (Some(start), Some(end)) => {
                TimeRange::try_new(parse_datetime(start)?, parse_datetime(end)?)
            }
            _ => Err(AxdsError::invalid_parameter(
                "kwargs_search",
                format!(
                    "min_time and max_time are required to read {}, which has no time range of its own",
                    self.dataset_id
                ),
            )),
        }
    }

    /// Filter documents, one per request.
    pub fn filters(&self) -> Vec<String> {
        if self.version == 1 {
            let groups: BTreeSet<i64> = self
                .variables
                .values()
                .map(|v| v.parameter_group_id)
                .collect();
            groups
                .into_iter()
                .map(|pgid| station_filter(self.internal_id, Some(pgid)))
                .collect()
        } else {
            vec![station_filter(self.internal_id, None)]
        }
    }

    /// Observation URLs, one per filter.
    pub fn data_urls(&self) -> AxdsResult<Vec<Url>> {
        let path = if self.options.bin_interval.is_some() {
            "observations/filter/custom/binned"
        } else {
            "observations/filter/custom"
        };

        let time = self.time_range()?;
        self.filters()
            .into_iter()
            .map(|filter| {
                let mut url = sensor_url(&self.sensor_base, path)?;
                {
                    let mut query = url.query_pairs_mut();
                    query
                        .append_pair("filter", &filter)
                        .append_pair("start", &sensor_api_timestamp(&time.start))
                        .append_pair("end", &sensor_api_timestamp(&time.end));
                    if let Some(interval) = self.options.bin_interval {
                        query.append_pair("binInterval", interval.as_str());
                    }
                }
                Ok(url)
            })
            .collect()
    }

    /// Fetch every observation request and join the feeds into one table.
    ///
    /// Requests that come back without feeds are skipped; it is an error
    /// only when none of them returned data.
    #[instrument(skip(self, fetcher), fields(dataset_id = %self.dataset_id))]
    pub async fn load(&self, fetcher: &dyn Fetcher) -> AxdsResult<Table> {
        let mut combined: Option<Table> = None;

        for url in self.data_urls()? {
            let url = url.as_str();
            let response: ObservationsResponse = decode(url, fetcher.get_json(url).await?)?;

            if response.data.grouped_feeds.is_empty() {
                warn!(url, "No data feeds returned");
                continue;
            }
            debug!(feeds = response.data.grouped_feeds.len(), "Received observations");

            for feed in &response.data.grouped_feeds {
                let table = self.feed_table(url, feed)?;
                combined = Some(match combined {
                    None => table,
                    Some(acc) => acc.outer_join(&table)?,
                });
            }
        }

        combined
            .map(|table| table.sort_index())
            .ok_or_else(|| AxdsError::NoData(self.dataset_id.clone()))?
    }

    /// Variable name for a device id.
    fn variable_for(&self, url: &str, field: &FeedField) -> AxdsResult<String> {
        let by_device = field.device_id.and_then(|device| {
            self.variables
                .iter()
                .find(|(_, details)| details.device_id == device)
                .map(|(name, _)| name.clone())
        });

        by_device
            .or_else(|| field.label.clone())
            .ok_or_else(|| AxdsError::MalformedResponse {
                url: url.to_string(),
                message: format!("no variable matches device {:?}", field.device_id),
            })
    }

    fn feed_table(&self, url: &str, feed: &GroupedFeed) -> AxdsResult<Table> {
        let meta = &feed.metadata;
        let use_units = self.options.use_units;

        let lon = meta.lon.as_ref().filter(|v| !v.is_null());
        let lat = meta.lat.as_ref().filter(|v| !v.is_null());
        if lon.is_some() || lat.is_some() {
            return Err(AxdsError::MalformedResponse {
                url: url.to_string(),
                message: format!(
                    "lon/lat should be null for sensors but are {:?}, {:?}",
                    lon, lat
                ),
            });
        }

        let column_at = |index: usize| -> ColumnData {
            let values: Vec<Value> = feed
                .data
                .iter()
                .map(|row| row.get(index).cloned().unwrap_or(Value::Null))
                .collect();
            ColumnData::from_json(&values)
        };

        let mut index = vec![Column::new(
            meta.time.column_name("time", use_units),
            column_at(meta.time.index),
        )];
        if let Some(z) = &meta.z {
            index.push(Column::new(z.column_name("z", use_units), column_at(z.index)));
        }

        // device id -> data column name
        let mut names_by_device = BTreeMap::new();
        let mut columns = Vec::with_capacity(meta.values.len());
        for field in &meta.values {
            let variable = self.variable_for(url, field)?;
            let name = make_label(&variable, field.units.as_deref(), use_units);
            if let Some(device) = field.device_id {
                names_by_device.insert(device, name.clone());
            }
            columns.push(Column::new(name, column_at(field.index)));
        }

        let mut flags = Vec::new();
        if self.options.qartod.wants_flags() {
            for field in &meta.qc_agg {
                let variable = self.variable_for(url, field)?;
                let data_name = field
                    .device_id
                    .and_then(|device| names_by_device.get(&device).cloned());
                let flag_name = format!("{}_qc_agg", variable);
                flags.push((flag_name.clone(), data_name));
                columns.push(Column::new(flag_name, column_at(field.index)));
            }
        }

        let mut table = Table::new(index, columns)?;

        if let Qartod::Filter(keep) = &self.options.qartod {
            for (flag_name, data_name) in flags {
                let flag_values: Vec<Option<f64>> = table
                    .column(&flag_name)
                    .and_then(|c| c.data.as_floats())
                    .unwrap_or_default();

                if let Some(data_name) = data_name {
                    table.mask_where(&data_name, |row| {
                        flag_values
                            .get(row)
                            .copied()
                            .flatten()
                            .map(|flag| keep.iter().any(|k| *k as f64 == flag))
                            .unwrap_or(false)
                    })?;
                }
                table.drop_column(&flag_name);
            }
        }

        Ok(table)
    }
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    data: ObservationsData,
}

#[derive(Debug, Deserialize)]
struct ObservationsData {
    #[serde(rename = "groupedFeeds", default)]
    grouped_feeds: Vec<GroupedFeed>,
}

#[derive(Debug, Deserialize)]
struct GroupedFeed {
    metadata: FeedMetadata,
    #[serde(default)]
    data: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct FeedMetadata {
    time: FeedField,
    #[serde(default)]
    z: Option<FeedField>,
    #[serde(default)]
    lon: Option<Value>,
    #[serde(default)]
    lat: Option<Value>,
    #[serde(default)]
    values: Vec<FeedField>,
    #[serde(rename = "qcAgg", default)]
    qc_agg: Vec<FeedField>,
}

/// Position and description of one column in a feed's rows.
#[derive(Debug, Deserialize)]
struct FeedField {
    index: usize,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    units: Option<String>,
    #[serde(rename = "deviceId", default)]
    device_id: Option<i64>,
}

impl FeedField {
    fn column_name(&self, fallback: &str, use_units: bool) -> String {
        make_label(
            self.label.as_deref().unwrap_or(fallback),
            self.units.as_deref(),
            use_units,
        )
    }
}
