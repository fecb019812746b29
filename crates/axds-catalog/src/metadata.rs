//! Per-entry metadata extracted from search results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use axds_common::wkt::wkt_bounds;
use axds_common::{AxdsError, AxdsResult, BoundingBox};

use crate::client::decode;
use crate::config::Datatype;

/// Fields every search result carries, whatever its datatype.
#[derive(Debug, Clone, Deserialize)]
struct CommonResult {
    uuid: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    start_date_time: Option<String>,
    #[serde(default)]
    end_date_time: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PlatformResult {
    #[serde(default)]
    source: PlatformSource,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PlatformSource {
    #[serde(default)]
    meta: PlatformMeta,
    #[serde(default)]
    files: Option<BTreeMap<String, FileLink>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PlatformMeta {
    #[serde(default)]
    attributes: BTreeMap<String, Value>,
    #[serde(default)]
    variables: serde_json::Map<String, Value>,
}

/// A downloadable file attached to a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileLink {
    pub url: String,
}

/// Station search results split the station description (`source`) from the
/// sensor API bookkeeping (`data`).
#[derive(Debug, Clone, Deserialize)]
struct SensorResult {
    source: SensorSource,
    #[serde(default)]
    data: SensorApiData,
}

#[derive(Debug, Clone, Deserialize)]
struct SensorSource {
    id: i64,
    location: SensorLocation,
    #[serde(default)]
    figures: Vec<Figure>,
}

#[derive(Debug, Clone, Deserialize)]
struct SensorApiData {
    #[serde(rename = "datumConversions", default)]
    datum_conversions: Vec<Value>,
    #[serde(default = "default_version")]
    version: u8,
}

impl Default for SensorApiData {
    fn default() -> Self {
        Self {
            datum_conversions: Vec::new(),
            version: default_version(),
        }
    }
}

fn default_version() -> u8 {
    2
}

#[derive(Debug, Clone, Deserialize)]
struct SensorLocation {
    coordinates: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct Figure {
    label: String,
    #[serde(rename = "parameterGroupId")]
    parameter_group_id: i64,
    #[serde(default)]
    plots: Vec<Plot>,
}

#[derive(Debug, Clone, Deserialize)]
struct Plot {
    #[serde(rename = "subPlots", default)]
    sub_plots: Vec<SubPlot>,
}

#[derive(Debug, Clone, Deserialize)]
struct SubPlot {
    #[serde(rename = "datasetVariableId")]
    dataset_variable_id: String,
    #[serde(rename = "parameterId")]
    parameter_id: i64,
    label: String,
    #[serde(rename = "deviceId")]
    device_id: i64,
}

/// Sensor API details for one station variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDetails {
    #[serde(rename = "parameterGroupLabel")]
    pub parameter_group_label: String,
    #[serde(rename = "parameterGroupId")]
    pub parameter_group_id: i64,
    #[serde(rename = "datasetVariableId")]
    pub dataset_variable_id: String,
    #[serde(rename = "parameterId")]
    pub parameter_id: i64,
    pub label: String,
    #[serde(rename = "deviceId")]
    pub device_id: i64,
}

/// Datatype-specific metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DatatypeDetails {
    Platform {
        institution: Option<String>,
        geospatial_bounds: Option<String>,
        /// File name to link; empty when the search result listed none.
        files: BTreeMap<String, FileLink>,
    },
    SensorStation {
        internal_id: i64,
        /// Keyed by dataset variable id, which is also the variable name.
        variables_details: BTreeMap<String, VariableDetails>,
        #[serde(rename = "datumConversions", skip_serializing_if = "Option::is_none")]
        datum_conversions: Option<Vec<Value>>,
        metadata_url: String,
        /// Sensor API generation, 1 or 2.
        version: u8,
    },
}

/// Metadata stored with a catalog entry.
///
/// Key names follow the conventions shared with other ocean data catalogs
/// (`datasetID`, `minTime`, ...).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryMetadata {
    #[serde(rename = "datasetID")]
    pub dataset_id: String,
    pub title: Option<String>,
    pub summary: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(rename = "minTime")]
    pub min_time: Option<String>,
    #[serde(rename = "maxTime")]
    pub max_time: Option<String>,
    #[serde(skip)]
    pub bounds: Option<BoundingBox>,
    pub variables: Vec<String>,
    #[serde(flatten)]
    pub details: DatatypeDetails,
}

impl EntryMetadata {
    /// Extract metadata from one search result.
    pub fn from_search_result(
        datatype: Datatype,
        result: &Value,
        sensor_base: &str,
    ) -> AxdsResult<Self> {
        let common: CommonResult = decode("search result", result.clone())?;

        let mut metadata = EntryMetadata {
            dataset_id: common.uuid,
            title: common.label,
            summary: common.description,
            kind: common.kind,
            min_time: common.start_date_time,
            max_time: common.end_date_time,
            bounds: None,
            variables: Vec::new(),
            details: DatatypeDetails::Platform {
                institution: None,
                geospatial_bounds: None,
                files: BTreeMap::new(),
            },
        };

        match datatype {
            Datatype::Platform2 => metadata.fill_platform(result)?,
            Datatype::SensorStation => metadata.fill_sensor(result, sensor_base)?,
        }

        Ok(metadata)
    }

    fn fill_platform(&mut self, result: &Value) -> AxdsResult<()> {
        let platform: PlatformResult = decode("search result", result.clone())?;
        let attributes = &platform.source.meta.attributes;

        let institution = attributes
            .get("institution")
            .and_then(Value::as_str)
            .map(str::to_string);
        let geospatial_bounds = attributes
            .get("geospatial_bounds")
            .and_then(Value::as_str)
            .map(str::to_string);

        if let Some(wkt) = &geospatial_bounds {
            self.bounds = Some(wkt_bounds(wkt)?);
        }

        self.variables = platform.source.meta.variables.keys().cloned().collect();
        self.variables.sort();
        self.details = DatatypeDetails::Platform {
            institution,
            geospatial_bounds,
            files: platform.source.files.unwrap_or_default(),
        };
        Ok(())
    }

    fn fill_sensor(&mut self, result: &Value, sensor_base: &str) -> AxdsResult<()> {
        let sensor: SensorResult = decode("search result", result.clone())?;
        let source = sensor.source;
        let data = sensor.data;

        // location is [lon, lat, depth]
        match source.location.coordinates.as_slice() {
            [lon, lat, ..] => self.bounds = Some(BoundingBox::from_point(*lon, *lat)),
            _ => {
                return Err(AxdsError::MalformedResponse {
                    url: "search result".to_string(),
                    message: format!("station {} has no coordinates", self.dataset_id),
                })
            }
        }

        let mut variables_details = BTreeMap::new();
        for figure in &source.figures {
            for plot in &figure.plots {
                for sub_plot in &plot.sub_plots {
                    variables_details.insert(
                        sub_plot.dataset_variable_id.clone(),
                        VariableDetails {
                            parameter_group_label: figure.label.clone(),
                            parameter_group_id: figure.parameter_group_id,
                            dataset_variable_id: sub_plot.dataset_variable_id.clone(),
                            parameter_id: sub_plot.parameter_id,
                            label: sub_plot.label.clone(),
                            device_id: sub_plot.device_id,
                        },
                    );
                }
            }
        }

        self.variables = variables_details.keys().cloned().collect();
        self.details = DatatypeDetails::SensorStation {
            internal_id: source.id,
            variables_details,
            datum_conversions: if data.datum_conversions.is_empty() {
                None
            } else {
                Some(data.datum_conversions)
            },
            metadata_url: crate::sensor::metadata_url(sensor_base, source.id)?,
            version: data.version,
        };
        Ok(())
    }

    /// Webcam datasets carry no tabular data.
    pub fn is_webcam(&self) -> bool {
        self.variables.iter().any(|v| v == "webcam")
    }

    /// File links of a platform; empty for stations.
    pub fn files(&self) -> Option<&BTreeMap<String, FileLink>> {
        match &self.details {
            DatatypeDetails::Platform { files, .. } => Some(files),
            DatatypeDetails::SensorStation { .. } => None,
        }
    }

    /// Replace the file links, e.g. after a docs lookup.
    pub fn set_files(&mut self, new_files: BTreeMap<String, FileLink>) {
        if let DatatypeDetails::Platform { files, .. } = &mut self.details {
            *files = new_files;
        }
    }

    /// Metadata as a JSON object, including derived bounds.
    pub fn to_json(&self) -> AxdsResult<serde_json::Map<String, Value>> {
        let mut map = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => return Err(AxdsError::Internal("metadata is not an object".to_string())),
        };
        if let Some(b) = &self.bounds {
            map.insert("minLongitude".to_string(), b.min_lon.into());
            map.insert("minLatitude".to_string(), b.min_lat.into());
            map.insert("maxLongitude".to_string(), b.max_lon.into());
            map.insert("maxLatitude".to_string(), b.max_lat.into());
        }
        Ok(map)
    }
}

/// Pull the file map out of a docs response (`[0].data.resources.files`).
pub fn files_from_docs(url: &str, docs: Value) -> AxdsResult<BTreeMap<String, FileLink>> {
    let files = docs
        .get(0)
        .and_then(|d| d.pointer("/data/resources/files"))
        .cloned()
        .ok_or_else(|| AxdsError::MalformedResponse {
            url: url.to_string(),
            message: "docs response has no data.resources.files".to_string(),
        })?;
    decode(url, files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn platform_result() -> Value {
        json!({
            "uuid": "b6a3c8d2",
            "label": "Glider sg179",
            "description": "Slocum glider deployment",
            "type": "platform2",
            "start_date_time": "2015-06-01T00:00:00Z",
            "end_date_time": "2015-07-01T00:00:00Z",
            "source": {
                "meta": {
                    "attributes": {
                        "institution": "UAF",
                        "geospatial_bounds": "POLYGON ((-170 55, -160 55, -160 60, -170 60, -170 55))"
                    },
                    "variables": {"temperature": {}, "salinity": {}}
                },
                "files": {
                    "data.csv.gz": {"url": "https://files.example/data.csv.gz"},
                    "deployment.nc": {"url": "https://files.example/deployment.nc"}
                }
            }
        })
    }

    #[test]
    fn test_platform_metadata() {
        let md = EntryMetadata::from_search_result(
            Datatype::Platform2,
            &platform_result(),
            "https://sensors.axds.co/api",
        )
        .unwrap();

        assert_eq!(md.dataset_id, "b6a3c8d2");
        assert_eq!(md.title.as_deref(), Some("Glider sg179"));
        assert_eq!(md.bounds, Some(BoundingBox::new(-170.0, 55.0, -160.0, 60.0)));
        assert_eq!(md.variables, vec!["salinity", "temperature"]);
        assert_eq!(md.files().unwrap().len(), 2);
        assert!(!md.is_webcam());

        let map = md.to_json().unwrap();
        assert_eq!(map["datasetID"], "b6a3c8d2");
        assert_eq!(map["institution"], "UAF");
        assert_eq!(map["minLongitude"], -170.0);
    }

    #[test]
    fn test_sensor_metadata() {
        let result = json!({
            "uuid": "station-1",
            "label": "Bodega Marine Lab",
            "type": "sensor_station",
            "start_date_time": "2019-01-01T00:00:00Z",
            "end_date_time": "2023-01-01T00:00:00Z",
            "source": {
                "id": 106793,
                "location": {"coordinates": [-123.711083, 38.914556, 0.0], "type": "Point"},
                "figures": [{
                    "label": "Water Temperature",
                    "parameterGroupId": 6,
                    "plots": [{"subPlots": [{
                        "datasetVariableId": "sea_water_temperature",
                        "parameterId": 12,
                        "label": "Sea Water Temperature",
                        "deviceId": 501
                    }]}]
                }]
            },
            "data": {
                "datumConversions": [],
                "version": 2
            }
        });

        let md = EntryMetadata::from_search_result(
            Datatype::SensorStation,
            &result,
            "https://sensors.axds.co/api",
        )
        .unwrap();

        assert_eq!(md.variables, vec!["sea_water_temperature"]);
        assert_eq!(md.bounds, Some(BoundingBox::from_point(-123.711083, 38.914556)));
        match &md.details {
            DatatypeDetails::SensorStation {
                internal_id,
                version,
                datum_conversions,
                metadata_url,
                ..
            } => {
                assert_eq!(*internal_id, 106793);
                assert_eq!(*version, 2);
                assert!(datum_conversions.is_none());
                assert!(metadata_url.starts_with("https://sensors.axds.co/api/metadata/filter/custom"));
            }
            other => panic!("unexpected details {:?}", other),
        }
    }

    #[test]
    fn test_sensor_v1_with_datum_conversions() {
        let result = json!({
            "uuid": "station-2",
            "type": "sensor_station",
            "source": {
                "id": 2044,
                "location": {"coordinates": [-149.9, 61.2, 0.0]},
                "figures": []
            },
            "data": {
                "datumConversions": [{"datum": "MLLW", "offset": 1.2}],
                "version": 1
            }
        });

        let md = EntryMetadata::from_search_result(
            Datatype::SensorStation,
            &result,
            "https://sensors.axds.co/api",
        )
        .unwrap();

        match &md.details {
            DatatypeDetails::SensorStation {
                internal_id,
                version,
                datum_conversions,
                ..
            } => {
                assert_eq!(*internal_id, 2044);
                assert_eq!(*version, 1);
                assert_eq!(datum_conversions.as_ref().map(Vec::len), Some(1));
            }
            other => panic!("unexpected details {:?}", other),
        }
        assert_eq!(md.to_json().unwrap()["datumConversions"][0]["datum"], "MLLW");
    }

    #[test]
    fn test_sensor_without_source_is_malformed() {
        let result = json!({
            "uuid": "station-3",
            "data": {"datumConversions": [], "version": 2}
        });
        let err = EntryMetadata::from_search_result(
            Datatype::SensorStation,
            &result,
            "https://sensors.axds.co/api",
        )
        .unwrap_err();
        assert!(matches!(err, AxdsError::MalformedResponse { .. }));
    }

    #[test]
    fn test_missing_uuid_is_malformed() {
        let err = EntryMetadata::from_search_result(
            Datatype::Platform2,
            &json!({"label": "x"}),
            "https://sensors.axds.co/api",
        )
        .unwrap_err();
        assert!(matches!(err, AxdsError::MalformedResponse { .. }));
    }

    #[test]
    fn test_files_from_docs() {
        let docs = json!([{"data": {"resources": {"files": {
            "data.csv.gz": {"url": "fake.csv.gz"},
            "deployment.nc": {"url": "fake.nc"}
        }}}}]);
        let files = files_from_docs("http://docs", docs).unwrap();
        assert_eq!(files["data.csv.gz"].url, "fake.csv.gz");
        assert!(files_from_docs("http://docs", json!([])).is_err());
    }
}
