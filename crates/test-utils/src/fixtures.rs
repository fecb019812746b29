//! Canned AXDS responses.
//!
//! Shapes follow what the search service, the docs endpoint, the parameter
//! context and the sensor API return, trimmed to the fields the client reads.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{json, Value};

/// Bounding boxes as (min_lon, min_lat, max_lon, max_lat).
pub mod bbox {
    /// Gulf of Alaska / Bering Sea search box.
    pub const ALASKA: (f64, f64, f64, f64) = (-180.0, 50.0, -156.0, 66.0);

    /// Northern California coast.
    pub const NORCAL: (f64, f64, f64, f64) = (-125.0, 37.0, -122.0, 40.0);

    /// Invalid box (min > max).
    pub const INVALID: (f64, f64, f64, f64) = (10.0, 10.0, 5.0, 5.0);
}

/// Platform CSV with a time and depth column.
pub const PLATFORM_CSV: &str = "\
time,z,latitude,longitude,temperature,salinity
2015-06-01T00:00:00Z,0,57.1,-165.2,6.5,31.9
2015-06-01T00:00:00Z,10,57.1,-165.2,5.75,32.1
2015-06-01T01:00:00Z,0,57.2,-165.1,6.25,
";

/// Gzip some text, like `data.csv.gz` downloads.
pub fn gzip(text: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    encoder
        .write_all(text.as_bytes())
        .expect("Failed to gzip fixture");
    encoder.finish().expect("Failed to gzip fixture")
}

/// A `platform2` search result whose CSV lives at `csv_url`.
pub fn platform_result(uuid: &str, label: &str, csv_url: &str) -> Value {
    json!({
        "uuid": uuid,
        "label": label,
        "description": format!("{} deployment", label),
        "type": "platform2",
        "start_date_time": "2015-06-01T00:00:00Z",
        "end_date_time": "2015-07-01T00:00:00Z",
        "source": {
            "meta": {
                "attributes": {
                    "institution": "Alaska Ocean Observing System",
                    "geospatial_bounds": "POLYGON ((-170 55, -160 55, -160 60, -170 60, -170 55))"
                },
                "variables": {"temperature": {}, "salinity": {}}
            },
            "files": {
                "data.csv.gz": {"url": csv_url},
                "deployment.nc": {"url": format!("{}.nc", csv_url)}
            }
        }
    })
}

/// A `platform2` result without a file map, forcing a docs lookup.
pub fn platform_result_without_files(uuid: &str) -> Value {
    let mut result = platform_result(uuid, "Mooring", "unused");
    if let Some(source) = result["source"].as_object_mut() {
        source.remove("files");
    }
    result
}

/// A webcam platform, which the catalog skips.
pub fn webcam_result(uuid: &str) -> Value {
    let mut result = platform_result(uuid, "Harbor webcam", "unused");
    result["source"]["meta"]["variables"] = json!({"webcam": {}});
    result
}

/// A `sensor_station` search result with temperature (device 501) and wind
/// speed (device 503).
pub fn sensor_result(uuid: &str, internal_id: i64, version: u8) -> Value {
    json!({
        "uuid": uuid,
        "label": "Bodega Marine Lab",
        "description": "Shore station",
        "type": "sensor_station",
        "start_date_time": "2021-04-01T00:00:00Z",
        "end_date_time": "2021-04-02T00:00:00Z",
        "source": {
            "id": internal_id,
            "location": {"coordinates": [-123.711083, 38.914556, 0.0], "type": "Point"},
            "figures": [
                {
                    "label": "Water Temperature",
                    "parameterGroupId": 6,
                    "plots": [{"subPlots": [{
                        "datasetVariableId": "sea_water_temperature",
                        "parameterId": 12,
                        "label": "Sea Water Temperature",
                        "deviceId": 501
                    }]}]
                },
                {
                    "label": "Winds: Speed and Direction",
                    "parameterGroupId": 7,
                    "plots": [{"subPlots": [{
                        "datasetVariableId": "wind_speed",
                        "parameterId": 40,
                        "label": "Wind Speed",
                        "deviceId": 503
                    }]}]
                }
            ]
        },
        "data": {
            "datumConversions": [],
            "version": version
        }
    })
}

/// A station whose search result has no time range.
pub fn sensor_result_without_times(uuid: &str, internal_id: i64) -> Value {
    let mut result = sensor_result(uuid, internal_id, 2);
    if let Some(fields) = result.as_object_mut() {
        fields.remove("start_date_time");
        fields.remove("end_date_time");
    }
    result
}

/// A platform that only links a netCDF file.
pub fn platform_result_without_csv(uuid: &str) -> Value {
    let mut result = platform_result(uuid, "Buoy", "unused");
    result["source"]["files"] = json!({"deployment.nc": {"url": "https://files.example/deployment.nc"}});
    result
}

/// Wrap results the way the search endpoint does.
pub fn search_response(results: Vec<Value>) -> Value {
    json!({ "results": results })
}

/// Docs endpoint response listing one CSV file.
pub fn docs_response(csv_url: &str) -> Value {
    json!([{
        "data": {"resources": {"files": {
            "data.csv.gz": {"url": csv_url}
        }}}
    }])
}

/// Parameter context with two groups.
pub fn parameter_context() -> Value {
    json!({
        "parameters": [
            {"id": 1, "label": "Sea Water Temperature", "parameterName": "sea_water_temperature", "idParameterGroup": 6},
            {"id": 2, "label": "Wind Speed", "parameterName": "wind_speed", "idParameterGroup": 7},
            {"id": 3, "label": "Wind Gust", "parameterName": "wind_speed_of_gust", "idParameterGroup": 186}
        ],
        "parameterGroups": [
            {"id": 6, "label": "Water Temperature"},
            {"id": 7, "label": "Winds: Speed and Direction"},
            {"id": 186, "label": "Winds: Gusts"}
        ]
    })
}

/// Sensor observations: one feed with temperature and its aggregate flag,
/// one with wind speed.
pub fn observations_response() -> Value {
    json!({"data": {"groupedFeeds": [
        {
            "metadata": {
                "time": {"index": 0, "label": "time", "units": "UTC"},
                "z": null,
                "lon": null,
                "lat": null,
                "values": [{"index": 1, "deviceId": 501, "units": "degC"}],
                "qcAgg": [{"index": 2, "deviceId": 501}]
            },
            "data": [
                ["2021-04-01T00:00:00Z", 10.5, 1],
                ["2021-04-01T01:00:00Z", 10.75, 3]
            ]
        },
        {
            "metadata": {
                "time": {"index": 0, "label": "time", "units": "UTC"},
                "z": null,
                "lon": null,
                "lat": null,
                "values": [{"index": 1, "deviceId": 503, "units": "m.s-1"}],
                "qcAgg": [{"index": 2, "deviceId": 503}]
            },
            "data": [
                ["2021-04-01T00:00:00Z", 4.0, 1],
                ["2021-04-01T02:00:00Z", 5.5, 1]
            ]
        }
    ]}})
}
