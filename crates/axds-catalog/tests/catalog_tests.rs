//! End-to-end catalog tests against a mocked AXDS service.

use std::time::Duration;

use serde_json::{json, Map, Value};
use wiremock::MockServer;

use axds_catalog::{
    open_axds_cat, AxdsError, BoundingBox, CatalogConfig, DatatypeDetails, Datatype, Endpoints,
    ErrorCategory, OutType, Qartod, SearchKwargs,
};
use test_utils::fixtures::{self, PLATFORM_CSV};
use test_utils::mock::{
    self, CONTEXT_PATH, DOCS_PATH, OBSERVATIONS_PATH, SEARCH_PATH,
};
use test_utils::{assert_approx_eq, assert_coords_approx_eq};

fn config(server: &MockServer, datatype: Datatype) -> CatalogConfig {
    CatalogConfig::new(datatype).endpoints(Endpoints::single_host(&server.uri()))
}

/// Two platforms with CSV files served by the mock.
async fn platform_server() -> MockServer {
    let server = MockServer::start().await;
    let results = vec![
        fixtures::platform_result("glider-a", "Glider A", &format!("{}/files/a.csv.gz", server.uri())),
        fixtures::platform_result("glider-b", "Glider B", &format!("{}/files/b.csv.gz", server.uri())),
    ];
    mock::mount_json(&server, SEARCH_PATH, fixtures::search_response(results)).await;
    mock::mount_bytes(&server, "/files/a.csv.gz", fixtures::gzip(PLATFORM_CSV)).await;
    mock::mount_bytes(&server, "/files/b.csv.gz", fixtures::gzip(PLATFORM_CSV)).await;
    server
}

async fn request_count(server: &MockServer, route: &str) -> usize {
    mock::received_queries(server, route).await.len()
}

// ============================================================================
// Construction
// ============================================================================

#[tokio::test]
async fn test_platform_catalog_entries() {
    let server = platform_server().await;
    let cat = open_axds_cat(config(&server, Datatype::Platform2)).await.unwrap();

    assert_eq!(cat.len(), 2);
    assert_eq!(cat.names(), vec!["glider-a", "glider-b"]);
    assert!(cat.contains("glider-b"));
    assert_eq!(cat.datatype(), Datatype::Platform2);

    let source = cat.get("glider-a").unwrap();
    assert_eq!(
        source.description(),
        "AXDS dataset_id glider-a of datatype platform2"
    );
    assert_eq!(
        source.urlpath(),
        Some(format!("{}/files/a.csv.gz", server.uri()).as_str())
    );

    let bounds = source.metadata().bounds.unwrap();
    assert_coords_approx_eq!((bounds.min_lon, bounds.min_lat), (-170.0, 55.0), 1e-9);

    // construction does not download data
    assert_eq!(request_count(&server, "/files/a.csv.gz").await, 0);
}

#[tokio::test]
async fn test_default_search_query() {
    let server = platform_server().await;
    open_axds_cat(config(&server, Datatype::Platform2)).await.unwrap();

    let queries = mock::received_queries(&server, SEARCH_PATH).await;
    assert_eq!(queries.len(), 1);
    let query: Map<String, Value> = queries[0]
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    assert_eq!(query["type"], "platform2");
    assert_eq!(query["pageSize"], "10");
    assert_eq!(query["portalId"], "-1");
    assert!(!query.contains_key("geom"));
}

#[tokio::test]
async fn test_bbox_and_time_sent_to_search() {
    let server = platform_server().await;
    let (min_lon, min_lat, max_lon, max_lat) = fixtures::bbox::ALASKA;
    let kwargs = SearchKwargs::default()
        .bbox(min_lon, min_lat, max_lon, max_lat)
        .time("2021-4-1", "2021-4-2");
    let cat = open_axds_cat(config(&server, Datatype::Platform2).kwargs_search(kwargs))
        .await
        .unwrap();

    let requested = cat.filter().bbox.unwrap();
    assert_eq!(requested, BoundingBox::new(min_lon, min_lat, max_lon, max_lat));
    assert!(!cat.is_empty());
    for source in &cat {
        let bounds = source.metadata().bounds.unwrap();
        assert!(bounds.intersects(&requested), "{} lies outside the search box", source.name());
    }

    let queries = mock::received_queries(&server, SEARCH_PATH).await;
    let get = |key: &str| {
        queries[0]
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    };

    let geom: Value = serde_json::from_str(&get("geom").unwrap()).unwrap();
    let corner = &geom["coordinates"][0][0];
    assert_eq!(corner[0].as_f64(), Some(-180.0));
    assert_eq!(corner[1].as_f64(), Some(50.0));
    assert_eq!(geom["coordinates"][0].as_array().map(Vec::len), Some(5));
    assert_eq!(get("startDateTime").as_deref(), Some("1617235200"));
    assert_eq!(get("endDateTime").as_deref(), Some("1617321600"));
}

#[tokio::test]
async fn test_results_limited_to_page_size() {
    let server = MockServer::start().await;
    let results = (0..5)
        .map(|i| fixtures::platform_result(&format!("p{}", i), "P", "http://files/x.csv.gz"))
        .collect();
    mock::mount_json(&server, SEARCH_PATH, fixtures::search_response(results)).await;

    let cat = open_axds_cat(config(&server, Datatype::Platform2).page_size(3))
        .await
        .unwrap();
    assert_eq!(cat.len(), 3);
    assert_eq!(cat.page_size(), 3);
}

#[tokio::test]
async fn test_duplicates_and_webcams_skipped() {
    let server = MockServer::start().await;
    let url = "http://files/x.csv.gz";
    let results = vec![
        fixtures::platform_result("p1", "P1", url),
        fixtures::webcam_result("cam"),
        fixtures::platform_result("p2", "P2", url),
        fixtures::platform_result("p1", "P1 again", url),
    ];
    mock::mount_json(&server, SEARCH_PATH, fixtures::search_response(results)).await;

    let cat = open_axds_cat(config(&server, Datatype::Platform2)).await.unwrap();
    assert_eq!(cat.names(), vec!["p1", "p2"]);
    assert_eq!(
        cat.get("p1").unwrap().metadata().title.as_deref(),
        Some("P1")
    );
}

#[tokio::test]
async fn test_sensor_station_metadata_sections() {
    let server = MockServer::start().await;
    let results = vec![
        fixtures::sensor_result("station-1", 106793, 2),
        fixtures::sensor_result("station-2", 2044, 1),
    ];
    mock::mount_json(&server, SEARCH_PATH, fixtures::search_response(results)).await;

    let cat = open_axds_cat(config(&server, Datatype::SensorStation)).await.unwrap();
    assert_eq!(cat.names(), vec!["station-1", "station-2"]);

    let metadata = cat.get("station-2").unwrap().metadata().clone();
    assert_eq!(metadata.variables, vec!["sea_water_temperature", "wind_speed"]);
    let bounds = metadata.bounds.unwrap();
    assert_coords_approx_eq!((bounds.min_lon, bounds.min_lat), (-123.711083, 38.914556), 1e-9);
    match metadata.details {
        DatatypeDetails::SensorStation {
            internal_id,
            version,
            ref metadata_url,
            ..
        } => {
            assert_eq!(internal_id, 2044);
            assert_eq!(version, 1);
            assert!(metadata_url.contains("2044"));
        }
        ref other => panic!("unexpected details {:?}", other),
    }
}

#[tokio::test]
async fn test_station_without_time_range_is_listed() {
    let server = MockServer::start().await;
    mock::mount_json(
        &server,
        SEARCH_PATH,
        fixtures::search_response(vec![fixtures::sensor_result_without_times("station-9", 9)]),
    )
    .await;

    let cat = open_axds_cat(config(&server, Datatype::SensorStation)).await.unwrap();
    assert_eq!(cat.len(), 1);
    assert_eq!(cat.names(), vec!["station-9"]);

    let err = cat.get("station-9").unwrap().read().await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert_eq!(request_count(&server, OBSERVATIONS_PATH).await, 0);
}

#[tokio::test]
async fn test_station_without_time_range_reads_with_catalog_window() {
    let server = MockServer::start().await;
    mock::mount_json(
        &server,
        SEARCH_PATH,
        fixtures::search_response(vec![fixtures::sensor_result_without_times("station-9", 9)]),
    )
    .await;
    mock::mount_json(&server, OBSERVATIONS_PATH, fixtures::observations_response()).await;

    let kwargs = SearchKwargs::default().time("2021-4-1", "2021-4-2");
    let cat = open_axds_cat(config(&server, Datatype::SensorStation).kwargs_search(kwargs))
        .await
        .unwrap();
    let output = cat.get("station-9").unwrap().read().await.unwrap();
    assert_eq!(output.as_table().unwrap().num_rows(), 3);
}

#[tokio::test]
async fn test_platform_without_csv_is_listed() {
    let server = MockServer::start().await;
    let results = vec![
        fixtures::platform_result_without_csv("buoy-1"),
        fixtures::platform_result("glider-a", "Glider A", "http://files/a.csv.gz"),
    ];
    mock::mount_json(&server, SEARCH_PATH, fixtures::search_response(results)).await;

    let cat = open_axds_cat(config(&server, Datatype::Platform2)).await.unwrap();
    assert_eq!(cat.names(), vec!["buoy-1", "glider-a"]);

    let source = cat.get("buoy-1").unwrap();
    assert_eq!(source.urlpath(), None);
    let err = source.read().await.unwrap_err();
    assert!(matches!(err, AxdsError::DataRead(ref msg) if msg.contains("buoy-1")));
}

#[tokio::test]
async fn test_docs_lookup_when_files_missing() {
    let server = MockServer::start().await;
    let csv_url = format!("{}/files/docs.csv.gz", server.uri());
    mock::mount_json(
        &server,
        SEARCH_PATH,
        fixtures::search_response(vec![fixtures::platform_result_without_files("m1")]),
    )
    .await;
    mock::mount_json_with_query(&server, DOCS_PATH, "id", "m1", fixtures::docs_response(&csv_url))
        .await;

    let cat = open_axds_cat(config(&server, Datatype::Platform2)).await.unwrap();
    assert_eq!(cat.get("m1").unwrap().urlpath(), Some(csv_url.as_str()));
}

// ============================================================================
// Catalog attributes
// ============================================================================

#[tokio::test]
async fn test_ttl_defaults_to_none() {
    let server = platform_server().await;
    let cat = open_axds_cat(config(&server, Datatype::Platform2)).await.unwrap();
    assert_eq!(cat.ttl(), None);
    assert!(!cat.is_stale());
}

#[tokio::test]
async fn test_ttl_is_reported() {
    let server = platform_server().await;
    let cat = open_axds_cat(
        config(&server, Datatype::Platform2).ttl(Some(Duration::from_secs(60))),
    )
    .await
    .unwrap();
    assert_eq!(cat.ttl(), Some(Duration::from_secs(60)));
    assert!(!cat.is_stale());
}

#[tokio::test]
async fn test_stale_catalog_reloads() {
    let server = platform_server().await;
    let mut cat = open_axds_cat(
        config(&server, Datatype::Platform2).ttl(Some(Duration::from_millis(1))),
    )
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(cat.is_stale());
    assert!(cat.refresh_if_stale().await.unwrap());
    assert_eq!(request_count(&server, SEARCH_PATH).await, 2);

    let source = cat.get_fresh("glider-a").await.unwrap();
    assert_eq!(source.name(), "glider-a");
}

#[tokio::test]
async fn test_name_description_metadata_overrides() {
    let server = platform_server().await;
    let mut metadata = Map::new();
    metadata.insert("project".to_string(), json!("arctic"));

    let cat = open_axds_cat(
        config(&server, Datatype::Platform2)
            .name("test_name")
            .description("test catalog")
            .metadata(metadata.clone()),
    )
    .await
    .unwrap();

    assert_eq!(cat.name(), "test_name");
    assert_eq!(cat.description(), "test catalog");
    assert_eq!(cat.metadata(), &metadata);
}

#[tokio::test]
async fn test_default_metadata() {
    let server = platform_server().await;
    let kwargs = SearchKwargs::default().search_for("glider");
    let cat = open_axds_cat(config(&server, Datatype::Platform2).kwargs_search(kwargs))
        .await
        .unwrap();

    assert_eq!(cat.name(), "catalog");
    assert_eq!(cat.description(), "Catalog of Axiom assets.");
    assert_eq!(cat.metadata()["kwargs_search"], json!({"search_for": "glider"}));
    assert_eq!(cat.metadata()["pglabels"], Value::Null);
}

// ============================================================================
// Errors
// ============================================================================

#[tokio::test]
async fn test_unknown_entry() {
    let server = platform_server().await;
    let cat = open_axds_cat(config(&server, Datatype::Platform2)).await.unwrap();
    let err = cat.get("nope").unwrap_err();
    assert!(matches!(err, AxdsError::EntryNotFound(ref name) if name == "nope"));
    assert_eq!(err.category(), ErrorCategory::Lookup);
}

#[tokio::test]
async fn test_search_without_results() {
    let server = MockServer::start().await;
    mock::mount_json(&server, SEARCH_PATH, json!({"error": "nothing"})).await;

    let err = open_axds_cat(config(&server, Datatype::Platform2))
        .await
        .unwrap_err();
    assert!(matches!(err, AxdsError::NoResults(ref url) if url.contains("/v2/search")));
    assert_eq!(err.category(), ErrorCategory::Remote);
}

#[tokio::test]
async fn test_search_http_error() {
    let server = MockServer::start().await;
    mock::mount_status(&server, SEARCH_PATH, 503).await;

    let err = open_axds_cat(config(&server, Datatype::Platform2))
        .await
        .unwrap_err();
    assert!(matches!(err, AxdsError::HttpStatus { status: 503, .. }));
}

#[tokio::test]
async fn test_invalid_config_makes_no_requests() {
    let server = MockServer::start().await;
    let kwargs = SearchKwargs {
        min_lon: Some(-180.0),
        ..Default::default()
    };
    let err = open_axds_cat(config(&server, Datatype::Platform2).kwargs_search(kwargs))
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

// ============================================================================
// Variable filtering
// ============================================================================

#[tokio::test]
async fn test_standard_names_search_by_group() {
    let server = platform_server().await;
    mock::mount_json(&server, CONTEXT_PATH, fixtures::parameter_context()).await;

    let cat = open_axds_cat(
        config(&server, Datatype::Platform2)
            .standard_names(vec!["sea_water_temperature".to_string()]),
    )
    .await
    .unwrap();

    assert_eq!(cat.pglabels(), Some(&["Water Temperature".to_string()][..]));
    let queries = mock::received_queries(&server, SEARCH_PATH).await;
    assert_eq!(queries.len(), 1);
    assert!(queries[0]
        .iter()
        .any(|(k, v)| k == "tag" && v == "Parameter Group:Water Temperature"));
}

#[tokio::test]
async fn test_keys_to_match_one_search_per_group() {
    let server = platform_server().await;
    mock::mount_json(&server, CONTEXT_PATH, fixtures::parameter_context()).await;

    let mut criteria = axds_catalog::Criteria::new();
    criteria.insert(
        "wind".to_string(),
        [("standard_name".to_string(), "^wind".to_string())]
            .into_iter()
            .collect(),
    );

    let cat = open_axds_cat(
        config(&server, Datatype::Platform2).keys_to_match(vec!["wind".to_string()], criteria),
    )
    .await
    .unwrap();

    assert_eq!(request_count(&server, SEARCH_PATH).await, 2);
    // the same two platforms come back for both groups
    assert_eq!(cat.len(), 2);
}

#[tokio::test]
async fn test_unknown_standard_name() {
    let server = MockServer::start().await;
    mock::mount_json(&server, CONTEXT_PATH, fixtures::parameter_context()).await;

    let err = open_axds_cat(
        config(&server, Datatype::Platform2).standard_names(vec!["not_a_name".to_string()]),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AxdsError::UnknownStandardNames(_)));
    assert_eq!(request_count(&server, SEARCH_PATH).await, 0);
}

// ============================================================================
// Reading
// ============================================================================

#[tokio::test]
async fn test_read_platform_dataframe() {
    let server = platform_server().await;
    let cat = open_axds_cat(config(&server, Datatype::Platform2)).await.unwrap();
    let source = cat.get("glider-a").unwrap();

    let output = source.read().await.unwrap();
    assert_eq!(output.container(), "dataframe");
    let table = output.as_table().unwrap();
    assert_eq!(table.index_names(), vec!["time", "z"]);
    assert_eq!(
        table.column_names(),
        vec!["latitude", "longitude", "temperature", "salinity"]
    );
    assert_eq!(table.shape(), (3, 4));

    let salinity = table.column("salinity").unwrap().data.as_floats().unwrap();
    assert_approx_eq!(salinity[0].unwrap(), 31.9, 1e-9);
    assert_eq!(salinity[2], None);
}

#[tokio::test]
async fn test_read_is_cached_until_close() {
    let server = platform_server().await;
    let cat = open_axds_cat(config(&server, Datatype::Platform2)).await.unwrap();
    let source = cat.get("glider-b").unwrap();

    let first = source.read().await.unwrap();
    let second = cat.get("glider-b").unwrap().read().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(request_count(&server, "/files/b.csv.gz").await, 1);
    assert!(source.is_loaded().await);

    source.close().await;
    assert!(!source.is_loaded().await);
    source.read().await.unwrap();
    assert_eq!(request_count(&server, "/files/b.csv.gz").await, 2);
}

#[tokio::test]
async fn test_read_platform_xarray() {
    let server = platform_server().await;
    let cat = open_axds_cat(config(&server, Datatype::Platform2).outtype(OutType::Xarray))
        .await
        .unwrap();
    assert_eq!(cat.outtype(), OutType::Xarray);

    let output = cat.get("glider-a").unwrap().read().await.unwrap();
    assert_eq!(output.container(), "xarray");
    let ds = output.as_dataset().unwrap();
    assert_eq!(ds.sizes(), vec![("time", 2), ("z", 2)]);
    assert_eq!(ds.attrs()["datasetID"], "glider-a");

    let temp = ds.variable("temperature").unwrap().data.as_float().unwrap();
    assert_eq!(temp.shape(), &[2, 2]);
    assert!(temp.iter().filter(|v| v.is_nan()).count() == 1);
}

#[tokio::test]
async fn test_read_sensor_station_with_qartod_filter() {
    let server = MockServer::start().await;
    mock::mount_json(
        &server,
        SEARCH_PATH,
        fixtures::search_response(vec![fixtures::sensor_result("station-1", 106793, 2)]),
    )
    .await;
    mock::mount_json(&server, OBSERVATIONS_PATH, fixtures::observations_response()).await;

    let cat = open_axds_cat(
        config(&server, Datatype::SensorStation).qartod(Qartod::Filter(vec![1])),
    )
    .await
    .unwrap();
    let source = cat.get("station-1").unwrap();
    assert_eq!(source.urlpath(), None);
    assert_eq!(
        source.description(),
        "AXDS dataset_id station-1 of datatype sensor_station"
    );

    let output = source.read().await.unwrap();
    let table = output.as_table().unwrap();
    assert_eq!(table.index_names(), vec!["time [UTC]"]);
    assert_eq!(
        table.column_names(),
        vec!["sea_water_temperature [degC]", "wind_speed [m.s-1]"]
    );
    assert_eq!(
        table
            .column("sea_water_temperature [degC]")
            .unwrap()
            .data
            .as_floats()
            .unwrap(),
        &[Some(10.5), None, None]
    );
    assert_eq!(
        table
            .column("wind_speed [m.s-1]")
            .unwrap()
            .data
            .as_floats()
            .unwrap(),
        &[Some(4.0), None, Some(5.5)]
    );

    // the entry's own time range was used
    let queries = mock::received_queries(&server, OBSERVATIONS_PATH).await;
    assert!(queries[0]
        .iter()
        .any(|(k, v)| k == "start" && v == "2021-04-01T00:00:00Z"));
}

#[tokio::test]
async fn test_read_sensor_station_flag_columns_without_units() {
    let server = MockServer::start().await;
    mock::mount_json(
        &server,
        SEARCH_PATH,
        fixtures::search_response(vec![fixtures::sensor_result("station-1", 106793, 2)]),
    )
    .await;
    mock::mount_json(&server, OBSERVATIONS_PATH, fixtures::observations_response()).await;

    let cat = open_axds_cat(
        config(&server, Datatype::SensorStation)
            .qartod(Qartod::Columns)
            .use_units(false),
    )
    .await
    .unwrap();

    let output = cat.get("station-1").unwrap().read().await.unwrap();
    assert_eq!(
        output.as_table().unwrap().column_names(),
        vec![
            "sea_water_temperature",
            "sea_water_temperature_qc_agg",
            "wind_speed",
            "wind_speed_qc_agg"
        ]
    );
}

#[tokio::test]
async fn test_sensor_station_without_data() {
    let server = MockServer::start().await;
    mock::mount_json(
        &server,
        SEARCH_PATH,
        fixtures::search_response(vec![fixtures::sensor_result("station-1", 106793, 2)]),
    )
    .await;
    mock::mount_json(&server, OBSERVATIONS_PATH, json!({"data": {"groupedFeeds": []}})).await;

    let cat = open_axds_cat(config(&server, Datatype::SensorStation)).await.unwrap();
    let err = cat.get("station-1").unwrap().read().await.unwrap_err();
    assert!(matches!(err, AxdsError::NoData(_)));
}
