//! wiremock helpers for the AXDS services.
//!
//! Services are mounted under one server with the layout expected by
//! `Endpoints::single_host`: search at `/v2`, sensor API at `/api`, the
//! parameter context at `/rest/context`.

use serde_json::Value;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SEARCH_PATH: &str = "/v2/search";
pub const DOCS_PATH: &str = "/v2/docs";
pub const CONTEXT_PATH: &str = "/rest/context";
pub const OBSERVATIONS_PATH: &str = "/api/observations/filter/custom";

/// Serve `body` as JSON for GET `route`.
pub async fn mount_json(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Serve `body` as JSON for GET `route` when query `key` equals `value`.
pub async fn mount_json_with_query(
    server: &MockServer,
    route: &str,
    key: &str,
    value: &str,
    body: Value,
) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(query_param(key, value))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Serve raw bytes for GET `route`.
pub async fn mount_bytes(server: &MockServer, route: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

/// Answer GET `route` with a bare status code.
pub async fn mount_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Query parameters of every request received for `route`.
pub async fn received_queries(server: &MockServer, route: &str) -> Vec<Vec<(String, String)>> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == route)
        .map(|r| r.url.query_pairs().into_owned().collect())
        .collect()
}
