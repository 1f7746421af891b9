//! Shared integration-test server bootstrap helpers.

#![allow(dead_code)]

use axum::http::{HeaderName, HeaderValue};
use axum_test::{TestRequest, TestServer};
use stashbin_server::{create_app, AppState, Config, Database};
use std::path::Path;
use tempfile::TempDir;

pub(crate) fn test_config_for_db_path(db_path: &Path) -> Config {
    Config {
        port: 0,
        db_path: db_path.to_str().expect("db path").to_string(),
        ..Config::default()
    }
}

pub(crate) fn test_server_for_config(config: Config) -> TestServer {
    let db = Database::new(config.db_path.as_str()).expect("open db");
    let state = AppState::new(config, db);
    TestServer::new(create_app(state)).expect("server")
}

pub(crate) fn setup_test_server() -> (TestServer, TempDir) {
    let temp_dir = TempDir::new().expect("temp dir");
    let config = test_config_for_db_path(&temp_dir.path().join("db"));
    (test_server_for_config(config), temp_dir)
}

pub(crate) fn setup_test_server_with(configure: impl FnOnce(&mut Config)) -> (TestServer, TempDir) {
    let temp_dir = TempDir::new().expect("temp dir");
    let mut config = test_config_for_db_path(&temp_dir.path().join("db"));
    configure(&mut config);
    (test_server_for_config(config), temp_dir)
}

/// Attribute a request to `ip` through `X-Forwarded-For`.
pub(crate) fn from_client(request: TestRequest, ip: &str) -> TestRequest {
    request.add_header(
        HeaderName::from_static("x-forwarded-for"),
        HeaderValue::from_str(ip).expect("header value"),
    )
}

/// Last path segment of an absolute or relative link.
pub(crate) fn last_segment(link: &str) -> String {
    link.rsplit('/').next().expect("segment").to_string()
}
