#![allow(dead_code)]

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use prodgap_adapters::AdaptersConfig;
use prodgap_server::app;
use prodgap_server::config::ServerConfig;
use prodgap_server::service::ProductionService;
use prodgap_server::state::AppState;
use prodgap_storage::ProductionStore;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub struct TestContext {
    pub temp_dir: TempDir,
    pub state: AppState,
    pub app: axum::Router,
}

pub fn build_test_context() -> Result<TestContext> {
    build_test_context_with(AdaptersConfig::default())
}

pub fn build_test_context_with(adapters: AdaptersConfig) -> Result<TestContext> {
    prodgap_common::id::init(1, 1);

    let temp_dir = tempfile::tempdir()?;
    let config = ServerConfig {
        data_dir: temp_dir.path().to_string_lossy().to_string(),
        adapters,
        ..ServerConfig::default()
    };

    let store = Arc::new(ProductionStore::new(temp_dir.path())?);
    let service = Arc::new(ProductionService::open(store, &config)?);
    let adapters = prodgap_adapters::build_adapters(&config.adapters)?;

    let state = AppState {
        service,
        adapters,
        start_time: Utc::now(),
        config: Arc::new(config),
    };

    let app = app::build_http_app(state.clone());

    Ok(TestContext {
        temp_dir,
        state,
        app,
    })
}

async fn send(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value, Option<String>) {
    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");

    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json, trace_id)
}

pub async fn request_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value, Option<String>) {
    let req_body = body.unwrap_or(Value::Null).to_string();
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(req_body))
        .expect("request should build");
    send(app, req).await
}

pub async fn request_no_body(
    app: &axum::Router,
    method: &str,
    uri: &str,
) -> (StatusCode, Value, Option<String>) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    send(app, req).await
}

pub fn assert_ok_envelope(json: &Value) {
    assert_eq!(json["err_code"], 0);
    assert!(json["err_msg"].is_string());
    assert!(json.get("trace_id").is_some());
}

pub fn assert_err_envelope(json: &Value, err_code: i32) {
    assert_eq!(json["err_code"], err_code);
    assert!(json["err_msg"].is_string());
    assert!(json.get("trace_id").is_some());
    assert!(json.get("data").is_some());
    assert!(json["data"].is_null());
}

pub fn decode_data<T: DeserializeOwned>(json: &Value) -> T {
    serde_json::from_value(json["data"].clone()).expect("data should decode")
}

pub async fn create_equipment(app: &axum::Router, id: &str, equipment_type: &str) {
    let (status, body, _) = request_json(
        app,
        "POST",
        "/v1/equipment",
        Some(json!({
            "id": id,
            "name": format!("{id} unit"),
            "equipment_type": equipment_type,
            "facility_id": "F1"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create {id}: {body}");
}

pub async fn connect(app: &axum::Router, id: &str, source: &str, target: &str, network: &str) {
    let (status, body, _) = request_json(
        app,
        "POST",
        "/v1/connections",
        Some(json!({
            "id": id,
            "source_equipment_id": source,
            "target_equipment_id": target,
            "network_type": network
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "connect {id}: {body}");
}

/// Diamond A -> B, A -> C, B -> D, C -> D on the oil network.
pub async fn build_diamond(app: &axum::Router) {
    create_equipment(app, "A", "manifold").await;
    create_equipment(app, "B", "separator").await;
    create_equipment(app, "C", "separator").await;
    create_equipment(app, "D", "pump").await;
    connect(app, "AB", "A", "B", "oil").await;
    connect(app, "AC", "A", "C", "oil").await;
    connect(app, "BD", "B", "D", "oil").await;
    connect(app, "CD", "C", "D", "oil").await;
}

/// Every equipment id in a serialized path tree, depth first.
pub fn path_ids(nodes: &Value) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(nodes) = nodes.as_array() {
        for node in nodes {
            out.push(node["equipment_id"].as_str().unwrap_or_default().to_string());
            let children = if node.get("downstream").is_some() {
                &node["downstream"]
            } else {
                &node["upstream"]
            };
            out.extend(path_ids(children));
        }
    }
    out
}
