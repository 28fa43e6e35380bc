pub mod alerts;
pub mod downtime;
pub mod equipment;
pub mod hierarchy;
pub mod integrations;
pub mod pagination;
pub mod thresholds;

use crate::logging::TraceId;
use crate::service::Page;
use crate::state::AppState;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use prodgap_common::error::ParseEnumError;
use prodgap_common::CoreError;
use prodgap_storage::EquipmentFilter;
use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Error envelope.
#[derive(Serialize, ToSchema)]
pub struct ApiError {
    /// Non-zero error code
    pub err_code: i32,
    pub err_msg: String,
    /// Trace id of the request, also in the `X-Trace-Id` header
    pub trace_id: String,
}

/// Envelope wrapping every JSON response.
#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    /// 0 on success
    pub err_code: i32,
    pub err_msg: String,
    pub trace_id: String,
    pub data: Option<T>,
}

#[derive(Serialize)]
pub struct PaginatedData<T>
where
    T: Serialize,
{
    pub items: Vec<T>,
    pub total: u64,
    pub limit: usize,
    pub offset: usize,
}

pub fn success_response<T>(status: StatusCode, trace_id: &str, data: T) -> Response
where
    T: Serialize,
{
    (
        status,
        Json(ApiResponse {
            err_code: 0,
            err_msg: "success".to_string(),
            trace_id: trace_id.to_string(),
            data: Some(data),
        }),
    )
        .into_response()
}

pub fn success_empty_response(status: StatusCode, trace_id: &str, msg: &str) -> Response {
    (
        status,
        Json(ApiResponse::<Value> {
            err_code: 0,
            err_msg: msg.to_string(),
            trace_id: trace_id.to_string(),
            data: None,
        }),
    )
        .into_response()
}

pub fn success_page_response<T>(trace_id: &str, page: Page<T>) -> Response
where
    T: Serialize,
{
    success_response(
        StatusCode::OK,
        trace_id,
        PaginatedData {
            items: page.items,
            total: page.total,
            limit: page.limit,
            offset: page.offset,
        },
    )
}

fn to_custom_error_code(code: &str) -> i32 {
    match code {
        "bad_request" => 1001,
        "not_found" => 1004,
        "configuration_error" => 1006,
        "internal_error" => 1500,
        "storage_error" => 1501,
        "upstream_unavailable" => 1503,
        _ => 1999,
    }
}

pub fn error_response(status: StatusCode, trace_id: &str, code: &str, msg: &str) -> Response {
    (
        status,
        Json(ApiResponse::<Value> {
            err_code: to_custom_error_code(code),
            err_msg: msg.to_string(),
            trace_id: trace_id.to_string(),
            data: None,
        }),
    )
        .into_response()
}

/// Maps a service error onto the envelope.
///
/// Storage and configuration failures are logged and reported without
/// their details.
pub fn core_error_response(trace_id: &str, err: &CoreError) -> Response {
    match err {
        CoreError::NotFound { .. } => {
            error_response(StatusCode::NOT_FOUND, trace_id, "not_found", &err.to_string())
        }
        CoreError::Validation(msg) => {
            error_response(StatusCode::BAD_REQUEST, trace_id, "bad_request", msg)
        }
        CoreError::UpstreamUnavailable { .. } => {
            tracing::warn!(trace_id, error = %err, "Upstream system unavailable");
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                trace_id,
                "upstream_unavailable",
                &err.to_string(),
            )
        }
        CoreError::Configuration(_) => {
            tracing::error!(trace_id, error = %err, "Configuration error");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                trace_id,
                "configuration_error",
                "Server configuration error",
            )
        }
        CoreError::Storage(_) => {
            tracing::error!(trace_id, error = %err, "Storage error");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

/// Wraps a service result in the envelope.
pub fn respond<T>(trace_id: &str, result: prodgap_common::Result<T>) -> Response
where
    T: Serialize,
{
    match result {
        Ok(data) => success_response(StatusCode::OK, trace_id, data),
        Err(e) => core_error_response(trace_id, &e),
    }
}

/// Parses an optional enum-valued query parameter.
pub fn parse_opt<T>(value: Option<&str>) -> Result<Option<T>, CoreError>
where
    T: FromStr<Err = ParseEnumError>,
{
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => Ok(Some(v.parse::<T>()?)),
        None => Ok(None),
    }
}

#[derive(Serialize, ToSchema)]
struct HealthResponse {
    version: String,
    uptime_secs: i64,
    equipment_count: usize,
    connection_count: usize,
    threshold_count: usize,
    /// Names of the configured vendor adapters
    adapters: Vec<String>,
    /// `ok` or `error`
    storage_status: String,
}

/// Service health.
#[utoipa::path(
    get,
    path = "/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service health", body = HealthResponse)
    )
)]
async fn health(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let uptime = (Utc::now() - state.start_time).num_seconds();
    let stats = state.service.stats();
    let storage_status = match state
        .service
        .store()
        .count_equipment(&EquipmentFilter::default())
    {
        Ok(_) => "ok",
        Err(e) => {
            tracing::error!(error = %e, "Storage health check failed");
            "error"
        }
    };
    success_response(
        StatusCode::OK,
        &trace_id,
        HealthResponse {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: uptime,
            equipment_count: stats.equipment,
            connection_count: stats.connections,
            threshold_count: stats.thresholds,
            adapters: state.adapters.configured(),
            storage_status: storage_status.to_string(),
        },
    )
}

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(health))
        .merge(hierarchy::hierarchy_routes())
        .merge(equipment::equipment_routes())
        .merge(alerts::alert_routes())
        .merge(downtime::downtime_routes())
        .merge(thresholds::threshold_routes())
        .merge(integrations::integration_routes())
}
