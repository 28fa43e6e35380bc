//! Read-through endpoints backed by the vendor adapters.
//!
//! Everything except recorded historian values degrades instead of failing:
//! when the adapter is missing or the upstream call fails, the handler answers
//! 200 with `degraded: true`, the reason, and an empty payload.

use crate::api::{core_error_response, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use prodgap_adapters::error::AdapterError;
use prodgap_common::types::NetworkType;
use prodgap_common::CoreError;
use serde::{Deserialize, Serialize};
use utoipa_axum::{router::OpenApiRouter, routes};

const DEFAULT_WINDOW: &str = "7d";

/// Payload from an external system, flagged when it could not be served.
#[derive(Debug, Serialize)]
pub struct Sourced<T: Serialize> {
    /// Adapter that produced the data
    pub source: Option<String>,
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub data: T,
}

fn sourced<T>(trace_id: &str, source: Option<&str>, result: Result<T, AdapterError>) -> Response
where
    T: Serialize + Default,
{
    let body = match result {
        Ok(data) => Sourced {
            source: source.map(str::to_string),
            degraded: false,
            reason: None,
            data,
        },
        Err(e) => {
            tracing::warn!(trace_id, system = e.system(), error = %e, "Serving degraded payload");
            Sourced {
                source: source.map(str::to_string),
                degraded: true,
                reason: Some(e.to_string()),
                data: T::default(),
            }
        }
    };
    success_response(StatusCode::OK, trace_id, body)
}

/// Accepts `<n>h` or `<n>d` with a positive `n`.
fn validate_window(window: &str) -> Result<(), CoreError> {
    let valid = window
        .strip_suffix('h')
        .or_else(|| window.strip_suffix('d'))
        .and_then(|n| n.parse::<u32>().ok())
        .is_some_and(|n| n > 0);
    if valid {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "window must look like 24h or 7d (got {window})"
        )))
    }
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ---- Production data ----

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct FacilityKpiParams {
    /// Comma-separated networks (default: all)
    #[param(required = false)]
    networks: Option<String>,
}

/// Capacity, target, production and deferment per network.
#[utoipa::path(
    get,
    path = "/v1/facilities/{id}/kpis",
    tag = "Integrations",
    params(("id" = String, Path, description = "Facility id"), FacilityKpiParams),
    responses(
        (status = 200, description = "Facility KPIs, possibly degraded"),
        (status = 400, description = "Unknown network", body = crate::api::ApiError)
    )
)]
async fn facility_kpis(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<FacilityKpiParams>,
) -> impl IntoResponse {
    let networks = match split_list(params.networks.as_deref())
        .iter()
        .map(|n| n.parse::<NetworkType>())
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(n) if n.is_empty() => NetworkType::ALL.to_vec(),
        Ok(n) => n,
        Err(e) => return core_error_response(&trace_id, &e.into()),
    };
    let (source, result) = match state.adapters.production() {
        Ok(adapter) => (
            Some(adapter.name()),
            adapter.facility_kpis(&id, &networks).await,
        ),
        Err(e) => (None, Err(e)),
    };
    sourced(&trace_id, source, result)
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct GapDriverParams {
    #[param(required = false)]
    asset_id: Option<String>,
    /// Comma-separated facility ids
    #[param(required = false)]
    facility_ids: Option<String>,
    /// `24h`, `7d`, ... (default 7d)
    #[param(required = false)]
    window: Option<String>,
}

/// Largest contributors to deferred production.
#[utoipa::path(
    get,
    path = "/v1/gap-drivers",
    tag = "Integrations",
    params(GapDriverParams),
    responses(
        (status = 200, description = "Gap drivers, possibly degraded"),
        (status = 400, description = "Invalid window", body = crate::api::ApiError)
    )
)]
async fn gap_drivers(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<GapDriverParams>,
) -> impl IntoResponse {
    let window = params.window.as_deref().unwrap_or(DEFAULT_WINDOW);
    if let Err(e) = validate_window(window) {
        return core_error_response(&trace_id, &e);
    }
    let facility_ids = split_list(params.facility_ids.as_deref());
    let (source, result) = match state.adapters.production() {
        Ok(adapter) => (
            Some(adapter.name()),
            adapter
                .gap_drivers(params.asset_id.as_deref(), &facility_ids, window)
                .await,
        ),
        Err(e) => (None, Err(e)),
    };
    sourced(&trace_id, source, result)
}

/// Stock, production rate and endurance of a crude terminal.
#[utoipa::path(
    get,
    path = "/v1/terminals/{id}/operations",
    tag = "Integrations",
    params(("id" = String, Path, description = "Terminal facility id")),
    responses(
        (status = 200, description = "Terminal KPIs, possibly degraded")
    )
)]
async fn terminal_operations(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (source, result) = match state.adapters.production() {
        Ok(adapter) => (Some(adapter.name()), adapter.terminal_kpis(&id).await),
        Err(e) => (None, Err(e)),
    };
    sourced(&trace_id, source, result)
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct WindowParams {
    /// `24h`, `7d`, ... (default 7d)
    #[param(required = false)]
    window: Option<String>,
}

/// Hub production against target over time.
#[utoipa::path(
    get,
    path = "/v1/hubs/{id}/performance",
    tag = "Integrations",
    params(("id" = String, Path, description = "Hub id"), WindowParams),
    responses(
        (status = 200, description = "Hub performance series, possibly degraded"),
        (status = 400, description = "Invalid window", body = crate::api::ApiError)
    )
)]
async fn hub_performance(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<WindowParams>,
) -> impl IntoResponse {
    let window = params.window.as_deref().unwrap_or(DEFAULT_WINDOW);
    if let Err(e) = validate_window(window) {
        return core_error_response(&trace_id, &e);
    }
    let (source, result) = match state.adapters.production() {
        Ok(adapter) => (
            Some(adapter.name()),
            adapter.hub_performance(&id, window).await,
        ),
        Err(e) => (None, Err(e)),
    };
    sourced(&trace_id, source, result)
}

// ---- Historian ----

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct CurrentValuesParams {
    /// Comma-separated stream ids
    stream_ids: Option<String>,
}

/// Latest value of each stream.
#[utoipa::path(
    get,
    path = "/v1/historian/current",
    tag = "Integrations",
    params(CurrentValuesParams),
    responses(
        (status = 200, description = "Values keyed by stream id, possibly degraded"),
        (status = 400, description = "No stream ids", body = crate::api::ApiError)
    )
)]
async fn current_values(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<CurrentValuesParams>,
) -> impl IntoResponse {
    let stream_ids = split_list(params.stream_ids.as_deref());
    if stream_ids.is_empty() {
        return core_error_response(
            &trace_id,
            &CoreError::validation("stream_ids must name at least one stream"),
        );
    }
    let (source, result) = match state.adapters.historian() {
        Ok(adapter) => (
            Some(adapter.name()),
            adapter.current_values(&stream_ids).await,
        ),
        Err(e) => (None, Err(e)),
    };
    sourced(&trace_id, source, result)
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct RecordedParams {
    /// Historian time expression (default `*-1d`)
    #[param(required = false)]
    start: Option<String>,
    /// Historian time expression (default `*`)
    #[param(required = false)]
    end: Option<String>,
}

/// Archived values of a stream. Fails with 503 when the historian cannot
/// serve them.
#[utoipa::path(
    get,
    path = "/v1/historian/streams/{id}/recorded",
    tag = "Integrations",
    params(("id" = String, Path, description = "Stream id"), RecordedParams),
    responses(
        (status = 200, description = "Recorded values"),
        (status = 503, description = "Historian unavailable", body = crate::api::ApiError)
    )
)]
async fn recorded_values(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<RecordedParams>,
) -> impl IntoResponse {
    let start = params.start.as_deref().unwrap_or("*-1d");
    let end = params.end.as_deref().unwrap_or("*");
    let result = match state.adapters.historian() {
        Ok(adapter) => adapter.recorded_values(&id, start, end).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(values) => success_response(StatusCode::OK, &trace_id, values),
        Err(e) => core_error_response(&trace_id, &e.into()),
    }
}

pub fn integration_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(facility_kpis))
        .routes(routes!(gap_drivers))
        .routes(routes!(terminal_operations))
        .routes(routes!(hub_performance))
        .routes(routes!(current_values))
        .routes(routes!(recorded_values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_need_a_positive_count_and_unit() {
        assert!(validate_window("24h").is_ok());
        assert!(validate_window("7d").is_ok());
        assert!(validate_window("0d").is_err());
        assert!(validate_window("7w").is_err());
        assert!(validate_window("d").is_err());
    }

    #[test]
    fn lists_drop_blank_entries() {
        assert_eq!(split_list(Some(" a, ,b ")), vec!["a", "b"]);
        assert!(split_list(None).is_empty());
    }
}
