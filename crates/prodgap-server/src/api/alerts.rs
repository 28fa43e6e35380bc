use crate::api::pagination::{deserialize_optional_bool, deserialize_optional_i64, resolve_page};
use crate::api::{core_error_response, parse_opt, respond, success_page_response};
use crate::logging::TraceId;
use crate::service::KpiReading;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use prodgap_common::Result;
use prodgap_storage::AlertFilter;
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

const DEFAULT_HOURS_BACK: i64 = 24;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct ListAlertsParams {
    /// new, acknowledged, investigating, resolved, closed, false_alarm
    #[param(required = false)]
    status: Option<String>,
    /// info, warning, critical, emergency
    #[param(required = false)]
    severity: Option<String>,
    #[param(required = false)]
    alert_type: Option<String>,
    #[param(required = false)]
    facility_id: Option<String>,
    #[param(required = false)]
    equipment_id: Option<String>,
    #[param(required = false, value_type = Option<bool>)]
    #[serde(default, deserialize_with = "deserialize_optional_bool")]
    safety_critical: Option<bool>,
    /// Look-back window in hours (default 24)
    #[param(required = false, value_type = Option<i64>)]
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    hours_back: Option<i64>,
    #[param(required = false, value_type = Option<i64>)]
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    limit: Option<i64>,
    #[param(required = false, value_type = Option<i64>)]
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    offset: Option<i64>,
}

impl ListAlertsParams {
    fn filter(&self) -> Result<AlertFilter> {
        Ok(AlertFilter {
            status: parse_opt(self.status.as_deref())?,
            severity: parse_opt(self.severity.as_deref())?,
            alert_type: parse_opt(self.alert_type.as_deref())?,
            facility_id: self.facility_id.clone(),
            equipment_id: self.equipment_id.clone(),
            safety_critical: self.safety_critical,
            since: None,
        })
    }
}

/// Alerts raised in the look-back window.
/// Ordered by priority, then timestamp, newest first.
#[utoipa::path(
    get,
    path = "/v1/alerts",
    tag = "Alerts",
    params(ListAlertsParams),
    responses(
        (status = 200, description = "Alert page"),
        (status = 400, description = "Unknown filter value or negative paging", body = crate::api::ApiError)
    )
)]
async fn list_alerts(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<ListAlertsParams>,
) -> impl IntoResponse {
    let hours_back = params.hours_back.unwrap_or(DEFAULT_HOURS_BACK);
    let result = resolve_page(params.limit, params.offset).and_then(|(limit, offset)| {
        let filter = params.filter()?;
        state.service.list_alerts(filter, hours_back, limit, offset)
    });
    match result {
        Ok(page) => success_page_response(&trace_id, page),
        Err(e) => core_error_response(&trace_id, &e),
    }
}

/// Alert with the threshold that raised it.
#[utoipa::path(
    get,
    path = "/v1/alerts/{id}",
    tag = "Alerts",
    params(("id" = String, Path, description = "Alert id")),
    responses(
        (status = 200, description = "Alert detail"),
        (status = 404, description = "Alert not found", body = crate::api::ApiError)
    )
)]
async fn get_alert(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    respond(&trace_id, state.service.alert_detail(&id))
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AcknowledgeRequest {
    pub acknowledged_by: Option<String>,
}

/// Acknowledge a new alert. Alerts in any other status are returned as is.
#[utoipa::path(
    post,
    path = "/v1/alerts/{id}/acknowledge",
    tag = "Alerts",
    params(("id" = String, Path, description = "Alert id")),
    request_body = AcknowledgeRequest,
    responses(
        (status = 200, description = "The alert; unchanged unless it was new"),
        (status = 404, description = "Alert not found", body = crate::api::ApiError)
    )
)]
async fn acknowledge_alert(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AcknowledgeRequest>,
) -> impl IntoResponse {
    respond(
        &trace_id,
        state
            .service
            .acknowledge_alert(&id, req.acknowledged_by.as_deref()),
    )
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ResolveRequest {
    pub resolved_by: Option<String>,
    pub resolution_notes: Option<String>,
}

/// Resolve an open alert.
#[utoipa::path(
    post,
    path = "/v1/alerts/{id}/resolve",
    tag = "Alerts",
    params(("id" = String, Path, description = "Alert id")),
    request_body = ResolveRequest,
    responses(
        (status = 200, description = "The alert; unchanged if it was already closed"),
        (status = 404, description = "Alert not found", body = crate::api::ApiError)
    )
)]
async fn resolve_alert(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ResolveRequest>,
) -> impl IntoResponse {
    respond(
        &trace_id,
        state.service.resolve_alert(
            &id,
            req.resolved_by.as_deref(),
            req.resolution_notes.as_deref(),
        ),
    )
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct DashboardParams {
    /// Look-back window in hours (default 24)
    #[param(required = false, value_type = Option<i64>)]
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    hours_back: Option<i64>,
}

/// Severity and status distributions, top offenders and production impact.
#[utoipa::path(
    get,
    path = "/v1/alerts/summary/dashboard",
    tag = "Alerts",
    params(DashboardParams),
    responses(
        (status = 200, description = "Alert dashboard"),
        (status = 400, description = "Invalid look-back window", body = crate::api::ApiError)
    )
)]
async fn alert_dashboard(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> impl IntoResponse {
    respond(
        &trace_id,
        state
            .service
            .alert_dashboard(params.hours_back.unwrap_or(DEFAULT_HOURS_BACK)),
    )
}

// ---- Evaluation ----

/// Evaluate one KPI reading against every matching threshold.
///
/// Works for equipment, facility and well thresholds alike; the reading is
/// not stored as a sample.
#[utoipa::path(
    post,
    path = "/v1/evaluations",
    tag = "Alerts",
    request_body = KpiReading,
    responses(
        (status = 200, description = "Alert transitions and skipped thresholds"),
        (status = 400, description = "Non-finite value", body = crate::api::ApiError)
    )
)]
async fn evaluate(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(reading): Json<KpiReading>,
) -> impl IntoResponse {
    respond(
        &trace_id,
        state.service.evaluate(
            &reading.entity_id,
            &reading.kpi_name,
            reading.value,
            reading.timestamp,
        ),
    )
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BatchEvaluationRequest {
    pub readings: Vec<KpiReading>,
}

/// Evaluate many readings, entities in parallel.
///
/// Readings of one entity are applied in timestamp order. A failure stops
/// that entity only and is reported in its result.
#[utoipa::path(
    post,
    path = "/v1/evaluations/batch",
    tag = "Alerts",
    request_body = BatchEvaluationRequest,
    responses(
        (status = 200, description = "One result per entity")
    )
)]
async fn evaluate_batch(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<BatchEvaluationRequest>,
) -> impl IntoResponse {
    let results = state.service.evaluate_batch(req.readings).await;
    respond(&trace_id, Ok(results))
}

pub fn alert_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_alerts))
        .routes(routes!(alert_dashboard))
        .routes(routes!(get_alert))
        .routes(routes!(acknowledge_alert))
        .routes(routes!(resolve_alert))
        .routes(routes!(evaluate))
        .routes(routes!(evaluate_batch))
}
