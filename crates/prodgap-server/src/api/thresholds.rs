use crate::api::pagination::{deserialize_optional_bool, deserialize_optional_i64, resolve_page};
use crate::api::{
    core_error_response, parse_opt, respond, success_empty_response, success_page_response,
    success_response,
};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use prodgap_common::id::threshold_id;
use prodgap_common::types::{KpiThreshold, Severity, ThresholdScope};
use prodgap_common::{CoreError, Result};
use prodgap_storage::ThresholdFilter;
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct ListThresholdsParams {
    #[param(required = false)]
    equipment_id: Option<String>,
    #[param(required = false)]
    facility_id: Option<String>,
    #[param(required = false)]
    kpi_name: Option<String>,
    /// Defaults to true; active listings only show thresholds in effect now
    #[param(required = false, value_type = Option<bool>)]
    #[serde(default, deserialize_with = "deserialize_optional_bool")]
    is_active: Option<bool>,
    #[param(required = false, value_type = Option<i64>)]
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    limit: Option<i64>,
    #[param(required = false, value_type = Option<i64>)]
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    offset: Option<i64>,
}

/// Configured KPI thresholds.
#[utoipa::path(
    get,
    path = "/v1/thresholds",
    tag = "Thresholds",
    params(ListThresholdsParams),
    responses(
        (status = 200, description = "Threshold page"),
        (status = 400, description = "Negative limit or offset", body = crate::api::ApiError)
    )
)]
async fn list_thresholds(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<ListThresholdsParams>,
) -> impl IntoResponse {
    let is_active = params.is_active.unwrap_or(true);
    let filter = ThresholdFilter {
        equipment_id: params.equipment_id,
        facility_id: params.facility_id,
        kpi_name: params.kpi_name,
        is_active: Some(is_active),
        effective_at: is_active.then(Utc::now),
    };
    let result = resolve_page(params.limit, params.offset)
        .and_then(|(limit, offset)| state.service.list_thresholds(&filter, limit, offset));
    match result {
        Ok(page) => success_page_response(&trace_id, page),
        Err(e) => core_error_response(&trace_id, &e),
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateThresholdRequest {
    /// Generated when omitted
    pub id: Option<String>,
    pub threshold_name: String,
    /// Exactly one of `equipment_id`, `facility_id` and `well_id`
    pub equipment_id: Option<String>,
    pub facility_id: Option<String>,
    pub well_id: Option<String>,
    pub kpi_name: String,
    pub kpi_description: Option<String>,
    pub measurement_unit: Option<String>,
    pub upper_limit: Option<f64>,
    pub lower_limit: Option<f64>,
    pub target_value: Option<f64>,
    /// info, warning (default), critical, emergency
    pub alert_severity: Option<String>,
    pub hysteresis_percentage: Option<f64>,
    pub minimum_duration_minutes: Option<i64>,
    pub is_active: Option<bool>,
    /// Defaults to now
    pub effective_from: Option<DateTime<Utc>>,
    pub effective_to: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub approved_by: Option<String>,
    pub comments: Option<String>,
}

impl CreateThresholdRequest {
    fn into_threshold(self) -> Result<KpiThreshold> {
        let scope = match (self.equipment_id, self.facility_id, self.well_id) {
            (Some(id), None, None) => ThresholdScope::Equipment(id),
            (None, Some(id), None) => ThresholdScope::Facility(id),
            (None, None, Some(id)) => ThresholdScope::Well(id),
            _ => {
                return Err(CoreError::validation(
                    "exactly one of equipment_id, facility_id or well_id is required",
                ))
            }
        };
        let now = Utc::now();
        Ok(KpiThreshold {
            id: self
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(threshold_id),
            threshold_name: self.threshold_name,
            scope,
            kpi_name: self.kpi_name,
            kpi_description: self.kpi_description,
            measurement_unit: self.measurement_unit,
            upper_limit: self.upper_limit,
            lower_limit: self.lower_limit,
            target_value: self.target_value,
            alert_severity: parse_opt(self.alert_severity.as_deref())?
                .unwrap_or(Severity::Warning),
            hysteresis_percentage: self.hysteresis_percentage,
            minimum_duration_minutes: self.minimum_duration_minutes,
            is_active: self.is_active.unwrap_or(true),
            effective_from: self.effective_from.unwrap_or(now),
            effective_to: self.effective_to,
            created_by: self.created_by,
            approved_by: self.approved_by,
            comments: self.comments,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Create a threshold for an existing equipment, facility or well; it is
/// evaluated from the next reading on.
#[utoipa::path(
    post,
    path = "/v1/thresholds",
    tag = "Thresholds",
    request_body = CreateThresholdRequest,
    responses(
        (status = 201, description = "Threshold created"),
        (status = 400, description = "Invalid threshold or id already taken", body = crate::api::ApiError),
        (status = 404, description = "Scoped entity not found", body = crate::api::ApiError)
    )
)]
async fn create_threshold(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<CreateThresholdRequest>,
) -> impl IntoResponse {
    let result = req
        .into_threshold()
        .and_then(|threshold| state.service.create_threshold(threshold));
    match result {
        Ok(threshold) => success_response(StatusCode::CREATED, &trace_id, threshold),
        Err(e) => core_error_response(&trace_id, &e),
    }
}

#[utoipa::path(
    get,
    path = "/v1/thresholds/{id}",
    tag = "Thresholds",
    params(("id" = String, Path, description = "Threshold id")),
    responses(
        (status = 200, description = "Threshold"),
        (status = 404, description = "Threshold not found", body = crate::api::ApiError)
    )
)]
async fn get_threshold(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    respond(&trace_id, state.service.threshold(&id))
}

/// Delete a threshold and stop evaluating it.
#[utoipa::path(
    delete,
    path = "/v1/thresholds/{id}",
    tag = "Thresholds",
    params(("id" = String, Path, description = "Threshold id")),
    responses(
        (status = 200, description = "Threshold deleted"),
        (status = 404, description = "Threshold not found", body = crate::api::ApiError)
    )
)]
async fn delete_threshold(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.service.delete_threshold(&id) {
        Ok(()) => success_empty_response(StatusCode::OK, &trace_id, "Threshold deleted"),
        Err(e) => core_error_response(&trace_id, &e),
    }
}

pub fn threshold_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_thresholds, create_threshold))
        .routes(routes!(get_threshold, delete_threshold))
}
