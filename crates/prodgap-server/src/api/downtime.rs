use crate::api::pagination::{deserialize_optional_bool, deserialize_optional_i64, resolve_page};
use crate::api::{core_error_response, parse_opt, respond, success_page_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::response::IntoResponse;
use prodgap_storage::DowntimeFilter;
use serde::Deserialize;
use utoipa_axum::{router::OpenApiRouter, routes};

const DEFAULT_DAYS_BACK: i64 = 7;
const DEFAULT_LIMIT: i64 = 50;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct ListDowntimeParams {
    #[param(required = false)]
    equipment_id: Option<String>,
    #[param(required = false, value_type = Option<bool>)]
    #[serde(default, deserialize_with = "deserialize_optional_bool")]
    planned: Option<bool>,
    /// planned_maintenance, unplanned_trip, equipment_failure, ...
    #[param(required = false)]
    downtime_reason: Option<String>,
    /// Look-back window in days (default 7)
    #[param(required = false, value_type = Option<i64>)]
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    days_back: Option<i64>,
    /// Page size (default 50, max 1000)
    #[param(required = false, value_type = Option<i64>)]
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    limit: Option<i64>,
    #[param(required = false, value_type = Option<i64>)]
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    offset: Option<i64>,
}

/// Downtime events started in the look-back window, newest first.
#[utoipa::path(
    get,
    path = "/v1/downtime/events",
    tag = "Downtime",
    params(ListDowntimeParams),
    responses(
        (status = 200, description = "Downtime event page"),
        (status = 400, description = "Unknown reason, invalid window or negative paging", body = crate::api::ApiError)
    )
)]
async fn list_downtime_events(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<ListDowntimeParams>,
) -> impl IntoResponse {
    let days_back = params.days_back.unwrap_or(DEFAULT_DAYS_BACK);
    let page = resolve_page(Some(params.limit.unwrap_or(DEFAULT_LIMIT)), params.offset);
    let result = page.and_then(|(limit, offset)| {
        let downtime_reason = parse_opt(params.downtime_reason.as_deref())?;
        let filter = DowntimeFilter {
            equipment_id: params.equipment_id,
            planned: params.planned,
            downtime_reason,
            since: None,
        };
        state
            .service
            .list_downtime_events(filter, days_back, limit, offset)
    });
    match result {
        Ok(page) => success_page_response(&trace_id, page),
        Err(e) => core_error_response(&trace_id, &e),
    }
}

/// Downtime event with its root-cause analysis.
#[utoipa::path(
    get,
    path = "/v1/downtime/events/{id}",
    tag = "Downtime",
    params(("id" = String, Path, description = "Downtime event id")),
    responses(
        (status = 200, description = "Downtime event"),
        (status = 404, description = "Event not found", body = crate::api::ApiError)
    )
)]
async fn get_downtime_event(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    respond(&trace_id, state.service.downtime_event(&id))
}

pub fn downtime_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_downtime_events))
        .routes(routes!(get_downtime_event))
}
