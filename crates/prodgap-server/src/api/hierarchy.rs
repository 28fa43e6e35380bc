use crate::api::pagination::deserialize_optional_bool;
use crate::api::{core_error_response, parse_opt, respond};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::response::IntoResponse;
use prodgap_storage::EquipmentFilter;
use serde::Deserialize;
use utoipa_axum::{router::OpenApiRouter, routes};

/// List assets.
#[utoipa::path(
    get,
    path = "/v1/assets",
    tag = "Hierarchy",
    responses(
        (status = 200, description = "All assets ordered by name"),
        (status = 500, description = "Storage error", body = crate::api::ApiError)
    )
)]
async fn list_assets(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    respond(&trace_id, state.service.assets())
}

/// Hubs belonging to an asset.
#[utoipa::path(
    get,
    path = "/v1/assets/{id}/hubs",
    tag = "Hierarchy",
    params(("id" = String, Path, description = "Asset id")),
    responses(
        (status = 200, description = "Hubs of the asset"),
        (status = 500, description = "Storage error", body = crate::api::ApiError)
    )
)]
async fn list_hubs(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    respond(&trace_id, state.service.hubs(&id))
}

/// Facilities belonging to a hub.
#[utoipa::path(
    get,
    path = "/v1/hubs/{id}/facilities",
    tag = "Hierarchy",
    params(("id" = String, Path, description = "Hub id")),
    responses(
        (status = 200, description = "Facilities of the hub"),
        (status = 500, description = "Storage error", body = crate::api::ApiError)
    )
)]
async fn list_facilities(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    respond(&trace_id, state.service.facilities(&id))
}

/// Wells producing into a facility.
#[utoipa::path(
    get,
    path = "/v1/facilities/{id}/wells",
    tag = "Hierarchy",
    params(("id" = String, Path, description = "Facility id")),
    responses(
        (status = 200, description = "Wells of the facility"),
        (status = 500, description = "Storage error", body = crate::api::ApiError)
    )
)]
async fn list_wells(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    respond(&trace_id, state.service.wells(&id))
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct FacilityEquipmentParams {
    /// flowline, manifold, separator, pump, compressor, ...
    #[param(required = false)]
    equipment_type: Option<String>,
    /// online, offline, maintenance, fault, standby
    #[param(required = false)]
    status: Option<String>,
    #[param(required = false, value_type = Option<bool>)]
    #[serde(default, deserialize_with = "deserialize_optional_bool")]
    is_critical: Option<bool>,
}

/// All equipment installed at a facility.
#[utoipa::path(
    get,
    path = "/v1/facilities/{id}/equipment",
    tag = "Hierarchy",
    params(("id" = String, Path, description = "Facility id"), FacilityEquipmentParams),
    responses(
        (status = 200, description = "Equipment of the facility"),
        (status = 400, description = "Unknown equipment type or status", body = crate::api::ApiError)
    )
)]
async fn facility_equipment(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<FacilityEquipmentParams>,
) -> impl IntoResponse {
    let filter = match (
        parse_opt(params.equipment_type.as_deref()),
        parse_opt(params.status.as_deref()),
    ) {
        (Ok(equipment_type), Ok(status)) => EquipmentFilter {
            equipment_type,
            status,
            facility_id: None,
            is_critical: params.is_critical,
        },
        (Err(e), _) | (_, Err(e)) => return core_error_response(&trace_id, &e),
    };
    respond(&trace_id, state.service.facility_equipment(&id, filter))
}

pub fn hierarchy_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_assets))
        .routes(routes!(list_hubs))
        .routes(routes!(list_facilities))
        .routes(routes!(list_wells))
        .routes(routes!(facility_equipment))
}
