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
use prodgap_common::id::{connection_id, equipment_id, sample_id};
use prodgap_common::types::{
    Connection, ConnectionType, Equipment, EquipmentDetails, EquipmentType, NetworkType,
    PerformanceSample,
};
use prodgap_common::Result;
use prodgap_graph::Direction;
use prodgap_storage::EquipmentFilter;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

// ---- Catalogue ----

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct ListEquipmentParams {
    #[param(required = false)]
    equipment_type: Option<String>,
    #[param(required = false)]
    status: Option<String>,
    #[param(required = false)]
    facility_id: Option<String>,
    #[param(required = false, value_type = Option<bool>)]
    #[serde(default, deserialize_with = "deserialize_optional_bool")]
    is_critical: Option<bool>,
    /// Page size (default 20, max 1000)
    #[param(required = false, value_type = Option<i64>)]
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    limit: Option<i64>,
    #[param(required = false, value_type = Option<i64>)]
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    offset: Option<i64>,
}

/// Paginated equipment catalogue, ordered by id.
#[utoipa::path(
    get,
    path = "/v1/equipment",
    tag = "Equipment",
    params(ListEquipmentParams),
    responses(
        (status = 200, description = "Equipment page"),
        (status = 400, description = "Unknown equipment type or status, or negative paging", body = crate::api::ApiError)
    )
)]
async fn list_equipment(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<ListEquipmentParams>,
) -> impl IntoResponse {
    let filter = match (
        parse_opt(params.equipment_type.as_deref()),
        parse_opt(params.status.as_deref()),
    ) {
        (Ok(equipment_type), Ok(status)) => EquipmentFilter {
            equipment_type,
            status,
            facility_id: params.facility_id,
            is_critical: params.is_critical,
        },
        (Err(e), _) | (_, Err(e)) => return core_error_response(&trace_id, &e),
    };
    let result = resolve_page(params.limit, params.offset)
        .and_then(|(limit, offset)| state.service.list_equipment(&filter, limit, offset));
    match result {
        Ok(page) => success_page_response(&trace_id, page),
        Err(e) => core_error_response(&trace_id, &e),
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateEquipmentRequest {
    /// Generated when omitted
    pub id: Option<String>,
    pub name: String,
    pub equipment_type: String,
    pub facility_id: Option<String>,
    pub tag_number: Option<String>,
    /// Defaults to `online`
    pub status: Option<String>,
    #[serde(default)]
    pub is_critical: bool,
    pub design_capacity: Option<f64>,
    pub current_throughput: Option<f64>,
    pub efficiency: Option<f64>,
    pub capacity_unit: Option<String>,
    pub location_description: Option<String>,
    pub elevation: Option<f64>,
    pub commissioned_date: Option<DateTime<Utc>>,
    /// Type-specific attributes, tagged by `kind`
    #[schema(value_type = Option<Object>)]
    pub details: Option<EquipmentDetails>,
}

impl CreateEquipmentRequest {
    fn into_equipment(self) -> Result<Equipment> {
        let equipment_type: EquipmentType = self.equipment_type.parse()?;
        let id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(equipment_id);
        let mut equipment = Equipment::new(id, self.name, equipment_type);
        equipment.status = match parse_opt(self.status.as_deref())? {
            Some(status) => status,
            None => prodgap_common::types::EquipmentStatus::Online,
        };
        equipment.facility_id = self.facility_id;
        equipment.tag_number = self.tag_number;
        equipment.is_critical = self.is_critical;
        equipment.design_capacity = self.design_capacity;
        equipment.current_throughput = self.current_throughput;
        equipment.efficiency = self.efficiency;
        equipment.capacity_unit = self.capacity_unit;
        equipment.location_description = self.location_description;
        equipment.elevation = self.elevation;
        equipment.commissioned_date = self.commissioned_date;
        equipment.details = self.details;
        Ok(equipment)
    }
}

/// Register a piece of equipment.
#[utoipa::path(
    post,
    path = "/v1/equipment",
    tag = "Equipment",
    request_body = CreateEquipmentRequest,
    responses(
        (status = 201, description = "Equipment created"),
        (status = 400, description = "Invalid or duplicate equipment", body = crate::api::ApiError)
    )
)]
async fn create_equipment(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<CreateEquipmentRequest>,
) -> impl IntoResponse {
    let result = req
        .into_equipment()
        .and_then(|equipment| state.service.create_equipment(equipment));
    match result {
        Ok(equipment) => success_response(StatusCode::CREATED, &trace_id, equipment),
        Err(e) => core_error_response(&trace_id, &e),
    }
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct EquipmentDetailParams {
    /// Include upstream and downstream connections (default true)
    #[param(required = false, value_type = Option<bool>)]
    #[serde(default, deserialize_with = "deserialize_optional_bool")]
    include_connections: Option<bool>,
    /// Include the most recent performance samples (default true)
    #[param(required = false, value_type = Option<bool>)]
    #[serde(default, deserialize_with = "deserialize_optional_bool")]
    include_performance: Option<bool>,
}

/// Equipment with its connections and recent performance.
#[utoipa::path(
    get,
    path = "/v1/equipment/{id}",
    tag = "Equipment",
    params(("id" = String, Path, description = "Equipment id"), EquipmentDetailParams),
    responses(
        (status = 200, description = "Equipment detail"),
        (status = 404, description = "Equipment not found", body = crate::api::ApiError)
    )
)]
async fn get_equipment(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<EquipmentDetailParams>,
) -> impl IntoResponse {
    respond(
        &trace_id,
        state.service.equipment_detail(
            &id,
            params.include_connections.unwrap_or(true),
            params.include_performance.unwrap_or(true),
        ),
    )
}

/// Delete equipment together with its connections, samples and downtime.
#[utoipa::path(
    delete,
    path = "/v1/equipment/{id}",
    tag = "Equipment",
    params(("id" = String, Path, description = "Equipment id")),
    responses(
        (status = 200, description = "Equipment deleted"),
        (status = 404, description = "Equipment not found", body = crate::api::ApiError)
    )
)]
async fn delete_equipment(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.service.delete_equipment(&id) {
        Ok(()) => success_empty_response(StatusCode::OK, &trace_id, "Equipment deleted"),
        Err(e) => core_error_response(&trace_id, &e),
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
    pub current_throughput: Option<f64>,
    pub efficiency: Option<f64>,
}

/// Update operating status and live telemetry.
#[utoipa::path(
    put,
    path = "/v1/equipment/{id}/status",
    tag = "Equipment",
    params(("id" = String, Path, description = "Equipment id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Updated equipment"),
        (status = 400, description = "Nothing to update or unknown status", body = crate::api::ApiError),
        (status = 404, description = "Equipment not found", body = crate::api::ApiError)
    )
)]
async fn update_status(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> impl IntoResponse {
    let result = parse_opt(req.status.as_deref()).and_then(|status| {
        state
            .service
            .update_equipment_status(&id, status, req.current_throughput, req.efficiency)
    });
    respond(&trace_id, result)
}

// ---- Connections ----

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateConnectionRequest {
    /// Generated when omitted
    pub id: Option<String>,
    pub source_equipment_id: String,
    pub target_equipment_id: String,
    /// oil, domestic_gas, export_gas, flared_gas, water, mixed
    pub network_type: String,
    /// Defaults to `physical`
    pub connection_type: Option<String>,
    pub is_active: Option<bool>,
    pub max_capacity: Option<f64>,
    pub current_flow: Option<f64>,
    pub capacity_unit: Option<String>,
    pub connection_point_source: Option<String>,
    pub connection_point_target: Option<String>,
}

impl CreateConnectionRequest {
    fn into_connection(self) -> Result<Connection> {
        let network_type: NetworkType = self.network_type.parse()?;
        let id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(connection_id);
        let mut connection = Connection::new(
            id,
            self.source_equipment_id,
            self.target_equipment_id,
            network_type,
        );
        if let Some(ty) = parse_opt::<ConnectionType>(self.connection_type.as_deref())? {
            connection.connection_type = ty;
        }
        connection.is_active = self.is_active.unwrap_or(true);
        connection.max_capacity = self.max_capacity;
        connection.current_flow = self.current_flow;
        connection.capacity_unit = self.capacity_unit;
        connection.connection_point_source = self.connection_point_source;
        connection.connection_point_target = self.connection_point_target;
        Ok(connection)
    }
}

/// Connect two pieces of equipment.
#[utoipa::path(
    post,
    path = "/v1/connections",
    tag = "Equipment",
    request_body = CreateConnectionRequest,
    responses(
        (status = 201, description = "Connection created"),
        (status = 400, description = "Invalid or duplicate connection", body = crate::api::ApiError),
        (status = 404, description = "Endpoint equipment not found", body = crate::api::ApiError)
    )
)]
async fn create_connection(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<CreateConnectionRequest>,
) -> impl IntoResponse {
    let result = req
        .into_connection()
        .and_then(|connection| state.service.create_connection(connection));
    match result {
        Ok(connection) => success_response(StatusCode::CREATED, &trace_id, connection),
        Err(e) => core_error_response(&trace_id, &e),
    }
}

// ---- Flow path ----

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct FlowPathParams {
    /// Only follow connections of this network
    #[param(required = false)]
    network_type: Option<String>,
    /// Levels below the source to expand
    #[param(required = false, value_type = Option<i64>)]
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    max_depth: Option<i64>,
    /// downstream (default) or upstream
    #[param(required = false)]
    direction: Option<String>,
}

/// Trace the flow path from a piece of equipment.
///
/// Only active connections are followed. Equipment reachable through two
/// branches appears under both; a node already on the current path is never
/// entered again.
#[utoipa::path(
    get,
    path = "/v1/equipment/{id}/flow-path",
    tag = "Equipment",
    params(("id" = String, Path, description = "Source equipment id"), FlowPathParams),
    responses(
        (status = 200, description = "Flow path tree"),
        (status = 400, description = "Invalid depth, network or direction", body = crate::api::ApiError),
        (status = 404, description = "Source equipment not found", body = crate::api::ApiError)
    )
)]
async fn flow_path(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<FlowPathParams>,
) -> impl IntoResponse {
    let direction = match params.direction.as_deref().map(str::trim) {
        None | Some("") => Ok(Direction::default()),
        Some(d) => d.parse::<Direction>(),
    };
    let result = direction.and_then(|direction| {
        let network = parse_opt::<NetworkType>(params.network_type.as_deref())?;
        state
            .service
            .trace_flow_path(&id, network, params.max_depth, direction)
    });
    respond(&trace_id, result)
}

// ---- Samples ----

#[derive(Debug, Deserialize, ToSchema)]
pub struct SampleRequest {
    /// Defaults to now
    pub timestamp: Option<DateTime<Utc>>,
    pub throughput: Option<f64>,
    pub efficiency: Option<f64>,
    pub availability: Option<f64>,
    pub pressure: Option<f64>,
    pub temperature: Option<f64>,
    pub flow_rate: Option<f64>,
    pub data_quality: Option<String>,
    pub measurement_source: Option<String>,
    pub throughput_unit: Option<String>,
    pub pressure_unit: Option<String>,
    pub temperature_unit: Option<String>,
    pub flow_unit: Option<String>,
}

#[derive(Serialize)]
struct SampleResponse {
    sample_id: String,
    #[serde(flatten)]
    outcome: prodgap_alert::EvaluationOutcome,
}

/// Record a performance sample and evaluate it against the equipment's
/// thresholds.
#[utoipa::path(
    post,
    path = "/v1/equipment/{id}/samples",
    tag = "Equipment",
    params(("id" = String, Path, description = "Equipment id")),
    request_body = SampleRequest,
    responses(
        (status = 201, description = "Sample stored; alert transitions it caused"),
        (status = 404, description = "Equipment not found", body = crate::api::ApiError)
    )
)]
async fn record_sample(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SampleRequest>,
) -> impl IntoResponse {
    let sample = PerformanceSample {
        id: sample_id(),
        equipment_id: id,
        timestamp: req.timestamp.unwrap_or_else(Utc::now),
        throughput: req.throughput,
        efficiency: req.efficiency,
        availability: req.availability,
        pressure: req.pressure,
        temperature: req.temperature,
        flow_rate: req.flow_rate,
        data_quality: req.data_quality,
        measurement_source: req.measurement_source,
        throughput_unit: req.throughput_unit,
        pressure_unit: req.pressure_unit,
        temperature_unit: req.temperature_unit,
        flow_unit: req.flow_unit,
    };
    let sample_id = sample.id.clone();
    match state.service.record_sample(sample) {
        Ok(outcome) => success_response(
            StatusCode::CREATED,
            &trace_id,
            SampleResponse { sample_id, outcome },
        ),
        Err(e) => core_error_response(&trace_id, &e),
    }
}

pub fn equipment_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_equipment, create_equipment))
        .routes(routes!(get_equipment, delete_equipment))
        .routes(routes!(update_status))
        .routes(routes!(create_connection))
        .routes(routes!(flow_path))
        .routes(routes!(record_sample))
}
