//! Orchestration between the SQLite store, the in-memory flow graph and the
//! threshold evaluator.
//!
//! Writes go to the store first and are mirrored into the graph while the
//! graph's write lock is held, so a trace never sees equipment the store
//! rejected.

use crate::config::{EvaluatorConfig, FlowTraceConfig, ServerConfig};
use chrono::{DateTime, Duration, Utc};
use prodgap_alert::{
    AlertTransition, EvaluationOutcome, SkippedThreshold, ThresholdEvaluator, TransitionKind,
};
use prodgap_common::types::{
    Asset, Connection, DowntimeEvent, Equipment, EquipmentStatus, Facility, Hub, KpiThreshold,
    PerformanceAlert, PerformanceSample, ThresholdScope, Well,
};
use prodgap_common::{CoreError, Result};
use prodgap_graph::{Direction, EquipmentGraph, PathTree, TraceRequest};
use prodgap_storage::{
    AlertDashboard, AlertFilter, DowntimeFilter, EquipmentFilter, ProductionStore,
    ThresholdFilter,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Samples returned with an equipment detail.
const RECENT_SAMPLE_LIMIT: usize = 24;

/// Effectively unbounded page size for internal listings.
const ALL_ROWS: usize = usize::MAX >> 1;

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EquipmentConnections {
    /// Connections feeding into the equipment.
    pub upstream: Vec<Connection>,
    /// Connections leaving the equipment.
    pub downstream: Vec<Connection>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentPerformance {
    pub recent_data_points: usize,
    pub latest: Option<PerformanceSample>,
    /// Newest first.
    pub samples: Vec<PerformanceSample>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EquipmentDetail {
    #[serde(flatten)]
    pub equipment: Equipment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connections: Option<EquipmentConnections>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<RecentPerformance>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FacilityEquipment {
    pub facility_id: String,
    pub equipment_count: usize,
    pub equipment: Vec<Equipment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertDetail {
    #[serde(flatten)]
    pub alert: PerformanceAlert,
    /// The threshold that raised the alert, if it still exists.
    pub threshold: Option<KpiThreshold>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertDashboardView {
    pub hours_back: i64,
    pub to: DateTime<Utc>,
    #[serde(flatten)]
    pub dashboard: AlertDashboard,
}

/// One KPI measurement for an equipment, facility or well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct KpiReading {
    pub entity_id: String,
    pub kpi_name: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Result of evaluating every reading of one entity in a batch.
#[derive(Debug, Clone, Serialize)]
pub struct EntityEvaluation {
    pub entity_id: String,
    /// Readings applied before a failure, or all of them.
    pub evaluated: usize,
    pub transitions: Vec<AlertTransition>,
    pub skipped: Vec<SkippedThreshold>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub equipment: usize,
    pub connections: usize,
    pub thresholds: usize,
}

pub struct ProductionService {
    store: Arc<ProductionStore>,
    graph: RwLock<EquipmentGraph>,
    evaluator: ThresholdEvaluator,
    flow_trace: FlowTraceConfig,
    evaluator_config: EvaluatorConfig,
}

impl ProductionService {
    /// Builds the in-memory graph and evaluator from the store.
    ///
    /// Connections whose endpoints no longer exist are skipped with a
    /// warning. Open threshold alerts are restored into the evaluator so a
    /// later recovery clears them instead of raising duplicates.
    pub fn open(store: Arc<ProductionStore>, config: &ServerConfig) -> Result<Self> {
        let mut graph = EquipmentGraph::new();
        for equipment in store.all_equipment()? {
            graph.add_equipment(equipment);
        }
        for connection in store.all_connections()? {
            let id = connection.id.clone();
            if let Err(e) = graph.add_connection(connection) {
                tracing::warn!(connection_id = %id, error = %e, "Skipping dangling connection");
            }
        }

        let evaluator = ThresholdEvaluator::new(store.all_thresholds()?);
        let mut restored = 0usize;
        for alert in store.open_threshold_alerts()? {
            let entity_id = alert
                .equipment_id
                .as_deref()
                .or(alert.facility_id.as_deref())
                .or(alert.well_id.as_deref());
            if let (Some(entity_id), Some(threshold_id)) = (entity_id, alert.threshold_id.as_deref())
            {
                evaluator.restore_open_alert(entity_id, threshold_id, &alert.id, alert.alert_timestamp);
                restored += 1;
            }
        }

        tracing::info!(
            equipment = graph.equipment_count(),
            connections = graph.connection_count(),
            thresholds = evaluator.threshold_count(),
            restored_alerts = restored,
            "Production service loaded"
        );

        Ok(Self {
            store,
            graph: RwLock::new(graph),
            evaluator,
            flow_trace: config.flow_trace.clone(),
            evaluator_config: config.evaluator.clone(),
        })
    }

    pub fn store(&self) -> &ProductionStore {
        &self.store
    }

    fn read_graph(&self) -> RwLockReadGuard<'_, EquipmentGraph> {
        self.graph
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_graph(&self) -> RwLockWriteGuard<'_, EquipmentGraph> {
        self.graph
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn stats(&self) -> GraphStats {
        let graph = self.read_graph();
        GraphStats {
            equipment: graph.equipment_count(),
            connections: graph.connection_count(),
            thresholds: self.evaluator.threshold_count(),
        }
    }

    // ---- Hierarchy ----

    pub fn assets(&self) -> Result<Vec<Asset>> {
        Ok(self.store.list_assets()?)
    }

    pub fn hubs(&self, asset_id: &str) -> Result<Vec<Hub>> {
        Ok(self.store.list_hubs(Some(asset_id))?)
    }

    pub fn facilities(&self, hub_id: &str) -> Result<Vec<Facility>> {
        Ok(self.store.list_facilities(Some(hub_id))?)
    }

    pub fn wells(&self, facility_id: &str) -> Result<Vec<Well>> {
        Ok(self.store.list_wells(Some(facility_id))?)
    }

    // ---- Equipment network ----

    /// Registers new equipment. Ids must be unique.
    pub fn create_equipment(&self, equipment: Equipment) -> Result<Equipment> {
        equipment.validate()?;
        let mut graph = self.write_graph();
        if graph.contains(&equipment.id) {
            return Err(CoreError::Validation(format!(
                "equipment {} already exists",
                equipment.id
            )));
        }
        self.store.upsert_equipment(&equipment)?;
        graph.add_equipment(equipment.clone());
        tracing::info!(
            equipment_id = %equipment.id,
            equipment_type = %equipment.equipment_type,
            "Equipment created"
        );
        Ok(equipment)
    }

    /// Adds a connection between two existing pieces of equipment.
    pub fn create_connection(&self, connection: Connection) -> Result<Connection> {
        if connection.id.trim().is_empty() {
            return Err(CoreError::validation("connection id must not be empty"));
        }
        let mut graph = self.write_graph();
        for endpoint in [
            &connection.source_equipment_id,
            &connection.target_equipment_id,
        ] {
            if !graph.contains(endpoint) {
                return Err(CoreError::not_found("equipment", endpoint.as_str()));
            }
        }
        if graph.connection(&connection.id).is_some() {
            return Err(CoreError::Validation(format!(
                "connection {} already exists",
                connection.id
            )));
        }
        self.store.upsert_connection(&connection)?;
        graph.add_connection(connection.clone())?;
        tracing::info!(
            connection_id = %connection.id,
            source = %connection.source_equipment_id,
            target = %connection.target_equipment_id,
            network = %connection.network_type,
            "Connection created"
        );
        Ok(connection)
    }

    /// Applies a telemetry update; at least one field must be given.
    pub fn update_equipment_status(
        &self,
        id: &str,
        status: Option<EquipmentStatus>,
        current_throughput: Option<f64>,
        efficiency: Option<f64>,
    ) -> Result<Equipment> {
        if status.is_none() && current_throughput.is_none() && efficiency.is_none() {
            return Err(CoreError::validation(
                "status, current_throughput or efficiency is required",
            ));
        }
        let mut graph = self.write_graph();
        let updated =
            self.store
                .update_equipment_status(id, status, current_throughput, efficiency)?;
        graph.add_equipment(updated.clone());
        tracing::info!(equipment_id = %id, status = %updated.status, "Equipment status updated");
        Ok(updated)
    }

    /// Deletes equipment with everything that hangs off it.
    pub fn delete_equipment(&self, id: &str) -> Result<()> {
        let mut graph = self.write_graph();
        if !self.store.delete_equipment(id)? {
            return Err(CoreError::not_found("equipment", id));
        }
        graph.remove_equipment(id);
        drop(graph);

        for threshold in self.evaluator.thresholds() {
            if threshold.scope.equipment_id() == Some(id) {
                self.evaluator.remove_threshold(&threshold.id);
            }
        }
        tracing::info!(equipment_id = %id, "Equipment deleted");
        Ok(())
    }

    pub fn equipment_detail(
        &self,
        id: &str,
        include_connections: bool,
        include_performance: bool,
    ) -> Result<EquipmentDetail> {
        let equipment = self
            .store
            .get_equipment(id)?
            .ok_or_else(|| CoreError::not_found("equipment", id))?;

        let connections = if include_connections {
            Some(EquipmentConnections {
                upstream: self.store.connections_to(id)?,
                downstream: self.store.connections_from(id)?,
            })
        } else {
            None
        };

        let performance = if include_performance {
            let samples = self.store.recent_samples(id, RECENT_SAMPLE_LIMIT)?;
            Some(RecentPerformance {
                recent_data_points: samples.len(),
                latest: samples.first().cloned(),
                samples,
            })
        } else {
            None
        };

        Ok(EquipmentDetail {
            equipment,
            connections,
            performance,
        })
    }

    pub fn list_equipment(
        &self,
        filter: &EquipmentFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Page<Equipment>> {
        let total = self.store.count_equipment(filter)?;
        let items = self.store.list_equipment(filter, limit, offset)?;
        Ok(Page {
            items,
            total,
            limit,
            offset,
        })
    }

    pub fn facility_equipment(
        &self,
        facility_id: &str,
        filter: EquipmentFilter,
    ) -> Result<FacilityEquipment> {
        let filter = EquipmentFilter {
            facility_id: Some(facility_id.to_string()),
            ..filter
        };
        let equipment = self.store.list_equipment(&filter, ALL_ROWS, 0)?;
        Ok(FacilityEquipment {
            facility_id: facility_id.to_string(),
            equipment_count: equipment.len(),
            equipment,
        })
    }

    /// Traces the flow path from `source_id`.
    ///
    /// `max_depth` defaults to `[flow_trace].default_depth` and may not
    /// exceed `[flow_trace].depth_limit`.
    pub fn trace_flow_path(
        &self,
        source_id: &str,
        network: Option<prodgap_common::types::NetworkType>,
        max_depth: Option<i64>,
        direction: Direction,
    ) -> Result<PathTree> {
        let max_depth = max_depth.unwrap_or(self.flow_trace.default_depth);
        if max_depth > self.flow_trace.depth_limit {
            return Err(CoreError::Validation(format!(
                "max_depth must not exceed {} (got {max_depth})",
                self.flow_trace.depth_limit
            )));
        }
        let req = TraceRequest {
            source_id: source_id.to_string(),
            network,
            max_depth,
            direction,
        };
        let graph = self.read_graph();
        prodgap_graph::trace(&graph, &req)
    }

    // ---- Samples & evaluation ----

    /// Stores a sample and evaluates each populated KPI field against the
    /// equipment's thresholds.
    pub fn record_sample(&self, sample: PerformanceSample) -> Result<EvaluationOutcome> {
        if !self.read_graph().contains(&sample.equipment_id) {
            return Err(CoreError::not_found("equipment", sample.equipment_id.as_str()));
        }
        self.store.insert_sample(&sample)?;

        let mut outcome = EvaluationOutcome::default();
        for (kpi_name, value) in sample.kpi_values() {
            outcome.merge(self.evaluate(&sample.equipment_id, kpi_name, value, sample.timestamp)?);
        }
        Ok(outcome)
    }

    /// Evaluates one reading and persists the resulting transitions.
    pub fn evaluate(
        &self,
        entity_id: &str,
        kpi_name: &str,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<EvaluationOutcome> {
        if !value.is_finite() {
            return Err(CoreError::Validation(format!(
                "{kpi_name} value must be a finite number"
            )));
        }
        self.evaluator
            .evaluate_sample_with(entity_id, kpi_name, value, timestamp, |transition| {
                self.persist_transition(transition)
            })
    }

    /// Stores the effect of one transition. Runs under the pair lock, so a
    /// clear is never persisted before the raise it follows.
    fn persist_transition(&self, transition: &AlertTransition) -> Result<()> {
        match transition.kind {
            TransitionKind::Raised => {
                if let Some(alert) = &transition.alert {
                    self.store.insert_alert(alert)?;
                }
            }
            TransitionKind::Cleared if self.evaluator_config.auto_resolve => {
                let Some(alert_id) = transition.alert_id.as_deref() else {
                    return Ok(());
                };
                let notes = format!(
                    "{} back within limits at {}",
                    transition.kpi_name, transition.value
                );
                match self.store.resolve_alert(
                    alert_id,
                    Some(&self.evaluator_config.resolver),
                    Some(&notes),
                    transition.timestamp,
                ) {
                    Ok(alert) => {
                        tracing::info!(alert_id, status = %alert.status, "Alert auto-resolved")
                    }
                    Err(prodgap_storage::StorageError::NotFound { .. }) => {
                        tracing::warn!(alert_id, "Cleared alert no longer exists");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            TransitionKind::Cleared => {}
        }
        Ok(())
    }

    /// Evaluates a batch of readings.
    ///
    /// Readings are grouped by entity and sorted by timestamp; entities are
    /// evaluated in parallel on the blocking pool. A failure stops that
    /// entity only and is reported in its result.
    pub async fn evaluate_batch(self: &Arc<Self>, readings: Vec<KpiReading>) -> Vec<EntityEvaluation> {
        let mut by_entity: BTreeMap<String, Vec<KpiReading>> = BTreeMap::new();
        for reading in readings {
            by_entity
                .entry(reading.entity_id.clone())
                .or_default()
                .push(reading);
        }

        let tasks = by_entity.into_iter().map(|(entity_id, mut readings)| {
            readings.sort_by_key(|r| r.timestamp);
            let service = Arc::clone(self);
            let task_entity = entity_id.clone();
            let handle = tokio::task::spawn_blocking(move || {
                service.evaluate_entity(&task_entity, &readings)
            });
            async move {
                match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::error!(entity_id = %entity_id, error = %e, "Evaluation task failed");
                        EntityEvaluation {
                            entity_id,
                            evaluated: 0,
                            transitions: Vec::new(),
                            skipped: Vec::new(),
                            error: Some(format!("evaluation task failed: {e}")),
                        }
                    }
                }
            }
        });
        futures::future::join_all(tasks).await
    }

    fn evaluate_entity(&self, entity_id: &str, readings: &[KpiReading]) -> EntityEvaluation {
        let mut result = EntityEvaluation {
            entity_id: entity_id.to_string(),
            evaluated: 0,
            transitions: Vec::new(),
            skipped: Vec::new(),
            error: None,
        };
        for reading in readings {
            match self.evaluate(entity_id, &reading.kpi_name, reading.value, reading.timestamp) {
                Ok(outcome) => {
                    result.transitions.extend(outcome.transitions);
                    result.skipped.extend(outcome.skipped);
                    result.evaluated += 1;
                }
                Err(e) => {
                    tracing::warn!(entity_id, error = %e, "Batch evaluation stopped for entity");
                    result.error = Some(e.to_string());
                    break;
                }
            }
        }
        result
    }

    // ---- Alerts ----

    /// Alerts raised in the last `hours_back` hours matching `filter`, by
    /// priority then timestamp, newest first.
    pub fn list_alerts(
        &self,
        filter: AlertFilter,
        hours_back: i64,
        limit: usize,
        offset: usize,
    ) -> Result<Page<PerformanceAlert>> {
        let filter = AlertFilter {
            since: Some(window_start(hours_back, Duration::hours, "hours_back")?),
            ..filter
        };
        let total = self.store.count_alerts(&filter)?;
        let items = self.store.list_alerts(&filter, limit, offset)?;
        Ok(Page {
            items,
            total,
            limit,
            offset,
        })
    }

    pub fn alert_detail(&self, id: &str) -> Result<AlertDetail> {
        let alert = self
            .store
            .get_alert(id)?
            .ok_or_else(|| CoreError::not_found("alert", id))?;
        let threshold = match alert.threshold_id.as_deref() {
            Some(threshold_id) => self.store.get_threshold(threshold_id)?,
            None => None,
        };
        Ok(AlertDetail { alert, threshold })
    }

    pub fn acknowledge_alert(&self, id: &str, by: Option<&str>) -> Result<PerformanceAlert> {
        let alert = self.store.acknowledge_alert(id, by, Utc::now())?;
        tracing::info!(alert_id = %id, status = %alert.status, "Alert acknowledged");
        Ok(alert)
    }

    pub fn resolve_alert(
        &self,
        id: &str,
        by: Option<&str>,
        notes: Option<&str>,
    ) -> Result<PerformanceAlert> {
        let alert = self.store.resolve_alert(id, by, notes, Utc::now())?;
        tracing::info!(alert_id = %id, status = %alert.status, "Alert resolved");
        Ok(alert)
    }

    pub fn alert_dashboard(&self, hours_back: i64) -> Result<AlertDashboardView> {
        let from = window_start(hours_back, Duration::hours, "hours_back")?;
        Ok(AlertDashboardView {
            hours_back,
            to: Utc::now(),
            dashboard: self.store.alert_dashboard(from)?,
        })
    }

    // ---- Downtime ----

    pub fn list_downtime_events(
        &self,
        filter: DowntimeFilter,
        days_back: i64,
        limit: usize,
        offset: usize,
    ) -> Result<Page<DowntimeEvent>> {
        let filter = DowntimeFilter {
            since: Some(window_start(days_back, Duration::days, "days_back")?),
            ..filter
        };
        let total = self.store.count_downtime_events(&filter)?;
        let items = self.store.list_downtime_events(&filter, limit, offset)?;
        Ok(Page {
            items,
            total,
            limit,
            offset,
        })
    }

    pub fn downtime_event(&self, id: &str) -> Result<DowntimeEvent> {
        self.store
            .get_downtime_event(id)?
            .ok_or_else(|| CoreError::not_found("downtime_event", id))
    }

    // ---- Thresholds ----

    pub fn list_thresholds(
        &self,
        filter: &ThresholdFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Page<KpiThreshold>> {
        let total = self.store.count_thresholds(filter)?;
        let items = self.store.list_thresholds(filter, limit, offset)?;
        Ok(Page {
            items,
            total,
            limit,
            offset,
        })
    }

    pub fn threshold(&self, id: &str) -> Result<KpiThreshold> {
        self.store
            .get_threshold(id)?
            .ok_or_else(|| CoreError::not_found("threshold", id))
    }

    /// Stores a threshold and starts evaluating against it.
    pub fn create_threshold(&self, threshold: KpiThreshold) -> Result<KpiThreshold> {
        validate_threshold(&threshold)?;
        if self.store.get_threshold(&threshold.id)?.is_some() {
            return Err(CoreError::Validation(format!(
                "threshold {} already exists",
                threshold.id
            )));
        }
        self.ensure_scope_exists(&threshold.scope)?;
        self.store.upsert_threshold(&threshold)?;
        self.evaluator.upsert_threshold(threshold.clone());
        tracing::info!(
            threshold_id = %threshold.id,
            entity_id = %threshold.scope.entity_id(),
            kpi_name = %threshold.kpi_name,
            "Threshold created"
        );
        Ok(threshold)
    }

    fn ensure_scope_exists(&self, scope: &ThresholdScope) -> Result<()> {
        let found = match scope {
            ThresholdScope::Equipment(id) => self.store.get_equipment(id)?.is_some(),
            ThresholdScope::Facility(id) => self.store.get_facility(id)?.is_some(),
            ThresholdScope::Well(id) => self.store.get_well(id)?.is_some(),
        };
        if found {
            Ok(())
        } else {
            Err(CoreError::not_found(scope.kind_name(), scope.entity_id()))
        }
    }

    pub fn delete_threshold(&self, id: &str) -> Result<()> {
        if !self.store.delete_threshold(id)? {
            return Err(CoreError::not_found("threshold", id));
        }
        self.evaluator.remove_threshold(id);
        tracing::info!(threshold_id = %id, "Threshold deleted");
        Ok(())
    }
}

/// Longest accepted look-back, in either unit.
const MAX_LOOK_BACK: i64 = 100_000;

/// `now - amount` for a strictly positive look-back window.
fn window_start(
    amount: i64,
    unit: fn(i64) -> Duration,
    name: &str,
) -> Result<DateTime<Utc>> {
    if amount <= 0 || amount > MAX_LOOK_BACK {
        return Err(CoreError::Validation(format!(
            "{name} must be between 1 and {MAX_LOOK_BACK} (got {amount})"
        )));
    }
    Ok(Utc::now() - unit(amount))
}

fn validate_threshold(t: &KpiThreshold) -> Result<()> {
    if t.threshold_name.trim().is_empty() {
        return Err(CoreError::validation("threshold_name must not be empty"));
    }
    if t.kpi_name.trim().is_empty() {
        return Err(CoreError::validation("kpi_name must not be empty"));
    }
    if !t.has_limits() {
        return Err(CoreError::validation(
            "threshold needs an upper_limit or a lower_limit",
        ));
    }
    if let (Some(lower), Some(upper)) = (t.lower_limit, t.upper_limit) {
        if lower > upper {
            return Err(CoreError::Validation(format!(
                "lower_limit {lower} is above upper_limit {upper}"
            )));
        }
    }
    if t.hysteresis_percentage.is_some_and(|h| h < 0.0) {
        return Err(CoreError::validation("hysteresis_percentage must not be negative"));
    }
    if t.minimum_duration_minutes.is_some_and(|m| m < 0) {
        return Err(CoreError::validation(
            "minimum_duration_minutes must not be negative",
        ));
    }
    if t.effective_to.is_some_and(|to| to < t.effective_from) {
        return Err(CoreError::validation("effective_to is before effective_from"));
    }
    Ok(())
}
