//! Loads a network seed file (hierarchy, equipment, connections, thresholds)
//! through the service, so the same validation applies as over HTTP.

use crate::config::{NetworkSeedFile, SeedConnection, SeedEquipment, SeedThreshold};
use crate::service::ProductionService;
use chrono::Utc;
use prodgap_common::id::{connection_id, threshold_id};
use prodgap_common::types::{Connection, Equipment, KpiThreshold};
use prodgap_common::Result;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedCounts {
    pub created: u32,
    pub skipped: u32,
    pub failed: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    /// Assets, hubs, facilities and wells; always upserted.
    pub hierarchy: u32,
    pub equipment: SeedCounts,
    pub connections: SeedCounts,
    pub thresholds: SeedCounts,
}

/// Loads `seed` into the service.
///
/// Hierarchy rows are upserted. Equipment, connections and thresholds that
/// already exist are skipped, so a seed file can be applied repeatedly.
/// Individual failures are logged and counted; only storage errors while
/// checking for existing rows abort the load.
pub fn load_network_seed(service: &ProductionService, seed: &NetworkSeedFile) -> Result<SeedReport> {
    let mut report = SeedReport::default();
    let store = service.store();

    for asset in &seed.assets {
        store.upsert_asset(asset)?;
        report.hierarchy += 1;
    }
    for hub in &seed.hubs {
        store.upsert_hub(hub)?;
        report.hierarchy += 1;
    }
    for facility in &seed.facilities {
        store.upsert_facility(facility)?;
        report.hierarchy += 1;
    }
    for well in &seed.wells {
        store.upsert_well(well)?;
        report.hierarchy += 1;
    }

    for eq in &seed.equipment {
        if store.get_equipment(&eq.id)?.is_some() {
            tracing::warn!(equipment_id = %eq.id, "Equipment already exists, skipping");
            report.equipment.skipped += 1;
            continue;
        }
        match service.create_equipment(seed_equipment(eq)) {
            Ok(_) => report.equipment.created += 1,
            Err(e) => {
                tracing::error!(equipment_id = %eq.id, error = %e, "Failed to create equipment");
                report.equipment.failed += 1;
            }
        }
    }

    for conn in &seed.connections {
        let existing = store.connections_from(&conn.source)?;
        let duplicate = existing.iter().any(|c| {
            conn.id.as_deref() == Some(c.id.as_str())
                || (c.target_equipment_id == conn.target && c.network_type == conn.network_type)
        });
        if duplicate {
            tracing::warn!(
                source = %conn.source,
                target = %conn.target,
                network = %conn.network_type,
                "Connection already exists, skipping"
            );
            report.connections.skipped += 1;
            continue;
        }
        match service.create_connection(seed_connection(conn)) {
            Ok(_) => report.connections.created += 1,
            Err(e) => {
                tracing::error!(
                    source = %conn.source,
                    target = %conn.target,
                    error = %e,
                    "Failed to create connection"
                );
                report.connections.failed += 1;
            }
        }
    }

    let existing_thresholds = store.all_thresholds()?;
    for th in &seed.thresholds {
        let duplicate = existing_thresholds.iter().any(|t| {
            th.id.as_deref() == Some(t.id.as_str())
                || (t.scope == th.scope
                    && t.kpi_name == th.kpi_name
                    && t.threshold_name == th.threshold_name)
        });
        if duplicate {
            tracing::warn!(name = %th.threshold_name, "Threshold already exists, skipping");
            report.thresholds.skipped += 1;
            continue;
        }
        match service.create_threshold(seed_threshold(th)) {
            Ok(_) => report.thresholds.created += 1,
            Err(e) => {
                tracing::error!(name = %th.threshold_name, error = %e, "Failed to create threshold");
                report.thresholds.failed += 1;
            }
        }
    }

    tracing::info!(
        hierarchy = report.hierarchy,
        equipment_created = report.equipment.created,
        equipment_skipped = report.equipment.skipped,
        connections_created = report.connections.created,
        connections_skipped = report.connections.skipped,
        thresholds_created = report.thresholds.created,
        thresholds_skipped = report.thresholds.skipped,
        "Network seed loaded"
    );
    Ok(report)
}

fn seed_equipment(eq: &SeedEquipment) -> Equipment {
    let mut equipment = Equipment::new(eq.id.clone(), eq.name.clone(), eq.equipment_type);
    equipment.facility_id = eq.facility_id.clone();
    equipment.tag_number = eq.tag_number.clone();
    equipment.status = eq.status;
    equipment.is_critical = eq.is_critical;
    equipment.design_capacity = eq.design_capacity;
    equipment.capacity_unit = eq.capacity_unit.clone();
    equipment.location_description = eq.location_description.clone();
    equipment.details = eq.details.clone();
    equipment
}

fn seed_connection(conn: &SeedConnection) -> Connection {
    let id = conn.id.clone().unwrap_or_else(connection_id);
    let mut connection = Connection::new(id, conn.source.clone(), conn.target.clone(), conn.network_type);
    connection.connection_type = conn.connection_type;
    connection.is_active = conn.is_active;
    connection.max_capacity = conn.max_capacity;
    connection.current_flow = conn.current_flow;
    connection.capacity_unit = conn.capacity_unit.clone();
    connection
}

fn seed_threshold(th: &SeedThreshold) -> KpiThreshold {
    let now = Utc::now();
    KpiThreshold {
        id: th.id.clone().unwrap_or_else(threshold_id),
        threshold_name: th.threshold_name.clone(),
        scope: th.scope.clone(),
        kpi_name: th.kpi_name.clone(),
        kpi_description: None,
        measurement_unit: th.measurement_unit.clone(),
        upper_limit: th.upper_limit,
        lower_limit: th.lower_limit,
        target_value: th.target_value,
        alert_severity: th.alert_severity,
        hysteresis_percentage: th.hysteresis_percentage,
        minimum_duration_minutes: th.minimum_duration_minutes,
        is_active: th.is_active,
        effective_from: now,
        effective_to: None,
        created_by: Some("seed".to_string()),
        approved_by: None,
        comments: None,
        created_at: now,
        updated_at: now,
    }
}
