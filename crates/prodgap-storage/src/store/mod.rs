use chrono::{DateTime, Utc};
use prodgap_common::error::ParseEnumError;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use crate::error::{Result, StorageError};

pub mod alerts;
pub mod downtime;
pub mod equipment;
pub mod hierarchy;
pub mod samples;
pub mod thresholds;

pub use alerts::{AlertDashboard, AlertFilter, EquipmentAlertCount, ProductionImpact};
pub use downtime::DowntimeFilter;
pub use equipment::EquipmentFilter;
pub use thresholds::ThresholdFilter;

const HIERARCHY_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS assets (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS hubs (
    id TEXT PRIMARY KEY,
    asset_id TEXT NOT NULL,
    name TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_hubs_asset ON hubs(asset_id);
CREATE TABLE IF NOT EXISTS facilities (
    id TEXT PRIMARY KEY,
    hub_id TEXT NOT NULL,
    facility_type TEXT NOT NULL,
    name TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_facilities_hub ON facilities(hub_id);
CREATE TABLE IF NOT EXISTS wells (
    id TEXT PRIMARY KEY,
    facility_id TEXT NOT NULL,
    name TEXT NOT NULL,
    status TEXT NOT NULL,
    priority INTEGER
);
CREATE INDEX IF NOT EXISTS idx_wells_facility ON wells(facility_id);
";

const EQUIPMENT_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS equipment (
    id TEXT PRIMARY KEY,
    facility_id TEXT,
    equipment_type TEXT NOT NULL,
    name TEXT NOT NULL,
    tag_number TEXT,
    status TEXT NOT NULL,
    is_critical INTEGER NOT NULL DEFAULT 0,
    design_capacity REAL,
    current_throughput REAL,
    efficiency REAL,
    capacity_unit TEXT,
    location_description TEXT,
    elevation REAL,
    last_maintenance_date INTEGER,
    next_maintenance_date INTEGER,
    commissioned_date INTEGER,
    details_json TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_equipment_facility ON equipment(facility_id);
CREATE INDEX IF NOT EXISTS idx_equipment_type ON equipment(equipment_type);
CREATE TABLE IF NOT EXISTS equipment_connections (
    id TEXT PRIMARY KEY,
    source_equipment_id TEXT NOT NULL,
    target_equipment_id TEXT NOT NULL,
    connection_type TEXT NOT NULL,
    network_type TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    max_capacity REAL,
    current_flow REAL,
    capacity_unit TEXT,
    connection_point_source TEXT,
    connection_point_target TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_connections_source ON equipment_connections(source_equipment_id);
CREATE INDEX IF NOT EXISTS idx_connections_target ON equipment_connections(target_equipment_id);
CREATE TABLE IF NOT EXISTS performance_samples (
    id TEXT PRIMARY KEY,
    equipment_id TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    throughput REAL,
    efficiency REAL,
    availability REAL,
    pressure REAL,
    temperature REAL,
    flow_rate REAL,
    data_quality TEXT,
    measurement_source TEXT,
    throughput_unit TEXT,
    pressure_unit TEXT,
    temperature_unit TEXT,
    flow_unit TEXT
);
CREATE INDEX IF NOT EXISTS idx_samples_equipment_ts ON performance_samples(equipment_id, timestamp);
";

const ALERTS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS kpi_thresholds (
    id TEXT PRIMARY KEY,
    threshold_name TEXT NOT NULL,
    equipment_id TEXT,
    facility_id TEXT,
    well_id TEXT,
    kpi_name TEXT NOT NULL,
    kpi_description TEXT,
    measurement_unit TEXT,
    upper_limit REAL,
    lower_limit REAL,
    target_value REAL,
    alert_severity TEXT NOT NULL,
    hysteresis_percentage REAL,
    minimum_duration_minutes INTEGER,
    is_active INTEGER NOT NULL DEFAULT 1,
    effective_from INTEGER NOT NULL,
    effective_to INTEGER,
    created_by TEXT,
    approved_by TEXT,
    comments TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_thresholds_equipment ON kpi_thresholds(equipment_id);
CREATE INDEX IF NOT EXISTS idx_thresholds_facility ON kpi_thresholds(facility_id);
CREATE TABLE IF NOT EXISTS performance_alerts (
    id TEXT PRIMARY KEY,
    equipment_id TEXT,
    facility_id TEXT,
    well_id TEXT,
    alert_type TEXT NOT NULL,
    severity TEXT NOT NULL,
    priority INTEGER NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    recommendation TEXT,
    status TEXT NOT NULL,
    alert_timestamp INTEGER NOT NULL,
    acknowledged_at INTEGER,
    resolved_at INTEGER,
    threshold_id TEXT,
    measured_value REAL,
    threshold_value REAL,
    measurement_unit TEXT,
    production_impact_bpd REAL,
    estimated_downtime_hours REAL,
    safety_critical INTEGER NOT NULL DEFAULT 0,
    acknowledged_by TEXT,
    resolved_by TEXT,
    resolution_notes TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_alerts_timestamp ON performance_alerts(alert_timestamp);
CREATE INDEX IF NOT EXISTS idx_alerts_equipment ON performance_alerts(equipment_id);
CREATE INDEX IF NOT EXISTS idx_alerts_status ON performance_alerts(status);
CREATE TABLE IF NOT EXISTS downtime_events (
    id TEXT PRIMARY KEY,
    equipment_id TEXT NOT NULL,
    start_time INTEGER NOT NULL,
    end_time INTEGER,
    duration_hours REAL,
    downtime_reason TEXT NOT NULL,
    planned INTEGER NOT NULL DEFAULT 0,
    safety_related INTEGER NOT NULL DEFAULT 0,
    production_loss_bpd REAL,
    production_loss_mscfd REAL,
    financial_impact_usd REAL,
    analysis_json TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_downtime_equipment ON downtime_events(equipment_id);
CREATE INDEX IF NOT EXISTS idx_downtime_start ON downtime_events(start_time);
";

/// Unified access to `production.db`.
pub struct ProductionStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl ProductionStore {
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join("production.db");
        let conn = Connection::open(&db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(HIERARCHY_SCHEMA)?;
        conn.execute_batch(EQUIPMENT_SCHEMA)?;
        conn.execute_batch(ALERTS_SCHEMA)?;
        tracing::info!(path = %db_path.display(), "Initialized production store");
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ---- Column helpers ----

/// Dynamic WHERE clause builder with positional `?N` placeholders.
#[derive(Default)]
pub(crate) struct SqlFilter {
    clauses: Vec<String>,
    params: Vec<Box<dyn rusqlite::types::ToSql>>,
}

impl SqlFilter {
    pub(crate) fn eq<T: rusqlite::types::ToSql + 'static>(&mut self, column: &str, value: T) {
        let idx = self.params.len() + 1;
        self.clauses.push(format!("{column} = ?{idx}"));
        self.params.push(Box::new(value));
    }

    pub(crate) fn cmp<T: rusqlite::types::ToSql + 'static>(
        &mut self,
        column: &str,
        op: &str,
        value: T,
    ) {
        let idx = self.params.len() + 1;
        self.clauses.push(format!("{column} {op} ?{idx}"));
        self.params.push(Box::new(value));
    }

    /// Raw clause with one bound parameter referenced as `?` in `clause`.
    pub(crate) fn raw<T: rusqlite::types::ToSql + 'static>(&mut self, clause: &str, value: T) {
        let idx = self.params.len() + 1;
        self.clauses.push(clause.replace('?', &format!("?{idx}")));
        self.params.push(Box::new(value));
    }

    pub(crate) fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    /// Appends `LIMIT ?n OFFSET ?m` and binds both.
    pub(crate) fn page_sql(&mut self, limit: usize, offset: usize) -> String {
        let idx = self.params.len() + 1;
        self.params.push(Box::new(limit as i64));
        self.params.push(Box::new(offset as i64));
        format!(" LIMIT ?{idx} OFFSET ?{}", idx + 1)
    }

    pub(crate) fn param_refs(&self) -> Vec<&dyn rusqlite::types::ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }
}

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn opt_millis(ts: Option<DateTime<Utc>>) -> Option<i64> {
    ts.map(|t| t.timestamp_millis())
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

pub(crate) fn from_opt_millis(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.and_then(DateTime::from_timestamp_millis)
}

pub(crate) fn parse_column<T>(column: &'static str, value: &str) -> Result<T>
where
    T: FromStr<Err = ParseEnumError>,
{
    value
        .parse()
        .map_err(|source| StorageError::InvalidValue { column, source })
}
