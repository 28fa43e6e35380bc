use chrono::{DateTime, Utc};
use prodgap_common::types::{AlertStatus, AlertType, PerformanceAlert, Severity};
use serde::Serialize;
use std::collections::BTreeMap;

use super::{
    from_millis, from_opt_millis, opt_millis, parse_column, to_millis, ProductionStore, SqlFilter,
};
use crate::error::{Result, StorageError};

const ALERT_COLUMNS: &str = "id, equipment_id, facility_id, well_id, alert_type, severity, priority, \
    title, description, recommendation, status, alert_timestamp, acknowledged_at, resolved_at, \
    threshold_id, measured_value, threshold_value, measurement_unit, production_impact_bpd, \
    estimated_downtime_hours, safety_critical, acknowledged_by, resolved_by, resolution_notes, \
    created_at, updated_at";

/// Alert listing filter. `since` bounds `alert_timestamp` from below.
#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub status: Option<AlertStatus>,
    pub severity: Option<Severity>,
    pub alert_type: Option<AlertType>,
    pub facility_id: Option<String>,
    pub equipment_id: Option<String>,
    pub safety_critical: Option<bool>,
    pub since: Option<DateTime<Utc>>,
}

impl AlertFilter {
    fn to_sql(&self) -> SqlFilter {
        let mut f = SqlFilter::default();
        if let Some(since) = self.since {
            f.cmp("alert_timestamp", ">=", to_millis(since));
        }
        if let Some(status) = self.status {
            f.eq("status", status.as_str());
        }
        if let Some(severity) = self.severity {
            f.eq("severity", severity.as_str());
        }
        if let Some(alert_type) = self.alert_type {
            f.eq("alert_type", alert_type.as_str());
        }
        if let Some(id) = &self.facility_id {
            f.eq("facility_id", id.clone());
        }
        if let Some(id) = &self.equipment_id {
            f.eq("equipment_id", id.clone());
        }
        if let Some(flag) = self.safety_critical {
            f.eq("safety_critical", flag as i32);
        }
        f
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquipmentAlertCount {
    pub equipment_id: String,
    pub alert_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductionImpact {
    pub total_production_impact_bpd: f64,
    pub total_estimated_downtime_hours: f64,
    pub alerts_with_impact: u64,
}

/// Aggregates over the alerts raised since a point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertDashboard {
    pub from: DateTime<Utc>,
    pub total_alerts: u64,
    /// Every severity is present, zero when unused.
    pub severity_distribution: BTreeMap<String, u64>,
    /// Every status is present, zero when unused.
    pub status_distribution: BTreeMap<String, u64>,
    pub safety_critical_alerts: u64,
    /// Up to 10 equipment ids with the most alerts.
    pub top_equipment_alerts: Vec<EquipmentAlertCount>,
    pub production_impact: ProductionImpact,
}

impl ProductionStore {
    pub fn insert_alert(&self, a: &PerformanceAlert) -> Result<()> {
        self.conn().execute(
            &format!(
                "INSERT INTO performance_alerts ({ALERT_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                         ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26)"
            ),
            rusqlite::params![
                a.id,
                a.equipment_id,
                a.facility_id,
                a.well_id,
                a.alert_type.as_str(),
                a.severity.as_str(),
                a.priority,
                a.title,
                a.description,
                a.recommendation,
                a.status.as_str(),
                to_millis(a.alert_timestamp),
                opt_millis(a.acknowledged_at),
                opt_millis(a.resolved_at),
                a.threshold_id,
                a.measured_value,
                a.threshold_value,
                a.measurement_unit,
                a.production_impact_bpd,
                a.estimated_downtime_hours,
                a.safety_critical as i32,
                a.acknowledged_by,
                a.resolved_by,
                a.resolution_notes,
                to_millis(a.created_at),
                to_millis(a.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_alert(&self, id: &str) -> Result<Option<PerformanceAlert>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ALERT_COLUMNS} FROM performance_alerts WHERE id = ?1"
        ))?;
        let mut rows = stmt.query_map(rusqlite::params![id], |row| Ok(Self::row_to_alert(row)))?;
        match rows.next() {
            Some(row) => Ok(Some(row??)),
            None => Ok(None),
        }
    }

    /// Matching alerts ordered by priority, then newest first.
    pub fn list_alerts(
        &self,
        filter: &AlertFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PerformanceAlert>> {
        let mut f = filter.to_sql();
        let mut sql = format!("SELECT {ALERT_COLUMNS} FROM performance_alerts{}", f.where_sql());
        sql.push_str(" ORDER BY priority DESC, alert_timestamp DESC, id DESC");
        sql.push_str(&f.page_sql(limit, offset));

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(f.param_refs().as_slice(), |row| {
            Ok(Self::row_to_alert(row))
        })?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row??);
        }
        Ok(items)
    }

    pub fn count_alerts(&self, filter: &AlertFilter) -> Result<u64> {
        let f = filter.to_sql();
        let sql = format!("SELECT COUNT(*) FROM performance_alerts{}", f.where_sql());
        let count: i64 = self
            .conn()
            .query_row(&sql, f.param_refs().as_slice(), |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Open alerts raised by a threshold, oldest first.
    pub fn open_threshold_alerts(&self) -> Result<Vec<PerformanceAlert>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ALERT_COLUMNS} FROM performance_alerts
             WHERE threshold_id IS NOT NULL AND status IN ('new', 'acknowledged', 'investigating')
             ORDER BY alert_timestamp ASC"
        ))?;
        let rows = stmt.query_map([], |row| Ok(Self::row_to_alert(row)))?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row??);
        }
        Ok(items)
    }

    /// Moves a `new` alert to `acknowledged`.
    pub fn acknowledge_alert(
        &self,
        id: &str,
        by: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<PerformanceAlert> {
        let ms = to_millis(at);
        let updated = self.conn().execute(
            "UPDATE performance_alerts
             SET status = 'acknowledged', acknowledged_at = ?2, acknowledged_by = ?3, updated_at = ?2
             WHERE id = ?1 AND status = 'new'",
            rusqlite::params![id, ms, by],
        )?;
        self.after_transition(id, updated)
    }

    /// Moves an open alert to `resolved`.
    pub fn resolve_alert(
        &self,
        id: &str,
        by: Option<&str>,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<PerformanceAlert> {
        let ms = to_millis(at);
        let updated = self.conn().execute(
            "UPDATE performance_alerts
             SET status = 'resolved', resolved_at = ?2, resolved_by = ?3,
                 resolution_notes = COALESCE(?4, resolution_notes), updated_at = ?2
             WHERE id = ?1 AND status IN ('new', 'acknowledged', 'investigating')",
            rusqlite::params![id, ms, by, notes],
        )?;
        self.after_transition(id, updated)
    }

    /// Returns the alert after a status update. Alerts the update did not
    /// apply to are returned unchanged; unknown ids are `NotFound`.
    fn after_transition(&self, id: &str, updated: usize) -> Result<PerformanceAlert> {
        let alert = self.get_alert(id)?.ok_or_else(|| StorageError::NotFound {
            entity: "alert",
            id: id.to_string(),
        })?;
        if updated == 0 {
            tracing::debug!(alert_id = %id, status = %alert.status, "Alert status unchanged");
        }
        Ok(alert)
    }

    pub fn alert_dashboard(&self, from: DateTime<Utc>) -> Result<AlertDashboard> {
        let from_ms = to_millis(from);
        let conn = self.conn();

        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM performance_alerts WHERE alert_timestamp >= ?1",
            rusqlite::params![from_ms],
            |row| row.get(0),
        )?;

        let mut severity_distribution: BTreeMap<String, u64> = Severity::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        let mut status_distribution: BTreeMap<String, u64> = AlertStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();

        for (column, target) in [
            ("severity", &mut severity_distribution),
            ("status", &mut status_distribution),
        ] {
            let mut stmt = conn.prepare(&format!(
                "SELECT {column}, COUNT(*) FROM performance_alerts
                 WHERE alert_timestamp >= ?1 GROUP BY {column}"
            ))?;
            let rows = stmt.query_map(rusqlite::params![from_ms], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (key, count) = row?;
                *target.entry(key).or_insert(0) += count as u64;
            }
        }

        let safety_critical: i64 = conn.query_row(
            "SELECT COUNT(*) FROM performance_alerts
             WHERE alert_timestamp >= ?1 AND safety_critical = 1",
            rusqlite::params![from_ms],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT equipment_id, COUNT(*) AS alert_count FROM performance_alerts
             WHERE alert_timestamp >= ?1 AND equipment_id IS NOT NULL
             GROUP BY equipment_id ORDER BY alert_count DESC, equipment_id ASC LIMIT 10",
        )?;
        let rows = stmt.query_map(rusqlite::params![from_ms], |row| {
            Ok(EquipmentAlertCount {
                equipment_id: row.get(0)?,
                alert_count: row.get::<_, i64>(1)? as u64,
            })
        })?;
        let top_equipment_alerts = rows.collect::<rusqlite::Result<Vec<_>>>()?;

        let production_impact = conn.query_row(
            "SELECT COALESCE(SUM(production_impact_bpd), 0.0), COALESCE(SUM(estimated_downtime_hours), 0.0), COUNT(*)
             FROM performance_alerts
             WHERE alert_timestamp >= ?1
               AND (production_impact_bpd IS NOT NULL OR estimated_downtime_hours IS NOT NULL)",
            rusqlite::params![from_ms],
            |row| {
                Ok(ProductionImpact {
                    total_production_impact_bpd: row.get(0)?,
                    total_estimated_downtime_hours: row.get(1)?,
                    alerts_with_impact: row.get::<_, i64>(2)? as u64,
                })
            },
        )?;

        Ok(AlertDashboard {
            from,
            total_alerts: total as u64,
            severity_distribution,
            status_distribution,
            safety_critical_alerts: safety_critical as u64,
            top_equipment_alerts,
            production_impact,
        })
    }

    fn row_to_alert(row: &rusqlite::Row) -> Result<PerformanceAlert> {
        let alert_type: String = row.get(4)?;
        let severity: String = row.get(5)?;
        let status: String = row.get(10)?;
        let safety_critical: i32 = row.get(20)?;
        Ok(PerformanceAlert {
            id: row.get(0)?,
            equipment_id: row.get(1)?,
            facility_id: row.get(2)?,
            well_id: row.get(3)?,
            alert_type: parse_column("alert_type", &alert_type)?,
            severity: parse_column("severity", &severity)?,
            priority: row.get(6)?,
            title: row.get(7)?,
            description: row.get(8)?,
            recommendation: row.get(9)?,
            status: parse_column("status", &status)?,
            alert_timestamp: from_millis(row.get(11)?),
            acknowledged_at: from_opt_millis(row.get(12)?),
            resolved_at: from_opt_millis(row.get(13)?),
            threshold_id: row.get(14)?,
            measured_value: row.get(15)?,
            threshold_value: row.get(16)?,
            measurement_unit: row.get(17)?,
            production_impact_bpd: row.get(18)?,
            estimated_downtime_hours: row.get(19)?,
            safety_critical: safety_critical != 0,
            acknowledged_by: row.get(21)?,
            resolved_by: row.get(22)?,
            resolution_notes: row.get(23)?,
            created_at: from_millis(row.get(24)?),
            updated_at: from_millis(row.get(25)?),
        })
    }
}
