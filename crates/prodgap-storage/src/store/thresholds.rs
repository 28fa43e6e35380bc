use chrono::{DateTime, Utc};
use prodgap_common::types::{KpiThreshold, ThresholdScope};

use super::{
    from_millis, from_opt_millis, opt_millis, parse_column, to_millis, ProductionStore, SqlFilter,
};
use crate::error::{Result, StorageError};

const THRESHOLD_COLUMNS: &str = "id, threshold_name, equipment_id, facility_id, well_id, kpi_name, \
    kpi_description, measurement_unit, upper_limit, lower_limit, target_value, alert_severity, \
    hysteresis_percentage, minimum_duration_minutes, is_active, effective_from, effective_to, \
    created_by, approved_by, comments, created_at, updated_at";

/// Threshold listing filter.
#[derive(Debug, Clone, Default)]
pub struct ThresholdFilter {
    pub equipment_id: Option<String>,
    pub facility_id: Option<String>,
    pub kpi_name: Option<String>,
    pub is_active: Option<bool>,
    /// Only thresholds whose effective window contains this instant.
    pub effective_at: Option<DateTime<Utc>>,
}

impl ThresholdFilter {
    fn to_sql(&self) -> SqlFilter {
        let mut f = SqlFilter::default();
        if let Some(id) = &self.equipment_id {
            f.eq("equipment_id", id.clone());
        }
        if let Some(id) = &self.facility_id {
            f.eq("facility_id", id.clone());
        }
        if let Some(kpi) = &self.kpi_name {
            f.eq("kpi_name", kpi.clone());
        }
        if let Some(active) = self.is_active {
            f.eq("is_active", active as i32);
        }
        if let Some(at) = self.effective_at {
            let ms = to_millis(at);
            f.cmp("effective_from", "<=", ms);
            f.raw("(effective_to IS NULL OR effective_to >= ?)", ms);
        }
        f
    }
}

impl ProductionStore {
    pub fn upsert_threshold(&self, t: &KpiThreshold) -> Result<()> {
        self.conn().execute(
            &format!(
                "INSERT OR REPLACE INTO kpi_thresholds ({THRESHOLD_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)"
            ),
            rusqlite::params![
                t.id,
                t.threshold_name,
                t.scope.equipment_id(),
                t.scope.facility_id(),
                t.scope.well_id(),
                t.kpi_name,
                t.kpi_description,
                t.measurement_unit,
                t.upper_limit,
                t.lower_limit,
                t.target_value,
                t.alert_severity.as_str(),
                t.hysteresis_percentage,
                t.minimum_duration_minutes,
                t.is_active as i32,
                to_millis(t.effective_from),
                opt_millis(t.effective_to),
                t.created_by,
                t.approved_by,
                t.comments,
                to_millis(t.created_at),
                to_millis(t.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_threshold(&self, id: &str) -> Result<Option<KpiThreshold>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {THRESHOLD_COLUMNS} FROM kpi_thresholds WHERE id = ?1"
        ))?;
        let mut rows =
            stmt.query_map(rusqlite::params![id], |row| Ok(Self::row_to_threshold(row)))?;
        match rows.next() {
            Some(row) => Ok(Some(row??)),
            None => Ok(None),
        }
    }

    pub fn list_thresholds(
        &self,
        filter: &ThresholdFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<KpiThreshold>> {
        let mut f = filter.to_sql();
        let mut sql = format!("SELECT {THRESHOLD_COLUMNS} FROM kpi_thresholds{}", f.where_sql());
        sql.push_str(" ORDER BY created_at DESC, id");
        sql.push_str(&f.page_sql(limit, offset));

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(f.param_refs().as_slice(), |row| {
            Ok(Self::row_to_threshold(row))
        })?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row??);
        }
        Ok(items)
    }

    pub fn count_thresholds(&self, filter: &ThresholdFilter) -> Result<u64> {
        let f = filter.to_sql();
        let sql = format!("SELECT COUNT(*) FROM kpi_thresholds{}", f.where_sql());
        let count: i64 = self
            .conn()
            .query_row(&sql, f.param_refs().as_slice(), |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Every stored threshold, for loading the evaluator.
    pub fn all_thresholds(&self) -> Result<Vec<KpiThreshold>> {
        self.list_thresholds(&ThresholdFilter::default(), usize::MAX >> 1, 0)
    }

    pub fn delete_threshold(&self, id: &str) -> Result<bool> {
        let deleted = self.conn().execute(
            "DELETE FROM kpi_thresholds WHERE id = ?1",
            rusqlite::params![id],
        )?;
        Ok(deleted > 0)
    }

    fn row_to_threshold(row: &rusqlite::Row) -> Result<KpiThreshold> {
        let id: String = row.get(0)?;
        let equipment_id: Option<String> = row.get(2)?;
        let facility_id: Option<String> = row.get(3)?;
        let well_id: Option<String> = row.get(4)?;
        let scope = match (equipment_id, facility_id, well_id) {
            (Some(e), _, _) => ThresholdScope::Equipment(e),
            (None, Some(f), _) => ThresholdScope::Facility(f),
            (None, None, Some(w)) => ThresholdScope::Well(w),
            (None, None, None) => {
                return Err(StorageError::InvalidRow {
                    entity: "kpi_threshold",
                    id,
                    reason: "no equipment, facility or well id",
                })
            }
        };
        let severity: String = row.get(11)?;
        let is_active: i32 = row.get(14)?;
        Ok(KpiThreshold {
            id,
            threshold_name: row.get(1)?,
            scope,
            kpi_name: row.get(5)?,
            kpi_description: row.get(6)?,
            measurement_unit: row.get(7)?,
            upper_limit: row.get(8)?,
            lower_limit: row.get(9)?,
            target_value: row.get(10)?,
            alert_severity: parse_column("alert_severity", &severity)?,
            hysteresis_percentage: row.get(12)?,
            minimum_duration_minutes: row.get(13)?,
            is_active: is_active != 0,
            effective_from: from_millis(row.get(15)?),
            effective_to: from_opt_millis(row.get(16)?),
            created_by: row.get(17)?,
            approved_by: row.get(18)?,
            comments: row.get(19)?,
            created_at: from_millis(row.get(20)?),
            updated_at: from_millis(row.get(21)?),
        })
    }
}
