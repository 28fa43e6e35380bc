use chrono::{DateTime, Utc};
use prodgap_common::types::{DowntimeAnalysis, DowntimeEvent, DowntimeReason};

use super::{
    from_millis, from_opt_millis, opt_millis, parse_column, to_millis, ProductionStore, SqlFilter,
};
use crate::error::Result;

const DOWNTIME_COLUMNS: &str = "id, equipment_id, start_time, end_time, duration_hours, \
    downtime_reason, planned, safety_related, production_loss_bpd, production_loss_mscfd, \
    financial_impact_usd, analysis_json, created_at, updated_at";

/// Downtime listing filter. `since` bounds `start_time` from below.
#[derive(Debug, Clone, Default)]
pub struct DowntimeFilter {
    pub equipment_id: Option<String>,
    pub planned: Option<bool>,
    pub downtime_reason: Option<DowntimeReason>,
    pub since: Option<DateTime<Utc>>,
}

impl DowntimeFilter {
    fn to_sql(&self) -> SqlFilter {
        let mut f = SqlFilter::default();
        if let Some(since) = self.since {
            f.cmp("start_time", ">=", to_millis(since));
        }
        if let Some(id) = &self.equipment_id {
            f.eq("equipment_id", id.clone());
        }
        if let Some(planned) = self.planned {
            f.eq("planned", planned as i32);
        }
        if let Some(reason) = self.downtime_reason {
            f.eq("downtime_reason", reason.as_str());
        }
        f
    }
}

impl ProductionStore {
    pub fn upsert_downtime_event(&self, e: &DowntimeEvent) -> Result<()> {
        let analysis_json = serde_json::to_string(&e.analysis)?;
        self.conn().execute(
            &format!(
                "INSERT OR REPLACE INTO downtime_events ({DOWNTIME_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
            ),
            rusqlite::params![
                e.id,
                e.equipment_id,
                to_millis(e.start_time),
                opt_millis(e.end_time),
                e.duration_hours,
                e.downtime_reason.as_str(),
                e.planned as i32,
                e.safety_related as i32,
                e.production_loss_bpd,
                e.production_loss_mscfd,
                e.financial_impact_usd,
                analysis_json,
                to_millis(e.created_at),
                to_millis(e.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_downtime_event(&self, id: &str) -> Result<Option<DowntimeEvent>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {DOWNTIME_COLUMNS} FROM downtime_events WHERE id = ?1"
        ))?;
        let mut rows =
            stmt.query_map(rusqlite::params![id], |row| Ok(Self::row_to_downtime(row)))?;
        match rows.next() {
            Some(row) => Ok(Some(row??)),
            None => Ok(None),
        }
    }

    /// Matching events, most recent start first.
    pub fn list_downtime_events(
        &self,
        filter: &DowntimeFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<DowntimeEvent>> {
        let mut f = filter.to_sql();
        let mut sql = format!("SELECT {DOWNTIME_COLUMNS} FROM downtime_events{}", f.where_sql());
        sql.push_str(" ORDER BY start_time DESC, id DESC");
        sql.push_str(&f.page_sql(limit, offset));

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(f.param_refs().as_slice(), |row| {
            Ok(Self::row_to_downtime(row))
        })?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row??);
        }
        Ok(items)
    }

    pub fn count_downtime_events(&self, filter: &DowntimeFilter) -> Result<u64> {
        let f = filter.to_sql();
        let sql = format!("SELECT COUNT(*) FROM downtime_events{}", f.where_sql());
        let count: i64 = self
            .conn()
            .query_row(&sql, f.param_refs().as_slice(), |row| row.get(0))?;
        Ok(count as u64)
    }

    fn row_to_downtime(row: &rusqlite::Row) -> Result<DowntimeEvent> {
        let reason: String = row.get(5)?;
        let planned: i32 = row.get(6)?;
        let safety_related: i32 = row.get(7)?;
        let analysis_json: Option<String> = row.get(11)?;
        let analysis: DowntimeAnalysis = match analysis_json.as_deref() {
            Some(json) => serde_json::from_str(json)?,
            None => DowntimeAnalysis::default(),
        };
        Ok(DowntimeEvent {
            id: row.get(0)?,
            equipment_id: row.get(1)?,
            start_time: from_millis(row.get(2)?),
            end_time: from_opt_millis(row.get(3)?),
            duration_hours: row.get(4)?,
            downtime_reason: parse_column("downtime_reason", &reason)?,
            planned: planned != 0,
            safety_related: safety_related != 0,
            production_loss_bpd: row.get(8)?,
            production_loss_mscfd: row.get(9)?,
            financial_impact_usd: row.get(10)?,
            analysis,
            created_at: from_millis(row.get(12)?),
            updated_at: from_millis(row.get(13)?),
        })
    }
}
