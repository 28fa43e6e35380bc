use chrono::Utc;
use prodgap_common::types::{
    Connection, Equipment, EquipmentDetails, EquipmentStatus, EquipmentType,
};

use super::{
    from_millis, from_opt_millis, opt_millis, parse_column, to_millis, ProductionStore, SqlFilter,
};
use crate::error::{Result, StorageError};

const EQUIPMENT_COLUMNS: &str = "id, facility_id, equipment_type, name, tag_number, status, \
    is_critical, design_capacity, current_throughput, efficiency, capacity_unit, \
    location_description, elevation, last_maintenance_date, next_maintenance_date, \
    commissioned_date, details_json, created_at, updated_at";

const CONNECTION_COLUMNS: &str = "id, source_equipment_id, target_equipment_id, connection_type, \
    network_type, is_active, max_capacity, current_flow, capacity_unit, \
    connection_point_source, connection_point_target, created_at, updated_at";

/// Equipment catalogue filter.
#[derive(Debug, Clone, Default)]
pub struct EquipmentFilter {
    pub equipment_type: Option<EquipmentType>,
    pub status: Option<EquipmentStatus>,
    pub facility_id: Option<String>,
    pub is_critical: Option<bool>,
}

impl EquipmentFilter {
    fn to_sql(&self) -> SqlFilter {
        let mut f = SqlFilter::default();
        if let Some(ty) = self.equipment_type {
            f.eq("equipment_type", ty.as_str());
        }
        if let Some(status) = self.status {
            f.eq("status", status.as_str());
        }
        if let Some(facility_id) = &self.facility_id {
            f.eq("facility_id", facility_id.clone());
        }
        if let Some(critical) = self.is_critical {
            f.eq("is_critical", critical as i32);
        }
        f
    }
}

impl ProductionStore {
    // ---- equipment CRUD ----

    /// Inserts or replaces an equipment record.
    pub fn upsert_equipment(&self, eq: &Equipment) -> Result<()> {
        let details_json = eq
            .details
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        self.conn().execute(
            &format!(
                "INSERT OR REPLACE INTO equipment ({EQUIPMENT_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)"
            ),
            rusqlite::params![
                eq.id,
                eq.facility_id,
                eq.equipment_type.as_str(),
                eq.name,
                eq.tag_number,
                eq.status.as_str(),
                eq.is_critical as i32,
                eq.design_capacity,
                eq.current_throughput,
                eq.efficiency,
                eq.capacity_unit,
                eq.location_description,
                eq.elevation,
                opt_millis(eq.last_maintenance_date),
                opt_millis(eq.next_maintenance_date),
                opt_millis(eq.commissioned_date),
                details_json,
                to_millis(eq.created_at),
                to_millis(eq.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_equipment(&self, id: &str) -> Result<Option<Equipment>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare(&format!("SELECT {EQUIPMENT_COLUMNS} FROM equipment WHERE id = ?1"))?;
        let mut rows =
            stmt.query_map(rusqlite::params![id], |row| Ok(Self::row_to_equipment(row)))?;
        match rows.next() {
            Some(row) => Ok(Some(row??)),
            None => Ok(None),
        }
    }

    pub fn list_equipment(
        &self,
        filter: &EquipmentFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Equipment>> {
        let mut f = filter.to_sql();
        let mut sql = format!("SELECT {EQUIPMENT_COLUMNS} FROM equipment{}", f.where_sql());
        sql.push_str(" ORDER BY id");
        sql.push_str(&f.page_sql(limit, offset));

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(f.param_refs().as_slice(), |row| {
            Ok(Self::row_to_equipment(row))
        })?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row??);
        }
        Ok(items)
    }

    pub fn count_equipment(&self, filter: &EquipmentFilter) -> Result<u64> {
        let f = filter.to_sql();
        let sql = format!("SELECT COUNT(*) FROM equipment{}", f.where_sql());
        let count: i64 = self
            .conn()
            .query_row(&sql, f.param_refs().as_slice(), |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Every equipment record, for rebuilding the in-memory graph.
    pub fn all_equipment(&self) -> Result<Vec<Equipment>> {
        self.list_equipment(&EquipmentFilter::default(), usize::MAX >> 1, 0)
    }

    /// Applies a telemetry update; `None` fields are left untouched.
    pub fn update_equipment_status(
        &self,
        id: &str,
        status: Option<EquipmentStatus>,
        current_throughput: Option<f64>,
        efficiency: Option<f64>,
    ) -> Result<Equipment> {
        let now = to_millis(Utc::now());
        let mut sets = vec!["updated_at = ?1".to_string()];
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(now)];
        let mut idx = 2;

        if let Some(status) = status {
            sets.push(format!("status = ?{idx}"));
            params.push(Box::new(status.as_str()));
            idx += 1;
        }
        if let Some(v) = current_throughput {
            sets.push(format!("current_throughput = ?{idx}"));
            params.push(Box::new(v));
            idx += 1;
        }
        if let Some(v) = efficiency {
            sets.push(format!("efficiency = ?{idx}"));
            params.push(Box::new(v));
            idx += 1;
        }

        let sql = format!("UPDATE equipment SET {} WHERE id = ?{idx}", sets.join(", "));
        params.push(Box::new(id.to_string()));

        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| p.as_ref()).collect();
        let updated = self.conn().execute(&sql, param_refs.as_slice())?;
        if updated == 0 {
            return Err(StorageError::NotFound {
                entity: "equipment",
                id: id.to_string(),
            });
        }
        self.get_equipment(id)?.ok_or_else(|| StorageError::NotFound {
            entity: "equipment",
            id: id.to_string(),
        })
    }

    /// Deletes an equipment record with its connections, samples,
    /// thresholds, alerts and downtime events.
    pub fn delete_equipment(&self, id: &str) -> Result<bool> {
        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM equipment_connections WHERE source_equipment_id = ?1 OR target_equipment_id = ?1",
            rusqlite::params![id],
        )?;
        for table in [
            "performance_samples",
            "kpi_thresholds",
            "performance_alerts",
            "downtime_events",
        ] {
            tx.execute(
                &format!("DELETE FROM {table} WHERE equipment_id = ?1"),
                rusqlite::params![id],
            )?;
        }
        let deleted = tx.execute("DELETE FROM equipment WHERE id = ?1", rusqlite::params![id])?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    // ---- equipment_connections ----

    pub fn upsert_connection(&self, c: &Connection) -> Result<()> {
        self.conn().execute(
            &format!(
                "INSERT OR REPLACE INTO equipment_connections ({CONNECTION_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
            ),
            rusqlite::params![
                c.id,
                c.source_equipment_id,
                c.target_equipment_id,
                c.connection_type.as_str(),
                c.network_type.as_str(),
                c.is_active as i32,
                c.max_capacity,
                c.current_flow,
                c.capacity_unit,
                c.connection_point_source,
                c.connection_point_target,
                to_millis(c.created_at),
                to_millis(c.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn all_connections(&self) -> Result<Vec<Connection>> {
        self.query_connections("", rusqlite::params![])
    }

    /// Connections leaving `equipment_id`.
    pub fn connections_from(&self, equipment_id: &str) -> Result<Vec<Connection>> {
        self.query_connections(
            " WHERE source_equipment_id = ?1",
            rusqlite::params![equipment_id],
        )
    }

    /// Connections entering `equipment_id`.
    pub fn connections_to(&self, equipment_id: &str) -> Result<Vec<Connection>> {
        self.query_connections(
            " WHERE target_equipment_id = ?1",
            rusqlite::params![equipment_id],
        )
    }

    fn query_connections(
        &self,
        where_sql: &str,
        params: &[&dyn rusqlite::types::ToSql],
    ) -> Result<Vec<Connection>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONNECTION_COLUMNS} FROM equipment_connections{where_sql} ORDER BY id"
        ))?;
        let rows = stmt.query_map(params, |row| Ok(Self::row_to_connection(row)))?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row??);
        }
        Ok(items)
    }

    // ---- Row mappers ----

    fn row_to_equipment(row: &rusqlite::Row) -> Result<Equipment> {
        let equipment_type: String = row.get(2)?;
        let status: String = row.get(5)?;
        let is_critical: i32 = row.get(6)?;
        let details_json: Option<String> = row.get(16)?;
        let details: Option<EquipmentDetails> = details_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        Ok(Equipment {
            id: row.get(0)?,
            facility_id: row.get(1)?,
            equipment_type: parse_column("equipment_type", &equipment_type)?,
            name: row.get(3)?,
            tag_number: row.get(4)?,
            status: parse_column("status", &status)?,
            is_critical: is_critical != 0,
            design_capacity: row.get(7)?,
            current_throughput: row.get(8)?,
            efficiency: row.get(9)?,
            capacity_unit: row.get(10)?,
            location_description: row.get(11)?,
            elevation: row.get(12)?,
            last_maintenance_date: from_opt_millis(row.get(13)?),
            next_maintenance_date: from_opt_millis(row.get(14)?),
            commissioned_date: from_opt_millis(row.get(15)?),
            details,
            created_at: from_millis(row.get(17)?),
            updated_at: from_millis(row.get(18)?),
        })
    }

    fn row_to_connection(row: &rusqlite::Row) -> Result<Connection> {
        let connection_type: String = row.get(3)?;
        let network_type: String = row.get(4)?;
        let is_active: i32 = row.get(5)?;
        Ok(Connection {
            id: row.get(0)?,
            source_equipment_id: row.get(1)?,
            target_equipment_id: row.get(2)?,
            connection_type: parse_column("connection_type", &connection_type)?,
            network_type: parse_column("network_type", &network_type)?,
            is_active: is_active != 0,
            max_capacity: row.get(6)?,
            current_flow: row.get(7)?,
            capacity_unit: row.get(8)?,
            connection_point_source: row.get(9)?,
            connection_point_target: row.get(10)?,
            created_at: from_millis(row.get(11)?),
            updated_at: from_millis(row.get(12)?),
        })
    }
}
