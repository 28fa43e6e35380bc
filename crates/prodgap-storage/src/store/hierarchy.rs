use prodgap_common::types::{Asset, Facility, Hub, Well};

use super::{parse_column, ProductionStore};
use crate::error::Result;

impl ProductionStore {
    // ---- Upserts (seed / provisioning) ----

    pub fn upsert_asset(&self, asset: &Asset) -> Result<()> {
        self.conn().execute(
            "INSERT INTO assets (id, name) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
            rusqlite::params![asset.id, asset.name],
        )?;
        Ok(())
    }

    pub fn upsert_hub(&self, hub: &Hub) -> Result<()> {
        self.conn().execute(
            "INSERT INTO hubs (id, asset_id, name) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET asset_id = excluded.asset_id, name = excluded.name",
            rusqlite::params![hub.id, hub.asset_id, hub.name],
        )?;
        Ok(())
    }

    pub fn upsert_facility(&self, facility: &Facility) -> Result<()> {
        self.conn().execute(
            "INSERT INTO facilities (id, hub_id, facility_type, name) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET hub_id = excluded.hub_id,
                 facility_type = excluded.facility_type, name = excluded.name",
            rusqlite::params![
                facility.id,
                facility.hub_id,
                facility.facility_type.as_str(),
                facility.name
            ],
        )?;
        Ok(())
    }

    pub fn upsert_well(&self, well: &Well) -> Result<()> {
        self.conn().execute(
            "INSERT INTO wells (id, facility_id, name, status, priority) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET facility_id = excluded.facility_id,
                 name = excluded.name, status = excluded.status, priority = excluded.priority",
            rusqlite::params![
                well.id,
                well.facility_id,
                well.name,
                well.status.as_str(),
                well.priority
            ],
        )?;
        Ok(())
    }

    // ---- Listings ----

    pub fn list_assets(&self) -> Result<Vec<Asset>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, name FROM assets ORDER BY name, id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Asset {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn list_hubs(&self, asset_id: Option<&str>) -> Result<Vec<Hub>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, asset_id, name FROM hubs
             WHERE (?1 IS NULL OR asset_id = ?1) ORDER BY name, id",
        )?;
        let rows = stmt.query_map(rusqlite::params![asset_id], |row| {
            Ok(Hub {
                id: row.get(0)?,
                asset_id: row.get(1)?,
                name: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn list_facilities(&self, hub_id: Option<&str>) -> Result<Vec<Facility>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, hub_id, facility_type, name FROM facilities
             WHERE (?1 IS NULL OR hub_id = ?1) ORDER BY name, id",
        )?;
        let rows = stmt.query_map(rusqlite::params![hub_id], |row| {
            Ok(Self::row_to_facility(row))
        })?;

        let mut facilities = Vec::new();
        for row in rows {
            facilities.push(row??);
        }
        Ok(facilities)
    }

    pub fn get_facility(&self, id: &str) -> Result<Option<Facility>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id, hub_id, facility_type, name FROM facilities WHERE id = ?1")?;
        let mut rows = stmt.query_map(rusqlite::params![id], |row| Ok(Self::row_to_facility(row)))?;
        match rows.next() {
            Some(row) => Ok(Some(row??)),
            None => Ok(None),
        }
    }

    pub fn list_wells(&self, facility_id: Option<&str>) -> Result<Vec<Well>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, facility_id, name, status, priority FROM wells
             WHERE (?1 IS NULL OR facility_id = ?1) ORDER BY priority IS NULL, priority, name, id",
        )?;
        let rows =
            stmt.query_map(rusqlite::params![facility_id], |row| Ok(Self::row_to_well(row)))?;

        let mut wells = Vec::new();
        for row in rows {
            wells.push(row??);
        }
        Ok(wells)
    }

    pub fn get_well(&self, id: &str) -> Result<Option<Well>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, facility_id, name, status, priority FROM wells WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(rusqlite::params![id], |row| Ok(Self::row_to_well(row)))?;
        match rows.next() {
            Some(row) => Ok(Some(row??)),
            None => Ok(None),
        }
    }

    // ---- Row mappers ----

    fn row_to_facility(row: &rusqlite::Row) -> Result<Facility> {
        let facility_type: String = row.get(2)?;
        Ok(Facility {
            id: row.get(0)?,
            hub_id: row.get(1)?,
            facility_type: parse_column("facility_type", &facility_type)?,
            name: row.get(3)?,
        })
    }

    fn row_to_well(row: &rusqlite::Row) -> Result<Well> {
        let status: String = row.get(3)?;
        Ok(Well {
            id: row.get(0)?,
            facility_id: row.get(1)?,
            name: row.get(2)?,
            status: parse_column("status", &status)?,
            priority: row.get(4)?,
        })
    }
}
