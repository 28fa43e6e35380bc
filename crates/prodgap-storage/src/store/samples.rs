use chrono::{DateTime, Utc};
use prodgap_common::types::PerformanceSample;

use super::{from_millis, to_millis, ProductionStore};
use crate::error::Result;

const SAMPLE_COLUMNS: &str = "id, equipment_id, timestamp, throughput, efficiency, availability, \
    pressure, temperature, flow_rate, data_quality, measurement_source, throughput_unit, \
    pressure_unit, temperature_unit, flow_unit";

impl ProductionStore {
    /// Appends a sample. Samples are never updated.
    pub fn insert_sample(&self, s: &PerformanceSample) -> Result<()> {
        self.conn().execute(
            &format!(
                "INSERT INTO performance_samples ({SAMPLE_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
            ),
            rusqlite::params![
                s.id,
                s.equipment_id,
                to_millis(s.timestamp),
                s.throughput,
                s.efficiency,
                s.availability,
                s.pressure,
                s.temperature,
                s.flow_rate,
                s.data_quality,
                s.measurement_source,
                s.throughput_unit,
                s.pressure_unit,
                s.temperature_unit,
                s.flow_unit,
            ],
        )?;
        Ok(())
    }

    /// Most recent samples for one equipment, newest first.
    pub fn recent_samples(&self, equipment_id: &str, limit: usize) -> Result<Vec<PerformanceSample>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SAMPLE_COLUMNS} FROM performance_samples
             WHERE equipment_id = ?1 ORDER BY timestamp DESC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(rusqlite::params![equipment_id, limit as i64], |row| {
            Self::row_to_sample(row)
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Samples in `[from, to]` in chronological order.
    pub fn samples_between(
        &self,
        equipment_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PerformanceSample>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SAMPLE_COLUMNS} FROM performance_samples
             WHERE equipment_id = ?1 AND timestamp >= ?2 AND timestamp <= ?3
             ORDER BY timestamp ASC"
        ))?;
        let rows = stmt.query_map(
            rusqlite::params![equipment_id, to_millis(from), to_millis(to)],
            Self::row_to_sample,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn row_to_sample(row: &rusqlite::Row) -> rusqlite::Result<PerformanceSample> {
        Ok(PerformanceSample {
            id: row.get(0)?,
            equipment_id: row.get(1)?,
            timestamp: from_millis(row.get(2)?),
            throughput: row.get(3)?,
            efficiency: row.get(4)?,
            availability: row.get(5)?,
            pressure: row.get(6)?,
            temperature: row.get(7)?,
            flow_rate: row.get(8)?,
            data_quality: row.get(9)?,
            measurement_source: row.get(10)?,
            throughput_unit: row.get(11)?,
            pressure_unit: row.get(12)?,
            temperature_unit: row.get(13)?,
            flow_unit: row.get(14)?,
        })
    }
}
