use chrono::Utc;
use prodgap_common::types::{Connection, Equipment, EquipmentStatus, NetworkType};
use prodgap_common::{CoreError, Result};
use std::collections::HashMap;

/// In-memory directed graph of equipment and their connections.
///
/// Adjacency lists hold connection ids and are kept sorted, so every
/// neighbour query returns edges in a reproducible order.
#[derive(Debug, Default, Clone)]
pub struct EquipmentGraph {
    equipment: HashMap<String, Equipment>,
    connections: HashMap<String, Connection>,
    /// equipment id -> ids of connections leaving it
    outgoing: HashMap<String, Vec<String>>,
    /// equipment id -> ids of connections entering it
    incoming: HashMap<String, Vec<String>>,
}

impl EquipmentGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an equipment node. Existing connections are kept.
    pub fn add_equipment(&mut self, node: Equipment) {
        self.equipment.insert(node.id.clone(), node);
    }

    /// Inserts or replaces a connection.
    ///
    /// Both endpoints must already be present. Cycles are accepted.
    pub fn add_connection(&mut self, edge: Connection) -> Result<()> {
        for endpoint in [&edge.source_equipment_id, &edge.target_equipment_id] {
            if !self.equipment.contains_key(endpoint) {
                return Err(CoreError::not_found("equipment", endpoint.as_str()));
            }
        }

        if self.connections.contains_key(&edge.id) {
            self.unlink(&edge.id);
        }

        insert_sorted(
            self.outgoing
                .entry(edge.source_equipment_id.clone())
                .or_default(),
            &edge.id,
        );
        insert_sorted(
            self.incoming
                .entry(edge.target_equipment_id.clone())
                .or_default(),
            &edge.id,
        );
        self.connections.insert(edge.id.clone(), edge);
        Ok(())
    }

    pub fn equipment(&self, id: &str) -> Result<&Equipment> {
        self.equipment
            .get(id)
            .ok_or_else(|| CoreError::not_found("equipment", id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.equipment.contains_key(id)
    }

    pub fn connection(&self, id: &str) -> Option<&Connection> {
        self.connections.get(id)
    }

    /// Connections leaving `equipment_id`, active or not, ordered by id.
    pub fn outgoing(&self, equipment_id: &str, network: Option<NetworkType>) -> Vec<&Connection> {
        self.collect(self.outgoing.get(equipment_id), network)
    }

    /// Connections entering `equipment_id`, active or not, ordered by id.
    pub fn incoming(&self, equipment_id: &str, network: Option<NetworkType>) -> Vec<&Connection> {
        self.collect(self.incoming.get(equipment_id), network)
    }

    fn collect(&self, ids: Option<&Vec<String>>, network: Option<NetworkType>) -> Vec<&Connection> {
        ids.map(|ids| {
            ids.iter()
                .filter_map(|id| self.connections.get(id))
                .filter(|c| network.map_or(true, |n| c.network_type == n))
                .collect()
        })
        .unwrap_or_default()
    }

    /// Applies a telemetry update to an equipment node.
    pub fn update_status(
        &mut self,
        id: &str,
        status: Option<EquipmentStatus>,
        throughput: Option<f64>,
        efficiency: Option<f64>,
    ) -> Result<&Equipment> {
        let node = self
            .equipment
            .get_mut(id)
            .ok_or_else(|| CoreError::not_found("equipment", id))?;
        if let Some(status) = status {
            node.status = status;
        }
        if throughput.is_some() {
            node.current_throughput = throughput;
        }
        if efficiency.is_some() {
            node.efficiency = efficiency;
        }
        node.updated_at = Utc::now();
        Ok(node)
    }

    /// Removes a node together with every connection touching it.
    pub fn remove_equipment(&mut self, id: &str) -> Option<Equipment> {
        let removed = self.equipment.remove(id)?;

        let mut edge_ids: Vec<String> = Vec::new();
        edge_ids.extend(self.outgoing.remove(id).unwrap_or_default());
        edge_ids.extend(self.incoming.remove(id).unwrap_or_default());
        for edge_id in edge_ids {
            self.unlink(&edge_id);
        }

        tracing::debug!(equipment_id = %id, "Removed equipment from flow graph");
        Some(removed)
    }

    pub fn equipment_count(&self) -> usize {
        self.equipment.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn unlink(&mut self, edge_id: &str) {
        let Some(edge) = self.connections.remove(edge_id) else {
            return;
        };
        if let Some(ids) = self.outgoing.get_mut(&edge.source_equipment_id) {
            ids.retain(|id| id != edge_id);
        }
        if let Some(ids) = self.incoming.get_mut(&edge.target_equipment_id) {
            ids.retain(|id| id != edge_id);
        }
    }
}

fn insert_sorted(ids: &mut Vec<String>, id: &str) {
    if let Err(pos) = ids.binary_search_by(|existing| existing.as_str().cmp(id)) {
        ids.insert(pos, id.to_string());
    }
}
