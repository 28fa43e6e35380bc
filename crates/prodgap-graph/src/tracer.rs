use crate::store::EquipmentGraph;
use prodgap_common::types::{
    Connection, ConnectionType, EquipmentStatus, EquipmentType, NetworkType,
};
use prodgap_common::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Follow outgoing edges.
    #[default]
    Downstream,
    /// Follow incoming edges.
    Upstream,
}

impl FromStr for Direction {
    type Err = CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "downstream" => Ok(Self::Downstream),
            "upstream" => Ok(Self::Upstream),
            other => Err(CoreError::Validation(format!("unknown direction: {other}"))),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Downstream => write!(f, "downstream"),
            Self::Upstream => write!(f, "upstream"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TraceRequest {
    pub source_id: String,
    pub network: Option<NetworkType>,
    pub max_depth: i64,
    pub direction: Direction,
}

impl TraceRequest {
    pub fn downstream(source_id: impl Into<String>, network: Option<NetworkType>, max_depth: i64) -> Self {
        Self {
            source_id: source_id.into(),
            network,
            max_depth,
            direction: Direction::Downstream,
        }
    }

    pub fn upstream(source_id: impl Into<String>, network: Option<NetworkType>, max_depth: i64) -> Self {
        Self {
            direction: Direction::Upstream,
            ..Self::downstream(source_id, network, max_depth)
        }
    }
}

/// One reached equipment together with the connection used to reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathNode {
    pub equipment_id: String,
    pub equipment_name: String,
    pub equipment_type: EquipmentType,
    pub status: EquipmentStatus,
    pub connection_id: String,
    pub connection_type: ConnectionType,
    pub network_type: NetworkType,
    pub max_capacity: Option<f64>,
    pub current_flow: Option<f64>,
    pub capacity_unit: Option<String>,
    pub is_active: bool,
    /// 1 for direct neighbours of the source.
    pub depth: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub downstream: Vec<PathNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upstream: Vec<PathNode>,
}

impl PathNode {
    pub fn children(&self) -> &[PathNode] {
        if self.downstream.is_empty() {
            &self.upstream
        } else {
            &self.downstream
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathTree {
    pub source_equipment_id: String,
    pub source_equipment_name: String,
    pub network_type: Option<NetworkType>,
    pub direction: Direction,
    pub max_depth: u32,
    pub path: Vec<PathNode>,
}

impl PathTree {
    /// Number of emitted nodes, counting shared equipment once per branch.
    pub fn node_count(&self) -> usize {
        fn count(nodes: &[PathNode]) -> usize {
            nodes.iter().map(|n| 1 + count(n.children())).sum()
        }
        count(&self.path)
    }

    /// Every emitted equipment id in depth-first order.
    pub fn equipment_ids(&self) -> Vec<&str> {
        fn walk<'a>(nodes: &'a [PathNode], out: &mut Vec<&'a str>) {
            for node in nodes {
                out.push(&node.equipment_id);
                walk(node.children(), out);
            }
        }
        let mut out = Vec::new();
        walk(&self.path, &mut out);
        out
    }
}

/// Traces the equipment reachable from `req.source_id`.
///
/// Only active connections are followed, restricted to `req.network` when
/// set. Cycle protection is per path: a node already on the current path is
/// never re-entered, while a node reachable through two branches is reported
/// under both.
pub fn trace(graph: &EquipmentGraph, req: &TraceRequest) -> Result<PathTree> {
    if req.max_depth < 0 {
        return Err(CoreError::Validation(format!(
            "max_depth must not be negative (got {})",
            req.max_depth
        )));
    }
    let source = graph.equipment(&req.source_id)?;
    let max_depth = u32::try_from(req.max_depth).unwrap_or(u32::MAX);

    let mut on_path: HashSet<&str> = HashSet::new();
    on_path.insert(source.id.as_str());
    let path = Walker {
        graph,
        network: req.network,
        direction: req.direction,
        max_depth,
    }
    .expand(&source.id, 0, &mut on_path);

    tracing::debug!(
        source = %req.source_id,
        direction = %req.direction,
        max_depth,
        nodes = path.len(),
        "Traced flow path"
    );

    Ok(PathTree {
        source_equipment_id: source.id.clone(),
        source_equipment_name: source.name.clone(),
        network_type: req.network,
        direction: req.direction,
        max_depth,
        path,
    })
}

struct Walker<'g> {
    graph: &'g EquipmentGraph,
    network: Option<NetworkType>,
    direction: Direction,
    max_depth: u32,
}

impl<'g> Walker<'g> {
    fn expand(&self, from: &str, depth: u32, on_path: &mut HashSet<&'g str>) -> Vec<PathNode> {
        if depth >= self.max_depth {
            return Vec::new();
        }

        let edges = match self.direction {
            Direction::Downstream => self.graph.outgoing(from, self.network),
            Direction::Upstream => self.graph.incoming(from, self.network),
        };

        let mut nodes = Vec::new();
        for edge in edges.into_iter().filter(|c| c.is_active) {
            let next = match self.direction {
                Direction::Downstream => edge.target_equipment_id.as_str(),
                Direction::Upstream => edge.source_equipment_id.as_str(),
            };
            if on_path.contains(next) {
                continue;
            }
            let Ok(equipment) = self.graph.equipment(next) else {
                tracing::warn!(connection_id = %edge.id, equipment_id = %next, "Dangling connection skipped");
                continue;
            };

            on_path.insert(next);
            let children = self.expand(next, depth + 1, on_path);
            on_path.remove(next);

            let mut node = path_node(edge, equipment, depth + 1);
            match self.direction {
                Direction::Downstream => node.downstream = children,
                Direction::Upstream => node.upstream = children,
            }
            nodes.push(node);
        }
        nodes
    }
}

fn path_node(edge: &Connection, equipment: &prodgap_common::types::Equipment, depth: u32) -> PathNode {
    PathNode {
        equipment_id: equipment.id.clone(),
        equipment_name: equipment.name.clone(),
        equipment_type: equipment.equipment_type,
        status: equipment.status,
        connection_id: edge.id.clone(),
        connection_type: edge.connection_type,
        network_type: edge.network_type,
        max_capacity: edge.max_capacity,
        current_flow: edge.current_flow,
        capacity_unit: edge.capacity_unit.clone(),
        is_active: edge.is_active,
        depth,
        downstream: Vec::new(),
        upstream: Vec::new(),
    }
}
