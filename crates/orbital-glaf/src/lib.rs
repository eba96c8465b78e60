//! Orbital GLAF - Graph Layer Analytical Feed
//!
//! Graph view of the live link topology:
//!
//! - Constellation graph rebuilt from the current link set
//! - Shortest-path forwarding tables behind the `Transport` interface
//! - JSON snapshots and Cytoscape export for visualization

use link_topology::{BodyId, Endpoint, LinkKind, TopologyState};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub mod routing;
pub mod snapshot;

pub use routing::{GraphTransport, LinkMetric};
pub use snapshot::{CytoscapeElement, SnapshotLink, SnapshotNode, TopologySnapshot};

/// GLAF errors
#[derive(Error, Debug)]
pub enum GlafError {
    #[error("Node not found: {0}")]
    NodeNotFound(BodyId),
    #[error("No path found between {0} and {1}")]
    NoPath(BodyId, String),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Topology error: {0}")]
    Topology(#[from] link_topology::TopologyError),
    #[error("Orbital error: {0}")]
    Orbital(#[from] orbital_mechanics::OrbitalError),
}

pub type Result<T> = std::result::Result<T, GlafError>;

/// An edge in the constellation graph: one live link
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EdgeData {
    pub a: Endpoint,
    pub b: Endpoint,
    pub kind: LinkKind,
    pub delay_s: f64,
}

impl EdgeData {
    /// Port used by `body` on this edge and the body on the far side
    pub fn leaving(&self, body: BodyId) -> Option<(u8, BodyId)> {
        if self.a.body == body {
            Some((self.a.port, self.b.body))
        } else if self.b.body == body {
            Some((self.b.port, self.a.body))
        } else {
            None
        }
    }
}

/// Undirected graph of bodies and the links between them
#[derive(Debug, Default)]
pub struct ConstellationGraph {
    graph: UnGraph<BodyId, EdgeData>,
    node_index: HashMap<BodyId, NodeIndex>,
}

impl ConstellationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from the current topology
    pub fn from_state(state: &TopologyState) -> Self {
        let mut graph = Self::new();
        for body in state.bodies() {
            graph.add_node(body.id());
        }
        for link in state.links() {
            // Every link endpoint is a known body
            if let (Some(&a), Some(&b)) = (graph.node_index.get(&link.a.body), graph.node_index.get(&link.b.body)) {
                graph.graph.add_edge(
                    a,
                    b,
                    EdgeData {
                        a: link.a,
                        b: link.b,
                        kind: link.kind,
                        delay_s: link.delay.as_secs_f64(),
                    },
                );
            }
        }
        graph
    }

    pub fn add_node(&mut self, body: BodyId) -> NodeIndex {
        let idx = self.graph.add_node(body);
        self.node_index.insert(body, idx);
        idx
    }

    /// Add a link between two already known bodies
    pub fn add_link(&mut self, edge: EdgeData) -> Result<()> {
        let a = self.index_of(edge.a.body)?;
        let b = self.index_of(edge.b.body)?;
        self.graph.add_edge(a, b, edge);
        Ok(())
    }

    pub fn index_of(&self, body: BodyId) -> Result<NodeIndex> {
        self.node_index
            .get(&body)
            .copied()
            .ok_or(GlafError::NodeNotFound(body))
    }

    pub fn inner(&self) -> &UnGraph<BodyId, EdgeData> {
        &self.graph
    }

    pub fn bodies(&self) -> impl Iterator<Item = BodyId> + '_ {
        self.graph.node_weights().copied()
    }

    /// `(port, neighbour, edge)` for every link touching `body`
    pub fn neighbours(&self, body: BodyId) -> Result<Vec<(u8, BodyId, EdgeData)>> {
        let idx = self.index_of(body)?;
        Ok(self
            .graph
            .edges(idx)
            .filter_map(|e| {
                let edge = *e.weight();
                edge.leaving(body).map(|(port, peer)| (port, peer, edge))
            })
            .collect())
    }

    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            total_nodes: self.graph.node_count(),
            total_links: self.graph.edge_count(),
            ..GraphStats::default()
        };
        for body in self.graph.node_weights() {
            if body.is_satellite() {
                stats.satellites += 1;
            } else {
                stats.ground_stations += 1;
            }
        }
        for edge in self.graph.edge_weights() {
            match edge.kind {
                LinkKind::SatToSat => stats.isl_links += 1,
                LinkKind::GroundToSat => stats.gs_links += 1,
            }
        }
        stats
    }
}

/// Graph statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub satellites: usize,
    pub ground_stations: usize,
    pub total_links: usize,
    pub isl_links: usize,
    pub gs_links: usize,
}
