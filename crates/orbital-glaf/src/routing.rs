//! Shortest-path forwarding over the link graph
//!
//! After every topology update the graph is rebuilt and Dijkstra runs once
//! from each addressable destination. Links are symmetric, so the distance
//! map from a destination doubles as every body's distance to it. A body's
//! next hop is the neighbour that lies on a shortest path, lowest port first.

use crate::{ConstellationGraph, GraphStats, Result as GlafResult, GlafError};
use link_topology::{BodyId, Link, TopologyState, Transport};
use petgraph::algo::dijkstra;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::net::Ipv4Addr;
use tracing::{debug, info};

const COST_EPSILON: f64 = 1e-9;

/// Edge weight used for path selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMetric {
    #[default]
    HopCount,
    /// One-way propagation delay in seconds
    Delay,
}

impl LinkMetric {
    fn cost(&self, delay_s: f64) -> f64 {
        match self {
            LinkMetric::HopCount => 1.0,
            LinkMetric::Delay => delay_s,
        }
    }
}

#[derive(Debug, Default)]
pub struct GraphTransport {
    metric: LinkMetric,
    graph: ConstellationGraph,
    destinations: HashMap<Ipv4Addr, BodyId>,
    next_hops: HashMap<(BodyId, BodyId), (u8, BodyId)>,
    stale: bool,
    recomputes: usize,
}

impl GraphTransport {
    pub fn new(metric: LinkMetric) -> Self {
        Self {
            metric,
            ..Self::default()
        }
    }

    pub fn metric(&self) -> LinkMetric {
        self.metric
    }

    pub fn graph(&self) -> &ConstellationGraph {
        &self.graph
    }

    pub fn stats(&self) -> GraphStats {
        self.graph.stats()
    }

    /// Links changed since the tables were last computed
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn recomputes(&self) -> usize {
        self.recomputes
    }

    /// Body that owns `address`, per the last recompute
    pub fn resolve(&self, address: Ipv4Addr) -> Option<BodyId> {
        self.destinations.get(&address).copied()
    }

    pub fn table_len(&self) -> usize {
        self.next_hops.len()
    }

    /// Bodies visited from `from` toward `destination`, both ends included
    pub fn path(&self, from: BodyId, destination: Ipv4Addr) -> GlafResult<Vec<BodyId>> {
        let no_path = || GlafError::NoPath(from, destination.to_string());
        let target = self.resolve(destination).ok_or_else(no_path)?;
        self.graph.index_of(from)?;

        let mut path = vec![from];
        let mut current = from;
        while current != target {
            let (_, next) = self.next_hops.get(&(current, target)).ok_or_else(no_path)?;
            // Tables come from shortest paths, so a walk longer than the
            // graph means they are inconsistent
            if path.len() > self.graph.inner().node_count() {
                return Err(no_path());
            }
            path.push(*next);
            current = *next;
        }
        Ok(path)
    }

    fn collect_destinations(&mut self, state: &TopologyState) -> link_topology::Result<()> {
        self.destinations.clear();
        for station in 0..state.ground_station_count() {
            self.destinations
                .insert(state.ground_address(station)?, BodyId::GroundStation(station));
        }
        for link in state.links() {
            for body in [link.a.body, link.b.body] {
                if let Some(address) = link.addresses.address_of(link, body) {
                    self.destinations.insert(address, body);
                }
            }
        }
        Ok(())
    }

    fn compute_tables(&mut self) {
        self.next_hops.clear();
        let metric = self.metric;
        let graph = self.graph.inner();
        let targets: BTreeSet<BodyId> = self.destinations.values().copied().collect();

        for target in targets {
            let Ok(target_idx) = self.graph.index_of(target) else {
                continue;
            };
            let distance = dijkstra(graph, target_idx, None, |e| metric.cost(e.weight().delay_s));

            for (&node, &own) in &distance {
                if node == target_idx {
                    continue;
                }
                let here = graph[node];
                let mut best: Option<(u8, BodyId)> = None;
                for edge in graph.edges(node) {
                    let Some((port, peer)) = edge.weight().leaving(here) else {
                        continue;
                    };
                    let peer_idx = if edge.source() == node { edge.target() } else { edge.source() };
                    let Some(&via) = distance.get(&peer_idx) else {
                        continue;
                    };
                    let on_shortest = (via + metric.cost(edge.weight().delay_s) - own).abs() <= COST_EPSILON;
                    if on_shortest && best.map_or(true, |(p, _)| port < p) {
                        best = Some((port, peer));
                    }
                }
                if let Some(hop) = best {
                    self.next_hops.insert((here, target), hop);
                }
            }
        }
    }
}

impl Transport for GraphTransport {
    fn link_up(&mut self, link: &Link) {
        debug!("Forwarding tables stale: {} <-> {} up", link.a, link.b);
        self.stale = true;
    }

    fn link_down(&mut self, link: &Link) {
        debug!("Forwarding tables stale: {} <-> {} down", link.a, link.b);
        self.stale = true;
    }

    fn recompute_forwarding_state(&mut self, state: &TopologyState) -> link_topology::Result<()> {
        self.graph = ConstellationGraph::from_state(state);
        self.collect_destinations(state)?;
        self.compute_tables();
        self.stale = false;
        self.recomputes += 1;

        let stats = self.graph.stats();
        info!(
            "Forwarding recomputed: {} links, {} destinations, {} table entries",
            stats.total_links,
            self.destinations.len(),
            self.next_hops.len()
        );
        Ok(())
    }

    fn next_hop(&self, at: BodyId, destination: Ipv4Addr) -> Option<(u8, BodyId)> {
        let target = self.destinations.get(&destination)?;
        self.next_hops.get(&(at, *target)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use link_topology::{ConstellationBuilder, Endpoint, LinkKind, TopologyConfig};
    use nalgebra::Vector3;
    use orbital_mechanics::FixedSite;

    fn sat(i: usize, port: u8) -> Endpoint {
        Endpoint::new(BodyId::Satellite(i), port)
    }

    fn gs(i: usize) -> Endpoint {
        Endpoint::new(BodyId::GroundStation(i), 1)
    }

    fn site(x: f64) -> Box<FixedSite> {
        Box::new(FixedSite::from_ecef(Vector3::new(x, 0.0, 0.0)))
    }

    /// GS0 - S0 - S1 - S2 - GS1 with a long shortcut S0 - S2
    fn create_test_state() -> TopologyState {
        let mut builder = ConstellationBuilder::new();
        for i in 0..3 {
            builder.add_satellite(format!("S{}", i), site(7000.0 + i as f64));
        }
        builder.add_ground_station("GS0", site(6378.0));
        builder.add_ground_station("GS1", site(6379.0));
        let mut state = builder.build(&TopologyConfig::default()).unwrap();

        state.establish_link(sat(0, 1), sat(1, 3), 1000.0, LinkKind::SatToSat).unwrap();
        state.establish_link(sat(1, 1), sat(2, 3), 1000.0, LinkKind::SatToSat).unwrap();
        state.establish_link(sat(0, 2), sat(2, 4), 4500.0, LinkKind::SatToSat).unwrap();
        state.establish_link(gs(0), sat(0, 5), 600.0, LinkKind::GroundToSat).unwrap();
        state.establish_link(gs(1), sat(2, 5), 600.0, LinkKind::GroundToSat).unwrap();
        state
    }

    #[test]
    fn test_hop_count_takes_shortcut() {
        let state = create_test_state();
        let mut transport = GraphTransport::new(LinkMetric::HopCount);
        transport.recompute_forwarding_state(&state).unwrap();

        let gs1 = state.ground_address(1).unwrap();
        assert_eq!(transport.next_hop(BodyId::GroundStation(0), gs1), Some((1, BodyId::Satellite(0))));
        assert_eq!(transport.next_hop(BodyId::Satellite(0), gs1), Some((2, BodyId::Satellite(2))));
        assert_eq!(transport.next_hop(BodyId::Satellite(2), gs1), Some((5, BodyId::GroundStation(1))));
        assert_eq!(transport.next_hop(BodyId::GroundStation(1), gs1), None);
        assert_eq!(
            transport.path(BodyId::GroundStation(0), gs1).unwrap(),
            vec![
                BodyId::GroundStation(0),
                BodyId::Satellite(0),
                BodyId::Satellite(2),
                BodyId::GroundStation(1),
            ]
        );
    }

    #[test]
    fn test_delay_metric_prefers_short_links() {
        let state = create_test_state();
        let mut transport = GraphTransport::new(LinkMetric::Delay);
        transport.recompute_forwarding_state(&state).unwrap();

        // 2000 km through S1 beats the 4500 km shortcut
        let gs1 = state.ground_address(1).unwrap();
        assert_eq!(transport.next_hop(BodyId::Satellite(0), gs1), Some((1, BodyId::Satellite(1))));
    }

    #[test]
    fn test_equal_cost_ties_break_to_lowest_port() {
        let mut builder = ConstellationBuilder::new();
        for i in 0..4 {
            builder.add_satellite(format!("S{}", i), site(7000.0 + i as f64));
        }
        let mut state = builder.build(&TopologyConfig::default()).unwrap();
        for i in 0..4 {
            state.establish_link(sat(i, 1), sat((i + 1) % 4, 3), 1000.0, LinkKind::SatToSat).unwrap();
        }
        let mut transport = GraphTransport::new(LinkMetric::HopCount);
        transport.recompute_forwarding_state(&state).unwrap();

        let address_of = |a: Endpoint, b: Endpoint, body: BodyId| {
            let link = state.link(a, b).unwrap();
            link.addresses.address_of(link, body).unwrap()
        };
        let s2 = address_of(sat(1, 1), sat(2, 3), BodyId::Satellite(2));
        let s0 = address_of(sat(0, 1), sat(1, 3), BodyId::Satellite(0));
        assert_eq!(transport.resolve(s2), Some(BodyId::Satellite(2)));

        // Opposite corners of the ring: two paths of two hops each
        assert_eq!(transport.next_hop(BodyId::Satellite(0), s2), Some((1, BodyId::Satellite(1))));
        assert_eq!(transport.next_hop(BodyId::Satellite(2), s0), Some((1, BodyId::Satellite(3))));
    }

    #[test]
    fn test_tables_stale_until_recompute() {
        let mut state = create_test_state();
        let mut transport = GraphTransport::default();
        transport.recompute_forwarding_state(&state).unwrap();
        assert!(!transport.is_stale());

        let link = state.destroy_link(sat(0, 2), sat(2, 4)).unwrap();
        transport.link_down(&link);
        assert!(transport.is_stale());

        // Old answer until the tables are rebuilt
        let gs1 = state.ground_address(1).unwrap();
        assert_eq!(transport.next_hop(BodyId::Satellite(0), gs1), Some((2, BodyId::Satellite(2))));

        transport.recompute_forwarding_state(&state).unwrap();
        assert!(!transport.is_stale());
        assert_eq!(transport.next_hop(BodyId::Satellite(0), gs1), Some((1, BodyId::Satellite(1))));
        assert_eq!(transport.recomputes(), 2);
    }

    #[test]
    fn test_unreachable_destination() {
        let mut state = create_test_state();
        state.destroy_link(gs(1), sat(2, 5)).unwrap();
        let mut transport = GraphTransport::default();
        transport.recompute_forwarding_state(&state).unwrap();

        let gs1 = state.ground_address(1).unwrap();
        assert_eq!(transport.next_hop(BodyId::GroundStation(0), gs1), None);
        assert!(matches!(
            transport.path(BodyId::GroundStation(0), gs1),
            Err(GlafError::NoPath(..))
        ));
        assert!(matches!(
            transport.path(BodyId::Satellite(7), gs1),
            Err(GlafError::NodeNotFound(_))
        ));
    }
}
