//! Topology snapshots for visualization
//!
//! Supports:
//! - Plain JSON snapshot of bodies and live links (one line per tick)
//! - Cytoscape.js elements

use crate::Result;
use link_topology::{BodyId, LinkKind, TopologyState};
use orbital_mechanics::transforms::ecef_to_geodetic;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub id: String,
    pub name: String,
    pub satellite: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plane: Option<usize>,
    pub position_km: [f64; 3],
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_km: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotLink {
    pub id: String,
    pub source: String,
    pub target: String,
    pub source_port: u8,
    pub target_port: u8,
    pub kind: LinkKind,
    pub distance_km: f64,
    pub delay_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_address: Option<Ipv4Addr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_address: Option<Ipv4Addr>,
}

/// Bodies and live links at one instant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub at_s: f64,
    pub nodes: Vec<SnapshotNode>,
    pub links: Vec<SnapshotLink>,
}

/// Cytoscape.js element format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CytoscapeElement {
    pub data: CytoscapeData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<CytoscapePosition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CytoscapeData {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(rename = "type")]
    pub element_type: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CytoscapePosition {
    pub x: f64,
    pub y: f64,
}

/// Plane index to color
fn plane_to_color(plane: Option<usize>) -> &'static str {
    const COLORS: [&str; 8] = ["#ef4444", "#f97316", "#eab308", "#22c55e", "#06b6d4", "#3b82f6", "#8b5cf6", "#ec4899"];
    match plane {
        Some(p) => COLORS[p % COLORS.len()],
        None => "#6b7280",
    }
}

impl TopologySnapshot {
    pub fn capture(state: &TopologyState) -> Result<Self> {
        let mut plane_of: HashMap<usize, usize> = HashMap::new();
        for (p, plane) in state.planes().iter().enumerate() {
            for &member in &plane.members {
                plane_of.insert(member, p);
            }
        }

        let nodes = state
            .bodies()
            .map(|body| -> Result<SnapshotNode> {
                let position = body.kinematics().position;
                let geodetic = ecef_to_geodetic(&position)?;
                let plane = match body.id() {
                    BodyId::Satellite(i) => plane_of.get(&i).copied(),
                    BodyId::GroundStation(_) => None,
                };
                Ok(SnapshotNode {
                    id: body.id().to_string(),
                    name: body.name().to_string(),
                    satellite: body.id().is_satellite(),
                    plane,
                    position_km: [position.x, position.y, position.z],
                    latitude_deg: geodetic.latitude,
                    longitude_deg: geodetic.longitude,
                    altitude_km: geodetic.altitude_km,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let links = state
            .links()
            .map(|link| SnapshotLink {
                id: format!("{}-{}", link.a, link.b),
                source: link.a.body.to_string(),
                target: link.b.body.to_string(),
                source_port: link.a.port,
                target_port: link.b.port,
                kind: link.kind,
                distance_km: link.distance_km,
                delay_ms: link.delay.as_secs_f64() * 1000.0,
                source_address: link.addresses.address_of(link, link.a.body),
                target_address: link.addresses.address_of(link, link.b.body),
            })
            .collect();

        Ok(Self {
            at_s: state.elapsed().as_secs_f64(),
            nodes,
            links,
        })
    }

    /// Single-line JSON, for appending to a `.jsonl` file
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Export to Cytoscape.js format
    pub fn to_cytoscape(&self) -> Vec<CytoscapeElement> {
        let mut elements = Vec::with_capacity(self.nodes.len() + self.links.len());

        for node in &self.nodes {
            // Position based on lat/lon (simple mercator)
            let x = (node.longitude_deg + 180.0) * 3.0;
            let y = (90.0 - node.latitude_deg) * 3.0;
            let (element_type, color) = if node.satellite {
                ("satellite", plane_to_color(node.plane))
            } else {
                ("ground-station", "#3b82f6")
            };
            elements.push(CytoscapeElement {
                data: CytoscapeData {
                    id: node.id.clone(),
                    label: Some(node.name.clone()),
                    source: None,
                    target: None,
                    element_type: element_type.to_string(),
                    color: color.to_string(),
                    delay_ms: None,
                },
                position: Some(CytoscapePosition { x, y }),
            });
        }

        for link in &self.links {
            let (element_type, color) = match link.kind {
                LinkKind::SatToSat => ("sat-sat", "#22c55e"),
                LinkKind::GroundToSat => ("sat-ground", "#eab308"),
            };
            elements.push(CytoscapeElement {
                data: CytoscapeData {
                    id: link.id.clone(),
                    label: None,
                    source: Some(link.source.clone()),
                    target: Some(link.target.clone()),
                    element_type: element_type.to_string(),
                    color: color.to_string(),
                    delay_ms: Some(link.delay_ms),
                },
                position: None,
            });
        }

        elements
    }

    /// Export to JSON string (Cytoscape format)
    pub fn to_cytoscape_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_cytoscape())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use link_topology::{ConstellationBuilder, Endpoint, TopologyConfig};
    use nalgebra::Vector3;
    use orbital_mechanics::{FixedSite, Trajectory};

    fn create_test_state() -> TopologyState {
        let mut builder = ConstellationBuilder::new();
        let site = |v: Vector3<f64>| Box::new(FixedSite::from_ecef(v));
        builder.add_plane(
            "P0",
            vec![
                ("S0".to_string(), site(Vector3::new(6928.0, 0.0, 0.0)) as Box<dyn Trajectory>),
                ("S1".to_string(), site(Vector3::new(0.0, 6928.0, 0.0)) as Box<dyn Trajectory>),
            ],
        );
        builder.add_ground_station("GS0", site(Vector3::new(6378.137, 0.0, 0.0)));
        let mut state = builder.build(&TopologyConfig::default()).unwrap();

        let s0 = |port| Endpoint::new(BodyId::Satellite(0), port);
        state
            .establish_link(s0(1), Endpoint::new(BodyId::Satellite(1), 3), 9797.6, LinkKind::SatToSat)
            .unwrap();
        state
            .establish_link(Endpoint::new(BodyId::GroundStation(0), 1), s0(5), 549.9, LinkKind::GroundToSat)
            .unwrap();
        state
    }

    #[test]
    fn test_capture() {
        let snapshot = TopologySnapshot::capture(&create_test_state()).unwrap();

        assert_eq!(snapshot.nodes.len(), 3);
        assert_eq!(snapshot.links.len(), 2);

        let s1 = snapshot.nodes.iter().find(|n| n.id == "SAT-1").unwrap();
        assert_eq!(s1.plane, Some(0));
        assert!((s1.longitude_deg - 90.0).abs() < 1e-6);
        assert!((s1.altitude_km - (6928.0 - 6378.137)).abs() < 1e-3);

        let ground = snapshot.links.iter().find(|l| l.kind == LinkKind::GroundToSat).unwrap();
        assert_eq!(ground.source, "GS-0");
        assert_eq!(ground.source_address, Some(Ipv4Addr::new(1, 0, 0, 1)));
        assert_eq!(ground.target_address, Some(Ipv4Addr::new(1, 0, 0, 2)));
    }

    #[test]
    fn test_cytoscape_export() {
        let snapshot = TopologySnapshot::capture(&create_test_state()).unwrap();
        let elements = snapshot.to_cytoscape();
        assert_eq!(elements.len(), 5); // 3 nodes + 2 edges

        let json = snapshot.to_cytoscape_json().unwrap();
        assert!(json.contains("SAT-0"));
        assert!(json.contains("sat-ground"));

        let line = snapshot.to_json_line().unwrap();
        assert!(!line.contains('\n'));
        let back: TopologySnapshot = serde_json::from_str(&line).unwrap();
        assert_eq!(back.links.len(), 2);
    }
}
