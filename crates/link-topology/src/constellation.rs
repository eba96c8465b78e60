//! Constellation setup

use crate::config::TopologyConfig;
use crate::state::{Body, BodyId, Plane, TopologyState};
use crate::{Result, TopologyError};
use orbital_mechanics::Trajectory;
use std::collections::HashSet;
use tracing::info;

type Named = (String, Box<dyn Trajectory>);

/// Collects satellites, orbital planes and ground stations, then validates
/// them into a [`TopologyState`].
#[derive(Default)]
pub struct ConstellationBuilder {
    satellites: Vec<Named>,
    planes: Vec<Plane>,
    ground_stations: Vec<Named>,
}

impl ConstellationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a satellite outside any ring; returns its index
    pub fn add_satellite(&mut self, name: impl Into<String>, trajectory: Box<dyn Trajectory>) -> usize {
        self.satellites.push((name.into(), trajectory));
        self.satellites.len() - 1
    }

    /// Add a ring of satellites in neighbour order
    pub fn add_plane(&mut self, name: impl Into<String>, members: Vec<Named>) -> &mut Self {
        let indices = self.add_members(members);
        self.push_plane(name.into(), indices, false)
    }

    /// Add the leading members of a ring cut short by a satellite limit
    pub fn add_partial_plane(&mut self, name: impl Into<String>, members: Vec<Named>) -> &mut Self {
        let indices = self.add_members(members);
        self.push_plane(name.into(), indices, true)
    }

    /// Declare a ring over satellites already added
    pub fn add_ring(&mut self, name: impl Into<String>, members: Vec<usize>) -> &mut Self {
        self.push_plane(name.into(), members, false)
    }

    /// Declare a ring over satellites already added that stops at its last member
    pub fn add_partial_ring(&mut self, name: impl Into<String>, members: Vec<usize>) -> &mut Self {
        self.push_plane(name.into(), members, true)
    }

    fn add_members(&mut self, members: Vec<Named>) -> Vec<usize> {
        members
            .into_iter()
            .map(|(sat_name, trajectory)| self.add_satellite(sat_name, trajectory))
            .collect()
    }

    fn push_plane(&mut self, name: String, members: Vec<usize>, truncated: bool) -> &mut Self {
        self.planes.push(Plane {
            name,
            members,
            truncated,
        });
        self
    }

    pub fn add_ground_station(&mut self, name: impl Into<String>, trajectory: Box<dyn Trajectory>) -> usize {
        self.ground_stations.push((name.into(), trajectory));
        self.ground_stations.len() - 1
    }

    fn validate_rings(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (p, plane) in self.planes.iter().enumerate() {
            if plane.truncated && p + 1 != self.planes.len() {
                return Err(TopologyError::MalformedRing(format!(
                    "truncated plane '{}' must be the last plane",
                    plane.name
                )));
            }
            if plane.members.is_empty() {
                return Err(TopologyError::MalformedRing(format!("plane '{}' is empty", plane.name)));
            }
            for &member in &plane.members {
                if member >= self.satellites.len() {
                    return Err(TopologyError::MalformedRing(format!(
                        "plane '{}' references unknown satellite {}",
                        plane.name, member
                    )));
                }
                if !seen.insert(member) {
                    return Err(TopologyError::MalformedRing(format!(
                        "satellite {} appears in more than one ring position",
                        member
                    )));
                }
            }
        }
        Ok(())
    }

    /// Validate and propagate every body to t = 0
    pub fn build(self, config: &TopologyConfig) -> Result<TopologyState> {
        config.validate()?;
        if self.satellites.is_empty() {
            return Err(TopologyError::EmptyConstellation);
        }
        self.validate_rings()?;

        let satellites = self
            .satellites
            .into_iter()
            .enumerate()
            .map(|(i, (name, trajectory))| Body::new(BodyId::Satellite(i), name, trajectory))
            .collect::<Result<Vec<_>>>()?;
        let ground_stations = self
            .ground_stations
            .into_iter()
            .enumerate()
            .map(|(i, (name, trajectory))| Body::new(BodyId::GroundStation(i), name, trajectory))
            .collect::<Result<Vec<_>>>()?;

        info!(
            "Constellation ready: {} satellites in {} planes, {} ground stations",
            satellites.len(),
            self.planes.len(),
            ground_stations.len()
        );
        Ok(TopologyState::new(
            satellites,
            ground_stations,
            self.planes,
            config.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use orbital_mechanics::FixedSite;

    fn site(x: f64) -> Box<dyn Trajectory> {
        Box::new(FixedSite::from_ecef(Vector3::new(x, 0.0, 0.0)))
    }

    #[test]
    fn test_empty_constellation_is_rejected() {
        let mut builder = ConstellationBuilder::new();
        builder.add_ground_station("GS", site(6378.0));
        assert!(matches!(
            builder.build(&TopologyConfig::default()),
            Err(TopologyError::EmptyConstellation)
        ));
    }

    #[test]
    fn test_duplicate_ring_member() {
        let mut builder = ConstellationBuilder::new();
        let a = builder.add_satellite("A", site(7000.0));
        let b = builder.add_satellite("B", site(7100.0));
        builder.add_ring("P0", vec![a, b]).add_ring("P1", vec![b]);
        assert!(matches!(
            builder.build(&TopologyConfig::default()),
            Err(TopologyError::MalformedRing(_))
        ));
    }

    #[test]
    fn test_unknown_ring_member() {
        let mut builder = ConstellationBuilder::new();
        builder.add_satellite("A", site(7000.0));
        builder.add_ring("P0", vec![0, 4]);
        assert!(matches!(
            builder.build(&TopologyConfig::default()),
            Err(TopologyError::MalformedRing(_))
        ));
    }

    #[test]
    fn test_build_assigns_ids_in_order() {
        let mut builder = ConstellationBuilder::new();
        builder.add_plane("P0", vec![("A".into(), site(7000.0)), ("B".into(), site(7100.0))]);
        builder.add_ground_station("GS", site(6378.0));
        let state = builder.build(&TopologyConfig::default()).unwrap();

        assert_eq!(state.satellite_count(), 2);
        assert_eq!(state.satellites()[1].name(), "B");
        assert_eq!(state.satellites()[1].id(), BodyId::Satellite(1));
        assert_eq!(state.planes()[0].members, vec![0, 1]);
        assert_eq!(state.kinematics(BodyId::GroundStation(0)).unwrap().position.x, 6378.0);
    }

    #[test]
    fn test_truncated_plane_must_come_last() {
        let mut builder = ConstellationBuilder::new();
        let a = builder.add_satellite("A", site(7000.0));
        let b = builder.add_satellite("B", site(7100.0));
        builder.add_partial_ring("P0", vec![a]).add_ring("P1", vec![b]);
        assert!(matches!(
            builder.build(&TopologyConfig::default()),
            Err(TopologyError::MalformedRing(_))
        ));

        let mut builder = ConstellationBuilder::new();
        builder.add_plane("P0", vec![("A".into(), site(7000.0))]);
        builder.add_partial_plane("P1", vec![("B".into(), site(7100.0))]);
        let state = builder.build(&TopologyConfig::default()).unwrap();
        assert!(!state.planes()[0].truncated);
        assert!(state.planes()[1].truncated);
    }
}
