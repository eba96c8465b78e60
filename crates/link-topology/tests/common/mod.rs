#![allow(dead_code)]

use link_topology::{BodyId, Endpoint, Link, Result, TopologyState, Transport};
use nalgebra::Vector3;
use orbital_mechanics::{StateVector, Trajectory};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Piecewise-constant trajectory: each state holds from its start second on
pub struct Steps(pub Vec<(u64, StateVector)>);

impl Trajectory for Steps {
    fn state_at(&self, elapsed: Duration) -> orbital_mechanics::Result<StateVector> {
        self.0
            .iter()
            .rev()
            .find(|(t, _)| Duration::from_secs(*t) <= elapsed)
            .or(self.0.first())
            .map(|(_, s)| *s)
            .ok_or_else(|| orbital_mechanics::OrbitalError::PropagationFailed("no waypoints".into()))
    }
}

pub fn state(p: [f64; 3], v: [f64; 3]) -> StateVector {
    StateVector::new(Vector3::from(p), Vector3::from(v))
}

pub fn fixed(p: [f64; 3], v: [f64; 3]) -> Box<dyn Trajectory> {
    Box::new(Steps(vec![(0, state(p, v))]))
}

pub fn steps(points: Vec<(u64, StateVector)>) -> Box<dyn Trajectory> {
    Box::new(Steps(points))
}

pub fn sat(i: usize, port: u8) -> Endpoint {
    Endpoint::new(BodyId::Satellite(i), port)
}

pub fn gs(i: usize) -> Endpoint {
    Endpoint::new(BodyId::GroundStation(i), 1)
}

/// Transport with a fixed next hop per body, whatever the destination
#[derive(Default)]
pub struct StaticRoutes {
    pub hops: HashMap<BodyId, (u8, BodyId)>,
    pub recomputes: usize,
    pub ups: usize,
    pub downs: usize,
}

impl Transport for StaticRoutes {
    fn link_up(&mut self, _link: &Link) {
        self.ups += 1;
    }

    fn link_down(&mut self, _link: &Link) {
        self.downs += 1;
    }

    fn recompute_forwarding_state(&mut self, _state: &TopologyState) -> Result<()> {
        self.recomputes += 1;
        Ok(())
    }

    fn next_hop(&self, at: BodyId, _destination: Ipv4Addr) -> Option<(u8, BodyId)> {
        self.hops.get(&at).copied()
    }
}
