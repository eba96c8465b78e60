//! Per-satellite free antenna ports

use crate::state::{BodyId, Endpoint};
use crate::{Result, TopologyError};
use std::collections::BTreeSet;
use std::ops::RangeInclusive;

/// Inter-satellite antenna ports, one per sector
pub const ISL_PORTS: RangeInclusive<u8> = 1..=4;
/// Ground-facing port on every satellite
pub const SAT_GROUND_PORT: u8 = 5;
/// The single port of a ground station
pub const GROUND_PORT: u8 = 1;

/// Free inter-satellite ports of every satellite, enumerated in ascending order.
///
/// A port missing from the pool is either carrying a link or reserved for a
/// pending acquisition.
#[derive(Debug, Clone, Default)]
pub struct PortPool {
    free: Vec<BTreeSet<u8>>,
}

impl PortPool {
    pub fn new(satellites: usize) -> Self {
        Self {
            free: (0..satellites).map(|_| ISL_PORTS.collect()).collect(),
        }
    }

    fn slot(&self, sat: usize) -> Result<&BTreeSet<u8>> {
        self.free
            .get(sat)
            .ok_or(TopologyError::UnknownBody(BodyId::Satellite(sat)))
    }

    fn slot_mut(&mut self, sat: usize) -> Result<&mut BTreeSet<u8>> {
        self.free
            .get_mut(sat)
            .ok_or(TopologyError::UnknownBody(BodyId::Satellite(sat)))
    }

    pub fn free_ports(&self, sat: usize) -> Result<&BTreeSet<u8>> {
        self.slot(sat)
    }

    pub fn has_free(&self, sat: usize) -> bool {
        self.free.get(sat).is_some_and(|ports| !ports.is_empty())
    }

    pub fn is_free(&self, sat: usize, port: u8) -> bool {
        self.free.get(sat).is_some_and(|ports| ports.contains(&port))
    }

    pub fn reserve(&mut self, sat: usize, port: u8) -> Result<()> {
        let endpoint = Endpoint::new(BodyId::Satellite(sat), port);
        if !ISL_PORTS.contains(&port) {
            return Err(TopologyError::PortOutOfRange(endpoint));
        }
        if !self.slot_mut(sat)?.remove(&port) {
            return Err(TopologyError::PortNotFree(endpoint));
        }
        Ok(())
    }

    pub fn release(&mut self, sat: usize, port: u8) -> Result<()> {
        let endpoint = Endpoint::new(BodyId::Satellite(sat), port);
        if !ISL_PORTS.contains(&port) {
            return Err(TopologyError::PortOutOfRange(endpoint));
        }
        if !self.slot_mut(sat)?.insert(port) {
            return Err(TopologyError::PortAlreadyFree(endpoint));
        }
        Ok(())
    }

    pub fn satellites(&self) -> usize {
        self.free.len()
    }
}
