//! Interface to the packet transport and routing layer

use crate::state::{BodyId, Link, TopologyState};
use crate::Result;
use std::net::Ipv4Addr;

/// Routing layer driven by the topology engine.
///
/// Link notifications arrive as links change; forwarding state is rebuilt
/// once per tick after all mutations.
pub trait Transport {
    fn link_up(&mut self, _link: &Link) {}

    fn link_down(&mut self, _link: &Link) {}

    fn recompute_forwarding_state(&mut self, state: &TopologyState) -> Result<()>;

    /// Outgoing port and neighbour used by `at` to reach `destination`
    fn next_hop(&self, at: BodyId, destination: Ipv4Addr) -> Option<(u8, BodyId)>;
}

/// Transport with no forwarding state at all
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransport {
    pub recomputes: usize,
}

impl Transport for NullTransport {
    fn recompute_forwarding_state(&mut self, _state: &TopologyState) -> Result<()> {
        self.recomputes += 1;
        Ok(())
    }

    fn next_hop(&self, _at: BodyId, _destination: Ipv4Addr) -> Option<(u8, BodyId)> {
        None
    }
}
