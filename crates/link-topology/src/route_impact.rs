//! Route-impact tracking
//!
//! Before a tick mutates the topology, the tracker walks the forwarding path
//! between two ground stations using the transport's current next hops. Links
//! torn down during the tick are checked against that path.

use crate::state::{BodyId, Endpoint, TopologyState};
use crate::transport::Transport;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Ground stations whose route is watched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteProbe {
    pub source: usize,
    pub destination: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RouteTracker {
    probe: Option<RouteProbe>,
    route: Vec<Endpoint>,
}

impl RouteTracker {
    pub fn new(probe: Option<RouteProbe>) -> Self {
        Self {
            probe,
            route: Vec::new(),
        }
    }

    pub fn probe(&self) -> Option<RouteProbe> {
        self.probe
    }

    /// Endpoints traversed by the captured route, outgoing then incoming for each hop
    pub fn route(&self) -> &[Endpoint] {
        &self.route
    }

    /// Walk the current path. Returns the number of endpoints collected, or
    /// `None` when no probe is configured.
    pub fn capture<T: Transport + ?Sized>(
        &mut self,
        state: &TopologyState,
        transport: &T,
    ) -> Result<Option<usize>> {
        self.route.clear();
        let Some(probe) = self.probe else {
            return Ok(None);
        };

        let destination = BodyId::GroundStation(probe.destination);
        let address = state.ground_address(probe.destination)?;
        let mut current = BodyId::GroundStation(probe.source);
        state.body(current)?;

        let mut visited = HashSet::from([current]);
        for _ in 0..state.body_count() {
            if current == destination {
                break;
            }
            let Some((port, next)) = transport.next_hop(current, address) else {
                debug!("No route from {} toward {}", current, address);
                break;
            };
            let outgoing = Endpoint::new(current, port);
            let incoming = match state.peer(outgoing)? {
                Some(peer) if peer.body == next => peer,
                _ => {
                    warn!("Next hop {} via {} is not a live link, route walk stopped", next, outgoing);
                    break;
                }
            };
            self.route.push(outgoing);
            self.route.push(incoming);

            if !visited.insert(next) {
                warn!("Forwarding loop at {} toward {}", next, address);
                break;
            }
            current = next;
        }
        Ok(Some(self.route.len()))
    }

    /// Whether tearing down a link with these endpoints cuts the captured route
    pub fn affects(&self, a: &Endpoint, b: &Endpoint) -> bool {
        self.route.iter().any(|hop| hop == a || hop == b)
    }

    pub fn clear(&mut self) {
        self.route.clear();
    }
}
