//! Topology state: bodies, ports, links and the pools behind them
//!
//! Every link mutation goes through [`TopologyState::establish_link`] and
//! [`TopologyState::destroy_link`], which keep port linkage symmetric and the
//! address plan consistent. Port pool bookkeeping is left to the caller.

use crate::addressing::{self, AddressAllocator, AddressPair};
use crate::config::TopologyConfig;
use crate::ports::{PortPool, GROUND_PORT, ISL_PORTS, SAT_GROUND_PORT};
use crate::{Result, TopologyError};
use orbital_mechanics::{StateVector, Trajectory};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BodyId {
    Satellite(usize),
    GroundStation(usize),
}

impl BodyId {
    pub fn is_satellite(&self) -> bool {
        matches!(self, BodyId::Satellite(_))
    }
}

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyId::Satellite(i) => write!(f, "SAT-{}", i),
            BodyId::GroundStation(i) => write!(f, "GS-{}", i),
        }
    }
}

/// A (body, port) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub body: BodyId,
    pub port: u8,
}

impl Endpoint {
    pub fn new(body: BodyId, port: u8) -> Self {
        Self { body, port }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.body, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkKind {
    GroundToSat,
    SatToSat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortState {
    Free,
    Linked(Endpoint),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressAssignment {
    /// Station keeps its fixed address, the satellite borrows the next host
    Ground { station: Ipv4Addr, satellite: Ipv4Addr },
    InterSat(AddressPair),
}

impl AddressAssignment {
    /// Address held by the given side of the link
    pub fn address_of(&self, link: &Link, body: BodyId) -> Option<Ipv4Addr> {
        match *self {
            AddressAssignment::Ground { station, satellite } => {
                if body == link.a.body {
                    Some(station)
                } else if body == link.b.body {
                    Some(satellite)
                } else {
                    None
                }
            }
            AddressAssignment::InterSat(pair) => {
                if body == link.a.body {
                    Some(pair.a)
                } else if body == link.b.body {
                    Some(pair.b)
                } else {
                    None
                }
            }
        }
    }
}

/// A live link. For ground links `a` is always the ground station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub a: Endpoint,
    pub b: Endpoint,
    pub kind: LinkKind,
    pub distance_km: f64,
    pub delay: Duration,
    pub addresses: AddressAssignment,
}

impl Link {
    pub fn other_end(&self, endpoint: &Endpoint) -> Option<Endpoint> {
        if *endpoint == self.a {
            Some(self.b)
        } else if *endpoint == self.b {
            Some(self.a)
        } else {
            None
        }
    }

    pub fn touches(&self, endpoint: &Endpoint) -> bool {
        self.a == *endpoint || self.b == *endpoint
    }
}

pub struct Body {
    id: BodyId,
    name: String,
    trajectory: Box<dyn Trajectory>,
    kinematics: StateVector,
    ports: Vec<PortState>,
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kinematics", &self.kinematics)
            .field("ports", &self.ports)
            .finish()
    }
}

impl Body {
    pub(crate) fn new(id: BodyId, name: String, trajectory: Box<dyn Trajectory>) -> Result<Self> {
        let kinematics = trajectory.state_at(Duration::ZERO)?;
        let port_count = match id {
            BodyId::Satellite(_) => SAT_GROUND_PORT as usize,
            BodyId::GroundStation(_) => GROUND_PORT as usize,
        };
        Ok(Self {
            id,
            name,
            trajectory,
            kinematics,
            ports: vec![PortState::Free; port_count],
        })
    }

    pub fn id(&self) -> BodyId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// State as of the last refresh
    pub fn kinematics(&self) -> &StateVector {
        &self.kinematics
    }

    pub fn port_count(&self) -> u8 {
        self.ports.len() as u8
    }

    pub fn port(&self, port: u8) -> Option<PortState> {
        let index = usize::from(port).checked_sub(1)?;
        self.ports.get(index).copied()
    }

    fn port_mut(&mut self, port: u8) -> Option<&mut PortState> {
        let index = usize::from(port).checked_sub(1)?;
        self.ports.get_mut(index)
    }

    pub fn used_ports(&self) -> impl Iterator<Item = (u8, Endpoint)> + '_ {
        self.ports.iter().enumerate().filter_map(|(i, state)| match state {
            PortState::Linked(peer) => Some((i as u8 + 1, *peer)),
            PortState::Free => None,
        })
    }

    fn refresh(&mut self, elapsed: Duration) -> Result<()> {
        self.kinematics = self.trajectory.state_at(elapsed)?;
        Ok(())
    }
}

/// An orbital plane as indices into the satellite list, in ring order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub name: String,
    pub members: Vec<usize>,
    /// Only a leading part of the ring is simulated; the last member does
    /// not wrap back to the first
    #[serde(default)]
    pub truncated: bool,
}

type LinkKey = (Endpoint, Endpoint);

fn link_key(a: Endpoint, b: Endpoint) -> LinkKey {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Debug)]
pub struct TopologyState {
    satellites: Vec<Body>,
    ground_stations: Vec<Body>,
    planes: Vec<Plane>,
    links: BTreeMap<LinkKey, Link>,
    pool: PortPool,
    addresses: AddressAllocator,
    config: TopologyConfig,
    elapsed: Duration,
}

impl TopologyState {
    pub(crate) fn new(
        satellites: Vec<Body>,
        ground_stations: Vec<Body>,
        planes: Vec<Plane>,
        config: TopologyConfig,
    ) -> Self {
        let pool = PortPool::new(satellites.len());
        Self {
            satellites,
            ground_stations,
            planes,
            links: BTreeMap::new(),
            pool,
            addresses: AddressAllocator::new(),
            config,
            elapsed: Duration::ZERO,
        }
    }

    pub fn satellites(&self) -> &[Body] {
        &self.satellites
    }

    pub fn ground_stations(&self) -> &[Body] {
        &self.ground_stations
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    pub fn satellite_count(&self) -> usize {
        self.satellites.len()
    }

    pub fn ground_station_count(&self) -> usize {
        self.ground_stations.len()
    }

    pub fn body_count(&self) -> usize {
        self.satellites.len() + self.ground_stations.len()
    }

    pub fn bodies(&self) -> impl Iterator<Item = &Body> {
        self.satellites.iter().chain(self.ground_stations.iter())
    }

    /// Simulated time of the last kinematics refresh
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn body(&self, id: BodyId) -> Result<&Body> {
        let body = match id {
            BodyId::Satellite(i) => self.satellites.get(i),
            BodyId::GroundStation(i) => self.ground_stations.get(i),
        };
        body.ok_or(TopologyError::UnknownBody(id))
    }

    fn body_mut(&mut self, id: BodyId) -> Result<&mut Body> {
        let body = match id {
            BodyId::Satellite(i) => self.satellites.get_mut(i),
            BodyId::GroundStation(i) => self.ground_stations.get_mut(i),
        };
        body.ok_or(TopologyError::UnknownBody(id))
    }

    pub fn kinematics(&self, id: BodyId) -> Result<StateVector> {
        Ok(*self.body(id)?.kinematics())
    }

    pub fn port_state(&self, endpoint: Endpoint) -> Result<PortState> {
        self.body(endpoint.body)?
            .port(endpoint.port)
            .ok_or(TopologyError::PortOutOfRange(endpoint))
    }

    pub fn peer(&self, endpoint: Endpoint) -> Result<Option<Endpoint>> {
        Ok(match self.port_state(endpoint)? {
            PortState::Linked(peer) => Some(peer),
            PortState::Free => None,
        })
    }

    pub fn link(&self, a: Endpoint, b: Endpoint) -> Option<&Link> {
        self.links.get(&link_key(a, b))
    }

    /// Link carried by the given port, if any
    pub fn link_at(&self, endpoint: Endpoint) -> Option<&Link> {
        let peer = self.peer(endpoint).ok()??;
        self.link(endpoint, peer)
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Whether any port of `a` is linked to any port of `b`
    pub fn are_linked(&self, a: BodyId, b: BodyId) -> bool {
        self.body(a)
            .map(|body| body.used_ports().any(|(_, peer)| peer.body == b))
            .unwrap_or(false)
    }

    pub fn pool(&self) -> &PortPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut PortPool {
        &mut self.pool
    }

    pub fn addresses(&self) -> &AddressAllocator {
        &self.addresses
    }

    /// Fixed address of a ground station
    pub fn ground_address(&self, station: usize) -> Result<Ipv4Addr> {
        self.body(BodyId::GroundStation(station))?;
        addressing::ground_station_address(station)
    }

    /// Propagate every body to `elapsed`
    pub fn refresh_kinematics(&mut self, elapsed: Duration) -> Result<()> {
        for body in self.satellites.iter_mut().chain(self.ground_stations.iter_mut()) {
            body.refresh(elapsed)?;
        }
        self.elapsed = elapsed;
        Ok(())
    }

    /// State of one body at `elapsed`. The cached kinematics are left at
    /// the last refresh.
    pub fn state_at(&self, id: BodyId, elapsed: Duration) -> Result<StateVector> {
        Ok(self.body(id)?.trajectory.state_at(elapsed)?)
    }

    fn check_endpoints(&self, a: Endpoint, b: Endpoint, kind: LinkKind) -> Result<()> {
        for endpoint in [a, b] {
            self.port_state(endpoint)?;
        }
        let shape_ok = match kind {
            LinkKind::SatToSat => {
                a.body.is_satellite()
                    && b.body.is_satellite()
                    && a.body != b.body
                    && ISL_PORTS.contains(&a.port)
                    && ISL_PORTS.contains(&b.port)
            }
            LinkKind::GroundToSat => {
                matches!(a.body, BodyId::GroundStation(_))
                    && a.port == GROUND_PORT
                    && b.body.is_satellite()
                    && b.port == SAT_GROUND_PORT
            }
        };
        if !shape_ok {
            return Err(TopologyError::InvalidEndpoints(a, b, kind));
        }
        Ok(())
    }

    /// Link two free ports. Ports are not taken out of the pool here.
    pub fn establish_link(
        &mut self,
        a: Endpoint,
        b: Endpoint,
        distance_km: f64,
        kind: LinkKind,
    ) -> Result<&Link> {
        self.check_endpoints(a, b, kind)?;
        let delay = self.config.propagation_delay(distance_km)?;
        for endpoint in [a, b] {
            if self.port_state(endpoint)? != PortState::Free {
                return Err(TopologyError::PortAlreadyLinked(endpoint));
            }
        }

        let addresses = match (kind, a.body) {
            (LinkKind::GroundToSat, BodyId::GroundStation(station)) => {
                let station = addressing::ground_station_address(station)?;
                AddressAssignment::Ground {
                    station,
                    satellite: addressing::satellite_address_for(station),
                }
            }
            _ => AddressAssignment::InterSat(self.addresses.allocate_pair()?),
        };

        let link = Link {
            a,
            b,
            kind,
            distance_km,
            delay,
            addresses,
        };

        for (local, remote) in [(a, b), (b, a)] {
            let port = self
                .body_mut(local.body)?
                .port_mut(local.port)
                .ok_or(TopologyError::PortOutOfRange(local))?;
            *port = PortState::Linked(remote);
        }
        debug!("Link up {} <-> {} ({:.1} km)", a, b, distance_km);

        let key = link_key(a, b);
        Ok(self.links.entry(key).or_insert(link))
    }

    /// Tear down an existing link and return it. Ports are not returned to the
    /// pool here.
    pub fn destroy_link(&mut self, a: Endpoint, b: Endpoint) -> Result<Link> {
        let link = self
            .links
            .remove(&link_key(a, b))
            .ok_or(TopologyError::NoSuchLink(a, b))?;

        for endpoint in [a, b] {
            let port = self
                .body_mut(endpoint.body)?
                .port_mut(endpoint.port)
                .ok_or(TopologyError::PortOutOfRange(endpoint))?;
            *port = PortState::Free;
        }

        if let AddressAssignment::InterSat(pair) = link.addresses {
            self.addresses.release_pair(pair)?;
        }
        debug!("Link down {} <-> {}", a, b);
        Ok(link)
    }
}
