//! Link Topology - dynamic link graph for a satellite constellation
//!
//! Decides, tick by tick, which inter-satellite and ground-to-satellite links
//! exist as bodies move:
//!
//! - Geometry kernel and satellite-relative antenna bearings
//! - Link validity predicates (range, sector alignment, ground elevation)
//! - Antenna port pools and link address allocation
//! - Ring initialization plus the break/establish tick algorithm
//! - Route-impact tracking for disruption analysis
//!
//! Positions come from [`orbital_mechanics::Trajectory`] implementations;
//! routing is delegated to a [`Transport`] implementation.

use thiserror::Error;

pub mod addressing;
pub mod config;
pub mod constellation;
pub mod engine;
pub mod events;
pub mod geometry;
pub mod ports;
pub mod route_impact;
pub mod scheduler;
pub mod simulation;
pub mod state;
pub mod transport;
pub mod validity;

pub use addressing::{AddressAllocator, AddressPair};
pub use config::{LinkParameters, RunConfig, SimulationConfig, TopologyConfig};
pub use constellation::ConstellationBuilder;
pub use engine::{PendingLink, TopologyEngine};
pub use events::{EventLog, LinkCounters, TickReport, TopologyEvent};
pub use ports::PortPool;
pub use route_impact::{RouteProbe, RouteTracker};
pub use scheduler::{EventQueue, Scheduler, SimEvent};
pub use simulation::{Simulation, SimulationSummary};
pub use state::{AddressAssignment, Body, BodyId, Endpoint, Link, LinkKind, Plane, PortState, TopologyState};
pub use transport::{NullTransport, Transport};
pub use validity::{ground_link_valid, sat_link_valid, Sector};

/// Topology errors
#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("Constellation has no satellites")]
    EmptyConstellation,
    #[error("Malformed orbital ring: {0}")]
    MalformedRing(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Port {0} is out of range")]
    PortOutOfRange(Endpoint),
    #[error("Port {0} is not an inter-satellite port")]
    NotAnIslPort(u8),
    #[error("Endpoints {0} and {1} cannot form a {2:?} link")]
    InvalidEndpoints(Endpoint, Endpoint, LinkKind),
    #[error("Port {0} is already linked")]
    PortAlreadyLinked(Endpoint),
    #[error("Port {0} is not free in the pool")]
    PortNotFree(Endpoint),
    #[error("Port {0} is already free in the pool")]
    PortAlreadyFree(Endpoint),
    #[error("No link between {0} and {1}")]
    NoSuchLink(Endpoint, Endpoint),
    #[error("Unknown body {0}")]
    UnknownBody(BodyId),
    #[error("Degenerate vector: {0}")]
    DegenerateVector(&'static str),
    #[error("Link address space exhausted")]
    AddressSpaceExhausted,
    #[error("Address pair {0} is not allocated")]
    UnknownAddressPair(AddressPair),
    #[error("Propagation error: {0}")]
    Orbital(#[from] orbital_mechanics::OrbitalError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TopologyError>;
