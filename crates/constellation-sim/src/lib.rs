//! Constellation Simulation Runner
//!
//! Builds a constellation from a TLE catalog or a synthetic Walker shell,
//! places ground stations, and drives the link-topology engine over a
//! graph transport. Results land in an output directory:
//!
//! | File | Contents |
//! |------|----------|
//! | `link_break_times_satCount<N>.log` | one `<seconds>,` line per route disruption |
//! | `tick_reports.json` | per-tick link counters |
//! | `snapshots.jsonl` | optional topology snapshot per tick |

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

pub mod loader;
pub mod output;

/// New York trade center
pub const NEW_YORK: GroundSite = GroundSite {
    latitude: 40.711394051407254,
    longitude: -74.01147005959824,
    altitude_m: 20.0,
};

/// Dubai trade center
pub const DUBAI: GroundSite = GroundSite {
    latitude: 25.217273781972715,
    longitude: 55.28287038973016,
    altitude_m: 20.0,
};

#[derive(Error, Debug)]
pub enum SimError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Orbital error: {0}")]
    Orbital(#[from] orbital_mechanics::OrbitalError),
    #[error("Topology error: {0}")]
    Topology(#[from] link_topology::TopologyError),
    #[error("Graph error: {0}")]
    Glaf(#[from] orbital_glaf::GlafError),
    #[error("Invalid ground station '{0}': expected lat,lon,alt_m")]
    InvalidGroundSite(String),
}

pub type Result<T> = std::result::Result<T, SimError>;

/// Lets per-tick output failures abort a running simulation
impl From<SimError> for link_topology::TopologyError {
    fn from(err: SimError) -> Self {
        use link_topology::TopologyError;
        use orbital_glaf::GlafError;

        match err {
            SimError::Io(e) => TopologyError::Io(e),
            SimError::Json(e) | SimError::Glaf(GlafError::SerializationError(e)) => TopologyError::Json(e),
            SimError::Orbital(e) | SimError::Glaf(GlafError::Orbital(e)) => TopologyError::Orbital(e),
            SimError::Topology(e) | SimError::Glaf(GlafError::Topology(e)) => e,
            other => TopologyError::Io(std::io::Error::other(other.to_string())),
        }
    }
}

/// Ground station location as given on the command line
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundSite {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: f64,
}

impl GroundSite {
    pub fn label(&self) -> String {
        format!("GS({:.4},{:.4})", self.latitude, self.longitude)
    }
}

impl FromStr for GroundSite {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || SimError::InvalidGroundSite(s.to_string());
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| invalid())?;

        match parts.as_slice() {
            [latitude, longitude, altitude_m]
                if (-90.0..=90.0).contains(latitude) && (-180.0..=180.0).contains(longitude) =>
            {
                Ok(Self {
                    latitude: *latitude,
                    longitude: *longitude,
                    altitude_m: *altitude_m,
                })
            }
            _ => Err(invalid()),
        }
    }
}
