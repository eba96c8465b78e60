//! Topology and simulation configuration

use crate::route_impact::RouteProbe;
use crate::{Result, TopologyError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Physical link parameters handed to the transport layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkParameters {
    pub sat_sat_data_rate_mbps: f64,
    pub ground_sat_data_rate_mbps: f64,
    pub bit_error_rate: f64,
}

impl Default for LinkParameters {
    fn default() -> Self {
        Self {
            sat_sat_data_rate_mbps: 100.0,
            ground_sat_data_rate_mbps: 100.0,
            bit_error_rate: 1e-6,
        }
    }
}

/// Upper bound on the inter-satellite acquisition delay
pub const MAX_ACQUISITION_DELAY_S: f64 = 3600.0;

/// Thresholds and delays used by the topology engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    pub max_sat_range_km: f64,
    pub max_ground_range_km: f64,
    pub min_ground_elevation_deg: f64,
    pub signal_speed_km_s: f64,
    /// Antenna pointing and lock time for new inter-satellite links
    pub acquisition_delay_s: f64,
    pub links: LinkParameters,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            max_sat_range_km: 5000.0,
            max_ground_range_km: 3000.0,
            min_ground_elevation_deg: 5.0,
            signal_speed_km_s: 299_792.458,
            acquisition_delay_s: 2.0,
            links: LinkParameters::default(),
        }
    }
}

impl TopologyConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("max_sat_range_km", self.max_sat_range_km),
            ("max_ground_range_km", self.max_ground_range_km),
            ("signal_speed_km_s", self.signal_speed_km_s),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(TopologyError::InvalidConfig(format!("{} must be positive, got {}", name, value)));
            }
        }
        if !(0.0..=MAX_ACQUISITION_DELAY_S).contains(&self.acquisition_delay_s) {
            return Err(TopologyError::InvalidConfig(format!(
                "acquisition_delay_s must be within 0..={}, got {}",
                MAX_ACQUISITION_DELAY_S, self.acquisition_delay_s
            )));
        }
        // Every link is shorter than the larger range limit
        self.propagation_delay(self.max_sat_range_km.max(self.max_ground_range_km))?;
        if !(-90.0..=90.0).contains(&self.min_ground_elevation_deg) {
            return Err(TopologyError::InvalidConfig(format!(
                "min_ground_elevation_deg out of range: {}",
                self.min_ground_elevation_deg
            )));
        }
        if !(0.0..=1.0).contains(&self.links.bit_error_rate) {
            return Err(TopologyError::InvalidConfig(format!(
                "bit_error_rate out of range: {}",
                self.links.bit_error_rate
            )));
        }
        Ok(())
    }

    pub fn acquisition_delay(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.acquisition_delay_s).map_err(|e| {
            TopologyError::InvalidConfig(format!(
                "acquisition_delay_s {}: {}",
                self.acquisition_delay_s, e
            ))
        })
    }

    /// One-way signal delay over `distance_km`
    pub fn propagation_delay(&self, distance_km: f64) -> Result<Duration> {
        let seconds = distance_km / self.signal_speed_km_s;
        Duration::try_from_secs_f64(seconds).map_err(|e| {
            TopologyError::InvalidConfig(format!(
                "propagation delay over {} km at {} km/s: {}",
                distance_km, self.signal_speed_km_s, e
            ))
        })
    }
}

/// How long to simulate and how often to update the topology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub duration_min: u64,
    pub update_interval_s: u64,
    pub route_probe: Option<RouteProbe>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            duration_min: 10,
            update_interval_s: 15,
            route_probe: None,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.update_interval_s == 0 {
            return Err(TopologyError::InvalidConfig("update_interval_s must be positive".into()));
        }
        Ok(())
    }

    /// Number of topology updates, counting the one at t = 0
    pub fn loops(&self) -> u64 {
        60 * self.duration_min / self.update_interval_s.max(1)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_s)
    }
}

/// Combined file layout for `--config`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub topology: TopologyConfig,
    pub simulation: SimulationConfig,
}

impl RunConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from {:?}", path);
        let file = File::open(path)?;
        let config: RunConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.topology.validate()?;
        self.simulation.validate()
    }
}
