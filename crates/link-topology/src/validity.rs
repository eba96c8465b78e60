//! Link validity predicates
//!
//! Pure functions over kinematic states: they never touch topology state.

use crate::config::TopologyConfig;
use crate::geometry::bearing_pair;
use crate::{Result, TopologyError};
use nalgebra::Vector3;
use orbital_mechanics::StateVector;
use serde::{Deserialize, Serialize};

/// Antenna sector served by one inter-satellite port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sector {
    /// Port 1, [-45, 45)
    Forward,
    /// Port 2, [45, 135)
    Left,
    /// Port 3, [135, 225)
    Back,
    /// Port 4, [225, 315)
    Right,
}

impl Sector {
    pub const ALL: [Sector; 4] = [Sector::Forward, Sector::Left, Sector::Back, Sector::Right];

    pub fn for_port(port: u8) -> Result<Self> {
        match port {
            1 => Ok(Sector::Forward),
            2 => Ok(Sector::Left),
            3 => Ok(Sector::Back),
            4 => Ok(Sector::Right),
            other => Err(TopologyError::NotAnIslPort(other)),
        }
    }

    pub fn port(self) -> u8 {
        match self {
            Sector::Forward => 1,
            Sector::Left => 2,
            Sector::Back => 3,
            Sector::Right => 4,
        }
    }

    /// Half-open angular range in degrees
    pub fn range(self) -> (f64, f64) {
        let start = -45.0 + 90.0 * (self.port() - 1) as f64;
        (start, start + 90.0)
    }

    /// `bearing` must already be normalized with [`normalize_bearing`]
    pub fn contains(self, bearing: f64) -> bool {
        let (min, max) = self.range();
        bearing >= min && bearing < max
    }

    pub fn of(bearing: f64) -> Option<Sector> {
        let bearing = normalize_bearing(bearing);
        Sector::ALL.into_iter().find(|s| s.contains(bearing))
    }
}

/// Map a bearing in (-180, 180] into [-45, 315)
pub fn normalize_bearing(bearing: f64) -> f64 {
    if bearing < -45.0 {
        bearing + 360.0
    } else {
        bearing
    }
}

/// Range check, then both antennas must face each other through the given ports.
/// The range limit is inclusive.
pub fn sat_link_valid(
    a: &StateVector,
    port_a: u8,
    b: &StateVector,
    port_b: u8,
    config: &TopologyConfig,
) -> Result<bool> {
    let sector_a = Sector::for_port(port_a)?;
    let sector_b = Sector::for_port(port_b)?;

    if a.distance_to(b) > config.max_sat_range_km {
        return Ok(false);
    }

    let (from_a, from_b) = bearing_pair(a, b)?;
    Ok(sector_a.contains(normalize_bearing(from_a)) && sector_b.contains(normalize_bearing(from_b)))
}

/// Elevation of `sat` above the horizon of `station`, in degrees, from the
/// triangle formed with the Earth's centre.
pub fn ground_elevation_deg(station: &Vector3<f64>, sat: &Vector3<f64>) -> Result<f64> {
    let gs_mag = station.norm();
    let sat_mag = sat.norm();
    let d = (sat - station).norm();
    if gs_mag == 0.0 || d == 0.0 {
        return Err(TopologyError::DegenerateVector("ground-satellite baseline"));
    }
    let cos_theta = (gs_mag * gs_mag + d * d - sat_mag * sat_mag) / (2.0 * gs_mag * d);
    Ok(cos_theta.clamp(-1.0, 1.0).acos().to_degrees() - 90.0)
}

/// Both limits are strict: elevation above the mask, distance under the range.
pub fn ground_link_valid(
    station: &StateVector,
    sat: &StateVector,
    config: &TopologyConfig,
) -> Result<bool> {
    let distance = station.distance_to(sat);
    let elevation = ground_elevation_deg(&station.position, &sat.position)?;
    Ok(elevation > config.min_ground_elevation_deg && distance < config.max_ground_range_km)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn state(p: [f64; 3], v: [f64; 3]) -> StateVector {
        StateVector::new(Vector3::from(p), Vector3::from(v))
    }

    #[test]
    fn test_sector_boundaries() {
        assert_eq!(Sector::of(0.0), Some(Sector::Forward));
        assert_eq!(Sector::of(-45.0), Some(Sector::Forward));
        assert_eq!(Sector::of(45.0), Some(Sector::Left));
        assert_eq!(Sector::of(135.0), Some(Sector::Back));
        assert_eq!(Sector::of(180.0), Some(Sector::Back));
        assert_eq!(Sector::of(-135.1), Some(Sector::Back));
        assert_eq!(Sector::of(-135.0), Some(Sector::Right));
        assert_eq!(Sector::of(-45.1), Some(Sector::Right));
    }

    #[test]
    fn test_port_five_is_not_an_isl_port() {
        assert!(matches!(Sector::for_port(5), Err(TopologyError::NotAnIslPort(5))));
        assert!(matches!(Sector::for_port(0), Err(TopologyError::NotAnIslPort(0))));
    }

    #[test]
    fn test_range_limit_is_inclusive() {
        let config = TopologyConfig {
            max_sat_range_km: 1000.0,
            ..TopologyConfig::default()
        };
        let a = state([7000.0, 0.0, 0.0], [0.0, 7.5, 0.0]);
        let at_limit = state([7000.0, 1000.0, 0.0], [0.0, 7.5, 0.0]);
        let beyond = state([7000.0, 1000.001, 0.0], [0.0, 7.5, 0.0]);

        assert!(sat_link_valid(&a, 1, &at_limit, 3, &config).unwrap());
        assert!(!sat_link_valid(&a, 1, &beyond, 3, &config).unwrap());
    }

    #[test]
    fn test_sector_mismatch_is_invalid() {
        let config = TopologyConfig::default();
        let a = state([7000.0, 0.0, 0.0], [0.0, 7.5, 0.0]);
        let b = state([7000.0, 1000.0, 0.0], [0.0, 7.5, 0.0]);
        assert!(!sat_link_valid(&a, 3, &b, 1, &config).unwrap());
        assert!(!sat_link_valid(&a, 1, &b, 1, &config).unwrap());
        assert!(sat_link_valid(&b, 3, &a, 1, &config).unwrap());
    }

    #[test]
    fn test_overhead_satellite_is_at_zenith() {
        let gs = Vector3::new(6378.0, 0.0, 0.0);
        let sat = Vector3::new(6928.0, 0.0, 0.0);
        let elevation = ground_elevation_deg(&gs, &sat).unwrap();
        assert!((elevation - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_ground_link_thresholds() {
        let config = TopologyConfig::default();
        let gs = StateVector::stationary(Vector3::new(6378.0, 0.0, 0.0));
        let overhead = StateVector::stationary(Vector3::new(6928.0, 0.0, 0.0));
        assert!(ground_link_valid(&gs, &overhead, &config).unwrap());

        // Opposite side of the planet: below the horizon
        let hidden = StateVector::stationary(Vector3::new(-6928.0, 0.0, 0.0));
        assert!(!ground_link_valid(&gs, &hidden, &config).unwrap());

        // Straight up but further than the ground range
        let far = StateVector::stationary(Vector3::new(6378.0 + 3000.0, 0.0, 0.0));
        assert!(!ground_link_valid(&gs, &far, &config).unwrap());
    }

    proptest! {
        #[test]
        fn sectors_partition_the_circle(bearing in -180.0f64..=180.0) {
            let normalized = normalize_bearing(bearing);
            prop_assert!((-45.0..315.0).contains(&normalized));
            let owners = Sector::ALL.iter().filter(|s| s.contains(normalized)).count();
            prop_assert_eq!(owners, 1);
        }
    }
}
