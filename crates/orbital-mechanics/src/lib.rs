//! Orbital Mechanics Library
//!
//! Position/velocity providers for every body in a simulated constellation:
//! SGP4 propagation from two-line element sets, analytical circular orbits for
//! Walker Delta shells, and fixed ground sites. All states are expressed in an
//! earth-fixed frame, kilometres and kilometres per second.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub mod catalog;

#[derive(Error, Debug)]
pub enum OrbitalError {
    #[error("Invalid TLE format: {0}")]
    InvalidTle(String),
    #[error("Propagation failed: {0}")]
    PropagationFailed(String),
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),
    #[error("Malformed catalog {path}: {reason}")]
    MalformedCatalog { path: String, reason: String },
    #[error("No satellites were imported from the catalog")]
    EmptyCatalog,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OrbitalError>;

/// Standard gravitational parameter of the Earth (km^3/s^2)
pub const EARTH_MU_KM3_S2: f64 = 398_600.4418;

pub const EARTH_EQUATORIAL_RADIUS_KM: f64 = 6378.137;

/// Earth rotation rate (rad/s)
pub const EARTH_ROTATION_RAD_S: f64 = 7.292_115_9e-5;

/// Kinematic state of a body at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateVector {
    /// Earth-fixed position (km)
    pub position: Vector3<f64>,
    /// Earth-fixed velocity (km/s)
    pub velocity: Vector3<f64>,
}

impl StateVector {
    pub fn new(position: Vector3<f64>, velocity: Vector3<f64>) -> Self {
        Self { position, velocity }
    }

    pub fn stationary(position: Vector3<f64>) -> Self {
        Self {
            position,
            velocity: Vector3::zeros(),
        }
    }

    /// Straight-line distance to another state (km)
    pub fn distance_to(&self, other: &StateVector) -> f64 {
        (other.position - self.position).norm()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeodeticPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_km: f64,
}

impl GeodeticPosition {
    pub fn new(latitude: f64, longitude: f64, altitude_km: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude_km,
        }
    }
}

/// Anything that can report where a body is at a given simulated time.
///
/// `elapsed` is measured from the simulation start instant.
pub trait Trajectory {
    fn state_at(&self, elapsed: Duration) -> Result<StateVector>;
}

/// A ground site that never moves in the earth-fixed frame.
#[derive(Debug, Clone, Copy)]
pub struct FixedSite {
    position: Vector3<f64>,
}

impl FixedSite {
    pub fn from_ecef(position: Vector3<f64>) -> Self {
        Self { position }
    }

    pub fn from_geodetic(pos: &GeodeticPosition) -> Result<Self> {
        Ok(Self {
            position: transforms::geodetic_to_ecef(pos)?,
        })
    }

    pub fn position(&self) -> Vector3<f64> {
        self.position
    }
}

impl Trajectory for FixedSite {
    fn state_at(&self, _elapsed: Duration) -> Result<StateVector> {
        Ok(StateVector::stationary(self.position))
    }
}

pub mod propagation {
    use super::*;
    use chrono::{DateTime, Utc};

    /// SGP4-propagated satellite, anchored at the simulation start instant.
    pub struct Sgp4Trajectory {
        constants: sgp4::Constants,
        tle_epoch: DateTime<Utc>,
        start: DateTime<Utc>,
    }

    impl Sgp4Trajectory {
        pub fn from_tle(tle_line1: &str, tle_line2: &str, start: DateTime<Utc>) -> Result<Self> {
            let elements = sgp4::Elements::from_tle(
                None,
                tle_line1.as_bytes(),
                tle_line2.as_bytes(),
            ).map_err(|e| OrbitalError::InvalidTle(format!("{:?}", e)))?;

            let constants = sgp4::Constants::from_elements(&elements)
                .map_err(|e| OrbitalError::PropagationFailed(format!("{:?}", e)))?;

            let tle_epoch = DateTime::<Utc>::from_naive_utc_and_offset(elements.datetime, Utc);

            Ok(Self {
                constants,
                tle_epoch,
                start,
            })
        }

        pub fn tle_epoch(&self) -> DateTime<Utc> {
            self.tle_epoch
        }
    }

    impl Trajectory for Sgp4Trajectory {
        fn state_at(&self, elapsed: Duration) -> Result<StateVector> {
            let elapsed = chrono::Duration::from_std(elapsed)
                .map_err(|e| OrbitalError::PropagationFailed(e.to_string()))?;
            let time = self.start + elapsed;
            let since_epoch = time.signed_duration_since(self.tle_epoch);
            let minutes_since_epoch = since_epoch.num_milliseconds() as f64 / 60_000.0;

            let prediction = self.constants.propagate(minutes_since_epoch)
                .map_err(|e| OrbitalError::PropagationFailed(format!("{:?}", e)))?;

            let teme = StateVector::new(
                Vector3::from(prediction.position),
                Vector3::from(prediction.velocity),
            );
            Ok(transforms::teme_to_ecef(&teme, transforms::gmst_rad(time)))
        }
    }
}

pub mod transforms {
    use super::*;
    use chrono::{DateTime, Utc};

    const EARTH_RADIUS_KM: f64 = EARTH_EQUATORIAL_RADIUS_KM;
    const EARTH_FLATTENING: f64 = 1.0 / 298.257223563;

    pub fn ecef_to_geodetic(position: &Vector3<f64>) -> Result<GeodeticPosition> {
        let (x, y, z) = (position.x, position.y, position.z);
        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return Err(OrbitalError::InvalidCoordinates(format!("{:?}", position)));
        }
        // Spherical approximation, good enough for logging ground tracks
        let r = (x * x + y * y).sqrt();
        let longitude = y.atan2(x).to_degrees();
        let latitude = z.atan2(r).to_degrees();
        let altitude_km = position.norm() - EARTH_RADIUS_KM;

        Ok(GeodeticPosition {
            latitude,
            longitude,
            altitude_km,
        })
    }

    pub fn geodetic_to_ecef(pos: &GeodeticPosition) -> Result<Vector3<f64>> {
        if !(-90.0..=90.0).contains(&pos.latitude) || !(-180.0..=180.0).contains(&pos.longitude) {
            return Err(OrbitalError::InvalidCoordinates(format!(
                "lat {} lon {}",
                pos.latitude, pos.longitude
            )));
        }
        let lat_rad = pos.latitude.to_radians();
        let lon_rad = pos.longitude.to_radians();
        let alt = pos.altitude_km;

        // WGS84
        let e2 = 2.0 * EARTH_FLATTENING - EARTH_FLATTENING * EARTH_FLATTENING;
        let n = EARTH_RADIUS_KM / (1.0 - e2 * lat_rad.sin().powi(2)).sqrt();

        let x = (n + alt) * lat_rad.cos() * lon_rad.cos();
        let y = (n + alt) * lat_rad.cos() * lon_rad.sin();
        let z = (n * (1.0 - e2) + alt) * lat_rad.sin();

        Ok(Vector3::new(x, y, z))
    }

    /// Greenwich mean sidereal time (IAU 1982), radians in [0, 2π)
    pub fn gmst_rad(time: DateTime<Utc>) -> f64 {
        let unix_days = time.timestamp_millis() as f64 / 86_400_000.0;
        let julian_date = unix_days + 2_440_587.5;
        let t = (julian_date - 2_451_545.0) / 36_525.0;

        let gmst_sec = 67_310.548_41
            + (876_600.0 * 3600.0 + 8_640_184.812_866) * t
            + 0.093_104 * t * t
            - 6.2e-6 * t * t * t;

        (gmst_sec.rem_euclid(86_400.0) / 240.0).to_radians()
    }

    /// Rotate a TEME state into the earth-fixed frame.
    pub fn teme_to_ecef(teme: &StateVector, gmst_rad: f64) -> StateVector {
        let (sin_g, cos_g) = gmst_rad.sin_cos();
        let rotate = |v: &Vector3<f64>| {
            Vector3::new(
                cos_g * v.x + sin_g * v.y,
                -sin_g * v.x + cos_g * v.y,
                v.z,
            )
        };

        let position = rotate(&teme.position);
        let omega = Vector3::new(0.0, 0.0, EARTH_ROTATION_RAD_S);
        let velocity = rotate(&teme.velocity) - omega.cross(&position);

        StateVector { position, velocity }
    }
}

pub mod walker {
    use super::*;

    /// Analytical circular orbit. Earth rotation is neglected, so the orbit
    /// frame doubles as the earth-fixed frame.
    #[derive(Debug, Clone, Copy, Serialize, Deserialize)]
    pub struct CircularOrbit {
        pub radius_km: f64,
        pub inclination_deg: f64,
        pub raan_deg: f64,
        /// Argument of latitude at t = 0
        pub initial_phase_deg: f64,
    }

    impl CircularOrbit {
        pub fn mean_motion_rad_s(&self) -> f64 {
            (EARTH_MU_KM3_S2 / self.radius_km.powi(3)).sqrt()
        }

        pub fn period_s(&self) -> f64 {
            2.0 * std::f64::consts::PI / self.mean_motion_rad_s()
        }
    }

    impl Trajectory for CircularOrbit {
        fn state_at(&self, elapsed: Duration) -> Result<StateVector> {
            if self.radius_km <= 0.0 || !self.radius_km.is_finite() {
                return Err(OrbitalError::PropagationFailed(format!(
                    "orbit radius {} km",
                    self.radius_km
                )));
            }
            let n = self.mean_motion_rad_s();
            let u = self.initial_phase_deg.to_radians() + n * elapsed.as_secs_f64();
            let (sin_o, cos_o) = self.raan_deg.to_radians().sin_cos();
            let (sin_i, cos_i) = self.inclination_deg.to_radians().sin_cos();

            // In-plane basis: p toward the ascending node, q 90 degrees ahead
            let p = Vector3::new(cos_o, sin_o, 0.0);
            let q = Vector3::new(-cos_i * sin_o, cos_i * cos_o, sin_i);
            let (sin_u, cos_u) = u.sin_cos();

            let position = (p * cos_u + q * sin_u) * self.radius_km;
            let velocity = (q * cos_u - p * sin_u) * (self.radius_km * n);

            Ok(StateVector { position, velocity })
        }
    }

    #[derive(Debug, Clone)]
    pub struct WalkerDelta {
        pub total_satellites: u32,
        pub planes: u32,
        pub phasing: u32,
        pub altitude_km: f64,
        pub inclination_deg: f64,
    }

    impl WalkerDelta {
        pub fn halo_constellation() -> Self {
            WalkerDelta {
                total_satellites: 12,
                planes: 3,
                phasing: 4,
                altitude_km: 10500.0,
                inclination_deg: 55.0,
            }
        }

        /// Low shell whose in-plane neighbours sit well inside laser range
        pub fn leo_shell() -> Self {
            WalkerDelta {
                total_satellites: 240,
                planes: 12,
                phasing: 1,
                altitude_km: 550.0,
                inclination_deg: 53.0,
            }
        }

        pub fn satellites_per_plane(&self) -> u32 {
            self.total_satellites / self.planes
        }

        pub fn plane_spacing_deg(&self) -> f64 {
            360.0 / self.planes as f64
        }

        pub fn in_plane_spacing_deg(&self) -> f64 {
            360.0 / self.satellites_per_plane() as f64
        }

        /// One ring of orbits per plane, in ring order.
        pub fn orbits(&self) -> Vec<Vec<CircularOrbit>> {
            let radius_km = EARTH_EQUATORIAL_RADIUS_KM + self.altitude_km;
            let phase_offset = self.phasing as f64 * 360.0 / self.total_satellites as f64;

            (0..self.planes)
                .map(|plane| {
                    (0..self.satellites_per_plane())
                        .map(|slot| CircularOrbit {
                            radius_km,
                            inclination_deg: self.inclination_deg,
                            raan_deg: plane as f64 * self.plane_spacing_deg(),
                            initial_phase_deg: slot as f64 * self.in_plane_spacing_deg()
                                + plane as f64 * phase_offset,
                        })
                        .collect()
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::walker::{CircularOrbit, WalkerDelta};
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_circular_orbit_keeps_radius_and_speed() {
        let orbit = CircularOrbit {
            radius_km: 6928.0,
            inclination_deg: 53.0,
            raan_deg: 40.0,
            initial_phase_deg: 10.0,
        };
        let expected_speed = (EARTH_MU_KM3_S2 / 6928.0).sqrt();
        for secs in [0u64, 60, 600, 5400] {
            let state = orbit.state_at(Duration::from_secs(secs)).unwrap();
            assert!((state.position.norm() - 6928.0).abs() < 1e-6);
            assert!((state.velocity.norm() - expected_speed).abs() < 1e-9);
            // Circular: velocity is perpendicular to the radius vector
            assert!(state.position.dot(&state.velocity).abs() < 1e-6);
        }
    }

    #[test]
    fn test_sgp4_iss_stays_in_low_orbit() {
        let l1 = "1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927";
        let l2 = "2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537";
        let start = Utc.with_ymd_and_hms(2008, 9, 20, 12, 25, 40).unwrap();
        let iss = propagation::Sgp4Trajectory::from_tle(l1, l2, start).unwrap();
        assert!((iss.tle_epoch() - start).num_seconds().abs() < 1);

        let mut previous: Option<StateVector> = None;
        for minutes in [0u64, 15, 45, 90] {
            let state = iss.state_at(Duration::from_secs(minutes * 60)).unwrap();
            let radius = state.position.norm();
            assert!((6600.0..6800.0).contains(&radius), "radius {} km", radius);
            let speed = state.velocity.norm();
            assert!((7.1..7.9).contains(&speed), "speed {} km/s", speed);
            if let Some(prev) = previous {
                assert!(prev.distance_to(&state) > 100.0);
            }
            previous = Some(state);
        }
    }

    #[test]
    fn test_walker_layout() {
        let walker = WalkerDelta::halo_constellation();
        let orbits = walker.orbits();
        assert_eq!(orbits.len(), 3);
        assert!(orbits.iter().all(|plane| plane.len() == 4));
        assert_eq!(orbits[1][0].raan_deg, 120.0);
        assert_eq!(orbits[0][1].initial_phase_deg, 90.0);
    }

    #[test]
    fn test_geodetic_to_ecef_equator() {
        let ecef = transforms::geodetic_to_ecef(&GeodeticPosition::new(0.0, 0.0, 0.0)).unwrap();
        assert!((ecef.x - 6378.137).abs() < 1e-6);
        assert!(ecef.y.abs() < 1e-9);
        assert!(ecef.z.abs() < 1e-9);

        let pole = transforms::geodetic_to_ecef(&GeodeticPosition::new(90.0, 0.0, 0.0)).unwrap();
        assert!((pole.z - 6356.752).abs() < 0.01);
    }

    #[test]
    fn test_geodetic_rejects_out_of_range() {
        let result = transforms::geodetic_to_ecef(&GeodeticPosition::new(91.0, 0.0, 0.0));
        assert!(matches!(result, Err(OrbitalError::InvalidCoordinates(_))));
    }

    #[test]
    fn test_gmst_at_j2000() {
        // 2000-01-01 12:00 UTC: GMST is about 280.46 degrees
        let j2000 = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        let gmst_deg = transforms::gmst_rad(j2000).to_degrees();
        assert!((gmst_deg - 280.46).abs() < 0.01);
    }

    #[test]
    fn test_teme_to_ecef_preserves_radius() {
        let teme = StateVector::new(Vector3::new(7000.0, 0.0, 0.0), Vector3::new(0.0, 7.5, 0.0));
        let ecef = transforms::teme_to_ecef(&teme, std::f64::consts::FRAC_PI_2);
        assert!((ecef.position.norm() - 7000.0).abs() < 1e-9);
        assert!((ecef.position.y + 7000.0).abs() < 1e-9);
        // Earth rotation slows the apparent eastward speed
        assert!(ecef.velocity.norm() < 7.5);
    }

    #[test]
    fn test_fixed_site_does_not_move() {
        let site = FixedSite::from_geodetic(&GeodeticPosition::new(40.7, -74.0, 0.02)).unwrap();
        let a = site.state_at(Duration::ZERO).unwrap();
        let b = site.state_at(Duration::from_secs(3600)).unwrap();
        assert_eq!(a.position, b.position);
        assert_eq!(b.velocity, Vector3::zeros());
    }
}
