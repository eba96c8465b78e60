//! Vector helpers and satellite-relative bearings

use crate::{Result, TopologyError};
use nalgebra::Vector3;
use orbital_mechanics::StateVector;

const MIN_NORM: f64 = 1e-12;

/// Unit vector along `v`. Zero or non-finite vectors are rejected rather than
/// turned into NaN.
pub fn normalize(v: &Vector3<f64>, what: &'static str) -> Result<Vector3<f64>> {
    let norm = v.norm();
    if !norm.is_finite() || norm < MIN_NORM {
        return Err(TopologyError::DegenerateVector(what));
    }
    Ok(v / norm)
}

pub fn cross(a: &Vector3<f64>, b: &Vector3<f64>) -> Vector3<f64> {
    a.cross(b)
}

/// Component of `v` orthogonal to the unit normal `n`
pub fn project_onto_plane(v: &Vector3<f64>, n: &Vector3<f64>) -> Vector3<f64> {
    v - n * v.dot(n)
}

/// Local frame of a moving body: x along velocity, z radial, y = z × x.
#[derive(Debug, Clone, Copy)]
pub struct LocalFrame {
    pub x: Vector3<f64>,
    pub y: Vector3<f64>,
    pub z: Vector3<f64>,
}

impl LocalFrame {
    pub fn of(state: &StateVector) -> Result<Self> {
        let x = normalize(&state.velocity, "velocity")?;
        let z = normalize(&state.position, "position")?;
        let y = normalize(&cross(&z, &x), "orbit normal")?;
        Ok(Self { x, y, z })
    }

    /// Signed angle in degrees, (-180, 180], from the x axis toward `target`
    /// after projecting the relative vector onto the local x-y plane.
    pub fn bearing_to(&self, origin: &Vector3<f64>, target: &Vector3<f64>) -> f64 {
        let relative = project_onto_plane(&(target - origin), &self.z);
        let angle = relative.dot(&self.y).atan2(relative.dot(&self.x)).to_degrees();
        if angle == -180.0 {
            180.0
        } else {
            angle
        }
    }
}

/// Bearing from A toward B in A's frame, and from B toward A in B's frame
pub fn bearing_pair(a: &StateVector, b: &StateVector) -> Result<(f64, f64)> {
    let frame_a = LocalFrame::of(a)?;
    let frame_b = LocalFrame::of(b)?;
    Ok((
        frame_a.bearing_to(&a.position, &b.position),
        frame_b.bearing_to(&b.position, &a.position),
    ))
}
