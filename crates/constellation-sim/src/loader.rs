//! Constellation loading from catalog files or a Walker pattern

use crate::{GroundSite, Result};
use chrono::{DateTime, Utc};
use link_topology::ConstellationBuilder;
use orbital_mechanics::catalog::{read_orbit_file, read_tle_file, select_planes};
use orbital_mechanics::propagation::Sgp4Trajectory;
use orbital_mechanics::walker::WalkerDelta;
use orbital_mechanics::{FixedSite, GeodeticPosition, Trajectory};
use std::path::Path;
use tracing::info;

/// A constellation ready to be built, plus where its clock starts
pub struct LoadedConstellation {
    pub builder: ConstellationBuilder,
    pub satellites: usize,
    pub planes: usize,
    /// Catalog epoch; `None` for synthetic constellations
    pub start: Option<DateTime<Utc>>,
}

/// Load the planes listed in `orbit_path` with elements from `tle_path`
pub fn from_catalog(
    tle_path: impl AsRef<Path>,
    orbit_path: impl AsRef<Path>,
    limit: Option<usize>,
) -> Result<LoadedConstellation> {
    let catalog = read_tle_file(tle_path)?;
    let planes = read_orbit_file(orbit_path)?;
    let selected = select_planes(&catalog.records, &planes, limit)?;

    let mut builder = ConstellationBuilder::new();
    let mut satellites = 0;
    for plane in &selected {
        let mut members = Vec::with_capacity(plane.records.len());
        for record in &plane.records {
            let trajectory = Sgp4Trajectory::from_tle(&record.line1, &record.line2, catalog.epoch)?;
            members.push((record.name.clone(), Box::new(trajectory) as Box<dyn Trajectory>));
        }
        satellites += members.len();
        if plane.truncated {
            builder.add_partial_plane(plane.name.clone(), members);
        } else {
            builder.add_plane(plane.name.clone(), members);
        }
    }

    info!(
        "Catalog constellation: {} satellites in {} planes from epoch {}",
        satellites,
        selected.len(),
        catalog.epoch
    );
    Ok(LoadedConstellation {
        builder,
        satellites,
        planes: selected.len(),
        start: Some(catalog.epoch),
    })
}

/// Synthetic Walker-delta shell; `limit` keeps the first satellites in plane order
pub fn from_walker(walker: &WalkerDelta, limit: Option<usize>) -> LoadedConstellation {
    let mut remaining = limit.unwrap_or(usize::MAX);
    let mut builder = ConstellationBuilder::new();
    let mut satellites = 0;
    let mut planes = 0;

    for (p, ring) in walker.orbits().into_iter().enumerate() {
        let ring_len = ring.len();
        let members: Vec<_> = ring
            .into_iter()
            .take(remaining)
            .enumerate()
            .map(|(s, orbit)| (format!("WALKER-{}-{}", p, s), Box::new(orbit) as Box<dyn Trajectory>))
            .collect();
        if members.is_empty() {
            break;
        }
        remaining -= members.len();
        satellites += members.len();
        planes += 1;
        if members.len() < ring_len {
            builder.add_partial_plane(format!("PLANE-{}", p), members);
        } else {
            builder.add_plane(format!("PLANE-{}", p), members);
        }
    }

    info!(
        "Walker constellation {}/{}/{} at {} km: {} satellites in {} planes",
        walker.total_satellites, walker.planes, walker.phasing, walker.altitude_km, satellites, planes
    );
    LoadedConstellation {
        builder,
        satellites,
        planes,
        start: None,
    }
}

pub fn add_ground_sites(builder: &mut ConstellationBuilder, sites: &[GroundSite]) -> Result<()> {
    for site in sites {
        let position = GeodeticPosition::new(site.latitude, site.longitude, site.altitude_m / 1000.0);
        let fixed = FixedSite::from_geodetic(&position)?;
        builder.add_ground_station(site.label(), Box::new(fixed));
    }
    info!("Placed {} ground stations", sites.len());
    Ok(())
}
