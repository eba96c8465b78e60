//! TLE and orbital-plane catalog loading

use crate::{OrbitalError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};

/// One element set: satellite name plus the two TLE lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TleRecord {
    pub name: String,
    pub line1: String,
    pub line2: String,
}

/// Parsed TLE file: catalog epoch plus its element sets in file order
#[derive(Debug, Clone)]
pub struct TleCatalog {
    pub epoch: DateTime<Utc>,
    pub records: Vec<TleRecord>,
}

/// An orbital plane: ring of satellite names in neighbour order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrbitalPlane {
    pub name: String,
    pub satellites: Vec<String>,
}

fn trim_line(line: &str) -> &str {
    line.trim_end_matches([' ', '\r', '\n'])
}

fn malformed(path: &Path, reason: impl Into<String>) -> OrbitalError {
    OrbitalError::MalformedCatalog {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut lines = Vec::new();
    for line in reader.lines() {
        lines.push(trim_line(&line?).to_string());
    }
    Ok(lines)
}

pub fn parse_epoch(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc));
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Load a TLE catalog. The first line carries the catalog epoch, followed by
/// name / line 1 / line 2 triples. An incomplete trailing group is ignored.
pub fn read_tle_file(path: impl AsRef<Path>) -> Result<TleCatalog> {
    let path = path.as_ref();
    info!("Loading TLE catalog from {:?}", path);

    let lines = read_lines(path)?;
    let mut lines = lines.into_iter().filter(|l| !l.is_empty());

    let header = lines.next().ok_or_else(|| malformed(path, "missing epoch line"))?;
    let epoch = parse_epoch(&header)
        .ok_or_else(|| malformed(path, format!("unparseable epoch '{}'", header)))?;

    let body: Vec<String> = lines.collect();
    let mut records = Vec::with_capacity(body.len() / 3);
    for group in body.chunks_exact(3) {
        if !group[1].starts_with('1') || !group[2].starts_with('2') {
            return Err(malformed(
                path,
                format!("element set for '{}' is out of order", group[0].trim()),
            ));
        }
        records.push(TleRecord {
            name: group[0].trim().to_string(),
            line1: group[1].clone(),
            line2: group[2].clone(),
        });
    }

    let leftover = body.len() % 3;
    if leftover != 0 {
        warn!("Ignoring {} trailing line(s) in {:?}", leftover, path);
    }

    info!("Loaded {} element sets (epoch {})", records.len(), epoch);
    Ok(TleCatalog { epoch, records })
}

/// Load the orbit file: plane name followed by a comma separated ring of
/// satellite names, repeated.
pub fn read_orbit_file(path: impl AsRef<Path>) -> Result<Vec<OrbitalPlane>> {
    let path = path.as_ref();
    info!("Loading orbital planes from {:?}", path);

    let lines: Vec<String> = read_lines(path)?
        .into_iter()
        .filter(|l| !l.trim().is_empty())
        .collect();

    let mut planes = Vec::new();
    for pair in lines.chunks_exact(2) {
        let satellites: Vec<String> = pair[1]
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if satellites.is_empty() {
            return Err(malformed(path, format!("plane '{}' has no members", pair[0].trim())));
        }
        planes.push(OrbitalPlane {
            name: pair[0].trim().to_string(),
            satellites,
        });
    }
    if lines.len() % 2 != 0 {
        warn!("Ignoring dangling plane header in {:?}", path);
    }

    info!("Loaded {} orbital planes", planes.len());
    Ok(planes)
}

/// Catalog entries selected for one plane, in ring order
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedPlane {
    pub name: String,
    pub records: Vec<TleRecord>,
    /// The satellite limit ended this plane before its last catalogued member
    pub truncated: bool,
}

/// Keep only catalog entries that belong to a plane, grouped by plane in ring
/// order. `limit` caps the total number of satellites kept.
pub fn select_planes(
    records: &[TleRecord],
    planes: &[OrbitalPlane],
    limit: Option<usize>,
) -> Result<Vec<SelectedPlane>> {
    let by_name: HashMap<&str, &TleRecord> =
        records.iter().map(|r| (r.name.as_str(), r)).collect();
    let mut remaining = limit.unwrap_or(usize::MAX);
    let mut selected = Vec::new();

    for plane in planes {
        if remaining == 0 {
            break;
        }
        let mut ring = Vec::new();
        let mut truncated = false;
        for (i, name) in plane.satellites.iter().enumerate() {
            if remaining == 0 {
                truncated = plane.satellites[i..]
                    .iter()
                    .any(|rest| by_name.contains_key(rest.as_str()));
                break;
            }
            match by_name.get(name.as_str()) {
                Some(record) => {
                    ring.push((*record).clone());
                    remaining -= 1;
                }
                None => warn!("Satellite {} of plane {} not in TLE catalog", name, plane.name),
            }
        }
        if !ring.is_empty() {
            selected.push(SelectedPlane {
                name: plane.name.clone(),
                records: ring,
                truncated,
            });
        }
    }

    if selected.is_empty() {
        return Err(OrbitalError::EmptyCatalog);
    }
    let total: usize = selected.iter().map(|plane| plane.records.len()).sum();
    info!("Selected {} satellites in {} planes", total, selected.len());
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const ISS_L1: &str = "1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927";
    const ISS_L2: &str = "2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537";

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_read_tle_file_trims_and_groups() {
        let contents = format!(
            "2008-09-20 12:25:40\r\nSAT-A  \r\n{ISS_L1} \r\n{ISS_L2}\r\nSAT-B\n{ISS_L1}\n{ISS_L2}\nSAT-C\n{ISS_L1}\n"
        );
        let file = write_temp(&contents);
        let catalog = read_tle_file(file.path()).unwrap();

        assert_eq!(catalog.epoch.to_rfc3339(), "2008-09-20T12:25:40+00:00");
        assert_eq!(catalog.records.len(), 2);
        assert_eq!(catalog.records[0].name, "SAT-A");
        assert_eq!(catalog.records[0].line1, ISS_L1);
        assert_eq!(catalog.records[1].line2, ISS_L2);
    }

    #[test]
    fn test_read_tle_file_rejects_bad_epoch() {
        let file = write_temp("yesterday\nSAT\n1 x\n2 y\n");
        assert!(matches!(
            read_tle_file(file.path()),
            Err(OrbitalError::MalformedCatalog { .. })
        ));
    }

    #[test]
    fn test_read_orbit_file() {
        let file = write_temp("Plane 1\nA, B,C\nPlane 2\nD,E\n");
        let planes = read_orbit_file(file.path()).unwrap();
        assert_eq!(planes.len(), 2);
        assert_eq!(planes[0].satellites, vec!["A", "B", "C"]);
        assert_eq!(planes[1].name, "Plane 2");
    }

    fn record(name: &str) -> TleRecord {
        TleRecord {
            name: name.to_string(),
            line1: ISS_L1.to_string(),
            line2: ISS_L2.to_string(),
        }
    }

    #[test]
    fn test_select_planes_orders_and_limits() {
        let records = vec![record("C"), record("A"), record("B"), record("D")];
        let planes = vec![
            OrbitalPlane { name: "P1".into(), satellites: vec!["A".into(), "X".into(), "B".into()] },
            OrbitalPlane { name: "P2".into(), satellites: vec!["C".into(), "D".into()] },
        ];

        let all = select_planes(&records, &planes, None).unwrap();
        assert_eq!(all.len(), 2);
        let names: Vec<&str> = all[0].records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert!(all.iter().all(|plane| !plane.truncated));

        let limited = select_planes(&records, &planes, Some(3)).unwrap();
        let total: usize = limited.iter().map(|plane| plane.records.len()).sum();
        assert_eq!(total, 3);
        assert_eq!(limited[1].records[0].name, "C");
        assert!(!limited[0].truncated);
        assert!(limited[1].truncated);

        // Limit lands exactly on a plane boundary
        let exact = select_planes(&records, &planes, Some(2)).unwrap();
        assert_eq!(exact.len(), 1);
        assert!(!exact[0].truncated);
    }

    #[test]
    fn test_select_planes_empty_is_error() {
        let planes = vec![OrbitalPlane { name: "P".into(), satellites: vec!["Z".into()] }];
        assert!(matches!(
            select_planes(&[record("A")], &planes, None),
            Err(OrbitalError::EmptyCatalog)
        ));
    }
}
