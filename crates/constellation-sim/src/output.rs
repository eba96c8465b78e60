//! Result files written into the output directory

use crate::Result;
use link_topology::{SimulationSummary, TopologyState};
use orbital_glaf::TopologySnapshot;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const TICK_REPORTS_FILE: &str = "tick_reports.json";
pub const SNAPSHOTS_FILE: &str = "snapshots.jsonl";

pub fn disruption_log_name(satellites: usize) -> String {
    format!("link_break_times_satCount{}.log", satellites)
}

pub struct OutputSink {
    dir: PathBuf,
    snapshots: Option<BufWriter<File>>,
    snapshot_count: usize,
}

impl OutputSink {
    /// Create the output directory; opens the snapshot stream when requested
    pub fn create(dir: impl AsRef<Path>, with_snapshots: bool) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let snapshots = if with_snapshots {
            Some(BufWriter::new(File::create(dir.join(SNAPSHOTS_FILE))?))
        } else {
            None
        };
        Ok(Self {
            dir,
            snapshots,
            snapshot_count: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append one snapshot line; no-op without a snapshot stream
    pub fn record_snapshot(&mut self, state: &TopologyState) -> Result<()> {
        let Some(out) = self.snapshots.as_mut() else {
            return Ok(());
        };
        let line = TopologySnapshot::capture(state)?.to_json_line()?;
        writeln!(out, "{}", line)?;
        self.snapshot_count += 1;
        Ok(())
    }

    /// Write the disruption log and tick reports; returns the files written
    pub fn finish(mut self, summary: &SimulationSummary) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();

        let log_path = self.dir.join(disruption_log_name(summary.satellites));
        summary
            .events
            .write_disruption_times(BufWriter::new(File::create(&log_path)?))?;
        info!("Wrote {} route disruptions to {:?}", summary.disruption_count(), log_path);
        written.push(log_path);

        let reports_path = self.dir.join(TICK_REPORTS_FILE);
        let mut writer = BufWriter::new(File::create(&reports_path)?);
        serde_json::to_writer_pretty(&mut writer, &summary.ticks)?;
        writer.flush()?;
        info!("Wrote {} tick reports to {:?}", summary.ticks.len(), reports_path);
        written.push(reports_path);

        if let Some(mut out) = self.snapshots.take() {
            out.flush()?;
            let path = self.dir.join(SNAPSHOTS_FILE);
            info!("Wrote {} snapshots to {:?}", self.snapshot_count, path);
            written.push(path);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use link_topology::{EventLog, TickReport, TopologyEvent};
    use std::time::Duration;

    #[test]
    fn test_disruption_log_name() {
        assert_eq!(disruption_log_name(1584), "link_break_times_satCount1584.log");
    }

    #[test]
    fn test_finish_writes_log_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let sink = OutputSink::create(dir.path().join("run"), false).unwrap();

        let mut events = EventLog::new();
        events.record(TopologyEvent::GroundStationUnserved {
            at: Duration::from_secs(15),
            station: 0,
        });
        events.record(TopologyEvent::RouteDisrupted {
            at: Duration::from_secs(30),
            a: link_topology::Endpoint::new(link_topology::BodyId::Satellite(0), 1),
            b: link_topology::Endpoint::new(link_topology::BodyId::Satellite(1), 3),
        });
        let summary = SimulationSummary {
            satellites: 12,
            ground_stations: 2,
            ring_links: 12,
            ticks: vec![TickReport::default(), TickReport::default()],
            events,
        };

        let written = sink.finish(&summary).unwrap();
        assert_eq!(written.len(), 2);

        let log = fs::read_to_string(dir.path().join("run").join(disruption_log_name(12))).unwrap();
        assert_eq!(log, "30,\n");

        let reports: Vec<TickReport> =
            serde_json::from_str(&fs::read_to_string(dir.path().join("run").join(TICK_REPORTS_FILE)).unwrap())
                .unwrap();
        assert_eq!(reports.len(), 2);
    }
}
