//! Observability records: topology events and per-tick reports

use crate::state::Endpoint;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TopologyEvent {
    /// A link on the probed route was torn down
    RouteDisrupted { at: Duration, a: Endpoint, b: Endpoint },
    /// No satellite satisfied the ground link rules this tick
    GroundStationUnserved { at: Duration, station: usize },
    /// A deferred link failed re-validation when its acquisition completed
    AcquisitionAborted { at: Duration, a: Endpoint, b: Endpoint },
}

impl TopologyEvent {
    pub fn at(&self) -> Duration {
        match self {
            TopologyEvent::RouteDisrupted { at, .. }
            | TopologyEvent::GroundStationUnserved { at, .. }
            | TopologyEvent::AcquisitionAborted { at, .. } => *at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<TopologyEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: TopologyEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[TopologyEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn disruptions(&self) -> impl Iterator<Item = &TopologyEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e, TopologyEvent::RouteDisrupted { .. }))
    }

    pub fn unserved_at(&self, at: Duration) -> impl Iterator<Item = usize> + '_ {
        self.events.iter().filter_map(move |e| match e {
            TopologyEvent::GroundStationUnserved { at: t, station } if *t == at => Some(*station),
            _ => None,
        })
    }

    /// One `<seconds>,` line per route disruption
    pub fn write_disruption_times<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        for event in self.disruptions() {
            writeln!(out, "{},", event.at().as_secs_f64())?;
        }
        out.flush()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkCounters {
    pub maintained: usize,
    pub broken: usize,
    pub established: usize,
    /// Inter-satellite links waiting out the acquisition delay
    pub deferred: usize,
    /// Ground stations left without a satellite
    pub unserved: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub at_s: f64,
    pub ground: LinkCounters,
    pub satellite: LinkCounters,
    /// Endpoints on the probed route before this tick's mutations
    pub route_hops: Option<usize>,
    pub active_links: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::BodyId;

    fn ep(i: usize) -> Endpoint {
        Endpoint::new(BodyId::Satellite(i), 1)
    }

    #[test]
    fn test_disruption_log_format() {
        let mut log = EventLog::new();
        log.record(TopologyEvent::RouteDisrupted { at: Duration::from_secs(15), a: ep(0), b: ep(1) });
        log.record(TopologyEvent::GroundStationUnserved { at: Duration::from_secs(15), station: 1 });
        log.record(TopologyEvent::RouteDisrupted { at: Duration::from_millis(30_500), a: ep(2), b: ep(3) });

        let mut out = Vec::new();
        log.write_disruption_times(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "15,\n30.5,\n");
        assert_eq!(log.unserved_at(Duration::from_secs(15)).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_event_json_is_tagged() {
        let event = TopologyEvent::GroundStationUnserved { at: Duration::from_secs(3), station: 0 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "ground_station_unserved");
        assert_eq!(json["station"], 0);
    }
}
