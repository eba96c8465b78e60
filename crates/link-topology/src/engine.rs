//! Topology engine
//!
//! Per-tick algorithm:
//! 1. propagate every body to the current time
//! 2. capture the probed route (if any) before anything changes
//! 3. ground links: keep valid ones, otherwise break and rescan satellites
//! 4. satellite links: break pass over every linked port, then a separate
//!    establish pass over free ports (never interleaved)
//! 5. ask the transport to recompute forwarding state
//!
//! New inter-satellite links after the first build wait out the acquisition
//! delay as [`PendingLink`] records on the scheduler and are re-validated
//! before they are committed.

use crate::config::TopologyConfig;
use crate::events::{EventLog, LinkCounters, TickReport, TopologyEvent};
use crate::geometry::bearing_pair;
use crate::ports::{GROUND_PORT, ISL_PORTS, SAT_GROUND_PORT};
use crate::route_impact::{RouteProbe, RouteTracker};
use crate::scheduler::{Scheduler, SimEvent};
use crate::state::{BodyId, Endpoint, Link, LinkKind, PortState, TopologyState};
use crate::transport::Transport;
use crate::validity::{ground_link_valid, sat_link_valid, Sector};
use crate::{Result, TopologyError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// An inter-satellite link decided at `decided_at` whose ports are reserved
/// until acquisition completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingLink {
    pub a: Endpoint,
    pub b: Endpoint,
    pub decided_at: Duration,
    pub decision_distance_km: f64,
}

fn satellite_index(endpoint: &Endpoint) -> Result<usize> {
    match endpoint.body {
        BodyId::Satellite(i) => Ok(i),
        BodyId::GroundStation(_) => Err(TopologyError::InvalidEndpoints(
            *endpoint,
            *endpoint,
            LinkKind::SatToSat,
        )),
    }
}

fn sat(index: usize, port: u8) -> Endpoint {
    Endpoint::new(BodyId::Satellite(index), port)
}

pub struct TopologyEngine {
    state: TopologyState,
    config: TopologyConfig,
    tracker: RouteTracker,
    events: EventLog,
    first_build: bool,
}

impl TopologyEngine {
    pub fn new(state: TopologyState, config: TopologyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state,
            config,
            tracker: RouteTracker::default(),
            events: EventLog::new(),
            first_build: true,
        })
    }

    /// Watch the route between two ground stations
    pub fn set_route_probe(&mut self, probe: Option<RouteProbe>) -> Result<()> {
        if let Some(p) = probe {
            let stations = self.state.ground_station_count();
            if p.source >= stations || p.destination >= stations || p.source == p.destination {
                return Err(TopologyError::InvalidConfig(format!(
                    "route probe {} -> {} needs two distinct ground stations out of {}",
                    p.source, p.destination, stations
                )));
            }
        }
        self.tracker = RouteTracker::new(probe);
        Ok(())
    }

    pub fn state(&self) -> &TopologyState {
        &self.state
    }

    pub fn config(&self) -> &TopologyConfig {
        &self.config
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn tracker(&self) -> &RouteTracker {
        &self.tracker
    }

    /// The port pair through which `a` and `b` face each other right now, if
    /// both are free and within range. A geometry picks exactly one sector
    /// on each side, so at most one pair can qualify.
    fn isl_candidate(&self, a: usize, b: usize) -> Result<Option<(u8, u8, f64)>> {
        let state_a = self.state.kinematics(BodyId::Satellite(a))?;
        let state_b = self.state.kinematics(BodyId::Satellite(b))?;
        let distance = state_a.distance_to(&state_b);
        if distance > self.config.max_sat_range_km {
            return Ok(None);
        }

        let (from_a, from_b) = bearing_pair(&state_a, &state_b)?;
        let (Some(sector_a), Some(sector_b)) = (Sector::of(from_a), Sector::of(from_b)) else {
            return Ok(None);
        };
        let pool = self.state.pool();
        if pool.is_free(a, sector_a.port()) && pool.is_free(b, sector_b.port()) {
            Ok(Some((sector_a.port(), sector_b.port(), distance)))
        } else {
            Ok(None)
        }
    }

    fn bring_up<T: Transport + ?Sized>(
        &mut self,
        a: Endpoint,
        b: Endpoint,
        distance_km: f64,
        kind: LinkKind,
        transport: &mut T,
    ) -> Result<()> {
        let link = self.state.establish_link(a, b, distance_km, kind)?;
        transport.link_up(link);
        Ok(())
    }

    /// Destroy a link, recording a disruption when it lies on the probed route
    fn tear_down<T: Transport + ?Sized>(
        &mut self,
        a: Endpoint,
        b: Endpoint,
        now: Duration,
        transport: &mut T,
    ) -> Result<Link> {
        if self.tracker.affects(&a, &b) {
            info!("Route broken between {} and {}", a, b);
            self.events.record(TopologyEvent::RouteDisrupted { at: now, a, b });
        }
        let link = self.state.destroy_link(a, b)?;
        transport.link_down(&link);
        Ok(link)
    }

    /// Link every satellite to its successor in its orbital ring. Runs once
    /// before the first tick; returns the number of links created.
    ///
    /// A truncated ring ends the simulated subset: its last member is not
    /// linked back to the first and no later ring is visited.
    pub fn initialize_ring<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<usize> {
        let rings: Vec<(Vec<usize>, bool)> = self
            .state
            .planes()
            .iter()
            .map(|plane| (plane.members.clone(), plane.truncated))
            .collect();
        let mut visited = 0;
        let mut established = 0;

        'rings: for (p, (members, truncated)) in rings.iter().enumerate() {
            debug!("Ring {}/{}", p + 1, rings.len());
            for (j, &current) in members.iter().enumerate() {
                visited += 1;
                let next = match members.get(j + 1) {
                    Some(&next) => next,
                    None if *truncated => break 'rings,
                    None => members[0],
                };

                if next == current
                    || self.state.are_linked(BodyId::Satellite(current), BodyId::Satellite(next))
                {
                    continue;
                }
                if let Some((port_a, port_b, distance)) = self.isl_candidate(current, next)? {
                    self.state.pool_mut().reserve(current, port_a)?;
                    self.state.pool_mut().reserve(next, port_b)?;
                    self.bring_up(sat(current, port_a), sat(next, port_b), distance, LinkKind::SatToSat, transport)?;
                    established += 1;
                } else {
                    debug!("No usable ports between SAT-{} and SAT-{} in ring", current, next);
                }
            }
        }

        info!(
            "Initialized {} intra-plane links over {} of {} satellites",
            established,
            visited,
            self.state.satellite_count()
        );
        Ok(established)
    }

    fn update_ground_links<T: Transport + ?Sized>(
        &mut self,
        now: Duration,
        transport: &mut T,
    ) -> Result<LinkCounters> {
        let mut counters = LinkCounters::default();

        for gs in 0..self.state.ground_station_count() {
            let station = Endpoint::new(BodyId::GroundStation(gs), GROUND_PORT);
            let station_state = self.state.kinematics(station.body)?;

            if let Some(peer) = self.state.peer(station)? {
                let sat_state = self.state.kinematics(peer.body)?;
                if ground_link_valid(&station_state, &sat_state, &self.config)? {
                    debug!("Ground link maintained {} <-> {}", station, peer);
                    counters.maintained += 1;
                    continue;
                }
                self.tear_down(station, peer, now, transport)?;
                debug!("Ground link broken {} <-> {}", station, peer);
                counters.broken += 1;
            }

            let mut served = false;
            for s in 0..self.state.satellite_count() {
                let sat_port = sat(s, SAT_GROUND_PORT);
                if self.state.port_state(sat_port)? != PortState::Free {
                    continue;
                }
                let sat_state = self.state.kinematics(sat_port.body)?;
                if ground_link_valid(&station_state, &sat_state, &self.config)? {
                    let distance = station_state.distance_to(&sat_state);
                    self.bring_up(station, sat_port, distance, LinkKind::GroundToSat, transport)?;
                    debug!("Ground link established {} <-> {}", station, sat_port);
                    counters.established += 1;
                    served = true;
                    break;
                }
            }

            if !served {
                warn!("Ground station {} has no satellite in view", gs);
                counters.unserved += 1;
                self.events.record(TopologyEvent::GroundStationUnserved { at: now, station: gs });
            }
        }
        Ok(counters)
    }

    fn break_satellite_links<T: Transport + ?Sized>(
        &mut self,
        now: Duration,
        counters: &mut LinkCounters,
        transport: &mut T,
    ) -> Result<()> {
        for s in 0..self.state.satellite_count() {
            for port in ISL_PORTS {
                let here = sat(s, port);
                let Some(peer) = self.state.peer(here)? else {
                    continue;
                };
                // Already judged from the peer's side
                if peer < here {
                    continue;
                }
                let state_here = self.state.kinematics(here.body)?;
                let state_peer = self.state.kinematics(peer.body)?;
                if sat_link_valid(&state_here, here.port, &state_peer, peer.port, &self.config)? {
                    counters.maintained += 1;
                    continue;
                }

                self.tear_down(here, peer, now, transport)?;
                self.state.pool_mut().release(s, here.port)?;
                self.state.pool_mut().release(satellite_index(&peer)?, peer.port)?;
                debug!("Satellite link broken {} <-> {}", here, peer);
                counters.broken += 1;
            }
        }
        Ok(())
    }

    fn establish_satellite_links<T: Transport + ?Sized, S: Scheduler + ?Sized>(
        &mut self,
        now: Duration,
        counters: &mut LinkCounters,
        transport: &mut T,
        scheduler: &mut S,
    ) -> Result<()> {
        let immediate = self.first_build || self.config.acquisition_delay_s == 0.0;
        let n = self.state.satellite_count();

        for s in 0..n {
            for other in 0..n {
                if !self.state.pool().has_free(s) {
                    break;
                }
                if other == s || !self.state.pool().has_free(other) {
                    continue;
                }
                let Some((port_a, port_b, distance)) = self.isl_candidate(s, other)? else {
                    continue;
                };

                self.state.pool_mut().reserve(s, port_a)?;
                self.state.pool_mut().reserve(other, port_b)?;
                let (a, b) = (sat(s, port_a), sat(other, port_b));

                if immediate {
                    self.bring_up(a, b, distance, LinkKind::SatToSat, transport)?;
                    debug!("Satellite link established {} <-> {}", a, b);
                    counters.established += 1;
                } else {
                    let pending = PendingLink {
                        a,
                        b,
                        decided_at: now,
                        decision_distance_km: distance,
                    };
                    scheduler.schedule_at(
                        now + self.config.acquisition_delay()?,
                        SimEvent::CommitAcquisition(pending),
                    );
                    debug!("Satellite link {} <-> {} acquiring", a, b);
                    counters.deferred += 1;
                }
            }
        }
        Ok(())
    }

    /// Run one topology update at the scheduler's current time
    pub fn update_constellation<T: Transport + ?Sized, S: Scheduler + ?Sized>(
        &mut self,
        transport: &mut T,
        scheduler: &mut S,
    ) -> Result<TickReport> {
        let now = scheduler.now();
        self.state.refresh_kinematics(now)?;
        let route_hops = self.tracker.capture(&self.state, &*transport)?;

        let ground = self.update_ground_links(now, transport)?;

        let mut satellite = LinkCounters::default();
        self.break_satellite_links(now, &mut satellite, transport)?;
        self.establish_satellite_links(now, &mut satellite, transport, scheduler)?;
        self.first_build = false;

        transport.recompute_forwarding_state(&self.state)?;
        self.tracker.clear();

        info!(
            "<{}s> ground: maintained {} broke {} established {} unserved {} | satellite: maintained {} broke {} established {} acquiring {}",
            now.as_secs_f64(),
            ground.maintained,
            ground.broken,
            ground.established,
            ground.unserved,
            satellite.maintained,
            satellite.broken,
            satellite.established,
            satellite.deferred
        );

        Ok(TickReport {
            at_s: now.as_secs_f64(),
            ground,
            satellite,
            route_hops,
            active_links: self.state.link_count(),
        })
    }

    /// Finish a deferred acquisition. The link is committed only if it is
    /// still valid at `now`; otherwise its ports go back to the pool.
    pub fn commit_acquisition<T: Transport + ?Sized>(
        &mut self,
        pending: &PendingLink,
        now: Duration,
        transport: &mut T,
    ) -> Result<bool> {
        let sat_a = satellite_index(&pending.a)?;
        let sat_b = satellite_index(&pending.b)?;
        let state_a = self.state.state_at(pending.a.body, now)?;
        let state_b = self.state.state_at(pending.b.body, now)?;

        if sat_link_valid(&state_a, pending.a.port, &state_b, pending.b.port, &self.config)? {
            let distance = state_a.distance_to(&state_b);
            self.bring_up(pending.a, pending.b, distance, LinkKind::SatToSat, transport)?;
            debug!("Acquisition complete {} <-> {} ({:.1} km)", pending.a, pending.b, distance);
            Ok(true)
        } else {
            self.state.pool_mut().release(sat_a, pending.a.port)?;
            self.state.pool_mut().release(sat_b, pending.b.port)?;
            debug!(
                "Acquisition aborted {} <-> {}, geometry no longer valid since {:?}",
                pending.a, pending.b, pending.decided_at
            );
            self.events.record(TopologyEvent::AcquisitionAborted {
                at: now,
                a: pending.a,
                b: pending.b,
            });
            Ok(false)
        }
    }
}
