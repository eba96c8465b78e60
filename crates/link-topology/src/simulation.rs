//! Simulation driver: ring setup, periodic ticks and deferred acquisitions
//! on one event queue.

use crate::config::SimulationConfig;
use crate::engine::TopologyEngine;
use crate::events::{EventLog, TickReport};
use crate::scheduler::{EventQueue, Scheduler, SimEvent};
use crate::state::TopologyState;
use crate::transport::Transport;
use crate::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub satellites: usize,
    pub ground_stations: usize,
    pub ring_links: usize,
    pub ticks: Vec<TickReport>,
    pub events: EventLog,
}

impl SimulationSummary {
    pub fn disruption_count(&self) -> usize {
        self.events.disruptions().count()
    }
}

pub struct Simulation<T: Transport> {
    engine: TopologyEngine,
    transport: T,
    queue: EventQueue,
    config: SimulationConfig,
}

impl<T: Transport> Simulation<T> {
    pub fn new(mut engine: TopologyEngine, transport: T, config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        engine.set_route_probe(config.route_probe)?;
        Ok(Self {
            engine,
            transport,
            queue: EventQueue::new(),
            config,
        })
    }

    pub fn engine(&self) -> &TopologyEngine {
        &self.engine
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn run(&mut self) -> Result<SimulationSummary> {
        self.run_with(|_, _, _| Ok(()))
    }

    /// Run to completion, calling `on_tick` after every topology update
    pub fn run_with<F>(&mut self, mut on_tick: F) -> Result<SimulationSummary>
    where
        F: FnMut(&TopologyState, &T, &TickReport) -> Result<()>,
    {
        let loops = self.config.loops();
        info!(
            "Simulating {} min with updates every {} s ({} updates)",
            self.config.duration_min,
            self.config.update_interval_s,
            loops.max(1)
        );

        let ring_links = self.engine.initialize_ring(&mut self.transport)?;

        let interval = self.config.update_interval();
        for i in 1..loops {
            self.queue.schedule_at(interval * i as u32, SimEvent::Tick);
        }

        let mut ticks = Vec::with_capacity(loops as usize);
        let report = self.engine.update_constellation(&mut self.transport, &mut self.queue)?;
        on_tick(self.engine.state(), &self.transport, &report)?;
        ticks.push(report);

        while let Some((at, event)) = self.queue.pop() {
            match event {
                SimEvent::Tick => {
                    let report = self.engine.update_constellation(&mut self.transport, &mut self.queue)?;
                    on_tick(self.engine.state(), &self.transport, &report)?;
                    ticks.push(report);
                }
                SimEvent::CommitAcquisition(pending) => {
                    self.engine.commit_acquisition(&pending, at, &mut self.transport)?;
                }
            }
        }

        let state = self.engine.state();
        let summary = SimulationSummary {
            satellites: state.satellite_count(),
            ground_stations: state.ground_station_count(),
            ring_links,
            ticks,
            events: self.engine.events().clone(),
        };
        info!(
            "Simulation finished at {:?}: {} updates, {} route disruptions",
            self.queue.now(),
            summary.ticks.len(),
            summary.disruption_count()
        );
        Ok(summary)
    }
}
