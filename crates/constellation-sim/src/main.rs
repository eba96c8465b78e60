//! Constellation link-topology simulation CLI
//!
//! Usage:
//!   constellation-sim --tle-data data/starlink.tle --tle-orbits data/starlink.orbits \
//!                     --sim-time 10 --update-interval 15 --out-dir out
//!   constellation-sim --walker --sat-count 120 --snapshots

use anyhow::{bail, Result};
use clap::Parser;
use constellation_sim::output::OutputSink;
use constellation_sim::{loader, GroundSite, DUBAI, NEW_YORK};
use link_topology::{RouteProbe, RunConfig, Simulation, TopologyEngine};
use orbital_glaf::{GraphTransport, LinkMetric};
use orbital_mechanics::walker::WalkerDelta;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(
    name = "constellation-sim",
    about = "Simulate the dynamic link topology of a satellite constellation"
)]
struct Args {
    /// TLE catalog: epoch line, then name/line1/line2 groups
    #[arg(long, requires = "tle_orbits", conflicts_with = "walker")]
    tle_data: Option<PathBuf>,

    /// Orbital planes: plane name line, then comma-separated members
    #[arg(long, requires = "tle_data")]
    tle_orbits: Option<PathBuf>,

    /// Use a synthetic Walker-delta LEO shell instead of a catalog
    #[arg(long)]
    walker: bool,

    /// Simulate only the first N satellites
    #[arg(long)]
    sat_count: Option<usize>,

    /// Simulated duration in minutes
    #[arg(long)]
    sim_time: Option<u64>,

    /// Seconds between topology updates
    #[arg(long)]
    update_interval: Option<u64>,

    /// Inter-satellite link acquisition time in seconds
    #[arg(long)]
    link_acq_time: Option<f64>,

    /// JSON run configuration; flags above override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ground station as lat,lon,alt_m (repeatable)
    #[arg(long = "ground-station")]
    ground_stations: Vec<GroundSite>,

    /// Route by propagation delay instead of hop count
    #[arg(long)]
    delay_metric: bool,

    /// Output directory
    #[arg(short, long, default_value = "out")]
    out_dir: PathBuf,

    /// Also write a topology snapshot per tick
    #[arg(long)]
    snapshots: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(args: &Args) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_json_file(path)?,
        None => RunConfig::default(),
    };
    if let Some(minutes) = args.sim_time {
        config.simulation.duration_min = minutes;
    }
    if let Some(seconds) = args.update_interval {
        config.simulation.update_interval_s = seconds;
    }
    if let Some(seconds) = args.link_acq_time {
        config.topology.acquisition_delay_s = seconds;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    info!("{}", "=".repeat(60));
    info!("SX9-Orbital Constellation Link Simulator");
    info!("{}", "=".repeat(60));

    let mut config = load_config(&args)?;

    let mut loaded = if args.walker {
        loader::from_walker(&WalkerDelta::leo_shell(), args.sat_count)
    } else if let (Some(tle), Some(orbits)) = (&args.tle_data, &args.tle_orbits) {
        loader::from_catalog(tle, orbits, args.sat_count)?
    } else {
        bail!("either --walker or both --tle-data and --tle-orbits are required");
    };
    if let Some(start) = loaded.start {
        info!("Simulation clock starts at {}", start);
    }

    let sites = if args.ground_stations.is_empty() {
        vec![NEW_YORK, DUBAI]
    } else {
        args.ground_stations.clone()
    };
    loader::add_ground_sites(&mut loaded.builder, &sites)?;

    // Watch the first two stations unless the config names a pair
    if config.simulation.route_probe.is_none() && sites.len() >= 2 {
        config.simulation.route_probe = Some(RouteProbe {
            source: 0,
            destination: 1,
        });
    }

    let state = loaded.builder.build(&config.topology)?;
    let engine = TopologyEngine::new(state, config.topology.clone())?;
    let metric = if args.delay_metric {
        LinkMetric::Delay
    } else {
        LinkMetric::HopCount
    };
    let mut simulation = Simulation::new(engine, GraphTransport::new(metric), config.simulation.clone())?;

    let mut sink = OutputSink::create(&args.out_dir, args.snapshots)?;
    let summary = simulation.run_with(|state, transport, report| {
        debug!(
            "<{}s> {} active links, {} forwarding entries",
            report.at_s,
            report.active_links,
            transport.table_len()
        );
        sink.record_snapshot(state)?;
        Ok(())
    })?;

    let written = sink.finish(&summary)?;

    info!("{}", "=".repeat(60));
    info!("SUMMARY");
    info!("{}", "=".repeat(60));
    info!("Satellites:        {}", summary.satellites);
    info!("Ground stations:   {}", summary.ground_stations);
    info!("Ring links:        {}", summary.ring_links);
    info!("Updates:           {}", summary.ticks.len());
    info!("Route disruptions: {}", summary.disruption_count());
    let stats = simulation.transport().stats();
    info!(
        "Final graph:       {} inter-satellite, {} ground links",
        stats.isl_links, stats.gs_links
    );
    for path in written {
        info!("  -> {}", path.display());
    }

    Ok(())
}
