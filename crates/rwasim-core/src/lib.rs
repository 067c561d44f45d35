//! RWASim: discrete-event simulator for routing and wavelength
//! assignment in optical mesh networks.
//!
//! This crate provides the simulation engine that models the network's
//! edges and wavelengths, workstation traffic, and the probe /
//! confirmation / collision signaling that reserves lightpaths. Routing
//! and wavelength strategies from `rwasim-algorithms` are plugged in to
//! make the decisions for each connection request.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐     ┌───────────┐     ┌──────────────┐
//! │  Config  │────▶│ Scheduler │────▶│   Metrics    │
//! │  (TOML)  │     │ (workers) │     │  Collection  │
//! └──────────┘     └─────┬─────┘     └──────────────┘
//!                        │ one per run
//!                  ┌─────┴─────┐
//!                  │  Engine   │◀──── Routing + Wavelength
//!                  │ (Events)  │      (rwasim-algorithms)
//!                  └─────┬─────┘
//!                        │
//!          ┌─────────────┼─────────────┐
//!          ▼             ▼             ▼
//!    ┌──────────┐  ┌──────────┐  ┌──────────┐
//!    │  Edge 0  │  │  Edge 1  │  │  Edge M  │
//!    │  waves   │  │  waves   │  │  waves   │
//!    │  usage   │  │  usage   │  │  usage   │
//!    └──────────┘  └──────────┘  └──────────┘
//! ```

pub mod clock;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod event;
pub mod metrics;
pub mod request;
pub mod scheduler;
pub mod topology;

// Re-export key types for convenience.
pub use clock::SimClock;
pub use config::{ConfigError, SimConfig};
pub use connection::EstablishedConnection;
pub use engine::{Milestone, RunSettings, SimulationEngine};
pub use error::FatalError;
pub use event::{EventQueue, SimEvent};
pub use metrics::{GlobalStats, RunMetrics};
pub use request::{ConnectionRequest, ProbeStyle};
pub use scheduler::{plan, AlgorithmToRun};
pub use topology::Network;

use rwasim_algorithms::{RoutingKind, WavelengthKind};

/// Run every planned configuration of `config` on `threads` workers.
pub fn run_simulation(config: &SimConfig, threads: usize) -> Result<Vec<RunMetrics>, FatalError> {
    let runs = plan(config).map_err(|e| FatalError::InvalidParameters(e.to_string()))?;
    let (network, ctx) = scheduler::prepare(config)?;
    scheduler::run_all(config, runs, &network, ctx, threads)
}

/// Run the cross product of routing and wavelength strategies with every
/// workstation active, ignoring the configured `[[algorithms]]` list.
pub fn compare_algorithms(
    config: &SimConfig,
    routing: &[RoutingKind],
    wavelength: &[WavelengthKind],
    probe_style: ProbeStyle,
    quality_aware: bool,
) -> Result<Vec<RunMetrics>, FatalError> {
    let workstations = config.topology.workstation_count();
    let mut runs = Vec::new();
    for &r in routing {
        for &w in wavelength {
            // Combinations that cannot run are skipped, not fatal.
            if let Err(e) = config::check_forward_reservation(r, w, probe_style) {
                log::warn!("skipping: {}", e);
                continue;
            }
            runs.push(AlgorithmToRun {
                index: runs.len(),
                routing: r,
                wavelength: w,
                probe_style,
                quality_aware,
                workstations,
            });
        }
    }
    let (network, ctx) = scheduler::prepare(config)?;
    scheduler::run_all(config, runs, &network, ctx, config.simulation.threads)
}
