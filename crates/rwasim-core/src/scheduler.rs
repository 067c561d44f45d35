//! Batch execution of many runs across worker threads.
//!
//! Every run owns its own [`Network`] clone and [`SimulationEngine`];
//! workers only share the read-only [`RoutingContext`] and the pool of
//! pending work.

use crate::config::{ConfigError, SimConfig};
use crate::engine::{RunSettings, SimulationEngine};
use crate::error::FatalError;
use crate::metrics::RunMetrics;
use crate::request::ProbeStyle;
use crate::topology::Network;
use rwasim_algorithms::{RoutingContext, RoutingKind, WavelengthKind};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// One planned run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlgorithmToRun {
    /// Position in the plan; results are reported in this order.
    pub index: usize,
    pub routing: RoutingKind,
    pub wavelength: WavelengthKind,
    pub probe_style: ProbeStyle,
    pub quality_aware: bool,
    pub workstations: usize,
}

impl AlgorithmToRun {
    pub fn settings(&self, config: &SimConfig) -> RunSettings {
        RunSettings {
            routing: self.routing,
            wavelength: self.wavelength,
            probe_style: self.probe_style,
            quality_aware: self.quality_aware,
            workstations: self.workstations,
            max_probes: config.simulation.max_probes,
            seed: config.simulation.seed,
        }
    }
}

/// Expand every `[[algorithms]]` entry into its workstation iterations.
///
/// Iteration `i` of `n` activates `(i + 1) * floor(total / n)`
/// workstations, so the last one uses (nearly) all of them.
pub fn plan(config: &SimConfig) -> Result<Vec<AlgorithmToRun>, ConfigError> {
    let total = config.topology.workstation_count();
    let mut runs = Vec::new();
    for entry in &config.algorithms {
        let routing = entry.routing_kind()?;
        let wavelength = entry.wavelength_kind()?;
        let iterations = entry.iterations.unwrap_or(config.simulation.iterations);
        if iterations == 0 {
            return Err(ConfigError::Validation(format!(
                "{}/{}: iterations must be > 0",
                entry.routing, entry.wavelength
            )));
        }
        let step = total / iterations;
        if step == 0 {
            return Err(ConfigError::Validation(format!(
                "{}/{}: {} iterations over {} workstations",
                entry.routing, entry.wavelength, iterations, total
            )));
        }
        for i in 0..iterations {
            runs.push(AlgorithmToRun {
                index: runs.len(),
                routing,
                wavelength,
                probe_style: entry.probe_style,
                quality_aware: entry.quality_aware,
                workstations: (i + 1) * step,
            });
        }
    }
    Ok(runs)
}

/// Build the network template and the shared routing context.
pub fn prepare(config: &SimConfig) -> Result<(Network, Arc<RoutingContext>), FatalError> {
    let network = config.build_network()?;
    let xpm = config
        .load_xpm()
        .map_err(|e| FatalError::QualityInput(e.to_string()))?;
    let params = config.quality_params();
    params.validate().map_err(FatalError::InvalidParameters)?;
    let ctx = RoutingContext::build(
        &network,
        params,
        xpm,
        &config.topology.name,
        config.k_overrides.clone(),
        config.simulation.seed,
    );
    log::debug!(
        "{}: th_q={:.3} max_min_spans={} max_spans={} min_duration={:.6}",
        ctx.topology_name,
        ctx.th_q,
        ctx.max_min_spans,
        ctx.max_spans,
        ctx.min_duration
    );
    Ok((network, Arc::new(ctx)))
}

/// Run one planned configuration to completion.
pub fn run_one(
    config: &SimConfig,
    run: &AlgorithmToRun,
    network: Network,
    ctx: Arc<RoutingContext>,
) -> Result<RunMetrics, FatalError> {
    let mut engine = SimulationEngine::new(network, ctx, run.settings(config))?;
    engine.run()
}

/// Execute every run on `min(threads, runs)` workers.
///
/// Workers pop from a shared queue until it is empty. The first fatal
/// error stops further pops and is returned once in-flight runs end.
pub fn run_all(
    config: &SimConfig,
    runs: Vec<AlgorithmToRun>,
    network: &Network,
    ctx: Arc<RoutingContext>,
    threads: usize,
) -> Result<Vec<RunMetrics>, FatalError> {
    if runs.is_empty() {
        return Ok(Vec::new());
    }
    let workers = threads.max(1).min(runs.len());
    let total = runs.len();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("rwasim-worker-{}", i))
        .build()
        .map_err(|e| FatalError::WorkerInit(e.to_string()))?;

    let pending = Mutex::new(runs.into_iter().collect::<VecDeque<_>>());
    let results: Mutex<Vec<(usize, RunMetrics)>> = Mutex::new(Vec::with_capacity(total));
    let failure: Mutex<Option<FatalError>> = Mutex::new(None);

    log::info!("Starting {} runs on {} workers", total, workers);
    pool.scope(|s| {
        for _ in 0..workers {
            s.spawn(|_| loop {
                let next = {
                    let stopped = failure.lock().map_or(true, |f| f.is_some());
                    if stopped {
                        None
                    } else {
                        pending.lock().ok().and_then(|mut q| q.pop_front())
                    }
                };
                let Some(run) = next else {
                    break;
                };
                match run_one(config, &run, network.clone(), Arc::clone(&ctx)) {
                    Ok(metrics) => {
                        if let Ok(mut r) = results.lock() {
                            r.push((run.index, metrics));
                        }
                    }
                    Err(e) => {
                        if let Ok(mut f) = failure.lock() {
                            f.get_or_insert(e);
                        }
                        break;
                    }
                }
            });
        }
    });

    let failure = failure
        .into_inner()
        .map_err(|e| FatalError::WorkerInit(e.to_string()))?;
    if let Some(e) = failure {
        return Err(e);
    }
    let mut results = results
        .into_inner()
        .map_err(|e| FatalError::WorkerInit(e.to_string()))?;
    if results.len() != total {
        return Err(FatalError::WorkerInit(format!(
            "{} of {} runs reported",
            results.len(),
            total
        )));
    }
    results.sort_by_key(|(index, _)| *index);
    Ok(results.into_iter().map(|(_, m)| m).collect())
}
