//! Routing and wavelength-assignment trait definitions.
//!
//! Algorithms never own the topology. They observe it through the
//! [`NetworkView`] trait, which the simulation core implements on its
//! network graph, and return candidate paths or wavelength choices.

use crate::context::RoutingContext;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Index of a router in the topology.
pub type RouterId = usize;
/// Index of a directed edge in the topology.
pub type EdgeId = usize;
/// Global identifier of a connection request.
pub type SessionId = u64;

/// Occupancy of one wavelength on one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaveStatus {
    Free,
    Used(SessionId),
}

impl WaveStatus {
    pub fn is_free(&self) -> bool {
        matches!(self, WaveStatus::Free)
    }

    pub fn is_used(&self) -> bool {
        !self.is_free()
    }

    /// Session holding the wavelength, if any.
    pub fn session(&self) -> Option<SessionId> {
        match self {
            WaveStatus::Free => None,
            WaveStatus::Used(session) => Some(*session),
        }
    }
}

/// Expected (non-fatal) reasons a connection attempt can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Failure {
    /// Another attempt reserved the wavelength first.
    Collision,
    /// A wavelength was free but no candidate met the Q-factor threshold.
    Quality,
    /// No wavelength was free along the path.
    NoPath,
}

/// Read-only description of a directed edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeInfo {
    pub id: EdgeId,
    pub src: RouterId,
    pub dst: RouterId,
    pub spans: u32,
}

/// Per-router failure counters consumed by adaptive QoS routing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCounts {
    pub quality: u64,
    pub wavelength: u64,
}

/// Read-only view of the network state handed to algorithms.
pub trait NetworkView {
    fn router_count(&self) -> usize;

    fn edge_count(&self) -> usize;

    fn wavelength_count(&self) -> usize;

    fn edge(&self, id: EdgeId) -> EdgeInfo;

    /// Outgoing edges of a router, in insertion order.
    fn out_edges(&self, router: RouterId) -> &[EdgeId];

    fn wave_status(&self, edge: EdgeId, wave: usize) -> WaveStatus;

    /// Smoothed link usage maintained for LORA/PABR.
    fn algorithm_usage(&self, _edge: EdgeId) -> f64 {
        0.0
    }

    /// Accumulated quality-measurement cost of an edge.
    fn qm_degradation(&self, _edge: EdgeId) -> f64 {
        0.0
    }

    fn failure_counts(&self, _router: RouterId) -> FailureCounts {
        FailureCounts::default()
    }

    /// Edge from `from` to `to`, if one exists.
    fn edge_between(&self, from: RouterId, to: RouterId) -> Option<EdgeId> {
        self.out_edges(from)
            .iter()
            .copied()
            .find(|&e| self.edge(e).dst == to)
    }

    /// Number of edges in the whole network with `wave` in use.
    fn edges_using_wave(&self, wave: usize) -> usize {
        (0..self.edge_count())
            .filter(|&e| self.wave_status(e, wave).is_used())
            .count()
    }
}

/// Convert a router sequence into the edges connecting consecutive hops.
pub fn path_edges(net: &dyn NetworkView, routers: &[RouterId]) -> Option<Vec<EdgeId>> {
    routers
        .windows(2)
        .map(|hop| net.edge_between(hop[0], hop[1]))
        .collect()
}

/// Total span count of an edge path.
pub fn path_spans(net: &dyn NetworkView, edges: &[EdgeId]) -> u32 {
    edges.iter().map(|&e| net.edge(e).spans).sum()
}

/// Mask of wavelengths free on every edge of the path.
pub fn free_waves(net: &dyn NetworkView, edges: &[EdgeId]) -> Vec<bool> {
    (0..net.wavelength_count())
        .map(|w| edges.iter().all(|&e| net.wave_status(e, w).is_free()))
        .collect()
}

/// One candidate returned by a routing algorithm.
///
/// For forward-reservation algorithms the slot also carries the
/// wavelength: impairment-aware routing by slot index, dynamic
/// programming by the `cost` field.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidatePath {
    pub cost: f64,
    pub routers: Vec<RouterId>,
}

impl CandidatePath {
    pub fn new(cost: f64, routers: Vec<RouterId>) -> Self {
        Self { cost, routers }
    }

    /// An empty slot.
    pub fn unreachable() -> Self {
        Self {
            cost: f64::INFINITY,
            routers: Vec::new(),
        }
    }

    pub fn is_viable(&self) -> bool {
        self.cost.is_finite() && self.routers.len() >= 2
    }

    pub fn hop_count(&self) -> usize {
        self.routers.len().saturating_sub(1)
    }
}

/// Pad a result list with unreachable slots up to `k`.
pub fn pad_to(mut paths: Vec<CandidatePath>, k: usize) -> Vec<CandidatePath> {
    while paths.len() < k {
        paths.push(CandidatePath::unreachable());
    }
    paths
}

/// Path computation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteRequest {
    pub src: RouterId,
    pub dest: RouterId,
    pub k: usize,
}

/// Identifier of a routing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoutingKind {
    ShortestPath,
    Pabr,
    Lora,
    ImpairmentAware,
    QualityMeasurement,
    AdaptiveQos,
    DynamicProgramming,
    AntColony,
    MaxMinAntColony,
}

impl RoutingKind {
    pub const ALL: [RoutingKind; 9] = [
        RoutingKind::ShortestPath,
        RoutingKind::Pabr,
        RoutingKind::Lora,
        RoutingKind::ImpairmentAware,
        RoutingKind::QualityMeasurement,
        RoutingKind::AdaptiveQos,
        RoutingKind::DynamicProgramming,
        RoutingKind::AntColony,
        RoutingKind::MaxMinAntColony,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RoutingKind::ShortestPath => "SP",
            RoutingKind::Pabr => "PABR",
            RoutingKind::Lora => "LORA",
            RoutingKind::ImpairmentAware => "IA",
            RoutingKind::QualityMeasurement => "QM",
            RoutingKind::AdaptiveQos => "AQoS",
            RoutingKind::DynamicProgramming => "DP",
            RoutingKind::AntColony => "ACO",
            RoutingKind::MaxMinAntColony => "MM-ACO",
        }
    }

    /// Parse a short name (`SP`) or a snake_case name (`shortest_path`).
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "SP" | "shortest_path" => RoutingKind::ShortestPath,
            "PABR" | "PAR" | "pabr" => RoutingKind::Pabr,
            "LORA" | "lora" => RoutingKind::Lora,
            "IA" | "impairment_aware" => RoutingKind::ImpairmentAware,
            "QM" | "quality_measurement" => RoutingKind::QualityMeasurement,
            "AQoS" | "adaptive_qos" => RoutingKind::AdaptiveQos,
            "DP" | "dynamic_programming" => RoutingKind::DynamicProgramming,
            "ACO" | "ant_colony" => RoutingKind::AntColony,
            "MM-ACO" | "max_min_ant_colony" => RoutingKind::MaxMinAntColony,
            _ => return None,
        };
        Some(kind)
    }

    /// IA and DP pick the wavelength before signaling and use zero
    /// propagation delay.
    pub fn forward_reservation(&self) -> bool {
        matches!(
            self,
            RoutingKind::ImpairmentAware | RoutingKind::DynamicProgramming
        )
    }

    /// Strategies whose edge cost depends on periodic usage updates.
    pub fn uses_link_usage(&self) -> bool {
        matches!(self, RoutingKind::Pabr | RoutingKind::Lora)
    }

    /// Strategies whose edge cost depends on quality-measurement degradation.
    pub fn uses_degradation(&self) -> bool {
        matches!(
            self,
            RoutingKind::QualityMeasurement | RoutingKind::AdaptiveQos
        )
    }
}

/// The core routing algorithm trait.
///
/// The engine calls [`compute_paths`](RoutingAlgorithm::compute_paths) once
/// per connection request. Results hold exactly `k` slots (or one per
/// wavelength for impairment-aware routing); unfilled slots are
/// [`CandidatePath::unreachable`].
pub trait RoutingAlgorithm: Send {
    fn compute_paths(
        &mut self,
        request: &RouteRequest,
        net: &dyn NetworkView,
        ctx: &RoutingContext,
        rng: &mut dyn RngCore,
    ) -> Vec<CandidatePath>;

    fn kind(&self) -> RoutingKind;

    /// Human-readable name for reports.
    fn name(&self) -> &str {
        self.kind().name()
    }

    /// Drop any per-run state (caches, pheromone) at workstation activation.
    fn reset(&mut self) {}
}

/// Identifier of a wavelength-assignment strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WavelengthKind {
    FirstFit,
    FirstFitOrdered,
    BestFit,
    RandomPick,
    QualFirstFit,
    QualFirstFitOrdered,
    QualRandomPick,
    LeastQuality,
    MostQuality,
    MostUsed,
    QualMostUsed,
}

impl WavelengthKind {
    pub const ALL: [WavelengthKind; 11] = [
        WavelengthKind::FirstFit,
        WavelengthKind::FirstFitOrdered,
        WavelengthKind::BestFit,
        WavelengthKind::RandomPick,
        WavelengthKind::QualFirstFit,
        WavelengthKind::QualFirstFitOrdered,
        WavelengthKind::QualRandomPick,
        WavelengthKind::LeastQuality,
        WavelengthKind::MostQuality,
        WavelengthKind::MostUsed,
        WavelengthKind::QualMostUsed,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            WavelengthKind::FirstFit => "FF",
            WavelengthKind::FirstFitOrdered => "FFwO",
            WavelengthKind::BestFit => "BF",
            WavelengthKind::RandomPick => "RP",
            WavelengthKind::QualFirstFit => "Q-FF",
            WavelengthKind::QualFirstFitOrdered => "Q-FFwO",
            WavelengthKind::QualRandomPick => "Q-RP",
            WavelengthKind::LeastQuality => "LQ",
            WavelengthKind::MostQuality => "MQ",
            WavelengthKind::MostUsed => "MU",
            WavelengthKind::QualMostUsed => "Q-MU",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "FF" | "first_fit" => WavelengthKind::FirstFit,
            "FFwO" | "first_fit_ordered" => WavelengthKind::FirstFitOrdered,
            "BF" | "best_fit" => WavelengthKind::BestFit,
            "RP" | "random_pick" => WavelengthKind::RandomPick,
            "Q-FF" | "qual_first_fit" => WavelengthKind::QualFirstFit,
            "Q-FFwO" | "qual_first_fit_ordered" => WavelengthKind::QualFirstFitOrdered,
            "Q-RP" | "qual_random_pick" => WavelengthKind::QualRandomPick,
            "LQ" | "least_quality" => WavelengthKind::LeastQuality,
            "MQ" | "most_quality" => WavelengthKind::MostQuality,
            "MU" | "most_used" => WavelengthKind::MostUsed,
            "Q-MU" | "qual_most_used" => WavelengthKind::QualMostUsed,
            _ => return None,
        };
        Some(kind)
    }

    /// Strategies that may be combined with forward-reservation routing
    /// under SINGLE or SERIAL probing.
    pub fn supports_forward_reservation(&self) -> bool {
        matches!(
            self,
            WavelengthKind::FirstFit | WavelengthKind::QualFirstFit | WavelengthKind::BestFit
        )
    }
}

/// Path and context for one wavelength decision.
#[derive(Debug, Clone, Copy)]
pub struct WaveSelection<'a> {
    pub src: RouterId,
    pub dest: RouterId,
    pub path: &'a [EdgeId],
    pub quality_aware: bool,
}

/// The wavelength assignment trait, run when a probe reaches its
/// destination.
pub trait WavelengthAlgorithm: Send + Sync {
    /// Pick a wavelength among those free on the whole path.
    fn choose(
        &self,
        selection: &WaveSelection<'_>,
        net: &dyn NetworkView,
        ctx: &RoutingContext,
    ) -> Result<usize, Failure>;

    fn kind(&self) -> WavelengthKind;

    fn name(&self) -> &str {
        self.kind().name()
    }
}
