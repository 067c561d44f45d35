//! Optical network topology.
//!
//! Routers are joined by directed edges measured in amplifier spans. Every
//! edge carries a status per wavelength plus the state the adaptive
//! algorithms feed on:
//!
//! - smoothed link usage (LORA, PABR);
//! - per-wave quality-measurement degradation (QM, AQoS);
//! - the connections currently established across it, and their folded
//!   Q-factor statistics.
//!
//! A [`Network`] is owned by exactly one engine; runs never share one.

use crate::connection::{ConnectionId, ConnectionSummary, EstablishedConnection};
use crate::error::FatalError;
use rand::Rng;
use rwasim_algorithms::quality::{DestinationDistribution, QualityEstimator};
use rwasim_algorithms::{EdgeId, EdgeInfo, FailureCounts, NetworkView, RouterId, SessionId, WaveStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// QM cost of an edge with no degraded wavelength.
pub const UNDEGRADED_COST: f64 = 2.0;

/// Per-edge Q-factor statistics accumulated over torn-down connections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeStats {
    pub connections: u64,
    pub initial_q_total: f64,
    pub initial_q_min: Option<f64>,
    pub initial_q_max: Option<f64>,
    pub average_q_total: f64,
    pub average_q_min: Option<f64>,
    pub average_q_max: Option<f64>,
    pub time_below_total: f64,
    pub dropped: u64,
}

impl EdgeStats {
    pub fn fold(&mut self, summary: &ConnectionSummary) {
        let lower = |slot: &mut Option<f64>, v: f64| *slot = Some(slot.map_or(v, |m| m.min(v)));
        let upper = |slot: &mut Option<f64>, v: f64| *slot = Some(slot.map_or(v, |m| m.max(v)));

        self.connections += 1;
        self.initial_q_total += summary.initial_q;
        lower(&mut self.initial_q_min, summary.initial_q);
        upper(&mut self.initial_q_max, summary.initial_q);
        self.average_q_total += summary.average_q;
        lower(&mut self.average_q_min, summary.average_q);
        upper(&mut self.average_q_max, summary.average_q);
        self.time_below_total += summary.time_below;
        if summary.dropped {
            self.dropped += 1;
        }
    }

    pub fn mean_initial_q(&self) -> Option<f64> {
        (self.connections > 0).then(|| self.initial_q_total / self.connections as f64)
    }

    pub fn mean_average_q(&self) -> Option<f64> {
        (self.connections > 0).then(|| self.average_q_total / self.connections as f64)
    }
}

/// A directed fibre link.
#[derive(Debug, Clone)]
pub struct Edge {
    pub id: EdgeId,
    pub src: RouterId,
    pub dst: RouterId,
    pub spans: u32,
    waves: Vec<WaveStatus>,
    degradation: Vec<f64>,
    /// Smoothed occupancy used by LORA and PABR.
    pub usage: f64,
    connections: Vec<ConnectionId>,
    pub stats: EdgeStats,
}

impl Edge {
    fn new(id: EdgeId, src: RouterId, dst: RouterId, spans: u32, waves: usize) -> Self {
        Self {
            id,
            src,
            dst,
            spans,
            waves: vec![WaveStatus::Free; waves],
            degradation: vec![0.0; waves],
            usage: 0.0,
            connections: Vec::new(),
            stats: EdgeStats::default(),
        }
    }

    pub fn status(&self, wave: usize) -> WaveStatus {
        self.waves[wave]
    }

    pub fn used_waves(&self) -> usize {
        self.waves.iter().filter(|w| w.is_used()).count()
    }

    pub fn degradation(&self, wave: usize) -> f64 {
        self.degradation[wave]
    }

    /// Connections currently established across this edge.
    pub fn connections(&self) -> &[ConnectionId] {
        &self.connections
    }

    /// QM routing cost: infinite when every wave is degraded, a fixed
    /// baseline when none is, else the mean over degraded waves.
    pub fn qm_cost(&self) -> f64 {
        let degraded: Vec<f64> = self
            .degradation
            .iter()
            .copied()
            .filter(|&d| d != 0.0)
            .collect();
        if degraded.len() == self.degradation.len() {
            f64::INFINITY
        } else if degraded.is_empty() {
            UNDEGRADED_COST
        } else {
            degraded.iter().sum::<f64>() / degraded.len() as f64
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Router {
    pub id: RouterId,
    out_edges: Vec<EdgeId>,
    pub failures: FailureCounts,
    /// Cumulative destination probabilities for weighted destination draws.
    destination_cdf: Vec<f64>,
}

/// The network graph plus its established-connection registry.
#[derive(Debug, Clone)]
pub struct Network {
    name: String,
    waves: usize,
    routers: Vec<Router>,
    edges: Vec<Edge>,
    workstations: Vec<RouterId>,
    dest_dist: DestinationDistribution,
    connections: HashMap<ConnectionId, EstablishedConnection>,
    next_connection: ConnectionId,
}

impl Network {
    /// Build a network from bidirectional links `(a, b, spans)`; every link
    /// becomes the two directed edges `a -> b` and `b -> a`, in that order.
    pub fn new(
        name: &str,
        routers: usize,
        links: &[(RouterId, RouterId, u32)],
        waves: usize,
    ) -> Result<Self, FatalError> {
        let directed: Vec<(RouterId, RouterId, u32)> = links
            .iter()
            .flat_map(|&(a, b, spans)| [(a, b, spans), (b, a, spans)])
            .collect();
        Self::from_directed(name, routers, &directed, waves)
    }

    /// Build a network from directed edges `(src, dst, spans)`.
    pub fn from_directed(
        name: &str,
        routers: usize,
        edges: &[(RouterId, RouterId, u32)],
        waves: usize,
    ) -> Result<Self, FatalError> {
        if routers == 0 {
            return Err(FatalError::TopologyRouters("router count must be > 0".into()));
        }
        if waves == 0 {
            return Err(FatalError::InvalidParameters(
                "wavelength count must be > 0".into(),
            ));
        }
        let mut net = Self {
            name: name.to_string(),
            waves,
            routers: (0..routers)
                .map(|id| Router {
                    id,
                    ..Router::default()
                })
                .collect(),
            edges: Vec::with_capacity(edges.len()),
            workstations: Vec::new(),
            dest_dist: DestinationDistribution::Uniform,
            connections: HashMap::new(),
            next_connection: 0,
        };
        for &(src, dst, spans) in edges {
            if src >= routers || dst >= routers {
                return Err(FatalError::TopologyEdges(format!(
                    "edge {} -> {} references a router outside 0..{}",
                    src, dst, routers
                )));
            }
            if src == dst {
                return Err(FatalError::TopologyEdges(format!("self-loop at router {}", src)));
            }
            if spans == 0 {
                return Err(FatalError::TopologyEdges(format!(
                    "edge {} -> {} must span at least 1",
                    src, dst
                )));
            }
            if net.edge_between(src, dst).is_some() {
                return Err(FatalError::TopologyEdges(format!(
                    "duplicate edge {} -> {}",
                    src, dst
                )));
            }
            let id = net.edges.len();
            net.edges.push(Edge::new(id, src, dst, spans, waves));
            net.routers[src].out_edges.push(id);
        }
        Ok(net)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge_ref(&self, id: EdgeId) -> &Edge {
        &self.edges[id]
    }

    pub fn routers(&self) -> &[Router] {
        &self.routers
    }

    // --- Wavelength occupancy ---

    pub fn set_used(&mut self, edge: EdgeId, wave: usize, session: SessionId) -> Result<(), FatalError> {
        let slot = self
            .edges
            .get_mut(edge)
            .and_then(|e| e.waves.get_mut(wave))
            .ok_or(FatalError::InvalidEdge(edge))?;
        if let WaveStatus::Used(holder) = *slot {
            return Err(FatalError::EdgeIsUsed { edge, wave, holder });
        }
        *slot = WaveStatus::Used(session);
        Ok(())
    }

    pub fn set_free(&mut self, edge: EdgeId, wave: usize) -> Result<(), FatalError> {
        let slot = self
            .edges
            .get_mut(edge)
            .and_then(|e| e.waves.get_mut(wave))
            .ok_or(FatalError::InvalidEdge(edge))?;
        if slot.is_free() {
            return Err(FatalError::EdgeIsFree { edge, wave });
        }
        *slot = WaveStatus::Free;
        Ok(())
    }

    /// Fails on the first wavelength still in use anywhere.
    pub fn verify_all_free(&self) -> Result<(), FatalError> {
        for edge in &self.edges {
            for (wave, status) in edge.waves.iter().enumerate() {
                if let WaveStatus::Used(holder) = *status {
                    return Err(FatalError::EdgeIsUsed {
                        edge: edge.id,
                        wave,
                        holder,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn used_wave_count(&self) -> usize {
        self.edges.iter().map(|e| e.used_waves()).sum()
    }

    // --- Adaptive-routing state ---

    /// Smooth every edge's usage toward its current load: established
    /// connections when `count_connections`, else used wavelengths.
    pub fn update_usage(&mut self, count_connections: bool) {
        for edge in &mut self.edges {
            let sample = if count_connections {
                edge.connections.len()
            } else {
                edge.used_waves()
            };
            edge.usage = (edge.usage + sample as f64) / 2.0;
        }
    }

    pub fn reset_usage(&mut self) {
        for edge in &mut self.edges {
            edge.usage = 0.0;
        }
    }

    pub fn reset_degradation(&mut self) {
        for edge in &mut self.edges {
            edge.degradation.iter_mut().for_each(|d| *d = 0.0);
        }
    }

    pub fn reset_failures(&mut self) {
        for router in &mut self.routers {
            router.failures = FailureCounts::default();
        }
    }

    pub fn reset_edge_stats(&mut self) {
        for edge in &mut self.edges {
            edge.stats = EdgeStats::default();
        }
    }

    pub fn record_quality_failure(&mut self, router: RouterId) {
        self.routers[router].failures.quality += 1;
    }

    pub fn record_wavelength_failure(&mut self, router: RouterId) {
        self.routers[router].failures.wavelength += 1;
    }

    /// Clear the degradation `wave` leaves behind on `path`.
    pub fn clear_degradation(&mut self, path: &[EdgeId], wave: usize) {
        for &e in path {
            self.edges[e].degradation[wave] = 0.0;
        }
    }

    /// Recompute QM degradation on every edge of `path`, for each
    /// connection across it within the nonlinear window of `wave`.
    pub fn refresh_degradation(&mut self, path: &[EdgeId], wave: usize, estimator: &QualityEstimator) {
        let halfwin = estimator.params().nonlinear_halfwin;
        let view: &Network = self;
        let mut updates: Vec<(EdgeId, usize, f64)> = Vec::new();
        for &e in path {
            for id in &view.edges[e].connections {
                let Some(conn) = view.connections.get(id) else {
                    continue;
                };
                if conn.wave.abs_diff(wave) > halfwin {
                    continue;
                }
                let Some(hop) = conn.hop_of(e) else {
                    continue;
                };
                let at_dst = estimator.estimate(conn.wave, &conn.path[..=hop], view).noise.total();
                let at_src = if hop == 0 {
                    estimator.ase_per_span(conn.wave)
                } else {
                    estimator.estimate(conn.wave, &conn.path[..hop], view).noise.total()
                };
                updates.push((e, conn.wave, 10.0 * (at_dst.sqrt() / at_src.sqrt()).log10()));
            }
        }
        for (e, w, d) in updates {
            self.edges[e].degradation[w] = d;
        }
    }

    /// Append a fresh Q-factor sample to every connection sharing an edge
    /// of `path` within the nonlinear window of `wave`.
    pub fn sample_q_factors(
        &mut self,
        path: &[EdgeId],
        wave: usize,
        estimator: &QualityEstimator,
        now: f64,
    ) {
        let halfwin = estimator.params().nonlinear_halfwin;
        let view: &Network = self;
        let mut touched: Vec<ConnectionId> = Vec::new();
        for &e in path {
            for &id in &view.edges[e].connections {
                let near = view
                    .connections
                    .get(&id)
                    .is_some_and(|c| c.wave.abs_diff(wave) <= halfwin);
                if near && !touched.contains(&id) {
                    touched.push(id);
                }
            }
        }
        let samples: Vec<(ConnectionId, f64)> = touched
            .into_iter()
            .filter_map(|id| {
                let conn = view.connections.get(&id)?;
                Some((id, estimator.q_factor(conn.wave, &conn.path, view)))
            })
            .collect();
        for (id, q) in samples {
            if let Some(conn) = self.connections.get_mut(&id) {
                conn.record(q, now);
            }
        }
    }

    // --- Established connections ---

    pub fn next_connection_id(&mut self) -> ConnectionId {
        let id = self.next_connection;
        self.next_connection += 1;
        id
    }

    pub fn register_connection(&mut self, connection: EstablishedConnection) -> ConnectionId {
        let id = connection.id;
        for &e in &connection.path {
            self.edges[e].connections.push(id);
        }
        self.connections.insert(id, connection);
        id
    }

    pub fn deregister_connection(&mut self, id: ConnectionId) -> Option<EstablishedConnection> {
        let connection = self.connections.remove(&id)?;
        for &e in &connection.path {
            self.edges[e].connections.retain(|&c| c != id);
        }
        Some(connection)
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&EstablishedConnection> {
        self.connections.get(&id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Fold one connection's summary into every edge of its path.
    pub fn fold_edge_stats(&mut self, path: &[EdgeId], summary: &ConnectionSummary) {
        for &e in path {
            self.edges[e].stats.fold(summary);
        }
    }

    // --- Workstations and traffic ---

    /// Attach `count` workstations: explicit `parents` first, the rest
    /// round-robin `n % routers`.
    pub fn set_workstations(&mut self, count: usize, parents: &[RouterId]) -> Result<(), FatalError> {
        if count == 0 {
            return Err(FatalError::WorkstationQuantity("need at least one workstation".into()));
        }
        if parents.len() > count {
            return Err(FatalError::WorkstationQuantity(format!(
                "{} parents given for {} workstations",
                parents.len(),
                count
            )));
        }
        if let Some(&bad) = parents.iter().find(|&&r| r >= self.routers.len()) {
            return Err(FatalError::WorkstationParent(format!(
                "router {} does not exist",
                bad
            )));
        }
        let n = self.routers.len();
        self.workstations = (0..count)
            .map(|w| parents.get(w).copied().unwrap_or(w % n))
            .collect();
        Ok(())
    }

    pub fn workstations(&self) -> &[RouterId] {
        &self.workstations
    }

    /// Precompute destination tables from shortest span distances.
    pub fn set_destination_distribution(
        &mut self,
        dist: DestinationDistribution,
        span_distance: &[Vec<u32>],
    ) {
        self.dest_dist = dist;
        let n = self.routers.len();
        for src in 0..n {
            let weights: Vec<f64> = (0..n)
                .map(|dest| {
                    let d = span_distance[src][dest];
                    if dest == src || d == 0 || d == u32::MAX {
                        return 0.0;
                    }
                    match dist {
                        DestinationDistribution::Uniform => 1.0,
                        DestinationDistribution::Distance => d as f64,
                        DestinationDistribution::InverseDistance => 1.0 / d as f64,
                    }
                })
                .collect();
            let total: f64 = weights.iter().sum();
            let mut acc = 0.0;
            self.routers[src].destination_cdf = weights
                .iter()
                .map(|w| {
                    acc += if total > 0.0 { w / total } else { 0.0 };
                    acc
                })
                .collect();
        }
    }

    /// Draw a destination other than `src`. `None` when there is none.
    pub fn draw_destination<R: Rng>(&self, src: RouterId, rng: &mut R) -> Option<RouterId> {
        let n = self.routers.len();
        if n < 2 {
            return None;
        }
        let cdf = &self.routers[src].destination_cdf;
        loop {
            let dest = match self.dest_dist {
                DestinationDistribution::Uniform => rng.gen_range(0..n),
                _ => {
                    if cdf.last().map_or(true, |&t| t <= 0.0) {
                        return None;
                    }
                    let u: f64 = rng.gen();
                    cdf.iter().position(|&c| u <= c).unwrap_or(n - 1)
                }
            };
            if dest != src {
                return Some(dest);
            }
        }
    }
}

impl NetworkView for Network {
    fn router_count(&self) -> usize {
        self.routers.len()
    }

    fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn wavelength_count(&self) -> usize {
        self.waves
    }

    fn edge(&self, id: EdgeId) -> EdgeInfo {
        let e = &self.edges[id];
        EdgeInfo {
            id,
            src: e.src,
            dst: e.dst,
            spans: e.spans,
        }
    }

    fn out_edges(&self, router: RouterId) -> &[EdgeId] {
        &self.routers[router].out_edges
    }

    fn wave_status(&self, edge: EdgeId, wave: usize) -> WaveStatus {
        self.edges[edge].waves[wave]
    }

    fn algorithm_usage(&self, edge: EdgeId) -> f64 {
        self.edges[edge].usage
    }

    fn qm_degradation(&self, edge: EdgeId) -> f64 {
        self.edges[edge].qm_cost()
    }

    fn failure_counts(&self, router: RouterId) -> FailureCounts {
        self.routers[router].failures
    }
}
