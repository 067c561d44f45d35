//! Shared, read-only routing context.
//!
//! Built once per simulation batch before any worker starts, then shared
//! across workers. Holds the quality estimator and every quantity derived
//! from the static topology: span distances, span limits, the Q-factor
//! threshold and the first-fit visiting order.

use crate::ksp::{dijkstra, WeightedGraph, DISCONNECT};
use crate::quality::{QualityEstimator, QualityParams, XpmTable};
use crate::traits::{NetworkView, RouterId};
use std::collections::HashMap;

/// Span distance reported between routers that cannot reach each other.
pub const UNREACHABLE_SPANS: u32 = u32::MAX;

/// Upper bound when searching for the longest acceptable path.
const MAX_SPAN_SEARCH: u32 = 1_000_000;

/// Default minimum k for named topologies (PABR and DP only).
pub fn default_k_overrides() -> HashMap<String, usize> {
    HashMap::from([
        ("NSF".to_string(), 4),
        ("Mesh".to_string(), 7),
        ("Mesh8x8".to_string(), 7),
    ])
}

#[derive(Debug, Clone)]
pub struct RoutingContext {
    pub estimator: QualityEstimator,
    /// Shortest span distance between every router pair.
    pub span_distance: Vec<Vec<u32>>,
    /// Largest shortest span distance in the network.
    pub max_min_spans: u32,
    /// Longest path (in spans) whose ASE-only Q stays above threshold.
    pub max_spans: u32,
    /// Q-factor threshold.
    pub th_q: f64,
    /// Lower bound on connection holding time (s).
    pub min_duration: f64,
    /// Max-spread visiting order for first-fit-with-ordering.
    pub wave_ordering: Vec<usize>,
    pub topology_name: String,
    pub k_overrides: HashMap<String, usize>,
    pub seed: u64,
}

impl RoutingContext {
    pub fn build(
        net: &dyn NetworkView,
        params: QualityParams,
        xpm: XpmTable,
        topology_name: &str,
        k_overrides: HashMap<String, usize>,
        seed: u64,
    ) -> Self {
        let span_distance = span_distances(net);
        let max_min_spans = span_distance
            .iter()
            .flatten()
            .copied()
            .filter(|&d| d != UNREACHABLE_SPANS)
            .max()
            .unwrap_or(0);

        let estimator = QualityEstimator::new(params, xpm);
        let p = estimator.params().clone();
        let centre_ase = estimator.ase_per_span(p.halfwavelength);

        let th_q = p.q_factor_factor * p.q_from_noise(centre_ase * max_min_spans as f64);
        let mut max_spans = max_min_spans;
        let mut q = p.q_from_noise(centre_ase * (max_spans as f64 + 1.0));
        while q >= th_q && max_spans < MAX_SPAN_SEARCH {
            max_spans += 1;
            q = p.q_from_noise(centre_ase * (max_spans as f64 + 1.0));
        }

        let min_duration = 3.0 * p.propagation_delay(max_min_spans);

        log::debug!(
            "routing context: max_min_spans={} max_spans={} TH_Q={:.3} min_duration={:.6}",
            max_min_spans,
            max_spans,
            th_q,
            min_duration
        );

        Self {
            wave_ordering: wave_ordering(p.wavelength_count()),
            estimator,
            span_distance,
            max_min_spans,
            max_spans,
            th_q,
            min_duration,
            topology_name: topology_name.to_string(),
            k_overrides,
            seed,
        }
    }

    pub fn params(&self) -> &QualityParams {
        self.estimator.params()
    }

    pub fn wavelength_count(&self) -> usize {
        self.params().wavelength_count()
    }

    pub fn spans_between(&self, from: RouterId, to: RouterId) -> u32 {
        self.span_distance[from][to]
    }

    /// Raise `k` to the configured minimum for this topology, when one
    /// exists and `1 < k < minimum`.
    pub fn effective_k(&self, k: usize) -> usize {
        match self.k_overrides.get(&self.topology_name) {
            Some(&minimum) if k > 1 && k < minimum => minimum,
            _ => k,
        }
    }

    pub fn propagation_delay(&self, spans: u32) -> f64 {
        self.params().propagation_delay(spans)
    }

    /// Expected path length and Q-factor used to normalise DP and ACO
    /// path scores between `src` and `dest`.
    pub fn expected_quality(&self, src: RouterId, dest: RouterId) -> (f64, f64) {
        let l_exp = (self.max_spans as f64 + self.spans_between(src, dest) as f64) / 2.0;
        let centre_ase = self.estimator.ase_per_span(self.params().halfwavelength);
        let q_exp = self.params().q_from_noise(l_exp * centre_ase);
        (l_exp, q_exp)
    }
}

/// All-pairs shortest span distances.
pub fn span_distances(net: &dyn NetworkView) -> Vec<Vec<u32>> {
    let graph = WeightedGraph::from_network(net, |e| Some(net.edge(e).spans as f64));
    (0..net.router_count())
        .map(|src| {
            let (dist, _) = dijkstra(&graph, src);
            dist.into_iter()
                .map(|d| {
                    if d >= DISCONNECT {
                        UNREACHABLE_SPANS
                    } else {
                        d as u32
                    }
                })
                .collect()
        })
        .collect()
}

/// Order wavelengths so each next pick is as far as possible from those
/// already chosen: start with both band edges, then repeatedly take the
/// wave whose nearest chosen neighbour is farthest away.
pub fn wave_ordering(n: usize) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![0];
    }
    let mut chosen = vec![false; n];
    let mut order = vec![0, n - 1];
    chosen[0] = true;
    chosen[n - 1] = true;

    while order.len() < n {
        let mut best = None;
        let mut best_gap = 0;
        for w in 1..n - 1 {
            if chosen[w] {
                continue;
            }
            let lower = (0..w).rev().find(|&x| chosen[x]).map_or(n, |x| w - x);
            let upper = (w + 1..n).find(|&x| chosen[x]).map_or(n, |x| x - w);
            let gap = lower.min(upper);
            if best.is_none() || gap > best_gap {
                best = Some(w);
                best_gap = gap;
            }
        }
        match best {
            Some(w) => {
                chosen[w] = true;
                order.push(w);
            }
            None => break,
        }
    }
    order
}
