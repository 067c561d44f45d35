//! Ant colony optimisation routing (ACO and MAX-MIN ACO).
//!
//! Ants walk from the source choosing each next edge with probability
//! proportional to `pheromone^a * eta^b`, where `eta` is the inverse span
//! distance from the edge's far end to the destination. An ant that steps
//! back onto its own trail restarts from the source. Every ant that reaches
//! the destination is scored like a DP label and may enter the top-k pool.
//!
//! - **ACO** deposits `1 / spans` on every successful ant's trail.
//! - **MM-ACO** deposits only on the best path so far, clamps pheromone to
//!   `[gamma, 1]`, restarts its iteration count whenever the pool improves,
//!   and reruns the whole colony `mm_aco_resets` extra times, merging pools.
//!
//! Pheromone lives on the algorithm, indexed by edge, and is reset at the
//! start of every colony.

use crate::context::RoutingContext;
use crate::traits::*;
use rand::{Rng, RngCore};

/// Upper bound on steps per ant, counted across restarts.
const MAX_WALK_STEPS_PER_ROUTER: usize = 64;

#[derive(Debug, Clone, Default)]
struct Scored {
    weight: f64,
    edges: Vec<EdgeId>,
    routers: Vec<RouterId>,
}

impl Scored {
    fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

pub struct AntColony {
    max_min: bool,
    pheromone: Vec<f64>,
}

impl AntColony {
    pub fn new() -> Self {
        Self {
            max_min: false,
            pheromone: Vec::new(),
        }
    }

    pub fn max_min() -> Self {
        Self {
            max_min: true,
            pheromone: Vec::new(),
        }
    }

    /// Current pheromone level of an edge.
    pub fn pheromone(&self, edge: EdgeId) -> f64 {
        self.pheromone.get(edge).copied().unwrap_or(0.0)
    }

    /// Cumulative transition distribution over `router`'s out-edges.
    fn transitions(
        &self,
        router: RouterId,
        dest: RouterId,
        net: &dyn NetworkView,
        ctx: &RoutingContext,
    ) -> Vec<f64> {
        let p = ctx.params();
        let weights: Vec<f64> = net
            .out_edges(router)
            .iter()
            .map(|&e| {
                let next = net.edge(e).dst;
                let eta = if next == dest {
                    1.0
                } else {
                    match ctx.spans_between(next, dest) {
                        0 => 1.0,
                        d => 1.0 / d as f64,
                    }
                };
                self.pheromone[e].powf(p.aco_alpha) * eta.powf(p.aco_beta)
            })
            .collect();
        let total: f64 = weights.iter().sum();
        let mut cumulative = Vec::with_capacity(weights.len());
        let mut acc = 0.0;
        for w in &weights {
            acc += if total > 0.0 { w / total } else { 1.0 / weights.len() as f64 };
            cumulative.push(acc);
        }
        if let Some(last) = cumulative.last_mut() {
            *last = 1.0;
        }
        cumulative
    }

    /// One ant's walk. Returns the edges taken when it reaches `dest`.
    fn walk(
        &self,
        src: RouterId,
        dest: RouterId,
        table: &[Vec<f64>],
        net: &dyn NetworkView,
        rng: &mut dyn RngCore,
    ) -> Option<Vec<EdgeId>> {
        let limit = net.router_count().saturating_sub(1);
        let mut edges: Vec<EdgeId> = Vec::new();
        let mut at = src;
        let mut steps = 0;
        while at != dest && edges.len() < limit {
            steps += 1;
            if steps > MAX_WALK_STEPS_PER_ROUTER * net.router_count() {
                return None;
            }
            let out = net.out_edges(at);
            if out.is_empty() {
                return None;
            }
            let draw: f64 = rng.gen();
            let pick = table[at].iter().position(|&c| draw <= c).unwrap_or(out.len() - 1);
            let edge = out[pick];
            let next = net.edge(edge).dst;
            let loops = next == src || edges.iter().any(|&e| net.edge(e).src == next);
            if loops {
                edges.clear();
                at = src;
                continue;
            }
            edges.push(edge);
            at = next;
        }
        (at == dest).then_some(edges)
    }

    fn colony(
        &mut self,
        request: &RouteRequest,
        net: &dyn NetworkView,
        ctx: &RoutingContext,
        rng: &mut dyn RngCore,
    ) -> Vec<Scored> {
        let p = ctx.params().clone();
        let (src, dest, k) = (request.src, request.dest, request.k.max(1));
        let (l_exp, q_exp) = ctx.expected_quality(src, dest);

        let initial = if self.max_min {
            1.0
        } else {
            p.aco_ants as f64 / ctx.spans_between(src, dest).max(1) as f64
        };
        self.pheromone = vec![initial; net.edge_count()];

        let mut pool = vec![Scored::default(); k];
        let mut iteration = 0;
        while iteration < p.aco_iterations {
            let table: Vec<Vec<f64>> = (0..net.router_count())
                .map(|r| self.transitions(r, dest, net, ctx))
                .collect();

            let mut trails: Vec<(Vec<EdgeId>, u32)> = Vec::new();
            for _ in 0..p.aco_ants {
                let Some(edges) = self.walk(src, dest, &table, net, rng) else {
                    continue;
                };
                let spans = path_spans(net, &edges);
                let free = free_waves(net, &edges);
                let best_q = (0..free.len())
                    .filter(|&w| free[w])
                    .map(|w| ctx.estimator.q_factor(w, &edges, net))
                    .fold(0.0, f64::max);
                let weight =
                    (1.0 - p.dp_alpha) * (best_q / q_exp) + p.dp_alpha * l_exp / spans as f64;

                let mut routers: Vec<RouterId> = edges.iter().map(|&e| net.edge(e).src).collect();
                routers.push(dest);
                let entry = Scored {
                    weight,
                    edges: edges.clone(),
                    routers,
                };
                if best_q >= ctx.th_q && insert_scored(&mut pool, entry) && self.max_min {
                    iteration = 0;
                }
                trails.push((edges, spans));
            }

            for ph in self.pheromone.iter_mut() {
                *ph *= 1.0 - p.aco_rho;
                if self.max_min {
                    *ph = ph.max(p.mm_aco_gamma);
                }
            }
            if self.max_min {
                if !pool[0].is_empty() {
                    let deposit = 1.0 / path_spans(net, &pool[0].edges) as f64;
                    for &e in &pool[0].edges {
                        self.pheromone[e] = (self.pheromone[e] + deposit).min(1.0);
                    }
                }
            } else {
                for (edges, spans) in &trails {
                    let deposit = 1.0 / *spans as f64;
                    for &e in edges {
                        self.pheromone[e] += deposit;
                    }
                }
            }
            iteration += 1;
        }
        pool
    }
}

impl Default for AntColony {
    fn default() -> Self {
        Self::new()
    }
}

/// Insert into a descending-by-weight pool of distinct paths, dropping the
/// last entry. Returns false if the entry does not beat the last entry or
/// its path is already pooled.
fn insert_scored(pool: &mut [Scored], entry: Scored) -> bool {
    let Some(last) = pool.last() else {
        return false;
    };
    if entry.is_empty()
        || entry.weight <= last.weight
        || pool.iter().any(|s| s.routers == entry.routers)
    {
        return false;
    }
    let mut pos = pool.len() - 1;
    while pos > 0 && entry.weight > pool[pos - 1].weight {
        pool[pos] = pool[pos - 1].clone();
        pos -= 1;
    }
    pool[pos] = entry;
    true
}

impl RoutingAlgorithm for AntColony {
    fn compute_paths(
        &mut self,
        request: &RouteRequest,
        net: &dyn NetworkView,
        ctx: &RoutingContext,
        rng: &mut dyn RngCore,
    ) -> Vec<CandidatePath> {
        let mut pool = self.colony(request, net, ctx, rng);
        if self.max_min {
            for _ in 0..ctx.params().mm_aco_resets {
                for entry in self.colony(request, net, ctx, rng) {
                    insert_scored(&mut pool, entry);
                }
            }
        }

        let paths = pool
            .into_iter()
            .map(|s| {
                if s.is_empty() {
                    CandidatePath::unreachable()
                } else {
                    CandidatePath::new(s.weight, s.routers)
                }
            })
            .collect();
        pad_to(paths, request.k)
    }

    fn kind(&self) -> RoutingKind {
        if self.max_min {
            RoutingKind::MaxMinAntColony
        } else {
            RoutingKind::AntColony
        }
    }

    fn reset(&mut self) {
        self.pheromone.clear();
    }
}
