//! Adaptive QoS routing.
//!
//! When a source has failed more often on quality than on wavelength
//! availability, plain QM paths are used. Otherwise twice as many QM
//! paths are computed and the k with the most free wavelengths are kept.

use crate::context::RoutingContext;
use crate::quality_measurement::qm_paths;
use crate::traits::*;
use rand::RngCore;

pub struct AdaptiveQos;

impl AdaptiveQos {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AdaptiveQos {
    fn default() -> Self {
        Self::new()
    }
}

/// Wavelengths not in use on any edge of the path; 0 for empty slots.
fn free_wavelengths(path: &CandidatePath, net: &dyn NetworkView) -> usize {
    if !path.is_viable() {
        return 0;
    }
    match path_edges(net, &path.routers) {
        Some(edges) => free_waves(net, &edges).into_iter().filter(|&f| f).count(),
        None => 0,
    }
}

impl RoutingAlgorithm for AdaptiveQos {
    fn compute_paths(
        &mut self,
        request: &RouteRequest,
        net: &dyn NetworkView,
        _ctx: &RoutingContext,
        _rng: &mut dyn RngCore,
    ) -> Vec<CandidatePath> {
        let failures = net.failure_counts(request.src);
        if failures.quality >= failures.wavelength {
            return qm_paths(request.src, request.dest, request.k, net);
        }

        let pool = qm_paths(request.src, request.dest, 2 * request.k, net);
        let mut availability: Vec<usize> = pool.iter().map(|p| free_wavelengths(p, net)).collect();

        (0..request.k)
            .map(|_| {
                let mut best: Option<usize> = None;
                let mut best_free = 0;
                for (i, &free) in availability.iter().enumerate() {
                    if free > best_free {
                        best = Some(i);
                        best_free = free;
                    }
                }
                match best {
                    Some(i) => {
                        availability[i] = 0;
                        pool[i].clone()
                    }
                    None => CandidatePath::unreachable(),
                }
            })
            .collect()
    }

    fn kind(&self) -> RoutingKind {
        RoutingKind::AdaptiveQos
    }
}
