//! Impairment-aware routing (forward reservation).
//!
//! One shortest path (by span count) per wavelength, computed over the
//! subgraph of edges where that wavelength is still free. Slot `w` of the
//! result belongs to wavelength `w`, so the wavelength is fixed before
//! any probe is sent.

use crate::context::RoutingContext;
use crate::ksp::{shortest_path, WeightedGraph};
use crate::traits::*;
use rand::RngCore;

pub struct ImpairmentAware;

impl ImpairmentAware {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImpairmentAware {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingAlgorithm for ImpairmentAware {
    /// Ignores `request.k`: the result always has one slot per wavelength.
    fn compute_paths(
        &mut self,
        request: &RouteRequest,
        net: &dyn NetworkView,
        _ctx: &RoutingContext,
        _rng: &mut dyn RngCore,
    ) -> Vec<CandidatePath> {
        (0..net.wavelength_count())
            .map(|wave| {
                let graph = WeightedGraph::from_network(net, |e| {
                    net.wave_status(e, wave)
                        .is_free()
                        .then(|| net.edge(e).spans as f64)
                });
                shortest_path(&graph, request.src, request.dest)
                    .map(|p| CandidatePath::new(p.cost, p.nodes))
                    .unwrap_or_else(CandidatePath::unreachable)
            })
            .collect()
    }

    fn kind(&self) -> RoutingKind {
        RoutingKind::ImpairmentAware
    }
}
