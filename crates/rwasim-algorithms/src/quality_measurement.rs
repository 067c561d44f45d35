//! Quality-measurement routing: edge cost is the accumulated QM
//! degradation the engine maintains from established connections.

use crate::context::RoutingContext;
use crate::ksp::{candidate_paths, WeightedGraph};
use crate::traits::*;
use rand::RngCore;

pub struct QualityMeasurement;

impl QualityMeasurement {
    pub fn new() -> Self {
        Self
    }
}

impl Default for QualityMeasurement {
    fn default() -> Self {
        Self::new()
    }
}

/// k cheapest paths by degradation. Edges whose every wavelength is
/// degraded (infinite cost) are excluded.
pub fn qm_paths(
    src: RouterId,
    dest: RouterId,
    k: usize,
    net: &dyn NetworkView,
) -> Vec<CandidatePath> {
    let graph = WeightedGraph::from_network(net, |e| Some(net.qm_degradation(e)));
    candidate_paths(&graph, src, dest, k)
}

impl RoutingAlgorithm for QualityMeasurement {
    fn compute_paths(
        &mut self,
        request: &RouteRequest,
        net: &dyn NetworkView,
        _ctx: &RoutingContext,
        _rng: &mut dyn RngCore,
    ) -> Vec<CandidatePath> {
        qm_paths(request.src, request.dest, request.k, net)
    }

    fn kind(&self) -> RoutingKind {
        RoutingKind::QualityMeasurement
    }
}
