//! Least-Overall-Resource-Allocation routing.
//!
//! Edge cost is `beta^usage`, where usage is a smoothed count of busy
//! wavelengths maintained by the engine's periodic usage updates.

use crate::context::RoutingContext;
use crate::ksp::{candidate_paths, WeightedGraph};
use crate::traits::*;
use rand::RngCore;

pub struct Lora;

impl Lora {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Lora {
    fn default() -> Self {
        Self::new()
    }
}

/// k cheapest paths under the usage-based cost.
pub fn lora_paths(
    src: RouterId,
    dest: RouterId,
    k: usize,
    net: &dyn NetworkView,
    ctx: &RoutingContext,
) -> Vec<CandidatePath> {
    let beta = ctx.params().beta;
    let graph = WeightedGraph::from_network(net, |e| Some(beta.powf(net.algorithm_usage(e))));
    candidate_paths(&graph, src, dest, k)
}

impl RoutingAlgorithm for Lora {
    fn compute_paths(
        &mut self,
        request: &RouteRequest,
        net: &dyn NetworkView,
        ctx: &RoutingContext,
        _rng: &mut dyn RngCore,
    ) -> Vec<CandidatePath> {
        lora_paths(request.src, request.dest, request.k, net, ctx)
    }

    fn kind(&self) -> RoutingKind {
        RoutingKind::Lora
    }
}
