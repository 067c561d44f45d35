//! Physically-Aware Backtracking Routing.
//!
//! Draws ever larger batches of LORA paths and keeps those whose span
//! count stays within the context's `max_spans`. After the last batch
//! it returns the valid paths found, topped up with the shortest
//! over-long ones.

use crate::context::RoutingContext;
use crate::lora::lora_paths;
use crate::traits::*;
use rand::RngCore;

/// Number of widening rounds before settling for over-long paths.
const MAX_ITERATIONS: u32 = 4;

pub struct Pabr;

impl Pabr {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Pabr {
    fn default() -> Self {
        Self::new()
    }
}

/// Batch size for round `iteration` (1-based).
fn batch_size(k: usize, iteration: u32) -> usize {
    if k == 1 {
        (k + 1).pow(iteration - 1)
    } else {
        k.pow(iteration)
    }
}

impl RoutingAlgorithm for Pabr {
    fn compute_paths(
        &mut self,
        request: &RouteRequest,
        net: &dyn NetworkView,
        ctx: &RoutingContext,
        _rng: &mut dyn RngCore,
    ) -> Vec<CandidatePath> {
        let k = ctx.effective_k(request.k);
        let mut valid = Vec::new();
        let mut too_long = Vec::new();

        for iteration in 1..=MAX_ITERATIONS {
            valid.clear();
            too_long.clear();
            for path in lora_paths(request.src, request.dest, batch_size(k, iteration), net, ctx) {
                if !path.is_viable() {
                    continue;
                }
                let spans = path_edges(net, &path.routers)
                    .map(|edges| path_spans(net, &edges))
                    .unwrap_or(u32::MAX);
                if spans > ctx.max_spans {
                    too_long.push(path);
                } else {
                    valid.push(path);
                    if valid.len() == k {
                        return valid;
                    }
                }
            }
        }

        log::trace!(
            "PABR {}->{}: {} valid, {} over-long after {} rounds",
            request.src,
            request.dest,
            valid.len(),
            too_long.len(),
            MAX_ITERATIONS
        );
        valid.extend(too_long);
        valid.truncate(k);
        pad_to(valid, k)
    }

    fn kind(&self) -> RoutingKind {
        RoutingKind::Pabr
    }
}
