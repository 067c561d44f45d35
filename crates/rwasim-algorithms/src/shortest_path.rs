//! Shortest-path routing: k-shortest paths by hop count.
//!
//! Hop counts never change during a run, so results are cached per
//! (source, destination, k).

use crate::context::RoutingContext;
use crate::ksp::{candidate_paths, WeightedGraph};
use crate::traits::*;
use rand::RngCore;
use std::collections::HashMap;

pub struct ShortestPath {
    cache: HashMap<(RouterId, RouterId, usize), Vec<CandidatePath>>,
}

impl ShortestPath {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    pub fn cached_routes(&self) -> usize {
        self.cache.len()
    }
}

impl Default for ShortestPath {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingAlgorithm for ShortestPath {
    fn compute_paths(
        &mut self,
        request: &RouteRequest,
        net: &dyn NetworkView,
        _ctx: &RoutingContext,
        _rng: &mut dyn RngCore,
    ) -> Vec<CandidatePath> {
        self.cache
            .entry((request.src, request.dest, request.k))
            .or_insert_with(|| {
                let graph = WeightedGraph::from_network(net, |_| Some(1.0));
                candidate_paths(&graph, request.src, request.dest, request.k)
            })
            .clone()
    }

    fn kind(&self) -> RoutingKind {
        RoutingKind::ShortestPath
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{no_rng, TestNetwork};

    #[test]
    fn test_adjacent_routers_single_hop() {
        let net = TestNetwork::ring(4, 1, 1);
        let ctx = TestNetwork::context(&net);
        let mut sp = ShortestPath::new();
        let paths = sp.compute_paths(
            &RouteRequest { src: 0, dest: 1, k: 1 },
            &net,
            &ctx,
            &mut no_rng(),
        );
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].routers, vec![0, 1]);
        assert_eq!(paths[0].cost, 1.0);
    }

    #[test]
    fn test_ring_has_two_routes() {
        let net = TestNetwork::ring(4, 1, 1);
        let ctx = TestNetwork::context(&net);
        let mut sp = ShortestPath::new();
        let paths = sp.compute_paths(
            &RouteRequest { src: 0, dest: 2, k: 3 },
            &net,
            &ctx,
            &mut no_rng(),
        );
        assert!(paths[0].is_viable() && paths[1].is_viable());
        assert_eq!(paths[0].cost, 2.0);
        assert_eq!(paths[1].cost, 2.0);
        assert!(!paths[2].is_viable());
    }

    #[test]
    fn test_results_are_cached() {
        let net = TestNetwork::ring(4, 1, 1);
        let ctx = TestNetwork::context(&net);
        let mut sp = ShortestPath::new();
        let req = RouteRequest { src: 1, dest: 3, k: 2 };
        let first = sp.compute_paths(&req, &net, &ctx, &mut no_rng());
        let second = sp.compute_paths(&req, &net, &ctx, &mut no_rng());
        assert_eq!(first, second);
        assert_eq!(sp.cached_routes(), 1);
    }
}
