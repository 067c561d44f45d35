/// Integration tests for the k-shortest-paths library.
use proptest::prelude::*;
use rwasim_algorithms::ksp::{candidate_paths, dijkstra, k_shortest_paths, WeightedGraph, WeightedPath};
use std::collections::HashSet;

fn diamond() -> WeightedGraph {
    let mut g = WeightedGraph::new(5);
    for (a, b, w) in [
        (0, 1, 1.0),
        (0, 2, 2.5),
        (1, 2, 1.0),
        (1, 3, 3.0),
        (2, 3, 1.0),
        (2, 4, 4.0),
        (3, 4, 1.0),
        (1, 4, 7.0),
    ] {
        g.add_arc(a, b, w);
    }
    g
}

fn complete(n: usize) -> WeightedGraph {
    let mut g = WeightedGraph::new(n);
    for a in 0..n {
        for b in 0..n {
            if a != b {
                g.add_arc(a, b, 1.0 + ((a * 7 + b * 3) % 5) as f64);
            }
        }
    }
    g
}

fn path_cost(g: &WeightedGraph, path: &WeightedPath) -> Option<f64> {
    path.nodes
        .windows(2)
        .map(|hop| g.arc_weight(hop[0], hop[1]))
        .sum()
}

fn check_paths(g: &WeightedGraph, paths: &[WeightedPath], src: usize, dest: usize) {
    let mut seen = HashSet::new();
    for p in paths {
        assert_eq!(p.nodes.first(), Some(&src));
        assert_eq!(p.nodes.last(), Some(&dest));
        let unique: HashSet<_> = p.nodes.iter().collect();
        assert_eq!(unique.len(), p.nodes.len(), "loop in {:?}", p.nodes);
        let cost = path_cost(g, p).expect("every hop must be an arc");
        assert!((cost - p.cost).abs() < 1e-9, "{:?}: {} != {}", p.nodes, cost, p.cost);
        assert!(seen.insert(p.nodes.clone()), "duplicate {:?}", p.nodes);
    }
    for w in paths.windows(2) {
        assert!(w[0].cost <= w[1].cost + 1e-9);
    }
}

#[test]
fn test_diamond_three_cheapest() {
    let g = diamond();
    let paths = k_shortest_paths(&g, 0, 4, 3);
    let costs: Vec<f64> = paths.iter().map(|p| p.cost).collect();
    assert_eq!(costs, vec![4.0, 4.5, 5.0]);
    assert_eq!(paths[0].nodes, vec![0, 1, 2, 3, 4]);
    assert_eq!(paths[1].nodes, vec![0, 2, 3, 4]);
    assert_eq!(paths[2].nodes, vec![0, 1, 3, 4]);
}

#[test]
fn test_diamond_enumerates_every_path() {
    let g = diamond();
    let paths = k_shortest_paths(&g, 0, 4, 50);
    check_paths(&g, &paths, 0, 4);
    // 0-1-2-3-4, 0-2-3-4, 0-1-3-4, 0-1-2-4, 0-2-4, 0-1-4
    assert_eq!(paths.len(), 6);
    assert_eq!(paths.last().map(|p| p.cost), Some(8.0));
}

#[test]
fn test_complete_graph_fills_k() {
    let g = complete(6);
    for k in [1, 4, 10, 25] {
        let paths = k_shortest_paths(&g, 0, 5, k);
        assert_eq!(paths.len(), k);
        check_paths(&g, &paths, 0, 5);
    }
}

#[test]
fn test_candidate_slots_are_padded() {
    let g = diamond();
    let slots = candidate_paths(&g, 3, 0, 3);
    assert_eq!(slots.len(), 3);
    assert!(slots.iter().all(|s| !s.is_viable()));

    let slots = candidate_paths(&g, 0, 4, 8);
    assert_eq!(slots.len(), 8);
    assert_eq!(slots.iter().filter(|s| s.is_viable()).count(), 6);
}

fn arb_graph() -> impl Strategy<Value = (usize, Vec<(usize, usize, f64)>)> {
    (3usize..9).prop_flat_map(|n| {
        let chords = prop::collection::vec((0..n, 0..n, 1u32..10), 0..(2 * n));
        let ring = prop::collection::vec(1u32..10, n);
        (Just(n), ring, chords).prop_map(|(n, ring, chords)| {
            let mut arcs: Vec<(usize, usize, f64)> = Vec::new();
            for (i, w) in ring.into_iter().enumerate() {
                let j = (i + 1) % n;
                arcs.push((i, j, w as f64));
                arcs.push((j, i, w as f64));
            }
            for (a, b, w) in chords {
                if a != b && !arcs.iter().any(|&(x, y, _)| x == a && y == b) {
                    arcs.push((a, b, w as f64));
                }
            }
            (n, arcs)
        })
    })
}

proptest! {
    #[test]
    fn prop_ksp_invariants((n, arcs) in arb_graph(), k in 1usize..8) {
        let mut g = WeightedGraph::new(n);
        for &(a, b, w) in &arcs {
            g.add_arc(a, b, w);
        }
        let (dist, _) = dijkstra(&g, 0);
        for dest in 1..n {
            let paths = k_shortest_paths(&g, 0, dest, k);
            prop_assert!(!paths.is_empty() && paths.len() <= k);
            prop_assert!((paths[0].cost - dist[dest]).abs() < 1e-9);
            check_paths(&g, &paths, 0, dest);
        }
    }

    #[test]
    fn prop_more_k_extends_prefix((n, arcs) in arb_graph(), k in 1usize..6) {
        let mut g = WeightedGraph::new(n);
        for &(a, b, w) in &arcs {
            g.add_arc(a, b, w);
        }
        let dest = n - 1;
        let fewer = k_shortest_paths(&g, 0, dest, k);
        let more = k_shortest_paths(&g, 0, dest, k + 2);
        prop_assert!(more.len() >= fewer.len());
        for (a, b) in fewer.iter().zip(&more) {
            prop_assert!((a.cost - b.cost).abs() < 1e-9);
        }
    }
}
