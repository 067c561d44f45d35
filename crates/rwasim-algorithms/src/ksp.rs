//! Shortest and k-shortest loopless paths over a weighted digraph.
//!
//! [`dijkstra`] computes single-source distances. [`k_shortest_paths`]
//! implements Yen's deviation scheme in the vertex-restoration form: after
//! a path is accepted, its prefix vertices and the arcs already taken from
//! its deviation vertex are removed, a reverse shortest-path tree to the
//! target is built on the pruned graph, and vertices are restored one by
//! one from the target side while costs are corrected. Every restored
//! vertex that can still reach the target yields a new candidate.

use crate::traits::{pad_to, CandidatePath, EdgeId, NetworkView, RouterId};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet, VecDeque};

/// Distance reported for unreachable vertices.
pub const DISCONNECT: f64 = f64::MAX;

/// Directed graph with non-negative arc weights.
#[derive(Debug, Clone)]
pub struct WeightedGraph {
    outgoing: Vec<Vec<(usize, f64)>>,
    incoming: Vec<Vec<(usize, f64)>>,
}

impl WeightedGraph {
    pub fn new(node_count: usize) -> Self {
        Self {
            outgoing: vec![Vec::new(); node_count],
            incoming: vec![Vec::new(); node_count],
        }
    }

    /// Build a graph over the network, with `cost` giving each edge's
    /// weight. Edges with no (or a non-finite) cost are left out.
    pub fn from_network<F>(net: &dyn NetworkView, mut cost: F) -> Self
    where
        F: FnMut(EdgeId) -> Option<f64>,
    {
        let mut graph = Self::new(net.router_count());
        for id in 0..net.edge_count() {
            if let Some(weight) = cost(id).filter(|w| w.is_finite()) {
                let edge = net.edge(id);
                graph.add_arc(edge.src, edge.dst, weight);
            }
        }
        graph
    }

    pub fn add_arc(&mut self, from: usize, to: usize, weight: f64) {
        debug_assert!(weight >= 0.0, "negative arc weight {}", weight);
        self.outgoing[from].push((to, weight));
        self.incoming[to].push((from, weight));
    }

    pub fn node_count(&self) -> usize {
        self.outgoing.len()
    }

    pub fn arc_weight(&self, from: usize, to: usize) -> Option<f64> {
        self.outgoing[from]
            .iter()
            .find(|(dst, _)| *dst == to)
            .map(|(_, w)| *w)
    }
}

/// A path as a vertex sequence with its total weight.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedPath {
    pub cost: f64,
    pub nodes: Vec<RouterId>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct HeapEntry {
    dist: f64,
    node: usize,
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; we want min-heap
        other
            .dist
            .total_cmp(&self.dist)
            .then(other.node.cmp(&self.node))
    }
}

/// Single-source shortest distances and predecessors.
///
/// Unreachable vertices keep [`DISCONNECT`] and no predecessor.
pub fn dijkstra(graph: &WeightedGraph, src: usize) -> (Vec<f64>, Vec<Option<usize>>) {
    let n = graph.node_count();
    let mut dist = vec![DISCONNECT; n];
    let mut pred = vec![None; n];
    let mut settled = vec![false; n];
    let mut heap = BinaryHeap::new();

    dist[src] = 0.0;
    heap.push(HeapEntry { dist: 0.0, node: src });

    while let Some(HeapEntry { dist: d, node }) = heap.pop() {
        if settled[node] {
            continue;
        }
        settled[node] = true;
        for &(next, weight) in &graph.outgoing[node] {
            let candidate = d + weight;
            if candidate < dist[next] {
                dist[next] = candidate;
                pred[next] = Some(node);
                heap.push(HeapEntry {
                    dist: candidate,
                    node: next,
                });
            }
        }
    }
    (dist, pred)
}

/// Shortest path from `src` to `dest`, if reachable.
pub fn shortest_path(graph: &WeightedGraph, src: usize, dest: usize) -> Option<WeightedPath> {
    let (dist, pred) = dijkstra(graph, src);
    if dist[dest] >= DISCONNECT {
        return None;
    }
    let mut nodes = vec![dest];
    let mut cur = dest;
    while let Some(p) = pred[cur] {
        nodes.push(p);
        cur = p;
    }
    nodes.reverse();
    Some(WeightedPath {
        cost: dist[dest],
        nodes,
    })
}

#[derive(Debug, Clone)]
struct Candidate {
    path: WeightedPath,
    deviation: usize,
    id: u64,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on (cost, length, id)
        other
            .path
            .cost
            .total_cmp(&self.path.cost)
            .then(other.path.nodes.len().cmp(&self.path.nodes.len()))
            .then(other.id.cmp(&self.id))
    }
}

/// Reverse shortest-path tree to the target over a graph with some
/// vertices and arcs hidden.
struct PrunedTree<'g> {
    graph: &'g WeightedGraph,
    target: usize,
    removed_nodes: Vec<bool>,
    removed_arcs: HashSet<(usize, usize)>,
    dist: Vec<f64>,
    next: Vec<Option<usize>>,
}

impl<'g> PrunedTree<'g> {
    fn new(graph: &'g WeightedGraph, target: usize) -> Self {
        let n = graph.node_count();
        Self {
            graph,
            target,
            removed_nodes: vec![false; n],
            removed_arcs: HashSet::new(),
            dist: vec![DISCONNECT; n],
            next: vec![None; n],
        }
    }

    fn usable(&self, from: usize, to: usize) -> bool {
        !self.removed_nodes[from]
            && !self.removed_nodes[to]
            && !self.removed_arcs.contains(&(from, to))
    }

    fn build(&mut self) {
        let n = self.graph.node_count();
        self.dist = vec![DISCONNECT; n];
        self.next = vec![None; n];
        let mut settled = vec![false; n];
        let mut heap = BinaryHeap::new();

        self.dist[self.target] = 0.0;
        heap.push(HeapEntry {
            dist: 0.0,
            node: self.target,
        });
        while let Some(HeapEntry { dist: d, node }) = heap.pop() {
            if settled[node] {
                continue;
            }
            settled[node] = true;
            for &(prev, weight) in &self.graph.incoming[node] {
                if !self.usable(prev, node) {
                    continue;
                }
                let candidate = d + weight;
                if candidate < self.dist[prev] {
                    self.dist[prev] = candidate;
                    self.next[prev] = Some(node);
                    heap.push(HeapEntry {
                        dist: candidate,
                        node: prev,
                    });
                }
            }
        }
    }

    /// Recompute the distance of a freshly restored vertex from its
    /// successors and return its path to the target, if any.
    fn update_forward(&mut self, v: usize) -> Option<Vec<usize>> {
        let mut best = DISCONNECT;
        let mut best_next = None;
        for &(succ, weight) in &self.graph.outgoing[v] {
            if !self.usable(v, succ) || self.dist[succ] >= DISCONNECT {
                continue;
            }
            let candidate = self.dist[succ] + weight;
            if candidate < best {
                best = candidate;
                best_next = Some(succ);
            }
        }
        if best >= DISCONNECT {
            return None;
        }
        self.dist[v] = best;
        self.next[v] = best_next;
        // Restored vertices upstream may now reach the target through `v`.
        self.correct_backward(v);
        self.walk(v)
    }

    fn walk(&self, from: usize) -> Option<Vec<usize>> {
        let mut nodes = vec![from];
        let mut cur = from;
        while cur != self.target {
            cur = self.next[cur]?;
            nodes.push(cur);
            if nodes.len() > self.graph.node_count() {
                return None;
            }
        }
        Some(nodes)
    }

    /// Propagate an improved distance at `v` to its predecessors.
    fn correct_backward(&mut self, v: usize) {
        let mut queue = VecDeque::from([v]);
        while let Some(u) = queue.pop_front() {
            for &(prev, weight) in &self.graph.incoming[u] {
                if !self.usable(prev, u) {
                    continue;
                }
                let candidate = self.dist[u] + weight;
                if self.dist[prev] > candidate {
                    self.dist[prev] = candidate;
                    self.next[prev] = Some(u);
                    queue.push_back(prev);
                }
            }
        }
    }
}

/// Up to `k` loopless paths from `src` to `dest`, cheapest first.
///
/// Candidates are ranked by (cost, vertex count, discovery order). Paths
/// with fewer than two vertices are never returned.
pub fn k_shortest_paths(
    graph: &WeightedGraph,
    src: usize,
    dest: usize,
    k: usize,
) -> Vec<WeightedPath> {
    if k == 0 || src == dest {
        return Vec::new();
    }
    if k == 1 {
        return shortest_path(graph, src, dest).into_iter().collect();
    }

    let mut results: Vec<WeightedPath> = Vec::with_capacity(k);
    let mut seen: HashSet<Vec<usize>> = HashSet::new();
    let mut candidates = BinaryHeap::new();
    let mut next_id = 0u64;

    let Some(first) = shortest_path(graph, src, dest) else {
        return results;
    };
    seen.insert(first.nodes.clone());
    candidates.push(Candidate {
        path: first,
        deviation: 0,
        id: next_id,
    });
    next_id += 1;

    while let Some(current) = candidates.pop() {
        let dev = current.deviation;
        let nodes = current.path.nodes.clone();
        results.push(current.path);
        if results.len() == k {
            break;
        }

        let mut tree = PrunedTree::new(graph, dest);

        // Arcs already taken from the deviation vertex by accepted paths
        // sharing the same prefix.
        for accepted in &results {
            if accepted.nodes.len() > dev + 1 && accepted.nodes[..=dev] == nodes[..=dev] {
                tree.removed_arcs
                    .insert((accepted.nodes[dev], accepted.nodes[dev + 1]));
            }
        }
        for i in 0..nodes.len() - 1 {
            tree.removed_nodes[nodes[i]] = true;
            tree.removed_arcs.insert((nodes[i], nodes[i + 1]));
        }

        tree.build();

        let mut prefix_costs = vec![0.0; nodes.len()];
        for i in 1..nodes.len() {
            let weight = graph.arc_weight(nodes[i - 1], nodes[i]).unwrap_or(DISCONNECT);
            prefix_costs[i] = prefix_costs[i - 1] + weight;
        }

        for i in (dev..nodes.len() - 1).rev() {
            let vertex = nodes[i];
            tree.removed_nodes[vertex] = false;

            if let Some(tail) = tree.update_forward(vertex) {
                let mut path_nodes = nodes[..i].to_vec();
                path_nodes.extend_from_slice(&tail);
                if seen.insert(path_nodes.clone()) {
                    candidates.push(Candidate {
                        path: WeightedPath {
                            cost: prefix_costs[i] + tree.dist[vertex],
                            nodes: path_nodes,
                        },
                        deviation: i,
                        id: next_id,
                    });
                    next_id += 1;
                }
            }

            let succ = nodes[i + 1];
            tree.removed_arcs.remove(&(vertex, succ));
            if tree.dist[succ] < DISCONNECT {
                let weight = graph.arc_weight(vertex, succ).unwrap_or(DISCONNECT);
                let restored = tree.dist[succ] + weight;
                if tree.dist[vertex] > restored {
                    tree.dist[vertex] = restored;
                    tree.next[vertex] = Some(succ);
                    tree.correct_backward(vertex);
                }
            }
        }
    }

    results.retain(|p| p.nodes.len() >= 2);
    results
}

/// Run [`k_shortest_paths`] and return exactly `k` candidate slots.
pub fn candidate_paths(
    graph: &WeightedGraph,
    src: usize,
    dest: usize,
    k: usize,
) -> Vec<CandidatePath> {
    let found = k_shortest_paths(graph, src, dest, k)
        .into_iter()
        .map(|p| CandidatePath::new(p.cost, p.nodes))
        .collect();
    pad_to(found, k)
}
