//! Dynamic-programming routing (forward reservation).
//!
//! A breadth-first, label-correcting search from the source. Every router
//! keeps its k best partial paths, scored by a blend of normalised Q-factor
//! and normalised inverse length:
//!
//! ```text
//! weight = (1 - alpha) * Q / Q_exp + alpha * l_exp / (spans + remaining)
//! ```
//!
//! where `remaining` is the shortest span distance still to go. Only
//! partial paths that improve a router's label set are extended, and only
//! while a wavelength stays free along the whole prefix and the projected
//! length stays under `max_spans`. The destination's labels become the
//! result; each slot's `cost` carries the best wavelength found for it.

use crate::context::RoutingContext;
use crate::traits::*;
use rand::RngCore;
use std::collections::VecDeque;

pub struct DynamicProgramming;

impl DynamicProgramming {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DynamicProgramming {
    fn default() -> Self {
        Self::new()
    }
}

/// One stored partial path at a router.
#[derive(Debug, Clone, Default)]
struct Label {
    edges: Vec<EdgeId>,
    spans: u32,
    weight: f64,
    wave: usize,
}

impl Label {
    fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// A partial path waiting to be scored.
struct Item {
    edges: Vec<EdgeId>,
    spans: u32,
    waves: Vec<bool>,
}

/// Insert `label` into a descending-by-weight slot list, shifting lower
/// entries down and dropping the last.
fn insert_label(slots: &mut [Label], label: Label) {
    let mut pos = slots.len() - 1;
    while pos > 0 && (label.weight > slots[pos - 1].weight || slots[pos - 1].is_empty()) {
        slots[pos] = slots[pos - 1].clone();
        pos -= 1;
    }
    slots[pos] = label;
}

impl RoutingAlgorithm for DynamicProgramming {
    fn compute_paths(
        &mut self,
        request: &RouteRequest,
        net: &dyn NetworkView,
        ctx: &RoutingContext,
        _rng: &mut dyn RngCore,
    ) -> Vec<CandidatePath> {
        let k = ctx.effective_k(request.k).max(1);
        let (src, dest) = (request.src, request.dest);
        let alpha = ctx.params().dp_alpha;
        let (l_exp, q_exp) = ctx.expected_quality(src, dest);
        let th_q = ctx.th_q;

        let mut labels: Vec<Vec<Label>> = vec![vec![Label::default(); k]; net.router_count()];
        let mut queue: VecDeque<Item> = VecDeque::new();

        for &e in net.out_edges(src) {
            let waves = free_waves(net, &[e]);
            if waves.iter().any(|&w| w) {
                queue.push_back(Item {
                    edges: vec![e],
                    spans: net.edge(e).spans,
                    waves,
                });
            }
        }

        while let Some(item) = queue.pop_front() {
            let Some(&last) = item.edges.last() else {
                continue;
            };
            let v = net.edge(last).dst;
            let remaining = ctx.spans_between(v, dest);
            let projected = item.spans.saturating_add(remaining);
            if projected >= ctx.max_spans {
                continue;
            }

            let mut best_q = 0.0;
            let mut best_weight = 0.0;
            let mut best_wave = 0;
            for wave in (0..item.waves.len()).filter(|&w| item.waves[w]) {
                let q = ctx.estimator.q_factor(wave, &item.edges, net);
                let weight = (1.0 - alpha) * (q / q_exp) + alpha * l_exp / projected as f64;
                if weight > best_weight && q > th_q {
                    best_q = q;
                    best_weight = weight;
                    best_wave = wave;
                    if alpha == 1.0 {
                        break;
                    }
                }
            }

            let slots = &mut labels[v];
            if best_q < th_q || best_weight <= slots[k - 1].weight {
                continue;
            }
            if slots.iter().any(|s| s.edges == item.edges) {
                continue;
            }
            insert_label(
                slots,
                Label {
                    edges: item.edges.clone(),
                    spans: item.spans,
                    weight: best_weight,
                    wave: best_wave,
                },
            );

            if v == dest {
                continue;
            }
            for &next in net.out_edges(v) {
                let info = net.edge(next);
                let revisits = info.dst == src
                    || item.edges.iter().any(|&e| net.edge(e).src == info.dst);
                if revisits {
                    continue;
                }
                let spans = item.spans + info.spans;
                if spans > ctx.max_spans {
                    continue;
                }
                let target_worst = labels[info.dst][k - 1].spans;
                if alpha == 0.0 && target_worst != 0 && spans > target_worst {
                    continue;
                }
                let waves: Vec<bool> = item
                    .waves
                    .iter()
                    .enumerate()
                    .map(|(w, &free)| free && net.wave_status(next, w).is_free())
                    .collect();
                if waves.iter().any(|&w| w) {
                    let mut edges = item.edges.clone();
                    edges.push(next);
                    queue.push_back(Item { edges, spans, waves });
                }
            }
        }

        labels[dest]
            .iter()
            .take(request.k)
            .map(|label| {
                if label.is_empty() {
                    return CandidatePath::unreachable();
                }
                let mut routers: Vec<RouterId> =
                    label.edges.iter().map(|&e| net.edge(e).src).collect();
                routers.push(dest);
                CandidatePath::new(label.wave as f64, routers)
            })
            .chain(std::iter::repeat_with(CandidatePath::unreachable))
            .take(request.k)
            .collect()
    }

    fn kind(&self) -> RoutingKind {
        RoutingKind::DynamicProgramming
    }
}
