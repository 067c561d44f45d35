use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rwasim_algorithms::ksp::{k_shortest_paths, WeightedGraph};
use rwasim_core::config::SimConfig;

/// Links of a `side` x `side` grid, 2 spans each.
fn grid_links(side: usize) -> Vec<String> {
    let mut links = Vec::new();
    for r in 0..side {
        for c in 0..side {
            let id = r * side + c;
            if c + 1 < side {
                links.push(format!("[{}, {}, 2]", id, id + 1));
            }
            if r + 1 < side {
                links.push(format!("[{}, {}, 2]", id, id + side));
            }
        }
    }
    links
}

fn test_config(side: usize, routing: &str, style: &str) -> SimConfig {
    SimConfig::from_str(&format!(
        r#"
[simulation]
name = "bench"
seed = 42
max_probes = 3

[topology]
name = "grid"
routers = {}
links = [{}]
workstations = {}

[quality]
halfwavelength = 2
arrival_interval = 30.0
duration = 60.0

[[algorithms]]
routing = "{}"
wavelength = "FF"
probe_style = "{}"
"#,
        side * side,
        grid_links(side).join(", "),
        side * side,
        routing,
        style
    ))
    .unwrap()
}

fn bench_sp_ff_run(c: &mut Criterion) {
    let config = test_config(4, "SP", "single");

    c.bench_function("simulate_sp_ff_grid4", |b| {
        b.iter(|| rwasim_core::run_simulation(black_box(&config), 1).unwrap())
    });
}

fn bench_sp_ff_parallel_run(c: &mut Criterion) {
    let config = test_config(4, "SP", "parallel");

    c.bench_function("simulate_sp_ff_parallel_grid4", |b| {
        b.iter(|| rwasim_core::run_simulation(black_box(&config), 1).unwrap())
    });
}

fn bench_ksp(c: &mut Criterion) {
    let side = 8;
    let mut graph = WeightedGraph::new(side * side);
    for r in 0..side {
        for col in 0..side {
            let id = r * side + col;
            if col + 1 < side {
                graph.add_arc(id, id + 1, 1.0);
                graph.add_arc(id + 1, id, 1.0);
            }
            if r + 1 < side {
                graph.add_arc(id, id + side, 1.0);
                graph.add_arc(id + side, id, 1.0);
            }
        }
    }

    c.bench_function("ksp_k7_grid8", |b| {
        b.iter(|| k_shortest_paths(black_box(&graph), 0, side * side - 1, 7))
    });
}

criterion_group!(benches, bench_sp_ff_run, bench_sp_ff_parallel_run, bench_ksp);
criterion_main!(benches);
