/// Integration tests for the simulation engine and signaling protocol.
use rwasim_algorithms::context::default_k_overrides;
use rwasim_algorithms::*;
use rwasim_core::config::SimConfig;
use rwasim_core::{ConnectionRequest, Milestone, Network, ProbeStyle, RunSettings, SimulationEngine};
use std::sync::Arc;

fn context(net: &Network, params: QualityParams) -> Arc<RoutingContext> {
    let xpm = XpmTable::zeros(params.wavelength_count());
    Arc::new(RoutingContext::build(
        net,
        params,
        xpm,
        net.name(),
        default_k_overrides(),
        42,
    ))
}

fn settings(routing: RoutingKind, style: ProbeStyle, workstations: usize) -> RunSettings {
    RunSettings {
        routing,
        wavelength: WavelengthKind::FirstFit,
        probe_style: style,
        quality_aware: false,
        workstations,
        max_probes: 3,
        seed: 42,
    }
}

fn ring(n: usize, waves: usize) -> Network {
    let links: Vec<_> = (0..n).map(|i| (i, (i + 1) % n, 1)).collect();
    Network::new("ring", n, &links, waves).unwrap()
}

/// Five routers: a ring plus two chords.
fn mesh() -> Network {
    Network::new(
        "mesh5",
        5,
        &[(0, 1, 1), (1, 2, 2), (2, 3, 1), (3, 4, 2), (4, 0, 1), (0, 2, 3), (1, 3, 2)],
        3,
    )
    .unwrap()
}

fn scripted(session: u64, src: usize, dest: usize, duration: f64) -> ConnectionRequest {
    ConnectionRequest {
        session,
        src,
        dest,
        workstation: None,
        duration: Some(duration),
    }
}

fn single_wave() -> QualityParams {
    QualityParams {
        halfwavelength: 0,
        ..QualityParams::default()
    }
}

#[test]
fn test_adjacent_request_establishes_and_releases() {
    let net = ring(4, 1);
    let ctx = context(&net, single_wave());
    let delay = ctx.propagation_delay(1);
    let mut engine =
        SimulationEngine::new(net, ctx, settings(RoutingKind::ShortestPath, ProbeStyle::Single, 1))
            .unwrap();
    engine.record_history();
    engine.load_requests(vec![(0.0, scripted(7, 0, 1, 5.0))]).unwrap();
    let metrics = engine.run().unwrap();

    assert_eq!(metrics.stats.requests, 1);
    assert_eq!(metrics.stats.successes, 1);
    assert_eq!(metrics.blocking, 0.0);
    assert_eq!(metrics.avg_hops, 1.0);

    let history = engine.history();
    assert_eq!(history.len(), 2);
    match &history[0] {
        Milestone::Established {
            session,
            time,
            path,
            wave,
        } => {
            assert_eq!(*session, 7);
            assert!((time - 2.0 * delay).abs() < 1e-12);
            assert_eq!(path, &vec![engine.network().edge_between(0, 1).unwrap()]);
            assert_eq!(*wave, 0);
        }
        other => panic!("expected an established connection, got {:?}", other),
    }
    match &history[1] {
        Milestone::Released { session, time } => {
            assert_eq!(*session, 7);
            assert!((time - (2.0 * delay + 5.0)).abs() < 1e-9);
        }
        other => panic!("expected a release, got {:?}", other),
    }
    assert_eq!(engine.network().used_wave_count(), 0);
}

#[test]
fn test_simultaneous_requests_collide() {
    for style in [ProbeStyle::Single, ProbeStyle::Parallel] {
        let net = Network::new("pair", 2, &[(0, 1, 1)], 1).unwrap();
        let ctx = context(&net, single_wave());
        let mut engine =
            SimulationEngine::new(net, ctx, settings(RoutingKind::ShortestPath, style, 1)).unwrap();
        engine.record_history();
        engine
            .load_requests(vec![
                (0.0, scripted(0, 0, 1, 3.0)),
                (0.0, scripted(1, 0, 1, 3.0)),
            ])
            .unwrap();
        let metrics = engine.run().unwrap();

        assert_eq!(metrics.stats.successes, 1, "{:?}", style);
        assert_eq!(metrics.stats.collisions, 1, "{:?}", style);
        assert_eq!(metrics.collision_rate, 0.5);
        let failed = engine.history().iter().find_map(|m| match m {
            Milestone::Failed { session, failure, .. } => Some((*session, *failure)),
            _ => None,
        });
        assert_eq!(failed, Some((1, Failure::Collision)));
        let failed_at = engine.history().iter().find_map(|m| match m {
            Milestone::Failed { time, .. } => Some(*time),
            _ => None,
        });
        let released_at = engine.history().iter().find_map(|m| match m {
            Milestone::Released { session: 0, time } => Some(*time),
            _ => None,
        });
        assert!(failed_at.unwrap() < released_at.unwrap(), "{:?}", style);
        assert_eq!(engine.network().used_wave_count(), 0);
    }
}

#[test]
fn test_one_outcome_per_request_under_load() {
    let params = QualityParams {
        halfwavelength: 1,
        arrival_interval: 20.0,
        duration: 150.0,
        ..QualityParams::default()
    };
    let routings = [
        RoutingKind::ShortestPath,
        RoutingKind::Lora,
        RoutingKind::Pabr,
        RoutingKind::ImpairmentAware,
        RoutingKind::QualityMeasurement,
        RoutingKind::AdaptiveQos,
        RoutingKind::DynamicProgramming,
        RoutingKind::AntColony,
        RoutingKind::MaxMinAntColony,
    ];
    for routing in routings {
        for style in ProbeStyle::ALL {
            let mut net = mesh();
            net.set_workstations(5, &[]).unwrap();
            let ctx = context(&net, params.clone());
            let mut engine = SimulationEngine::new(net, ctx, settings(routing, style, 5)).unwrap();
            engine.record_history();
            let metrics = engine.run().unwrap();

            let label = format!("{}/{}", routing.name(), style.name());
            assert!(metrics.stats.requests > 100, "{}", label);
            assert_eq!(metrics.stats.outcomes(), metrics.stats.requests, "{}", label);

            let established = engine
                .history()
                .iter()
                .filter(|m| matches!(m, Milestone::Established { .. }))
                .count();
            let released = engine
                .history()
                .iter()
                .filter(|m| matches!(m, Milestone::Released { .. }))
                .count();
            assert_eq!(established as u64, metrics.stats.successes, "{}", label);
            assert_eq!(established, released, "{}", label);
            assert_eq!(engine.network().used_wave_count(), 0, "{}", label);
            assert_eq!(engine.network().connection_count(), 0, "{}", label);
        }
    }
}

#[test]
fn test_same_seed_same_result() {
    let params = QualityParams {
        halfwavelength: 1,
        arrival_interval: 30.0,
        duration: 120.0,
        ..QualityParams::default()
    };
    let run = || {
        let mut net = mesh();
        net.set_workstations(5, &[]).unwrap();
        let ctx = context(&net, params.clone());
        let mut engine =
            SimulationEngine::new(net, ctx, settings(RoutingKind::Lora, ProbeStyle::Serial, 3))
                .unwrap();
        engine.run().unwrap()
    };
    let a = run();
    let b = run();
    assert_eq!(a.stats.requests, b.stats.requests);
    assert_eq!(a.stats.successes, b.stats.successes);
    assert_eq!(a.stats.collisions, b.stats.collisions);
    assert_eq!(a.stats.hop_total, b.stats.hop_total);
}

#[test]
fn test_q_factor_statistics() {
    let params = QualityParams {
        halfwavelength: 2,
        arrival_interval: 20.0,
        duration: 200.0,
        q_factor_stats: true,
        ..QualityParams::default()
    };
    let mut net = Network::new(
        "mesh5",
        5,
        &[(0, 1, 1), (1, 2, 2), (2, 3, 1), (3, 4, 2), (4, 0, 1), (0, 2, 3), (1, 3, 2)],
        5,
    )
    .unwrap();
    net.set_workstations(5, &[]).unwrap();
    let ctx = context(&net, params);
    let mut engine =
        SimulationEngine::new(net, ctx, settings(RoutingKind::ShortestPath, ProbeStyle::Single, 5))
            .unwrap();
    let metrics = engine.run().unwrap();

    let q = metrics
        .q_factor
        .as_ref()
        .expect("q-factor statistics enabled");
    assert!(metrics.stats.q_connections > 0);
    assert_eq!(metrics.stats.q_connections, metrics.stats.successes);
    assert!(q.avg_initial_q > 0.0);
    assert!(q.percent_below >= 0.0 && q.percent_below <= 100.0);
    assert!(q.blocking_with_dropped >= metrics.blocking);
    assert_eq!(metrics.log_lines().len(), 18);
}

#[test]
fn test_too_many_workstations_is_fatal() {
    let mut net = ring(4, 1);
    net.set_workstations(2, &[]).unwrap();
    let ctx = context(&net, single_wave());
    let mut engine =
        SimulationEngine::new(net, ctx, settings(RoutingKind::ShortestPath, ProbeStyle::Single, 3))
            .unwrap();
    let err = engine.run().unwrap_err();
    assert_eq!(err.code(), -14);
}

#[test]
fn test_run_from_config() {
    let config = SimConfig::from_str(
        r#"
[simulation]
name = "integration-test"
seed = 3
iterations = 2
threads = 2

[topology]
name = "ring6"
routers = 6
links = [[0, 1, 1], [1, 2, 1], [2, 3, 1], [3, 4, 1], [4, 5, 1], [5, 0, 1]]
workstations = 6

[quality]
halfwavelength = 1
arrival_interval = 60.0
duration = 90.0

[[algorithms]]
routing = "SP"
wavelength = "FF"
probe_style = "parallel"

[[algorithms]]
routing = "IA"
wavelength = "BF"
"#,
    )
    .unwrap();

    let results = rwasim_core::run_simulation(&config, 2).unwrap();
    assert_eq!(results.len(), 4);
    assert_eq!(results[0].label.workstations, 3);
    assert_eq!(results[1].label.workstations, 6);
    assert_eq!(results[2].label.routing, "IA");
    for r in &results {
        assert!(r.stats.requests > 0);
        assert!(r.blocking >= 0.0 && r.blocking <= 1.0);
    }
    // More active workstations means more offered traffic.
    assert!(results[1].stats.requests > results[0].stats.requests);
}

#[test]
fn test_shipped_config_plans() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../configs/nsfnet.toml");
    let config = SimConfig::from_file(&path).unwrap();
    let runs = rwasim_core::plan(&config).unwrap();
    assert_eq!(runs.len(), 6 * 2 + 2);
    assert_eq!(runs[0].workstations, 14);
    assert_eq!(runs[1].workstations, 28);
    assert_eq!(runs.last().map(|r| r.routing), Some(RoutingKind::AntColony));
}
