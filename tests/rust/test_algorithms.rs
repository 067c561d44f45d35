/// Integration tests for routing and wavelength strategies on a live network.
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rwasim_algorithms::context::default_k_overrides;
use rwasim_algorithms::*;
use rwasim_core::{ConnectionRequest, Network, ProbeStyle, RunSettings, SimulationEngine};
use std::sync::Arc;

fn nsf_like() -> Network {
    Network::new(
        "mesh8",
        8,
        &[
            (0, 1, 2),
            (0, 2, 3),
            (1, 2, 1),
            (1, 3, 4),
            (2, 5, 3),
            (3, 4, 1),
            (3, 6, 3),
            (4, 5, 2),
            (5, 7, 2),
            (6, 7, 1),
            (4, 6, 2),
        ],
        5,
    )
    .unwrap()
}

fn params() -> QualityParams {
    QualityParams {
        halfwavelength: 2,
        ..QualityParams::default()
    }
}

fn context(net: &Network, params: QualityParams) -> RoutingContext {
    let xpm = XpmTable::zeros(params.wavelength_count());
    RoutingContext::build(net, params, xpm, net.name(), default_k_overrides(), 9)
}

fn assert_route(net: &Network, path: &CandidatePath, src: usize, dest: usize, label: &str) {
    assert_eq!(path.routers.first(), Some(&src), "{}", label);
    assert_eq!(path.routers.last(), Some(&dest), "{}", label);
    let mut seen = path.routers.clone();
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len(), path.routers.len(), "{}: loop in {:?}", label, path.routers);
    assert!(
        path_edges(net, &path.routers).is_some(),
        "{}: {:?} is not a path",
        label,
        path.routers
    );
}

#[test]
fn test_every_routing_kind_returns_valid_paths() {
    let net = nsf_like();
    let ctx = context(&net, params());
    let mut rng = ChaCha8Rng::seed_from_u64(1);

    for kind in RoutingKind::ALL {
        let mut algo = routing_by_kind(kind);
        assert_eq!(algo.kind(), kind);
        for (src, dest) in [(0, 7), (2, 6), (7, 1)] {
            let paths = algo.compute_paths(&RouteRequest { src, dest, k: 3 }, &net, &ctx, &mut rng);
            let viable: Vec<_> = paths.iter().filter(|p| p.is_viable()).collect();
            assert!(!viable.is_empty(), "{} found nothing for {}->{}", kind.name(), src, dest);
            for path in viable {
                assert_route(&net, path, src, dest, kind.name());
            }
        }
    }
}

#[test]
fn test_impairment_aware_slots_follow_free_waves() {
    let mut net = nsf_like();
    let ctx = context(&net, params());
    let direct = net.edge_between(0, 1).unwrap();
    for wave in [0, 2, 4] {
        net.set_used(direct, wave, 100 + wave as u64).unwrap();
    }

    let mut ia = routing_by_kind(RoutingKind::ImpairmentAware);
    let paths = ia.compute_paths(
        &RouteRequest { src: 0, dest: 1, k: 1 },
        &net,
        &ctx,
        &mut ChaCha8Rng::seed_from_u64(0),
    );
    assert_eq!(paths.len(), net.wavelength_count());
    for (wave, path) in paths.iter().enumerate() {
        let edges = path_edges(&net, &path.routers).unwrap();
        assert!(edges.iter().all(|&e| net.wave_status(e, wave).is_free()));
        if wave % 2 == 1 {
            assert_eq!(path.routers, vec![0, 1]);
        } else {
            assert_eq!(path.routers, vec![0, 2, 1]);
        }
    }
}

#[test]
fn test_dynamic_programming_encodes_free_wave() {
    let mut net = nsf_like();
    let ctx = context(&net, params());
    let e = net.edge_between(0, 1).unwrap();
    net.set_used(e, 0, 1).unwrap();

    let mut dp = routing_by_kind(RoutingKind::DynamicProgramming);
    let paths = dp.compute_paths(
        &RouteRequest { src: 0, dest: 3, k: 2 },
        &net,
        &ctx,
        &mut ChaCha8Rng::seed_from_u64(0),
    );
    let viable: Vec<_> = paths.iter().filter(|p| p.is_viable()).collect();
    assert!(!viable.is_empty());
    for path in viable {
        assert_route(&net, path, 0, 3, "DP");
        let wave = path.cost as usize;
        assert!(wave < net.wavelength_count());
        let edges = path_edges(&net, &path.routers).unwrap();
        assert!(edges.iter().all(|&e| net.wave_status(e, wave).is_free()));
    }
}

#[test]
fn test_wavelength_strategies_pick_free_waves() {
    let mut net = nsf_like();
    let ctx = context(&net, params());
    let path = path_edges(&net, &[0, 1, 3]).unwrap();
    net.set_used(path[0], 0, 1).unwrap();
    net.set_used(path[1], 1, 2).unwrap();

    for kind in WavelengthKind::ALL {
        let strategy = wavelength_by_kind(kind);
        let selection = WaveSelection {
            src: 0,
            dest: 3,
            path: &path,
            quality_aware: false,
        };
        match strategy.choose(&selection, &net, &ctx) {
            Ok(wave) => {
                assert!(wave >= 2, "{} picked busy wave {}", kind.name(), wave);
                assert!(path.iter().all(|&e| net.wave_status(e, wave).is_free()));
            }
            // LQ and MQ always apply the threshold.
            Err(Failure::Quality) => {
                assert!(matches!(kind, WavelengthKind::LeastQuality | WavelengthKind::MostQuality))
            }
            Err(other) => panic!("{} failed with {:?}", kind.name(), other),
        }
    }

    assert_eq!(
        wavelength_by_kind(WavelengthKind::FirstFit)
            .choose(
                &WaveSelection {
                    src: 0,
                    dest: 3,
                    path: &path,
                    quality_aware: false
                },
                &net,
                &ctx
            )
            .unwrap(),
        2
    );
}

#[test]
fn test_full_path_is_no_path() {
    let mut net = nsf_like();
    let ctx = context(&net, params());
    let path = path_edges(&net, &[6, 7]).unwrap();
    for wave in 0..net.wavelength_count() {
        net.set_used(path[0], wave, wave as u64).unwrap();
    }
    for kind in WavelengthKind::ALL {
        let selection = WaveSelection {
            src: 6,
            dest: 7,
            path: &path,
            quality_aware: true,
        };
        assert_eq!(
            wavelength_by_kind(kind).choose(&selection, &net, &ctx),
            Err(Failure::NoPath),
            "{}",
            kind.name()
        );
    }
}

#[test]
fn test_unreachable_threshold_is_quality_failure() {
    let net = nsf_like();
    let strict = QualityParams {
        q_factor_factor: 3.0,
        ..params()
    };
    let ctx = context(&net, strict);
    let path = path_edges(&net, &[6, 7]).unwrap();
    for kind in [
        WavelengthKind::FirstFit,
        WavelengthKind::QualFirstFit,
        WavelengthKind::QualRandomPick,
        WavelengthKind::MostQuality,
    ] {
        let gated = WaveSelection {
            src: 6,
            dest: 7,
            path: &path,
            quality_aware: true,
        };
        assert_eq!(
            wavelength_by_kind(kind).choose(&gated, &net, &ctx),
            Err(Failure::Quality),
            "{}",
            kind.name()
        );
    }
    let ungated = WaveSelection {
        src: 6,
        dest: 7,
        path: &path,
        quality_aware: false,
    };
    assert_eq!(
        wavelength_by_kind(WavelengthKind::FirstFit).choose(&ungated, &net, &ctx),
        Ok(0)
    );
}

#[test]
fn test_adaptive_qos_counts_quality_failures() {
    let net = nsf_like();
    let strict = QualityParams {
        q_factor_factor: 3.0,
        ..params()
    };
    let ctx = Arc::new(context(&net, strict));
    let settings = RunSettings {
        routing: RoutingKind::AdaptiveQos,
        wavelength: WavelengthKind::FirstFit,
        probe_style: ProbeStyle::Serial,
        quality_aware: true,
        workstations: 1,
        max_probes: 3,
        seed: 4,
    };
    let mut engine = SimulationEngine::new(net, ctx, settings).unwrap();
    let requests = (0..4)
        .map(|i| {
            (
                i as f64,
                ConnectionRequest {
                    session: i,
                    src: 0,
                    dest: 7,
                    workstation: None,
                    duration: Some(1.0),
                },
            )
        })
        .collect();
    engine.load_requests(requests).unwrap();
    let metrics = engine.run().unwrap();

    assert_eq!(metrics.stats.quality_failures, 4);
    assert_eq!(metrics.quality_rate, 1.0);
    assert_eq!(engine.network().failure_counts(0).quality, 4);
    assert_eq!(engine.network().failure_counts(0).wavelength, 0);
    // SERIAL tried every candidate before giving up.
    assert!(metrics.probes_per_request > 1.0);
}

#[test]
fn test_ant_colony_is_reproducible() {
    let net = nsf_like();
    let ctx = context(&net, params());
    for kind in [RoutingKind::AntColony, RoutingKind::MaxMinAntColony] {
        let request = RouteRequest { src: 0, dest: 7, k: 3 };
        let a = routing_by_kind(kind).compute_paths(&request, &net, &ctx, &mut ChaCha8Rng::seed_from_u64(5));
        let b = routing_by_kind(kind).compute_paths(&request, &net, &ctx, &mut ChaCha8Rng::seed_from_u64(5));
        assert_eq!(a, b, "{}", kind.name());
    }
}
