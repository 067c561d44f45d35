/// Integration tests for the physical-layer quality estimator.
use proptest::prelude::*;
use rwasim_algorithms::*;
use rwasim_core::Network;

fn params() -> QualityParams {
    QualityParams {
        halfwavelength: 2,
        ..QualityParams::default()
    }
}

fn xpm(n: usize, value: f64) -> XpmTable {
    XpmTable::from_rows(vec![vec![value; n]; n]).unwrap()
}

fn line(spans: &[u32], waves: usize) -> Network {
    let links: Vec<_> = spans.iter().enumerate().map(|(i, &s)| (i, i + 1, s)).collect();
    Network::new("line", spans.len() + 1, &links, waves).unwrap()
}

fn forward_path(net: &Network, hops: usize) -> Vec<EdgeId> {
    let routers: Vec<RouterId> = (0..=hops).collect();
    path_edges(net, &routers).unwrap()
}

#[test]
fn test_idle_network_is_ase_only() {
    let p = params();
    let estimator = QualityEstimator::new(p.clone(), xpm(p.wavelength_count(), 1e-9));
    let net = line(&[2, 3], p.wavelength_count());
    let path = forward_path(&net, 2);
    let estimate = estimator.estimate(2, &path, &net);

    assert_eq!(estimate.noise.xpm, 0.0);
    assert_eq!(estimate.noise.fwm, 0.0);
    assert!((estimate.noise.ase - 5.0 * estimator.ase_per_span(2)).abs() < 1e-24);
    assert!((estimate.q_factor - p.q_from_noise(estimate.noise.ase)).abs() < 1e-12);
}

#[test]
fn test_neighbour_in_window_adds_xpm() {
    let p = params();
    let estimator = QualityEstimator::new(p.clone(), xpm(p.wavelength_count(), 1e-9));
    let mut net = line(&[2, 3], p.wavelength_count());
    let path = forward_path(&net, 2);
    let idle = estimator.q_factor(2, &path, &net);

    // Wave 3 on both edges by one session: one co-routed run of 5 spans.
    for &e in &path {
        net.set_used(e, 3, 1).unwrap();
    }
    let busy = estimator.estimate(2, &path, &net);
    assert!((busy.noise.xpm - 1e-9 * 25.0).abs() < 1e-18);
    assert!(busy.q_factor < idle);

    // A different session on the second edge splits the run.
    net.set_free(path[1], 3).unwrap();
    net.set_used(path[1], 3, 2).unwrap();
    let split = estimator.estimate(2, &path, &net);
    assert!((split.noise.xpm - 1e-9 * (4.0 + 9.0)).abs() < 1e-18);
}

#[test]
fn test_wave_outside_window_is_ignored() {
    let p = QualityParams {
        nonlinear_halfwin: 1,
        ..params()
    };
    let estimator = QualityEstimator::new(p.clone(), xpm(p.wavelength_count(), 1e-9));
    let mut net = line(&[4], p.wavelength_count());
    let path = forward_path(&net, 1);
    net.set_used(path[0], 4, 1).unwrap();
    assert_eq!(estimator.estimate(2, &path, &net).noise.xpm, 0.0);
}

#[test]
fn test_fwm_needs_co_routed_pumps() {
    let p = params();
    let estimator = QualityEstimator::new(p.clone(), XpmTable::zeros(p.wavelength_count()));
    let mut net = line(&[3], p.wavelength_count());
    let path = forward_path(&net, 1);
    // f1 + f3 - f2 = f2: waves 1 and 3 around probe 2.
    net.set_used(path[0], 1, 10).unwrap();
    assert_eq!(estimator.estimate(2, &path, &net).noise.fwm, 0.0);
    net.set_used(path[0], 3, 11).unwrap();
    assert!(estimator.estimate(2, &path, &net).noise.fwm > 0.0);
}

proptest! {
    #[test]
    fn prop_q_falls_with_distance(a in 1u32..40, extra in 1u32..40, wave in 0usize..5) {
        let p = params();
        let estimator = QualityEstimator::new(p.clone(), XpmTable::zeros(p.wavelength_count()));
        let short = line(&[a], p.wavelength_count());
        let long = line(&[a, extra], p.wavelength_count());
        let q_short = estimator.q_factor(wave, &forward_path(&short, 1), &short);
        let q_long = estimator.q_factor(wave, &forward_path(&long, 2), &long);
        prop_assert!(q_long < q_short);
    }

    #[test]
    fn prop_longer_co_routed_run_never_lowers_noise(
        spans in prop::collection::vec(1u32..6, 2..7),
        start in 0usize..6,
        neighbour in 0usize..5,
        probe in 0usize..5,
    ) {
        prop_assume!(neighbour != probe);
        let p = params();
        let estimator = QualityEstimator::new(p.clone(), xpm(p.wavelength_count(), 1e-10));
        let mut net = line(&spans, p.wavelength_count());
        let path = forward_path(&net, spans.len());
        let start = start % path.len();

        let mut previous = estimator.estimate(probe, &path, &net).noise;
        for &e in &path[start..] {
            net.set_used(e, neighbour, 9).unwrap();
            let noise = estimator.estimate(probe, &path, &net).noise;
            prop_assert!(noise.xpm >= previous.xpm);
            prop_assert!(noise.total() >= previous.total());
            previous = noise;
        }
    }

    #[test]
    fn prop_occupancy_never_improves_q(
        spans in prop::collection::vec(1u32..6, 1..5),
        busy in prop::collection::vec((0usize..5, 0usize..5), 0..12),
        probe in 0usize..5,
    ) {
        let p = params();
        let estimator = QualityEstimator::new(p.clone(), xpm(p.wavelength_count(), 1e-10));
        let mut net = line(&spans, p.wavelength_count());
        let path = forward_path(&net, spans.len());
        let idle = estimator.q_factor(probe, &path, &net);
        for (i, &(hop, wave)) in busy.iter().enumerate() {
            let e = path[hop % path.len()];
            if wave != probe && net.wave_status(e, wave).is_free() {
                net.set_used(e, wave, i as u64).unwrap();
            }
        }
        prop_assert!(estimator.q_factor(probe, &path, &net) <= idle);
    }
}
