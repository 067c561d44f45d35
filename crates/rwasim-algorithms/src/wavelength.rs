//! Wavelength-assignment strategies.
//!
//! Every strategy starts from the mask of wavelengths free on the whole
//! path. A base [`Picker`] decides the visiting order; strategies differ in
//! how the quality gate is applied:
//!
//! | Strategy            | Quality gate                                 |
//! |---------------------|----------------------------------------------|
//! | FF, FFwO, RP, MU, BF | once on the pick, only when quality-aware   |
//! | Q-FF, Q-FFwO, Q-RP, Q-MU | retry the picker until one passes       |
//! | LQ, MQ              | scan all free waves, take the extremal Q     |
//!
//! An empty mask is [`Failure::NoPath`]; a free wave that fails the gate is
//! [`Failure::Quality`].

use crate::context::RoutingContext;
use crate::traits::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Base order in which free wavelengths are considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Picker {
    /// Lowest index first.
    FirstFit,
    /// The context's max-spread ordering.
    Ordered,
    /// Uniform among the free waves, seeded from the request.
    Random,
    /// The wave used on the most edges network-wide.
    MostUsed,
}

impl Picker {
    pub fn pick(
        &self,
        available: &[bool],
        selection: &WaveSelection<'_>,
        net: &dyn NetworkView,
        ctx: &RoutingContext,
    ) -> Option<usize> {
        match self {
            Picker::FirstFit => available.iter().position(|&free| free),
            Picker::Ordered => ctx
                .wave_ordering
                .iter()
                .copied()
                .find(|&w| available.get(w).copied().unwrap_or(false)),
            Picker::Random => {
                let free: Vec<usize> = (0..available.len()).filter(|&w| available[w]).collect();
                if free.is_empty() {
                    return None;
                }
                let seed = ctx
                    .seed
                    .wrapping_mul(selection.src as u64)
                    .wrapping_mul(selection.dest as u64)
                    .wrapping_mul(free.len() as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                Some(free[rng.gen_range(0..free.len())])
            }
            Picker::MostUsed => {
                let mut best: Option<(usize, usize)> = None;
                for w in (0..available.len()).filter(|&w| available[w]) {
                    let used = net.edges_using_wave(w);
                    if best.map_or(true, |(_, most)| used > most) {
                        best = Some((w, used));
                    }
                }
                best.map(|(w, _)| w)
            }
        }
    }
}

fn passes(wave: usize, selection: &WaveSelection<'_>, net: &dyn NetworkView, ctx: &RoutingContext) -> bool {
    ctx.estimator.q_factor(wave, selection.path, net) >= ctx.th_q
}

/// FF, FFwO, RP, MU and BF: pick once, gate only when quality-aware.
pub struct PlainWavelength {
    kind: WavelengthKind,
    picker: Picker,
}

impl PlainWavelength {
    pub fn new(kind: WavelengthKind, picker: Picker) -> Self {
        Self { kind, picker }
    }
}

impl WavelengthAlgorithm for PlainWavelength {
    fn choose(
        &self,
        selection: &WaveSelection<'_>,
        net: &dyn NetworkView,
        ctx: &RoutingContext,
    ) -> Result<usize, Failure> {
        let available = free_waves(net, selection.path);
        let wave = self
            .picker
            .pick(&available, selection, net, ctx)
            .ok_or(Failure::NoPath)?;
        if selection.quality_aware && !passes(wave, selection, net, ctx) {
            return Err(Failure::Quality);
        }
        Ok(wave)
    }

    fn kind(&self) -> WavelengthKind {
        self.kind
    }
}

/// Q-FF, Q-FFwO, Q-RP and Q-MU: keep picking until a wave passes the gate.
pub struct QualityGated {
    kind: WavelengthKind,
    picker: Picker,
}

impl QualityGated {
    pub fn new(kind: WavelengthKind, picker: Picker) -> Self {
        Self { kind, picker }
    }
}

impl WavelengthAlgorithm for QualityGated {
    fn choose(
        &self,
        selection: &WaveSelection<'_>,
        net: &dyn NetworkView,
        ctx: &RoutingContext,
    ) -> Result<usize, Failure> {
        let mut available = free_waves(net, selection.path);
        let mut rejected = false;
        while let Some(wave) = self.picker.pick(&available, selection, net, ctx) {
            if passes(wave, selection, net, ctx) {
                return Ok(wave);
            }
            log::trace!("{}: wave {} below threshold", self.kind.name(), wave);
            available[wave] = false;
            rejected = true;
        }
        Err(if rejected { Failure::Quality } else { Failure::NoPath })
    }

    fn kind(&self) -> WavelengthKind {
        self.kind
    }
}

/// LQ and MQ: the free wave with the smallest (or largest) qualifying Q.
pub struct ExtremalQuality {
    most: bool,
}

impl ExtremalQuality {
    pub fn least() -> Self {
        Self { most: false }
    }

    pub fn most() -> Self {
        Self { most: true }
    }
}

impl WavelengthAlgorithm for ExtremalQuality {
    fn choose(
        &self,
        selection: &WaveSelection<'_>,
        net: &dyn NetworkView,
        ctx: &RoutingContext,
    ) -> Result<usize, Failure> {
        let available = free_waves(net, selection.path);
        if !available.iter().any(|&free| free) {
            return Err(Failure::NoPath);
        }
        let mut best: Option<(usize, f64)> = None;
        for wave in (0..available.len()).filter(|&w| available[w]) {
            let q = ctx.estimator.q_factor(wave, selection.path, net);
            if q < ctx.th_q {
                continue;
            }
            let better = match best {
                None => true,
                Some((_, current)) if self.most => q > current,
                Some((_, current)) => q < current,
            };
            if better {
                best = Some((wave, q));
            }
        }
        best.map(|(wave, _)| wave).ok_or(Failure::Quality)
    }

    fn kind(&self) -> WavelengthKind {
        if self.most {
            WavelengthKind::MostQuality
        } else {
            WavelengthKind::LeastQuality
        }
    }
}

/// Build the strategy for a kind.
pub fn wavelength_by_kind(kind: WavelengthKind) -> Box<dyn WavelengthAlgorithm> {
    match kind {
        WavelengthKind::FirstFit | WavelengthKind::BestFit => {
            Box::new(PlainWavelength::new(kind, Picker::FirstFit))
        }
        WavelengthKind::FirstFitOrdered => Box::new(PlainWavelength::new(kind, Picker::Ordered)),
        WavelengthKind::RandomPick => Box::new(PlainWavelength::new(kind, Picker::Random)),
        WavelengthKind::MostUsed => Box::new(PlainWavelength::new(kind, Picker::MostUsed)),
        WavelengthKind::QualFirstFit => Box::new(QualityGated::new(kind, Picker::FirstFit)),
        WavelengthKind::QualFirstFitOrdered => Box::new(QualityGated::new(kind, Picker::Ordered)),
        WavelengthKind::QualRandomPick => Box::new(QualityGated::new(kind, Picker::Random)),
        WavelengthKind::QualMostUsed => Box::new(QualityGated::new(kind, Picker::MostUsed)),
        WavelengthKind::LeastQuality => Box::new(ExtremalQuality::least()),
        WavelengthKind::MostQuality => Box::new(ExtremalQuality::most()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TestNetwork;

    fn select(path: &[EdgeId], quality_aware: bool) -> WaveSelection<'_> {
        WaveSelection {
            src: 0,
            dest: 1,
            path,
            quality_aware,
        }
    }

    #[test]
    fn test_first_fit_skips_used() {
        let mut net = TestNetwork::line(&[1, 1], 5);
        let ctx = TestNetwork::context(&net);
        net.occupy(1, 0, 3);
        let ff = wavelength_by_kind(WavelengthKind::FirstFit);
        assert_eq!(ff.choose(&select(&[0, 1], false), &net, &ctx), Ok(1));
    }

    #[test]
    fn test_no_free_wave_is_no_path() {
        let mut net = TestNetwork::line(&[1], 1);
        let ctx = TestNetwork::context(&net);
        net.occupy(0, 0, 1);
        for kind in WavelengthKind::ALL {
            let algo = wavelength_by_kind(kind);
            assert_eq!(
                algo.choose(&select(&[0], true), &net, &ctx),
                Err(Failure::NoPath),
                "{}",
                kind.name()
            );
        }
    }

    #[test]
    fn test_ordered_follows_spread() {
        let mut net = TestNetwork::line(&[1], 5);
        let ctx = TestNetwork::context(&net);
        let ffwo = wavelength_by_kind(WavelengthKind::FirstFitOrdered);
        assert_eq!(ffwo.choose(&select(&[0], false), &net, &ctx), Ok(0));
        net.occupy(0, 0, 1);
        assert_eq!(ffwo.choose(&select(&[0], false), &net, &ctx), Ok(4));
        net.occupy(0, 4, 2);
        assert_eq!(ffwo.choose(&select(&[0], false), &net, &ctx), Ok(2));
    }

    #[test]
    fn test_random_pick_is_deterministic_and_free() {
        let mut net = TestNetwork::line(&[1], 5);
        let ctx = TestNetwork::context(&net);
        net.occupy(0, 1, 1);
        let rp = wavelength_by_kind(WavelengthKind::RandomPick);
        let first = rp.choose(&select(&[0], false), &net, &ctx);
        let second = rp.choose(&select(&[0], false), &net, &ctx);
        assert_eq!(first, second);
        assert_ne!(first, Ok(1));
    }

    #[test]
    fn test_most_used_prefers_busy_wave() {
        let mut net = TestNetwork::ring(4, 1, 3);
        let ctx = TestNetwork::context(&net);
        let far = net.edge_between(2, 3).unwrap();
        let other = net.edge_between(3, 0).unwrap();
        net.occupy(far, 2, 1);
        net.occupy(other, 2, 2);
        net.occupy(other, 1, 3);
        let path = [net.edge_between(0, 1).unwrap()];
        let mu = wavelength_by_kind(WavelengthKind::MostUsed);
        assert_eq!(mu.choose(&select(&path, false), &net, &ctx), Ok(2));
    }

    #[test]
    fn test_quality_gate_rejects_long_paths() {
        let net = TestNetwork::line(&[1], 3);
        let mut ctx = TestNetwork::context(&net);
        ctx.th_q = f64::INFINITY;
        let path = [0];
        let ff = wavelength_by_kind(WavelengthKind::FirstFit);
        assert_eq!(ff.choose(&select(&path, false), &net, &ctx), Ok(0));
        assert_eq!(ff.choose(&select(&path, true), &net, &ctx), Err(Failure::Quality));
        for kind in [
            WavelengthKind::QualFirstFit,
            WavelengthKind::LeastQuality,
            WavelengthKind::MostQuality,
        ] {
            let algo = wavelength_by_kind(kind);
            assert_eq!(algo.choose(&select(&path, false), &net, &ctx), Err(Failure::Quality));
        }
    }

    #[test]
    fn test_least_and_most_quality() {
        let net = TestNetwork::line(&[2], 5);
        let ctx = TestNetwork::context(&net);
        let path = [0];
        // ASE grows with frequency, so the lowest wave has the best Q
        let mq = wavelength_by_kind(WavelengthKind::MostQuality);
        let lq = wavelength_by_kind(WavelengthKind::LeastQuality);
        assert_eq!(mq.choose(&select(&path, false), &net, &ctx), Ok(0));
        assert_eq!(lq.choose(&select(&path, false), &net, &ctx), Ok(4));
    }
}
