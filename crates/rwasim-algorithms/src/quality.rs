//! Physical-layer quality model.
//!
//! A lightpath's Q-factor is `10·log10(P / sqrt(ASE + XPM + FWM))`:
//!
//! - **ASE** grows linearly with the number of amplified spans.
//! - **XPM** adds, for every other wavelength inside the nonlinear window,
//!   a table coefficient times the squared length of each stretch where
//!   that wavelength is co-routed by a single session.
//! - **FWM** adds, for every frequency triple mixing onto the probe
//!   frequency, a closed-form term over each stretch where all three
//!   wavelengths are co-routed by unchanged sessions.

use crate::traits::{EdgeId, NetworkView};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Planck's constant (J·s).
pub const PLANCK: f64 = 6.6260689633e-34;
/// Speed of light in vacuum (m/s).
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;
/// Value of `c` used by the four-wave-mixing phase-matching model.
const FWM_SPEED_OF_LIGHT: f64 = 2.99792457778e8;

/// How traffic destinations are drawn for a source router.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationDistribution {
    /// Every other router is equally likely.
    #[default]
    Uniform,
    /// Weighted by shortest-path span count.
    Distance,
    /// Weighted by the inverse of the shortest-path span count.
    InverseDistance,
}

/// Physical constants and per-algorithm tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityParams {
    /// Mean request inter-arrival time per workstation (s).
    pub arrival_interval: f64,
    /// Mean connection holding time (s).
    pub duration: f64,
    /// Wavelengths within this index distance interact nonlinearly.
    pub nonlinear_halfwin: usize,
    /// The grid carries `2 * halfwavelength + 1` wavelengths.
    pub halfwavelength: usize,
    /// Centre frequency (Hz).
    pub fc: f64,
    /// Channel spacing (Hz).
    pub f_step: f64,
    /// Launch power per channel (W).
    pub channel_power: f64,
    /// Span length (km).
    pub span_length: f64,
    /// Fibre attenuation (dB/km).
    pub alpha_db: f64,
    /// Chromatic dispersion.
    pub dispersion: f64,
    /// Dispersion slope.
    pub dispersion_slope: f64,
    /// Nonlinear coefficient.
    pub gamma: f64,
    /// Scales the derived Q-factor threshold.
    pub q_factor_factor: f64,
    /// EDFA noise figure (dB).
    pub edfa_noise_figure: f64,
    /// EDFA gain (dB).
    pub edfa_gain: f64,
    /// Optical noise bandwidth (Hz).
    pub bandwidth: f64,
    /// Period of LORA/PABR usage updates (s).
    pub usage_update_interval: f64,
    /// LORA cost base.
    pub beta: f64,
    pub refractive_index: f64,
    /// Track per-connection Q-factor time series.
    pub q_factor_stats: bool,
    /// Log one line per established connection.
    pub detailed_log: bool,
    pub dest_dist: DestinationDistribution,
    /// Quality/length trade-off for DP and ACO scoring.
    pub dp_alpha: f64,
    pub aco_ants: usize,
    pub aco_alpha: f64,
    pub aco_beta: f64,
    pub aco_rho: f64,
    /// MM-ACO pheromone floor.
    pub mm_aco_gamma: f64,
    pub aco_iterations: usize,
    pub mm_aco_resets: usize,
}

impl Default for QualityParams {
    fn default() -> Self {
        Self {
            arrival_interval: 15.0,
            duration: 10.0,
            nonlinear_halfwin: 2,
            halfwavelength: 4,
            fc: 193.1e12,
            f_step: 50e9,
            channel_power: 1e-3,
            span_length: 70.0,
            alpha_db: 0.2,
            dispersion: 3.8e-6,
            dispersion_slope: 8e1,
            gamma: 1.3e-3,
            q_factor_factor: 0.9,
            edfa_noise_figure: 5.0,
            edfa_gain: 20.0,
            bandwidth: 10e9,
            usage_update_interval: 10.0,
            beta: 2.0,
            refractive_index: 1.5,
            q_factor_stats: false,
            detailed_log: false,
            dest_dist: DestinationDistribution::Uniform,
            dp_alpha: 0.5,
            aco_ants: 10,
            aco_alpha: 1.0,
            aco_beta: 1.0,
            aco_rho: 0.1,
            mm_aco_gamma: 0.05,
            aco_iterations: 5,
            mm_aco_resets: 1,
        }
    }
}

impl QualityParams {
    pub fn wavelength_count(&self) -> usize {
        2 * self.halfwavelength + 1
    }

    /// Attenuation in 1/km.
    pub fn alpha(&self) -> f64 {
        self.alpha_db * 0.1 / std::f64::consts::E.log10()
    }

    /// Carrier frequency of wavelength `wave`.
    pub fn frequency(&self, wave: usize) -> f64 {
        self.fc + (wave as f64 - self.halfwavelength as f64) * self.f_step
    }

    /// Per-span amplifier noise for each wavelength.
    pub fn ase_per_span(&self) -> Vec<f64> {
        let noise_factor = 10f64.powf(self.edfa_noise_figure / 10.0);
        let gain = 10f64.powf(self.edfa_gain / 10.0);
        (0..self.wavelength_count())
            .map(|w| {
                2.0 * self.channel_power
                    * noise_factor
                    * PLANCK
                    * self.frequency(w)
                    * (gain - 1.0)
                    * self.bandwidth
            })
            .collect()
    }

    /// Seconds for light to cross `spans` spans of fibre.
    pub fn propagation_delay(&self, spans: u32) -> f64 {
        spans as f64 * self.span_length * 1000.0 / (SPEED_OF_LIGHT / self.refractive_index)
    }

    pub fn q_from_noise(&self, noise: f64) -> f64 {
        10.0 * (self.channel_power / noise.sqrt()).log10()
    }

    /// Check physical plausibility; returns a description of the first problem.
    pub fn validate(&self) -> Result<(), String> {
        let positive = [
            ("arrival_interval", self.arrival_interval),
            ("duration", self.duration),
            ("f_step", self.f_step),
            ("channel_power", self.channel_power),
            ("span_length", self.span_length),
            ("refractive_index", self.refractive_index),
            ("bandwidth", self.bandwidth),
            ("usage_update_interval", self.usage_update_interval),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(format!("{} must be > 0", name));
            }
        }
        if !(0.0..=1.0).contains(&self.dp_alpha) {
            return Err("dp_alpha must be within [0, 1]".to_string());
        }
        if !(0.0..=1.0).contains(&self.aco_rho) {
            return Err("aco_rho must be within [0, 1]".to_string());
        }
        if self.aco_ants == 0 {
            return Err("aco_ants must be > 0".to_string());
        }
        if self.mm_aco_gamma > 1.0 {
            return Err("mm_aco_gamma must not exceed the pheromone ceiling of 1.0".to_string());
        }
        Ok(())
    }
}

/// Square matrix of XPM coefficients indexed by (probe wave, interfering wave).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XpmTable {
    size: usize,
    coefficients: Vec<f64>,
}

impl XpmTable {
    /// A table with every coefficient zero.
    pub fn zeros(size: usize) -> Self {
        Self {
            size,
            coefficients: vec![0.0; size * size],
        }
    }

    /// Build from row-major nested rows; every row must have `rows.len()` entries.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, String> {
        let size = rows.len();
        let mut coefficients = Vec::with_capacity(size * size);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != size {
                return Err(format!(
                    "XPM row {} has {} entries, expected {}",
                    i,
                    row.len(),
                    size
                ));
            }
            coefficients.extend(row);
        }
        Ok(Self { size, coefficients })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, lambda: usize, wave: usize) -> f64 {
        self.coefficients[lambda * self.size + wave]
    }
}

/// Frequency triple (by wave index) whose mixing product lands on a probe
/// wavelength, with its degeneracy factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FwmTriple {
    pub i: usize,
    pub j: usize,
    pub k: usize,
    pub degeneracy: u8,
}

/// All non-degenerate triples `f_i + f_j - f_k = f_lambda` inside the
/// nonlinear window around `lambda`, with `i <= j`.
pub fn fwm_triples(lambda: usize, wave_count: usize, halfwin: usize) -> Vec<FwmTriple> {
    let window: Vec<usize> = (0..wave_count)
        .filter(|&w| w.abs_diff(lambda) <= halfwin)
        .collect();
    let target = lambda as i64;
    let mut triples: Vec<FwmTriple> = Vec::new();

    for &a in &window {
        for &b in &window {
            for &c in &window {
                let (a, b, c) = (a as i64, b as i64, c as i64);
                let (fi, fj, fk) = if -a + b + c == target {
                    (b, c, a)
                } else if a - b + c == target {
                    (a, c, b)
                } else if a + b - c == target {
                    (a, b, c)
                } else {
                    continue;
                };
                // SPM and XPM terms are not four-wave mixing
                if fi == fk || fj == fk {
                    continue;
                }
                let degeneracy = if fi == fj { 3 } else { 6 };
                let triple = FwmTriple {
                    i: fi.min(fj) as usize,
                    j: fi.max(fj) as usize,
                    k: fk as usize,
                    degeneracy,
                };
                if !triples
                    .iter()
                    .any(|t| t.i == triple.i && t.j == triple.j && t.k == triple.k)
                {
                    triples.push(triple);
                }
            }
        }
    }
    triples
}

/// Noise contributions behind one Q-factor estimate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Noise {
    pub ase: f64,
    pub xpm: f64,
    pub fwm: f64,
}

impl Noise {
    pub fn total(&self) -> f64 {
        self.ase + self.xpm + self.fwm
    }
}

/// Q-factor and the noise breakdown it was computed from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityEstimate {
    pub q_factor: f64,
    pub noise: Noise,
}

/// Precomputed tables for estimating lightpath quality.
#[derive(Debug, Clone)]
pub struct QualityEstimator {
    params: QualityParams,
    ase: Vec<f64>,
    frequencies: Vec<f64>,
    xpm: XpmTable,
    triples: Vec<Vec<FwmTriple>>,
}

impl QualityEstimator {
    /// Panics if the XPM table does not match the wavelength grid.
    pub fn new(params: QualityParams, xpm: XpmTable) -> Self {
        let n = params.wavelength_count();
        assert_eq!(xpm.size(), n, "XPM table must be {}x{}", n, n);
        let triples = (0..n)
            .map(|w| fwm_triples(w, n, params.nonlinear_halfwin))
            .collect();
        Self {
            ase: params.ase_per_span(),
            frequencies: (0..n).map(|w| params.frequency(w)).collect(),
            params,
            xpm,
            triples,
        }
    }

    pub fn params(&self) -> &QualityParams {
        &self.params
    }

    pub fn ase_per_span(&self, wave: usize) -> f64 {
        self.ase[wave]
    }

    pub fn triples(&self, wave: usize) -> &[FwmTriple] {
        &self.triples[wave]
    }

    /// Estimate the Q-factor of `lambda` over `path` given current occupancy.
    pub fn estimate(
        &self,
        lambda: usize,
        path: &[EdgeId],
        net: &dyn NetworkView,
    ) -> QualityEstimate {
        let noise = Noise {
            ase: self.ase_noise(lambda, path, net),
            xpm: self.xpm_noise(lambda, path, net),
            fwm: self.fwm_noise(lambda, path, net),
        };
        QualityEstimate {
            q_factor: self.params.q_from_noise(noise.total()),
            noise,
        }
    }

    pub fn q_factor(&self, lambda: usize, path: &[EdgeId], net: &dyn NetworkView) -> f64 {
        self.estimate(lambda, path, net).q_factor
    }

    pub fn ase_noise(&self, lambda: usize, path: &[EdgeId], net: &dyn NetworkView) -> f64 {
        let spans: u32 = path.iter().map(|&e| net.edge(e).spans).sum();
        spans as f64 * self.ase[lambda]
    }

    pub fn xpm_noise(&self, lambda: usize, path: &[EdgeId], net: &dyn NetworkView) -> f64 {
        let halfwin = self.params.nonlinear_halfwin;
        let mut noise = 0.0;
        for wave in 0..net.wavelength_count() {
            if wave == lambda || wave.abs_diff(lambda) > halfwin {
                continue;
            }
            let coefficient = self.xpm.get(lambda, wave);
            for run in co_routed_runs(path, net, |edge| net.wave_status(edge, wave).is_used(), &[wave]) {
                noise += coefficient * (run as f64) * (run as f64);
            }
        }
        noise
    }

    pub fn fwm_noise(&self, lambda: usize, path: &[EdgeId], net: &dyn NetworkView) -> f64 {
        let mut noise = 0.0;
        for triple in &self.triples[lambda] {
            let waves = [triple.i, triple.j, triple.k];
            let lit = |edge: EdgeId| {
                waves
                    .iter()
                    .all(|&w| w == lambda || net.wave_status(edge, w).is_used())
            };
            for run in co_routed_runs(path, net, lit, &waves) {
                noise += self.fwm_term(run, triple, lambda);
            }
        }
        2.0 * self.params.channel_power * noise
    }

    fn fwm_term(&self, spans: u32, triple: &FwmTriple, lambda: usize) -> f64 {
        let p = &self.params;
        let f = self.frequencies[lambda];
        let fi = self.frequencies[triple.i];
        let fj = self.frequencies[triple.j];
        let power = |wave: usize| {
            if wave == lambda {
                p.channel_power
            } else {
                0.5 * p.channel_power
            }
        };
        let alpha = p.alpha();
        let lambda_c = FWM_SPEED_OF_LIGHT / f;
        let walk_off = lambda_c * lambda_c / FWM_SPEED_OF_LIGHT;
        let spacing = 2.0 * PI * walk_off * (fi - f) * (fj - f);
        let slope = walk_off * (fi / 2.0 + fj / 2.0 - f) * p.dispersion_slope;

        let diff_kappa = spacing * (p.dispersion - slope);
        let diff_phi = spacing * (-slope) * p.span_length;
        let l = p.span_length;
        let leff_square = (1.0 + (-2.0 * alpha * l).exp()
            - 2.0 * (-alpha * l).exp() * (diff_kappa * l).cos())
            / (alpha * alpha + diff_kappa * diff_kappa);
        let d = triple.degeneracy as f64;
        let base = p.gamma * p.gamma * d * d / 9.0
            * power(triple.i)
            * power(triple.j)
            * power(triple.k)
            * leff_square;

        let wdm = if diff_phi.cos() != 1.0 {
            (1.0 - (diff_phi * spans as f64).cos()) / (1.0 - diff_phi.cos())
        } else {
            (spans as f64) * (spans as f64)
        };
        base * wdm
    }
}

/// Span lengths of the maximal stretches of `path` where `lit` holds on
/// every edge and each wave in `waves` keeps the same session from one
/// edge to the next.
fn co_routed_runs<F>(path: &[EdgeId], net: &dyn NetworkView, lit: F, waves: &[usize]) -> Vec<u32>
where
    F: Fn(EdgeId) -> bool,
{
    let mut runs = Vec::new();
    let mut index = 0;
    while index < path.len() {
        let mut run = 0u32;
        let mut j = index;
        while j < path.len() && lit(path[j]) {
            if run > 0 {
                let continuous = waves.iter().all(|&w| {
                    net.wave_status(path[j - 1], w).session()
                        == net.wave_status(path[j], w).session()
                });
                if !continuous {
                    break;
                }
            }
            run += net.edge(path[j]).spans;
            j += 1;
        }
        if run == 0 {
            index += 1;
        } else {
            runs.push(run);
            index = j;
        }
    }
    runs
}
