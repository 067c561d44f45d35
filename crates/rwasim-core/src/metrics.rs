//! Statistics collection and reporting for simulation runs.
//!
//! The engine accumulates raw counters in [`GlobalStats`] while a run is
//! active. At deactivation they are turned into a [`RunMetrics`] record:
//! every failure kind as a fraction of requests, and setup and path
//! averages over the successful connections.

use crate::connection::ConnectionSummary;
use rwasim_algorithms::quality::Noise;
use serde::{Deserialize, Serialize};

/// Raw counters for one run. Reset at every activation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalStats {
    pub requests: u64,
    pub successes: u64,
    pub collisions: u64,
    pub no_path_failures: u64,
    pub quality_failures: u64,
    pub probes_sent: u64,
    pub setup_delay_total: f64,
    pub hop_total: u64,
    pub span_total: u64,
    /// Wavelength decisions whose noise was added below.
    pub noise_samples: u64,
    pub ase_total: f64,
    pub fwm_total: f64,
    pub xpm_total: f64,
    /// Wall-clock seconds spent in routing and wavelength selection.
    pub routing_time: f64,

    // Q-factor statistics of torn-down connections
    pub q_connections: u64,
    pub dropped: u64,
    pub initial_q_total: f64,
    pub average_q_total: f64,
    pub time_below_total: f64,
}

impl GlobalStats {
    pub fn record_noise(&mut self, noise: &Noise) {
        self.noise_samples += 1;
        self.ase_total += noise.ase;
        self.fwm_total += noise.fwm;
        self.xpm_total += noise.xpm;
    }

    pub fn fold_connection(&mut self, summary: &ConnectionSummary) {
        self.q_connections += 1;
        self.initial_q_total += summary.initial_q;
        self.average_q_total += summary.average_q;
        self.time_below_total += summary.time_below;
        if summary.dropped {
            self.dropped += 1;
        }
    }

    /// Terminal outcomes seen so far.
    pub fn outcomes(&self) -> u64 {
        self.successes + self.collisions + self.no_path_failures + self.quality_failures
    }
}

/// Identifies one run in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLabel {
    pub routing: String,
    pub wavelength: String,
    pub probe_style: String,
    pub quality_aware: bool,
    pub workstations: usize,
}

impl RunLabel {
    pub fn short(&self) -> String {
        format!(
            "{}/{}/{}{} ws={}",
            self.routing,
            self.wavelength,
            self.probe_style,
            if self.quality_aware { "/QA" } else { "" },
            self.workstations
        )
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetrics {
    pub label: RunLabel,
    pub stats: GlobalStats,

    // Fractions of requests
    pub blocking: f64,
    pub collision_rate: f64,
    pub quality_rate: f64,
    pub no_resource_rate: f64,
    pub probes_per_request: f64,

    // Averages over successful connections
    pub avg_setup_delay: f64,
    pub avg_hops: f64,
    pub avg_spans: f64,

    pub avg_ase: f64,
    pub avg_fwm: f64,
    pub avg_xpm: f64,
    pub avg_routing_time: f64,

    /// Present when Q-factor statistics were collected.
    pub q_factor: Option<QFactorMetrics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QFactorMetrics {
    pub dropped_rate: f64,
    pub blocking_with_dropped: f64,
    pub avg_initial_q: f64,
    pub avg_average_q: f64,
    pub percent_below: f64,
}

fn ratio(num: f64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num / den as f64
    }
}

impl RunMetrics {
    pub fn from_stats(label: RunLabel, stats: GlobalStats, q_factor_stats: bool) -> Self {
        let requests = stats.requests;
        let failures = stats.collisions + stats.no_path_failures + stats.quality_failures;
        let q_factor = q_factor_stats.then(|| QFactorMetrics {
            dropped_rate: ratio(stats.dropped as f64, requests),
            blocking_with_dropped: ratio((failures + stats.dropped) as f64, requests),
            avg_initial_q: ratio(stats.initial_q_total, stats.q_connections),
            avg_average_q: ratio(stats.average_q_total, stats.q_connections),
            percent_below: 100.0 * ratio(stats.time_below_total, stats.q_connections),
        });
        Self {
            label,
            blocking: ratio(failures as f64, requests),
            collision_rate: ratio(stats.collisions as f64, requests),
            quality_rate: ratio(stats.quality_failures as f64, requests),
            no_resource_rate: ratio(stats.no_path_failures as f64, requests),
            probes_per_request: ratio(stats.probes_sent as f64, requests),
            avg_setup_delay: ratio(stats.setup_delay_total, stats.successes),
            avg_hops: ratio(stats.hop_total as f64, stats.successes),
            avg_spans: ratio(stats.span_total as f64, stats.successes),
            avg_ase: ratio(stats.ase_total, stats.noise_samples),
            avg_fwm: ratio(stats.fwm_total, stats.noise_samples),
            avg_xpm: ratio(stats.xpm_total, stats.noise_samples),
            avg_routing_time: ratio(stats.routing_time, requests),
            q_factor,
            stats,
        }
    }

    /// One `info` record per line, as logged at deactivation.
    pub fn log_lines(&self) -> Vec<String> {
        let tag = self.label.short();
        let mut lines = vec![
            format!("{} Requests: {}", tag, self.stats.requests),
            format!("{} Overall Blocking: {:.6}", tag, self.blocking),
            format!("{} Collisions: {:.6}", tag, self.collision_rate),
            format!("{} Bad Quality: {:.6}", tag, self.quality_rate),
            format!("{} Non Resources: {:.6}", tag, self.no_resource_rate),
            format!("{} Avg Probes: {:.6}", tag, self.probes_per_request),
            format!("{} Avg Setup Delay: {:.6}", tag, self.avg_setup_delay),
            format!("{} Avg Hop Count: {:.6}", tag, self.avg_hops),
            format!("{} Avg Span Count: {:.6}", tag, self.avg_spans),
            format!("{} Avg ASE Noise: {:e}", tag, self.avg_ase),
            format!("{} Avg FWM Noise: {:e}", tag, self.avg_fwm),
            format!("{} Avg XPM Noise: {:e}", tag, self.avg_xpm),
            format!("{} Avg Routing Time: {:e}", tag, self.avg_routing_time),
        ];
        if let Some(q) = &self.q_factor {
            lines.push(format!("{} Dropped: {:.6}", tag, q.dropped_rate));
            lines.push(format!(
                "{} Blocking incl. Dropped: {:.6}",
                tag, q.blocking_with_dropped
            ));
            lines.push(format!("{} Initial Q: {:.4}", tag, q.avg_initial_q));
            lines.push(format!("{} Average Q: {:.4}", tag, q.avg_average_q));
            lines.push(format!("{} % Time Below Q: {:.4}", tag, q.percent_below));
        }
        lines
    }
}

/// Format a single run as a human-readable table.
pub fn format_table(metrics: &RunMetrics) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "\n{:=<70}\n",
        format!("  {} Results  ", metrics.label.short())
    ));
    out.push_str(&format!(
        "  Requests: {} | Established: {} | Probes/request: {:.3}\n",
        metrics.stats.requests, metrics.stats.successes, metrics.probes_per_request
    ));
    out.push_str(&format!("{:-<70}\n", "  Blocking  "));
    out.push_str(&format!(
        "  Overall: {:>7.3}%  Collision: {:>7.3}%  Quality: {:>7.3}%  No resources: {:>7.3}%\n",
        metrics.blocking * 100.0,
        metrics.collision_rate * 100.0,
        metrics.quality_rate * 100.0,
        metrics.no_resource_rate * 100.0,
    ));
    out.push_str(&format!("{:-<70}\n", "  Paths  "));
    out.push_str(&format!(
        "  Setup delay: {:.3} ms  Hops: {:.2}  Spans: {:.2}\n",
        metrics.avg_setup_delay * 1000.0,
        metrics.avg_hops,
        metrics.avg_spans,
    ));
    out.push_str(&format!("{:-<70}\n", "  Noise  "));
    out.push_str(&format!(
        "  ASE: {:.3e}  FWM: {:.3e}  XPM: {:.3e}\n",
        metrics.avg_ase, metrics.avg_fwm, metrics.avg_xpm,
    ));
    if let Some(q) = &metrics.q_factor {
        out.push_str(&format!("{:-<70}\n", "  Q-factor  "));
        out.push_str(&format!(
            "  Initial: {:.2} dB  Average: {:.2} dB  Below threshold: {:.2}%  Dropped: {:.3}%\n",
            q.avg_initial_q,
            q.avg_average_q,
            q.percent_below,
            q.dropped_rate * 100.0,
        ));
    }
    out.push_str(&format!(
        "  Routing time: {:.3} us/request\n",
        metrics.avg_routing_time * 1e6
    ));
    out.push_str(&format!("{:=<70}\n", ""));
    out
}

/// Format multiple runs as a comparison table.
pub fn format_comparison_table(results: &[RunMetrics]) -> String {
    if results.is_empty() {
        return String::from("No results to compare.\n");
    }

    let mut out = String::new();
    out.push_str(&format!("\n{:=<96}\n", "  Algorithm Comparison  "));
    out.push_str(&format!(
        "{:<30} {:>8} {:>9} {:>8} {:>8} {:>8} {:>8} {:>8}\n",
        "Run", "Requests", "Blocking%", "Coll%", "Qual%", "NoRes%", "Hops", "Probes"
    ));
    out.push_str(&format!("{:-<96}\n", ""));

    for m in results {
        out.push_str(&format!(
            "{:<30} {:>8} {:>8.3}% {:>7.3}% {:>7.3}% {:>7.3}% {:>8.2} {:>8.2}\n",
            m.label.short(),
            m.stats.requests,
            m.blocking * 100.0,
            m.collision_rate * 100.0,
            m.quality_rate * 100.0,
            m.no_resource_rate * 100.0,
            m.avg_hops,
            m.probes_per_request,
        ));
    }
    out.push_str(&format!("{:=<96}\n", ""));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label() -> RunLabel {
        RunLabel {
            routing: "SP".into(),
            wavelength: "FF".into(),
            probe_style: "single".into(),
            quality_aware: false,
            workstations: 4,
        }
    }

    #[test]
    fn test_rates_are_fractions_of_requests() {
        let stats = GlobalStats {
            requests: 10,
            successes: 6,
            collisions: 1,
            no_path_failures: 2,
            quality_failures: 1,
            probes_sent: 15,
            hop_total: 12,
            setup_delay_total: 0.3,
            ..GlobalStats::default()
        };
        assert_eq!(stats.outcomes(), 10);
        let m = RunMetrics::from_stats(label(), stats, false);
        assert!((m.blocking - 0.4).abs() < 1e-12);
        assert!((m.collision_rate - 0.1).abs() < 1e-12);
        assert!((m.no_resource_rate - 0.2).abs() < 1e-12);
        assert!((m.probes_per_request - 1.5).abs() < 1e-12);
        assert!((m.avg_hops - 2.0).abs() < 1e-12);
        assert!((m.avg_setup_delay - 0.05).abs() < 1e-12);
        assert!(m.q_factor.is_none());
    }

    #[test]
    fn test_empty_run_has_zero_rates() {
        let m = RunMetrics::from_stats(label(), GlobalStats::default(), true);
        assert_eq!(m.blocking, 0.0);
        assert_eq!(m.q_factor.map(|q| q.avg_initial_q), Some(0.0));
    }

    #[test]
    fn test_fold_connection() {
        let mut stats = GlobalStats::default();
        stats.fold_connection(&ConnectionSummary {
            initial_q: 20.0,
            average_q: 18.0,
            time_below: 0.25,
            dropped: true,
        });
        assert_eq!(stats.q_connections, 1);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.average_q_total, 18.0);
    }

    #[test]
    fn test_format_table_no_panic() {
        let m = RunMetrics::from_stats(label(), GlobalStats::default(), true);
        let table = format_table(&m);
        assert!(table.contains("SP/FF/single ws=4"));
        assert!(table.contains("Q-factor"));
        assert!(format_comparison_table(&[m]).contains("Algorithm Comparison"));
        assert_eq!(format_comparison_table(&[]), "No results to compare.\n");
    }

    #[test]
    fn test_metrics_serialize() {
        let m = RunMetrics::from_stats(label(), GlobalStats::default(), false);
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"routing\":\"SP\""));
        assert_eq!(m.log_lines().len(), 13);
    }
}
