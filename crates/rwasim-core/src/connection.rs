//! Established lightpaths and their Q-factor history.

use rwasim_algorithms::{EdgeId, RouterId, SessionId};
use serde::{Deserialize, Serialize};

/// Engine-wide identifier of an established connection. Session ids can
/// repeat once a workstation wraps its block, so connections get their own.
pub type ConnectionId = u64;

/// One Q-factor observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QSample {
    pub q_factor: f64,
    pub time: f64,
}

/// A lightpath holding one wavelength on every edge of its path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstablishedConnection {
    pub id: ConnectionId,
    pub session: SessionId,
    pub src: RouterId,
    pub dest: RouterId,
    pub path: Vec<EdgeId>,
    pub wave: usize,
    pub start: f64,
    pub end: f64,
    samples: Vec<QSample>,
}

/// Statistics folded into edge and run counters at teardown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSummary {
    pub initial_q: f64,
    pub average_q: f64,
    /// Fraction of the holding time spent below the threshold.
    pub time_below: f64,
    pub dropped: bool,
}

impl EstablishedConnection {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ConnectionId,
        session: SessionId,
        src: RouterId,
        dest: RouterId,
        path: Vec<EdgeId>,
        wave: usize,
        start: f64,
        end: f64,
    ) -> Self {
        Self {
            id,
            session,
            src,
            dest,
            path,
            wave,
            start,
            end,
            samples: Vec::new(),
        }
    }

    pub fn record(&mut self, q_factor: f64, time: f64) {
        self.samples.push(QSample { q_factor, time });
    }

    pub fn samples(&self) -> &[QSample] {
        &self.samples
    }

    /// Position of `edge` on the path.
    pub fn hop_of(&self, edge: EdgeId) -> Option<usize> {
        self.path.iter().position(|&e| e == edge)
    }

    /// Time-weighted summary over `[first sample, end]`.
    ///
    /// Returns `None` when nothing was ever recorded.
    pub fn summarize(&self, end: f64, th_q: f64) -> Option<ConnectionSummary> {
        let first = self.samples.first()?;
        let span = end - first.time;
        if span <= 0.0 {
            return Some(ConnectionSummary {
                initial_q: first.q_factor,
                average_q: first.q_factor,
                time_below: if first.q_factor < th_q { 1.0 } else { 0.0 },
                dropped: false,
            });
        }

        let mut weighted = 0.0;
        let mut below = 0.0;
        for (i, sample) in self.samples.iter().enumerate() {
            let until = self.samples.get(i + 1).map_or(end, |next| next.time);
            let held = (until - sample.time).max(0.0);
            weighted += sample.q_factor * held;
            if sample.q_factor < th_q {
                below += held;
            }
        }
        let dropped = self
            .samples
            .iter()
            .any(|s| s.time < end && s.q_factor < th_q);

        Some(ConnectionSummary {
            initial_q: first.q_factor,
            average_q: weighted / span,
            time_below: below / span,
            dropped,
        })
    }
}
