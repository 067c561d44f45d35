//! Virtual clock for discrete-event simulation.
//!
//! The [`SimClock`] tracks simulated seconds independently of wall-clock
//! time, advancing only when events are processed. Propagation delays are
//! fractions of a millisecond, so time is kept as `f64` seconds.

use serde::{Deserialize, Serialize};

/// Requests are generated only while the clock is below this (s).
pub const TRAFFIC_HORIZON: f64 = 3600.0;

/// Time at which workstations are deactivated (s).
pub const DEACTIVATION_TIME: f64 = 35999.0;

/// Virtual simulation clock.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimClock {
    /// Current simulation time in seconds.
    current: f64,
}

impl SimClock {
    /// Create a new clock starting at time zero.
    pub fn new() -> Self {
        Self { current: 0.0 }
    }

    /// Current time in seconds.
    pub fn now(&self) -> f64 {
        self.current
    }

    /// Advance the clock to `time` seconds.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if `time` is in the past.
    pub fn advance_to(&mut self, time: f64) {
        debug_assert!(
            time >= self.current,
            "Cannot move clock backwards: current={}s, target={}s",
            self.current,
            time,
        );
        self.current = time;
    }

    /// Rewind to zero for the next workstation-activation cycle.
    pub fn reset(&mut self) {
        self.current = 0.0;
    }

    /// Whether new traffic may still be generated.
    pub fn within_traffic_horizon(&self) -> bool {
        self.current < TRAFFIC_HORIZON
    }
}
