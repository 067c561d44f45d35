//! Connection requests and the signaling messages they spawn.
//!
//! A request computes its candidates once. Everything sent on its behalf
//! (probes, confirmations, collision notices, teardowns) shares that
//! [`RequestInfo`] through an `Rc`, so SERIAL retries never re-route.
//! PARALLEL siblings additionally share a [`FanOut`] record.

use rwasim_algorithms::{CandidatePath, EdgeId, Failure, RouterId, SessionId};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

use crate::connection::ConnectionId;

/// How many candidates a request probes, and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStyle {
    /// One probe on the best candidate.
    Single,
    /// One probe at a time, falling back to the next candidate on failure.
    Serial,
    /// One probe per viable candidate, all at once.
    Parallel,
}

impl ProbeStyle {
    pub const ALL: [ProbeStyle; 3] = [ProbeStyle::Single, ProbeStyle::Serial, ProbeStyle::Parallel];

    pub fn name(&self) -> &'static str {
        match self {
            ProbeStyle::Single => "single",
            ProbeStyle::Serial => "serial",
            ProbeStyle::Parallel => "parallel",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "single" => Some(ProbeStyle::Single),
            "serial" => Some(ProbeStyle::Serial),
            "parallel" => Some(ProbeStyle::Parallel),
            _ => None,
        }
    }
}

/// A request waiting in the event queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRequest {
    pub session: SessionId,
    pub src: RouterId,
    pub dest: RouterId,
    /// Workstation that generated the request. Scripted requests have none
    /// and do not regenerate traffic.
    pub workstation: Option<usize>,
    /// Fixed holding time. Drawn from the duration stream when absent.
    pub duration: Option<f64>,
}

/// State shared by every message sent for one request.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub session: SessionId,
    pub src: RouterId,
    pub dest: RouterId,
    /// Time the request was issued.
    pub begin: f64,
    /// Holding time once established.
    pub duration: f64,
    pub candidates: Vec<CandidatePath>,
}

/// Per-sibling bookkeeping in a PARALLEL fan-out.
#[derive(Debug, Clone, Default)]
pub struct Sibling {
    pub at_destination: bool,
    pub decided_at: Option<f64>,
    pub outcome: Option<Result<usize, Failure>>,
    /// Probe that reached the destination while another sibling held a
    /// valid decision.
    pub parked: Option<Probe>,
}

/// Shared record of all probes sent in parallel for one request.
#[derive(Debug, Clone, Default)]
pub struct FanOut {
    pub siblings: Vec<Sibling>,
}

pub type FanOutHandle = Rc<RefCell<FanOut>>;

impl FanOut {
    pub fn new(count: usize) -> FanOutHandle {
        Rc::new(RefCell::new(Self {
            siblings: vec![Sibling::default(); count],
        }))
    }

    /// Whether a sibling decided on a wavelength that has not since failed.
    pub fn holds_valid_decision(&self) -> bool {
        self.siblings
            .iter()
            .any(|s| s.at_destination && s.decided_at.is_some() && matches!(s.outcome, Some(Ok(_))))
    }

    /// Whether a sibling other than `me` already failed on quality.
    pub fn sibling_failed_quality(&self, me: usize) -> bool {
        self.siblings
            .iter()
            .enumerate()
            .any(|(i, s)| i != me && s.outcome == Some(Err(Failure::Quality)))
    }

    /// Whether some sibling has not reached the destination yet.
    pub fn any_travelling(&self) -> bool {
        self.siblings.iter().any(|s| !s.at_destination)
    }

    /// Remove and return the first parked probe.
    pub fn take_parked(&mut self) -> Option<Probe> {
        self.siblings
            .iter_mut()
            .find(|s| s.at_destination && s.decided_at.is_none() && s.parked.is_some())
            .and_then(|s| s.parked.take())
    }

    /// A collision by sibling `me` is final when every other sibling has
    /// arrived and decided no later than `me`.
    pub fn collision_is_final(&self, me: usize) -> bool {
        let Some(mine) = self.siblings.get(me).and_then(|s| s.decided_at) else {
            return true;
        };
        self.siblings.iter().enumerate().all(|(i, s)| {
            i == me || (s.at_destination && s.decided_at.is_some_and(|t| t <= mine))
        })
    }
}

/// Where a request stands in its probing sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// Candidate slot the attempt uses.
    pub slot: usize,
    /// SERIAL attempt number, or the sibling index for PARALLEL.
    pub sequence: usize,
    pub max_sequence: usize,
    /// A previous SERIAL attempt failed on quality.
    pub quality_fail: bool,
}

/// A probe travelling towards the destination.
#[derive(Debug, Clone)]
pub struct Probe {
    pub request: Rc<RequestInfo>,
    pub path: Vec<EdgeId>,
    pub attempt: Attempt,
    /// Wavelength fixed before signaling (forward reservation).
    pub wave: Option<usize>,
    /// Index of the edge just traversed.
    pub hop: usize,
    pub fanout: Option<FanOutHandle>,
}

/// The decision travelling back to the source, reserving as it goes.
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub request: Rc<RequestInfo>,
    pub path: Vec<EdgeId>,
    pub attempt: Attempt,
    pub outcome: Result<usize, Failure>,
    /// Index of the edge to reserve next.
    pub position: usize,
    pub final_failure: bool,
    pub fanout: Option<FanOutHandle>,
}

/// Unwinds the reservations made beyond a colliding edge.
#[derive(Debug, Clone)]
pub struct CollisionNotice {
    pub request: Rc<RequestInfo>,
    pub path: Vec<EdgeId>,
    pub attempt: Attempt,
    pub wave: usize,
    /// Index of the next edge to free.
    pub hop: usize,
    pub final_failure: bool,
    pub fanout: Option<FanOutHandle>,
}

/// Releases an established connection hop by hop.
#[derive(Debug, Clone)]
pub struct Teardown {
    pub request: Rc<RequestInfo>,
    pub path: Vec<EdgeId>,
    pub wave: usize,
    pub hop: usize,
    pub connection: Option<ConnectionId>,
    pub fanout: Option<FanOutHandle>,
}
