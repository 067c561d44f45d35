//! Unrecoverable simulation errors.
//!
//! Expected protocol outcomes (collision, bad quality, no free wavelength)
//! are [`rwasim_algorithms::Failure`] values and never show up here. A
//! [`FatalError`] means the engine's bookkeeping is inconsistent; the run
//! stops at the first one and the CLI exits with [`FatalError::code`].

use rwasim_algorithms::{EdgeId, SessionId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FatalError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("too many edges: {0}")]
    TooManyEdges(String),
    #[error("wavelength selection failed: {0}")]
    WavelengthSelection(String),
    #[error("no wavelength left to hand out: {0}")]
    WavelengthExhausted(String),
    #[error("invalid edge {0}")]
    InvalidEdge(EdgeId),
    #[error("worker initialisation failed: {0}")]
    WorkerInit(String),
    #[error("unexpected event: {0}")]
    UnexpectedEvent(String),
    #[error("edge {edge} wave {wave} already used by session {holder}")]
    EdgeIsUsed {
        edge: EdgeId,
        wave: usize,
        holder: SessionId,
    },
    #[error("edge {edge} wave {wave} is already free")]
    EdgeIsFree { edge: EdgeId, wave: usize },
    #[error("invalid confirmation for session {session}: {reason}")]
    InvalidConfirmation { session: SessionId, reason: String },
    #[error("invalid quality input: {0}")]
    QualityInput(String),
    #[error("invalid topology routers: {0}")]
    TopologyRouters(String),
    #[error("invalid topology edges: {0}")]
    TopologyEdges(String),
    #[error("invalid workstation quantity: {0}")]
    WorkstationQuantity(String),
    #[error("invalid workstation parent: {0}")]
    WorkstationParent(String),
    #[error("invalid algorithm input: {0}")]
    AlgorithmInput(String),
    #[error("failed to record event: {0}")]
    RecordEvent(String),
    #[error("probe bookkeeping broken for session {0}")]
    ProbesReceived(SessionId),
    #[error("Q-factor monitor inconsistent: {0}")]
    QFactorMonitor(String),
    #[error("forward reservation cannot use wavelength strategy {0}")]
    ForwardReservationWavelength(String),
    #[error("event queue rejected timestamp {0}")]
    PriorityQueue(f64),
}

impl FatalError {
    /// Stable negative process exit code.
    pub fn code(&self) -> i32 {
        match self {
            FatalError::InvalidParameters(_) => -1,
            FatalError::TooManyEdges(_) => -2,
            FatalError::WavelengthSelection(_) => -3,
            FatalError::WavelengthExhausted(_) => -4,
            FatalError::InvalidEdge(_) => -5,
            FatalError::WorkerInit(_) => -6,
            FatalError::UnexpectedEvent(_) => -7,
            FatalError::EdgeIsUsed { .. } => -8,
            FatalError::EdgeIsFree { .. } => -9,
            FatalError::InvalidConfirmation { .. } => -10,
            FatalError::QualityInput(_) => -11,
            FatalError::TopologyRouters(_) => -12,
            FatalError::TopologyEdges(_) => -13,
            FatalError::WorkstationQuantity(_) => -14,
            FatalError::WorkstationParent(_) => -15,
            FatalError::AlgorithmInput(_) => -16,
            FatalError::RecordEvent(_) => -17,
            FatalError::ProbesReceived(_) => -18,
            FatalError::QFactorMonitor(_) => -20,
            FatalError::ForwardReservationWavelength(_) => -21,
            FatalError::PriorityQueue(_) => -22,
        }
    }
}
