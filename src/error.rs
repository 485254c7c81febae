//! The engine's single fatal-error type. Tabulation either completes or stops
//! with one of these; there is no partial/recoverable failure mode.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TabulationError {
    #[error("precinct tabulation was requested but no cast vote record carries a precinct")]
    NoPrecinctsFound,

    #[error("every continuing candidate fell below the minimum vote threshold in round {round}")]
    AllCandidatesBelowMinimumThreshold { round: u32 },

    #[error("round {round} has continuing candidates but none eligible for elimination")]
    NoEliminationCandidate { round: u32 },

    #[error(
        "ballot carried the explicit-overvote sentinel alongside another candidate at the same \
         rank, which EXHAUST_IF_MULTIPLE_CONTINUING cannot resolve"
    )]
    InconsistentOvervoteRule,

    #[error("invalid contest configuration: {0}")]
    InvalidConfig(String),

    #[error("tabulation was cancelled after round {last_completed_round}")]
    Cancelled { last_completed_round: u32 },
}

impl TabulationError {
    pub fn cancelled_by_user(&self) -> bool {
        matches!(self, TabulationError::Cancelled { .. })
    }
}
