//! Candidate identity. A candidate is an opaque string id; two values of that
//! id-space are reserved sentinels rather than ordinary candidates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The sentinel recorded at a rank where the voter marked more than one
/// candidate. Never "continuing", never electable.
pub const EXPLICIT_OVERVOTE: &str = "EXPLICIT_OVERVOTE";

/// The bucket for write-in votes. May accumulate tally, but is dropped before
/// any other elimination step runs and can never be elected.
pub const UNDECLARED_WRITE_IN: &str = "UNDECLARED_WRITE_IN";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(pub String);

impl CandidateId {
    pub fn new(name: impl Into<String>) -> Self {
        CandidateId(name.into())
    }

    pub fn explicit_overvote() -> Self {
        CandidateId(EXPLICIT_OVERVOTE.to_string())
    }

    pub fn undeclared_write_in() -> Self {
        CandidateId(UNDECLARED_WRITE_IN.to_string())
    }

    pub fn is_explicit_overvote(&self) -> bool {
        self.0 == EXPLICIT_OVERVOTE
    }

    pub fn is_undeclared_write_in(&self) -> bool {
        self.0 == UNDECLARED_WRITE_IN
    }

    pub fn is_sentinel(&self) -> bool {
        self.is_explicit_overvote() || self.is_undeclared_write_in()
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CandidateId {
    fn from(s: &str) -> Self {
        CandidateId(s.to_string())
    }
}

impl From<String> for CandidateId {
    fn from(s: String) -> Self {
        CandidateId(s)
    }
}

/// Computed, never stored: a candidate's status follows from the config and
/// the two elimination/winner ledgers the Tabulator maintains. A candidate
/// appears in at most one of those ledgers; this function does not itself
/// enforce that invariant; callers (the Tabulator) do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateStatus {
    Continuing,
    Winner,
    Eliminated,
    /// Declared in the config but never fed into tabulation (e.g. withdrawn).
    Excluded,
    /// One of the reserved sentinels; not a real candidate.
    Invalid,
}

pub fn candidate_status(
    candidate: &CandidateId,
    is_excluded: bool,
    candidate_to_round_eliminated: &std::collections::BTreeMap<CandidateId, u32>,
    winner_to_round: &std::collections::BTreeMap<CandidateId, u32>,
) -> CandidateStatus {
    if candidate.is_sentinel() {
        return CandidateStatus::Invalid;
    }
    if is_excluded {
        return CandidateStatus::Excluded;
    }
    if winner_to_round.contains_key(candidate) {
        return CandidateStatus::Winner;
    }
    if candidate_to_round_eliminated.contains_key(candidate) {
        return CandidateStatus::Eliminated;
    }
    CandidateStatus::Continuing
}
