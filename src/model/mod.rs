pub mod candidate;
pub mod cvr;
pub mod rankings;

pub use candidate::{candidate_status, CandidateId, CandidateStatus};
pub use cvr::{BallotStatus, CastVoteRecord, CdfSnapshot, InactiveReason, RoundOutcome};
pub use rankings::{CandidateRankings, CandidatesAtRanking};
