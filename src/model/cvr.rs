//! Per-ballot tabulation state: a cast vote record starts from its ranking
//! marks and accumulates recipient, status, and fractional-transfer-value
//! history as rounds run.

use crate::arith::{Decimal, DecimalArith};
use crate::model::candidate::CandidateId;
use crate::model::rankings::CandidateRankings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InactiveReason {
    Undervote,
    Overvote,
    SkippedRanking,
    RepeatedRanking,
    ExhaustedChoices,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BallotStatus {
    Active,
    Inactive(InactiveReason),
}

impl BallotStatus {
    pub fn active() -> Self {
        BallotStatus::Active
    }
}

/// One entry in a ballot's round-by-round outcome log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub round: u32,
    pub status: BallotStatus,
    pub description: String,
    pub value_at_round: Decimal,
}

/// A snapshot, for one round, of how this ballot's value is split across
/// candidates — used only when CDF-style JSON export is enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdfSnapshot {
    pub round: u32,
    pub allocations: Vec<(CandidateId, Decimal)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastVoteRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precinct: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precinct_portion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tabulator_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    pub rankings: CandidateRankings,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_recipient: Option<CandidateId>,
    #[serde(default = "BallotStatus::active")]
    pub ballot_status: BallotStatus,
    #[serde(default = "Decimal::one")]
    pub fractional_transfer_value: Decimal,
    #[serde(default)]
    pub winner_to_fractional_value: BTreeMap<CandidateId, Decimal>,
    #[serde(default)]
    pub round_outcomes: Vec<RoundOutcome>,
    #[serde(default)]
    pub cdf_snapshots: Vec<CdfSnapshot>,
}

impl CastVoteRecord {
    pub fn new(id: impl Into<String>, precinct: Option<String>, rankings: CandidateRankings) -> Self {
        CastVoteRecord {
            id: id.into(),
            precinct,
            precinct_portion: None,
            tabulator_id: None,
            batch_id: None,
            rankings,
            current_recipient: None,
            ballot_status: BallotStatus::Active,
            fractional_transfer_value: Decimal::one(),
            winner_to_fractional_value: BTreeMap::new(),
            round_outcomes: Vec::new(),
            cdf_snapshots: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.ballot_status, BallotStatus::Active)
    }

    pub fn inactive_reason(&self) -> Option<InactiveReason> {
        match self.ballot_status {
            BallotStatus::Inactive(reason) => Some(reason),
            BallotStatus::Active => None,
        }
    }

    pub fn mark_inactive(&mut self, round: u32, reason: InactiveReason, description: String) {
        self.ballot_status = BallotStatus::Inactive(reason);
        self.current_recipient = None;
        self.round_outcomes.push(RoundOutcome {
            round,
            status: self.ballot_status.clone(),
            description,
            value_at_round: self.fractional_transfer_value.clone(),
        });
    }

    pub fn set_active_recipient(&mut self, round: u32, candidate: CandidateId, description: String) {
        self.current_recipient = Some(candidate);
        self.round_outcomes.push(RoundOutcome {
            round,
            status: BallotStatus::Active,
            description,
            value_at_round: self.fractional_transfer_value.clone(),
        });
    }

    /// Credits `winner` with this ballot's surplus-reduced share and shrinks
    /// the ballot's own transfer value to match, per the surplus distribution
    /// rule: both the credited amount and the new transfer value equal
    /// `fractional_transfer_value * surplus_fraction`, computed once from the
    /// pre-credit value.
    pub fn apply_surplus_fraction(&mut self, winner: &CandidateId, surplus_fraction: &Decimal, arith: &DecimalArith) {
        let credited = arith.mul(&self.fractional_transfer_value, surplus_fraction);
        let entry = self
            .winner_to_fractional_value
            .entry(winner.clone())
            .or_insert_with(Decimal::zero);
        *entry = arith.add(entry, &credited);
        self.fractional_transfer_value = credited;
        self.current_recipient = None;
    }

    pub fn snapshot_cdf(&mut self, round: u32) {
        let mut allocations: Vec<(CandidateId, Decimal)> = self
            .winner_to_fractional_value
            .iter()
            .map(|(c, v)| (c.clone(), v.clone()))
            .collect();
        if let Some(recipient) = &self.current_recipient {
            allocations.push((recipient.clone(), self.fractional_transfer_value.clone()));
        }
        self.cdf_snapshots.push(CdfSnapshot { round, allocations });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surplus_fraction_shrinks_transfer_value_and_credits_winner() {
        let arith = DecimalArith::new(4, true);
        let mut cvr = CastVoteRecord::new("1", None, CandidateRankings::empty());
        cvr.current_recipient = Some(CandidateId::new("A"));
        let fraction: Decimal = "0.5000".parse().unwrap();
        cvr.apply_surplus_fraction(&CandidateId::new("A"), &fraction, &arith);
        assert_eq!(cvr.fractional_transfer_value, "0.5000".parse().unwrap());
        assert_eq!(
            cvr.winner_to_fractional_value.get(&CandidateId::new("A")),
            Some(&"0.5000".parse().unwrap())
        );
        assert!(cvr.current_recipient.is_none());
    }
}
