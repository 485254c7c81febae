//! Per-round totals. A `RoundTally` accumulates candidate and inactive-ballot
//! totals while unlocked, then locks once the round is complete — any further
//! mutation is a programming error, except the one deliberate exception
//! (surplus carry-forward, §4.10) which must go through an explicit unlock
//! token so that exception can't be taken by accident.

use crate::arith::{Decimal, DecimalArith};
use crate::model::candidate::CandidateId;
use crate::model::cvr::InactiveReason;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Proof that a `RoundTally` was deliberately unlocked for surplus
/// adjustment. Can only be constructed by `unlock_for_surplus_calculation`,
/// so `set_candidate_tally_during_surplus_adjustment` can't be called on a
/// tally that hasn't gone through that step.
pub struct SurplusAdjustmentToken(());

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundTally {
    round: u32,
    candidate_tallies: BTreeMap<CandidateId, Decimal>,
    inactive_by_reason: BTreeMap<InactiveReason, Decimal>,
    winning_threshold: Decimal,
    locked: bool,
}

impl RoundTally {
    pub fn new(round: u32, winning_threshold: Decimal) -> Self {
        RoundTally {
            round,
            candidate_tallies: BTreeMap::new(),
            inactive_by_reason: BTreeMap::new(),
            winning_threshold,
            locked: false,
        }
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn winning_threshold(&self) -> &Decimal {
        &self.winning_threshold
    }

    pub fn tally_for(&self, candidate: &CandidateId) -> Decimal {
        self.candidate_tallies.get(candidate).cloned().unwrap_or_else(Decimal::zero)
    }

    pub fn candidate_tallies(&self) -> &BTreeMap<CandidateId, Decimal> {
        &self.candidate_tallies
    }

    pub fn inactive_by_reason(&self) -> &BTreeMap<InactiveReason, Decimal> {
        &self.inactive_by_reason
    }

    pub fn num_active_ballots(&self, arith: &DecimalArith) -> Decimal {
        self.candidate_tallies
            .values()
            .fold(Decimal::zero(), |acc, v| arith.add(&acc, v))
    }

    pub fn add_to_candidate(&mut self, candidate: &CandidateId, amount: &Decimal, arith: &DecimalArith) {
        assert!(!self.locked, "cannot add to a locked round tally");
        let entry = self.candidate_tallies.entry(candidate.clone()).or_insert_with(Decimal::zero);
        *entry = arith.add(entry, amount);
    }

    pub fn add_inactive(&mut self, reason: InactiveReason, amount: &Decimal, arith: &DecimalArith) {
        assert!(!self.locked, "cannot add to a locked round tally");
        let entry = self.inactive_by_reason.entry(reason).or_insert_with(Decimal::zero);
        *entry = arith.add(entry, amount);
    }

    /// Combines another tally's totals into this one. Used to fold
    /// independently-accumulated partial tallies (e.g. the per-precinct
    /// fold-reduce in `tabulator::precinct`) back together; order-independent
    /// because `Decimal` addition is commutative and associative.
    pub fn merge_from(&mut self, other: &RoundTally, arith: &DecimalArith) {
        assert!(!self.locked, "cannot merge into a locked round tally");
        for (candidate, amount) in &other.candidate_tallies {
            self.add_to_candidate(candidate, amount, arith);
        }
        for (reason, amount) in &other.inactive_by_reason {
            self.add_inactive(*reason, amount, arith);
        }
    }

    pub fn lock_in_round(&mut self) {
        assert!(!self.locked, "round tally is already locked");
        self.locked = true;
    }

    /// Opens the one sanctioned exception to "a locked tally never changes":
    /// reconciling a past winner's carried-forward tally against the current
    /// round's surplus (§4.10).
    pub fn unlock_for_surplus_calculation(&mut self) -> SurplusAdjustmentToken {
        assert!(self.locked, "round tally must be locked before surplus adjustment");
        self.locked = false;
        SurplusAdjustmentToken(())
    }

    pub fn relock_after_surplus_calculation(&mut self, _token: SurplusAdjustmentToken) {
        self.locked = true;
    }

    pub fn set_candidate_tally_during_surplus_adjustment(
        &mut self,
        _token: &SurplusAdjustmentToken,
        candidate: &CandidateId,
        value: Decimal,
    ) {
        self.candidate_tallies.insert(candidate.clone(), value);
    }
}
