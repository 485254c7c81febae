//! The round -> source -> target -> amount ledger. A source or target is
//! either a real candidate, the `Exhausted` bucket (a ballot left the count
//! entirely), or `Residual` (surplus lost to rounding during carry-forward,
//! §4.10). Kept as a closed enum rather than the raw `"residual"` string the
//! distilled model describes, so a typo in a reserved-word comparison can't
//! silently misfile a transfer.

use crate::arith::{Decimal, DecimalArith};
use crate::model::candidate::CandidateId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Allocatee {
    Candidate(CandidateId),
    Exhausted,
    Residual,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TallyTransfers {
    by_round: BTreeMap<u32, BTreeMap<Allocatee, BTreeMap<Allocatee, Decimal>>>,
}

impl TallyTransfers {
    pub fn new() -> Self {
        TallyTransfers::default()
    }

    pub fn record(&mut self, round: u32, source: Allocatee, target: Allocatee, amount: &Decimal, arith: &DecimalArith) {
        if amount.is_zero() {
            return;
        }
        let targets = self.by_round.entry(round).or_default().entry(source).or_default();
        let entry = targets.entry(target).or_insert_with(Decimal::zero);
        *entry = arith.add(entry, amount);
    }

    pub fn for_round(&self, round: u32) -> Option<&BTreeMap<Allocatee, BTreeMap<Allocatee, Decimal>>> {
        self.by_round.get(&round)
    }

    pub fn rounds(&self) -> impl Iterator<Item = &u32> {
        self.by_round.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_amount_transfers_are_not_recorded() {
        let mut ledger = TallyTransfers::new();
        let arith = DecimalArith::new(0, false);
        ledger.record(1, Allocatee::Candidate(CandidateId::new("A")), Allocatee::Exhausted, &Decimal::zero(), &arith);
        assert!(ledger.for_round(1).is_none());
    }

    #[test]
    fn repeated_transfers_between_the_same_pair_accumulate() {
        let mut ledger = TallyTransfers::new();
        let arith = DecimalArith::new(0, false);
        let from = Allocatee::Candidate(CandidateId::new("A"));
        let to = Allocatee::Candidate(CandidateId::new("B"));
        ledger.record(1, from.clone(), to.clone(), &Decimal::from_i64(3), &arith);
        ledger.record(1, from.clone(), to.clone(), &Decimal::from_i64(4), &arith);
        assert_eq!(ledger.for_round(1).unwrap().get(&from).unwrap().get(&to).unwrap(), &Decimal::from_i64(7));
    }
}
