//! The elimination priority ladder (§4.9): undeclared write-in, then
//! below-minimum-threshold, then batch elimination, then single lowest-tally
//! (with a tiebreak if needed).

use crate::arith::{Decimal, DecimalArith};
use crate::config::ContestConfig;
use crate::error::TabulationError;
use crate::model::candidate::CandidateId;
use crate::tally::round_tally::RoundTally;
use crate::tiebreak::TiebreakContext;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EliminationReason {
    UndeclaredWriteIn,
    BelowMinimumThreshold,
    Batch,
    LowestTally,
}

pub struct EliminationStep {
    pub eliminated: Vec<CandidateId>,
    pub reason: EliminationReason,
    pub tiebreak_explanation: Option<String>,
}

/// `continuing` holds only declared candidates (never the write-in bucket or
/// the explicit-overvote sentinel); whether the write-in bucket is itself
/// still in play is tracked separately, since it never competes for a seat
/// and always clears before any declared candidate is touched.
#[allow(clippy::too_many_arguments)]
pub fn decide_elimination(
    config: &ContestConfig,
    arith: &DecimalArith,
    tally: &RoundTally,
    continuing: &BTreeSet<CandidateId>,
    write_in_still_continuing: bool,
    current_round: u32,
    tiebreak: &mut TiebreakContext,
    round_tallies: &BTreeMap<u32, RoundTally>,
    candidate_to_round_eliminated: &BTreeMap<CandidateId, u32>,
) -> Result<EliminationStep, TabulationError> {
    if write_in_still_continuing && tally.tally_for(&CandidateId::undeclared_write_in()).is_positive() {
        return Ok(EliminationStep {
            eliminated: vec![CandidateId::undeclared_write_in()],
            reason: EliminationReason::UndeclaredWriteIn,
            tiebreak_explanation: None,
        });
    }

    let declared: Vec<CandidateId> = continuing.iter().cloned().collect();

    let below_minimum: Vec<CandidateId> = declared
        .iter()
        .filter(|c| arith.compare(&tally.tally_for(c), &config.minimum_vote_threshold) == Ordering::Less)
        .cloned()
        .collect();
    if !below_minimum.is_empty() {
        if below_minimum.len() == declared.len() {
            return Err(TabulationError::AllCandidatesBelowMinimumThreshold { round: current_round });
        }
        return Ok(EliminationStep {
            eliminated: below_minimum,
            reason: EliminationReason::BelowMinimumThreshold,
            tiebreak_explanation: None,
        });
    }

    if config.batch_elimination_enabled {
        let batch = compute_batch_elimination(config, arith, tally, &declared, candidate_to_round_eliminated);
        if !batch.is_empty() {
            return Ok(EliminationStep {
                eliminated: batch,
                reason: EliminationReason::Batch,
                tiebreak_explanation: None,
            });
        }
    }

    if declared.is_empty() {
        return Err(TabulationError::NoEliminationCandidate { round: current_round });
    }

    let values: Vec<(Decimal, CandidateId)> = declared.iter().map(|c| (tally.tally_for(c), c.clone())).collect();
    let min_tally = values.iter().fold(values[0].0.clone(), |acc, (value, _)| Decimal::min(&acc, value));
    let lowest: BTreeSet<CandidateId> = values
        .into_iter()
        .filter(|(value, _)| arith.compare(value, &min_tally) == Ordering::Equal)
        .map(|(_, c)| c)
        .collect();

    if lowest.len() == 1 {
        Ok(EliminationStep {
            eliminated: vec![lowest.into_iter().next().unwrap()],
            reason: EliminationReason::LowestTally,
            tiebreak_explanation: None,
        })
    } else {
        let (loser, explanation) = tiebreak.break_tie(&lowest, false, current_round, round_tallies);
        Ok(EliminationStep {
            eliminated: vec![loser],
            reason: EliminationReason::LowestTally,
            tiebreak_explanation: Some(explanation),
        })
    }
}

/// The mathematical-impossibility batch-elimination algorithm: group
/// continuing declared candidates by equal tally ascending, and whenever the
/// running total of lower groups can't mathematically catch up to the next
/// group's tally, every not-yet-batched candidate seen so far becomes
/// eliminable as one batch.
fn compute_batch_elimination(
    config: &ContestConfig,
    arith: &DecimalArith,
    tally: &RoundTally,
    declared: &[CandidateId],
    candidate_to_round_eliminated: &BTreeMap<CandidateId, u32>,
) -> Vec<CandidateId> {
    if declared.is_empty() {
        return vec![];
    }

    let mut sorted: Vec<(Decimal, CandidateId)> = declared.iter().map(|c| (tally.tally_for(c), c.clone())).collect();
    sorted.sort_by(|a, b| Decimal::compare(&a.0, &b.0).then_with(|| a.1.cmp(&b.1)));

    let mut grouped: Vec<(Decimal, Vec<CandidateId>)> = Vec::new();
    for (value, id) in sorted {
        match grouped.last_mut() {
            Some((last_value, ids)) if Decimal::compare(last_value, &value) == Ordering::Equal => ids.push(id),
            _ => grouped.push((value, vec![id])),
        }
    }

    let mut running_total = Decimal::zero();
    let mut seen: Vec<CandidateId> = Vec::new();
    let mut eliminations: Vec<CandidateId> = Vec::new();
    let mut previous_eliminations: Vec<CandidateId> = Vec::new();

    for (tally_value, group) in &grouped {
        if arith.compare(&running_total, tally_value) == Ordering::Less {
            let newly_eliminable: Vec<CandidateId> =
                seen.iter().filter(|c| !eliminations.contains(c)).cloned().collect();
            if !newly_eliminable.is_empty() {
                previous_eliminations = eliminations.clone();
                eliminations.extend(newly_eliminable);
            }
        }
        seen.extend(group.iter().cloned());
        let group_total = arith.mul(tally_value, &Decimal::from_u64(group.len() as u64));
        running_total = arith.add(&running_total, &group_total);
    }

    if eliminations.len() <= 1 {
        return vec![];
    }

    if config.continue_until_two
        && eliminations.len() + candidate_to_round_eliminated.len() == config.num_candidates() as usize - 1
    {
        return previous_eliminations;
    }

    eliminations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OvervoteRule, TiebreakMode, WinnerElectionMode};

    fn config(batch_elimination: bool, continue_until_two: bool, num_candidates: usize) -> ContestConfig {
        let names: BTreeSet<CandidateId> = (0..num_candidates)
            .map(|i| CandidateId::new(format!("C{i}")))
            .collect();
        ContestConfig {
            num_winners: 1,
            candidate_names: names,
            excluded_candidates: Default::default(),
            candidate_display_names: BTreeMap::new(),
            overvote_rule: OvervoteRule::ExhaustImmediately,
            tiebreak_mode: TiebreakMode::Random,
            winner_election_mode: WinnerElectionMode::SingleWinnerMajority,
            max_skipped_ranks_allowed: None,
            max_rankings_allowed: 3,
            exhaust_on_duplicate_ranking: true,
            batch_elimination_enabled: batch_elimination,
            continue_until_two,
            first_round_determines_threshold: false,
            hare_quota_enabled: false,
            bottoms_up_percentage_threshold: None,
            tabulate_by_precinct_enabled: false,
            generate_cdf_json_enabled: false,
            minimum_vote_threshold: Decimal::zero(),
            decimal_places: 4,
            non_integer_thresholds_enabled: true,
            random_seed: Some(1),
            candidate_permutation: None,
            stop_tabulation_early_after_round: None,
        }
    }

    fn tally_with(values: &[(&str, i64)]) -> RoundTally {
        let mut tally = RoundTally::new(1, Decimal::from_i64(11));
        let arith = DecimalArith::new(0, false);
        for (name, value) in values {
            tally.add_to_candidate(&CandidateId::new(*name), &Decimal::from_i64(*value), &arith);
        }
        tally
    }

    #[test]
    fn batch_elimination_groups_the_mathematically_hopeless() {
        let declared: Vec<CandidateId> = ["A", "B", "C", "D", "E"].iter().map(|n| CandidateId::new(*n)).collect();
        let tally = tally_with(&[("A", 10), ("B", 4), ("C", 3), ("D", 2), ("E", 1)]);
        let arith = DecimalArith::new(0, false);
        let config = config(true, false, 5);
        let eliminated = compute_batch_elimination(&config, &arith, &tally, &declared, &BTreeMap::new());
        // Only {E} is mathematically hopeless here, which is not a "batch" of
        // more than one: falls through to regular single-lowest elimination.
        assert!(eliminated.is_empty());
    }

    #[test]
    fn batch_elimination_catches_a_real_multi_candidate_group() {
        let declared: Vec<CandidateId> = ["A", "B", "C", "D"].iter().map(|n| CandidateId::new(*n)).collect();
        let tally = tally_with(&[("A", 20), ("B", 1), ("C", 1), ("D", 1)]);
        let arith = DecimalArith::new(0, false);
        let config = config(true, false, 4);
        let mut eliminated = compute_batch_elimination(&config, &arith, &tally, &declared, &BTreeMap::new());
        eliminated.sort();
        assert_eq!(eliminated, vec![CandidateId::new("B"), CandidateId::new("C"), CandidateId::new("D")]);
    }

    #[test]
    fn continue_until_two_reverts_a_batch_that_would_leave_one_candidate() {
        let declared: Vec<CandidateId> = ["A", "B", "C"].iter().map(|n| CandidateId::new(*n)).collect();
        let tally = tally_with(&[("A", 20), ("B", 1), ("C", 1)]);
        let arith = DecimalArith::new(0, false);
        let config = config(true, true, 3);
        let eliminated = compute_batch_elimination(&config, &arith, &tally, &declared, &BTreeMap::new());
        // Eliminating both B and C would leave only A: must revert to the
        // (empty) previous batch instead, so the caller falls through to a
        // single lowest-tally elimination.
        assert!(eliminated.is_empty());
    }

    proptest::proptest! {
        #[test]
        fn prop_continue_until_two_never_leaves_one_candidate(tallies in proptest::collection::vec(0i64..50, 3..8)) {
            let n = tallies.len();
            let declared: Vec<CandidateId> = (0..n).map(|i| CandidateId::new(format!("C{i}"))).collect();
            let arith = DecimalArith::new(0, false);
            let mut tally = RoundTally::new(1, Decimal::zero());
            for (id, value) in declared.iter().zip(&tallies) {
                tally.add_to_candidate(id, &Decimal::from_i64(*value), &arith);
            }
            let config = config(true, true, n);
            let eliminated = compute_batch_elimination(&config, &arith, &tally, &declared, &BTreeMap::new());
            proptest::prop_assert!(eliminated.len() != n - 1);
        }
    }
}
