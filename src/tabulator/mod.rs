//! The round loop (§4.4): the heart of the engine. Ties together threshold
//! computation, winner selection, the elimination ladder, surplus
//! distribution, and past-winner carry-forward into the single sequential
//! loop that drives a contest from its first round to a final winner set.

pub mod compute_round;
pub mod elimination;
pub mod precinct;
pub mod surplus;
pub mod threshold;
pub mod winners;

use crate::arith::Decimal;
use crate::config::{ContestConfig, TiebreakMode};
use crate::error::TabulationError;
use crate::model::candidate::CandidateId;
use crate::model::cvr::CastVoteRecord;
use crate::tally::round_tally::RoundTally;
use crate::tally::transfers::TallyTransfers;
use crate::tiebreak::TiebreakContext;
use std::collections::{BTreeMap, BTreeSet};

pub use compute_round::{Contribution, ContributionKind, TransferRecord};
pub use elimination::{EliminationReason, EliminationStep};

/// Everything a caller needs to audit or report on a completed (or aborted)
/// contest.
#[derive(Debug)]
pub struct TabulationResult {
    pub round_tallies: BTreeMap<u32, RoundTally>,
    pub precinct_round_tallies: BTreeMap<String, BTreeMap<u32, RoundTally>>,
    pub transfers: TallyTransfers,
    pub precinct_transfers: BTreeMap<String, TallyTransfers>,
    pub candidate_to_round_eliminated: BTreeMap<CandidateId, u32>,
    pub winner_to_round: BTreeMap<CandidateId, u32>,
    pub round_to_residual_surplus: BTreeMap<u32, Decimal>,
    pub cvrs: Vec<CastVoteRecord>,
}

/// Runs a full contest to completion. `should_cancel` is polled once between
/// rounds; returning true surfaces `TabulationError::Cancelled` with the last
/// round that finished.
pub fn run(
    config: &ContestConfig,
    mut cvrs: Vec<CastVoteRecord>,
    mut should_cancel: impl FnMut() -> bool,
) -> Result<TabulationResult, TabulationError> {
    config.validate()?;
    let arith = config.arith();

    if config.tabulate_by_precinct_enabled && !cvrs.iter().any(|cvr| cvr.precinct.is_some()) {
        return Err(TabulationError::NoPrecinctsFound);
    }

    let mut permutation = config.candidate_permutation.clone();
    if config.tiebreak_mode == TiebreakMode::GeneratePermutation && permutation.is_none() {
        let mut all: Vec<CandidateId> = config.candidate_names.iter().cloned().collect();
        all.sort();
        permutation = Some(all);
    }
    let mut tiebreak = TiebreakContext::new(config.tiebreak_mode, config.random_seed, permutation);

    let mut continuing: BTreeSet<CandidateId> = config
        .candidate_names
        .iter()
        .filter(|c| !config.candidate_is_excluded(c))
        .cloned()
        .collect();
    let mut write_in_still_continuing = true;

    let mut round_tallies: BTreeMap<u32, RoundTally> = BTreeMap::new();
    let mut precinct_round_tallies: BTreeMap<String, BTreeMap<u32, RoundTally>> = BTreeMap::new();
    let mut transfers = TallyTransfers::new();
    let mut precinct_transfers: BTreeMap<String, TallyTransfers> = BTreeMap::new();
    let mut candidate_to_round_eliminated: BTreeMap<CandidateId, u32> = BTreeMap::new();
    let mut winner_to_round: BTreeMap<CandidateId, u32> = BTreeMap::new();
    let mut round_to_residual_surplus: BTreeMap<u32, Decimal> = BTreeMap::new();
    let mut current_threshold = Decimal::zero();
    let mut current_round: u32 = 0;
    let mut eliminated_this_round = false;

    loop {
        if should_cancel() {
            return Err(TabulationError::Cancelled { last_completed_round: current_round });
        }
        if !should_continue_tabulating(
            config,
            current_round,
            &winner_to_round,
            &candidate_to_round_eliminated,
            eliminated_this_round,
        ) {
            break;
        }
        current_round += 1;
        crate::log_round!(current_round, continuing.len());

        let mut continuing_for_walk = continuing.clone();
        if write_in_still_continuing {
            continuing_for_walk.insert(CandidateId::undeclared_write_in());
        }

        let walk = compute_round::walk_all_ballots(config, current_round, &mut cvrs, &continuing_for_walk)?;

        let active_total = walk
            .contributions
            .iter()
            .filter(|c| matches!(c.kind, ContributionKind::Candidate(_)))
            .fold(Decimal::zero(), |acc, c| arith.add(&acc, &c.amount));

        if threshold::should_recompute_threshold(config, current_round) {
            current_threshold = threshold::compute_threshold(config, &arith, &active_total);
        }

        let mut tally = RoundTally::new(current_round, current_threshold.clone());
        for contribution in &walk.contributions {
            match &contribution.kind {
                ContributionKind::Candidate(c) => tally.add_to_candidate(c, &contribution.amount, &arith),
                ContributionKind::Inactive(reason) => tally.add_inactive(*reason, &contribution.amount, &arith),
            }
        }

        let mut precinct_tallies = if config.tabulate_by_precinct_enabled {
            precinct::accumulate_precinct_tallies(&walk.contributions, current_round, &current_threshold, &arith)
        } else {
            BTreeMap::new()
        };

        for transfer in &walk.transfers {
            transfers.record(current_round, transfer.source.clone(), transfer.target.clone(), &transfer.amount, &arith);
            if let Some(precinct) = &transfer.precinct {
                precinct_transfers.entry(precinct.clone()).or_default().record(
                    current_round,
                    transfer.source.clone(),
                    transfer.target.clone(),
                    &transfer.amount,
                    &arith,
                );
            }
        }

        let winners = winners::select_winners(
            config,
            &arith,
            &tally,
            &continuing,
            &winner_to_round,
            current_round,
            &mut tiebreak,
            &round_tallies,
        );

        eliminated_this_round = false;
        if !winners.is_empty() {
            for winner in &winners {
                winner_to_round.insert(winner.clone(), current_round);
                continuing.remove(winner);
                if config.winner_election_mode.distributes_surplus() {
                    surplus::distribute_surplus(&arith, &current_threshold, winner, &mut cvrs);
                }
            }
        } else {
            let step = elimination::decide_elimination(
                config,
                &arith,
                &tally,
                &continuing,
                write_in_still_continuing,
                current_round,
                &mut tiebreak,
                &round_tallies,
                &candidate_to_round_eliminated,
            )?;
            eliminated_this_round = true;
            if step.reason == EliminationReason::UndeclaredWriteIn {
                write_in_still_continuing = false;
            } else {
                for candidate in &step.eliminated {
                    candidate_to_round_eliminated.insert(candidate.clone(), current_round);
                    continuing.remove(candidate);
                }
            }
        }

        tally.lock_in_round();
        for precinct_tally in precinct_tallies.values_mut() {
            precinct_tally.lock_in_round();
        }

        let previous_tally = round_tallies.get(&current_round.saturating_sub(1));
        let previous_precinct_snapshot: Option<BTreeMap<String, RoundTally>> = if current_round > 1 {
            Some(
                precinct_round_tallies
                    .iter()
                    .filter_map(|(precinct, by_round)| by_round.get(&(current_round - 1)).map(|t| (precinct.clone(), t.clone())))
                    .collect(),
            )
        } else {
            None
        };

        let mut residual_this_round = round_to_residual_surplus.get(&current_round.saturating_sub(1)).cloned().unwrap_or_else(Decimal::zero);
        surplus::carry_forward_past_winners(
            &arith,
            current_round,
            &mut tally,
            previous_tally,
            &mut precinct_tallies,
            previous_precinct_snapshot.as_ref(),
            &cvrs,
            &winner_to_round,
            &mut transfers,
            &mut precinct_transfers,
            &mut residual_this_round,
        );

        round_to_residual_surplus.insert(current_round, residual_this_round);
        round_tallies.insert(current_round, tally);
        for (precinct, precinct_tally) in precinct_tallies {
            precinct_round_tallies.entry(precinct).or_default().insert(current_round, precinct_tally);
        }
    }

    Ok(TabulationResult {
        round_tallies,
        precinct_round_tallies,
        transfers,
        precinct_transfers,
        candidate_to_round_eliminated,
        winner_to_round,
        round_to_residual_surplus,
        cvrs,
    })
}

fn should_continue_tabulating(
    config: &ContestConfig,
    last_completed_round: u32,
    winner_to_round: &BTreeMap<CandidateId, u32>,
    candidate_to_round_eliminated: &BTreeMap<CandidateId, u32>,
    eliminated_this_round: bool,
) -> bool {
    if last_completed_round == 0 {
        return true;
    }

    if let Some(stop_after) = config.stop_tabulation_early_after_round {
        if last_completed_round >= stop_after {
            return false;
        }
    }

    if config.continue_until_two {
        let resolved = candidate_to_round_eliminated.len() as u32 + winner_to_round.len() as u32;
        if resolved + 1 >= config.num_candidates() && !eliminated_this_round {
            return false;
        }
    }

    if config.winner_election_mode.is_bottoms_up_with_threshold() && !winner_to_round.is_empty() {
        return false;
    }

    if winner_to_round.len() as u32 >= config.num_winners {
        let last_winner_round = winner_to_round.values().max().copied().unwrap_or(0);
        let mode = config.winner_election_mode;
        if !mode.is_multi_seat() || mode.is_bottoms_up_until_n() || last_winner_round < last_completed_round {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OvervoteRule, WinnerElectionMode};
    use crate::model::rankings::CandidateRankings;
    use std::collections::BTreeMap;

    fn config(num_winners: u32, names: &[&str]) -> ContestConfig {
        ContestConfig {
            num_winners,
            candidate_names: names.iter().map(|n| CandidateId::new(*n)).collect(),
            excluded_candidates: Default::default(),
            candidate_display_names: BTreeMap::new(),
            overvote_rule: OvervoteRule::ExhaustImmediately,
            tiebreak_mode: TiebreakMode::Random,
            winner_election_mode: WinnerElectionMode::SingleWinnerMajority,
            max_skipped_ranks_allowed: None,
            max_rankings_allowed: 3,
            exhaust_on_duplicate_ranking: true,
            batch_elimination_enabled: false,
            continue_until_two: false,
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

    fn rank(pairs: &[(u32, &[&str])]) -> CandidateRankings {
        CandidateRankings::from_pairs(
            pairs.iter().map(|(r, names)| (*r, names.iter().map(|n| CandidateId::new(*n)).collect())),
        )
    }

    #[test]
    fn a_clear_first_round_majority_wins_immediately() {
        let config = config(1, &["A", "B", "C"]);
        let cvrs = vec![
            CastVoteRecord::new("1", None, rank(&[(1, &["A"])])),
            CastVoteRecord::new("2", None, rank(&[(1, &["A"])])),
            CastVoteRecord::new("3", None, rank(&[(1, &["A"])])),
            CastVoteRecord::new("4", None, rank(&[(1, &["B"])])),
            CastVoteRecord::new("5", None, rank(&[(1, &["C"])])),
        ];
        let result = run(&config, cvrs, || false).unwrap();
        assert_eq!(result.winner_to_round.len(), 1);
        assert_eq!(result.winner_to_round.get(&CandidateId::new("A")), Some(&1));
        assert_eq!(result.round_tallies[&1].tally_for(&CandidateId::new("A")), Decimal::from_i64(3));
    }

    #[test]
    fn a_trailing_candidate_is_eliminated_and_transfers_to_second_choice() {
        let config = config(1, &["A", "B", "C"]);
        let cvrs = vec![
            CastVoteRecord::new("1", None, rank(&[(1, &["A"])])),
            CastVoteRecord::new("2", None, rank(&[(1, &["A"])])),
            CastVoteRecord::new("3", None, rank(&[(1, &["B"])])),
            CastVoteRecord::new("4", None, rank(&[(1, &["B"])])),
            CastVoteRecord::new("5", None, rank(&[(1, &["C"]), (2, &["B"])])),
        ];
        let result = run(&config, cvrs, || false).unwrap();
        assert_eq!(result.candidate_to_round_eliminated.get(&CandidateId::new("C")), Some(&1));
        assert_eq!(result.winner_to_round.get(&CandidateId::new("B")), Some(&2));
        assert_eq!(result.round_tallies[&2].tally_for(&CandidateId::new("B")), Decimal::from_i64(3));
    }

    #[test]
    fn cancellation_surfaces_the_last_completed_round() {
        let config = config(1, &["A", "B", "C"]);
        let cvrs = vec![
            CastVoteRecord::new("1", None, rank(&[(1, &["A"])])),
            CastVoteRecord::new("2", None, rank(&[(1, &["A"])])),
            CastVoteRecord::new("3", None, rank(&[(1, &["B"])])),
            CastVoteRecord::new("4", None, rank(&[(1, &["B"])])),
            CastVoteRecord::new("5", None, rank(&[(1, &["C"]), (2, &["B"])])),
        ];
        let mut calls = 0;
        let err = run(&config, cvrs, || {
            calls += 1;
            calls > 1
        })
        .unwrap_err();
        assert!(err.cancelled_by_user());
        match err {
            TabulationError::Cancelled { last_completed_round } => assert_eq!(last_completed_round, 1),
            other => panic!("expected Cancelled, got {other:?}"),
        }
    }

    proptest::proptest! {
        #[test]
        fn prop_every_round_conserves_total_ballots(
            choices in proptest::collection::vec(0usize..4, 2..20),
        ) {
            let names = ["A", "B", "C", "D"];
            let config = config(1, &names);
            let arith = config.arith();
            let cvrs: Vec<CastVoteRecord> = choices
                .iter()
                .enumerate()
                .map(|(i, c)| CastVoteRecord::new(i.to_string(), None, rank(&[(1, &[names[*c]])])))
                .collect();
            let total = Decimal::from_i64(cvrs.len() as i64);
            let result = run(&config, cvrs, || false).unwrap();
            for tally in result.round_tallies.values() {
                let counted = tally
                    .candidate_tallies()
                    .values()
                    .chain(tally.inactive_by_reason().values())
                    .fold(Decimal::zero(), |acc, v| arith.add(&acc, v));
                proptest::prop_assert_eq!(counted, total.clone());
            }
        }
    }
}
