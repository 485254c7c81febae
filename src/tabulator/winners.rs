//! Winner selection and narrowing (§4.7).

use crate::arith::{Decimal, DecimalArith};
use crate::config::ContestConfig;
use crate::model::candidate::CandidateId;
use crate::tally::round_tally::RoundTally;
use crate::tiebreak::TiebreakContext;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

fn extreme_value(values: &[(Decimal, CandidateId)], want_max: bool) -> Decimal {
    let mut best = values[0].0.clone();
    for (value, _) in &values[1..] {
        let cmp = Decimal::compare(value, &best);
        if (want_max && cmp == Ordering::Greater) || (!want_max && cmp == Ordering::Less) {
            best = value.clone();
        }
    }
    best
}

#[allow(clippy::too_many_arguments)]
pub fn select_winners(
    config: &ContestConfig,
    arith: &DecimalArith,
    tally: &RoundTally,
    continuing: &BTreeSet<CandidateId>,
    winner_to_round: &BTreeMap<CandidateId, u32>,
    current_round: u32,
    tiebreak: &mut TiebreakContext,
    round_tallies: &BTreeMap<u32, RoundTally>,
) -> Vec<CandidateId> {
    if config.winner_election_mode.is_bottoms_up_with_threshold() {
        if continuing.is_empty() {
            return vec![];
        }
        let all_above = continuing
            .iter()
            .all(|c| arith.compare(&tally.tally_for(c), tally.winning_threshold()) != Ordering::Less);
        return if all_above { continuing.iter().cloned().collect() } else { vec![] };
    }

    let unfilled = config.num_winners as i64 - winner_to_round.len() as i64;
    if unfilled <= 0 {
        return vec![];
    }
    let unfilled = unfilled as usize;

    let mut selected: Vec<CandidateId> = if continuing.len() == unfilled {
        continuing.iter().cloned().collect()
    } else if config.first_round_determines_threshold && continuing.len() == config.num_winners as usize + 1 {
        let values: Vec<(Decimal, CandidateId)> = continuing.iter().map(|c| (tally.tally_for(c), c.clone())).collect();
        let max_tally = extreme_value(&values, true);
        values
            .into_iter()
            .filter(|(value, _)| arith.compare(value, &max_tally) == Ordering::Equal)
            .map(|(_, c)| c)
            .collect()
    } else if !config.winner_election_mode.is_bottoms_up_until_n() {
        continuing
            .iter()
            .filter(|c| !c.is_undeclared_write_in())
            .filter(|c| arith.compare(&tally.tally_for(c), tally.winning_threshold()) != Ordering::Less)
            .cloned()
            .collect()
    } else {
        vec![]
    };

    if selected.len() > 1 && (config.winner_election_mode.one_winner_per_round() || config.first_round_determines_threshold) {
        let values: Vec<(Decimal, CandidateId)> = selected.iter().map(|c| (tally.tally_for(c), c.clone())).collect();
        let max_tally = extreme_value(&values, true);
        let mut narrowed: BTreeSet<CandidateId> = values
            .into_iter()
            .filter(|(value, _)| arith.compare(value, &max_tally) == Ordering::Equal)
            .map(|(_, c)| c)
            .collect();
        if narrowed.len() > 1 {
            let (winner, _) = tiebreak.break_tie(&narrowed, true, current_round, round_tallies);
            narrowed = [winner].into_iter().collect();
        }
        selected = narrowed.into_iter().collect();
    }

    if selected.is_empty() && !config.winner_election_mode.is_multi_seat() && continuing.len() == 2 {
        let above_minimum = continuing
            .iter()
            .filter(|c| arith.compare(&tally.tally_for(c), &config.minimum_vote_threshold) != Ordering::Less)
            .count();
        if above_minimum == 2 {
            let values: Vec<(Decimal, CandidateId)> = continuing.iter().map(|c| (tally.tally_for(c), c.clone())).collect();
            let max_tally = extreme_value(&values, true);
            let mut tied: BTreeSet<CandidateId> = values
                .into_iter()
                .filter(|(value, _)| arith.compare(value, &max_tally) == Ordering::Equal)
                .map(|(_, c)| c)
                .collect();
            if tied.len() > 1 {
                let (winner, _) = tiebreak.break_tie(&tied, true, current_round, round_tallies);
                tied = [winner].into_iter().collect();
            }
            selected = tied.into_iter().collect();
        }
    }

    selected
}
