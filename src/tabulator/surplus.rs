//! Surplus distribution for a newly-declared winner (§4.8), and carrying a
//! past winner's tally forward into later rounds while reconciling rounding
//! residue (§4.10).

use crate::arith::{Decimal, DecimalArith, Rounding};
use crate::model::candidate::CandidateId;
use crate::model::cvr::CastVoteRecord;
use crate::tally::round_tally::RoundTally;
use crate::tally::transfers::{Allocatee, TallyTransfers};
use std::collections::BTreeMap;

/// Shrinks every ballot currently held by `winner` by the surplus fraction
/// `(winner_tally - threshold) / winner_tally`, crediting the winner with
/// its share and leaving the remainder on the ballot to flow onward on the
/// next round's per-ballot walk.
pub fn distribute_surplus(arith: &DecimalArith, threshold: &Decimal, winner: &CandidateId, cvrs: &mut [CastVoteRecord]) {
    let winner_tally = cvrs
        .iter()
        .filter(|cvr| cvr.current_recipient.as_ref() == Some(winner))
        .fold(Decimal::zero(), |acc, cvr| arith.add(&acc, &cvr.fractional_transfer_value));

    if winner_tally.is_zero() {
        return;
    }

    let surplus = arith.sub(&winner_tally, threshold);
    if !surplus.is_positive() {
        return;
    }

    let surplus_fraction = arith.divide(&surplus, &winner_tally, arith.decimal_places, Rounding::Down);
    if surplus_fraction.is_zero() {
        return;
    }

    for cvr in cvrs.iter_mut() {
        if cvr.current_recipient.as_ref() == Some(winner) {
            cvr.apply_surplus_fraction(winner, &surplus_fraction, arith);
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub fn carry_forward_past_winners(
    arith: &DecimalArith,
    current_round: u32,
    tally: &mut RoundTally,
    previous_tally: Option<&RoundTally>,
    precinct_tallies: &mut BTreeMap<String, RoundTally>,
    previous_precinct_tallies: Option<&BTreeMap<String, RoundTally>>,
    cvrs: &[CastVoteRecord],
    winner_to_round: &BTreeMap<CandidateId, u32>,
    transfers: &mut TallyTransfers,
    precinct_transfers: &mut BTreeMap<String, TallyTransfers>,
    residual_this_round: &mut Decimal,
) {
    if winner_to_round.is_empty() {
        return;
    }

    let threshold = tally.winning_threshold().clone();
    let token = tally.unlock_for_surplus_calculation();
    for (winner, won_round) in winner_to_round {
        if *won_round == current_round {
            continue;
        }
        if *won_round + 1 == current_round {
            let credited_total = sum_winner_credit(cvrs, winner, arith, None);
            let remainder = arith.sub(&credited_total, &threshold);
            if remainder.is_positive() {
                *residual_this_round = arith.add(residual_this_round, &remainder);
                transfers.record(current_round, Allocatee::Candidate(winner.clone()), Allocatee::Residual, &remainder, arith);
            }
            tally.set_candidate_tally_during_surplus_adjustment(&token, winner, threshold.clone());
        } else if let Some(prev) = previous_tally {
            let prev_value = prev.tally_for(winner);
            tally.set_candidate_tally_during_surplus_adjustment(&token, winner, prev_value);
        }
    }
    tally.relock_after_surplus_calculation(token);

    let precinct_names: Vec<String> = precinct_tallies.keys().cloned().collect();
    for precinct in precinct_names {
        let ptally = precinct_tallies.get_mut(&precinct).expect("key came from this map");
        let ptoken = ptally.unlock_for_surplus_calculation();
        for (winner, won_round) in winner_to_round {
            if *won_round == current_round {
                continue;
            }
            if *won_round + 1 == current_round {
                let credited = sum_winner_credit(cvrs, winner, arith, Some(&precinct));
                let remainder = arith.sub(&credited, &threshold);
                if remainder.is_positive() {
                    precinct_transfers.entry(precinct.clone()).or_default().record(
                        current_round,
                        Allocatee::Candidate(winner.clone()),
                        Allocatee::Residual,
                        &remainder,
                        arith,
                    );
                }
                ptally.set_candidate_tally_during_surplus_adjustment(&ptoken, winner, threshold.clone());
            } else if let Some(prev_map) = previous_precinct_tallies {
                if let Some(prev) = prev_map.get(&precinct) {
                    let prev_value = prev.tally_for(winner);
                    ptally.set_candidate_tally_during_surplus_adjustment(&ptoken, winner, prev_value);
                }
            }
        }
        ptally.relock_after_surplus_calculation(ptoken);
    }
}

fn sum_winner_credit(cvrs: &[CastVoteRecord], winner: &CandidateId, arith: &DecimalArith, precinct: Option<&str>) -> Decimal {
    cvrs.iter()
        .filter(|cvr| precinct.map_or(true, |p| cvr.precinct.as_deref() == Some(p)))
        .fold(Decimal::zero(), |acc, cvr| match cvr.winner_to_fractional_value.get(winner) {
            Some(value) => arith.add(&acc, value),
            None => acc,
        })
}
