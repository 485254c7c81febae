//! Per-precinct accumulation of a round's already-decided ballot
//! contributions. Folded with `rayon` because summing `Decimal` amounts into
//! per-precinct `RoundTally`s is associative and commutative regardless of
//! which thread handles which ballot — the contest-level outcome never
//! depends on this step, which exists purely for precinct-level reporting.

use crate::arith::{Decimal, DecimalArith};
use crate::tabulator::compute_round::{Contribution, ContributionKind};
use crate::tally::round_tally::RoundTally;
use rayon::prelude::*;
use std::collections::BTreeMap;

pub fn accumulate_precinct_tallies(
    contributions: &[Contribution],
    round: u32,
    threshold: &Decimal,
    arith: &DecimalArith,
) -> BTreeMap<String, RoundTally> {
    contributions
        .par_iter()
        .filter_map(|c| c.precinct.as_ref().map(|p| (p.clone(), c)))
        .fold(BTreeMap::<String, RoundTally>::new, |mut acc, (precinct, contribution)| {
            let tally = acc.entry(precinct).or_insert_with(|| RoundTally::new(round, threshold.clone()));
            match &contribution.kind {
                ContributionKind::Candidate(candidate) => tally.add_to_candidate(candidate, &contribution.amount, arith),
                ContributionKind::Inactive(reason) => tally.add_inactive(*reason, &contribution.amount, arith),
            }
            acc
        })
        .reduce(BTreeMap::new, |mut a, b| {
            for (precinct, tally_b) in b {
                match a.get_mut(&precinct) {
                    Some(tally_a) => tally_a.merge_from(&tally_b, arith),
                    None => {
                        a.insert(precinct, tally_b);
                    }
                }
            }
            a
        })
}
