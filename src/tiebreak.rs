//! Deterministic resolution of tied candidates (§4.3). Every mode is a pure
//! function of the contest's prior state (round tallies, configured
//! permutation) except `RANDOM`/`GENERATE_PERMUTATION`, which draw from a
//! PRNG seeded once from `random_seed` — so re-running the same config and
//! CVRs always reaches the same answer.

use crate::arith::Decimal;
use crate::config::TiebreakMode;
use crate::model::candidate::CandidateId;
use crate::tally::round_tally::RoundTally;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Callback seam for `INTERACTIVE`/`PREVIOUS_ROUND_COUNTS_THEN_INTERACTIVE`:
/// out-of-band human selection in a real deployment. The default
/// implementation is a deterministic stub suitable for automated runs and
/// tests.
pub trait InteractiveResolver {
    fn resolve(&mut self, tied: &BTreeSet<CandidateId>, selecting_winner: bool) -> CandidateId;
}

pub struct DeterministicStubResolver;

impl InteractiveResolver for DeterministicStubResolver {
    fn resolve(&mut self, tied: &BTreeSet<CandidateId>, _selecting_winner: bool) -> CandidateId {
        tied.iter().next().cloned().expect("tied set must be non-empty")
    }
}

pub struct TiebreakContext {
    mode: TiebreakMode,
    rng: Option<ChaCha8Rng>,
    permutation: Option<Vec<CandidateId>>,
    interactive: Box<dyn InteractiveResolver>,
}

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

impl TiebreakContext {
    pub fn new(mode: TiebreakMode, random_seed: Option<u64>, permutation: Option<Vec<CandidateId>>) -> Self {
        Self::with_interactive_resolver(mode, random_seed, permutation, Box::new(DeterministicStubResolver))
    }

    pub fn with_interactive_resolver(
        mode: TiebreakMode,
        random_seed: Option<u64>,
        mut permutation: Option<Vec<CandidateId>>,
        interactive: Box<dyn InteractiveResolver>,
    ) -> Self {
        let mut rng = random_seed.map(ChaCha8Rng::seed_from_u64);
        if mode == TiebreakMode::GeneratePermutation {
            if let (Some(rng), Some(candidates)) = (rng.as_mut(), permutation.as_mut()) {
                candidates.sort();
                candidates.shuffle(rng);
            }
        }
        TiebreakContext { mode, rng, permutation, interactive }
    }

    /// Resolves a tie among `tied`. `selecting_winner` is true when choosing
    /// among tied highest tallies for a seat, false when choosing among tied
    /// lowest tallies for elimination — several modes treat the two
    /// asymmetrically (e.g. permutation order is read front-to-back for a
    /// winner, back-to-front for a loser). Returns the chosen candidate and a
    /// human-readable explanation of how it was chosen.
    pub fn break_tie(
        &mut self,
        tied: &BTreeSet<CandidateId>,
        selecting_winner: bool,
        current_round: u32,
        round_tallies: &BTreeMap<u32, RoundTally>,
    ) -> (CandidateId, String) {
        assert!(!tied.is_empty(), "cannot break a tie among zero candidates");
        if tied.len() == 1 {
            return (tied.iter().next().unwrap().clone(), "only one candidate was tied".to_string());
        }

        match self.mode {
            TiebreakMode::Random => {
                let chosen = self.pick_random(tied);
                (chosen, "selected uniformly at random from the tied candidates via the seeded RNG".to_string())
            }
            TiebreakMode::Interactive => {
                let chosen = self.interactive.resolve(tied, selecting_winner);
                (chosen, "selected via interactive resolution".to_string())
            }
            TiebreakMode::PreviousRoundCountsThenRandom => {
                let narrowed = narrow_by_previous_rounds(tied, selecting_winner, current_round, round_tallies);
                if narrowed.len() == 1 {
                    let chosen = narrowed.into_iter().next().unwrap();
                    (chosen, "resolved by comparing tallies in earlier rounds".to_string())
                } else {
                    let chosen = self.pick_random(&narrowed);
                    (chosen, "earlier-round tallies remained tied; resolved at random via the seeded RNG".to_string())
                }
            }
            TiebreakMode::PreviousRoundCountsThenInteractive => {
                let narrowed = narrow_by_previous_rounds(tied, selecting_winner, current_round, round_tallies);
                if narrowed.len() == 1 {
                    let chosen = narrowed.into_iter().next().unwrap();
                    (chosen, "resolved by comparing tallies in earlier rounds".to_string())
                } else {
                    let chosen = self.interactive.resolve(&narrowed, selecting_winner);
                    (chosen, "earlier-round tallies remained tied; resolved interactively".to_string())
                }
            }
            TiebreakMode::UsePermutationInConfig => {
                let chosen = self.pick_by_permutation(tied, selecting_winner);
                (chosen, "resolved by the configured candidate permutation".to_string())
            }
            TiebreakMode::GeneratePermutation => {
                let chosen = self.pick_by_permutation(tied, selecting_winner);
                (chosen, "resolved by a permutation shuffled once from the seeded RNG".to_string())
            }
        }
    }

    fn pick_random(&mut self, candidates: &BTreeSet<CandidateId>) -> CandidateId {
        let rng = self.rng.as_mut().expect("random tiebreak requires a configured random_seed");
        let ordered: Vec<&CandidateId> = candidates.iter().collect();
        let idx = rng.gen_range(0..ordered.len());
        ordered[idx].clone()
    }

    fn pick_by_permutation(&self, tied: &BTreeSet<CandidateId>, selecting_winner: bool) -> CandidateId {
        let permutation = self
            .permutation
            .as_ref()
            .expect("permutation-based tiebreak requires a configured or generated permutation");
        if selecting_winner {
            permutation.iter().find(|c| tied.contains(*c)).cloned()
        } else {
            permutation.iter().rev().find(|c| tied.contains(*c)).cloned()
        }
        .expect("tied candidates must all appear in the permutation")
    }
}

fn narrow_by_previous_rounds(
    tied: &BTreeSet<CandidateId>,
    selecting_winner: bool,
    current_round: u32,
    round_tallies: &BTreeMap<u32, RoundTally>,
) -> BTreeSet<CandidateId> {
    let mut candidates = tied.clone();
    let mut round = current_round;
    while candidates.len() > 1 && round > 1 {
        round -= 1;
        let Some(tally) = round_tallies.get(&round) else { break };
        let values: Vec<(Decimal, CandidateId)> =
            candidates.iter().map(|c| (tally.tally_for(c), c.clone())).collect();
        let best = extreme_value(&values, selecting_winner);
        candidates = values
            .into_iter()
            .filter(|(value, _)| Decimal::compare(value, &best) == Ordering::Equal)
            .map(|(_, c)| c)
            .collect();
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tied(names: &[&str]) -> BTreeSet<CandidateId> {
        names.iter().map(|n| CandidateId::new(*n)).collect()
    }

    #[test]
    fn permutation_order_is_reversed_for_losers() {
        let permutation = vec![CandidateId::new("A"), CandidateId::new("B"), CandidateId::new("C")];
        let mut ctx = TiebreakContext::new(TiebreakMode::UsePermutationInConfig, None, Some(permutation));
        let empty = BTreeMap::new();

        let (winner, _) = ctx.break_tie(&tied(&["A", "B"]), true, 1, &empty);
        assert_eq!(winner, CandidateId::new("A"));

        let (loser, _) = ctx.break_tie(&tied(&["A", "B"]), false, 1, &empty);
        assert_eq!(loser, CandidateId::new("B"));
    }

    #[test]
    fn random_tiebreak_is_deterministic_for_a_fixed_seed() {
        let mut a = TiebreakContext::new(TiebreakMode::Random, Some(7), None);
        let mut b = TiebreakContext::new(TiebreakMode::Random, Some(7), None);
        let empty = BTreeMap::new();
        let (first, _) = a.break_tie(&tied(&["A", "B", "C"]), false, 1, &empty);
        let (second, _) = b.break_tie(&tied(&["A", "B", "C"]), false, 1, &empty);
        assert_eq!(first, second);
    }

    #[test]
    fn single_tied_candidate_short_circuits() {
        let mut ctx = TiebreakContext::new(TiebreakMode::Random, Some(1), None);
        let empty = BTreeMap::new();
        let (chosen, _) = ctx.break_tie(&tied(&["A"]), true, 1, &empty);
        assert_eq!(chosen, CandidateId::new("A"));
    }
}
