//! The overvote decision table (§4.2): what to do when a ballot carries more
//! than one mark at the same rank.

use crate::config::OvervoteRule;
use crate::error::TabulationError;
use crate::model::candidate::CandidateId;
use crate::model::rankings::CandidatesAtRanking;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OvervoteDecision {
    /// No overvote at this rank; proceed normally.
    None,
    /// Ballot becomes inactive immediately.
    Exhaust,
    /// Skip this rank and continue walking the ballot.
    SkipToNextRank,
}

/// Decides what an overvote at one rank does to the ballot, given the
/// configured rule and which candidates are still continuing.
///
/// Returns `Err` if the explicit-overvote sentinel appears alongside another
/// candidate at the same rank (an input error the config can't resolve), or
/// if it appears alone under a rule that requires knowing whether other
/// *real* candidates tied at the rank — that case can't arise from the
/// sentinel alone, so it is itself a fatal inconsistency.
pub fn decide(
    candidates_at_rank: &CandidatesAtRanking,
    rule: OvervoteRule,
    continuing: &BTreeSet<CandidateId>,
) -> Result<OvervoteDecision, TabulationError> {
    let has_sentinel = candidates_at_rank.iter().any(CandidateId::is_explicit_overvote);

    if has_sentinel {
        if candidates_at_rank.len() != 1 {
            return Err(TabulationError::InconsistentOvervoteRule);
        }
        return match rule {
            OvervoteRule::ExhaustImmediately => Ok(OvervoteDecision::Exhaust),
            OvervoteRule::AlwaysSkipToNextRank => Ok(OvervoteDecision::SkipToNextRank),
            OvervoteRule::ExhaustIfMultipleContinuing => Err(TabulationError::InconsistentOvervoteRule),
        };
    }

    if candidates_at_rank.len() <= 1 {
        return Ok(OvervoteDecision::None);
    }

    match rule {
        OvervoteRule::ExhaustImmediately => Ok(OvervoteDecision::Exhaust),
        OvervoteRule::AlwaysSkipToNextRank => Ok(OvervoteDecision::SkipToNextRank),
        OvervoteRule::ExhaustIfMultipleContinuing => {
            let continuing_count = candidates_at_rank.iter().filter(|c| continuing.contains(*c)).count();
            if continuing_count >= 2 {
                Ok(OvervoteDecision::Exhaust)
            } else {
                Ok(OvervoteDecision::None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> CandidatesAtRanking {
        names.iter().map(|n| CandidateId::new(*n)).collect()
    }

    #[test]
    fn single_candidate_is_never_an_overvote() {
        let continuing = set(&["A"]);
        let result = decide(&set(&["A"]), OvervoteRule::ExhaustImmediately, &continuing).unwrap();
        assert_eq!(result, OvervoteDecision::None);
    }

    #[test]
    fn exhaust_if_multiple_continuing_only_fires_when_two_are_still_in() {
        let continuing = set(&["A"]);
        let result = decide(&set(&["A", "B"]), OvervoteRule::ExhaustIfMultipleContinuing, &continuing).unwrap();
        assert_eq!(result, OvervoteDecision::None);

        let continuing = set(&["A", "B"]);
        let result = decide(&set(&["A", "B"]), OvervoteRule::ExhaustIfMultipleContinuing, &continuing).unwrap();
        assert_eq!(result, OvervoteDecision::Exhaust);
    }

    #[test]
    fn sentinel_with_another_candidate_is_fatal() {
        let continuing = set(&["A"]);
        let mixed: CandidatesAtRanking = [CandidateId::explicit_overvote(), CandidateId::new("A")].into_iter().collect();
        assert!(decide(&mixed, OvervoteRule::ExhaustImmediately, &continuing).is_err());
    }

    #[test]
    fn sentinel_alone_under_exhaust_if_multiple_continuing_is_fatal() {
        let continuing = set(&["A"]);
        let sentinel: CandidatesAtRanking = [CandidateId::explicit_overvote()].into_iter().collect();
        assert!(decide(&sentinel, OvervoteRule::ExhaustIfMultipleContinuing, &continuing).is_err());
    }
}
