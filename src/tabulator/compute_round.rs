//! The per-round, per-ballot tally computation (§4.5). Every continuing
//! ballot is walked exactly once per round; because a ballot that already has
//! a continuing recipient short-circuits immediately, this single routine
//! also *is* the redistribution mechanism after an elimination or a surplus
//! reduction — there is no separate "redistribute eliminated candidate's
//! ballots" step.

use crate::config::ContestConfig;
use crate::error::TabulationError;
use crate::model::candidate::CandidateId;
use crate::model::cvr::{CastVoteRecord, InactiveReason};
use crate::model::rankings::CandidatesAtRanking;
use crate::overvote::{self, OvervoteDecision};
use crate::tally::transfers::Allocatee;
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub enum ContributionKind {
    Candidate(CandidateId),
    Inactive(InactiveReason),
}

/// One ballot's final allocation for a round, recorded independently of the
/// (necessarily sequential) per-ballot walk so it can be folded into
/// per-precinct tallies in parallel afterward.
#[derive(Debug, Clone)]
pub struct Contribution {
    pub precinct: Option<String>,
    pub kind: ContributionKind,
    pub amount: crate::arith::Decimal,
}

pub struct TransferRecord {
    pub source: Allocatee,
    pub target: Allocatee,
    pub amount: crate::arith::Decimal,
    pub precinct: Option<String>,
}

pub struct RoundWalkResult {
    pub contributions: Vec<Contribution>,
    pub transfers: Vec<TransferRecord>,
}

pub fn walk_all_ballots(
    config: &ContestConfig,
    round: u32,
    cvrs: &mut [CastVoteRecord],
    continuing: &BTreeSet<CandidateId>,
) -> Result<RoundWalkResult, TabulationError> {
    let mut contributions = Vec::with_capacity(cvrs.len());
    let mut transfers = Vec::new();

    for cvr in cvrs.iter_mut() {
        if !cvr.is_active() {
            let reason = cvr.inactive_reason().expect("an inactive ballot must carry a reason");
            contributions.push(Contribution {
                precinct: cvr.precinct.clone(),
                kind: ContributionKind::Inactive(reason),
                amount: cvr.fractional_transfer_value.clone(),
            });
            continue;
        }

        let prior_recipient = cvr.current_recipient.clone();

        if let Some(recipient) = &prior_recipient {
            if continuing.contains(recipient) {
                contributions.push(Contribution {
                    precinct: cvr.precinct.clone(),
                    kind: ContributionKind::Candidate(recipient.clone()),
                    amount: cvr.fractional_transfer_value.clone(),
                });
                continue;
            }
        }

        if cvr.rankings.num_rankings() == 0 {
            cvr.mark_inactive(round, InactiveReason::Undervote, "ballot carries no rankings".to_string());
            contributions.push(Contribution {
                precinct: cvr.precinct.clone(),
                kind: ContributionKind::Inactive(InactiveReason::Undervote),
                amount: cvr.fractional_transfer_value.clone(),
            });
            if let Some(prior) = prior_recipient {
                transfers.push(TransferRecord {
                    source: Allocatee::Candidate(prior),
                    target: Allocatee::Exhausted,
                    amount: cvr.fractional_transfer_value.clone(),
                    precinct: cvr.precinct.clone(),
                });
            }
            continue;
        }

        let outcome = walk_rankings(config, cvr, continuing)?;
        match outcome {
            WalkOutcome::Assigned(candidate) => {
                cvr.set_active_recipient(round, candidate.clone(), format!("counted for {candidate}"));
                contributions.push(Contribution {
                    precinct: cvr.precinct.clone(),
                    kind: ContributionKind::Candidate(candidate.clone()),
                    amount: cvr.fractional_transfer_value.clone(),
                });
                if let Some(prior) = prior_recipient {
                    transfers.push(TransferRecord {
                        source: Allocatee::Candidate(prior),
                        target: Allocatee::Candidate(candidate),
                        amount: cvr.fractional_transfer_value.clone(),
                        precinct: cvr.precinct.clone(),
                    });
                }
            }
            WalkOutcome::Inactive(reason, description) => {
                cvr.mark_inactive(round, reason, description);
                contributions.push(Contribution {
                    precinct: cvr.precinct.clone(),
                    kind: ContributionKind::Inactive(reason),
                    amount: cvr.fractional_transfer_value.clone(),
                });
                if let Some(prior) = prior_recipient {
                    transfers.push(TransferRecord {
                        source: Allocatee::Candidate(prior),
                        target: Allocatee::Exhausted,
                        amount: cvr.fractional_transfer_value.clone(),
                        precinct: cvr.precinct.clone(),
                    });
                }
            }
        }

        if config.generate_cdf_json_enabled {
            cvr.snapshot_cdf(round);
        }
    }

    Ok(RoundWalkResult { contributions, transfers })
}

enum WalkOutcome {
    Assigned(CandidateId),
    Inactive(InactiveReason, String),
}

fn walk_rankings(
    config: &ContestConfig,
    cvr: &CastVoteRecord,
    continuing: &BTreeSet<CandidateId>,
) -> Result<WalkOutcome, TabulationError> {
    let mut last_rank_seen: u32 = 0;
    let mut candidates_seen: BTreeSet<CandidateId> = BTreeSet::new();
    let ranks: Vec<(u32, &CandidatesAtRanking)> = cvr.rankings.ranks().collect();

    for (idx, (rank, candidates_at_rank)) in ranks.iter().enumerate() {
        let rank = *rank;
        let is_final_rank = idx + 1 == ranks.len();

        if let Some(limit) = config.max_skipped_ranks_allowed {
            if rank.saturating_sub(last_rank_seen) > limit + 1 {
                return Ok(WalkOutcome::Inactive(
                    InactiveReason::SkippedRanking,
                    format!("more than {limit} ranks were skipped before rank {rank}"),
                ));
            }
        }
        last_rank_seen = rank;

        if config.exhaust_on_duplicate_ranking {
            if let Some(dup) = candidates_at_rank.iter().find(|c| candidates_seen.contains(*c)) {
                return Ok(WalkOutcome::Inactive(
                    InactiveReason::RepeatedRanking,
                    format!("candidate {dup} was ranked more than once"),
                ));
            }
        }
        candidates_seen.extend(candidates_at_rank.iter().cloned());

        match overvote::decide(candidates_at_rank, config.overvote_rule, continuing)? {
            OvervoteDecision::Exhaust => {
                return Ok(WalkOutcome::Inactive(InactiveReason::Overvote, format!("overvote at rank {rank}")));
            }
            OvervoteDecision::SkipToNextRank => {
                if is_final_rank {
                    return Ok(WalkOutcome::Inactive(
                        InactiveReason::ExhaustedChoices,
                        "overvote at the ballot's final marked rank under skip-to-next-rank".to_string(),
                    ));
                }
                continue;
            }
            OvervoteDecision::None => {
                if let Some(choice) = candidates_at_rank.iter().find(|c| continuing.contains(*c)) {
                    return Ok(WalkOutcome::Assigned(choice.clone()));
                }
                if is_final_rank {
                    let max_rankings = config.max_rankings_allowed;
                    let skip_limit = config.max_skipped_ranks_allowed.map(|v| v as i64).unwrap_or(i64::MAX);
                    let is_undervote = (max_rankings.saturating_sub(rank)) as i64 > skip_limit;
                    return if is_undervote {
                        Ok(WalkOutcome::Inactive(
                            InactiveReason::Undervote,
                            "ballot left blank after its last marked rank".to_string(),
                        ))
                    } else {
                        Ok(WalkOutcome::Inactive(
                            InactiveReason::ExhaustedChoices,
                            "every ranked candidate was eliminated or already won a seat".to_string(),
                        ))
                    };
                }
            }
        }
    }

    Ok(WalkOutcome::Inactive(
        InactiveReason::ExhaustedChoices,
        "ballot exhausted all ranked choices".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OvervoteRule, TiebreakMode, WinnerElectionMode};
    use crate::model::rankings::CandidateRankings;
    use std::collections::BTreeMap;

    fn config() -> ContestConfig {
        ContestConfig {
            num_winners: 1,
            candidate_names: ["A", "B"].iter().map(|n| CandidateId::new(*n)).collect(),
            excluded_candidates: Default::default(),
            candidate_display_names: BTreeMap::new(),
            overvote_rule: OvervoteRule::ExhaustImmediately,
            tiebreak_mode: TiebreakMode::Random,
            winner_election_mode: WinnerElectionMode::SingleWinnerMajority,
            max_skipped_ranks_allowed: Some(0),
            max_rankings_allowed: 3,
            exhaust_on_duplicate_ranking: true,
            batch_elimination_enabled: false,
            continue_until_two: false,
            first_round_determines_threshold: false,
            hare_quota_enabled: false,
            bottoms_up_percentage_threshold: None,
            tabulate_by_precinct_enabled: false,
            generate_cdf_json_enabled: false,
            minimum_vote_threshold: crate::arith::Decimal::zero(),
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
    fn a_fresh_ballot_is_assigned_to_its_first_continuing_choice() {
        let config = config();
        let continuing: BTreeSet<CandidateId> = ["A", "B"].iter().map(|n| CandidateId::new(*n)).collect();
        let mut cvrs = vec![CastVoteRecord::new("1", None, rank(&[(1, &["A"]), (2, &["B"])]))];
        let result = walk_all_ballots(&config, 1, &mut cvrs, &continuing).unwrap();
        assert!(matches!(result.contributions[0].kind, ContributionKind::Candidate(ref c) if *c == CandidateId::new("A")));
        assert!(result.transfers.is_empty());
    }

    #[test]
    fn a_ballot_re_walks_when_its_recipient_is_no_longer_continuing() {
        let config = config();
        let mut cvr = CastVoteRecord::new("1", None, rank(&[(1, &["A"]), (2, &["B"])]));
        cvr.current_recipient = Some(CandidateId::new("A"));
        let mut cvrs = vec![cvr];
        let continuing: BTreeSet<CandidateId> = ["B"].iter().map(|n| CandidateId::new(*n)).collect();
        let result = walk_all_ballots(&config, 2, &mut cvrs, &continuing).unwrap();
        assert!(matches!(result.contributions[0].kind, ContributionKind::Candidate(ref c) if *c == CandidateId::new("B")));
        assert_eq!(result.transfers.len(), 1);
        assert_eq!(result.transfers[0].source, Allocatee::Candidate(CandidateId::new("A")));
        assert_eq!(result.transfers[0].target, Allocatee::Candidate(CandidateId::new("B")));
    }

    #[test]
    fn skipping_too_many_ranks_makes_the_ballot_inactive() {
        let config = config(); // max_skipped_ranks_allowed: 0
        let continuing: BTreeSet<CandidateId> = ["A", "B"].iter().map(|n| CandidateId::new(*n)).collect();
        // Ballot's first mark is at rank 3, skipping ranks 1-2 with none allowed.
        let mut cvrs = vec![CastVoteRecord::new("1", None, rank(&[(3, &["B"])]))];
        let result = walk_all_ballots(&config, 1, &mut cvrs, &continuing).unwrap();
        assert!(matches!(
            result.contributions[0].kind,
            ContributionKind::Inactive(InactiveReason::SkippedRanking)
        ));
    }
}
