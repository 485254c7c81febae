//! The validated contest configuration the Tabulator consumes. Every closed
//! choice (overvote handling, tie resolution, winner-election family) is a
//! real enum, not a combination of booleans, so the impossible combinations
//! this engine used to have to guard against at runtime can't be constructed.

use crate::arith::{Decimal, DecimalArith};
use crate::error::TabulationError;
use crate::model::candidate::CandidateId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OvervoteRule {
    ExhaustImmediately,
    AlwaysSkipToNextRank,
    ExhaustIfMultipleContinuing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TiebreakMode {
    Random,
    Interactive,
    PreviousRoundCountsThenRandom,
    PreviousRoundCountsThenInteractive,
    UsePermutationInConfig,
    GeneratePermutation,
}

impl TiebreakMode {
    pub fn needs_random_seed(&self) -> bool {
        matches!(
            self,
            TiebreakMode::Random | TiebreakMode::PreviousRoundCountsThenRandom | TiebreakMode::GeneratePermutation
        )
    }

    pub fn needs_configured_permutation(&self) -> bool {
        matches!(self, TiebreakMode::UsePermutationInConfig)
    }
}

/// The family of rule governing how many candidates are declared winners and
/// when. Mirrors the six modes real ranked-choice tabulators expose; kept as
/// one enum (rather than the handful of booleans a literal reading of the
/// distilled config list would suggest) so a contest can't be configured into
/// a combination — e.g. "sequential" and "bottoms-up" at once — the round
/// loop has no rule for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinnerElectionMode {
    SingleWinnerMajority,
    MultiSeatAllowOnlyOneWinnerPerRound,
    MultiSeatAllowMultipleWinnersPerRound,
    MultiSeatSequentialWinnerTakesAll,
    MultiSeatBottomsUp,
    MultiSeatBottomsUpUsingPercentageThreshold,
}

impl WinnerElectionMode {
    pub fn is_multi_seat(&self) -> bool {
        !matches!(self, WinnerElectionMode::SingleWinnerMajority)
    }

    pub fn is_bottoms_up_with_threshold(&self) -> bool {
        matches!(self, WinnerElectionMode::MultiSeatBottomsUpUsingPercentageThreshold)
    }

    /// "Bottoms-up to N": winners are only ever declared once exactly N
    /// candidates remain continuing; this mode never selects winners by
    /// threshold comparison mid-contest.
    pub fn is_bottoms_up_until_n(&self) -> bool {
        matches!(self, WinnerElectionMode::MultiSeatBottomsUp)
    }

    pub fn one_winner_per_round(&self) -> bool {
        matches!(
            self,
            WinnerElectionMode::MultiSeatAllowOnlyOneWinnerPerRound
                | WinnerElectionMode::MultiSeatSequentialWinnerTakesAll
        )
    }

    pub fn is_sequential(&self) -> bool {
        matches!(self, WinnerElectionMode::MultiSeatSequentialWinnerTakesAll)
    }

    /// Whether winning a seat under this mode triggers surplus distribution
    /// to the winner's continuing ballots, as opposed to the winner simply
    /// being removed with their ballots carried forward unchanged.
    pub fn distributes_surplus(&self) -> bool {
        self.is_multi_seat() && !self.is_bottoms_up_with_threshold() && !self.is_bottoms_up_until_n()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContestConfig {
    pub num_winners: u32,
    pub candidate_names: BTreeSet<CandidateId>,
    #[serde(default)]
    pub excluded_candidates: BTreeSet<CandidateId>,
    #[serde(default)]
    pub candidate_display_names: BTreeMap<CandidateId, String>,

    pub overvote_rule: OvervoteRule,
    pub tiebreak_mode: TiebreakMode,
    pub winner_election_mode: WinnerElectionMode,

    /// `None` means no limit (infinite skipped ranks tolerated).
    #[serde(default)]
    pub max_skipped_ranks_allowed: Option<u32>,
    pub max_rankings_allowed: u32,
    #[serde(default)]
    pub exhaust_on_duplicate_ranking: bool,

    #[serde(default)]
    pub batch_elimination_enabled: bool,
    #[serde(default)]
    pub continue_until_two: bool,
    #[serde(default)]
    pub first_round_determines_threshold: bool,
    #[serde(default)]
    pub hare_quota_enabled: bool,

    /// Required when `winner_election_mode` is
    /// `MultiSeatBottomsUpUsingPercentageThreshold`; unused otherwise.
    #[serde(default)]
    pub bottoms_up_percentage_threshold: Option<Decimal>,

    #[serde(default)]
    pub tabulate_by_precinct_enabled: bool,
    #[serde(default)]
    pub generate_cdf_json_enabled: bool,

    #[serde(default = "Decimal::zero")]
    pub minimum_vote_threshold: Decimal,
    pub decimal_places: u32,
    #[serde(default)]
    pub non_integer_thresholds_enabled: bool,

    /// Required by any `TiebreakMode` for which `needs_random_seed()` is true.
    #[serde(default)]
    pub random_seed: Option<u64>,
    /// Required by `USE_PERMUTATION_IN_CONFIG`; must name every candidate in
    /// `candidate_names` exactly once. `GENERATE_PERMUTATION` also uses this
    /// field as scratch space, overwriting it with a seeded shuffle at the
    /// start of tabulation.
    #[serde(default)]
    pub candidate_permutation: Option<Vec<CandidateId>>,

    #[serde(default)]
    pub stop_tabulation_early_after_round: Option<u32>,
}

impl ContestConfig {
    pub fn num_candidates(&self) -> u32 {
        self.candidate_names.len() as u32
    }

    pub fn candidate_is_excluded(&self, candidate: &CandidateId) -> bool {
        self.excluded_candidates.contains(candidate)
    }

    pub fn display_name<'a>(&'a self, candidate: &'a CandidateId) -> &'a str {
        self.candidate_display_names
            .get(candidate)
            .map(|s| s.as_str())
            .unwrap_or(candidate.0.as_str())
    }

    pub fn arith(&self) -> DecimalArith {
        DecimalArith::new(self.decimal_places, self.non_integer_thresholds_enabled)
    }

    pub fn validate(&self) -> Result<(), TabulationError> {
        if self.num_winners == 0 {
            return Err(TabulationError::InvalidConfig("num_winners must be at least 1".into()));
        }
        if self.candidate_names.is_empty() {
            return Err(TabulationError::InvalidConfig("candidate_names must be non-empty".into()));
        }
        if self.candidate_names.iter().any(CandidateId::is_sentinel) {
            return Err(TabulationError::InvalidConfig(
                "candidate_names must not include the reserved sentinel identifiers".into(),
            ));
        }
        if !self.excluded_candidates.is_subset(&self.candidate_names) {
            return Err(TabulationError::InvalidConfig(
                "excluded_candidates must be a subset of candidate_names".into(),
            ));
        }
        if self.decimal_places > 20 {
            return Err(TabulationError::InvalidConfig("decimal_places is unreasonably large".into()));
        }
        if self.max_rankings_allowed == 0 {
            return Err(TabulationError::InvalidConfig("max_rankings_allowed must be at least 1".into()));
        }
        if self.num_winners as usize > self.candidate_names.len() {
            return Err(TabulationError::InvalidConfig(
                "num_winners cannot exceed the number of declared candidates".into(),
            ));
        }

        if self.winner_election_mode.is_bottoms_up_with_threshold() {
            if self.bottoms_up_percentage_threshold.is_none() {
                return Err(TabulationError::InvalidConfig(
                    "bottoms_up_percentage_threshold is required for MULTI_SEAT_BOTTOMS_UP_USING_PERCENTAGE_THRESHOLD"
                        .into(),
                ));
            }
        } else if self.bottoms_up_percentage_threshold.is_some() {
            return Err(TabulationError::InvalidConfig(
                "bottoms_up_percentage_threshold is only meaningful for MULTI_SEAT_BOTTOMS_UP_USING_PERCENTAGE_THRESHOLD"
                    .into(),
            ));
        }

        if self.tiebreak_mode.needs_random_seed() && self.random_seed.is_none() {
            return Err(TabulationError::InvalidConfig(format!(
                "{:?} requires random_seed to be set",
                self.tiebreak_mode
            )));
        }

        if self.tiebreak_mode.needs_configured_permutation() {
            match &self.candidate_permutation {
                None => {
                    return Err(TabulationError::InvalidConfig(
                        "USE_PERMUTATION_IN_CONFIG requires candidate_permutation to be set".into(),
                    ))
                }
                Some(permutation) => self.validate_permutation(permutation)?,
            }
        }

        Ok(())
    }

    fn validate_permutation(&self, permutation: &[CandidateId]) -> Result<(), TabulationError> {
        let as_set: BTreeSet<CandidateId> = permutation.iter().cloned().collect();
        if as_set.len() != permutation.len() {
            return Err(TabulationError::InvalidConfig(
                "candidate_permutation contains a duplicate candidate".into(),
            ));
        }
        if as_set != self.candidate_names {
            return Err(TabulationError::InvalidConfig(
                "candidate_permutation must name every declared candidate exactly once".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ContestConfig {
        ContestConfig {
            num_winners: 1,
            candidate_names: ["A", "B", "C"].iter().map(|n| CandidateId::new(*n)).collect(),
            excluded_candidates: BTreeSet::new(),
            candidate_display_names: BTreeMap::new(),
            overvote_rule: OvervoteRule::ExhaustImmediately,
            tiebreak_mode: TiebreakMode::Random,
            winner_election_mode: WinnerElectionMode::SingleWinnerMajority,
            max_skipped_ranks_allowed: Some(1),
            max_rankings_allowed: 3,
            exhaust_on_duplicate_ranking: true,
            batch_elimination_enabled: true,
            continue_until_two: false,
            first_round_determines_threshold: false,
            hare_quota_enabled: false,
            bottoms_up_percentage_threshold: None,
            tabulate_by_precinct_enabled: false,
            generate_cdf_json_enabled: false,
            minimum_vote_threshold: Decimal::zero(),
            decimal_places: 4,
            non_integer_thresholds_enabled: true,
            random_seed: Some(42),
            candidate_permutation: None,
            stop_tabulation_early_after_round: None,
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn random_mode_without_seed_is_rejected() {
        let mut config = base_config();
        config.random_seed = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn percentage_threshold_required_only_for_its_own_mode() {
        let mut config = base_config();
        config.bottoms_up_percentage_threshold = Some("0.1".parse().unwrap());
        assert!(config.validate().is_err());

        config.winner_election_mode = WinnerElectionMode::MultiSeatBottomsUpUsingPercentageThreshold;
        assert!(config.validate().is_ok());

        config.bottoms_up_percentage_threshold = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn permutation_must_cover_exactly_the_declared_candidates() {
        let mut config = base_config();
        config.tiebreak_mode = TiebreakMode::UsePermutationInConfig;
        config.candidate_permutation = Some(vec![CandidateId::new("A"), CandidateId::new("B")]);
        assert!(config.validate().is_err());

        config.candidate_permutation = Some(vec![
            CandidateId::new("A"),
            CandidateId::new("B"),
            CandidateId::new("C"),
        ]);
        assert!(config.validate().is_ok());
    }
}
