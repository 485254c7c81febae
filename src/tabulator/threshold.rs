//! Winning-threshold computation (§4.6): Droop or Hare quota, or a flat
//! percentage of active ballots for bottoms-up-with-threshold contests.
//! Never below `minimum_vote_threshold`.

use crate::arith::{Decimal, DecimalArith, Rounding};
use crate::config::{ContestConfig, WinnerElectionMode};

pub fn compute_threshold(config: &ContestConfig, arith: &DecimalArith, active_ballots: &Decimal) -> Decimal {
    if config.winner_election_mode.is_bottoms_up_with_threshold() {
        let percentage = config
            .bottoms_up_percentage_threshold
            .clone()
            .expect("validated: percentage threshold is required for this mode");
        let threshold = arith.mul(active_ballots, &percentage);
        return Decimal::max(&threshold, &config.minimum_vote_threshold);
    }

    let divisor = if config.hare_quota_enabled {
        Decimal::from_u64(config.num_winners as u64)
    } else {
        Decimal::from_u64(config.num_winners as u64 + 1)
    };

    let scale = arith.threshold_scale();
    let threshold = if config.hare_quota_enabled {
        arith.divide(active_ballots, &divisor, scale, Rounding::Up)
    } else {
        let base = arith.divide(active_ballots, &divisor, 0, Rounding::Down);
        let smallest_unit = Decimal::new(1, scale);
        arith.add(&base, &smallest_unit)
    };

    Decimal::max(&threshold, &config.minimum_vote_threshold)
}

/// Whether the threshold should be recomputed this round, or carried forward
/// from a prior round unchanged.
pub fn should_recompute_threshold(config: &ContestConfig, current_round: u32) -> bool {
    if current_round == 1 {
        return true;
    }
    if config.winner_election_mode.is_multi_seat() {
        false
    } else {
        !config.first_round_determines_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::candidate::CandidateId;
    use std::collections::BTreeMap;

    fn single_winner_config() -> ContestConfig {
        crate::config::ContestConfig {
            num_winners: 1,
            candidate_names: ["A", "B"].iter().map(|n| CandidateId::new(*n)).collect(),
            excluded_candidates: Default::default(),
            candidate_display_names: BTreeMap::new(),
            overvote_rule: crate::config::OvervoteRule::ExhaustImmediately,
            tiebreak_mode: crate::config::TiebreakMode::Random,
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

    #[test]
    fn droop_quota_matches_the_floor_plus_one_unit_example() {
        let config = single_winner_config();
        let arith = config.arith();
        let threshold = compute_threshold(&config, &arith, &Decimal::from_i64(5));
        assert_eq!(threshold.to_string(), "2.0001");
    }

    #[test]
    fn hare_quota_divides_by_num_winners_and_rounds_up() {
        let mut config = single_winner_config();
        config.num_winners = 2;
        config.hare_quota_enabled = true;
        let arith = config.arith();
        let threshold = compute_threshold(&config, &arith, &Decimal::from_i64(5));
        assert_eq!(threshold.to_string(), "2.5000");
    }

    #[test]
    fn threshold_never_drops_below_the_configured_minimum() {
        let mut config = single_winner_config();
        config.minimum_vote_threshold = Decimal::from_i64(100);
        let arith = config.arith();
        let threshold = compute_threshold(&config, &arith, &Decimal::from_i64(5));
        assert_eq!(threshold, Decimal::from_i64(100));
    }
}
