//! The sparse, ascending-rank structure a cast vote record's marks are
//! normalized into: rank -> the set of candidates marked at that rank.

use super::candidate::CandidateId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub type CandidatesAtRanking = BTreeSet<CandidateId>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateRankings {
    by_rank: BTreeMap<u32, CandidatesAtRanking>,
}

impl CandidateRankings {
    pub fn new(by_rank: BTreeMap<u32, CandidatesAtRanking>) -> Self {
        CandidateRankings { by_rank }
    }

    pub fn empty() -> Self {
        CandidateRankings::default()
    }

    /// Builds from a dense list of (rank, candidates) pairs, dropping any rank
    /// whose candidate set is empty.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (u32, CandidatesAtRanking)>) -> Self {
        let by_rank = pairs.into_iter().filter(|(_, c)| !c.is_empty()).collect();
        CandidateRankings { by_rank }
    }

    pub fn max_rank(&self) -> Option<u32> {
        self.by_rank.keys().next_back().copied()
    }

    pub fn num_rankings(&self) -> usize {
        self.by_rank.len()
    }

    pub fn has_rank(&self, rank: u32) -> bool {
        self.by_rank.contains_key(&rank)
    }

    pub fn at(&self, rank: u32) -> Option<&CandidatesAtRanking> {
        self.by_rank.get(&rank)
    }

    pub fn ranks(&self) -> impl Iterator<Item = (u32, &CandidatesAtRanking)> {
        self.by_rank.iter().map(|(rank, candidates)| (*rank, candidates))
    }

    pub fn all_candidates(&self) -> BTreeSet<CandidateId> {
        self.by_rank.values().flatten().cloned().collect()
    }
}
