//! Vote tallying
//!
//! A [`VoteSnapshot`] is the joined result of reading every guardian's vote
//! in one recover process together with the threshold. All counting happens
//! here, on plain data, so the decision logic is independent of the ledger.

use serde::{Deserialize, Serialize};
use upguard_core::{Address, RecoverProcessId};

/// Progress of a recover process, measured on votes cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecoveryStatus {
    /// No guardian has cast a valid vote
    NoVotes,
    /// Votes exist but no candidate has reached the threshold
    PartialVotes,
    /// Some candidate holds at least `threshold` votes
    ThresholdReached,
}

/// One guardian's current vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianVote {
    /// Voting guardian
    pub guardian: Address,
    /// Candidate voted for; `None` when the guardian has not voted
    pub candidate: Option<Address>,
}

impl GuardianVote {
    /// Build from the raw ledger value, where the zero address means no vote.
    pub fn from_raw(guardian: Address, raw: Address) -> Self {
        Self {
            guardian,
            candidate: (!raw.is_zero()).then_some(raw),
        }
    }
}

/// Guardians' votes in one recover process plus the vault threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSnapshot {
    /// Process the votes belong to
    pub process_id: RecoverProcessId,
    /// Votes needed for a candidate to recover
    pub threshold: u64,
    /// One entry per guardian, in guardian order
    pub votes: Vec<GuardianVote>,
}

impl VoteSnapshot {
    /// Create a snapshot.
    pub fn new(process_id: RecoverProcessId, threshold: u64, votes: Vec<GuardianVote>) -> Self {
        Self {
            process_id,
            threshold,
            votes,
        }
    }

    /// Guardians that voted for any candidate.
    pub fn total_votes(&self) -> usize {
        self.votes.iter().filter(|v| v.candidate.is_some()).count()
    }

    /// Guardians that voted for `candidate`.
    pub fn votes_for(&self, candidate: Address) -> usize {
        self.votes
            .iter()
            .filter(|v| v.candidate == Some(candidate))
            .count()
    }

    /// Whether `candidate` has at least `threshold` votes.
    pub fn can_recover(&self, candidate: Address) -> bool {
        self.votes_for(candidate) as u64 >= self.threshold
    }

    /// Candidates with their vote counts, in order of first vote.
    pub fn candidates(&self) -> Vec<(Address, usize)> {
        let mut counts: Vec<(Address, usize)> = Vec::new();
        for candidate in self.votes.iter().filter_map(|v| v.candidate) {
            match counts.iter_mut().find(|(c, _)| *c == candidate) {
                Some((_, count)) => *count += 1,
                None => counts.push((candidate, 1)),
            }
        }
        counts
    }

    /// Candidate with the most votes; ties go to the one voted for first.
    pub fn leading_candidate(&self) -> Option<(Address, usize)> {
        self.candidates()
            .into_iter()
            .fold(None, |best, (candidate, count)| match best {
                Some((_, top)) if top >= count => best,
                _ => Some((candidate, count)),
            })
    }

    /// Where the process stands.
    pub fn status(&self) -> RecoveryStatus {
        if self.total_votes() == 0 {
            return RecoveryStatus::NoVotes;
        }
        match self.leading_candidate() {
            Some((_, count)) if count as u64 >= self.threshold => RecoveryStatus::ThresholdReached,
            _ => RecoveryStatus::PartialVotes,
        }
    }
}
