//! Vote aggregation for the current election round.
//!
//! The pool holds at most one vote per voter: exact replays are dropped by
//! signature, and a newer timestamp from the same voter replaces the older
//! entry. Tallying classifies the pool as agreed, unwinnable, or still
//! open.

use rotor_types::{DposVote, DposVoteReply, Hash, VoteItem};
use std::collections::BTreeMap;

/// Result of offering a vote to a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// New voter, appended.
    Added,
    /// Same voter with a newer timestamp, replaced the old entry.
    Replaced,
    /// Byte-identical signature already present.
    DuplicateSignature,
    /// Same voter with an equal or older timestamp.
    DuplicateVoter,
    /// Vote window predates the last committed round.
    Stale,
}

impl Admission {
    /// Whether the pool changed.
    pub fn accepted(&self) -> bool {
        matches!(self, Admission::Added | Admission::Replaced)
    }
}

/// Tally classification for the current pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// No decision yet; keep collecting.
    Continue,
    /// A super-majority agreed on this item.
    Success(VoteItem),
    /// No item can still reach a super-majority.
    Fail,
}

/// Ordered collection of votes for one election round.
#[derive(Debug, Default)]
pub struct VotePool {
    entries: Vec<DposVote>,
}

impl VotePool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of votes held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all votes.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate over the held votes.
    pub fn iter(&self) -> impl Iterator<Item = &DposVote> {
        self.entries.iter()
    }

    /// Remove and return all held votes.
    pub fn drain(&mut self) -> Vec<DposVote> {
        std::mem::take(&mut self.entries)
    }

    /// Offer a vote to the pool.
    ///
    /// `floor`, when present, is the period stop of the last agreed round:
    /// votes whose window starts before it are stale and rejected. Dedup is
    /// by exact signature first, then by voter address with
    /// newer-timestamp-wins replacement.
    pub fn admit(&mut self, vote: DposVote, floor: Option<i64>) -> Admission {
        if let Some(floor) = floor {
            if vote.item.period_start < floor {
                return Admission::Stale;
            }
        }

        for i in 0..self.entries.len() {
            if self.entries[i].signature == vote.signature {
                return Admission::DuplicateSignature;
            }
            if self.entries[i].voter_node_address == vote.voter_node_address {
                if vote.vote_timestamp > self.entries[i].vote_timestamp {
                    self.entries[i] = vote;
                    return Admission::Replaced;
                }
                return Admission::DuplicateVoter;
            }
        }

        self.entries.push(vote);
        Admission::Added
    }

    /// Classify the pool against a delegate count of `delegate_num`.
    ///
    /// With `N = delegate_num` and `M = ⌊N·2/3⌋`: fewer than `M` votes is
    /// always open; a vote id reaching `M` wins; a leader that cannot reach
    /// `M` even if every outstanding delegate endorsed it is a failed round.
    /// Counts are grouped in a `BTreeMap` so the argmax scan is
    /// deterministic across nodes.
    pub fn tally(&self, delegate_num: u32) -> VoteOutcome {
        let majority = (delegate_num * 2 / 3) as usize;

        if self.entries.is_empty() || self.entries.len() < majority {
            return VoteOutcome::Continue;
        }

        let mut counts: BTreeMap<Hash, usize> = BTreeMap::new();
        for vote in &self.entries {
            *counts.entry(vote.item.vote_id).or_insert(0) += 1;
        }

        let mut best_id = Hash::ZERO;
        let mut best = 0usize;
        for (id, count) in &counts {
            if *count > best {
                best = *count;
                best_id = *id;
            }
        }

        if best >= majority {
            let winner = self
                .entries
                .iter()
                .find(|v| v.item.vote_id == best_id)
                .expect("winning id came from the pool");
            return VoteOutcome::Success(winner.item.clone());
        }

        let outstanding = (delegate_num as usize).saturating_sub(self.entries.len());
        if best + outstanding < majority {
            return VoteOutcome::Fail;
        }

        VoteOutcome::Continue
    }
}

/// Acknowledgements collected during the confirmation phase.
///
/// Same dedup discipline as the vote pool: one entry per replier, exact
/// replays dropped, newer timestamps replace.
#[derive(Debug, Default)]
pub struct ReplyPool {
    entries: Vec<DposVoteReply>,
}

impl ReplyPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of replies held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drop all replies.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Offer a reply to the pool.
    pub fn admit(&mut self, reply: DposVoteReply) -> Admission {
        for i in 0..self.entries.len() {
            if self.entries[i].signature == reply.signature {
                return Admission::DuplicateSignature;
            }
            if self.entries[i].reply_node_address == reply.reply_node_address {
                if reply.reply_timestamp > self.entries[i].reply_timestamp {
                    self.entries[i] = reply;
                    return Admission::Replaced;
                }
                return Admission::DuplicateVoter;
            }
        }

        self.entries.push(reply);
        Admission::Added
    }

    /// Count replies acknowledging a specific vote id.
    pub fn count_for(&self, vote_id: &Hash) -> usize {
        self.entries
            .iter()
            .filter(|r| r.item.vote_id == *vote_id)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rotor_types::{Address, Signature};

    fn addr(seed: u8) -> Address {
        Address::new([seed; 20])
    }

    fn sig(voter: u8, id: u8, ts: i64) -> Signature {
        // Distinct per (voter, id, timestamp) so signature dedup only
        // triggers on byte-identical replays.
        let mut bytes = [0u8; 64];
        bytes[0] = voter;
        bytes[1] = id;
        bytes[2..10].copy_from_slice(&ts.to_le_bytes());
        Signature::from_bytes(&bytes).unwrap()
    }

    fn item(id: u8) -> VoteItem {
        VoteItem {
            vote_id: Hash::from_bytes(&[id]),
            voted_node_address: addr(id),
            voted_node_index: id as u32,
            cycle: 1,
            cycle_start: 100,
            cycle_stop: 199,
            period_start: 100,
            period_stop: 124,
            vrf_seed: None,
        }
    }

    fn vote(voter: u8, id: u8, ts: i64) -> DposVote {
        DposVote {
            item: item(id),
            voter_node_address: addr(voter),
            vote_timestamp: ts,
            signature: sig(voter, id, ts),
        }
    }

    #[test]
    fn replay_is_rejected() {
        let mut pool = VotePool::new();
        let v = vote(1, 1, 100);
        assert_eq!(pool.admit(v.clone(), None), Admission::Added);
        assert_eq!(pool.admit(v, None), Admission::DuplicateSignature);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn newer_timestamp_replaces_same_voter() {
        let mut pool = VotePool::new();
        assert!(pool.admit(vote(1, 1, 100), None).accepted());
        assert_eq!(pool.admit(vote(1, 2, 101), None), Admission::Replaced);
        assert_eq!(pool.len(), 1);
        assert_eq!(
            pool.iter().next().unwrap().item.vote_id,
            item(2).vote_id
        );
    }

    #[test]
    fn older_timestamp_is_dropped() {
        let mut pool = VotePool::new();
        assert!(pool.admit(vote(1, 1, 100), None).accepted());
        assert_eq!(pool.admit(vote(1, 2, 99), None), Admission::DuplicateVoter);
        assert_eq!(pool.admit(vote(1, 2, 100), None), Admission::DuplicateVoter);
        assert_eq!(
            pool.iter().next().unwrap().item.vote_id,
            item(1).vote_id
        );
    }

    #[test]
    fn stale_vote_is_dropped() {
        let mut pool = VotePool::new();
        let mut v = vote(1, 1, 100);
        v.item.period_start = 150;
        assert_eq!(pool.admit(v, Some(200)), Admission::Stale);
        assert!(pool.is_empty());
    }

    #[test]
    fn tally_below_threshold_continues() {
        // N = 21, M = 14: thirteen identical votes are not enough.
        let mut pool = VotePool::new();
        for voter in 0..13 {
            pool.admit(vote(voter, 1, 100 + voter as i64), None);
        }
        assert_eq!(pool.tally(21), VoteOutcome::Continue);

        // The fourteenth identical vote crosses the threshold.
        pool.admit(vote(13, 1, 200), None);
        assert_eq!(pool.tally(21), VoteOutcome::Success(item(1)));
    }

    #[test]
    fn tally_split_pool_fails_when_unwinnable() {
        // N = 21, all 21 votes split 8/7/6: max 8, no votes left, 8 < 14.
        let mut pool = VotePool::new();
        let mut voter = 0u8;
        for _ in 0..8 {
            pool.admit(vote(voter, 1, 100), None);
            voter += 1;
        }
        for _ in 0..7 {
            pool.admit(vote(voter, 2, 100), None);
            voter += 1;
        }
        for _ in 0..6 {
            pool.admit(vote(voter, 3, 100), None);
            voter += 1;
        }
        assert_eq!(pool.len(), 21);
        assert_eq!(pool.tally(21), VoteOutcome::Fail);
    }

    #[test]
    fn tally_still_winnable_continues() {
        // N = 21, 10 for A and 4 for B: A can still reach 14 because
        // 10 + (21 - 14) = 17 ≥ 14, but holds only 10 now.
        let mut pool = VotePool::new();
        let mut voter = 0u8;
        for _ in 0..10 {
            pool.admit(vote(voter, 1, 100), None);
            voter += 1;
        }
        for _ in 0..4 {
            pool.admit(vote(voter, 2, 100), None);
            voter += 1;
        }
        assert_eq!(pool.len(), 14);
        assert_eq!(pool.tally(21), VoteOutcome::Continue);
    }

    #[test]
    fn tally_small_committee_boundaries() {
        // N = 4, M = 2. Four votes split 2/1/1: max equals M, success.
        let mut pool = VotePool::new();
        pool.admit(vote(1, 1, 100), None);
        pool.admit(vote(2, 2, 100), None);
        pool.admit(vote(3, 3, 100), None);
        pool.admit(vote(4, 1, 100), None);
        assert_eq!(pool.tally(4), VoteOutcome::Success(item(1)));

        // Three votes split 1/1/1 with one delegate outstanding:
        // 1 + 1 = 2 ≥ M, still winnable.
        let mut pool = VotePool::new();
        pool.admit(vote(1, 1, 100), None);
        pool.admit(vote(2, 2, 100), None);
        pool.admit(vote(3, 3, 100), None);
        assert_eq!(pool.tally(4), VoteOutcome::Continue);
    }

    #[test]
    fn tally_is_pure() {
        let mut pool = VotePool::new();
        pool.admit(vote(1, 1, 100), None);
        pool.admit(vote(2, 1, 100), None);
        let first = pool.tally(4);
        let second = pool.tally(4);
        assert_eq!(first, second);
    }

    #[test]
    fn idempotent_admit_leaves_pool_unchanged() {
        let mut pool = VotePool::new();
        let v = vote(1, 1, 100);
        pool.admit(v.clone(), None);
        let before: Vec<_> = pool.iter().cloned().collect();
        pool.admit(v, None);
        let after: Vec<_> = pool.iter().cloned().collect();
        assert_eq!(before, after);
    }

    fn reply(voter: u8, id: u8, ts: i64) -> DposVoteReply {
        DposVoteReply {
            item: item(id),
            reply_node_address: addr(voter),
            reply_timestamp: ts,
            signature: sig(voter.wrapping_add(128), id, ts),
        }
    }

    #[test]
    fn reply_pool_counts_per_item() {
        let mut pool = ReplyPool::new();
        pool.admit(reply(1, 1, 100));
        pool.admit(reply(2, 1, 100));
        pool.admit(reply(3, 2, 100));
        assert_eq!(pool.count_for(&item(1).vote_id), 2);
        assert_eq!(pool.count_for(&item(2).vote_id), 1);

        // Replays do not inflate the count.
        pool.admit(reply(1, 1, 100));
        assert_eq!(pool.count_for(&item(1).vote_id), 2);
    }
}
