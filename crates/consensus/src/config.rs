//! Consensus configuration.

use std::time::Duration;

/// Configuration for the DPoS consensus core.
#[derive(Debug, Clone)]
pub struct DposConfig {
    /// Signing-domain tag bound into vote and notify payloads.
    pub chain_id: String,

    /// Number of delegates in the validator set. The super-majority
    /// threshold is `⌊delegate_num · 2/3⌋`.
    pub delegate_num: u32,

    /// Target seconds between blocks.
    pub block_interval: i64,

    /// Blocks a delegate produces back-to-back within one period.
    pub continue_block_num: i64,

    /// Capacity of the peer message queue.
    pub queue_size: usize,

    /// First timeout scheduled after `start`, delivered to the Init state.
    pub initial_timeout: Duration,

    /// How long the voting phase collects votes before giving up.
    pub voting_timeout: Duration,

    /// How long the confirmation phase collects vote replies.
    pub vote_reply_timeout: Duration,

    /// Interval between notify broadcasts while producing.
    pub notify_interval: Duration,

    /// Delay before re-entering Init after a failed or finished round.
    pub retry_timeout: Duration,

    /// Capacity of the cycle-boundary cache.
    pub cb_cache_capacity: usize,

    /// Whether to emit VRF registration transactions for upcoming cycles.
    pub vrf_registration: bool,
}

impl Default for DposConfig {
    fn default() -> Self {
        Self {
            chain_id: "rotor".to_string(),
            delegate_num: 21,
            block_interval: 3,
            continue_block_num: 12,
            queue_size: 1000,
            initial_timeout: Duration::from_secs(3),
            voting_timeout: Duration::from_secs(3),
            vote_reply_timeout: Duration::from_secs(3),
            notify_interval: Duration::from_secs(3),
            retry_timeout: Duration::from_secs(1),
            cb_cache_capacity: 5,
            vrf_registration: true,
        }
    }
}

impl DposConfig {
    /// Seconds in one proposer period.
    pub fn period_secs(&self) -> i64 {
        self.block_interval * self.continue_block_num
    }

    /// Seconds in one full cycle (every delegate gets one period).
    pub fn cycle_secs(&self) -> i64 {
        self.period_secs() * self.delegate_num as i64
    }

    /// Votes required for a super-majority.
    pub fn majority(&self) -> usize {
        (self.delegate_num * 2 / 3) as usize
    }
}
