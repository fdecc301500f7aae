//! The states of the election algorithm.
//!
//! `Step` is a closed sum type; each variant's five handlers live in its
//! own module and receive `&mut ConsensusState`. Dispatch is a match in
//! [`crate::state::ConsensusState`]. Handlers for events a state does not
//! expect log a warning and leave the state unchanged.

pub(crate) mod init;
pub(crate) mod reg_vrf_m;
pub(crate) mod reg_vrf_rp;
pub(crate) mod send_notify;
pub(crate) mod vote_reply;
pub(crate) mod voting;
pub(crate) mod wait;

use std::time::Duration;

/// Delay used when a state hands off to another that should run promptly.
pub(crate) const STEP_HANDOFF: Duration = Duration::from_millis(100);

/// The active phase of the election state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// Starting and resynchronization state.
    Init,
    /// Registering the VRF commitment for the next cycle.
    RegVrfM,
    /// Registering the VRF reveal and proof for the next cycle.
    RegVrfRP,
    /// Collecting votes for the current round.
    Voting,
    /// Collecting acknowledgements of the agreed item.
    VoteReply,
    /// Following the elected proposer's notifies.
    Wait,
    /// Producing: periodically announcing block progress.
    SendNotify,
}

impl Step {
    /// State name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Step::Init => "Init",
            Step::RegVrfM => "RegVrfM",
            Step::RegVrfRP => "RegVrfRP",
            Step::Voting => "Voting",
            Step::VoteReply => "VoteReply",
            Step::Wait => "Wait",
            Step::SendNotify => "SendNotify",
        }
    }
}
