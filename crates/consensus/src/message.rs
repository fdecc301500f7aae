//! Typed message envelopes exchanged with peers.

use rotor_types::{DposCBInfo, DposNotify, DposVote, DposVoteReply};

/// A consensus protocol message.
#[derive(Debug, Clone)]
pub enum ConsensusMsg {
    /// A signed vote for the current election round.
    Vote(DposVote),
    /// An acknowledgement of an agreed vote item.
    VoteReply(DposVoteReply),
    /// Block-production progress from the elected proposer.
    Notify(DposNotify),
    /// A signed cycle-boundary record.
    CBInfo(DposCBInfo),
}

impl ConsensusMsg {
    /// Message type name for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            ConsensusMsg::Vote(_) => "Vote",
            ConsensusMsg::VoteReply(_) => "VoteReply",
            ConsensusMsg::Notify(_) => "Notify",
            ConsensusMsg::CBInfo(_) => "CBInfo",
        }
    }
}

/// A message plus the peer it arrived from.
///
/// The peer fields are carried for logging only; sender identity comes from
/// the signed message contents.
#[derive(Debug, Clone)]
pub struct MsgInfo {
    /// The message itself.
    pub msg: ConsensusMsg,
    /// Identifier of the sending peer.
    pub peer_id: String,
    /// Network address of the sending peer.
    pub peer_ip: String,
}

impl MsgInfo {
    /// Wrap a message received from a peer.
    pub fn from_peer(msg: ConsensusMsg, peer_id: impl Into<String>, peer_ip: impl Into<String>) -> Self {
        Self {
            msg,
            peer_id: peer_id.into(),
            peer_ip: peer_ip.into(),
        }
    }

    /// Wrap a locally generated message (own votes, replies, notifies).
    pub fn local(msg: ConsensusMsg) -> Self {
        Self {
            msg,
            peer_id: "self".to_string(),
            peer_ip: String::new(),
        }
    }
}
