//! Consensus message types: votes, replies, notifies, and cycle-boundary
//! records.

use crate::crypto::{Address, PublicKey, Signature};
use crate::hash::Hash;
use crate::signing;

/// The content a voter endorses: which delegate should produce blocks for
/// which period of which cycle.
///
/// Two items are the same endorsement iff their `vote_id` is byte-equal.
/// The id is the Blake3 digest of the canonical item encoding and is filled
/// in by [`VoteItem::seal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteItem {
    /// Unique tag for this candidate outcome.
    pub vote_id: Hash,
    /// The delegate being endorsed as proposer.
    pub voted_node_address: Address,
    /// Rotation index of the endorsed delegate.
    pub voted_node_index: u32,
    /// Cycle number this endorsement belongs to.
    pub cycle: i64,
    /// First second of the cycle.
    pub cycle_start: i64,
    /// Last second of the cycle.
    pub cycle_stop: i64,
    /// First second of the proposer's period.
    pub period_start: i64,
    /// Last second of the proposer's period.
    pub period_stop: i64,
    /// Seed of the per-cycle proposer shuffle, when one was registered.
    pub vrf_seed: Option<Hash>,
}

impl VoteItem {
    /// Compute the canonical id over everything except the id itself.
    pub fn compute_id(&self) -> Hash {
        Hash::from_bytes(&signing::vote_item_bytes(self))
    }

    /// Fill in `vote_id` from the canonical encoding.
    pub fn seal(mut self) -> Self {
        self.vote_id = self.compute_id();
        self
    }
}

/// A signed endorsement of a [`VoteItem`], exchanged during the voting
/// phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DposVote {
    /// The endorsed content.
    pub item: VoteItem,
    /// Address of the voter.
    pub voter_node_address: Address,
    /// Unix timestamp at signing time; later timestamps from the same voter
    /// replace earlier ones in the pool.
    pub vote_timestamp: i64,
    /// Signature over the canonical vote payload, bound to the chain id.
    pub signature: Signature,
}

/// Acknowledgement of an agreed [`VoteItem`] during the confirmation phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DposVoteReply {
    /// The agreed content being acknowledged.
    pub item: VoteItem,
    /// Address of the replier.
    pub reply_node_address: Address,
    /// Unix timestamp at signing time.
    pub reply_timestamp: i64,
    /// Signature over the canonical reply payload, bound to the chain id.
    pub signature: Signature,
}

/// Periodic broadcast from the elected proposer announcing block-production
/// progress within its period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DposNotify {
    /// The agreed content this notify reports on.
    pub item: VoteItem,
    /// Height of the last block produced so far.
    pub height_stop: i64,
    /// Hash of the last block produced so far.
    pub hash_stop: Hash,
    /// Unix timestamp at signing time.
    pub notify_timestamp: i64,
    /// Address of the proposer.
    pub notify_node_address: Address,
    /// Signature over the canonical notify payload, bound to the chain id.
    pub signature: Signature,
}

/// A signed record marking the last block of a cycle.
///
/// Self-contained: the public key travels in-band and verification does not
/// consult the validator set, because the record may originate from any past
/// proposer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DposCBInfo {
    /// Cycle this record closes.
    pub cycle: i64,
    /// Height of the cycle's final block.
    pub stop_height: i64,
    /// Hash of the cycle's final block.
    pub stop_hash: Hash,
    /// Public key of the signer.
    pub pubkey: PublicKey,
    /// Signature over the canonical `{cycle, stop_height, stop_hash, pubkey}`
    /// encoding.
    pub signature: Signature,
}

impl DposCBInfo {
    /// Verify the in-band signature against the in-band public key.
    pub fn verify(&self) -> bool {
        let payload = signing::cb_info_sign_bytes(self);
        self.pubkey.verify(&payload, &self.signature)
    }
}

/// VRF commitment registration for an upcoming cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VrfMRegistration {
    /// Cycle the commitment is registered for.
    pub cycle: i64,
    /// Address of the registering delegate.
    pub address: Address,
    /// The commitment digest.
    pub m: Hash,
}

/// VRF reveal registration, publishing the output and proof for a prior
/// commitment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VrfRPRegistration {
    /// Cycle the reveal belongs to.
    pub cycle: i64,
    /// Address of the registering delegate.
    pub address: Address,
    /// The revealed output.
    pub r: Hash,
    /// Proof bytes for the reveal.
    pub p: Vec<u8>,
}

/// An opaque transaction envelope submitted to the application mempool.
///
/// The consensus core only builds, signs, and fires these; their execution
/// semantics belong to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Target executor name on the application side.
    pub execer: String,
    /// Serialized action payload.
    pub payload: Vec<u8>,
    /// Public key of the submitting validator, filled at signing time.
    pub signer: Option<PublicKey>,
    /// Signature over `execer || payload`, filled at signing time.
    pub signature: Option<Signature>,
}

impl Transaction {
    /// Build an unsigned transaction.
    pub fn new(execer: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            execer: execer.into(),
            payload,
            signer: None,
            signature: None,
        }
    }

    /// The bytes covered by the transaction signature.
    pub fn sign_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.execer.len() + self.payload.len());
        bytes.extend_from_slice(self.execer.as_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Whether the envelope carries a signature.
    pub fn is_signed(&self) -> bool {
        self.signer.is_some() && self.signature.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    fn item(seed: u8) -> VoteItem {
        let kp = KeyPair::from_seed(&[seed; 32]);
        VoteItem {
            vote_id: Hash::ZERO,
            voted_node_address: kp.address(),
            voted_node_index: seed as u32,
            cycle: 7,
            cycle_start: 700,
            cycle_stop: 799,
            period_start: 710,
            period_stop: 719,
            vrf_seed: None,
        }
        .seal()
    }

    #[test]
    fn vote_id_identifies_content() {
        let a = item(1);
        let b = item(1);
        assert_eq!(a.vote_id, b.vote_id);

        let c = item(2);
        assert_ne!(a.vote_id, c.vote_id);
    }

    #[test]
    fn vote_id_changes_with_window() {
        let a = item(1);
        let mut shifted = a.clone();
        shifted.period_start += 1;
        let shifted = shifted.seal();
        assert_ne!(a.vote_id, shifted.vote_id);
    }

    #[test]
    fn cb_info_self_contained_verify() {
        let kp = KeyPair::from_seed(&[9; 32]);
        let mut info = DposCBInfo {
            cycle: 7,
            stop_height: 1000,
            stop_hash: Hash::from_bytes(b"stop"),
            pubkey: kp.public_key(),
            signature: Signature::zero(),
        };
        info.signature = kp.sign(&signing::cb_info_sign_bytes(&info));
        assert!(info.verify());

        // Any altered field invalidates the record.
        let mut tampered = info.clone();
        tampered.stop_height += 1;
        assert!(!tampered.verify());
    }
}
