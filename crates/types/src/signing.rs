//! Canonical signing payloads.
//!
//! Signatures are verified byte-for-byte, so every signed structure has a
//! fixed canonical encoding: explicit field order, little-endian integers,
//! UTF-8 strings, and a domain tag that prevents cross-protocol replay.
//! Vote and notify payloads additionally bind the chain id so a signature
//! from one chain never validates on another.

use crate::vote::{DposCBInfo, DposNotify, DposVote, DposVoteReply, VoteItem};

/// Domain tag for vote signatures.
pub const DOMAIN_VOTE: &[u8] = b"rotor/vote:";
/// Domain tag for vote-reply signatures.
pub const DOMAIN_VOTE_REPLY: &[u8] = b"rotor/vote-reply:";
/// Domain tag for notify signatures.
pub const DOMAIN_NOTIFY: &[u8] = b"rotor/notify:";
/// Domain tag for cycle-boundary records.
pub const DOMAIN_CB_INFO: &[u8] = b"rotor/cb-info:";

/// Canonical encoding of a [`VoteItem`], excluding its `vote_id`.
///
/// This is both the preimage of the vote id and the item portion of every
/// signed payload that carries an item.
pub fn vote_item_bytes(item: &VoteItem) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(96);
    bytes.extend_from_slice(item.voted_node_address.as_bytes());
    bytes.extend_from_slice(&item.voted_node_index.to_le_bytes());
    bytes.extend_from_slice(&item.cycle.to_le_bytes());
    bytes.extend_from_slice(&item.cycle_start.to_le_bytes());
    bytes.extend_from_slice(&item.cycle_stop.to_le_bytes());
    bytes.extend_from_slice(&item.period_start.to_le_bytes());
    bytes.extend_from_slice(&item.period_stop.to_le_bytes());
    match &item.vrf_seed {
        Some(seed) => {
            bytes.push(1);
            bytes.extend_from_slice(seed.as_bytes());
        }
        None => bytes.push(0),
    }
    bytes
}

/// Canonical payload signed by a voter:
/// `DOMAIN_VOTE || chain_id || vote_id || item || voter || timestamp`.
pub fn vote_sign_bytes(chain_id: &str, vote: &DposVote) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(160);
    bytes.extend_from_slice(DOMAIN_VOTE);
    bytes.extend_from_slice(chain_id.as_bytes());
    bytes.extend_from_slice(vote.item.vote_id.as_bytes());
    bytes.extend_from_slice(&vote_item_bytes(&vote.item));
    bytes.extend_from_slice(vote.voter_node_address.as_bytes());
    bytes.extend_from_slice(&vote.vote_timestamp.to_le_bytes());
    bytes
}

/// Canonical payload signed by a replier, same shape as a vote under its
/// own domain tag.
pub fn vote_reply_sign_bytes(chain_id: &str, reply: &DposVoteReply) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(160);
    bytes.extend_from_slice(DOMAIN_VOTE_REPLY);
    bytes.extend_from_slice(chain_id.as_bytes());
    bytes.extend_from_slice(reply.item.vote_id.as_bytes());
    bytes.extend_from_slice(&vote_item_bytes(&reply.item));
    bytes.extend_from_slice(reply.reply_node_address.as_bytes());
    bytes.extend_from_slice(&reply.reply_timestamp.to_le_bytes());
    bytes
}

/// Canonical payload signed by the elected proposer:
/// `DOMAIN_NOTIFY || chain_id || vote_id || item || height_stop || hash_stop
/// || notifier || timestamp`.
pub fn notify_sign_bytes(chain_id: &str, notify: &DposNotify) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(192);
    bytes.extend_from_slice(DOMAIN_NOTIFY);
    bytes.extend_from_slice(chain_id.as_bytes());
    bytes.extend_from_slice(notify.item.vote_id.as_bytes());
    bytes.extend_from_slice(&vote_item_bytes(&notify.item));
    bytes.extend_from_slice(&notify.height_stop.to_le_bytes());
    bytes.extend_from_slice(notify.hash_stop.as_bytes());
    bytes.extend_from_slice(notify.notify_node_address.as_bytes());
    bytes.extend_from_slice(&notify.notify_timestamp.to_le_bytes());
    bytes
}

/// Canonical payload of a cycle-boundary record:
/// `DOMAIN_CB_INFO || cycle || stop_height || stop_hash || pubkey`.
///
/// Deliberately not bound to a chain id: the record is self-contained and
/// may be produced by any past proposer.
pub fn cb_info_sign_bytes(info: &DposCBInfo) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(96);
    bytes.extend_from_slice(DOMAIN_CB_INFO);
    bytes.extend_from_slice(&info.cycle.to_le_bytes());
    bytes.extend_from_slice(&info.stop_height.to_le_bytes());
    bytes.extend_from_slice(info.stop_hash.as_bytes());
    bytes.extend_from_slice(info.pubkey.as_bytes());
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{KeyPair, Signature};
    use crate::hash::Hash;

    fn test_vote(kp: &KeyPair) -> DposVote {
        let item = VoteItem {
            vote_id: Hash::ZERO,
            voted_node_address: kp.address(),
            voted_node_index: 0,
            cycle: 3,
            cycle_start: 300,
            cycle_stop: 399,
            period_start: 300,
            period_stop: 324,
            vrf_seed: None,
        }
        .seal();
        DposVote {
            item,
            voter_node_address: kp.address(),
            vote_timestamp: 301,
            signature: Signature::zero(),
        }
    }

    #[test]
    fn vote_signature_binds_chain_id() {
        let kp = KeyPair::from_seed(&[7; 32]);
        let mut vote = test_vote(&kp);
        vote.signature = kp.sign(&vote_sign_bytes("rotor-main", &vote));

        let pk = kp.public_key();
        assert!(pk.verify(&vote_sign_bytes("rotor-main", &vote), &vote.signature));
        assert!(!pk.verify(&vote_sign_bytes("rotor-test", &vote), &vote.signature));
    }

    #[test]
    fn vote_signature_binds_payload() {
        let kp = KeyPair::from_seed(&[7; 32]);
        let mut vote = test_vote(&kp);
        vote.signature = kp.sign(&vote_sign_bytes("rotor-main", &vote));

        let mut tampered = vote.clone();
        tampered.vote_timestamp += 1;
        assert!(!kp.public_key().verify(
            &vote_sign_bytes("rotor-main", &tampered),
            &tampered.signature
        ));
    }

    #[test]
    fn domains_separate_vote_and_reply() {
        let kp = KeyPair::from_seed(&[7; 32]);
        let vote = test_vote(&kp);
        let reply = DposVoteReply {
            item: vote.item.clone(),
            reply_node_address: vote.voter_node_address,
            reply_timestamp: vote.vote_timestamp,
            signature: Signature::zero(),
        };
        // Identical fields, different domain tag: payloads must differ.
        assert_ne!(
            vote_sign_bytes("c", &vote),
            vote_reply_sign_bytes("c", &reply)
        );
    }

    #[test]
    fn cb_payload_changes_with_stop_hash() {
        let kp = KeyPair::from_seed(&[8; 32]);
        let info = DposCBInfo {
            cycle: 7,
            stop_height: 1000,
            stop_hash: Hash::from_bytes(b"h"),
            pubkey: kp.public_key(),
            signature: Signature::zero(),
        };
        let mut other = info.clone();
        other.stop_hash = Hash::from_bytes(b"g");
        assert_ne!(cb_info_sign_bytes(&info), cb_info_sign_bytes(&other));
    }
}
