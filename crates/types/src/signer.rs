//! The signer capability held by a participating validator.

use crate::crypto::{Address, KeyPair, PublicKey};
use crate::signing;
use crate::vote::{DposCBInfo, DposNotify, DposVote, DposVoteReply, Transaction};

/// Signs consensus messages and transactions on behalf of the local
/// validator.
///
/// All `sign_*` methods fill in the message's signature field in place over
/// the canonical payload from [`crate::signing`].
#[derive(Debug, Clone)]
pub struct ValidatorSigner {
    keypair: KeyPair,
}

impl ValidatorSigner {
    /// Wrap a keypair as a signer.
    pub fn new(keypair: KeyPair) -> Self {
        Self { keypair }
    }

    /// Address of the local validator.
    pub fn address(&self) -> Address {
        self.keypair.address()
    }

    /// Public key of the local validator.
    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    /// Sign arbitrary bytes with the validator key.
    pub fn sign_bytes(&self, payload: &[u8]) -> crate::crypto::Signature {
        self.keypair.sign(payload)
    }

    /// Sign a vote, binding in the chain id.
    pub fn sign_vote(&self, chain_id: &str, vote: &mut DposVote) {
        vote.signature = self.keypair.sign(&signing::vote_sign_bytes(chain_id, vote));
    }

    /// Sign a vote reply, binding in the chain id.
    pub fn sign_vote_reply(&self, chain_id: &str, reply: &mut DposVoteReply) {
        reply.signature = self
            .keypair
            .sign(&signing::vote_reply_sign_bytes(chain_id, reply));
    }

    /// Sign a notify, binding in the chain id.
    pub fn sign_notify(&self, chain_id: &str, notify: &mut DposNotify) {
        notify.signature = self
            .keypair
            .sign(&signing::notify_sign_bytes(chain_id, notify));
    }

    /// Sign a cycle-boundary record over its self-contained canonical form,
    /// stamping in the signer's public key.
    pub fn sign_cb_info(&self, info: &mut DposCBInfo) {
        info.pubkey = self.keypair.public_key();
        info.signature = self.keypair.sign(&signing::cb_info_sign_bytes(info));
    }

    /// Sign a transaction envelope for mempool submission.
    pub fn sign_tx(&self, tx: &mut Transaction) {
        tx.signer = Some(self.keypair.public_key());
        tx.signature = Some(self.keypair.sign(&tx.sign_bytes()));
    }
}
