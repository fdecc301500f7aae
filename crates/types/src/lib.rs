//! Foundation types for rotor DPoS consensus.
//!
//! This crate provides the data model shared by the consensus core and its
//! collaborators:
//!
//! - **Primitives**: [`Hash`], ed25519 keys and signatures, account
//!   [`Address`]es
//! - **Identities**: [`Validator`], [`ValidatorSet`], [`ValidatorManager`]
//! - **Messages**: [`VoteItem`], [`DposVote`], [`DposVoteReply`],
//!   [`DposNotify`], [`DposCBInfo`], VRF registrations, and the opaque
//!   [`Transaction`] envelope
//! - **Canonical forms**: the [`signing`] module fixes the exact bytes every
//!   signature covers
//! - **Signer capability**: [`ValidatorSigner`]
//!
//! The crate is self-contained and does not depend on any other workspace
//! crate, making it the foundation layer.

mod crypto;
mod hash;
mod signer;
pub mod signing;
mod validator;
mod vote;

pub use crypto::{Address, CryptoError, KeyPair, PublicKey, Signature, ADDRESS_BYTES};
pub use hash::{Hash, HexError};
pub use signer::ValidatorSigner;
pub use validator::{Validator, ValidatorManager, ValidatorSet};
pub use vote::{
    DposCBInfo, DposNotify, DposVote, DposVoteReply, Transaction, VoteItem, VrfMRegistration,
    VrfRPRegistration,
};
