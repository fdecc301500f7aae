//! Error types for the consensus core.

use rotor_types::{Address, CryptoError};
use thiserror::Error;

/// Errors from message verification and state operations.
///
/// These are local: handlers log the error, drop the message, and remain in
/// the current state. Nothing here tears down the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DposError {
    /// Vote signature verification failed.
    #[error("invalid vote signature")]
    InvalidVoteSignature,

    /// Vote-reply signature verification failed.
    #[error("invalid vote reply signature")]
    InvalidVoteReplySignature,

    /// Notify signature verification failed.
    #[error("invalid notify signature")]
    InvalidNotifySignature,

    /// Cycle-boundary record signature verification failed.
    #[error("invalid cycle-boundary signature")]
    InvalidCBInfoSignature,

    /// The claimed sender is not in the validator set.
    #[error("sender {0} is not in the validator set")]
    UnknownValidator(Address),

    /// An operation required the local signer but none is configured.
    #[error("no private validator configured")]
    NoSigner,

    /// Key or signature bytes failed to deserialize.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Errors from the application request/reply path.
///
/// Returned to the caller as values; the state machine tolerates them and
/// never treats them as fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// A query against the application failed.
    #[error("application query failed: {0}")]
    Query(String),

    /// Transaction construction failed.
    #[error("transaction build failed: {0}")]
    TxBuild(String),

    /// Mempool submission failed.
    #[error("mempool submission failed: {0}")]
    Submit(String),
}
