//! DPoS consensus state machine core.
//!
//! This crate drives a single node through the phases of cycle leader
//! election and block-production notification: exchanging signed votes and
//! notifies with a fixed set of delegates, tallying votes to detect a
//! super-majority, signing and broadcasting its own messages, and recording
//! cycle-boundary information.
//!
//! # Architecture
//!
//! ```text
//! peers ──► peer queue ──┐
//! self  ──► internal q ──┤──► dispatcher ──► active Step handler
//! ticker ─► timeout ch ──┘        │
//!                                 ├──► broadcast sink (outbound envelopes)
//!                                 └──► ChainClient (queries, mempool txs)
//! ```
//!
//! The [`ConsensusCore`] event loop is the single consumer of all three
//! event sources and the only mutator of [`ConsensusState`]; external
//! threads interact by enqueueing messages and read through deep-copy
//! accessors. Each [`Step`] defines the same five handlers (timeout, vote,
//! vote-reply, notify, cycle-boundary info); unexpected events are no-ops
//! with a warning, never crashes. A panic inside a handler is caught at the
//! dispatcher, logged as a consensus failure, and the loop continues.
//!
//! Block production, chain storage, networking transport, and validator
//! set management live behind narrow seams: the [`ChainClient`] trait and
//! the message channels.

mod cb_cache;
mod client;
mod clock;
mod config;
mod dispatcher;
mod error;
mod message;
mod pool;
mod state;
mod step;
mod task;
mod ticker;

pub use cb_cache::CycleBoundaryCache;
pub use client::ChainClient;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::DposConfig;
pub use dispatcher::ConsensusCore;
pub use error::{ClientError, DposError};
pub use message::{ConsensusMsg, MsgInfo};
pub use pool::{Admission, ReplyPool, VoteOutcome, VotePool};
pub use state::ConsensusState;
pub use step::Step;
pub use task::{decide_task_by_time, Task};
pub use ticker::{TimeoutInfo, TimeoutTicker};
