//! The application seam.
//!
//! The consensus core treats the chain application as an opaque collaborator
//! behind this trait: a request/reply query for cycle-boundary records, a
//! view of the chain tip for notify progress, and fire-and-forget
//! transaction submission to the mempool.

use crate::error::ClientError;
use rotor_types::{DposCBInfo, Hash, Transaction, VrfMRegistration, VrfRPRegistration};

/// Narrow interface to the chain application.
///
/// Implementations are expected to keep the query paths bounded; the
/// dispatcher calls them while holding the state lock.
pub trait ChainClient: Send + Sync {
    /// Fetch the recorded boundary info for a cycle, if any.
    fn query_cb_info_by_cycle(&self, cycle: i64) -> Result<Option<DposCBInfo>, ClientError>;

    /// Height and hash of the best block, for notify progress reports.
    fn last_block_info(&self) -> Result<(i64, Hash), ClientError>;

    /// Build the transaction recording a cycle-boundary info.
    fn create_cb_record_tx(&self, info: &DposCBInfo) -> Result<Transaction, ClientError>;

    /// Build the transaction registering a VRF commitment.
    fn create_vrf_m_tx(&self, reg: &VrfMRegistration) -> Result<Transaction, ClientError>;

    /// Build the transaction registering a VRF reveal and proof.
    fn create_vrf_rp_tx(&self, reg: &VrfRPRegistration) -> Result<Transaction, ClientError>;

    /// Fire a signed transaction at the mempool.
    fn submit_to_mempool(&self, tx: Transaction) -> Result<(), ClientError>;
}
