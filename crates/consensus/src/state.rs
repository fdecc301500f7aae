//! The consensus state: every mutable field of the election state machine.
//!
//! All mutation happens inside the dispatcher task while the state lock is
//! held; other threads interact only by enqueueing messages. Handlers for
//! the active state live in [`crate::step`] and receive `&mut
//! ConsensusState`.

use crate::cb_cache::CycleBoundaryCache;
use crate::client::ChainClient;
use crate::clock::Clock;
use crate::config::DposConfig;
use crate::error::{ClientError, DposError};
use crate::message::{ConsensusMsg, MsgInfo};
use crate::pool::{ReplyPool, VoteOutcome, VotePool};
use crate::step::Step;
use crate::task::{decide_task_by_time, Task};
use crate::ticker::{TimeoutInfo, TimeoutTicker};
use rotor_types::{
    signing, DposCBInfo, DposNotify, DposVote, DposVoteReply, PublicKey, Signature, Validator,
    ValidatorManager, ValidatorSigner, VoteItem, VrfMRegistration, VrfRPRegistration,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Execution state of the DPoS election algorithm.
///
/// Exactly one [`Step`] is active at a time; the five `handle_*` methods
/// dispatch incoming events to the active step's handlers. The dispatcher
/// owns this struct behind a mutex and is its only mutator.
pub struct ConsensusState {
    // ═══════════════════════════════════════════════════════════════════════
    // Collaborators
    // ═══════════════════════════════════════════════════════════════════════
    pub(crate) client: Arc<dyn ChainClient>,
    pub(crate) config: DposConfig,
    pub(crate) clock: Arc<dyn Clock>,

    /// Delegate set and chain id. Copy-on-read for external callers.
    pub(crate) validator_mgr: ValidatorManager,

    /// Private validator for signing, absent on observer nodes.
    pub(crate) signer: Option<ValidatorSigner>,
    pub(crate) signer_index: Option<usize>,

    // ═══════════════════════════════════════════════════════════════════════
    // Election state
    // ═══════════════════════════════════════════════════════════════════════
    /// The active step.
    pub(crate) step: Step,

    /// Votes for the current round, own vote included.
    pub(crate) votes: VotePool,

    /// Votes that arrived early for a future round, consumed by the next
    /// Init.
    pub(crate) cached_votes: VotePool,

    /// Acknowledgements collected during the confirmation phase.
    pub(crate) replies: ReplyPool,

    /// The agreed item of the current round, and the last one committed.
    pub(crate) current_vote: Option<VoteItem>,
    pub(crate) last_vote: Option<VoteItem>,

    /// Our own vote for the current round, and the last one committed.
    pub(crate) my_vote: Option<DposVote>,
    pub(crate) last_my_vote: Option<DposVote>,

    /// Latest proposer notify, and the previous one.
    pub(crate) notify: Option<DposNotify>,
    pub(crate) last_notify: Option<DposNotify>,

    /// A notify that arrived before its round started.
    pub(crate) cached_notify: Option<DposNotify>,

    /// Recorded cycle boundaries.
    pub(crate) cb_cache: CycleBoundaryCache,

    /// Cycles we already emitted VRF registrations for.
    pub(crate) reg_m_cycle: Option<i64>,
    pub(crate) reg_rp_cycle: Option<i64>,

    // ═══════════════════════════════════════════════════════════════════════
    // Plumbing
    // ═══════════════════════════════════════════════════════════════════════
    pub(crate) ticker: TimeoutTicker,
    pub(crate) broadcast_tx: tokio::sync::mpsc::Sender<MsgInfo>,
    pub(crate) internal_tx: tokio::sync::mpsc::UnboundedSender<MsgInfo>,
}

impl std::fmt::Debug for ConsensusState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsensusState")
            .field("step", &self.step)
            .field("delegates", &self.validator_mgr.validators.len())
            .field("votes", &self.votes.len())
            .field("cached_votes", &self.cached_votes.len())
            .field("replies", &self.replies.len())
            .field("current_vote", &self.current_vote.as_ref().map(|v| v.vote_id))
            .finish()
    }
}

impl ConsensusState {
    /// Create a fresh state machine in the Init step.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<dyn ChainClient>,
        validator_mgr: ValidatorManager,
        config: DposConfig,
        clock: Arc<dyn Clock>,
        ticker: TimeoutTicker,
        broadcast_tx: tokio::sync::mpsc::Sender<MsgInfo>,
        internal_tx: tokio::sync::mpsc::UnboundedSender<MsgInfo>,
    ) -> Self {
        let cb_cache = CycleBoundaryCache::new(config.cb_cache_capacity);
        Self {
            client,
            config,
            clock,
            validator_mgr,
            signer: None,
            signer_index: None,
            step: Step::Init,
            votes: VotePool::new(),
            cached_votes: VotePool::new(),
            replies: ReplyPool::new(),
            current_vote: None,
            last_vote: None,
            my_vote: None,
            last_my_vote: None,
            notify: None,
            last_notify: None,
            cached_notify: None,
            cb_cache,
            reg_m_cycle: None,
            reg_rp_cycle: None,
            ticker,
            broadcast_tx,
            internal_tx,
        }
    }

    /// Install the private validator used for signing.
    pub fn set_signer(&mut self, signer: ValidatorSigner, index: usize) {
        self.signer = Some(signer);
        self.signer_index = Some(index);
    }

    /// Rotation index of the local validator, when one is configured.
    pub fn signer_index(&self) -> Option<usize> {
        self.signer_index
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Event dispatch
    // ═══════════════════════════════════════════════════════════════════════

    /// Deliver a timeout to the active step.
    pub fn handle_timeout(&mut self) {
        match self.step {
            Step::Init => crate::step::init::on_timeout(self),
            Step::RegVrfM => crate::step::reg_vrf_m::on_timeout(self),
            Step::RegVrfRP => crate::step::reg_vrf_rp::on_timeout(self),
            Step::Voting => crate::step::voting::on_timeout(self),
            Step::VoteReply => crate::step::vote_reply::on_timeout(self),
            Step::Wait => crate::step::wait::on_timeout(self),
            Step::SendNotify => crate::step::send_notify::on_timeout(self),
        }
    }

    /// Deliver an inbound vote to the active step.
    pub fn handle_vote(&mut self, vote: DposVote) {
        match self.step {
            Step::Init => crate::step::init::on_vote(self, vote),
            Step::RegVrfM => crate::step::reg_vrf_m::on_vote(self, vote),
            Step::RegVrfRP => crate::step::reg_vrf_rp::on_vote(self, vote),
            Step::Voting => crate::step::voting::on_vote(self, vote),
            Step::VoteReply => crate::step::vote_reply::on_vote(self, vote),
            Step::Wait => crate::step::wait::on_vote(self, vote),
            Step::SendNotify => crate::step::send_notify::on_vote(self, vote),
        }
    }

    /// Deliver an inbound vote reply to the active step.
    pub fn handle_vote_reply(&mut self, reply: DposVoteReply) {
        match self.step {
            Step::Init => crate::step::init::on_vote_reply(self, reply),
            Step::RegVrfM => crate::step::reg_vrf_m::on_vote_reply(self, reply),
            Step::RegVrfRP => crate::step::reg_vrf_rp::on_vote_reply(self, reply),
            Step::Voting => crate::step::voting::on_vote_reply(self, reply),
            Step::VoteReply => crate::step::vote_reply::on_vote_reply(self, reply),
            Step::Wait => crate::step::wait::on_vote_reply(self, reply),
            Step::SendNotify => crate::step::send_notify::on_vote_reply(self, reply),
        }
    }

    /// Deliver an inbound notify to the active step.
    pub fn handle_notify(&mut self, notify: DposNotify) {
        match self.step {
            Step::Init => crate::step::init::on_notify(self, notify),
            Step::RegVrfM => crate::step::reg_vrf_m::on_notify(self, notify),
            Step::RegVrfRP => crate::step::reg_vrf_rp::on_notify(self, notify),
            Step::Voting => crate::step::voting::on_notify(self, notify),
            Step::VoteReply => crate::step::vote_reply::on_notify(self, notify),
            Step::Wait => crate::step::wait::on_notify(self, notify),
            Step::SendNotify => crate::step::send_notify::on_notify(self, notify),
        }
    }

    /// Deliver an inbound cycle-boundary record to the active step.
    pub fn handle_cb_info(&mut self, info: DposCBInfo) {
        match self.step {
            Step::Init => crate::step::init::on_cb_info(self, info),
            Step::RegVrfM => crate::step::reg_vrf_m::on_cb_info(self, info),
            Step::RegVrfRP => crate::step::reg_vrf_rp::on_cb_info(self, info),
            Step::Voting => crate::step::voting::on_cb_info(self, info),
            Step::VoteReply => crate::step::vote_reply::on_cb_info(self, info),
            Step::Wait => crate::step::wait::on_cb_info(self, info),
            Step::SendNotify => crate::step::send_notify::on_cb_info(self, info),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Step and slot management
    // ═══════════════════════════════════════════════════════════════════════

    /// The active step.
    pub fn step(&self) -> Step {
        self.step
    }

    /// Transition to a new step. The only place transitions happen.
    pub(crate) fn set_step(&mut self, step: Step) {
        if self.step != step {
            debug!(from = ?self.step, to = ?step, "state transition");
        }
        self.step = step;
    }

    /// Schedule a timeout, superseding any pending one.
    pub(crate) fn schedule_timeout(&mut self, duration: Duration, step: Step) {
        self.ticker.schedule(TimeoutInfo { duration, step });
    }

    /// Whether this node is the proposer agreed by the current round.
    pub fn is_proposer(&self) -> bool {
        match (&self.current_vote, &self.signer) {
            (Some(current), Some(signer)) => current.voted_node_address == signer.address(),
            _ => false,
        }
    }

    /// Whether this node belongs to the delegate set.
    pub fn is_delegate(&self) -> bool {
        self.signer
            .as_ref()
            .is_some_and(|s| self.validator_mgr.validators.has_address(&s.address()))
    }

    /// Advance `last_vote` from `current_vote` if the agreed item changed.
    pub(crate) fn save_vote(&mut self) {
        match (&self.current_vote, &self.last_vote) {
            (Some(current), None) => self.last_vote = Some(current.clone()),
            (Some(current), Some(last)) if current.vote_id != last.vote_id => {
                self.last_vote = Some(current.clone());
            }
            _ => {}
        }
    }

    /// Set the agreed item for the current round.
    pub(crate) fn set_current_vote(&mut self, item: VoteItem) {
        self.current_vote = Some(item);
    }

    /// Advance `last_my_vote` from `my_vote` if the signature changed.
    pub(crate) fn save_my_vote(&mut self) {
        match (&self.my_vote, &self.last_my_vote) {
            (Some(mine), None) => self.last_my_vote = Some(mine.clone()),
            (Some(mine), Some(last)) if mine.signature != last.signature => {
                self.last_my_vote = Some(mine.clone());
            }
            _ => {}
        }
    }

    /// Cache our own vote for the current round.
    pub(crate) fn set_my_vote(&mut self, vote: DposVote) {
        self.my_vote = Some(vote);
    }

    /// Advance `last_notify` from `notify` if the signature changed.
    pub(crate) fn save_notify(&mut self) {
        match (&self.notify, &self.last_notify) {
            (Some(notify), None) => self.last_notify = Some(notify.clone()),
            (Some(notify), Some(last)) if notify.signature != last.signature => {
                self.last_notify = Some(notify.clone());
            }
            _ => {}
        }
    }

    /// Adopt a notify, pushing the previous one into `last_notify` when it
    /// differs by signature.
    pub(crate) fn set_notify(&mut self, notify: DposNotify) {
        if let Some(existing) = &self.notify {
            if existing.signature != notify.signature {
                self.last_notify = Some(existing.clone());
            }
        }
        self.notify = Some(notify);
    }

    /// Buffer a notify for a round that has not started yet.
    pub(crate) fn cache_notify(&mut self, notify: DposNotify) {
        self.cached_notify = Some(notify);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Vote pools
    // ═══════════════════════════════════════════════════════════════════════

    /// Admit a vote to the live pool under the round's staleness floor.
    pub(crate) fn add_votes(&mut self, vote: DposVote) {
        let floor = self.last_vote.as_ref().map(|v| v.period_stop);
        let voter = vote.voter_node_address;
        match self.votes.admit(vote, floor) {
            crate::pool::Admission::Stale => {
                debug!(voter = %voter, "old vote, discarded");
            }
            crate::pool::Admission::DuplicateSignature => {
                debug!(voter = %voter, "duplicate vote, discarded");
            }
            crate::pool::Admission::DuplicateVoter => {
                debug!(voter = %voter, "superseded vote from same voter, discarded");
            }
            _ => {}
        }
    }

    /// Buffer a vote for a future round; no staleness floor applies.
    pub(crate) fn cache_votes(&mut self, vote: DposVote) {
        let voter = vote.voter_node_address;
        if !self.cached_votes.admit(vote, None).accepted() {
            debug!(voter = %voter, "cached vote duplicate, discarded");
        }
    }

    /// Classify the live pool.
    pub(crate) fn check_votes(&self) -> VoteOutcome {
        self.votes.tally(self.config.delegate_num)
    }

    /// Clear the live pool and the per-round slots derived from it.
    pub(crate) fn clear_votes(&mut self) {
        self.votes.clear();
        self.replies.clear();
        self.current_vote = None;
        self.my_vote = None;
    }

    /// Move cached votes that belong to the given round into the live pool.
    pub(crate) fn absorb_cached_votes(&mut self, task: &Task) {
        if self.cached_votes.is_empty() {
            return;
        }
        let floor = self.last_vote.as_ref().map(|v| v.period_stop);
        for vote in self.cached_votes.drain() {
            if vote.item.period_start >= task.period_start
                && vote.item.period_start <= task.period_stop
            {
                self.votes.admit(vote, floor);
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Verification
    // ═══════════════════════════════════════════════════════════════════════

    /// Verify an inbound vote: known validator, valid signature under the
    /// chain id.
    pub fn verify_vote(&self, vote: &DposVote) -> Result<(), DposError> {
        let (_, validator) = self
            .validator_mgr
            .validators
            .get_by_address(&vote.voter_node_address)
            .ok_or(DposError::UnknownValidator(vote.voter_node_address))?;
        let pubkey = PublicKey::from_bytes(&validator.pub_key)?;
        let payload = signing::vote_sign_bytes(&self.validator_mgr.chain_id, vote);
        if !pubkey.verify(&payload, &vote.signature) {
            return Err(DposError::InvalidVoteSignature);
        }
        Ok(())
    }

    /// Verify an inbound vote reply.
    pub fn verify_vote_reply(&self, reply: &DposVoteReply) -> Result<(), DposError> {
        let (_, validator) = self
            .validator_mgr
            .validators
            .get_by_address(&reply.reply_node_address)
            .ok_or(DposError::UnknownValidator(reply.reply_node_address))?;
        let pubkey = PublicKey::from_bytes(&validator.pub_key)?;
        let payload = signing::vote_reply_sign_bytes(&self.validator_mgr.chain_id, reply);
        if !pubkey.verify(&payload, &reply.signature) {
            return Err(DposError::InvalidVoteReplySignature);
        }
        Ok(())
    }

    /// Verify an inbound notify.
    pub fn verify_notify(&self, notify: &DposNotify) -> Result<(), DposError> {
        let (_, validator) = self
            .validator_mgr
            .validators
            .get_by_address(&notify.notify_node_address)
            .ok_or(DposError::UnknownValidator(notify.notify_node_address))?;
        let pubkey = PublicKey::from_bytes(&validator.pub_key)?;
        let payload = signing::notify_sign_bytes(&self.validator_mgr.chain_id, notify);
        if !pubkey.verify(&payload, &notify.signature) {
            return Err(DposError::InvalidNotifySignature);
        }
        Ok(())
    }

    /// Verify a cycle-boundary record against its in-band public key.
    ///
    /// No validator-set check: the record may be produced by any past
    /// proposer.
    pub fn verify_cb_info(&self, info: &DposCBInfo) -> Result<(), DposError> {
        if !info.verify() {
            return Err(DposError::InvalidCBInfoSignature);
        }
        Ok(())
    }

    /// Verify and cache an inbound cycle-boundary record. Shared by every
    /// step's `on_cb_info` handler.
    pub(crate) fn ingest_cb_info(&mut self, info: DposCBInfo) {
        if let Err(e) = self.verify_cb_info(&info) {
            info!(error = %e, cycle = info.cycle, "cycle-boundary record rejected");
            return;
        }
        debug!(cycle = info.cycle, stop_height = info.stop_height, "cycle-boundary record cached");
        self.update_cb_info(info);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Cycle-boundary records
    // ═══════════════════════════════════════════════════════════════════════

    /// Insert a record into the bounded cache.
    pub(crate) fn update_cb_info(&mut self, info: DposCBInfo) {
        self.cb_cache.update(info);
    }

    /// Look up a cached record.
    pub fn cb_info_by_cycle(&self, cycle: i64) -> Option<DposCBInfo> {
        self.cb_cache.get(cycle).cloned()
    }

    /// Ask the application for a cycle's recorded boundary info.
    pub fn query_cycle_boundary_info(
        &self,
        cycle: i64,
    ) -> Result<Option<DposCBInfo>, ClientError> {
        self.client.query_cb_info_by_cycle(cycle)
    }

    /// Prime the cache at startup: probe the current cycle, then the
    /// previous one. Absence and query failure are both tolerated.
    pub fn init_cycle_boundary_info(&mut self) {
        let now = self.clock.now_unix();
        let task = decide_task_by_time(now, &self.config);

        for cycle in [task.cycle, task.cycle - 1] {
            match self.query_cycle_boundary_info(cycle) {
                Ok(Some(info)) => {
                    info!(cycle, "primed cycle-boundary cache");
                    self.update_cb_info(info);
                    return;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(cycle, error = %e, "cycle-boundary query failed");
                }
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Application-facing senders
    // ═══════════════════════════════════════════════════════════════════════

    /// Build, sign, and fire the transaction recording a cycle boundary.
    /// Failures are logged and reported as `false`; they never change state.
    pub fn send_cb_tx(&self, info: &DposCBInfo) -> bool {
        let Some(signer) = &self.signer else {
            error!("cannot send cycle-boundary tx without a signer");
            return false;
        };
        match self.client.create_cb_record_tx(info) {
            Ok(mut tx) => {
                signer.sign_tx(&mut tx);
                match self.client.submit_to_mempool(tx) {
                    Ok(()) => {
                        info!(cycle = info.cycle, "cycle-boundary record submitted");
                        true
                    }
                    Err(e) => {
                        error!(error = %e, "cycle-boundary record submission failed");
                        false
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "cycle-boundary tx build failed");
                false
            }
        }
    }

    /// Build, sign, and fire a VRF commitment registration.
    pub fn send_regist_vrf_m_tx(&self, reg: &VrfMRegistration) -> bool {
        let Some(signer) = &self.signer else {
            error!("cannot register VRF commitment without a signer");
            return false;
        };
        match self.client.create_vrf_m_tx(reg) {
            Ok(mut tx) => {
                signer.sign_tx(&mut tx);
                match self.client.submit_to_mempool(tx) {
                    Ok(()) => {
                        info!(cycle = reg.cycle, "VRF commitment registered");
                        true
                    }
                    Err(e) => {
                        error!(error = %e, "VRF commitment submission failed");
                        false
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "VRF commitment tx build failed");
                false
            }
        }
    }

    /// Build, sign, and fire a VRF reveal registration.
    pub fn send_regist_vrf_rp_tx(&self, reg: &VrfRPRegistration) -> bool {
        let Some(signer) = &self.signer else {
            error!("cannot register VRF reveal without a signer");
            return false;
        };
        match self.client.create_vrf_rp_tx(reg) {
            Ok(mut tx) => {
                signer.sign_tx(&mut tx);
                match self.client.submit_to_mempool(tx) {
                    Ok(()) => {
                        info!(cycle = reg.cycle, "VRF reveal registered");
                        true
                    }
                    Err(e) => {
                        error!(error = %e, "VRF reveal submission failed");
                        false
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "VRF reveal tx build failed");
                false
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Message construction
    // ═══════════════════════════════════════════════════════════════════════

    /// Build the vote item endorsing the delegate whose period covers the
    /// task.
    pub(crate) fn build_vote_item(&self, task: &Task) -> VoteItem {
        let set = &self.validator_mgr.validators;
        let index = task.node_index as usize % set.len().max(1);
        let endorsed = set.at(index).expect("delegate set is non-empty");

        VoteItem {
            vote_id: rotor_types::Hash::ZERO,
            voted_node_address: endorsed.address,
            voted_node_index: index as u32,
            cycle: task.cycle,
            cycle_start: task.cycle_start,
            cycle_stop: task.cycle_stop,
            period_start: task.period_start,
            period_stop: task.period_stop,
            vrf_seed: None,
        }
        .seal()
    }

    /// Build and sign our own vote for a round.
    pub(crate) fn build_my_vote(&self, item: VoteItem, now: i64) -> Option<DposVote> {
        let signer = self.signer.as_ref()?;
        let mut vote = DposVote {
            item,
            voter_node_address: signer.address(),
            vote_timestamp: now,
            signature: Signature::zero(),
        };
        signer.sign_vote(&self.validator_mgr.chain_id, &mut vote);
        Some(vote)
    }

    /// Build and sign a reply acknowledging the agreed item.
    pub(crate) fn build_vote_reply(&self, item: VoteItem, now: i64) -> Option<DposVoteReply> {
        let signer = self.signer.as_ref()?;
        let mut reply = DposVoteReply {
            item,
            reply_node_address: signer.address(),
            reply_timestamp: now,
            signature: Signature::zero(),
        };
        signer.sign_vote_reply(&self.validator_mgr.chain_id, &mut reply);
        Some(reply)
    }

    /// Build and sign a notify reporting block-production progress.
    pub(crate) fn build_notify(
        &self,
        item: VoteItem,
        height_stop: i64,
        hash_stop: rotor_types::Hash,
        now: i64,
    ) -> Option<DposNotify> {
        let signer = self.signer.as_ref()?;
        let mut notify = DposNotify {
            item,
            height_stop,
            hash_stop,
            notify_timestamp: now,
            notify_node_address: signer.address(),
            signature: Signature::zero(),
        };
        signer.sign_notify(&self.validator_mgr.chain_id, &mut notify);
        Some(notify)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // VRF registration
    // ═══════════════════════════════════════════════════════════════════════

    /// Whether the commitment window for the next cycle is open and still
    /// unregistered. The window is the first third of the current cycle.
    pub(crate) fn should_register_vrf_m(&self, task: &Task, now: i64) -> bool {
        if !self.config.vrf_registration {
            return false;
        }
        let third = self.config.cycle_secs() / 3;
        let offset = now - task.cycle_start;
        offset < third && self.reg_m_cycle != Some(task.cycle + 1)
    }

    /// Whether the reveal window for the next cycle is open: the middle
    /// third of the current cycle, after a commitment was registered.
    pub(crate) fn should_register_vrf_rp(&self, task: &Task, now: i64) -> bool {
        if !self.config.vrf_registration {
            return false;
        }
        let third = self.config.cycle_secs() / 3;
        let offset = now - task.cycle_start;
        offset >= third
            && offset < 2 * third
            && self.reg_m_cycle == Some(task.cycle + 1)
            && self.reg_rp_cycle != Some(task.cycle + 1)
    }

    /// Deterministic VRF material for a cycle: the commitment digest, the
    /// reveal digest, and the proof bytes. Derived from the signer so the
    /// reveal always matches the earlier commitment.
    fn vrf_material(&self, cycle: i64) -> Option<(rotor_types::Hash, rotor_types::Hash, Vec<u8>)> {
        let signer = self.signer.as_ref()?;
        let mut tag = Vec::with_capacity(24);
        tag.extend_from_slice(b"rotor/vrf-seed:");
        tag.extend_from_slice(&cycle.to_le_bytes());
        let proof = signer.sign_bytes(&tag);
        let m = rotor_types::Hash::from_bytes(proof.as_bytes());
        let r = rotor_types::Hash::from_parts(&[m.as_bytes(), b"r"]);
        Some((m, r, proof.as_bytes().to_vec()))
    }

    /// Build the commitment registration for a cycle.
    pub(crate) fn build_vrf_m(&self, cycle: i64) -> Option<VrfMRegistration> {
        let (m, _, _) = self.vrf_material(cycle)?;
        Some(VrfMRegistration {
            cycle,
            address: self.signer.as_ref()?.address(),
            m,
        })
    }

    /// Build the reveal registration for a cycle.
    pub(crate) fn build_vrf_rp(&self, cycle: i64) -> Option<VrfRPRegistration> {
        let (_, r, p) = self.vrf_material(cycle)?;
        Some(VrfRPRegistration {
            cycle,
            address: self.signer.as_ref()?.address(),
            r,
            p,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Outbound plumbing
    // ═══════════════════════════════════════════════════════════════════════

    /// Emit a message on the broadcast sink. Never blocks under the state
    /// lock; a full sink drops the message with a warning.
    pub(crate) fn broadcast(&self, msg: ConsensusMsg) {
        let name = msg.type_name();
        if self.broadcast_tx.try_send(MsgInfo::local(msg)).is_err() {
            warn!(msg = name, "broadcast sink full, dropping message");
        }
    }

    /// Feed one of our own messages back through the internal queue so it
    /// passes the same admission path as peer messages.
    pub(crate) fn enqueue_internal(&self, msg: ConsensusMsg) {
        let name = msg.type_name();
        if self.internal_tx.send(MsgInfo::local(msg)).is_err() {
            warn!(msg = name, "internal queue closed, dropping message");
        }
    }

    /// Seconds until `deadline`, floored at one.
    pub(crate) fn secs_until(&self, deadline: i64, now: i64) -> Duration {
        Duration::from_secs((deadline - now + 1).max(1) as u64)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Read-only accessors
    // ═══════════════════════════════════════════════════════════════════════

    /// Deep copy of the validator manager.
    pub fn validator_mgr(&self) -> ValidatorManager {
        self.validator_mgr.clone()
    }

    /// Deep copy of the delegate set.
    pub fn validators(&self) -> Vec<Validator> {
        self.validator_mgr.validators.iter().cloned().collect()
    }

    /// The agreed item of the current round.
    pub fn current_vote(&self) -> Option<&VoteItem> {
        self.current_vote.as_ref()
    }

    /// The last agreed item.
    pub fn last_vote(&self) -> Option<&VoteItem> {
        self.last_vote.as_ref()
    }

    /// Our own vote for the current round.
    pub fn my_vote(&self) -> Option<&DposVote> {
        self.my_vote.as_ref()
    }

    /// The latest proposer notify seen.
    pub fn notify(&self) -> Option<&DposNotify> {
        self.notify.as_ref()
    }

    /// Number of votes in the live pool.
    pub fn vote_pool_len(&self) -> usize {
        self.votes.len()
    }

    /// Number of votes buffered for a future round.
    pub fn cached_vote_len(&self) -> usize {
        self.cached_votes.len()
    }

    /// Number of replies collected in the confirmation phase.
    pub fn reply_len(&self) -> usize {
        self.replies.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use rotor_types::{Hash, KeyPair, ValidatorSet};

    struct NullClient;

    impl ChainClient for NullClient {
        fn query_cb_info_by_cycle(
            &self,
            _cycle: i64,
        ) -> Result<Option<DposCBInfo>, ClientError> {
            Ok(None)
        }
        fn last_block_info(&self) -> Result<(i64, Hash), ClientError> {
            Ok((0, Hash::ZERO))
        }
        fn create_cb_record_tx(
            &self,
            _info: &DposCBInfo,
        ) -> Result<rotor_types::Transaction, ClientError> {
            Err(ClientError::TxBuild("unsupported".into()))
        }
        fn create_vrf_m_tx(
            &self,
            _reg: &VrfMRegistration,
        ) -> Result<rotor_types::Transaction, ClientError> {
            Err(ClientError::TxBuild("unsupported".into()))
        }
        fn create_vrf_rp_tx(
            &self,
            _reg: &VrfRPRegistration,
        ) -> Result<rotor_types::Transaction, ClientError> {
            Err(ClientError::TxBuild("unsupported".into()))
        }
        fn submit_to_mempool(&self, _tx: rotor_types::Transaction) -> Result<(), ClientError> {
            Ok(())
        }
    }

    fn test_state() -> ConsensusState {
        let (ticker, _tock_rx) = TimeoutTicker::new();
        let (broadcast_tx, _broadcast_rx) = tokio::sync::mpsc::channel(16);
        let (internal_tx, _internal_rx) = tokio::sync::mpsc::unbounded_channel();
        ConsensusState::new(
            Arc::new(NullClient),
            ValidatorManager::new(ValidatorSet::default(), "rotor-test"),
            DposConfig::default(),
            Arc::new(ManualClock::new(0)),
            ticker,
            broadcast_tx,
            internal_tx,
        )
    }

    fn item(id: u8) -> VoteItem {
        VoteItem {
            vote_id: Hash::from_bytes(&[id]),
            voted_node_address: KeyPair::from_seed(&[id; 32]).address(),
            voted_node_index: 0,
            cycle: 1,
            cycle_start: 0,
            cycle_stop: 99,
            period_start: 0,
            period_stop: 24,
            vrf_seed: None,
        }
    }

    #[tokio::test]
    async fn save_vote_advances_only_on_new_id() {
        let mut cs = test_state();

        cs.set_current_vote(item(1));
        cs.save_vote();
        assert_eq!(cs.last_vote().unwrap().vote_id, item(1).vote_id);

        // Same id: no movement.
        cs.save_vote();
        assert_eq!(cs.last_vote().unwrap().vote_id, item(1).vote_id);

        // New id: advances.
        cs.set_current_vote(item(2));
        cs.save_vote();
        assert_eq!(cs.last_vote().unwrap().vote_id, item(2).vote_id);
    }

    #[tokio::test]
    async fn last_vote_survives_pool_clear() {
        let mut cs = test_state();
        cs.set_current_vote(item(1));
        cs.save_vote();

        cs.clear_votes();
        assert!(cs.current_vote().is_none());
        assert!(cs.last_vote().is_some());
    }

    #[tokio::test]
    async fn set_notify_pushes_previous_down() {
        let mut cs = test_state();
        let signer = ValidatorSigner::new(KeyPair::from_seed(&[1; 32]));
        cs.set_signer(signer, 0);

        let first = cs.build_notify(item(1), 10, Hash::ZERO, 100).unwrap();
        let second = cs.build_notify(item(2), 20, Hash::ZERO, 200).unwrap();

        cs.set_notify(first.clone());
        assert!(cs.last_notify.is_none());

        cs.set_notify(second.clone());
        assert_eq!(cs.last_notify.as_ref().unwrap().signature, first.signature);
        assert_eq!(cs.notify().unwrap().signature, second.signature);
    }

    #[tokio::test]
    async fn vrf_reveal_matches_commitment() {
        let mut cs = test_state();
        cs.set_signer(ValidatorSigner::new(KeyPair::from_seed(&[1; 32])), 0);

        let m1 = cs.build_vrf_m(7).unwrap();
        let m2 = cs.build_vrf_m(7).unwrap();
        assert_eq!(m1.m, m2.m);

        // The reveal is bound to the same material.
        let rp = cs.build_vrf_rp(7).unwrap();
        let expected_m = Hash::from_bytes(&rp.p);
        assert_eq!(m1.m, expected_m);
    }
}
