//! VoteReply: collecting acknowledgements of the agreed item.
//!
//! When replies endorsing the agreed vote id reach the super-majority
//! threshold the node advances: to SendNotify if it is the elected
//! proposer, to Wait otherwise.

use crate::state::ConsensusState;
use crate::step::{Step, STEP_HANDOFF};
use rotor_types::{DposCBInfo, DposNotify, DposVote, DposVoteReply, VoteItem};
use tracing::{debug, info, warn};

pub(crate) fn on_timeout(cs: &mut ConsensusState) {
    let Some(current) = cs.current_vote.clone() else {
        warn!("confirmation phase without an agreed item, restarting");
        fail_round(cs);
        return;
    };

    if cs.replies.count_for(&current.vote_id) >= cs.config.majority() {
        advance(cs, &current);
    } else {
        info!(
            replies = cs.reply_len(),
            "confirmation phase timed out, restarting round"
        );
        fail_round(cs);
    }
}

fn fail_round(cs: &mut ConsensusState) {
    cs.clear_votes();
    cs.set_step(Step::Init);
    let retry = cs.config.retry_timeout;
    cs.schedule_timeout(retry, Step::Init);
}

fn advance(cs: &mut ConsensusState, current: &VoteItem) {
    let now = cs.clock.now_unix();
    if cs.is_proposer() {
        info!(
            period_stop = current.period_stop,
            "elected proposer for this period"
        );
        cs.set_step(Step::SendNotify);
        cs.schedule_timeout(STEP_HANDOFF, Step::SendNotify);
    } else {
        debug!(proposer = %current.voted_node_address, "following elected proposer");
        cs.set_step(Step::Wait);
        let wait = cs.secs_until(current.period_stop, now);
        cs.schedule_timeout(wait, Step::Wait);
    }
}

pub(crate) fn on_vote(cs: &mut ConsensusState, vote: DposVote) {
    if let Err(e) = cs.verify_vote(&vote) {
        info!(error = %e, voter = %vote.voter_node_address, "vote rejected");
        return;
    }
    let current_stop = cs.current_vote.as_ref().map(|v| v.period_stop).unwrap_or(0);
    if vote.item.period_start >= current_stop {
        debug!(voter = %vote.voter_node_address, "future-round vote, buffering");
        cs.cache_votes(vote);
    } else {
        debug!(voter = %vote.voter_node_address, "vote for a decided round, ignored");
    }
}

pub(crate) fn on_vote_reply(cs: &mut ConsensusState, reply: DposVoteReply) {
    if let Err(e) = cs.verify_vote_reply(&reply) {
        info!(error = %e, replier = %reply.reply_node_address, "vote reply rejected");
        return;
    }

    let Some(current) = cs.current_vote.clone() else {
        warn!("vote reply without an agreed item, ignored");
        return;
    };
    if reply.item.vote_id != current.vote_id {
        debug!(replier = %reply.reply_node_address, "reply for a different item, ignored");
        return;
    }

    if !cs.replies.admit(reply).accepted() {
        return;
    }
    debug!(replies = cs.reply_len(), "reply admitted");

    if cs.replies.count_for(&current.vote_id) >= cs.config.majority() {
        advance(cs, &current);
    }
}

pub(crate) fn on_notify(cs: &mut ConsensusState, notify: DposNotify) {
    if let Err(e) = cs.verify_notify(&notify) {
        info!(error = %e, notifier = %notify.notify_node_address, "notify rejected");
        return;
    }

    // The proposer announcing is itself confirmation that the election
    // concluded; followers adopt it without waiting for more replies.
    let matches_current = cs
        .current_vote
        .as_ref()
        .is_some_and(|current| current.vote_id == notify.item.vote_id);
    if matches_current && !cs.is_proposer() {
        let now = cs.clock.now_unix();
        let deadline = notify.item.period_stop;
        cs.set_notify(notify);
        cs.save_notify();
        cs.set_step(Step::Wait);
        let wait = cs.secs_until(deadline, now);
        cs.schedule_timeout(wait, Step::Wait);
        return;
    }

    debug!(notifier = %notify.notify_node_address, "notify for another round, buffering");
    cs.cache_notify(notify);
}

pub(crate) fn on_cb_info(cs: &mut ConsensusState, info: DposCBInfo) {
    cs.ingest_cb_info(info);
}
