//! Wait: following the elected proposer.
//!
//! Accepts and verifies the proposer's notifies, keeps the notify slots
//! current, and advances to the next round's Init when the period ends.

use crate::state::ConsensusState;
use crate::step::Step;
use rotor_types::{DposCBInfo, DposNotify, DposVote, DposVoteReply};
use tracing::{debug, info};

pub(crate) fn on_timeout(cs: &mut ConsensusState) {
    debug!("wait period ended");
    cs.set_step(Step::Init);
    let retry = cs.config.retry_timeout;
    cs.schedule_timeout(retry, Step::Init);
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
    let _ = cs;
    debug!(replier = %reply.reply_node_address, "late vote reply, ignored");
}

pub(crate) fn on_notify(cs: &mut ConsensusState, notify: DposNotify) {
    if let Err(e) = cs.verify_notify(&notify) {
        info!(error = %e, notifier = %notify.notify_node_address, "notify rejected");
        return;
    }

    if let Some(current) = &cs.current_vote {
        if notify.item.vote_id != current.vote_id {
            if notify.item.period_start >= current.period_stop {
                debug!("notify for a future round, buffering");
                cs.cache_notify(notify);
            } else {
                debug!("stale notify, ignored");
            }
            return;
        }
    }

    let now = cs.clock.now_unix();
    let period_over = now > notify.item.period_stop;
    debug!(
        height_stop = notify.height_stop,
        notifier = %notify.notify_node_address,
        "notify adopted"
    );
    cs.set_notify(notify);
    cs.save_notify();

    // The proposer's final notify may land after the period boundary; move
    // straight to the next round instead of waiting for our own timeout.
    if period_over {
        cs.set_step(Step::Init);
        let retry = cs.config.retry_timeout;
        cs.schedule_timeout(retry, Step::Init);
    }
}

pub(crate) fn on_cb_info(cs: &mut ConsensusState, info: DposCBInfo) {
    cs.ingest_cb_info(info);
}
