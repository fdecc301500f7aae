//! Voting: collecting votes for the current round.
//!
//! Each admitted vote re-runs the tally. A super-majority advances to the
//! confirmation phase; an unwinnable pool or a phase timeout restarts the
//! round from Init.

use crate::message::ConsensusMsg;
use crate::pool::VoteOutcome;
use crate::state::ConsensusState;
use crate::step::Step;
use crate::task::decide_task_by_time;
use rotor_types::{DposCBInfo, DposNotify, DposVote, DposVoteReply};
use tracing::{debug, info, warn};

pub(crate) fn on_timeout(cs: &mut ConsensusState) {
    info!(votes = cs.vote_pool_len(), "voting phase timed out");
    fail_round(cs);
}

fn fail_round(cs: &mut ConsensusState) {
    cs.clear_votes();
    cs.set_step(Step::Init);
    let retry = cs.config.retry_timeout;
    cs.schedule_timeout(retry, Step::Init);
}

pub(crate) fn on_vote(cs: &mut ConsensusState, vote: DposVote) {
    if let Err(e) = cs.verify_vote(&vote) {
        info!(error = %e, voter = %vote.voter_node_address, "vote rejected");
        return;
    }

    let now = cs.clock.now_unix();
    let task = decide_task_by_time(now, &cs.config);
    if vote.item.period_start >= task.period_stop {
        debug!(voter = %vote.voter_node_address, "future-round vote, buffering");
        cs.cache_votes(vote);
        return;
    }

    cs.add_votes(vote);

    match cs.check_votes() {
        VoteOutcome::Success(item) => {
            info!(
                vote_id = %item.vote_id,
                proposer = %item.voted_node_address,
                votes = cs.vote_pool_len(),
                "super-majority reached"
            );
            cs.set_current_vote(item.clone());
            cs.save_vote();

            if let Some(reply) = cs.build_vote_reply(item, now) {
                cs.broadcast(ConsensusMsg::VoteReply(reply.clone()));
                cs.enqueue_internal(ConsensusMsg::VoteReply(reply));
            }

            cs.set_step(Step::VoteReply);
            let timeout = cs.config.vote_reply_timeout;
            cs.schedule_timeout(timeout, Step::VoteReply);
        }
        VoteOutcome::Fail => {
            info!(
                votes = cs.vote_pool_len(),
                "no reachable super-majority, restarting round"
            );
            fail_round(cs);
        }
        VoteOutcome::Continue => {}
    }
}

pub(crate) fn on_vote_reply(cs: &mut ConsensusState, reply: DposVoteReply) {
    let _ = cs;
    warn!(replier = %reply.reply_node_address, "unexpected vote reply in voting phase, ignored");
}

pub(crate) fn on_notify(cs: &mut ConsensusState, notify: DposNotify) {
    if let Err(e) = cs.verify_notify(&notify) {
        info!(error = %e, notifier = %notify.notify_node_address, "notify rejected");
        return;
    }
    // A proposer is already announcing while we are still voting; keep the
    // notify for the next Init to resynchronize from.
    debug!(notifier = %notify.notify_node_address, "notify during voting, buffering");
    cs.cache_notify(notify);
}

pub(crate) fn on_cb_info(cs: &mut ConsensusState, info: DposCBInfo) {
    cs.ingest_cb_info(info);
}
