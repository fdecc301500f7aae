//! Init: the starting and resynchronization state.
//!
//! Every round begins and every failed or finished round ends here. The
//! timeout derives the current schedule position from wall-clock time,
//! clears the previous round, and either resumes as a follower from a
//! cached notify, diverts into a VRF registration window, or forms and
//! broadcasts this node's vote.

use crate::message::ConsensusMsg;
use crate::state::ConsensusState;
use crate::step::{Step, STEP_HANDOFF};
use crate::task::decide_task_by_time;
use rotor_types::{DposCBInfo, DposNotify, DposVote, DposVoteReply};
use tracing::{debug, info, warn};

pub(crate) fn on_timeout(cs: &mut ConsensusState) {
    let now = cs.clock.now_unix();
    let task = decide_task_by_time(now, &cs.config);
    debug!(
        cycle = task.cycle,
        period_start = task.period_start,
        period_stop = task.period_stop,
        "init timeout"
    );

    cs.clear_votes();

    // A notify that arrived before this round started resumes us directly
    // as a follower of the announced proposer.
    if let Some(cached) = cs.cached_notify.take() {
        if cached.item.period_stop >= now {
            info!(
                proposer = %cached.notify_node_address,
                "resuming from cached notify"
            );
            cs.set_current_vote(cached.item.clone());
            cs.save_vote();
            let deadline = cached.item.period_stop;
            cs.set_notify(cached);
            cs.save_notify();
            let wait = cs.secs_until(deadline, now);
            cs.set_step(Step::Wait);
            cs.schedule_timeout(wait, Step::Wait);
            return;
        }
        debug!("cached notify expired, dropped");
    }

    if !cs.is_delegate() {
        info!("not a delegate for this cycle, standing by");
        let retry = cs.config.retry_timeout;
        cs.schedule_timeout(retry, Step::Init);
        return;
    }

    // Registration windows for the upcoming cycle take precedence over
    // voting; each returns to Init immediately afterwards.
    if cs.should_register_vrf_m(&task, now) {
        cs.set_step(Step::RegVrfM);
        cs.schedule_timeout(STEP_HANDOFF, Step::RegVrfM);
        return;
    }
    if cs.should_register_vrf_rp(&task, now) {
        cs.set_step(Step::RegVrfRP);
        cs.schedule_timeout(STEP_HANDOFF, Step::RegVrfRP);
        return;
    }

    cs.absorb_cached_votes(&task);

    let item = cs.build_vote_item(&task);
    let Some(vote) = cs.build_my_vote(item, now) else {
        warn!("no signer available, cannot vote");
        let retry = cs.config.retry_timeout;
        cs.schedule_timeout(retry, Step::Init);
        return;
    };

    info!(
        endorsed = %vote.item.voted_node_address,
        cycle = task.cycle,
        "broadcasting own vote"
    );
    cs.set_my_vote(vote.clone());
    cs.save_my_vote();
    cs.broadcast(ConsensusMsg::Vote(vote.clone()));
    cs.enqueue_internal(ConsensusMsg::Vote(vote));

    cs.set_step(Step::Voting);
    let timeout = cs.config.voting_timeout;
    cs.schedule_timeout(timeout, Step::Voting);
}

pub(crate) fn on_vote(cs: &mut ConsensusState, vote: DposVote) {
    if let Err(e) = cs.verify_vote(&vote) {
        info!(error = %e, voter = %vote.voter_node_address, "vote rejected");
        return;
    }
    // The round has not started yet; keep the vote for the next Voting
    // phase.
    debug!(voter = %vote.voter_node_address, "buffering vote received in init");
    cs.cache_votes(vote);
}

pub(crate) fn on_vote_reply(cs: &mut ConsensusState, reply: DposVoteReply) {
    let _ = cs;
    warn!(replier = %reply.reply_node_address, "unexpected vote reply in init, ignored");
}

pub(crate) fn on_notify(cs: &mut ConsensusState, notify: DposNotify) {
    if let Err(e) = cs.verify_notify(&notify) {
        info!(error = %e, notifier = %notify.notify_node_address, "notify rejected");
        return;
    }
    debug!(notifier = %notify.notify_node_address, "buffering notify received in init");
    cs.cache_notify(notify);
}

pub(crate) fn on_cb_info(cs: &mut ConsensusState, info: DposCBInfo) {
    cs.ingest_cb_info(info);
}
