//! RegVrfM: registering the VRF commitment for the next cycle.

use crate::state::ConsensusState;
use crate::step::{Step, STEP_HANDOFF};
use crate::task::decide_task_by_time;
use rotor_types::{DposCBInfo, DposNotify, DposVote, DposVoteReply};
use tracing::{debug, info, warn};

pub(crate) fn on_timeout(cs: &mut ConsensusState) {
    let now = cs.clock.now_unix();
    let task = decide_task_by_time(now, &cs.config);
    let next_cycle = task.cycle + 1;

    match cs.build_vrf_m(next_cycle) {
        Some(reg) => {
            if cs.send_regist_vrf_m_tx(&reg) {
                info!(cycle = next_cycle, "VRF commitment window served");
                cs.reg_m_cycle = Some(next_cycle);
            }
        }
        None => warn!("no signer, skipping VRF commitment"),
    }

    cs.set_step(Step::Init);
    cs.schedule_timeout(STEP_HANDOFF, Step::Init);
}

pub(crate) fn on_vote(cs: &mut ConsensusState, vote: DposVote) {
    if let Err(e) = cs.verify_vote(&vote) {
        info!(error = %e, voter = %vote.voter_node_address, "vote rejected");
        return;
    }
    debug!(voter = %vote.voter_node_address, "buffering vote received during VRF registration");
    cs.cache_votes(vote);
}

pub(crate) fn on_vote_reply(cs: &mut ConsensusState, reply: DposVoteReply) {
    let _ = cs;
    warn!(replier = %reply.reply_node_address, "unexpected vote reply during VRF registration, ignored");
}

pub(crate) fn on_notify(cs: &mut ConsensusState, notify: DposNotify) {
    if let Err(e) = cs.verify_notify(&notify) {
        info!(error = %e, notifier = %notify.notify_node_address, "notify rejected");
        return;
    }
    debug!(notifier = %notify.notify_node_address, "buffering notify received during VRF registration");
    cs.cache_notify(notify);
}

pub(crate) fn on_cb_info(cs: &mut ConsensusState, info: DposCBInfo) {
    cs.ingest_cb_info(info);
}
