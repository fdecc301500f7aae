//! SendNotify: the elected proposer's production phase.
//!
//! Periodically signs and broadcasts a notify carrying the chain tip. When
//! the period ends the proposer returns to Init; if the period closes the
//! cycle it first signs a cycle-boundary record, caches it, and submits the
//! recording transaction to the application mempool.

use crate::message::ConsensusMsg;
use crate::state::ConsensusState;
use crate::step::Step;
use rotor_types::{DposCBInfo, DposNotify, DposVote, DposVoteReply, Signature};
use tracing::{debug, info, warn};

pub(crate) fn on_timeout(cs: &mut ConsensusState) {
    let now = cs.clock.now_unix();
    let Some(current) = cs.current_vote.clone() else {
        warn!("notify phase without an agreed item, restarting");
        cs.set_step(Step::Init);
        let retry = cs.config.retry_timeout;
        cs.schedule_timeout(retry, Step::Init);
        return;
    };

    let (height, hash) = match cs.client.last_block_info() {
        Ok(tip) => tip,
        Err(e) => {
            warn!(error = %e, "chain tip unavailable, retrying notify");
            let retry = cs.config.retry_timeout;
            cs.schedule_timeout(retry, Step::SendNotify);
            return;
        }
    };

    let Some(notify) = cs.build_notify(current.clone(), height, hash, now) else {
        warn!("no signer available, abandoning notify phase");
        cs.set_step(Step::Init);
        let retry = cs.config.retry_timeout;
        cs.schedule_timeout(retry, Step::Init);
        return;
    };

    debug!(height, "notify broadcast");
    cs.broadcast(ConsensusMsg::Notify(notify.clone()));
    cs.set_notify(notify);
    cs.save_notify();

    if now >= current.period_stop {
        // Our period also closes the cycle: record the boundary so joining
        // and restarted nodes can align.
        if current.period_stop >= current.cycle_stop {
            if let Some(signer) = &cs.signer {
                let mut info = DposCBInfo {
                    cycle: current.cycle,
                    stop_height: height,
                    stop_hash: hash,
                    pubkey: signer.public_key(),
                    signature: Signature::zero(),
                };
                signer.sign_cb_info(&mut info);
                cs.update_cb_info(info.clone());
                cs.send_cb_tx(&info);
            }
        }

        info!(height, "production period finished");
        cs.set_step(Step::Init);
        let retry = cs.config.retry_timeout;
        cs.schedule_timeout(retry, Step::Init);
    } else {
        let interval = cs.config.notify_interval;
        cs.schedule_timeout(interval, Step::SendNotify);
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
    let _ = cs;
    debug!(replier = %reply.reply_node_address, "late vote reply, ignored");
}

pub(crate) fn on_notify(cs: &mut ConsensusState, notify: DposNotify) {
    let _ = cs;
    warn!(
        notifier = %notify.notify_node_address,
        "unexpected notify while producing, ignored"
    );
}

pub(crate) fn on_cb_info(cs: &mut ConsensusState, info: DposCBInfo) {
    cs.ingest_cb_info(info);
}
