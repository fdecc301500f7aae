//! The dispatcher: single consumer of peer messages, internal messages, and
//! timeouts.
//!
//! One long-lived task owns the event loop; all mutation of
//! [`ConsensusState`] happens inside it while the state mutex is held.
//! External accessors acquire the same mutex and return deep copies. A
//! panic inside a handler is caught and logged as a consensus failure; the
//! loop continues.

use crate::client::ChainClient;
use crate::clock::{Clock, SystemClock};
use crate::config::DposConfig;
use crate::message::{ConsensusMsg, MsgInfo};
use crate::state::ConsensusState;
use crate::step::Step;
use crate::ticker::{TimeoutInfo, TimeoutTicker};
use rotor_types::{Validator, ValidatorManager, ValidatorSigner};
use std::backtrace::Backtrace;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Receivers owned by the event loop, taken once at start.
struct CoreChannels {
    peer_rx: mpsc::Receiver<MsgInfo>,
    internal_rx: mpsc::UnboundedReceiver<MsgInfo>,
    tock_rx: mpsc::Receiver<TimeoutInfo>,
    quit_rx: mpsc::Receiver<()>,
}

/// Drives the consensus state machine.
///
/// Peers push envelopes into the bounded peer queue; the state machine's
/// own messages loop back through an unbounded internal queue (self-sends
/// must never block the dispatcher); the ticker delivers the single pending
/// timeout. The loop drains them in priority order and feeds the active
/// state's handler under the state mutex.
pub struct ConsensusCore {
    state: Arc<Mutex<ConsensusState>>,
    peer_tx: mpsc::Sender<MsgInfo>,
    broadcast_rx: Mutex<Option<mpsc::Receiver<MsgInfo>>>,
    quit_tx: mpsc::Sender<()>,
    channels: Mutex<Option<CoreChannels>>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl ConsensusCore {
    /// Create a core on the system clock.
    pub fn new(
        client: Arc<dyn ChainClient>,
        validator_mgr: ValidatorManager,
        config: DposConfig,
    ) -> Self {
        Self::with_clock(client, validator_mgr, config, Arc::new(SystemClock))
    }

    /// Create a core with an injected clock (tests drive cycle boundaries
    /// through this).
    pub fn with_clock(
        client: Arc<dyn ChainClient>,
        validator_mgr: ValidatorManager,
        config: DposConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let queue_size = config.queue_size;
        let (ticker, tock_rx) = TimeoutTicker::new();
        let (peer_tx, peer_rx) = mpsc::channel(queue_size);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (broadcast_tx, broadcast_rx) = mpsc::channel(queue_size);
        let (quit_tx, quit_rx) = mpsc::channel(1);

        let state = ConsensusState::new(
            client,
            validator_mgr,
            config,
            clock,
            ticker,
            broadcast_tx,
            internal_tx,
        );

        Self {
            state: Arc::new(Mutex::new(state)),
            peer_tx,
            broadcast_rx: Mutex::new(Some(broadcast_rx)),
            quit_tx,
            channels: Mutex::new(Some(CoreChannels {
                peer_rx,
                internal_rx,
                tock_rx,
                quit_rx,
            })),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    /// Sender half of the peer message queue, handed to the network layer.
    pub fn peer_sender(&self) -> mpsc::Sender<MsgInfo> {
        self.peer_tx.clone()
    }

    /// Take the broadcast sink's receiver; the network layer reads outbound
    /// envelopes from it. Returns `None` after the first call.
    pub fn take_broadcast_receiver(&self) -> Option<mpsc::Receiver<MsgInfo>> {
        self.broadcast_rx.lock().ok()?.take()
    }

    /// Install the private validator used for signing.
    pub fn set_signer(&self, signer: ValidatorSigner, index: usize) {
        if let Ok(mut cs) = self.state.lock() {
            cs.set_signer(signer, index);
        }
    }

    /// Deep copy of the current validators.
    pub fn get_validators(&self) -> Vec<Validator> {
        self.state
            .lock()
            .map(|cs| cs.validators())
            .unwrap_or_default()
    }

    /// Deep copy of the validator manager.
    pub fn get_validator_mgr(&self) -> ValidatorManager {
        self.state
            .lock()
            .map(|cs| cs.validator_mgr())
            .unwrap_or_default()
    }

    /// Run a closure against the locked state. Intended for inspection;
    /// the closure must not block.
    pub fn with_state<R>(&self, f: impl FnOnce(&ConsensusState) -> R) -> Option<R> {
        self.state.lock().ok().map(|cs| f(&cs))
    }

    /// Launch the event loop. Idempotent; must be called from within a
    /// tokio runtime.
    ///
    /// Primes the cycle-boundary cache from the application and schedules
    /// the initial timeout into the Init state.
    pub fn start(&self) {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        if self.stopped.load(Ordering::SeqCst) {
            error!("consensus core already stopped");
            return;
        }

        let Some(channels) = self.channels.lock().ok().and_then(|mut ch| ch.take()) else {
            error!("consensus core channels already consumed");
            return;
        };

        {
            let mut cs = match self.state.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            cs.init_cycle_boundary_info();
            let initial = cs.config.initial_timeout;
            cs.schedule_timeout(initial, Step::Init);
        }

        let state = self.state.clone();
        tokio::spawn(receive_routine(state, channels));
        info!("consensus core started");
    }

    /// Stop the ticker and signal the event loop to exit after the
    /// in-progress handler.
    pub fn stop(&self) {
        if self
            .stopped
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        if let Ok(mut cs) = self.state.lock() {
            cs.ticker.stop();
        }
        let _ = self.quit_tx.try_send(());
        info!("consensus core stopping");
    }

    /// Whether the core has been started and not yet stopped.
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.stopped.load(Ordering::SeqCst)
    }
}

/// The event loop. Priority: quit, then the pending timeout, then internal
/// self-messages, then peer messages.
async fn receive_routine(state: Arc<Mutex<ConsensusState>>, mut ch: CoreChannels) {
    info!("consensus receive loop running");
    loop {
        tokio::select! {
            biased;

            _ = ch.quit_rx.recv() => {
                info!("consensus core received quit signal");
                return;
            }

            Some(ti) = ch.tock_rx.recv() => {
                handle_timeout(&state, ti);
            }

            Some(mi) = ch.internal_rx.recv() => {
                handle_msg(&state, mi);
            }

            Some(mi) = ch.peer_rx.recv() => {
                handle_msg(&state, mi);
            }

            else => {
                info!("all event sources closed, exiting receive loop");
                return;
            }
        }
    }
}

fn handle_msg(state: &Arc<Mutex<ConsensusState>>, mi: MsgInfo) {
    let MsgInfo {
        msg,
        peer_id,
        peer_ip,
    } = mi;
    let msg_type = msg.type_name();

    let mut cs = match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };

    let result = catch_unwind(AssertUnwindSafe(|| match msg {
        ConsensusMsg::Vote(vote) => cs.handle_vote(vote),
        ConsensusMsg::VoteReply(reply) => cs.handle_vote_reply(reply),
        ConsensusMsg::Notify(notify) => cs.handle_notify(notify),
        ConsensusMsg::CBInfo(info) => cs.handle_cb_info(info),
    }));

    if let Err(panic) = result {
        error!(
            msg = msg_type,
            peer_id = %peer_id,
            peer_ip = %peer_ip,
            panic = %panic_message(&*panic),
            backtrace = %Backtrace::force_capture(),
            "CONSENSUS FAILURE in message handler"
        );
    }
}

fn handle_timeout(state: &Arc<Mutex<ConsensusState>>, ti: TimeoutInfo) {
    debug!(step = ti.step.name(), duration = ?ti.duration, "received tick");

    let mut cs = match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };

    let result = catch_unwind(AssertUnwindSafe(|| cs.handle_timeout()));

    if let Err(panic) = result {
        error!(
            step = ti.step.name(),
            panic = %panic_message(&*panic),
            backtrace = %Backtrace::force_capture(),
            "CONSENSUS FAILURE in timeout handler"
        );
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
