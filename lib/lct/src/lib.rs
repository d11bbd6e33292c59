//! LCT — the cooperative thread multiplexer.
//!
//! Gives a hosted OS any number of threads, of which only one ever executes
//! embedded code at a time. The hosted scheduler names the one thread that
//! is "currently allowed" to run (`swap`); every other thread is parked,
//! waiting for its own turn.
//!
//! Unlike the original's `pthread_mutex_t` held across the entire duration a
//! thread runs embedded code, this port only ever holds the table lock for
//! short critical sections. That's sound here because every party that
//! could contend for it is, by construction, parked inside a `Condvar::wait`
//! for the whole time the allowed thread is running: nothing else is ever
//! actually trying to touch the table concurrently. See DESIGN.md.
//!
//! A thread that must stop running embedded code partway through a call
//! (an abort, or cleanup during termination) does so by unwinding: panicking
//! with a private marker type that a panic hook installed by this crate
//! swallows silently, and that [`guard_thread_entry`] catches. This mirrors
//! `pthread_exit`'s "leave from wherever you are" semantics using an
//! ordinary (if unusual) safe-Rust mechanism.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Condvar, Mutex, Once};

use diag::safe_call;

/// The state of one table slot. Transitions only ever move right:
/// `NotUsed -> Used -> Aborting -> Aborted`, with a side exit to `Failed`
/// from `Used` if the entry callback unexpectedly returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    NotUsed,
    Used,
    Aborting,
    Aborted,
    Failed,
}

struct Slot<P> {
    state: SlotState,
    running: bool,
    unique_id: u64,
    payload: Option<P>,
}

impl<P> Default for Slot<P> {
    fn default() -> Self {
        Self {
            state: SlotState::NotUsed,
            running: false,
            unique_id: 0,
            payload: None,
        }
    }
}

const ALLOC_CHUNK_SIZE: usize = 64;

struct Inner<P> {
    slots: Vec<Slot<P>>,
    currently_allowed: Option<usize>,
    terminate: bool,
    thread_create_count: u64,
}

/// A marker unwound through the call stack of a thread whose embedded
/// execution must stop immediately. Never surfaced to callers.
enum SlotExit {
    Aborted,
    Terminated,
}

fn install_quiet_exit_hook() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let default_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if info.payload().downcast_ref::<SlotExit>().is_some() {
                return;
            }
            default_hook(info);
        }));
    });
}

/// Run `f`, catching the internal abort/terminate unwind so it ends the
/// calling thread quietly instead of propagating as a visible panic. Any
/// other panic is resumed unchanged.
///
/// This wraps both this crate's own thread bodies and, externally, the
/// bootstrap SW thread an embedding orchestrator hands to LCE's `boot`,
/// since that thread is also the one that eventually calls
/// [`Lct::main_thread_start`] to exit itself.
pub fn guard_thread_entry<F: FnOnce()>(f: F) {
    install_quiet_exit_hook();
    if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(f)) {
        if payload.downcast_ref::<SlotExit>().is_none() {
            std::panic::resume_unwind(payload);
        }
    }
}

enum WaitOutcome {
    Allowed,
    Aborted,
    Terminated,
}

/// The cooperative thread multiplexer. One instance, typically a process
/// singleton behind an `Arc`.
pub struct Lct<P: Send + 'static> {
    inner: Mutex<Inner<P>>,
    cond: Condvar,
    entry_fn: Box<dyn Fn(P) + Send + Sync>,
}

impl<P: Send + 'static> Lct<P> {
    /// Construct a new instance with an empty table and `currently_allowed =
    /// None`. `entry_fn` is called with a slot's payload the first time that
    /// slot is allowed to run; it is expected not to return.
    pub fn new(entry_fn: impl Fn(P) + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                slots: Vec::new(),
                currently_allowed: None,
                terminate: false,
                thread_create_count: 0,
            }),
            cond: Condvar::new(),
            entry_fn: Box::new(entry_fn),
        })
    }

    fn empty_slot(inner: &mut Inner<P>) -> usize {
        for (idx, slot) in inner.slots.iter().enumerate() {
            let reusable = slot.state == SlotState::NotUsed
                || (cfg!(feature = "reuse-aborted-slots") && slot.state == SlotState::Aborted);
            if reusable {
                return idx;
            }
        }

        let start = inner.slots.len();
        inner
            .slots
            .resize_with(start + ALLOC_CHUNK_SIZE, Slot::default);
        start
    }

    /// Allocate a slot for a new hosted-OS thread, spawn the host thread
    /// backing it, and return the slot index the caller should use to refer
    /// to this thread from now on.
    pub fn new_thread(self: &Arc<Self>, payload: P) -> usize {
        let idx = {
            let mut guard = safe_call!(self.inner.lock());
            let idx = Self::empty_slot(&mut guard);
            let unique_id = guard.thread_create_count;
            guard.thread_create_count += 1;
            guard.slots[idx] = Slot {
                state: SlotState::Used,
                running: false,
                unique_id,
                payload: Some(payload),
            };
            log::trace!("slot {idx} -> Used (unique id {unique_id})");
            idx
        };

        let this = Arc::clone(self);
        safe_call!(std::thread::Builder::new()
            .name(format!("lct-sw-{idx}"))
            .spawn(move || this.thread_starter(idx)));

        idx
    }

    fn thread_starter(self: Arc<Self>, idx: usize) {
        {
            let guard = safe_call!(self.inner.lock());
            if guard.terminate {
                return;
            }
        }

        let this = Arc::clone(&self);
        guard_thread_entry(move || match this.wait_until_allowed(idx) {
            WaitOutcome::Allowed => {
                let payload = {
                    let mut guard = safe_call!(this.inner.lock());
                    guard.slots[idx].payload.take()
                }
                .expect("allowed slot has no payload");

                (this.entry_fn)(payload);

                // The entry callback is expected never to return.
                let mut guard = safe_call!(this.inner.lock());
                guard.slots[idx].state = SlotState::Failed;
                guard.slots[idx].running = false;
                log::trace!("slot {idx} -> Failed (entry callback returned)");
            }
            WaitOutcome::Aborted => this.abort_tail(idx),
            WaitOutcome::Terminated => {}
        });
    }

    /// Block until `idx` is the allowed slot, rechecking the abort and
    /// terminate flags on every wake-up. Callers that already hold the
    /// lock (because they just handed control to another slot in the same
    /// critical section) should go through `wait_loop` directly instead,
    /// so `running` is cleared before the lock is ever released.
    fn wait_until_allowed(&self, idx: usize) -> WaitOutcome {
        let mut guard = safe_call!(self.inner.lock());
        guard.slots[idx].running = false;
        self.wait_loop(guard, idx)
    }

    /// The shared wait loop: reacquires the lock across each `cond.wait`,
    /// rechecking terminate/abort/allowed, and marks `idx` running once
    /// it's allowed. Takes an already-held guard so a caller can fold the
    /// handoff that makes `idx` eligible to run into the same, continuous
    /// critical section as the wait for it.
    fn wait_loop(&self, mut guard: std::sync::MutexGuard<'_, Inner<P>>, idx: usize) -> WaitOutcome {
        loop {
            if guard.terminate {
                return WaitOutcome::Terminated;
            }
            if guard.slots[idx].state == SlotState::Aborting {
                return WaitOutcome::Aborted;
            }
            if guard.currently_allowed == Some(idx) {
                break;
            }
            guard = safe_call!(self.cond.wait(guard));
        }

        guard.slots[idx].running = true;
        WaitOutcome::Allowed
    }

    /// Mark `idx` aborted and unwind this thread. Never returns.
    fn abort_tail(&self, idx: usize) -> ! {
        let mut guard = safe_call!(self.inner.lock());
        guard.slots[idx].state = SlotState::Aborted;
        guard.slots[idx].running = false;
        drop(guard);
        log::trace!("slot {idx} -> Aborted");
        std::panic::panic_any(SlotExit::Aborted)
    }

    /// Let `next_allowed` run, then block until `self_idx` is allowed again.
    /// If `self_idx` is (or becomes) `Aborting`, runs the abort tail instead
    /// and never returns to the caller.
    ///
    /// The handoff and the start of the wait share one continuous critical
    /// section — `self_idx`'s `running` flag is cleared before the lock is
    /// released for the first time, so `next_allowed`'s thread can never
    /// observe both slots `running` at once.
    pub fn swap(&self, next_allowed: usize, self_idx: usize) {
        let mut guard = safe_call!(self.inner.lock());
        guard.currently_allowed = Some(next_allowed);
        self.cond.notify_all();
        guard.slots[self_idx].running = false;

        match self.wait_loop(guard, self_idx) {
            WaitOutcome::Allowed => {}
            WaitOutcome::Aborted => self.abort_tail(self_idx),
            WaitOutcome::Terminated => std::panic::panic_any(SlotExit::Terminated),
        }
    }

    /// Let `next_allowed` run, then unwind this (bootstrap) thread rather
    /// than waiting to be allowed again. Never returns.
    pub fn main_thread_start(&self, next_allowed: usize) -> ! {
        let mut guard = safe_call!(self.inner.lock());
        guard.currently_allowed = Some(next_allowed);
        self.cond.notify_all();
        drop(guard);
        std::panic::panic_any(SlotExit::Terminated)
    }

    /// Mark a slot as aborting. The target runs the abort tail at its own
    /// next cooperative checkpoint (its next `swap` if it is the running
    /// thread and `self_flag` is set, or its next wake-up in
    /// wait-until-allowed otherwise). No eager cancellation.
    ///
    /// A no-op if the target isn't presently `Used` or `Aborting` via the
    /// non-self path; also a no-op (idempotent) if the target is already
    /// `Aborting` via the self path.
    pub fn abort_thread(&self, thread_idx: usize, self_flag: bool) {
        let mut guard = safe_call!(self.inner.lock());
        let state = guard.slots[thread_idx].state;

        if self_flag {
            if state == SlotState::Used {
                guard.slots[thread_idx].state = SlotState::Aborting;
                log::trace!("slot {thread_idx} -> Aborting (self)");
            }
            // Aborting/Aborted/Failed/NotUsed: already on its way out or
            // never started; idempotent no-op.
        } else if state == SlotState::Used {
            guard.slots[thread_idx].state = SlotState::Aborting;
            log::trace!("slot {thread_idx} -> Aborting");
        }
        // Any other state via the non-self path: the thread may have
        // already been aborted; silent no-op.
    }

    /// The slot's debug-only unique id, monotonically allocated at
    /// creation time.
    pub fn get_unique_thread_id(&self, thread_idx: usize) -> u64 {
        safe_call!(self.inner.lock()).slots[thread_idx].unique_id
    }

    /// Request teardown: sets `terminate` and wakes every thread blocked in
    /// wait-until-allowed so each observes it at its own next cooperative
    /// checkpoint and unwinds quietly. Does not free the table or destroy
    /// the instance; the process exit is expected to reclaim both.
    pub fn clean_up(&self) {
        let mut guard = safe_call!(self.inner.lock());
        guard.terminate = true;
        self.cond.notify_all();
        log::trace!("terminate requested, waking all parked slots");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    fn wait_for<T>(rx: &mpsc::Receiver<T>) -> T {
        rx.recv_timeout(Duration::from_secs(5))
            .expect("timed out waiting for thread event")
    }

    impl<P: Send + 'static> Lct<P> {
        fn slot_state_for_test(&self, idx: usize) -> SlotState {
            safe_call!(self.inner.lock()).slots[idx].state
        }
    }

    #[test]
    fn single_thread_runs_once_allowed() {
        let (tx, rx) = mpsc::channel();
        let lct: Arc<Lct<mpsc::Sender<&'static str>>> = Lct::new(move |payload: mpsc::Sender<&'static str>| {
            payload.send("ran").unwrap();
            // Entry callbacks never return in the real system; park here so
            // this thread doesn't get marked Failed underneath the test.
            loop {
                std::thread::park();
            }
        });

        let t0 = lct.new_thread(tx);
        guard_thread_entry(|| lct.main_thread_start(t0));
        assert_eq!(wait_for(&rx), "ran");
    }

    struct SwapPayload {
        self_idx: Arc<Mutex<Option<usize>>>,
        other_idx: Arc<Mutex<Option<usize>>>,
        tx: mpsc::Sender<&'static str>,
        label: &'static str,
    }

    #[test]
    fn two_thread_swap_hands_off_both_ways() {
        let (tx, rx) = mpsc::channel();
        let lct_cell: Arc<std::sync::OnceLock<Arc<Lct<SwapPayload>>>> =
            Arc::new(std::sync::OnceLock::new());
        let lct_cell_in_entry = Arc::clone(&lct_cell);

        let lct: Arc<Lct<SwapPayload>> = Lct::new(move |p: SwapPayload| {
            let lct = lct_cell_in_entry.get().expect("lct not yet set").clone();
            let self_idx = p.self_idx.lock().unwrap().expect("self idx not set");
            let other_idx = p.other_idx.lock().unwrap().expect("other idx not set");

            p.tx.send(p.label).unwrap();
            lct.swap(other_idx, self_idx);
            p.tx.send(p.label).unwrap(); // resumed after the round trip
            loop {
                std::thread::park();
            }
        });
        lct_cell.set(Arc::clone(&lct)).ok();

        let t0_self = Arc::new(Mutex::new(None));
        let t1_self = Arc::new(Mutex::new(None));

        let t0 = lct.new_thread(SwapPayload {
            self_idx: Arc::clone(&t0_self),
            other_idx: Arc::clone(&t1_self),
            tx: tx.clone(),
            label: "t0",
        });
        *t0_self.lock().unwrap() = Some(t0);

        let t1 = lct.new_thread(SwapPayload {
            self_idx: Arc::clone(&t1_self),
            other_idx: Arc::clone(&t0_self),
            tx,
            label: "t1",
        });
        *t1_self.lock().unwrap() = Some(t1);

        guard_thread_entry(|| lct.main_thread_start(t0));

        assert_eq!(wait_for(&rx), "t0");
        assert_eq!(wait_for(&rx), "t1");
        assert_eq!(wait_for(&rx), "t0");
    }

    #[test]
    fn abort_blocked_thread_never_runs_entry() {
        let (tx, rx) = mpsc::channel::<&'static str>();
        let lct: Arc<Lct<mpsc::Sender<&'static str>>> = Lct::new(move |_payload: mpsc::Sender<&'static str>| {
            tx.send("ran").unwrap();
            loop {
                std::thread::park();
            }
        });

        let t1 = lct.new_thread(mpsc::channel().0);
        lct.abort_thread(t1, false);
        guard_thread_entry(|| lct.main_thread_start(t1));

        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(lct.slot_state_for_test(t1), SlotState::Aborted);
    }

    #[test]
    fn double_abort_is_idempotent() {
        let lct: Arc<Lct<()>> = Lct::new(|_| loop {
            std::thread::park();
        });
        let t0 = lct.new_thread(());
        lct.abort_thread(t0, false);
        lct.abort_thread(t0, false);
        assert_eq!(lct.slot_state_for_test(t0), SlotState::Aborting);
    }

    #[test]
    fn unique_ids_are_monotonic() {
        let lct: Arc<Lct<()>> = Lct::new(|_| loop {
            std::thread::park();
        });
        let a = lct.new_thread(());
        let b = lct.new_thread(());
        assert!(lct.get_unique_thread_id(a) < lct.get_unique_thread_id(b));
    }

    #[test]
    fn growth_preserves_existing_indices() {
        let lct: Arc<Lct<()>> = Lct::new(|_| loop {
            std::thread::park();
        });
        let first = lct.new_thread(());
        for _ in 0..ALLOC_CHUNK_SIZE {
            lct.new_thread(());
        }
        assert_eq!(lct.get_unique_thread_id(first), 0);
    }
}
