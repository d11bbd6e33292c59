//! External-interface adapters: the stable surface a hosted OS is written
//! against. These are thin, data-less translation layers — each function
//! just forwards to the corresponding method on a process-wide singleton
//! (`OnceCell<Arc<Lct<Payload>>>` / `OnceCell<Arc<Lce>>`), so call sites
//! don't need to thread a handle through. Calling any of these before the
//! matching `*_init` panics with a clear diagnostic; that is a programming
//! error in the embedding, not a runtime condition this crate recovers
//! from.
//!
//! This module is the whole point of the crate: a hosted OS linked against
//! it calls into every function here. The demo entry point in `hosted`
//! only exercises a slice of it, so plain dead-code analysis would flag
//! the rest; allowed at the module level rather than hidden per-function.

#![allow(dead_code)]

use std::ffi::c_void;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use lce::Lce;
use lct::Lct;

/// A payload pointer handed verbatim to the registered entry callback.
/// Never interpreted by the core; ownership and meaning are entirely up to
/// the hosted OS side.
#[derive(Clone, Copy)]
pub struct Payload(pub *mut c_void);

// SAFETY: the pointer crosses into whatever thread the core schedules next,
// but is never dereferenced by this crate. The hosted OS's entry callback
// is responsible for any synchronization its payload's contents require.
unsafe impl Send for Payload {}

pub type EntryFn = extern "C" fn(*mut c_void);

static LCT: OnceCell<Arc<Lct<Payload>>> = OnceCell::new();
static LCE: OnceCell<Arc<Lce>> = OnceCell::new();

fn lct() -> &'static Arc<Lct<Payload>> {
    LCT.get().expect("init must be called before any other lct function")
}

fn lce() -> &'static Arc<Lce> {
    LCE.get().expect("lce_init must be called before any other lce_* function")
}

/// Install the thread multiplexer singleton. `entry_fn` is called with a
/// slot's payload the first time that slot is allowed to run.
pub fn init(entry_fn: EntryFn) {
    let lct = Lct::new(move |payload: Payload| entry_fn(payload.0));
    LCT.set(lct).ok().expect("init called more than once");
}

pub fn new_thread(payload: *mut c_void) -> i32 {
    lct()
        .new_thread(Payload(payload))
        .try_into()
        .expect("thread index overflowed i32")
}

pub fn swap(next_allowed_thread_nbr: i32, this_th_nbr: i32) {
    lct().swap(index(next_allowed_thread_nbr), index(this_th_nbr));
}

pub fn main_thread_start(next_allowed_thread_nbr: i32) -> ! {
    lct().main_thread_start(index(next_allowed_thread_nbr))
}

pub fn abort_thread(thread_idx: i32, self_flag: bool) {
    lct().abort_thread(index(thread_idx), self_flag);
}

pub fn get_unique_thread_id(thread_idx: i32) -> u64 {
    lct().get_unique_thread_id(index(thread_idx))
}

pub fn clean_up() {
    lct().clean_up();
}

/// Back-compatibility re-exports of the LCT surface under its two prior
/// naming generations: oldest `posix_*`, then the intermediate `lts_*` the
/// codebase carried before settling on today's unprefixed names (see
/// `arch/posix/core/lct.c`'s own "rename LTS to LCT" note). Each function
/// here is a plain forward to its current counterpart above, not a
/// separate implementation.
pub mod compat {
    use std::ffi::c_void;

    /// Oldest naming generation.
    pub mod posix {
        use super::c_void;

        pub fn posix_init(entry_fn: super::super::EntryFn) {
            super::super::init(entry_fn)
        }
        pub fn posix_new_thread(payload: *mut c_void) -> i32 {
            super::super::new_thread(payload)
        }
        pub fn posix_swap(next_allowed_thread_nbr: i32, this_th_nbr: i32) {
            super::super::swap(next_allowed_thread_nbr, this_th_nbr)
        }
        pub fn posix_main_thread_start(next_allowed_thread_nbr: i32) -> ! {
            super::super::main_thread_start(next_allowed_thread_nbr)
        }
        pub fn posix_abort_thread(thread_idx: i32, self_flag: bool) {
            super::super::abort_thread(thread_idx, self_flag)
        }
        pub fn posix_get_unique_thread_id(thread_idx: i32) -> u64 {
            super::super::get_unique_thread_id(thread_idx)
        }
        pub fn posix_clean_up() {
            super::super::clean_up()
        }
    }

    /// Intermediate naming generation.
    pub mod lts {
        use super::c_void;

        pub fn lts_init(entry_fn: super::super::EntryFn) {
            super::super::init(entry_fn)
        }
        pub fn lts_new_thread(payload: *mut c_void) -> i32 {
            super::super::new_thread(payload)
        }
        pub fn lts_swap(next_allowed_thread_nbr: i32, this_th_nbr: i32) {
            super::super::swap(next_allowed_thread_nbr, this_th_nbr)
        }
        pub fn lts_main_thread_start(next_allowed_thread_nbr: i32) -> ! {
            super::super::main_thread_start(next_allowed_thread_nbr)
        }
        pub fn lts_abort_thread(thread_idx: i32, self_flag: bool) {
            super::super::abort_thread(thread_idx, self_flag)
        }
        pub fn lts_get_unique_thread_id(thread_idx: i32) -> u64 {
            super::super::get_unique_thread_id(thread_idx)
        }
        pub fn lts_clean_up() {
            super::super::clean_up()
        }
    }
}

fn index(thread_nbr: i32) -> usize {
    thread_nbr
        .try_into()
        .expect("thread index must not be negative")
}

/// Install the CPU rendezvous singleton. The HW-side exit hook is the
/// orchestrator's own clamped `exit`, so LCE never needs to depend on it
/// directly.
pub fn lce_init() {
    let lce = Arc::new(Lce::new(|code| crate::orchestrator::exit(code)));
    LCE.set(lce).ok().expect("lce_init called more than once");
}

pub fn lce_boot_cpu(start_routine: impl FnOnce() + Send + 'static) {
    lce().boot(start_routine);
}

pub fn lce_halt_cpu() {
    lce().halt_cpu();
}

pub fn lce_wake_cpu() {
    lce().wake_cpu();
}

pub fn lce_is_cpu_running() -> bool {
    lce().is_cpu_running()
}

pub fn lce_terminate() {
    lce().terminate();
}
