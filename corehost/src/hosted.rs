//! The hosted side of the boundary. A real embedding links an actual
//! embedded OS against the `ffi` surface and never touches this module;
//! it exists here only so `corehost` boots into *something* and the
//! lifecycle is exercisable end to end on its own.

use std::ffi::c_void;

use crate::ffi;
use crate::orchestrator;

/// The bootstrap CPU-0 entry point. Normally halts immediately and
/// forever: every simulated tick, the orchestrator's event loop wakes the
/// CPU, which halts again right away, standing in for an idle embedded OS
/// with nothing scheduled.
///
/// With `demo_exit_race`, instead registers an exit code of 3, then
/// requests exit with code 1: the clamp is monotonic, so the process
/// still terminates with status 3 regardless of which call would have
/// reached `std::process::exit` first.
pub fn idle_entry(demo_exit_race: bool) {
    log::info!("hosted entry running on CPU 0");
    if demo_exit_race {
        orchestrator::clamp_exit_code(3);
        orchestrator::exit(1);
    }
    loop {
        ffi::lce_halt_cpu();
    }
}

/// The entry callback registered with `lct_init`. Nothing in this demo
/// embedding ever calls `lct_new_thread`, so this is never invoked; it
/// exists only to give the `ffi` surface a live callback to forward to.
pub extern "C" fn noop_entry(_payload: *mut c_void) {}
