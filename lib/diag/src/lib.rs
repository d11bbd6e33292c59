//! Diagnostics plumbing shared by the rest of the workspace: a tracing sink
//! that bridges onto the [`log`] facade, TTY-aware color decisions, and the
//! safe-call helper that turns an unexpected host primitive failure into a
//! deterministic process exit with a pinned message.
//!
//! Downstream crates should use the ordinary `log::{warn,error,trace}!`
//! macros once [`sink::init`] has run; this crate only owns the sink and the
//! handful of helpers ([`fatal`], [`safe_call`]) that need to format a
//! message and exit rather than just log one.

pub mod safe_call;
pub mod sink;
pub mod tty;

/// Log an error-level message and exit the process with status 1.
///
/// This is the terminal half of the safe-call contract: any host primitive
/// failure, or any misuse of the LCE/LCT rendezvous protocol, goes through
/// here rather than attempting to recover.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
        log::logger().flush();
        std::process::exit(1);
    }};
}
