//! Process-wide three-valued TTY flags, one per output channel.
//!
//! `Unknown` resolves to an actual [`std::io::IsTerminal`] query the first
//! time it's consulted (normally done once, at `PreBoot2`). Command-line
//! flags can pin a channel to `Yes` or `No` at any point before or after
//! that resolution.

use std::io::IsTerminal;
use std::sync::atomic::{AtomicU8, Ordering};

const UNKNOWN: u8 = 0;
const YES: u8 = 1;
const NO: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtyState {
    Unknown,
    Yes,
    No,
}

impl From<u8> for TtyState {
    fn from(v: u8) -> Self {
        match v {
            YES => TtyState::Yes,
            NO => TtyState::No,
            _ => TtyState::Unknown,
        }
    }
}

impl From<TtyState> for u8 {
    fn from(s: TtyState) -> Self {
        match s {
            TtyState::Unknown => UNKNOWN,
            TtyState::Yes => YES,
            TtyState::No => NO,
        }
    }
}

/// One flag per output channel: stdout (trace) and stderr (warnings/errors).
pub struct Flag(AtomicU8);

impl Flag {
    const fn new() -> Self {
        Self(AtomicU8::new(UNKNOWN))
    }

    pub fn pin(&self, state: TtyState) {
        self.0.store(state.into(), Ordering::Relaxed);
    }

    pub fn get(&self) -> TtyState {
        self.0.load(Ordering::Relaxed).into()
    }
}

pub static STDOUT: Flag = Flag::new();
pub static STDERR: Flag = Flag::new();

/// Resolve any channel still `Unknown` against the real terminal. Intended to
/// run once, at `PreBoot2`; calling it again is harmless but a pinned flag is
/// never overwritten because `resolve` only touches channels still
/// `Unknown`.
pub fn resolve() {
    if STDOUT.get() == TtyState::Unknown {
        STDOUT.pin(bool_to_state(std::io::stdout().is_terminal()));
    }
    if STDERR.get() == TtyState::Unknown {
        STDERR.pin(bool_to_state(std::io::stderr().is_terminal()));
    }
}

fn bool_to_state(is_tty: bool) -> TtyState {
    if is_tty {
        TtyState::Yes
    } else {
        TtyState::No
    }
}

/// Pin both channels, as `--color`/`--no-color`/`--force-color` do.
pub fn pin_both(state: TtyState) {
    STDOUT.pin(state);
    STDERR.pin(state);
}

/// Whether the stderr channel should currently emit color escapes.
pub fn stderr_color_enabled() -> bool {
    STDERR.get() == TtyState::Yes
}

/// Whether the stdout channel should currently emit color escapes.
pub fn stdout_color_enabled() -> bool {
    STDOUT.get() == TtyState::Yes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_round_trips_through_u8() {
        assert_eq!(TtyState::from(u8::from(TtyState::Unknown)), TtyState::Unknown);
        assert_eq!(TtyState::from(u8::from(TtyState::Yes)), TtyState::Yes);
        assert_eq!(TtyState::from(u8::from(TtyState::No)), TtyState::No);
    }

    #[test]
    fn pin_overrides_resolve() {
        let flag = Flag::new();
        assert_eq!(flag.get(), TtyState::Unknown);
        flag.pin(TtyState::Yes);
        assert_eq!(flag.get(), TtyState::Yes);
    }
}
