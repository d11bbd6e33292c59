//! A minimal, deterministic stand-in for the real hardware-model event
//! loop, which is out of scope here (see the crate-level documentation).
//! It exists only so the boot -> run -> exit lifecycle is exercisable end
//! to end: a real HW model would drive interrupts and peripherals off of
//! this same `one_event` contract.

/// A monotonic simulated-microsecond clock and event counter, optionally
/// bounded by a `--stop-at` deadline.
pub struct HwModel {
    now_us: u64,
    event_count: u64,
    end_time_us: Option<u64>,
}

/// The fixed quantum each call to `one_event` advances the clock by.
const QUANTUM_US: u64 = 1;

impl HwModel {
    pub fn new(end_time_us: Option<u64>) -> Self {
        Self {
            now_us: 0,
            event_count: 0,
            end_time_us,
        }
    }

    /// Advance the simulated clock by one quantum. Returns `true` once the
    /// configured deadline has been reached (always `false` if unset).
    pub fn one_event(&mut self) -> bool {
        self.now_us += QUANTUM_US;
        self.event_count += 1;
        matches!(self.end_time_us, Some(end) if self.now_us >= end)
    }

    #[allow(dead_code)]
    pub fn now_us(&self) -> u64 {
        self.now_us
    }

    #[allow(dead_code)]
    pub fn event_count(&self) -> u64 {
        self.event_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_model_never_reports_done() {
        let mut hw = HwModel::new(None);
        for _ in 0..10_000 {
            assert!(!hw.one_event());
        }
    }

    #[test]
    fn bounded_model_reports_done_at_deadline() {
        let mut hw = HwModel::new(Some(5));
        let mut done_at = None;
        for i in 1..=10 {
            if hw.one_event() {
                done_at = Some(i);
                break;
            }
        }
        assert_eq!(done_at, Some(5));
    }

    #[test]
    fn event_count_tracks_calls() {
        let mut hw = HwModel::new(None);
        hw.one_event();
        hw.one_event();
        hw.one_event();
        assert_eq!(hw.event_count(), 3);
    }
}
