//! The lifecycle task registry: a small ordered-callback system standing in
//! for the original's linker-section arrays (`__ler_PRE_BOOT_1_tasks_start`
//! and friends), which have no portable Rust equivalent. Registration goes
//! through a process-wide `once_cell`-backed registry instead, in the
//! teacher's habit of module-level `Lazy` state (see `configuration.rs`'s
//! `VERSION`).

use std::sync::Mutex;

use once_cell::sync::Lazy;

/// A milestone in the boot/exit sequence at which registered tasks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskLevel {
    PreBoot1,
    PreBoot2,
    PreBoot3,
    FirstSleep,
    OnExit,
}

const LEVEL_COUNT: usize = 5;

impl TaskLevel {
    fn index(self) -> usize {
        match self {
            TaskLevel::PreBoot1 => 0,
            TaskLevel::PreBoot2 => 1,
            TaskLevel::PreBoot3 => 2,
            TaskLevel::FirstSleep => 3,
            TaskLevel::OnExit => 4,
        }
    }
}

#[derive(Clone, Copy)]
struct Task {
    priority: i32,
    run: fn(),
}

static REGISTRY: Lazy<Mutex<[Vec<Task>; LEVEL_COUNT]>> =
    Lazy::new(|| Mutex::new(Default::default()));

/// Register `run` to be called at `level`, in `priority` order relative to
/// other tasks at the same level (lower runs first). Nothing in this demo
/// embedding calls this outside tests; a hosted OS's own modules are the
/// intended callers, the Rust-native stand-in for the original's
/// link-time `LER_TASK` macro.
#[allow(dead_code)]
pub fn register(level: TaskLevel, priority: i32, run: fn()) {
    let mut guard = diag::safe_call!(REGISTRY.lock());
    guard[level.index()].push(Task { priority, run });
}

/// Run every task registered at `level`, in declared-priority order.
pub fn run(level: TaskLevel) {
    let tasks = {
        let guard = diag::safe_call!(REGISTRY.lock());
        let mut tasks = guard[level.index()].clone();
        tasks.sort_by_key(|t| t.priority);
        tasks
    };
    for task in tasks {
        (task.run)();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex as StdMutex;

    static ORDER: Lazy<StdMutex<Vec<&'static str>>> = Lazy::new(|| StdMutex::new(Vec::new()));
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    fn record_a() {
        ORDER.lock().unwrap().push("a");
    }
    fn record_b() {
        ORDER.lock().unwrap().push("b");
    }
    fn bump_counter() {
        COUNTER.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn tasks_run_in_priority_order() {
        // Use a level unlikely to be exercised by other tests in this
        // module to avoid cross-test interference on the shared registry.
        register(TaskLevel::FirstSleep, 10, record_b);
        register(TaskLevel::FirstSleep, 0, record_a);
        run(TaskLevel::FirstSleep);

        let order = ORDER.lock().unwrap();
        let a_pos = order.iter().position(|&s| s == "a").unwrap();
        let b_pos = order.iter().position(|&s| s == "b").unwrap();
        assert!(a_pos < b_pos);
    }

    #[test]
    fn unregistered_level_runs_nothing_new() {
        let before = COUNTER.load(Ordering::SeqCst);
        register(TaskLevel::PreBoot1, 0, bump_counter);
        run(TaskLevel::PreBoot2);
        assert_eq!(COUNTER.load(Ordering::SeqCst), before);
    }
}
