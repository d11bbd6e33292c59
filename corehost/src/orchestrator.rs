//! The lifecycle orchestrator: drives the ordered init/boot/exit sequence,
//! invokes registered tasks at their declared levels, and couples LCE to
//! the HW model and to LCT. Mirrors the original's `ler_init`/`ler_exit`
//! pair in `main.c`.

use std::io::Write;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;

use anyhow::Context;

use crate::config::CliOptions;
use crate::ffi;
use crate::hwmodel::HwModel;
use crate::tasks::{self, TaskLevel};

static HW_MODEL: Mutex<Option<HwModel>> = Mutex::new(None);
static MAX_EXIT_CODE: AtomicI32 = AtomicI32::new(0);

/// Run the full boot sequence, then the HW event loop, until the
/// configured deadline (if any) is reached, then exit(0).
pub fn run(options: CliOptions) -> anyhow::Result<()> {
    line_buffer_std_streams();

    tasks::run(TaskLevel::PreBoot1);
    cpu0_pre_cmdline_hooks();

    // Command-line parsing already happened before `run` was called (the
    // orchestrator receives the parsed options), matching the position of
    // `ler_handle_cmd_line` in the original sequence.

    tasks::run(TaskLevel::PreBoot2);
    diag::tty::resolve();
    options.pin_color();
    cpu0_pre_hw_init_hooks();

    if let Some(pid_file) = &options.pid_file {
        write_pid_file(pid_file)
            .with_context(|| format!("writing pid file {}", pid_file.display()))?;
    }

    *diag::safe_call!(HW_MODEL.lock()) = Some(HwModel::new(options.end_time_us()));

    tasks::run(TaskLevel::PreBoot3);

    let demo_exit_race = options.demo_exit_race;
    ffi::lce_init();
    ffi::init(crate::hosted::noop_entry);
    ffi::lce_boot_cpu(move || {
        lct::guard_thread_entry(move || crate::hosted::idle_entry(demo_exit_race))
    });

    tasks::run(TaskLevel::FirstSleep);

    loop {
        let done = {
            let mut guard = diag::safe_call!(HW_MODEL.lock());
            guard.as_mut().expect("hw model initialized above").one_event()
        };
        if done {
            exit(0);
        }
        ffi::lce_wake_cpu();
    }
}

fn line_buffer_std_streams() {
    // Rust's stdout/stderr are already unbuffered (stderr) or line-buffered
    // (stdout, on a terminal) by default; there is no portable `setvbuf`
    // equivalent in std, so this is a documented no-op rather than a real
    // buffering change. See DESIGN.md.
}

fn cpu0_pre_cmdline_hooks() {}

fn cpu0_pre_hw_init_hooks() {}

fn cpu0_cleanup() {}

fn write_pid_file(path: &std::path::Path) -> anyhow::Result<()> {
    let mut file = std::fs::File::create(path)?;
    write!(file, "{}", std::process::id())?;
    Ok(())
}

/// Clamp `code` against the highest exit code requested so far. Separated
/// from `exit` so the clamping rule is unit-testable without ending the
/// test process, and so a caller can register a code without yet
/// triggering the actual teardown (see `hosted::idle_entry`'s exit race).
pub(crate) fn clamp_exit_code(code: i32) -> i32 {
    MAX_EXIT_CODE.fetch_max(code, Ordering::SeqCst);
    MAX_EXIT_CODE.load(Ordering::SeqCst)
}

/// Request process termination: clamp the exit code to the maximum seen so
/// far, run CPU-0 cleanup and `OnExit` tasks, tear down the HW model, and
/// terminate with the clamped code. Never returns.
pub fn exit(code: i32) -> ! {
    let clamped = clamp_exit_code(code);

    cpu0_cleanup();
    tasks::run(TaskLevel::OnExit);
    diag::safe_call!(HW_MODEL.lock()).take();

    log::logger().flush();
    std::process::exit(clamped);
}
