//! End-to-end scenarios run against the built `corehost` binary, rather
//! than in-process: single-thread boot/halt (S1) and exit-code clamping
//! (S6) both cross the process boundary by nature, so a unit test can
//! only approximate them.

use std::process::Command;

fn corehost() -> Command {
    Command::new(env!("CARGO_BIN_EXE_corehost"))
}

#[test]
fn single_thread_boots_halts_and_reaches_its_deadline() {
    let output = corehost()
        .args(["--stop-at", "0.00002"])
        .output()
        .expect("spawn corehost");

    assert!(output.status.success(), "status: {:?}", output.status);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("hosted entry running on CPU 0"),
        "stdout: {stdout}"
    );
}

#[test]
fn exit_code_clamps_to_the_highest_code_ever_requested() {
    let output = corehost()
        .args(["--demo-exit-race"])
        .output()
        .expect("spawn corehost");

    assert_eq!(output.status.code(), Some(3), "status: {:?}", output.status);
}
