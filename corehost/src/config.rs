//! Command-line surface, in the style of the teacher's `configuration.rs`:
//! a single `clap`-derived struct, kept deliberately thin on validation
//! beyond format checks (see module doc there).

use std::path::PathBuf;

use clap::Parser;

const AFTER_HELP: &str = "\
    Any arguments the core doesn't recognize are collected verbatim and \
    passed through to the hosted OS unexamined.";

#[derive(Debug, Clone, Parser)]
#[command(name = "corehost", version, about = "Host an embedded OS on a deterministic cooperative CPU+thread emulator.")]
#[command(after_help = AFTER_HELP)]
pub struct CliOptions {
    /// Stop after the simulated clock reaches this many seconds. Runs
    /// forever if unset.
    #[arg(long, value_parser = parse_non_negative_seconds)]
    stop_at: Option<f64>,

    /// Write the host process id to this file, as a bare decimal number,
    /// before boot.
    #[arg(long)]
    pub pid_file: Option<PathBuf>,

    #[command(flatten)]
    color: ColorArgs,

    /// Arguments after `--`, or any the core doesn't recognize, are passed
    /// through to the hosted OS unexamined.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub test_args: Vec<String>,

    /// Race two exit requests (codes 3 and 1) from the demo entry point
    /// instead of idling, to exercise the exit-code clamp end to end.
    /// Exists for the integration test suite; hidden from `--help`.
    #[arg(long, hide = true)]
    pub demo_exit_race: bool,
}

#[derive(Debug, Clone, clap::Args)]
#[group(multiple = false)]
struct ColorArgs {
    /// Force ANSI color output on, regardless of whether stdout/stderr are
    /// terminals.
    #[arg(long)]
    color: bool,

    /// Force ANSI color output off.
    #[arg(long = "no-color")]
    no_color: bool,

    /// Alias for `--color`.
    #[arg(long = "force-color")]
    force_color: bool,
}

fn parse_non_negative_seconds(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("'{raw}' is not a valid number of seconds"))?;
    if value < 0.0 {
        return Err(format!("--stop-at must not be negative, got {value}"));
    }
    Ok(value)
}

impl CliOptions {
    /// The configured stop deadline, in simulated microseconds, if any.
    pub fn end_time_us(&self) -> Option<u64> {
        self.stop_at.map(|seconds| (seconds * 1e6).round() as u64)
    }

    /// Apply `--color`/`--no-color`/`--force-color` to the process-wide TTY
    /// flags, pinning both channels. A no-op if none was given, leaving
    /// both flags `Unknown` until `diag::tty::resolve` runs.
    pub fn pin_color(&self) {
        if self.color.color || self.color.force_color {
            diag::tty::pin_both(diag::tty::TtyState::Yes);
        } else if self.color.no_color {
            diag::tty::pin_both(diag::tty::TtyState::No);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_at_converts_to_microseconds() {
        let opts = CliOptions::try_parse_from(["corehost", "--stop-at", "1.5"]).unwrap();
        assert_eq!(opts.end_time_us(), Some(1_500_000));
    }

    #[test]
    fn missing_stop_at_runs_forever() {
        let opts = CliOptions::try_parse_from(["corehost"]).unwrap();
        assert_eq!(opts.end_time_us(), None);
    }

    #[test]
    fn negative_stop_at_is_rejected() {
        assert!(CliOptions::try_parse_from(["corehost", "--stop-at", "-1"]).is_err());
    }

    #[test]
    fn color_flags_are_mutually_exclusive() {
        assert!(CliOptions::try_parse_from(["corehost", "--color", "--no-color"]).is_err());
    }

    #[test]
    fn trailing_args_pass_through_untouched() {
        let opts = CliOptions::try_parse_from(["corehost", "--", "-x", "42"]).unwrap();
        assert_eq!(opts.test_args, vec!["-x", "42"]);
    }
}
