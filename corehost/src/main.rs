mod config;
mod ffi;
mod hosted;
mod hwmodel;
mod orchestrator;
mod tasks;

use clap::error::ErrorKind;
use clap::Parser;
use config::CliOptions;

fn main() {
    let options = CliOptions::try_parse().unwrap_or_else(|err| {
        // clap's own `Error::exit` maps every non-display error to exit
        // code 2; this runtime's contract is 0 normal, 1 any error, so
        // `--help`/`--version` still exit 0 but a genuine parse error
        // exits 1 like any other error.
        let _ = err.print();
        match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => std::process::exit(0),
            _ => std::process::exit(1),
        }
    });

    diag::safe_call!(diag::sink::init(log::LevelFilter::Info));

    if let Err(err) = orchestrator::run(options) {
        log::error!("{err:#}");
        log::logger().flush();
        std::process::exit(1);
    }
}
