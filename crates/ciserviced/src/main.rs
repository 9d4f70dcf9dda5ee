//! Entry point for the caller-information service daemon.

use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    match ciserviced::run_daemon() {
        Ok(_) => ExitCode::SUCCESS,
        Err(error) => {
            let mut stderr = io::stderr().lock();
            writeln!(stderr, "ciserviced: {error}").ok();
            ExitCode::FAILURE
        }
    }
}
