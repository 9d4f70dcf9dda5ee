//! Forks the daemon into the background.
//!
//! The parent prints the child's pid to stderr and exits successfully; only
//! the detached child returns from [`Daemonizer::daemonize`].

use std::ffi::OsStr;
use std::io::{self, Write};
use std::process;

use camino::Utf8Path;
use daemonize_me::Daemon;
use thiserror::Error;
use tracing::info;

use super::PROCESS_TARGET;

/// File mode mask applied to the detached daemon; keeps the pid file readable.
pub const DAEMON_UMASK: u16 = 0o022;

/// Detaches the running process from its terminal.
pub trait Daemonizer: Send + Sync {
    /// Continues in a detached child whose working directory is `work_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonizeError`] when forking or session setup fails.
    fn daemonize(&self, work_dir: &Utf8Path) -> Result<(), DaemonizeError>;
}

/// Failure to detach.
#[derive(Debug, Error)]
pub enum DaemonizeError {
    /// Forking, `setsid` or changing directory failed.
    #[error("failed to detach into '{work_dir}': {source}")]
    Detach {
        /// Directory the child was to run in.
        work_dir: String,
        /// Error reported by `daemonize-me`.
        #[source]
        source: daemonize_me::DaemonError,
    },
}

/// Forks with `daemonize-me`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDaemonizer;

impl Daemonizer for SystemDaemonizer {
    fn daemonize(&self, work_dir: &Utf8Path) -> Result<(), DaemonizeError> {
        info!(
            target: PROCESS_TARGET,
            work_dir = %work_dir,
            "detaching from terminal"
        );
        Daemon::new()
            .work_dir(work_dir.as_std_path())
            .umask(DAEMON_UMASK)
            .name(OsStr::new(env!("CARGO_PKG_NAME")))
            .setup_post_fork_parent_hook(announce_child)
            .start()
            .map_err(|source| DaemonizeError::Detach {
                work_dir: work_dir.to_string(),
                source,
            })?;
        info!(
            target: PROCESS_TARGET,
            pid = process::id(),
            "running detached"
        );
        Ok(())
    }
}

fn announce_child(_parent: i32, child: i32) -> ! {
    writeln!(io::stderr().lock(), "Starting as daemon. Process id is {child}").ok();
    process::exit(0)
}
