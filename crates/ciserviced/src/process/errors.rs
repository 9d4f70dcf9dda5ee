//! Defines the unified error surface for daemon launch and supervision.

use std::io;

use camino::Utf8PathBuf;
use nix::errno::Errno;
use thiserror::Error;

use crate::bootstrap::BootstrapError;
use crate::client::ClientError;

use super::daemonizer::DaemonizeError;
use super::shutdown::ShutdownError;

/// Errors surfaced while launching or supervising the daemon process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Bootstrapping the daemon failed.
    #[error("daemon bootstrap failed: {source}")]
    Bootstrap {
        /// Underlying bootstrap error.
        #[source]
        source: BootstrapError,
    },
    /// Writing the service listing or version banner failed.
    #[error("failed to write to standard output: {source}")]
    Output {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The directory holding the pid file could not be created.
    #[error("failed to prepare runtime directory '{path}': {source}")]
    RuntimeDirectory {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A running daemon already owns the pid file.
    #[error("daemon already running with pid {pid}")]
    AlreadyRunning {
        /// PID recorded in the existing pid file.
        pid: u32,
    },
    /// Checking whether the recorded pid is alive failed.
    #[error("failed to check existing process {pid}: {source}")]
    CheckProcess {
        /// PID that could not be checked.
        pid: u32,
        /// Underlying OS error.
        source: Errno,
    },
    /// Removing a stale pid file failed.
    #[error("failed to remove stale file '{path}': {source}")]
    Cleanup {
        /// Path of the file that could not be removed.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Writing the pid file failed.
    #[error("failed to write pid file '{path}': {source}")]
    PidWrite {
        /// Pid file path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Daemonisation failed.
    #[error("failed to daemonise: {source}")]
    Daemonize {
        /// Underlying daemonisation error.
        #[source]
        source: DaemonizeError,
    },
    /// Waiting for shutdown failed.
    #[error("failed to await shutdown signal: {source}")]
    Shutdown {
        /// Underlying shutdown error.
        #[source]
        source: ShutdownError,
    },
    /// The client loop failed to start or stopped abnormally.
    #[error("client loop failed: {source}")]
    Client {
        /// Underlying client error.
        #[source]
        source: ClientError,
    },
}

impl From<BootstrapError> for LaunchError {
    fn from(source: BootstrapError) -> Self {
        Self::Bootstrap { source }
    }
}

impl From<DaemonizeError> for LaunchError {
    fn from(source: DaemonizeError) -> Self {
        Self::Daemonize { source }
    }
}

impl From<ShutdownError> for LaunchError {
    fn from(source: ShutdownError) -> Self {
        Self::Shutdown { source }
    }
}

impl From<ClientError> for LaunchError {
    fn from(source: ClientError) -> Self {
        Self::Client { source }
    }
}
