//! Waits for the signal that makes the daemon leave the server and exit.

use std::fmt;
use std::io;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::info;

use super::PROCESS_TARGET;

/// Signal that asked the daemon to disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopSignal {
    /// `SIGINT`, usually Ctrl-C on a foreground run.
    Interrupt,
    /// `SIGTERM` from a service manager or `kill`.
    Terminate,
    /// `SIGQUIT`.
    Quit,
    /// `SIGHUP`; the controlling terminal went away.
    Hangup,
}

impl StopSignal {
    /// Every signal the daemon stops on.
    pub const ALL: [Self; 4] = [Self::Interrupt, Self::Terminate, Self::Quit, Self::Hangup];

    /// Raw signal number.
    #[must_use]
    pub const fn raw(self) -> i32 {
        match self {
            Self::Interrupt => SIGINT,
            Self::Terminate => SIGTERM,
            Self::Quit => SIGQUIT,
            Self::Hangup => SIGHUP,
        }
    }

    /// Conventional upper-case name, e.g. `SIGTERM`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
            Self::Quit => "SIGQUIT",
            Self::Hangup => "SIGHUP",
        }
    }

    /// Maps a raw signal number back to a stop signal.
    #[must_use]
    pub fn from_raw(raw: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|signal| signal.raw() == raw)
    }

    /// Looks a stop signal up by its conventional name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|signal| signal.name() == name)
    }
}

impl fmt::Display for StopSignal {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.name())
    }
}

/// Source of the request to stop the daemon.
pub trait ShutdownSignal: Send {
    /// Blocks until the daemon should leave the server, returning the signal
    /// that asked for it.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError`] when the listener cannot be installed or
    /// stops delivering signals.
    fn wait(&self) -> Result<StopSignal, ShutdownError>;
}

/// Failures of the stop-signal listener.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Signal handlers could not be registered.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The listener closed before any stop signal arrived.
    #[error("signal listener closed without a stop signal")]
    Closed,
}

/// Listens for the process signals in [`StopSignal::ALL`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SignalListener;

impl ShutdownSignal for SignalListener {
    fn wait(&self) -> Result<StopSignal, ShutdownError> {
        let mut signals = Signals::new(StopSignal::ALL.map(StopSignal::raw))
            .map_err(|source| ShutdownError::Install { source })?;
        let received = signals
            .forever()
            .find_map(StopSignal::from_raw)
            .ok_or(ShutdownError::Closed)?;
        info!(
            target: PROCESS_TARGET,
            signal = %received,
            "stop signal received"
        );
        Ok(received)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::interrupt(StopSignal::Interrupt, SIGINT, "SIGINT")]
    #[case::terminate(StopSignal::Terminate, SIGTERM, "SIGTERM")]
    #[case::quit(StopSignal::Quit, SIGQUIT, "SIGQUIT")]
    #[case::hangup(StopSignal::Hangup, SIGHUP, "SIGHUP")]
    fn stop_signals_map_both_ways(
        #[case] signal: StopSignal,
        #[case] raw: i32,
        #[case] name: &str,
    ) {
        assert_eq!(signal.raw(), raw);
        assert_eq!(StopSignal::from_raw(raw), Some(signal));
        assert_eq!(StopSignal::from_name(name), Some(signal));
        assert_eq!(signal.to_string(), name);
    }

    #[test]
    fn other_signals_are_not_stop_signals() {
        assert_eq!(StopSignal::from_raw(signal_hook::consts::signal::SIGUSR1), None);
        assert_eq!(StopSignal::from_name("SIGKILL"), None);
    }
}
