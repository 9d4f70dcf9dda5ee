use std::io;
use std::process::{Command, Stdio};
use std::thread;

use thiserror::Error;
use tracing::debug;

use super::DISPATCH_TARGET;

/// Errors raised while launching a service command.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The expanded template produced no words.
    #[error("expanded command is empty")]
    EmptyCommand,
    /// The expanded template could not be split into words.
    #[error("expanded command '{command}' cannot be split into shell words")]
    Split {
        /// Expanded command line.
        command: String,
    },
    /// The operating system refused to start the program.
    #[error("failed to start '{program}': {source}")]
    Spawn {
        /// Program being started.
        program: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
}

/// Starts service commands.
pub trait CommandSpawner: Send + Sync {
    /// Starts `argv[0]` with the remaining arguments and returns without
    /// waiting for it.
    ///
    /// # Errors
    ///
    /// Returns [`SpawnError`] when the process cannot be started.
    fn spawn(&self, argv: &[String]) -> Result<(), SpawnError>;
}

/// Spawner running commands as detached children with null stdio.
///
/// Each child is reaped by a short-lived background thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedSpawner;

impl CommandSpawner for DetachedSpawner {
    fn spawn(&self, argv: &[String]) -> Result<(), SpawnError> {
        let (program, arguments) = argv.split_first().ok_or(SpawnError::EmptyCommand)?;
        let mut child = Command::new(program)
            .args(arguments)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| SpawnError::Spawn {
                program: program.clone(),
                source,
            })?;
        let pid = child.id();
        let label = program.clone();
        let reaper = thread::Builder::new()
            .name(format!("ciserviced-reap-{pid}"))
            .spawn(move || match child.wait() {
                Ok(status) => debug!(
                    target: DISPATCH_TARGET,
                    program = %label,
                    pid,
                    %status,
                    "service command exited"
                ),
                Err(error) => debug!(
                    target: DISPATCH_TARGET,
                    program = %label,
                    pid,
                    error = %error,
                    "failed to reap service command"
                ),
            });
        if let Err(error) = reaper {
            debug!(
                target: DISPATCH_TARGET,
                pid,
                error = %error,
                "no reaper thread; child left to the init process"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawns_existing_programs() {
        let argv = vec!["true".to_owned()];
        assert!(DetachedSpawner.spawn(&argv).is_ok());
    }

    #[test]
    fn reports_missing_programs() {
        let argv = vec!["/no/such/binary".to_owned(), "--x".to_owned()];
        assert!(matches!(
            DetachedSpawner.spawn(&argv),
            Err(SpawnError::Spawn { .. })
        ));
    }

    #[test]
    fn rejects_empty_argv() {
        assert!(matches!(
            DetachedSpawner.spawn(&[]),
            Err(SpawnError::EmptyCommand)
        ));
    }
}
