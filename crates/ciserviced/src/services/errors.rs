use thiserror::Error;

/// Errors raised when registering a service.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// The command template cannot be executed.
    #[error("invalid command '{command}': {reason}")]
    InvalidCommand {
        /// Template as configured.
        command: String,
        /// Why the template was rejected.
        reason: InvalidCommandReason,
    },
}

/// Why a command template was rejected.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum InvalidCommandReason {
    /// The template has no words.
    #[error("command is empty")]
    Empty,
    /// Quotes or escapes are unbalanced.
    #[error("command cannot be split into shell words")]
    Unsplittable,
    /// The first word is not an executable file.
    #[error("program not found or not executable")]
    ProgramNotFound,
}
