//! Validation of command templates against the executable search path.

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use super::errors::{InvalidCommandReason, ServiceError};

/// Checks that `command` splits into shell words and that its program
/// resolves to an executable, returning the resolved program path.
///
/// Program names containing `/` are checked as given; others are looked up in
/// `search_path`, falling back to `PATH`.
///
/// # Errors
///
/// Returns [`ServiceError::InvalidCommand`] describing the failed check.
pub fn validate_command(
    command: &str,
    search_path: Option<&OsStr>,
) -> Result<PathBuf, ServiceError> {
    let invalid = |reason| ServiceError::InvalidCommand {
        command: command.to_owned(),
        reason,
    };
    let words = shlex::split(command).ok_or_else(|| invalid(InvalidCommandReason::Unsplittable))?;
    let program = words
        .first()
        .ok_or_else(|| invalid(InvalidCommandReason::Empty))?;
    let system_path = env::var_os("PATH");
    let path = search_path.or(system_path.as_deref());
    resolve_program(program, path).ok_or_else(|| invalid(InvalidCommandReason::ProgramNotFound))
}

/// Locates `program` the way `execvp` would.
#[must_use]
pub fn resolve_program(program: &str, search_path: Option<&OsStr>) -> Option<PathBuf> {
    if program.is_empty() {
        return None;
    }
    if program.contains('/') {
        let candidate = PathBuf::from(program);
        return is_executable(&candidate).then_some(candidate);
    }
    env::split_paths(search_path?)
        .map(|directory| directory.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .is_ok_and(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
