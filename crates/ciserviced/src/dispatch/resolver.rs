use std::process::{Child, Command, Output, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::services::{InvalidCommandReason, ServiceError, validate_command};

use super::DISPATCH_TARGET;
use super::engine::QueryCompletion;

/// Caller-directory query for one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    /// Caller number including area code.
    pub complete_number: String,
    /// Directory selected by the service.
    pub lookup_id: i32,
}

/// Resolves caller names for services bound to a lookup id.
///
/// Implementations must call [`QueryCompletion::complete`] exactly once per
/// request, from any thread, and must not block the caller while looking up.
pub trait CallerResolver: Send + Sync {
    /// Starts resolving `request`; `completion` receives the result.
    fn resolve(&self, request: LookupRequest, completion: QueryCompletion);
}

/// Time a lookup command may run before it is killed.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

const LOOKUP_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Resolver delegating to an operator-supplied command.
///
/// The command runs on a worker thread with the complete number and the
/// lookup id appended as arguments. The first non-empty line it prints on
/// success becomes the caller name; anything else completes without a name.
/// A command still running after the lookup timeout is killed and the query
/// completes without a name.
#[derive(Debug, Clone)]
pub struct CommandResolver {
    argv: Arc<[String]>,
    timeout: Duration,
}

impl CommandResolver {
    /// Validates `command_line` and builds the resolver.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidCommand`] when the command line is not
    /// runnable.
    pub fn new(command_line: &str) -> Result<Self, ServiceError> {
        validate_command(command_line, None)?;
        let argv = shlex::split(command_line)
            .filter(|words| !words.is_empty())
            .ok_or_else(|| ServiceError::InvalidCommand {
                command: command_line.to_owned(),
                reason: InvalidCommandReason::Unsplittable,
            })?;
        Ok(Self {
            argv: argv.into(),
            timeout: DEFAULT_LOOKUP_TIMEOUT,
        })
    }

    /// Replaces the time a lookup command may run.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl CallerResolver for CommandResolver {
    fn resolve(&self, request: LookupRequest, completion: QueryCompletion) {
        let slot = Arc::new(Mutex::new(Some(completion)));
        let worker_slot = Arc::clone(&slot);
        let argv = Arc::clone(&self.argv);
        let timeout = self.timeout;
        let spawned = thread::Builder::new()
            .name("ciserviced-resolve".to_owned())
            .spawn(move || {
                let name = run_lookup(&argv, &request, timeout);
                if let Some(completion) = take(&worker_slot) {
                    completion.complete(name);
                }
            });
        if let Err(error) = spawned {
            warn!(
                target: DISPATCH_TARGET,
                error = %error,
                "failed to start resolver thread; completing without a name"
            );
            if let Some(completion) = take(&slot) {
                completion.complete(None);
            }
        }
    }
}

fn take(slot: &Mutex<Option<QueryCompletion>>) -> Option<QueryCompletion> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

fn run_lookup(argv: &[String], request: &LookupRequest, timeout: Duration) -> Option<String> {
    let (program, arguments) = argv.split_first()?;
    let spawned = Command::new(program)
        .args(arguments)
        .arg(&request.complete_number)
        .arg(request.lookup_id.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn();
    let child = match spawned {
        Ok(child) => child,
        Err(error) => {
            warn!(
                target: DISPATCH_TARGET,
                program = %program,
                error = %error,
                "resolver command could not be started"
            );
            return None;
        }
    };
    let output = wait_for_lookup(child, request, timeout)?;
    if output.status.success() {
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(ToOwned::to_owned)
    } else {
        debug!(
            target: DISPATCH_TARGET,
            status = %output.status,
            lookup_id = request.lookup_id,
            "resolver command failed"
        );
        None
    }
}

/// Polls `child` until it exits, killing it once `timeout` has passed.
fn wait_for_lookup(mut child: Child, request: &LookupRequest, timeout: Duration) -> Option<Output> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return child.wait_with_output().ok(),
            Ok(None) if Instant::now() >= deadline => {
                warn!(
                    target: DISPATCH_TARGET,
                    lookup_id = request.lookup_id,
                    timeout = ?timeout,
                    "resolver command timed out; killing it"
                );
                drop(child.kill());
                drop(child.wait());
                return None;
            }
            Ok(None) => thread::sleep(LOOKUP_POLL_INTERVAL),
            Err(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    lookup_id = request.lookup_id,
                    error = %error,
                    "failed to wait for resolver command"
                );
                drop(child.kill());
                drop(child.wait());
                return None;
            }
        }
    }
}
