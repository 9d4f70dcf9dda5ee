use std::fmt;
use std::sync::Arc;

use cinet::CallInfo;
use tracing::{debug, warn};

use crate::services::ServiceRegistry;

use super::DISPATCH_TARGET;
use super::resolver::{CallerResolver, LookupRequest};
use super::spawner::{CommandSpawner, SpawnError};
use super::substitution::SubstitutionTable;

/// Work left for one service after a ring event: expand and spawn.
struct PendingQuery {
    service: String,
    command: String,
    table: Arc<SubstitutionTable>,
    spawner: Arc<dyn CommandSpawner>,
}

impl PendingQuery {
    fn run(self, resolved_name: Option<&str>) {
        match self.spawn(resolved_name) {
            Ok(()) => debug!(
                target: DISPATCH_TARGET,
                service = %self.service,
                "service command started"
            ),
            Err(error) => warn!(
                target: DISPATCH_TARGET,
                service = %self.service,
                error = %error,
                "service command not started"
            ),
        }
    }

    fn spawn(&self, resolved_name: Option<&str>) -> Result<(), SpawnError> {
        let name = resolved_name.filter(|name| !name.is_empty());
        let expanded = self.table.with_name(name).expand(&self.command);
        let argv = shlex::split(&expanded).ok_or_else(|| SpawnError::Split {
            command: expanded.clone(),
        })?;
        if argv.is_empty() {
            return Err(SpawnError::EmptyCommand);
        }
        debug!(
            target: DISPATCH_TARGET,
            service = %self.service,
            command = %expanded,
            "spawning service command"
        );
        self.spawner.spawn(&argv)
    }
}

/// Handle a resolver uses to finish one query.
///
/// [`QueryCompletion::complete`] consumes the handle, so a query cannot be
/// completed twice. Dropping the handle without completing it is a resolver
/// bug: the command is not run and a warning is logged.
pub struct QueryCompletion {
    query: Option<PendingQuery>,
}

impl QueryCompletion {
    const fn new(query: PendingQuery) -> Self {
        Self { query: Some(query) }
    }

    /// Label of the service waiting on this query.
    #[must_use]
    pub fn service(&self) -> &str {
        self.query
            .as_ref()
            .map_or("", |query| query.service.as_str())
    }

    /// Expands and runs the service command. A non-empty `resolved_name`
    /// replaces `${name}` for this query only.
    pub fn complete(mut self, resolved_name: Option<String>) {
        if let Some(query) = self.query.take() {
            query.run(resolved_name.as_deref());
        }
    }

    #[cfg(test)]
    pub(crate) fn table_handle(&self) -> std::sync::Weak<SubstitutionTable> {
        self.query
            .as_ref()
            .map_or_else(std::sync::Weak::new, |query| Arc::downgrade(&query.table))
    }
}

impl fmt::Debug for QueryCompletion {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("QueryCompletion")
            .field("service", &self.service())
            .field("pending", &self.query.is_some())
            .finish()
    }
}

impl Drop for QueryCompletion {
    fn drop(&mut self) {
        if let Some(query) = self.query.take() {
            warn!(
                target: DISPATCH_TARGET,
                service = %query.service,
                "resolver dropped a query without completing it; command not run"
            );
        }
    }
}

/// Counts of queries started by one [`DispatchEngine::run`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// Queries completed synchronously.
    pub immediate: usize,
    /// Queries handed to the resolver.
    pub deferred: usize,
}

/// Runs the active services of a registry for completed ring events.
pub struct DispatchEngine {
    registry: ServiceRegistry,
    spawner: Arc<dyn CommandSpawner>,
}

impl DispatchEngine {
    /// Builds an engine over `registry`, launching commands with `spawner`.
    pub fn new(registry: ServiceRegistry, spawner: Arc<dyn CommandSpawner>) -> Self {
        Self { registry, spawner }
    }

    /// Services the engine dispatches to.
    #[must_use]
    pub const fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Starts one query per active service, in registry order.
    ///
    /// Services with a lookup id are handed to `resolver` when one is given
    /// and finish whenever it completes them; all others are expanded and
    /// spawned before this call returns. Every query shares one
    /// [`SubstitutionTable`], released once the last query finishes.
    pub fn run(&self, call: &CallInfo, resolver: Option<&dyn CallerResolver>) -> DispatchReport {
        let table = Arc::new(SubstitutionTable::from_call(call));
        let mut report = DispatchReport::default();
        for service in self.registry.active() {
            let completion = QueryCompletion::new(PendingQuery {
                service: service.label(),
                command: service.command().to_owned(),
                table: Arc::clone(&table),
                spawner: Arc::clone(&self.spawner),
            });
            match (service.lookup_id(), resolver) {
                (Some(lookup_id), Some(resolver)) => {
                    report.deferred += 1;
                    resolver.resolve(
                        LookupRequest {
                            complete_number: call.completenumber.clone(),
                            lookup_id,
                        },
                        completion,
                    );
                }
                _ => {
                    report.immediate += 1;
                    completion.complete(None);
                }
            }
        }
        report
    }
}
