//! Turning completed ring events into service commands.
//!
//! For every completed call the [`DispatchEngine`] builds one
//! [`SubstitutionTable`] and starts a query per active service. Services bound
//! to a caller-directory lookup id wait for the [`CallerResolver`]; the rest
//! are expanded and spawned at once. Placeholder values are shell-quoted
//! before the expanded line is split into words, so a caller name can never
//! inject shell syntax.
//!
//! ## Placeholders
//!
//! `${number}`, `${areacode}`, `${area}`, `${name}`, `${time}`, `${msn}`,
//! `${alias}` and `${completenumber}` are recognised. Any other `${...}` is
//! left untouched.

mod engine;
mod resolver;
mod spawner;
mod substitution;

use std::sync::Arc;

use cinet::RingStage;
use tracing::{debug, info};

use crate::protocol::MessageHandler;

pub use engine::{DispatchEngine, DispatchReport, QueryCompletion};
pub use resolver::{CallerResolver, CommandResolver, DEFAULT_LOOKUP_TIMEOUT, LookupRequest};
pub use spawner::{CommandSpawner, DetachedSpawner, SpawnError};
pub use substitution::{Placeholder, SubstitutionTable, SubstitutionView, shell_quote};

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Message handler feeding completed ring events to a [`DispatchEngine`].
pub struct RingDispatcher {
    engine: DispatchEngine,
    resolver: Option<Arc<dyn CallerResolver>>,
}

impl RingDispatcher {
    /// Wraps `engine`, resolving names through `resolver` when present.
    pub fn new(engine: DispatchEngine, resolver: Option<Arc<dyn CallerResolver>>) -> Self {
        Self { engine, resolver }
    }

    /// Engine receiving completed calls.
    #[must_use]
    pub const fn engine(&self) -> &DispatchEngine {
        &self.engine
    }
}

impl MessageHandler for RingDispatcher {
    fn ring_event(&mut self, stage: &RingStage) {
        match stage {
            RingStage::Complete(call) => {
                let report = self.engine.run(call, self.resolver.as_deref());
                info!(
                    target: DISPATCH_TARGET,
                    number = %call.completenumber,
                    immediate = report.immediate,
                    deferred = report.deferred,
                    "dispatched completed call"
                );
            }
            RingStage::New | RingStage::Part => {
                debug!(target: DISPATCH_TARGET, stage = stage.code(), "ring stage ignored");
            }
        }
    }
}
