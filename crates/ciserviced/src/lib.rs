//! Caller-information service daemon.
//!
//! `ciserviced` keeps a TCP connection to a call-information server, announces
//! its protocol version, and turns completed ring events into local commands.
//! The pieces are wired together by [`bootstrap_with`] and driven by
//! [`run_daemon`]:
//!
//! - [`client`]: connect/reconnect state machine running on its own event
//!   loop thread, with cancellable connect attempts and a single reconnect
//!   timer.
//! - [`protocol`]: version handshake, leave notice and routing of decoded
//!   messages.
//! - [`services`]: ordered registry of validated command templates.
//! - [`dispatch`]: placeholder substitution, optional caller-name resolution
//!   and process spawning for each completed call.
//!
//! Lifecycle events are reported through [`LifecycleReporter`]; the default
//! implementation emits structured `tracing` events.

mod bootstrap;
pub mod client;
pub mod dispatch;
mod health;
mod listing;
mod process;
pub mod protocol;
pub mod services;
mod telemetry;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
    build_registry,
};
pub use health::{LifecycleReporter, StructuredLifecycleReporter};
pub use listing::{write_listing, write_version};
pub use process::{LaunchError, LaunchOutcome, StopSignal, run_daemon};
pub use telemetry::{TelemetryError, TelemetryHandle, TelemetrySettings};

#[cfg(test)]
mod tests;
