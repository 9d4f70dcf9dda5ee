//! Structured lifecycle reporting for bootstrap and connection events.

use std::sync::Arc;
use std::time::Duration;

use ciservice_config::{Config, ServerEndpoint};

use crate::bootstrap::BootstrapError;
use crate::client::{ConnectionError, LossReason};

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait LifecycleReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked when a connect attempt starts.
    fn connecting(&self, endpoint: &ServerEndpoint);

    /// Invoked once the connection is established.
    fn connected(&self, endpoint: &ServerEndpoint);

    /// Invoked when a connect attempt fails.
    fn connect_failed(&self, error: &ConnectionError);

    /// Invoked when an established or pending connection is given up.
    fn connection_lost(&self, reason: &LossReason);

    /// Invoked when the reconnect timer is armed.
    fn reconnect_scheduled(&self, interval: Duration);
}

impl<T> LifecycleReporter for Arc<T>
where
    T: LifecycleReporter + ?Sized,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn connecting(&self, endpoint: &ServerEndpoint) {
        (**self).connecting(endpoint);
    }

    fn connected(&self, endpoint: &ServerEndpoint) {
        (**self).connected(endpoint);
    }

    fn connect_failed(&self, error: &ConnectionError) {
        (**self).connect_failed(error);
    }

    fn connection_lost(&self, reason: &LossReason) {
        (**self).connection_lost(reason);
    }

    fn reconnect_scheduled(&self, interval: Duration) {
        (**self).reconnect_scheduled(interval);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredLifecycleReporter;

impl StructuredLifecycleReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl LifecycleReporter for StructuredLifecycleReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting daemon bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            server = %config.server_endpoint(),
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            "daemon bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "daemon bootstrap failed"
        );
    }

    fn connecting(&self, endpoint: &ServerEndpoint) {
        tracing::debug!(
            target: HEALTH_TARGET,
            event = "connecting",
            server = %endpoint,
            "connecting to server"
        );
    }

    fn connected(&self, endpoint: &ServerEndpoint) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "connected",
            server = %endpoint,
            "connected to server"
        );
    }

    fn connect_failed(&self, error: &ConnectionError) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "connect_failed",
            error = %error,
            "connect attempt failed"
        );
    }

    fn connection_lost(&self, reason: &LossReason) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "connection_lost",
            reason = %reason,
            "connection lost"
        );
    }

    fn reconnect_scheduled(&self, interval: Duration) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "reconnect_scheduled",
            interval_secs = interval.as_secs(),
            "reconnect scheduled"
        );
    }
}
