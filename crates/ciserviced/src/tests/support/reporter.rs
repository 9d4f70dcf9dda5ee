//! Test double for [`LifecycleReporter`] that records events for assertions.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use ciservice_config::{Config, ServerEndpoint};

use crate::bootstrap::BootstrapError;
use crate::client::{ConnectionError, LossReason};
use crate::health::LifecycleReporter;

/// Lifecycle events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    Connecting,
    Connected,
    ConnectFailed,
    ConnectionLost(String),
    ReconnectScheduled(Duration),
}

/// Records lifecycle events in order.
#[derive(Debug, Default)]
pub struct RecordingLifecycleReporter {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingLifecycleReporter {
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, wanted: &LifecycleEvent) -> usize {
        self.events()
            .iter()
            .filter(|event| *event == wanted)
            .count()
    }

    pub fn count_scheduled(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, LifecycleEvent::ReconnectScheduled(_)))
            .count()
    }

    fn record(&self, event: LifecycleEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl LifecycleReporter for RecordingLifecycleReporter {
    fn bootstrap_starting(&self) {
        self.record(LifecycleEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(LifecycleEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(LifecycleEvent::BootstrapFailed(error.to_string()));
    }

    fn connecting(&self, _endpoint: &ServerEndpoint) {
        self.record(LifecycleEvent::Connecting);
    }

    fn connected(&self, _endpoint: &ServerEndpoint) {
        self.record(LifecycleEvent::Connected);
    }

    fn connect_failed(&self, _error: &ConnectionError) {
        self.record(LifecycleEvent::ConnectFailed);
    }

    fn connection_lost(&self, reason: &LossReason) {
        self.record(LifecycleEvent::ConnectionLost(reason.to_string()));
    }

    fn reconnect_scheduled(&self, interval: Duration) {
        self.record(LifecycleEvent::ReconnectScheduled(interval));
    }
}
