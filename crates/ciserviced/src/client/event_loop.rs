use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use ciservice_config::ServerEndpoint;
use tracing::{debug, info};

use crate::health::LifecycleReporter;
use crate::protocol::ProtocolClient;
use crate::telemetry;

use super::errors::ClientError;
use super::events::{ClientEvent, LoopControl};
use super::manager::ConnectionManager;
use super::transport::Connector;
use super::{CLIENT_TARGET, ClientSettings};

/// Cloneable handle used to steer a running [`ClientLoop`].
#[derive(Debug, Clone)]
pub struct ClientHandle {
    events: Sender<ClientEvent>,
}

impl ClientHandle {
    /// Asks the loop to drop the connection and stop reconnecting.
    pub fn request_disconnect(&self) {
        self.post(ClientEvent::DisconnectRequested);
    }

    /// Asks the loop to disconnect gracefully and exit.
    pub fn request_shutdown(&self) {
        self.post(ClientEvent::Shutdown);
    }

    fn post(&self, event: ClientEvent) {
        if self.events.send(event).is_err() {
            debug!(target: CLIENT_TARGET, "client loop already stopped");
        }
    }
}

/// Event loop owning the [`ConnectionManager`].
pub struct ClientLoop {
    manager: ConnectionManager,
    events: Receiver<ClientEvent>,
}

impl ClientLoop {
    /// Builds a loop and the handle used to control it.
    pub fn new(
        settings: ClientSettings,
        connector: Arc<dyn Connector>,
        protocol: ProtocolClient,
        reporter: Arc<dyn LifecycleReporter>,
    ) -> (Self, ClientHandle) {
        let (sender, receiver) = mpsc::channel();
        let manager = ConnectionManager::new(settings, connector, protocol, reporter, sender.clone());
        (
            Self {
                manager,
                events: receiver,
            },
            ClientHandle { events: sender },
        )
    }

    /// Borrows the state machine.
    #[must_use]
    pub const fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// Mutably borrows the state machine.
    pub const fn manager_mut(&mut self) -> &mut ConnectionManager {
        &mut self.manager
    }

    /// Waits up to `timeout` for the next event, or for the retry deadline if
    /// that comes first, and applies it. Returns `None` when nothing happened.
    pub fn pump(&mut self, timeout: Duration) -> Option<LoopControl> {
        let limit = Instant::now() + timeout;
        let (wait_until, timer_due) = match self.manager.next_deadline() {
            Some(deadline) if deadline <= limit => (deadline, true),
            _ => (limit, false),
        };
        let wait = wait_until.saturating_duration_since(Instant::now());
        let event = match self.events.recv_timeout(wait) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) if timer_due => ClientEvent::TimerFired,
            Err(RecvTimeoutError::Timeout) => return None,
            Err(RecvTimeoutError::Disconnected) => ClientEvent::Shutdown,
        };
        Some(self.manager.handle_event(event))
    }

    /// Initialises the manager, connects, and processes events until
    /// shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidState`] when the manager was already
    /// initialised.
    pub fn run(mut self, endpoint: ServerEndpoint) -> Result<(), ClientError> {
        self.manager.initialize(endpoint)?;
        self.manager.connect()?;
        loop {
            let event = match self.manager.next_deadline() {
                Some(deadline) => {
                    let wait = deadline.saturating_duration_since(Instant::now());
                    match self.events.recv_timeout(wait) {
                        Ok(event) => event,
                        Err(RecvTimeoutError::Timeout) => ClientEvent::TimerFired,
                        Err(RecvTimeoutError::Disconnected) => ClientEvent::Shutdown,
                    }
                }
                None => self.events.recv().unwrap_or(ClientEvent::Shutdown),
            };
            if self.manager.handle_event(event) == LoopControl::Exit {
                break;
            }
        }
        info!(target: CLIENT_TARGET, "client loop finished");
        Ok(())
    }

    /// Runs the loop on a dedicated thread.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Thread`] when the thread cannot be started.
    pub fn spawn(
        self,
        endpoint: ServerEndpoint,
    ) -> Result<JoinHandle<Result<(), ClientError>>, ClientError> {
        let span = telemetry::connection_span(&endpoint);
        thread::Builder::new()
            .name("ciserviced-client".to_owned())
            .spawn(move || span.in_scope(|| self.run(endpoint)))
            .map_err(|source| ClientError::Thread { source })
    }
}
