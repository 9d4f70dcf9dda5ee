use std::io::Read;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Instant;

use cinet::{Codec, FrameReader, FrameWriter, Message, ReadError};
use ciservice_config::ServerEndpoint;
use tracing::{debug, info, warn};

use crate::health::LifecycleReporter;
use crate::protocol::{ProtocolClient, Routing};

use super::cancel::CancellationToken;
use super::errors::{ClientError, ConnectionError};
use super::events::{ClientEvent, ConnectionId, LoopControl, LossReason};
use super::timer::RetryTimer;
use super::transport::{Connector, Transport};
use super::{CLIENT_TARGET, ClientSettings, ConnectionState};

struct LiveConnection {
    id: ConnectionId,
    writer: FrameWriter<Box<dyn Transport>>,
}

impl LiveConnection {
    fn close(mut self) {
        if let Err(error) = self.writer.get_mut().close() {
            debug!(
                target: CLIENT_TARGET,
                connection = %self.id,
                error = %error,
                "socket close reported an error"
            );
        }
    }
}

/// Connect/reconnect state machine for the server connection.
///
/// Owned by the event loop thread. Helper threads only post
/// [`ClientEvent`] values through the sender handed to [`ConnectionManager::new`].
pub struct ConnectionManager {
    state: ConnectionState,
    endpoint: Option<ServerEndpoint>,
    settings: ClientSettings,
    connector: Arc<dyn Connector>,
    protocol: ProtocolClient,
    reporter: Arc<dyn LifecycleReporter>,
    events: Sender<ClientEvent>,
    pending_connect: Option<CancellationToken>,
    connection: Option<LiveConnection>,
    last_connection_id: u64,
    retry_timer: Option<RetryTimer>,
}

impl ConnectionManager {
    /// Creates an uninitialised manager.
    pub fn new(
        settings: ClientSettings,
        connector: Arc<dyn Connector>,
        protocol: ProtocolClient,
        reporter: Arc<dyn LifecycleReporter>,
        events: Sender<ClientEvent>,
    ) -> Self {
        Self {
            state: ConnectionState::Uninitialized,
            endpoint: None,
            settings,
            connector,
            protocol,
            reporter,
            events,
            pending_connect: None,
            connection: None,
            last_connection_id: 0,
            retry_timer: None,
        }
    }

    /// Current connection state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Endpoint set by [`ConnectionManager::initialize`].
    #[must_use]
    pub const fn endpoint(&self) -> Option<&ServerEndpoint> {
        self.endpoint.as_ref()
    }

    /// Whether a reconnect timer is armed.
    #[must_use]
    pub const fn has_retry_timer(&self) -> bool {
        self.retry_timer.is_some()
    }

    /// When the reconnect timer fires next, if armed.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.retry_timer.as_ref().map(RetryTimer::deadline)
    }

    /// Token of the outstanding connect attempt.
    #[must_use]
    pub const fn pending_token(&self) -> Option<&CancellationToken> {
        self.pending_connect.as_ref()
    }

    /// Identifier of the live connection.
    #[must_use]
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.connection.as_ref().map(|connection| connection.id)
    }

    /// Records the server endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidState`] unless the manager is
    /// uninitialised.
    pub fn initialize(&mut self, endpoint: ServerEndpoint) -> Result<(), ClientError> {
        self.require(ConnectionState::Uninitialized, "initialize")?;
        info!(target: CLIENT_TARGET, server = %endpoint, "client initialised");
        self.endpoint = Some(endpoint);
        self.state = ConnectionState::Initialized;
        Ok(())
    }

    /// Starts an asynchronous connect attempt, dropping any current
    /// connection or attempt first.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidState`] when the manager is
    /// uninitialised.
    pub fn connect(&mut self) -> Result<(), ClientError> {
        let endpoint = match (self.state, self.endpoint.clone()) {
            (ConnectionState::Uninitialized, _) | (_, None) => {
                return Err(ClientError::InvalidState {
                    operation: "connect",
                    state: self.state,
                });
            }
            (_, Some(endpoint)) => endpoint,
        };
        self.stop();

        let token = CancellationToken::new();
        self.pending_connect = Some(token.clone());
        self.state = ConnectionState::Connecting;
        self.reporter.connecting(&endpoint);

        let connector = Arc::clone(&self.connector);
        let events = self.events.clone();
        let spawned = thread::Builder::new()
            .name("ciserviced-connect".to_owned())
            .spawn(move || run_connect(connector.as_ref(), &endpoint, token, &events));
        if let Err(error) = spawned {
            warn!(
                target: CLIENT_TARGET,
                error = %error,
                "failed to start connect thread"
            );
            self.pending_connect = None;
            self.state = ConnectionState::Initialized;
            self.connection_lost(LossReason::ConnectFailed);
        }
        Ok(())
    }

    /// Abandons the pending attempt or closes the live connection after
    /// sending `Leave`. Leaves the reconnect timer untouched.
    pub fn stop(&mut self) {
        match self.state {
            ConnectionState::Connecting => {
                if let Some(token) = self.pending_connect.take() {
                    token.cancel();
                }
                debug!(target: CLIENT_TARGET, "connect attempt cancelled");
            }
            ConnectionState::Connected => {
                if let Some(mut connection) = self.connection.take() {
                    if let Err(error) = ProtocolClient::leave(&mut connection.writer) {
                        debug!(
                            target: CLIENT_TARGET,
                            connection = %connection.id,
                            error = %error,
                            "leave could not be sent"
                        );
                    }
                    connection.close();
                }
                info!(target: CLIENT_TARGET, "disconnected from server");
            }
            ConnectionState::Initialized | ConnectionState::Uninitialized => return,
        }
        self.state = ConnectionState::Initialized;
    }

    /// Cancels the reconnect timer, then stops.
    pub fn disconnect(&mut self) {
        self.retry_timer = None;
        self.stop();
    }

    /// Releases the endpoint and returns to the uninitialised state.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidState`] unless the manager is initialised
    /// and idle.
    pub fn shutdown(&mut self) -> Result<(), ClientError> {
        self.require(ConnectionState::Initialized, "shut down")?;
        self.retry_timer = None;
        self.endpoint = None;
        self.state = ConnectionState::Uninitialized;
        info!(target: CLIENT_TARGET, "client shut down");
        Ok(())
    }

    /// Applies one event to the state machine.
    pub fn handle_event(&mut self, event: ClientEvent) -> LoopControl {
        match event {
            ClientEvent::ConnectFinished { token, result } => {
                self.connect_finished(&token, result);
            }
            ClientEvent::Frame {
                connection,
                outcome,
            } => self.frame_received(connection, outcome),
            ClientEvent::TimerFired => self.timer_fired(),
            ClientEvent::DisconnectRequested => self.disconnect(),
            ClientEvent::Shutdown => {
                self.disconnect();
                if let Err(error) = self.shutdown() {
                    debug!(target: CLIENT_TARGET, error = %error, "shutdown skipped");
                }
                return LoopControl::Exit;
            }
        }
        LoopControl::Continue
    }

    fn require(&self, expected: ConnectionState, operation: &'static str) -> Result<(), ClientError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ClientError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn connect_finished(
        &mut self,
        token: &CancellationToken,
        result: Result<Box<dyn Transport>, ConnectionError>,
    ) {
        let current = self
            .pending_connect
            .as_ref()
            .is_some_and(|pending| pending.same_as(token))
            && !token.is_cancelled();
        if !current {
            debug!(target: CLIENT_TARGET, "discarding result of abandoned connect attempt");
            if let Ok(mut transport) = result
                && let Err(error) = transport.close()
            {
                debug!(target: CLIENT_TARGET, error = %error, "closing abandoned socket failed");
            }
            return;
        }

        self.pending_connect = None;
        match result {
            Ok(transport) => self.establish(transport),
            Err(error) => {
                self.reporter.connect_failed(&error);
                self.state = ConnectionState::Initialized;
                self.connection_lost(LossReason::ConnectFailed);
            }
        }
    }

    fn establish(&mut self, mut transport: Box<dyn Transport>) {
        self.retry_timer = None;
        let endpoint = self
            .endpoint
            .as_ref()
            .map_or_else(String::new, ToString::to_string);

        let reader = match transport
            .configure(self.settings.write_timeout)
            .and_then(|()| transport.reader())
        {
            Ok(reader) => reader,
            Err(source) => {
                let error = ConnectionError::Setup { endpoint, source };
                if let Err(close_error) = transport.close() {
                    debug!(target: CLIENT_TARGET, error = %close_error, "closing socket failed");
                }
                self.reporter.connect_failed(&error);
                self.state = ConnectionState::Initialized;
                self.connection_lost(LossReason::ConnectFailed);
                return;
            }
        };

        self.last_connection_id += 1;
        let id = ConnectionId(self.last_connection_id);
        let codec = self.settings.codec;
        let events = self.events.clone();
        let spawned = thread::Builder::new()
            .name(format!("ciserviced-reader-{}", id.0))
            .spawn(move || run_reader(id, reader, codec, &events));
        if let Err(source) = spawned {
            let error = ConnectionError::Setup { endpoint, source };
            if let Err(close_error) = transport.close() {
                debug!(target: CLIENT_TARGET, error = %close_error, "closing socket failed");
            }
            self.reporter.connect_failed(&error);
            self.state = ConnectionState::Initialized;
            self.connection_lost(LossReason::ConnectFailed);
            return;
        }

        let mut writer = FrameWriter::with_pending_limit(
            transport,
            self.settings.codec,
            self.settings.pending_limit,
        );
        let handshake = self.protocol.handshake(&mut writer);
        self.connection = Some(LiveConnection { id, writer });
        self.state = ConnectionState::Connected;
        if let Some(endpoint) = self.endpoint.as_ref() {
            self.reporter.connected(endpoint);
        }
        if let Err(error) = handshake {
            self.connection_lost(LossReason::WriteFailed(error.to_string()));
        }
    }

    fn frame_received(&mut self, id: ConnectionId, outcome: Result<Message, ReadError>) {
        if self.connection_id() != Some(id) {
            debug!(target: CLIENT_TARGET, connection = %id, "ignoring event from closed connection");
            return;
        }
        match outcome {
            Ok(message) => {
                if self.protocol.route(&message) == Routing::ServerLeft {
                    self.connection_lost(LossReason::ServerLeft);
                    return;
                }
                self.flush_pending();
            }
            Err(ReadError::Decode(error)) => {
                warn!(
                    target: CLIENT_TARGET,
                    connection = %id,
                    error = %error,
                    "dropping undecodable message"
                );
            }
            Err(ReadError::Closed) => self.connection_lost(LossReason::Closed),
            Err(error) => self.connection_lost(LossReason::ReadFailed(error.to_string())),
        }
    }

    fn flush_pending(&mut self) {
        let Some(connection) = self.connection.as_mut() else {
            return;
        };
        if connection.writer.pending_len() == 0 {
            return;
        }
        if let Err(error) = connection.writer.flush_pending() {
            self.connection_lost(LossReason::WriteFailed(error.to_string()));
        }
    }

    fn timer_fired(&mut self) {
        let Some(timer) = self.retry_timer.as_mut() else {
            return;
        };
        match self.state {
            ConnectionState::Connecting => timer.rearm(),
            ConnectionState::Connected | ConnectionState::Uninitialized => {
                self.retry_timer = None;
            }
            ConnectionState::Initialized => {
                timer.rearm();
                if let Err(error) = self.connect() {
                    warn!(target: CLIENT_TARGET, error = %error, "reconnect failed to start");
                }
            }
        }
    }

    fn connection_lost(&mut self, reason: LossReason) {
        if let Some(timer) = self.retry_timer.as_ref() {
            debug!(
                target: CLIENT_TARGET,
                %reason,
                interval = ?timer.interval(),
                "reconnect already scheduled"
            );
            return;
        }
        self.reporter.connection_lost(&reason);
        self.stop();
        if let Some(interval) = self.settings.retry_interval {
            self.retry_timer = Some(RetryTimer::start(interval));
            self.reporter.reconnect_scheduled(interval);
        }
    }
}

fn run_connect(
    connector: &dyn Connector,
    endpoint: &ServerEndpoint,
    token: CancellationToken,
    events: &Sender<ClientEvent>,
) {
    if token.is_cancelled() {
        return;
    }
    let result = connector.connect(endpoint);
    if events
        .send(ClientEvent::ConnectFinished { token, result })
        .is_err()
    {
        debug!(target: CLIENT_TARGET, "client loop gone; dropping connect result");
    }
}

fn run_reader(
    id: ConnectionId,
    stream: Box<dyn Read + Send>,
    codec: Codec,
    events: &Sender<ClientEvent>,
) {
    let mut reader = FrameReader::new(stream, codec);
    loop {
        let outcome = reader.read_message();
        let fatal = outcome.as_ref().is_err_and(ReadError::is_fatal);
        if events
            .send(ClientEvent::Frame {
                connection: id,
                outcome,
            })
            .is_err()
            || fatal
        {
            break;
        }
    }
    debug!(target: CLIENT_TARGET, connection = %id, "reader stopped");
}
