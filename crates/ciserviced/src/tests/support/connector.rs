//! In-memory transport and connector doubles that count socket lifecycles.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use cinet::{Codec, FrameReader, Message, ReadError};
use ciservice_config::ServerEndpoint;

use crate::client::{ConnectionError, Connector, Transport};

/// Counts sockets opened and closed by the fake connector.
#[derive(Debug, Default)]
pub struct SocketLedger {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl SocketLedger {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Sockets opened and not yet closed.
    pub fn live(&self) -> usize {
        self.opened().saturating_sub(self.closed())
    }
}

/// Server side of one fake connection.
#[derive(Clone)]
pub struct FakePeer {
    inbound: Sender<Vec<u8>>,
    written: Arc<Mutex<Vec<u8>>>,
}

impl FakePeer {
    /// Sends one encoded message to the client.
    pub fn send(&self, message: &Message) {
        let bytes = Codec::default()
            .encode(message)
            .expect("test message should encode");
        self.send_raw(bytes);
    }

    /// Sends raw bytes to the client.
    pub fn send_raw(&self, bytes: Vec<u8>) {
        let _ = self.inbound.send(bytes);
    }

    /// Closes the server side of the socket.
    pub fn hang_up(&self) {
        let _ = self.inbound.send(Vec::new());
    }

    /// Messages the client has written so far.
    pub fn received(&self) -> Vec<Message> {
        let bytes = self
            .written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let mut reader = FrameReader::new(bytes.as_slice(), Codec::default());
        let mut messages = Vec::new();
        loop {
            match reader.read_message() {
                Ok(message) => messages.push(message),
                Err(ReadError::Closed) => break,
                Err(error) => panic!("client wrote an invalid frame: {error}"),
            }
        }
        messages
    }
}

struct ChannelReader {
    inbound: Receiver<Vec<u8>>,
    buffer: VecDeque<u8>,
    finished: bool,
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.buffer.is_empty() && !self.finished {
            match self.inbound.recv() {
                Ok(chunk) if chunk.is_empty() => self.finished = true,
                Ok(chunk) => self.buffer.extend(chunk),
                Err(_) => self.finished = true,
            }
        }
        let count = buf.len().min(self.buffer.len());
        for (slot, byte) in buf.iter_mut().zip(self.buffer.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }
}

/// Transport handed out by [`FakeConnector`].
pub struct FakeTransport {
    ledger: Arc<SocketLedger>,
    written: Arc<Mutex<Vec<u8>>>,
    inbound: Mutex<Option<Receiver<Vec<u8>>>>,
    hang_up: Sender<Vec<u8>>,
}

impl FakeTransport {
    fn open(ledger: Arc<SocketLedger>) -> (Self, FakePeer) {
        ledger.opened.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = mpsc::channel();
        let written = Arc::new(Mutex::new(Vec::new()));
        let transport = Self {
            ledger,
            written: Arc::clone(&written),
            inbound: Mutex::new(Some(receiver)),
            hang_up: sender.clone(),
        };
        (
            transport,
            FakePeer {
                inbound: sender,
                written,
            },
        )
    }
}

impl Write for FakeTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for FakeTransport {
    fn reader(&self) -> io::Result<Box<dyn Read + Send>> {
        let inbound = self
            .inbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| io::Error::other("reader already taken"))?;
        Ok(Box::new(ChannelReader {
            inbound,
            buffer: VecDeque::new(),
            finished: false,
        }))
    }

    fn configure(&self, _write_timeout: Duration) -> io::Result<()> {
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.ledger.closed.fetch_add(1, Ordering::SeqCst);
        let _ = self.hang_up.send(Vec::new());
        Ok(())
    }
}

/// Connector producing [`FakeTransport`] values, optionally failing.
#[derive(Default)]
pub struct FakeConnector {
    ledger: Arc<SocketLedger>,
    peers: Mutex<Vec<FakePeer>>,
    failures: AtomicUsize,
    attempts: AtomicUsize,
}

impl FakeConnector {
    pub fn ledger(&self) -> &SocketLedger {
        &self.ledger
    }

    /// Makes the next `count` attempts fail with a refused connection.
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Server sides of every successful connection, oldest first.
    pub fn peers(&self) -> Vec<FakePeer> {
        self.peers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Server side of the most recent connection.
    pub fn last_peer(&self) -> FakePeer {
        self.peers().pop().expect("no connection was made")
    }

    /// Opens a transport outside the connector, for stale-result tests.
    pub fn open_detached(&self) -> Box<dyn Transport> {
        let (transport, _peer) = FakeTransport::open(Arc::clone(&self.ledger));
        Box::new(transport)
    }
}

impl Connector for FakeConnector {
    fn connect(&self, endpoint: &ServerEndpoint) -> Result<Box<dyn Transport>, ConnectionError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if refused {
            return Err(ConnectionError::Connect {
                endpoint: endpoint.to_string(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            });
        }
        let (transport, peer) = FakeTransport::open(Arc::clone(&self.ledger));
        self.peers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(peer);
        Ok(Box::new(transport))
    }
}
