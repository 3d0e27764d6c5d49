//! In-process transport: a scriptable [`Connector`] whose connections are
//! plain channels.
//!
//! Every accepted dial hands a [`MemoryPeer`] (the "server side") to the
//! receiver returned by [`MemoryConnector::new`]. Dropping the peer closes
//! the connection from the client's point of view, which is how tests
//! simulate a server going away.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::{Connection, ConnectionId, Connector, TransportError};

struct Shared {
    /// Number of upcoming dials to refuse.
    refuse_next: usize,
    /// Refuse every dial until switched off.
    refuse_all: bool,
    /// Every target ever dialled, accepted or not.
    dialled: Vec<String>,
    peers: mpsc::UnboundedSender<MemoryPeer>,
}

/// A [`Connector`] backed by in-memory channels.
///
/// Cheap to clone; clones share the same script and dial log.
#[derive(Clone)]
pub struct MemoryConnector {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryConnector {
    /// Creates a connector plus the stream of server-side peers for each
    /// accepted dial.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Shared {
            refuse_next: 0,
            refuse_all: false,
            dialled: Vec::new(),
            peers: tx,
        };
        (
            Self {
                shared: Arc::new(Mutex::new(shared)),
            },
            rx,
        )
    }

    /// Refuses the next `count` dials.
    pub fn refuse_next(&self, count: usize) {
        self.lock().refuse_next = count;
    }

    /// Refuses every dial while `on` is true.
    pub fn refuse_all(&self, on: bool) {
        self.lock().refuse_all = on;
    }

    /// Returns every target dialled so far, in order.
    pub fn dialled(&self) -> Vec<String> {
        self.lock().dialled.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dial(&self, target: &str) -> Result<MemoryConnection, TransportError> {
        let mut shared = self.lock();
        shared.dialled.push(target.to_string());

        if shared.refuse_all || shared.refuse_next > 0 {
            shared.refuse_next = shared.refuse_next.saturating_sub(1);
            return Err(refused(target));
        }

        let (to_client, client_inbound) = mpsc::unbounded_channel();
        let (client_outbound, from_client) = mpsc::unbounded_channel();
        let peer = MemoryPeer {
            target: target.to_string(),
            to_client,
            from_client,
        };
        // Nobody listening for peers means nobody is "serving".
        shared.peers.send(peer).map_err(|_| refused(target))?;

        Ok(MemoryConnection {
            id: ConnectionId::next(),
            outbound: client_outbound,
            inbound: tokio::sync::Mutex::new(client_inbound),
            closed: AtomicBool::new(false),
        })
    }
}

fn refused(target: &str) -> TransportError {
    TransportError::ConnectFailed(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        format!("memory dial refused: {target}"),
    ))
}

impl Connector for MemoryConnector {
    type Connection = MemoryConnection;
    type Error = TransportError;

    async fn connect(
        &self,
        target: &str,
    ) -> Result<Self::Connection, Self::Error> {
        let conn = self.dial(target)?;
        tracing::debug!(id = %conn.id, target, "opened memory connection");
        Ok(conn)
    }
}

/// The server end of an accepted memory dial.
pub struct MemoryPeer {
    target: String,
    to_client: mpsc::UnboundedSender<Vec<u8>>,
    from_client: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl MemoryPeer {
    /// The target URL the client dialled.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Delivers a frame to the client. Returns `false` if the client end
    /// is gone.
    pub fn send(&self, data: impl Into<Vec<u8>>) -> bool {
        self.to_client.send(data.into()).is_ok()
    }

    /// Waits for the next frame written by the client. `None` once the
    /// client end has been dropped.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.from_client.recv().await
    }

    /// Returns a frame if one is already buffered.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.from_client.try_recv().ok()
    }

    /// Closes the connection from the server side.
    pub fn close(self) {
        drop(self);
    }
}

/// The client end of a memory connection.
pub struct MemoryConnection {
    id: ConnectionId,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    closed: AtomicBool,
}

impl Connection for MemoryConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionClosed(
                "closed locally".into(),
            ));
        }
        self.outbound.send(data.to_vec()).map_err(|_| {
            TransportError::ConnectionClosed("peer dropped".into())
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(None);
        }
        Ok(self.inbound.lock().await.recv().await)
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.closed.store(true, Ordering::Release);
        self.inbound.lock().await.close();
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
