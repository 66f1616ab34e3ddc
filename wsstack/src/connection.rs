//! The connection handle every middleware layer works with.
//!
//! A connection is owned by the transport. Layers only hold [`ConnectionRef`]s
//! to it and keep their own per-connection state either in its
//! [`AttributeStore`] or in side tables keyed by [`ConnectionId`].

use bytes::Bytes;
use log::trace;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::attribute_store::AttributeStore;
use crate::error::{Error, Result};

/// Opaque, comparable identity of one live peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wraps a transport-assigned identifier.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates a process-unique identifier.
    pub fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw identifier value.
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One live socket peer.
pub trait Connection: Send + Sync {
    /// Identity of the peer; stable for the lifetime of the connection.
    fn id(&self) -> ConnectionId;

    /// Scratch space shared by all layers handling this connection.
    fn attributes(&self) -> &AttributeStore;

    /// Queues `data` for delivery to the peer.
    fn send(&self, data: Bytes) -> Result<()>;

    /// Closes the connection. Closing twice is a no-op.
    fn close(&self) -> Result<()>;
}

/// Shared, non-owning handle layers pass around.
pub type ConnectionRef = Arc<dyn Connection>;

/// Called whenever a [`QueuedConnection`] has new data to write.
pub type NotifyCallback = Arc<dyn Fn() + Send + Sync>;

/// A connection that buffers outbound data until the transport polls it.
///
/// The transport owns the socket: it drains [`QueuedConnection::poll_transmit`]
/// into it whenever the write notification fires, and stops once
/// [`QueuedConnection::is_closed`] reports true.
pub struct QueuedConnection {
    id: ConnectionId,
    attributes: AttributeStore,
    transmits: Mutex<VecDeque<Bytes>>,
    closed: AtomicBool,
    write_notify: Mutex<Option<NotifyCallback>>,
}

impl QueuedConnection {
    /// Creates a connection with a freshly allocated identity.
    pub fn new() -> Self {
        Self::with_id(ConnectionId::next())
    }

    /// Creates a connection with the given identity.
    pub fn with_id(id: ConnectionId) -> Self {
        Self {
            id,
            attributes: AttributeStore::new(),
            transmits: Mutex::new(VecDeque::new()),
            closed: AtomicBool::new(false),
            write_notify: Mutex::new(None),
        }
    }

    /// Registers the callback fired after each successful `send`.
    pub fn set_write_notify(&self, notify: NotifyCallback) {
        *self.write_notify.lock() = Some(notify);
    }

    /// Pops the next pending outbound payload.
    pub fn poll_transmit(&self) -> Option<Bytes> {
        self.transmits.lock().pop_front()
    }

    /// Drains every pending outbound payload.
    pub fn drain_transmits(&self) -> Vec<Bytes> {
        self.transmits.lock().drain(..).collect()
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Default for QueuedConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection for QueuedConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    fn send(&self, data: Bytes) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        trace!("connection {} queued {} bytes", self.id, data.len());
        self.transmits.lock().push_back(data);

        let notify = self.write_notify.lock().clone();
        if let Some(notify) = notify {
            notify();
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            trace!("connection {} closed", self.id);
        }
        Ok(())
    }
}

impl fmt::Debug for QueuedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedConnection")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
