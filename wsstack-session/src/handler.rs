//! Session storage backends.

use log::debug;
use parking_lot::RwLock;
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Arc;

use wsstack::{Error, Result};

/// Bytes of randomness in a generated session id.
const SESSION_ID_BYTES: usize = 16;

/// Stores encoded session blobs by session id.
pub trait SessionHandler: Send + Sync {
    /// The stored blob for `id`, or an empty blob for an unknown session.
    fn read(&self, id: &str) -> Result<Vec<u8>>;

    /// Replaces the stored blob for `id`.
    fn write(&self, id: &str, data: &[u8]) -> Result<()>;

    /// Forgets `id`.
    fn destroy(&self, id: &str) -> Result<()>;

    /// Issues a fresh session id.
    fn generate_id(&self) -> String {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}

impl<H: SessionHandler + ?Sized> SessionHandler for Arc<H> {
    fn read(&self, id: &str) -> Result<Vec<u8>> {
        (**self).read(id)
    }

    fn write(&self, id: &str, data: &[u8]) -> Result<()> {
        (**self).write(id, data)
    }

    fn destroy(&self, id: &str) -> Result<()> {
        (**self).destroy(id)
    }

    fn generate_id(&self) -> String {
        (**self).generate_id()
    }
}

/// Keeps sessions in process memory.
#[derive(Debug, Default)]
pub struct MemorySessionHandler {
    sessions: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemorySessionHandler {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Returns true if no session is stored.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl SessionHandler for MemorySessionHandler {
    fn read(&self, id: &str) -> Result<Vec<u8>> {
        Ok(self.sessions.read().get(id).cloned().unwrap_or_default())
    }

    fn write(&self, id: &str, data: &[u8]) -> Result<()> {
        self.sessions.write().insert(id.to_string(), data.to_vec());
        Ok(())
    }

    fn destroy(&self, id: &str) -> Result<()> {
        self.sessions.write().remove(id);
        Ok(())
    }
}

/// Wraps a backend so sessions can be read but never written back.
///
/// The WebSocket side of an application usually only observes sessions that
/// the HTTP side owns.
#[derive(Debug, Default)]
pub struct ReadOnlySessionHandler<H> {
    inner: H,
}

impl<H: SessionHandler> ReadOnlySessionHandler<H> {
    /// Wraps `inner`.
    pub fn new(inner: H) -> Self {
        Self { inner }
    }

    /// The wrapped backend.
    pub fn inner(&self) -> &H {
        &self.inner
    }
}

impl<H: SessionHandler> SessionHandler for ReadOnlySessionHandler<H> {
    fn read(&self, id: &str) -> Result<Vec<u8>> {
        self.inner.read(id)
    }

    fn write(&self, id: &str, _data: &[u8]) -> Result<()> {
        debug!("refusing to write session {} through a read-only handler", id);
        Err(Error::ReadOnlySession(
            "cannot write session data through a read-only handler".into(),
        ))
    }

    fn destroy(&self, id: &str) -> Result<()> {
        self.inner.destroy(id)
    }

    fn generate_id(&self) -> String {
        self.inner.generate_id()
    }
}
