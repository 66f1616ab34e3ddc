use log::{debug, trace};
use parking_lot::RwLock;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use wsstack::{Error, Result};

use crate::handler::SessionHandler;
use crate::reader::Reader;
use crate::value::{SessionData, SessionValue};

/// Options shared by every session a [`SessionFactory`] creates.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Name of the cookie carrying the session id.
    pub name: String,
    /// Load session data as soon as the connection opens.
    pub auto_start: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            name: "sid".to_string(),
            auto_start: false,
        }
    }
}

impl SessionOptions {
    /// Sets the session cookie name.
    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = name.into();
        self
    }

    /// Sets whether sessions load on open.
    pub fn auto_start(&mut self, auto_start: bool) -> &mut Self {
        self.auto_start = auto_start;
        self
    }
}

/// Creates [`Session`]s bound to one backend and storage format.
#[derive(Clone)]
pub struct SessionFactory {
    handler: Arc<dyn SessionHandler>,
    reader: Arc<dyn Reader>,
    options: SessionOptions,
}

impl SessionFactory {
    /// Creates a factory over `handler`, decoding blobs with `reader`.
    pub fn new(
        handler: Arc<dyn SessionHandler>,
        reader: Arc<dyn Reader>,
        options: SessionOptions,
    ) -> Self {
        Self {
            handler,
            reader,
            options,
        }
    }

    /// The options new sessions get.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// The storage backend.
    pub fn handler(&self) -> &Arc<dyn SessionHandler> {
        &self.handler
    }

    /// A new session with no id yet.
    pub fn create_session(&self) -> Session {
        Session {
            name: self.options.name.clone(),
            id: RwLock::new(None),
            handler: self.handler.clone(),
            reader: self.reader.clone(),
            data: RwLock::new(SessionData::new()),
            started: AtomicBool::new(false),
        }
    }
}

/// Session state of one connection.
///
/// Data is only available after [`Session::start`]; before that reads see an
/// empty session.
pub struct Session {
    name: String,
    id: RwLock<Option<String>>,
    handler: Arc<dyn SessionHandler>,
    reader: Arc<dyn Reader>,
    data: RwLock<SessionData>,
    started: AtomicBool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.name)
            .field("id", &*self.id.read())
            .field("started", &self.is_started())
            .finish()
    }
}

impl Session {
    /// Cookie name of the session.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Session id, once assigned.
    pub fn id(&self) -> Option<String> {
        self.id.read().clone()
    }

    /// Assigns the session id. An id can only be assigned once.
    pub fn set_id(&self, id: impl Into<String>) -> Result<()> {
        let mut current = self.id.write();
        if current.is_some() {
            return Err(Error::ReadOnlySession(
                "the session id can only be set once".into(),
            ));
        }
        *current = Some(id.into());
        Ok(())
    }

    /// Returns true once the data has been loaded.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Loads the session data from the backend. Starting twice is a no-op.
    pub fn start(&self) -> Result<()> {
        if self.is_started() {
            return Ok(());
        }
        if self.name.is_empty() {
            return Err(Error::SessionMisconfigured(
                "the session name cannot be empty".into(),
            ));
        }

        let id = match self.id() {
            Some(id) => id,
            None => {
                let id = self.handler.generate_id();
                self.set_id(id.clone())?;
                id
            }
        };

        let raw = self.handler.read(&id)?;
        let data = self.reader.read(&raw)?;
        debug!("session {} started with {} attributes", id, data.len());

        *self.data.write() = data;
        self.started.store(true, Ordering::Release);
        Ok(())
    }

    /// Writes the session data back to the backend.
    pub fn save(&self) -> Result<()> {
        let id = self.id().ok_or_else(|| {
            Error::SessionMisconfigured("cannot save a session without an id".into())
        })?;
        let raw = self.reader.encode(&self.data.read())?;
        trace!("saving {} bytes for session {}", raw.len(), id);
        self.handler.write(&id, &raw)
    }

    /// Drops all data and removes the session from the backend.
    pub fn invalidate(&self) -> Result<()> {
        self.data.write().clear();
        match self.id() {
            Some(id) => self.handler.destroy(&id),
            None => Ok(()),
        }
    }

    /// The value of attribute `name`.
    pub fn get(&self, name: &str) -> Option<SessionValue> {
        self.data.read().get(name).cloned()
    }

    /// Returns true if attribute `name` is set.
    pub fn has(&self, name: &str) -> bool {
        self.data.read().contains_key(name)
    }

    /// Every attribute.
    pub fn all(&self) -> SessionData {
        self.data.read().clone()
    }

    /// Sets attribute `name`.
    pub fn set(&self, name: impl Into<String>, value: impl Into<SessionValue>) {
        self.data.write().insert(name.into(), value.into());
    }

    /// Removes attribute `name`, returning its value.
    pub fn remove(&self, name: &str) -> Option<SessionValue> {
        self.data.write().remove(name)
    }
}
