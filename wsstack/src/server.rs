//! Transport-facing entry point of a middleware stack.

use bytes::Bytes;
use log::{debug, warn};

use crate::connection::ConnectionRef;
use crate::error::{Error, Result};
use crate::middleware::ServerMiddleware;

/// Drives a middleware stack from transport events.
///
/// The transport calls these methods as socket events occur. A failure returned
/// by the stack while opening, reading or closing is logged and handed back to
/// the same stack through `on_error`, so malformed input always reaches an
/// observability boundary instead of being dropped.
pub struct Server<M> {
    stack: M,
}

impl<M: ServerMiddleware> Server<M> {
    /// Wraps the outermost layer of a stack.
    pub fn new(stack: M) -> Self {
        Self { stack }
    }

    /// The outermost layer.
    pub fn stack(&self) -> &M {
        &self.stack
    }

    /// Sub-protocols the transport should offer during the WebSocket upgrade.
    pub fn sub_protocols(&self) -> Vec<String> {
        self.stack.sub_protocols()
    }

    /// The transport accepted `conn`.
    pub fn transport_active(&self, conn: &ConnectionRef) -> Result<()> {
        debug!("connection {} active", conn.id());
        let result = self.stack.on_open(conn);
        self.route(conn, result)
    }

    /// The transport read `data` from `conn`.
    pub fn handle_read(&self, conn: &ConnectionRef, data: Bytes) -> Result<()> {
        let result = self.stack.on_message(conn, data);
        self.route(conn, result)
    }

    /// The transport observed `conn` closing.
    pub fn transport_inactive(&self, conn: &ConnectionRef) -> Result<()> {
        debug!("connection {} inactive", conn.id());
        let result = self.stack.on_close(conn);
        self.route(conn, result)
    }

    /// The transport itself failed while serving `conn`.
    pub fn handle_error(&self, conn: &ConnectionRef, err: Error) -> Result<()> {
        warn!("transport error on connection {}: {}", conn.id(), err);
        self.stack.on_error(conn, err)
    }

    fn route(&self, conn: &ConnectionRef, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!("connection {} failed: {}", conn.id(), err);
                self.stack.on_error(conn, err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::QueuedConnection;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct Failing {
        errors: Mutex<Vec<Error>>,
    }

    impl ServerMiddleware for Failing {
        fn on_open(&self, _conn: &ConnectionRef) -> Result<()> {
            Ok(())
        }

        fn on_message(&self, _conn: &ConnectionRef, _data: Bytes) -> Result<()> {
            Err(Error::InvalidMessage("garbage".into()))
        }

        fn on_close(&self, _conn: &ConnectionRef) -> Result<()> {
            Ok(())
        }

        fn on_error(&self, _conn: &ConnectionRef, err: Error) -> Result<()> {
            self.errors.lock().push(err);
            Ok(())
        }

        fn sub_protocols(&self) -> Vec<String> {
            vec!["test".into()]
        }
    }

    #[test]
    fn routes_failures_to_on_error() {
        let server = Server::new(Failing::default());
        let conn: ConnectionRef = Arc::new(QueuedConnection::new());

        server.transport_active(&conn).unwrap();
        server.handle_read(&conn, Bytes::from_static(b"??")).unwrap();

        let errors = server.stack().errors.lock();
        assert_eq!(*errors, vec![Error::InvalidMessage("garbage".into())]);
    }

    #[test]
    fn exposes_sub_protocols() {
        let server = Server::new(Failing::default());
        assert_eq!(server.sub_protocols(), vec!["test".to_string()]);
    }
}
