//! # Middleware Contracts
//!
//! A middleware is one layer of a server stack. Every layer implements the same
//! four lifecycle events and holds the next layer, so independent concerns
//! (HTTP parsing, session loading, WAMP framing) observe and transform the same
//! connection lifecycle:
//!
//! ```text
//!   transport ──▶ ParseHttpRequest ──▶ InitializeSession ──▶ ParseWampMessage ──▶ application
//!                  (raw bytes)          (request aware)       (WebSocket text)     (WAMP calls)
//! ```
//!
//! ## Events
//!
//! - **`on_open`**: connection accepted; the layer may attach attributes, reject
//!   the connection by closing it, or forward to the next layer
//! - **`on_message`**: one inbound unit of data; layers in front of protocol
//!   framing may see partial chunks
//! - **`on_close`**: disconnect; a layer only forwards it when it forwarded the open
//! - **`on_error`**: failure bubbled up from a later layer or from the transport
//!
//! ## Richer contracts
//!
//! Some layers hand more than the bare connection to the next layer. Those
//! hand-offs are separate, narrower traits the next layer opts into, such as
//! [`RequestAwareMiddleware`] for layers that sit after HTTP parsing.
//!
//! ## Example
//!
//! ```rust
//! use bytes::Bytes;
//! use wsstack::{ConnectionRef, Error, Result, ServerMiddleware};
//!
//! /// Closes every connection which sends an empty message.
//! struct RejectEmpty<M> {
//!     next: M,
//! }
//!
//! impl<M: ServerMiddleware> ServerMiddleware for RejectEmpty<M> {
//!     fn on_open(&self, conn: &ConnectionRef) -> Result<()> {
//!         self.next.on_open(conn)
//!     }
//!
//!     fn on_message(&self, conn: &ConnectionRef, data: Bytes) -> Result<()> {
//!         if data.is_empty() {
//!             return conn.close();
//!         }
//!         self.next.on_message(conn, data)
//!     }
//!
//!     fn on_close(&self, conn: &ConnectionRef) -> Result<()> {
//!         self.next.on_close(conn)
//!     }
//!
//!     fn on_error(&self, conn: &ConnectionRef, err: Error) -> Result<()> {
//!         self.next.on_error(conn, err)
//!     }
//! }
//! ```

use bytes::Bytes;
use std::sync::Arc;

use crate::connection::ConnectionRef;
use crate::error::{Error, Result};

/// Structured HTTP upgrade request handed from the HTTP layer to the layers after it.
pub type Request = http::Request<()>;

/// Attribute key under which the parsed [`Request`] is stored (as `Arc<Request>`).
pub const REQUEST_ATTRIBUTE: &str = "http.request";

/// One layer of a server stack.
///
/// Layers are shared by every connection of a server, so all methods take
/// `&self`; per-connection state belongs in the connection's attribute store
/// or in a side table keyed by the connection id.
pub trait ServerMiddleware: Send + Sync {
    /// Called when a connection is accepted.
    fn on_open(&self, conn: &ConnectionRef) -> Result<()>;

    /// Called with each inbound unit of data.
    fn on_message(&self, conn: &ConnectionRef, data: Bytes) -> Result<()>;

    /// Called when the connection closes.
    ///
    /// Must only be forwarded when this layer forwarded `on_open` for the same
    /// connection.
    fn on_close(&self, conn: &ConnectionRef) -> Result<()>;

    /// Called with a failure which nothing earlier in the stack recovered from.
    fn on_error(&self, conn: &ConnectionRef, err: Error) -> Result<()>;

    /// WebSocket sub-protocols this layer and the layers after it speak.
    fn sub_protocols(&self) -> Vec<String> {
        Vec::new()
    }
}

/// A layer which can be opened with the HTTP upgrade request that created the connection.
///
/// The HTTP layer stores the request under [`REQUEST_ATTRIBUTE`] before calling
/// [`RequestAwareMiddleware::on_request`], so the default implementation simply
/// delegates to [`ServerMiddleware::on_open`] and lets the layer read it from there.
pub trait RequestAwareMiddleware: ServerMiddleware {
    /// Called once the upgrade request has been fully parsed.
    fn on_request(&self, conn: &ConnectionRef, _request: &Request) -> Result<()> {
        self.on_open(conn)
    }
}

impl<M> ServerMiddleware for Arc<M>
where
    M: ServerMiddleware + ?Sized,
{
    fn on_open(&self, conn: &ConnectionRef) -> Result<()> {
        (**self).on_open(conn)
    }

    fn on_message(&self, conn: &ConnectionRef, data: Bytes) -> Result<()> {
        (**self).on_message(conn, data)
    }

    fn on_close(&self, conn: &ConnectionRef) -> Result<()> {
        (**self).on_close(conn)
    }

    fn on_error(&self, conn: &ConnectionRef, err: Error) -> Result<()> {
        (**self).on_error(conn, err)
    }

    fn sub_protocols(&self) -> Vec<String> {
        (**self).sub_protocols()
    }
}

impl<M> RequestAwareMiddleware for Arc<M>
where
    M: RequestAwareMiddleware + ?Sized,
{
    fn on_request(&self, conn: &ConnectionRef, request: &Request) -> Result<()> {
        (**self).on_request(conn, request)
    }
}

impl<M> ServerMiddleware for Box<M>
where
    M: ServerMiddleware + ?Sized,
{
    fn on_open(&self, conn: &ConnectionRef) -> Result<()> {
        (**self).on_open(conn)
    }

    fn on_message(&self, conn: &ConnectionRef, data: Bytes) -> Result<()> {
        (**self).on_message(conn, data)
    }

    fn on_close(&self, conn: &ConnectionRef) -> Result<()> {
        (**self).on_close(conn)
    }

    fn on_error(&self, conn: &ConnectionRef, err: Error) -> Result<()> {
        (**self).on_error(conn, err)
    }

    fn sub_protocols(&self) -> Vec<String> {
        (**self).sub_protocols()
    }
}

impl<M> RequestAwareMiddleware for Box<M>
where
    M: RequestAwareMiddleware + ?Sized,
{
    fn on_request(&self, conn: &ConnectionRef, request: &Request) -> Result<()> {
        (**self).on_request(conn, request)
    }
}
