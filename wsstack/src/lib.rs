//! # wsstack - Composable WebSocket Server Middleware
//!
//! `wsstack` layers protocol handling on top of raw socket events. A server is a
//! chain of [`ServerMiddleware`]s, each one observing and enriching the same
//! connection lifecycle before handing it to the next layer.
//!
//! ## Core Concepts
//!
//! ### Connection
//!
//! A [`Connection`] is an opaque handle to one live peer, owned by the transport.
//! It can `send` bytes, be closed, and carries an [`AttributeStore`] where layers
//! leave derived state (parsed request, session, WAMP session id) for the layers
//! after them.
//!
//! ### Middleware
//!
//! A [`ServerMiddleware`] implements four lifecycle events: open, message, close
//! and error. Layers are decorators: each holds the next layer and decides per
//! event whether and how to forward it. Construction order is pipeline order.
//!
//! ### Server
//!
//! [`Server`] is what the transport talks to. It feeds socket events into the
//! outermost layer and routes any failure back through `on_error`.
//!
//! ## Event Flow
//!
//! ```text
//!   +---------------------------------------------------------------+
//!   |                        Application                            |
//!   +---------------------------------------------------------------+
//!                   /|\                              |
//!                    |  on_call / on_publish / ...   | send()
//!   +----------------+------------------------------\|/-------------+
//!   |                       WAMP layer                              |
//!   +---------------------------------------------------------------+
//!                   /|\                              |
//!   +----------------+------------------------------\|/-------------+
//!   |                      Session layer                            |
//!   +---------------------------------------------------------------+
//!                   /|\                              |
//!   +----------------+------------------------------\|/-------------+
//!   |                        HTTP layer                             |
//!   +---------------------------------------------------------------+
//!                   /|\                              |
//!                    | Server::handle_read()         | poll_transmit()
//!   +----------------+------------------------------\|/-------------+
//!   |                 Transport (sockets, TLS, framing)             |
//!   +---------------------------------------------------------------+
//! ```
#![warn(rust_2018_idioms)]
#![warn(missing_docs)]

pub(crate) mod attribute_store;
pub(crate) mod connection;
pub(crate) mod error;
pub(crate) mod middleware;
pub(crate) mod server;

pub use attribute_store::{Attribute, AttributeStore};
pub use connection::{Connection, ConnectionId, ConnectionRef, NotifyCallback, QueuedConnection};
pub use error::{Error, Result};
pub use middleware::{Request, RequestAwareMiddleware, ServerMiddleware, REQUEST_ATTRIBUTE};
pub use server::Server;

pub use bytes;
pub use http;
