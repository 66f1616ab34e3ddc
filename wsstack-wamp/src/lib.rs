//! # wsstack-wamp - WAMP v1 Layer
//!
//! The protocol engine of a `wsstack` server. [`ParseWampMessage`] sits after
//! the HTTP and session layers, greets every connection with a WELCOME frame
//! and turns each inbound WebSocket message into a call on the application's
//! [`WampServerMiddleware`]:
//!
//! ```text
//!   ParseHttpRequest ──▶ InitializeSession ──▶ ParseWampMessage ──▶ WampServerMiddleware
//!                                                   │
//!                                                   ├── TopicRegistry  (shared)
//!                                                   └── ServerIdentity (shared)
//! ```
//!
//! Frames are JSON arrays whose first element is a [`MessageType`] code:
//!
//! ```text
//!   server → client   [0, sessionId, 1, serverIdentity]        WELCOME
//!   client → server   [5, "https://example.com/topic"]         SUBSCRIBE
//!   client → server   [7, "https://example.com/topic", "hi", true]
//!                                                              PUBLISH, excluding self
//! ```
//!
//! Topics are shared by every connection through one [`TopicRegistry`], which
//! guarantees a single [`Topic`] per resolved URI. The [`ServerIdentity`] is a
//! shared handle too, so the identity can be changed while the server runs.
//!
//! Malformed frames fail with [`wsstack::Error::InvalidMessage`]; frames of a
//! type a client may not send fail with
//! [`wsstack::Error::UnsupportedMessageType`]. Neither reaches the application
//! as a call.
#![warn(rust_2018_idioms)]
#![warn(missing_docs)]

mod connection;
mod identity;
mod message_type;
mod middleware;
mod parse_wamp_message;
mod topic;
mod topic_registry;

pub use connection::{WampConnection, PROTOCOL_VERSION};
pub use identity::{ServerIdentity, DEFAULT_SERVER_IDENTITY};
pub use message_type::MessageType;
pub use middleware::WampServerMiddleware;
pub use parse_wamp_message::{ParseWampMessage, SESSION_ID_ATTRIBUTE, SUB_PROTOCOL};
pub use serde_json;
pub use topic::Topic;
pub use topic_registry::TopicRegistry;
