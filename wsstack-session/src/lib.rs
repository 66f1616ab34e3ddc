//! # wsstack-session - Session Layer
//!
//! Attaches the HTTP session of the upgrade request to a WebSocket connection.
//! [`InitializeSession`] reads the session cookie from the request stored by
//! the HTTP layer, binds a [`Session`] to it and stores the session in the
//! connection's attribute store for every later layer.
//!
//! Session blobs are owned by a [`SessionHandler`] backend and decoded by a
//! [`Reader`]:
//!
//! - [`LegacyReader`]: one `name|value` entry per attribute
//! - [`SerializedReader`]: one array keyed by attribute name
//!
//! ```rust
//! use std::sync::Arc;
//! use wsstack_session::{
//!     LegacyReader, MemorySessionHandler, ReadOnlySessionHandler, Reader, SessionFactory,
//!     SessionOptions, SessionValue,
//! };
//!
//! let mut options = SessionOptions::default();
//! options.name("PHPSESSID").auto_start(true);
//!
//! let handler = ReadOnlySessionHandler::new(MemorySessionHandler::new());
//! let factory = SessionFactory::new(Arc::new(handler), Arc::new(LegacyReader), options);
//!
//! let data = LegacyReader.read(b"user|s:5:\"alice\";").unwrap();
//! assert_eq!(data["user"], SessionValue::from("alice"));
//! # let _ = factory;
//! ```
#![warn(rust_2018_idioms)]
#![warn(missing_docs)]

mod handler;
mod initialize_session;
mod reader;
mod session;
mod value;

pub use handler::{MemorySessionHandler, ReadOnlySessionHandler, SessionHandler};
pub use initialize_session::{find_cookie, InitializeSession, SESSION_ATTRIBUTE};
pub use reader::legacy::LegacyReader;
pub use reader::serialized::SerializedReader;
pub use reader::{Reader, MAX_DEPTH};
pub use session::{Session, SessionFactory, SessionOptions};
pub use value::{ArrayKey, SessionData, SessionValue};
