//! # wsstack-http - HTTP Upgrade Layer
//!
//! The first layer of a `wsstack` server. It buffers the raw bytes of a new
//! connection until the HTTP upgrade request is complete, stores the parsed
//! request in the connection's attribute store, and opens the next layer with
//! it. From then on the bytes belong to the WebSocket protocol and pass through
//! unchanged.
//!
//! ```rust
//! use wsstack::{ConnectionRef, Error, RequestAwareMiddleware, Result, ServerMiddleware};
//! use wsstack::bytes::Bytes;
//! use wsstack_http::ParseHttpRequest;
//!
//! struct App;
//!
//! impl ServerMiddleware for App {
//!     fn on_open(&self, _conn: &ConnectionRef) -> Result<()> { Ok(()) }
//!     fn on_message(&self, _conn: &ConnectionRef, _data: Bytes) -> Result<()> { Ok(()) }
//!     fn on_close(&self, _conn: &ConnectionRef) -> Result<()> { Ok(()) }
//!     fn on_error(&self, _conn: &ConnectionRef, _err: Error) -> Result<()> { Ok(()) }
//! }
//!
//! impl RequestAwareMiddleware for App {}
//!
//! let stack = ParseHttpRequest::new(App);
//! ```
//!
//! Failures while the connection still speaks HTTP close it with a status line:
//!
//! | Failure | Status |
//! |---------|--------|
//! | header block over the configured size | 413 |
//! | malformed request line or header | 400 |
//! | anything raised before the upgrade completed | 500 |
#![warn(rust_2018_idioms)]
#![warn(missing_docs)]

mod close;
mod parse_http_request;
mod request_parser;

pub use close::{close_with_response, POWERED_BY};
pub use parse_http_request::{ParseHttpRequest, UpgradeState, STATE_ATTRIBUTE};
pub use request_parser::{
    BufferedRequestParser, ParsedRequest, ParserOptions, RequestParser, BUFFER_ATTRIBUTE,
};
