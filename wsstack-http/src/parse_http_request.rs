use bytes::Bytes;
use http::StatusCode;
use log::{debug, trace, warn};
use std::sync::Arc;

use wsstack::{
    ConnectionRef, Error, RequestAwareMiddleware, Result, ServerMiddleware, REQUEST_ATTRIBUTE,
};

use crate::close::close_with_response;
use crate::request_parser::{BufferedRequestParser, ParsedRequest, RequestParser};

/// Attribute key holding the connection's [`UpgradeState`].
pub const STATE_ATTRIBUTE: &str = "http.state";

/// Where a connection stands in the HTTP upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeState {
    /// Still buffering the request header block.
    AwaitingHeaders,
    /// The request was parsed; everything now flows to the next layer unchanged.
    HeadersReceived,
}

/// First layer of a stack: turns the raw upgrade bytes into a [`wsstack::Request`]
/// and opens the next layer with it, exactly once per connection.
///
/// Until the request is complete nothing reaches the next layer. Afterwards
/// every chunk is passed through untouched, since it is WebSocket payload.
/// Bytes that arrived in the same chunk as the end of the header block are
/// delivered as a message right after the next layer opened.
pub struct ParseHttpRequest<M, P = BufferedRequestParser> {
    middleware: M,
    parser: P,
}

impl<M: RequestAwareMiddleware> ParseHttpRequest<M> {
    /// Wraps `middleware` using the default [`BufferedRequestParser`].
    pub fn new(middleware: M) -> Self {
        Self::with_parser(middleware, BufferedRequestParser::default())
    }
}

impl<M, P> ParseHttpRequest<M, P>
where
    M: RequestAwareMiddleware,
    P: RequestParser,
{
    /// Wraps `middleware` using a custom request parser.
    pub fn with_parser(middleware: M, parser: P) -> Self {
        Self { middleware, parser }
    }

    /// The next layer.
    pub fn middleware(&self) -> &M {
        &self.middleware
    }

    fn headers_received(conn: &ConnectionRef) -> bool {
        let state = conn.attributes().get::<UpgradeState>(STATE_ATTRIBUTE);
        state == Some(UpgradeState::HeadersReceived)
    }
}

impl<M, P> ServerMiddleware for ParseHttpRequest<M, P>
where
    M: RequestAwareMiddleware,
    P: RequestParser,
{
    fn on_open(&self, conn: &ConnectionRef) -> Result<()> {
        conn.attributes().set(STATE_ATTRIBUTE, UpgradeState::AwaitingHeaders);
        Ok(())
    }

    fn on_message(&self, conn: &ConnectionRef, data: Bytes) -> Result<()> {
        if Self::headers_received(conn) {
            return self.middleware.on_message(conn, data);
        }

        let (request, trailing) = match self.parser.parse(conn, &data) {
            Ok(Some(ParsedRequest { request, trailing })) => (Arc::new(request), trailing),
            Ok(None) => {
                trace!("connection {} awaiting more header bytes", conn.id());
                return Ok(());
            }
            Err(Error::HeaderTooLarge { limit }) => {
                warn!(
                    "connection {} sent a header block over {} bytes",
                    conn.id(),
                    limit
                );
                return close_with_response(conn, StatusCode::PAYLOAD_TOO_LARGE);
            }
            Err(err) => {
                close_with_response(conn, err.http_status())?;
                return Err(err);
            }
        };

        debug!(
            "connection {} upgrade request {} {}",
            conn.id(),
            request.method(),
            request.uri()
        );

        conn.attributes().set(REQUEST_ATTRIBUTE, request.clone());
        conn.attributes().set(STATE_ATTRIBUTE, UpgradeState::HeadersReceived);

        self.middleware.on_request(conn, &request)?;
        if trailing.is_empty() {
            Ok(())
        } else {
            self.middleware.on_message(conn, trailing)
        }
    }

    fn on_close(&self, conn: &ConnectionRef) -> Result<()> {
        if Self::headers_received(conn) {
            self.middleware.on_close(conn)
        } else {
            Ok(())
        }
    }

    fn on_error(&self, conn: &ConnectionRef, err: Error) -> Result<()> {
        if Self::headers_received(conn) {
            self.middleware.on_error(conn, err)
        } else {
            debug!("connection {} failed before upgrade: {}", conn.id(), err);
            close_with_response(conn, StatusCode::INTERNAL_SERVER_ERROR)
        }
    }

    fn sub_protocols(&self) -> Vec<String> {
        self.middleware.sub_protocols()
    }
}
