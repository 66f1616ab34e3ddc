use bytes::Bytes;
use http::header::COOKIE;
use http::StatusCode;
use log::{debug, warn};
use std::sync::Arc;

use wsstack::{
    ConnectionRef, Error, Request, RequestAwareMiddleware, Result, ServerMiddleware,
    REQUEST_ATTRIBUTE,
};
use wsstack_http::close_with_response;

use crate::session::SessionFactory;

/// Attribute key holding the connection's `Arc<Session>`.
pub const SESSION_ATTRIBUTE: &str = "session";

/// Attaches a [`Session`](crate::Session) to every connection, identified by the session
/// cookie of the upgrade request.
///
/// Sits after the HTTP layer, which must already have stored the request under
/// [`REQUEST_ATTRIBUTE`]. Layers after this one read the session from
/// [`SESSION_ATTRIBUTE`].
pub struct InitializeSession<M> {
    middleware: M,
    factory: SessionFactory,
}

impl<M: ServerMiddleware> InitializeSession<M> {
    /// Wraps `middleware`, creating sessions with `factory`.
    pub fn new(middleware: M, factory: SessionFactory) -> Self {
        Self {
            middleware,
            factory,
        }
    }

    /// The next layer.
    pub fn middleware(&self) -> &M {
        &self.middleware
    }

    /// The factory sessions are created with.
    pub fn factory(&self) -> &SessionFactory {
        &self.factory
    }

    fn session_id(&self, request: &Request) -> Result<Option<String>> {
        let name = &self.factory.options().name;
        for header in request.headers().get_all(COOKIE) {
            let value = header.to_str().map_err(|_| Error::InvalidRequestHeader {
                name: COOKIE.as_str().to_string(),
                value: String::from_utf8_lossy(header.as_bytes()).into_owned(),
            })?;
            if let Some(id) = find_cookie(value, name)? {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }
}

/// Looks up cookie `name` in one `Cookie` header value.
///
/// The whole value is validated before the lookup, so a malformed token fails
/// even when it follows the match.
pub fn find_cookie(header: &str, name: &str) -> Result<Option<String>> {
    let mut found = None;
    for token in header.split([';', '\0']) {
        if token.trim().is_empty() {
            continue;
        }
        let (key, value) = token.split_once('=').ok_or_else(|| Error::InvalidRequestHeader {
            name: COOKIE.as_str().to_string(),
            value: header.to_string(),
        })?;
        if found.is_none() && key.trim_start() == name {
            let value = urlencoding::decode(value).map_err(|_| Error::InvalidRequestHeader {
                name: COOKIE.as_str().to_string(),
                value: header.to_string(),
            })?;
            found = Some(value.into_owned());
        }
    }
    Ok(found)
}

impl<M: ServerMiddleware> ServerMiddleware for InitializeSession<M> {
    fn on_open(&self, conn: &ConnectionRef) -> Result<()> {
        let request = match conn.attributes().get::<Arc<Request>>(REQUEST_ATTRIBUTE) {
            Some(request) => request,
            None => {
                close_with_response(conn, StatusCode::INTERNAL_SERVER_ERROR)?;
                return Err(Error::MissingRequest(format!(
                    "no request found under \"{REQUEST_ATTRIBUTE}\"; InitializeSession must come after ParseHttpRequest"
                )));
            }
        };

        let session = self.factory.create_session();
        let id = match self.session_id(&request) {
            Ok(Some(id)) => {
                debug!("connection {} resumes session {}", conn.id(), id);
                id
            }
            Ok(None) => self.factory.handler().generate_id(),
            Err(err) => {
                warn!("connection {} sent a malformed cookie: {}", conn.id(), err);
                close_with_response(conn, StatusCode::BAD_REQUEST)?;
                return Err(err);
            }
        };
        session.set_id(id)?;

        if self.factory.options().auto_start {
            if let Err(err) = session.start() {
                warn!("connection {} could not start its session: {}", conn.id(), err);
                close_with_response(conn, StatusCode::INTERNAL_SERVER_ERROR)?;
                return Err(err);
            }
        }

        conn.attributes().set(SESSION_ATTRIBUTE, Arc::new(session));
        self.middleware.on_open(conn)
    }

    fn on_message(&self, conn: &ConnectionRef, data: Bytes) -> Result<()> {
        self.middleware.on_message(conn, data)
    }

    fn on_close(&self, conn: &ConnectionRef) -> Result<()> {
        self.middleware.on_close(conn)
    }

    fn on_error(&self, conn: &ConnectionRef, err: Error) -> Result<()> {
        self.middleware.on_error(conn, err)
    }

    fn sub_protocols(&self) -> Vec<String> {
        self.middleware.sub_protocols()
    }
}

impl<M: ServerMiddleware> RequestAwareMiddleware for InitializeSession<M> {}
