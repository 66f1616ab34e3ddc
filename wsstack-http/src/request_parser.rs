//! Turning raw upgrade bytes into a structured [`Request`].

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{Method, Uri, Version};
use log::debug;
use parking_lot::Mutex;
use serde::Deserialize;

use wsstack::{ConnectionRef, Error, Request, Result};

/// Attribute key holding the bytes buffered so far by [`BufferedRequestParser`].
pub const BUFFER_ATTRIBUTE: &str = "http.buffer";

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// A complete upgrade request and whatever the peer sent right after it.
#[derive(Debug)]
pub struct ParsedRequest {
    /// The parsed request.
    pub request: Request,
    /// Bytes that followed the header block in the same chunk. They belong to
    /// the upgraded protocol.
    pub trailing: Bytes,
}

/// Parses the HTTP upgrade request of a connection.
///
/// `parse` is called with every chunk received before the request is complete.
/// It returns `Ok(None)` while more bytes are needed, the request once the
/// header block is complete, and [`Error::HeaderTooLarge`] when the header
/// block grows beyond what the parser accepts.
pub trait RequestParser: Send + Sync {
    /// Feeds one chunk of raw bytes received on `conn`.
    fn parse(&self, conn: &ConnectionRef, data: &[u8]) -> Result<Option<ParsedRequest>>;
}

/// Options for [`BufferedRequestParser`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    /// Largest accepted header block, terminator included.
    pub max_header_size: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            max_header_size: 4096,
        }
    }
}

impl ParserOptions {
    /// Sets the largest accepted header block.
    pub fn max_header_size(&mut self, max_header_size: usize) -> &mut Self {
        self.max_header_size = max_header_size;
        self
    }
}

/// Default [`RequestParser`]: buffers chunks in the connection's attribute
/// store until the blank line ending the header block arrives.
#[derive(Debug, Clone, Default)]
pub struct BufferedRequestParser {
    options: ParserOptions,
}

impl BufferedRequestParser {
    /// Creates a parser with the given options.
    pub fn new(options: ParserOptions) -> Self {
        Self { options }
    }

    /// The options this parser enforces.
    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    fn buffer(&self, conn: &ConnectionRef, data: &[u8]) -> Result<Option<(Vec<u8>, Bytes)>> {
        let attributes = conn.attributes();
        if !attributes.has(BUFFER_ATTRIBUTE) {
            attributes.set(BUFFER_ATTRIBUTE, Mutex::new(Vec::<u8>::new()));
        }

        let limit = self.options.max_header_size;
        let header = attributes
            .with(BUFFER_ATTRIBUTE, |buffer: &Mutex<Vec<u8>>| {
                let mut buffer = buffer.lock();
                buffer.extend_from_slice(data);

                match find(&buffer, HEADER_TERMINATOR) {
                    Some(end) if end + HEADER_TERMINATOR.len() > limit => {
                        Err(Error::HeaderTooLarge { limit })
                    }
                    Some(end) => {
                        let trailing = buffer.split_off(end + HEADER_TERMINATOR.len());
                        if !trailing.is_empty() {
                            debug!("{} bytes followed the request header", trailing.len());
                        }
                        buffer.truncate(end);
                        Ok(Some((std::mem::take(&mut *buffer), Bytes::from(trailing))))
                    }
                    None if buffer.len() > limit => Err(Error::HeaderTooLarge { limit }),
                    None => Ok(None),
                }
            })
            .unwrap_or(Ok(None))?;

        if header.is_some() {
            let _ = attributes.remove(BUFFER_ATTRIBUTE);
        }
        Ok(header)
    }
}

impl RequestParser for BufferedRequestParser {
    fn parse(&self, conn: &ConnectionRef, data: &[u8]) -> Result<Option<ParsedRequest>> {
        match self.buffer(conn, data) {
            Ok(Some((header, trailing))) => {
                let request = parse_header_block(&header)?;
                Ok(Some(ParsedRequest { request, trailing }))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                // nothing more will be read from this connection
                let _ = conn.attributes().remove(BUFFER_ATTRIBUTE);
                Err(err)
            }
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn invalid(name: &str, value: &str) -> Error {
    Error::InvalidRequestHeader {
        name: name.to_string(),
        value: value.to_string(),
    }
}

/// Parses a header block without its terminating blank line.
fn parse_header_block(block: &[u8]) -> Result<Request> {
    let text = std::str::from_utf8(block)
        .map_err(|_| invalid("Request-Line", &String::from_utf8_lossy(block)))?;
    let mut lines = text.split("\r\n");

    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split(' ');
    let (method, target, version) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(target), Some(version), None) => (method, target, version),
        _ => return Err(invalid("Request-Line", request_line)),
    };

    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| invalid("Request-Line", request_line))?;
    let uri = target
        .parse::<Uri>()
        .map_err(|_| invalid("Request-Line", request_line))?;
    let version = match version {
        "HTTP/1.1" => Version::HTTP_11,
        "HTTP/1.0" => Version::HTTP_10,
        _ => return Err(invalid("Request-Line", request_line)),
    };

    let mut request = Request::new(());
    *request.method_mut() = method;
    *request.uri_mut() = uri;
    *request.version_mut() = version;

    for line in lines {
        let (name, value) = line.split_once(':').ok_or_else(|| invalid(line, ""))?;
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid(name, value))?;
        let header_value =
            HeaderValue::from_str(value.trim()).map_err(|_| invalid(name, value))?;
        request.headers_mut().append(header_name, header_value);
    }

    Ok(request)
}
