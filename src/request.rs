//! Host request object and buffered output stage
//!
//! Owns everything the content phase needs for one request: the inbound
//! body, the outbound header record, the allocation pool, the resolved
//! routing scope, and the output stage handlers submit headers and buffer
//! chains to. All of it is dropped together when the request ends.

use crate::buf::{Chain, ChainError};
use crate::pool::Pool;
use crate::routing::Location;
use http_body_util::BodyExt;
use hyper::body::{Bytes, Incoming};
use hyper::{HeaderMap, Method, StatusCode, Uri, Version};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

/// Request line and connection facts, fixed at accept time.
#[derive(Debug)]
pub struct Head {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
    pub peer_addr: SocketAddr,
}

/// Inbound body state. Content handlers must discard it before producing a
/// response; the host does not drain it for them.
pub enum InBody {
    /// Still on the wire.
    Stream(Incoming),
    /// Fully buffered (used by tests).
    #[allow(dead_code)]
    Full(Bytes),
    Drained,
}

/// Outbound header record. Mutable until committed by
/// [`Request::send_headers`]; the committed snapshot is what the client
/// sees, later mutation has no effect.
#[derive(Debug, Clone)]
pub struct HeadersOut {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
}

impl Default for HeadersOut {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            content_type: None,
            content_length: None,
        }
    }
}

/// Buffered output stage for one response.
///
/// Accepts one header commit and any number of chain writes until the
/// terminal buffer arrives; the connection layer consumes the result after
/// the pipeline returns.
#[derive(Debug, Default)]
pub struct Output {
    committed: Option<HeadersOut>,
    chain: Chain,
    finished: bool,
    closed: bool,
}

/// Submission failures reported by the output stage.
#[derive(Debug, PartialEq, Eq)]
pub enum OutputError {
    HeadersAlreadySent,
    HeadersNotSent,
    WriteAfterLast,
    InvalidChain(ChainError),
    ConnectionClosed,
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HeadersAlreadySent => write!(f, "headers already sent"),
            Self::HeadersNotSent => write!(f, "body submitted before headers"),
            Self::WriteAfterLast => write!(f, "write after terminal buffer"),
            Self::InvalidChain(e) => write!(f, "invalid buffer chain: {e}"),
            Self::ConnectionClosed => write!(f, "connection closed"),
        }
    }
}

impl std::error::Error for OutputError {}

/// One in-flight request, exclusively owned by the task serving it.
pub struct Request {
    head: Head,
    body: InBody,
    pub headers_out: HeadersOut,
    pub pool: Pool,
    location: Arc<Location>,
    output: Output,
}

impl Request {
    pub fn new(head: Head, body: InBody, location: Arc<Location>, pool_budget: usize) -> Self {
        Self {
            head,
            body,
            headers_out: HeadersOut::default(),
            pool: Pool::new(pool_budget),
            location,
            output: Output::default(),
        }
    }

    pub fn from_hyper(
        req: hyper::Request<Incoming>,
        peer_addr: SocketAddr,
        location: Arc<Location>,
        pool_budget: usize,
    ) -> Self {
        let (parts, body) = req.into_parts();
        let head = Head {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            peer_addr,
        };
        Self::new(head, InBody::Stream(body), location, pool_budget)
    }

    pub fn method(&self) -> &Method {
        &self.head.method
    }

    pub fn path(&self) -> &str {
        self.head.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.head.uri.query()
    }

    pub const fn version(&self) -> Version {
        self.head.version
    }

    pub const fn headers_in(&self) -> &HeaderMap {
        &self.head.headers
    }

    pub const fn peer_addr(&self) -> SocketAddr {
        self.head.peer_addr
    }

    #[allow(dead_code)]
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// HEAD-style requests expect the committed headers and no body.
    pub fn header_only(&self) -> bool {
        self.head.method == Method::HEAD
    }

    /// Drain and throw away any pending inbound payload.
    ///
    /// Idempotent. A read failure maps to a Bad Request status that the
    /// caller propagates as the request's outcome.
    pub async fn discard_request_body(&mut self) -> Result<(), StatusCode> {
        match std::mem::replace(&mut self.body, InBody::Drained) {
            InBody::Stream(mut body) => {
                while let Some(frame) = body.frame().await {
                    if frame.is_err() {
                        return Err(StatusCode::BAD_REQUEST);
                    }
                }
                Ok(())
            }
            InBody::Full(_) | InBody::Drained => Ok(()),
        }
    }

    pub const fn body_pending(&self) -> bool {
        !matches!(self.body, InBody::Drained)
    }

    /// Commit the current `headers_out` record. Irreversible: the committed
    /// snapshot is immutable and a second commit is an error.
    pub fn send_headers(&mut self) -> Result<(), OutputError> {
        if self.output.closed {
            return Err(OutputError::ConnectionClosed);
        }
        if self.output.committed.is_some() {
            return Err(OutputError::HeadersAlreadySent);
        }
        self.output.committed = Some(self.headers_out.clone());
        Ok(())
    }

    pub const fn headers_sent(&self) -> bool {
        self.output.committed.is_some()
    }

    pub const fn committed_headers(&self) -> Option<&HeadersOut> {
        self.output.committed.as_ref()
    }

    /// Stream a buffer chain to the client.
    ///
    /// May be called several times for one response; the call carrying the
    /// terminal buffer must be the final one. The chain's terminal-flag
    /// invariant is checked before anything is accepted.
    pub fn output_write(&mut self, chain: Chain) -> Result<(), OutputError> {
        if self.output.closed {
            return Err(OutputError::ConnectionClosed);
        }
        if self.output.committed.is_none() {
            return Err(OutputError::HeadersNotSent);
        }
        if self.output.finished {
            return Err(OutputError::WriteAfterLast);
        }
        if chain.is_empty() {
            return Ok(());
        }
        chain.validate().map_err(OutputError::InvalidChain)?;
        let terminated = chain.is_terminated();
        self.output.chain.append(chain);
        if terminated {
            self.output.finished = true;
        }
        Ok(())
    }

    /// Whether the terminal buffer has been submitted.
    pub const fn response_complete(&self) -> bool {
        self.output.finished
    }

    pub const fn output_chain(&self) -> &Chain {
        &self.output.chain
    }

    /// Record that the client connection is gone; every later submission
    /// fails with `ConnectionClosed`.
    #[allow(dead_code)]
    pub fn mark_closed(&mut self) {
        self.output.closed = true;
    }

    /// Tear the request apart for response assembly.
    pub fn into_output(self) -> (Option<HeadersOut>, Chain) {
        (self.output.committed, self.output.chain)
    }

    #[cfg(test)]
    pub fn test_request(method: Method) -> Self {
        Self::test_request_with_body(method, Bytes::new(), 4096)
    }

    #[cfg(test)]
    pub fn test_request_with_body(method: Method, body: Bytes, pool_budget: usize) -> Self {
        let head = Head {
            method,
            uri: Uri::from_static("/book"),
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            peer_addr: SocketAddr::from(([127, 0, 0, 1], 4000)),
        };
        Self::new(
            head,
            InBody::Full(body),
            Arc::new(Location::server_default()),
            pool_budget,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buf::Buf;

    fn chain_of(parts: &[(&[u8], bool)]) -> Chain {
        let mut chain = Chain::new();
        for (bytes, last) in parts {
            let mut buf = Buf::from_vec(bytes.to_vec());
            buf.last = *last;
            chain.push(buf);
        }
        chain
    }

    #[tokio::test]
    async fn test_discard_is_idempotent() {
        let mut r = Request::test_request_with_body(Method::POST, Bytes::from_static(b"body"), 4096);
        assert!(r.body_pending());
        assert_eq!(r.discard_request_body().await, Ok(()));
        assert!(!r.body_pending());
        assert_eq!(r.discard_request_body().await, Ok(()));
    }

    #[test]
    fn test_send_headers_commits_snapshot() {
        let mut r = Request::test_request(Method::GET);
        r.headers_out.status = StatusCode::OK;
        r.headers_out.content_type = Some("text/plain".to_string());
        r.send_headers().unwrap();

        // Later mutation must not leak into the committed record.
        r.headers_out.content_type = Some("text/html".to_string());
        let committed = r.committed_headers().unwrap();
        assert_eq!(committed.content_type.as_deref(), Some("text/plain"));
    }

    #[test]
    fn test_send_headers_twice_fails() {
        let mut r = Request::test_request(Method::GET);
        r.send_headers().unwrap();
        assert_eq!(r.send_headers(), Err(OutputError::HeadersAlreadySent));
    }

    #[test]
    fn test_write_before_headers_fails() {
        let mut r = Request::test_request(Method::GET);
        let err = r.output_write(chain_of(&[(b"x", true)])).unwrap_err();
        assert_eq!(err, OutputError::HeadersNotSent);
    }

    #[test]
    fn test_write_after_terminal_fails() {
        let mut r = Request::test_request(Method::GET);
        r.send_headers().unwrap();
        r.output_write(chain_of(&[(b"x", true)])).unwrap();
        assert!(r.response_complete());

        let err = r.output_write(chain_of(&[(b"y", true)])).unwrap_err();
        assert_eq!(err, OutputError::WriteAfterLast);
    }

    #[test]
    fn test_incremental_writes_until_terminal() {
        let mut r = Request::test_request(Method::GET);
        r.send_headers().unwrap();
        r.output_write(chain_of(&[(b"one", false)])).unwrap();
        assert!(!r.response_complete());
        r.output_write(chain_of(&[(b"two", true)])).unwrap();
        assert!(r.response_complete());
        assert_eq!(r.output_chain().total_len(), 6);
    }

    #[test]
    fn test_invalid_chain_rejected() {
        let mut r = Request::test_request(Method::GET);
        r.send_headers().unwrap();
        let err = r
            .output_write(chain_of(&[(b"a", true), (b"b", false)]))
            .unwrap_err();
        assert_eq!(
            err,
            OutputError::InvalidChain(ChainError::LastNotAtTail)
        );
        // Nothing from the rejected chain is kept.
        assert!(r.output_chain().is_empty());
    }

    #[test]
    fn test_closed_connection_rejects_submissions() {
        let mut r = Request::test_request(Method::GET);
        r.mark_closed();
        assert_eq!(r.send_headers(), Err(OutputError::ConnectionClosed));
        assert_eq!(
            r.output_write(Chain::new()),
            Err(OutputError::ConnectionClosed)
        );
    }
}
