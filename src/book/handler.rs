//! Content handler for the book module
//!
//! Serves every GET request a two-segment plain-text body through the
//! buffered output pipeline. Anything else is refused with 405.

use crate::buf::{Buf, Chain};
use crate::logger;
use crate::pipeline::{HandlerFuture, Outcome};
use crate::request::{OutputError, Request};
use hyper::{Method, StatusCode};

const SEGMENT_A: &[u8] = b"hello world";
const SEGMENT_B: &[u8] = b"abcdefg";

const CONTENT_TYPE: &str = "text/plain";

/// Content-phase entry point, registered during postconfiguration.
pub fn book_handler(r: &mut Request) -> HandlerFuture<'_> {
    Box::pin(handle(r))
}

async fn handle(r: &mut Request) -> Outcome {
    if r.method() != Method::GET {
        logger::log_handler_error(
            StatusCode::METHOD_NOT_ALLOWED,
            &format!("book: method {} is not allowed", r.method()),
        );
        return Outcome::Fail(StatusCode::METHOD_NOT_ALLOWED);
    }

    // The host does not drain inbound payloads for content handlers.
    if let Err(status) = r.discard_request_body().await {
        logger::log_handler_error(status, "book: failed to discard request body");
        return Outcome::Fail(status);
    }

    // Every buffer is allocated before the headers are committed; a pool
    // failure here leaves the response entirely unsent.
    let Some(chain) = build_body(r) else {
        logger::log_handler_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!(
                "book: request pool exhausted while building response body ({} bytes left)",
                r.pool.remaining()
            ),
        );
        return Outcome::Fail(StatusCode::INTERNAL_SERVER_ERROR);
    };

    r.headers_out.status = StatusCode::OK;
    r.headers_out.content_type = Some(CONTENT_TYPE.to_string());
    r.headers_out.content_length = Some(chain.total_len() as u64);

    if let Err(err) = r.send_headers() {
        logger::log_handler_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("book: failed to send headers: {err}"),
        );
        return submit_failure(&err);
    }

    if r.header_only() {
        return Outcome::Ok;
    }

    match r.output_write(chain) {
        Ok(()) => Outcome::Ok,
        Err(err) => {
            logger::log_handler_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("book: failed to write response body: {err}"),
            );
            submit_failure(&err)
        }
    }
}

/// Build the response chain: one buffer per segment, terminal flag on the
/// final segment's buffer only.
fn build_body(r: &mut Request) -> Option<Chain> {
    let segments: [&[u8]; 2] = [SEGMENT_A, SEGMENT_B];
    let last_index = segments.len() - 1;

    let mut chain = Chain::new();
    for (i, segment) in segments.into_iter().enumerate() {
        let mut buf = Buf::copy_from(&mut r.pool, segment)?;
        buf.last = i == last_index;
        chain.push(buf);
    }
    Some(chain)
}

fn submit_failure(err: &OutputError) -> Outcome {
    match err {
        OutputError::ConnectionClosed => Outcome::Abort,
        _ => Outcome::Fail(StatusCode::INTERNAL_SERVER_ERROR),
    }
}
