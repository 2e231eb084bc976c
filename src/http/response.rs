//! HTTP response building module
//!
//! Assembles the hyper response from a request's output stage and provides
//! the host's default error responses.

use crate::buf::{Buf, Chain};
use crate::http::body::ChainBody;
use crate::logger;
use crate::pipeline::Outcome;
use crate::request::Request;
use hyper::{Response, StatusCode};

/// Turn a finished request into the response the connection writes out.
pub fn assemble(outcome: Outcome, r: Request) -> Response<ChainBody> {
    match outcome {
        Outcome::Ok => from_output(r),
        // The pipeline resolves Declined before it gets here.
        Outcome::Declined => default_error_response(StatusCode::NOT_FOUND),
        Outcome::Fail(status) => {
            if r.headers_sent() {
                committed_after_failure(r)
            } else {
                default_error_response(status)
            }
        }
        Outcome::Abort => {
            let mut response = default_error_response(StatusCode::INTERNAL_SERVER_ERROR);
            response
                .headers_mut()
                .insert("Connection", hyper::header::HeaderValue::from_static("close"));
            response
        }
    }
}

/// Build the success response from the committed header record and the
/// accumulated chain.
fn from_output(r: Request) -> Response<ChainBody> {
    let header_only = r.header_only();
    let (committed, chain) = r.into_output();
    let Some(headers) = committed else {
        logger::log_error("content handler reported success without sending headers");
        return default_error_response(StatusCode::INTERNAL_SERVER_ERROR);
    };

    let body = if header_only {
        ChainBody::empty()
    } else {
        ChainBody::new(chain)
    };

    let mut builder = Response::builder().status(headers.status);
    if let Some(ref content_type) = headers.content_type {
        builder = builder.header("Content-Type", content_type);
    }
    if let Some(content_length) = headers.content_length {
        builder = builder.header("Content-Length", content_length);
    }
    builder.body(body).unwrap_or_else(|e| {
        log_build_error("200", &e);
        Response::new(ChainBody::empty())
    })
}

/// Headers were already committed when the handler failed, so the error
/// page can no longer be sent. What was submitted goes out and the
/// connection is closed behind it.
fn committed_after_failure(r: Request) -> Response<ChainBody> {
    let (committed, chain) = r.into_output();
    let Some(headers) = committed else {
        return default_error_response(StatusCode::INTERNAL_SERVER_ERROR);
    };

    let builder = Response::builder()
        .status(headers.status)
        .header("Connection", "close");
    builder.body(ChainBody::new(chain)).unwrap_or_else(|e| {
        log_build_error("aborted", &e);
        Response::new(ChainBody::empty())
    })
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<ChainBody> {
    error_page(StatusCode::NOT_FOUND, "404 Not Found")
}

/// Build 405 Method Not Allowed response
pub fn build_405_response() -> Response<ChainBody> {
    let body = "405 Method Not Allowed";
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header("Content-Type", "text/plain")
        .header("Content-Length", body.len())
        .header("Allow", "GET")
        .body(ChainBody::new(terminal_chain(body)))
        .unwrap_or_else(|e| {
            log_build_error("405", &e);
            Response::new(ChainBody::empty())
        })
}

/// Build 500 Internal Server Error response
pub fn build_500_response() -> Response<ChainBody> {
    error_page(StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error")
}

/// Default plain-text error response for a failure status.
pub fn default_error_response(status: StatusCode) -> Response<ChainBody> {
    match status {
        StatusCode::NOT_FOUND => build_404_response(),
        StatusCode::METHOD_NOT_ALLOWED => build_405_response(),
        StatusCode::INTERNAL_SERVER_ERROR => build_500_response(),
        other => {
            let body = format!(
                "{} {}",
                other.as_u16(),
                other.canonical_reason().unwrap_or("Error")
            );
            error_page(other, &body)
        }
    }
}

/// Single terminal buffer carrying an error page body.
fn terminal_chain(body: &str) -> Chain {
    let mut buf = Buf::from_vec(body.as_bytes().to_vec());
    buf.last = true;
    let mut chain = Chain::new();
    chain.push(buf);
    chain
}

fn error_page(status: StatusCode, body: &str) -> Response<ChainBody> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain")
        .header("Content-Length", body.len())
        .body(ChainBody::new(terminal_chain(body)))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(ChainBody::empty())
        })
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    logger::log_error(&format!("Failed to build {status} response: {error}"));
}
