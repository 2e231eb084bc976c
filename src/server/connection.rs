// Connection handling module
// Accepts TCP connections and drives the content phase for each request

use crate::config::AppState;
use crate::http::{response, ChainBody};
use crate::logger;
use crate::pipeline::Outcome;
use crate::request::Request;
use crate::routing;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Response, StatusCode, Version};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Accept and process a connection, checking limits and logging.
pub fn accept_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    state: &Arc<AppState>,
    conn_counter: &Arc<AtomicUsize>,
) {
    // Increment counter first, then check limit (prevents race condition)
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            // Exceeded limit: rollback counter and reject
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection rejected."
            ));
            drop(stream);
            return;
        }
    }

    if state.config.logging.access_log {
        logger::log_connection_accepted(&peer_addr);
    }

    handle_connection(stream, peer_addr, Arc::clone(state), Arc::clone(conn_counter));
}

/// Serve a single connection in a spawned task.
///
/// Wraps the TCP stream in `TokioIo`, configures HTTP/1.1 keep-alive,
/// bounds the connection by the configured timeouts, and decrements the
/// connection counter when done.
fn handle_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
    conn_counter: Arc<AtomicUsize>,
) {
    tokio::task::spawn_local(async move {
        let io = TokioIo::new(stream);

        let keep_alive_timeout = state.config.performance.keep_alive_timeout;
        let timeout_duration = std::time::Duration::from_secs(std::cmp::max(
            state.config.performance.read_timeout,
            state.config.performance.write_timeout,
        ));

        let mut builder = http1::Builder::new();
        if keep_alive_timeout > 0 {
            builder.keep_alive(true);
        }

        let service_state = Arc::clone(&state);
        let conn = builder.serve_connection(
            io,
            service_fn(move |req| {
                let state = Arc::clone(&service_state);
                async move { dispatch(req, state, peer_addr).await }
            }),
        );

        match tokio::time::timeout(timeout_duration, conn).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => logger::log_connection_error(&err),
            Err(_) => {
                logger::log_warning(&format!(
                    "Connection timeout after {} seconds",
                    timeout_duration.as_secs()
                ));
            }
        }

        conn_counter.fetch_sub(1, Ordering::SeqCst);
    });
}

/// Build the host request for one inbound request and serve it.
async fn dispatch(
    req: hyper::Request<Incoming>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<ChainBody>, Infallible> {
    let location = routing::find_location(req.uri().path(), &state.locations)
        .map_or_else(|| Arc::clone(&state.default_location), Arc::clone);
    let r = Request::from_hyper(
        req,
        peer_addr,
        location,
        state.config.http.request_pool_size,
    );
    Ok(serve_request(r, &state).await)
}

/// Run the content phase and finish the request.
async fn serve_request(mut r: Request, state: &AppState) -> Response<ChainBody> {
    let mut entry = access_entry(&r);

    let outcome = execute(&mut r, state).await;
    let mut response = response::assemble(outcome, r);

    if let Ok(value) = hyper::header::HeaderValue::from_str(&state.config.http.server_name) {
        response.headers_mut().insert("Server", value);
    }

    if state.config.logging.access_log {
        entry.status = response.status().as_u16();
        entry.body_bytes = response.body().remaining();
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    response
}

/// Content-phase dispatch plus host-side checks and cleanup.
async fn execute(r: &mut Request, state: &AppState) -> Outcome {
    let outcome = match check_body_size(r, state.config.http.max_body_size) {
        Some(rejected) => rejected,
        None => state.pipeline.run_content(r).await,
    };

    // A failed request still drains its inbound payload so the connection
    // can be reused.
    if outcome != Outcome::Ok && r.body_pending() {
        let _ = r.discard_request_body().await;
    }

    outcome
}

/// Validate the declared Content-Length against the configured limit.
fn check_body_size(r: &Request, max_body_size: u64) -> Option<Outcome> {
    let declared = r.headers_in().get("content-length")?;
    let size = declared.to_str().ok()?.parse::<u64>().ok()?;
    if size > max_body_size {
        logger::log_error(&format!(
            "Request body too large: {size} bytes (max: {max_body_size})"
        ));
        return Some(Outcome::Fail(StatusCode::PAYLOAD_TOO_LARGE));
    }
    None
}

fn access_entry(r: &Request) -> logger::AccessLogEntry {
    let mut entry = logger::AccessLogEntry::new(
        r.peer_addr().ip().to_string(),
        r.method().to_string(),
        r.path().to_string(),
    );
    entry.query = r.query().map(ToString::to_string);
    entry.http_version = http_version_str(r.version()).to_string();
    entry.referer = header_str(r, "referer");
    entry.user_agent = header_str(r, "user-agent");
    entry
}

fn header_str(r: &Request, name: &str) -> Option<String> {
    r.headers_in()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

fn http_version_str(version: Version) -> &'static str {
    if version == Version::HTTP_10 {
        "1.0"
    } else if version == Version::HTTP_2 {
        "2"
    } else {
        "1.1"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book;
    use crate::config::Config;
    use crate::pipeline::Pipeline;
    use http_body_util::BodyExt;
    use hyper::body::Bytes;
    use hyper::{Method, StatusCode};

    fn test_state() -> AppState {
        let config = Config::load_from("does-not-exist").unwrap();
        let mut pipeline = Pipeline::new();
        book::postconfiguration(&mut pipeline).unwrap();
        AppState::new(config, pipeline, Vec::new())
    }

    #[tokio::test]
    async fn test_get_served_end_to_end() {
        let state = test_state();
        let r = Request::test_request(Method::GET);

        let response = serve_request(r, &state).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["Content-Type"], "text/plain");
        assert_eq!(response.headers()["Content-Length"], "18");
        assert_eq!(response.headers()["Server"], "bookweb/0.1");

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"hello worldabcdefg");
    }

    #[tokio::test]
    async fn test_post_rejected_and_body_drained() {
        let state = test_state();
        let mut r =
            Request::test_request_with_body(Method::POST, Bytes::from_static(b"ignored"), 4096);

        let outcome = execute(&mut r, &state).await;
        assert_eq!(outcome, Outcome::Fail(StatusCode::METHOD_NOT_ALLOWED));
        // The host drained the payload the handler never touched.
        assert!(!r.body_pending());

        let response = response::assemble(outcome, r);
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let state = test_state();

        let mut headers = hyper::HeaderMap::new();
        headers.insert(
            "content-length",
            hyper::header::HeaderValue::from_static("999999999999"),
        );
        let head = crate::request::Head {
            method: Method::POST,
            uri: hyper::Uri::from_static("/book"),
            version: Version::HTTP_11,
            headers,
            peer_addr: std::net::SocketAddr::from(([127, 0, 0, 1], 4000)),
        };
        let mut r = Request::new(
            head,
            crate::request::InBody::Full(Bytes::from_static(b"payload")),
            Arc::new(crate::routing::Location::server_default()),
            4096,
        );

        let outcome = execute(&mut r, &state).await;
        assert_eq!(outcome, Outcome::Fail(StatusCode::PAYLOAD_TOO_LARGE));
    }

    #[tokio::test]
    async fn test_repeated_gets_are_identical() {
        let state = test_state();

        let first = serve_request(Request::test_request(Method::GET), &state).await;
        let second = serve_request(Request::test_request(Method::GET), &state).await;
        assert_eq!(first.status(), second.status());

        let first_body = first.into_body().collect().await.unwrap().to_bytes();
        let second_body = second.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(first_body, second_body);
    }
}
