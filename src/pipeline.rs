//! Content-phase pipeline
//!
//! Modules register content handlers once during startup; per request the
//! handlers run in registration order until one of them produces a terminal
//! outcome. A handler that declines passes the request to the next one.

use crate::request::Request;
use hyper::StatusCode;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Handler result for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Not this handler's request; the next registered handler runs.
    /// No current module declines, but dispatch honors it.
    #[allow(dead_code)]
    Declined,
    /// Headers and body were submitted to the output stage.
    Ok,
    /// Terminal failure; the host answers with its default response for the
    /// status code.
    Fail(StatusCode),
    /// Connection-level failure; no response can be delivered.
    Abort,
}

pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Outcome> + 'a>>;

/// A content handler. Plain function pointers keep the handler list `'static`
/// and registration order explicit.
pub type ContentHandler = for<'a> fn(&'a mut Request) -> HandlerFuture<'a>;

/// Registration failure: the handler list could not acquire storage.
/// Fatal to server startup.
#[derive(Debug)]
pub struct RegisterError;

impl fmt::Display for RegisterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to acquire content handler list storage")
    }
}

impl std::error::Error for RegisterError {}

/// Ordered handler lists for the request pipeline.
///
/// Built once in `main`, then frozen behind an `Arc`; nothing can register
/// after startup because registration needs `&mut self`.
#[derive(Default)]
pub struct Pipeline {
    content: Vec<ContentHandler>,
}

impl Pipeline {
    pub const fn new() -> Self {
        Self {
            content: Vec::new(),
        }
    }

    /// Append a handler to the content phase.
    pub fn register_content(&mut self, handler: ContentHandler) -> Result<(), RegisterError> {
        self.content.try_reserve(1).map_err(|_| RegisterError)?;
        self.content.push(handler);
        Ok(())
    }

    pub fn content_handler_count(&self) -> usize {
        self.content.len()
    }

    /// Run the content phase for one request.
    ///
    /// Handlers run in registration order; the first non-declined outcome is
    /// final. When every handler declines the host answers 404.
    pub async fn run_content(&self, r: &mut Request) -> Outcome {
        for handler in &self.content {
            match handler(r).await {
                Outcome::Declined => {}
                outcome => return outcome,
            }
        }
        Outcome::Fail(StatusCode::NOT_FOUND)
    }
}
