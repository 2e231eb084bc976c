//! Book content module
//!
//! A self-contained content-phase extension: a per-location configuration
//! with one directive, and a handler that answers GET requests with a
//! multi-segment plain-text body.

pub mod conf;
pub mod handler;

use crate::pipeline::{Pipeline, RegisterError};

/// Hook the module's handler into the content phase.
///
/// Called exactly once, during configuration finalization and before the
/// server accepts its first connection. A registration failure is fatal to
/// startup.
pub fn postconfiguration(pipeline: &mut Pipeline) -> Result<(), RegisterError> {
    pipeline.register_content(handler::book_handler)
}
