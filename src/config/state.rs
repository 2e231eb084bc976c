// Application state module
// Immutable state shared read-only across all connections

use crate::config::Config;
use crate::pipeline::Pipeline;
use crate::routing::Location;
use std::sync::Arc;

/// Application state
///
/// Frozen at startup, after configuration finalization and pipeline
/// registration; requests only ever read it.
pub struct AppState {
    pub config: Config,
    pub pipeline: Pipeline,
    pub locations: Vec<Arc<Location>>,
    /// Fallback scope for paths no configured location covers.
    pub default_location: Arc<Location>,
}

impl AppState {
    pub fn new(config: Config, pipeline: Pipeline, locations: Vec<Arc<Location>>) -> Self {
        Self {
            config,
            pipeline,
            locations,
            default_location: Arc::new(Location::server_default()),
        }
    }
}
