//! Location routing module
//!
//! Resolves each request path to a routing scope and builds the per-scope
//! module configuration at startup.

use crate::book::conf::{BookConf, DIRECTIVE_NAME};
use crate::config::{parse_flag, Config, DirectiveError};
use std::sync::Arc;

/// A resolved routing scope: the configured path prefix plus the merged,
/// read-only module configuration for that scope.
#[derive(Debug)]
pub struct Location {
    pub path: String,
    pub book: BookConf,
}

impl Location {
    /// The implicit server-wide scope used when no configured location
    /// matches. Carries only merged defaults.
    pub fn server_default() -> Self {
        let mut book = BookConf::create();
        book.merge(&BookConf::create());
        Self {
            path: "/".to_string(),
            book,
        }
    }
}

/// Build the location table from the loaded configuration.
///
/// Runs once during startup: creates each scope's module configuration,
/// applies the directives declared in that scope, and merges unset values
/// against the server-wide scope. Unknown directives and malformed flag
/// values abort startup.
pub fn build_locations(cfg: &Config) -> Result<Vec<Arc<Location>>, DirectiveError> {
    // Directives are only accepted inside location blocks, so the server
    // scope is always all-unset.
    let server_scope = BookConf::create();

    cfg.locations
        .iter()
        .map(|loc| {
            let mut book = BookConf::create();
            for (name, value) in &loc.directives {
                if name == DIRECTIVE_NAME {
                    book.set_enabled(parse_flag(name, value)?);
                } else {
                    return Err(DirectiveError::Unknown {
                        directive: name.clone(),
                        scope: loc.path.clone(),
                    });
                }
            }
            book.merge(&server_scope);
            Ok(Arc::new(Location {
                path: loc.path.clone(),
                book,
            }))
        })
        .collect()
}

/// Find the routing scope for a request path: the longest configured prefix
/// that matches, if any.
pub fn find_location<'a>(path: &str, locations: &'a [Arc<Location>]) -> Option<&'a Arc<Location>> {
    locations
        .iter()
        .filter(|loc| path.starts_with(loc.path.as_str()))
        .max_by_key(|loc| loc.path.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LocationConfig;

    fn config_with_locations(locations: Vec<LocationConfig>) -> Config {
        let mut cfg = Config::load_from("does-not-exist").unwrap();
        cfg.locations = locations;
        cfg
    }

    fn location_block(path: &str, directives: &[(&str, &str)]) -> LocationConfig {
        LocationConfig {
            path: path.to_string(),
            directives: directives
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_directive_on_resolves_enabled() {
        let cfg = config_with_locations(vec![location_block("/book", &[("mybook", "on")])]);
        let locations = build_locations(&cfg).unwrap();
        assert!(locations[0].book.is_enabled());
    }

    #[test]
    fn test_absent_directive_defaults_to_disabled() {
        let cfg = config_with_locations(vec![location_block("/plain", &[])]);
        let locations = build_locations(&cfg).unwrap();
        assert!(!locations[0].book.is_enabled());
    }

    #[test]
    fn test_unknown_directive_fails_startup() {
        let cfg = config_with_locations(vec![location_block("/book", &[("nope", "on")])]);
        let err = build_locations(&cfg).unwrap_err();
        assert_eq!(
            err,
            DirectiveError::Unknown {
                directive: "nope".to_string(),
                scope: "/book".to_string(),
            }
        );
    }

    #[test]
    fn test_invalid_flag_value_fails_startup() {
        let cfg = config_with_locations(vec![location_block("/book", &[("mybook", "maybe")])]);
        assert!(build_locations(&cfg).is_err());
    }

    #[test]
    fn test_find_location_longest_prefix_wins() {
        let cfg = config_with_locations(vec![
            location_block("/api", &[]),
            location_block("/api/v1", &[("mybook", "on")]),
        ]);
        let locations = build_locations(&cfg).unwrap();

        let found = find_location("/api/v1/users", &locations).unwrap();
        assert_eq!(found.path, "/api/v1");
        assert!(found.book.is_enabled());

        let found = find_location("/api/v2", &locations).unwrap();
        assert_eq!(found.path, "/api");
    }

    #[test]
    fn test_find_location_no_match() {
        let cfg = config_with_locations(vec![location_block("/book", &[])]);
        let locations = build_locations(&cfg).unwrap();
        assert!(find_location("/other", &locations).is_none());
    }

    #[test]
    fn test_server_default_scope_disabled() {
        let loc = Location::server_default();
        assert!(!loc.book.is_enabled());
    }
}
