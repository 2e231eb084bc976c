// Configuration module entry point
// Manages application configuration and directive parsing

mod state;
mod types;

use std::fmt;
use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{
    Config, HttpConfig, LocationConfig, LoggingConfig, PerformanceConfig, ServerConfig,
};

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.server_name", "bookweb/0.1")?
            .set_default("http.max_body_size", 10_485_760)? // 10MB
            .set_default("http.request_pool_size", 4096)?
            .build()?;

        settings.try_deserialize()
    }

    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("config")
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

/// Directive errors detected during configuration finalization.
/// Any of these is fatal to server startup.
#[derive(Debug, PartialEq, Eq)]
pub enum DirectiveError {
    /// No module claims the directive name.
    Unknown { directive: String, scope: String },
    /// The directive takes a boolean argument and got something else.
    InvalidFlag { directive: String, value: String },
}

impl fmt::Display for DirectiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown { directive, scope } => {
                write!(f, "unknown directive \"{directive}\" in location \"{scope}\"")
            }
            Self::InvalidFlag { directive, value } => {
                write!(
                    f,
                    "invalid value \"{value}\" for directive \"{directive}\", expected \"on\" or \"off\""
                )
            }
        }
    }
}

impl std::error::Error for DirectiveError {}

/// Generic flag-argument parser shared by all boolean directives.
pub fn parse_flag(directive: &str, value: &str) -> Result<bool, DirectiveError> {
    match value {
        "on" => Ok(true),
        "off" => Ok(false),
        _ => Err(DirectiveError::InvalidFlag {
            directive: directive.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag_on_off() {
        assert_eq!(parse_flag("mybook", "on"), Ok(true));
        assert_eq!(parse_flag("mybook", "off"), Ok(false));
    }

    #[test]
    fn test_parse_flag_rejects_other_values() {
        let err = parse_flag("mybook", "yes").unwrap_err();
        assert_eq!(
            err,
            DirectiveError::InvalidFlag {
                directive: "mybook".to_string(),
                value: "yes".to_string(),
            }
        );
    }

    #[test]
    fn test_defaults_without_config_file() {
        let cfg = Config::load_from("does-not-exist").unwrap();
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.server.port, 8080);
        assert!(cfg.logging.access_log);
        assert_eq!(cfg.logging.access_log_format, "combined");
        assert_eq!(cfg.http.request_pool_size, 4096);
        assert!(cfg.locations.is_empty());
    }
}
