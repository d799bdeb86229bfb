//! Log output configuration.

use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Default filter directive when nothing else is configured.
const DEFAULT_DIRECTIVE: &str = "info";

/// Directive used when verbose output is requested.
const VERBOSE_DIRECTIVE: &str = "debug";

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parses a format name; unknown names yield `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Level filter.
    pub filter: EnvFilter,
    /// Append logs to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Builds logging configuration from environment variables.
    ///
    /// - `GUILDLORE_LOG`, then `RUST_LOG`: filter directives
    /// - `GUILDLORE_LOG_FORMAT`: `pretty` or `json`
    /// - `GUILDLORE_LOG_FILE`: log file path
    ///
    /// `verbose` raises the default level to debug; explicit directives win.
    #[must_use]
    pub fn from_env(verbose: bool) -> Self {
        let directives = parse_string_env("GUILDLORE_LOG").or_else(|| parse_string_env("RUST_LOG"));
        let fallback = if verbose {
            VERBOSE_DIRECTIVE
        } else {
            DEFAULT_DIRECTIVE
        };

        Self {
            format: parse_string_env("GUILDLORE_LOG_FORMAT")
                .and_then(|value| LogFormat::parse(&value))
                .unwrap_or_default(),
            filter: build_filter(directives.as_deref(), fallback),
            file: parse_string_env("GUILDLORE_LOG_FILE").map(PathBuf::from),
        }
    }
}

/// Builds a filter, falling back when the directives do not parse.
fn build_filter(directives: Option<&str>, fallback: &str) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(fallback))
}

fn parse_string_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
