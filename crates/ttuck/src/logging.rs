//! Structured logging setup
//!
//! The library crates only emit `tracing` events; applications choose where
//! they go. [`init_tracing`] installs a `tracing-subscriber` formatter with
//! an `EnvFilter`.
//!
//! # Example
//!
//! ```no_run
//! use ttuck::logging::{init_tracing, TracingConfig, TracingFormat};
//!
//! init_tracing(TracingConfig {
//!     format: TracingFormat::Compact,
//!     filter: "ttuck_fit=info,warn".to_string(),
//!     ..TracingConfig::default()
//! })?;
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: filter directive (default `ttuck_fit=info,ttuck_analysis=info,warn`)
//! - `TTUCK_LOG_FORMAT`: `pretty`, `json` or `compact` (default `compact`)

use anyhow::Result;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_FILTER: &str = "ttuck_fit=info,ttuck_analysis=info,warn";

/// Tracing output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Multi-line human-readable output
    Pretty,
    /// One JSON object per event
    Json,
    /// Single line per event
    Compact,
}

impl TracingFormat {
    /// Parse a format name; unknown names fall back to `Compact`
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => TracingFormat::Json,
            "pretty" => TracingFormat::Pretty,
            _ => TracingFormat::Compact,
        }
    }
}

/// Subscriber settings
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub format: TracingFormat,
    /// `EnvFilter` directive, e.g. "ttuck_fit=debug,info"
    pub filter: String,
    pub with_ansi: bool,
    /// Print the emitting module (`ttuck_fit::fit`, ...)
    pub with_target: bool,
    /// Source file of each event
    pub with_file: bool,
    pub with_line_number: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        let format = std::env::var("TTUCK_LOG_FORMAT")
            .map(|s| TracingFormat::parse(&s))
            .unwrap_or(TracingFormat::Compact);
        let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string());

        Self {
            format,
            filter,
            with_ansi: true,
            with_target: true,
            with_file: false,
            with_line_number: false,
        }
    }
}

/// Install the global subscriber.
///
/// Call once at startup. Fails if the filter does not parse or a global
/// subscriber is already set.
#[cfg(feature = "tracing")]
pub fn init_tracing(config: TracingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)?;

    match config.format {
        TracingFormat::Pretty => {
            let layer = fmt::layer()
                .pretty()
                .with_ansi(config.with_ansi)
                .with_target(config.with_target)
                .with_file(config.with_file)
                .with_line_number(config.with_line_number)
                .with_filter(filter);
            tracing_subscriber::registry().with(layer).try_init()?;
        }
        TracingFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_target(config.with_target)
                .with_file(config.with_file)
                .with_line_number(config.with_line_number)
                .with_filter(filter);
            tracing_subscriber::registry().with(layer).try_init()?;
        }
        TracingFormat::Compact => {
            let layer = fmt::layer()
                .compact()
                .with_ansi(config.with_ansi)
                .with_target(config.with_target)
                .with_file(config.with_file)
                .with_line_number(config.with_line_number)
                .with_filter(filter);
            tracing_subscriber::registry().with(layer).try_init()?;
        }
    }

    Ok(())
}

/// No-op without the `tracing` feature
#[cfg(not(feature = "tracing"))]
pub fn init_tracing(_config: TracingConfig) -> Result<()> {
    Ok(())
}
