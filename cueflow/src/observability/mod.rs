//! Tracing subscriber setup.
//!
//! Library code only emits `tracing` spans and events. Binaries and tests
//! call [`init_tracing`] once to install a subscriber.

use tracing_subscriber::EnvFilter;

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Installs a global fmt subscriber.
///
/// Uses the `RUST_LOG` env var if set, otherwise falls back to `default_level`.
/// Returns an error if a global subscriber is already installed.
pub fn try_init_tracing(
    default_level: &str,
    format: LogFormat,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);

    match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
}

/// Installs a pretty fmt subscriber, ignoring an already installed one.
pub fn init_tracing(default_level: &str) {
    let _ = try_init_tracing(default_level, LogFormat::Pretty);
}
