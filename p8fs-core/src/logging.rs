//! ABOUTME: Logging infrastructure shared by every p8fs binary and worker
//! ABOUTME: Provides tracing initialization driven by `P8FS_LOG`, with an optional JSON sink

use tracing_subscriber::{fmt, EnvFilter};

/// Output format for structured logs (§"Ambient stack: logging").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, for local development and the CLI.
    Pretty,
    /// One JSON object per line, for the daemon and worker processes.
    Json,
}

/// Initialize the global `tracing` subscriber.
///
/// Reads the filter directive from `P8FS_LOG` (falling back to `info`) the
/// same way the source workspace's binaries read `RUST_LOG`; a distinct
/// variable name keeps it from colliding with library dependencies that
/// also watch `RUST_LOG`.
///
/// # Errors
/// Returns an error if a global subscriber has already been installed.
pub fn init_logging(format: LogFormat) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_env("P8FS_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Pretty => {
            fmt().with_env_filter(filter).with_target(true).try_init()?;
        }
        LogFormat::Json => {
            fmt().with_env_filter(filter).json().with_target(true).try_init()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_is_copy_and_comparable() {
        assert_eq!(LogFormat::Pretty, LogFormat::Pretty);
        assert_ne!(LogFormat::Pretty, LogFormat::Json);
    }
}
