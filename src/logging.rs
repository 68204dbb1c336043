//! Logging setup
//!
//! Console output always; a daily rolling file when the config asks for it.
//! `RUST_LOG` wins over every other setting.

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::LoggingSection;

/// Level used when neither `RUST_LOG` nor a flag decides
fn default_level(verbose: bool, debug: bool, section: Option<&LoggingSection>) -> String {
    if debug {
        "debug".to_string()
    } else if verbose {
        "info".to_string()
    } else {
        section
            .map(|s| s.level.to_lowercase())
            .unwrap_or_else(|| "info".to_string())
    }
}

/// Initialize logging system.
///
/// The returned guard flushes the file writer on drop; keep it alive for
/// the whole command.
pub fn init_logging(
    verbose: bool,
    debug: bool,
    section: Option<&LoggingSection>,
) -> Result<Option<WorkerGuard>> {
    let level = default_level(verbose, debug, section);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let console = fmt::layer().with_target(false).with_filter(filter);

    let mut guard = None;
    let file_layer = match section {
        Some(s) if s.log_to_file => {
            let dir = s.log_path();
            match std::fs::create_dir_all(&dir) {
                Ok(()) => {
                    let appender = tracing_appender::rolling::daily(&dir, &s.file_prefix);
                    let (writer, g) = tracing_appender::non_blocking(appender);
                    guard = Some(g);
                    let file_filter = EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| EnvFilter::new(&level));
                    Some(
                        fmt::layer()
                            .with_writer(writer)
                            .with_ansi(false)
                            .with_filter(file_filter),
                    )
                }
                Err(e) => {
                    eprintln!(
                        "Warning: Could not create log directory {} ({}), file logging disabled",
                        dir.display(),
                        e
                    );
                    None
                }
            }
        }
        _ => None,
    };

    // A second init (tests, repeated commands) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init();

    Ok(guard)
}
