// Logging module
// tracing-subscriber setup: console output always, plus a daily rolling file
// when a log directory is configured.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the logging system. `RUST_LOG` overrides `log_level`.
///
/// The returned guard flushes the file writer when dropped; keep it alive for
/// the life of the program.
pub fn initialize_logging(log_dir: Option<&str>, file_name: &str, log_level: &str) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let console = fmt::layer()
        .with_ansi(true)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);

    let Some(dir) = log_dir else {
        tracing_subscriber::registry().with(env_filter).with(console).init();
        return None;
    };

    let path = Path::new(dir);
    if !path.exists() {
        if let Err(e) = std::fs::create_dir_all(path) {
            eprintln!("Could not create log directory {}: {}", dir, e);
        }
    }

    let file_appender = rolling::daily(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true),
        )
        .init();

    Some(guard)
}
