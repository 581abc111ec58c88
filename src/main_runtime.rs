use forkwatch::config::LoggingConfig;
use std::path::{Path, PathBuf};
use tokio::signal;
use tracing::{error, info};
use tracing_appender::non_blocking::NonBlocking;
use tracing_subscriber::EnvFilter;

/// Resolve the directory for rolling log files
fn log_dir() -> PathBuf {
    std::env::var_os("FORKWATCH_LOG_DIR")
        .or_else(|| std::env::var_os("LOG_DIR"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/var/log/forkwatch"))
}

/// Daily rolling writer under `dir`, or `None` when the directory is unusable.
/// The appender panics on an unwritable directory, so it is probed first.
fn rolling_writer(dir: &Path) -> Option<NonBlocking> {
    if let Err(e) = std::fs::create_dir_all(dir) {
        eprintln!(
            "forkwatch: log directory {} unavailable ({}), logging to console only",
            dir.display(),
            e
        );
        return None;
    }

    let probe = dir.join(".forkwatch_probe");
    if let Err(e) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&probe)
    {
        eprintln!(
            "forkwatch: log directory {} not writable ({}), logging to console only",
            dir.display(),
            e
        );
        return None;
    }
    let _ = std::fs::remove_file(&probe);

    let appender = tracing_appender::rolling::daily(dir, "forkwatch.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    // Flushes on drop; the process exits without dropping it
    std::mem::forget(guard);
    Some(writer)
}

/// Filter directive used when RUST_LOG is unset. The configured level applies
/// to every target, this crate included.
fn default_directive(config: &LoggingConfig) -> &str {
    match config.level.trim() {
        "" => "info",
        level => level,
    }
}

pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    let dir = log_dir();
    let file_layer = rolling_writer(&dir).map(|writer| {
        tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
    });
    let to_file = file_layer.is_some();

    let (console_text, console_json) = if config.json {
        (None, Some(tracing_subscriber::fmt::layer().json().with_target(true)))
    } else {
        (Some(tracing_subscriber::fmt::layer().with_target(true)), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_text)
        .with(console_json)
        .with(file_layer)
        .init();

    if to_file {
        info!("Writing logs to {}/forkwatch.log", dir.display());
    }
}

pub fn init_logging_simple() {
    // Minimal logging for one-shot commands
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
