use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::{layer::Identity, prelude::*, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Initialize logging for a peer process: stdout always, plus an
/// optional rolling file appender. The filter precedence is config
/// level, then `RUST_LOG`, then "info". Safe to call more than once;
/// later calls lose quietly.
pub fn init_with_config(cfg: &LoggingConfig) {
    let filter = cfg.level.as_ref().map_or_else(
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        |level| EnvFilter::new(level.as_str()),
    );

    let registry = tracing_subscriber::registry().with(filter);
    let file_writer = cfg.enable_file_logging.then(|| file_writer(cfg)).flatten();

    match (cfg.format, file_writer) {
        (LogFormat::Text, None) => {
            let _ = registry.with(stdout_text()).with(Identity::new()).try_init();
        }
        (LogFormat::Text, Some(writer)) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_timer(UtcTime::rfc_3339())
                .with_writer(writer);
            let _ = registry.with(stdout_text()).with(file_layer).try_init();
        }
        (LogFormat::Json, None) => {
            let _ = registry.with(stdout_json()).with(Identity::new()).try_init();
        }
        (LogFormat::Json, Some(writer)) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_timer(UtcTime::rfc_3339())
                .with_writer(writer);
            let _ = registry.with(stdout_json()).with(file_layer).try_init();
        }
    }
}

fn stdout_text<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_ansi(true)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(std::io::stdout)
}

fn stdout_json<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_ansi(false)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(std::io::stdout)
}

/// Builds the non-blocking rolling writer, or `None` when the log
/// directory cannot be created (stdout-only logging continues).
fn file_writer(cfg: &LoggingConfig) -> Option<tracing_appender::non_blocking::NonBlocking> {
    let rotation = match cfg.rotation.to_lowercase().as_str() {
        "hourly" => tracing_appender::rolling::Rotation::HOURLY,
        "never" => tracing_appender::rolling::Rotation::NEVER,
        _ => tracing_appender::rolling::Rotation::DAILY,
    };

    if let Err(e) = std::fs::create_dir_all(&cfg.dir) {
        eprintln!(
            "Failed to create log directory '{}' ({e}), continuing with stdout logs",
            cfg.dir
        );
        return None;
    }

    let appender =
        tracing_appender::rolling::RollingFileAppender::new(rotation, &cfg.dir, &cfg.filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    // The guard must outlive the process for buffered lines to flush.
    let _leaked: &'static _ = Box::leak(Box::new(guard));

    Some(non_blocking)
}
