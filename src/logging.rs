//! File-based logging for spotify-organizer
//!
//! The terminal belongs to the interactive session, so tracing output goes to
//! a daily rotating file under `logging.dir` instead of stdout.

use std::{env, fs};

use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingSettings;

const LOG_FILE_PREFIX: &str = "spotify-organizer";
const LOG_FILE_SUFFIX: &str = "log";
const DEFAULT_FILTER: &str = "spotify_organizer=debug,librespot=info,rspotify=info,warn";

/// Initialize the logging system.
///
/// Logs are written to `<dir>/spotify-organizer.YYYY-MM-DD.log` with daily
/// rotation. Filter precedence: `RUST_LOG`, then `logging.filter`, then:
/// - `spotify_organizer` modules: DEBUG
/// - `librespot`, `rspotify`: INFO
/// - Other crates: WARN
///
/// Buffered lines are written out when the returned guard is dropped.
pub fn init_logging(settings: &LoggingSettings) -> anyhow::Result<WorkerGuard> {
    fs::create_dir_all(&settings.dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .build(&settings.dir)?;

    // Non-blocking so slow disks never stall the prompt
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let directives = filter_directives(env::var("RUST_LOG").ok(), settings.filter.as_deref());
    let filter = EnvFilter::try_new(&directives)?;

    let fmt_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_span_events(FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::info!(dir = %settings.dir.display(), filter = %directives, "Logging initialized");

    Ok(guard)
}

fn filter_directives(from_env: Option<String>, configured: Option<&str>) -> String {
    from_env
        .filter(|v| !v.trim().is_empty())
        .or_else(|| {
            configured
                .filter(|v| !v.trim().is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Log a Spotify API request and its result
#[macro_export]
macro_rules! log_api_result {
    ($operation:expr, $result:expr) => {
        match &$result {
            Ok(_) => tracing::debug!(operation = $operation, "API request successful"),
            Err(e) => tracing::error!(operation = $operation, error = %e, "API request failed"),
        }
    };
}

/// Log a Spotify API request with additional context
#[macro_export]
macro_rules! log_api_request {
    ($operation:expr) => {
        tracing::debug!(operation = $operation, "API request started");
    };
    ($operation:expr, $($field:tt)+) => {
        tracing::debug!(operation = $operation, $($field)+, "API request started");
    };
}
