use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::fmt::format::DefaultFields;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

use super::filter::DebugOnlyFilter;
#[cfg(feature = "prod")]
use super::filter::ErrorOnlyFilter;
use super::filter::ErrorWarnFilter;
#[cfg(feature = "dev")]
use super::filter::InfoOnlyFilter;
use super::format::TabiFormat;
use crate::config::LoggingConfig;
use crate::err_with_loc;
use crate::error::ConfigError;
use crate::error::Result;

const DEFAULT_LOGS_DIR: &str = ".logs";

fn file_layer<S>(format: &TabiFormat) -> tracing_subscriber::fmt::Layer<S, DefaultFields, TabiFormat>
where
    S: tracing::Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    tracing_subscriber::fmt::Layer::default()
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .event_format(format.clone())
}

/// Install the global subscriber. The returned guards flush the file writers
/// on drop, keep them alive for the whole process.
pub fn setup_tracing(
    engine_name: &str,
    logging: &LoggingConfig,
) -> Result<Vec<WorkerGuard>> {
    let base_logs_dir = Path::new(logging.directory.as_deref().unwrap_or(DEFAULT_LOGS_DIR));

    for dir in [base_logs_dir.to_path_buf(), base_logs_dir.join("debug"), base_logs_dir.join("error")] {
        std::fs::create_dir_all(&dir).map_err(|e| {
            err_with_loc!(ConfigError::LogDirectoryError {
                path: dir.display().to_string(),
                reason: e.to_string(),
            })
        })?;
    }

    let mut guards = Vec::new();
    let file_name = format!("{}.log", engine_name);

    let debug_appender = RollingFileAppender::new(Rotation::DAILY, base_logs_dir.join("debug"), &file_name);
    let error_appender = RollingFileAppender::new(Rotation::DAILY, base_logs_dir.join("error"), &file_name);
    let (non_blocking_debug, debug_guard) = tracing_appender::non_blocking(debug_appender);
    let (non_blocking_error, error_guard) = tracing_appender::non_blocking(error_appender);
    guards.push(debug_guard);
    guards.push(error_guard);

    let format = TabiFormat {
        engine_name: engine_name.to_string(),
    };

    let subscriber = tracing_subscriber::registry()
        .with(file_layer(&format).with_writer(non_blocking_debug).with_filter(DebugOnlyFilter))
        .with(file_layer(&format).with_writer(non_blocking_error).with_filter(ErrorWarnFilter));

    // RUST_LOG narrows the terminal further, it never widens past the level filter
    let terminal_env = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trace"));

    #[cfg(feature = "prod")]
    let subscriber = subscriber.with(
        tracing_subscriber::fmt::Layer::default()
            .with_ansi(true)
            .event_format(format.clone())
            .with_filter(ErrorOnlyFilter)
            .with_filter(terminal_env()),
    );

    #[cfg(feature = "dev")]
    let subscriber = {
        let info_appender = RollingFileAppender::new(Rotation::DAILY, base_logs_dir, &file_name);
        let (non_blocking_info, info_guard) = tracing_appender::non_blocking(info_appender);
        guards.push(info_guard);

        subscriber
            .with(
                tracing_subscriber::fmt::Layer::default()
                    .with_ansi(true)
                    .event_format(format.clone())
                    .with_filter(InfoOnlyFilter)
                    .with_filter(terminal_env()),
            )
            .with(file_layer(&format).with_writer(non_blocking_info).with_filter(InfoOnlyFilter))
    };

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| err_with_loc!(format!("failed_to_set_tracing_subscriber: {}", e)))?;

    tracing::info!(
        "{}_logging_started::debug_logs::{}",
        engine_name,
        base_logs_dir.join("debug").join(&file_name).display()
    );
    tracing::info!(
        "{}_logging_started::error_logs::{}",
        engine_name,
        base_logs_dir.join("error").join(&file_name).display()
    );

    Ok(guards)
}
