//! Tracing setup for the agent.
//!
//! `ROLLCALL_ENV=production` writes JSON lines to a rolling file under
//! `logging.directory` plus a compact, colourless copy on stdout for
//! journald. Anything else gets pretty stdout output with span timings.
//! `RUST_LOG` wins over `logging.level`.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::Context;
use rollcall_core::{LogRotation, LoggingConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable selecting the runtime environment.
pub const ENVIRONMENT_ENV: &str = "ROLLCALL_ENV";

const LOG_FILE_PREFIX: &str = "rollcall";
const LOG_FILE_SUFFIX: &str = "log";

/// Writer guards; dropping them loses buffered lines.
static GUARDS: OnceLock<(WorkerGuard, WorkerGuard)> = OnceLock::new();

/// Whether `ROLLCALL_ENV` asks for production logging.
pub fn is_production() -> bool {
    std::env::var(ENVIRONMENT_ENV).is_ok_and(|env| env.eq_ignore_ascii_case("production"))
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error if the filter directive does not parse, or in
/// production if the log directory or file cannot be created.
pub fn init(config: &LoggingConfig, production: bool) -> anyhow::Result<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let directive = filter_directive(rust_log.as_deref(), &config.level);
    let filter = EnvFilter::try_new(directive)
        .with_context(|| format!("Invalid log filter '{directive}'"))?;

    if production {
        init_production(config, filter)
    } else {
        init_development(filter);
        Ok(())
    }
}

fn filter_directive<'a>(rust_log: Option<&'a str>, configured: &'a str) -> &'a str {
    rust_log
        .map(str::trim)
        .filter(|directive| !directive.is_empty())
        .unwrap_or(configured)
}

fn init_production(config: &LoggingConfig, filter: EnvFilter) -> anyhow::Result<()> {
    let dir = prepare_log_directory(config)?;
    let appender = RollingFileAppender::builder()
        .rotation(rotation(config.rotation))
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .build(&dir)
        .with_context(|| format!("Cannot open log file in {}", dir.display()))?;

    let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(file_writer)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(stdout_writer)
                .with_ansi(false),
        )
        .init();

    let _ = GUARDS.set((file_guard, stdout_guard));
    tracing::debug!(directory = %dir.display(), "File logging enabled");
    Ok(())
}

fn init_development(filter: EnvFilter) {
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE),
        )
        .init();
}

/// Resolve the configured (or platform) log directory and create it.
fn prepare_log_directory(config: &LoggingConfig) -> anyhow::Result<PathBuf> {
    let dir = config
        .directory
        .clone()
        .unwrap_or_else(default_log_directory);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Cannot create log directory {}", dir.display()))?;
    Ok(dir)
}

fn default_log_directory() -> PathBuf {
    if cfg!(target_os = "linux") {
        return Path::new("/var/log").join(LOG_FILE_PREFIX);
    }
    directories::ProjectDirs::from("", "", LOG_FILE_PREFIX)
        .map_or_else(|| PathBuf::from("logs"), |dirs| dirs.data_dir().join("logs"))
}

fn rotation(rotation: LogRotation) -> Rotation {
    match rotation {
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Never => Rotation::NEVER,
    }
}
