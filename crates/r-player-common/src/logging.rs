//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Tracing bootstrap for the player daemon."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "R_PLAYER_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

// Flushes the non-blocking writers on exit; set once the subscriber is installed.
static WRITER_GUARDS: OnceCell<Vec<WorkerGuard>> = OnceCell::new();

/// Stdout format of the daemon. The log file is always JSON.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    StructuredJson,
    Pretty,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "structured-json" | "json" => Ok(LogFormat::StructuredJson),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!("unknown log format: {}", other)),
        }
    }
}

/// How often the log file rolls over.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogRotation {
    Hourly,
    #[default]
    Daily,
    Never,
}

impl From<LogRotation> for Rotation {
    fn from(value: LogRotation) -> Self {
        match value {
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

/// Base name of the log file written for `service`.
pub fn log_file_name(service: &str, config: &LoggingConfig) -> String {
    match config.file_prefix.as_deref().filter(|prefix| !prefix.is_empty()) {
        Some(prefix) => format!("{prefix}-{service}.log"),
        None => format!("{service}.log"),
    }
}

/// `R_PLAYER_LOG`, then `RUST_LOG`, then `info`.
fn log_filter() -> EnvFilter {
    match std::env::var(LOG_ENV) {
        Ok(directive) => EnvFilter::try_new(&directive).unwrap_or_else(|err| {
            eprintln!("ignoring {LOG_ENV}={directive:?} ({err}); logging at {DEFAULT_DIRECTIVE}");
            EnvFilter::new(DEFAULT_DIRECTIVE)
        }),
        Err(_) => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
        }
    }
}

/// Install the process-wide subscriber: stdout in `config.format`, plus a
/// rolling JSON file under `config.directory` when `config.file` is set.
///
/// A second call leaves the first subscriber in place.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    let mut guards = Vec::with_capacity(2);

    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    guards.push(stdout_guard);
    let stdout_layer = match config.format {
        LogFormat::StructuredJson => fmt::layer()
            .with_target(false)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .json()
            .with_writer(stdout_writer)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(stdout_writer)
            .boxed(),
    };

    let file_layer = if config.file {
        std::fs::create_dir_all(&config.directory).with_context(|| {
            format!("unable to create log directory {}", config.directory.display())
        })?;
        let appender = RollingFileAppender::new(
            config.rotation.into(),
            &config.directory,
            log_file_name(service_name, config),
        );
        let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
        guards.push(file_guard);
        Some(
            fmt::layer()
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .json()
                .with_writer(file_writer),
        )
    } else {
        None
    };

    let installed = tracing_subscriber::registry()
        .with(log_filter())
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .is_ok();
    if installed {
        let _ = WRITER_GUARDS.set(guards);
    }

    info!(
        service = %service_name,
        format = ?config.format,
        file = config.file,
        rotation = ?config.rotation,
        log_dir = %config.directory.display(),
        "tracing initialised"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parses_aliases() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::StructuredJson));
        assert_eq!("Pretty".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn file_name_uses_the_optional_prefix() {
        let mut config = LoggingConfig::default();
        assert_eq!(log_file_name("r-playerd", &config), "r-playerd.log");
        config.file_prefix = Some("site-a".into());
        assert_eq!(log_file_name("r-playerd", &config), "site-a-r-playerd.log");
        config.file_prefix = Some(String::new());
        assert_eq!(log_file_name("r-playerd", &config), "r-playerd.log");
    }

    #[test]
    fn disabled_file_logging_creates_no_directory() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = LoggingConfig {
            directory: dir.path().join("logs"),
            file: false,
            ..LoggingConfig::default()
        };
        init_tracing("r-playerd-test", &config)?;
        assert!(!config.directory.exists());
        Ok(())
    }
}
