//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "binary"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Binary entrypoint for the player daemon."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
mod exit_codes;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use r_player_common::config::AppConfig;
use r_player_common::logging::{init_tracing, LogFormat};
use r_player_core::{BootstrapError, Command, Player, RunStateEvent, RunStateObserver};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Handle;
use tokio::signal;
use tracing::{error, info, warn};

use crate::exit_codes::ExitCode;

const DEFAULT_CONFIG: &str = "configs/player.toml";

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Measurement replay and formula simulation daemon",
    long_about = "Replays a recorded measurement file against a configured asset hierarchy and \
                  evaluates formula points. Reads remote control commands from stdin, one per \
                  line: an integer code (1=Play .. 7=ToggleEndless) or a command name."
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to settings file")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Asset configuration CSV")]
    config_file: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Replay data CSV")]
    data_file: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Write every sample to this file")]
    output: Option<PathBuf>,

    #[arg(long, help = "Issue Play once after startup")]
    autostart: bool,

    #[arg(long, help = "Stop at the end of the data file instead of looping")]
    no_endless: bool,

    #[arg(long, value_enum, help = "Override the stdout log format")]
    log_format: Option<CliLogFormat>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLogFormat {
    Json,
    Pretty,
}

impl From<CliLogFormat> for LogFormat {
    fn from(value: CliLogFormat) -> Self {
        match value {
            CliLogFormat::Json => LogFormat::StructuredJson,
            CliLogFormat::Pretty => LogFormat::Pretty,
        }
    }
}

/// Prints every run state change to stderr.
struct StderrObserver;

impl RunStateObserver for StderrObserver {
    fn on_run_state(&self, event: &RunStateEvent) {
        eprintln!("state: {}", event.to);
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(()) => ExitCode::Normal,
        Err(err) => {
            let code = ExitCode::classify(&err);
            error!(code = code.as_i32(), error = %format!("{err:#}"), "player daemon failed");
            eprintln!("r-playerd: {err:#}");
            code
        }
    };
    std::process::exit(code.as_i32());
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)
        .map_err(|err| BootstrapError::InvalidConfiguration(format!("{err:#}")))?;
    init_tracing("r-playerd", &config.logging)?;
    info!(
        config_file = %config.player.config_file.display(),
        data_file = ?config.player.data_file,
        endless = config.player.endless,
        "configuration loaded"
    );

    let player = Arc::new(Player::bootstrap(config, Handle::current())?);
    player.machine().set_run_state_observer(Arc::new(StderrObserver));
    player.start()?;

    info!("player running; reading commands from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("ctrl-c received; shutting down");
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    let trimmed = line.trim();
                    if !trimmed.is_empty() {
                        println!("{}", handle_command(&player, trimmed));
                    }
                }
                Ok(None) => {
                    info!("stdin closed; waiting for termination signal");
                    stdin_open = false;
                }
                Err(err) => {
                    warn!(error = %err, "stdin read failed; remote control disabled");
                    stdin_open = false;
                }
            },
        }
    }

    player.shutdown().await;
    Ok(())
}

/// Apply one remote control line: an integer code or a command name.
fn handle_command(player: &Player, line: &str) -> i32 {
    if let Ok(code) = line.parse::<i32>() {
        return player.remote_control(code);
    }
    match line.parse::<Command>() {
        Ok(command) => player.remote_control(command.code()),
        Err(_) => {
            warn!(command = line, "unrecognized remote control command");
            r_player_core::COMMAND_REJECTED
        }
    }
}

/// `R_PLAYER_CONFIG`, then `--config`, then `configs/player.toml`; defaults when none exist.
fn load_config(cli: &Cli) -> Result<AppConfig> {
    if let Some(path) = &cli.config {
        if !path.exists() {
            anyhow::bail!("settings file {} does not exist", path.display());
        }
    }
    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from(DEFAULT_CONFIG));
    let env_override = std::env::var_os(AppConfig::ENV_CONFIG_PATH).is_some_and(|v| !v.is_empty());

    let mut config = if env_override || candidates.iter().any(|path| path.exists()) {
        AppConfig::load_with_source(&candidates)?.config
    } else {
        AppConfig::default()
    };

    if let Some(path) = &cli.config_file {
        config.player.config_file = path.clone();
    }
    if let Some(path) = &cli.data_file {
        config.player.data_file = Some(path.clone());
    }
    if let Some(path) = &cli.output {
        config.sink.enabled = true;
        config.sink.output_file = path.clone();
    }
    if cli.autostart {
        config.player.autostart = true;
    }
    if cli.no_endless {
        config.player.endless = false;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format.into();
    }
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_apply_on_top_of_defaults() {
        let cli = Cli::parse_from([
            "r-playerd",
            "--config-file",
            "assets.csv",
            "--data-file",
            "data.csv",
            "--output",
            "out/samples.log",
            "--no-endless",
            "--log-format",
            "pretty",
        ]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.player.config_file, PathBuf::from("assets.csv"));
        assert_eq!(config.player.data_file, Some(PathBuf::from("data.csv")));
        assert!(config.sink.enabled);
        assert!(!config.player.endless);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn missing_settings_file_is_rejected() {
        let cli = Cli::parse_from(["r-playerd", "--config", "does/not/exist.toml"]);
        assert!(load_config(&cli).is_err());
    }
}
