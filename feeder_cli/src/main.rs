#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod commands;
mod error_fmt;

use clap::Parser;
use cli::{Cli, FILE_GUARD, JSON_MODE};
use eyre::{Result, WrapErr};
use std::path::Path;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = color_eyre::install() {
        eprintln!("color-eyre not installed: {e}");
    }

    if let Err(err) = real_main(cli) {
        let json = JSON_MODE.get().copied().unwrap_or(false);
        if json {
            eprintln!("{}", error_fmt::format_error_json(&err));
        } else {
            eprintln!("{}", error_fmt::humanize(&err));
        }
        tracing::debug!(error = ?err, "command failed");
        std::process::exit(error_fmt::exit_code_for_error(&err));
    }
}

fn real_main(cli: Cli) -> Result<()> {
    let cfg = load_config(&cli.config)?;
    init_tracing(&cli, &cfg.logging)?;
    tracing::info!(config = %cli.config.display(), port = %cfg.serial.port, "feeder starting");

    #[cfg(feature = "hardware")]
    if !cli.sim {
        return commands::execute(
            cli.cmd,
            &cfg,
            feeder_hardware::SerialPortConnector,
            cli.json,
        );
    }

    #[cfg(not(feature = "hardware"))]
    if !cli.sim {
        tracing::debug!("built without hardware support; using the simulated board");
    }

    let connector = sim_connector(&cfg.serial.port);
    commands::execute(cli.cmd, &cfg, connector, cli.json)
}

/// Read and validate the config. A missing file yields defaults.
fn load_config(path: &Path) -> Result<feeder_config::Config> {
    let cfg = if path.exists() {
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("reading config {}", path.display()))?;
        feeder_config::load_toml(&text)?
    } else {
        feeder_config::Config::default()
    };
    cfg.validate()?;
    Ok(cfg)
}

/// Simulated board. `FEEDER_SIM_PORTS` (comma separated) replaces the port
/// list; `FEEDER_SIM_SILENT=1` makes the board ignore PING.
fn sim_connector(configured: &str) -> feeder_hardware::SimulatedConnector {
    let ports = match std::env::var("FEEDER_SIM_PORTS") {
        Ok(list) => list
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect(),
        Err(_) => vec![configured.to_string()],
    };
    let connector = feeder_hardware::SimulatedConnector::new(ports);
    if std::env::var("FEEDER_SIM_SILENT").is_ok_and(|v| v == "1") {
        connector.handle().set_answer_ping(false);
    }
    connector
}

fn init_tracing(cli: &Cli, logging: &feeder_config::Logging) -> Result<()> {
    // RUST_LOG wins; [logging] level only replaces the default --log-level.
    let level = logging
        .level
        .as_deref()
        .filter(|_| cli.log_level == "warn")
        .unwrap_or(&cli.log_level);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid log level {level:?}"))?;

    let file_writer = match logging.file.as_deref() {
        Some(file) => {
            let path = Path::new(file);
            let dir = path.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path.file_name().map_or_else(|| "feeder.log".into(), |n| n.to_os_string());
            let appender = match logging.rotation.as_deref() {
                Some("daily") => tracing_appender::rolling::daily(dir, name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(writer)
        }
        None => None,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    let installed = match (cli.json, file_writer) {
        (true, Some(w)) => builder.json().with_writer(std::io::stderr.and(w)).try_init(),
        (true, None) => builder.json().with_writer(std::io::stderr).try_init(),
        (false, Some(w)) => builder.with_writer(std::io::stderr.and(w)).try_init(),
        (false, None) => builder.with_writer(std::io::stderr).try_init(),
    };
    if let Err(e) = installed {
        eprintln!("tracing already initialized: {e}");
    }
    Ok(())
}
