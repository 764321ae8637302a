//! # tactile-agent
//!
//! Tactile bridge binary. Loads settings, wires the device backend into the
//! bridge, starts the configured transport and runs the control console.

#![deny(unsafe_code)]

mod console;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tactile_bridge::Bridge;
use tactile_core::TransportKind;
use tactile_devices::SimulatedBackend;
use tactile_settings::{
    BridgeSettings, LogLevel, SettingsWatcher, apply_env_overrides, check_integrity,
    load_settings_file, save_settings, settings_path,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Tactile haptic bridge.
#[derive(Parser, Debug)]
#[command(name = "tactile-agent", version, about = "Bridge OSC/WebSocket parameters to haptic devices")]
struct Cli {
    /// Settings file (defaults to `$TACTILE_SETTINGS` or `~/.tactile/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Log level (overrides settings and `TACTILE_LOG_LEVEL`).
    #[arg(long, global = true, value_parser = parse_log_level)]
    log_level: Option<LogLevel>,

    /// Emit JSON log lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the bridge (default).
    Run(RunArgs),
    /// Print enumerated devices with their mappings.
    Devices {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Validate the settings file and report repairs.
    Check,
}

#[derive(Args, Clone, Copy, Debug, Default)]
struct RunArgs {
    /// Transport variant for this run.
    #[arg(long, value_parser = parse_transport)]
    transport: Option<TransportKind>,

    /// Do not read commands from stdin.
    #[arg(long)]
    no_console: bool,
}

fn parse_log_level(value: &str) -> Result<LogLevel, String> {
    LogLevel::parse(value).ok_or_else(|| format!("unknown log level: {value}"))
}

fn parse_transport(value: &str) -> Result<TransportKind, String> {
    TransportKind::parse(value).ok_or_else(|| format!("unknown transport: {value}"))
}

impl Cli {
    fn settings_path(&self) -> PathBuf {
        self.settings.clone().unwrap_or_else(settings_path)
    }

    /// CLI flag, then `TACTILE_LOG_LEVEL`, then the file.
    fn log_level(&self, file: &BridgeSettings) -> LogLevel {
        self.log_level
            .or_else(|| {
                std::env::var("TACTILE_LOG_LEVEL")
                    .ok()
                    .and_then(|v| LogLevel::parse(&v))
            })
            .unwrap_or(file.logging.level)
    }
}

fn init_logging(cli: &Cli, file: &BridgeSettings) {
    let level = cli.log_level(file).as_filter_str();
    if cli.json_logs || file.logging.json {
        tactile_logging::init_json_subscriber(level);
    } else {
        tactile_logging::init_subscriber(level);
    }
}

/// Load the file, repair it and write repairs back, then layer the
/// environment on top.
fn prepare_settings(path: &Path, mut file: BridgeSettings) -> Result<BridgeSettings> {
    let issues = check_integrity(&mut file);
    if !issues.is_empty() || !path.exists() {
        save_settings(path, &file)
            .with_context(|| format!("Failed to save settings: {}", path.display()))?;
        info!(path = %path.display(), repaired = issues.len(), "settings saved");
    }
    let mut settings = file;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

fn build_bridge(settings: &BridgeSettings) -> Arc<Bridge> {
    // nothing in the agent reads the call log
    let backend = Arc::new(
        SimulatedBackend::new(settings.devices.simulated.clone()).with_call_capacity(0),
    );
    Arc::new(Bridge::new(settings.clone(), backend))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let path = cli.settings_path();

    if matches!(cli.command, Some(Command::Check)) {
        return check(&path);
    }

    let file = load_settings_file(&path)
        .with_context(|| format!("Failed to load settings: {}", path.display()))?;
    init_logging(&cli, &file);
    let settings = prepare_settings(&path, file)?;

    match cli.command {
        Some(Command::Devices { json }) => devices(&settings, json).await,
        Some(Command::Run(args)) => run(&path, settings, args).await,
        Some(Command::Check) | None => run(&path, settings, RunArgs::default()).await,
    }
}

fn check(path: &Path) -> Result<()> {
    let mut settings = load_settings_file(path)
        .with_context(|| format!("Failed to load settings: {}", path.display()))?;
    let issues = check_integrity(&mut settings);
    if issues.is_empty() {
        println!("{}: ok", path.display());
    } else {
        println!("{}: {} issue(s)", path.display(), issues.len());
        for issue in &issues {
            println!("  {issue}");
        }
    }
    Ok(())
}

async fn devices(settings: &BridgeSettings, json: bool) -> Result<()> {
    let bridge = build_bridge(settings);
    let views = bridge
        .refresh_devices()
        .await
        .context("Failed to enumerate devices")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&views)?);
    } else {
        println!("{}", console::format_devices(&views));
    }
    Ok(())
}

async fn run(path: &Path, mut settings: BridgeSettings, args: RunArgs) -> Result<()> {
    if let Some(kind) = args.transport {
        settings.transport.kind = kind;
    }
    info!(
        version = tactile_core::constants::VERSION,
        transport = %settings.transport.kind,
        settings = %path.display(),
        "starting tactile bridge"
    );

    let bridge = build_bridge(&settings);
    let shutdown = CancellationToken::new();

    let status_task = tokio::spawn(log_status(Arc::clone(&bridge)));

    match bridge.start().await {
        Ok(addr) => info!(%addr, "bridge listening"),
        Err(e) => error!(error = %e, "bridge failed to start; use `restart` once the endpoint is free"),
    }
    match bridge.refresh_devices().await {
        Ok(views) => info!(count = views.len(), "devices enumerated"),
        Err(e) => warn!(error = %e, "device enumeration failed"),
    }

    let watcher = watch_settings(path, &bridge, args.transport);

    if !args.no_console {
        drop(tokio::spawn(console::run(
            Arc::clone(&bridge),
            shutdown.clone(),
        )));
    }

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "failed to listen for ctrl-c");
            }
            info!("interrupt received, shutting down");
        }
        () = shutdown.cancelled() => info!("quit requested, shutting down"),
    }
    shutdown.cancel();

    drop(watcher);
    bridge.shutdown().await;
    status_task.abort();
    info!("tactile bridge stopped");
    Ok(())
}

/// Reload settings on file changes. A `--transport` override survives reloads.
///
/// Reloads are applied in arrival order by a single task that ends when the
/// watcher is dropped.
fn watch_settings(
    path: &Path,
    bridge: &Arc<Bridge>,
    transport: Option<TransportKind>,
) -> Option<SettingsWatcher> {
    let (tx, rx) = mpsc::unbounded_channel();
    let watcher = SettingsWatcher::spawn(path, move |mut settings| {
        if let Some(kind) = transport {
            settings.transport.kind = kind;
        }
        let _ = tx.send(settings);
    });
    match watcher {
        Ok(watcher) => {
            drop(tokio::spawn(apply_reloads(Arc::clone(bridge), rx)));
            Some(watcher)
        }
        Err(e) => {
            warn!(error = %e, "settings hot reload disabled");
            None
        }
    }
}

async fn apply_reloads(bridge: Arc<Bridge>, mut reloads: mpsc::UnboundedReceiver<BridgeSettings>) {
    while let Some(settings) = reloads.recv().await {
        bridge.apply_settings(settings).await;
    }
    debug!("settings reloads stopped");
}

async fn log_status(bridge: Arc<Bridge>) {
    let mut status = bridge.subscribe_status();
    loop {
        match status.recv().await {
            Ok(change) => info!(%change, "transport status"),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "status notifications dropped"),
            Err(RecvError::Closed) => break,
        }
    }
}
