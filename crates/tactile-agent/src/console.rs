//! Line-oriented control console on stdin.

use std::fmt::Write as _;
use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use tactile_bridge::{Bridge, DeviceView};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Printed by `help` and after an unknown command.
pub const USAGE: &str = "\
commands:
  status               transport state and bound address
  devices              re-enumerate devices and show mappings
  pulse <serial> [ms]  fire a test pulse
  restart              restart the transport with current settings
  help                 show this message
  quit | exit          stop the bridge and exit";

/// A parsed console command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Show transport status.
    Status,
    /// Refresh and list devices.
    Devices,
    /// Test pulse, optionally with an explicit length.
    Pulse {
        /// Device serial.
        serial: String,
        /// Pulse length; the configured default when absent.
        duration: Option<Duration>,
    },
    /// Restart the transport.
    Restart,
    /// Show usage.
    Help,
    /// Leave.
    Quit,
}

/// Why a line could not be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// First word is not a command.
    #[error("unknown command: {0}")]
    Unknown(String),
    /// `pulse` without a serial.
    #[error("usage: pulse <serial> [ms]")]
    MissingSerial,
    /// Pulse length is not a positive integer.
    #[error("invalid pulse length: {0}")]
    InvalidDuration(String),
    /// Extra words after a complete command.
    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>, ParseError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };

    let command = match head.to_lowercase().as_str() {
        "status" => Command::Status,
        "devices" => Command::Devices,
        "restart" => Command::Restart,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        "pulse" => {
            let serial = words.next().ok_or(ParseError::MissingSerial)?.to_string();
            let duration = words
                .next()
                .map(|ms| match ms.parse::<u64>() {
                    Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
                    _ => Err(ParseError::InvalidDuration(ms.to_string())),
                })
                .transpose()?;
            Command::Pulse { serial, duration }
        }
        other => return Err(ParseError::Unknown(other.to_string())),
    };

    match words.next() {
        Some(extra) => Err(ParseError::UnexpectedArgument(extra.to_string())),
        None => Ok(Some(command)),
    }
}

/// Result of running a command.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Text to print.
    Reply(String),
    /// The user asked to leave.
    Quit,
}

/// Run one command against the bridge.
pub async fn execute(bridge: &Bridge, command: Command) -> Outcome {
    let reply = match command {
        Command::Status => status_line(bridge),
        Command::Devices => match bridge.refresh_devices().await {
            Ok(views) => format_devices(&views),
            Err(e) => format!("device enumeration failed: {e}"),
        },
        Command::Pulse { serial, duration } => {
            let result = match duration {
                Some(duration) => bridge.registry().pulse(&serial, duration),
                None => bridge.pulse_test(&serial),
            };
            match result {
                Ok(()) => format!("pulsing {serial}"),
                Err(e) => format!("pulse failed: {e}"),
            }
        }
        Command::Restart => match bridge.restart().await {
            Ok(addr) => format!("restarted, listening on {addr}"),
            Err(e) => format!("restart failed: {e}"),
        },
        Command::Help => USAGE.to_string(),
        Command::Quit => return Outcome::Quit,
    };
    Outcome::Reply(reply)
}

fn status_line(bridge: &Bridge) -> String {
    let supervisor = bridge.supervisor();
    let kind = supervisor
        .kind()
        .map_or_else(|| bridge.settings().transport.kind.to_string(), |k| k.to_string());
    let mut line = format!("{kind} {}", bridge.state());
    if let Some(addr) = bridge.local_addr() {
        let _ = write!(line, " on {addr}");
    }
    let _ = write!(
        line,
        ", {} device(s), {} malformed message(s)",
        bridge.registry().len(),
        supervisor.decode_errors()
    );
    line
}

/// Render devices as an aligned table.
pub fn format_devices(views: &[DeviceView]) -> String {
    if views.is_empty() {
        return "no devices".to_string();
    }
    let serial_width = views.iter().map(|v| v.serial.len()).max().unwrap_or(0).max(6);
    let model_width = views.iter().map(|v| v.model.len()).max().unwrap_or(0).max(5);
    let mut out = format!(
        "{:<5} {:<serial_width$} {:<model_width$} {:<5} ADDRESS\n",
        "INDEX", "SERIAL", "MODEL", "MULT"
    );
    for view in views {
        let _ = writeln!(
            out,
            "{:<5} {:<serial_width$} {:<model_width$} {:<5.2} {}",
            view.index,
            view.serial,
            view.model,
            view.multiplier,
            view.address.as_deref().unwrap_or("-"),
        );
    }
    out.truncate(out.trim_end().len());
    out
}

/// Read commands from stdin until `quit`, end of input, or cancellation.
///
/// `quit` cancels `shutdown`. End of input only ends the console.
pub async fn run(bridge: Arc<Bridge>, shutdown: CancellationToken) {
    let mut lines = spawn_stdin_reader();
    println!("{USAGE}");

    loop {
        let line = tokio::select! {
            () = shutdown.cancelled() => break,
            line = lines.recv() => line,
        };
        let Some(line) = line else {
            debug!("console input closed");
            break;
        };

        match parse_command(&line) {
            Ok(None) => {}
            Ok(Some(command)) => match execute(&bridge, command).await {
                Outcome::Reply(text) => println!("{text}"),
                Outcome::Quit => {
                    shutdown.cancel();
                    break;
                }
            },
            Err(e) => println!("{e}\n{USAGE}"),
        }
    }
}

/// Blocking stdin reads live on a detached thread so a pending read never
/// holds up runtime shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    let spawned = std::thread::Builder::new()
        .name("console-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "console read failed");
                        break;
                    }
                }
            }
        });
    if let Err(e) = spawned {
        warn!(error = %e, "console unavailable");
    }
    rx
}
