//! Process and monitor-mode watchdog.

use super::{CommandRunner, CommandSpec, Shutdown};
use crate::error::Result;
use colored::Colorize;
use serde::Serialize;
use std::io::Write;
use std::time::Duration;

/// Liveness of the watched process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum ProcessState {
    /// `pgrep` found a match.
    Running,
    /// `pgrep` found nothing.
    Stopped,
    /// `pgrep` failed or returned an unexpected status.
    Unknown(String),
}

/// Mode of the watched wireless interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum InterfaceState {
    /// Interface is in monitor mode.
    Monitor,
    /// Interface exists in another mode (e.g. `Managed`).
    Managed(String),
    /// Interface does not exist.
    Missing,
    /// `iwconfig` failed or printed no mode.
    Unknown(String),
}

/// What the watchdog checks and how often.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSettings {
    /// Process name for `pgrep`.
    pub process: String,
    /// Interface name for `iwconfig`.
    pub interface: String,
    /// Pause between checks.
    pub interval: Duration,
}

/// Result of one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Local time of the check.
    pub timestamp: String,
    /// Process checked.
    pub process_name: String,
    /// Process liveness.
    pub process: ProcessState,
    /// Interface checked.
    pub interface_name: String,
    /// Interface mode.
    pub interface: InterfaceState,
}

impl StatusReport {
    /// True when the process runs and the interface is in monitor mode.
    #[must_use]
    pub fn healthy(&self) -> bool {
        self.process == ProcessState::Running && self.interface == InterfaceState::Monitor
    }

    /// Colored status lines, timestamp header first.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        let process = match &self.process {
            ProcessState::Running => format!("✓ {} is running", self.process_name).green(),
            ProcessState::Stopped => format!("✗ {} is not running", self.process_name).red(),
            ProcessState::Unknown(reason) => {
                format!("? {} status unknown ({reason})", self.process_name).yellow()
            }
        };
        let interface = match &self.interface {
            InterfaceState::Monitor => {
                format!("✓ {} is in monitor mode", self.interface_name).green()
            }
            InterfaceState::Managed(mode) => format!(
                "✗ {} is not in monitor mode (Mode:{mode})",
                self.interface_name
            )
            .red(),
            InterfaceState::Missing => format!("✗ {} not found", self.interface_name).red(),
            InterfaceState::Unknown(reason) => {
                format!("? {} status unknown ({reason})", self.interface_name).yellow()
            }
        };
        vec![
            format!("--- {} ---", self.timestamp).bold().to_string(),
            process.to_string(),
            interface.to_string(),
        ]
    }
}

/// Checks the process with `pgrep`.
pub fn check_process(runner: &dyn CommandRunner, process: &str) -> ProcessState {
    match runner.run(&CommandSpec::new("pgrep", [process])) {
        Ok(out) => match out.code {
            Some(0) => ProcessState::Running,
            Some(1) => ProcessState::Stopped,
            Some(code) => ProcessState::Unknown(format!("pgrep exited with {code}")),
            None => ProcessState::Unknown("pgrep killed by signal".to_string()),
        },
        Err(e) => {
            tracing::warn!(process, error = %e, "process check failed");
            ProcessState::Unknown(e.to_string())
        }
    }
}

/// Checks the interface mode with `iwconfig`.
pub fn check_interface(runner: &dyn CommandRunner, interface: &str) -> InterfaceState {
    let out = match runner.run(&CommandSpec::new("iwconfig", [interface])) {
        Ok(out) => out,
        Err(e) => {
            tracing::warn!(interface, error = %e, "interface check failed");
            return InterfaceState::Unknown(e.to_string());
        }
    };

    if out.stdout.contains("No such device") || out.stderr.contains("No such device") || !out.success()
    {
        return InterfaceState::Missing;
    }
    parse_mode(&out.stdout)
}

/// Extracts the interface mode from `iwconfig` output.
#[must_use]
pub fn parse_mode(stdout: &str) -> InterfaceState {
    if stdout.contains("Mode:Monitor") {
        return InterfaceState::Monitor;
    }
    stdout
        .split_whitespace()
        .find_map(|token| token.strip_prefix("Mode:"))
        .map_or_else(
            || InterfaceState::Unknown("no mode reported".to_string()),
            |mode| InterfaceState::Managed(mode.to_string()),
        )
}

/// Runs both checks once.
pub fn check_once(runner: &dyn CommandRunner, settings: &StatusSettings) -> StatusReport {
    let report = StatusReport {
        timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        process_name: settings.process.clone(),
        process: check_process(runner, &settings.process),
        interface_name: settings.interface.clone(),
        interface: check_interface(runner, &settings.interface),
    };
    tracing::debug!(healthy = report.healthy(), "status check complete");
    report
}

/// Prints a status block every interval until shutdown or `max_cycles`.
///
/// Returns the number of checks performed.
pub fn run_status_loop(
    runner: &dyn CommandRunner,
    settings: &StatusSettings,
    shutdown: &Shutdown,
    out: &mut dyn Write,
    max_cycles: Option<u64>,
) -> Result<u64> {
    let mut cycles = 0;
    tracing::info!(
        process = %settings.process,
        interface = %settings.interface,
        interval_secs = settings.interval.as_secs(),
        "status watchdog started"
    );

    while !shutdown.is_triggered() {
        let report = check_once(runner, settings);
        for line in report.lines() {
            writeln!(out, "{line}")?;
        }
        out.flush()?;
        cycles += 1;

        if max_cycles.is_some_and(|max| cycles >= max) {
            break;
        }
        if !shutdown.sleep(settings.interval) {
            break;
        }
    }

    tracing::info!(cycles, "status watchdog stopped");
    Ok(cycles)
}
