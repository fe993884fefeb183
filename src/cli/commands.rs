//! CLI command implementations.
//!
//! Contains the glue between parsed arguments, configuration and the
//! library operations for each command.

use crate::analyze::{AnalyzeOptions, GpsSource, run_analysis};
use crate::cli::output::{
    OutputFormat, format_analysis, format_config, format_ignore_built, format_ignore_lists,
    format_launch, format_monitor_summary, format_probe_summaries, format_stalking,
    format_status_report, format_status_stopped,
};
use crate::cli::parser::{Cli, Commands, IgnoreCommands};
use crate::config::Config;
use crate::error::{CommandError, Result};
use crate::ignore::{IgnoreLists, build_from_capture, save_mac_list, save_ssid_list};
use crate::kismet::{KismetDb, newest, resolve};
use crate::probes::{ProbeAnalyzer, select_logs};
use crate::tracker::{MonitorOptions, run_monitor};
use crate::watch::{
    CommandRunner, LaunchSettings, Shutdown, StatusSettings, SystemRunner, check_once,
    launch_when_ready, run_status_loop,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Executes the CLI command against the real system.
///
/// Long-running commands stream to stdout and stop on SIGINT/SIGTERM.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let shutdown = match cli.command {
        Commands::Status { once: false, .. } | Commands::Launch { .. } | Commands::Monitor { .. } => {
            Shutdown::install()?
        }
        _ => Shutdown::new(),
    };
    let stdout = io::stdout();
    let mut out = stdout.lock();
    execute_with(cli, &SystemRunner, &shutdown, &mut out)
}

/// Executes the CLI command with an injected runner, stop flag and stream.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute_with(
    cli: &Cli,
    runner: &dyn CommandRunner,
    shutdown: &Shutdown,
    out: &mut dyn Write,
) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    if cli.no_color || format == OutputFormat::Json {
        colored::control::set_override(false);
    }
    let config_path = cli.get_config_path();
    let config = Config::load(&config_path)?;

    match &cli.command {
        Commands::Status {
            process,
            interface,
            interval,
            once,
        } => {
            let settings = StatusSettings {
                process: process.clone().unwrap_or_else(|| config.watch.process.clone()),
                interface: interface
                    .clone()
                    .unwrap_or_else(|| config.watch.interface.clone()),
                interval: Duration::from_secs(interval.unwrap_or(config.watch.status_interval)),
            };
            cmd_status(runner, &settings, *once, shutdown, out, format)
        }
        Commands::Launch {
            display,
            attempts,
            interval,
            log,
            command,
        } => {
            let settings = LaunchSettings {
                display: display.clone().unwrap_or_else(|| config.watch.display.clone()),
                interval: Duration::from_secs(interval.unwrap_or(config.watch.display_interval)),
                attempts: attempts.unwrap_or(config.watch.display_attempts),
                log_path: log.clone().unwrap_or_else(|| config.watch.launch_log.clone()),
                command: if command.is_empty() {
                    config.watch.launch_command.clone()
                } else {
                    command.clone()
                },
            };
            cmd_launch(runner, &settings, shutdown, format)
        }
        Commands::Monitor { kismet_db, cycles } => {
            let options = MonitorOptions {
                capture: kismet_db.clone(),
                max_cycles: *cycles,
            };
            cmd_monitor(&config, &options, shutdown, out, format)
        }
        Commands::Ignore(IgnoreCommands::Build { kismet_db }) => {
            cmd_ignore_build(&config, kismet_db.as_deref(), format)
        }
        Commands::Ignore(IgnoreCommands::Show) => cmd_ignore_show(&config, format),
        Commands::Probes {
            days,
            all_logs,
            log_dir,
        } => {
            let dir = log_dir.clone().unwrap_or_else(|| config.paths.log_dir.clone());
            let days_back = if *all_logs { 0 } else { *days };
            cmd_probes(&dir, days_back, format)
        }
        Commands::Analyze {
            kismet_db,
            demo,
            gps_file,
            output_json,
            stalking_only,
            min_threat,
        } => {
            let gps = match (demo, gps_file) {
                (true, _) => GpsSource::Demo,
                (false, Some(path)) => GpsSource::File(path.clone()),
                (false, None) => GpsSource::Captures,
            };
            let options = AnalyzeOptions {
                capture: kismet_db.clone(),
                gps,
                output_json: output_json.clone(),
                stalking_min_score: stalking_only.then_some(*min_threat),
            };
            cmd_analyze(&config, &options, *stalking_only, format)
        }
        Commands::Config => Ok(format_config(&config, &config_path, format)),
    }
}

// ==================== Command Implementations ====================

fn cmd_status(
    runner: &dyn CommandRunner,
    settings: &StatusSettings,
    once: bool,
    shutdown: &Shutdown,
    out: &mut dyn Write,
    format: OutputFormat,
) -> Result<String> {
    if once {
        let report = check_once(runner, settings);
        return Ok(format_status_report(&report, format));
    }
    let cycles = run_status_loop(runner, settings, shutdown, out, None)?;
    Ok(format_status_stopped(cycles, format))
}

fn cmd_launch(
    runner: &dyn CommandRunner,
    settings: &LaunchSettings,
    shutdown: &Shutdown,
    format: OutputFormat,
) -> Result<String> {
    let pid = launch_when_ready(runner, settings, shutdown)?;
    Ok(format_launch(&settings.command.join(" "), pid, format))
}

fn cmd_monitor(
    config: &Config,
    options: &MonitorOptions,
    shutdown: &Shutdown,
    out: &mut dyn Write,
    format: OutputFormat,
) -> Result<String> {
    let summary = run_monitor(config, options, shutdown, out)?;
    Ok(format_monitor_summary(&summary, format))
}

fn capture_path(config: &Config, explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => newest(&resolve(&config.paths.kismet_logs)?),
    }
}

fn cmd_ignore_build(config: &Config, kismet_db: Option<&Path>, format: OutputFormat) -> Result<String> {
    let capture = capture_path(config, kismet_db)?;
    let db = KismetDb::open(&capture)?;
    db.validate()?;
    let lists = build_from_capture(&db)?;

    let paths = &config.paths.ignore_lists;
    save_mac_list(&paths.mac, &lists.macs)?;
    save_ssid_list(&paths.ssid, &lists.ssids)?;
    Ok(format_ignore_built(&lists, &paths.mac, &paths.ssid, format))
}

fn cmd_ignore_show(config: &Config, format: OutputFormat) -> Result<String> {
    let paths = &config.paths.ignore_lists;
    let lists = IgnoreLists::load(&paths.mac, &paths.ssid)?;
    Ok(format_ignore_lists(&lists, format))
}

fn cmd_probes(dir: &Path, days_back: u64, format: OutputFormat) -> Result<String> {
    if !dir.is_dir() {
        return Err(CommandError::InvalidArgument(format!(
            "log directory not found: {}",
            dir.display()
        ))
        .into());
    }
    let files = select_logs(dir, days_back, chrono::Local::now().date_naive())?;
    let mut analyzer = ProbeAnalyzer::new();
    analyzer.add_files(&files);
    Ok(format_probe_summaries(analyzer.files_read(), &analyzer.summaries(), format))
}

fn cmd_analyze(
    config: &Config,
    options: &AnalyzeOptions,
    stalking_only: bool,
    format: OutputFormat,
) -> Result<String> {
    let results = run_analysis(config, options, chrono::Local::now())?;
    if stalking_only {
        return Ok(format_stalking(
            results.stalking.as_deref().unwrap_or_default(),
            format,
        ));
    }
    Ok(format_analysis(&results, format))
}
