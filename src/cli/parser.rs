//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use crate::config::DEFAULT_CONFIG_PATH;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// tailwatch: wireless counter-surveillance companion for Kismet.
///
/// Watches the capture stack, tracks devices that keep reappearing and
/// analyses captures for persistent followers.
#[derive(Parser, Debug)]
#[command(name = "tailwatch")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the JSON configuration file.
    ///
    /// Defaults to `config.json` in the current directory; a missing file
    /// means built-in defaults.
    #[arg(short, long, env = "TAILWATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// Also write logs to this file.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Disable colored output (`NO_COLOR` is honoured too).
    #[arg(long, global = true)]
    pub no_color: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Report whether the capture process runs and the interface is in
    /// monitor mode.
    Status {
        /// Process name to look for.
        #[arg(short, long)]
        process: Option<String>,

        /// Wireless interface to inspect.
        #[arg(short, long)]
        interface: Option<String>,

        /// Seconds between checks.
        #[arg(long)]
        interval: Option<u64>,

        /// Check once and exit.
        #[arg(long)]
        once: bool,
    },

    /// Wait for the X display, then start the GUI in the background.
    Launch {
        /// X display to wait for.
        #[arg(short, long)]
        display: Option<String>,

        /// Maximum display checks (at least 1).
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        attempts: Option<u32>,

        /// Seconds between display checks.
        #[arg(long)]
        interval: Option<u64>,

        /// Launcher log file.
        #[arg(long)]
        log: Option<PathBuf>,

        /// Program and arguments to start.
        #[arg(last = true)]
        command: Vec<String>,
    },

    /// Track devices reappearing across time windows in the live capture.
    Monitor {
        /// Capture database to read instead of the newest one.
        #[arg(short = 'k', long)]
        kismet_db: Option<PathBuf>,

        /// Stop after this many cycles.
        #[arg(long)]
        cycles: Option<u64>,
    },

    /// Build or show the MAC and SSID ignore lists.
    #[command(subcommand)]
    Ignore(IgnoreCommands),

    /// Summarise probe requests recorded in session logs.
    Probes {
        /// Only read logs from the last N days.
        #[arg(short, long, default_value = "14")]
        days: u64,

        /// Read every session log regardless of age.
        #[arg(long)]
        all_logs: bool,

        /// Directory holding the session logs.
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },

    /// Score devices for persistence and write the report and KML map.
    Analyze {
        /// Analyze this capture only.
        #[arg(short = 'k', long)]
        kismet_db: Option<PathBuf>,

        /// Use the built-in demonstration route for locations.
        #[arg(long, conflicts_with = "gps_file")]
        demo: bool,

        /// JSON file of `[lat, lon, "name"]` route points.
        #[arg(long)]
        gps_file: Option<PathBuf>,

        /// Write the results as JSON to this file.
        #[arg(short, long)]
        output_json: Option<PathBuf>,

        /// Only print stalking candidates.
        #[arg(long)]
        stalking_only: bool,

        /// Minimum persistence score for stalking candidates.
        #[arg(long, default_value = "0.5")]
        min_threat: f64,
    },

    /// Print the effective configuration.
    Config,
}

/// Ignore list subcommands.
#[derive(Subcommand, Debug)]
pub enum IgnoreCommands {
    /// Replace both lists with every MAC and probed SSID in a capture.
    Build {
        /// Capture to read instead of the newest one.
        #[arg(short = 'k', long)]
        kismet_db: Option<PathBuf>,
    },

    /// Show the current lists.
    Show,
}

impl Cli {
    /// Returns the config path, using the default if not specified.
    #[must_use]
    pub fn get_config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_config_path() {
        let cli = Cli::parse_from(["tailwatch", "config"]);
        assert_eq!(cli.get_config_path(), PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn test_launch_trailing_command() {
        let cli = Cli::parse_from(["tailwatch", "launch", "--attempts", "3", "--", "./gui.sh", "-f"]);
        let Commands::Launch {
            attempts, command, ..
        } = cli.command
        else {
            unreachable!("parsed a launch command");
        };
        assert_eq!(attempts, Some(3));
        assert_eq!(command, vec!["./gui.sh".to_string(), "-f".to_string()]);
    }

    #[test]
    fn test_launch_rejects_zero_attempts() {
        let result = Cli::try_parse_from(["tailwatch", "launch", "--attempts", "0", "--", "true"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_min_threat_default() {
        let cli = Cli::parse_from(["tailwatch", "analyze", "--stalking-only"]);
        let Commands::Analyze {
            min_threat,
            stalking_only,
            ..
        } = cli.command
        else {
            unreachable!("parsed an analyze command");
        };
        assert!(stalking_only);
        assert!((min_threat - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_demo_conflicts_with_gps_file() {
        let result = Cli::try_parse_from(["tailwatch", "analyze", "--demo", "--gps-file", "route.json"]);
        assert!(result.is_err());
    }
}
