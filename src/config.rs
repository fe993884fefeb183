//! Station configuration.
//!
//! Loaded from a JSON file; every field has a default so a missing file
//! yields a working configuration. Command-line flags override individual
//! values after loading.

use crate::error::{Error, IoError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Complete station configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File system locations.
    pub paths: PathsConfig,
    /// Live tracker timing.
    pub timing: TimingConfig,
    /// Optional geographic bounding box.
    pub search: SearchArea,
    /// Watchdog and launcher settings.
    pub watch: WatchConfig,
    /// Surveillance detection thresholds.
    pub detection: DetectionConfig,
}

/// File system locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory for session logs and the event log.
    pub log_dir: PathBuf,
    /// Kismet capture pattern (`*` wildcards allowed in the file name).
    pub kismet_logs: String,
    /// Ignore list files.
    pub ignore_lists: IgnoreListPaths,
    /// Directory for Markdown surveillance reports.
    pub reports_dir: PathBuf,
    /// Directory for KML exports.
    pub kml_dir: PathBuf,
    /// Optional file that receives a copy of all diagnostic logging.
    pub security_log: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("./logs"),
            kismet_logs: "/home/pi/kismet_logs/*.kismet".to_string(),
            ignore_lists: IgnoreListPaths::default(),
            reports_dir: PathBuf::from("surveillance_reports"),
            kml_dir: PathBuf::from("kml_files"),
            security_log: None,
        }
    }
}

/// Locations of the MAC and SSID ignore lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreListPaths {
    /// MAC ignore list.
    pub mac: PathBuf,
    /// SSID ignore list.
    pub ssid: PathBuf,
}

impl Default for IgnoreListPaths {
    fn default() -> Self {
        Self {
            mac: PathBuf::from("ignore_lists/mac_list.json"),
            ssid: PathBuf::from("ignore_lists/ssid_list.json"),
        }
    }
}

/// Live tracker timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Seconds between activity checks.
    pub check_interval: u64,
    /// Number of checks between window rotations.
    pub list_update_interval: u64,
    /// Window boundaries in minutes.
    pub time_windows: TimeWindowMinutes,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            check_interval: 60,
            list_update_interval: 5,
            time_windows: TimeWindowMinutes::default(),
        }
    }
}

/// Minutes back from "now" for each tracking window edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeWindowMinutes {
    /// Edge of the most recent window.
    pub recent: i64,
    /// Edge of the second window.
    pub medium: i64,
    /// Edge of the third window.
    pub old: i64,
    /// Edge of the oldest window.
    pub oldest: i64,
}

impl Default for TimeWindowMinutes {
    fn default() -> Self {
        Self {
            recent: 5,
            medium: 10,
            old: 15,
            oldest: 20,
        }
    }
}

/// Optional bounding box restricting geographic lookups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchArea {
    /// Southern edge.
    pub lat_min: Option<f64>,
    /// Northern edge.
    pub lat_max: Option<f64>,
    /// Western edge.
    pub lon_min: Option<f64>,
    /// Eastern edge.
    pub lon_max: Option<f64>,
}

impl SearchArea {
    /// Returns true when all four edges are set.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.lat_min.is_some()
            && self.lat_max.is_some()
            && self.lon_min.is_some()
            && self.lon_max.is_some()
    }

    /// Returns true when the point lies inside the box.
    ///
    /// An incomplete box contains every point.
    #[must_use]
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        match (self.lat_min, self.lat_max, self.lon_min, self.lon_max) {
            (Some(a), Some(b), Some(c), Some(d)) => (a..=b).contains(&lat) && (c..=d).contains(&lon),
            _ => true,
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.is_complete() {
            return Ok(());
        }
        let (lat_min, lat_max) = (self.lat_min.unwrap_or_default(), self.lat_max.unwrap_or_default());
        let (lon_min, lon_max) = (self.lon_min.unwrap_or_default(), self.lon_max.unwrap_or_default());
        if !(-90.0..=90.0).contains(&lat_min) || !(-90.0..=90.0).contains(&lat_max) {
            return Err(config_error("search latitude must be within -90..90"));
        }
        if !(-180.0..=180.0).contains(&lon_min) || !(-180.0..=180.0).contains(&lon_max) {
            return Err(config_error("search longitude must be within -180..180"));
        }
        if lat_min >= lat_max || lon_min >= lon_max {
            return Err(config_error("search area minimums must be below maximums"));
        }
        Ok(())
    }
}

/// Watchdog and display launcher settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Process name checked with `pgrep`.
    pub process: String,
    /// Wireless interface checked with `iwconfig`.
    pub interface: String,
    /// Seconds between watchdog checks.
    pub status_interval: u64,
    /// X display to wait for.
    pub display: String,
    /// Seconds between display polls.
    pub display_interval: u64,
    /// Maximum number of display polls.
    pub display_attempts: u32,
    /// Append-only launcher log.
    pub launch_log: PathBuf,
    /// Program and arguments started once the display is up.
    pub launch_command: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            process: "kismet".to_string(),
            interface: "wlan0mon".to_string(),
            status_interval: 10,
            display: ":0".to_string(),
            display_interval: 15,
            display_attempts: 20,
            launch_log: PathBuf::from("gui_startup.log"),
            launch_command: vec!["./start_gui.sh".to_string()],
        }
    }
}

/// Surveillance detection thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Appearances needed before a device is scored.
    pub min_appearances: usize,
    /// Minimum span between first and last appearance.
    pub min_time_span_hours: f64,
    /// Score a device must exceed to be reported.
    pub min_persistence_score: f64,
    /// Captures modified within this many hours are analysed together.
    pub analysis_window_hours: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_appearances: 3,
            min_time_span_hours: 1.0,
            min_persistence_score: 0.5,
            analysis_window_hours: 24,
        }
    }
}

impl Config {
    /// Loads configuration from `path`.
    ///
    /// A missing file yields the defaults; unreadable or malformed files are
    /// errors.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| IoError::ReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let config = Self::from_json(&content)?;
        tracing::info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Parses and validates configuration from JSON text.
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content).map_err(|e| Error::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.timing.check_interval == 0 {
            return Err(config_error("timing.check_interval must be positive"));
        }
        if self.timing.list_update_interval == 0 {
            return Err(config_error("timing.list_update_interval must be positive"));
        }
        let w = self.timing.time_windows;
        if !(0 < w.recent && w.recent < w.medium && w.medium < w.old && w.old < w.oldest) {
            return Err(config_error(
                "timing.time_windows must be positive and strictly increasing",
            ));
        }
        if self.watch.display_attempts == 0 {
            return Err(config_error("watch.display_attempts must be positive"));
        }
        if self.watch.launch_command.is_empty() {
            return Err(config_error("watch.launch_command must name a program"));
        }
        if !(0.0..=1.0).contains(&self.detection.min_persistence_score) {
            return Err(config_error(
                "detection.min_persistence_score must be within 0..1",
            ));
        }
        self.search.validate()
    }
}

fn config_error(message: &str) -> Error {
    Error::Config {
        message: message.to_string(),
    }
}
