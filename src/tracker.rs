//! Live reappearance tracker.
//!
//! Devices and probed SSIDs are bucketed into four consecutive five-minute
//! windows. Anything currently active that also sits in an older window is
//! reported: a device that keeps showing up over twenty minutes is worth a
//! second look.

use crate::config::Config;
use crate::error::{IoError, Result};
use crate::events::{Event, ProbeEvent, append_events};
use crate::ignore::{IgnoreCounts, IgnoreLists};
use crate::kismet::{KismetDb, KismetDevice, TimeBoundaries, TimeWindows, newest, resolve};
use crate::validate::normalize_mac;
use crate::watch::Shutdown;
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the JSON-lines event log inside the log directory.
pub const EVENT_LOG_NAME: &str = "events.jsonl";

/// Prefix of session log file names.
pub const SESSION_LOG_PREFIX: &str = "cyt_log_";

/// One of the four tracking windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    /// Seen in the past five minutes.
    PastFive,
    /// Seen five to ten minutes ago.
    FiveToTen,
    /// Seen ten to fifteen minutes ago.
    TenToFifteen,
    /// Seen fifteen to twenty minutes ago.
    FifteenToTwenty,
}

impl Window {
    /// All windows, newest first.
    pub const ALL: [Self; 4] = [
        Self::PastFive,
        Self::FiveToTen,
        Self::TenToFifteen,
        Self::FifteenToTwenty,
    ];

    /// Windows checked for repeats.
    pub const OLDER: [Self; 3] = [Self::FiveToTen, Self::TenToFifteen, Self::FifteenToTwenty];

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::PastFive => "past 5 minutes",
            Self::FiveToTen => "5-10 minutes ago",
            Self::TenToFifteen => "10-15 minutes ago",
            Self::FifteenToTwenty => "15-20 minutes ago",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::PastFive => 0,
            Self::FiveToTen => 1,
            Self::TenToFifteen => 2,
            Self::FifteenToTwenty => 3,
        }
    }

    /// `(start, end)` query range for this window.
    const fn range(self, b: &TimeBoundaries) -> (i64, Option<i64>) {
        match self {
            Self::PastFive => (b.recent, None),
            Self::FiveToTen => (b.medium, Some(b.recent)),
            Self::TenToFifteen => (b.old, Some(b.medium)),
            Self::FifteenToTwenty => (b.oldest, Some(b.old)),
        }
    }
}

/// Something worth reporting about current activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alert {
    /// A device probed for a network that is not ignored.
    Probe {
        /// Probing device.
        mac: String,
        /// Requested SSID.
        ssid: String,
    },
    /// A probed SSID was also probed in an older window.
    RepeatedProbe {
        /// Requested SSID.
        ssid: String,
        /// Older window it was seen in.
        window: Window,
    },
    /// A device seen now was also seen in an older window.
    Reappeared {
        /// Device MAC.
        mac: String,
        /// Older window it was seen in.
        window: Window,
    },
}

impl Alert {
    /// Line written to the session log.
    #[must_use]
    pub fn log_line(&self) -> String {
        match self {
            Self::Probe { ssid, .. } => format!("Found a probe!: {ssid}"),
            Self::RepeatedProbe { ssid, window } => {
                format!("Found a repeated probe!: {ssid} in {} list", window.label())
            }
            Self::Reappeared { mac, window } => format!("{mac} in {} list", window.label()),
        }
    }
}

/// Set sizes after a rotation, indexed like [`Window::ALL`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RotationStats {
    /// MACs per window.
    pub macs: [usize; 4],
    /// SSIDs per window.
    pub ssids: [usize; 4],
}

/// Four MAC and four SSID windows, filtered against the ignore lists.
#[derive(Debug, Clone, Default)]
pub struct WindowTracker {
    ignore: IgnoreLists,
    macs: [HashSet<String>; 4],
    ssids: [HashSet<String>; 4],
}

impl WindowTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new(ignore: IgnoreLists) -> Self {
        Self {
            ignore,
            ..Self::default()
        }
    }

    /// Fills every window from the capture.
    pub fn initialize(&mut self, db: &KismetDb, boundaries: &TimeBoundaries) -> Result<RotationStats> {
        for window in Window::ALL {
            self.fill(db, boundaries, window)?;
        }
        let stats = self.stats();
        for window in Window::ALL {
            let i = window.index();
            tracing::info!(
                window = window.label(),
                macs = stats.macs[i],
                ssids = stats.ssids[i],
                "window initialized"
            );
        }
        Ok(stats)
    }

    /// Checks current devices against the older windows.
    pub fn process(&self, devices: &[KismetDevice]) -> Vec<Alert> {
        let mut alerts = Vec::new();
        for device in devices {
            if device.mac.is_empty() {
                continue;
            }
            if let Some(ssid) = device.probed_ssid.as_deref()
                && !self.ignore.ignores_ssid(ssid)
            {
                tracing::info!(mac = %device.mac, ssid, "probe detected");
                alerts.push(Alert::Probe {
                    mac: device.mac.clone(),
                    ssid: ssid.to_string(),
                });
                for window in Window::OLDER {
                    if self.ssids[window.index()].contains(ssid) {
                        tracing::warn!(ssid, window = window.label(), "repeated probe detected");
                        alerts.push(Alert::RepeatedProbe {
                            ssid: ssid.to_string(),
                            window,
                        });
                    }
                }
            }

            let mac = normalize_mac(&device.mac);
            if self.ignore.macs.contains(&mac) {
                continue;
            }
            for window in Window::OLDER {
                if self.macs[window.index()].contains(&mac) {
                    tracing::warn!(mac = %mac, window = window.label(), "device reappeared");
                    alerts.push(Alert::Reappeared {
                        mac: mac.clone(),
                        window,
                    });
                }
            }
        }
        alerts
    }

    /// Reads current activity from the capture and checks it.
    pub fn process_current(&self, db: &KismetDb, boundaries: &TimeBoundaries) -> Result<Vec<Alert>> {
        let devices = db.devices_between(boundaries.current, None)?;
        Ok(self.process(&devices))
    }

    /// Ages every window by one step and refills the newest from the capture.
    pub fn rotate(&mut self, db: &KismetDb, boundaries: &TimeBoundaries) -> Result<RotationStats> {
        self.macs.rotate_right(1);
        self.ssids.rotate_right(1);
        self.fill(db, boundaries, Window::PastFive)?;

        let stats = self.stats();
        tracing::info!(macs = ?stats.macs, ssids = ?stats.ssids, "tracking windows rotated");
        Ok(stats)
    }

    /// Current set sizes.
    #[must_use]
    pub fn stats(&self) -> RotationStats {
        RotationStats {
            macs: self.macs.each_ref().map(HashSet::len),
            ssids: self.ssids.each_ref().map(HashSet::len),
        }
    }

    /// MACs currently held in `window`.
    #[must_use]
    pub fn macs_in(&self, window: Window) -> &HashSet<String> {
        &self.macs[window.index()]
    }

    /// SSIDs currently held in `window`.
    #[must_use]
    pub fn ssids_in(&self, window: Window) -> &HashSet<String> {
        &self.ssids[window.index()]
    }

    fn fill(&mut self, db: &KismetDb, boundaries: &TimeBoundaries, window: Window) -> Result<()> {
        let (start, end) = window.range(boundaries);
        let devices = db.devices_between(start, end)?;

        let i = window.index();
        self.macs[i] = devices
            .iter()
            .map(|d| normalize_mac(&d.mac))
            .filter(|mac| !mac.is_empty() && !self.ignore.macs.contains(mac))
            .collect();
        self.ssids[i] = devices
            .iter()
            .filter_map(|d| d.probed_ssid.clone())
            .filter(|ssid| !ssid.is_empty() && !self.ignore.ignores_ssid(ssid))
            .collect();
        Ok(())
    }
}

/// Options for [`run_monitor`].
#[derive(Debug, Clone, Default)]
pub struct MonitorOptions {
    /// Capture to read instead of the newest match of the configured pattern.
    pub capture: Option<PathBuf>,
    /// Stop after this many cycles.
    pub max_cycles: Option<u64>,
}

/// What a monitoring session did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorSummary {
    /// Capture that was read.
    pub capture: PathBuf,
    /// Session log written.
    pub session_log: PathBuf,
    /// Ignore list sizes.
    pub ignored: IgnoreCounts,
    /// Completed cycles.
    pub cycles: u64,
    /// Alerts raised.
    pub alerts: usize,
    /// Cycles that failed.
    pub errors: usize,
}

struct SessionLog {
    file: File,
    path: PathBuf,
}

impl SessionLog {
    fn create(dir: &Path, started: NaiveDateTime) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| IoError::DirectoryFailed {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;
        let path = dir.join(format!("{SESSION_LOG_PREFIX}{}", started.format("%m%d%y_%H%M%S")));
        let file = File::create(&path).map_err(|e| IoError::WriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { file, path })
    }

    fn line(&mut self, text: &str) -> Result<()> {
        writeln!(self.file, "{text}").map_err(|e| IoError::WriteFailed {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

/// Watches the newest capture until shutdown, logging alerts.
///
/// Per-cycle failures are logged and the loop continues.
pub fn run_monitor(
    config: &Config,
    options: &MonitorOptions,
    shutdown: &Shutdown,
    out: &mut dyn Write,
) -> Result<MonitorSummary> {
    let ignore = IgnoreLists::load(&config.paths.ignore_lists.mac, &config.paths.ignore_lists.ssid)?;
    let ignored = ignore.counts();

    let mut session = SessionLog::create(&config.paths.log_dir, Local::now().naive_local())?;
    session.line(&format!("{} MACs added to ignore list.", ignored.macs))?;
    session.line(&format!("{} Probed SSIDs added to ignore list.", ignored.ssids))?;
    writeln!(out, "{} MACs added to ignore list.", ignored.macs)?;
    writeln!(out, "{} Probed SSIDs added to ignore list.", ignored.ssids)?;

    let capture = match &options.capture {
        Some(path) => path.clone(),
        None => newest(&resolve(&config.paths.kismet_logs)?)?,
    };
    session.line(&format!("Pulling data from: {}", capture.display()))?;
    writeln!(out, "Pulling data from: {}", capture.display())?;

    let windows = TimeWindows::new(config.timing.time_windows);
    let mut tracker = WindowTracker::new(ignore);
    {
        let db = KismetDb::open(&capture)?;
        db.validate()?;
        tracker.initialize(&db, &windows.boundaries(chrono::Utc::now().timestamp()))?;
    }

    let event_log = config.paths.log_dir.join(EVENT_LOG_NAME);
    let interval = Duration::from_secs(config.timing.check_interval);
    let rotate_every = config.timing.list_update_interval.max(1);
    writeln!(
        out,
        "Monitoring every {} seconds, updating lists every {rotate_every} cycles",
        config.timing.check_interval
    )?;
    tracing::info!(capture = %capture.display(), "monitoring started");

    let mut summary = MonitorSummary {
        capture: capture.clone(),
        session_log: session.path.clone(),
        ignored,
        cycles: 0,
        alerts: 0,
        errors: 0,
    };

    while !shutdown.is_triggered() {
        summary.cycles += 1;
        let now = Local::now();
        session.line(&format!("Current Time: {}", now.format("%Y-%m-%d %H:%M:%S")))?;

        match monitor_cycle(&mut tracker, &capture, &windows, summary.cycles, rotate_every) {
            Ok(alerts) => {
                let events: Vec<Event> = alerts
                    .iter()
                    .filter_map(|alert| match alert {
                        Alert::Probe { mac, ssid } => Some(Event::SsidProbe(ProbeEvent {
                            ssid: ssid.clone(),
                            mac: mac.clone(),
                            timestamp: now.naive_local(),
                        })),
                        _ => None,
                    })
                    .collect();
                for alert in &alerts {
                    session.line(&alert.log_line())?;
                    writeln!(out, "{}", alert.log_line())?;
                }
                if let Err(e) = append_events(&event_log, &events) {
                    tracing::error!(error = %e, "failed to write event log");
                }
                summary.alerts += alerts.len();
            }
            Err(e) => {
                summary.errors += 1;
                tracing::error!(error = %e, cycle = summary.cycles, "error in monitoring loop");
                session.line(&format!("Error in monitoring loop: {e}"))?;
                writeln!(out, "Error in monitoring loop: {e}")?;
            }
        }
        out.flush()?;

        if options.max_cycles.is_some_and(|max| summary.cycles >= max) {
            break;
        }
        if !shutdown.sleep(interval) {
            break;
        }
    }

    if shutdown.is_triggered() {
        session.line("Shutting down gracefully...")?;
        writeln!(out, "Shutting down gracefully...")?;
    }
    tracing::info!(cycles = summary.cycles, alerts = summary.alerts, "monitoring stopped");
    Ok(summary)
}

fn monitor_cycle(
    tracker: &mut WindowTracker,
    capture: &Path,
    windows: &TimeWindows,
    cycle: u64,
    rotate_every: u64,
) -> Result<Vec<Alert>> {
    let db = KismetDb::open(capture)?;
    let now = chrono::Utc::now().timestamp();
    let alerts = tracker.process_current(&db, &windows.boundaries(now))?;
    if cycle % rotate_every == 0 {
        tracing::info!(cycle, "rotating tracking lists");
        tracker.rotate(&db, &windows.boundaries(now))?;
    }
    Ok(alerts)
}
