//! # tailwatch
//!
//! Wireless counter-surveillance companion for Kismet.
//!
//! tailwatch reads the `SQLite` captures Kismet writes and answers one
//! question: is a device following me?
//!
//! ## Features
//!
//! - **Watchdogs**: capture process and monitor-mode interface status, GUI
//!   launch once the X display answers
//! - **Live tracking**: devices and probed SSIDs reappearing across 5-minute
//!   windows, with session and JSON-lines event logs
//! - **Ignore lists**: known MACs and SSIDs excluded from alerts
//! - **Persistence analysis**: scoring, stalking indicators, Markdown report
//! - **Mapping**: GPS clustering and KML export for Google Earth

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod analyze;
pub mod cli;
pub mod config;
pub mod detect;
pub mod error;
pub mod events;
pub mod gps;
pub mod ignore;
pub mod kismet;
pub mod logging;
pub mod probes;
pub mod tracker;
pub mod validate;
pub mod watch;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

pub use config::{Config, DEFAULT_CONFIG_PATH};

// Re-export capture access
pub use kismet::{KismetDb, KismetDevice, ProbeRecord, TimeBoundaries, TimeWindows};

// Re-export tracking and analysis types
pub use analyze::{AnalysisResults, AnalyzeOptions, GpsSource, run_analysis};
pub use detect::{PersistenceLevel, StalkingCandidate, SurveillanceDetector, SuspiciousDevice};
pub use gps::{GpsTracker, haversine_m};
pub use ignore::IgnoreLists;
pub use tracker::{Alert, WindowTracker, run_monitor};

// Re-export CLI types
pub use cli::{Cli, Commands, OutputFormat};
