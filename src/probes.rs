//! Probe request analysis over session logs.
//!
//! Session logs (`cyt_log_MMDDYY_HHMMSS`) interleave `Current Time:` stamps
//! with `Found a probe!:` lines. This module collects every probed SSID
//! with its time and summarises how often each one was requested.

use crate::error::{IoError, Result};
use crate::tracker::SESSION_LOG_PREFIX;
use chrono::{Days, NaiveDate, NaiveDateTime};
use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const PROBE_MARKER: &str = "Found a probe!: ";
const TIME_MARKER: &str = "Current Time: ";
const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static FILE_STAMP_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"cyt_log_(\d{2})(\d{2})(\d{2}|\d{4})_(\d{2})(\d{2})(\d{2})").ok()
});

/// One probe request found in a log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSighting {
    /// Requested SSID.
    pub ssid: String,
    /// When it was logged.
    pub timestamp: NaiveDateTime,
}

/// Aggregate for one SSID.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeSummary {
    /// Requested SSID.
    pub ssid: String,
    /// Number of requests.
    pub count: usize,
    /// Earliest request.
    pub first_seen: NaiveDateTime,
    /// Latest request.
    pub last_seen: NaiveDateTime,
    /// Seconds between first and last request.
    pub span_seconds: i64,
    /// Requests per second over the span, when the span is non-zero.
    pub probes_per_second: Option<f64>,
}

/// Timestamp encoded in a session log name.
///
/// Accepts both two- and four-digit years.
#[must_use]
pub fn file_stamp(file_name: &str) -> Option<NaiveDateTime> {
    let caps = FILE_STAMP_RE.as_ref()?.captures(file_name)?;
    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    let year_raw = caps.get(3)?.as_str();
    let year = if year_raw.len() == 2 {
        2000 + i32::try_from(num(3)?).ok()?
    } else {
        i32::try_from(num(3)?).ok()?
    };
    NaiveDate::from_ymd_opt(year, num(1)?, num(2)?)?.and_hms_opt(num(4)?, num(5)?, num(6)?)
}

/// Extracts probes from one log.
///
/// Each probe takes the nearest preceding `Current Time:` stamp, or the
/// stamp in `file_name` when there is none. Probes with neither are dropped.
#[must_use]
pub fn parse_log(content: &str, file_name: &str) -> Vec<ProbeSighting> {
    let fallback = file_stamp(file_name);
    let mut current: Option<NaiveDateTime> = None;
    let mut sightings = Vec::new();

    for line in content.lines() {
        if let Some(rest) = line.strip_prefix(TIME_MARKER) {
            let raw = rest.get(..19).unwrap_or(rest);
            if let Ok(ts) = NaiveDateTime::parse_from_str(raw, STAMP_FORMAT) {
                current = Some(ts);
            }
        } else if let Some(rest) = line.strip_prefix(PROBE_MARKER) {
            let ssid = rest.trim();
            if ssid.is_empty() {
                continue;
            }
            match current.or(fallback) {
                Some(timestamp) => sightings.push(ProbeSighting {
                    ssid: ssid.to_string(),
                    timestamp,
                }),
                None => tracing::debug!(ssid, file_name, "probe without timestamp skipped"),
            }
        }
    }
    sightings
}

/// Session logs in `dir` dated within `days_back` days of `today`.
///
/// `days_back == 0` keeps every log; logs with unparseable names are kept.
pub fn select_logs(dir: &Path, days_back: u64, today: NaiveDate) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| IoError::ReadFailed {
        path: dir.display().to_string(),
        reason: e.to_string(),
    })?;
    let cutoff = today.checked_sub_days(Days::new(days_back));

    let mut selected: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with(SESSION_LOG_PREFIX))
        .filter(|e| {
            if days_back == 0 {
                return true;
            }
            let name = e.file_name().to_string_lossy().into_owned();
            match (file_stamp(&name), cutoff) {
                (Some(stamp), Some(cutoff)) => {
                    let keep = stamp.date() >= cutoff;
                    if !keep {
                        tracing::debug!(file = %name, "skipping old log");
                    }
                    keep
                }
                _ => {
                    tracing::debug!(file = %name, "including log with unparseable date");
                    true
                }
            }
        })
        .map(|e| e.path())
        .collect();
    selected.sort();
    Ok(selected)
}

/// Collects probe sightings across logs.
#[derive(Debug, Clone, Default)]
pub struct ProbeAnalyzer {
    probes: BTreeMap<String, Vec<NaiveDateTime>>,
    files_read: usize,
}

impl ProbeAnalyzer {
    /// Creates an empty analyzer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds sightings.
    pub fn add(&mut self, sightings: impl IntoIterator<Item = ProbeSighting>) {
        for s in sightings {
            self.probes.entry(s.ssid).or_default().push(s.timestamp);
        }
    }

    /// Reads and parses logs in parallel. Unreadable files are skipped.
    pub fn add_files(&mut self, files: &[PathBuf]) {
        let parsed: Vec<Vec<ProbeSighting>> = files
            .par_iter()
            .filter_map(|path| match std::fs::read_to_string(path) {
                Ok(content) => {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    let sightings = parse_log(&content, &name);
                    tracing::debug!(file = %name, probes = sightings.len(), "parsed session log");
                    Some(sightings)
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "could not read log");
                    None
                }
            })
            .collect();

        self.files_read += parsed.len();
        for sightings in parsed {
            self.add(sightings);
        }
    }

    /// Number of logs read.
    #[must_use]
    pub const fn files_read(&self) -> usize {
        self.files_read
    }

    /// Number of distinct SSIDs.
    #[must_use]
    pub fn unique_ssids(&self) -> usize {
        self.probes.len()
    }

    /// Per-SSID summaries, most requested first; ties by SSID.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn summaries(&self) -> Vec<ProbeSummary> {
        let mut out: Vec<ProbeSummary> = self
            .probes
            .iter()
            .filter_map(|(ssid, times)| {
                let first_seen = *times.iter().min()?;
                let last_seen = *times.iter().max()?;
                let span_seconds = (last_seen - first_seen).num_seconds();
                Some(ProbeSummary {
                    ssid: ssid.clone(),
                    count: times.len(),
                    first_seen,
                    last_seen,
                    span_seconds,
                    probes_per_second: (span_seconds > 0)
                        .then(|| times.len() as f64 / span_seconds as f64),
                })
            })
            .collect();
        out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.ssid.cmp(&b.ssid)));
        out
    }
}
