//! JSON-lines probe event log.
//!
//! One object per line:
//! `{"type":"ssid-probe","ssid":"..","mac":"..","timestamp":"MM/DD/YYYY HH:MM:SS"}`.

use crate::error::{Error, IoError, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// Timestamp layout used in event records.
pub const EVENT_TIME_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// A device probing for a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeEvent {
    /// Requested SSID.
    pub ssid: String,
    /// Probing device.
    pub mac: String,
    /// Local time of the probe.
    #[serde(with = "event_time")]
    pub timestamp: NaiveDateTime,
}

/// Tagged event record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// SSID probe request.
    #[serde(rename = "ssid-probe")]
    SsidProbe(ProbeEvent),
}

impl Event {
    /// Serializes the event as a single line (no trailing newline).
    pub fn to_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Appends events to a JSON-lines file, creating it if needed.
pub fn append_events(path: &Path, events: &[Event]) -> Result<()> {
    if events.is_empty() {
        return Ok(());
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| write_failed(path, &e))?;
    for event in events {
        writeln!(file, "{}", event.to_line()?).map_err(|e| write_failed(path, &e))?;
    }
    Ok(())
}

/// Parses JSON-lines content.
///
/// Blank lines and objects without a `type` are skipped; an unknown type is
/// an error.
pub fn parse_events(content: &str) -> Result<Vec<Event>> {
    let mut events = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: serde_json::Value = serde_json::from_str(line).map_err(|e| Error::InvalidData {
            message: format!("event line {}: {e}", idx + 1),
        })?;
        if value.get("type").is_none() {
            tracing::debug!(line = idx + 1, "skipping untyped event");
            continue;
        }
        let event: Event = serde_json::from_value(value).map_err(|e| Error::InvalidData {
            message: format!("event line {}: {e}", idx + 1),
        })?;
        events.push(event);
    }
    Ok(events)
}

/// Reads a JSON-lines event file.
pub fn read_events(path: &Path) -> Result<Vec<Event>> {
    let content = std::fs::read_to_string(path).map_err(|e| IoError::ReadFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse_events(&content)
}

fn write_failed(path: &Path, err: &std::io::Error) -> IoError {
    IoError::WriteFailed {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

mod event_time {
    use super::EVENT_TIME_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.format(EVENT_TIME_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, EVENT_TIME_FORMAT).map_err(serde::de::Error::custom)
    }
}
