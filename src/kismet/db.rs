//! Read-only queries against a Kismet capture.

// Kismet stores timestamps as SQLite integers; all values we read are
// non-negative unix seconds.
#![allow(clippy::cast_possible_truncation)]

use crate::error::{KismetError, Result};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, Row, params};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Busy timeout while Kismet holds the write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

const DEVICE_COLUMNS: &str = "devmac, type, device, first_time, last_time, avg_lat, avg_lon";

/// One row of the Kismet `devices` table, reduced to what we analyse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KismetDevice {
    /// Device MAC as recorded by Kismet.
    pub mac: String,
    /// Kismet device type (e.g. `Wi-Fi Client`).
    pub device_type: Option<String>,
    /// First time the device was seen (unix seconds).
    pub first_time: i64,
    /// Last time the device was seen (unix seconds).
    pub last_time: i64,
    /// Averaged latitude, 0 when unknown.
    pub avg_lat: f64,
    /// Averaged longitude, 0 when unknown.
    pub avg_lon: f64,
    /// SSID from the device's last probe request, if any.
    pub probed_ssid: Option<String>,
}

impl KismetDevice {
    /// Returns the averaged coordinates when Kismet had a GPS fix.
    #[must_use]
    pub fn location(&self) -> Option<(f64, f64)> {
        #[allow(clippy::float_cmp)]
        if self.avg_lat == 0.0 || self.avg_lon == 0.0 {
            None
        } else {
            Some((self.avg_lat, self.avg_lon))
        }
    }
}

/// A probe request extracted from a device record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeRecord {
    /// Probing device.
    pub mac: String,
    /// Requested network name.
    pub ssid: String,
    /// Last time the device was seen (unix seconds).
    pub timestamp: i64,
}

/// Read-only handle on one capture database.
pub struct KismetDb {
    conn: Connection,
    path: PathBuf,
}

impl KismetDb {
    /// Opens a capture read-only.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or is not a database.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| KismetError::Database(format!("{}: {e}", path.display())))?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(KismetError::from)?;

        tracing::info!(path = %path.display(), "connected to capture");
        Ok(Self { conn, path })
    }

    /// Wraps an existing connection (used for in-memory test captures).
    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            path: PathBuf::from(":memory:"),
        }
    }

    /// Path of the capture file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checks that the `devices` table is readable and returns its row count.
    pub fn validate(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM devices", [], |row| row.get(0))
            .map_err(|e| KismetError::Validation(e.to_string()))?;
        tracing::info!(devices = count, "capture validated");
        Ok(count.max(0) as usize)
    }

    /// Devices last seen at or after `start` and, if given, at or before `end`.
    pub fn devices_between(&self, start: i64, end: Option<i64>) -> Result<Vec<KismetDevice>> {
        let devices = match end {
            Some(end) => self.query_devices(
                &format!(
                    "SELECT {DEVICE_COLUMNS} FROM devices WHERE last_time >= ?1 AND last_time <= ?2"
                ),
                params![start, end],
            )?,
            None => self.query_devices(
                &format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE last_time >= ?1"),
                params![start],
            )?,
        };
        Ok(devices)
    }

    /// MAC addresses of devices in a time range.
    pub fn mac_addresses_between(&self, start: i64, end: Option<i64>) -> Result<Vec<String>> {
        Ok(self
            .devices_between(start, end)?
            .into_iter()
            .map(|d| d.mac)
            .filter(|mac| !mac.is_empty())
            .collect())
    }

    /// Probe requests of devices in a time range.
    pub fn probes_between(&self, start: i64, end: Option<i64>) -> Result<Vec<ProbeRecord>> {
        Ok(self
            .devices_between(start, end)?
            .into_iter()
            .filter_map(|d| {
                d.probed_ssid.map(|ssid| ProbeRecord {
                    mac: d.mac,
                    ssid,
                    timestamp: d.last_time,
                })
            })
            .collect())
    }

    /// Every device with a timestamp, newest first.
    pub fn all_devices(&self) -> Result<Vec<KismetDevice>> {
        self.query_devices(
            &format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE last_time > 0 ORDER BY last_time DESC"),
            [],
        )
    }

    /// Distinct `(lat, lon, first_time)` fixes ordered by time.
    pub fn gps_points(&self) -> Result<Vec<(f64, f64, i64)>> {
        let mut stmt = self
            .conn
            .prepare(
                r"
            SELECT DISTINCT avg_lat, avg_lon, first_time
            FROM devices
            WHERE avg_lat != 0 AND avg_lon != 0
            ORDER BY first_time
        ",
            )
            .map_err(KismetError::from)?;

        let points = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .map_err(KismetError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(KismetError::from)?;
        Ok(points)
    }

    /// Number of devices with a GPS fix.
    pub fn gps_point_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM devices WHERE avg_lat != 0 AND avg_lon != 0",
                [],
                |row| row.get(0),
            )
            .map_err(KismetError::from)?;
        Ok(count.max(0) as usize)
    }

    fn query_devices<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<KismetDevice>> {
        let mut stmt = self.conn.prepare(sql).map_err(KismetError::from)?;
        let devices = stmt
            .query_map(params, device_from_row)
            .map_err(KismetError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(KismetError::from)?;
        Ok(devices)
    }
}

fn device_from_row(row: &Row<'_>) -> rusqlite::Result<KismetDevice> {
    let mac: Option<String> = row.get(0)?;
    let mac = mac.unwrap_or_default();
    let device_json = match row.get_ref(2)? {
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        _ => String::new(),
    };

    Ok(KismetDevice {
        probed_ssid: probed_ssid(&mac, &device_json),
        mac,
        device_type: row.get(1)?,
        first_time: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
        last_time: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
        avg_lat: row.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
        avg_lon: row.get::<_, Option<f64>>(6)?.unwrap_or(0.0),
    })
}

/// Pulls the last probed SSID out of Kismet's device JSON blob.
///
/// Malformed JSON is logged and treated as "no probe".
#[must_use]
pub fn probed_ssid(mac: &str, device_json: &str) -> Option<String> {
    if device_json.trim().is_empty() {
        return None;
    }
    let value: Value = match serde_json::from_str(device_json) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(mac, error = %e, "failed to parse device JSON");
            return None;
        }
    };

    let ssid = value
        .get("dot11.device")?
        .get("dot11.device.last_probed_ssid_record")?
        .get("dot11.probedssid.ssid")?
        .as_str()?;

    if ssid.is_empty() {
        None
    } else {
        Some(ssid.to_string())
    }
}
