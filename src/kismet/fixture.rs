//! Synthetic Kismet captures for unit tests.

#![allow(clippy::expect_used)]

use super::KismetDb;
use rusqlite::{Connection, params};

/// Kismet's `devices` table, trimmed to the columns we read plus a few others.
pub const DEVICES_SCHEMA: &str = r"
    CREATE TABLE devices (
        first_time INT, last_time INT, devkey TEXT, phyname TEXT,
        devmac TEXT, strongest_signal INT, min_lat REAL, min_lon REAL,
        max_lat REAL, max_lon REAL, avg_lat REAL, avg_lon REAL,
        bytes_data INT, type TEXT, device BLOB
    );
";

/// Device JSON carrying an optional last probed SSID.
pub fn device_json(ssid: Option<&str>) -> String {
    ssid.map_or_else(
        || r#"{"kismet.device.base.name": ""}"#.to_string(),
        |s| {
            format!(
                r#"{{"dot11.device": {{"dot11.device.last_probed_ssid_record": {{"dot11.probedssid.ssid": "{s}"}}}}}}"#
            )
        },
    )
}

/// Inserts `(mac, last_time, ssid, lat, lon)` rows; `first_time` is 30 s earlier.
pub fn insert_rows(conn: &Connection, rows: &[(&str, i64, Option<&str>, f64, f64)]) {
    for (mac, last_time, ssid, lat, lon) in rows {
        conn.execute(
            "INSERT INTO devices (first_time, last_time, devmac, avg_lat, avg_lon, type, device)
             VALUES (?1, ?2, ?3, ?4, ?5, 'Wi-Fi Client', ?6)",
            params![last_time - 30, last_time, mac, lat, lon, device_json(*ssid)],
        )
        .expect("insert");
    }
}

/// In-memory capture holding `rows`.
pub fn capture_with(rows: &[(&str, i64, Option<&str>, f64, f64)]) -> KismetDb {
    let conn = Connection::open_in_memory().expect("memory db");
    conn.execute_batch(DEVICES_SCHEMA).expect("schema");
    insert_rows(&conn, rows);
    KismetDb::from_connection(conn)
}

/// On-disk capture holding `rows`.
pub fn capture_file(path: &std::path::Path, rows: &[(&str, i64, Option<&str>, f64, f64)]) {
    let conn = Connection::open(path).expect("create capture");
    conn.execute_batch(DEVICES_SCHEMA).expect("schema");
    insert_rows(&conn, rows);
}
