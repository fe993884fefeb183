//! Offline surveillance analysis over one or more captures.
//!
//! Loads every device appearance from the selected captures, places each
//! one at a GPS cluster, scores persistence and writes the Markdown report
//! plus a KML map.

use crate::config::Config;
use crate::detect::{
    DeviceAppearance, StalkingCandidate, SurveillanceDetector, SuspiciousDevice, Thresholds,
    render_report, write_report,
};
use crate::error::{Error, IoError, Result};
use crate::gps::{GpsTracker, RoutePoint, dedupe_route, demo_route, render_kml, write_kml};
use crate::kismet::{KismetDb, modified_within, newest, resolve};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Location id used when no GPS data exists.
pub const UNKNOWN_LOCATION: &str = "unknown_location";

/// Where location readings come from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GpsSource {
    /// Fixes recorded in the captures.
    #[default]
    Captures,
    /// The fixed demonstration route.
    Demo,
    /// A JSON file of `[lat, lon, "name"]` triples.
    File(PathBuf),
}

/// Options for [`run_analysis`].
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Analyze this capture only.
    pub capture: Option<PathBuf>,
    /// Location source.
    pub gps: GpsSource,
    /// Also write the results as JSON here.
    pub output_json: Option<PathBuf>,
    /// Minimum persistence score for stalking candidates, when requested.
    pub stalking_min_score: Option<f64>,
}

/// Outcome of an analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResults {
    /// Captures read.
    pub captures: Vec<PathBuf>,
    /// Device appearances loaded.
    pub total_devices: usize,
    /// Devices above the persistence threshold.
    pub suspicious_devices: usize,
    /// Devices scoring above 0.8.
    pub high_persistence_devices: usize,
    /// Devices recorded at more than one location.
    pub multi_location_devices: usize,
    /// Location sessions.
    pub location_sessions: usize,
    /// Markdown report path.
    pub report_file: PathBuf,
    /// KML path, when GPS data existed.
    pub kml_file: Option<PathBuf>,
    /// Suspicious devices, highest score first.
    pub suspicious_device_list: Vec<SuspiciousDevice>,
    /// Stalking candidates, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stalking: Option<Vec<StalkingCandidate>>,
}

/// Captures to analyze: the explicit one, else those modified within
/// `analysis_window_hours`, else the newest match.
pub fn select_captures(config: &Config, explicit: Option<&Path>, now: SystemTime) -> Result<Vec<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(IoError::FileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }
        return Ok(vec![path.to_path_buf()]);
    }

    let all = resolve(&config.paths.kismet_logs)?;
    let recent = modified_within(&all, config.detection.analysis_window_hours, now);
    if recent.is_empty() {
        tracing::warn!(
            hours = config.detection.analysis_window_hours,
            "no recent captures, using the newest"
        );
        return Ok(vec![newest(&all)?]);
    }
    tracing::info!(count = recent.len(), "captures in analysis window");
    Ok(recent)
}

/// Reads a JSON array of `[lat, lon, "name"]` triples.
pub fn load_gps_file(path: &Path) -> Result<Vec<RoutePoint>> {
    let content = std::fs::read_to_string(path).map_err(|e| IoError::ReadFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let triples: Vec<(f64, f64, Option<String>)> =
        serde_json::from_str(&content).map_err(|e| Error::InvalidData {
            message: format!("{}: expected [[lat, lon, \"name\"], ...]: {e}", path.display()),
        })?;
    Ok(triples
        .into_iter()
        .map(|(lat, lon, name)| RoutePoint { lat, lon, name })
        .collect())
}

/// Named, deduplicated route from the fixes in `dbs`, restricted to the
/// configured search area.
pub fn route_from_captures(dbs: &[KismetDb], config: &Config) -> Vec<RoutePoint> {
    let mut fixes: Vec<(f64, f64, i64)> = Vec::new();
    for db in dbs {
        match db.gps_points() {
            Ok(points) => {
                tracing::info!(capture = %db.path().display(), points = points.len(), "gps fixes read");
                fixes.extend(points);
            }
            Err(e) => tracing::warn!(capture = %db.path().display(), error = %e, "could not read gps fixes"),
        }
    }
    fixes.retain(|(lat, lon, _)| config.search.contains(*lat, *lon));
    fixes.sort_by_key(|f| f.2);

    let route = dedupe_route(
        fixes
            .into_iter()
            .map(|(lat, lon, _)| RoutePoint::new(lat, lon, None))
            .collect(),
    );
    route
        .into_iter()
        .enumerate()
        .map(|(i, p)| RoutePoint {
            name: Some(format!("Location_{}", i + 1)),
            ..p
        })
        .collect()
}

/// Runs the full analysis and writes its artifacts.
pub fn run_analysis(config: &Config, options: &AnalyzeOptions, now: DateTime<Local>) -> Result<AnalysisResults> {
    let captures = select_captures(config, options.capture.as_deref(), SystemTime::from(now))?;
    let mut dbs = Vec::with_capacity(captures.len());
    for path in &captures {
        match KismetDb::open(path) {
            Ok(db) => dbs.push(db),
            Err(e) => tracing::error!(capture = %path.display(), error = %e, "skipping capture"),
        }
    }

    let route = match &options.gps {
        GpsSource::Demo => demo_route(),
        GpsSource::File(path) => load_gps_file(path)?,
        GpsSource::Captures => route_from_captures(&dbs, config),
    };

    let mut tracker = GpsTracker::new();
    let base = now.timestamp();
    for (i, point) in route.iter().enumerate() {
        let offset = i64::try_from(i).unwrap_or(i64::MAX);
        let id = tracker.add_reading(point.lat, point.lon, point.name.as_deref(), base + offset);
        tracing::debug!(lat = point.lat, lon = point.lon, location = %id, "route point");
    }
    if route.is_empty() {
        tracing::warn!("no gps data, using single location mode");
    }

    let mut detector = SurveillanceDetector::new(Thresholds::from(&config.detection));
    let mut total_devices = 0;
    for db in &dbs {
        let loaded = match load_appearances(db, &mut detector, &mut tracker) {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::error!(capture = %db.path().display(), error = %e, "could not load appearances");
                continue;
            }
        };
        tracing::info!(capture = %db.path().display(), appearances = loaded, "appearances loaded");
        total_devices += loaded;
    }

    let suspicious = detector.analyze();
    let stamp = now.format("%Y%m%d_%H%M%S");

    let report_file = config
        .paths
        .reports_dir
        .join(format!("surveillance_report_{stamp}.md"));
    write_report(&report_file, &render_report(&detector, now))?;

    let kml_file = if tracker.sessions().is_empty() {
        None
    } else {
        let path = config
            .paths
            .kml_dir
            .join(format!("surveillance_analysis_{stamp}.kml"));
        write_kml(&path, &render_kml(&tracker, &suspicious, now))?;
        Some(path)
    };

    let results = AnalysisResults {
        captures,
        total_devices,
        suspicious_devices: suspicious.len(),
        high_persistence_devices: suspicious.iter().filter(|d| d.persistence_score > 0.8).count(),
        multi_location_devices: tracker.devices_across_locations().len(),
        location_sessions: tracker.sessions().len(),
        report_file,
        kml_file,
        suspicious_device_list: suspicious,
        stalking: options
            .stalking_min_score
            .map(|min| detector.stalking_candidates(min)),
    };

    if let Some(path) = &options.output_json {
        export_json(&results, path)?;
    }
    Ok(results)
}

/// Adds every device in `db` to the detector, placed at the cluster nearest
/// its averaged position, else the first location.
pub fn load_appearances(
    db: &KismetDb,
    detector: &mut SurveillanceDetector,
    tracker: &mut GpsTracker,
) -> Result<usize> {
    let fallback = tracker
        .history()
        .first()
        .map_or_else(|| UNKNOWN_LOCATION.to_string(), |s| s.location_id.clone());

    let devices = db.all_devices()?;
    for device in &devices {
        let location_id = device
            .location()
            .and_then(|(lat, lon)| tracker.nearest_location(lat, lon))
            .map_or_else(|| fallback.clone(), str::to_string);
        tracker.record_device_at(&location_id, &device.mac);

        detector.add_appearance(DeviceAppearance {
            mac: device.mac.clone(),
            timestamp: device.last_time,
            location_id,
            ssids_probed: device.probed_ssid.iter().cloned().collect(),
            signal_strength: None,
            device_type: device.device_type.clone(),
        });
    }
    Ok(devices.len())
}

/// Writes results as pretty JSON, creating parent directories.
pub fn export_json(results: &AnalysisResults, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| IoError::DirectoryFailed {
            path: parent.display().to_string(),
            reason: e.to_string(),
        })?;
    }
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(path, json).map_err(|e| IoError::WriteFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    tracing::info!(path = %path.display(), "results exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kismet::fixture::{capture_file, capture_with};
    use tempfile::TempDir;

    fn config_in(dir: &Path) -> Config {
        let mut config = Config::default();
        config.paths.kismet_logs = dir.join("captures/*.kismet").display().to_string();
        config.paths.reports_dir = dir.join("reports");
        config.paths.kml_dir = dir.join("kml");
        config.detection.min_appearances = 1;
        config
    }

    #[test]
    fn test_route_from_captures_dedupes_and_names() {
        let db = capture_with(&[
            ("AA:AA:AA:AA:AA:01", 1_000, None, 33.4484, -112.0740),
            ("AA:AA:AA:AA:AA:02", 1_100, None, 33.4484, -112.0740),
            ("AA:AA:AA:AA:AA:03", 1_200, None, 33.4734, -112.0431),
            ("AA:AA:AA:AA:AA:04", 1_300, None, 0.0, 0.0),
        ]);
        let route = route_from_captures(&[db], &Config::default());
        let names: Vec<&str> = route.iter().filter_map(|p| p.name.as_deref()).collect();
        assert_eq!(names, vec!["Location_1", "Location_2"]);
    }

    #[test]
    fn test_route_respects_search_area() {
        let db = capture_with(&[
            ("AA:AA:AA:AA:AA:01", 1_000, None, 33.4484, -112.0740),
            ("AA:AA:AA:AA:AA:02", 1_200, None, 40.0, -100.0),
        ]);
        let mut config = Config::default();
        config.search.lat_min = Some(30.0);
        config.search.lat_max = Some(35.0);
        config.search.lon_min = Some(-115.0);
        config.search.lon_max = Some(-110.0);
        assert_eq!(route_from_captures(&[db], &config).len(), 1);
    }

    #[test]
    fn test_appearances_attributed_to_nearest_cluster() {
        let db = capture_with(&[
            ("AA:AA:AA:AA:AA:01", 1_000, Some("Home"), 33.4734, -112.0431),
            ("AA:AA:AA:AA:AA:02", 1_100, None, 0.0, 0.0),
        ]);
        let mut tracker = GpsTracker::new();
        tracker.add_reading(33.4484, -112.0740, Some("Home"), 0);
        tracker.add_reading(33.4734, -112.0431, Some("Office"), 10);

        let mut detector = SurveillanceDetector::default();
        let loaded = load_appearances(&db, &mut detector, &mut tracker).expect("load");
        assert_eq!(loaded, 2);

        let history = detector.history();
        assert_eq!(history["AA:AA:AA:AA:AA:01"][0].location_id, "Office");
        assert_eq!(history["AA:AA:AA:AA:AA:01"][0].ssids_probed, vec!["Home".to_string()]);
        assert_eq!(history["AA:AA:AA:AA:AA:02"][0].location_id, "Home");
        assert!(tracker.session("Office").is_some_and(|s| s.devices.len() == 1));
    }

    #[test]
    fn test_unknown_location_without_gps() {
        let db = capture_with(&[("AA:AA:AA:AA:AA:01", 1_000, None, 0.0, 0.0)]);
        let mut detector = SurveillanceDetector::default();
        load_appearances(&db, &mut detector, &mut GpsTracker::new()).expect("load");
        assert_eq!(detector.history()["AA:AA:AA:AA:AA:01"][0].location_id, UNKNOWN_LOCATION);
    }

    #[test]
    fn test_load_gps_file() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("route.json");
        std::fs::write(&path, r#"[[33.4484, -112.074, "Home"], [33.4734, -112.0431, null]]"#).expect("write");
        let route = load_gps_file(&path).expect("load");
        assert_eq!(route.len(), 2);
        assert_eq!(route[0].name.as_deref(), Some("Home"));
        assert_eq!(route[1].name, None);

        std::fs::write(&path, r#"{"lat": 1}"#).expect("write");
        assert!(matches!(load_gps_file(&path), Err(Error::InvalidData { .. })));
    }

    #[test]
    fn test_select_explicit_missing_capture() {
        let temp = TempDir::new().expect("temp dir");
        let config = config_in(temp.path());
        let result = select_captures(&config, Some(&temp.path().join("nope.kismet")), SystemTime::now());
        assert!(matches!(result, Err(Error::Io(IoError::FileNotFound { .. }))));
    }

    #[test]
    fn test_run_analysis_with_demo_route() {
        let temp = TempDir::new().expect("temp dir");
        let config = config_in(temp.path());
        std::fs::create_dir_all(temp.path().join("captures")).expect("dir");
        let mut rows = Vec::new();
        for i in 0..6 {
            rows.push(("AA:AA:AA:AA:AA:01", 10_000 + i * 1_200, Some("Home"), 33.4484, -112.0740));
        }
        capture_file(&temp.path().join("captures/a.kismet"), &rows);

        let options = AnalyzeOptions {
            gps: GpsSource::Demo,
            output_json: Some(temp.path().join("out/results.json")),
            stalking_min_score: Some(0.5),
            ..AnalyzeOptions::default()
        };
        let results = run_analysis(&config, &options, Local::now()).expect("analysis");

        assert_eq!(results.captures.len(), 1);
        assert_eq!(results.total_devices, 6);
        assert!(results.report_file.exists());
        assert!(results.kml_file.as_ref().is_some_and(|p| p.exists()));
        assert_eq!(results.location_sessions, 4);
        assert!(results.stalking.is_some());

        let json = std::fs::read_to_string(temp.path().join("out/results.json")).expect("json");
        let value: serde_json::Value = serde_json::from_str(&json).expect("parse");
        assert_eq!(value["total_devices"], 6);
    }

    #[test]
    fn test_run_analysis_skips_unreadable_capture() {
        let temp = TempDir::new().expect("temp dir");
        let config = config_in(temp.path());
        std::fs::create_dir_all(temp.path().join("captures")).expect("dir");
        capture_file(
            &temp.path().join("captures/good.kismet"),
            &[
                ("AA:AA:AA:AA:AA:01", 10_000, None, 0.0, 0.0),
                ("AA:AA:AA:AA:AA:02", 10_100, None, 0.0, 0.0),
            ],
        );
        std::fs::write(temp.path().join("captures/bad.kismet"), "not a database").expect("write");

        let results = run_analysis(&config, &AnalyzeOptions::default(), Local::now()).expect("analysis");
        assert_eq!(results.total_devices, 2);
        assert!(results.report_file.exists());
    }

    #[test]
    fn test_run_analysis_without_gps_skips_kml() {
        let temp = TempDir::new().expect("temp dir");
        let config = config_in(temp.path());
        std::fs::create_dir_all(temp.path().join("captures")).expect("dir");
        capture_file(
            &temp.path().join("captures/a.kismet"),
            &[("AA:AA:AA:AA:AA:01", 10_000, None, 0.0, 0.0)],
        );
        let results = run_analysis(&config, &AnalyzeOptions::default(), Local::now()).expect("analysis");
        assert!(results.kml_file.is_none());
        assert_eq!(results.suspicious_devices, 0);
        assert!(results.report_file.exists());
    }
}
