//! GPS location clustering.
//!
//! Readings within [`CLUSTER_RADIUS_M`] of a known location join it; a
//! location is visited in sessions split by gaps longer than
//! [`SESSION_TIMEOUT_SECS`].

pub mod kml;

pub use kml::{render_kml, write_kml};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Readings closer than this to a known location share its id.
pub const CLUSTER_RADIUS_M: f64 = 100.0;

/// Longest gap that still continues a session.
pub const SESSION_TIMEOUT_SECS: i64 = 600;

/// Route points closer than this to the last kept one are dropped.
pub const ROUTE_DEDUPE_M: f64 = 50.0;

/// Great-circle distance between two `(lat, lon)` pairs in meters.
#[must_use]
pub fn haversine_m(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lat2) = (a.0.to_radians(), b.0.to_radians());
    let d_lat = (b.0 - a.0).to_radians();
    let d_lon = (b.1 - a.1).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
}

/// One named route point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Optional location name.
    #[serde(default)]
    pub name: Option<String>,
}

impl RoutePoint {
    /// Creates a route point.
    #[must_use]
    pub fn new(lat: f64, lon: f64, name: Option<&str>) -> Self {
        Self {
            lat,
            lon,
            name: name.map(str::to_string),
        }
    }

    /// `(lat, lon)`.
    #[must_use]
    pub const fn coords(&self) -> (f64, f64) {
        (self.lat, self.lon)
    }
}

/// A continuous stay at one location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationSession {
    /// Cluster id shared by every session at this location.
    pub location_id: String,
    /// Latitude of the reading that opened the session.
    pub lat: f64,
    /// Longitude of the reading that opened the session.
    pub lon: f64,
    /// Unix seconds of the first reading.
    pub start_time: i64,
    /// Unix seconds of the latest reading.
    pub end_time: i64,
    /// MACs recorded during the session.
    pub devices: BTreeSet<String>,
}

impl LocationSession {
    /// Session length in minutes.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_minutes(&self) -> f64 {
        (self.end_time - self.start_time) as f64 / 60.0
    }
}

/// Clusters readings into locations and sessions.
#[derive(Debug, Clone, Default)]
pub struct GpsTracker {
    sessions: Vec<LocationSession>,
    current: Option<usize>,
}

impl GpsTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a reading and returns its location id.
    pub fn add_reading(&mut self, lat: f64, lon: f64, name: Option<&str>, timestamp: i64) -> String {
        let location_id = self.cluster_id(lat, lon, name);

        let continuing = self
            .sessions
            .iter()
            .rposition(|s| s.location_id == location_id && timestamp - s.end_time <= SESSION_TIMEOUT_SECS);

        let index = if let Some(i) = continuing {
            let session = &mut self.sessions[i];
            session.end_time = session.end_time.max(timestamp);
            i
        } else {
            self.sessions.push(LocationSession {
                location_id: location_id.clone(),
                lat,
                lon,
                start_time: timestamp,
                end_time: timestamp,
                devices: BTreeSet::new(),
            });
            self.sessions.len() - 1
        };
        self.current = Some(index);

        tracing::debug!(lat, lon, location = %location_id, "gps reading added");
        location_id
    }

    fn cluster_id(&self, lat: f64, lon: f64, name: Option<&str>) -> String {
        if let Some(session) = self
            .sessions
            .iter()
            .find(|s| haversine_m((lat, lon), (s.lat, s.lon)) <= CLUSTER_RADIUS_M)
        {
            return session.location_id.clone();
        }

        let base = match name {
            Some(n) if !n.trim().is_empty() => n.trim().replace(' ', "_"),
            _ => format!("loc_{lat:.4}_{lon:.4}"),
        };
        let taken = |id: &str| self.sessions.iter().any(|s| s.location_id == id);
        let mut id = base.clone();
        let mut n = 1;
        while taken(&id) {
            id = format!("{base}_{n}");
            n += 1;
        }
        id
    }

    /// Records a MAC at the current session. Returns its location id, or
    /// `None` before the first reading.
    pub fn record_device(&mut self, mac: &str) -> Option<String> {
        let Some(session) = self.current.and_then(|i| self.sessions.get_mut(i)) else {
            tracing::warn!(mac, "no current location, device not recorded");
            return None;
        };
        session.devices.insert(mac.to_string());
        Some(session.location_id.clone())
    }

    /// Records a MAC at the latest session of `location_id`.
    pub fn record_device_at(&mut self, location_id: &str, mac: &str) -> bool {
        match self.sessions.iter_mut().rev().find(|s| s.location_id == location_id) {
            Some(session) => {
                session.devices.insert(mac.to_string());
                true
            }
            None => false,
        }
    }

    /// Location id of the current session.
    #[must_use]
    pub fn current_location_id(&self) -> Option<&str> {
        self.current
            .and_then(|i| self.sessions.get(i))
            .map(|s| s.location_id.as_str())
    }

    /// Id of the closest known location within [`CLUSTER_RADIUS_M`].
    #[must_use]
    pub fn nearest_location(&self, lat: f64, lon: f64) -> Option<&str> {
        self.sessions
            .iter()
            .map(|s| (haversine_m((lat, lon), (s.lat, s.lon)), s))
            .filter(|(d, _)| *d <= CLUSTER_RADIUS_M)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, s)| s.location_id.as_str())
    }

    /// First session recorded for `location_id`.
    #[must_use]
    pub fn session(&self, location_id: &str) -> Option<&LocationSession> {
        self.sessions.iter().find(|s| s.location_id == location_id)
    }

    /// All sessions, in insertion order.
    #[must_use]
    pub fn sessions(&self) -> &[LocationSession] {
        &self.sessions
    }

    /// Sessions ordered by start time.
    #[must_use]
    pub fn history(&self) -> Vec<&LocationSession> {
        let mut out: Vec<&LocationSession> = self.sessions.iter().collect();
        out.sort_by_key(|s| s.start_time);
        out
    }

    /// Distinct location ids.
    #[must_use]
    pub fn location_count(&self) -> usize {
        self.sessions
            .iter()
            .map(|s| s.location_id.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// MACs recorded at more than one location, with those locations.
    #[must_use]
    pub fn devices_across_locations(&self) -> BTreeMap<String, Vec<String>> {
        let mut seen: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for session in &self.sessions {
            for mac in &session.devices {
                let locations = seen.entry(mac.clone()).or_default();
                if !locations.contains(&session.location_id) {
                    locations.push(session.location_id.clone());
                }
            }
        }
        seen.retain(|_, locations| locations.len() > 1);
        seen
    }
}

/// Drops points within [`ROUTE_DEDUPE_M`] of the previously kept point.
#[must_use]
pub fn dedupe_route(points: Vec<RoutePoint>) -> Vec<RoutePoint> {
    let mut kept: Vec<RoutePoint> = Vec::with_capacity(points.len());
    for point in points {
        let near = kept
            .last()
            .is_some_and(|last| haversine_m(last.coords(), point.coords()) < ROUTE_DEDUPE_M);
        if !near {
            kept.push(point);
        }
    }
    kept
}

/// Fixed five-stop route for demonstrations.
#[must_use]
pub fn demo_route() -> Vec<RoutePoint> {
    [
        (33.4484, -112.0740, "Phoenix_Home"),
        (33.4734, -112.0431, "Phoenix_Office"),
        (33.5076, -112.0726, "Phoenix_Mall"),
        (33.4942, -112.1122, "Phoenix_Restaurant"),
        (33.4484, -112.0740, "Phoenix_Home_Return"),
    ]
    .into_iter()
    .map(|(lat, lon, name)| RoutePoint::new(lat, lon, Some(name)))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_haversine_known_distance() {
        // Phoenix home to office, roughly 3.9 km.
        let d = haversine_m((33.4484, -112.0740), (33.4734, -112.0431));
        assert!((3_800.0..4_100.0).contains(&d), "got {d}");
    }

    #[test]
    fn test_nearby_readings_share_location() {
        let mut tracker = GpsTracker::new();
        let a = tracker.add_reading(33.4484, -112.0740, Some("Home Base"), 1_000);
        let b = tracker.add_reading(33.4486, -112.0741, None, 1_100);
        assert_eq!(a, "Home_Base");
        assert_eq!(b, "Home_Base");
        assert_eq!(tracker.sessions().len(), 1);
        assert_eq!(tracker.sessions()[0].end_time, 1_100);
    }

    #[test]
    fn test_gap_starts_new_session_with_same_id() {
        let mut tracker = GpsTracker::new();
        tracker.add_reading(33.4484, -112.0740, Some("Home"), 0);
        tracker.add_reading(33.4484, -112.0740, None, 601);
        assert_eq!(tracker.sessions().len(), 2);
        assert!(tracker.sessions().iter().all(|s| s.location_id == "Home"));
        assert_eq!(tracker.location_count(), 1);
    }

    #[test]
    fn test_late_reading_continues_latest_session() {
        let mut tracker = GpsTracker::new();
        tracker.add_reading(33.4484, -112.0740, Some("Home"), 0);
        tracker.add_reading(33.4484, -112.0740, None, 1_000);
        // Out of order: both sessions are within the timeout.
        tracker.add_reading(33.4484, -112.0740, None, 500);

        let sessions = tracker.sessions();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].end_time, 0);
        assert_eq!(sessions[1].start_time, 1_000);
        assert_eq!(sessions[1].end_time, 1_000);
    }

    #[test]
    fn test_generated_and_unique_ids() {
        let mut tracker = GpsTracker::new();
        assert_eq!(
            tracker.add_reading(33.4484, -112.0740, None, 0),
            "loc_33.4484_-112.0740"
        );
        tracker.add_reading(40.0, -100.0, Some("Stop"), 10);
        assert_eq!(tracker.add_reading(41.0, -100.0, Some("Stop"), 20), "Stop_1");
        assert_eq!(tracker.add_reading(42.0, -100.0, Some("Stop"), 30), "Stop_2");
    }

    #[test]
    fn test_record_device_and_cross_location() {
        let mut tracker = GpsTracker::new();
        assert_eq!(tracker.record_device("AA:AA:AA:AA:AA:01"), None);

        tracker.add_reading(33.4484, -112.0740, Some("Home"), 0);
        tracker.record_device("AA:AA:AA:AA:AA:01");
        tracker.record_device("AA:AA:AA:AA:AA:02");
        tracker.add_reading(33.4734, -112.0431, Some("Office"), 900);
        assert_eq!(tracker.current_location_id(), Some("Office"));
        tracker.record_device("AA:AA:AA:AA:AA:01");

        let across = tracker.devices_across_locations();
        assert_eq!(across.len(), 1);
        assert_eq!(
            across.get("AA:AA:AA:AA:AA:01"),
            Some(&vec!["Home".to_string(), "Office".to_string()])
        );
    }

    #[test]
    fn test_nearest_location() {
        let mut tracker = GpsTracker::new();
        tracker.add_reading(33.4484, -112.0740, Some("Home"), 0);
        tracker.add_reading(33.4734, -112.0431, Some("Office"), 10);
        assert_eq!(tracker.nearest_location(33.4733, -112.0430), Some("Office"));
        assert_eq!(tracker.nearest_location(10.0, 10.0), None);
    }

    #[test]
    fn test_history_sorted_by_start() {
        let mut tracker = GpsTracker::new();
        tracker.add_reading(1.0, 1.0, Some("Late"), 500);
        tracker.add_reading(2.0, 2.0, Some("Early"), 100);
        let ids: Vec<&str> = tracker.history().iter().map(|s| s.location_id.as_str()).collect();
        assert_eq!(ids, vec!["Early", "Late"]);
    }

    #[test]
    fn test_dedupe_route() {
        let route = vec![
            RoutePoint::new(33.4484, -112.0740, None),
            RoutePoint::new(33.4485, -112.0740, None),
            RoutePoint::new(33.4734, -112.0431, None),
            RoutePoint::new(33.4484, -112.0740, None),
        ];
        assert_eq!(dedupe_route(route).len(), 3);
    }

    #[test]
    fn test_demo_route_has_five_stops() {
        let route = demo_route();
        assert_eq!(route.len(), 5);
        let mut tracker = GpsTracker::new();
        for (i, p) in route.iter().enumerate() {
            tracker.add_reading(p.lat, p.lon, p.name.as_deref(), i64::try_from(i).unwrap_or(0) * 900);
        }
        // The return leg lands on the home cluster.
        assert_eq!(tracker.location_count(), 4);
    }

    proptest! {
        #[test]
        fn prop_haversine_symmetric_and_non_negative(
            lat1 in -89.0f64..89.0, lon1 in -179.0f64..179.0,
            lat2 in -89.0f64..89.0, lon2 in -179.0f64..179.0,
        ) {
            let ab = haversine_m((lat1, lon1), (lat2, lon2));
            let ba = haversine_m((lat2, lon2), (lat1, lon1));
            prop_assert!(ab >= 0.0);
            prop_assert!((ab - ba).abs() < 1e-6);
            prop_assert!(ab <= std::f64::consts::PI * EARTH_RADIUS_M + 1.0);
        }

        #[test]
        fn prop_haversine_zero_for_same_point(lat in -89.0f64..89.0, lon in -179.0f64..179.0) {
            prop_assert!(haversine_m((lat, lon), (lat, lon)) < 1e-6);
        }
    }
}
