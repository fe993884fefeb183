//! Persistence-based surveillance detection.
//!
//! Every sighting of a device is recorded as a [`DeviceAppearance`]. Devices
//! that keep appearing over a long enough span, especially across several
//! locations, are scored and reported as [`SuspiciousDevice`]s.

// Counts and spans here are small; precision loss in the ratios is fine.
#![allow(clippy::cast_precision_loss)]

pub mod report;

pub use report::{render_report, write_report};

use crate::config::DetectionConfig;
use chrono::{DateTime, Datelike, Local, TimeZone, Timelike};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// SSID fragments that mark a probe pattern as anomalous.
pub const SUSPICIOUS_SSID_KEYWORDS: &[&str] =
    &["surveillance", "monitor", "track", "spy", "watch", "police", "fbi"];

/// One sighting of a device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceAppearance {
    /// Device MAC.
    pub mac: String,
    /// Unix seconds.
    pub timestamp: i64,
    /// Location cluster the sighting belongs to.
    pub location_id: String,
    /// SSIDs the device probed for.
    pub ssids_probed: Vec<String>,
    /// Signal strength in dBm, when known.
    pub signal_strength: Option<f64>,
    /// Kismet device type, when known.
    pub device_type: Option<String>,
}

/// Scoring thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    /// Appearances needed before a device is scored.
    pub min_appearances: usize,
    /// Minimum span between first and last appearance.
    pub min_time_span_hours: f64,
    /// Score a device must exceed to be reported.
    pub min_persistence_score: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::from(&DetectionConfig::default())
    }
}

impl From<&DetectionConfig> for Thresholds {
    fn from(config: &DetectionConfig) -> Self {
        Self {
            min_appearances: config.min_appearances,
            min_time_span_hours: config.min_time_span_hours,
            min_persistence_score: config.min_persistence_score,
        }
    }
}

/// Coarse tier of a persistence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PersistenceLevel {
    /// Above 0.9.
    Critical,
    /// 0.8 to 0.9.
    High,
    /// 0.6 up to 0.8.
    Medium,
    /// Below 0.6.
    Low,
}

impl PersistenceLevel {
    /// Classifies a score.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score > 0.9 {
            Self::Critical
        } else if score >= 0.8 {
            Self::High
        } else if score >= 0.6 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Upper-case label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

/// A device whose appearances crossed the persistence threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuspiciousDevice {
    /// Device MAC.
    pub mac: String,
    /// Score in `0..=1`.
    pub persistence_score: f64,
    /// Every appearance of the device.
    #[serde(skip)]
    pub appearances: Vec<DeviceAppearance>,
    /// Human-readable scoring reasons.
    pub reasons: Vec<String>,
    /// Earliest appearance (unix seconds).
    pub first_seen: i64,
    /// Latest appearance (unix seconds).
    pub last_seen: i64,
    /// Number of appearances.
    pub total_appearances: usize,
    /// Distinct locations, sorted.
    pub locations_seen: Vec<String>,
}

impl SuspiciousDevice {
    /// Tier of the score.
    #[must_use]
    pub fn level(&self) -> PersistenceLevel {
        PersistenceLevel::from_score(self.persistence_score)
    }

    /// Hours between first and last appearance.
    #[must_use]
    pub fn span_hours(&self) -> f64 {
        (self.last_seen - self.first_seen) as f64 / 3600.0
    }
}

/// A suspicious device that also matches stalking indicators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StalkingCandidate {
    /// Underlying detection.
    pub device: SuspiciousDevice,
    /// Stalking score in `0..=1`.
    pub stalking_score: f64,
    /// Which indicators matched.
    pub reasons: Vec<String>,
}

/// Aggregate figures over every recorded appearance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Statistics {
    /// Appearances recorded.
    pub total_appearances: usize,
    /// Distinct devices.
    pub unique_devices: usize,
    /// Distinct locations.
    pub unique_locations: usize,
    /// Hours between the first and last appearance.
    pub analysis_duration_hours: f64,
    /// Share of devices with at least `min_appearances`.
    pub persistence_rate: f64,
    /// Share of devices seen at two or more locations.
    pub multi_location_rate: f64,
    /// Share of devices with low interval variance.
    pub temporal_clustering: f64,
    /// Share of appearances between 22:00 and 06:59.
    pub off_hours_rate: f64,
    /// Share of devices with anomalous probe patterns.
    pub probe_anomaly_rate: f64,
    /// Nominal detection accuracy.
    pub detection_accuracy: f64,
}

/// Collects appearances and scores devices.
#[derive(Debug, Clone, Default)]
pub struct SurveillanceDetector {
    thresholds: Thresholds,
    history: BTreeMap<String, Vec<DeviceAppearance>>,
    total: usize,
}

impl SurveillanceDetector {
    /// Creates an empty detector.
    #[must_use]
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            history: BTreeMap::new(),
            total: 0,
        }
    }

    /// Thresholds in use.
    #[must_use]
    pub const fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Records one appearance.
    pub fn add_appearance(&mut self, appearance: DeviceAppearance) {
        tracing::trace!(mac = %appearance.mac, location = %appearance.location_id, "recorded appearance");
        self.history
            .entry(appearance.mac.clone())
            .or_default()
            .push(appearance);
        self.total += 1;
    }

    /// Number of recorded appearances.
    #[must_use]
    pub const fn total_appearances(&self) -> usize {
        self.total
    }

    /// Appearances grouped by MAC.
    #[must_use]
    pub const fn history(&self) -> &BTreeMap<String, Vec<DeviceAppearance>> {
        &self.history
    }

    fn appearances(&self) -> impl Iterator<Item = &DeviceAppearance> {
        self.history.values().flatten()
    }

    /// Scores one device's appearances, returning the score and reasons.
    #[must_use]
    pub fn persistence_score(&self, appearances: &[DeviceAppearance]) -> (f64, Vec<String>) {
        let mut reasons = Vec::new();
        if appearances.len() < self.thresholds.min_appearances.max(1) {
            return (0.0, reasons);
        }

        let (first, last) = time_range(appearances);
        let span_hours = (last - first) as f64 / 3600.0;
        if span_hours < self.thresholds.min_time_span_hours || span_hours <= 0.0 {
            return (0.0, reasons);
        }

        let rate = appearances.len() as f64 / span_hours;
        if rate < 0.5 {
            return (0.0, reasons);
        }

        let mut score = (rate / 2.0).min(1.0);
        reasons.push(format!(
            "Appeared {} times over {span_hours:.1} hours",
            appearances.len()
        ));

        let locations = distinct_locations(appearances);
        if locations.len() > 1 {
            reasons.push(format!("Followed across {} different locations", locations.len()));
            score = (score + 0.3).min(1.0);
        }
        (score, reasons)
    }

    /// Devices scoring above the threshold, highest score first.
    #[must_use]
    pub fn analyze(&self) -> Vec<SuspiciousDevice> {
        let mut suspicious: Vec<SuspiciousDevice> = self
            .history
            .iter()
            .filter(|(_, apps)| apps.len() >= self.thresholds.min_appearances)
            .filter_map(|(mac, apps)| {
                let (score, reasons) = self.persistence_score(apps);
                if score <= self.thresholds.min_persistence_score {
                    return None;
                }
                let (first_seen, last_seen) = time_range(apps);
                Some(SuspiciousDevice {
                    mac: mac.clone(),
                    persistence_score: score,
                    appearances: apps.clone(),
                    reasons,
                    first_seen,
                    last_seen,
                    total_appearances: apps.len(),
                    locations_seen: distinct_locations(apps).into_iter().collect(),
                })
            })
            .collect();

        suspicious.sort_by(|a, b| b.persistence_score.total_cmp(&a.persistence_score));
        tracing::info!(
            devices = self.history.len(),
            suspicious = suspicious.len(),
            "persistence analysis complete"
        );
        suspicious
    }

    /// Aggregate figures over every appearance.
    #[must_use]
    pub fn statistics(&self) -> Statistics {
        let unique_devices = self.history.len();
        if self.total == 0 {
            return Statistics {
                total_appearances: 0,
                unique_devices: 0,
                unique_locations: 0,
                analysis_duration_hours: 0.0,
                persistence_rate: 0.0,
                multi_location_rate: 0.0,
                temporal_clustering: 0.0,
                off_hours_rate: 0.0,
                probe_anomaly_rate: 0.0,
                detection_accuracy: 0.95,
            };
        }

        let unique_locations = self
            .appearances()
            .map(|a| a.location_id.as_str())
            .collect::<HashSet<_>>()
            .len();
        let (first, last) = self
            .appearances()
            .fold((i64::MAX, i64::MIN), |(lo, hi), a| (lo.min(a.timestamp), hi.max(a.timestamp)));
        let duration = (last - first).max(0);

        let per_device = |pred: &dyn Fn(&[DeviceAppearance]) -> bool| {
            self.history.values().filter(|apps| pred(apps.as_slice())).count() as f64 / unique_devices as f64
        };

        let persistence_rate = per_device(&|apps| apps.len() >= self.thresholds.min_appearances);
        let multi_location_rate = per_device(&|apps| distinct_locations(apps).len() >= 2);
        let temporal_clustering = per_device(&|apps| {
            apps.len() >= 3 && interval_stats(apps).is_some_and(|(_, variance)| variance < 3600.0)
        });
        let probe_anomaly_rate = per_device(&has_probe_anomaly);

        let off_hours = self
            .appearances()
            .filter(|a| local_time(a.timestamp).is_some_and(|t| is_off_hours(t.hour())))
            .count();

        Statistics {
            total_appearances: self.total,
            unique_devices,
            unique_locations,
            analysis_duration_hours: duration as f64 / 3600.0,
            persistence_rate,
            multi_location_rate,
            temporal_clustering,
            off_hours_rate: off_hours as f64 / self.total as f64,
            probe_anomaly_rate,
            detection_accuracy: 0.95,
        }
    }

    /// Suspicious devices that also look like stalking.
    ///
    /// Considers devices scoring at least `min_score`; 3+ locations add 0.4,
    /// 10+ appearances add 0.3, a 24 h+ span adds 0.3. Kept at 0.6 or more.
    #[must_use]
    pub fn stalking_candidates(&self, min_score: f64) -> Vec<StalkingCandidate> {
        self.analyze()
            .into_iter()
            .filter(|d| d.persistence_score >= min_score)
            .filter_map(|device| {
                let mut score: f64 = 0.0;
                let mut reasons = Vec::new();
                let locations = device.locations_seen.len();
                if locations >= 3 {
                    score += 0.4;
                    reasons.push(format!("Follows across {locations} locations"));
                }
                if device.total_appearances >= 10 {
                    score += 0.3;
                    reasons.push(format!(
                        "High frequency ({} appearances)",
                        device.total_appearances
                    ));
                }
                let span_hours = device.span_hours();
                if span_hours >= 24.0 {
                    score += 0.3;
                    reasons.push(format!("Persistent over {:.1} days", span_hours / 24.0));
                }
                (score >= 0.6).then_some(StalkingCandidate {
                    device,
                    stalking_score: score,
                    reasons,
                })
            })
            .collect()
    }
}

/// Timing observations across suspicious devices.
#[must_use]
pub fn temporal_patterns(devices: &[SuspiciousDevice]) -> Vec<String> {
    if devices.is_empty() {
        return vec!["No suspicious devices to analyze".to_string()];
    }

    let mut work_hours = 0;
    let mut off_hours = 0;
    let mut regular = 0;
    let mut weekday_heavy = 0;
    let mut weekend_heavy = 0;

    for device in devices {
        let times: Vec<DateTime<Local>> = device
            .appearances
            .iter()
            .filter_map(|a| local_time(a.timestamp))
            .collect();
        if !times.is_empty() {
            let n = times.len() as f64;
            let work = times.iter().filter(|t| (9..=17).contains(&t.hour())).count() as f64;
            let off = times.iter().filter(|t| is_off_hours(t.hour())).count() as f64;
            if work / n > 0.7 {
                work_hours += 1;
            }
            if off / n > 0.7 {
                off_hours += 1;
            }
        }

        if device.appearances.len() >= 3
            && let Some((mean, variance)) = interval_stats(&device.appearances)
            && variance < mean * 0.1
        {
            regular += 1;
        }

        let weekdays = times
            .iter()
            .filter(|t| t.weekday().num_days_from_monday() < 5)
            .count();
        let weekends = times.len() - weekdays;
        if weekdays > weekends * 2 {
            weekday_heavy += 1;
        } else if weekends > weekdays {
            weekend_heavy += 1;
        }
    }

    let mut patterns = Vec::new();
    if work_hours > 0 {
        patterns.push(format!(
            "**{work_hours} devices** show work-hours-only activity (9 AM - 5 PM)"
        ));
    }
    if off_hours > 0 {
        patterns.push(format!(
            "**{off_hours} devices** show off-hours activity (10 PM - 6 AM)"
        ));
    }
    if regular > 0 {
        patterns.push(format!("**{regular} devices** appear at highly regular intervals"));
    }
    if weekday_heavy > 0 {
        patterns.push(format!("**{weekday_heavy} devices** appear primarily on weekdays"));
    }
    if weekend_heavy > 0 {
        patterns.push(format!("**{weekend_heavy} devices** appear primarily on weekends"));
    }
    if patterns.is_empty() {
        patterns.push("No significant temporal patterns detected across suspicious devices".to_string());
    }
    patterns
}

/// Location observations across suspicious devices.
#[must_use]
pub fn geographic_patterns(devices: &[SuspiciousDevice]) -> Vec<String> {
    if devices.is_empty() {
        return vec!["No suspicious devices to analyze".to_string()];
    }
    let mut patterns = Vec::new();

    let multi = devices.iter().filter(|d| d.locations_seen.len() > 1).count();
    if multi > 0 {
        patterns.push(format!("**{multi} devices** confirmed following across multiple locations"));
    }

    let mut frequency: BTreeMap<&str, usize> = BTreeMap::new();
    for device in devices {
        for location in &device.locations_seen {
            *frequency.entry(location.as_str()).or_default() += 1;
        }
    }
    let hotspots: Vec<&str> = frequency
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(loc, _)| loc)
        .collect();
    if !hotspots.is_empty() {
        patterns.push(format!(
            "**Hotspots:** {} - multiple suspicious devices at these locations",
            hotspots.join(", ")
        ));
    }

    let quick = devices
        .iter()
        .filter(|d| {
            let mut sorted: Vec<&DeviceAppearance> = d.appearances.iter().collect();
            sorted.sort_by_key(|a| a.timestamp);
            sorted.windows(2).any(|pair| {
                pair[0].location_id != pair[1].location_id
                    && pair[1].timestamp - pair[0].timestamp < 1800
            })
        })
        .count();
    if quick > 0 {
        patterns.push(format!(
            "**{quick} devices** show rapid location transitions (< 30 minutes)"
        ));
    }

    if patterns.is_empty() {
        patterns.push("No significant geographic tracking patterns detected".to_string());
    }
    patterns
}

/// Pairs of suspicious devices that share locations or appear together.
#[must_use]
pub fn device_correlations(devices: &[SuspiciousDevice]) -> Vec<String> {
    let mut correlations = Vec::new();
    for (i, a) in devices.iter().enumerate() {
        for b in &devices[i + 1..] {
            let a_locs: BTreeSet<&str> = a.locations_seen.iter().map(String::as_str).collect();
            let common: Vec<&str> = b
                .locations_seen
                .iter()
                .map(String::as_str)
                .filter(|l| a_locs.contains(l))
                .collect();
            if common.len() > 1 {
                correlations.push(format!(
                    "**{}** and **{}** both appear at: {}",
                    a.mac,
                    b.mac,
                    common.join(", ")
                ));
            }

            let together = a
                .appearances
                .iter()
                .flat_map(|x| b.appearances.iter().map(move |y| (x, y)))
                .filter(|(x, y)| {
                    (x.timestamp - y.timestamp).abs() < 3600 && x.location_id == y.location_id
                })
                .count();
            if together > 2 {
                correlations.push(format!(
                    "**{}** and **{}** appear together {together} times",
                    a.mac, b.mac
                ));
            }
        }
    }
    correlations
}

fn time_range(appearances: &[DeviceAppearance]) -> (i64, i64) {
    let first = appearances.iter().map(|a| a.timestamp).min().unwrap_or(0);
    let last = appearances.iter().map(|a| a.timestamp).max().unwrap_or(0);
    (first, last)
}

fn distinct_locations(appearances: &[DeviceAppearance]) -> BTreeSet<String> {
    appearances.iter().map(|a| a.location_id.clone()).collect()
}

/// Mean and population variance of gaps between sorted appearances.
fn interval_stats(appearances: &[DeviceAppearance]) -> Option<(f64, f64)> {
    let mut times: Vec<i64> = appearances.iter().map(|a| a.timestamp).collect();
    times.sort_unstable();
    let intervals: Vec<f64> = times.windows(2).map(|w| (w[1] - w[0]) as f64).collect();
    if intervals.is_empty() {
        return None;
    }
    let n = intervals.len() as f64;
    let mean = intervals.iter().sum::<f64>() / n;
    let variance = intervals.iter().map(|i| (i - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance))
}

fn has_probe_anomaly(appearances: &[DeviceAppearance]) -> bool {
    let ssids: HashSet<&str> = appearances
        .iter()
        .flat_map(|a| a.ssids_probed.iter().map(String::as_str))
        .collect();
    ssids.len() > 20
        || ssids.iter().any(|ssid| {
            let lower = ssid.to_lowercase();
            SUSPICIOUS_SSID_KEYWORDS.iter().any(|k| lower.contains(k))
        })
}

const fn is_off_hours(hour: u32) -> bool {
    hour >= 22 || hour <= 6
}

/// Local wall-clock time of a unix timestamp.
pub(crate) fn local_time(ts: i64) -> Option<DateTime<Local>> {
    Local.timestamp_opt(ts, 0).single()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use test_case::test_case;

    pub(crate) fn appearance(mac: &str, ts: i64, location: &str) -> DeviceAppearance {
        DeviceAppearance {
            mac: mac.to_string(),
            timestamp: ts,
            location_id: location.to_string(),
            ssids_probed: Vec::new(),
            signal_strength: None,
            device_type: None,
        }
    }

    fn local_ts(y: i32, mo: u32, d: u32, h: u32) -> i64 {
        Local
            .with_ymd_and_hms(y, mo, d, h, 0, 0)
            .earliest()
            .expect("valid local time")
            .timestamp()
    }

    #[test_case(0.95, PersistenceLevel::Critical ; "critical")]
    #[test_case(0.9, PersistenceLevel::High ; "high upper bound")]
    #[test_case(0.8, PersistenceLevel::High ; "high lower bound")]
    #[test_case(0.79, PersistenceLevel::Medium ; "medium")]
    #[test_case(0.6, PersistenceLevel::Medium ; "medium lower bound")]
    #[test_case(0.59, PersistenceLevel::Low ; "low")]
    fn test_level_classification(score: f64, expected: PersistenceLevel) {
        assert_eq!(PersistenceLevel::from_score(score), expected);
    }

    #[test]
    fn test_score_requires_appearances_and_span() {
        let detector = SurveillanceDetector::default();
        let two = vec![appearance("A", 0, "L1"), appearance("A", 7200, "L1")];
        assert_eq!(detector.persistence_score(&two).0, 0.0);

        let brief = vec![
            appearance("A", 0, "L1"),
            appearance("A", 600, "L1"),
            appearance("A", 1200, "L1"),
        ];
        assert_eq!(detector.persistence_score(&brief).0, 0.0);
    }

    #[test]
    fn test_score_rate_and_location_bonus() {
        let detector = SurveillanceDetector::default();
        // 3 appearances over 2 hours: rate 1.5, score 0.75.
        let single = vec![
            appearance("A", 0, "L1"),
            appearance("A", 3600, "L1"),
            appearance("A", 7200, "L1"),
        ];
        let (score, reasons) = detector.persistence_score(&single);
        assert!((score - 0.75).abs() < 1e-9);
        assert_eq!(reasons, vec!["Appeared 3 times over 2.0 hours".to_string()]);

        let moving = vec![
            appearance("A", 0, "L1"),
            appearance("A", 3600, "L2"),
            appearance("A", 7200, "L3"),
        ];
        let (score, reasons) = detector.persistence_score(&moving);
        assert!((score - 1.0).abs() < 1e-9);
        assert_eq!(reasons[1], "Followed across 3 different locations");
    }

    #[test]
    fn test_slow_rate_scores_zero() {
        let detector = SurveillanceDetector::default();
        // 3 appearances over 10 hours: rate 0.3.
        let slow = vec![
            appearance("A", 0, "L1"),
            appearance("A", 18_000, "L1"),
            appearance("A", 36_000, "L1"),
        ];
        assert_eq!(detector.persistence_score(&slow).0, 0.0);
    }

    #[test]
    fn test_analyze_sorts_and_filters() {
        let mut detector = SurveillanceDetector::default();
        for (i, loc) in ["L1", "L2", "L3"].iter().enumerate() {
            detector.add_appearance(appearance("FOLLOWER", i as i64 * 3600, loc));
            detector.add_appearance(appearance("LOCAL", i as i64 * 3600, "L1"));
        }
        detector.add_appearance(appearance("ONCE", 0, "L1"));

        let suspicious = detector.analyze();
        assert_eq!(suspicious.len(), 2);
        assert_eq!(suspicious[0].mac, "FOLLOWER");
        assert_eq!(suspicious[0].locations_seen, vec!["L1", "L2", "L3"]);
        assert_eq!(suspicious[0].level(), PersistenceLevel::Critical);
        assert_eq!(suspicious[1].mac, "LOCAL");
        assert_eq!(suspicious[1].level(), PersistenceLevel::Medium);
    }

    #[test]
    fn test_statistics() {
        let mut detector = SurveillanceDetector::default();
        assert_eq!(detector.statistics().total_appearances, 0);

        for i in 0..3 {
            detector.add_appearance(appearance("A", local_ts(2024, 3, 4, 12) + i * 600, "L1"));
        }
        let mut probe = appearance("B", local_ts(2024, 3, 4, 23), "L2");
        probe.ssids_probed.push("FBI Surveillance Van".to_string());
        detector.add_appearance(probe);

        let stats = detector.statistics();
        assert_eq!(stats.total_appearances, 4);
        assert_eq!(stats.unique_devices, 2);
        assert_eq!(stats.unique_locations, 2);
        assert!((stats.persistence_rate - 0.5).abs() < 1e-9);
        assert!((stats.temporal_clustering - 0.5).abs() < 1e-9);
        assert!((stats.off_hours_rate - 0.25).abs() < 1e-9);
        assert!((stats.probe_anomaly_rate - 0.5).abs() < 1e-9);
        assert_eq!(stats.multi_location_rate, 0.0);
    }

    #[test]
    fn test_stalking_candidates() {
        let mut detector = SurveillanceDetector::default();
        // 12 appearances across 3 locations spanning 22 hours.
        for i in 0..12 {
            let loc = ["Home", "Office", "Gym"][i % 3];
            detector.add_appearance(appearance("STALKER", i as i64 * 7200, loc));
        }
        let candidates = detector.stalking_candidates(0.5);
        assert_eq!(candidates.len(), 1);
        assert!((candidates[0].stalking_score - 0.7).abs() < 1e-9);
        assert_eq!(candidates[0].reasons.len(), 2);
        assert!(detector.stalking_candidates(1.1).is_empty());
    }

    #[test]
    fn test_geographic_patterns_and_correlations() {
        let mut detector = SurveillanceDetector::default();
        for (i, loc) in ["L1", "L2", "L1", "L2"].iter().enumerate() {
            detector.add_appearance(appearance("A", i as i64 * 1200, loc));
            detector.add_appearance(appearance("B", i as i64 * 1200 + 60, loc));
        }
        let suspicious = detector.analyze();
        assert_eq!(suspicious.len(), 2);

        let geo = geographic_patterns(&suspicious);
        assert!(geo.iter().any(|p| p.contains("2 devices** confirmed following")));
        assert!(geo.iter().any(|p| p.contains("Hotspots:** L1, L2")));
        assert!(geo.iter().any(|p| p.contains("rapid location transitions")));

        let correlations = device_correlations(&suspicious);
        assert!(correlations.iter().any(|c| c.contains("both appear at: L1, L2")));
        assert!(correlations.iter().any(|c| c.contains("appear together")));
    }

    #[test]
    fn test_patterns_empty() {
        assert_eq!(temporal_patterns(&[]), vec!["No suspicious devices to analyze"]);
        assert_eq!(geographic_patterns(&[]), vec!["No suspicious devices to analyze"]);
        assert!(device_correlations(&[]).is_empty());
    }

    #[test]
    fn test_temporal_patterns_regular_intervals() {
        let mut detector = SurveillanceDetector::default();
        let start = local_ts(2024, 3, 4, 10);
        for i in 0..4 {
            detector.add_appearance(appearance("A", start + i * 1800, "L1"));
        }
        let suspicious = detector.analyze();
        let patterns = temporal_patterns(&suspicious);
        assert!(patterns.iter().any(|p| p.contains("regular intervals")));
        assert!(patterns.iter().any(|p| p.contains("work-hours")));
        assert!(patterns.iter().any(|p| p.contains("weekdays")));
    }
}
