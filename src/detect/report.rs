//! Markdown surveillance report.

use super::{
    PersistenceLevel, Statistics, SuspiciousDevice, SurveillanceDetector, device_correlations,
    geographic_patterns, local_time, temporal_patterns,
};
use crate::error::{IoError, Result};
use chrono::{DateTime, Local};
use std::fmt::Write;
use std::path::Path;

/// Appearances listed per device timeline.
const TIMELINE_LEN: usize = 10;

/// Overall activity assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityLevel {
    /// Nothing suspicious.
    Low,
    /// Suspicious devices, none high.
    Elevated,
    /// More than two medium devices.
    Medium,
    /// At least one device above 0.8.
    High,
}

impl ActivityLevel {
    /// Assesses a set of detections.
    #[must_use]
    pub fn assess(devices: &[SuspiciousDevice]) -> Self {
        if devices.is_empty() {
            return Self::Low;
        }
        let high = devices.iter().filter(|d| d.persistence_score > 0.8).count();
        let medium = devices
            .iter()
            .filter(|d| (0.6..=0.8).contains(&d.persistence_score))
            .count();
        if high > 0 {
            Self::High
        } else if medium > 2 {
            Self::Medium
        } else {
            Self::Elevated
        }
    }

    /// Report label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "LOW ACTIVITY",
            Self::Elevated => "ELEVATED ACTIVITY",
            Self::Medium => "MEDIUM ACTIVITY",
            Self::High => "HIGH ACTIVITY",
        }
    }
}

/// Renders the full report as Markdown.
#[must_use]
pub fn render_report(detector: &SurveillanceDetector, now: DateTime<Local>) -> String {
    let devices = detector.analyze();
    let stats = detector.statistics();
    let level = ActivityLevel::assess(&devices);
    let mut out = String::new();

    let _ = writeln!(out, "# Surveillance Detection Analysis\n");
    let _ = writeln!(
        out,
        "This report looks for wireless devices that keep appearing near you or \
         follow you between locations. Scores are statistical patterns, not proof.\n"
    );

    let _ = writeln!(out, "## Summary\n");
    let _ = writeln!(out, "**Report Generated:** {}", now.format("%A, %B %d, %Y at %H:%M:%S"));
    let _ = writeln!(out, "**Activity Level:** {}", level.label());
    let _ = writeln!(out, "**Monitoring Period:** {:.1} hours", stats.analysis_duration_hours);
    let _ = writeln!(out, "**Total Device Appearances:** {}", stats.total_appearances);
    let _ = writeln!(out, "**Unique Devices Tracked:** {}", stats.unique_devices);
    let _ = writeln!(out, "**Suspicious Devices Identified:** {}", devices.len());
    let _ = writeln!(out, "**Locations Analyzed:** {}\n", stats.unique_locations);

    write_analytics(&mut out, &stats);

    if devices.is_empty() {
        let _ = writeln!(out, "## Clean Environment\n");
        let _ = writeln!(
            out,
            "No suspicious patterns were identified. {} unique devices across {} locations \
             ({} appearances over {:.1} hours) stayed within normal behaviour.\n",
            stats.unique_devices,
            stats.unique_locations,
            stats.total_appearances,
            stats.analysis_duration_hours
        );
    } else {
        let _ = writeln!(out, "## Persistent Devices\n");
        for (tier, title) in [
            (PersistenceLevel::Critical, "Very High Persistence (score > 0.9)"),
            (PersistenceLevel::High, "High Persistence (score 0.8-0.9)"),
            (PersistenceLevel::Medium, "Moderate Persistence (score 0.6-0.8)"),
            (PersistenceLevel::Low, "Low Persistence (score < 0.6)"),
        ] {
            let in_tier: Vec<&SuspiciousDevice> = devices.iter().filter(|d| d.level() == tier).collect();
            if in_tier.is_empty() {
                continue;
            }
            let _ = writeln!(out, "### {title}\n");
            for device in in_tier {
                write_device(&mut out, device);
            }
        }

        let _ = writeln!(out, "## Behavioral Patterns\n");
        let _ = writeln!(out, "### Temporal Patterns");
        for pattern in temporal_patterns(&devices) {
            let _ = writeln!(out, "- {pattern}");
        }
        let _ = writeln!(out, "\n### Geographic Patterns");
        for pattern in geographic_patterns(&devices) {
            let _ = writeln!(out, "- {pattern}");
        }
        let _ = writeln!(out, "\n### Device Correlations");
        let correlations = device_correlations(&devices);
        if correlations.is_empty() {
            let _ = writeln!(out, "- No significant device correlations detected");
        }
        for correlation in correlations {
            let _ = writeln!(out, "- {correlation}");
        }
        let _ = writeln!(out);
    }

    write_recommendations(&mut out, level);

    let t = detector.thresholds();
    let _ = writeln!(out, "## Appendix: Algorithm Parameters\n");
    let _ = writeln!(out, "```");
    let _ = writeln!(out, "Minimum Appearances Threshold: {}", t.min_appearances);
    let _ = writeln!(out, "Minimum Time Span: {:.1} hours", t.min_time_span_hours);
    let _ = writeln!(out, "Minimum Persistence Score: {}", t.min_persistence_score);
    let _ = writeln!(out, "```\n");
    let _ = writeln!(out, "- Analysis based on **{} data points**", detector.total_appearances());
    let _ = writeln!(out, "- Detection accuracy: **{:.1}%**\n", stats.detection_accuracy * 100.0);
    let _ = writeln!(out, "---\n");
    let _ = writeln!(out, "**Report ID:** {}", report_id(now));
    out
}

/// `CYT-<YYYYMMDDHHMMSS>`.
#[must_use]
pub fn report_id(now: DateTime<Local>) -> String {
    format!("CYT-{}", now.format("%Y%m%d%H%M%S"))
}

/// Writes a rendered report, creating parent directories.
pub fn write_report(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| IoError::DirectoryFailed {
            path: parent.display().to_string(),
            reason: e.to_string(),
        })?;
    }
    std::fs::write(path, text).map_err(|e| IoError::WriteFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    tracing::info!(path = %path.display(), "surveillance report written");
    Ok(())
}

fn write_analytics(out: &mut String, stats: &Statistics) {
    let persistence = if stats.persistence_rate > 0.3 {
        "High"
    } else if stats.persistence_rate > 0.15 {
        "Medium"
    } else {
        "Normal"
    };
    let multi = if stats.multi_location_rate > 0.2 {
        "Critical"
    } else if stats.multi_location_rate > 0.1 {
        "Elevated"
    } else {
        "Normal"
    };
    let coverage = if stats.analysis_duration_hours > 12.0 {
        "Comprehensive"
    } else if stats.analysis_duration_hours > 6.0 {
        "Moderate"
    } else {
        "Limited"
    };

    let _ = writeln!(out, "## Analytics\n");
    let _ = writeln!(out, "| Metric | Value | Indicator |");
    let _ = writeln!(out, "|--------|-------|-----------|");
    let _ = writeln!(out, "| Device Persistence Rate | {:.1}% | {persistence} |", stats.persistence_rate * 100.0);
    let _ = writeln!(out, "| Multi-Location Tracking | {:.1}% | {multi} |", stats.multi_location_rate * 100.0);
    let _ = writeln!(out, "| Temporal Clustering | {:.1}% | - |", stats.temporal_clustering * 100.0);
    let _ = writeln!(out, "| Off-Hours Activity | {:.1}% | - |", stats.off_hours_rate * 100.0);
    let _ = writeln!(out, "| Probe Anomalies | {:.1}% | - |", stats.probe_anomaly_rate * 100.0);
    let _ = writeln!(out, "| Analysis Time Period | {:.1} hours | {coverage} |\n", stats.analysis_duration_hours);
}

fn write_device(out: &mut String, device: &SuspiciousDevice) {
    let span_hours = device.span_hours();
    let _ = writeln!(out, "#### Device `{}`\n", device.mac);
    let _ = writeln!(out, "- **Level:** {}", device.level().label());
    let _ = writeln!(out, "- **Persistence Score:** {:.3}/1.000", device.persistence_score);
    let _ = writeln!(out, "- **First Seen:** {}", format_ts(device.first_seen));
    let _ = writeln!(out, "- **Last Seen:** {}", format_ts(device.last_seen));
    let _ = writeln!(out, "- **Period:** {span_hours:.1} hours");
    let _ = writeln!(out, "- **Appearances:** {}", device.total_appearances);
    let _ = writeln!(
        out,
        "- **Rate:** {:.2} per hour",
        device.total_appearances as f64 / span_hours.max(1.0)
    );
    let _ = writeln!(
        out,
        "- **Locations ({}):** {}",
        device.locations_seen.len(),
        device.locations_seen.join(", ")
    );
    if device.locations_seen.len() > 1 {
        let _ = writeln!(out, "- **Following:** seen at multiple locations");
    }

    let _ = writeln!(out, "\n**Reasons:**");
    for (i, reason) in device.reasons.iter().enumerate() {
        let _ = writeln!(out, "{}. {reason}", i + 1);
    }

    let _ = writeln!(out, "\n**Recent Activity:**");
    let mut recent: Vec<_> = device.appearances.iter().collect();
    recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    for appearance in recent.iter().take(TIMELINE_LEN) {
        let ssids = if appearance.ssids_probed.is_empty() {
            "No probes".to_string()
        } else {
            appearance.ssids_probed.iter().take(2).cloned().collect::<Vec<_>>().join(", ")
        };
        let _ = writeln!(
            out,
            "- `{}` | Location: `{}` | SSIDs: {ssids}",
            format_ts(appearance.timestamp),
            appearance.location_id
        );
    }
    if device.appearances.len() > TIMELINE_LEN {
        let _ = writeln!(
            out,
            "- *... and {} additional appearances*",
            device.appearances.len() - TIMELINE_LEN
        );
    }
    let _ = writeln!(out, "\n---\n");
}

fn write_recommendations(out: &mut String, level: ActivityLevel) {
    let _ = writeln!(out, "## Recommendations\n");
    if level == ActivityLevel::High {
        let _ = writeln!(out, "- Enable MAC address randomization on your own devices");
        let _ = writeln!(out, "- Vary routes and departure times");
        let _ = writeln!(out, "- Keep this report and note when and where the devices appear");
        let _ = writeln!(out, "- Contact local authorities if you feel unsafe");
    }
    let _ = writeln!(out, "- Remove saved Wi-Fi networks you no longer use");
    let _ = writeln!(out, "- Run the analysis regularly and compare reports");
    let _ = writeln!(
        out,
        "- Remember that neighbours and businesses also produce persistent devices\n"
    );
}

fn format_ts(ts: i64) -> String {
    local_time(ts).map_or_else(
        || ts.to_string(),
        |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}
