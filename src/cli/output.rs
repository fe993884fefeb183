//! Output formatting for CLI commands.
//!
//! Supports text and JSON output formats.

use crate::analyze::AnalysisResults;
use crate::config::Config;
use crate::detect::StalkingCandidate;
use crate::error::Error;
use crate::ignore::IgnoreLists;
use crate::probes::ProbeSummary;
use crate::tracker::MonitorSummary;
use crate::watch::StatusReport;
use serde::Serialize;
use std::fmt::Write;
use std::path::Path;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
}

impl OutputFormat {
    /// Parses format from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Formats a single status check.
#[must_use]
pub fn format_status_report(report: &StatusReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = report.lines().join("\n");
            output.push('\n');
            output
        }
        OutputFormat::Json => format_json(report),
    }
}

/// Formats the end of a status watch.
#[must_use]
pub fn format_status_stopped(cycles: u64, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!("Status monitoring stopped after {cycles} checks.\n"),
        OutputFormat::Json => format_json(&serde_json::json!({ "cycles": cycles })),
    }
}

/// Formats a successful launch.
#[must_use]
pub fn format_launch(program: &str, pid: u32, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!("Launched {program} (pid {pid})\n"),
        OutputFormat::Json => format_json(&serde_json::json!({ "program": program, "pid": pid })),
    }
}

/// Formats a monitoring summary.
#[must_use]
pub fn format_monitor_summary(summary: &MonitorSummary, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            output.push_str("Monitoring summary\n");
            let _ = writeln!(output, "  Capture:      {}", summary.capture.display());
            let _ = writeln!(output, "  Session log:  {}", summary.session_log.display());
            let _ = writeln!(output, "  Cycles:       {}", summary.cycles);
            let _ = writeln!(output, "  Alerts:       {}", summary.alerts);
            let _ = writeln!(output, "  Errors:       {}", summary.errors);
            output
        }
        OutputFormat::Json => format_json(summary),
    }
}

/// Formats the result of building ignore lists.
#[must_use]
pub fn format_ignore_built(
    lists: &IgnoreLists,
    mac_path: &Path,
    ssid_path: &Path,
    format: OutputFormat,
) -> String {
    let counts = lists.counts();
    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            let _ = writeln!(output, "Saved {} MACs to {}", counts.macs, mac_path.display());
            let _ = writeln!(output, "Saved {} SSIDs to {}", counts.ssids, ssid_path.display());
            output
        }
        OutputFormat::Json => format_json(&serde_json::json!({
            "macs": counts.macs,
            "ssids": counts.ssids,
            "mac_list": mac_path,
            "ssid_list": ssid_path,
        })),
    }
}

/// Formats the current ignore lists, sorted.
#[must_use]
pub fn format_ignore_lists(lists: &IgnoreLists, format: OutputFormat) -> String {
    let mut macs: Vec<&String> = lists.macs.iter().collect();
    let mut ssids: Vec<&String> = lists.ssids.iter().collect();
    macs.sort();
    ssids.sort();

    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            let _ = writeln!(output, "Ignored MACs ({}):", macs.len());
            for mac in &macs {
                let _ = writeln!(output, "  {mac}");
            }
            let _ = writeln!(output, "Ignored SSIDs ({}):", ssids.len());
            for ssid in &ssids {
                let _ = writeln!(output, "  {ssid}");
            }
            output
        }
        OutputFormat::Json => format_json(&serde_json::json!({ "macs": macs, "ssids": ssids })),
    }
}

/// Formats probe summaries.
#[must_use]
pub fn format_probe_summaries(files_read: usize, summaries: &[ProbeSummary], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            if summaries.is_empty() {
                return format!("No probe requests found in {files_read} logs.\n");
            }
            let mut output = String::new();
            let _ = writeln!(
                output,
                "Found {} unique SSIDs in {files_read} logs\n",
                summaries.len()
            );
            let _ = writeln!(
                output,
                "{:<32} {:>6}  {:<19}  {:<19}  Rate",
                "SSID", "Count", "First Seen", "Last Seen"
            );
            output.push_str(&"-".repeat(92));
            output.push('\n');
            for s in summaries {
                let rate = s
                    .probes_per_second
                    .map_or_else(|| "-".to_string(), |r| format!("{r:.4}/s"));
                let _ = writeln!(
                    output,
                    "{:<32} {:>6}  {}  {}  {rate}",
                    truncate(&s.ssid, 32),
                    s.count,
                    s.first_seen.format("%Y-%m-%d %H:%M:%S"),
                    s.last_seen.format("%Y-%m-%d %H:%M:%S"),
                );
            }
            output
        }
        OutputFormat::Json => format_json(&serde_json::json!({
            "files_read": files_read,
            "ssids": summaries,
        })),
    }
}

/// Formats analysis results.
#[must_use]
pub fn format_analysis(results: &AnalysisResults, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            output.push_str("Surveillance Analysis\n");
            output.push_str("=====================\n\n");
            let _ = writeln!(output, "  Captures:            {}", results.captures.len());
            let _ = writeln!(output, "  Device appearances:  {}", results.total_devices);
            let _ = writeln!(output, "  Suspicious devices:  {}", results.suspicious_devices);
            let _ = writeln!(output, "  High persistence:    {}", results.high_persistence_devices);
            let _ = writeln!(output, "  Multi-location:      {}", results.multi_location_devices);
            let _ = writeln!(output, "  Location sessions:   {}", results.location_sessions);
            let _ = writeln!(output, "  Report:              {}", results.report_file.display());
            if let Some(kml) = &results.kml_file {
                let _ = writeln!(output, "  KML:                 {}", kml.display());
            }

            if results.suspicious_device_list.is_empty() {
                output.push_str("\nNo suspicious surveillance patterns detected.\n");
            } else {
                output.push_str("\nTop suspicious devices:\n");
                for (i, d) in results.suspicious_device_list.iter().take(5).enumerate() {
                    let _ = writeln!(output, "  {}. {} (score {:.2})", i + 1, d.mac, d.persistence_score);
                    let _ = writeln!(
                        output,
                        "     Appearances: {}, Locations: {}",
                        d.total_appearances,
                        d.locations_seen.len()
                    );
                    for reason in d.reasons.iter().take(2) {
                        let _ = writeln!(output, "     - {reason}");
                    }
                }
            }
            if let Some(candidates) = &results.stalking {
                output.push('\n');
                output.push_str(&format_stalking_text(candidates));
            }
            output
        }
        OutputFormat::Json => format_json(results),
    }
}

/// Formats stalking candidates alone.
#[must_use]
pub fn format_stalking(candidates: &[StalkingCandidate], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_stalking_text(candidates),
        OutputFormat::Json => format_json(&candidates),
    }
}

fn format_stalking_text(candidates: &[StalkingCandidate]) -> String {
    if candidates.is_empty() {
        return "No stalking candidates.\n".to_string();
    }
    let mut output = String::new();
    let _ = writeln!(output, "Stalking candidates ({}):", candidates.len());
    for c in candidates {
        let _ = writeln!(
            output,
            "  {} stalking {:.2}, persistence {:.2}",
            c.device.mac, c.stalking_score, c.device.persistence_score
        );
        for reason in &c.reasons {
            let _ = writeln!(output, "     - {reason}");
        }
    }
    output
}

/// Formats the effective configuration. Text mode is JSON too.
#[must_use]
pub fn format_config(config: &Config, source: &Path, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = format!("# {}\n", source.display());
            output.push_str(&format_json(config));
            output.push('\n');
            output
        }
        OutputFormat::Json => format_json(config),
    }
}

/// Formats an error for display.
#[must_use]
pub fn format_error(error: &Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => error.to_string(),
        OutputFormat::Json => format_json(&serde_json::json!({
            "success": false,
            "error": error.to_string(),
        })),
    }
}

/// Formats a value as JSON.
fn format_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Truncates a string to `max_len` characters with ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let mut out: String = s.chars().take(max_len - 3).collect();
        out.push_str("...");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommandError;
    use chrono::NaiveDate;
    use std::collections::HashSet;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::parse("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("text"), OutputFormat::Text);
        assert_eq!(OutputFormat::parse("unknown"), OutputFormat::Text);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Hello", 10), "Hello");
        assert_eq!(truncate("Hello World", 8), "Hello...");
        assert_eq!(truncate("Hi", 2), "Hi");
        assert_eq!(truncate("Café Wi-Fi", 6), "Caf...");
    }

    #[test]
    fn test_format_ignore_lists_sorted() {
        let lists = IgnoreLists {
            macs: HashSet::from(["BB:00:00:00:00:00".to_string(), "AA:00:00:00:00:00".to_string()]),
            ssids: HashSet::from(["Home".to_string()]),
        };
        let text = format_ignore_lists(&lists, OutputFormat::Text);
        let a = text.find("AA:00").unwrap_or(usize::MAX);
        let b = text.find("BB:00").unwrap_or(0);
        assert!(a < b);
        assert!(text.contains("Ignored SSIDs (1):"));

        let json = format_ignore_lists(&lists, OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&json).expect("json");
        assert_eq!(value["macs"][0], "AA:00:00:00:00:00");
    }

    #[test]
    fn test_format_probe_summaries() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 7)
            .and_then(|d| d.and_hms_opt(14, 0, 0))
            .expect("time");
        let summaries = vec![ProbeSummary {
            ssid: "Home".to_string(),
            count: 3,
            first_seen: at,
            last_seen: at,
            span_seconds: 0,
            probes_per_second: None,
        }];
        let text = format_probe_summaries(2, &summaries, OutputFormat::Text);
        assert!(text.contains("Found 1 unique SSIDs in 2 logs"));
        assert!(text.contains("2024-03-07 14:00:00"));

        assert!(format_probe_summaries(0, &[], OutputFormat::Text).contains("No probe requests"));
    }

    #[test]
    fn test_format_error() {
        let error: Error = CommandError::InvalidArgument("bad".to_string()).into();
        assert_eq!(format_error(&error, OutputFormat::Text), "command error: invalid argument: bad");
        let json = format_error(&error, OutputFormat::Json);
        assert!(json.contains("\"success\": false"));
    }
}
