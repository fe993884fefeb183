//! KML export of locations, device tracks and intensity areas.

use super::{GpsTracker, LocationSession};
use crate::detect::{PersistenceLevel, SuspiciousDevice};
use crate::error::{IoError, Result};
use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::Path;

/// Segments per intensity circle.
const CIRCLE_SEGMENTS: u32 = 36;

/// Meters per degree, used to size circles.
const METERS_PER_DEGREE: f64 = 111_000.0;

const STYLES: &str = r#"    <Style id="locationStyle"><IconStyle><color>ff00ff00</color><scale>1.2</scale><Icon><href>https://maps.google.com/mapfiles/kml/shapes/placemark_circle.png</href></Icon></IconStyle></Style>
    <Style id="criticalLocationStyle"><IconStyle><color>ff0000ff</color><scale>1.8</scale><Icon><href>https://maps.google.com/mapfiles/kml/shapes/forbidden.png</href></Icon></IconStyle></Style>
    <Style id="highLocationStyle"><IconStyle><color>ff0080ff</color><scale>1.5</scale><Icon><href>https://maps.google.com/mapfiles/kml/shapes/caution.png</href></Icon></IconStyle></Style>
    <Style id="mediumLocationStyle"><IconStyle><color>ff00ffff</color><scale>1.3</scale><Icon><href>https://maps.google.com/mapfiles/kml/shapes/triangle.png</href></Icon></IconStyle></Style>
    <Style id="criticalPathStyle"><LineStyle><color>ff0000ff</color><width>5</width></LineStyle></Style>
    <Style id="highPathStyle"><LineStyle><color>ff0080ff</color><width>4</width></LineStyle></Style>
    <Style id="mediumPathStyle"><LineStyle><color>ff00ffff</color><width>3</width></LineStyle></Style>
    <Style id="lowPathStyle"><LineStyle><color>7f00ffff</color><width>2</width></LineStyle></Style>
    <Style id="intensityStyle"><LineStyle><color>ff0000ff</color><width>2</width></LineStyle><PolyStyle><color>400000ff</color></PolyStyle></Style>
"#;

/// Map color bucket for a location's highest score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocationColor {
    Red,
    Orange,
    Yellow,
    Green,
}

impl LocationColor {
    fn from_score(score: f64) -> Self {
        if score > 0.8 {
            Self::Red
        } else if score > 0.6 {
            Self::Orange
        } else if score > 0.3 {
            Self::Yellow
        } else {
            Self::Green
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Red => "Red",
            Self::Orange => "Orange",
            Self::Yellow => "Yellow",
            Self::Green => "Green",
        }
    }

    const fn style(self) -> &'static str {
        match self {
            Self::Red => "#criticalLocationStyle",
            Self::Orange => "#highLocationStyle",
            Self::Yellow => "#mediumLocationStyle",
            Self::Green => "#locationStyle",
        }
    }
}

const fn path_style(level: PersistenceLevel) -> &'static str {
    match level {
        PersistenceLevel::Critical => "#criticalPathStyle",
        PersistenceLevel::High => "#highPathStyle",
        PersistenceLevel::Medium => "#mediumPathStyle",
        PersistenceLevel::Low => "#lowPathStyle",
    }
}

/// Escapes XML special characters.
#[must_use]
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders a KML document.
///
/// A tracker without sessions yields a placeholder document.
#[must_use]
pub fn render_kml(tracker: &GpsTracker, devices: &[SuspiciousDevice], now: DateTime<Local>) -> String {
    let generated = now.format("%Y-%m-%d %H:%M:%S").to_string();
    let mut body = String::new();

    if tracker.sessions().is_empty() {
        tracing::warn!("no gps data for kml export");
        let _ = writeln!(body, "    <Placemark>");
        let _ = writeln!(body, "      <name>No GPS Data Available</name>");
        let _ = writeln!(
            body,
            "      <description>No location readings were recorded for this analysis.</description>"
        );
        let _ = writeln!(body, "    </Placemark>");
        return document(&generated, 0, 0, &body);
    }

    write_locations(&mut body, tracker, devices);
    if !devices.is_empty() {
        write_tracks(&mut body, tracker, devices);
        write_intensity(&mut body, tracker, devices);
    }
    document(&generated, tracker.location_count(), devices.len(), &body)
}

fn document(generated: &str, locations: usize, devices: usize, body: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let _ = writeln!(out, r#"<kml xmlns="http://www.opengis.net/kml/2.2">"#);
    let _ = writeln!(out, "<Document>");
    let _ = writeln!(out, "  <name>Surveillance Detection Analysis</name>");
    let _ = writeln!(
        out,
        "  <description>Generated {generated}. {locations} locations, {devices} persistent devices.</description>"
    );
    out.push_str(STYLES);
    out.push_str(body);
    let _ = writeln!(out, "</Document>");
    let _ = writeln!(out, "</kml>");
    out
}

fn write_locations(out: &mut String, tracker: &GpsTracker, devices: &[SuspiciousDevice]) {
    let _ = writeln!(out, "  <Folder>");
    let _ = writeln!(out, "    <name>Monitoring Locations</name>");

    for session in tracker.history() {
        let here: Vec<&SuspiciousDevice> = devices
            .iter()
            .filter(|d| d.locations_seen.contains(&session.location_id))
            .collect();
        let score = here.iter().map(|d| d.persistence_score).fold(0.0, f64::max);
        let color = LocationColor::from_score(score);
        let id = escape_xml(&session.location_id);

        let _ = writeln!(out, "    <Placemark>");
        let _ = writeln!(out, "      <name>[{}] {id}</name>", color.name());
        let _ = writeln!(
            out,
            "      <description>Persistence score {score:.3}. {} devices seen, {} persistent. {:.1} minutes.</description>",
            session.devices.len(),
            here.len(),
            session.duration_minutes()
        );
        let _ = writeln!(out, "      <styleUrl>{}</styleUrl>", color.style());
        if let (Some(begin), Some(end)) = (iso_time(session.start_time), iso_time(session.end_time)) {
            let _ = writeln!(out, "      <TimeSpan><begin>{begin}</begin><end>{end}</end></TimeSpan>");
        }
        let _ = writeln!(
            out,
            "      <Point><coordinates>{},{},0</coordinates></Point>",
            session.lon, session.lat
        );
        let _ = writeln!(out, "    </Placemark>");
    }
    let _ = writeln!(out, "  </Folder>");
}

fn write_tracks(out: &mut String, tracker: &GpsTracker, devices: &[SuspiciousDevice]) {
    let mut by_level: BTreeMap<PersistenceLevel, Vec<&SuspiciousDevice>> = BTreeMap::new();
    for device in devices.iter().filter(|d| d.locations_seen.len() > 1) {
        by_level.entry(device.level()).or_default().push(device);
    }

    for (level, group) in by_level {
        let _ = writeln!(out, "  <Folder>");
        let _ = writeln!(out, "    <name>{} Persistence Devices</name>", level.label());
        for device in group {
            let stops = track_stops(tracker, device);
            if stops.len() < 2 {
                continue;
            }
            let coords: Vec<String> = stops
                .iter()
                .map(|s| format!("{},{},0", s.lon, s.lat))
                .collect();
            let route: Vec<String> = stops.iter().map(|s| escape_xml(&s.location_id)).collect();
            let mac = escape_xml(&device.mac);

            let _ = writeln!(out, "    <Placemark>");
            let _ = writeln!(out, "      <name>[{}] Tracking Path: {mac}</name>", level.label());
            let _ = writeln!(
                out,
                "      <description>Score {:.3} over {:.1} hours, {} appearances. Route: {}</description>",
                device.persistence_score,
                device.span_hours(),
                device.total_appearances,
                route.join(" -&gt; ")
            );
            let _ = writeln!(out, "      <styleUrl>{}</styleUrl>", path_style(level));
            let _ = writeln!(
                out,
                "      <LineString><tessellate>1</tessellate><coordinates>{}</coordinates></LineString>",
                coords.join(" ")
            );
            let _ = writeln!(out, "    </Placemark>");
        }
        let _ = writeln!(out, "  </Folder>");
    }
}

/// First session of each location the device visited, by start time.
fn track_stops<'a>(tracker: &'a GpsTracker, device: &SuspiciousDevice) -> Vec<&'a LocationSession> {
    let mut stops: Vec<&LocationSession> = Vec::new();
    for session in tracker.history() {
        if device.locations_seen.contains(&session.location_id)
            && !stops.iter().any(|s| s.location_id == session.location_id)
        {
            stops.push(session);
        }
    }
    stops
}

fn write_intensity(out: &mut String, tracker: &GpsTracker, devices: &[SuspiciousDevice]) {
    let mut scores: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for device in devices {
        for location in &device.locations_seen {
            scores
                .entry(location.as_str())
                .or_default()
                .push(device.persistence_score);
        }
    }

    let _ = writeln!(out, "  <Folder>");
    let _ = writeln!(out, "    <name>Surveillance Intensity</name>");
    for (location, scores) in scores {
        let Some(session) = tracker.session(location) else {
            continue;
        };
        let max = scores.iter().copied().fold(0.0, f64::max);
        #[allow(clippy::cast_precision_loss)]
        let radius = (scores.len() as f64 * 50.0).clamp(100.0, 500.0);

        let _ = writeln!(out, "    <Placemark>");
        let _ = writeln!(out, "      <name>Surveillance Intensity: {}</name>", escape_xml(location));
        let _ = writeln!(
            out,
            "      <description>{} persistent devices, maximum score {max:.3}.</description>",
            scores.len()
        );
        let _ = writeln!(out, "      <styleUrl>#intensityStyle</styleUrl>");
        let _ = writeln!(
            out,
            "      <Polygon><outerBoundaryIs><LinearRing><coordinates>{}</coordinates></LinearRing></outerBoundaryIs></Polygon>",
            circle(session.lon, session.lat, radius)
        );
        let _ = writeln!(out, "    </Placemark>");
    }
    let _ = writeln!(out, "  </Folder>");
}

/// Closed ring of `CIRCLE_SEGMENTS + 1` points.
fn circle(lon: f64, lat: f64, radius_m: f64) -> String {
    let radius_deg = radius_m / METERS_PER_DEGREE;
    (0..=CIRCLE_SEGMENTS)
        .map(|i| {
            let angle = f64::from(i * (360 / CIRCLE_SEGMENTS)).to_radians();
            format!(
                "{},{},0",
                lon + radius_deg * angle.cos(),
                lat + radius_deg * angle.sin()
            )
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn iso_time(ts: i64) -> Option<String> {
    DateTime::from_timestamp(ts, 0).map(|t| t.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

/// Writes a KML document, creating parent directories.
pub fn write_kml(path: &Path, kml: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| IoError::DirectoryFailed {
            path: parent.display().to_string(),
            reason: e.to_string(),
        })?;
    }
    std::fs::write(path, kml).map_err(|e| IoError::WriteFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    tracing::info!(path = %path.display(), "kml written");
    Ok(())
}
