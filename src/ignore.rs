//! MAC and SSID ignore lists.
//!
//! Lists are stored as JSON arrays. Older stations wrote them as an
//! assignment such as `ignore_list = ['AA:BB:..', ...]`; that form is still
//! read so existing files keep working.

use crate::error::{IoError, Result};
use crate::kismet::KismetDb;
use crate::validate::{is_valid_mac, is_valid_ssid, normalize_mac};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::LazyLock;

static TRAILING_COMMA_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r",\s*\]").ok());

/// Devices and networks that never raise alerts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreLists {
    /// Uppercased MAC addresses.
    pub macs: HashSet<String>,
    /// SSIDs, compared exactly.
    pub ssids: HashSet<String>,
}

/// Entry counts, for status output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IgnoreCounts {
    /// Number of ignored MACs.
    pub macs: usize,
    /// Number of ignored SSIDs.
    pub ssids: usize,
}

impl IgnoreLists {
    /// Loads both lists; missing files yield empty lists.
    pub fn load(mac_path: &Path, ssid_path: &Path) -> Result<Self> {
        Ok(Self {
            macs: load_mac_list(mac_path)?,
            ssids: load_ssid_list(ssid_path)?,
        })
    }

    /// True when `mac` is ignored (case-insensitive).
    #[must_use]
    pub fn ignores_mac(&self, mac: &str) -> bool {
        self.macs.contains(&normalize_mac(mac))
    }

    /// True when `ssid` is ignored.
    #[must_use]
    pub fn ignores_ssid(&self, ssid: &str) -> bool {
        self.ssids.contains(ssid)
    }

    /// Entry counts.
    #[must_use]
    pub fn counts(&self) -> IgnoreCounts {
        IgnoreCounts {
            macs: self.macs.len(),
            ssids: self.ssids.len(),
        }
    }
}

/// Loads a MAC ignore list. Invalid addresses are skipped.
pub fn load_mac_list(path: &Path) -> Result<HashSet<String>> {
    let entries = load_entries(path, "MAC")?;
    Ok(entries
        .into_iter()
        .filter(|mac| {
            let ok = is_valid_mac(mac);
            if !ok {
                tracing::warn!(mac = %mac, "skipping invalid MAC in ignore list");
            }
            ok
        })
        .map(|mac| normalize_mac(&mac))
        .collect())
}

/// Loads an SSID ignore list. Invalid names are skipped.
pub fn load_ssid_list(path: &Path) -> Result<HashSet<String>> {
    let entries = load_entries(path, "SSID")?;
    Ok(entries
        .into_iter()
        .filter(|ssid| {
            let ok = is_valid_ssid(ssid);
            if !ok {
                tracing::warn!(ssid = %ssid, "skipping invalid SSID in ignore list");
            }
            ok
        })
        .collect())
}

/// Writes a MAC list as a sorted JSON array.
pub fn save_mac_list(path: &Path, macs: &HashSet<String>) -> Result<usize> {
    let valid: BTreeSet<String> = macs
        .iter()
        .filter(|m| is_valid_mac(m))
        .map(|m| normalize_mac(m))
        .collect();
    save_entries(path, &valid)
}

/// Writes an SSID list as a sorted JSON array.
pub fn save_ssid_list(path: &Path, ssids: &HashSet<String>) -> Result<usize> {
    let valid: BTreeSet<String> = ssids.iter().filter(|s| is_valid_ssid(s)).cloned().collect();
    save_entries(path, &valid)
}

/// Builds fresh lists from every device and probed SSID in a capture.
pub fn build_from_capture(db: &KismetDb) -> Result<IgnoreLists> {
    let devices = db.all_devices()?;
    let mut lists = IgnoreLists::default();
    for device in devices {
        if is_valid_mac(&device.mac) {
            lists.macs.insert(normalize_mac(&device.mac));
        }
        if let Some(ssid) = device.probed_ssid
            && is_valid_ssid(&ssid)
        {
            lists.ssids.insert(ssid);
        }
    }
    tracing::info!(
        macs = lists.macs.len(),
        ssids = lists.ssids.len(),
        "built ignore lists from capture"
    );
    Ok(lists)
}

/// Parses list content in either JSON or legacy assignment form.
///
/// Returns `None` when neither form can be read.
#[must_use]
pub fn parse_list(content: &str) -> Option<Vec<String>> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Some(Vec::new());
    }
    if let Ok(values) = serde_json::from_str::<Vec<Value>>(trimmed) {
        return Some(string_entries(values));
    }
    parse_legacy(content)
}

/// Keeps the string elements; anything else is skipped with a warning.
fn string_entries(values: Vec<Value>) -> Vec<String> {
    values
        .into_iter()
        .filter_map(|value| match value {
            Value::String(entry) => Some(entry),
            other => {
                tracing::warn!(entry = %other, "skipping non-string ignore list entry");
                None
            }
        })
        .collect()
}

fn parse_legacy(content: &str) -> Option<Vec<String>> {
    let stripped: String = content
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default())
        .collect::<Vec<_>>()
        .join("\n");

    let start = stripped.find('[')?;
    let end = stripped.rfind(']')?;
    if end <= start {
        return None;
    }
    let mut body = stripped[start..=end].replace('\'', "\"");
    if let Some(re) = TRAILING_COMMA_RE.as_ref() {
        body = re.replace_all(&body, "]").into_owned();
    }
    serde_json::from_str::<Vec<Value>>(&body).ok().map(string_entries)
}

fn load_entries(path: &Path, kind: &str) -> Result<Vec<String>> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), kind, "ignore list not found, using empty list");
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path).map_err(|e| IoError::ReadFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    parse_list(&content).map_or_else(
        || {
            tracing::error!(path = %path.display(), kind, "could not parse ignore list");
            Ok(Vec::new())
        },
        |entries| {
            tracing::info!(path = %path.display(), kind, count = entries.len(), "loaded ignore list");
            Ok(entries)
        },
    )
}

fn save_entries(path: &Path, entries: &BTreeSet<String>) -> Result<usize> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| IoError::DirectoryFailed {
            path: parent.display().to_string(),
            reason: e.to_string(),
        })?;
    }
    let json = serde_json::to_string_pretty(entries)?;
    std::fs::write(path, json).map_err(|e| IoError::WriteFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    tracing::info!(path = %path.display(), count = entries.len(), "saved ignore list");
    Ok(entries.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kismet::fixture::capture_with;
    use tempfile::TempDir;

    #[test]
    fn test_parse_json_list() {
        let parsed = parse_list(r#"["AA:BB:CC:DD:EE:FF", "11:22:33:44:55:66"]"#).expect("json");
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_parse_legacy_assignment() {
        let content = "# generated\nignore_list = ['aa:bb:cc:dd:ee:ff', # phone\n  '11:22:33:44:55:66',\n]\n";
        let parsed = parse_list(content).expect("legacy");
        assert_eq!(parsed, vec!["aa:bb:cc:dd:ee:ff", "11:22:33:44:55:66"]);

        let ssids = parse_list("non_alert_ssid_list = ['Home', 'Work']").expect("ssid legacy");
        assert_eq!(ssids, vec!["Home", "Work"]);
    }

    #[test]
    fn test_parse_skips_non_string_entries() {
        let parsed = parse_list(r#"["AA:BB:CC:DD:EE:FF", 5, null]"#).expect("json");
        assert_eq!(parsed, vec!["AA:BB:CC:DD:EE:FF".to_string()]);

        let legacy = parse_list("ignore_list = ['AA:BB:CC:DD:EE:FF', 7]").expect("legacy");
        assert_eq!(legacy, vec!["AA:BB:CC:DD:EE:FF".to_string()]);
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_list("this is not a list").is_none());
        assert_eq!(parse_list("   "), Some(Vec::new()));
    }

    #[test]
    fn test_load_missing_and_invalid() {
        let temp = TempDir::new().expect("temp dir");
        assert!(load_mac_list(&temp.path().join("none.json")).expect("missing").is_empty());

        let bad = temp.path().join("bad.json");
        std::fs::write(&bad, "{{{{").expect("write");
        assert!(load_ssid_list(&bad).expect("unparseable").is_empty());
    }

    #[test]
    fn test_load_filters_and_normalizes() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("macs.json");
        std::fs::write(&path, r#"["aa:bb:cc:dd:ee:ff", "not-a-mac"]"#).expect("write");
        let macs = load_mac_list(&path).expect("load");
        assert_eq!(macs.len(), 1);
        assert!(macs.contains("AA:BB:CC:DD:EE:FF"));

        let lists = IgnoreLists {
            macs,
            ssids: HashSet::new(),
        };
        assert!(lists.ignores_mac("aa:bb:cc:dd:ee:ff"));
    }

    #[test]
    fn test_save_then_load() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("nested/ssids.json");
        let ssids: HashSet<String> = ["Home", "bad<ssid>", "Cafe"].iter().map(|s| (*s).to_string()).collect();
        assert_eq!(save_ssid_list(&path, &ssids).expect("save"), 2);

        let text = std::fs::read_to_string(&path).expect("read");
        assert!(text.find("Cafe") < text.find("Home"));
        let loaded = load_ssid_list(&path).expect("load");
        assert!(loaded.contains("Home") && loaded.contains("Cafe"));
    }

    #[test]
    fn test_build_from_capture() {
        let db = capture_with(&[
            ("aa:aa:aa:aa:aa:01", 100, Some("Home"), 0.0, 0.0),
            ("AA:AA:AA:AA:AA:02", 200, Some("Home"), 0.0, 0.0),
            ("AA:AA:AA:AA:AA:03", 300, None, 0.0, 0.0),
        ]);
        let lists = build_from_capture(&db).expect("build");
        assert_eq!(lists.counts(), IgnoreCounts { macs: 3, ssids: 1 });
        assert!(lists.macs.contains("AA:AA:AA:AA:AA:01"));
    }
}
