//! Locating capture files on disk.

use crate::error::{KismetError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Lists files matching `pattern`, sorted by path.
///
/// The directory part is taken literally; the file name may contain `*`
/// (any run of characters) and `?` (one character).
///
/// # Errors
///
/// Returns [`KismetError::NoCaptures`] when nothing matches.
pub fn resolve(pattern: &str) -> Result<Vec<PathBuf>> {
    let path = Path::new(pattern);
    let file_pattern = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if !file_pattern.contains(['*', '?']) {
        return if path.is_file() {
            Ok(vec![path.to_path_buf()])
        } else {
            Err(no_captures(pattern))
        };
    }

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let matcher = wildcard_regex(&file_pattern)?;

    let entries = std::fs::read_dir(dir).map_err(|_| no_captures(pattern))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
        .filter(|e| matcher.is_match(&e.file_name().to_string_lossy()))
        .map(|e| e.path())
        .collect();

    if files.is_empty() {
        return Err(no_captures(pattern));
    }
    files.sort();
    tracing::debug!(pattern, count = files.len(), "resolved capture files");
    Ok(files)
}

/// Returns the most recently modified file.
///
/// # Errors
///
/// Returns [`KismetError::NoCaptures`] for an empty list.
pub fn newest(files: &[PathBuf]) -> Result<PathBuf> {
    files
        .iter()
        .max_by_key(|p| modified(p))
        .cloned()
        .ok_or_else(|| no_captures("<empty list>"))
}

/// Files modified within `hours` of `now`, newest first.
#[must_use]
pub fn modified_within(files: &[PathBuf], hours: u64, now: SystemTime) -> Vec<PathBuf> {
    let cutoff = now
        .checked_sub(Duration::from_secs(hours.saturating_mul(3600)))
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut recent: Vec<(SystemTime, PathBuf)> = files
        .iter()
        .map(|p| (modified(p), p.clone()))
        .filter(|(t, _)| *t >= cutoff)
        .collect();
    recent.sort_by(|a, b| b.0.cmp(&a.0));
    recent.into_iter().map(|(_, p)| p).collect()
}

fn modified(path: &Path) -> SystemTime {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

fn wildcard_regex(pattern: &str) -> Result<Regex> {
    let escaped = regex::escape(pattern).replace(r"\*", ".*").replace(r"\?", ".");
    Ok(Regex::new(&format!("^{escaped}$")).map_err(KismetError::from)?)
}

fn no_captures(pattern: &str) -> crate::error::Error {
    KismetError::NoCaptures {
        pattern: pattern.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str, mtime: SystemTime) -> PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).expect("create");
        file.set_modified(mtime).expect("set mtime");
        path
    }

    #[test]
    fn test_resolve_wildcard() {
        let temp = TempDir::new().expect("temp dir");
        let now = SystemTime::now();
        touch(temp.path(), "Kismet-1.kismet", now);
        touch(temp.path(), "Kismet-2.kismet", now);
        touch(temp.path(), "notes.txt", now);

        let pattern = format!("{}/*.kismet", temp.path().display());
        let files = resolve(&pattern).expect("resolve");
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("Kismet-1.kismet"));
    }

    #[test]
    fn test_resolve_literal_and_missing() {
        let temp = TempDir::new().expect("temp dir");
        let path = touch(temp.path(), "capture.kismet", SystemTime::now());
        assert_eq!(resolve(&path.display().to_string()).expect("literal"), vec![path]);

        let missing = format!("{}/*.pcap", temp.path().display());
        assert!(matches!(
            resolve(&missing),
            Err(crate::error::Error::Kismet(KismetError::NoCaptures { .. }))
        ));
        assert!(resolve("/nonexistent/dir/*.kismet").is_err());
    }

    #[test]
    fn test_newest_and_modified_within() {
        let temp = TempDir::new().expect("temp dir");
        let now = SystemTime::now();
        let old = touch(temp.path(), "a.kismet", now - Duration::from_secs(48 * 3600));
        let mid = touch(temp.path(), "b.kismet", now - Duration::from_secs(2 * 3600));
        let new = touch(temp.path(), "c.kismet", now - Duration::from_secs(60));
        let files = vec![old, mid.clone(), new.clone()];

        assert_eq!(newest(&files).expect("newest"), new);
        assert_eq!(modified_within(&files, 24, now), vec![new, mid]);
        assert!(newest(&[]).is_err());
    }
}
