use crate::error::DetectorError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Audit artifact row.
#[derive(Debug, Serialize)]
pub struct AuditRecord<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
}

/// Read the persisted baseline.
///
/// `None` means no baseline exists yet (first run). A baseline that exists but
/// cannot be read or parsed degrades to an empty set with a warning, which
/// over-reports additions rather than staying silent.
pub fn load_baseline(path: &Path) -> Option<BTreeSet<String>> {
    if !path.exists() {
        return None;
    }

    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "baseline unreadable, treating as empty");
            return Some(BTreeSet::new());
        }
    };

    match serde_json::from_str::<Vec<String>>(&contents) {
        Ok(names) => Some(names.into_iter().collect()),
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "baseline corrupt, treating as empty");
            Some(BTreeSet::new())
        }
    }
}

/// Overwrite the baseline wholesale. Written to a sibling temp file and renamed
/// so an interrupted write never leaves a truncated baseline behind.
pub fn save_baseline(path: &Path, names: &BTreeSet<String>) -> Result<(), DetectorError> {
    let write_err = |message: String| DetectorError::BaselineWrite {
        path: path.display().to_string(),
        message,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
    }

    let data = serde_json::to_vec(&names).map_err(|e| DetectorError::Encode(e.to_string()))?;
    let tmp = temp_path(path);
    fs::write(&tmp, data).map_err(|e| write_err(e.to_string()))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        write_err(e.to_string())
    })?;

    tracing::debug!(path = %path.display(), count = names.len(), "baseline persisted");
    Ok(())
}

/// `<stem>-added-<yyyyMMdd-HHmmss>.json` beside the baseline file.
pub fn audit_path(baseline: &Path, now: DateTime<Utc>) -> PathBuf {
    let stem = baseline
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("baseline");
    let file_name = format!("{stem}-added-{}.json", now.format("%Y%m%d-%H%M%S"));
    baseline.with_file_name(file_name)
}

pub fn write_audit(path: &Path, records: &[AuditRecord<'_>]) -> std::io::Result<()> {
    let data = serde_json::to_vec_pretty(records).map_err(std::io::Error::other)?;
    fs::write(path, data)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn missing_baseline_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(load_baseline(&tmp.path().join("repos.json")).is_none());
    }

    #[test]
    fn corrupt_baseline_degrades_to_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("repos.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(load_baseline(&path), Some(BTreeSet::new()));
    }

    #[test]
    fn save_then_load_preserves_names() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state").join("repos.json");
        let names: BTreeSet<String> = ["beta", "alpha"].iter().map(|s| (*s).to_string()).collect();

        save_baseline(&path, &names).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), r#"["alpha","beta"]"#);
        assert_eq!(load_baseline(&path), Some(names));
        assert!(!tmp.path().join("state").join("repos.json.tmp").exists());
    }

    #[test]
    fn save_into_unwritable_location_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, "file, not a directory").unwrap();

        let err = save_baseline(&blocker.join("repos.json"), &BTreeSet::new()).unwrap_err();
        assert!(matches!(err, DetectorError::BaselineWrite { .. }));
    }

    #[test]
    fn audit_path_carries_run_timestamp() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 9, 5, 7).unwrap();
        let path = audit_path(Path::new("/var/lib/relay/repos-acme.json"), now);
        assert_eq!(
            path,
            PathBuf::from("/var/lib/relay/repos-acme-added-20261018-090507.json")
        );
    }

    #[test]
    fn audit_records_serialize_name_and_description() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("audit.json");
        write_audit(
            &path,
            &[AuditRecord {
                name: "gamma",
                description: Some("new service"),
            }],
        )
        .unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed[0]["name"], "gamma");
        assert_eq!(parsed[0]["description"], "new service");
    }
}
