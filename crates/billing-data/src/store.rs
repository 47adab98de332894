//! Read-only snapshot store backed by a directory of JSON files.
//!
//! Layout under the data directory:
//!
//! * `missions.json`, `types.json`, `payments.json`: JSON arrays.
//! * `parameters.json`: a JSON object of named values.
//! * `entries/**/*.jsonl`: one time entry per line.
//!
//! Missing optional files read as empty. Any unreadable file or malformed
//! record is an error: a report is built from a complete snapshot or not
//! at all.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use billing_core::calendar::{month_start, DateRange};
use billing_core::error::{BillingError, Result};
use billing_core::models::{
    Catalog, Mission, Payment, TimeEntry, TypeTag, DEFAULT_GLOBAL_RATE, GLOBAL_RATE_KEY,
};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

// ── SnapshotSource ────────────────────────────────────────────────────────────

/// The inbound read interface the engine consumes.
pub trait SnapshotSource {
    /// Entries dated inside `range`, optionally restricted to one mission,
    /// sorted by date.
    fn time_entries(&self, range: &DateRange, mission_id: Option<&str>) -> Result<Vec<TimeEntry>>;

    fn missions(&self) -> Result<Vec<Mission>>;

    fn type_tags(&self) -> Result<Vec<TypeTag>>;

    /// Payments whose month overlaps `range` (all payments when `None`),
    /// sorted by month.
    fn payments(&self, range: Option<&DateRange>) -> Result<Vec<Payment>>;

    /// Raw value of a named parameter.
    fn parameter(&self, key: &str) -> Result<Option<String>>;

    /// The global fallback daily rate.
    ///
    /// Absent → [`DEFAULT_GLOBAL_RATE`]. A value that is not a non-negative
    /// number is logged and replaced by the default.
    fn global_rate(&self) -> Result<f64> {
        let Some(raw) = self.parameter(GLOBAL_RATE_KEY)? else {
            return Ok(DEFAULT_GLOBAL_RATE);
        };
        match raw.trim().parse::<f64>() {
            Ok(rate) if rate.is_finite() && rate >= 0.0 => Ok(rate),
            _ => {
                warn!(
                    value = %raw,
                    "parameter {} is not a valid rate, using {}",
                    GLOBAL_RATE_KEY,
                    DEFAULT_GLOBAL_RATE
                );
                Ok(DEFAULT_GLOBAL_RATE)
            }
        }
    }

    /// Missions and type tags indexed by id.
    fn catalog(&self) -> Result<Catalog> {
        Ok(Catalog::new(self.missions()?, self.type_tags()?))
    }
}

// ── JsonStore ─────────────────────────────────────────────────────────────────

/// [`SnapshotSource`] reading a data directory on every call.
#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    pub const MISSIONS_FILE: &'static str = "missions.json";
    pub const TYPES_FILE: &'static str = "types.json";
    pub const PAYMENTS_FILE: &'static str = "payments.json";
    pub const PARAMETERS_FILE: &'static str = "parameters.json";
    pub const ENTRIES_DIR: &'static str = "entries";

    /// Open a store rooted at `root`, which must be an existing directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(BillingError::DataPathNotFound(root));
        }
        Ok(Self { root })
    }

    /// All `.jsonl` files under `entries/`, recursively, sorted by path.
    pub fn find_entry_files(&self) -> Result<Vec<PathBuf>> {
        let dir = self.root.join(Self::ENTRIES_DIR);
        if !dir.exists() {
            debug!("no entries directory at {}", dir.display());
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(&dir).follow_links(true) {
            let entry = entry.map_err(std::io::Error::from)?;
            let is_jsonl = entry
                .path()
                .extension()
                .map(|ext| ext == "jsonl")
                .unwrap_or(false);
            if entry.file_type().is_file() && is_jsonl {
                files.push(entry.into_path());
            }
        }

        files.sort();
        Ok(files)
    }

    /// Parse every entry file, in path order.
    fn load_all_entries(&self) -> Result<Vec<TimeEntry>> {
        let files = self.find_entry_files()?;
        let mut entries = Vec::new();
        for path in &files {
            read_jsonl_file(path, &mut entries)?;
        }
        debug!(
            "loaded {} time entries from {} files",
            entries.len(),
            files.len()
        );
        Ok(entries)
    }

    /// Read a JSON array file, or an empty vector when it does not exist.
    fn read_array<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let path = self.root.join(name);
        match read_optional(&path)? {
            Some(content) => Ok(serde_json::from_str(&content)?),
            None => Ok(Vec::new()),
        }
    }

    fn read_parameters(&self) -> Result<HashMap<String, serde_json::Value>> {
        let path = self.root.join(Self::PARAMETERS_FILE);
        match read_optional(&path)? {
            Some(content) => Ok(serde_json::from_str(&content)?),
            None => Ok(HashMap::new()),
        }
    }
}

impl SnapshotSource for JsonStore {
    fn time_entries(&self, range: &DateRange, mission_id: Option<&str>) -> Result<Vec<TimeEntry>> {
        let mut entries: Vec<TimeEntry> = self
            .load_all_entries()?
            .into_iter()
            .filter(|e| range.contains(e.date))
            .filter(|e| mission_id.map_or(true, |id| e.mission_id == id))
            .collect();
        entries.sort_by_key(|e| e.date);
        Ok(entries)
    }

    fn missions(&self) -> Result<Vec<Mission>> {
        self.read_array(Self::MISSIONS_FILE)
    }

    fn type_tags(&self) -> Result<Vec<TypeTag>> {
        self.read_array(Self::TYPES_FILE)
    }

    fn payments(&self, range: Option<&DateRange>) -> Result<Vec<Payment>> {
        let mut payments: Vec<Payment> = self.read_array(Self::PAYMENTS_FILE)?;
        if let Some(range) = range {
            let first_month = month_start(range.start);
            payments.retain(|p| p.month >= first_month && p.month <= range.end);
        }
        payments.sort_by_key(|p| p.month);
        Ok(payments)
    }

    fn parameter(&self, key: &str) -> Result<Option<String>> {
        let params = self.read_parameters()?;
        match params.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
            Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(BillingError::InvalidParameter {
                key: key.to_string(),
                value: other.to_string(),
            }),
        }
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Read a file to a string, mapping "not found" to `None`.
fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(BillingError::FileRead {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Append every entry of one JSONL file to `out`. Blank lines are skipped.
fn read_jsonl_file(path: &Path, out: &mut Vec<TimeEntry>) -> Result<()> {
    let file = std::fs::File::open(path).map_err(|source| BillingError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let reader = std::io::BufReader::new(file);
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| BillingError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let entry = serde_json::from_str(trimmed).map_err(|source| BillingError::JsonLine {
            path: path.to_path_buf(),
            line: index + 1,
            source,
        })?;
        out.push(entry);
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;
    use tempfile::TempDir;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn write_file(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn write_jsonl(dir: &Path, name: &str, lines: &[&str]) {
        let path = dir.join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut file = std::fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
    }

    fn entry_line(id: &str, mission: &str, date: &str, minutes: u32) -> String {
        serde_json::json!({
            "id": id,
            "missionId": mission,
            "typeId": "dev",
            "date": date,
            "durationMinutes": minutes,
        })
        .to_string()
    }

    fn seeded_store() -> (TempDir, JsonStore) {
        let tmp = TempDir::new().unwrap();
        write_file(
            tmp.path(),
            "missions.json",
            r#"[{"id":"m1","title":"Audit","dailyRate":300},{"id":"m2","title":"Support"}]"#,
        );
        write_file(tmp.path(), "types.json", r#"[{"id":"dev","name":"Development"}]"#);
        write_file(
            tmp.path(),
            "payments.json",
            r#"[{"id":"p2","month":"2025-04","amount":900},{"id":"p1","month":"2025-03","amount":2000}]"#,
        );
        let a = entry_line("e1", "m1", "2025-03-14", 120);
        let b = entry_line("e2", "m2", "2025-03-02", 60);
        let c = entry_line("e3", "m1", "2025-04-01", 450);
        write_jsonl(tmp.path(), "entries/2025/03.jsonl", &[&a, "", &b]);
        write_jsonl(tmp.path(), "entries/2025/04.jsonl", &[&c]);
        let store = JsonStore::open(tmp.path()).unwrap();
        (tmp, store)
    }

    #[test]
    fn test_open_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        assert!(matches!(
            JsonStore::open(&missing),
            Err(BillingError::DataPathNotFound(p)) if p == missing
        ));
    }

    #[test]
    fn test_find_entry_files_sorted_and_filtered() {
        let (tmp, store) = seeded_store();
        write_file(tmp.path(), "entries/notes.txt", "ignored");
        let files = store.find_entry_files().unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("2025/03.jsonl"));
        assert!(files[1].ends_with("2025/04.jsonl"));
    }

    #[test]
    fn test_time_entries_filtered_by_range_and_sorted() {
        let (_tmp, store) = seeded_store();
        let march = DateRange::month(d(2025, 3, 1));
        let entries = store.time_entries(&march, None).unwrap();
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e2", "e1"]);
    }

    #[test]
    fn test_time_entries_filtered_by_mission() {
        let (_tmp, store) = seeded_store();
        let range = DateRange::new(d(2025, 1, 1), d(2025, 12, 31)).unwrap();
        let entries = store.time_entries(&range, Some("m1")).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.mission_id == "m1"));
    }

    #[test]
    fn test_malformed_entry_line_fails_fast() {
        let (tmp, store) = seeded_store();
        let good = entry_line("e9", "m1", "2025-03-20", 30);
        write_jsonl(tmp.path(), "entries/2025/05.jsonl", &[&good, "{broken"]);
        let range = DateRange::month(d(2025, 3, 1));
        match store.time_entries(&range, None) {
            Err(BillingError::JsonLine { line, path, .. }) => {
                assert_eq!(line, 2);
                assert!(path.ends_with("05.jsonl"));
            }
            other => panic!("expected JsonLine error, got {other:?}"),
        }
    }

    #[test]
    fn test_no_entries_directory_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = JsonStore::open(tmp.path()).unwrap();
        let range = DateRange::month(d(2025, 3, 1));
        assert!(store.time_entries(&range, None).unwrap().is_empty());
        assert!(store.missions().unwrap().is_empty());
        assert!(store.payments(None).unwrap().is_empty());
    }

    #[test]
    fn test_payments_sorted_and_filtered() {
        let (_tmp, store) = seeded_store();
        let all = store.payments(None).unwrap();
        assert_eq!(all[0].month, d(2025, 3, 1));
        assert_eq!(all[1].month, d(2025, 4, 1));

        // A range starting mid-March still includes the March payment.
        let range = DateRange::new(d(2025, 3, 15), d(2025, 3, 31)).unwrap();
        let march = store.payments(Some(&range)).unwrap();
        assert_eq!(march.len(), 1);
        assert_eq!(march[0].id, "p1");
    }

    #[test]
    fn test_catalog_from_store() {
        let (_tmp, store) = seeded_store();
        let catalog = store.catalog().unwrap();
        assert_eq!(catalog.mission_count(), 2);
        assert_eq!(catalog.mission("m1").unwrap().daily_rate, Some(300.0));
        assert_eq!(catalog.type_name("dev"), "Development");
    }

    #[test]
    fn test_global_rate_default_when_absent() {
        let (_tmp, store) = seeded_store();
        assert_eq!(store.global_rate().unwrap(), DEFAULT_GLOBAL_RATE);
    }

    #[test]
    fn test_global_rate_numeric_and_string_values() {
        let (tmp, store) = seeded_store();
        write_file(tmp.path(), "parameters.json", r#"{"dailyRate": 450}"#);
        assert_eq!(store.global_rate().unwrap(), 450.0);

        write_file(tmp.path(), "parameters.json", r#"{"dailyRate": " 380.5 "}"#);
        assert_eq!(store.global_rate().unwrap(), 380.5);
    }

    #[test]
    fn test_global_rate_unparsable_falls_back() {
        let (tmp, store) = seeded_store();
        write_file(tmp.path(), "parameters.json", r#"{"dailyRate": "lots"}"#);
        assert_eq!(store.global_rate().unwrap(), DEFAULT_GLOBAL_RATE);
    }

    #[test]
    fn test_parameter_of_wrong_shape_is_error() {
        let (tmp, store) = seeded_store();
        write_file(tmp.path(), "parameters.json", r#"{"dailyRate": [1, 2]}"#);
        assert!(matches!(
            store.parameter("dailyRate"),
            Err(BillingError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_corrupt_missions_file_is_error() {
        let (tmp, store) = seeded_store();
        write_file(tmp.path(), "missions.json", "{not an array");
        assert!(matches!(store.missions(), Err(BillingError::JsonParse(_))));
    }
}
