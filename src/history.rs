// Download history: an append-only JSON-lines file with one object per
// download attempt. Writing is best-effort; a history that cannot be
// written never interrupts a download.

use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// How many entries the history screen shows.
pub const DEFAULT_VIEW_LIMIT: usize = 50;

/// Outcome recorded for a download attempt.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Success,
    Failed,
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryStatus::Success => f.write_str("success"),
            EntryStatus::Failed => f.write_str("failed"),
        }
    }
}

/// One line of the history file. Field names match the on-disk keys.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    /// Seconds since the UNIX epoch.
    pub ts: f64,
    pub url: String,
    pub status: EntryStatus,
    #[serde(default)]
    pub quality: String,
    /// Saved file, empty or missing when yt-dlp never reported one.
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub output_dir: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HistoryEntry {
    pub fn success(url: &str, quality: &str, output: Option<&Path>, output_dir: &Path) -> Self {
        HistoryEntry {
            ts: now_ts(),
            url: url.to_string(),
            status: EntryStatus::Success,
            quality: quality.to_string(),
            output: Some(output.map(|p| p.display().to_string()).unwrap_or_default()),
            output_dir: output_dir.display().to_string(),
            error: None,
        }
    }

    pub fn failure(url: &str, quality: &str, output_dir: &Path, error: &str) -> Self {
        HistoryEntry {
            ts: now_ts(),
            url: url.to_string(),
            status: EntryStatus::Failed,
            quality: quality.to_string(),
            output: Some(String::new()),
            output_dir: output_dir.display().to_string(),
            error: Some(error.to_string()),
        }
    }

    /// The saved file, if one is known.
    pub fn output_file(&self) -> Option<&str> {
        self.output.as_deref().filter(|s| !s.is_empty())
    }

    /// Local time of the attempt, `YYYY-MM-DD HH:MM:SS`.
    pub fn human_time(&self) -> String {
        let secs = self.ts.trunc() as i64;
        let nanos = (self.ts.fract().abs() * 1e9) as u32;
        match chrono::DateTime::from_timestamp(secs, nanos) {
            Some(utc) => utc
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            None => self.ts.to_string(),
        }
    }
}

fn now_ts() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// Handle to the history file. Holds only the path; every call opens the
/// file fresh so external truncation is picked up.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        HistoryStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry as a single JSON line. Errors are logged and dropped.
    pub fn append(&self, entry: &HistoryEntry) {
        if let Err(e) = self.try_append(entry) {
            tracing::debug!(path = %self.path.display(), error = %e, "history write failed");
        }
    }

    fn try_append(&self, entry: &HistoryEntry) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// The last `limit` parseable entries, oldest first. Blank and malformed
    /// lines (invalid UTF-8 included) are skipped one at a time; a missing
    /// file reads as empty.
    pub fn read(&self, limit: usize) -> Vec<HistoryEntry> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!(path = %self.path.display(), error = %e, "history read failed");
                }
                return Vec::new();
            }
        };

        let mut items: Vec<HistoryEntry> = bytes
            .split(|b| *b == b'\n')
            .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
            .filter_map(|line| serde_json::from_slice(line).ok())
            .collect();

        let skip = items.len().saturating_sub(limit);
        items.drain(..skip);
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(ts: f64, url: &str, status: EntryStatus) -> HistoryEntry {
        HistoryEntry {
            ts,
            url: url.to_string(),
            status,
            quality: "Best".into(),
            output: None,
            output_dir: String::new(),
            error: None,
        }
    }

    #[test]
    fn read_returns_last_entries_in_append_order() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.jsonl"));
        store.append(&entry(1000.0, "https://tiktok.com/a", EntryStatus::Success));
        store.append(&entry(2000.0, "https://tiktok.com/b", EntryStatus::Failed));

        let last = store.read(1);
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].url, "https://tiktok.com/b");
        assert_eq!(last[0].status, EntryStatus::Failed);

        let all = store.read(10);
        let urls: Vec<_> = all.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, ["https://tiktok.com/a", "https://tiktok.com/b"]);
        assert_eq!(all[0].ts, 1000.0);
    }

    #[test]
    fn read_bounds_to_min_of_limit_and_count() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.jsonl"));
        for i in 0..7 {
            store.append(&entry(i as f64, &format!("https://tiktok.com/{i}"), EntryStatus::Success));
        }
        for limit in [0, 1, 3, 7, 20] {
            let got = store.read(limit);
            let expected: Vec<f64> = (0..7).map(|i| i as f64).skip(7usize.saturating_sub(limit)).collect();
            let ts: Vec<f64> = got.iter().map(|e| e.ts).collect();
            assert_eq!(ts, expected, "limit {limit}");
        }
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        fs::write(
            &path,
            concat!(
                "{\"ts\":1000,\"url\":\"https://tiktok.com/a\",\"status\":\"success\"}\n",
                "not json at all\n",
                "\n",
                "{\"ts\":1500,\"url\":\"https://tiktok.com/x\"\n",
                "{\"ts\":2000,\"url\":\"https://tiktok.com/b\",\"status\":\"failed\",\"error\":\"boom\"}\n",
            ),
        )
        .unwrap();

        let items = HistoryStore::new(&path).read(10);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].url, "https://tiktok.com/a");
        assert_eq!(items[1].url, "https://tiktok.com/b");
        assert_eq!(items[1].error.as_deref(), Some("boom"));
    }

    #[test]
    fn bad_bytes_only_cost_their_own_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"{\"ts\":1000,\"url\":\"https://tiktok.com/a\",\"status\":\"success\"}\n");
        bytes.extend_from_slice(b"{\"ts\":1500,\"url\":\"https://tiktok.com/\xff\",\"status\":\"success\"}\n");
        bytes.extend_from_slice(b"{\"ts\":2000,\"url\":\"https://tiktok.com/b\",\"status\":\"failed\"}\r\n");
        // A write cut off in the middle of a multi-byte character.
        bytes.extend_from_slice(b"{\"ts\":3000,\"url\":\"https://tiktok.com/\xe2\x82");
        fs::write(&path, bytes).unwrap();

        let items = HistoryStore::new(&path).read(10);
        let urls: Vec<&str> = items.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, ["https://tiktok.com/a", "https://tiktok.com/b"]);
        assert_eq!(items[1].status, EntryStatus::Failed);
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("nope.jsonl"));
        assert!(store.read(25).is_empty());
    }

    #[test]
    fn append_swallows_write_errors() {
        let dir = tempdir().unwrap();
        // A directory where the file should be makes the open fail.
        let store = HistoryStore::new(dir.path());
        store.append(&entry(1.0, "https://tiktok.com/a", EntryStatus::Success));
        assert!(store.read(10).is_empty());
    }

    #[test]
    fn entries_use_the_on_disk_key_names() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("nested").join("history.jsonl"));
        let e = HistoryEntry::failure(
            "https://vm.tiktok.com/x",
            "Max 720p",
            Path::new("/tmp/out"),
            "HTTP Error 404",
        );
        store.append(&e);

        let raw = fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(raw.trim()).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["quality"], "Max 720p");
        assert_eq!(value["output"], "");
        assert_eq!(value["output_dir"], "/tmp/out");
        assert_eq!(value["error"], "HTTP Error 404");
        assert!(raw.ends_with('\n'));
        assert_eq!(store.read(1)[0].output_file(), None);
    }
}
