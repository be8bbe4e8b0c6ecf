//! Append-only log file with size-triggered and explicit rotation.
//!
//! Renaming, pruning and compressing backups is delegated to `file_rotate`.
//! Backups sit next to the live file as `<name>.<YYYYmmddTHHMMSS>[.N][.gz]`.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{self, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::TimeDelta;
use file_rotate::compression::Compression;
use file_rotate::suffix::{AppendTimestamp, FileLimit};
use file_rotate::{ContentLimit, FileRotate};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{LogError, Result};
use crate::sink::SinkWriter;

const MEGABYTE: u64 = 1024 * 1024;

/// Live sinks by absolute path, so every logger in the process shares one handle per file.
static OPEN_FILES: Lazy<Mutex<HashMap<PathBuf, Weak<RotatingFileSink>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Which backups survive a rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Retention {
    Unlimited,
    /// Keep the newest `n` backups.
    MaxBackups(usize),
    /// Delete backups older than this many days.
    MaxAgeDays(u32),
}

impl Retention {
    fn file_limit(self) -> FileLimit {
        match self {
            Retention::Unlimited => FileLimit::Unlimited,
            Retention::MaxBackups(n) => FileLimit::MaxFiles(n),
            Retention::MaxAgeDays(days) => FileLimit::Age(TimeDelta::days(i64::from(days))),
        }
    }
}

/// Size, retention and compression rules for one rotating file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationPolicy {
    /// Rotate before a write would push the file past this many bytes.
    pub max_size: u64,
    pub retention: Retention,
    /// Gzip backups as part of the rotation.
    pub compress: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_size: 100 * MEGABYTE,
            retention: Retention::MaxAgeDays(3),
            compress: true,
        }
    }
}

impl RotationPolicy {
    fn compression(&self) -> Compression {
        if self.compress {
            Compression::OnRotate(0)
        } else {
            Compression::None
        }
    }
}

type Roller = FileRotate<AppendTimestamp>;

#[derive(Default)]
struct FileState {
    roller: Option<Roller>,
    size: u64,
}

/// A single physical log file shared by every sink that writes to it.
///
/// All writes and every rotation go through one mutex, so a writer sees either
/// the old file or the new one, never a half-rotated state.
pub struct RotatingFileSink {
    path: PathBuf,
    name: String,
    policy: RotationPolicy,
    state: Mutex<FileState>,
    scheduled: AtomicBool,
}

impl RotatingFileSink {
    /// A private instance. The file is opened lazily on the first write.
    pub fn new(path: impl Into<PathBuf>, policy: RotationPolicy) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            path,
            name,
            policy,
            state: Mutex::new(FileState::default()),
            scheduled: AtomicBool::new(false),
        }
    }

    /// The process-wide instance for `path`, created with `policy` if none is alive.
    ///
    /// A later caller asking for the same path gets the existing instance and its policy.
    pub fn shared(path: impl Into<PathBuf>, policy: RotationPolicy) -> Arc<Self> {
        let path = path.into();
        let key = path::absolute(&path).unwrap_or_else(|_| path.clone());

        let mut open = OPEN_FILES.lock().unwrap_or_else(PoisonError::into_inner);
        open.retain(|_, sink| sink.strong_count() > 0);
        if let Some(existing) = open.get(&key).and_then(Weak::upgrade) {
            if existing.policy != policy {
                debug!(file = %existing.name, "Log file already open, keeping its rotation policy");
            }
            return existing;
        }

        let sink = Arc::new(Self::new(path, policy));
        open.insert(key, Arc::downgrade(&sink));
        sink
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    /// Append one complete record. Rotates first if the record would not fit.
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        let len = bytes.len() as u64;
        if len > self.policy.max_size {
            return Err(LogError::RecordTooLarge {
                len: bytes.len(),
                max: self.policy.max_size,
            });
        }

        let mut state = self.lock_state();
        if state.roller.is_none() {
            self.open(&mut state)?;
        }
        if state.size + len > self.policy.max_size {
            self.rotate_locked(&mut state)?;
        }

        let roller = state
            .roller
            .as_mut()
            .ok_or_else(|| io::Error::other("log file is not open"))?;
        roller.write_all(bytes)?;
        state.size += len;
        Ok(())
    }

    /// Archive the current file and start a fresh one at the same path.
    ///
    /// An empty file is not archived. Pruning and compression finish before this returns.
    pub fn rotate(&self) -> Result<()> {
        let mut state = self.lock_state();
        if self.rotate_locked(&mut state)? {
            info!(file = %self.name, "Rotated log file");
        }
        Ok(())
    }

    pub fn sync(&self) -> Result<()> {
        let mut state = self.lock_state();
        if let Some(roller) = state.roller.as_mut() {
            roller.flush()?;
        }
        Ok(())
    }

    /// Live file followed by backups, newest backup first. Opens the file if needed.
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        let mut state = self.lock_state();
        if state.roller.is_none() {
            self.open(&mut state)?;
        }
        let mut out = vec![self.path.clone()];
        if let Some(roller) = state.roller.as_mut() {
            out.extend(roller.log_paths().into_iter().rev());
        }
        Ok(out)
    }

    /// True for the first caller only; later callers must not schedule this file again.
    pub(crate) fn claim_scheduling(&self) -> bool {
        !self.scheduled.swap(true, Ordering::AcqRel)
    }

    fn lock_state(&self) -> MutexGuard<'_, FileState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open(&self, state: &mut FileState) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let size = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };

        state.roller = Some(FileRotate::new(
            &self.path,
            AppendTimestamp::default(self.policy.retention.file_limit()),
            ContentLimit::None,
            self.policy.compression(),
            #[cfg(unix)]
            None,
        ));
        state.size = size;
        Ok(())
    }

    /// Caller holds the state lock. Returns whether a backup was created.
    fn rotate_locked(&self, state: &mut FileState) -> Result<bool> {
        if state.roller.is_none() {
            self.open(state)?;
        }
        if state.size == 0 {
            return Ok(false);
        }

        let roller = state
            .roller
            .as_mut()
            .ok_or_else(|| io::Error::other("log file is not open"))?;
        roller.rotate()?;
        state.size = 0;
        debug!(file = %self.name, "Archived log file");
        Ok(true)
    }
}

impl SinkWriter for RotatingFileSink {
    fn write_record(&self, bytes: &[u8]) -> Result<()> {
        self.write(bytes)
    }

    fn flush(&self) -> Result<()> {
        self.sync()
    }
}

impl fanlog_scheduler::Rotatable for RotatingFileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn rotate(&self) -> anyhow::Result<()> {
        RotatingFileSink::rotate(self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::fs::File;
    use std::io::Read;
    use std::thread;
    use tempfile::TempDir;

    fn plain_policy() -> RotationPolicy {
        RotationPolicy {
            compress: false,
            ..Default::default()
        }
    }

    fn backups_in(dir: &Path, file_name: &str) -> Vec<PathBuf> {
        let prefix = format!("{file_name}.");
        let mut out: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.file_name().unwrap().to_string_lossy().starts_with(&prefix))
            .collect();
        out.sort();
        out
    }

    fn gunzip(path: &Path) -> String {
        let mut text = String::new();
        GzDecoder::new(File::open(path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        text
    }

    #[test]
    fn first_write_creates_directory_and_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/logs/app.log");
        let sink = RotatingFileSink::new(&path, plain_policy());
        assert!(!path.exists());

        sink.write(b"one\n").unwrap();
        sink.write(b"two\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn appends_to_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("app.log");
        fs::write(&path, "earlier\n").unwrap();

        let sink = RotatingFileSink::new(&path, plain_policy());
        sink.write(b"later\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "earlier\nlater\n");
    }

    #[test]
    fn rotate_archives_and_reopens() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("app.log");
        let sink = RotatingFileSink::new(&path, plain_policy());

        sink.write(b"before\n").unwrap();
        sink.rotate().unwrap();
        sink.write(b"after\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "after\n");
        let backups = backups_in(tmp.path(), "app.log");
        assert_eq!(backups.len(), 1);
        assert_eq!(fs::read_to_string(&backups[0]).unwrap(), "before\n");

        let files = sink.files().unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0], path);
        assert_eq!(files[1].file_name(), backups[0].file_name());
    }

    #[test]
    fn rotating_a_fresh_file_is_a_no_op() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("app.log");
        let sink = RotatingFileSink::new(&path, plain_policy());

        sink.rotate().unwrap();
        sink.rotate().unwrap();
        assert!(backups_in(tmp.path(), "app.log").is_empty());

        sink.write(b"first\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "first\n");
    }

    #[test]
    fn rotates_when_size_limit_would_be_exceeded() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("app.log");
        let sink = RotatingFileSink::new(
            &path,
            RotationPolicy {
                max_size: 64,
                ..plain_policy()
            },
        );

        let mut line = [b'x'; 29].to_vec();
        line.push(b'\n');
        for _ in 0..3 {
            sink.write(&line).unwrap();
        }

        assert_eq!(fs::metadata(&path).unwrap().len(), 30);
        let backups = backups_in(tmp.path(), "app.log");
        assert_eq!(backups.len(), 1);
        assert_eq!(fs::metadata(&backups[0]).unwrap().len(), 60);
    }

    #[test]
    fn size_rotation_compresses_and_caps_backups() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("app.log");
        let sink = RotatingFileSink::new(
            &path,
            RotationPolicy {
                max_size: 64,
                retention: Retention::MaxBackups(1),
                compress: true,
            },
        );

        // 30-byte records: the 3rd and 5th writes each rotate two records away.
        for i in 0..5 {
            sink.write(format!("{:<29}\n", format!("record-{i}")).as_bytes()).unwrap();
        }

        let backups = backups_in(tmp.path(), "app.log");
        assert_eq!(backups.len(), 1, "{backups:?}");
        assert!(backups[0].to_string_lossy().ends_with(".gz"));

        let archived: Vec<String> = gunzip(&backups[0])
            .lines()
            .map(|l| l.trim_end().to_string())
            .collect();
        assert_eq!(archived, vec!["record-2", "record-3"]);
        assert!(fs::read_to_string(&path).unwrap().starts_with("record-4"));
    }

    #[test]
    fn rejects_records_larger_than_a_file() {
        let tmp = TempDir::new().unwrap();
        let sink = RotatingFileSink::new(
            tmp.path().join("app.log"),
            RotationPolicy {
                max_size: 8,
                ..plain_policy()
            },
        );
        let err = sink.write(b"far too long\n").unwrap_err();
        assert!(matches!(err, LogError::RecordTooLarge { len: 13, max: 8 }));
    }

    #[test]
    fn compresses_backups_on_rotate() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("app.log");
        let sink = RotatingFileSink::new(&path, RotationPolicy::default());

        sink.write(b"archived line\n").unwrap();
        sink.rotate().unwrap();

        let backups = backups_in(tmp.path(), "app.log");
        assert_eq!(backups.len(), 1);
        assert!(backups[0].to_string_lossy().ends_with(".gz"));
        assert_eq!(gunzip(&backups[0]), "archived line\n");
    }

    #[test]
    fn prunes_backups_past_max_age() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("app.log");
        let stale = tmp.path().join("app.log.20200101T000000");
        let older = tmp.path().join("app.log.20200102T000000");
        let unrelated = tmp.path().join("other.log.20200101T000000");
        for p in [&stale, &older, &unrelated] {
            fs::write(p, "old\n").unwrap();
        }

        let sink = RotatingFileSink::new(&path, plain_policy());
        sink.write(b"current\n").unwrap();
        sink.rotate().unwrap();

        assert!(!stale.exists());
        assert!(!older.exists());
        assert!(unrelated.exists());
        assert_eq!(backups_in(tmp.path(), "app.log").len(), 1);
    }

    #[test]
    fn keeps_only_newest_backups_when_capped() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("app.log");
        for day in 1..=4 {
            fs::write(tmp.path().join(format!("app.log.2020010{day}T000000")), "old\n").unwrap();
        }

        let sink = RotatingFileSink::new(
            &path,
            RotationPolicy {
                retention: Retention::MaxBackups(2),
                ..plain_policy()
            },
        );
        sink.write(b"current\n").unwrap();
        sink.rotate().unwrap();

        let names: Vec<String> = backups_in(tmp.path(), "app.log")
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2);
        assert_eq!(names[0], "app.log.20200104T000000");
        assert!(!names[1].starts_with("app.log.2020"));
    }

    #[test]
    fn policy_deserializes_with_defaults() {
        let json = r#"{"max_size": 1024, "retention": {"max_backups": 5}}"#;
        let policy: RotationPolicy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.max_size, 1024);
        assert_eq!(policy.retention, Retention::MaxBackups(5));
        assert!(policy.compress);

        let policy: RotationPolicy = serde_json::from_str(r#"{"retention": "unlimited"}"#).unwrap();
        assert_eq!(policy.retention, Retention::Unlimited);
        assert_eq!(policy.max_size, 100 * MEGABYTE);
    }

    #[test]
    fn shared_returns_one_instance_per_path() {
        let tmp = TempDir::new().unwrap();
        let first = RotatingFileSink::shared(tmp.path().join("app.log"), plain_policy());
        let same = RotatingFileSink::shared(tmp.path().join(".").join("app.log"), plain_policy());
        let other = RotatingFileSink::shared(tmp.path().join("err.log"), plain_policy());
        assert!(Arc::ptr_eq(&first, &same));
        assert!(!Arc::ptr_eq(&first, &other));

        let relative = RotatingFileSink::shared("./fanlog-shared-test.log", plain_policy());
        let bare = RotatingFileSink::shared("fanlog-shared-test.log", plain_policy());
        assert!(Arc::ptr_eq(&relative, &bare));

        assert!(first.claim_scheduling());
        assert!(!same.claim_scheduling());
        assert!(other.claim_scheduling());
    }

    #[test]
    fn dropped_instances_are_not_reused() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("app.log");
        let first = RotatingFileSink::shared(&path, plain_policy());
        assert!(first.claim_scheduling());
        drop(first);

        let second = RotatingFileSink::shared(&path, plain_policy());
        assert!(second.claim_scheduling());
    }

    #[test]
    fn concurrent_writes_survive_rotation_intact() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 200;

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("app.log");
        let sink = Arc::new(RotatingFileSink::new(
            &path,
            RotationPolicy {
                max_size: 4096,
                ..plain_policy()
            },
        ));

        let writers: Vec<_> = (0..THREADS)
            .map(|t| {
                let sink = Arc::clone(&sink);
                thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        let line = format!("thread={t:02} seq={i:04} payload=abcdefghijklmnop\n");
                        sink.write(line.as_bytes()).unwrap();
                    }
                })
            })
            .collect();
        for _ in 0..20 {
            sink.rotate().unwrap();
            thread::yield_now();
        }
        for w in writers {
            w.join().unwrap();
        }

        let mut lines = Vec::new();
        for file in sink.files().unwrap() {
            let text = fs::read_to_string(&file).unwrap();
            assert!(text.is_empty() || text.ends_with('\n'), "truncated record in {file:?}");
            lines.extend(text.lines().map(str::to_string));
        }

        assert_eq!(lines.len(), THREADS * PER_THREAD);
        for line in &lines {
            assert!(
                line.starts_with("thread=") && line.ends_with("payload=abcdefghijklmnop"),
                "{line}"
            );
        }
        lines.sort();
        lines.dedup();
        assert_eq!(lines.len(), THREADS * PER_THREAD, "every record exactly once");
    }
}
