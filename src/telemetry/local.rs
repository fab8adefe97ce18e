//! # Local crash log: one JSON file per record.
//!
//! ## Layout
//! ```text
//! <crash_dir>/
//!   crash-<unix millis, 13 digits>-<seq, 6 digits>.json
//! ```
//! File names sort chronologically; the sequence part tells apart records written within the
//! same millisecond. The file stem is the record id.
//!
//! ## Durability
//! `append` writes to a hidden temp file, `fsync`s it, renames it into place and (on Unix)
//! `fsync`s the directory, so a returned record survives a host crash and a reader never sees a
//! half-written file.
//!
//! ## Concurrency
//! Appends share a read gate and never conflict (distinct names). `clear` takes the gate
//! exclusively, so no append lands halfway through a clear.
//!
//! The API is blocking; async callers go through `spawn_blocking`.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use time::OffsetDateTime;

use crate::error::CaptureError;
use crate::telemetry::record::CrashRecord;

const PREFIX: &str = "crash-";
const SUFFIX: &str = ".json";
const TMP_PREFIX: &str = ".tmp-";

/// Directory-backed crash record store.
#[derive(Debug)]
pub struct LocalCrashLog {
    dir: PathBuf,
    seq: AtomicU64,
    gate: RwLock<()>,
}

impl LocalCrashLog {
    /// Opens (and creates if needed) the crash directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CaptureError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| CaptureError::LocalIo {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            seq: AtomicU64::new(0),
            gate: RwLock::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Durably writes `record` and returns it with its id set.
    pub fn append(&self, mut record: CrashRecord) -> Result<CrashRecord, CaptureError> {
        let _shared = self.gate.read().unwrap_or_else(PoisonError::into_inner);

        let stem = self.next_stem(record.timestamp);
        let body = serde_json::to_vec_pretty(&record)?;
        let path = self.dir.join(format!("{stem}{SUFFIX}"));
        let tmp = self.dir.join(format!("{TMP_PREFIX}{stem}{SUFFIX}"));

        write_durable(&self.dir, &tmp, &path, &body).map_err(|source| {
            let _ = fs::remove_file(&tmp);
            CaptureError::LocalIo {
                path: path.clone(),
                source,
            }
        })?;

        record.id = stem;
        Ok(record)
    }

    /// Reads every record file, oldest first.
    ///
    /// Unreadable or unparsable files are skipped with a warning. A missing directory reads
    /// as empty.
    pub fn list_all(&self) -> io::Result<Vec<CrashRecord>> {
        let _shared = self.gate.read().unwrap_or_else(PoisonError::into_inner);

        let mut stems: Vec<String> = match fs::read_dir(&self.dir) {
            Ok(entries) => entries
                .filter_map(Result::ok)
                .filter_map(|e| record_stem(&e.file_name().to_string_lossy()).map(String::from))
                .collect(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        stems.sort_unstable();

        let mut records = Vec::with_capacity(stems.len());
        for stem in stems {
            let path = self.dir.join(format!("{stem}{SUFFIX}"));
            let parsed = fs::read(&path)
                .map_err(|e| e.to_string())
                .and_then(|bytes| {
                    serde_json::from_slice::<CrashRecord>(&bytes).map_err(|e| e.to_string())
                });
            match parsed {
                Ok(mut record) => {
                    record.id = stem;
                    records.push(record);
                }
                Err(reason) => {
                    tracing::warn!(path = ?path, %reason, "skipping unreadable crash record");
                }
            }
        }
        Ok(records)
    }

    /// Deletes every record file (and leftover temp files). The directory is kept.
    ///
    /// Returns the number of records removed.
    pub fn clear(&self) -> io::Result<usize> {
        let _exclusive = self.gate.write().unwrap_or_else(PoisonError::into_inner);

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let is_record = record_stem(&name).is_some();
            if !is_record && !name.starts_with(TMP_PREFIX) {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => {
                    if is_record {
                        removed += 1;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err),
            }
        }
        sync_dir(&self.dir)?;
        Ok(removed)
    }

    fn next_stem(&self, at: OffsetDateTime) -> String {
        let millis = (at.unix_timestamp_nanos() / 1_000_000).max(0);
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) % 1_000_000;
        format!("{PREFIX}{millis:013}-{seq:06}")
    }
}

/// `crash-….json` → `crash-…`; anything else → `None`.
fn record_stem(name: &str) -> Option<&str> {
    if name.starts_with(PREFIX) {
        name.strip_suffix(SUFFIX)
    } else {
        None
    }
}

fn write_durable(dir: &Path, tmp: &Path, path: &Path, body: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(tmp)?;
    file.write_all(body)?;
    file.sync_all()?;
    drop(file);
    fs::rename(tmp, path)?;
    sync_dir(dir)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::record::{CrashOrigin, CrashReport};
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    fn record(message: &str) -> CrashRecord {
        CrashRecord::new(CrashOrigin::HostProcess, CrashReport::new("Error", message), "1.0.0")
    }

    #[test]
    fn appended_record_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let stored = {
            let log = LocalCrashLog::open(dir.path()).unwrap();
            log.append(record("boom")).unwrap()
        };
        assert!(stored.id.starts_with("crash-"));

        let reopened = LocalCrashLog::open(dir.path()).unwrap();
        let all = reopened.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, stored.id);
        assert_eq!(all[0].error.message, "boom");
    }

    #[test]
    fn corrupt_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let log = LocalCrashLog::open(dir.path()).unwrap();
        log.append(record("good")).unwrap();
        fs::write(dir.path().join("crash-0000000000001-000000.json"), b"{ not json").unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let all = log.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].error.message, "good");
    }

    #[test]
    fn clear_removes_records_and_keeps_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log = LocalCrashLog::open(dir.path()).unwrap();
        for i in 0..3 {
            log.append(record(&format!("c{i}"))).unwrap();
        }
        fs::write(dir.path().join("notes.txt"), b"kept").unwrap();

        assert_eq!(log.clear().unwrap(), 3);
        assert!(log.list_all().unwrap().is_empty());
        assert!(dir.path().join("notes.txt").exists());
        assert!(dir.path().is_dir());
    }

    #[test]
    fn concurrent_appends_get_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(LocalCrashLog::open(dir.path()).unwrap());

        let workers: Vec<_> = (0..8)
            .map(|t| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for i in 0..10 {
                        log.append(record(&format!("{t}-{i}"))).unwrap();
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }

        let all = log.list_all().unwrap();
        assert_eq!(all.len(), 80);
        let mut ids: Vec<_> = all.iter().map(|r| r.id.clone()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 80);
    }

    #[test]
    fn clear_racing_appends_leaves_no_torn_files() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(LocalCrashLog::open(dir.path()).unwrap());
        let done = Arc::new(AtomicBool::new(false));

        let writers: Vec<_> = (0..4)
            .map(|t| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        log.append(record(&format!("{t}-{i}"))).unwrap();
                    }
                })
            })
            .collect();
        let clearer = {
            let log = Arc::clone(&log);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                let mut cleared = 0;
                while !done.load(Ordering::Acquire) {
                    cleared += log.clear().unwrap();
                    std::thread::yield_now();
                }
                cleared
            })
        };
        for w in writers {
            w.join().unwrap();
        }
        done.store(true, Ordering::Release);
        let cleared = clearer.join().unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().all(|n| !n.starts_with(TMP_PREFIX)), "{names:?}");

        let remaining = log.list_all().unwrap();
        let on_disk = names.iter().filter(|n| record_stem(n).is_some()).count();
        assert_eq!(remaining.len(), on_disk, "every remaining record parses");
        assert_eq!(cleared + remaining.len(), 200);
    }
}
