//! # CrashTelemetry: local-first crash capture with a best-effort remote mirror.
//!
//! ## Flow
//! ```text
//! capture(origin, report)
//!   ├─► spawn_blocking(LocalCrashLog::append)   durable before return
//!   ├─► publish CrashCaptured
//!   └─► tokio::spawn(upload)                   detached; bounded retry
//!           ├─ Ok       → CrashMirrored
//!           ├─ Disabled → stays LocalOnly
//!           └─ Err      → CrashMirrorFailed (logged, never raised)
//!
//! list(limit)
//!   remote query ──Ok──► records (source = Remote)
//!        └──Err──► local list_all, newest first, truncated (source = Local)
//!
//! clear_all()
//!   remote clear_up_to(page) ║ local clear   (both always attempted)
//!        → Ok(summary) | Partial | Total
//! ```

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::error::{CaptureError, ClearError, ClearSide, RemoteError};
use crate::events::{Bus, Event, EventKind};
use crate::policies::BackoffPolicy;
use crate::telemetry::config::TelemetryConfig;
use crate::telemetry::local::LocalCrashLog;
use crate::telemetry::record::{CrashOrigin, CrashRecord, CrashReport, PersistenceState};
use crate::telemetry::remote::{CrashMirror, DisabledMirror, FirestoreMirror};

/// Where a listing came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportSource {
    Remote,
    Local,
}

/// Result of [`CrashTelemetry::list`].
#[derive(Debug, Clone)]
pub struct CrashListing {
    /// Records, most recent first.
    pub records: Vec<CrashRecord>,
    pub source: ReportSource,
}

/// Result of a successful [`CrashTelemetry::clear_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearSummary {
    pub remote_deleted: usize,
    pub local_deleted: usize,
}

/// A durably stored record plus its detached upload.
///
/// Dropping this value does not cancel the upload.
#[derive(Debug)]
pub struct Captured {
    pub record: CrashRecord,
    upload: JoinHandle<PersistenceState>,
}

impl Captured {
    /// Waits for the upload to settle and returns the record's final persistence state.
    pub async fn mirrored(self) -> PersistenceState {
        self.upload
            .await
            .unwrap_or(PersistenceState::MirrorFailed)
    }

    /// Keeps the record and lets the upload finish in the background.
    pub fn into_record(self) -> CrashRecord {
        self.record
    }
}

/// Crash telemetry store.
pub struct CrashTelemetry {
    cfg: TelemetryConfig,
    local: Arc<LocalCrashLog>,
    mirror: Arc<dyn CrashMirror>,
    bus: Bus,
}

impl CrashTelemetry {
    /// Creates the service with an explicit mirror; opens (creates) the crash directory.
    pub fn new(
        cfg: TelemetryConfig,
        mirror: Arc<dyn CrashMirror>,
        bus: Bus,
    ) -> Result<Self, CaptureError> {
        let local = Arc::new(LocalCrashLog::open(&cfg.crash_dir)?);
        tracing::debug!(dir = ?local.dir(), mirror = mirror.name(), "crash telemetry ready");
        Ok(Self {
            cfg,
            local,
            mirror,
            bus,
        })
    }

    /// Creates the service with the mirror described by `cfg.remote`.
    ///
    /// A remote that cannot be set up is logged and replaced by [`DisabledMirror`].
    pub fn from_config(cfg: TelemetryConfig, bus: Bus) -> Result<Self, CaptureError> {
        let mirror: Arc<dyn CrashMirror> = match cfg.remote.clone() {
            Some(remote) => match FirestoreMirror::new(remote) {
                Ok(m) => Arc::new(m),
                Err(err) => {
                    tracing::warn!(%err, "remote crash mirror unavailable; keeping crashes local");
                    Arc::new(DisabledMirror)
                }
            },
            None => Arc::new(DisabledMirror),
        };
        Self::new(cfg, mirror, bus)
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.cfg
    }

    pub fn local(&self) -> &LocalCrashLog {
        &self.local
    }

    /// Records a crash: durable locally before returning, then mirrored in the background.
    ///
    /// ### Errors
    /// [`CaptureError`] if the local write fails; no upload is attempted in that case.
    pub async fn capture(
        &self,
        origin: CrashOrigin,
        report: CrashReport,
    ) -> Result<Captured, CaptureError> {
        let record = CrashRecord::new(origin, report, self.cfg.app_version.as_str());
        let local = Arc::clone(&self.local);
        let stored = tokio::task::spawn_blocking(move || local.append(record))
            .await
            .map_err(|e| CaptureError::Writer {
                reason: e.to_string(),
            })??;

        self.announce(&stored);
        let upload = tokio::spawn(self.upload_task(stored.clone()));
        Ok(Captured {
            record: stored,
            upload,
        })
    }

    /// Blocking variant of [`capture`](Self::capture) for contexts without `.await`
    /// (panic hooks, `Drop`).
    ///
    /// The upload is spawned only when called from inside a tokio runtime.
    pub fn capture_blocking(
        &self,
        origin: CrashOrigin,
        report: CrashReport,
    ) -> Result<CrashRecord, CaptureError> {
        let record = CrashRecord::new(origin, report, self.cfg.app_version.as_str());
        let stored = self.local.append(record)?;
        self.announce(&stored);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(self.upload_task(stored.clone()));
            }
            Err(_) => {
                tracing::debug!(id = %stored.id, "no runtime; crash kept local only");
            }
        }
        Ok(stored)
    }

    /// Lists up to `limit` records, most recent first.
    ///
    /// Reads the remote mirror; on any remote failure falls back to the local log. Never fails.
    pub async fn list(&self, limit: usize) -> CrashListing {
        let limit = limit.max(1);
        match self.mirror.query(limit).await {
            Ok(mut records) => {
                records.truncate(limit);
                CrashListing {
                    records,
                    source: ReportSource::Remote,
                }
            }
            Err(err) => {
                if err != RemoteError::Disabled {
                    tracing::warn!(%err, "crash listing falls back to local log");
                }
                CrashListing {
                    records: self.list_local(limit).await,
                    source: ReportSource::Local,
                }
            }
        }
    }

    /// [`list`](Self::list) with the configured `list_limit`.
    pub async fn recent(&self) -> CrashListing {
        self.list(self.cfg.list_limit_clamped()).await
    }

    /// Clears the remote mirror (one page) and the local log.
    ///
    /// Both sides are attempted concurrently; one failing never stops the other. A mirror that
    /// is not configured counts as cleared.
    pub async fn clear_all(&self) -> Result<ClearSummary, ClearError> {
        let local = Arc::clone(&self.local);
        let (remote, local) = tokio::join!(
            self.mirror.clear_up_to(self.cfg.clear_page_size),
            tokio::task::spawn_blocking(move || local.clear()),
        );

        let remote = match remote {
            Ok(n) => Ok(n),
            Err(RemoteError::Disabled) => Ok(0),
            Err(err) => Err(err.to_string()),
        };
        let local = match local {
            Ok(Ok(n)) => Ok(n),
            Ok(Err(err)) => Err(err.to_string()),
            Err(join) => Err(join.to_string()),
        };

        let outcome = match (remote, local) {
            (Ok(remote_deleted), Ok(local_deleted)) => Ok(ClearSummary {
                remote_deleted,
                local_deleted,
            }),
            (Err(reason), Ok(_)) => Err(ClearError::Partial {
                failed: ClearSide::Remote,
                reason,
            }),
            (Ok(_), Err(reason)) => Err(ClearError::Partial {
                failed: ClearSide::Local,
                reason,
            }),
            (Err(remote), Err(local)) => Err(ClearError::Total { remote, local }),
        };

        let summary = match &outcome {
            Ok(s) => format!("remote={} local={}", s.remote_deleted, s.local_deleted),
            Err(err) => {
                tracing::warn!(%err, label = err.as_label(), "crash reports not fully cleared");
                err.to_string()
            }
        };
        if !matches!(outcome, Err(ClearError::Total { .. })) {
            self.bus
                .publish(Event::new(EventKind::CrashesCleared).with_reason(summary));
        }
        outcome
    }

    /// `true` if both stores were cleared.
    pub async fn clear(&self) -> bool {
        self.clear_all().await.is_ok()
    }

    async fn list_local(&self, limit: usize) -> Vec<CrashRecord> {
        let local = Arc::clone(&self.local);
        let read = tokio::task::spawn_blocking(move || local.list_all()).await;
        let mut records = match read {
            Ok(Ok(records)) => records,
            Ok(Err(err)) => {
                tracing::warn!(%err, "local crash log unreadable");
                Vec::new()
            }
            Err(err) => {
                tracing::warn!(%err, "local crash log reader did not complete");
                Vec::new()
            }
        };
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        records.truncate(limit);
        records
    }

    fn announce(&self, record: &CrashRecord) {
        tracing::info!(
            id = %record.id,
            origin = %record.origin,
            name = %record.error.name,
            "crash captured"
        );
        self.bus.publish(
            Event::new(EventKind::CrashCaptured)
                .with_crash_id(record.id.as_str())
                .with_origin(record.origin)
                .with_reason(record.error.message.as_str()),
        );
    }

    fn upload_task(
        &self,
        record: CrashRecord,
    ) -> impl Future<Output = PersistenceState> + Send + use<> {
        upload_with_retry(
            Arc::clone(&self.mirror),
            record,
            self.cfg.upload_retries,
            self.cfg.upload_backoff,
            self.bus.clone(),
        )
    }
}

async fn upload_with_retry(
    mirror: Arc<dyn CrashMirror>,
    record: CrashRecord,
    retries: u32,
    backoff: BackoffPolicy,
    bus: Bus,
) -> PersistenceState {
    let mut delays = backoff.schedule().take(retries as usize).enumerate();
    loop {
        match mirror.upload(&record).await {
            Ok(doc_id) => {
                tracing::debug!(id = %record.id, %doc_id, mirror = mirror.name(), "crash mirrored");
                bus.publish(
                    Event::new(EventKind::CrashMirrored)
                        .with_crash_id(record.id.as_str())
                        .with_reason(doc_id),
                );
                return PersistenceState::Mirrored;
            }
            Err(RemoteError::Disabled) => return PersistenceState::LocalOnly,
            Err(err) => {
                if err.is_retryable() {
                    if let Some((n, delay)) = delays.next() {
                        let attempt = n + 1;
                        tracing::debug!(id = %record.id, %err, attempt, ?delay, "crash upload retry scheduled");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                }
                tracing::warn!(id = %record.id, %err, label = err.as_label(), "crash upload failed");
                bus.publish(
                    Event::new(EventKind::CrashMirrorFailed)
                        .with_crash_id(record.id.as_str())
                        .with_reason(err.to_string()),
                );
                return PersistenceState::MirrorFailed;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::JitterPolicy;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// In-memory mirror; fails the first `failures` calls of every kind with `error`.
    struct FakeMirror {
        docs: Mutex<Vec<CrashRecord>>,
        failures: AtomicU32,
        error: Option<RemoteError>,
        uploads: AtomicU32,
    }

    impl FakeMirror {
        fn healthy() -> Arc<Self> {
            Self::failing(0, None)
        }

        fn down() -> Arc<Self> {
            Self::failing(
                u32::MAX,
                Some(RemoteError::Unavailable {
                    reason: "offline".into(),
                }),
            )
        }

        fn failing(failures: u32, error: Option<RemoteError>) -> Arc<Self> {
            Arc::new(Self {
                docs: Mutex::new(Vec::new()),
                failures: AtomicU32::new(failures),
                error,
                uploads: AtomicU32::new(0),
            })
        }

        fn check(&self) -> Result<(), RemoteError> {
            match &self.error {
                Some(err)
                    if self
                        .failures
                        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                        .is_ok() =>
                {
                    Err(err.clone())
                }
                _ => Ok(()),
            }
        }
    }

    #[async_trait]
    impl CrashMirror for FakeMirror {
        fn name(&self) -> &str {
            "fake"
        }

        async fn upload(&self, record: &CrashRecord) -> Result<String, RemoteError> {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            let mut docs = self.docs.lock().unwrap();
            let mut doc = record.clone();
            doc.id = format!("doc-{}", docs.len());
            docs.push(doc.clone());
            Ok(doc.id)
        }

        async fn query(&self, limit: usize) -> Result<Vec<CrashRecord>, RemoteError> {
            self.check()?;
            let mut docs = self.docs.lock().unwrap().clone();
            docs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            docs.truncate(limit);
            Ok(docs)
        }

        async fn clear_up_to(&self, limit: usize) -> Result<usize, RemoteError> {
            self.check()?;
            let mut docs = self.docs.lock().unwrap();
            let n = docs.len().min(limit);
            docs.drain(..n);
            Ok(n)
        }
    }

    fn config(dir: &tempfile::TempDir) -> TelemetryConfig {
        TelemetryConfig {
            crash_dir: dir.path().join("crashes"),
            app_version: "9.9.9".into(),
            upload_backoff: BackoffPolicy {
                first: Duration::from_millis(1),
                max: Duration::from_millis(5),
                factor: 1.0,
                jitter: JitterPolicy::None,
            },
            ..TelemetryConfig::default()
        }
    }

    fn boom() -> CrashReport {
        CrashReport::new("Error", "boom")
    }

    #[tokio::test]
    async fn capture_is_listed_from_local_when_remote_is_down() {
        let dir = tempfile::tempdir().unwrap();
        let tel = CrashTelemetry::new(config(&dir), FakeMirror::down(), Bus::new(16)).unwrap();

        let captured = tel.capture(CrashOrigin::HostProcess, boom()).await.unwrap();
        assert_eq!(captured.record.app_version, "9.9.9");
        assert_eq!(captured.mirrored().await, PersistenceState::MirrorFailed);

        let listing = tel.list(50).await;
        assert_eq!(listing.source, ReportSource::Local);
        assert_eq!(listing.records.len(), 1);
        assert_eq!(listing.records[0].error.message, "boom");
    }

    #[tokio::test]
    async fn local_fallback_is_newest_first_and_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let tel = CrashTelemetry::new(config(&dir), FakeMirror::down(), Bus::new(64)).unwrap();

        for i in 0..5 {
            tel.capture(CrashOrigin::Renderer, CrashReport::new("Error", format!("c{i}")))
                .await
                .unwrap();
        }

        let mut expected = tel.local().list_all().unwrap();
        expected.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        expected.truncate(3);

        let listing = tel.list(3).await;
        assert_eq!(listing.source, ReportSource::Local);
        assert_eq!(listing.records, expected);
        assert_eq!(listing.records[0].error.message, "c4");
    }

    #[tokio::test]
    async fn healthy_remote_is_the_listing_source() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = FakeMirror::healthy();
        let tel = CrashTelemetry::new(config(&dir), mirror.clone(), Bus::new(16)).unwrap();
        let mut rx = tel.bus.subscribe();

        let captured = tel.capture(CrashOrigin::SupervisedChild, boom()).await.unwrap();
        let local_id = captured.record.id.clone();
        assert_eq!(captured.mirrored().await, PersistenceState::Mirrored);

        let listing = tel.list(10).await;
        assert_eq!(listing.source, ReportSource::Remote);
        assert_eq!(listing.records[0].id, "doc-0");

        let first = rx.recv().await.unwrap();
        assert_eq!(first.kind, EventKind::CrashCaptured);
        assert_eq!(first.crash_id.as_deref(), Some(local_id.as_str()));
        let second = rx.recv().await.unwrap();
        assert_eq!(second.kind, EventKind::CrashMirrored);
    }

    #[tokio::test]
    async fn retryable_upload_failures_are_retried_within_budget() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = FakeMirror::failing(2, Some(RemoteError::Rejected { status: 503, reason: "busy".into() }));
        let mut cfg = config(&dir);
        cfg.upload_retries = 2;
        let tel = CrashTelemetry::new(cfg, mirror.clone(), Bus::new(16)).unwrap();

        let captured = tel.capture(CrashOrigin::HostProcess, boom()).await.unwrap();
        assert_eq!(captured.mirrored().await, PersistenceState::Mirrored);
        assert_eq!(mirror.uploads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn upload_gives_up_once_the_schedule_is_spent() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = FakeMirror::failing(10, Some(RemoteError::Rejected { status: 503, reason: "busy".into() }));
        let mut cfg = config(&dir);
        cfg.upload_retries = 2;
        let tel = CrashTelemetry::new(cfg, mirror.clone(), Bus::new(16)).unwrap();

        let captured = tel.capture(CrashOrigin::HostProcess, boom()).await.unwrap();
        assert_eq!(captured.mirrored().await, PersistenceState::MirrorFailed);
        assert_eq!(mirror.uploads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rejected_upload_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = FakeMirror::failing(1, Some(RemoteError::Rejected { status: 403, reason: "denied".into() }));
        let mut cfg = config(&dir);
        cfg.upload_retries = 5;
        let tel = CrashTelemetry::new(cfg, mirror.clone(), Bus::new(16)).unwrap();

        let captured = tel.capture(CrashOrigin::HostProcess, boom()).await.unwrap();
        assert_eq!(captured.mirrored().await, PersistenceState::MirrorFailed);
        assert_eq!(mirror.uploads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_mirror_keeps_records_local() {
        let dir = tempfile::tempdir().unwrap();
        let tel = CrashTelemetry::from_config(config(&dir), Bus::new(16)).unwrap();

        let captured = tel.capture(CrashOrigin::HostProcess, boom()).await.unwrap();
        assert_eq!(captured.mirrored().await, PersistenceState::LocalOnly);
        assert_eq!(tel.list(5).await.source, ReportSource::Local);
        assert_eq!(tel.clear_all().await.unwrap().local_deleted, 1);
    }

    #[tokio::test]
    async fn remote_failure_still_clears_local_and_is_partial() {
        let dir = tempfile::tempdir().unwrap();
        let tel = CrashTelemetry::new(config(&dir), FakeMirror::down(), Bus::new(16)).unwrap();
        for _ in 0..3 {
            tel.capture(CrashOrigin::HostProcess, boom()).await.unwrap();
        }

        let err = tel.clear_all().await.unwrap_err();
        assert!(err.is_partial());
        assert!(matches!(err, ClearError::Partial { failed: ClearSide::Remote, .. }));
        assert!(tel.local().list_all().unwrap().is_empty());
        assert!(!tel.clear().await);
    }

    #[tokio::test]
    async fn both_sides_failing_is_total() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&dir);
        let crash_dir = cfg.crash_dir.clone();
        let tel = CrashTelemetry::new(cfg, FakeMirror::down(), Bus::new(16)).unwrap();

        std::fs::remove_dir_all(&crash_dir).unwrap();
        std::fs::write(&crash_dir, b"not a directory").unwrap();

        let err = tel.clear_all().await.unwrap_err();
        assert!(matches!(err, ClearError::Total { .. }));
        assert!(!err.is_partial());
    }

    #[tokio::test]
    async fn healthy_clear_reports_both_counts() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = FakeMirror::healthy();
        let tel = CrashTelemetry::new(config(&dir), mirror, Bus::new(16)).unwrap();
        for _ in 0..2 {
            let captured = tel.capture(CrashOrigin::HostProcess, boom()).await.unwrap();
            captured.mirrored().await;
        }

        let summary = tel.clear_all().await.unwrap();
        assert_eq!(summary, ClearSummary { remote_deleted: 2, local_deleted: 2 });
        assert!(tel.list(10).await.records.is_empty());
    }

    #[tokio::test]
    async fn local_write_failure_aborts_capture() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&dir);
        let crash_dir = cfg.crash_dir.clone();
        let mirror = FakeMirror::healthy();
        let tel = CrashTelemetry::new(cfg, mirror.clone(), Bus::new(16)).unwrap();

        std::fs::remove_dir_all(&crash_dir).unwrap();
        std::fs::write(&crash_dir, b"not a directory").unwrap();

        let err = tel.capture(CrashOrigin::HostProcess, boom()).await.unwrap_err();
        assert_eq!(err.as_label(), "capture_local_io");
        tokio::task::yield_now().await;
        assert_eq!(mirror.uploads.load(Ordering::SeqCst), 0);
    }
}
