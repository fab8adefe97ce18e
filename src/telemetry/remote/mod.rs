//! # Remote crash mirrors.
//!
//! A [`CrashMirror`] keeps a best-effort copy of crash records off the host. Every failure is a
//! [`RemoteError`]; an empty store is `Ok(vec![])`, never an error.
//!
//! - [`FirestoreMirror`]: Firestore REST API over `reqwest`.
//! - [`DisabledMirror`]: no remote configured; every call reports [`RemoteError::Disabled`].
//!
//! Implementations must be `Send + Sync`; the telemetry service shares one instance across
//! upload tasks.

mod disabled;
mod firestore;

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::telemetry::record::CrashRecord;

pub use disabled::DisabledMirror;
pub use firestore::FirestoreMirror;

/// Remote store of crash records.
#[async_trait]
pub trait CrashMirror: Send + Sync + 'static {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Stores one record; returns the remote document id.
    async fn upload(&self, record: &CrashRecord) -> Result<String, RemoteError>;

    /// Returns up to `limit` records, most recent first, with `id` set to the document id.
    async fn query(&self, limit: usize) -> Result<Vec<CrashRecord>, RemoteError>;

    /// Deletes up to `limit` records; returns how many were deleted.
    async fn clear_up_to(&self, limit: usize) -> Result<usize, RemoteError>;
}
