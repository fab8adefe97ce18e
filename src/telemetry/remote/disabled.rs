use async_trait::async_trait;

use super::CrashMirror;
use crate::error::RemoteError;
use crate::telemetry::record::CrashRecord;

/// Mirror used when no remote store is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledMirror;

#[async_trait]
impl CrashMirror for DisabledMirror {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn upload(&self, _record: &CrashRecord) -> Result<String, RemoteError> {
        Err(RemoteError::Disabled)
    }

    async fn query(&self, _limit: usize) -> Result<Vec<CrashRecord>, RemoteError> {
        Err(RemoteError::Disabled)
    }

    async fn clear_up_to(&self, _limit: usize) -> Result<usize, RemoteError> {
        Err(RemoteError::Disabled)
    }
}
