//! # Crash telemetry configuration.
//!
//! [`TelemetryConfig`] drives [`CrashTelemetry`](crate::CrashTelemetry); [`RemoteConfig`]
//! describes the optional Firestore mirror. Both are deserializable; durations use humantime
//! syntax (`"10s"`).

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::policies::BackoffPolicy;

/// Default Firestore REST endpoint.
pub const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";

/// Settings for the crash telemetry store.
///
/// ## Field semantics
/// - `crash_dir`: directory of local record files (created on open)
/// - `list_limit`: default page size for `list`
/// - `clear_page_size`: how many remote documents one `clear_all` deletes at most (the
///   Firestore mirror caps this at 500, its per-commit write limit)
/// - `upload_retries`: extra upload attempts after a retryable failure (`0` = single attempt)
/// - `upload_backoff`: delay between upload attempts
/// - `remote`: `None` keeps everything local
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub crash_dir: PathBuf,
    pub app_version: String,
    pub list_limit: usize,
    pub clear_page_size: usize,
    pub upload_retries: u32,
    pub upload_backoff: BackoffPolicy,
    pub remote: Option<RemoteConfig>,
}

impl TelemetryConfig {
    /// Config for an application, with crashes under `<data dir>/<app_name>/crashes`.
    ///
    /// Falls back to the system temp dir when the platform has no data dir.
    pub fn for_app(app_name: &str, app_version: impl Into<String>) -> Self {
        let base = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            crash_dir: base.join(app_name).join("crashes"),
            app_version: app_version.into(),
            ..Self::default()
        }
    }

    /// Returns the list limit clamped to a minimum of 1.
    #[inline]
    pub fn list_limit_clamped(&self) -> usize {
        self.list_limit.max(1)
    }
}

impl Default for TelemetryConfig {
    /// Default configuration:
    ///
    /// - `crash_dir = ./crashes`
    /// - `app_version = <this crate's version>`
    /// - `list_limit = 50`
    /// - `clear_page_size = 100`
    /// - `upload_retries = 0`
    /// - `upload_backoff = BackoffPolicy::default()`
    /// - `remote = None`
    fn default() -> Self {
        Self {
            crash_dir: PathBuf::from("crashes"),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            list_limit: 50,
            clear_page_size: 100,
            upload_retries: 0,
            upload_backoff: BackoffPolicy::default(),
            remote: None,
        }
    }
}

/// Connection settings for the Firestore crash mirror.
#[derive(Clone, Debug, Deserialize)]
pub struct RemoteConfig {
    pub project_id: String,
    pub api_key: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl RemoteConfig {
    pub fn new(project_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            api_key: api_key.into(),
            collection: default_collection(),
            base_url: default_base_url(),
            timeout: default_timeout(),
        }
    }
}

fn default_collection() -> String {
    "crashReports".to_string()
}

fn default_base_url() -> String {
    FIRESTORE_BASE_URL.to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}
