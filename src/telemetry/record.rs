//! # Crash records.
//!
//! A [`CrashRecord`] is immutable once built. Its JSON shape is shared by the local log and the
//! remote mirror:
//!
//! ```json
//! {
//!   "timestamp": "2026-01-05T10:00:00.123Z",
//!   "processType": "child",
//!   "error": { "name": "ChildCrashed", "message": "...", "stack": null },
//!   "systemInfo": { "platform": "linux", "arch": "x86_64", "family": "unix", "version": "..." },
//!   "appVersion": "1.4.0"
//! }
//! ```
//!
//! The record id is not part of the body: locally it is the file stem, remotely the document id.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Where a crash happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrashOrigin {
    /// The host process itself.
    #[serde(rename = "main")]
    HostProcess,
    /// A child launched by the supervisor.
    #[serde(rename = "child")]
    SupervisedChild,
    /// A report relayed from the UI layer.
    #[serde(rename = "renderer")]
    Renderer,
}

impl CrashOrigin {
    /// Wire name (`"main"`, `"child"`, `"renderer"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            CrashOrigin::HostProcess => "main",
            CrashOrigin::SupervisedChild => "child",
            CrashOrigin::Renderer => "renderer",
        }
    }
}

impl fmt::Display for CrashOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error description carried by a crash record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashReport {
    /// Error type or category.
    pub name: String,
    /// Human readable message.
    pub message: String,
    /// Stack trace or backtrace, when available.
    #[serde(default)]
    pub stack: Option<String>,
}

impl CrashReport {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Builds a report from any error; the source chain becomes the stack.
    pub fn from_error(name: impl Into<String>, err: &(dyn std::error::Error + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push(format!("caused by: {cause}"));
            source = cause.source();
        }
        let report = Self::new(name, err.to_string());
        if chain.is_empty() {
            report
        } else {
            report.with_stack(chain.join("\n"))
        }
    }

    /// Builds a report from a panic payload.
    pub fn from_panic(payload: &(dyn Any + Send), location: Option<String>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        let report = Self::new("panic", message);
        match location {
            Some(loc) => report.with_stack(format!("at {loc}")),
            None => report,
        }
    }
}

/// Host environment snapshot attached to every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub platform: String,
    pub arch: String,
    #[serde(default)]
    pub family: String,
    /// Host runtime version (crate version of the host library).
    #[serde(rename = "version")]
    pub runtime_version: String,
    /// Free-form extra fields; kept opaque.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl SystemInfo {
    /// Snapshot of the current host.
    pub fn current() -> Self {
        Self {
            platform: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            family: std::env::consts::FAMILY.to_string(),
            runtime_version: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))
                .to_string(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// One crash, as stored locally and mirrored remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrashRecord {
    /// Record id: file stem locally, document id remotely. Not serialized.
    #[serde(skip)]
    pub id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(rename = "processType")]
    pub origin: CrashOrigin,
    pub error: CrashReport,
    pub system_info: SystemInfo,
    pub app_version: String,
}

impl CrashRecord {
    /// New record stamped with the current UTC time. The id is assigned by the store.
    pub fn new(origin: CrashOrigin, error: CrashReport, app_version: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            timestamp: OffsetDateTime::now_utc(),
            origin,
            error,
            system_info: SystemInfo::current(),
            app_version: app_version.into(),
        }
    }
}

/// Where a record currently lives. Derived from the upload outcome, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceState {
    /// Durable locally; the upload has not finished (or was never attempted).
    LocalOnly,
    /// Durable locally and accepted by the remote mirror.
    Mirrored,
    /// Durable locally; the remote mirror failed.
    MirrorFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_uses_launcher_field_names() {
        let rec = CrashRecord::new(
            CrashOrigin::Renderer,
            CrashReport::new("TypeError", "x is undefined").with_stack("at app.js:1"),
            "1.4.0",
        );
        let json = serde_json::to_value(&rec).unwrap();

        assert_eq!(json["processType"], "renderer");
        assert_eq!(json["appVersion"], "1.4.0");
        assert_eq!(json["error"]["stack"], "at app.js:1");
        assert!(json["systemInfo"]["platform"].is_string());
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
        assert!(json.get("id").is_none());
    }

    #[test]
    fn extra_system_fields_survive_a_round_trip() {
        let mut rec = CrashRecord::new(CrashOrigin::HostProcess, CrashReport::new("panic", "boom"), "1.0.0");
        rec.system_info = rec.system_info.with_extra("gpu", "integrated");

        let text = serde_json::to_string(&rec).unwrap();
        let back: CrashRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(back.system_info.extra["gpu"], "integrated");
        assert_eq!(back.timestamp, rec.timestamp);
    }

    #[test]
    fn error_chain_becomes_stack() {
        let inner = std::io::Error::other("disk on fire");
        let outer = crate::error::CaptureError::LocalIo {
            path: "/tmp/crash".into(),
            source: inner,
        };
        let report = CrashReport::from_error("CaptureError", &outer);
        assert!(report.message.contains("/tmp/crash"));
        assert_eq!(report.stack.as_deref(), Some("caused by: disk on fire"));
    }

    #[test]
    fn panic_payload_is_extracted() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        let report = CrashReport::from_panic(payload.as_ref(), Some("src/main.rs:3:5".into()));
        assert_eq!(report.message, "boom");
        assert_eq!(report.stack.as_deref(), Some("at src/main.rs:3:5"));
    }
}
