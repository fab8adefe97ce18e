//! # ChildCrashRecorder: turns child crash events into crash records.
//!
//! Register it with the supervisor builder; every `ChildCrashed` event (spawn refused, poll
//! error) becomes a [`CrashOrigin::SupervisedChild`] record.
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use launchvisor::*;
//! # async fn wire() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = Bus::new(1024);
//! let telemetry = Arc::new(CrashTelemetry::from_config(
//!     TelemetryConfig::for_app("game-launcher", "1.0.0"),
//!     bus.clone(),
//! )?);
//! let sup = Supervisor::builder(SupervisorConfig::default())
//!     .with_bus(bus)
//!     .with_subscribers(vec![Arc::new(ChildCrashRecorder::new(telemetry))])
//!     .build();
//! # Ok(()) }
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;
use crate::telemetry::record::{CrashOrigin, CrashReport};
use crate::telemetry::service::CrashTelemetry;

/// Subscriber that captures a crash record per `ChildCrashed` event.
pub struct ChildCrashRecorder {
    telemetry: Arc<CrashTelemetry>,
}

impl ChildCrashRecorder {
    pub fn new(telemetry: Arc<CrashTelemetry>) -> Self {
        Self { telemetry }
    }

    fn report_for(ev: &Event) -> CrashReport {
        let child = ev.child.as_deref().unwrap_or("unknown");
        let kind = ev.crash_kind.map(|k| k.as_str()).unwrap_or("unknown");
        let reason = ev.reason.as_deref().unwrap_or("no details");
        let report = CrashReport::new(kind, format!("child {child:?}: {reason}"));
        match ev.pid {
            Some(pid) => report.with_stack(format!("pid {pid}")),
            None => report,
        }
    }
}

#[async_trait]
impl Subscribe for ChildCrashRecorder {
    async fn on_event(&self, ev: &Event) {
        if ev.kind != EventKind::ChildCrashed {
            return;
        }
        let report = Self::report_for(ev);
        if let Err(err) = self
            .telemetry
            .capture(CrashOrigin::SupervisedChild, report)
            .await
        {
            tracing::warn!(child = ?ev.child, %err, "child crash not recorded");
        }
    }

    fn name(&self) -> &'static str {
        "ChildCrashRecorder"
    }
}
