//! Host panic capture.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::sync::Arc;

use crate::telemetry::record::{CrashOrigin, CrashReport};
use crate::telemetry::service::CrashTelemetry;

/// Installs a panic hook that records a [`CrashOrigin::HostProcess`] crash, then runs the
/// previously installed hook.
///
/// The local write happens on the panicking thread. The upload is spawned only if the panic
/// happens inside a tokio runtime.
pub fn install_panic_hook(telemetry: Arc<CrashTelemetry>) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()));
        let mut report = CrashReport::from_panic(info.payload(), location);

        let backtrace = Backtrace::capture();
        if backtrace.status() == BacktraceStatus::Captured {
            let stack = match report.stack.take() {
                Some(at) => format!("{at}\n{backtrace}"),
                None => backtrace.to_string(),
            };
            report.stack = Some(stack);
        }

        if let Err(err) = telemetry.capture_blocking(CrashOrigin::HostProcess, report) {
            tracing::error!(%err, "panic not recorded");
        }
        previous(info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Bus;
    use crate::telemetry::config::TelemetryConfig;

    #[test]
    fn panics_are_recorded_locally() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TelemetryConfig {
            crash_dir: dir.path().to_path_buf(),
            ..TelemetryConfig::default()
        };
        let telemetry = Arc::new(CrashTelemetry::from_config(cfg, Bus::new(4)).unwrap());

        install_panic_hook(Arc::clone(&telemetry));
        let joined = std::thread::spawn(|| panic!("hook-boom")).join();
        let _ = std::panic::take_hook();
        assert!(joined.is_err());

        let records = telemetry.local().list_all().unwrap();
        let ours = records
            .iter()
            .find(|r| r.error.message == "hook-boom")
            .expect("panic recorded");
        assert_eq!(ours.origin, CrashOrigin::HostProcess);
        assert!(ours.error.stack.as_deref().unwrap_or("").contains("panic_hook.rs"));
    }
}
