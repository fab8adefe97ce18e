//! # Launch and Capture Example
//!
//! Wires a supervisor and a crash telemetry store onto one bus, then:
//! - launches an executable and waits for it to exit
//! - launches a missing executable (recorded as a child crash)
//! - captures a relayed renderer crash
//! - lists the stored reports
//!
//! Crash files go to a temporary directory; no remote mirror is configured.
//!
//! ## Run
//! ```bash
//! cargo run --example launch_and_capture --features logging -- /bin/true
//! ```

use std::{sync::Arc, time::Duration};

use launchvisor::{
    Bus, ChildCrashRecorder, CrashOrigin, CrashReport, CrashTelemetry, LaunchReply, LogWriter,
    Subscribe, Supervisor, SupervisorConfig, TelemetryConfig,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let executable = std::env::args().nth(1).unwrap_or_else(|| "/bin/true".into());
    let crash_dir = std::env::temp_dir().join("launchvisor-demo").join("crashes");

    let bus = Bus::new(256);
    let telemetry = Arc::new(CrashTelemetry::from_config(
        TelemetryConfig {
            crash_dir,
            ..TelemetryConfig::default()
        },
        bus.clone(),
    )?);
    launchvisor::install_panic_hook(Arc::clone(&telemetry));

    let subs: Vec<Arc<dyn Subscribe>> = vec![
        Arc::new(LogWriter::new()),
        Arc::new(ChildCrashRecorder::new(Arc::clone(&telemetry))),
    ];
    let cfg = SupervisorConfig {
        poll_interval: Duration::from_millis(250),
        ..SupervisorConfig::default()
    };
    let sup = Supervisor::builder(cfg)
        .with_bus(bus)
        .with_subscribers(subs)
        .build();

    let launched = sup.launch("demo", &executable).await;
    println!("launch reply: {}", serde_json::to_string(&LaunchReply::from(&launched))?);

    let missing = sup.launch("ghost", "/no/such/game").await;
    println!("launch reply: {}", serde_json::to_string(&LaunchReply::from(&missing))?);

    telemetry
        .capture(
            CrashOrigin::Renderer,
            CrashReport::new("TypeError", "Cannot read properties of undefined")
                .with_stack("at renderGameList (renderer.js:42:13)"),
        )
        .await?;

    // Let the monitor observe the exit and the recorder store the launch failure.
    tokio::time::sleep(Duration::from_secs(1)).await;

    let listing = telemetry.recent().await;
    println!();
    println!("Crash reports ({:?}):", listing.source);
    for rec in &listing.records {
        println!(" ├─► [{}] {}: {}", rec.origin, rec.error.name, rec.error.message);
    }
    println!(" └─► active children: {}", sup.active_count().await);

    sup.shutdown().await;
    telemetry.clear_all().await?;
    Ok(())
}
