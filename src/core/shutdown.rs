//! # Host shutdown signal.
//!
//! [`wait_for_shutdown_signal`] completes when the host process is asked to stop, so
//! [`Supervisor::run_until_shutdown`](crate::Supervisor::run_until_shutdown) can terminate
//! every child before the host exits.
//!
//! **Unix:** `SIGINT`, `SIGTERM`, `SIGQUIT`, `SIGHUP` (terminal closed / session logout).
//! **Windows:** Ctrl-C via [`tokio::signal::ctrl_c`].

/// Waits for a termination signal.
///
/// Returns `Err` if signal registration fails.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
        _ = sighup.recv()  => {},
    }
    Ok(())
}

/// Waits for a termination signal.
///
/// Returns `Err` if signal registration fails.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
