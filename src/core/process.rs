//! # OS process primitives: spawning and tree termination.
//!
//! ## Unix
//! Children are spawned as leaders of a new process group (`pgid == pid`), so anything they
//! spawn inherits the group and one `killpg` reaches the whole tree:
//! - graceful: `SIGTERM` to the group
//! - forceful: `SIGKILL` to the group
//!
//! If the group cannot be signalled (it was re-parented, or permissions differ) the immediate
//! process is signalled instead.
//!
//! ## Windows
//! Children get their own console process group; termination goes through
//! `taskkill /pid <pid> /t` (graceful) and `taskkill /pid <pid> /t /f` (forceful).
//!
//! A process that is already gone is not an error.

use std::io;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

/// Strength of a termination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stop {
    /// Ask the process tree to exit.
    Graceful,
    /// Kill the process tree.
    Forceful,
}

#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

/// Builds the spawn command for a child executable.
///
/// Standard streams are detached; the child is placed in its own process group.
pub(crate) fn command(executable: &Path) -> Command {
    let mut cmd = Command::new(executable);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(false);

    #[cfg(unix)]
    cmd.process_group(0);

    #[cfg(windows)]
    cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);

    cmd
}

/// Sends a termination request to the process tree rooted at `pid`.
#[cfg(unix)]
pub(crate) fn signal_tree(pid: u32, stop: Stop) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill, killpg};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    let target = Pid::from_raw(raw);
    let signal = match stop {
        Stop::Graceful => Signal::SIGTERM,
        Stop::Forceful => Signal::SIGKILL,
    };

    match killpg(target, signal) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(group_err) => {
            tracing::debug!(pid, %group_err, "process group signal failed; signalling process");
            match kill(target, signal) {
                Ok(()) | Err(Errno::ESRCH) => Ok(()),
                Err(e) => Err(io::Error::from(e)),
            }
        }
    }
}

/// Sends a termination request to the process tree rooted at `pid`.
#[cfg(windows)]
pub(crate) fn signal_tree(pid: u32, stop: Stop) -> io::Result<()> {
    let mut cmd = std::process::Command::new("taskkill");
    cmd.arg("/pid").arg(pid.to_string()).arg("/t");
    if stop == Stop::Forceful {
        cmd.arg("/f");
    }
    let status = cmd.stdout(Stdio::null()).stderr(Stdio::null()).status()?;
    // 128: no such process.
    if status.success() || status.code() == Some(128) {
        Ok(())
    } else {
        Err(io::Error::other(format!("taskkill exited with {status}")))
    }
}

/// Sends a termination request to the process tree rooted at `pid`.
#[cfg(not(any(unix, windows)))]
pub(crate) fn signal_tree(_pid: u32, _stop: Stop) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "process termination is not supported on this platform",
    ))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn forceful_stop_reaches_grandchildren() {
        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg("sleep 30 & wait")
            .process_group(0)
            .spawn()
            .expect("spawn sh");
        let pid = child.id().expect("pid");

        signal_tree(pid, Stop::Forceful).expect("signal");
        let status = tokio::time::timeout(Duration::from_secs(5), child.wait())
            .await
            .expect("child exits")
            .expect("wait");
        assert!(!status.success());

        // The group is gone now; a second request is a no-op.
        signal_tree(pid, Stop::Graceful).expect("no-op on dead group");
    }
}
