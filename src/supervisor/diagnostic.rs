//! Single-attempt process execution with hang watchdog.
//!
//! The watchdog is an explicit state machine driven by four events: a line
//! was observed, the checkpoint marker matched, a timer expired, the process
//! exited. Timers are deadlines inside the select loop, so "stop the timers
//! once the process exits" is simply breaking out of the loop.

use super::SuperviseError;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::Command;
use tokio::time::Instant;
use tracing::warn;

/// Hang-detection parameters for one attempt.
pub(crate) struct Watchdog {
    /// Substring of a trimmed output line that marks the start of the phase
    /// known to hang.
    pub marker: String,
    /// Silence window after the marker before graceful termination.
    pub hang_timeout: Duration,
    /// Grace period between SIGTERM and SIGKILL.
    pub force_kill_timeout: Duration,
}

/// Result of one attempt, before retry classification.
pub(crate) struct Attempt {
    pub status: ExitStatus,
    pub killed_by_watchdog: bool,
    pub output: String,
}

#[derive(Debug, Clone, Copy)]
enum WatchState {
    /// No timer armed; the checkpoint marker has not been seen, or output
    /// kept flowing afterwards.
    Running,
    /// Marker observed; terminate when the deadline passes without output.
    Armed(Instant),
    /// SIGTERM sent; force-kill when the deadline passes.
    Terminating(Instant),
    /// SIGKILL sent; nothing left to do but wait for the exit status.
    ForceKilling,
}

impl WatchState {
    fn deadline(self) -> Option<Instant> {
        match self {
            WatchState::Armed(d) | WatchState::Terminating(d) => Some(d),
            WatchState::Running | WatchState::ForceKilling => None,
        }
    }

    /// Any line disarms a pending timer; a marker line (re-)arms it. Once a
    /// timer fired, later output no longer matters.
    fn on_line(self, line: &str, watchdog: &Watchdog) -> Self {
        match self {
            WatchState::Running | WatchState::Armed(_) => {
                if line.trim().contains(&watchdog.marker) {
                    WatchState::Armed(Instant::now() + watchdog.hang_timeout)
                } else {
                    WatchState::Running
                }
            }
            fired => fired,
        }
    }
}

/// Runs one process to completion, echoing and capturing its output.
pub(crate) async fn run_once(
    program: &Path,
    args: &[String],
    envs: &[(String, String)],
    watchdog: Option<&Watchdog>,
) -> Result<Attempt, SuperviseError> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in envs {
        command.env(key, value);
    }

    let mut child = command.spawn().map_err(|source| SuperviseError::Spawn {
        program: program.display().to_string(),
        source,
    })?;
    let pid = child.id();

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "child stdout was not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "child stderr was not captured"))?;
    let mut out_lines = BufReader::new(stdout).lines();
    let mut err_lines = BufReader::new(stderr).lines();

    let mut output = String::new();
    let mut state = WatchState::Running;
    let mut watchdog_fired = false;
    let mut out_done = false;
    let mut err_done = false;

    let status = loop {
        let deadline = state.deadline();
        // Evaluated even when the branch is disabled, so it needs a value.
        let sleep_target = deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(86_400));

        tokio::select! {
            line = out_lines.next_line(), if !out_done => {
                match line? {
                    Some(line) => {
                        println!("{}", line);
                        output.push_str(&line);
                        output.push('\n');
                        if let Some(watchdog) = watchdog {
                            state = state.on_line(&line, watchdog);
                        }
                    }
                    None => out_done = true,
                }
            }
            line = err_lines.next_line(), if !err_done => {
                match line? {
                    Some(line) => {
                        eprintln!("{}", line);
                        output.push_str(&line);
                        output.push('\n');
                    }
                    None => err_done = true,
                }
            }
            status = child.wait() => {
                break status?;
            }
            _ = tokio::time::sleep_until(sleep_target), if deadline.is_some() => {
                match state {
                    WatchState::Armed(_) => {
                        warn!("process produced no output within the hang window, sending terminate signal");
                        watchdog_fired = true;
                        send_signal(pid, TERMINATE)?;
                        if let Some(watchdog) = watchdog {
                            state = WatchState::Terminating(Instant::now() + watchdog.force_kill_timeout);
                        }
                    }
                    WatchState::Terminating(_) => {
                        warn!("process ignored the terminate signal, sending kill signal");
                        send_signal(pid, KILL)?;
                        state = WatchState::ForceKilling;
                    }
                    WatchState::Running | WatchState::ForceKilling => {}
                }
            }
        }
    };

    // The exit can race the pipe readers; drain whatever is still buffered
    // so the captured output is complete. Not after a watchdog kill: the
    // pipes stay open as long as any descendant of the killed process
    // inherited them, and a wedged descendant would block the drain forever.
    if !watchdog_fired {
        drain(&mut out_lines, &mut output, false).await?;
        drain(&mut err_lines, &mut output, true).await?;
    }

    Ok(Attempt {
        status,
        killed_by_watchdog: watchdog_fired && exited_by_signal(&status),
        output,
    })
}

async fn drain<R: tokio::io::AsyncBufRead + Unpin>(
    lines: &mut Lines<R>,
    output: &mut String,
    to_stderr: bool,
) -> Result<(), SuperviseError> {
    while let Some(line) = lines.next_line().await? {
        if to_stderr {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
        output.push_str(&line);
        output.push('\n');
    }
    Ok(())
}

#[cfg(unix)]
const TERMINATE: nix::sys::signal::Signal = nix::sys::signal::Signal::SIGTERM;
#[cfg(unix)]
const KILL: nix::sys::signal::Signal = nix::sys::signal::Signal::SIGKILL;

#[cfg(unix)]
fn send_signal(pid: Option<u32>, signal: nix::sys::signal::Signal) -> Result<(), SuperviseError> {
    // The pid is absent once the child has already been reaped.
    let Some(pid) = pid else { return Ok(()) };
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), signal)
        .map_err(|errno| SuperviseError::Signal(errno.to_string()))
}

#[cfg(unix)]
fn exited_by_signal(status: &ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    matches!(
        status.signal(),
        Some(signal) if signal == TERMINATE as i32 || signal == KILL as i32
    )
}

#[cfg(not(unix))]
const TERMINATE: () = ();
#[cfg(not(unix))]
const KILL: () = ();

#[cfg(not(unix))]
fn send_signal(_pid: Option<u32>, _signal: ()) -> Result<(), SuperviseError> {
    Err(SuperviseError::Signal(
        "staged signal escalation is only supported on unix".to_string(),
    ))
}

#[cfg(not(unix))]
fn exited_by_signal(_status: &ExitStatus) -> bool {
    false
}
