mod invocation;
mod process;

pub use invocation::Invocation;
pub use process::ProcessGuard;

use crate::config::ExecLimits;
use crate::events::{Output, Termination};

use bytes::{Bytes, BytesMut};
use std::{
    io,
    process::ExitStatus,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio::{
    select,
    sync::mpsc,
    time::{self, Instant},
};
use tracing::{debug, warn};

/// Everything known about one finished check.
#[derive(Clone, Debug)]
pub struct Execution {
    pub start: SystemTime,
    pub stop: SystemTime,
    pub termination: Termination,
    pub stdout: Bytes,
    pub stderr: Bytes,
}

impl Execution {
    /// The check vanished without reporting how it ended.
    pub(crate) fn lost(start: SystemTime, reason: String) -> Self {
        Self {
            start,
            stop: SystemTime::now(),
            stderr: Bytes::from(reason.clone()),
            termination: Termination::Lost { reason },
            stdout: Bytes::new(),
        }
    }

    fn spawn_failed(start: SystemTime, reason: String) -> Self {
        Self {
            start,
            stop: SystemTime::now(),
            stderr: Bytes::from(reason.clone()),
            termination: Termination::SpawnFailed { reason },
            stdout: Bytes::new(),
        }
    }

    pub fn wait_status(&self) -> i32 {
        self.termination.wait_status()
    }

    pub fn exited_ok(&self) -> bool {
        self.termination.exited_ok()
    }

    pub fn start_secs(&self) -> f64 {
        epoch_secs(self.start)
    }

    pub fn stop_secs(&self) -> f64 {
        epoch_secs(self.stop)
    }

    pub fn runtime(&self) -> Duration {
        self.stop.duration_since(self.start).unwrap_or_default()
    }
}

pub(crate) fn epoch_secs(at: SystemTime) -> f64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

#[derive(Default)]
struct Capture {
    stdout: BytesMut,
    stderr: BytesMut,
}

impl Capture {
    fn push(&mut self, output: Output) {
        match output {
            Output::Stdout(blob) => self.stdout.extend_from_slice(&blob),
            Output::Stderr(blob) => self.stderr.extend_from_slice(&blob),
        }
    }
}

/// Run `command` to completion or until `timeout` elapses.
///
/// Never fails: spawn errors, timeouts and lost children are all described by
/// the returned `Execution`. A zero `timeout` kills the check straight away; one
/// too large to put a deadline on waits for the check indefinitely. Dropping the
/// returned future kills the check's whole process group.
pub async fn execute(command: &str, timeout: Duration, limits: &ExecLimits) -> Execution {
    let start = SystemTime::now();
    let deadline = Instant::now().checked_add(timeout);

    let invocation = match Invocation::parse(command) {
        Some(invocation) => invocation,
        None => return Execution::spawn_failed(start, "empty command line".to_string()),
    };
    let mut process = match ProcessGuard::spawn(&invocation) {
        Ok(process) => process,
        Err(err) => {
            debug!(command, error = %err, "spawn failed");
            return Execution::spawn_failed(
                start,
                format!("failed to run {}: {}", invocation.program(), err),
            );
        }
    };

    let (output_tx, mut output_rx) = mpsc::unbounded_channel();
    process.pipe_output(output_tx);
    let mut capture = Capture::default();

    let waited = match deadline {
        _ if timeout.is_zero() => None,
        Some(deadline) => time::timeout_at(
            deadline,
            wait_collecting(&mut process, &mut output_rx, &mut capture),
        )
        .await
        .ok(),
        None => Some(wait_collecting(&mut process, &mut output_rx, &mut capture).await),
    };

    let termination = match waited {
        Some(Ok(status)) => Termination::from(status),
        Some(Err(err)) => {
            warn!(command, error = %err, "lost track of child");
            Termination::Lost {
                reason: err.to_string(),
            }
        }
        None => {
            debug!(command, timeout = timeout.as_secs(), "timed out, terminating");
            if let Err(err) = process.terminate(limits.kill_grace).await {
                warn!(command, error = %err, "failed to reap timed out child");
            }
            Termination::TimedOut
        }
    };

    // the child is reaped; stragglers in its group would keep the pipes open
    process.kill_group();
    if time::timeout(limits.kill_grace, drain(&mut output_rx, &mut capture))
        .await
        .is_err()
    {
        debug!(command, "output still open after grace period, dropping the rest");
    }

    Execution {
        start,
        stop: SystemTime::now(),
        termination,
        stdout: capture.stdout.freeze(),
        stderr: capture.stderr.freeze(),
    }
}

async fn wait_collecting(
    process: &mut ProcessGuard,
    output_rx: &mut mpsc::UnboundedReceiver<Output>,
    capture: &mut Capture,
) -> io::Result<ExitStatus> {
    let mut pipes_open = true;
    loop {
        select! {
            status = process.wait() => return status,
            maybe_output = output_rx.recv(), if pipes_open => {
                match maybe_output {
                    Some(output) => capture.push(output),
                    None => pipes_open = false,
                }
            }
        }
    }
}

async fn drain(output_rx: &mut mpsc::UnboundedReceiver<Output>, capture: &mut Capture) {
    while let Some(output) = output_rx.recv().await {
        capture.push(output);
    }
}
