use super::invocation::Invocation;
use crate::events::Output;
use crate::types::OutputBlob;

use bytes::BytesMut;
use std::{io, process::ExitStatus, process::Stdio, time::Duration};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::Child,
    sync::mpsc,
    time,
};
use tracing::trace;

/// Owns one running check for as long as it lives.
///
/// The child leads its own process group so that whatever it forks can be
/// signalled along with it. Dropping the guard SIGKILLs the group unless that
/// already happened, which covers timeouts, normal completion and cancellation
/// alike.
pub struct ProcessGuard {
    child: Child,
    pgid: Option<i32>,
    group_killed: bool,
}

impl ProcessGuard {
    pub fn spawn(invocation: &Invocation) -> io::Result<Self> {
        let child = invocation
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()?;
        let pgid = child.id().map(|pid| pid as i32);
        trace!(?pgid, program = invocation.program(), "spawned");
        Ok(Self {
            child,
            pgid,
            group_killed: false,
        })
    }

    /// Move both pipes into reader tasks that forward every chunk to `output_tx`.
    /// The channel closes once both pipes hit EOF.
    pub fn pipe_output(&mut self, output_tx: mpsc::UnboundedSender<Output>) {
        if let Some(stdout) = self.child.stdout.take() {
            pipe(stdout, output_tx.clone(), Output::Stdout);
        }
        if let Some(stderr) = self.child.stderr.take() {
            pipe(stderr, output_tx, Output::Stderr);
        }
    }

    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// SIGTERM the group, then SIGKILL it if the child outlives `grace`.
    pub async fn terminate(&mut self, grace: Duration) -> io::Result<ExitStatus> {
        self.signal_group(libc::SIGTERM);
        match time::timeout(grace, self.child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                trace!(pgid = ?self.pgid, "ignored SIGTERM");
                self.kill_group();
                self.child.wait().await
            }
        }
    }

    /// SIGKILL whatever is left of the group. Only the first call signals.
    pub fn kill_group(&mut self) {
        if !self.group_killed {
            self.signal_group(libc::SIGKILL);
            self.group_killed = true;
        }
    }

    fn signal_group(&self, signal: libc::c_int) {
        if let Some(pgid) = self.pgid {
            // SAFETY: kill(2) has no memory-safety preconditions. ESRCH (group
            // already empty) is the common, harmless failure.
            let rc = unsafe { libc::kill(-pgid, signal) };
            if rc != 0 {
                trace!(pgid, signal, error = %io::Error::last_os_error(), "kill");
            }
        }
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        self.kill_group();
    }
}

fn pipe<R>(mut reader: R, output_tx: mpsc::UnboundedSender<Output>, wrap: fn(OutputBlob) -> Output)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = BytesMut::with_capacity(4096);
        loop {
            buf.reserve(4096);
            match reader.read_buf(&mut buf).await {
                Ok(n) if n > 0 => {
                    // move the bytes out of buf and into a message
                    if output_tx.send(wrap(buf.split().freeze())).is_err() {
                        break;
                    }
                }
                _ => {
                    break;
                }
            }
        }
    });
}
