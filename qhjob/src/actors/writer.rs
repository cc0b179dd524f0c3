mod actor;

use crate::codec::JobResult;
use actor::Actor;

use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// The only thing allowed to write to a session's socket.
///
/// Results arrive from concurrently finishing jobs and are written one frame at
/// a time. This struct is an actor handle; the actor spawned by
/// `ResultWriterHandle::spawn` owns the write half.
#[derive(Clone)]
pub struct ResultWriterHandle {
    sender: mpsc::UnboundedSender<JobResult>,
}

impl ResultWriterHandle {
    /// `closed` is cancelled when a write fails, so the session can stop
    /// reading jobs nobody will hear about.
    pub fn spawn<W>(writer: W, closed: CancellationToken) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (sender, inbox) = mpsc::unbounded_channel();
        Actor::spawn(inbox, writer, closed);
        Self { sender }
    }

    /// Queue a result. Silently dropped once the connection is gone.
    pub fn send(&self, result: JobResult) {
        let _ = self.sender.send(result);
    }
}
