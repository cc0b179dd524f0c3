mod actor;
mod messages;

use self::{
    actor::JobCoordinator,
    messages::CoordinatorMessage::{self, InFlight, Submit},
};
use crate::actors::writer::ResultWriterHandle;
use crate::codec::Job;
use crate::config::ExecLimits;
use crate::types::JobId;
use tokio::sync::{mpsc, oneshot};

/// Tracks the jobs of one session and turns each finished one into a result.
///
/// This struct is an actor handle; the table itself lives in the actor spawned
/// by `JobCoordinatorHandle::spawn`, so concurrent completions never race on
/// it. Dropping every handle ends the actor and abandons the jobs still in
/// flight, killing their processes.
#[derive(Clone)]
pub struct JobCoordinatorHandle {
    sender: mpsc::Sender<CoordinatorMessage>,
}

impl JobCoordinatorHandle {
    /// Spawn a new coordinator.
    ///
    /// `message_capacity` bounds how many submissions may queue up before the
    /// session stops reading from the socket.
    pub fn spawn(
        message_capacity: usize,
        writer: ResultWriterHandle,
        limits: ExecLimits,
        freeze_clock: bool,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(message_capacity);
        JobCoordinator::spawn(receiver, writer, limits, freeze_clock);
        Self { sender }
    }

    /// Start a job. Its result goes to the writer once it finishes.
    pub async fn submit(&self, job: Job) {
        let _ = self.sender.send(Submit { job }).await;
    }

    /// Ids of the jobs currently running, ascending.
    pub async fn in_flight(&self) -> Vec<JobId> {
        let (tx, rx) = oneshot::channel();
        if self.sender.send(InFlight { response: tx }).await.is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }
}
