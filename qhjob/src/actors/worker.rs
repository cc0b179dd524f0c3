mod actor;

use crate::codec::Job;
use crate::config::ExecLimits;
use crate::executor::{self, Execution};
use actor::Actor;

use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// A job that ran to completion (or to its timeout).
#[derive(Debug)]
pub struct Completion {
    pub job: Job,
    pub execution: Execution,
}

/// Handle to one in-flight job.
///
/// The job reports back through the `done_tx` it was spawned with, exactly once,
/// even if its check panics. Dropping the handle abandons the job: its process
/// group is killed and nothing is reported.
pub struct WorkerHandle {
    _cancel_tx: oneshot::Sender<()>,
}

impl WorkerHandle {
    pub fn spawn(
        job: Job,
        limits: ExecLimits,
        done_tx: mpsc::UnboundedSender<Completion>,
    ) -> Self {
        let command = job.command.clone();
        let timeout = Duration::from_secs(job.timeout);
        let check = async move { executor::execute(&command, timeout, &limits).await };
        Self::with_check(job, check, done_tx)
    }

    fn with_check<F>(job: Job, check: F, done_tx: mpsc::UnboundedSender<Completion>) -> Self
    where
        F: Future<Output = Execution> + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        Actor::spawn(job, check, cancel_rx, done_tx);
        Self {
            _cancel_tx: cancel_tx,
        }
    }
}
