use super::Completion;
use crate::codec::Job;
use crate::executor::Execution;

use std::future::Future;
use std::time::SystemTime;
use tokio::{
    select,
    sync::{mpsc, oneshot},
};
use tracing::{debug, warn};

pub struct Actor<F> {
    job: Job,
    check: F,
    cancel_rx: oneshot::Receiver<()>,
    done_tx: mpsc::UnboundedSender<Completion>,
}

impl<F> Actor<F>
where
    F: Future<Output = Execution> + Send + 'static,
{
    /// Run `check` on its own task and report how it went, even if it panics.
    /// Only cancellation goes unreported.
    pub fn spawn(
        job: Job,
        check: F,
        cancel_rx: oneshot::Receiver<()>,
        done_tx: mpsc::UnboundedSender<Completion>,
    ) {
        let actor = Self {
            job,
            check,
            cancel_rx,
            done_tx,
        };
        tokio::spawn(async move { actor.run().await });
    }

    async fn run(self) {
        let Self {
            job,
            check,
            cancel_rx,
            done_tx,
        } = self;
        let start = SystemTime::now();
        let mut running = tokio::spawn(check);

        select! {
            joined = &mut running => {
                let execution = match joined {
                    Ok(execution) => execution,
                    Err(err) => {
                        warn!(job_id = job.job_id, error = %err, "check task died");
                        Execution::lost(start, format!("check task died: {err}"))
                    }
                };
                debug!(
                    job_id = job.job_id,
                    wait_status = execution.wait_status(),
                    exited_ok = execution.exited_ok(),
                    runtime_ms = execution.runtime().as_millis() as u64,
                    "job finished"
                );
                let _ = done_tx.send(Completion { job, execution });
            }
            // handle dropped: aborting the check drops its process guard, killing the group
            _ = cancel_rx => {
                running.abort();
                debug!(job_id = job.job_id, "job abandoned");
            }
        }
    }
}
