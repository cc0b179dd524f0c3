use super::messages::CoordinatorMessage;
use crate::actors::{
    worker::{Completion, WorkerHandle},
    writer::ResultWriterHandle,
};
use crate::codec::{Job, JobResult};
use crate::config::ExecLimits;
use crate::events::UNKNOWN_STATUS;
use crate::executor::{self, Execution};
use crate::types::JobId;

use std::collections::{hash_map::Entry, HashMap};
use std::time::SystemTime;
use tokio::{select, sync::mpsc};
use tracing::{debug, warn};

/// Per-session table of in-flight jobs, keyed by job id.
///
/// Only this actor touches the table: submissions arrive on `inbox`, finished
/// jobs on `done_rx`.
pub struct JobCoordinator {
    inbox: mpsc::Receiver<CoordinatorMessage>,
    done_tx: mpsc::UnboundedSender<Completion>,
    done_rx: mpsc::UnboundedReceiver<Completion>,
    workers: HashMap<JobId, WorkerHandle>,
    writer: ResultWriterHandle,
    limits: ExecLimits,
    freeze_clock: bool,
}

impl JobCoordinator {
    pub fn spawn(
        inbox: mpsc::Receiver<CoordinatorMessage>,
        writer: ResultWriterHandle,
        limits: ExecLimits,
        freeze_clock: bool,
    ) {
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let actor = Self {
            inbox,
            done_tx,
            done_rx,
            workers: HashMap::new(),
            writer,
            limits,
            freeze_clock,
        };
        tokio::spawn(async move { actor.run().await });
    }

    async fn run(mut self) {
        use self::CoordinatorMessage::*;
        loop {
            select! {
                maybe_msg = self.inbox.recv() => {
                    match maybe_msg {
                        Some(Submit { job }) => self.start_job(job),
                        Some(InFlight { response }) => {
                            let mut job_ids: Vec<JobId> = self.workers.keys().copied().collect();
                            job_ids.sort_unstable();
                            let _ = response.send(job_ids);
                        }
                        None => break,
                    }
                }
                Some(completion) = self.done_rx.recv() => self.finish_job(completion),
            }
        }

        // every handle still in the table is dropped here, killing its check
        if !self.workers.is_empty() {
            debug!(abandoned = self.workers.len(), "session closed with jobs in flight");
        }
    }

    fn start_job(&mut self, job: Job) {
        match self.workers.entry(job.job_id) {
            Entry::Occupied(_) => {
                warn!(job_id = job.job_id, "job id already in flight, rejecting");
                self.writer.send(rejection(&job, self.freeze_clock));
            }
            Entry::Vacant(slot) => {
                debug!(
                    job_id = job.job_id,
                    job_type = job.job_type,
                    command = %job.command,
                    timeout = job.timeout,
                    "starting job"
                );
                slot.insert(WorkerHandle::spawn(
                    job,
                    self.limits.clone(),
                    self.done_tx.clone(),
                ));
            }
        }
    }

    fn finish_job(&mut self, completion: Completion) {
        let Completion { job, execution } = completion;
        self.workers.remove(&job.job_id);
        self.writer.send(to_result(&job, &execution, self.freeze_clock));
    }
}

fn to_result(job: &Job, execution: &Execution, freeze_clock: bool) -> JobResult {
    let (start, stop) = if freeze_clock {
        (0.0, 0.0)
    } else {
        (execution.start_secs(), execution.stop_secs())
    };
    JobResult {
        job_id: job.job_id,
        job_type: job.job_type,
        start,
        stop,
        runtime: stop - start,
        wait_status: execution.wait_status(),
        exited_ok: execution.exited_ok(),
        outstd: String::from_utf8_lossy(&execution.stdout).into_owned(),
        outerr: String::from_utf8_lossy(&execution.stderr).into_owned(),
    }
}

/// Answer for a job whose id is already running. The running job is left alone.
fn rejection(job: &Job, freeze_clock: bool) -> JobResult {
    let now = if freeze_clock {
        0.0
    } else {
        executor::epoch_secs(SystemTime::now())
    };
    JobResult {
        job_id: job.job_id,
        job_type: job.job_type,
        start: now,
        stop: now,
        runtime: 0.0,
        wait_status: UNKNOWN_STATUS,
        exited_ok: false,
        outstd: String::new(),
        outerr: format!("job {} is already running", job.job_id),
    }
}
