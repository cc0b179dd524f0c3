use crate::codec::Job;
use crate::types::JobId;
use tokio::sync::oneshot;

#[derive(Debug)]
pub enum CoordinatorMessage {
    Submit {
        job: Job,
    },
    InFlight {
        response: oneshot::Sender<Vec<JobId>>,
    },
}
