use crate::codec::{self, JobResult};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

pub struct Actor<W> {
    inbox: mpsc::UnboundedReceiver<JobResult>,
    writer: W,
    closed: CancellationToken,
}

impl<W> Actor<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn spawn(inbox: mpsc::UnboundedReceiver<JobResult>, writer: W, closed: CancellationToken) {
        let actor = Actor {
            inbox,
            writer,
            closed,
        };
        tokio::spawn(async move { actor.run().await });
    }

    async fn run(mut self) {
        while let Some(result) = self.inbox.recv().await {
            let frame = codec::encode_result(&result);
            let written = match self.writer.write_all(&frame).await {
                Ok(()) => self.writer.flush().await,
                Err(err) => Err(err),
            };
            match written {
                Ok(()) => trace!(job_id = result.job_id, bytes = frame.len(), "result sent"),
                Err(err) => {
                    // the peer is gone; nothing queued behind this result can be delivered either
                    debug!(job_id = result.job_id, error = %err, "result write failed");
                    self.closed.cancel();
                    return;
                }
            }
        }
    }
}
