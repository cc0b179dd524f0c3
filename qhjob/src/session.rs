//! One connection with the query handler.
//!
//! ```text
//! HANDSHAKE -> READY -> (JOB_RECEIVED -> EXECUTING -> RESULT_SENT -> READY)* -> CLOSED
//! ```
//!
//! Reading happens here; executing and bookkeeping in the job coordinator;
//! writing in the result writer. Once the session returns, every job it
//! started is abandoned and its process group killed.

mod frames;
mod handshake;

pub use frames::FrameReader;
pub use handshake::registration_line;

use crate::actors::{coordinator::JobCoordinatorHandle, writer::ResultWriterHandle};
use crate::codec;
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};

use std::{io, sync::Arc};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Submissions allowed to queue in front of the coordinator.
const SUBMIT_QUEUE: usize = 64;

/// Serve a connection the query handler opened: acknowledge its probe, then run
/// jobs until it goes away.
pub async fn serve<S>(stream: S, config: Arc<SessionConfig>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    if !handshake::acknowledge_probe(&mut reader, &mut writer, config.probe_limit).await? {
        debug!("peer left before probing");
        return Ok(());
    }
    run_jobs(reader, writer, &config).await
}

/// Serve a connection we opened to the query handler: register, then run jobs
/// until it goes away.
pub async fn serve_registered<S>(
    stream: S,
    registration: &str,
    config: Arc<SessionConfig>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    handshake::register(&mut reader, &mut writer, registration).await?;
    debug!(registration, "registered with query handler");
    run_jobs(reader, writer, &config).await
}

async fn run_jobs<R, W>(reader: R, writer: W, config: &SessionConfig) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let closed = CancellationToken::new();
    let results = ResultWriterHandle::spawn(writer, closed.clone());
    let coordinator = JobCoordinatorHandle::spawn(
        SUBMIT_QUEUE,
        results,
        config.limits.clone(),
        config.freeze_clock,
    );
    let mut frames = FrameReader::new(reader, config.max_frame_len);

    loop {
        let frame = select! {
            frame = frames.next_frame() => frame?,
            _ = closed.cancelled() => {
                return Err(SessionError::Io(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "peer stopped accepting results",
                )));
            }
        };
        let frame = match frame {
            Some(frame) => frame,
            None => {
                debug!("peer closed the connection");
                return Ok(());
            }
        };
        let job = codec::decode_job(&frame)?;
        trace!(job_id = job.job_id, "job received");
        coordinator.submit(job).await;
    }
}
