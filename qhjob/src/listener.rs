use crate::config::{SessionConfig, WorkerConfig};
use crate::error::ListenError;
use crate::session;

use std::{
    io,
    os::unix::fs::FileTypeExt,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::{
    net::{UnixListener, UnixSocket, UnixStream},
    select,
    task::JoinSet,
    time,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Pause after a failed accept (EMFILE and friends) before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// The worker's socket. Owns the path: it is unlinked when the listener goes
/// away.
pub struct Listener {
    listener: UnixListener,
    path: PathBuf,
    session: Arc<SessionConfig>,
}

impl Listener {
    pub fn bind(config: &WorkerConfig) -> Result<Self, ListenError> {
        let path = config.socket_path.clone();
        let bind_error = |source| ListenError::Bind {
            path: path.clone(),
            source,
        };
        let socket = UnixSocket::new_stream().map_err(bind_error)?;
        socket.bind(&path).map_err(bind_error)?;
        let listener = socket.listen(config.backlog).map_err(bind_error)?;
        info!(path = %path.display(), backlog = config.backlog, "listening");
        Ok(Self {
            listener,
            path,
            session: Arc::new(config.session.clone()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept connections until `shutdown` fires, one session per connection.
    /// Sessions still open at shutdown are aborted, which kills their jobs.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut sessions = JoinSet::new();
        let mut next_session: u64 = 0;

        loop {
            select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _addr)) => {
                        next_session += 1;
                        let session_id = next_session;
                        let config = self.session.clone();
                        debug!(session_id, "connection accepted");
                        sessions.spawn(async move {
                            match session::serve(stream, config).await {
                                Ok(()) => debug!(session_id, "session closed"),
                                Err(err) => warn!(session_id, error = %err, "session ended"),
                            }
                        });
                    }
                    Err(err) => {
                        warn!(error = %err, "accept failed");
                        time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
            }
        }

        info!(open_sessions = sessions.len(), "shutting down");
        sessions.shutdown().await;
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            debug!(path = %self.path.display(), error = %err, "could not unlink socket");
        }
    }
}

/// Remove a socket file left behind by a worker that is no longer running.
///
/// Returns `true` if something was removed. A path that is not a socket, or a
/// socket somebody still accepts connections on, is left alone; binding will
/// then fail with `ListenError::Bind`.
pub async fn remove_stale_socket(path: &Path) -> Result<bool, ListenError> {
    let unlink_error = |source| ListenError::Unlink {
        path: path.to_path_buf(),
        source,
    };
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(unlink_error(err)),
    };
    if !metadata.file_type().is_socket() {
        return Ok(false);
    }
    match UnixStream::connect(path).await {
        Ok(_) => Ok(false),
        Err(err) if err.kind() == io::ErrorKind::ConnectionRefused => {
            std::fs::remove_file(path).map_err(unlink_error)?;
            info!(path = %path.display(), "removed stale socket");
            Ok(true)
        }
        Err(err) => Err(unlink_error(err)),
    }
}
