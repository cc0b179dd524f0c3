use qhjob::{ListenError, SessionError};
use std::{io, path::PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum WorkerError {
    #[error("invalid log filter {0:?}")]
    LogLevel(String),
    #[error("cannot install logger: {0}")]
    Logging(String),
    #[error("cannot install signal handlers: {0}")]
    Signals(#[source] io::Error),
    #[error("cannot connect to {path:?}: {source}")]
    Connect { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Listen(#[from] ListenError),
    #[error(transparent)]
    Session(#[from] SessionError),
}
