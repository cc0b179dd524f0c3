use std::{io, path::PathBuf, result};

/// A job frame that could not be turned into a `Job`.
///
/// Every variant is fatal to the connection it arrived on, never to the worker.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame is not terminated by the sentinel")]
    MissingSentinel,
    #[error("sentinel found inside the frame body at offset {0}")]
    MisplacedSentinel(usize),
    #[error("field {0:?} is not a key=value pair")]
    BadField(String),
    #[error("mandatory key {0:?} is missing")]
    MissingKey(&'static str),
    #[error("key {key:?} expects an unsigned integer, got {value:?}")]
    BadNumber { key: &'static str, value: String },
    #[error("frame is not valid UTF-8")]
    NotUtf8,
    #[error("frame exceeds {0} bytes without a sentinel")]
    TooLarge(usize),
    #[error("connection closed in the middle of a frame ({0} bytes pending)")]
    Truncated(usize),
}

/// Failures that end one job session.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("malformed frame: {0}")]
    Frame(#[from] FrameError),
    #[error("handshake failed: {0}")]
    Handshake(String),
}

/// Failures setting up or cleaning up the worker's socket.
#[derive(thiserror::Error, Debug)]
pub enum ListenError {
    #[error("cannot bind {path:?}: {source}")]
    Bind { path: PathBuf, source: io::Error },
    #[error("cannot remove stale socket {path:?}: {source}")]
    Unlink { path: PathBuf, source: io::Error },
}

pub type Result<T> = result::Result<T, SessionError>;
