use std::path::PathBuf;
use std::time::Duration;

/// Bounds applied to every check the worker runs.
#[derive(Debug, Clone)]
pub struct ExecLimits {
    /// How long a timed-out check gets between SIGTERM and SIGKILL. Also bounds
    /// how long the worker keeps draining pipes once the check is gone.
    pub kill_grace: Duration,
}

impl Default for ExecLimits {
    fn default() -> Self {
        Self {
            kill_grace: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Largest probe read during the handshake.
    pub probe_limit: usize,
    /// Largest job frame accepted, sentinel included.
    pub max_frame_len: usize,
    /// Report every timestamp as zero. Lets tests compare result frames byte
    /// for byte.
    pub freeze_clock: bool,
    pub limits: ExecLimits,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            probe_limit: 512,
            max_frame_len: 64 * 1024,
            freeze_clock: false,
            limits: ExecLimits::default(),
        }
    }
}

impl SessionConfig {
    pub fn with_freeze_clock(mut self, freeze_clock: bool) -> Self {
        self.freeze_clock = freeze_clock;
        self
    }

    pub fn with_kill_grace(mut self, kill_grace: Duration) -> Self {
        self.limits.kill_grace = kill_grace;
        self
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub socket_path: PathBuf,
    /// Pending-connection backlog passed to `listen(2)`.
    pub backlog: u32,
    pub session: SessionConfig,
}

impl WorkerConfig {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            backlog: 1,
            session: SessionConfig::default(),
        }
    }

    pub fn with_backlog(mut self, backlog: u32) -> Self {
        self.backlog = backlog;
        self
    }

    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }
}
