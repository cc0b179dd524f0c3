use clap::{ArgEnum, Args, Parser, Subcommand};
use qhjob::SessionConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Run monitoring checks on behalf of a query handler
#[derive(Debug, Parser)]
#[clap(name = "qhworker", version)]
pub struct ArgParser {
    /// Log filter, in `RUST_LOG` syntax
    #[clap(long, env = "QHWORKER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log line format
    #[clap(long, arg_enum, env = "QHWORKER_LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,

    #[clap(flatten)]
    pub session: SessionArgs,

    /// The sub-command to use
    #[clap(subcommand)]
    pub sub_command: SubCommand,
}

#[derive(Debug, Subcommand)]
pub enum SubCommand {
    /// accept query handler connections on a socket
    Listen {
        /// socket path to create
        #[clap(env = "QHWORKER_SOCKET")]
        path: PathBuf,

        /// pending connections the kernel may queue
        #[clap(long, env = "QHWORKER_BACKLOG", default_value = "1")]
        backlog: u32,
    },
    /// connect to a query handler's socket and register with it
    Connect {
        /// socket path of the query handler
        #[clap(env = "QHWORKER_QH_SOCKET")]
        path: PathBuf,

        /// name announced at registration
        #[clap(long, env = "QHWORKER_NAME", default_value = "qhworker")]
        name: String,
    },
}

#[derive(Debug, Args)]
pub struct SessionArgs {
    /// milliseconds between SIGTERM and SIGKILL for a timed-out check
    #[clap(long, env = "QHWORKER_KILL_GRACE_MS", default_value = "1000")]
    pub kill_grace_ms: u64,

    /// largest accepted job frame, in bytes
    #[clap(long, env = "QHWORKER_MAX_FRAME", default_value = "65536")]
    pub max_frame_len: usize,

    /// report every timestamp as zero
    #[clap(long, env = "QHWORKER_FREEZE_CLOCK")]
    pub freeze_clock: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ArgEnum)]
pub enum LogFormat {
    /// human readable lines
    Text,
    /// one JSON object per line
    Json,
}

impl SessionArgs {
    pub fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::default()
            .with_freeze_clock(self.freeze_clock)
            .with_kill_grace(Duration::from_millis(self.kill_grace_ms));
        config.max_frame_len = self.max_frame_len;
        config
    }
}
