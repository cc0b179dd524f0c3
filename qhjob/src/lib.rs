mod actors;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod listener;
pub mod session;
pub mod types;

// re-export the job coord handle as if it is the job coordinator itself.
pub use actors::coordinator::JobCoordinatorHandle as JobCoordinator;
pub use actors::writer::ResultWriterHandle as ResultWriter;
pub use codec::{Job, JobResult};
pub use config::{ExecLimits, SessionConfig, WorkerConfig};
pub use error::{FrameError, ListenError, SessionError};
pub use events::Termination;
pub use listener::{remove_stale_socket, Listener};
