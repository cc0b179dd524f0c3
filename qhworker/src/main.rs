mod args;
mod error;
mod logging;
mod shutdown;

use args::{ArgParser, SubCommand};
use clap::Parser;
use error::WorkerError;
use qhjob::{remove_stale_socket, session, Listener, SessionConfig, WorkerConfig};
use std::{path::Path, sync::Arc};
use tokio::net::UnixStream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ArgParser::parse();
    logging::init(&args.log_level, args.log_format)?;

    if let Err(err) = run(args).await {
        error!(error = %err, "worker failed");
        return Err(err.into());
    }
    Ok(())
}

async fn run(args: ArgParser) -> Result<(), WorkerError> {
    let shutdown = shutdown::on_signal().map_err(WorkerError::Signals)?;

    let session = args.session.session_config();
    match &args.sub_command {
        SubCommand::Listen { path, backlog } => {
            let config = WorkerConfig::new(path)
                .with_backlog(*backlog)
                .with_session(session);
            listen(config, shutdown).await
        }
        SubCommand::Connect { path, name } => {
            connect(path, name, Arc::new(session), shutdown).await
        }
    }
}

async fn listen(config: WorkerConfig, shutdown: CancellationToken) -> Result<(), WorkerError> {
    if remove_stale_socket(&config.socket_path).await? {
        warn!(path = %config.socket_path.display(), "previous worker did not clean up");
    }
    let listener = Listener::bind(&config)?;
    listener.run(shutdown).await;
    info!("worker stopped");
    Ok(())
}

/// Serve jobs over one connection we open ourselves, until either side stops.
async fn connect(
    path: &Path,
    name: &str,
    config: Arc<SessionConfig>,
    shutdown: CancellationToken,
) -> Result<(), WorkerError> {
    let stream = UnixStream::connect(path)
        .await
        .map_err(|source| WorkerError::Connect {
            path: path.to_path_buf(),
            source,
        })?;
    info!(path = %path.display(), name, "connected to query handler");

    let registration = session::registration_line(name, std::process::id());
    tokio::select! {
        served = session::serve_registered(stream, &registration, config) => {
            served?;
            info!("query handler closed the connection");
        }
        _ = shutdown.cancelled() => info!("worker stopped"),
    }
    Ok(())
}
