//! Drives a real worker socket the way the query handler does.

use futures::future::join_all;
use qhjob::codec::{self, SENTINEL};
use qhjob::session::FrameReader;
use qhjob::{Listener, SessionConfig, WorkerConfig};

use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::UnixStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Worker {
    dir: TempDir,
    socket: PathBuf,
    shutdown: CancellationToken,
    server: JoinHandle<()>,
}

impl Worker {
    fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("qhworker.sock");
        let config = WorkerConfig::new(&socket).with_backlog(8).with_session(
            SessionConfig::default()
                .with_freeze_clock(true)
                .with_kill_grace(Duration::from_millis(200)),
        );
        let listener = Listener::bind(&config).unwrap();
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(listener.run(shutdown.clone()));
        Self {
            dir,
            socket,
            shutdown,
            server,
        }
    }

    /// Write a plugin script that prints `output` and exits with `code`.
    fn plugin(&self, name: &str, output: &str, code: i32) -> String {
        let path = self.dir.path().join(name);
        std::fs::write(&path, format!("printf '%s' '{output}'\nexit {code}\n")).unwrap();
        format!("/bin/sh {}", path.display())
    }

    async fn connect(&self) -> Client {
        Client::connect(&self.socket).await
    }

    async fn stop(self) {
        self.shutdown.cancel();
        self.server.await.unwrap();
        assert!(!self.socket.exists());
    }
}

struct Client {
    results: FrameReader<ReadHalf<UnixStream>>,
    jobs: WriteHalf<UnixStream>,
}

impl Client {
    async fn connect(socket: &Path) -> Self {
        let mut stream = UnixStream::connect(socket).await.unwrap();
        stream.write_all(b"@probe\0").await.unwrap();
        let mut ack = [0u8; 3];
        stream.read_exact(&mut ack).await.unwrap();
        assert_eq!(&ack, b"OK\0");

        let (results, jobs) = tokio::io::split(stream);
        Self {
            results: FrameReader::new(results, 64 * 1024),
            jobs,
        }
    }

    async fn submit(&mut self, job_id: u64, job_type: u64, command: &str, timeout: u64) {
        let frame = codec::encode_fields([
            ("job_id", job_id.to_string()),
            ("type", job_type.to_string()),
            ("command", command.to_string()),
            ("timeout", timeout.to_string()),
        ]);
        self.jobs.write_all(&frame).await.unwrap();
    }

    async fn result(&mut self) -> Vec<u8> {
        let frame = tokio::time::timeout(Duration::from_secs(10), self.results.next_frame())
            .await
            .expect("no result within 10s")
            .unwrap()
            .expect("connection closed");
        frame.to_vec()
    }
}

fn expected(job_id: u64, job_type: u64, wait_status: i32, exited_ok: bool, outstd: &str) -> Vec<u8> {
    let mut frame = format!(
        "job_id={job_id}\0stop=0.000000\0wait_status={wait_status}\0outerr=\0\
         runtime=0.000000\0outstd={outstd}\0exited_ok={}\0type={job_type}\0start=0.000000\0",
        u8::from(exited_ok)
    )
    .into_bytes();
    frame.extend_from_slice(&SENTINEL);
    frame
}

#[tokio::test]
async fn plugin_states_map_to_wait_status() {
    let worker = Worker::start();
    let mut client = worker.connect().await;

    let cases = [
        ("check_ok", "OK - all good", 0, 0),
        ("check_warning", "WARNING - load 5", 1, 256),
        ("check_critical", "CRITICAL - disk full", 2, 512),
        ("check_unknown", "UNKNOWN - no data", 3, 768),
    ];
    for (job_id, (name, output, code, wait_status)) in cases.into_iter().enumerate() {
        let job_id = job_id as u64 + 1;
        let command = worker.plugin(name, output, code);
        client.submit(job_id, 0, &command, 10).await;
        assert_eq!(
            client.result().await,
            expected(job_id, 0, wait_status, true, output),
            "{name}"
        );
    }

    drop(client);
    worker.stop().await;
}

#[tokio::test]
async fn slow_plugin_times_out() {
    let worker = Worker::start();
    let mut client = worker.connect().await;

    client.submit(77, 2, "sleep 30", 1).await;
    assert_eq!(client.result().await, expected(77, 2, 768, false, ""));

    worker.stop().await;
}

#[tokio::test]
async fn results_are_written_as_jobs_finish() {
    let worker = Worker::start();
    let mut client = worker.connect().await;

    client.submit(1, 0, "/bin/sh -c 'sleep 2; printf slow'", 10).await;
    client.submit(2, 0, "/bin/sh -c 'sleep 1; printf medium'", 10).await;
    client.submit(3, 0, "printf fast", 10).await;

    assert_eq!(client.result().await, expected(3, 0, 0, true, "fast"));
    assert_eq!(client.result().await, expected(2, 0, 0, true, "medium"));
    assert_eq!(client.result().await, expected(1, 0, 0, true, "slow"));

    worker.stop().await;
}

#[tokio::test]
async fn sessions_are_independent() {
    let worker = Worker::start();

    let runs = (1..=4u64).map(|n| {
        let socket = worker.socket.clone();
        async move {
            let mut client = Client::connect(&socket).await;
            client.submit(1, 0, &format!("printf {n}"), 10).await;
            client.result().await
        }
    });
    let results = join_all(runs).await;

    for (n, result) in (1..=4u64).zip(results) {
        assert_eq!(result, expected(1, 0, 0, true, &n.to_string()));
    }
    worker.stop().await;
}

#[tokio::test]
async fn malformed_frame_drops_only_that_connection() {
    let worker = Worker::start();

    let mut broken = worker.connect().await;
    broken.jobs.write_all(b"no equals sign\0\x01\0\0\0").await.unwrap();
    assert!(broken.results.next_frame().await.unwrap().is_none());

    let mut healthy = worker.connect().await;
    healthy.submit(5, 1, "printf still-here", 10).await;
    assert_eq!(healthy.result().await, expected(5, 1, 0, true, "still-here"));

    worker.stop().await;
}
