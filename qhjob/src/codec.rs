//! Wire format shared with the query handler.
//!
//! A frame is a run of `key=value` fields, each followed by a NUL byte, and is
//! terminated by [`SENTINEL`]. Job frames flow from the peer to the worker,
//! result frames flow back. Nothing in here touches a socket.

use crate::error::FrameError;
use crate::types::{JobId, JobType, Seconds};
use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

/// End-of-frame marker.
pub const SENTINEL: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

/// Reply to the peer's liveness probe.
pub const ACK: &[u8; 3] = b"OK\0";

/// A request to run one command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    pub job_id: JobId,
    pub job_type: JobType,
    pub command: String,
    pub timeout: Seconds,
}

/// The answer to one `Job`.
#[derive(Clone, Debug, PartialEq)]
pub struct JobResult {
    pub job_id: JobId,
    pub job_type: JobType,
    pub start: f64,
    pub stop: f64,
    pub runtime: f64,
    pub wait_status: i32,
    pub exited_ok: bool,
    pub outstd: String,
    pub outerr: String,
}

/// Position of the first sentinel in `bytes`, if any.
pub fn find_sentinel(bytes: &[u8]) -> Option<usize> {
    bytes.windows(SENTINEL.len()).position(|w| w == SENTINEL)
}

pub fn decode_job(frame: &[u8]) -> Result<Job, FrameError> {
    let body = frame
        .strip_suffix(&SENTINEL[..])
        .ok_or(FrameError::MissingSentinel)?;
    if let Some(offset) = find_sentinel(body) {
        return Err(FrameError::MisplacedSentinel(offset));
    }
    let body = std::str::from_utf8(body).map_err(|_| FrameError::NotUtf8)?;

    let mut job_id = None;
    let mut job_type = None;
    let mut command = None;
    let mut timeout = None;

    for field in body.split('\0').filter(|field| !field.is_empty()) {
        let (key, value) = field
            .split_once('=')
            .ok_or_else(|| FrameError::BadField(field.to_string()))?;
        match key {
            "job_id" => job_id = Some(number::<JobId>("job_id", value)?),
            "type" => job_type = Some(number::<JobType>("type", value)?),
            "command" => command = Some(value.to_string()),
            "timeout" => timeout = Some(number::<Seconds>("timeout", value)?),
            _ => trace!(key, "ignoring unknown job field"),
        }
    }

    Ok(Job {
        job_id: job_id.ok_or(FrameError::MissingKey("job_id"))?,
        job_type: job_type.ok_or(FrameError::MissingKey("type"))?,
        command: command.ok_or(FrameError::MissingKey("command"))?,
        timeout: timeout.ok_or(FrameError::MissingKey("timeout"))?,
    })
}

fn number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, FrameError> {
    value.parse().map_err(|_| FrameError::BadNumber {
        key,
        value: value.to_string(),
    })
}

pub fn encode_result(result: &JobResult) -> Bytes {
    encode_fields([
        ("job_id", result.job_id.to_string()),
        ("stop", format!("{:.6}", result.stop)),
        ("wait_status", result.wait_status.to_string()),
        ("outerr", result.outerr.clone()),
        ("runtime", format!("{:.6}", result.runtime)),
        ("outstd", result.outstd.clone()),
        ("exited_ok", u8::from(result.exited_ok).to_string()),
        ("type", result.job_type.to_string()),
        ("start", format!("{:.6}", result.start)),
    ])
}

/// Encode ordered fields into one frame.
///
/// Values are cut at their first NUL byte: the peer would otherwise read the
/// remainder as a separate field.
pub fn encode_fields<K, I>(fields: I) -> Bytes
where
    K: AsRef<str>,
    I: IntoIterator<Item = (K, String)>,
{
    let mut buf = BytesMut::with_capacity(256);
    for (key, value) in fields {
        buf.put_slice(key.as_ref().as_bytes());
        buf.put_u8(b'=');
        buf.put_slice(until_nul(value.as_bytes()));
        buf.put_u8(0);
    }
    buf.put_slice(&SENTINEL);
    buf.freeze()
}

/// A free-form message (such as a registration line) framed like any other.
pub fn encode_message(text: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(text.len() + 1 + SENTINEL.len());
    buf.put_slice(until_nul(text.as_bytes()));
    buf.put_u8(0);
    buf.put_slice(&SENTINEL);
    buf.freeze()
}

fn until_nul(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(end) => &bytes[..end],
        None => bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(fields: &[&str]) -> Vec<u8> {
        let mut bytes = fields.join("\0").into_bytes();
        bytes.push(0);
        bytes.extend_from_slice(&SENTINEL);
        bytes
    }

    fn split(encoded: &[u8]) -> Vec<String> {
        let body = encoded.strip_suffix(&SENTINEL[..]).expect("no sentinel");
        let body = body.strip_suffix(b"\0").expect("no trailing NUL");
        body.split(|&b| b == 0)
            .map(|f| String::from_utf8(f.to_vec()).unwrap())
            .collect()
    }

    #[test]
    fn decodes_a_job() {
        let job = decode_job(&frame(&[
            "job_id=42",
            "type=0",
            "command=/usr/lib/nagios/plugins/check_load -w 5",
            "timeout=30",
        ]))
        .expect("valid frame");
        assert_eq!(
            job,
            Job {
                job_id: 42,
                job_type: 0,
                command: "/usr/lib/nagios/plugins/check_load -w 5".into(),
                timeout: 30,
            }
        );
    }

    #[test]
    fn field_order_does_not_matter_and_unknown_keys_are_ignored() {
        let job = decode_job(&frame(&[
            "timeout=5",
            "future_flag=yes",
            "command=true",
            "type=7",
            "job_id=1",
        ]))
        .expect("valid frame");
        assert_eq!(job.job_type, 7);
        assert_eq!(job.command, "true");
    }

    #[test]
    fn command_may_contain_equals_signs_and_be_empty() {
        let job = decode_job(&frame(&["job_id=1", "type=0", "command=a=b c=d", "timeout=1"]))
            .unwrap();
        assert_eq!(job.command, "a=b c=d");

        let job = decode_job(&frame(&["job_id=1", "type=0", "command=", "timeout=0"])).unwrap();
        assert_eq!(job.command, "");
        assert_eq!(job.timeout, 0);
    }

    #[test]
    fn last_duplicate_wins() {
        let job = decode_job(&frame(&[
            "job_id=1",
            "job_id=2",
            "type=0",
            "command=x",
            "timeout=1",
        ]))
        .unwrap();
        assert_eq!(job.job_id, 2);
    }

    #[test]
    fn full_width_numbers_pass_through() {
        let job = decode_job(&frame(&[
            "job_id=18446744073709551615",
            "type=4294967296",
            "command=x",
            "timeout=18446744073709551615",
        ]))
        .unwrap();
        assert_eq!(job.job_id, u64::MAX);
        assert_eq!(job.job_type, 1 << 32);
        assert_eq!(job.timeout, u64::MAX);
    }

    #[test]
    fn every_mandatory_key_is_required() {
        let all = ["job_id=1", "type=0", "command=x", "timeout=1"];
        for (skip, key) in ["job_id", "type", "command", "timeout"].into_iter().enumerate() {
            let fields: Vec<&str> = all
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != skip)
                .map(|(_, f)| *f)
                .collect();
            assert_eq!(
                decode_job(&frame(&fields)),
                Err(FrameError::MissingKey(key))
            );
        }
    }

    #[test]
    fn numbers_must_be_unsigned_integers() {
        for bad in ["job_id=-1", "job_id=abc", "job_id=", "job_id=1.5"] {
            let err = decode_job(&frame(&[bad, "type=0", "command=x", "timeout=1"])).unwrap_err();
            assert!(
                matches!(err, FrameError::BadNumber { key: "job_id", .. }),
                "{bad}: {err:?}"
            );
        }
        let err = decode_job(&frame(&["job_id=1", "type=0", "command=x", "timeout=soon"]))
            .unwrap_err();
        assert!(matches!(err, FrameError::BadNumber { key: "timeout", .. }));
    }

    #[test]
    fn sentinel_must_terminate_the_frame() {
        let mut bytes = frame(&["job_id=1", "type=0", "command=x", "timeout=1"]);
        bytes.truncate(bytes.len() - 1);
        assert_eq!(decode_job(&bytes), Err(FrameError::MissingSentinel));

        let mut bytes = b"job_id=1\0".to_vec();
        bytes.extend_from_slice(&SENTINEL);
        bytes.extend_from_slice(&frame(&["type=0", "command=x", "timeout=1"]));
        assert_eq!(decode_job(&bytes), Err(FrameError::MisplacedSentinel(9)));
    }

    #[test]
    fn field_without_equals_is_rejected() {
        let err = decode_job(&frame(&["job_id=1", "garbage", "type=0"])).unwrap_err();
        assert_eq!(err, FrameError::BadField("garbage".into()));
    }

    #[test]
    fn result_fields_come_out_in_protocol_order() {
        let result = JobResult {
            job_id: 42,
            job_type: 0,
            start: 1700000000.25,
            stop: 1700000001.5,
            runtime: 1.25,
            wait_status: 256,
            exited_ok: true,
            outstd: "WARNING - load 6.0".into(),
            outerr: String::new(),
        };
        assert_eq!(
            split(&encode_result(&result)),
            vec![
                "job_id=42",
                "stop=1700000001.500000",
                "wait_status=256",
                "outerr=",
                "runtime=1.250000",
                "outstd=WARNING - load 6.0",
                "exited_ok=1",
                "type=0",
                "start=1700000000.250000",
            ]
        );
    }

    #[test]
    fn result_text_is_cut_at_nul() {
        let result = JobResult {
            job_id: 1,
            job_type: 3,
            start: 0.0,
            stop: 0.0,
            runtime: 0.0,
            wait_status: 768,
            exited_ok: false,
            outstd: "before\0after".into(),
            outerr: "x\0".into(),
        };
        let fields = split(&encode_result(&result));
        assert_eq!(fields[5], "outstd=before");
        assert_eq!(fields[3], "outerr=x");
        assert_eq!(fields[6], "exited_ok=0");
        assert_eq!(fields[7], "type=3");
    }

    #[test]
    fn messages_are_framed() {
        assert_eq!(
            &encode_message("@wproc register name=w;pid=1")[..],
            b"@wproc register name=w;pid=1\0\x01\0\0\0"
        );
    }

    #[test]
    fn sentinel_search() {
        assert_eq!(find_sentinel(b"a=1\0\x01\0\0\0rest"), Some(4));
        assert_eq!(find_sentinel(b"a=1\0\x01\0\0"), None);
    }
}
