use crate::codec::{self, ACK};
use crate::error::{Result, SessionError};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

/// Accepting side: swallow the peer's probe, whatever it says, and answer
/// `OK\0`. Returns `false` if the peer hung up before probing.
pub async fn acknowledge_probe<R, W>(
    reader: &mut R,
    writer: &mut W,
    probe_limit: usize,
) -> Result<bool>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut probe = vec![0u8; probe_limit.max(1)];
    let n = reader.read(&mut probe).await?;
    if n == 0 {
        return Ok(false);
    }
    trace!(probe = %String::from_utf8_lossy(&probe[..n]), "probe received");
    writer.write_all(ACK).await?;
    writer.flush().await?;
    Ok(true)
}

/// Connecting side: announce ourselves to the query handler and wait for its
/// `OK\0`.
pub async fn register<R, W>(reader: &mut R, writer: &mut W, registration: &str) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    writer.write_all(&codec::encode_message(registration)).await?;
    writer.flush().await?;

    let mut reply = [0u8; 3];
    reader.read_exact(&mut reply).await?;
    if &reply != ACK {
        return Err(SessionError::Handshake(format!(
            "expected OK, query handler answered {:?}",
            String::from_utf8_lossy(&reply)
        )));
    }
    Ok(())
}

/// Registration line sent by `register`.
pub fn registration_line(name: &str, pid: u32) -> String {
    format!("@wproc register name={name};pid={pid}")
}
