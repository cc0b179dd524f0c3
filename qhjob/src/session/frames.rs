use crate::codec::{find_sentinel, SENTINEL};
use crate::error::{FrameError, Result};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Cuts a byte stream into sentinel-terminated frames.
///
/// One read may carry half a frame or several frames; bytes past the first
/// sentinel stay buffered for the next call.
pub struct FrameReader<R> {
    reader: R,
    buf: BytesMut,
    max_frame_len: usize,
    scanned: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R, max_frame_len: usize) -> Self {
        Self {
            reader,
            buf: BytesMut::with_capacity(4096),
            max_frame_len,
            scanned: 0,
        }
    }

    /// Next complete frame, sentinel included. `Ok(None)` on a clean EOF
    /// between frames. Cancel safe.
    pub async fn next_frame(&mut self) -> Result<Option<Bytes>> {
        loop {
            if let Some(frame) = self.split_frame() {
                return Ok(Some(frame));
            }
            if self.buf.len() >= self.max_frame_len {
                return Err(FrameError::TooLarge(self.max_frame_len).into());
            }
            if self.reader.read_buf(&mut self.buf).await? == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(FrameError::Truncated(self.buf.len()).into());
            }
        }
    }

    fn split_frame(&mut self) -> Option<Bytes> {
        // a sentinel may straddle two reads, so rescan its length minus one
        let from = self.scanned.saturating_sub(SENTINEL.len() - 1);
        match find_sentinel(&self.buf[from..]) {
            Some(offset) => {
                self.scanned = 0;
                Some(self.buf.split_to(from + offset + SENTINEL.len()).freeze())
            }
            None => {
                self.scanned = self.buf.len();
                None
            }
        }
    }
}
