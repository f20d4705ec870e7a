//! Line Framing
//!
//! One message per `\n`-terminated line with an explicit length limit.
//! Trailing `\r` is tolerated so hand-typed sessions (e.g. `nc`) work.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::constants::FRAME_DELIMITER;
use crate::errors::{ProtocolError, ProtocolResult};

/// Read one frame
///
/// # Returns
/// * `Ok(Some(frame))` - frame contents without the delimiter
/// * `Ok(None)` - the peer closed the stream before sending any byte
///
/// A final unterminated line before end-of-stream is returned as a frame.
///
/// # Errors
/// [`ProtocolError::FrameTooLarge`] once `max_len` bytes arrive without a
/// delimiter.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> ProtocolResult<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let n = (&mut *reader)
        .take(max_len as u64 + 1)
        .read_until(FRAME_DELIMITER, &mut buf)
        .await?;

    if n == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&FRAME_DELIMITER) {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if buf.len() > max_len {
        return Err(ProtocolError::FrameTooLarge { max: max_len });
    }

    Ok(Some(buf))
}

/// Read the next non-blank frame, failing with
/// [`ProtocolError::ConnectionClosed`] at end-of-stream
pub async fn read_message<R>(reader: &mut R, max_len: usize) -> ProtocolResult<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        match read_frame(reader, max_len).await? {
            None => return Err(ProtocolError::ConnectionClosed),
            Some(frame) if frame.iter().all(|b| b.is_ascii_whitespace()) => {
                trace!("Skipping blank frame");
                continue;
            }
            Some(frame) => return Ok(frame),
        }
    }
}

/// Write one frame and flush it
pub async fn write_frame<W>(writer: &mut W, frame: &[u8], max_len: usize) -> ProtocolResult<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    if frame.len() > max_len {
        return Err(ProtocolError::FrameTooLarge { max: max_len });
    }
    if frame.contains(&FRAME_DELIMITER) {
        return Err(ProtocolError::InvalidState("frame contains a line delimiter".into()));
    }

    let mut line = Vec::with_capacity(frame.len() + 1);
    line.extend_from_slice(frame);
    line.push(FRAME_DELIMITER);

    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}
