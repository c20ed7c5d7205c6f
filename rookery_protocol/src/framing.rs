// Length-delimited message framing over TCP.
//
// Wire format: a 4-byte big-endian length prefix followed by that many bytes
// of JSON. `write_frame` / `read_frame` move raw byte payloads;
// `write_json` / `read_json` wrap them with serde_json so callers deal in
// `UserGameCommand` / `ServerMessage` directly.
//
// `MAX_FRAME_SIZE` (1 MB) bounds allocation from a bad length prefix. A full
// game snapshot is a few kilobytes, so anything near the cap is garbage.
//
// A frame whose JSON fails to decode is reported as `FrameError::Json`, and
// the stream stays aligned on the next frame. I/O errors (including EOF)
// surface as `FrameError::Io`; after one the stream should be dropped.

use std::io::{self, Read, Write};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Largest payload accepted in either direction.
pub const MAX_FRAME_SIZE: u32 = 1024 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame of {len} bytes exceeds the {MAX_FRAME_SIZE} byte limit")]
    TooLarge { len: usize },
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
}

impl FrameError {
    /// True if the stream is still usable after this error (the frame was
    /// read whole but its contents were bad).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FrameError::Json(_))
    }
}

/// Write one frame: 4-byte big-endian length, then payload. Flushes.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError> {
    let len = payload.len();
    let Some(len_u32) = u32::try_from(len).ok().filter(|l| *l <= MAX_FRAME_SIZE) else {
        return Err(FrameError::TooLarge { len });
    };
    writer.write_all(&len_u32.to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame. EOF before or inside a frame is an `Io` error with kind
/// `UnexpectedEof`.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>, FrameError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge { len: len as usize });
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Serialize `msg` to JSON and write it as one frame.
pub fn write_json<W: Write, T: Serialize>(writer: &mut W, msg: &T) -> Result<(), FrameError> {
    let json = serde_json::to_vec(msg)?;
    write_frame(writer, &json)
}

/// Read one frame and decode its JSON payload.
pub fn read_json<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<T, FrameError> {
    let bytes = read_frame(reader)?;
    Ok(serde_json::from_slice(&bytes)?)
}
