//! Sideband frames exchanged with the cell program.
//!
//! Format: 4-byte length (u32 LE) + UTF-8 JSON object tagged by `kind`.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

/// Largest frame accepted; anything bigger is treated as corruption.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// A sideband message, in either direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Frame {
    /// Rich content for the front end (child to kernel).
    Display {
        /// MIME type, e.g. `text/html`.
        mime_type: String,
        /// Content; binary types are base64.
        payload: String,
    },

    /// The child wants a line of input (child to kernel).
    InputRequest {
        /// Prompt shown to the user.
        prompt: String,
        /// Whether the reply must not be echoed.
        #[serde(default)]
        masked: bool,
    },

    /// Reply to a masked input request (kernel to child); `None` when refused.
    InputReply {
        /// The user's input.
        payload: Option<String>,
    },

    /// Liveness probe (`ack == false`) or its answer (`ack == true`).
    Heartbeat {
        /// Whether this frame answers a probe.
        #[serde(default)]
        ack: bool,
    },
}

/// Write one frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &Frame) -> Result<()> {
    let body = serde_json::to_vec(frame)
        .map_err(|e| Error::Sideband(format!("failed to encode frame: {e}")))?;
    if body.len() > MAX_FRAME_LEN {
        return Err(Error::Sideband(format!(
            "frame too large: {} bytes",
            body.len()
        )));
    }

    let len = body.len() as u32;
    writer
        .write_all(&len.to_le_bytes())
        .await
        .map_err(|e| Error::Sideband(format!("failed to write frame length: {e}")))?;
    writer
        .write_all(&body)
        .await
        .map_err(|e| Error::Sideband(format!("failed to write frame body: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| Error::Sideband(format!("failed to flush sideband: {e}")))?;
    Ok(())
}

/// Read one frame.
///
/// Returns `Ok(None)` on a clean end of stream at a frame boundary. A stream
/// ending mid-frame, an oversized length or invalid JSON is an error.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Frame>> {
    let mut len_bytes = [0u8; 4];
    let mut filled = 0;
    while filled < len_bytes.len() {
        let n = reader
            .read(&mut len_bytes[filled..])
            .await
            .map_err(|e| Error::Sideband(format!("failed to read frame length: {e}")))?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(Error::Sideband("stream ended inside a frame header".into()));
        }
        filled += n;
    }

    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_FRAME_LEN {
        return Err(Error::Sideband(format!("frame too large: {len} bytes")));
    }

    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| Error::Sideband(format!("failed to read frame body: {e}")))?;

    let frame = serde_json::from_slice(&body)
        .map_err(|e| Error::Sideband(format!("invalid frame: {e}")))?;
    Ok(Some(frame))
}
