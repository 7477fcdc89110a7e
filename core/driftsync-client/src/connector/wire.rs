//! Framing for the socket connector.
//!
//! Every frame is `u32 length (BE) || u8 kind || body`. Control frames
//! carry a JSON message; data frames carry a raw payload chunk. File
//! bytes always travel as data frames following a `FileStart` or
//! `PushFile` control frame.

use crate::connector::{ConnectorError, ConnectorResult};
use driftsync_types::{FileData, Metadata};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum frame body size (16 MB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Preferred data chunk size for payload streaming.
pub const CHUNK_SIZE: usize = 64 * 1024;

const KIND_CONTROL: u8 = 0;
const KIND_DATA: u8 = 1;

/// Control messages, either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Client credentials, first frame on the wire.
    Hello { user: String, pass: String },
    /// Server accepts the credentials.
    HelloOk,
    /// Client requests the full metadata snapshot.
    GetMetadata,
    /// Server's snapshot response.
    Metadata { metadata: Metadata },
    /// Client requests a download.
    GetFile { path: String, modified: i64 },
    /// Server announces a payload of `len` wire bytes.
    FileStart { len: u64 },
    /// Client announces an upload of `len` wire bytes.
    PushFile { path: String, modified: i64, len: u64 },
    /// Client records a tombstone.
    DeleteFile { path: String, modified: i64 },
    /// Server acknowledges an upload or delete.
    Ack,
    /// Server-initiated update notification.
    Push { path: String, file_data: FileData },
    /// Either side reports a request failure.
    Error { message: String },
    /// Client farewell before closing the socket.
    Bye,
}

/// A decoded frame: control message or payload chunk.
#[derive(Debug)]
pub enum RawFrame {
    Control(Frame),
    Data(Vec<u8>),
}

/// Writes a control frame.
pub async fn write_control<W: AsyncWrite + Unpin>(
    io: &mut W,
    frame: &Frame,
) -> ConnectorResult<()> {
    let body = serde_json::to_vec(frame)?;
    write_raw(io, KIND_CONTROL, &body).await
}

/// Writes a payload chunk.
pub async fn write_data<W: AsyncWrite + Unpin>(io: &mut W, chunk: &[u8]) -> ConnectorResult<()> {
    write_raw(io, KIND_DATA, chunk).await
}

async fn write_raw<W: AsyncWrite + Unpin>(io: &mut W, kind: u8, body: &[u8]) -> ConnectorResult<()> {
    if body.len() > MAX_FRAME_SIZE {
        return Err(ConnectorError::Protocol(format!(
            "frame too large: {} bytes",
            body.len()
        )));
    }
    io.write_all(&(body.len() as u32).to_be_bytes()).await?;
    io.write_u8(kind).await?;
    io.write_all(body).await?;
    io.flush().await?;
    Ok(())
}

/// Reads the next frame.
pub async fn read_frame<R: AsyncRead + Unpin>(io: &mut R) -> ConnectorResult<RawFrame> {
    let mut len_bytes = [0u8; 4];
    io.read_exact(&mut len_bytes).await?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(ConnectorError::Protocol(format!(
            "frame too large: {len} bytes"
        )));
    }
    let kind = io.read_u8().await?;
    let mut body = vec![0u8; len];
    io.read_exact(&mut body).await?;

    match kind {
        KIND_CONTROL => Ok(RawFrame::Control(serde_json::from_slice(&body)?)),
        KIND_DATA => Ok(RawFrame::Data(body)),
        other => Err(ConnectorError::Protocol(format!(
            "unknown frame kind: {other}"
        ))),
    }
}
