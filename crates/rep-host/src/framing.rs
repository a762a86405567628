//! Length-prefixed message framing on the control channel.
//!
//! Each frame is a 4-byte little-endian payload length followed by that
//! many bytes of JSON, in both directions.

use rep_core::RepError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest inbound payload accepted.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// One inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Payload(Vec<u8>),
    /// A frame over [`MAX_FRAME_LEN`]. Its bytes have been read and dropped,
    /// so the stream is positioned at the next frame.
    Oversized(usize),
}

/// Read one frame, skipping past payloads that exceed the limit.
///
/// Returns `Ok(None)` at end of stream, including a stream that ends in the
/// middle of a frame.
pub async fn read_inbound<R>(reader: &mut R) -> Result<Option<Inbound>, RepError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        let skipped =
            tokio::io::copy(&mut (&mut *reader).take(len as u64), &mut tokio::io::sink()).await?;
        if skipped < len as u64 {
            tracing::debug!(target: "rep::frame", "Stream ended inside a {} byte frame", len);
            return Ok(None);
        }
        tracing::warn!(target: "rep::frame", "Skipped oversized frame ({} bytes)", len);
        return Ok(Some(Inbound::Oversized(len)));
    }

    let mut payload = vec![0u8; len];
    match reader.read_exact(&mut payload).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            tracing::debug!(target: "rep::frame", "Stream ended inside a {} byte frame", len);
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    }

    tracing::trace!(target: "rep::frame", "Read frame ({} bytes)", len);
    Ok(Some(Inbound::Payload(payload)))
}

/// Read one frame, treating an oversized one as an error.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, RepError>
where
    R: AsyncRead + Unpin,
{
    match read_inbound(reader).await? {
        Some(Inbound::Payload(payload)) => Ok(Some(payload)),
        Some(Inbound::Oversized(len)) => Err(RepError::Frame(format!(
            "frame of {} bytes exceeds limit of {} bytes",
            len, MAX_FRAME_LEN
        ))),
        None => Ok(None),
    }
}

/// Write one frame and flush.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), RepError>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(payload.len())
        .map_err(|_| RepError::Frame(format!("payload of {} bytes too large", payload.len())))?;

    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;

    tracing::trace!(target: "rep::frame", "Wrote frame ({} bytes)", payload.len());
    Ok(())
}
