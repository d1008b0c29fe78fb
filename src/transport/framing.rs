//! Multipart message framing over a byte stream.
//!
//! `u32` little-endian frame count, then for each frame a `u32` little-endian
//! length followed by that many bytes.

use crate::transport::codec::{Frame, MultipartMessage, WireError};
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on frames per message; both encodings use at most four
pub const MAX_FRAMES: u32 = 16;

/// Initial buffer for a frame; larger frames grow as bytes arrive
const INITIAL_FRAME_CAPACITY: usize = 64 * 1024;

pub async fn write_message<W>(writer: &mut W, message: &[Frame]) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    let count = u32::try_from(message.len()).map_err(|_| WireError::TooManyFrames {
        found: u32::MAX,
        limit: MAX_FRAMES,
    })?;

    let mut buf = Vec::with_capacity(4 + message.iter().map(|f| f.len() + 4).sum::<usize>());
    buf.extend_from_slice(&count.to_le_bytes());
    for frame in message {
        let len = u32::try_from(frame.len()).map_err(|_| WireError::FrameTooLarge {
            size: frame.len(),
            limit: u32::MAX as usize,
        })?;
        buf.extend_from_slice(&len.to_le_bytes());
        buf.extend_from_slice(frame);
    }

    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one message.
///
/// Returns `Ok(None)` when the peer closes the stream before a new message
/// starts. A close part-way through a message is [`WireError::Incomplete`].
pub async fn read_message<R>(reader: &mut R, max_frame_bytes: usize) -> Result<Option<MultipartMessage>, WireError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        match reader.read(&mut header[filled..]).await? {
            0 if filled == 0 => return Ok(None),
            0 => return Err(WireError::Incomplete),
            n => filled += n,
        }
    }

    let count = u32::from_le_bytes(header);
    if count > MAX_FRAMES {
        return Err(WireError::TooManyFrames {
            found: count,
            limit: MAX_FRAMES,
        });
    }

    let mut message = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let len = reader.read_u32_le().await.map_err(incomplete)? as usize;
        if len > max_frame_bytes {
            return Err(WireError::FrameTooLarge {
                size: len,
                limit: max_frame_bytes,
            });
        }

        let mut frame = Vec::with_capacity(len.min(INITIAL_FRAME_CAPACITY));
        (&mut *reader).take(len as u64).read_to_end(&mut frame).await?;
        if frame.len() < len {
            return Err(WireError::Incomplete);
        }
        message.push(frame);
    }

    Ok(Some(message))
}

fn incomplete(e: std::io::Error) -> WireError {
    if e.kind() == ErrorKind::UnexpectedEof {
        WireError::Incomplete
    } else {
        WireError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let message = vec![b"Flange".to_vec(), vec![], vec![1, 2, 3]];

        write_message(&mut client, &message).await.unwrap();
        let received = read_message(&mut server, 1024).await.unwrap();
        assert_eq!(received, Some(message));
    }

    #[tokio::test]
    async fn test_clean_close_is_none() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);
        assert!(read_message(&mut server, 64).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_close_mid_message_is_incomplete() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&5u32.to_le_bytes());
        bytes.extend_from_slice(b"abc");

        let mut reader = bytes.as_slice();
        assert!(matches!(
            read_message(&mut reader, 64).await,
            Err(WireError::Incomplete)
        ));
    }

    #[tokio::test]
    async fn test_close_inside_header_is_incomplete() {
        let bytes = [2u8, 0];
        let mut reader = &bytes[..];
        assert!(matches!(
            read_message(&mut reader, 64).await,
            Err(WireError::Incomplete)
        ));
    }

    #[tokio::test]
    async fn test_large_frame_arrives_in_pieces() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let message = vec![vec![7u8; 3 * INITIAL_FRAME_CAPACITY + 5]];

        let writer = tokio::spawn(async move {
            write_message(&mut client, &message).await.unwrap();
            message
        });
        let received = read_message(&mut server, 4 * INITIAL_FRAME_CAPACITY).await.unwrap();
        assert_eq!(received, Some(writer.await.unwrap()));
    }

    #[tokio::test]
    async fn test_declared_length_beyond_data_is_incomplete() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&(1u32 << 30).to_le_bytes());
        bytes.extend_from_slice(b"short");

        let mut reader = bytes.as_slice();
        assert!(matches!(
            read_message(&mut reader, usize::MAX).await,
            Err(WireError::Incomplete)
        ));
    }

    #[tokio::test]
    async fn test_oversized_frame_is_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&100u32.to_le_bytes());

        let mut reader = bytes.as_slice();
        assert!(matches!(
            read_message(&mut reader, 10).await,
            Err(WireError::FrameTooLarge { size: 100, limit: 10 })
        ));
    }

    #[tokio::test]
    async fn test_frame_count_cap() {
        let bytes = 1000u32.to_le_bytes();
        let mut reader = &bytes[..];
        assert!(matches!(
            read_message(&mut reader, 10).await,
            Err(WireError::TooManyFrames { found: 1000, .. })
        ));
    }
}
