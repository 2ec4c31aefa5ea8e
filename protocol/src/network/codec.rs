//! # Frame Codec
//!
//! Every message on the wire is one frame:
//!
//! ```text
//! +----------------+---------------------------+
//! | length (u32 BE)| JSON payload (length bytes)|
//! +----------------+---------------------------+
//! ```
//!
//! The sync half works on a [`BytesMut`] buffer and is what tests and
//! benches poke at. The async half reads and writes frames on any tokio
//! stream. Both refuse lengths above [`MAX_FRAME_LEN`] before allocating.

use bytes::{Buf, BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::MAX_FRAME_LEN;

const LEN_PREFIX: usize = 4;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("malformed frame payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

fn check_len(len: usize) -> Result<(), CodecError> {
    if len > MAX_FRAME_LEN {
        return Err(CodecError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Buffer codec
// ---------------------------------------------------------------------------

/// Append `message` to `dst` as one frame.
pub fn encode_frame<T: Serialize>(message: &T, dst: &mut BytesMut) -> Result<(), CodecError> {
    let payload = serde_json::to_vec(message)?;
    check_len(payload.len())?;
    dst.reserve(LEN_PREFIX + payload.len());
    dst.put_u32(payload.len() as u32);
    dst.put_slice(&payload);
    Ok(())
}

/// Take one frame off the front of `src`.
///
/// `Ok(None)` means the buffer does not hold a whole frame yet; nothing is
/// consumed in that case.
pub fn decode_frame<T: DeserializeOwned>(src: &mut BytesMut) -> Result<Option<T>, CodecError> {
    if src.len() < LEN_PREFIX {
        return Ok(None);
    }
    let len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
    check_len(len)?;
    if src.len() < LEN_PREFIX + len {
        src.reserve(LEN_PREFIX + len - src.len());
        return Ok(None);
    }
    src.advance(LEN_PREFIX);
    let payload = src.split_to(len);
    Ok(Some(serde_json::from_slice(&payload)?))
}

// ---------------------------------------------------------------------------
// Stream codec
// ---------------------------------------------------------------------------

/// Read one raw frame payload. `Ok(None)` on a clean end of stream, i.e.
/// the peer closed between frames.
pub async fn read_frame_bytes<R>(reader: &mut R) -> Result<Option<Vec<u8>>, CodecError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; LEN_PREFIX];
    let mut filled = 0;
    while filled < LEN_PREFIX {
        let n = reader.read(&mut prefix[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        filled += n;
    }

    let len = u32::from_be_bytes(prefix) as usize;
    check_len(len)?;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

/// Write one raw frame payload and flush.
pub async fn write_frame_bytes<W>(writer: &mut W, payload: &[u8]) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    check_len(payload.len())?;
    writer.write_u32(payload.len() as u32).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read and parse one frame. `Ok(None)` on a clean end of stream.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>, CodecError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    match read_frame_bytes(reader).await? {
        Some(payload) => Ok(Some(serde_json::from_slice(&payload)?)),
        None => Ok(None),
    }
}

/// Serialize `message` and write it as one frame.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = serde_json::to_vec(message)?;
    write_frame_bytes(writer, &payload).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Ping {
        sender: String,
        n: u32,
    }

    fn ping(n: u32) -> Ping {
        Ping {
            sender: "alice".into(),
            n,
        }
    }

    #[test]
    fn prefix_is_big_endian_payload_length() {
        let mut buf = BytesMut::new();
        encode_frame(&ping(1), &mut buf).unwrap();
        let payload = serde_json::to_vec(&ping(1)).unwrap();
        assert_eq!(&buf[..4], &(payload.len() as u32).to_be_bytes());
        assert_eq!(&buf[4..], &payload[..]);
    }

    #[test]
    fn partial_frames_wait_for_more_bytes() {
        let mut full = BytesMut::new();
        encode_frame(&ping(7), &mut full).unwrap();

        let mut buf = BytesMut::from(&full[..3]);
        assert!(decode_frame::<Ping>(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&full[3..full.len() - 1]);
        assert!(decode_frame::<Ping>(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&full[full.len() - 1..]);
        assert_eq!(decode_frame::<Ping>(&mut buf).unwrap(), Some(ping(7)));
        assert!(buf.is_empty());
    }

    #[test]
    fn back_to_back_frames() {
        let mut buf = BytesMut::new();
        encode_frame(&ping(1), &mut buf).unwrap();
        encode_frame(&ping(2), &mut buf).unwrap();
        assert_eq!(decode_frame::<Ping>(&mut buf).unwrap(), Some(ping(1)));
        assert_eq!(decode_frame::<Ping>(&mut buf).unwrap(), Some(ping(2)));
        assert_eq!(decode_frame::<Ping>(&mut buf).unwrap(), None);
    }

    #[test]
    fn oversized_length_is_refused() {
        let mut buf = BytesMut::new();
        buf.put_u32(u32::MAX);
        assert!(matches!(
            decode_frame::<Ping>(&mut buf),
            Err(CodecError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn bad_json_is_an_error() {
        let mut buf = BytesMut::new();
        buf.put_u32(3);
        buf.put_slice(b"{x}");
        assert!(matches!(decode_frame::<Ping>(&mut buf), Err(CodecError::Json(_))));
    }

    #[tokio::test]
    async fn stream_round_trip_and_clean_eof() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        write_frame(&mut client, &ping(3)).await.unwrap();
        write_frame(&mut client, &ping(4)).await.unwrap();
        drop(client);

        assert_eq!(read_frame::<_, Ping>(&mut server).await.unwrap(), Some(ping(3)));
        assert_eq!(read_frame::<_, Ping>(&mut server).await.unwrap(), Some(ping(4)));
        assert_eq!(read_frame::<_, Ping>(&mut server).await.unwrap(), None);
    }

    #[tokio::test]
    async fn truncated_prefix_is_an_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&[0, 0]).await.unwrap();
        drop(client);
        assert!(matches!(
            read_frame_bytes(&mut server).await,
            Err(CodecError::Io(_))
        ));
    }
}
