// SPDX-License-Identifier: MIT

//! Wire format: 4-byte length prefix (big-endian) + MessagePack payload.
//!
//! The Go original multiplexes its RPC and event connections through
//! `ugorji/go/codec`'s streaming msgpack decoder, which frames nothing
//! itself and instead relies on each value's own msgpack header to know
//! where it ends. `rmp_serde` has no equivalent streaming reader, so every
//! value here gets an explicit length prefix instead — the same shape the
//! daemon's own control protocol uses, just with a different payload codec.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// A single frame's payload may not exceed this many bytes. Generous for
/// an `Event` carrying every node in a service, and small enough that a
/// corrupted length prefix can't be mistaken for a request to allocate
/// gigabytes.
pub const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame of {0} bytes exceeds the {max} byte limit", max = MAX_FRAME_LEN)]
    FrameTooLarge(u32),
    #[error("failed to encode frame: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("failed to decode frame: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("connection closed mid-frame")]
    Eof,
}

impl From<ProtocolError> for receptor_core::TransportError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Io(e) => receptor_core::TransportError::Io(e),
            ProtocolError::Eof => receptor_core::TransportError::Eof,
            other => receptor_core::TransportError::Codec(other.to_string()),
        }
    }
}

/// Encodes `value` as msgpack and writes it length-prefixed to `writer`.
pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = rmp_serde::to_vec_named(value)?;
    let len: u32 = payload
        .len()
        .try_into()
        .map_err(|_| ProtocolError::FrameTooLarge(u32::MAX))?;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one length-prefixed msgpack frame from `reader` and decodes it.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T, ProtocolError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(ProtocolError::Eof),
        Err(e) => return Err(ProtocolError::Io(e)),
    }
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok(rmp_serde::from_slice(&payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        a: u32,
        b: String,
    }

    #[tokio::test]
    async fn round_trips_a_value_through_a_duplex_pipe() {
        let (mut client, mut server) = tokio::io::duplex(256);
        let value = Sample { a: 7, b: "hi".to_string() };
        write_frame(&mut client, &value).await.unwrap();
        let got: Sample = read_frame(&mut server).await.unwrap();
        assert_eq!(got, value);
    }

    #[tokio::test]
    async fn reading_past_a_closed_writer_is_eof() {
        let (client, mut server) = tokio::io::duplex(256);
        drop(client);
        let result: Result<Sample, _> = read_frame(&mut server).await;
        assert!(matches!(result, Err(ProtocolError::Eof)));
    }

    #[tokio::test]
    async fn oversized_length_prefix_is_rejected_before_reading_payload() {
        let (mut client, mut server) = tokio::io::duplex(256);
        client.write_all(&(MAX_FRAME_LEN + 1).to_be_bytes()).await.unwrap();
        let result: Result<Sample, _> = read_frame(&mut server).await;
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge(_))));
    }
}
