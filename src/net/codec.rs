// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Fixed frame header: data length then message id, both LE32.
pub const HEADER_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum CodecError {
    /// The peer closed the stream cleanly, on a frame boundary.
    #[error("connection closed by peer")]
    Eof,
    /// The stream ended inside a header: some bytes arrived, the rest
    /// never did. Connection-fatal and surfaced, unlike a clean close.
    #[error("short frame header: read {read} of 8 bytes before close")]
    InvalidFrame { read: usize },
    /// Body length exceeds the configured packet limit; connection-fatal.
    #[error("frame body of {data_len} bytes exceeds limit of {max}")]
    FrameTooLarge { data_len: u32, max: u32 },
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

/// One routed message: a numeric id and an opaque body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: u32,
    data: Bytes,
}

impl Message {
    pub fn new(id: u32, data: impl Into<Bytes>) -> Self {
        Self {
            id,
            data: data.into(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn data_len(&self) -> u32 {
        self.data.len() as u32
    }
}

/// Parsed frame header. The body has not been read yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub data_len: u32,
    pub id: u32,
}

/// Encodes a message into its wire form `LE32(data_len) | LE32(id) | data`.
pub fn pack(msg: &Message) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + msg.data.len());
    buf.put_u32_le(msg.data_len());
    buf.put_u32_le(msg.id);
    buf.put_slice(&msg.data);
    buf.freeze()
}

pub fn decode_header(raw: &[u8; HEADER_LEN]) -> FrameHeader {
    FrameHeader {
        data_len: u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
        id: u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
    }
}

/// Reads exactly the 8-byte header and validates the body length against
/// `max_packet_size`. The body is deliberately not consumed: the caller
/// reads it into storage it owns, which bounds the allocation per frame
/// and lets transport buffers be released at a clear boundary.
///
/// A close before the first header byte is a clean `Eof`; a close with
/// the header only partly read is an `InvalidFrame`. The read is done in
/// a loop so the byte count survives to make that distinction.
pub async fn read_header<R>(
    reader: &mut R,
    max_packet_size: u32,
) -> Result<FrameHeader, CodecError>
where
    R: AsyncRead + Unpin,
{
    let mut raw = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        let n = reader.read(&mut raw[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Err(CodecError::Eof);
            }
            return Err(CodecError::InvalidFrame { read: filled });
        }
        filled += n;
    }

    let header = decode_header(&raw);
    if header.data_len > max_packet_size {
        return Err(CodecError::FrameTooLarge {
            data_len: header.data_len,
            max: max_packet_size,
        });
    }

    Ok(header)
}
