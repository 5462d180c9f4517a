//! Framed message codec for the NHACP-style serial link.
//!
//! Messages on the wire are fixed-layout binary records bounded by single
//! marker bytes:
//!
//!   `<som 's'><type><fields...><eom 'e'>`
//!
//! Multi-byte integers are packed little-endian, field by field, with no
//! inter-field padding. There is no checksum and no escaping: a frame is
//! exactly one transport read's worth of bytes, and the decoder performs no
//! scanning, resynchronization, or reassembly across reads. The `len` field
//! is carried literally and is never cross-checked against the number of
//! bytes actually transmitted.

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

/// Start-of-message marker byte.
pub const SOM: u8 = b's';
/// End-of-message marker byte.
pub const EOM: u8 = b'e';

/// Message type: storage get-block request.
pub const MSG_GET_BLOCK: u8 = 0x07;
/// Message type: data buffer response.
pub const MSG_DATA_BUFFER: u8 = 0x84;

/// Payload size carried by every data buffer response.
pub const DATA_BUFFER_PAYLOAD_LEN: usize = 128;
/// Total encoded size of a data buffer response: som + type + len + data + eom.
pub const DATA_BUFFER_FRAME_LEN: usize = 1 + 1 + 2 + DATA_BUFFER_PAYLOAD_LEN + 1;
/// Total encoded size of a get-block request: som + type + index + block + len + eom.
pub const GET_BLOCK_FRAME_LEN: usize = 1 + 1 + 1 + 4 + 2 + 1;

/// Errors that can arise while decoding a received chunk as a frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The chunk was empty (nothing to decode).
    #[error("empty chunk")]
    Empty,

    /// First byte was not the start-of-message marker.
    #[error("bad start marker 0x{0:02x} (expected 0x{SOM:02x})")]
    BadStartMarker(u8),

    /// Last byte was not the end-of-message marker.
    #[error("bad end marker 0x{0:02x} (expected 0x{EOM:02x})")]
    BadEndMarker(u8),

    /// Type byte did not match any known message type.
    #[error("unknown message type 0x{0:02x}")]
    UnknownType(u8),

    /// Chunk length did not match the fixed layout for its type.
    #[error("type 0x{msg_type:02x} frame is {got} bytes, expected {expected}")]
    WrongLength {
        msg_type: u8,
        got: usize,
        expected: usize,
    },
}

/// Storage get-block request: asks the peer for `len` bytes of block `block`
/// on storage slot `index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetBlockRequest {
    pub index: u8,
    pub block: u32,
    pub len: u16,
}

impl GetBlockRequest {
    /// Serialize to the exact wire bytes (always [`GET_BLOCK_FRAME_LEN`]).
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(GET_BLOCK_FRAME_LEN);
        buf.put_u8(SOM);
        buf.put_u8(MSG_GET_BLOCK);
        buf.put_u8(self.index);
        buf.put_u32_le(self.block);
        buf.put_u16_le(self.len);
        buf.put_u8(EOM);
        buf.to_vec()
    }

    /// Decode from a marker-validated chunk. `chunk` must be the whole frame.
    pub fn decode(chunk: &[u8]) -> Result<Self, FrameError> {
        check_markers(chunk)?;
        if chunk.len() != GET_BLOCK_FRAME_LEN {
            return Err(FrameError::WrongLength {
                msg_type: MSG_GET_BLOCK,
                got: chunk.len(),
                expected: GET_BLOCK_FRAME_LEN,
            });
        }
        let mut body = &chunk[2..chunk.len() - 1];
        let index = body.get_u8();
        let block = body.get_u32_le();
        let len = body.get_u16_le();
        Ok(GetBlockRequest { index, block, len })
    }
}

/// Data buffer response: a fixed 128-byte payload plus a `len` field that is
/// copied onto the wire as-is (the reference tools always send 128; the
/// receiver does not validate it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBufferResponse {
    pub len: u16,
    pub data: [u8; DATA_BUFFER_PAYLOAD_LEN],
}

impl DataBufferResponse {
    /// Build a response carrying `data`, with the conventional `len` of 128.
    pub fn new(data: [u8; DATA_BUFFER_PAYLOAD_LEN]) -> Self {
        Self {
            len: DATA_BUFFER_PAYLOAD_LEN as u16,
            data,
        }
    }

    /// Serialize to the exact wire bytes (always [`DATA_BUFFER_FRAME_LEN`]).
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(DATA_BUFFER_FRAME_LEN);
        buf.put_u8(SOM);
        buf.put_u8(MSG_DATA_BUFFER);
        buf.put_u16_le(self.len);
        buf.put_slice(&self.data);
        buf.put_u8(EOM);
        buf.to_vec()
    }

    /// Decode from a marker-validated chunk. `chunk` must be the whole frame.
    pub fn decode(chunk: &[u8]) -> Result<Self, FrameError> {
        check_markers(chunk)?;
        if chunk.len() != DATA_BUFFER_FRAME_LEN {
            return Err(FrameError::WrongLength {
                msg_type: MSG_DATA_BUFFER,
                got: chunk.len(),
                expected: DATA_BUFFER_FRAME_LEN,
            });
        }
        let mut body = &chunk[2..chunk.len() - 1];
        let len = body.get_u16_le();
        let mut data = [0u8; DATA_BUFFER_PAYLOAD_LEN];
        body.copy_to_slice(&mut data);
        Ok(DataBufferResponse { len, data })
    }
}

/// One decoded protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    GetBlock(GetBlockRequest),
    DataBuffer(DataBufferResponse),
}

impl Frame {
    pub fn msg_type(&self) -> u8 {
        match self {
            Frame::GetBlock(_) => MSG_GET_BLOCK,
            Frame::DataBuffer(_) => MSG_DATA_BUFFER,
        }
    }
}

/// Decode one received chunk as one frame.
///
/// The whole chunk is the frame: callers hand in exactly what a single
/// transport read returned. Marker bytes are validated at both ends, the type
/// byte selects the record layout, and the chunk length must match that
/// layout exactly. Nothing else is checked.
pub fn decode(chunk: &[u8]) -> Result<Frame, FrameError> {
    check_markers(chunk)?;
    match chunk[1] {
        MSG_GET_BLOCK => GetBlockRequest::decode(chunk).map(Frame::GetBlock),
        MSG_DATA_BUFFER => DataBufferResponse::decode(chunk).map(Frame::DataBuffer),
        other => Err(FrameError::UnknownType(other)),
    }
}

fn check_markers(chunk: &[u8]) -> Result<(), FrameError> {
    // A 1-byte chunk can't carry both markers; report on the start marker
    // first since that's what a receiver would see.
    if chunk.is_empty() {
        return Err(FrameError::Empty);
    }
    if chunk[0] != SOM {
        return Err(FrameError::BadStartMarker(chunk[0]));
    }
    let last = chunk[chunk.len() - 1];
    if chunk.len() < 2 || last != EOM {
        return Err(FrameError::BadEndMarker(last));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_buffer_encode_is_always_133_bytes() {
        let zeroed = DataBufferResponse::new([0u8; DATA_BUFFER_PAYLOAD_LEN]);
        assert_eq!(zeroed.encode().len(), DATA_BUFFER_FRAME_LEN);

        let patterned = DataBufferResponse::new([0xAA; DATA_BUFFER_PAYLOAD_LEN]);
        assert_eq!(patterned.encode().len(), DATA_BUFFER_FRAME_LEN);
    }

    #[test]
    fn data_buffer_round_trip() {
        let mut data = [0u8; DATA_BUFFER_PAYLOAD_LEN];
        for (i, b) in data.iter_mut().enumerate() {
            *b = i as u8;
        }
        let msg = DataBufferResponse::new(data);
        let wire = msg.encode();

        assert_eq!(wire[0], SOM);
        assert_eq!(wire[1], MSG_DATA_BUFFER);
        assert_eq!(wire[wire.len() - 1], EOM);

        match decode(&wire).expect("decode") {
            Frame::DataBuffer(back) => {
                assert_eq!(back.len, 128);
                assert_eq!(back.data[..], data[..]);
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn get_block_round_trip() {
        let req = GetBlockRequest {
            index: 2,
            block: 0x01020304,
            len: 512,
        };
        let wire = req.encode();
        assert_eq!(wire.len(), GET_BLOCK_FRAME_LEN);
        // Little-endian packing of the block number, directly after som/type/index.
        assert_eq!(&wire[3..7], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(decode(&wire).expect("decode"), Frame::GetBlock(req));
    }

    #[test]
    fn decode_rejects_bad_markers() {
        assert_eq!(decode(&[]), Err(FrameError::Empty));
        assert_eq!(decode(&[b'x', 0x07, b'e']), Err(FrameError::BadStartMarker(b'x')));

        let mut wire = GetBlockRequest {
            index: 0,
            block: 0,
            len: 128,
        }
        .encode();
        let last = wire.len() - 1;
        wire[last] = b'x';
        assert_eq!(decode(&wire), Err(FrameError::BadEndMarker(b'x')));
    }

    #[test]
    fn decode_rejects_unknown_type_and_bad_length() {
        assert_eq!(decode(&[SOM, 0x42, EOM]), Err(FrameError::UnknownType(0x42)));

        // Truncated get-block: markers fine, length wrong.
        let wire = [SOM, MSG_GET_BLOCK, 0x00, 0x00, EOM];
        assert_eq!(
            decode(&wire),
            Err(FrameError::WrongLength {
                msg_type: MSG_GET_BLOCK,
                got: 5,
                expected: GET_BLOCK_FRAME_LEN,
            })
        );
    }

    #[test]
    fn len_field_is_not_cross_checked() {
        // A data buffer whose len field disagrees with the actual payload
        // still round-trips: the field is carried, not enforced.
        let mut msg = DataBufferResponse::new([0u8; DATA_BUFFER_PAYLOAD_LEN]);
        msg.len = 7;
        let wire = msg.encode();
        assert_eq!(wire.len(), DATA_BUFFER_FRAME_LEN);
        match decode(&wire).expect("decode") {
            Frame::DataBuffer(back) => assert_eq!(back.len, 7),
            other => panic!("unexpected frame: {:?}", other),
        }
    }
}
