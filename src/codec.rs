//! Frame encoding
//!
//! Typed frames in, wire bytes out. Every HTTP/2 frame opens with the same
//! 9-octet header (RFC 7540 Section 4.1): a 24-bit payload length, the type
//! octet, the flag octet, and a 31-bit stream id whose high bit is reserved.
//! The stream layer only encodes; `decode_header` exists for the
//! connection's parser and for tests that pick emitted bytes apart.

use crate::frames::{DataFrame, FrameFlags, FrameType, HeadersFrame, RstStreamFrame};
use bytes::{BufMut, Bytes, BytesMut};

/// Frame header size on the wire
pub const FRAME_HEADER_SIZE: usize = 9;

/// Largest payload a frame header can declare (2^24 - 1)
pub const MAX_FRAME_SIZE: usize = 0x00FF_FFFF;

// High bit of the stream id field is reserved and must stay zero
const STREAM_ID_MASK: u32 = 0x7FFF_FFFF;

/// Frame codec for encoding HTTP/2 frames
pub struct FrameCodec;

impl FrameCodec {
    /// Lay out the 9-octet frame header
    pub fn encode_header(
        frame_type: FrameType,
        flags: FrameFlags,
        stream_id: u32,
        length: usize,
    ) -> [u8; FRAME_HEADER_SIZE] {
        let mut header = [0u8; FRAME_HEADER_SIZE];
        header[..3].copy_from_slice(&(length as u32).to_be_bytes()[1..]);
        header[3] = frame_type.as_u8();
        header[4] = flags.bits();
        header[5..].copy_from_slice(&(stream_id & STREAM_ID_MASK).to_be_bytes());
        header
    }

    /// Read a frame header back.
    ///
    /// The type is `None` for octets RFC 7540 does not define; the caller
    /// still gets the declared length so it can skip the payload.
    pub fn decode_header(
        header: &[u8; FRAME_HEADER_SIZE],
    ) -> (Option<FrameType>, FrameFlags, u32, usize) {
        let length = u32::from_be_bytes([0, header[0], header[1], header[2]]) as usize;
        let stream_id =
            u32::from_be_bytes([header[5], header[6], header[7], header[8]]) & STREAM_ID_MASK;

        (
            FrameType::from_u8(header[3]),
            FrameFlags::from_bits(header[4]),
            stream_id,
            length,
        )
    }

    fn encode(frame_type: FrameType, flags: FrameFlags, stream_id: u32, payload: &[u8]) -> Bytes {
        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload.len());
        buf.put_slice(&Self::encode_header(frame_type, flags, stream_id, payload.len()));
        buf.put_slice(payload);
        buf.freeze()
    }

    /// Encode a DATA frame
    pub fn encode_data_frame(frame: &DataFrame) -> Bytes {
        let flags = if frame.end_stream {
            FrameFlags::END_STREAM
        } else {
            FrameFlags::NONE
        };

        Self::encode(FrameType::Data, flags, frame.stream_id, &frame.data)
    }

    /// Encode a HEADERS frame
    pub fn encode_headers_frame(frame: &HeadersFrame) -> Bytes {
        let mut flags = FrameFlags::NONE;
        if frame.end_stream {
            flags |= FrameFlags::END_STREAM;
        }
        if frame.end_headers {
            flags |= FrameFlags::END_HEADERS;
        }

        Self::encode(FrameType::Headers, flags, frame.stream_id, &frame.header_block)
    }

    /// Encode a RST_STREAM frame; the payload is the 4-octet error code
    pub fn encode_rst_stream_frame(frame: &RstStreamFrame) -> Bytes {
        Self::encode(
            FrameType::RstStream,
            FrameFlags::NONE,
            frame.stream_id,
            &frame.error_code.as_u32().to_be_bytes(),
        )
    }
}
