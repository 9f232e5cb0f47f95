//! HTTP/2 frame types
//!
//! Typed frames for the client stream path, plus the wire-level type and
//! flag octets from RFC 7540 Section 6. Frames reach the stream already
//! demultiplexed by the connection, so nothing here parses raw bytes; the
//! structs carry exactly what the stream needs to react to.

use crate::error::ErrorCode;
use bytes::Bytes;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Wire values for the HTTP/2 frame types.
///
/// The discriminants are the type octets RFC 7540 Section 6 assigns; they
/// are a fixed table, not a design choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    /// Request or response payload bytes
    Data = 0x0,
    /// Opens a stream; carries a header block fragment
    Headers = 0x1,
    /// Sender-advised stream priority
    Priority = 0x2,
    /// Immediate stream termination
    RstStream = 0x3,
    /// Connection configuration exchange
    Settings = 0x4,
    /// Announces a server-initiated stream
    PushPromise = 0x5,
    /// Liveness probe
    Ping = 0x6,
    /// Connection shutdown notice
    Goaway = 0x7,
    /// Flow-control window credit
    WindowUpdate = 0x8,
    /// Remainder of an oversized header block
    Continuation = 0x9,
}

impl FrameType {
    /// The on-wire type octet
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Map a wire octet back to a frame type
    pub fn from_u8(value: u8) -> Option<Self> {
        use FrameType::*;
        Some(match value {
            0x0 => Data,
            0x1 => Headers,
            0x2 => Priority,
            0x3 => RstStream,
            0x4 => Settings,
            0x5 => PushPromise,
            0x6 => Ping,
            0x7 => Goaway,
            0x8 => WindowUpdate,
            0x9 => Continuation,
            _ => return None,
        })
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FrameType::Data => "DATA",
            FrameType::Headers => "HEADERS",
            FrameType::Priority => "PRIORITY",
            FrameType::RstStream => "RST_STREAM",
            FrameType::Settings => "SETTINGS",
            FrameType::PushPromise => "PUSH_PROMISE",
            FrameType::Ping => "PING",
            FrameType::Goaway => "GOAWAY",
            FrameType::WindowUpdate => "WINDOW_UPDATE",
            FrameType::Continuation => "CONTINUATION",
        })
    }
}

/// Frame flag bits.
///
/// Only END_STREAM and END_HEADERS matter to the stream itself; the other
/// constants are listed so the connection's parser can name what it skips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFlags(u8);

impl FrameFlags {
    /// No flags set
    pub const NONE: FrameFlags = FrameFlags(0);
    /// Last frame of the sender's half of the stream (0x1)
    pub const END_STREAM: FrameFlags = FrameFlags(0x1);
    /// Acknowledges SETTINGS or PING (0x1)
    pub const ACK: FrameFlags = FrameFlags(0x1);
    /// Header block complete, no CONTINUATION follows (0x4)
    pub const END_HEADERS: FrameFlags = FrameFlags(0x4);
    /// Payload starts with a pad length and ends with padding (0x8)
    pub const PADDED: FrameFlags = FrameFlags(0x8);
    /// HEADERS carries priority fields (0x20)
    pub const PRIORITY: FrameFlags = FrameFlags(0x20);

    /// Reconstruct flags from the wire octet
    pub fn from_bits(bits: u8) -> FrameFlags {
        FrameFlags(bits)
    }

    /// The wire octet
    pub fn bits(self) -> u8 {
        self.0
    }

    /// True when every bit of `other` is set in `self`
    pub fn contains(self, other: FrameFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for FrameFlags {
    type Output = FrameFlags;

    fn bitor(self, rhs: FrameFlags) -> FrameFlags {
        FrameFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for FrameFlags {
    fn bitor_assign(&mut self, rhs: FrameFlags) {
        self.0 |= rhs.0;
    }
}

/// DATA frame (RFC 7540 Section 6.1)
#[derive(Debug, Clone)]
pub struct DataFrame {
    pub stream_id: u32,
    pub data: Bytes,
    pub end_stream: bool,
}

/// HEADERS frame (RFC 7540 Section 6.2)
#[derive(Debug, Clone)]
pub struct HeadersFrame {
    pub stream_id: u32,
    /// HPACK-encoded fragment
    pub header_block: Bytes,
    pub end_stream: bool,
    pub end_headers: bool,
}

/// CONTINUATION frame (RFC 7540 Section 6.10)
#[derive(Debug, Clone)]
pub struct ContinuationFrame {
    pub stream_id: u32,
    /// HPACK-encoded fragment
    pub header_block: Bytes,
    pub end_headers: bool,
}

/// PUSH_PROMISE frame (RFC 7540 Section 6.6)
#[derive(Debug, Clone)]
pub struct PushPromiseFrame {
    pub stream_id: u32,
    /// Stream the server reserved for the pushed response
    pub promised_stream_id: u32,
    /// HPACK-encoded fragment
    pub header_block: Bytes,
    pub end_headers: bool,
}

/// RST_STREAM frame (RFC 7540 Section 6.4)
#[derive(Debug, Clone, Copy)]
pub struct RstStreamFrame {
    pub stream_id: u32,
    pub error_code: ErrorCode,
}
