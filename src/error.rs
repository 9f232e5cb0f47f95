//! Error types for the stream layer
//!
//! This module defines the errors a stream can raise towards its owning
//! connection, plus the wire error codes from RFC 7540 Section 7.

use std::fmt;

/// Stream-layer errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error on the shared transport
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol error detected (RFC 7540 Section 7 - Error code 0x1)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Internal error (RFC 7540 Section 7 - Error code 0x2)
    #[error("Internal error: {0}")]
    Internal(String),

    /// HPACK compression error (RFC 7540 Section 7 - Error code 0x9)
    #[error("Compression error: {0}")]
    Compression(String),

    /// Invalid settings value
    #[error("Invalid settings value: {0}")]
    InvalidSettings(String),
}

/// HTTP/2 error codes as defined in RFC 7540 Section 7
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    /// Graceful shutdown
    NoError = 0x0,
    /// Protocol error detected
    ProtocolError = 0x1,
    /// Implementation fault
    InternalError = 0x2,
    /// Flow-control limits exceeded
    FlowControlError = 0x3,
    /// Settings not acknowledged
    SettingsTimeout = 0x4,
    /// Frame received for closed stream
    StreamClosed = 0x5,
    /// Frame size incorrect
    FrameSizeError = 0x6,
    /// Stream not processed
    RefusedStream = 0x7,
    /// Stream cancelled
    Cancel = 0x8,
    /// Compression state not updated
    CompressionError = 0x9,
    /// TCP connection error for CONNECT method
    ConnectError = 0xa,
    /// Processing capacity exceeded
    EnhanceYourCalm = 0xb,
    /// Negotiated TLS parameters not acceptable
    InadequateSecurity = 0xc,
    /// Use HTTP/1.1 for the request
    Http11Required = 0xd,
}

impl ErrorCode {
    /// Convert error code to u32
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Create error code from u32
    pub fn from_u32(code: u32) -> Option<Self> {
        match code {
            0x0 => Some(ErrorCode::NoError),
            0x1 => Some(ErrorCode::ProtocolError),
            0x2 => Some(ErrorCode::InternalError),
            0x3 => Some(ErrorCode::FlowControlError),
            0x4 => Some(ErrorCode::SettingsTimeout),
            0x5 => Some(ErrorCode::StreamClosed),
            0x6 => Some(ErrorCode::FrameSizeError),
            0x7 => Some(ErrorCode::RefusedStream),
            0x8 => Some(ErrorCode::Cancel),
            0x9 => Some(ErrorCode::CompressionError),
            0xa => Some(ErrorCode::ConnectError),
            0xb => Some(ErrorCode::EnhanceYourCalm),
            0xc => Some(ErrorCode::InadequateSecurity),
            0xd => Some(ErrorCode::Http11Required),
            _ => None,
        }
    }

    /// Get error name
    pub fn name(&self) -> &'static str {
        match self {
            ErrorCode::NoError => "NO_ERROR",
            ErrorCode::ProtocolError => "PROTOCOL_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::FlowControlError => "FLOW_CONTROL_ERROR",
            ErrorCode::SettingsTimeout => "SETTINGS_TIMEOUT",
            ErrorCode::StreamClosed => "STREAM_CLOSED",
            ErrorCode::FrameSizeError => "FRAME_SIZE_ERROR",
            ErrorCode::RefusedStream => "REFUSED_STREAM",
            ErrorCode::Cancel => "CANCEL",
            ErrorCode::CompressionError => "COMPRESSION_ERROR",
            ErrorCode::ConnectError => "CONNECT_ERROR",
            ErrorCode::EnhanceYourCalm => "ENHANCE_YOUR_CALM",
            ErrorCode::InadequateSecurity => "INADEQUATE_SECURITY",
            ErrorCode::Http11Required => "HTTP_1_1_REQUIRED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:x})", self.name(), self.as_u32())
    }
}

/// Result type for stream operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_conversion() {
        assert_eq!(ErrorCode::NoError.as_u32(), 0x0);
        assert_eq!(ErrorCode::CompressionError.as_u32(), 0x9);
        assert_eq!(ErrorCode::Http11Required.as_u32(), 0xd);

        assert_eq!(ErrorCode::from_u32(0x0), Some(ErrorCode::NoError));
        assert_eq!(ErrorCode::from_u32(0x8), Some(ErrorCode::Cancel));
        assert_eq!(ErrorCode::from_u32(0xff), None);
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::NoError.to_string(), "NO_ERROR (0x0)");
        assert_eq!(ErrorCode::Cancel.to_string(), "CANCEL (0x8)");
    }

    #[test]
    fn test_error_display() {
        let err = Error::Protocol("send_headers in state Open".to_string());
        assert_eq!(err.to_string(), "Protocol error: send_headers in state Open");

        let err = Error::Compression("invalid integer".to_string());
        assert_eq!(err.to_string(), "Compression error: invalid integer");
    }
}
