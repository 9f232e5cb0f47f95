//! HPACK endpoints
//!
//! Thin glue over the `hpack` crate. The encoder and decoder carry the
//! connection's dynamic tables (RFC 7541), so one [`HeaderCodec`] is shared
//! by every stream of a connection and must only be called from the
//! connection's serialization domain. The stream treats both directions as
//! opaque: ordered name/value pairs in, bytes out, and back.

use crate::error::{Error, Result};
use bytes::Bytes;

/// Stateful HPACK encoder/decoder pair for one connection
pub struct HeaderCodec {
    encoder: ::hpack::Encoder<'static>,
    decoder: ::hpack::Decoder<'static>,
}

impl HeaderCodec {
    /// Create a codec with empty dynamic tables
    pub fn new() -> Self {
        HeaderCodec {
            encoder: ::hpack::Encoder::new(),
            decoder: ::hpack::Decoder::new(),
        }
    }

    /// Encode an ordered header list into a header block fragment
    pub fn encode(&mut self, headers: &[(String, String)]) -> Result<Bytes> {
        let mut block = Vec::new();
        self.encoder
            .encode_into(
                headers.iter().map(|(name, value)| (name.as_bytes(), value.as_bytes())),
                &mut block,
            )
            .map_err(|e| Error::Compression(format!("HPACK encode error: {}", e)))?;

        Ok(Bytes::from(block))
    }

    /// Decode a header block fragment into ordered name/value pairs
    pub fn decode(&mut self, fragment: &[u8]) -> Result<Vec<(String, String)>> {
        let decoded = self
            .decoder
            .decode(fragment)
            .map_err(|e| Error::Compression(format!("HPACK decode error: {:?}", e)))?;

        Ok(decoded
            .into_iter()
            .map(|(name, value)| {
                (
                    String::from_utf8_lossy(&name).to_string(),
                    String::from_utf8_lossy(&value).to_string(),
                )
            })
            .collect())
    }
}

impl Default for HeaderCodec {
    fn default() -> Self {
        Self::new()
    }
}
