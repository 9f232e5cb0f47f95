//! Completed responses and the messages that carry them
//!
//! A [`Response`] is assembled from stream state at the terminal transition
//! and published to the owning connection as a [`StreamMessage`]. Headers
//! keep their receive order; HTTP/2 mandates lowercase names on the wire, so
//! lookups are case-sensitive.

use bytes::Bytes;
use std::net::SocketAddr;

use crate::stream::StreamId;

/// A completed response (or push-promise preview) for one stream
#[derive(Debug, Clone)]
pub struct Response {
    /// Stream ID
    pub id: StreamId,
    /// Headers in receive order
    pub headers: Vec<(String, String)>,
    /// Body bytes
    pub body: Bytes,
    /// Value of the `:status` pseudo-header, if present and numeric
    pub status: Option<u16>,
    /// Peer address, if the connection knows it
    pub peername: Option<SocketAddr>,
}

impl Response {
    /// Status code, if any
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// First header value with the given name
    pub fn header(&self, name: &str) -> Option<&str> {
        get_header(&self.headers, name).map(|(_, value)| value.as_str())
    }

    /// Body as bytes
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Find the first header pair with the given name.
///
/// Linear first-match scan; names compare case-sensitively.
pub fn get_header<'a>(
    headers: &'a [(String, String)],
    name: &str,
) -> Option<&'a (String, String)> {
    headers.iter().find(|(n, _)| n == name)
}

/// Result messages a stream publishes to its connection
#[derive(Debug)]
pub enum StreamMessage {
    /// The stream closed normally with a complete response
    Finished(Response),
    /// The server promised a pushed response
    PushPromise(Response),
}
