//! Client-side HTTP/2 stream layer
//!
//! This crate implements the per-stream state machine of an HTTP/2 client:
//! the lifecycle from RFC 7540 Section 5.1, header-block accumulation across
//! HEADERS/CONTINUATION/PUSH_PROMISE, body accumulation across DATA frames,
//! and chunked request transmission under the peer's
//! SETTINGS_MAX_FRAME_SIZE. Completed responses and push promises are
//! published to the owning connection over a completion channel.
//!
//! The connection-level machinery is out of scope and appears only as
//! interfaces: a [`Transport`] write sink, an HPACK encoder/decoder pair
//! ([`hpack::HeaderCodec`]), a peer-settings handle
//! ([`settings::SettingsSync`]) and the completion channel, all bundled in a
//! [`ConnectionContext`]. The connection parses inbound bytes, demultiplexes
//! by stream id and feeds each stream its [`StreamEvent`]s in wire order.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use h2wire::hpack::HeaderCodec;
//! use h2wire::{ConnectionContext, Scheme, Stream, StreamEvent, StreamMessage};
//!
//! fn main() -> h2wire::Result<()> {
//!     // The in-memory Vec<u8> transport stands in for the TLS socket.
//!     let (context, results) =
//!         ConnectionContext::new(Scheme::Https, "example.com", Vec::<u8>::new());
//!     let mut stream = Stream::new(context, 1);
//!
//!     // Send the request head; a nonempty body would follow as DATA frames
//!     // chunked at the peer's max frame size.
//!     stream.send_headers(
//!         vec![
//!             (":method".to_string(), "GET".to_string()),
//!             (":path".to_string(), "/".to_string()),
//!         ],
//!         Bytes::new(),
//!     )?;
//!
//!     // The connection decodes inbound frames and routes them here.
//!     let mut peer = HeaderCodec::new();
//!     let fragment = peer.encode(&[(":status".to_string(), "200".to_string())])?;
//!     stream.recv(StreamEvent::Headers { fragment, end_stream: false })?;
//!     stream.recv(StreamEvent::Data { data: Bytes::from("hello"), end_stream: true })?;
//!
//!     match results.try_recv() {
//!         Ok(StreamMessage::Finished(response)) => {
//!             assert_eq!(response.status, Some(200));
//!             assert_eq!(response.body(), b"hello");
//!         }
//!         _ => unreachable!(),
//!     }
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod connection;
pub mod error;
pub mod frames;
pub mod hpack;
pub mod response;
pub mod settings;
pub mod stream;

pub use connection::{ConnectionContext, Scheme, Transport};
pub use error::{Error, ErrorCode, Result};
pub use frames::{
    ContinuationFrame, DataFrame, FrameFlags, FrameType, HeadersFrame, PushPromiseFrame,
    RstStreamFrame,
};
pub use response::{get_header, Response, StreamMessage};
pub use settings::{Settings, SettingsSync};
pub use stream::{Stream, StreamEvent, StreamId, StreamState};

/// Default initial window size (65535 bytes)
pub const DEFAULT_INITIAL_WINDOW_SIZE: u32 = 65535;

/// Default maximum frame size (16384 bytes)
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16384;

/// Default header table size (4096 bytes)
pub const DEFAULT_HEADER_TABLE_SIZE: u32 = 4096;

/// Maximum stream ID value (2^31 - 1)
pub const MAX_STREAM_ID: u32 = 0x7FFF_FFFF;

/// Stream ID 0 (connection-level)
pub const CONNECTION_STREAM_ID: u32 = 0;
