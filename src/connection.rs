//! Connection-side collaborators of a stream
//!
//! The connection owns the TLS socket, the HPACK tables, the SETTINGS
//! exchange and the completion channel; a stream only ever sees the
//! [`ConnectionContext`] view defined here. The context is cloned once per
//! stream and is immutable from the stream's perspective: every shared piece
//! sits behind the connection's own synchronization (a mutex on the write
//! sink and on the HPACK tables, a [`SettingsSync`] handle, an mpsc sender
//! for results).

use crate::error::{Error, Result};
use crate::hpack::HeaderCodec;
use crate::response::StreamMessage;
use crate::settings::SettingsSync;
use bytes::Bytes;
use std::fmt;
use std::io::{self, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Write sink for wire bytes
///
/// Abstracts over the connection's transport. The connection supplies the
/// ordering discipline across streams; a single `write_all` call must land
/// contiguously on the wire.
pub trait Transport {
    /// Write all bytes to the transport
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        Write::write_all(self, buf)?;
        self.flush()
    }
}

/// In-memory sink recording everything written, for tests and benchmarks
impl Transport for Vec<u8> {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.extend_from_slice(buf);
        Ok(())
    }
}

/// Request scheme for the `:scheme` pseudo-header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Scheme {
    /// Cleartext
    Http,
    /// TLS
    #[default]
    Https,
}

impl Scheme {
    /// Scheme as it appears on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable-to-the-stream view of the owning connection
pub struct ConnectionContext<S: Transport> {
    scheme: Scheme,
    authority: String,
    peername: Option<SocketAddr>,
    transport: Arc<Mutex<S>>,
    header_codec: Arc<Mutex<HeaderCodec>>,
    settings: SettingsSync,
    completions: Sender<StreamMessage>,
}

// Manual impl: `S` itself is never cloned, only the handles to it.
impl<S: Transport> Clone for ConnectionContext<S> {
    fn clone(&self) -> Self {
        ConnectionContext {
            scheme: self.scheme,
            authority: self.authority.clone(),
            peername: self.peername,
            transport: Arc::clone(&self.transport),
            header_codec: Arc::clone(&self.header_codec),
            settings: self.settings.clone(),
            completions: self.completions.clone(),
        }
    }
}

impl<S: Transport> ConnectionContext<S> {
    /// Create a context over a transport, returning the receiving end of
    /// the completion channel
    pub fn new(
        scheme: Scheme,
        authority: impl Into<String>,
        transport: S,
    ) -> (Self, Receiver<StreamMessage>) {
        let (completions, results) = std::sync::mpsc::channel();
        let context = ConnectionContext {
            scheme,
            authority: authority.into(),
            peername: None,
            transport: Arc::new(Mutex::new(transport)),
            header_codec: Arc::new(Mutex::new(HeaderCodec::new())),
            settings: SettingsSync::default(),
            completions,
        };

        (context, results)
    }

    /// Attach the peer address reported by the transport
    pub fn with_peername(mut self, peername: SocketAddr) -> Self {
        self.peername = Some(peername);
        self
    }

    /// Replace the peer-settings handle (shared with the connection loop)
    pub fn with_settings(mut self, settings: SettingsSync) -> Self {
        self.settings = settings;
        self
    }

    /// Request scheme
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Authority (host[:port]) for the `:authority` pseudo-header
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Peer address, if known
    pub fn peername(&self) -> Option<SocketAddr> {
        self.peername
    }

    /// Peer-settings handle
    pub fn settings(&self) -> &SettingsSync {
        &self.settings
    }

    /// Shared transport handle
    pub fn transport(&self) -> Arc<Mutex<S>> {
        Arc::clone(&self.transport)
    }

    /// Lock the write sink.
    ///
    /// Held across every frame of one event so the frames land contiguously.
    /// Poisoning is recovered: a panicked writer elsewhere leaves bytes, not
    /// torn invariants, and the connection decides whether to tear down.
    pub(crate) fn lock_transport(&self) -> MutexGuard<'_, S> {
        self.transport.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// HPACK-encode an ordered header list
    pub(crate) fn encode_headers(&self, headers: &[(String, String)]) -> Result<Bytes> {
        self.header_codec
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .encode(headers)
    }

    /// HPACK-decode a header block fragment
    pub(crate) fn decode_fragment(&self, fragment: &[u8]) -> Result<Vec<(String, String)>> {
        self.header_codec
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .decode(fragment)
    }

    /// Publish a result message to the owning connection
    pub(crate) fn publish(&self, message: StreamMessage) -> Result<()> {
        self.completions
            .send(message)
            .map_err(|_| Error::Internal("completion sink disconnected".to_string()))
    }
}
