//! Per-stream state machine
//!
//! This module implements the client side of the stream lifecycle from
//! RFC 7540 Section 5.1. Each stream is a single-threaded actor with a
//! mailbox: the connection enqueues inbound frames in wire order, the owner
//! enqueues commands, and the actor processes one event to completion before
//! taking the next. Entry actions are attached to states; a transition may
//! self-post a follow-up event, which lands behind the event being handled.
//!
//! Receive semantics are deliberately permissive: HEADERS and DATA are
//! accepted in every state, header fragments are appended in arrival order
//! and never re-sorted, and pseudo-header placement is left to whoever
//! inspects the finished response.

use crate::codec::FrameCodec;
use crate::connection::{ConnectionContext, Transport};
use crate::error::{Error, ErrorCode, Result};
use crate::frames::{ContinuationFrame, DataFrame, HeadersFrame, PushPromiseFrame, RstStreamFrame};
use crate::response::{get_header, Response, StreamMessage};
use bytes::{Bytes, BytesMut};
use log::{debug, trace, warn};
use std::collections::VecDeque;

/// Stream ID type
pub type StreamId = u32;

/// Stream state as defined in RFC 7540 Section 5.1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Idle: no frames have been sent or received
    Idle,
    /// Reserved (remote): PUSH_PROMISE received
    ReservedRemote,
    /// Open: both sides can send frames
    Open,
    /// Half-closed (local): we can't send, they can
    HalfClosedLocal,
    /// Half-closed (remote): they can't send, we can
    HalfClosedRemote,
    /// Closed: stream is done
    Closed,
}

impl StreamState {
    /// Check if the stream is closed
    pub fn is_closed(&self) -> bool {
        matches!(self, StreamState::Closed)
    }
}

/// Events a stream processes, in mailbox order.
///
/// The frame variants are enqueued by the connection as frames arrive for
/// this stream id; `SendHeaders` comes from the owner; `Close` is internal,
/// self-posted on entry to half-closed (remote).
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// HEADERS frame: header block fragment plus END_STREAM
    Headers {
        /// HPACK-encoded fragment
        fragment: Bytes,
        /// END_STREAM flag
        end_stream: bool,
    },
    /// CONTINUATION frame carrying more of the header block
    Continuation {
        /// HPACK-encoded fragment
        fragment: Bytes,
    },
    /// PUSH_PROMISE frame announcing a pushed response
    PushPromise {
        /// HPACK-encoded fragment
        fragment: Bytes,
    },
    /// DATA frame
    Data {
        /// Payload bytes
        data: Bytes,
        /// END_STREAM flag
        end_stream: bool,
    },
    /// RST_STREAM from the peer (or a local abort routed the same way)
    RstStream {
        /// Error code carried by the frame
        error_code: ErrorCode,
    },
    /// Owner command: send the request head and optional body
    SendHeaders {
        /// Request headers, pseudo-headers included or added here
        headers: Vec<(String, String)>,
        /// Request body; empty means no DATA frames
        payload: Bytes,
    },
    /// Internal command: wind the stream down
    Close,
}

impl StreamEvent {
    /// Event name for logging
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Headers { .. } => "HEADERS",
            StreamEvent::Continuation { .. } => "CONTINUATION",
            StreamEvent::PushPromise { .. } => "PUSH_PROMISE",
            StreamEvent::Data { .. } => "DATA",
            StreamEvent::RstStream { .. } => "RST_STREAM",
            StreamEvent::SendHeaders { .. } => "send_headers",
            StreamEvent::Close => "close",
        }
    }
}

// The connection hands parsed frames straight to `Stream::recv`.

impl From<HeadersFrame> for StreamEvent {
    fn from(frame: HeadersFrame) -> Self {
        StreamEvent::Headers {
            fragment: frame.header_block,
            end_stream: frame.end_stream,
        }
    }
}

impl From<ContinuationFrame> for StreamEvent {
    fn from(frame: ContinuationFrame) -> Self {
        StreamEvent::Continuation {
            fragment: frame.header_block,
        }
    }
}

impl From<PushPromiseFrame> for StreamEvent {
    fn from(frame: PushPromiseFrame) -> Self {
        StreamEvent::PushPromise {
            fragment: frame.header_block,
        }
    }
}

impl From<DataFrame> for StreamEvent {
    fn from(frame: DataFrame) -> Self {
        StreamEvent::Data {
            data: frame.data,
            end_stream: frame.end_stream,
        }
    }
}

impl From<RstStreamFrame> for StreamEvent {
    fn from(frame: RstStreamFrame) -> Self {
        StreamEvent::RstStream {
            error_code: frame.error_code,
        }
    }
}

/// One client-side HTTP/2 stream
pub struct Stream<S: Transport> {
    id: StreamId,
    state: StreamState,
    headers: Vec<(String, String)>,
    body: BytesMut,
    context: ConnectionContext<S>,
    mailbox: VecDeque<StreamEvent>,
    halted: bool,
}

impl<S: Transport> Stream<S> {
    /// Create a stream in `Idle` over the given connection view
    pub fn new(context: ConnectionContext<S>, id: StreamId) -> Self {
        Stream {
            id,
            state: StreamState::Idle,
            headers: Vec::new(),
            body: BytesMut::new(),
            context,
            mailbox: VecDeque::new(),
            halted: false,
        }
    }

    /// Stream ID
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Current state
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Headers accumulated so far, in receive order
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Body accumulated so far
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Enqueue an event (or a parsed frame) and process the mailbox to
    /// quiescence.
    ///
    /// Events delivered after the terminal transition are dropped; the
    /// connection may race a late frame against stream teardown.
    pub fn recv(&mut self, event: impl Into<StreamEvent>) -> Result<()> {
        let event = event.into();
        if self.halted {
            trace!("stream {}: dropping {} after close", self.id, event.name());
            return Ok(());
        }
        self.mailbox.push_back(event);
        self.run_mailbox()
    }

    /// Owner command: send the request head, then the chunked body
    pub fn send_headers(&mut self, headers: Vec<(String, String)>, payload: Bytes) -> Result<()> {
        self.recv(StreamEvent::SendHeaders { headers, payload })
    }

    fn run_mailbox(&mut self) -> Result<()> {
        while let Some(event) = self.mailbox.pop_front() {
            self.dispatch(event)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, event: StreamEvent) -> Result<()> {
        trace!("stream {}: {} in {:?}", self.id, event.name(), self.state);
        match event {
            StreamEvent::Headers { fragment, end_stream } => {
                self.append_fragment(&fragment)?;
                if end_stream {
                    self.transition(StreamState::HalfClosedRemote)?;
                }
                Ok(())
            }
            StreamEvent::Continuation { fragment } => self.append_fragment(&fragment),
            StreamEvent::PushPromise { fragment } => {
                self.append_fragment(&fragment)?;
                let promise = self.snapshot_response();
                debug!("stream {}: push promise received", self.id);
                self.context.publish(StreamMessage::PushPromise(promise))?;
                self.transition(StreamState::ReservedRemote)
            }
            StreamEvent::Data { data, end_stream } => {
                self.body.extend_from_slice(&data);
                if end_stream {
                    self.transition(StreamState::HalfClosedRemote)?;
                }
                Ok(())
            }
            StreamEvent::RstStream { error_code } => {
                self.handle_rst(error_code);
                Ok(())
            }
            StreamEvent::SendHeaders { headers, payload } => {
                self.handle_send_headers(headers, payload)
            }
            StreamEvent::Close => self.transition(StreamState::Closed),
        }
    }

    /// Move to `next` and run its entry action before the next event
    fn transition(&mut self, next: StreamState) -> Result<()> {
        trace!("stream {}: {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
        self.on_enter(next)
    }

    fn on_enter(&mut self, state: StreamState) -> Result<()> {
        match state {
            StreamState::HalfClosedRemote => {
                // The receive side is complete: reset the stream, then wind
                // down via the mailbox so the current event finishes first.
                let frame = RstStreamFrame {
                    stream_id: self.id,
                    error_code: ErrorCode::NoError,
                };
                debug!("stream {}: sending RST_STREAM {}", self.id, frame.error_code);
                let encoded = FrameCodec::encode_rst_stream_frame(&frame);
                self.context.lock_transport().write_all(&encoded)?;
                self.mailbox.push_back(StreamEvent::Close);
                Ok(())
            }
            StreamState::Closed => {
                let response = self.take_response();
                self.halt();
                debug!("stream {}: finished, status {:?}", self.id, response.status);
                self.context.publish(StreamMessage::Finished(response))
            }
            _ => Ok(()),
        }
    }

    /// A peer reset closes silently: no entry action, no publication.
    fn handle_rst(&mut self, error_code: ErrorCode) {
        match self.state {
            StreamState::Open
            | StreamState::HalfClosedLocal
            | StreamState::HalfClosedRemote
            | StreamState::Closed => {
                debug!("stream {}: reset by peer, {}", self.id, error_code);
                self.state = StreamState::Closed;
                self.halt();
            }
            _ => warn!(
                "stream {}: RST_STREAM ignored in state {:?}",
                self.id, self.state
            ),
        }
    }

    fn halt(&mut self) {
        self.halted = true;
        self.mailbox.clear();
    }

    /// Decode a header block fragment and append the pairs in order.
    ///
    /// A decode failure poisons the connection's HPACK state, so the stream
    /// aborts without publishing and hands the error to the connection.
    fn append_fragment(&mut self, fragment: &[u8]) -> Result<()> {
        let decoded = match self.context.decode_fragment(fragment) {
            Ok(pairs) => pairs,
            Err(e) => {
                warn!("stream {}: {}", self.id, e);
                self.state = StreamState::Closed;
                self.halt();
                return Err(e);
            }
        };
        self.headers.extend(decoded);
        Ok(())
    }

    fn handle_send_headers(
        &mut self,
        mut headers: Vec<(String, String)>,
        payload: Bytes,
    ) -> Result<()> {
        if self.state != StreamState::Idle {
            return Err(Error::Protocol(format!(
                "send_headers on stream {} in state {:?}",
                self.id, self.state
            )));
        }

        headers.push((":scheme".to_string(), self.context.scheme().to_string()));
        headers.push((":authority".to_string(), self.context.authority().to_string()));
        // ':' (0x3a) sorts before any letter, so the stable sort puts the
        // pseudo-headers first as RFC 7540 Section 8.1.2.1 requires
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        let block = self.context.encode_headers(&headers)?;
        let max_frame_size = self.context.settings().fetch().max_frame_size as usize;

        debug!(
            "stream {}: sending HEADERS ({} header bytes, {} body bytes)",
            self.id,
            block.len(),
            payload.len()
        );

        // One lock for the whole command keeps the frames contiguous on the
        // wire; interleaving with other streams is only allowed between
        // events.
        let mut sink = self.context.lock_transport();

        // END_STREAM stays clear on HEADERS even for a bodyless request;
        // the receive side ends the exchange.
        let headers_frame = HeadersFrame {
            stream_id: self.id,
            header_block: block,
            end_stream: false,
            end_headers: true,
        };
        sink.write_all(&FrameCodec::encode_headers_frame(&headers_frame))?;

        if !payload.is_empty() {
            let chunk_count = (payload.len() + max_frame_size - 1) / max_frame_size;
            for (i, chunk) in payload.chunks(max_frame_size).enumerate() {
                let frame = DataFrame {
                    stream_id: self.id,
                    data: payload.slice_ref(chunk),
                    end_stream: i + 1 == chunk_count,
                };
                sink.write_all(&FrameCodec::encode_data_frame(&frame))?;
            }
        }
        drop(sink);

        self.transition(StreamState::Open)
    }

    /// Build the terminal response, consuming the accumulated state
    fn take_response(&mut self) -> Response {
        let headers = std::mem::take(&mut self.headers);
        let status = parse_status(&headers);
        Response {
            id: self.id,
            headers,
            body: self.body.split().freeze(),
            status,
            peername: self.context.peername(),
        }
    }

    /// Build a response view without consuming stream state (push promises)
    fn snapshot_response(&self) -> Response {
        Response {
            id: self.id,
            headers: self.headers.clone(),
            body: self.body.clone().freeze(),
            status: parse_status(&self.headers),
            peername: self.context.peername(),
        }
    }
}

fn parse_status(headers: &[(String, String)]) -> Option<u16> {
    get_header(headers, ":status").and_then(|(_, value)| value.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FRAME_HEADER_SIZE;
    use crate::connection::Scheme;
    use crate::frames::{FrameFlags, FrameType};
    use crate::hpack::HeaderCodec;
    use std::sync::mpsc::Receiver;

    fn test_stream(id: StreamId) -> (Stream<Vec<u8>>, Receiver<StreamMessage>) {
        let (context, results) = ConnectionContext::new(Scheme::Https, "example.com", Vec::new());
        (Stream::new(context, id), results)
    }

    /// Peer-side HPACK encoder for crafting inbound fragments
    fn encode_fragment(pairs: &[(&str, &str)]) -> Bytes {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect();
        HeaderCodec::new().encode(&pairs).unwrap()
    }

    fn written_frames(stream: &Stream<Vec<u8>>) -> Vec<(FrameType, u8, u32, Vec<u8>)> {
        let buf = stream.context.lock_transport().clone();
        let mut frames = Vec::new();
        let mut pos = 0;
        while pos < buf.len() {
            let header: [u8; FRAME_HEADER_SIZE] =
                buf[pos..pos + FRAME_HEADER_SIZE].try_into().unwrap();
            let (frame_type, flags, stream_id, length) = FrameCodec::decode_header(&header);
            pos += FRAME_HEADER_SIZE;
            frames.push((
                frame_type.expect("defined frame type"),
                flags.bits(),
                stream_id,
                buf[pos..pos + length].to_vec(),
            ));
            pos += length;
        }
        frames
    }

    #[test]
    fn test_send_headers_opens_stream() {
        let (mut stream, _results) = test_stream(1);
        assert_eq!(stream.state(), StreamState::Idle);

        stream
            .send_headers(
                vec![("content-type".to_string(), "text/plain".to_string())],
                Bytes::new(),
            )
            .unwrap();

        assert_eq!(stream.state(), StreamState::Open);

        let frames = written_frames(&stream);
        assert_eq!(frames.len(), 1);
        let (frame_type, flags, stream_id, _) = &frames[0];
        assert_eq!(*frame_type, FrameType::Headers);
        // END_HEADERS only; END_STREAM is never set on HEADERS
        assert_eq!(*flags, FrameFlags::END_HEADERS.bits());
        assert_eq!(*stream_id, 1);
    }

    #[test]
    fn test_send_headers_rejected_outside_idle() {
        let (mut stream, _results) = test_stream(1);
        stream.send_headers(Vec::new(), Bytes::new()).unwrap();

        let err = stream
            .send_headers(Vec::new(), Bytes::new())
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_end_stream_resets_and_finishes() {
        let (mut stream, results) = test_stream(1);

        let fragment = encode_fragment(&[(":status", "200")]);
        stream
            .recv(StreamEvent::Headers { fragment, end_stream: false })
            .unwrap();
        assert_eq!(stream.state(), StreamState::Idle);

        stream
            .recv(StreamEvent::Data { data: Bytes::from("hello"), end_stream: true })
            .unwrap();

        assert_eq!(stream.state(), StreamState::Closed);

        let frames = written_frames(&stream);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].0, FrameType::RstStream);

        match results.try_recv().unwrap() {
            StreamMessage::Finished(response) => {
                assert_eq!(response.status, Some(200));
                assert_eq!(response.body(), b"hello");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_zero_length_data_honors_end_stream() {
        let (mut stream, results) = test_stream(1);

        stream
            .recv(StreamEvent::Data { data: Bytes::new(), end_stream: true })
            .unwrap();

        assert_eq!(stream.state(), StreamState::Closed);
        match results.try_recv().unwrap() {
            StreamMessage::Finished(response) => assert!(response.body().is_empty()),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_peer_reset_closes_silently() {
        let (mut stream, results) = test_stream(1);
        stream.send_headers(Vec::new(), Bytes::new()).unwrap();
        let frames_before = written_frames(&stream).len();

        stream
            .recv(StreamEvent::RstStream { error_code: ErrorCode::Cancel })
            .unwrap();

        assert_eq!(stream.state(), StreamState::Closed);
        // No RST_STREAM of our own, no completion message
        assert_eq!(written_frames(&stream).len(), frames_before);
        assert!(results.try_recv().is_err());
    }

    #[test]
    fn test_reset_in_idle_is_ignored() {
        let (mut stream, _results) = test_stream(1);
        stream
            .recv(StreamEvent::RstStream { error_code: ErrorCode::Cancel })
            .unwrap();
        assert_eq!(stream.state(), StreamState::Idle);
    }

    #[test]
    fn test_events_dropped_after_close() {
        let (mut stream, results) = test_stream(1);
        stream
            .recv(StreamEvent::Data { data: Bytes::from("x"), end_stream: true })
            .unwrap();
        assert_eq!(stream.state(), StreamState::Closed);
        results.try_recv().unwrap();

        // A late frame neither errors nor publishes again
        stream
            .recv(StreamEvent::Data { data: Bytes::from("y"), end_stream: true })
            .unwrap();
        assert!(results.try_recv().is_err());
    }

    #[test]
    fn test_headers_accumulate_across_continuation() {
        let (mut stream, _results) = test_stream(1);

        let first = encode_fragment(&[(":status", "200")]);
        let second = encode_fragment(&[("x-trace", "abc")]);

        stream
            .recv(StreamEvent::Headers { fragment: first, end_stream: false })
            .unwrap();
        stream
            .recv(StreamEvent::Continuation { fragment: second })
            .unwrap();

        assert_eq!(stream.state(), StreamState::Idle);
        assert_eq!(
            stream.headers(),
            &[
                (":status".to_string(), "200".to_string()),
                ("x-trace".to_string(), "abc".to_string()),
            ]
        );
    }

    #[test]
    fn test_hpack_error_aborts_without_publishing() {
        let (mut stream, results) = test_stream(1);

        // Truncated literal: opens a field, ends before the name
        let err = stream
            .recv(StreamEvent::Headers { fragment: Bytes::from_static(&[0x40]), end_stream: false })
            .unwrap_err();

        assert!(matches!(err, Error::Compression(_)));
        assert_eq!(stream.state(), StreamState::Closed);
        assert!(results.try_recv().is_err());
    }

    #[test]
    fn test_recv_accepts_parsed_frames() {
        let (mut stream, results) = test_stream(1);

        let headers = HeadersFrame {
            stream_id: 1,
            header_block: encode_fragment(&[(":status", "204")]),
            end_stream: false,
            end_headers: true,
        };
        stream.recv(headers).unwrap();

        let data = DataFrame {
            stream_id: 1,
            data: Bytes::new(),
            end_stream: true,
        };
        stream.recv(data).unwrap();

        match results.try_recv().unwrap() {
            StreamMessage::Finished(response) => assert_eq!(response.status, Some(204)),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_frame_event_conversion() {
        let event: StreamEvent = ContinuationFrame {
            stream_id: 1,
            header_block: Bytes::new(),
            end_headers: true,
        }
        .into();
        assert_eq!(event.name(), "CONTINUATION");

        let event: StreamEvent = PushPromiseFrame {
            stream_id: 1,
            promised_stream_id: 2,
            header_block: Bytes::new(),
            end_headers: true,
        }
        .into();
        assert_eq!(event.name(), "PUSH_PROMISE");

        let event: StreamEvent = RstStreamFrame {
            stream_id: 1,
            error_code: ErrorCode::Cancel,
        }
        .into();
        assert_eq!(event.name(), "RST_STREAM");
    }

    #[test]
    fn test_push_promise_publishes_and_reserves() {
        let (mut stream, results) = test_stream(1);

        let fragment = encode_fragment(&[(":method", "GET"), (":path", "/a")]);
        stream.recv(StreamEvent::PushPromise { fragment }).unwrap();

        assert_eq!(stream.state(), StreamState::ReservedRemote);
        match results.try_recv().unwrap() {
            StreamMessage::PushPromise(promise) => {
                assert_eq!(promise.status, None);
                assert!(promise.body().is_empty());
                assert_eq!(promise.header(":path"), Some("/a"));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
