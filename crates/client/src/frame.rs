//! JSON message framer -- byte-level state machine over the socket stream.
//!
//! The control server writes one JSON object per message, with or without a
//! trailing newline, and several messages may arrive in one read. Frames are
//! found by tracking brace/bracket depth while skipping over string
//! literals, so no delimiter is required.

use std::io::{Read, Write};

use crate::ConnectionError;

/// Internal state of the frame scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Between messages; only whitespace is allowed.
    Idle,
    /// Inside a message body.
    Body,
    /// Inside a string literal.
    Str,
    /// Just after a backslash inside a string literal.
    Escape,
}

/// Incremental splitter of a byte stream into JSON documents.
///
/// Bytes are pushed in whatever chunks the transport delivers; complete
/// documents are popped with [`FrameDecoder::next_frame`]. Leftover bytes
/// belonging to the next document are kept.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    scanned: usize,
    start: usize,
    depth: usize,
    state: ScanState,
    max_message_size: usize,
}

impl FrameDecoder {
    /// Create a decoder that rejects messages larger than `max_message_size`.
    pub fn new(max_message_size: usize) -> Self {
        Self {
            buf: Vec::with_capacity(4096),
            scanned: 0,
            start: 0,
            depth: 0,
            state: ScanState::Idle,
            max_message_size,
        }
    }

    /// Append bytes received from the transport.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Whether a partial message is buffered.
    pub fn has_partial(&self) -> bool {
        self.state != ScanState::Idle
    }

    /// Pop the next complete document, if one is buffered.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, ConnectionError> {
        while self.scanned < self.buf.len() {
            let byte = self.buf[self.scanned];
            match (self.state, byte) {
                (ScanState::Idle, b' ' | b'\t' | b'\r' | b'\n') => {}
                (ScanState::Idle, b'{' | b'[') => {
                    self.start = self.scanned;
                    self.depth = 1;
                    self.state = ScanState::Body;
                }
                (ScanState::Idle, other) => {
                    return Err(ConnectionError::MalformedMessage {
                        details: format!("unexpected byte 0x{other:02x} between messages"),
                    });
                }
                (ScanState::Body, b'"') => self.state = ScanState::Str,
                (ScanState::Body, b'{' | b'[') => self.depth += 1,
                (ScanState::Body, b'}' | b']') => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        let end = self.scanned + 1;
                        let frame = self.buf[self.start..end].to_vec();
                        self.buf.drain(..end);
                        self.scanned = 0;
                        self.start = 0;
                        self.state = ScanState::Idle;
                        return Ok(Some(frame));
                    }
                }
                (ScanState::Body, _) => {}
                (ScanState::Str, b'\\') => self.state = ScanState::Escape,
                (ScanState::Str, b'"') => self.state = ScanState::Body,
                (ScanState::Str, _) => {}
                (ScanState::Escape, _) => self.state = ScanState::Str,
            }
            self.scanned += 1;

            if self.state != ScanState::Idle {
                let size = self.scanned - self.start;
                if size > self.max_message_size {
                    return Err(ConnectionError::MessageTooLarge {
                        size,
                        max: self.max_message_size,
                    });
                }
            }
        }

        // Nothing but inter-message whitespace is left.
        if self.state == ScanState::Idle {
            self.buf.clear();
            self.scanned = 0;
        }
        Ok(None)
    }
}

/// Read one complete JSON document from `stream`.
///
/// Bytes past the end of the document stay in `decoder` for the next call.
pub fn read_message(
    stream: &mut impl Read,
    decoder: &mut FrameDecoder,
) -> Result<Vec<u8>, ConnectionError> {
    let mut buf = [0u8; 8192];
    loop {
        if let Some(frame) = decoder.next_frame()? {
            return Ok(frame);
        }
        let n = match stream.read(&mut buf) {
            Ok(0) => return Err(ConnectionError::ConnectionClosed),
            Ok(n) => n,
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ConnectionError::ReadFailed(e)),
        };
        decoder.push(&buf[..n]);
    }
}

/// Write one JSON document followed by a newline.
pub fn write_message(stream: &mut impl Write, json: &[u8]) -> Result<(), ConnectionError> {
    stream
        .write_all(json)
        .and_then(|()| stream.write_all(b"\n"))
        .and_then(|()| stream.flush())
        .map_err(ConnectionError::WriteFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const MAX: usize = 1024;

    fn read_all(data: &[u8], count: usize) -> Vec<Vec<u8>> {
        let mut cursor = Cursor::new(data.to_vec());
        let mut decoder = FrameDecoder::new(MAX);
        (0..count)
            .map(|_| read_message(&mut cursor, &mut decoder).unwrap())
            .collect()
    }

    #[test]
    fn single_object_without_newline() {
        let frames = read_all(br#"{"version":11,"id":"foobar"}"#, 1);
        assert_eq!(frames[0], br#"{"version":11,"id":"foobar"}"#);
    }

    #[test]
    fn back_to_back_objects_in_one_read() {
        let frames = read_all(br#"{"success":true}{"boards":[1,2]}"#, 2);
        assert_eq!(frames[0], br#"{"success":true}"#);
        assert_eq!(frames[1], br#"{"boards":[1,2]}"#);
    }

    #[test]
    fn newline_separated_objects() {
        let frames = read_all(b"{\"a\":1}\n\r\n  {\"b\":2}\n", 2);
        assert_eq!(frames[0], br#"{"a":1}"#);
        assert_eq!(frames[1], br#"{"b":2}"#);
    }

    #[test]
    fn braces_inside_strings_are_ignored() {
        let frames = read_all(br#"{"code":"G1 X{1}} \" {","n":{}}"#, 1);
        assert_eq!(frames[0], br#"{"code":"G1 X{1}} \" {","n":{}}"#);
    }

    #[test]
    fn message_split_across_pushes() {
        let mut decoder = FrameDecoder::new(MAX);
        decoder.push(br#"{"succ"#);
        assert!(decoder.next_frame().unwrap().is_none());
        assert!(decoder.has_partial());
        decoder.push(br#"ess":true}{"#);
        assert_eq!(decoder.next_frame().unwrap().unwrap(), br#"{"success":true}"#);
        assert!(decoder.next_frame().unwrap().is_none());
        decoder.push(b"}");
        assert_eq!(decoder.next_frame().unwrap().unwrap(), b"{}");
        assert!(!decoder.has_partial());
    }

    #[test]
    fn garbage_between_messages() {
        let mut cursor = Cursor::new(b"oops".to_vec());
        let mut decoder = FrameDecoder::new(MAX);
        let err = read_message(&mut cursor, &mut decoder).unwrap_err();
        assert!(matches!(err, ConnectionError::MalformedMessage { .. }));
    }

    #[test]
    fn message_too_large() {
        let mut data = b"{\"x\":\"".to_vec();
        data.extend(vec![b'a'; 2000]);
        data.extend_from_slice(b"\"}");
        let mut cursor = Cursor::new(data);
        let mut decoder = FrameDecoder::new(MAX);
        match read_message(&mut cursor, &mut decoder).unwrap_err() {
            ConnectionError::MessageTooLarge { max, size } => {
                assert_eq!(max, MAX);
                assert_eq!(size, MAX + 1);
            }
            other => panic!("expected MessageTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn message_at_exact_max_size() {
        let mut data = b"{\"x\":\"".to_vec();
        data.extend(vec![b'a'; MAX - 8]);
        data.extend_from_slice(b"\"}");
        assert_eq!(data.len(), MAX);
        let frames = read_all(&data, 1);
        assert_eq!(frames[0].len(), MAX);
    }

    #[test]
    fn connection_closed_mid_message() {
        let mut cursor = Cursor::new(br#"{"partial":"#.to_vec());
        let mut decoder = FrameDecoder::new(MAX);
        assert!(matches!(
            read_message(&mut cursor, &mut decoder),
            Err(ConnectionError::ConnectionClosed)
        ));
    }

    #[test]
    fn empty_input_is_closed() {
        let mut cursor = Cursor::new(Vec::new());
        let mut decoder = FrameDecoder::new(MAX);
        assert!(matches!(
            read_message(&mut cursor, &mut decoder),
            Err(ConnectionError::ConnectionClosed)
        ));
    }

    #[test]
    fn write_appends_newline() {
        let mut out = Vec::new();
        write_message(&mut out, br#"{"command":"Acknowledge"}"#).unwrap();
        assert_eq!(out, b"{\"command\":\"Acknowledge\"}\n");
    }
}
