//! In-memory transport for protocol unit tests.

use std::cell::RefCell;
use std::io::{self, Cursor, Read, Write};
use std::rc::Rc;

/// Replays a fixed server script and records everything the client writes.
pub(crate) struct ScriptedStream {
    input: Cursor<Vec<u8>>,
    written: Rc<RefCell<Vec<u8>>>,
}

impl ScriptedStream {
    /// Server messages are concatenated without separators.
    pub(crate) fn new(script: &[&str]) -> (Self, Rc<RefCell<Vec<u8>>>) {
        let written = Rc::new(RefCell::new(Vec::new()));
        let stream = Self {
            input: Cursor::new(script.concat().into_bytes()),
            written: Rc::clone(&written),
        };
        (stream, written)
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Lines written by the client so far.
pub(crate) fn sent_lines(written: &Rc<RefCell<Vec<u8>>>) -> Vec<String> {
    String::from_utf8_lossy(&written.borrow())
        .lines()
        .map(str::to_string)
        .collect()
}
