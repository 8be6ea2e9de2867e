//! Per-connection state: a streaming decoder on the read side, a flat
//! buffer on the write side.
//!
//! One request yields exactly one reply, so a connection needs at most one
//! pending write buffer at a time; `cursor` tracks how much of it has
//! already been flushed to the socket across partial `write` calls.

use fixml_codec::{encode, Progress, StreamingParser};
use fixml_types::Message;
use umpf_store::Store;

use crate::dispatcher::dispatch;
use crate::error::ConnError;

pub struct Conn {
    parser: StreamingParser,
    pending: Vec<u8>,
    cursor: usize,
}

impl Conn {
    pub fn new() -> Self {
        Self {
            parser: StreamingParser::new(),
            pending: Vec::new(),
            cursor: 0,
        }
    }

    /// Feeds newly-read bytes to the decoder. Once a complete request has
    /// arrived, dispatches it and stages the encoded reply for writing.
    /// Returns `true` if a reply is now pending.
    pub fn feed(&mut self, chunk: &[u8], store: &mut Store) -> Result<bool, ConnError> {
        match self.parser.feed(chunk)? {
            Progress::NeedMore => Ok(false),
            Progress::Ready(body) => {
                let reply = dispatch(store, Message::request(body));
                self.stage(reply);
                Ok(true)
            }
        }
    }

    fn stage(&mut self, reply: Message) {
        self.pending = encode(&reply);
        self.cursor = 0;
    }

    pub fn has_pending_write(&self) -> bool {
        self.cursor < self.pending.len()
    }

    pub fn pending_bytes(&self) -> &[u8] {
        &self.pending[self.cursor..]
    }

    /// Advances the write cursor by `n` bytes actually written, resetting
    /// the decoder for the next request once the reply has fully drained.
    pub fn advance_write(&mut self, n: usize) {
        self.cursor += n;
        if !self.has_pending_write() {
            self.pending.clear();
            self.cursor = 0;
            self.parser = StreamingParser::new();
        }
    }
}

impl Default for Conn {
    fn default() -> Self {
        Self::new()
    }
}

