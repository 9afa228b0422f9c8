//! Incremental record framing over an arbitrary chunk feed.

use super::event::{parse_line, DecodedRecord};

/// Reassembles newline-delimited records from arbitrarily-split chunks.
///
/// Bytes are buffered until a delimiter is seen; a trailing partial line
/// survives across `feed` calls and is flushed by `finish` when the
/// transport ends. Buffering happens on raw bytes so a UTF-8 sequence
/// split across chunks reassembles correctly.
#[derive(Debug, Default)]
pub struct EventDecoder {
    buf: Vec<u8>,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, returning every record completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<DecodedRecord> {
        self.buf.extend_from_slice(chunk);

        let mut records = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buf[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            let line = String::from_utf8_lossy(&self.buf[start..end]);
            if let Some(record) = parse_line(&line) {
                records.push(record);
            }
            start = end + 1;
        }
        self.buf.drain(..start);
        records
    }

    /// Flush the trailing partial line at end of transport.
    ///
    /// A truncated final record surfaces as malformed rather than
    /// vanishing silently.
    pub fn finish(&mut self) -> Vec<DecodedRecord> {
        if self.buf.is_empty() {
            return Vec::new();
        }
        let line = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        parse_line(&line).into_iter().collect()
    }
}
