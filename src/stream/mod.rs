//! Event stream decoding for the OCR relay protocol.
//!
//! The relay reports task outcomes as newline-delimited records, each a
//! known prefix followed by a JSON body. Decoding is tolerant by design:
//! unknown prefixes are skipped for forward compatibility, and a body
//! that fails to parse becomes a diagnostic rather than a stream error.

mod decoder;
mod event;

pub use decoder::EventDecoder;
pub use event::{DecodedRecord, MalformedRecord, StreamEvent, TaskResult};
