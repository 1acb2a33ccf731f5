//! Stream Decoder
//!
//! Turns the raw body of a long-lived HTTP response into a lazy sequence of
//! change events.
//!
//! ```text
//! ByteStream (chunks) ─> StreamReader ─> FramedRead<UnitCodec> ─> decode_unit ─> EventStream
//!                                          one unit per line       one event or error per unit
//! ```
//!
//! Chunk boundaries carry no meaning: a unit may span several chunks and a
//! chunk may carry several units. A malformed unit yields one recoverable
//! error item and decoding continues with the next unit.

mod decoder;
mod framing;

pub use decoder::*;

#[cfg(test)]
mod decoder_test;
