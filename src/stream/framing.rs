use bytes::Bytes;
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// One framing unit cut from the response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Unit {
    /// A complete line, newline stripped
    Line(Bytes),
    /// A line longer than the configured limit; its bytes were discarded
    Oversized(usize),
}

/// Newline-delimited framing that never fails on content.
///
/// Unlike `LinesCodec`, an oversized or non-UTF-8 line does not poison the
/// stream: it is surfaced as its own unit and framing resumes at the next
/// newline. Only I/O errors end the stream.
#[derive(Debug)]
pub(crate) struct UnitCodec {
    max_length: usize,
    /// Offset up to which the buffer is known to hold no newline
    next_index: usize,
    /// Bytes dropped so far from the oversized line being skipped
    discarding: Option<usize>,
}

impl UnitCodec {
    pub(crate) fn new(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: None,
        }
    }
}

impl Decoder for UnitCodec {
    type Item = Unit;
    type Error = std::io::Error;

    fn decode(
        &mut self,
        buf: &mut BytesMut,
    ) -> std::result::Result<Option<Unit>, Self::Error> {
        let newline = buf[self.next_index..].iter().position(|b| *b == b'\n');

        match newline {
            Some(offset) => {
                let end = self.next_index + offset;
                self.next_index = 0;
                let mut line = buf.split_to(end + 1);

                if let Some(discarded) = self.discarding.take() {
                    return Ok(Some(Unit::Oversized(discarded + end)));
                }
                if end > self.max_length {
                    return Ok(Some(Unit::Oversized(end)));
                }

                line.truncate(end);
                Ok(Some(Unit::Line(line.freeze())))
            }
            None if self.discarding.is_some() || buf.len() > self.max_length => {
                *self.discarding.get_or_insert(0) += buf.len();
                buf.clear();
                self.next_index = 0;
                Ok(None)
            }
            None => {
                self.next_index = buf.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(
        &mut self,
        buf: &mut BytesMut,
    ) -> std::result::Result<Option<Unit>, Self::Error> {
        if let Some(unit) = self.decode(buf)? {
            return Ok(Some(unit));
        }
        if let Some(discarded) = self.discarding.take() {
            return Ok(Some(Unit::Oversized(discarded)));
        }
        if buf.is_empty() {
            return Ok(None);
        }

        // Trailing unit without a final newline
        self.next_index = 0;
        Ok(Some(Unit::Line(buf.split().freeze())))
    }
}
