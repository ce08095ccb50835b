//! Newline framing for agent stdout streams.
//!
//! Unlike [`tokio_util::codec::LinesCodec`], this codec never fails on the
//! content of a line: invalid UTF-8 is replaced lossily, and only the `\n`
//! delimiter is stripped (a preceding `\r` is part of the line). A trailing
//! unterminated line is yielded at EOF, so the sequence of decoded lines is
//! exactly the result of splitting the full stream on `\n`, independent of
//! how the bytes were chunked on arrival.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tokio_util::codec::FramedRead;
//! use agent_relay::process::codec::LineCodec;
//!
//! let lines = FramedRead::new(child_stdout, LineCodec::new());
//! ```

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::AppError;

/// Lossy `\n`-delimited line decoder.
#[derive(Debug, Default)]
pub struct LineCodec {
    /// Offset into the buffer already scanned for a newline, so a long line
    /// arriving in many chunks is not rescanned from the start each time.
    next_index: usize,
}

impl LineCodec {
    /// Create a new codec.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = AppError;

    /// Decode the next `\n`-terminated line from `src`.
    ///
    /// Returns `Ok(None)` while no complete line is buffered.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
            self.next_index = src.len();
            return Ok(None);
        };

        let newline_at = self.next_index + offset;
        self.next_index = 0;

        let mut line = src.split_to(newline_at + 1);
        line.truncate(newline_at);
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }

    /// Decode remaining lines at EOF, yielding any unterminated remainder
    /// as the final line.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }

        self.next_index = 0;
        if src.is_empty() {
            return Ok(None);
        }

        let rest = src.split_to(src.len());
        Ok(Some(String::from_utf8_lossy(&rest).into_owned()))
    }
}
