//! Incremental UTF-8 decoding of streamed answers.
//!
//! Chunk boundaries are transport artifacts and can fall inside a multi-byte
//! character. [`Utf8ChunkDecoder`] keeps the trailing partial sequence and
//! completes it with the next chunk.

use encoding_rs::{CoderResult, Decoder, UTF_8};

/// Stateful decoder for one response body.
pub struct Utf8ChunkDecoder {
    inner: Decoder,
    finished: bool,
    replaced: bool,
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self {
            inner: UTF_8.new_decoder_without_bom_handling(),
            finished: false,
            replaced: false,
        }
    }

    /// Decode one chunk, returning only the text completed by it.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.run(chunk, false)
    }

    /// Flush at end of stream. An incomplete trailing sequence becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.finished {
            return String::new();
        }
        self.finished = true;
        self.run(&[], true)
    }

    /// Whether any malformed input was replaced with U+FFFD so far.
    pub fn had_replacements(&self) -> bool {
        self.replaced
    }

    fn run(&mut self, mut src: &[u8], last: bool) -> String {
        let mut out = String::new();
        loop {
            let needed = self
                .inner
                .max_utf8_buffer_length(src.len())
                .unwrap_or(src.len() * 3 + 4);
            out.reserve(needed);
            let (result, read, replaced) = self.inner.decode_to_string(src, &mut out, last);
            self.replaced |= replaced;
            src = &src[read..];
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => continue,
            }
        }
        out
    }
}

impl Default for Utf8ChunkDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_ascii_passes_through() {
        let mut decoder = Utf8ChunkDecoder::new();
        assert_eq!(decoder.decode(b"Hel"), "Hel");
        assert_eq!(decoder.decode(b"lo"), "lo");
        assert_eq!(decoder.finish(), "");
        assert!(!decoder.had_replacements());
    }

    #[test]
    fn stitches_character_split_across_chunks() {
        // "é" is 0xC3 0xA9, "日" is 0xE6 0x97 0xA5
        let mut decoder = Utf8ChunkDecoder::new();
        assert_eq!(decoder.decode(&[b'c', b'a', b'f', 0xC3]), "caf");
        assert_eq!(decoder.decode(&[0xA9, b' ', 0xE6]), "é ");
        assert_eq!(decoder.decode(&[0x97]), "");
        assert_eq!(decoder.decode(&[0xA5]), "日");
        assert_eq!(decoder.finish(), "");
        assert!(!decoder.had_replacements());
    }

    #[test]
    fn four_byte_emoji_one_byte_at_a_time() {
        let bytes = "👋".as_bytes();
        let mut decoder = Utf8ChunkDecoder::new();
        let mut text = String::new();
        for b in bytes {
            text.push_str(&decoder.decode(&[*b]));
        }
        assert_eq!(text, "👋");
    }

    #[test]
    fn truncated_tail_becomes_replacement_char() {
        let mut decoder = Utf8ChunkDecoder::new();
        assert_eq!(decoder.decode(&[b'a', 0xE6, 0x97]), "a");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert!(decoder.had_replacements());
        assert_eq!(decoder.finish(), "");
    }
}
