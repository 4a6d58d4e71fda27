// src/linebuf.rs
//
// Line reassembly buffer for byte streams that arrive in arbitrary chunks.
// Each client gets one of these; complete lines are drained off and
// forwarded to the serial device, partial lines wait for more data.

/// Default cap on buffered bytes awaiting a newline. A peer that streams
/// un-terminated data past this point has its buffered prefix discarded.
pub const DEFAULT_LINEBUF_LIMIT: usize = 64 * 1024;

/// Accumulates raw bytes and yields complete newline-terminated lines.
///
/// Bytes are never reordered or duplicated: a line returned by `take_line`
/// is byte-identical to what was fed in, trailing `\n` included.
pub struct LineBuf {
    buf: Vec<u8>,
    limit: usize,
}

impl LineBuf {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_LINEBUF_LIMIT)
    }

    pub fn with_limit(limit: usize) -> Self {
        LineBuf {
            buf: Vec::new(),
            limit,
        }
    }

    /// Append raw bytes to the buffer.
    ///
    /// Returns the number of bytes discarded by the overflow guard: when the
    /// buffer exceeds its limit with no newline in sight, the whole
    /// un-terminated prefix is dropped rather than growing without bound.
    /// Data containing a newline is never discarded here - callers drain it
    /// with `take_line` before the next append.
    pub fn extend(&mut self, data: &[u8]) -> usize {
        self.buf.extend_from_slice(data);

        if self.buf.len() > self.limit && !self.buf.contains(&b'\n') {
            let discarded = self.buf.len();
            self.buf.clear();
            return discarded;
        }

        0
    }

    /// Remove and return the earliest complete line, including its trailing
    /// newline, or `None` if no complete line is buffered yet.
    ///
    /// Call in a loop until `None`: several lines can land in one read.
    pub fn take_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.buf.iter().position(|&b| b == b'\n')?;
        Some(self.buf.drain(..=pos).collect())
    }

    /// Number of bytes buffered without a terminating newline yet.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

impl Default for LineBuf {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line() {
        let mut buf = LineBuf::new();
        buf.extend(b"hello\n");
        assert_eq!(buf.take_line(), Some(b"hello\n".to_vec()));
        assert_eq!(buf.take_line(), None);
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut buf = LineBuf::new();
        buf.extend(b"AT\r");
        assert_eq!(buf.take_line(), None);
        buf.extend(b"\n");
        assert_eq!(buf.take_line(), Some(b"AT\r\n".to_vec()));
        assert_eq!(buf.take_line(), None);
    }

    #[test]
    fn test_multiple_lines_in_one_chunk() {
        let mut buf = LineBuf::new();
        buf.extend(b"one\ntwo\nthree\npartial");

        assert_eq!(buf.take_line(), Some(b"one\n".to_vec()));
        assert_eq!(buf.take_line(), Some(b"two\n".to_vec()));
        assert_eq!(buf.take_line(), Some(b"three\n".to_vec()));
        assert_eq!(buf.take_line(), None);
        assert_eq!(buf.pending(), 7);
    }

    #[test]
    fn test_line_count_matches_newline_count() {
        // k newlines across arbitrary chunk boundaries yield exactly k lines.
        let chunks: &[&[u8]] = &[b"a", b"b\nc", b"", b"\n\nd", b"e\n"];
        let mut buf = LineBuf::new();
        let mut lines = Vec::new();
        for chunk in chunks {
            buf.extend(chunk);
            while let Some(line) = buf.take_line() {
                lines.push(line);
            }
        }
        assert_eq!(
            lines,
            vec![
                b"ab\n".to_vec(),
                b"c\n".to_vec(),
                b"\n".to_vec(),
                b"de\n".to_vec(),
            ]
        );
    }

    #[test]
    fn test_empty_line() {
        let mut buf = LineBuf::new();
        buf.extend(b"\n");
        assert_eq!(buf.take_line(), Some(b"\n".to_vec()));
    }

    #[test]
    fn test_overflow_discards_unterminated_data() {
        let mut buf = LineBuf::with_limit(8);
        assert_eq!(buf.extend(b"12345678"), 0);
        let discarded = buf.extend(b"9");
        assert_eq!(discarded, 9);
        assert_eq!(buf.pending(), 0);
        assert_eq!(buf.take_line(), None);

        // Buffer is usable again afterwards.
        buf.extend(b"ok\n");
        assert_eq!(buf.take_line(), Some(b"ok\n".to_vec()));
    }

    #[test]
    fn test_overflow_spares_data_with_newline() {
        let mut buf = LineBuf::with_limit(4);
        assert_eq!(buf.extend(b"longer than limit\n"), 0);
        assert_eq!(buf.take_line(), Some(b"longer than limit\n".to_vec()));
    }
}
