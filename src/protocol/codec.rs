/// A line taken off a connection's accumulation buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// A complete line with its `\n` / `\r\n` terminator removed.
    Complete(String),
    /// A line that grew past the configured limit. Its bytes were dropped.
    TooLong,
}

use std::collections::VecDeque;

/// Per-connection accumulation buffer.
///
/// Bytes are appended as they arrive; complete lines are split off in the
/// order received and any trailing partial line stays buffered until the next
/// read. Split lines wait in a queue until the owner takes them, one at a
/// time. A line longer than `max_line_length` is discarded up to its
/// terminator and reported once as [`Line::TooLong`].
#[derive(Debug)]
pub struct LineBuffer {
    buffer: Vec<u8>,
    lines: VecDeque<Line>,
    max_line_length: usize,
    discarding: bool,
}

impl LineBuffer {
    pub fn new(max_line_length: usize) -> Self {
        Self {
            buffer: Vec::new(),
            lines: VecDeque::new(),
            max_line_length,
            discarding: false,
        }
    }

    pub fn add_data(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
        self.try_parse_lines();
    }

    /// The oldest complete line not yet handed out.
    pub fn next_line(&mut self) -> Option<Line> {
        self.lines.pop_front()
    }

    pub fn has_lines(&self) -> bool {
        !self.lines.is_empty()
    }

    /// Bytes of the partial line currently held.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn try_parse_lines(&mut self) {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            raw.pop();
            if raw.last() == Some(&b'\r') {
                raw.pop();
            }

            if self.discarding {
                self.discarding = false;
                self.lines.push_back(Line::TooLong);
            } else if raw.len() > self.max_line_length {
                self.lines.push_back(Line::TooLong);
            } else {
                self.lines.push_back(Line::Complete(String::from_utf8_lossy(&raw).into_owned()));
            }
        }

        // No terminator yet: keep at most one line's worth of bytes
        if self.discarding || self.buffer.len() > self.max_line_length {
            self.discarding = true;
            self.buffer.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(s: &str) -> Line {
        Line::Complete(s.to_string())
    }

    fn take_lines(buffer: &mut LineBuffer) -> Vec<Line> {
        std::iter::from_fn(|| buffer.next_line()).collect()
    }

    #[test]
    fn test_partial_lines_stay_buffered() {
        let mut buffer = LineBuffer::new(64);

        buffer.add_data(b"touch fi");
        assert!(take_lines(&mut buffer).is_empty());
        assert_eq!(buffer.pending(), 8);

        buffer.add_data(b"le.txt\r\nls\ncat");
        assert_eq!(take_lines(&mut buffer), vec![complete("touch file.txt"), complete("ls")]);
        assert_eq!(buffer.pending(), 3);

        buffer.add_data(b" file.txt\n");
        assert_eq!(take_lines(&mut buffer), vec![complete("cat file.txt")]);
        assert_eq!(buffer.pending(), 0);
    }

    #[test]
    fn test_empty_lines() {
        let mut buffer = LineBuffer::new(64);
        buffer.add_data(b"\r\n\n");
        assert_eq!(take_lines(&mut buffer), vec![complete(""), complete("")]);
    }

    #[test]
    fn test_overlong_line_in_one_chunk() {
        let mut buffer = LineBuffer::new(8);
        buffer.add_data(b"mkdir a-very-long-name\nls\n");
        assert_eq!(take_lines(&mut buffer), vec![Line::TooLong, complete("ls")]);
    }

    #[test]
    fn test_overlong_line_across_chunks() {
        let mut buffer = LineBuffer::new(8);

        buffer.add_data(b"0123456789");
        assert!(take_lines(&mut buffer).is_empty());
        assert_eq!(buffer.pending(), 0);

        buffer.add_data(b"abcdef");
        assert!(take_lines(&mut buffer).is_empty());
        assert_eq!(buffer.pending(), 0);

        buffer.add_data(b"xyz\nls\n");
        assert_eq!(take_lines(&mut buffer), vec![Line::TooLong, complete("ls")]);
    }

    #[test]
    fn test_line_at_limit_is_accepted() {
        let mut buffer = LineBuffer::new(8);
        buffer.add_data(b"cat abcd\r\n");
        assert_eq!(take_lines(&mut buffer), vec![complete("cat abcd")]);
    }
}
