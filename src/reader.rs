// ABOUTME: Line-tracking input reader used for caret position diagnostics

use std::io::{self, BufRead};

/// Reads bytes from an input source while remembering the current line so
/// a diagnostic can point at the last byte read.
pub struct TrackedReader {
    name: String,
    inner: Box<dyn BufRead>,
    line: Vec<u8>,
    line_no: usize,
    char_no: usize,
}

impl TrackedReader {
    pub fn new(name: impl Into<String>, inner: Box<dyn BufRead>) -> Self {
        TrackedReader {
            name: name.into(),
            inner,
            line: Vec::new(),
            line_no: 0,
            char_no: 0,
        }
    }

    /// The next byte of the input, or `None` at end of file.
    pub fn next_byte(&mut self) -> io::Result<Option<u8>> {
        if self.char_no >= self.line.len() {
            self.line.clear();
            self.char_no = 0;
            let read = self.inner.read_until(b'\n', &mut self.line)?;
            if read == 0 {
                return Ok(None);
            }
            self.line_no += 1;
        }
        let c = self.line[self.char_no];
        self.char_no += 1;
        Ok(Some(c))
    }

    /// Render a diagnostic: the message tagged with file and line number,
    /// the text of the current line, and a caret under the last byte read.
    pub fn diagnostic(&self, message: &str) -> String {
        let mut out = format!("{} line {}: {}\n", self.name, self.line_no, message);
        let text = String::from_utf8_lossy(&self.line);
        out.push_str(text.trim_end_matches('\n'));
        out.push('\n');
        let last = self.char_no.saturating_sub(1);
        for &c in self.line.iter().take(last) {
            // tabs keep their width so the caret lines up
            out.push(if c == b'\t' { '\t' } else { ' ' });
        }
        out.push('^');
        out
    }
}
