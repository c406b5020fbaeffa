//! Output buffer stack

use std::io::Write;

/// Script output: a stack of `ob_start` buffers above a base sink.
///
/// The base sink either collects bytes in memory or streams them to a writer.
pub struct Output {
    levels: Vec<Vec<u8>>,
    captured: Vec<u8>,
    stream: Option<Box<dyn Write>>,
}

impl Output {
    /// Collect everything in memory
    pub fn captured() -> Self {
        Output {
            levels: Vec::new(),
            captured: Vec::new(),
            stream: None,
        }
    }

    /// Send unbuffered output straight to `writer`
    pub fn streaming(writer: Box<dyn Write>) -> Self {
        Output {
            levels: Vec::new(),
            captured: Vec::new(),
            stream: Some(writer),
        }
    }

    pub fn write(&mut self, bytes: &[u8]) {
        match self.levels.last_mut() {
            Some(top) => top.extend_from_slice(bytes),
            None => self.write_base(bytes),
        }
    }

    fn write_base(&mut self, bytes: &[u8]) {
        match &mut self.stream {
            Some(writer) => {
                if let Err(e) = writer.write_all(bytes) {
                    tracing::warn!(error = %e, "failed to write script output");
                }
            }
            None => self.captured.extend_from_slice(bytes),
        }
    }

    /// Write into the level below the top one (or the base)
    fn write_below_top(&mut self, bytes: &[u8]) {
        let depth = self.levels.len();
        if depth >= 2 {
            self.levels[depth - 2].extend_from_slice(bytes);
        } else {
            self.write_base(bytes);
        }
    }

    // ---- ob_* operations ----

    pub fn start(&mut self) {
        self.levels.push(Vec::new());
    }

    pub fn level(&self) -> usize {
        self.levels.len()
    }

    pub fn contents(&self) -> Option<&[u8]> {
        self.levels.last().map(Vec::as_slice)
    }

    /// Discard the top buffer's contents, keeping the level
    pub fn clean(&mut self) -> bool {
        match self.levels.last_mut() {
            Some(top) => {
                top.clear();
                true
            }
            None => false,
        }
    }

    /// Pass the top buffer's contents down, keeping the level
    pub fn flush_top(&mut self) -> bool {
        let Some(top) = self.levels.last_mut() else {
            return false;
        };
        let bytes = std::mem::take(top);
        self.write_below_top(&bytes);
        true
    }

    /// Pop the top level, returning its contents
    pub fn end_clean(&mut self) -> Option<Vec<u8>> {
        self.levels.pop()
    }

    /// Pop the top level, passing its contents down
    pub fn end_flush(&mut self) -> Option<Vec<u8>> {
        let bytes = self.levels.pop()?;
        self.write(&bytes);
        Some(bytes)
    }

    /// Flush every buffer level into the base sink
    pub fn flush_all(&mut self) {
        while self.end_flush().is_some() {}
        self.flush_stream();
    }

    pub fn flush_stream(&mut self) {
        if let Some(writer) = &mut self.stream {
            if let Err(e) = writer.flush() {
                tracing::warn!(error = %e, "failed to flush script output");
            }
        }
    }

    /// Bytes collected by the base sink so far
    pub fn take_captured(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.captured)
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::captured()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbuffered_writes_reach_base() {
        let mut out = Output::captured();
        out.write(b"hello");
        assert_eq!(out.take_captured(), b"hello");
        assert_eq!(out.level(), 0);
    }

    #[test]
    fn test_nested_buffers() {
        let mut out = Output::captured();
        out.start();
        out.write(b"a");
        out.start();
        out.write(b"b");
        assert_eq!(out.contents(), Some(b"b".as_slice()));
        assert_eq!(out.end_flush(), Some(b"b".to_vec()));
        assert_eq!(out.contents(), Some(b"ab".as_slice()));
        assert!(out.clean());
        out.write(b"c");
        out.flush_all();
        assert_eq!(out.take_captured(), b"c");
        assert!(!out.clean());
    }

    #[test]
    fn test_end_clean_discards() {
        let mut out = Output::captured();
        out.start();
        out.write(b"secret");
        assert_eq!(out.end_clean(), Some(b"secret".to_vec()));
        out.flush_all();
        assert!(out.take_captured().is_empty());
        assert_eq!(out.end_clean(), None);
    }

    #[test]
    fn test_flush_top_keeps_level() {
        let mut out = Output::captured();
        out.start();
        out.write(b"x");
        assert!(out.flush_top());
        assert_eq!(out.level(), 1);
        assert_eq!(out.contents(), Some(b"".as_slice()));
        assert_eq!(out.take_captured(), b"x");
    }
}
