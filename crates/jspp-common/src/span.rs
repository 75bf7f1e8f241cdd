//! Byte-offset source spans.

use serde::{Deserialize, Serialize};

/// A half-open `[start, end)` byte range in the original source text.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteSpan {
    /// Start position (byte offset)
    pub start: u32,
    /// End position (byte offset, exclusive)
    pub end: u32,
}

impl ByteSpan {
    /// Create a new span.
    pub fn new(start: u32, end: u32) -> Self {
        ByteSpan { start, end }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Get the spanned text from source.
    pub fn get_text<'a>(&self, source: &'a str) -> &'a str {
        let start = self.start as usize;
        let end = self.end as usize;
        if end <= source.len() && start < end {
            &source[start..end]
        } else {
            ""
        }
    }
}

impl std::fmt::Display for ByteSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_text_in_bounds() {
        let src = "abcdef";
        assert_eq!(ByteSpan::new(1, 4).get_text(src), "bcd");
    }

    #[test]
    fn get_text_out_of_bounds_is_empty() {
        let src = "ab";
        assert_eq!(ByteSpan::new(1, 9).get_text(src), "");
        assert_eq!(ByteSpan::new(2, 2).get_text(src), "");
    }

    #[test]
    fn display_is_start_colon_end() {
        assert_eq!(ByteSpan::new(3, 10).to_string(), "3:10");
    }
}
