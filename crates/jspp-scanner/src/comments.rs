//! Comment extraction
//!
//! This module scans JavaScript/TypeScript source text and returns every
//! comment token with its byte span, in source order. Directives only ever
//! live in single-line comments, but block comments are reported too so the
//! directive layer can filter them with full knowledge of what was skipped.
//!
//! The scan is purely lexical: string literals, template literals (including
//! nested `${...}` interpolations) and regex literals are skipped so that
//! comment-looking text inside them is never misread as a comment. Whether a
//! `/` begins a regex or a division is decided from the previous significant
//! byte; a `/` following an identifier, number, `)` or `]` is division. This
//! misreads `return /re/` as division, which only matters when such a regex
//! body itself contains `//`.

use jspp_common::ByteSpan;
use memchr::memchr2;
use serde::{Deserialize, Serialize};

/// A comment token in the source text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRange {
    /// Byte span of the whole comment, delimiters included.
    pub span: ByteSpan,
    /// Whether this is a `/* ... */` comment.
    pub multi_line: bool,
}

impl CommentRange {
    pub fn new(span: ByteSpan, multi_line: bool) -> Self {
        CommentRange { span, multi_line }
    }

    /// The comment text without its delimiters.
    pub fn inner_text<'a>(&self, source: &'a str) -> &'a str {
        let text = self.span.get_text(source);
        if self.multi_line {
            let body = text.strip_prefix("/*").unwrap_or(text);
            body.strip_suffix("*/").unwrap_or(body)
        } else {
            text.strip_prefix("//").unwrap_or(text)
        }
    }
}

/// Extract all comment ranges from source text, in source order.
pub fn comment_ranges(source: &str) -> Vec<CommentRange> {
    let bytes = source.as_bytes();
    let len = bytes.len();
    let mut comments = Vec::new();
    let mut pos = 0;

    // Last significant byte seen outside comments and literals, 0 at start.
    let mut prev: u8 = 0;
    // One entry per open `${` interpolation: its unmatched `{` count.
    let mut interp_braces: Vec<u32> = Vec::new();

    while pos < len {
        let ch = bytes[pos];

        match ch {
            b' ' | b'\t' | b'\r' | b'\n' => {
                pos += 1;
            }
            b'/' if pos + 1 < len && bytes[pos + 1] == b'/' => {
                let start = pos as u32;
                // Scan to end of line; the newline is not part of the span.
                pos = match memchr2(b'\n', b'\r', &bytes[pos..]) {
                    Some(i) => pos + i,
                    None => len,
                };
                comments.push(CommentRange::new(ByteSpan::new(start, pos as u32), false));
            }
            b'/' if pos + 1 < len && bytes[pos + 1] == b'*' => {
                let start = pos as u32;
                pos += 2;
                let mut closed = false;
                while pos + 1 < len {
                    if bytes[pos] == b'*' && bytes[pos + 1] == b'/' {
                        pos += 2;
                        closed = true;
                        break;
                    }
                    pos += 1;
                }
                if !closed {
                    // Unclosed block comment runs to end of input.
                    pos = len;
                }
                comments.push(CommentRange::new(ByteSpan::new(start, pos as u32), true));
            }
            b'/' => {
                if regex_allowed(prev) {
                    pos = skip_regex(bytes, pos);
                } else {
                    pos += 1;
                }
                prev = b'/';
            }
            b'\'' | b'"' => {
                pos = skip_string(bytes, pos);
                prev = ch;
            }
            b'`' => {
                pos = scan_template(bytes, pos + 1, &mut interp_braces);
                prev = b'`';
            }
            b'{' if !interp_braces.is_empty() => {
                if let Some(depth) = interp_braces.last_mut() {
                    *depth += 1;
                }
                pos += 1;
                prev = b'{';
            }
            b'}' if !interp_braces.is_empty() => {
                let depth = interp_braces.last_mut();
                match depth {
                    Some(d) if *d > 0 => {
                        *d -= 1;
                        pos += 1;
                        prev = b'}';
                    }
                    _ => {
                        // Interpolation closed; resume scanning the template.
                        interp_braces.pop();
                        pos = scan_template(bytes, pos + 1, &mut interp_braces);
                        prev = b'`';
                    }
                }
            }
            _ => {
                prev = ch;
                pos += 1;
            }
        }
    }

    comments
}

/// Whether a `/` at this point begins a regex literal rather than division.
fn regex_allowed(prev: u8) -> bool {
    if prev == 0 {
        return true;
    }
    if prev.is_ascii_alphanumeric() || prev == b'_' || prev == b'$' {
        return false;
    }
    !matches!(prev, b')' | b']' | b'.' | b'\'' | b'"' | b'`')
}

/// Skip a string literal starting at the opening quote.
/// Returns the position just past the closing quote, or past the point where
/// an unterminated literal ends (newline or end of input).
fn skip_string(bytes: &[u8], mut pos: usize) -> usize {
    let len = bytes.len();
    let quote = bytes[pos];
    pos += 1;
    while pos < len {
        match bytes[pos] {
            b'\\' => pos += 2,
            b'\n' | b'\r' => return pos,
            b if b == quote => return pos + 1,
            _ => pos += 1,
        }
    }
    len
}

/// Scan template literal text starting just past a backtick (or just past a
/// closed `${...}` interpolation). Returns the position past the terminating
/// backtick, or past a `${` after pushing a new interpolation frame.
fn scan_template(bytes: &[u8], mut pos: usize, interp_braces: &mut Vec<u32>) -> usize {
    let len = bytes.len();
    while pos < len {
        match bytes[pos] {
            b'\\' => pos += 2,
            b'`' => return pos + 1,
            b'$' if pos + 1 < len && bytes[pos + 1] == b'{' => {
                interp_braces.push(0);
                return pos + 2;
            }
            _ => pos += 1,
        }
    }
    len
}

/// Skip a regex literal starting at the opening `/`.
fn skip_regex(bytes: &[u8], mut pos: usize) -> usize {
    let len = bytes.len();
    pos += 1;
    let mut in_class = false;
    while pos < len {
        match bytes[pos] {
            b'\\' => pos += 2,
            b'[' => {
                in_class = true;
                pos += 1;
            }
            b']' if in_class => {
                in_class = false;
                pos += 1;
            }
            b'/' if !in_class => {
                pos += 1;
                // Trailing flags
                while pos < len && bytes[pos].is_ascii_alphabetic() {
                    pos += 1;
                }
                return pos;
            }
            // A regex literal cannot span lines; bail out.
            b'\n' | b'\r' => return pos,
            _ => pos += 1,
        }
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(source: &str) -> Vec<(String, bool)> {
        comment_ranges(source)
            .iter()
            .map(|c| (c.span.get_text(source).to_string(), c.multi_line))
            .collect()
    }

    #[test]
    fn finds_line_comments_in_order() {
        let src = "let a = 1; // first\nlet b = 2; // second\n";
        assert_eq!(
            texts(src),
            vec![
                ("// first".to_string(), false),
                ("// second".to_string(), false)
            ]
        );
    }

    #[test]
    fn span_excludes_the_newline() {
        let src = "// hello\nrest";
        let comments = comment_ranges(src);
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].span, jspp_common::ByteSpan::new(0, 8));
    }

    #[test]
    fn finds_block_comments() {
        let src = "a; /* one */ b; /* two\nlines */";
        assert_eq!(
            texts(src),
            vec![
                ("/* one */".to_string(), true),
                ("/* two\nlines */".to_string(), true)
            ]
        );
    }

    #[test]
    fn unclosed_block_comment_runs_to_eof() {
        let src = "a; /* open";
        let comments = comment_ranges(src);
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].span.get_text(src), "/* open");
    }

    #[test]
    fn ignores_comment_text_inside_strings() {
        let src = "let a = \"// not a comment\"; let b = '// nope'; // real\n";
        assert_eq!(texts(src), vec![("// real".to_string(), false)]);
    }

    #[test]
    fn ignores_comment_text_inside_templates() {
        let src = "let a = `// not ${x} // still not`; // real\n";
        assert_eq!(texts(src), vec![("// real".to_string(), false)]);
    }

    #[test]
    fn finds_comments_inside_template_interpolation() {
        let src = "let a = `x ${ /* inner */ y } z`;";
        assert_eq!(texts(src), vec![("/* inner */".to_string(), true)]);
    }

    #[test]
    fn nested_braces_inside_interpolation() {
        let src = "let a = `v ${ obj.map(x => { return x; }) } // in template`;\n// real";
        assert_eq!(texts(src), vec![("// real".to_string(), false)]);
    }

    #[test]
    fn regex_literal_with_slashes_is_not_a_comment() {
        let src = "let re = /a\\/\\/b/g; // real\n";
        assert_eq!(texts(src), vec![("// real".to_string(), false)]);
    }

    #[test]
    fn division_is_not_a_regex() {
        let src = "let x = a / b / c; // quotient\n";
        assert_eq!(texts(src), vec![("// quotient".to_string(), false)]);
    }

    #[test]
    fn slash_in_regex_char_class() {
        let src = "let re = /[/]/; // real\n";
        assert_eq!(texts(src), vec![("// real".to_string(), false)]);
    }

    #[test]
    fn inner_text_strips_delimiters() {
        let src = "// #if DEBUG\n/* block */";
        let comments = comment_ranges(src);
        assert_eq!(comments[0].inner_text(src), " #if DEBUG");
        assert_eq!(comments[1].inner_text(src), " block ");
    }

    #[test]
    fn empty_source_has_no_comments() {
        assert!(comment_ranges("").is_empty());
    }

    #[test]
    fn escaped_quote_does_not_end_string() {
        let src = "let s = 'it\\'s // fine'; // real\n";
        assert_eq!(texts(src), vec![("// real".to_string(), false)]);
    }
}
