//! Directive recognition and block building.
//!
//! A directive is a single-line comment whose text, after stripping leading
//! decoration (`*` and whitespace), starts with `#if`, `#elif`, `#else` or
//! `#endif` at a word boundary. Anything else (`#ifdef`, plain prose, block
//! comments) is not a directive and is ignored.

use jspp_common::ByteSpan;
use rustc_hash::FxHashMap;
use serde_json::Value as JsonValue;

use crate::PreprocessError;
use crate::eval;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DirectiveKind {
    If,
    Elif,
    Else,
    Endif,
}

impl DirectiveKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DirectiveKind::If => "#if",
            DirectiveKind::Elif => "#elif",
            DirectiveKind::Else => "#else",
            DirectiveKind::Endif => "#endif",
        }
    }
}

impl std::fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recognized directive occurrence with its evaluated local condition.
#[derive(Clone, Debug, PartialEq)]
pub struct DirectiveBlock {
    pub kind: DirectiveKind,
    /// Evaluated truthiness of the operand for `#if`/`#elif`; always `true`
    /// for `#else`; meaningless (fixed `false`) for `#endif`.
    pub condition: bool,
    /// Span of the comment token in the original source.
    pub span: ByteSpan,
}

/// A directive whose operand has not been evaluated yet. Splitting
/// recognition from evaluation lets structural syntax errors surface before
/// any expression runs.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct RawDirective {
    pub(crate) kind: DirectiveKind,
    pub(crate) operand: String,
    pub(crate) span: ByteSpan,
}

/// Parse one comment's inner text. Returns `Ok(None)` for non-directives.
///
/// `#else`/`#endif` take no operand; an operand there is a malformed
/// directive and fatal.
pub(crate) fn parse_raw(text: &str, span: ByteSpan) -> Result<Option<RawDirective>, PreprocessError> {
    let stripped = strip_decoration(text);
    let Some((kind, rest)) = split_keyword(stripped) else {
        return Ok(None);
    };
    let operand = rest.trim();

    if matches!(kind, DirectiveKind::Else | DirectiveKind::Endif) && !operand.is_empty() {
        return Err(PreprocessError::UnexpectedDirective {
            kind,
            operand: operand.to_string(),
            span,
        });
    }

    Ok(Some(RawDirective {
        kind,
        operand: operand.to_string(),
        span,
    }))
}

/// Evaluate operands and produce the final block list, in source order.
///
/// The `#else`-adjacency syntax check runs first so that a malformed chain
/// fails as a syntax error even when a later operand would not evaluate.
pub(crate) fn build_blocks(
    raws: &[RawDirective],
    variables: &FxHashMap<String, JsonValue>,
) -> Result<Vec<DirectiveBlock>, PreprocessError> {
    check_no_branch_after_else(raws.iter().map(|r| (r.kind, r.span)))?;

    let mut blocks = Vec::with_capacity(raws.len());
    for raw in raws {
        let condition = match raw.kind {
            DirectiveKind::If | DirectiveKind::Elif => {
                eval::evaluate(&raw.operand, variables).map_err(|source| {
                    PreprocessError::Expr {
                        expr: raw.operand.clone(),
                        source,
                    }
                })?
            }
            DirectiveKind::Else => true,
            DirectiveKind::Endif => false,
        };
        blocks.push(DirectiveBlock {
            kind: raw.kind,
            condition,
            span: raw.span,
        });
    }
    Ok(blocks)
}

/// Scan adjacent pairs: an `#else` can only be followed by `#endif` (or by
/// the `#if` of a sibling chain nested inside it, which is also an `If`).
pub(crate) fn check_no_branch_after_else(
    items: impl Iterator<Item = (DirectiveKind, ByteSpan)>,
) -> Result<(), PreprocessError> {
    let mut last: Option<(DirectiveKind, ByteSpan)> = None;
    for (kind, span) in items {
        if let Some((DirectiveKind::Else, _)) = last {
            if matches!(kind, DirectiveKind::Else | DirectiveKind::Elif) {
                return Err(PreprocessError::ElseOrElifAfterElse { span });
            }
        }
        last = Some((kind, span));
    }
    Ok(())
}

/// Strip the decoration a commented-out directive tends to carry:
/// leading whitespace and `*` runs, as in `//** #if DEBUG`.
fn strip_decoration(text: &str) -> &str {
    text.trim_start_matches(|c: char| c.is_whitespace() || c == '*')
}

/// Match a directive keyword at the start of the text, requiring a word
/// boundary after it: `#ifdef` is not `#if`.
fn split_keyword(text: &str) -> Option<(DirectiveKind, &str)> {
    const KEYWORDS: [(&str, DirectiveKind); 4] = [
        ("#endif", DirectiveKind::Endif),
        ("#elif", DirectiveKind::Elif),
        ("#else", DirectiveKind::Else),
        ("#if", DirectiveKind::If),
    ];
    for (keyword, kind) in KEYWORDS {
        if let Some(rest) = text.strip_prefix(keyword) {
            let boundary = match rest.as_bytes().first() {
                None => true,
                Some(b) => !(b.is_ascii_alphanumeric() || *b == b'_'),
            };
            if boundary {
                return Some((kind, rest));
            }
        }
    }
    None
}
