//! Branch tree resolution.
//!
//! The flat directive list becomes a forest of branch nodes, one root per
//! top-level `#if`. Nodes live in a `BranchArena` and refer to each other by
//! `BranchId`, so the nested structure carries no pointers.
//!
//! An `#elif`/`#else` is treated as "close the current link, open a sibling
//! link": the popped node's close span becomes the new node's open span, and
//! the chain condition propagates — once any sibling resolved `True`, every
//! later sibling is `Moot` no matter what its own operand evaluated to.

use jspp_common::{ByteSpan, Diagnostic, diagnostics::codes};

use crate::PreprocessError;
use crate::directive::{self, DirectiveBlock, DirectiveKind};

/// Resolved inclusion decision for one branch.
///
/// `False` and `Moot` both drop content; `Moot` specifically marks a branch
/// that can never be selected because an earlier sibling already matched,
/// which keeps the two cases distinguishable in tests and debug output.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    True,
    False,
    Moot,
}

impl Condition {
    pub fn is_true(self) -> bool {
        matches!(self, Condition::True)
    }

    fn from_bool(b: bool) -> Condition {
        if b { Condition::True } else { Condition::False }
    }

    /// Chain propagation: the condition of an `#elif`/`#else` given the
    /// previous sibling's resolved condition and its own local condition.
    fn next_sibling(prev: Condition, local: bool) -> Condition {
        match prev {
            Condition::True | Condition::Moot => Condition::Moot,
            Condition::False => Condition::from_bool(local),
        }
    }
}

/// Index of a node in its `BranchArena`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BranchId(u32);

/// One resolved branch. `kind` is never `Endif`; an `#endif` only closes.
#[derive(Clone, Debug)]
pub struct BranchNode {
    pub kind: DirectiveKind,
    pub condition: Condition,
    /// Span of the `#if`/`#elif`/`#else` comment that opened this branch.
    pub open_span: ByteSpan,
    /// Span of the comment that closed it: the matching `#endif`, or the
    /// `#elif`/`#else` that begins the next sibling.
    pub close_span: ByteSpan,
    /// Branches nested strictly inside this branch's body.
    pub children: Vec<BranchId>,
}

#[derive(Debug, Default)]
pub struct BranchArena {
    nodes: Vec<BranchNode>,
}

impl BranchArena {
    pub fn node(&self, id: BranchId) -> &BranchNode {
        &self.nodes[id.0 as usize]
    }

    fn node_mut(&mut self, id: BranchId) -> &mut BranchNode {
        &mut self.nodes[id.0 as usize]
    }

    fn alloc(&mut self, node: BranchNode) -> BranchId {
        let id = BranchId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// The resolved forest for one source file.
#[derive(Debug, Default)]
pub struct BranchForest {
    pub arena: BranchArena,
    /// Top-level chains, in source order.
    pub roots: Vec<BranchId>,
}

/// Resolve the flat block list into a forest.
///
/// Zero blocks yield an empty forest. Exactly one block cannot form a chain:
/// a warning diagnostic is pushed and the empty forest tells the caller to
/// leave the file untouched.
pub(crate) fn resolve(
    blocks: &[DirectiveBlock],
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<BranchForest, PreprocessError> {
    if blocks.is_empty() {
        return Ok(BranchForest::default());
    }
    if blocks.len() == 1 {
        let orphan = &blocks[0];
        let message = format!(
            "Must have at least 2 directives, got orphaned '{}'. Ignoring it.",
            orphan.kind
        );
        tracing::warn!(directive = %orphan.kind, span = %orphan.span, "orphaned directive");
        diagnostics.push(Diagnostic::warning(
            codes::ORPHANED_DIRECTIVE,
            orphan.span.start,
            orphan.span.len(),
            message,
        ));
        return Ok(BranchForest::default());
    }

    directive::check_no_branch_after_else(blocks.iter().map(|b| (b.kind, b.span)))?;

    let mut forest = BranchForest::default();
    let mut stack: Vec<BranchId> = Vec::new();

    for block in blocks {
        match block.kind {
            DirectiveKind::If => {
                let condition = Condition::from_bool(block.condition);
                open_branch(&mut forest, &mut stack, DirectiveKind::If, condition, block.span);
            }
            DirectiveKind::Endif | DirectiveKind::Else | DirectiveKind::Elif => {
                let Some(closed) = stack.pop() else {
                    return Err(PreprocessError::Unmatched {
                        kind: block.kind,
                        span: block.span,
                    });
                };
                forest.arena.node_mut(closed).close_span = block.span;

                if block.kind == DirectiveKind::Endif {
                    continue;
                }

                // Close current link, open the next sibling link. The syntax
                // pre-pass guarantees the closed link is an #if or #elif.
                let prev = forest.arena.node(closed).condition;
                let condition = Condition::next_sibling(prev, block.condition);
                open_branch(&mut forest, &mut stack, block.kind, condition, block.span);
            }
        }
    }

    if !stack.is_empty() {
        let open = stack
            .iter()
            .map(|&id| {
                let node = forest.arena.node(id);
                (node.kind, node.open_span)
            })
            .collect();
        return Err(PreprocessError::Unclosed { open });
    }

    Ok(forest)
}

/// Allocate a node, attach it to the innermost open branch (or the forest
/// roots), and push it as the new innermost open branch.
fn open_branch(
    forest: &mut BranchForest,
    stack: &mut Vec<BranchId>,
    kind: DirectiveKind,
    condition: Condition,
    open_span: ByteSpan,
) {
    let id = forest.arena.alloc(BranchNode {
        kind,
        condition,
        open_span,
        close_span: ByteSpan::default(),
        children: Vec::new(),
    });
    match stack.last() {
        Some(&parent) => forest.arena.node_mut(parent).children.push(id),
        None => forest.roots.push(id),
    }
    stack.push(id);
}
