//! Output assembly.
//!
//! The resolved forest is turned back into source text with a cut-point
//! list: an ordered sequence of byte offsets, seeded with 0 and terminated
//! with the source length, read two at a time as the ranges to keep.
//! A retained branch contributes two cuts (its marker comments); a dropped
//! branch contributes one cut spanning markers and body wholesale, nested
//! directives included.

use jspp_common::ByteSpan;

use crate::branch::{BranchArena, BranchForest, BranchId};

/// Produce the transformed source for a non-empty forest.
pub(crate) fn compile(source: &str, forest: &BranchForest) -> String {
    let mut cuts: Vec<u32> = vec![0];
    for &root in &forest.roots {
        visit(&forest.arena, root, &mut cuts);
    }
    cuts.push(source.len() as u32);

    let mut output = String::with_capacity(source.len());
    for pair in cuts.chunks_exact(2) {
        output.push_str(ByteSpan::new(pair[0], pair[1]).get_text(source));
    }
    output
}

fn visit(arena: &BranchArena, id: BranchId, cuts: &mut Vec<u32>) {
    let node = arena.node(id);

    if !node.condition.is_true() {
        // Drop markers and body as one unit; children go with the body.
        cuts.push(node.open_span.start);
        cuts.push(node.close_span.end);
        return;
    }

    // Drop the opening marker only, keep the body.
    cuts.push(node.open_span.start);
    cuts.push(node.open_span.end);
    for &child in &node.children {
        visit(arena, child, cuts);
    }
    // Drop the closing marker only.
    cuts.push(node.close_span.start);
    cuts.push(node.close_span.end);
}
