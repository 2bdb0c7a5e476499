use std::mem;

use thiserror::Error;
use tracing::{trace, warn};

use super::inline::{self, Inline};
use super::{Block, Blockquote, Document, Heading, ListItem, ListKind, NodeId, Paragraph};

/// Structural invariant breaches. Engine operations never surface these;
/// the repair pass corrects them and reports what it fixed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StructureViolation {
    #[error("document has no blocks")]
    EmptyDocument,
    #[error("list {0} has no items")]
    EmptyList(NodeId),
    #[error("node {0} has empty content without a placeholder")]
    MissingPlaceholder(NodeId),
    #[error("node {0} carries a placeholder next to real content")]
    StrayPlaceholder(NodeId),
    #[error("adjacent {kind} lists {first} and {second} were not merged")]
    UnmergedLists {
        kind: &'static str,
        first: NodeId,
        second: NodeId,
    },
    #[error("code block {0} has no lines")]
    EmptyCodeBlock(NodeId),
    #[error("item {0} is checked outside a task list")]
    CheckedOutsideTaskList(NodeId),
}

/// Repair pass run after every engine operation.
///
/// Drops lists without items, merges adjacent lists of the same kind,
/// canonicalizes inline runs and re-applies the placeholder rule. Returns the
/// breaches that had to be repaired.
pub fn normalize(document: &mut Document) -> Vec<StructureViolation> {
    let mut repaired = Vec::new();
    normalize_blocks(&mut document.blocks, &mut repaired);
    if document.blocks.is_empty() {
        repaired.push(StructureViolation::EmptyDocument);
        document.blocks.push(Block::Paragraph(Paragraph::empty()));
    }
    for violation in &repaired {
        warn!(%violation, "repaired document structure");
    }
    repaired
}

fn normalize_blocks(blocks: &mut Vec<Block>, repaired: &mut Vec<StructureViolation>) {
    for block in blocks.iter_mut() {
        match block {
            Block::Paragraph(p) => inline::canonicalize(&mut p.content),
            Block::Heading(h) => {
                h.level = h.level.clamp(1, 6);
                inline::canonicalize(&mut h.content);
            }
            Block::Blockquote(q) => inline::canonicalize(&mut q.content),
            Block::CodeBlock(code) => {
                if code.lines.is_empty() {
                    repaired.push(StructureViolation::EmptyCodeBlock(code.id));
                    code.lines.push(String::new());
                }
            }
            Block::List(list) => {
                let kind = list.kind;
                for item in &mut list.items {
                    normalize_item(item, kind, repaired);
                }
            }
            Block::Rule(_) => {}
        }
    }

    let before = blocks.len();
    blocks.retain(|block| match block {
        Block::List(list) if list.items.is_empty() => {
            repaired.push(StructureViolation::EmptyList(list.id));
            false
        }
        _ => true,
    });
    if blocks.len() != before {
        trace!(removed = before - blocks.len(), "dropped empty lists");
    }

    merge_adjacent_lists(blocks);
}

fn normalize_item(item: &mut ListItem, kind: ListKind, repaired: &mut Vec<StructureViolation>) {
    if kind != ListKind::Task && item.checked {
        repaired.push(StructureViolation::CheckedOutsideTaskList(item.id));
        item.checked = false;
    }
    normalize_blocks(&mut item.children, repaired);
    // An item with neither content nor children would be invisible.
    if item.content.is_empty() && item.children.is_empty() {
        repaired.push(StructureViolation::MissingPlaceholder(item.id));
    }
    inline::canonicalize(&mut item.content);
}

/// Concatenates runs of same-kind lists; lists of different kinds stay apart.
fn merge_adjacent_lists(blocks: &mut Vec<Block>) {
    let items = mem::take(blocks);
    let mut out: Vec<Block> = Vec::with_capacity(items.len());
    for block in items {
        let mergeable = matches!(
            (out.last(), &block),
            (Some(Block::List(previous)), Block::List(next)) if previous.kind == next.kind
        );
        if mergeable {
            if let (Some(Block::List(previous)), Block::List(next)) = (out.last_mut(), block) {
                trace!(into = %previous.id, from = %next.id, "merging adjacent lists");
                previous.items.extend(next.items);
            }
            continue;
        }
        out.push(block);
    }
    *blocks = out;
}

/// Checks every invariant without modifying the document.
pub fn validate(document: &Document) -> Result<(), StructureViolation> {
    if document.blocks.is_empty() {
        return Err(StructureViolation::EmptyDocument);
    }
    validate_blocks(&document.blocks)
}

fn validate_blocks(blocks: &[Block]) -> Result<(), StructureViolation> {
    for pair in blocks.windows(2) {
        if let (Block::List(first), Block::List(second)) = (&pair[0], &pair[1]) {
            if first.kind == second.kind {
                return Err(StructureViolation::UnmergedLists {
                    kind: first.kind.label(),
                    first: first.id,
                    second: second.id,
                });
            }
        }
    }
    for block in blocks {
        match block {
            Block::Paragraph(Paragraph { id, content })
            | Block::Heading(Heading { id, content, .. })
            | Block::Blockquote(Blockquote { id, content }) => {
                validate_content(*id, content)?;
            }
            Block::CodeBlock(code) if code.lines.is_empty() => {
                return Err(StructureViolation::EmptyCodeBlock(code.id));
            }
            Block::List(list) => {
                if list.items.is_empty() {
                    return Err(StructureViolation::EmptyList(list.id));
                }
                for item in &list.items {
                    if item.checked && list.kind != ListKind::Task {
                        return Err(StructureViolation::CheckedOutsideTaskList(item.id));
                    }
                    validate_content(item.id, &item.content)?;
                    validate_blocks(&item.children)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn validate_content(id: NodeId, content: &[Inline]) -> Result<(), StructureViolation> {
    let placeholders = content
        .iter()
        .filter(|inline| matches!(inline, Inline::Placeholder))
        .count();
    if inline::is_blank(content) {
        if placeholders != 1 || content.len() != 1 {
            return Err(StructureViolation::MissingPlaceholder(id));
        }
    } else if placeholders > 0 {
        return Err(StructureViolation::StrayPlaceholder(id));
    }
    Ok(())
}
