//! Backward deletion at offset 0 of a line.
//!
//! The cursor context is classified first (what kind of line, whether it is
//! empty, what sits around it) and the matching restructuring is applied as
//! one step. Every action keeps the visual order of the remaining lines.

use tracing::debug;

use super::content;
use super::structure::{
    deepest_last_line, item_into_blocks, parent_item_id, replace_block_at, sibling_blocks,
    split_list, take_block_at,
};
use crate::cursor::{CursorPointer, LineRef, collect_lines, line_index};
use crate::document::{
    Block, Document, NodePath, Paragraph,
    inline,
    path::{block_ref, item_mut, item_ref, list_mut, list_ref},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BoundaryMerge {
    /// Empty item: the list splits around a paragraph that takes its place.
    SplitListAtEmptyItem,
    /// Sole empty item of a nested list: the nested list goes away.
    RemoveNestedList,
    /// First item with text: it leaves the list as a paragraph.
    ItemToParagraph,
    /// First item of a nested list directly under its parent's text.
    MergeIntoParentItem,
    /// Item with a preceding sibling: its text joins the sibling's last line.
    AppendToPreviousItem,
    /// Empty paragraph between two lists of one kind.
    MergeFlankingLists,
    RemovePrecedingRule,
    RemoveEmptyParagraph,
    JoinPreviousLine,
    /// Heading, blockquote or empty code block.
    ConvertToParagraph,
    Nothing,
}

/// Applies the boundary merge for a cursor at offset 0 and returns the new
/// cursor, or `None` when the gesture is a no-op here.
pub(crate) fn merge_at_boundary(document: &mut Document, cursor: &CursorPointer) -> Option<CursorPointer> {
    let lines = collect_lines(document);
    let index = line_index(&lines, cursor.node)?;
    let line = &lines[index];
    let previous = index.checked_sub(1).map(|idx| &lines[idx]);
    let action = classify(document, line, previous);
    debug!(?action, line = %line.id, "backspace at line start");
    apply(document, action, &lines, index)
}

fn classify(document: &Document, line: &LineRef, previous: Option<&LineRef>) -> BoundaryMerge {
    if line.path.points_to_item() {
        classify_item(document, &line.path)
    } else {
        classify_block(document, &line.path, previous)
    }
}

fn classify_item(document: &Document, path: &NodePath) -> BoundaryMerge {
    let (Some(item), Some(list_path), Some(idx)) =
        (item_ref(document, path), path.parent(), path.last_index())
    else {
        return BoundaryMerge::Nothing;
    };
    let Some(list) = list_ref(document, &list_path) else {
        return BoundaryMerge::Nothing;
    };
    let nested = parent_item_id(document, path).is_some();

    if !item.has_text() {
        if nested && list.items.len() == 1 && item.children.is_empty() {
            return BoundaryMerge::RemoveNestedList;
        }
        return BoundaryMerge::SplitListAtEmptyItem;
    }
    if idx > 0 {
        return if deepest_last_line(&list.items[idx - 1]).is_some() {
            BoundaryMerge::AppendToPreviousItem
        } else {
            BoundaryMerge::ItemToParagraph
        };
    }
    if nested && list_path.last_index() == Some(0) {
        BoundaryMerge::MergeIntoParentItem
    } else {
        BoundaryMerge::ItemToParagraph
    }
}

fn classify_block(document: &Document, path: &NodePath, previous: Option<&LineRef>) -> BoundaryMerge {
    let Some(block) = block_ref(document, path) else {
        return BoundaryMerge::Nothing;
    };
    let paragraph = match block {
        Block::Heading(_) | Block::Blockquote(_) => return BoundaryMerge::ConvertToParagraph,
        Block::CodeBlock(code) if code.text().is_empty() => {
            return BoundaryMerge::ConvertToParagraph;
        }
        Block::Paragraph(paragraph) => paragraph,
        _ => return BoundaryMerge::Nothing,
    };
    let (Some(siblings), Some(idx)) = (sibling_blocks(document, path), path.last_index()) else {
        return BoundaryMerge::Nothing;
    };
    let before = idx.checked_sub(1).and_then(|i| siblings.get(i));
    let after = siblings.get(idx + 1);
    let blank = inline::is_blank(&paragraph.content);

    if blank {
        if let (Some(Block::List(above)), Some(Block::List(below))) = (before, after) {
            if above.kind == below.kind {
                return BoundaryMerge::MergeFlankingLists;
            }
        }
    }
    if matches!(before, Some(Block::Rule(_))) {
        return BoundaryMerge::RemovePrecedingRule;
    }
    match previous {
        None => BoundaryMerge::Nothing,
        Some(_) if blank => BoundaryMerge::RemoveEmptyParagraph,
        Some(line) if content::is_code_line(document, line.id) => BoundaryMerge::Nothing,
        Some(_) => BoundaryMerge::JoinPreviousLine,
    }
}

fn apply(
    document: &mut Document,
    action: BoundaryMerge,
    lines: &[LineRef],
    index: usize,
) -> Option<CursorPointer> {
    let line = &lines[index];
    let previous_end = index
        .checked_sub(1)
        .map(|idx| CursorPointer::new(lines[idx].id, lines[idx].len));

    match action {
        BoundaryMerge::SplitListAtEmptyItem | BoundaryMerge::ItemToParagraph => {
            let list_path = line.path.parent()?;
            let idx = line.path.last_index()?;
            split_list(document, &list_path, idx..idx + 1, |_, items| {
                items.into_iter().flat_map(item_into_blocks).collect()
            })
            .then(|| CursorPointer::start_of(line.id))
        }
        BoundaryMerge::RemoveNestedList => {
            let list_path = line.path.parent()?;
            let parent = parent_item_id(document, &line.path)?;
            let target = match index.checked_sub(1).map(|idx| &lines[idx]) {
                Some(prev) if prev.id == parent && prev.len == 0 && index >= 2 => {
                    let before = &lines[index - 2];
                    CursorPointer::new(before.id, before.len)
                }
                _ => previous_end?,
            };
            take_block_at(document, &list_path)?;
            Some(target)
        }
        BoundaryMerge::MergeIntoParentItem => {
            let list_path = line.path.parent()?;
            let parent_path = list_path.container()?;
            let list_idx = list_path.last_index()?;
            let item = list_mut(document, &list_path)?.items.remove(0);
            let parent = item_mut(document, &parent_path)?;
            let offset = inline::content_len(&parent.content);
            inline::append(&mut parent.content, item.content);
            parent.children.splice(list_idx..list_idx, item.children);
            Some(CursorPointer::new(parent.id, offset))
        }
        BoundaryMerge::AppendToPreviousItem => {
            let list_path = line.path.parent()?;
            let idx = line.path.last_index()?;
            let previous_item = list_path.child_item(idx - 1);
            let target = deepest_last_line(item_ref(document, &previous_item)?)?;
            let item = list_mut(document, &list_path)?.items.remove(idx);
            let offset = content::append(document, target, item.content)?;
            item_mut(document, &previous_item)?
                .children
                .extend(item.children);
            Some(CursorPointer::new(target, offset))
        }
        BoundaryMerge::MergeFlankingLists => {
            let idx = line.path.last_index()?;
            take_block_at(document, &line.path)?;
            let Block::List(below) = take_block_at(document, &line.path)? else {
                return None;
            };
            let above_path = line.path.with_last_index(idx.checked_sub(1)?);
            list_mut(document, &above_path)?.items.extend(below.items);
            previous_end
        }
        BoundaryMerge::RemovePrecedingRule => {
            let idx = line.path.last_index()?;
            take_block_at(document, &line.path.with_last_index(idx.checked_sub(1)?))?;
            Some(CursorPointer::start_of(line.id))
        }
        BoundaryMerge::RemoveEmptyParagraph => {
            let target = previous_end?;
            take_block_at(document, &line.path)?;
            Some(target)
        }
        BoundaryMerge::JoinPreviousLine => {
            let target = previous_end?;
            let removed = take_block_at(document, &line.path)?;
            let moved = removed.content().map(<[_]>::to_vec).unwrap_or_default();
            let offset = content::append(document, target.node, moved)?;
            Some(CursorPointer::new(target.node, offset))
        }
        BoundaryMerge::ConvertToParagraph => {
            let content = match block_ref(document, &line.path)? {
                Block::CodeBlock(_) => vec![inline::Inline::Placeholder],
                block => block.content()?.to_vec(),
            };
            let paragraph = Paragraph {
                id: line.id,
                content,
            };
            replace_block_at(document, &line.path, Block::Paragraph(paragraph))
                .then(|| CursorPointer::start_of(line.id))
        }
        BoundaryMerge::Nothing => None,
    }
}

#[cfg(test)]
#[path = "backspace_tests.rs"]
mod backspace_tests;
