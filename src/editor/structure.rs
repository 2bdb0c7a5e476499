use std::ops::Range;

use crate::document::{
    Block, Document, List, ListItem, ListKind, NodeId, NodePath, Paragraph,
    path::{container_mut, container_ref, item_ref},
};

pub(crate) fn take_block_at(document: &mut Document, path: &NodePath) -> Option<Block> {
    let container = container_mut(document, &path.container()?)?;
    let idx = path.last_index()?;
    if idx < container.len() {
        Some(container.remove(idx))
    } else {
        None
    }
}

pub(crate) fn replace_block_at(document: &mut Document, path: &NodePath, block: Block) -> bool {
    let Some(container) = path.container().and_then(|c| container_mut(document, &c)) else {
        return false;
    };
    match path.last_index().and_then(|idx| container.get_mut(idx)) {
        Some(slot) => {
            *slot = block;
            true
        }
        None => false,
    }
}

/// Inserts `block` so that it ends up at `path`.
pub(crate) fn insert_block_at(document: &mut Document, path: &NodePath, block: Block) -> bool {
    let (Some(container_path), Some(idx)) = (path.container(), path.last_index()) else {
        return false;
    };
    let Some(container) = container_mut(document, &container_path) else {
        return false;
    };
    container.insert(idx.min(container.len()), block);
    true
}

pub(crate) fn sibling_blocks<'a>(document: &'a Document, path: &NodePath) -> Option<&'a [Block]> {
    container_ref(document, &path.container()?).map(Vec::as_slice)
}

/// Turns an item into a paragraph that keeps the item's identity, followed by
/// the item's nested blocks lifted to the paragraph's level.
pub(crate) fn item_into_blocks(item: ListItem) -> Vec<Block> {
    let mut blocks = Vec::with_capacity(item.children.len() + 1);
    blocks.push(Block::Paragraph(Paragraph {
        id: item.id,
        content: item.content,
    }));
    blocks.extend(item.children);
    blocks
}

/// Splits the list at `list_path` around `range`: the items before stay in
/// the list, the selected items are replaced in place by `replace`, and the
/// items after continue in a new list of the same kind.
pub(crate) fn split_list<F>(
    document: &mut Document,
    list_path: &NodePath,
    range: Range<usize>,
    replace: F,
) -> bool
where
    F: FnOnce(ListKind, Vec<ListItem>) -> Vec<Block>,
{
    let (Some(container_path), Some(idx)) = (list_path.container(), list_path.last_index()) else {
        return false;
    };
    let Some(container) = container_mut(document, &container_path) else {
        return false;
    };
    let (kind, selected, after, head_empty) = {
        let Some(Block::List(list)) = container.get_mut(idx) else {
            return false;
        };
        if range.start >= range.end || range.end > list.items.len() {
            return false;
        }
        let after = list.items.split_off(range.end);
        let selected = list.items.split_off(range.start);
        (list.kind, selected, after, list.items.is_empty())
    };

    let mut blocks = replace(kind, selected);
    if !after.is_empty() {
        blocks.push(Block::List(List::new(kind, after)));
    }
    let at = if head_empty {
        container.remove(idx);
        idx
    } else {
        idx + 1
    };
    container.splice(at..at, blocks);
    true
}

/// Removes an item from its list, keeping its nested blocks at the item's
/// position so that the visual order of every other line is unchanged.
pub(crate) fn remove_item_keeping_children(document: &mut Document, item_path: &NodePath) -> bool {
    let (Some(list_path), Some(idx)) = (item_path.parent(), item_path.last_index()) else {
        return false;
    };
    split_list(document, &list_path, idx..idx + 1, |_, items| {
        items.into_iter().flat_map(|item| item.children).collect()
    })
}

/// The line that ends the item visually: the item itself, or the deepest
/// last line among its nested blocks. `None` when the item ends with a block
/// that cannot take text (a code block or a rule).
pub(crate) fn deepest_last_line(item: &ListItem) -> Option<NodeId> {
    match item.children.last() {
        None => Some(item.id),
        Some(Block::List(list)) => list.items.last().and_then(deepest_last_line),
        Some(block @ (Block::Paragraph(_) | Block::Heading(_) | Block::Blockquote(_))) => {
            Some(block.id())
        }
        Some(Block::CodeBlock(_) | Block::Rule(_)) => None,
    }
}

/// Number of items starting at `start` whose ids follow `run` in order.
pub(crate) fn matching_run_len(items: &[ListItem], start: usize, run: &[NodeId]) -> usize {
    items
        .get(start..)
        .unwrap_or_default()
        .iter()
        .zip(run)
        .take_while(|(item, id)| item.id == **id)
        .count()
}

pub(crate) fn parent_item_id(document: &Document, item_path: &NodePath) -> Option<NodeId> {
    let container = item_path.parent()?.container()?;
    if container.is_empty() {
        return None;
    }
    item_ref(document, &container).map(|item| item.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{normalize, path::path_of};
    use crate::markdown;

    #[test]
    fn split_list_places_blocks_between_halves() {
        let mut document = markdown::decode("- a\n- b\n- c");
        let b = document.blocks[0].as_list().expect("list").items[1].id;
        let path = path_of(&document, b).expect("path");
        let list_path = path.parent().expect("list");
        assert!(split_list(&mut document, &list_path, 1..2, |_, items| {
            items.into_iter().flat_map(item_into_blocks).collect()
        }));
        assert_eq!(markdown::encode(&document), "- a\n\nb\n\n- c\n");
        assert_eq!(document.blocks[1].id(), b);
    }

    #[test]
    fn removing_an_item_keeps_its_children_in_place() {
        let mut document = markdown::decode("- a\n- b\n  - b1\n- c");
        let b = document.blocks[0].as_list().expect("list").items[1].id;
        let path = path_of(&document, b).expect("path");
        assert!(remove_item_keeping_children(&mut document, &path));
        normalize(&mut document);
        assert_eq!(markdown::encode(&document), "- a\n- b1\n- c\n");
    }

    #[test]
    fn deepest_last_line_descends_nested_lists() {
        let leaf = ListItem::text("leaf");
        let leaf_id = leaf.id;
        let item = ListItem::text("top")
            .with_children(vec![Block::List(List::new(ListKind::Ordered, vec![leaf]))]);
        assert_eq!(deepest_last_line(&item), Some(leaf_id));
        let bare = ListItem::text("bare");
        assert_eq!(deepest_last_line(&bare), Some(bare.id));
    }
}
