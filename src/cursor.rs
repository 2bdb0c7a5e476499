//! Cursor and selection model.
//!
//! A cursor names the node whose inline run holds the caret plus a character
//! offset into that run. Every query here is read-only; positions are
//! re-resolved from node identities on each call.

use std::cmp::Ordering;

use crate::document::{
    Block, Document, ListKind, NodeId, NodePath,
    inline::{self, Inline},
    path::{block_ref, item_ref, path_of},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CursorPointer {
    pub node: NodeId,
    pub offset: usize,
}

impl CursorPointer {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }

    pub fn start_of(node: NodeId) -> Self {
        Self { node, offset: 0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Selection {
    pub anchor: CursorPointer,
    pub focus: CursorPointer,
}

impl Selection {
    pub fn new(anchor: CursorPointer, focus: CursorPointer) -> Self {
        Self { anchor, focus }
    }

    pub fn collapsed(cursor: CursorPointer) -> Self {
        Self {
            anchor: cursor,
            focus: cursor,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    /// The caret a collapsed selection keeps: the focus.
    pub fn collapse(&self) -> CursorPointer {
        self.focus
    }

    /// Endpoints in document order.
    pub fn ordered(&self, document: &Document) -> (CursorPointer, CursorPointer) {
        match compare(document, &self.anchor, &self.focus) {
            Some(Ordering::Greater) => (self.focus, self.anchor),
            _ => (self.anchor, self.focus),
        }
    }

    pub fn spans_multiple_lines(&self) -> bool {
        self.anchor.node != self.focus.node
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineKind {
    Paragraph,
    Heading(u8),
    Blockquote,
    CodeBlock,
    ListItem(ListKind),
}

/// A node that owns an editable inline run, in visual order.
#[derive(Clone, Debug, PartialEq)]
pub struct LineRef {
    pub id: NodeId,
    pub path: NodePath,
    pub kind: LineKind,
    pub depth: usize,
    pub len: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinePosition {
    pub line: usize,
    pub column: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundaryKind {
    ListItem,
    Blockquote,
    CodeBlock,
}

pub fn collect_lines(document: &Document) -> Vec<LineRef> {
    let mut lines = Vec::new();
    collect_block_lines(&document.blocks, &NodePath::default(), &mut lines);
    lines
}

fn collect_block_lines(blocks: &[Block], container: &NodePath, out: &mut Vec<LineRef>) {
    for (idx, block) in blocks.iter().enumerate() {
        let path = container.child_block(idx);
        let depth = path.list_depth();
        let (kind, len) = match block {
            Block::Paragraph(p) => (LineKind::Paragraph, inline::content_len(&p.content)),
            Block::Heading(h) => (LineKind::Heading(h.level), inline::content_len(&h.content)),
            Block::Blockquote(q) => (LineKind::Blockquote, inline::content_len(&q.content)),
            Block::CodeBlock(code) => (LineKind::CodeBlock, code.text().chars().count()),
            Block::List(list) => {
                for (item_idx, item) in list.items.iter().enumerate() {
                    let item_path = path.child_item(item_idx);
                    out.push(LineRef {
                        id: item.id,
                        depth: item_path.list_depth(),
                        path: item_path.clone(),
                        kind: LineKind::ListItem(list.kind),
                        len: inline::content_len(&item.content),
                    });
                    collect_block_lines(&item.children, &item_path, out);
                }
                continue;
            }
            Block::Rule(_) => continue,
        };
        out.push(LineRef {
            id: block.id(),
            path,
            kind,
            depth,
            len,
        });
    }
}

/// Inline run of the line node at `path`; `None` for code blocks.
pub fn line_content<'a>(document: &'a Document, path: &NodePath) -> Option<&'a [Inline]> {
    if path.points_to_item() {
        return item_ref(document, path).map(|item| item.content.as_slice());
    }
    block_ref(document, path)?.content()
}

pub fn line_len(document: &Document, node: NodeId) -> Option<usize> {
    let path = path_of(document, node)?;
    if path.points_to_item() {
        return item_ref(document, &path).map(|item| inline::content_len(&item.content));
    }
    match block_ref(document, &path)? {
        Block::CodeBlock(code) => Some(code.text().chars().count()),
        block => block.content().map(inline::content_len),
    }
}

pub fn line_text(document: &Document, node: NodeId) -> Option<String> {
    let path = path_of(document, node)?;
    if path.points_to_item() {
        return item_ref(document, &path).map(|item| inline::plain_text(&item.content));
    }
    match block_ref(document, &path)? {
        Block::CodeBlock(code) => Some(code.text()),
        block => block.content().map(inline::plain_text),
    }
}

pub fn line_index(lines: &[LineRef], node: NodeId) -> Option<usize> {
    lines.iter().position(|line| line.id == node)
}

/// Maps a visual (line, column) position to a cursor, clamping the column.
pub fn resolve(document: &Document, position: LinePosition) -> Option<CursorPointer> {
    let lines = collect_lines(document);
    let line = lines.get(position.line)?;
    Some(CursorPointer::new(line.id, position.column.min(line.len)))
}

pub fn locate(document: &Document, cursor: &CursorPointer) -> Option<LinePosition> {
    let lines = collect_lines(document);
    let line = line_index(&lines, cursor.node)?;
    Some(LinePosition {
        line,
        column: cursor.offset.min(lines[line].len),
    })
}

pub fn compare(document: &Document, a: &CursorPointer, b: &CursorPointer) -> Option<Ordering> {
    let lines = collect_lines(document);
    let line_a = line_index(&lines, a.node)?;
    let line_b = line_index(&lines, b.node)?;
    Some(line_a.cmp(&line_b).then(a.offset.cmp(&b.offset)))
}

/// The whole inline run that holds the cursor.
pub fn range_of_line(
    document: &Document,
    cursor: &CursorPointer,
) -> Option<(CursorPointer, CursorPointer)> {
    let len = line_len(document, cursor.node)?;
    Some((
        CursorPointer::start_of(cursor.node),
        CursorPointer::new(cursor.node, len),
    ))
}

pub fn is_at_line_start(document: &Document, cursor: &CursorPointer) -> bool {
    line_len(document, cursor.node).is_some() && cursor.offset == 0
}

pub fn is_at_line_end(document: &Document, cursor: &CursorPointer) -> bool {
    line_len(document, cursor.node).is_some_and(|len| cursor.offset >= len)
}

pub fn is_at_structural_boundary(
    document: &Document,
    cursor: &CursorPointer,
    kind: BoundaryKind,
) -> bool {
    if cursor.offset != 0 {
        return false;
    }
    let Some(path) = path_of(document, cursor.node) else {
        return false;
    };
    match kind {
        BoundaryKind::ListItem => path.points_to_item(),
        BoundaryKind::Blockquote => {
            matches!(block_ref(document, &path), Some(Block::Blockquote(_)))
        }
        BoundaryKind::CodeBlock => {
            matches!(block_ref(document, &path), Some(Block::CodeBlock(_)))
        }
    }
}

/// Line and offset of the first editable position in the document.
pub fn document_start(document: &Document) -> Option<CursorPointer> {
    collect_lines(document)
        .first()
        .map(|line| CursorPointer::start_of(line.id))
}

#[cfg(test)]
#[path = "cursor_tests.rs"]
mod cursor_tests;
