//! Text-level edits on the run (or code text) a single line owns.

use crate::cursor::CursorPointer;
use crate::document::{
    Block, CodeBlock, Document, NodeId,
    inline::{self, Inline},
    path::{block_mut, block_ref, item_mut, item_ref, path_of},
};

pub(super) enum LineMut<'a> {
    Inline(&'a mut Vec<Inline>),
    Code(&'a mut CodeBlock),
}

pub(super) fn line_mut(document: &mut Document, id: NodeId) -> Option<LineMut<'_>> {
    let path = path_of(document, id)?;
    if path.points_to_item() {
        return item_mut(document, &path).map(|item| LineMut::Inline(&mut item.content));
    }
    match block_mut(document, &path)? {
        Block::CodeBlock(code) => Some(LineMut::Code(code)),
        block => block.content_mut().map(LineMut::Inline),
    }
}

/// Inline run of a line; `None` for code blocks and unknown ids.
pub(super) fn content_of(document: &Document, id: NodeId) -> Option<&[Inline]> {
    let path = path_of(document, id)?;
    if path.points_to_item() {
        return item_ref(document, &path).map(|item| item.content.as_slice());
    }
    block_ref(document, &path)?.content()
}

pub(super) fn is_code_line(document: &Document, id: NodeId) -> bool {
    path_of(document, id)
        .and_then(|path| block_ref(document, &path))
        .is_some_and(|block| matches!(block, Block::CodeBlock(_)))
}

/// True when text typed at the cursor is taken literally: inside a code block
/// or strictly inside an inline code span.
pub(super) fn is_literal_context(document: &Document, cursor: &CursorPointer) -> bool {
    if is_code_line(document, cursor.node) {
        return true;
    }
    content_of(document, cursor.node)
        .is_some_and(|content| inline::is_inside_code(content, cursor.offset))
}

/// Inserts plain text and returns how many positions it occupies. Newlines
/// become line breaks in inline runs and stay newlines in code.
pub(super) fn insert_text(document: &mut Document, cursor: &CursorPointer, text: &str) -> Option<usize> {
    match line_mut(document, cursor.node)? {
        LineMut::Code(code) => {
            let mut source = code.text();
            let idx = inline::char_to_byte_idx(&source, cursor.offset);
            source.insert_str(idx, text);
            code.set_text(&source);
            Some(text.chars().count())
        }
        LineMut::Inline(content) => {
            if !text.contains('\n') {
                inline::insert_text(content, cursor.offset, text);
                return Some(text.chars().count());
            }
            let inserted = text_with_breaks(text);
            let len = inline::content_len(&inserted);
            inline::insert_inlines(content, cursor.offset, inserted);
            Some(len)
        }
    }
}

pub(super) fn text_with_breaks(text: &str) -> Vec<Inline> {
    let mut out = Vec::new();
    for (idx, segment) in text.split('\n').enumerate() {
        if idx > 0 {
            out.push(Inline::LineBreak);
        }
        let segment = segment.strip_suffix('\r').unwrap_or(segment);
        if !segment.is_empty() {
            out.push(Inline::text(segment));
        }
    }
    out
}

/// Inserts inline nodes into a run. Code lines receive their plain text.
pub(super) fn insert_inlines(
    document: &mut Document,
    cursor: &CursorPointer,
    inserted: Vec<Inline>,
) -> Option<usize> {
    if is_code_line(document, cursor.node) {
        return insert_text(document, cursor, &inline::plain_text(&inserted));
    }
    let LineMut::Inline(content) = line_mut(document, cursor.node)? else {
        return None;
    };
    let len = inline::content_len(&inserted);
    inline::insert_inlines(content, cursor.offset, inserted);
    Some(len)
}

pub(super) fn delete_range(document: &mut Document, id: NodeId, start: usize, end: usize) -> bool {
    if end <= start {
        return false;
    }
    match line_mut(document, id) {
        Some(LineMut::Code(code)) => {
            let source = code.text();
            let from = inline::char_to_byte_idx(&source, start);
            let to = inline::char_to_byte_idx(&source, end);
            if from == to {
                return false;
            }
            let mut updated = String::with_capacity(source.len());
            updated.push_str(&source[..from]);
            updated.push_str(&source[to..]);
            code.set_text(&updated);
            true
        }
        Some(LineMut::Inline(content)) => {
            let before = inline::content_len(content);
            inline::delete_range(content, start, end);
            inline::content_len(content) != before
        }
        None => false,
    }
}

/// Cuts the run at the cursor, returning everything after it.
pub(super) fn take_tail(document: &mut Document, cursor: &CursorPointer) -> Option<Vec<Inline>> {
    let LineMut::Inline(content) = line_mut(document, cursor.node)? else {
        return None;
    };
    let (head, tail) = inline::split_at(std::mem::take(content), cursor.offset);
    *content = head;
    inline::canonicalize(content);
    Some(tail)
}

/// Appends to the end of a line and returns the offset where the appended
/// content starts.
pub(super) fn append(document: &mut Document, id: NodeId, other: Vec<Inline>) -> Option<usize> {
    match line_mut(document, id)? {
        LineMut::Inline(content) => {
            let len = inline::content_len(content);
            inline::append(content, other);
            Some(len)
        }
        LineMut::Code(code) => {
            let len = code.text().chars().count();
            let mut source = code.text();
            source.push_str(&inline::plain_text(&other));
            code.set_text(&source);
            Some(len)
        }
    }
}

/// Copy of `[start, end)` of a line. Code lines yield their text.
pub(super) fn slice(document: &Document, id: NodeId, start: usize, end: usize) -> Option<Vec<Inline>> {
    if let Some(content) = content_of(document, id) {
        return Some(inline::slice(content, start, end));
    }
    let text = crate::cursor::line_text(document, id)?;
    let from = inline::char_to_byte_idx(&text, start);
    let to = inline::char_to_byte_idx(&text, end);
    Some(vec![Inline::Text(text[from..to.max(from)].to_string())])
}
