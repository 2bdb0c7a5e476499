//! Clipboard payloads in and out of the tree.
//!
//! A payload may carry plain text, this crate's canonical Markdown and
//! third-party HTML side by side. Incoming payloads are classified once and
//! then inserted in the shape the cursor context allows: literal text in
//! code, links for bare URLs, blocks otherwise (as sibling items when the
//! cursor sits in a list).

use std::mem;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::content::{self, LineMut};
use super::structure::{deepest_last_line, take_block_at};
use crate::cursor::{CursorPointer, LineKind, Selection, collect_lines, line_index, line_len};
use crate::document::{
    Block, Blockquote, CodeBlock, Document, Heading, List, ListItem, ListKind, NodeId, NodePath,
    Paragraph,
    inline::{self, Inline},
    normalize,
    path::{block_ref, container_mut, list_mut, list_ref, path_of},
};
use crate::{html, markdown};

static BARE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?:(?:https?|ftp)://[^\s<>"]+|mailto:[^\s<>"@]+@[^\s<>"]+)$"#)
        .expect("static regex")
});

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClipboardPayload {
    pub plain: Option<String>,
    /// Canonical Markdown written by `copy_selection`.
    pub markdown: Option<String>,
    pub html: Option<String>,
}

impl ClipboardPayload {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            plain: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self {
            markdown: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn html(text: impl Into<String>) -> Self {
        Self {
            html: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_plain(mut self, text: impl Into<String>) -> Self {
        self.plain = Some(text.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.plain.is_none() && self.markdown.is_none() && self.html.is_none()
    }

    /// Text to insert where pasting is literal.
    pub fn literal_text(&self) -> Option<String> {
        if let Some(plain) = &self.plain {
            return Some(plain.clone());
        }
        if let Some(markdown) = &self.markdown {
            return Some(markdown.clone());
        }
        let fragment = html::parse(self.html.as_deref()?);
        Some(
            fragment
                .outline()
                .into_iter()
                .map(|(_, text)| text)
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Paste {
    Text(String),
    Link(String),
    Fragment(Document),
}

pub(crate) fn bare_url(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    BARE_URL.is_match(trimmed).then_some(trimmed)
}

pub(crate) fn classify(payload: &ClipboardPayload, literal: bool, autolink: bool) -> Option<Paste> {
    if literal {
        return payload.literal_text().map(Paste::Text);
    }
    if let Some(source) = &payload.markdown {
        return Some(Paste::Fragment(markdown::decode(source)));
    }
    if let Some(url) = payload.plain.as_deref().filter(|_| autolink).and_then(bare_url) {
        return Some(Paste::Link(url.to_string()));
    }
    if let Some(source) = &payload.html {
        return Some(Paste::Fragment(html::parse(source)));
    }
    let plain = payload.plain.as_deref()?;
    if !plain.contains('\n') {
        return Some(Paste::Text(plain.to_string()));
    }
    let blocks = plain
        .lines()
        .map(|line| {
            if line.is_empty() {
                Block::Paragraph(Paragraph::empty())
            } else {
                Block::Paragraph(Paragraph::text(line))
            }
        })
        .collect();
    Some(Paste::Fragment(Document::new().with_blocks(blocks)))
}

/// Wraps `[start, end)` of one line in a link.
pub(crate) fn link_range(document: &mut Document, node: NodeId, start: usize, end: usize, url: &str) -> bool {
    let Some(LineMut::Inline(content)) = content::line_mut(document, node) else {
        return false;
    };
    inline::wrap_range(content, start, end, |inner| Inline::link(url, inner));
    true
}

pub(crate) fn insert_link(document: &mut Document, cursor: &CursorPointer, url: &str) -> Option<CursorPointer> {
    let link = Inline::link(url, vec![Inline::text(url)]);
    let len = content::insert_inlines(document, cursor, vec![link])?;
    Some(CursorPointer::new(cursor.node, cursor.offset + len))
}

/// Inserts decoded blocks at a collapsed cursor and returns where the cursor
/// ends up: right after the pasted content.
pub(crate) fn insert_fragment(
    document: &mut Document,
    cursor: &CursorPointer,
    fragment: Document,
) -> Option<CursorPointer> {
    let mut blocks = fragment.blocks;
    if matches!(blocks.as_slice(), [Block::Paragraph(_)]) {
        let Some(Block::Paragraph(paragraph)) = blocks.pop() else {
            return None;
        };
        let len = content::insert_inlines(document, cursor, paragraph.content)?;
        return Some(CursorPointer::new(cursor.node, cursor.offset + len));
    }
    if blocks.is_empty() {
        return None;
    }
    let path = path_of(document, cursor.node)?;
    debug!(blocks = blocks.len(), into_list = path.points_to_item(), "pasting blocks");
    if path.points_to_item() {
        insert_as_items(document, &path, cursor, blocks)
    } else {
        insert_as_blocks(document, &path, cursor, blocks)
    }
}

/// List items for pasting into a list of `kind`. Text blocks become items,
/// list items keep their nesting, and code blocks or rules attach to the
/// item before them.
fn blocks_into_items(blocks: Vec<Block>, kind: ListKind) -> Vec<ListItem> {
    let mut items: Vec<ListItem> = Vec::new();
    for block in blocks {
        let content = match block {
            Block::List(list) => {
                items.extend(list.items.into_iter().map(|mut item| {
                    item.checked &= kind == ListKind::Task;
                    item
                }));
                continue;
            }
            Block::Paragraph(Paragraph { content, .. })
            | Block::Heading(Heading { content, .. })
            | Block::Blockquote(Blockquote { content, .. }) => content,
            other => {
                match items.last_mut() {
                    Some(last) => last.children.push(other),
                    None => items.push(ListItem::empty().with_children(vec![other])),
                }
                continue;
            }
        };
        items.push(ListItem::new(content));
    }
    items
}

fn insert_as_items(
    document: &mut Document,
    path: &NodePath,
    cursor: &CursorPointer,
    blocks: Vec<Block>,
) -> Option<CursorPointer> {
    let list_path = path.parent()?;
    let idx = path.last_index()?;
    let kind = list_ref(document, &list_path)?.kind;
    let mut pasted = blocks_into_items(blocks, kind).into_iter();
    let first = pasted.next()?;

    let list = list_mut(document, &list_path)?;
    let mut current = list.items.remove(idx);
    let (head, tail) = inline::split_at(mem::take(&mut current.content), cursor.offset);
    current.content = head;
    current.content.extend(first.content);
    let moved_children = mem::replace(&mut current.children, first.children);

    let mut run = vec![current];
    run.extend(pasted);
    let last = run.last_mut()?;
    let target = CursorPointer::new(last.id, inline::content_len(&last.content));
    last.content.extend(tail);
    last.children.extend(moved_children);
    for item in &mut run {
        inline::canonicalize(&mut item.content);
    }
    list.items.splice(idx..idx, run);
    Some(target)
}

fn insert_as_blocks(
    document: &mut Document,
    path: &NodePath,
    cursor: &CursorPointer,
    mut blocks: Vec<Block>,
) -> Option<CursorPointer> {
    let container_path = path.container()?;
    let idx = path.last_index()?;
    let tail = content::take_tail(document, cursor)?;
    let current_is_empty_paragraph =
        block_ref(document, path).is_some_and(Block::is_empty_paragraph);

    let mut at = idx + 1;
    if matches!(blocks.first(), Some(Block::Paragraph(_))) {
        if let Block::Paragraph(first) = blocks.remove(0) {
            content::append(document, cursor.node, first.content)?;
        }
    } else if current_is_empty_paragraph {
        take_block_at(document, path)?;
        at = idx;
    }

    if blocks.is_empty() {
        let offset = content::append(document, cursor.node, tail)?;
        return Some(CursorPointer::new(cursor.node, offset));
    }
    let mut end_of = None;
    let target = if let Some(Block::Paragraph(last)) = blocks.last_mut() {
        let offset = inline::content_len(&last.content);
        inline::append(&mut last.content, tail);
        inline::canonicalize(&mut last.content);
        Some(CursorPointer::new(last.id, offset))
    } else {
        let last_line = blocks
            .last()
            .and_then(last_line_id)
            .filter(|_| inline::is_blank(&tail));
        match last_line {
            Some(id) => {
                end_of = Some(id);
                None
            }
            None => {
                let mut content = tail;
                inline::canonicalize(&mut content);
                let paragraph = Paragraph::new(content);
                let id = paragraph.id;
                blocks.push(Block::Paragraph(paragraph));
                Some(CursorPointer::start_of(id))
            }
        }
    };

    let container = container_mut(document, &container_path)?;
    let at = at.min(container.len());
    container.splice(at..at, blocks);
    match (target, end_of) {
        (Some(target), _) => Some(target),
        (None, Some(id)) => Some(CursorPointer::new(id, line_len(document, id)?)),
        (None, None) => None,
    }
}

fn last_line_id(block: &Block) -> Option<NodeId> {
    match block {
        Block::List(list) => list.items.last().and_then(deepest_last_line),
        Block::Rule(_) => None,
        other => Some(other.id()),
    }
}

/// Payload for the selected range. Within one line the copy is inline text;
/// across lines every covered line becomes its own paragraph, and code lines
/// stay code blocks.
pub(crate) fn copy(document: &Document, selection: &Selection) -> Option<ClipboardPayload> {
    if selection.is_collapsed() {
        return None;
    }
    let (start, end) = selection.ordered(document);
    let lines = collect_lines(document);
    let first = line_index(&lines, start.node)?;
    let last = line_index(&lines, end.node)?;

    let whole_lines = first < last && start.offset == 0 && end.offset == lines[last].len;
    if whole_lines {
        let plain = lines[first..=last]
            .iter()
            .filter_map(|line| content::slice(document, line.id, 0, line.len))
            .map(|piece| inline::plain_text(&piece))
            .collect::<Vec<_>>()
            .join("\n");
        let mut subtree = SubtreeCopy {
            first,
            last,
            seen: 0,
        };
        let mut fragment = Document::new().with_blocks(subtree.blocks(&document.blocks));
        normalize(&mut fragment);
        debug!(lines = last - first + 1, "copied whole lines");
        return Some(ClipboardPayload {
            plain: Some(plain),
            markdown: Some(markdown::encode(&fragment)),
            html: Some(html::render(&fragment)),
        });
    }

    let mut blocks = Vec::with_capacity(last - first + 1);
    let mut plain = Vec::with_capacity(last - first + 1);
    for (idx, line) in lines.iter().enumerate().take(last + 1).skip(first) {
        let from = if idx == first { start.offset } else { 0 };
        let to = if idx == last { end.offset } else { line.len };
        let piece = content::slice(document, line.id, from, to)?;
        let text = inline::plain_text(&piece);
        let block = match (line.kind, first == last) {
            (LineKind::CodeBlock, false) => {
                let language = match block_ref(document, &line.path) {
                    Some(Block::CodeBlock(code)) => code.language.clone(),
                    _ => String::new(),
                };
                Block::CodeBlock(CodeBlock::new(
                    language,
                    text.split('\n').map(str::to_string).collect(),
                ))
            }
            (LineKind::CodeBlock, true) => Block::Paragraph(Paragraph::new(content::text_with_breaks(&text))),
            _ => Block::Paragraph(Paragraph::new(piece)),
        };
        plain.push(text);
        blocks.push(block);
    }

    let mut fragment = Document::new().with_blocks(blocks);
    normalize(&mut fragment);
    Some(ClipboardPayload {
        plain: Some(plain.join("\n")),
        markdown: Some(markdown::encode(&fragment)),
        html: Some(html::render(&fragment)),
    })
}

/// Copies the blocks holding lines `first..=last` (in visual order) with
/// their list kinds, task state and nesting. Items above the range that only
/// contain selected lines are dropped and their selected blocks lifted.
struct SubtreeCopy {
    first: usize,
    last: usize,
    seen: usize,
}

impl SubtreeCopy {
    fn take_line(&mut self) -> bool {
        let idx = self.seen;
        self.seen += 1;
        (self.first..=self.last).contains(&idx)
    }

    fn blocks(&mut self, blocks: &[Block]) -> Vec<Block> {
        let mut out = Vec::new();
        for block in blocks {
            if self.seen > self.last {
                break;
            }
            match block {
                Block::List(list) => self.list(list, &mut out),
                Block::Rule(_) => {
                    if self.seen > self.first && self.seen <= self.last {
                        out.push(block.clone());
                    }
                }
                _ => {
                    if self.take_line() {
                        out.push(block.clone());
                    }
                }
            }
        }
        out
    }

    fn list(&mut self, list: &List, out: &mut Vec<Block>) {
        let mut items = Vec::new();
        for item in &list.items {
            if self.seen > self.last {
                break;
            }
            let selected = self.take_line();
            let children = self.blocks(&item.children);
            if selected {
                items.push(ListItem {
                    id: item.id,
                    checked: item.checked,
                    content: item.content.clone(),
                    children,
                });
            } else if !children.is_empty() {
                if !items.is_empty() {
                    out.push(Block::List(List::new(list.kind, mem::take(&mut items))));
                }
                out.extend(children);
            }
        }
        if !items.is_empty() {
            out.push(Block::List(List::new(list.kind, items)));
        }
    }
}

#[cfg(test)]
#[path = "paste_tests.rs"]
mod paste_tests;
