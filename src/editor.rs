//! Gesture dispatch over the document tree.
//!
//! `DocumentEditor` owns the tree and the selection. A gesture resolves the
//! cursor context, hands structural work to one of the engines below, then
//! runs the repair pass and settles the selection on nodes that still exist.
//! Every gesture is total: a request that does not apply returns `false` and
//! leaves the tree alone.

use std::mem;

use tracing::debug;

use crate::cursor::{
    CursorPointer, LineKind, LinePosition, LineRef, Selection, collect_lines, document_start,
    line_index, line_len, locate, resolve,
};
use crate::document::{
    Block, Blockquote, Document, Inline, ListItem, ListKind, Paragraph, inline, normalize,
    path::{item_mut, list_mut, list_ref, path_of},
};
use crate::html;
use crate::markdown::{self, EncodeOptions};

mod backspace;
mod content;
mod indent;
mod paste;
mod structure;

pub use paste::ClipboardPayload;

use paste::Paste;
use structure::{insert_block_at, remove_item_keeping_children, replace_block_at, take_block_at};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EditorConfig {
    pub encode: EncodeOptions,
    /// Turn single-line URL pastes into links.
    pub autolink_pastes: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            encode: EncodeOptions::default(),
            autolink_pastes: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DocumentEditor {
    document: Document,
    selection: Selection,
    composing: bool,
    config: EditorConfig,
}

impl DocumentEditor {
    pub fn new(document: Document) -> Self {
        Self::with_config(document, EditorConfig::default())
    }

    pub fn with_config(mut document: Document, config: EditorConfig) -> Self {
        normalize(&mut document);
        let start = ensure_line(&mut document);
        Self {
            document,
            selection: Selection::collapsed(start),
            composing: false,
            config,
        }
    }

    pub fn from_markdown(source: &str) -> Self {
        Self::new(markdown::decode(source))
    }

    /// Replaces the whole document. The cursor moves to the document start.
    pub fn load_markdown(&mut self, source: &str) -> bool {
        self.document = markdown::decode(source);
        self.composing = false;
        let start = ensure_line(&mut self.document);
        debug!(blocks = self.document.blocks.len(), "loaded markdown");
        self.finish(start);
        true
    }

    pub fn to_markdown(&self) -> String {
        markdown::encode_with(&self.document, &self.config.encode)
    }

    pub fn to_html(&self) -> String {
        html::render(&self.document)
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn cursor_pointer(&self) -> CursorPointer {
        self.selection.collapse()
    }

    pub fn current_line(&self) -> Option<LineRef> {
        let lines = collect_lines(&self.document);
        let idx = line_index(&lines, self.selection.focus.node)?;
        lines.into_iter().nth(idx)
    }

    pub fn is_composing(&self) -> bool {
        self.composing
    }

    pub fn can_indent(&self) -> bool {
        !self.composing && indent::can_indent(&self.document, &self.selection)
    }

    pub fn can_outdent(&self) -> bool {
        !self.composing && indent::can_outdent(&self.document, &self.selection)
    }

    pub fn begin_composition(&mut self) {
        debug!("composition started");
        self.composing = true;
    }

    pub fn end_composition(&mut self) {
        debug!("composition ended");
        self.composing = false;
    }

    pub fn insert_char(&mut self, c: char) -> bool {
        let mut buffer = [0; 4];
        self.insert_text(c.encode_utf8(&mut buffer))
    }

    /// Inserts plain text, replacing the selection.
    pub fn insert_text(&mut self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        let (cursor, deleted) = self.take_selection();
        let target = content::insert_text(&mut self.document, &cursor, text)
            .map(|len| CursorPointer::new(cursor.node, cursor.offset + len));
        self.commit(cursor, target, deleted)
    }

    pub fn backspace(&mut self) -> bool {
        if !self.selection.is_collapsed() {
            let cursor = self.delete_selection();
            self.finish(cursor);
            return true;
        }
        let cursor = self.selection.focus;
        debug!(node = %cursor.node, offset = cursor.offset, composing = self.composing, "backspace");
        if cursor.offset > 0 {
            let previous = CursorPointer::new(cursor.node, cursor.offset - 1);
            if !content::delete_range(&mut self.document, cursor.node, previous.offset, cursor.offset) {
                return false;
            }
            self.finish(previous);
            return true;
        }
        if self.composing {
            return false;
        }
        match backspace::merge_at_boundary(&mut self.document, &cursor) {
            Some(target) => {
                self.finish(target);
                true
            }
            None => {
                self.settle();
                false
            }
        }
    }

    /// Forward deletion. At the end of a line the next paragraph or sibling
    /// item is joined into the current line.
    pub fn delete(&mut self) -> bool {
        if !self.selection.is_collapsed() {
            let cursor = self.delete_selection();
            self.finish(cursor);
            return true;
        }
        let cursor = self.selection.focus;
        let Some(len) = line_len(&self.document, cursor.node) else {
            return false;
        };
        if cursor.offset < len {
            if !content::delete_range(&mut self.document, cursor.node, cursor.offset, cursor.offset + 1) {
                return false;
            }
            self.finish(cursor);
            return true;
        }
        if self.composing {
            return false;
        }
        let joined = self.join_next_line(&cursor).is_some();
        if joined {
            self.finish(cursor);
        }
        joined
    }

    /// Enter.
    pub fn insert_paragraph_break(&mut self) -> bool {
        if self.composing {
            return false;
        }
        let (cursor, deleted) = self.take_selection();
        let target = self.split_line(&cursor);
        self.commit(cursor, target, deleted)
    }

    /// Shift+Enter.
    pub fn insert_line_break(&mut self) -> bool {
        let (cursor, deleted) = self.take_selection();
        let target = content::insert_inlines(&mut self.document, &cursor, vec![Inline::LineBreak])
            .map(|len| CursorPointer::new(cursor.node, cursor.offset + len));
        self.commit(cursor, target, deleted)
    }

    pub fn indent(&mut self) -> bool {
        if self.composing {
            return false;
        }
        debug!(collapsed = self.selection.is_collapsed(), "indent");
        let changed = indent::indent(&mut self.document, &self.selection);
        if changed {
            self.settle();
        }
        changed
    }

    pub fn outdent(&mut self) -> bool {
        if self.composing {
            return false;
        }
        debug!(collapsed = self.selection.is_collapsed(), "outdent");
        let changed = indent::outdent(&mut self.document, &self.selection);
        if changed {
            self.settle();
        }
        changed
    }

    pub fn paste(&mut self, payload: &ClipboardPayload) -> bool {
        if self.composing {
            return payload
                .literal_text()
                .is_some_and(|text| self.insert_text(&text));
        }
        let (start, end) = self.selection.ordered(&self.document);
        let literal = content::is_literal_context(&self.document, &start);
        let Some(paste) = paste::classify(payload, literal, self.config.autolink_pastes) else {
            return false;
        };
        match paste {
            Paste::Text(text) => {
                debug!(chars = text.chars().count(), literal, "pasting text");
                self.insert_text(&text)
            }
            Paste::Link(url)
                if !self.selection.is_collapsed() && !self.selection.spans_multiple_lines() =>
            {
                debug!(%url, "linking selection");
                if !paste::link_range(&mut self.document, start.node, start.offset, end.offset, &url) {
                    return false;
                }
                self.finish(end);
                true
            }
            Paste::Link(url) => {
                debug!(%url, "pasting link");
                let (cursor, deleted) = self.take_selection();
                let target = paste::insert_link(&mut self.document, &cursor, &url);
                self.commit(cursor, target, deleted)
            }
            Paste::Fragment(fragment) => {
                let (cursor, deleted) = self.take_selection();
                let target = paste::insert_fragment(&mut self.document, &cursor, fragment);
                self.commit(cursor, target, deleted)
            }
        }
    }

    pub fn copy_selection(&self) -> Option<ClipboardPayload> {
        paste::copy(&self.document, &self.selection)
    }

    /// Flips the checked state of the task item under the cursor.
    pub fn toggle_task(&mut self) -> bool {
        let Some(path) = path_of(&self.document, self.selection.focus.node) else {
            return false;
        };
        let in_task_list = path
            .parent()
            .filter(|_| path.points_to_item())
            .and_then(|list_path| list_ref(&self.document, &list_path))
            .is_some_and(|list| list.kind == ListKind::Task);
        if !in_task_list {
            return false;
        }
        let Some(item) = item_mut(&mut self.document, &path) else {
            return false;
        };
        item.checked = !item.checked;
        debug!(item = %item.id, checked = item.checked, "toggled task");
        true
    }

    pub fn move_left(&mut self) -> bool {
        if !self.selection.is_collapsed() {
            let (start, _) = self.selection.ordered(&self.document);
            return self.place(start);
        }
        let cursor = self.selection.focus;
        if cursor.offset > 0 {
            return self.place(CursorPointer::new(cursor.node, cursor.offset - 1));
        }
        let lines = collect_lines(&self.document);
        let Some(previous) = line_index(&lines, cursor.node)
            .and_then(|idx| idx.checked_sub(1))
            .and_then(|idx| lines.get(idx))
        else {
            return false;
        };
        self.place(CursorPointer::new(previous.id, previous.len))
    }

    pub fn move_right(&mut self) -> bool {
        if !self.selection.is_collapsed() {
            let (_, end) = self.selection.ordered(&self.document);
            return self.place(end);
        }
        let cursor = self.selection.focus;
        let lines = collect_lines(&self.document);
        let Some(idx) = line_index(&lines, cursor.node) else {
            return false;
        };
        if cursor.offset < lines[idx].len {
            return self.place(CursorPointer::new(cursor.node, cursor.offset + 1));
        }
        match lines.get(idx + 1) {
            Some(next) => self.place(CursorPointer::start_of(next.id)),
            None => false,
        }
    }

    pub fn move_up(&mut self) -> bool {
        self.move_vertically(-1)
    }

    pub fn move_down(&mut self) -> bool {
        self.move_vertically(1)
    }

    fn move_vertically(&mut self, delta: isize) -> bool {
        let Some(position) = locate(&self.document, &self.selection.focus) else {
            return false;
        };
        let Some(line) = position.line.checked_add_signed(delta) else {
            return false;
        };
        match resolve(
            &self.document,
            LinePosition {
                line,
                column: position.column,
            },
        ) {
            Some(target) => self.place(target),
            None => false,
        }
    }

    pub fn move_to_line_start(&mut self) -> bool {
        self.place(CursorPointer::start_of(self.selection.focus.node))
    }

    pub fn move_to_line_end(&mut self) -> bool {
        let node = self.selection.focus.node;
        match line_len(&self.document, node) {
            Some(len) => self.place(CursorPointer::new(node, len)),
            None => false,
        }
    }

    pub fn move_to_pointer(&mut self, pointer: CursorPointer) -> bool {
        match self.clamp(pointer) {
            Some(target) => self.place(target),
            None => false,
        }
    }

    /// Extends the selection from its anchor to `pointer`.
    pub fn select_to_pointer(&mut self, pointer: CursorPointer) -> bool {
        let Some(focus) = self.clamp(pointer) else {
            return false;
        };
        let selection = Selection::new(self.selection.anchor, focus);
        let changed = selection != self.selection;
        self.selection = selection;
        changed
    }

    pub fn set_selection(&mut self, selection: Selection) -> bool {
        let (Some(anchor), Some(focus)) = (self.clamp(selection.anchor), self.clamp(selection.focus))
        else {
            return false;
        };
        self.selection = Selection::new(anchor, focus);
        true
    }

    fn place(&mut self, cursor: CursorPointer) -> bool {
        let selection = Selection::collapsed(cursor);
        let changed = selection != self.selection;
        self.selection = selection;
        changed
    }

    fn clamp(&self, pointer: CursorPointer) -> Option<CursorPointer> {
        let len = line_len(&self.document, pointer.node)?;
        Some(CursorPointer::new(pointer.node, pointer.offset.min(len)))
    }

    fn commit(&mut self, fallback: CursorPointer, target: Option<CursorPointer>, deleted: bool) -> bool {
        let changed = target.is_some() || deleted;
        self.finish(target.unwrap_or(fallback));
        changed
    }

    fn finish(&mut self, cursor: CursorPointer) {
        self.selection = Selection::collapsed(cursor);
        self.settle();
    }

    /// Repairs the tree and moves selection endpoints off removed nodes.
    fn settle(&mut self) {
        normalize(&mut self.document);
        let fallback = ensure_line(&mut self.document);
        let anchor = self.clamp(self.selection.anchor).unwrap_or(fallback);
        let focus = self.clamp(self.selection.focus).unwrap_or(anchor);
        self.selection = Selection::new(anchor, focus);
    }

    /// Deletes a non-collapsed selection and returns the caret at its start.
    fn take_selection(&mut self) -> (CursorPointer, bool) {
        if self.selection.is_collapsed() {
            return (self.selection.focus, false);
        }
        (self.delete_selection(), true)
    }

    fn delete_selection(&mut self) -> CursorPointer {
        let (start, end) = self.selection.ordered(&self.document);
        debug!(from = %start.node, to = %end.node, "deleting selection");
        if start.node == end.node {
            content::delete_range(&mut self.document, start.node, start.offset, end.offset);
            return start;
        }
        let lines = collect_lines(&self.document);
        let (Some(first), Some(last)) = (line_index(&lines, start.node), line_index(&lines, end.node))
        else {
            return start;
        };

        let mut tail = content::slice(&self.document, end.node, end.offset, lines[last].len)
            .unwrap_or_default();
        if content::is_code_line(&self.document, end.node)
            && !content::is_code_line(&self.document, start.node)
        {
            tail = content::text_with_breaks(&inline::plain_text(&tail));
        }
        content::delete_range(&mut self.document, start.node, start.offset, lines[first].len);
        for line in lines[first + 1..=last].iter().rev() {
            let Some(path) = path_of(&self.document, line.id) else {
                continue;
            };
            if path.points_to_item() {
                remove_item_keeping_children(&mut self.document, &path);
            } else {
                take_block_at(&mut self.document, &path);
            }
        }
        content::append(&mut self.document, start.node, tail);
        start
    }

    fn join_next_line(&mut self, cursor: &CursorPointer) -> Option<()> {
        let lines = collect_lines(&self.document);
        let idx = line_index(&lines, cursor.node)?;
        let (line, next) = (&lines[idx], lines.get(idx + 1)?);
        if line.kind == LineKind::CodeBlock {
            return None;
        }
        let sibling_item = line.path.points_to_item()
            && next.path.points_to_item()
            && next.path.parent() == line.path.parent();
        debug!(next = %next.id, sibling_item, "joining next line");

        if next.kind == LineKind::Paragraph {
            let removed = take_block_at(&mut self.document, &next.path)?;
            let moved = removed.content().map(<[_]>::to_vec).unwrap_or_default();
            content::append(&mut self.document, line.id, moved)?;
            return Some(());
        }
        if !sibling_item {
            return None;
        }
        let list_path = next.path.parent()?;
        let item = list_mut(&mut self.document, &list_path)?
            .items
            .remove(next.path.last_index()?);
        content::append(&mut self.document, line.id, item.content)?;
        item_mut(&mut self.document, &line.path)?
            .children
            .extend(item.children);
        Some(())
    }

    /// Splits the line at the cursor and returns the caret on the new line.
    fn split_line(&mut self, cursor: &CursorPointer) -> Option<CursorPointer> {
        let lines = collect_lines(&self.document);
        let line = lines.get(line_index(&lines, cursor.node)?)?;
        let path = &line.path;
        let blank = line.len == 0;
        debug!(kind = ?line.kind, offset = cursor.offset, blank, "paragraph break");

        match line.kind {
            LineKind::CodeBlock => {
                let len = content::insert_text(&mut self.document, cursor, "\n")?;
                Some(CursorPointer::new(cursor.node, cursor.offset + len))
            }
            LineKind::ListItem(_) if blank => {
                let selection = Selection::collapsed(*cursor);
                indent::outdent(&mut self.document, &selection).then_some(*cursor)
            }
            LineKind::ListItem(_) => {
                let mut tail = content::take_tail(&mut self.document, cursor)?;
                inline::canonicalize(&mut tail);
                let children = mem::take(&mut item_mut(&mut self.document, path)?.children);
                let next = ListItem::new(tail).with_children(children);
                let id = next.id;
                let at = path.last_index()? + 1;
                list_mut(&mut self.document, &path.parent()?)?
                    .items
                    .insert(at, next);
                Some(CursorPointer::start_of(id))
            }
            LineKind::Heading(_) if cursor.offset == 0 && !blank => {
                insert_block_at(&mut self.document, path, Block::Paragraph(Paragraph::empty()))
                    .then_some(*cursor)
            }
            LineKind::Blockquote if blank => {
                let paragraph = Paragraph {
                    id: line.id,
                    content: vec![Inline::Placeholder],
                };
                replace_block_at(&mut self.document, path, Block::Paragraph(paragraph))
                    .then_some(*cursor)
            }
            LineKind::Blockquote | LineKind::Paragraph | LineKind::Heading(_) => {
                let mut tail = content::take_tail(&mut self.document, cursor)?;
                inline::canonicalize(&mut tail);
                let block = if line.kind == LineKind::Blockquote {
                    Block::Blockquote(Blockquote::new(tail))
                } else {
                    Block::Paragraph(Paragraph::new(tail))
                };
                let id = block.id();
                let after = path.with_last_index(path.last_index()? + 1);
                insert_block_at(&mut self.document, &after, block)
                    .then_some(CursorPointer::start_of(id))
            }
        }
    }
}

/// First line of the document, adding an empty paragraph when no block
/// holds an editable line.
fn ensure_line(document: &mut Document) -> CursorPointer {
    if let Some(start) = document_start(document) {
        return start;
    }
    let paragraph = Paragraph::empty();
    let start = CursorPointer::start_of(paragraph.id);
    document.blocks.push(Block::Paragraph(paragraph));
    start
}

#[cfg(test)]
#[path = "editor_tests.rs"]
mod editor_tests;
