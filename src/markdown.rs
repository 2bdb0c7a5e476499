//! Markdown ⇄ document codec.
//!
//! Decoding is a line scanner covering the constructs the editor models:
//! ATX headings, fenced code, blockquotes, bullet/ordered/task lists nested by
//! content column, rules, `<br>` lines and paragraphs. Anything else degrades
//! to paragraph text. The inline runs of each block go through
//! `pulldown-cmark`. Encoding always produces the canonical form: `-`
//! bullets, tight lists, `*`/`**`/`~~` wrappers and `---` rules.

use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use crate::document::{
    Block, Blockquote, CodeBlock, Document, Heading, List, ListItem, ListKind, Paragraph,
    inline::{self as runs, Inline},
    normalize,
};

mod inline;

use inline::BreakStyle;

static ATX_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}(#{1,6})(?:[ \t]+(.*?))?[ \t]*$").expect("static regex")
});
static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^( {0,3})(`{3,}|~{3,})(.*)$").expect("static regex"));
static THEMATIC_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}(?:(?:\*[ \t]*){3,}|(?:-[ \t]*){3,}|(?:_[ \t]*){3,})$")
        .expect("static regex")
});
static BLOCKQUOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}> ?(.*)$").expect("static regex"));
static LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^( {0,3})([-*+]|\d{1,9}[.)])(?:( +)(.*))?$").expect("static regex")
});
static TASK_BOX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[([ xX])\](?: +(.*))?$").expect("static regex"));
static BREAK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^ {0,3}<br\s*/?>\s*$").expect("static regex"));

/// How ordered list items are numbered on output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OrderedNumbering {
    /// `1.`, `2.`, `3.`, …
    #[default]
    Sequential,
    /// `1.` on every item.
    Repeated,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    pub ordered_numbering: OrderedNumbering,
}

pub fn decode(source: &str) -> Document {
    let mut lines: Vec<String> = source.lines().map(expand_leading_tabs).collect();
    strip_common_indent(&mut lines);
    let mut blocks = parse_blocks(&lines);
    if blocks.is_empty() {
        blocks.push(Block::Paragraph(Paragraph::empty()));
    }
    let mut document = Document::new().with_blocks(blocks);
    normalize(&mut document);
    trace!(
        lines = lines.len(),
        blocks = document.blocks.len(),
        "decoded markdown"
    );
    document
}

pub fn encode(document: &Document) -> String {
    encode_with(document, &EncodeOptions::default())
}

pub fn encode_with(document: &Document, options: &EncodeOptions) -> String {
    let writer = BlockWriter { options };
    let lines = writer.blocks_to_lines(&document.blocks, true);
    trace!(lines = lines.len(), "encoded markdown");
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Same node kinds, text and nesting; the Markdown spelling may differ.
pub fn structurally_eq(a: &Document, b: &Document) -> bool {
    a.same_structure(b)
}

fn expand_leading_tabs(line: &str) -> String {
    let indent_len = line.len() - line.trim_start_matches([' ', '\t']).len();
    if !line[..indent_len].contains('\t') {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len() + 4);
    let mut column = 0;
    for c in line[..indent_len].chars() {
        if c == '\t' {
            let width = 4 - column % 4;
            out.extend(std::iter::repeat_n(' ', width));
            column += width;
        } else {
            out.push(c);
            column += 1;
        }
    }
    out.push_str(&line[indent_len..]);
    out
}

/// Removes the indentation shared by every non-blank line, so that a
/// document indented as a whole still starts at column 0.
fn strip_common_indent(lines: &mut [String]) {
    let common = lines
        .iter()
        .filter(|line| !is_blank(line))
        .map(|line| indent_of(line))
        .min()
        .unwrap_or(0);
    if common == 0 {
        return;
    }
    for line in lines.iter_mut() {
        let cut = common.min(indent_of(line));
        line.drain(..cut);
    }
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn is_block_start(line: &str) -> bool {
    Fence::open(line).is_some()
        || ATX_HEADING.is_match(line)
        || THEMATIC_BREAK.is_match(line)
        || BLOCKQUOTE.is_match(line)
        || ListMarker::parse(line).is_some()
        || BREAK_LINE.is_match(line)
}

/// Inline content of text lines: hard-break markers are dropped because every
/// line end already becomes a line break.
fn content_from_lines(lines: &[&str]) -> Vec<Inline> {
    let last = lines.len().saturating_sub(1);
    let joined = lines
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            let line = line.trim();
            let trailing = line.len() - line.trim_end_matches('\\').len();
            if idx < last && trailing % 2 == 1 {
                &line[..line.len() - 1]
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    let mut content = inline::parse(&joined);
    runs::canonicalize(&mut content);
    content
}

fn parse_blocks(lines: &[String]) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut idx = 0;
    while idx < lines.len() {
        let line = lines[idx].as_str();
        if is_blank(line) {
            idx += 1;
            continue;
        }
        if let Some(fence) = Fence::open(line) {
            let (block, next) = fence.parse(lines, idx);
            blocks.push(block);
            idx = next;
        } else if let Some(heading) = parse_heading(line) {
            blocks.push(heading);
            idx += 1;
        } else if THEMATIC_BREAK.is_match(line) {
            blocks.push(Block::rule());
            idx += 1;
        } else if BLOCKQUOTE.is_match(line) {
            let (block, next) = parse_blockquote(lines, idx);
            blocks.push(block);
            idx = next;
        } else if let Some(marker) = ListMarker::parse(line) {
            let (block, next) = parse_list(lines, idx, marker.kind);
            blocks.push(block);
            idx = next;
        } else if BREAK_LINE.is_match(line) {
            blocks.push(Block::Paragraph(Paragraph::empty()));
            idx += 1;
        } else {
            let (block, next) = parse_paragraph(lines, idx);
            blocks.push(block);
            idx = next;
        }
    }
    blocks
}

fn parse_heading(line: &str) -> Option<Block> {
    let caps = ATX_HEADING.captures(line)?;
    let level = caps[1].len() as u8;
    let mut text = caps.get(2).map_or("", |m| m.as_str());
    let without_closing = text.trim_end_matches('#');
    if without_closing.len() != text.len()
        && (without_closing.is_empty() || without_closing.ends_with([' ', '\t']))
    {
        text = without_closing.trim_end();
    }
    Some(Block::Heading(Heading::new(level, content_from_lines(&[text]))))
}

fn parse_paragraph(lines: &[String], start: usize) -> (Block, usize) {
    let mut text = vec![lines[start].as_str()];
    let mut idx = start + 1;
    while idx < lines.len() && !is_blank(&lines[idx]) && !is_block_start(&lines[idx]) {
        text.push(&lines[idx]);
        idx += 1;
    }
    let paragraph = Paragraph::new(content_from_lines(&text));
    (Block::Paragraph(paragraph), idx)
}

fn parse_blockquote(lines: &[String], start: usize) -> (Block, usize) {
    let mut text: Vec<&str> = Vec::new();
    let mut idx = start;
    while idx < lines.len() {
        let line = lines[idx].as_str();
        if let Some(caps) = BLOCKQUOTE.captures(line) {
            text.push(caps.get(1).map_or("", |m| m.as_str()));
            idx += 1;
            continue;
        }
        let lazy = text.last().is_some_and(|prev| !is_blank(prev));
        if lazy && !is_blank(line) && !is_block_start(line) {
            text.push(line);
            idx += 1;
            continue;
        }
        break;
    }
    let quote = Blockquote::new(content_from_lines(&text));
    (Block::Blockquote(quote), idx)
}

struct Fence {
    indent: usize,
    marker: char,
    len: usize,
    language: String,
}

impl Fence {
    fn open(line: &str) -> Option<Fence> {
        let caps = FENCE.captures(line)?;
        let run = &caps[2];
        let info = caps.get(3).map_or("", |m| m.as_str());
        let marker = run.chars().next()?;
        if marker == '`' && info.contains('`') {
            return None;
        }
        Some(Fence {
            indent: caps[1].len(),
            marker,
            len: run.len(),
            language: info.split_whitespace().next().unwrap_or_default().to_string(),
        })
    }

    fn closes(&self, line: &str) -> bool {
        let trimmed = line.trim_start_matches(' ');
        if line.len() - trimmed.len() > 3 {
            return false;
        }
        let run = trimmed.len() - trimmed.trim_start_matches(self.marker).len();
        run >= self.len && trimmed[run..].trim().is_empty()
    }

    /// Consumes the fence and its body; an unclosed fence runs to the end.
    fn parse(&self, lines: &[String], start: usize) -> (Block, usize) {
        let mut body = Vec::new();
        let mut idx = start + 1;
        while idx < lines.len() {
            let line = &lines[idx];
            idx += 1;
            if self.closes(line) {
                break;
            }
            let strip = indent_of(line).min(self.indent);
            body.push(line[strip..].to_string());
        }
        if body.is_empty() {
            body.push(String::new());
        }
        (
            Block::CodeBlock(CodeBlock::new(self.language.clone(), body)),
            idx,
        )
    }
}

struct ListMarker {
    kind: ListKind,
    checked: bool,
    /// Column where the item's content starts; deeper lines belong to it.
    column: usize,
    text: String,
}

impl ListMarker {
    fn parse(line: &str) -> Option<ListMarker> {
        let caps = LIST_ITEM.captures(line)?;
        let indent = caps[1].len();
        let marker = &caps[2];
        let spaces = caps.get(3).map_or(0, |m| m.len());
        let rest = caps.get(4).map_or("", |m| m.as_str());

        let (column, mut text) = if rest.trim().is_empty() {
            (indent + marker.len() + 1, String::new())
        } else if spaces > 4 {
            (
                indent + marker.len() + 1,
                format!("{}{rest}", " ".repeat(spaces - 1)),
            )
        } else {
            (indent + marker.len() + spaces, rest.to_string())
        };

        let mut kind = if marker.starts_with(|c: char| c.is_ascii_digit()) {
            ListKind::Ordered
        } else {
            ListKind::Bullet
        };
        let mut checked = false;
        if kind == ListKind::Bullet {
            if let Some(task) = TASK_BOX.captures(&text) {
                kind = ListKind::Task;
                checked = !task[1].eq(" ");
                text = task.get(2).map_or("", |m| m.as_str()).to_string();
            }
        }

        Some(ListMarker {
            kind,
            checked,
            column,
            text,
        })
    }
}

/// Items of one kind; a different marker kind ends the list so the caller
/// starts a sibling list.
fn parse_list(lines: &[String], start: usize, kind: ListKind) -> (Block, usize) {
    let mut items = Vec::new();
    let mut idx = start;
    while let Some(marker) = lines.get(idx).and_then(|line| ListMarker::parse(line)) {
        if marker.kind != kind {
            break;
        }
        let (item, next) = parse_item(lines, idx, marker);
        items.push(item);
        idx = next;

        let mut peek = idx;
        while peek < lines.len() && is_blank(&lines[peek]) {
            peek += 1;
        }
        let continues = lines
            .get(peek)
            .and_then(|line| ListMarker::parse(line))
            .is_some_and(|next| next.kind == kind);
        if !continues {
            break;
        }
        idx = peek;
    }
    (Block::List(List::new(kind, items)), idx)
}

fn parse_item(lines: &[String], start: usize, marker: ListMarker) -> (ListItem, usize) {
    let column = marker.column;
    let mut body = vec![marker.text];
    let mut lazy = !is_blank(&body[0]) && !is_block_start(&body[0]);
    let mut idx = start + 1;

    while idx < lines.len() {
        let line = lines[idx].as_str();
        if is_blank(line) {
            let mut peek = idx + 1;
            while peek < lines.len() && is_blank(&lines[peek]) {
                peek += 1;
            }
            if peek < lines.len() && indent_of(&lines[peek]) >= column {
                body.extend(std::iter::repeat_n(String::new(), peek - idx));
                idx = peek;
                lazy = false;
                continue;
            }
            break;
        }
        if indent_of(line) >= column {
            let stripped = &line[column..];
            if is_block_start(stripped) {
                lazy = false;
            }
            body.push(stripped.to_string());
            idx += 1;
            continue;
        }
        if lazy && !is_block_start(line) {
            body.push(line.trim_start().to_string());
            idx += 1;
            continue;
        }
        break;
    }

    // Leading text lines form the item's own content; the rest are children.
    let own_text = if is_block_start(&body[0]) {
        0
    } else {
        let first = usize::from(is_blank(&body[0]));
        first
            + body[first..]
                .iter()
                .take_while(|line| !is_blank(line) && !is_block_start(line))
                .count()
    };
    let text: Vec<&str> = body[..own_text].iter().map(String::as_str).collect();
    let children = parse_blocks(&body[own_text..]);

    let mut item = ListItem::new(content_from_lines(&text)).with_children(children);
    item.checked = marker.checked;
    (item, idx)
}

struct BlockWriter<'a> {
    options: &'a EncodeOptions,
}

impl BlockWriter<'_> {
    fn blocks_to_lines(&self, blocks: &[Block], top_level: bool) -> Vec<String> {
        let mut lines = Vec::new();
        for (idx, block) in blocks.iter().enumerate() {
            // Inside items only non-list blocks need a separating blank line.
            let gap = if top_level { idx > 0 } else { !block.is_list() };
            if gap {
                lines.push(String::new());
            }
            lines.extend(self.block_lines(block));
        }
        lines
    }

    fn block_lines(&self, block: &Block) -> Vec<String> {
        match block {
            Block::Paragraph(paragraph) => {
                if runs::is_blank(&paragraph.content) {
                    vec!["<br>".to_string()]
                } else {
                    split_lines(&inline::to_markdown(
                        &paragraph.content,
                        BreakStyle::Lines,
                    ))
                }
            }
            Block::Heading(heading) => {
                let hashes = "#".repeat(usize::from(heading.level));
                let text =
                    inline::to_markdown(&heading.content, BreakStyle::Tag);
                if text.is_empty() {
                    vec![hashes]
                } else {
                    vec![format!("{hashes} {}", escape_closing_hashes(&text))]
                }
            }
            Block::Blockquote(quote) => {
                let text =
                    inline::to_markdown(&quote.content, BreakStyle::Quoted);
                text.split('\n')
                    .map(|line| {
                        if line.is_empty() {
                            ">".to_string()
                        } else {
                            format!("> {line}")
                        }
                    })
                    .collect()
            }
            Block::CodeBlock(code) => {
                let longest = code
                    .lines
                    .iter()
                    .map(|line| {
                        let trimmed = line.trim_start();
                        trimmed.len() - trimmed.trim_start_matches('`').len()
                    })
                    .max()
                    .unwrap_or(0);
                let fence = "`".repeat((longest + 1).max(3));
                let mut lines = vec![format!("{fence}{}", code.language)];
                lines.extend(code.lines.iter().cloned());
                lines.push(fence);
                lines
            }
            Block::List(list) => self.list_lines(list),
            Block::Rule(_) => vec!["---".to_string()],
        }
    }

    fn list_lines(&self, list: &List) -> Vec<String> {
        let mut lines = Vec::new();
        for (idx, item) in list.items.iter().enumerate() {
            let marker = match list.kind {
                ListKind::Bullet => "-".to_string(),
                ListKind::Task if item.checked => "- [x]".to_string(),
                ListKind::Task => "- [ ]".to_string(),
                ListKind::Ordered => match self.options.ordered_numbering {
                    OrderedNumbering::Sequential => format!("{}.", idx + 1),
                    OrderedNumbering::Repeated => "1.".to_string(),
                },
            };
            let column = if list.kind == ListKind::Ordered {
                marker.len() + 1
            } else {
                2
            };
            let indent = " ".repeat(column);

            let text = inline::to_markdown(&item.content, BreakStyle::Lines);
            let mut text_lines = text.split('\n');
            match text_lines.next() {
                Some(first) if !first.is_empty() => lines.push(format!("{marker} {first}")),
                _ => lines.push(marker),
            }
            lines.extend(text_lines.map(|line| format!("{indent}{line}")));

            for line in self.blocks_to_lines(&item.children, false) {
                if line.is_empty() {
                    lines.push(line);
                } else {
                    lines.push(format!("{indent}{line}"));
                }
            }
        }
        lines
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.split('\n').map(str::to_string).collect()
}

/// A heading ending in ` #` would lose the hashes as a closing sequence.
fn escape_closing_hashes(text: &str) -> String {
    let stripped = text.trim_end_matches('#');
    if stripped.len() == text.len() || !(stripped.is_empty() || stripped.ends_with(' ')) {
        return text.to_string();
    }
    format!("{stripped}\\{}", &text[stripped.len()..])
}

#[cfg(test)]
#[path = "markdown_tests.rs"]
mod markdown_tests;
