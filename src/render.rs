//! Terminal rendering of the document tree for the interactive host.
//!
//! Every block is laid out as prefixed, word-wrapped rows. The caret and the
//! selection are located while walking the inline runs, so no marker text has
//! to be injected into the document.

use std::ops::Range;

use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span},
};
use unicode_width::UnicodeWidthChar;

use crate::cursor::{CursorPointer, Selection, collect_lines, line_index};
use crate::document::{Block, Document, Inline, List, ListKind, NodeId};
use crate::theme::Theme;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CursorVisualPosition {
    pub line: usize,
    pub column: u16,
}

#[derive(Debug)]
pub struct RenderResult {
    pub lines: Vec<Line<'static>>,
    pub cursor: Option<CursorVisualPosition>,
    pub total_lines: usize,
}

pub fn render_document(
    document: &Document,
    width: usize,
    selection: &Selection,
    theme: &Theme,
) -> RenderResult {
    let mut renderer = Renderer::new(document, width.max(1), selection, theme);
    renderer.render_blocks(&document.blocks, "", true);
    renderer.finish()
}

/// Selected character range of every line the selection touches.
fn selected_ranges(document: &Document, selection: &Selection) -> Vec<(NodeId, Range<usize>)> {
    if selection.is_collapsed() {
        return Vec::new();
    }
    let (start, end) = selection.ordered(document);
    let lines = collect_lines(document);
    let (Some(first), Some(last)) = (line_index(&lines, start.node), line_index(&lines, end.node))
    else {
        return Vec::new();
    };
    lines[first..=last]
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            let from = if idx == 0 { start.offset } else { 0 };
            let to = if first + idx == last { end.offset } else { line.len };
            (line.id, from..to)
        })
        .collect()
}

struct Renderer<'a> {
    wrap_width: usize,
    theme: &'a Theme,
    caret: CursorPointer,
    selected: Vec<(NodeId, Range<usize>)>,
    cursor: Option<CursorVisualPosition>,
    lines: Vec<Line<'static>>,
}

impl<'a> Renderer<'a> {
    fn new(document: &Document, wrap_width: usize, selection: &Selection, theme: &'a Theme) -> Self {
        Self {
            wrap_width,
            theme,
            caret: selection.focus,
            selected: selected_ranges(document, selection),
            cursor: None,
            lines: Vec::new(),
        }
    }

    fn render_blocks(&mut self, blocks: &[Block], prefix: &str, top_level: bool) {
        for (idx, block) in blocks.iter().enumerate() {
            if idx > 0 && (top_level || !block.is_list()) {
                self.push_plain_line(prefix.trim_end());
            }
            self.render_block(block, prefix);
        }
    }

    fn render_block(&mut self, block: &Block, prefix: &str) {
        match block {
            Block::Paragraph(paragraph) => {
                self.render_run(paragraph.id, &paragraph.content, Style::default(), prefix, prefix);
            }
            Block::Heading(heading) => self.render_heading(heading.id, heading.level, &heading.content, prefix),
            Block::Blockquote(quote) => {
                let quote_prefix = format!("{prefix}| ");
                self.render_run(
                    quote.id,
                    &quote.content,
                    self.theme.quote_style(),
                    &quote_prefix,
                    &quote_prefix,
                );
            }
            Block::CodeBlock(code) => {
                let fence = self.code_block_fence(prefix, &code.language);
                self.push_plain_line(&fence);
                let text = vec![Inline::Text(code.text())];
                let fragments = self.fragments(code.id, &text, self.theme.code_style());
                let lines = wrap_fragments(&fragments, prefix, prefix, usize::MAX / 4);
                self.consume_lines(lines);
                let closing = self.code_block_fence(prefix, "");
                self.push_plain_line(&closing);
            }
            Block::List(list) => self.render_list(list, prefix),
            Block::Rule(_) => {
                let width = self.wrap_width.saturating_sub(visible_width(prefix)).max(3);
                self.push_plain_line(&format!("{prefix}{}", "─".repeat(width)));
            }
        }
    }

    fn render_heading(&mut self, id: NodeId, level: u8, content: &[Inline], prefix: &str) {
        let style = self.theme.heading_style();
        self.render_run(id, content, style, prefix, prefix);
        let underline = match level {
            1 => '=',
            2 => '-',
            _ => return,
        };
        let width = self
            .lines
            .last()
            .map(line_width)
            .unwrap_or(0)
            .saturating_sub(visible_width(prefix));
        self.push_plain_line(&format!("{prefix}{}", underline.to_string().repeat(width.max(1))));
    }

    fn render_list(&mut self, list: &List, prefix: &str) {
        for (idx, item) in list.items.iter().enumerate() {
            let marker = match list.kind {
                ListKind::Bullet => "• ".to_string(),
                ListKind::Ordered => format!("{}. ", idx + 1),
                ListKind::Task if item.checked => "[✓] ".to_string(),
                ListKind::Task => "[ ] ".to_string(),
            };
            let first_prefix = format!("{prefix}{marker}");
            let continuation_prefix = format!("{prefix}{}", " ".repeat(visible_width(&marker)));
            self.render_run(item.id, &item.content, Style::default(), &first_prefix, &continuation_prefix);
            self.render_blocks(&item.children, &continuation_prefix, false);
        }
    }

    fn render_run(
        &mut self,
        id: NodeId,
        content: &[Inline],
        style: Style,
        first_prefix: &str,
        continuation_prefix: &str,
    ) {
        let fragments = self.fragments(id, content, style);
        let lines = wrap_fragments(&fragments, first_prefix, continuation_prefix, self.wrap_width);
        self.consume_lines(lines);
    }

    fn fragments(&self, id: NodeId, content: &[Inline], style: Style) -> Vec<FragmentItem> {
        let mut walk = InlineWalk {
            offset: 0,
            caret: (self.caret.node == id).then_some(self.caret.offset),
            selected: self
                .selected
                .iter()
                .find(|(node, _)| *node == id)
                .map(|(_, range)| range.clone()),
            selection_style: self.theme.selection_style(),
            link_style: self.theme.link_style(),
            code_style: self.theme.code_style(),
            pending: Vec::new(),
        };
        let mut fragments = Vec::new();
        walk.collect(content, style, &mut fragments);
        walk.flush_end(style, &mut fragments);
        fragments
    }

    fn push_plain_line(&mut self, content: &str) {
        let style = self.theme.decoration_style();
        self.lines.push(Line::from(Span::styled(content.to_string(), style)));
    }

    fn code_block_fence(&self, prefix: &str, language: &str) -> String {
        const MIN_FENCE_WIDTH: usize = 4;
        let available = self
            .wrap_width
            .saturating_sub(visible_width(prefix) + visible_width(language));
        format!("{prefix}{language}{}", "-".repeat(available.max(MIN_FENCE_WIDTH)))
    }

    fn consume_lines(&mut self, outputs: Vec<LineOutput>) {
        for output in outputs {
            let spans: Vec<Span<'static>> = output
                .spans
                .into_iter()
                .map(|segment| Span::styled(segment.text, segment.style))
                .collect();
            if let Some(column) = output.caret {
                self.cursor = Some(CursorVisualPosition {
                    line: self.lines.len(),
                    column,
                });
            }
            self.lines.push(Line::from(spans));
        }
    }

    fn finish(mut self) -> RenderResult {
        if self.lines.is_empty() {
            self.lines.push(Line::from(""));
        }
        RenderResult {
            total_lines: self.lines.len(),
            lines: self.lines,
            cursor: self.cursor,
        }
    }
}

/// Walks an inline run, tracking the character offset so that the caret
/// and the selection land on the right characters.
struct InlineWalk {
    offset: usize,
    caret: Option<usize>,
    selected: Option<Range<usize>>,
    selection_style: Style,
    link_style: Style,
    code_style: Style,
    pending: Vec<usize>,
}

impl InlineWalk {
    fn collect(&mut self, content: &[Inline], style: Style, fragments: &mut Vec<FragmentItem>) {
        for inline in content {
            match inline {
                Inline::Text(text) => self.tokenize(text, style, fragments),
                Inline::Code(text) => self.tokenize(text, style.patch(self.code_style), fragments),
                Inline::Emphasis(children) => {
                    self.collect(children, style.add_modifier(Modifier::ITALIC), fragments);
                }
                Inline::Strong(children) => {
                    self.collect(children, style.add_modifier(Modifier::BOLD), fragments);
                }
                Inline::Strike(children) => {
                    self.collect(children, style.add_modifier(Modifier::CROSSED_OUT), fragments);
                }
                Inline::Link { content, .. } => {
                    let link = style.patch(self.link_style);
                    self.collect(content, link, fragments);
                }
                Inline::Image { alt, .. } => {
                    self.mark_caret();
                    let style = self.style_at(style);
                    let mut token = TokenBuilder::new(style, false);
                    token.add_events(&mut self.pending);
                    for ch in format!("[{alt}]").chars() {
                        token.push_char(ch);
                    }
                    fragments.push(FragmentItem::Token(token.finish()));
                    self.offset += 1;
                }
                Inline::LineBreak => {
                    self.mark_caret();
                    self.flush_pending(style, fragments);
                    fragments.push(FragmentItem::LineBreak);
                    self.offset += 1;
                }
                Inline::Placeholder => {}
            }
        }
    }

    fn mark_caret(&mut self) {
        if self.caret == Some(self.offset) {
            self.pending.push(0);
            self.caret = None;
        }
    }

    fn style_at(&self, style: Style) -> Style {
        match &self.selected {
            Some(range) if range.contains(&self.offset) => style.patch(self.selection_style),
            _ => style,
        }
    }

    fn tokenize(&mut self, text: &str, style: Style, fragments: &mut Vec<FragmentItem>) {
        let mut builder: Option<TokenBuilder> = None;
        for ch in text.chars() {
            self.mark_caret();
            let char_style = self.style_at(style);
            self.offset += 1;
            if ch == '\r' {
                continue;
            }
            if ch == '\n' {
                if let Some(mut token) = builder.take() {
                    token.add_events(&mut self.pending);
                    fragments.push(FragmentItem::Token(token.finish()));
                } else {
                    self.flush_pending(style, fragments);
                }
                fragments.push(FragmentItem::LineBreak);
                continue;
            }
            let expanded = if ch == '\t' { "    ".chars().collect() } else { vec![ch] };
            for actual in expanded {
                let is_whitespace = actual.is_whitespace();
                if let Some(current) = builder
                    .as_mut()
                    .filter(|existing| existing.matches(is_whitespace, char_style))
                {
                    current.add_events(&mut self.pending);
                    current.push_char(actual);
                    continue;
                }
                if let Some(existing) = builder.take() {
                    fragments.push(FragmentItem::Token(existing.finish()));
                }
                let mut fresh = TokenBuilder::new(char_style, is_whitespace);
                fresh.add_events(&mut self.pending);
                fresh.push_char(actual);
                builder = Some(fresh);
            }
        }
        if let Some(token) = builder {
            fragments.push(FragmentItem::Token(token.finish()));
        }
    }

    fn flush_pending(&mut self, style: Style, fragments: &mut Vec<FragmentItem>) {
        if self.pending.is_empty() {
            return;
        }
        let mut token = TokenBuilder::new(style, false);
        token.add_events(&mut self.pending);
        fragments.push(FragmentItem::Token(token.finish()));
    }

    fn flush_end(&mut self, style: Style, fragments: &mut Vec<FragmentItem>) {
        self.mark_caret();
        self.flush_pending(style, fragments);
    }
}

#[derive(Clone)]
struct LineSegment {
    text: String,
    style: Style,
}

struct LineOutput {
    spans: Vec<LineSegment>,
    caret: Option<u16>,
}

#[derive(Clone)]
struct Fragment {
    text: String,
    style: Style,
    kind: FragmentKind,
    width: usize,
    /// Display offsets of the caret inside the fragment.
    carets: Vec<usize>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FragmentKind {
    Word,
    Whitespace,
}

#[derive(Clone)]
enum FragmentItem {
    Token(Fragment),
    LineBreak,
}

struct TokenBuilder {
    text: String,
    style: Style,
    kind: FragmentKind,
    width: usize,
    carets: Vec<usize>,
}

impl TokenBuilder {
    fn new(style: Style, is_whitespace: bool) -> Self {
        Self {
            text: String::new(),
            style,
            kind: if is_whitespace {
                FragmentKind::Whitespace
            } else {
                FragmentKind::Word
            },
            width: 0,
            carets: Vec::new(),
        }
    }

    fn matches(&self, is_whitespace: bool, style: Style) -> bool {
        let kind = if is_whitespace {
            FragmentKind::Whitespace
        } else {
            FragmentKind::Word
        };
        self.kind == kind && self.style == style
    }

    fn add_events(&mut self, pending: &mut Vec<usize>) {
        for _ in pending.drain(..) {
            self.carets.push(self.width);
        }
    }

    fn push_char(&mut self, ch: char) {
        self.text.push(ch);
        self.width += UnicodeWidthChar::width(ch).unwrap_or(0);
    }

    fn finish(self) -> Fragment {
        Fragment {
            text: self.text,
            style: self.style,
            kind: self.kind,
            width: self.width,
            carets: self.carets,
        }
    }
}

fn wrap_fragments(
    fragments: &[FragmentItem],
    first_prefix: &str,
    continuation_prefix: &str,
    width: usize,
) -> Vec<LineOutput> {
    let mut outputs = Vec::new();
    let mut builder = LineBuilder::new(first_prefix);
    let mut pending_whitespace: Vec<Fragment> = Vec::new();

    for fragment in fragments {
        match fragment {
            FragmentItem::LineBreak => {
                builder.consume_pending(&mut pending_whitespace);
                outputs.push(builder.build_line());
                builder = LineBuilder::new(continuation_prefix);
            }
            FragmentItem::Token(token) => match token.kind {
                FragmentKind::Whitespace => pending_whitespace.push(token.clone()),
                FragmentKind::Word => {
                    let whitespace_width: usize =
                        pending_whitespace.iter().map(|item| item.width).sum();
                    if builder.width > builder.prefix_width
                        && builder.width + whitespace_width + token.width > width
                    {
                        // Whitespace at the wrap point is dropped, except for a caret on it.
                        let carets = pending_whitespace.drain(..).any(|item| !item.carets.is_empty());
                        if carets {
                            builder.caret.get_or_insert(builder.width as u16);
                        }
                        outputs.push(builder.build_line());
                        builder = LineBuilder::new(continuation_prefix);
                    }
                    builder.consume_pending(&mut pending_whitespace);
                    builder.append_token(token.clone());
                }
            },
        }
    }

    builder.consume_pending(&mut pending_whitespace);
    outputs.push(builder.build_line());
    outputs
}

struct LineBuilder {
    segments: Vec<LineSegment>,
    caret: Option<u16>,
    width: usize,
    prefix_width: usize,
}

impl LineBuilder {
    fn new(prefix: &str) -> Self {
        let prefix_width = visible_width(prefix);
        let mut segments = Vec::new();
        if !prefix.is_empty() {
            segments.push(LineSegment {
                text: prefix.to_string(),
                style: Style::default(),
            });
        }
        Self {
            segments,
            caret: None,
            width: prefix_width,
            prefix_width,
        }
    }

    fn consume_pending(&mut self, pending_whitespace: &mut Vec<Fragment>) {
        for fragment in pending_whitespace.drain(..) {
            self.append_token(fragment);
        }
    }

    fn append_token(&mut self, fragment: Fragment) {
        if let Some(offset) = fragment.carets.first() {
            self.caret = Some((self.width + offset) as u16);
        }
        if !fragment.text.is_empty() {
            self.width += fragment.width;
            self.segments.push(LineSegment {
                text: fragment.text,
                style: fragment.style,
            });
        }
    }

    fn build_line(mut self) -> LineOutput {
        if self.segments.is_empty() {
            self.segments.push(LineSegment {
                text: String::new(),
                style: Style::default(),
            });
        }
        LineOutput {
            spans: self.segments,
            caret: self.caret,
        }
    }
}

fn visible_width(text: &str) -> usize {
    text.chars()
        .map(|ch| UnicodeWidthChar::width(ch).unwrap_or(0))
        .sum()
}

fn line_width(line: &Line<'_>) -> usize {
    line.spans
        .iter()
        .map(|span| visible_width(span.content.as_ref()))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown;

    fn render_at(source: &str, line: usize, offset: usize) -> RenderResult {
        let document = markdown::decode(source);
        let id = collect_lines(&document)[line].id;
        let selection = Selection::collapsed(CursorPointer::new(id, offset));
        render_document(&document, 40, &selection, &Theme::default())
    }

    fn texts(result: &RenderResult) -> Vec<String> {
        result
            .lines
            .iter()
            .map(|line| line.spans.iter().map(|span| span.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn lists_render_with_markers_and_nesting() {
        let result = render_at("- a\n  1. b\n- [x] c", 0, 0);
        assert_eq!(texts(&result), vec!["• a", "  1. b", "", "[✓] c"]);
    }

    #[test]
    fn caret_is_located_inside_the_line() {
        let result = render_at("intro\n\n- abc", 1, 2);
        assert_eq!(
            result.cursor,
            Some(CursorVisualPosition { line: 2, column: 4 })
        );
    }

    #[test]
    fn caret_at_end_of_empty_item_sits_after_the_marker() {
        let result = render_at("- a\n-", 1, 0);
        assert_eq!(
            result.cursor,
            Some(CursorVisualPosition { line: 1, column: 2 })
        );
    }

    #[test]
    fn long_text_wraps_under_the_marker() {
        let document = markdown::decode("- alpha beta gamma delta");
        let id = collect_lines(&document)[0].id;
        let selection = Selection::collapsed(CursorPointer::start_of(id));
        let result = render_document(&document, 12, &selection, &Theme::default());
        assert_eq!(texts(&result), vec!["• alpha beta", "  gamma", "  delta"]);
    }

    #[test]
    fn theme_styles_follow_block_kinds() {
        let theme = Theme {
            link: ratatui::style::Color::Green,
            decoration: ratatui::style::Color::Red,
            ..Theme::default()
        };
        let document = markdown::decode("# T

see [**here**](https://x.y)

---");
        let id = collect_lines(&document)[0].id;
        let selection = Selection::collapsed(CursorPointer::start_of(id));
        let result = render_document(&document, 20, &selection, &theme);

        let styled = |text: &str| {
            result
                .lines
                .iter()
                .flat_map(|line| line.spans.iter())
                .find(|span| span.content.contains(text))
                .map(|span| span.style)
                .expect("span rendered")
        };
        assert!(styled("T").add_modifier.contains(Modifier::BOLD));
        let link = styled("here");
        assert_eq!(link.fg, Some(ratatui::style::Color::Green));
        assert!(link.add_modifier.contains(Modifier::UNDERLINED | Modifier::BOLD));
        assert_eq!(styled("───").fg, Some(ratatui::style::Color::Red));
    }
}
