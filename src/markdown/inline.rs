//! Inline Markdown: emphasis, strong, strike, code spans, links, images,
//! autolinks and line breaks.
//!
//! Decoding runs `pulldown-cmark` over the text of one block and folds its
//! inline events into `Inline` nodes. Encoding is a writer of its own that
//! emits the canonical spelling.

use std::{mem, sync::LazyLock};

use pulldown_cmark::{CowStr, Event, LinkType, Options, Parser, Tag, TagEnd};
use regex::Regex;

use crate::document::inline::{self, Inline};

static BREAK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^<br\s*/?>$").expect("static regex"));
static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^&(?:#[xX][0-9a-fA-F]{1,6}|#[0-9]{1,7}|[A-Za-z][A-Za-z0-9]{1,31});")
        .expect("static regex")
});

/// Prefixed to every source line so that no line can open a block
/// construct. It is Unicode whitespace for delimiter flanking, yet never
/// block indentation.
const LINE_MARK: char = '\u{A0}';

/// How a `LineBreak` is written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BreakStyle {
    /// A newline, falling back to `<br>` where the newline would leave a
    /// blank line (which would end the block).
    Lines,
    /// Always a newline; the caller prefixes every line with `> `.
    Quoted,
    /// Always `<br>`, for single-line blocks such as headings.
    Tag,
}

/// Parses inline Markdown. `\n` in the source becomes a line break.
pub(crate) fn parse(source: &str) -> Vec<Inline> {
    let marked = source
        .split('\n')
        .map(|line| format!("{LINE_MARK}{line}"))
        .collect::<Vec<_>>()
        .join("\n");
    let mut state = InlineState::new();
    for event in Parser::new_ext(&marked, Options::ENABLE_STRIKETHROUGH) {
        state.process_event(event);
    }
    let mut content = state.finish();
    inline::normalize_inlines(&mut content);
    content
}

enum Wrapper {
    Emphasis,
    Strong,
    Strike,
    Link(String),
    Image(String),
}

struct InlineState {
    spans: Vec<Inline>,
    // Open wrappers with the content collected before each one.
    stack: Vec<(Wrapper, Vec<Inline>)>,
    line_start: bool,
}

impl InlineState {
    fn new() -> Self {
        Self {
            spans: Vec::new(),
            stack: Vec::new(),
            line_start: true,
        }
    }

    fn process_event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(Tag::Emphasis) => self.open(Wrapper::Emphasis),
            Event::Start(Tag::Strong) => self.open(Wrapper::Strong),
            Event::Start(Tag::Strikethrough) => self.open(Wrapper::Strike),
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                ..
            }) => self.open(Wrapper::Link(link_url(link_type, dest_url))),
            Event::Start(Tag::Image { dest_url, .. }) => {
                self.open(Wrapper::Image(dest_url.into_string()));
            }
            Event::End(
                TagEnd::Emphasis
                | TagEnd::Strong
                | TagEnd::Strikethrough
                | TagEnd::Link
                | TagEnd::Image,
            ) => self.close(),
            Event::Text(text) => self.push_text(&text),
            Event::Code(code) => {
                self.line_start = false;
                // Line ends inside a code span read as spaces.
                let code = code.replace(&format!(" {LINE_MARK}"), " ");
                self.spans.push(Inline::Code(code));
            }
            Event::SoftBreak | Event::HardBreak => {
                self.spans.push(Inline::LineBreak);
                self.line_start = true;
            }
            Event::InlineHtml(html) | Event::Html(html) => {
                if BREAK_TAG.is_match(html.trim()) {
                    self.line_start = false;
                    self.spans.push(Inline::LineBreak);
                } else {
                    self.push_text(&html);
                }
            }
            _ => {}
        }
    }

    fn push_text(&mut self, text: &str) {
        let text = if mem::take(&mut self.line_start) {
            text.strip_prefix(LINE_MARK).unwrap_or(text)
        } else {
            text
        };
        if !text.is_empty() {
            self.spans.push(Inline::text(text));
        }
    }

    fn open(&mut self, wrapper: Wrapper) {
        let outer = mem::take(&mut self.spans);
        self.stack.push((wrapper, outer));
    }

    fn close(&mut self) {
        let Some((wrapper, outer)) = self.stack.pop() else {
            return;
        };
        let children = mem::replace(&mut self.spans, outer);
        let inline = match wrapper {
            Wrapper::Emphasis => Inline::Emphasis(children),
            Wrapper::Strong => Inline::Strong(children),
            Wrapper::Strike => Inline::Strike(children),
            Wrapper::Link(url) => Inline::Link {
                url,
                content: children,
            },
            Wrapper::Image(url) => Inline::Image {
                url,
                alt: inline::plain_text(&children),
            },
        };
        self.spans.push(inline);
    }

    fn finish(mut self) -> Vec<Inline> {
        while !self.stack.is_empty() {
            self.close();
        }
        self.spans
    }
}

fn link_url(link_type: LinkType, dest_url: CowStr<'_>) -> String {
    if link_type == LinkType::Email && !dest_url.starts_with("mailto:") {
        format!("mailto:{dest_url}")
    } else {
        dest_url.into_string()
    }
}

/// Whether an `&` at the start of `rest` would read as a character reference.
fn starts_entity(rest: &[char]) -> bool {
    let head: String = rest.iter().take(40).collect();
    ENTITY.is_match(&head)
}

/// Serializes an inline run. Line breaks become `\n` or `<br>` per `breaks`;
/// the caller indents continuation lines.
pub(crate) fn to_markdown(content: &[Inline], breaks: BreakStyle) -> String {
    let mut writer = InlineWriter {
        out: String::new(),
        plain: inline::plain_text(content).chars().collect(),
        pos: 0,
        line_start: true,
        breaks,
    };
    writer.write_run(content);
    writer.out
}

struct InlineWriter {
    out: String,
    plain: Vec<char>,
    pos: usize,
    line_start: bool,
    breaks: BreakStyle,
}

impl InlineWriter {
    fn write_run(&mut self, content: &[Inline]) {
        for inline in content {
            self.write_inline(inline);
        }
    }

    fn write_inline(&mut self, inline: &Inline) {
        match inline {
            Inline::Text(text) => {
                self.push_text(text);
                self.pos += text.chars().count();
            }
            Inline::Emphasis(children) => self.write_wrapped("*", children),
            Inline::Strong(children) => self.write_wrapped("**", children),
            Inline::Strike(children) => self.write_wrapped("~~", children),
            Inline::Code(code) => {
                self.out.push_str(&code_span(code));
                self.line_start = false;
                self.pos += code.chars().count();
            }
            Inline::Link { url, content } => {
                self.out.push('[');
                self.line_start = false;
                self.write_run(content);
                self.out.push_str("](");
                self.out.push_str(&destination(url));
                self.out.push(')');
            }
            Inline::Image { url, alt } => {
                self.out.push_str("![");
                self.out.push_str(&escape(alt));
                self.out.push_str("](");
                self.out.push_str(&destination(url));
                self.out.push(')');
                self.line_start = false;
                self.pos += 1;
            }
            Inline::LineBreak => {
                let next_is_text = self.plain.get(self.pos + 1).is_some_and(|c| *c != '\n');
                let newline = match self.breaks {
                    BreakStyle::Quoted => true,
                    BreakStyle::Lines => self.pos > 0 && next_is_text,
                    BreakStyle::Tag => false,
                };
                if newline {
                    self.out.push('\n');
                    self.line_start = true;
                } else {
                    self.out.push_str("<br>");
                    self.line_start = false;
                }
                self.pos += 1;
            }
            Inline::Placeholder => {}
        }
    }

    /// Edge spaces move outside the delimiters, where they keep flanking intact.
    fn write_wrapped(&mut self, delimiter: &str, children: &[Inline]) {
        let outer = mem::take(&mut self.out);
        self.write_run(children);
        let inner = mem::replace(&mut self.out, outer);

        let without_lead = inner.trim_start_matches(' ');
        let core = without_lead.trim_end_matches(' ');
        if core.is_empty() {
            self.out.push_str(&inner);
            return;
        }
        self.out.push_str(&inner[..inner.len() - without_lead.len()]);
        self.out.push_str(delimiter);
        self.out.push_str(core);
        self.out.push_str(delimiter);
        self.out.push_str(&without_lead[core.len()..]);
        self.line_start = false;
    }

    fn push_text(&mut self, text: &str) {
        let chars: Vec<char> = text.chars().collect();
        let mut idx = 0;
        if self.line_start && !chars.is_empty() {
            idx = self.push_line_start(&chars);
        }
        while idx < chars.len() {
            let c = chars[idx];
            match c {
                '\\' | '`' | '*' | '_' | '[' | ']' | '<' | '~' => self.out.push('\\'),
                '!' if idx + 1 == chars.len() => self.out.push('\\'),
                '&' if starts_entity(&chars[idx..]) => self.out.push('\\'),
                _ => {}
            }
            self.out.push(c);
            idx += 1;
        }
        self.line_start = false;
    }

    /// Escapes text that would otherwise open a block. Returns how many
    /// characters were written.
    fn push_line_start(&mut self, chars: &[char]) -> usize {
        match chars[0] {
            '#' | '>' | '-' | '+' => {
                self.out.push('\\');
                self.out.push(chars[0]);
                1
            }
            c if c.is_ascii_digit() => {
                let digits = chars.iter().take_while(|c| c.is_ascii_digit()).count();
                let marker = chars.get(digits).is_some_and(|c| matches!(c, '.' | ')'));
                let spaced = chars.get(digits + 1).is_none_or(|c| *c == ' ');
                if !(marker && spaced) {
                    return 0;
                }
                self.out.extend(&chars[..digits]);
                self.out.push('\\');
                self.out.push(chars[digits]);
                digits + 1
            }
            _ => 0,
        }
    }
}

pub(crate) fn escape(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (idx, c) in chars.iter().enumerate() {
        let entity = *c == '&' && starts_entity(&chars[idx..]);
        if entity || matches!(c, '\\' | '`' | '*' | '_' | '[' | ']' | '<' | '~') {
            out.push('\\');
        }
        out.push(*c);
    }
    out
}

fn code_span(code: &str) -> String {
    let longest = code
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest + 1);
    let pad = code.starts_with('`')
        || code.ends_with('`')
        || (code.starts_with(' ') && code.ends_with(' ') && !code.trim().is_empty());
    if pad {
        format!("{fence} {code} {fence}")
    } else {
        format!("{fence}{code}{fence}")
    }
}

fn destination(url: &str) -> String {
    if url.is_empty() || url.chars().any(|c| c.is_whitespace() || matches!(c, '(' | ')' | '<')) {
        format!("<{}>", url.replace('>', "%3E"))
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> Inline {
        Inline::text(value)
    }

    #[test]
    fn parses_nested_emphasis() {
        assert_eq!(
            parse("*a **b***"),
            vec![Inline::Emphasis(vec![
                text("a "),
                Inline::Strong(vec![text("b")])
            ])]
        );
        assert_eq!(
            parse("***x***"),
            vec![Inline::Emphasis(vec![Inline::Strong(vec![text("x")])])]
        );
    }

    #[test]
    fn underscore_emphasis_needs_word_boundaries() {
        assert_eq!(parse("snake_case_name"), vec![text("snake_case_name")]);
        assert_eq!(parse("_a_"), vec![Inline::Emphasis(vec![text("a")])]);
        assert_eq!(parse("__a__"), vec![Inline::Strong(vec![text("a")])]);
    }

    #[test]
    fn parses_strike_code_and_links() {
        assert_eq!(
            parse("~~gone~~ `x*y` [site](https://example.com)"),
            vec![
                Inline::Strike(vec![text("gone")]),
                text(" "),
                Inline::Code("x*y".into()),
                text(" "),
                Inline::link("https://example.com", vec![text("site")]),
            ]
        );
    }

    #[test]
    fn parses_images_and_autolinks() {
        assert_eq!(
            parse("![logo](img/logo.png) <https://example.com>"),
            vec![
                Inline::Image {
                    url: "img/logo.png".into(),
                    alt: "logo".into()
                },
                text(" "),
                Inline::link("https://example.com", vec![text("https://example.com")]),
            ]
        );
    }

    #[test]
    fn breaks_from_newlines_and_tags() {
        assert_eq!(
            parse("a\nb<br/>c"),
            vec![
                text("a"),
                Inline::LineBreak,
                text("b"),
                Inline::LineBreak,
                text("c")
            ]
        );
    }

    #[test]
    fn unmatched_delimiters_stay_literal() {
        assert_eq!(parse("2 * 3 = 6 [x"), vec![text("2 * 3 = 6 [x")]);
        assert_eq!(parse("`open"), vec![text("`open")]);
    }

    #[test]
    fn escapes_round_trip() {
        let content = vec![text("# not *a* heading [x] ~y~ <br>")];
        let markdown = to_markdown(&content, BreakStyle::Lines);
        assert_eq!(markdown, r"\# not \*a\* heading \[x\] \~y\~ \<br>");
        assert_eq!(parse(&markdown), content);
    }

    #[test]
    fn list_like_text_is_escaped_at_line_start() {
        let content = vec![text("1. first"), Inline::LineBreak, text("- second")];
        let markdown = to_markdown(&content, BreakStyle::Lines);
        assert_eq!(markdown, "1\\. first\n\\- second");
        assert_eq!(parse(&markdown), content);
    }

    #[test]
    fn edge_spaces_move_outside_delimiters() {
        let content = vec![
            text("a"),
            Inline::Strong(vec![text(" b ")]),
            text("c"),
        ];
        assert_eq!(to_markdown(&content, BreakStyle::Lines), "a **b** c");
    }

    #[test]
    fn breaks_that_would_leave_blank_lines_use_tags() {
        let content = vec![text("a"), Inline::LineBreak, Inline::LineBreak, text("b")];
        let markdown = to_markdown(&content, BreakStyle::Lines);
        assert_eq!(markdown, "a<br>\nb");
        assert_eq!(parse(&markdown), content);
        assert_eq!(to_markdown(&content, BreakStyle::Tag), "a<br><br>b");
    }

    #[test]
    fn code_spans_choose_longer_fences() {
        let content = vec![Inline::Code("a`b".into())];
        let markdown = to_markdown(&content, BreakStyle::Lines);
        assert_eq!(markdown, "``a`b``");
        assert_eq!(parse(&markdown), content);
    }

    #[test]
    fn email_autolinks_get_a_mailto_url() {
        assert_eq!(
            parse("<me@example.com>"),
            vec![Inline::link(
                "mailto:me@example.com",
                vec![text("me@example.com")]
            )]
        );
    }

    #[test]
    fn block_syntax_inside_a_run_stays_text() {
        assert_eq!(parse("- x"), vec![text("- x")]);
        assert_eq!(
            parse("a\n===\n> b"),
            vec![
                text("a"),
                Inline::LineBreak,
                text("==="),
                Inline::LineBreak,
                text("> b"),
            ]
        );
        assert_eq!(parse("    indented"), vec![text("    indented")]);
    }

    #[test]
    fn emphasis_spans_line_breaks() {
        assert_eq!(
            parse("_a\nb_"),
            vec![Inline::Emphasis(vec![text("a"), Inline::LineBreak, text("b")])]
        );
    }

    #[test]
    fn character_references_decode_and_literal_ampersands_survive() {
        assert_eq!(parse("&copy; &amp; AT&T"), vec![text("© & AT&T")]);
        let content = vec![text("&amp; is spelled out, AT&T is not")];
        let markdown = to_markdown(&content, BreakStyle::Lines);
        assert_eq!(markdown, "\\&amp; is spelled out, AT&T is not");
        assert_eq!(parse(&markdown), content);
    }

    #[test]
    fn inline_html_other_than_breaks_stays_literal() {
        assert_eq!(parse("a <span>b</span>"), vec![text("a <span>b</span>")]);
    }

    #[test]
    fn links_serialize_with_url_as_text() {
        let content = vec![Inline::link(
            "https://example.com",
            vec![text("https://example.com")],
        )];
        assert_eq!(
            to_markdown(&content, BreakStyle::Lines),
            "[https://example.com](https://example.com)"
        );
    }
}
