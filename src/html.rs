//! HTML fragments at the boundary between the tree and a rendering surface.
//!
//! `render` writes the exact element vocabulary the surface understands.
//! `parse` accepts fragments from third-party clipboards: it tokenizes
//! leniently, builds a small element tree and maps it back onto blocks.
//! Loose list items (`<li><p>…</p></li>`) come back tight, nested lists stay
//! nested, and anything unrecognized degrades to paragraph text.

use tracing::trace;

use crate::document::{
    Block, Blockquote, CodeBlock, Document, Heading, List, ListItem, ListKind, Paragraph,
    inline::{self, Inline},
    normalize,
};

pub fn render(document: &Document) -> String {
    let mut out = String::new();
    render_blocks(&document.blocks, &mut out);
    out
}

fn render_blocks(blocks: &[Block], out: &mut String) {
    for block in blocks {
        match block {
            Block::Paragraph(paragraph) => {
                out.push_str("<p>");
                render_inlines(&paragraph.content, out);
                out.push_str("</p>");
            }
            Block::Heading(heading) => {
                out.push_str(&format!("<h{}>", heading.level));
                render_inlines(&heading.content, out);
                out.push_str(&format!("</h{}>", heading.level));
            }
            Block::Blockquote(quote) => {
                out.push_str("<blockquote>");
                render_inlines(&quote.content, out);
                out.push_str("</blockquote>");
            }
            Block::CodeBlock(code) => {
                let language = if code.language.is_empty() {
                    "plaintext"
                } else {
                    code.language.as_str()
                };
                out.push_str(&format!(
                    "<pre><code data-lang=\"{}\">",
                    escape_attribute(language)
                ));
                out.push_str(&escape_text(&code.text()));
                out.push_str("</code></pre>");
            }
            Block::List(list) => render_list(list, out),
            Block::Rule(_) => out.push_str("<hr>"),
        }
    }
}

fn render_list(list: &List, out: &mut String) {
    let tag = match list.kind {
        ListKind::Ordered => "ol",
        ListKind::Bullet | ListKind::Task => "ul",
    };
    out.push_str(&format!("<{tag}>"));
    for item in &list.items {
        out.push_str("<li>");
        if list.kind == ListKind::Task {
            out.push_str(if item.checked {
                "<input type=\"checkbox\" checked>"
            } else {
                "<input type=\"checkbox\">"
            });
        }
        render_inlines(&item.content, out);
        render_blocks(&item.children, out);
        out.push_str("</li>");
    }
    out.push_str(&format!("</{tag}>"));
}

fn render_inlines(content: &[Inline], out: &mut String) {
    for inline in content {
        match inline {
            Inline::Text(text) => out.push_str(&escape_text(text)),
            Inline::Emphasis(children) => wrap("em", children, out),
            Inline::Strong(children) => wrap("strong", children, out),
            Inline::Strike(children) => wrap("del", children, out),
            Inline::Code(code) => {
                out.push_str("<code>");
                out.push_str(&escape_text(code));
                out.push_str("</code>");
            }
            Inline::Link { url, content } => {
                out.push_str(&format!("<a href=\"{}\">", escape_attribute(url)));
                render_inlines(content, out);
                out.push_str("</a>");
            }
            Inline::Image { url, alt } => out.push_str(&format!(
                "<img src=\"{}\" alt=\"{}\">",
                escape_attribute(url),
                escape_attribute(alt)
            )),
            Inline::LineBreak | Inline::Placeholder => out.push_str("<br>"),
        }
    }
}

fn wrap(tag: &str, children: &[Inline], out: &mut String) {
    out.push_str(&format!("<{tag}>"));
    render_inlines(children, out);
    out.push_str(&format!("</{tag}>"));
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}

/// Parses a fragment into a normalized document. Never fails.
pub fn parse(source: &str) -> Document {
    let nodes = build_tree(tokenize(source));
    let mut blocks = blocks_from_nodes(&nodes);
    if blocks.is_empty() {
        blocks.push(Block::Paragraph(Paragraph::empty()));
    }
    let mut document = Document::new().with_blocks(blocks);
    normalize(&mut document);
    trace!(blocks = document.blocks.len(), "parsed html fragment");
    document
}

#[derive(Debug, PartialEq)]
enum Token {
    Start {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    End(String),
    Text(String),
}

fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = source;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("<!--") {
            rest = after.find("-->").map_or("", |end| &after[end + 3..]);
            continue;
        }
        if rest.starts_with('<') {
            if let Some((token, consumed)) = parse_tag(rest) {
                rest = &rest[consumed..];
                if let Some(Token::Start {
                    name,
                    self_closing: false,
                    ..
                }) = &token
                {
                    if name == "script" || name == "style" {
                        let closing = format!("</{name}");
                        rest = rest
                            .to_ascii_lowercase()
                            .find(&closing)
                            .and_then(|at| rest[at..].find('>').map(|end| &rest[at + end + 1..]))
                            .unwrap_or("");
                        continue;
                    }
                }
                tokens.extend(token);
                continue;
            }
        }
        let end = rest[1..].find('<').map_or(rest.len(), |idx| idx + 1);
        tokens.push(Token::Text(decode_entities(&rest[..end])));
        rest = &rest[end..];
    }
    tokens
}

/// One tag at the start of `source`; declarations and processing
/// instructions yield no token. `None` when this is not a tag at all.
fn parse_tag(source: &str) -> Option<(Option<Token>, usize)> {
    let bytes = source.as_bytes();
    match bytes.get(1)? {
        b'!' | b'?' => {
            let end = source.find('>')?;
            return Some((None, end + 1));
        }
        b'/' => {
            let end = source.find('>')?;
            let name = source[2..end].trim().to_ascii_lowercase();
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
                return None;
            }
            return Some((Some(Token::End(name)), end + 1));
        }
        c if c.is_ascii_alphabetic() => {}
        _ => return None,
    }

    let name_end = source[1..]
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .map_or(source.len(), |idx| idx + 1);
    let name = source[1..name_end].to_ascii_lowercase();
    let mut attrs = Vec::new();
    let mut self_closing = false;
    let mut idx = name_end;

    loop {
        while bytes.get(idx).is_some_and(u8::is_ascii_whitespace) {
            idx += 1;
        }
        match bytes.get(idx)? {
            b'>' => {
                idx += 1;
                break;
            }
            b'/' => {
                self_closing = true;
                idx += 1;
                continue;
            }
            _ => {}
        }

        let key_start = idx;
        while bytes
            .get(idx)
            .is_some_and(|b| !b.is_ascii_whitespace() && !matches!(b, b'=' | b'>' | b'/'))
        {
            idx += 1;
        }
        let key = source[key_start..idx].to_ascii_lowercase();
        while bytes.get(idx).is_some_and(u8::is_ascii_whitespace) {
            idx += 1;
        }

        let mut value = String::new();
        if bytes.get(idx) == Some(&b'=') {
            idx += 1;
            while bytes.get(idx).is_some_and(u8::is_ascii_whitespace) {
                idx += 1;
            }
            match bytes.get(idx)? {
                quote @ (b'"' | b'\'') => {
                    let start = idx + 1;
                    let end = source[start..].find(char::from(*quote))? + start;
                    value = decode_entities(&source[start..end]);
                    idx = end + 1;
                }
                _ => {
                    let start = idx;
                    while bytes
                        .get(idx)
                        .is_some_and(|b| !b.is_ascii_whitespace() && *b != b'>')
                    {
                        idx += 1;
                    }
                    value = decode_entities(&source[start..idx]);
                }
            }
        }
        if !key.is_empty() {
            attrs.push((key, value));
        }
    }

    Some((
        Some(Token::Start {
            name,
            attrs,
            self_closing,
        }),
        idx,
    ))
}

fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest
            .find(';')
            .filter(|end| *end <= 32)
            .and_then(|end| entity(&rest[1..end]).map(|value| (value, end)));
        match decoded {
            Some((value, end)) => {
                out.push_str(&value);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Text of the character reference `&name;`, without the delimiters.
fn entity(name: &str) -> Option<String> {
    let Some(number) = name.strip_prefix('#') else {
        return named_entity(name).map(str::to_string);
    };
    let (digits, radix, max_digits) = match number.strip_prefix(['x', 'X']) {
        Some(hex) => (hex, 16, 6),
        None => (number, 10, 7),
    };
    if digits.is_empty() || digits.len() > max_digits {
        return None;
    }
    let code = u32::from_str_radix(digits, radix).ok()?;
    // NUL, surrogates and values past the last code point read as U+FFFD.
    let c = if code == 0 {
        char::REPLACEMENT_CHARACTER
    } else {
        char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER)
    };
    Some(c.to_string())
}

fn named_entity(name: &str) -> Option<&'static str> {
    let text = match name {
        "amp" | "AMP" => "&",
        "lt" | "LT" => "<",
        "gt" | "GT" => ">",
        "quot" | "QUOT" => "\"",
        "apos" => "'",
        "nbsp" => "\u{a0}",
        "ensp" => "\u{2002}",
        "emsp" => "\u{2003}",
        "thinsp" => "\u{2009}",
        "zwnj" => "\u{200c}",
        "zwj" => "\u{200d}",
        "shy" => "\u{ad}",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "hellip" => "\u{2026}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "sbquo" => "\u{201a}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "bdquo" => "\u{201e}",
        "laquo" => "\u{ab}",
        "raquo" => "\u{bb}",
        "lsaquo" => "\u{2039}",
        "rsaquo" => "\u{203a}",
        "bull" => "\u{2022}",
        "middot" => "\u{b7}",
        "dagger" => "\u{2020}",
        "Dagger" => "\u{2021}",
        "prime" => "\u{2032}",
        "Prime" => "\u{2033}",
        "copy" | "COPY" => "\u{a9}",
        "reg" | "REG" => "\u{ae}",
        "trade" => "\u{2122}",
        "deg" => "\u{b0}",
        "plusmn" => "\u{b1}",
        "times" => "\u{d7}",
        "divide" => "\u{f7}",
        "minus" => "\u{2212}",
        "ne" => "\u{2260}",
        "le" => "\u{2264}",
        "ge" => "\u{2265}",
        "infin" => "\u{221e}",
        "micro" => "\u{b5}",
        "para" => "\u{b6}",
        "sect" => "\u{a7}",
        "frac12" => "\u{bd}",
        "frac14" => "\u{bc}",
        "frac34" => "\u{be}",
        "sup2" => "\u{b2}",
        "sup3" => "\u{b3}",
        "cent" => "\u{a2}",
        "pound" => "\u{a3}",
        "euro" => "\u{20ac}",
        "yen" => "\u{a5}",
        "iexcl" => "\u{a1}",
        "iquest" => "\u{bf}",
        "larr" => "\u{2190}",
        "uarr" => "\u{2191}",
        "rarr" => "\u{2192}",
        "darr" => "\u{2193}",
        "harr" => "\u{2194}",
        "rArr" => "\u{21d2}",
        "hArr" => "\u{21d4}",
        "check" => "\u{2713}",
        "auml" => "\u{e4}",
        "ouml" => "\u{f6}",
        "uuml" => "\u{fc}",
        "Auml" => "\u{c4}",
        "Ouml" => "\u{d6}",
        "Uuml" => "\u{dc}",
        "szlig" => "\u{df}",
        "eacute" => "\u{e9}",
        "egrave" => "\u{e8}",
        "ecirc" => "\u{ea}",
        "aacute" => "\u{e1}",
        "agrave" => "\u{e0}",
        "acirc" => "\u{e2}",
        "iacute" => "\u{ed}",
        "oacute" => "\u{f3}",
        "uacute" => "\u{fa}",
        "ntilde" => "\u{f1}",
        "ccedil" => "\u{e7}",
        "Eacute" => "\u{c9}",
        "alpha" => "\u{3b1}",
        "beta" => "\u{3b2}",
        "gamma" => "\u{3b3}",
        "delta" => "\u{3b4}",
        "pi" => "\u{3c0}",
        "mu" => "\u{3bc}",
        "lambda" => "\u{3bb}",
        "sigma" => "\u{3c3}",
        "omega" => "\u{3c9}",
        _ => return None,
    };
    Some(text)
}

#[derive(Debug)]
enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug)]
struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    fn is_checkbox(&self) -> bool {
        self.name == "input" && self.attr("type").is_some_and(|t| t.eq_ignore_ascii_case("checkbox"))
    }
}

fn is_void(name: &str) -> bool {
    matches!(
        name,
        "br" | "hr" | "img" | "input" | "meta" | "link" | "wbr" | "col" | "source"
    )
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "p" | "div"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "ul"
            | "ol"
            | "li"
            | "pre"
            | "blockquote"
            | "hr"
            | "table"
            | "thead"
            | "tbody"
            | "tr"
            | "td"
            | "th"
            | "section"
            | "article"
            | "header"
            | "footer"
            | "main"
            | "nav"
            | "aside"
            | "figure"
            | "dl"
            | "dt"
            | "dd"
            | "body"
            | "html"
    )
}

fn build_tree(tokens: Vec<Token>) -> Vec<Node> {
    let mut stack = vec![Element {
        name: String::new(),
        attrs: Vec::new(),
        children: Vec::new(),
    }];
    for token in tokens {
        match token {
            Token::Text(text) => push_node(&mut stack, Node::Text(text)),
            Token::Start {
                name,
                attrs,
                self_closing,
            } => {
                close_implied(&mut stack, &name);
                let element = Element {
                    name,
                    attrs,
                    children: Vec::new(),
                };
                if self_closing || is_void(&element.name) {
                    push_node(&mut stack, Node::Element(element));
                } else {
                    stack.push(element);
                }
            }
            Token::End(name) => {
                if let Some(open) = stack.iter().rposition(|element| element.name == name) {
                    while stack.len() > open.max(1) {
                        pop_into_parent(&mut stack);
                    }
                }
            }
        }
    }
    while stack.len() > 1 {
        pop_into_parent(&mut stack);
    }
    stack.pop().map(|root| root.children).unwrap_or_default()
}

/// Tags that end an open element without an explicit end tag.
fn close_implied(stack: &mut Vec<Element>, name: &str) {
    if name == "li" {
        let nearest = stack
            .iter()
            .rposition(|element| matches!(element.name.as_str(), "li" | "ul" | "ol"));
        if let Some(open) = nearest.filter(|idx| stack[*idx].name == "li") {
            while stack.len() > open {
                pop_into_parent(stack);
            }
        }
    } else if is_block(name) && stack.last().is_some_and(|element| element.name == "p") {
        pop_into_parent(stack);
    }
}

fn push_node(stack: &mut [Element], node: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

fn pop_into_parent(stack: &mut Vec<Element>) {
    if let Some(element) = stack.pop() {
        push_node(stack, Node::Element(element));
    }
}

fn blocks_from_nodes<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut run: Vec<&Node> = Vec::new();
    for node in nodes {
        match node {
            Node::Element(element) if is_block(&element.name) => {
                flush_run(&mut run, &mut blocks);
                push_block(element, &mut blocks);
            }
            other => run.push(other),
        }
    }
    flush_run(&mut run, &mut blocks);
    blocks
}

/// Loose inline content between blocks becomes a paragraph unless blank.
fn flush_run(run: &mut Vec<&Node>, blocks: &mut Vec<Block>) {
    let content = finish(inline_content(run.drain(..)));
    if !inline::is_blank(&content) {
        blocks.push(Block::Paragraph(Paragraph::new(content)));
    }
}

fn push_block(element: &Element, blocks: &mut Vec<Block>) {
    match element.name.as_str() {
        "p" => blocks.push(Block::Paragraph(Paragraph::new(finish(inline_content(
            &element.children,
        ))))),
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = element.name[1..].parse().unwrap_or(1);
            blocks.push(Block::Heading(Heading::new(
                level,
                finish(inline_content(&element.children)),
            )));
        }
        "blockquote" => blocks.push(Block::Blockquote(Blockquote::new(finish(inline_content(
            &element.children,
        ))))),
        "pre" => blocks.push(Block::CodeBlock(code_block(element))),
        "ul" | "ol" => {
            if let Some(list) = list(element) {
                blocks.push(Block::List(list));
            }
        }
        "hr" => blocks.push(Block::rule()),
        _ => blocks.extend(blocks_from_nodes(&element.children)),
    }
}

fn code_block(pre: &Element) -> CodeBlock {
    let code = pre.children.iter().find_map(|node| match node {
        Node::Element(element) if element.name == "code" => Some(element),
        _ => None,
    });
    let language = code
        .and_then(|code| {
            code.attr("data-lang").map(str::to_string).or_else(|| {
                code.attr("class")?
                    .split_whitespace()
                    .find_map(|class| class.strip_prefix("language-"))
                    .map(str::to_string)
            })
        })
        .filter(|language| language != "plaintext")
        .unwrap_or_default();

    let mut text = String::new();
    push_raw_text(&pre.children, &mut text);
    let text = text.strip_prefix('\n').unwrap_or(&text);
    let text = text.strip_suffix('\n').unwrap_or(text);
    let mut block = CodeBlock::new(language, Vec::new());
    block.set_text(text);
    block
}

fn push_raw_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) if element.name == "br" => out.push('\n'),
            Node::Element(element) => push_raw_text(&element.children, out),
        }
    }
}

fn list(element: &Element) -> Option<List> {
    let mut items = Vec::new();
    let mut has_checkbox = false;
    for node in &element.children {
        match node {
            Node::Element(child) if child.name == "li" => {
                let (item, checkbox) = list_item(child);
                has_checkbox |= checkbox;
                items.push(item);
            }
            Node::Text(text) if text.trim().is_empty() => {}
            other => {
                // Stray content directly inside the list becomes its own item.
                let content = finish(inline_content([other]));
                if !inline::is_blank(&content) {
                    items.push(ListItem::new(content));
                }
            }
        }
    }
    if items.is_empty() {
        return None;
    }
    let kind = match element.name.as_str() {
        "ol" => ListKind::Ordered,
        _ if has_checkbox => ListKind::Task,
        _ => ListKind::Bullet,
    };
    if kind != ListKind::Task {
        for item in &mut items {
            item.checked = false;
        }
    }
    Some(List::new(kind, items))
}

fn checkbox_state(nodes: &[Node]) -> Option<bool> {
    nodes.iter().find_map(|node| match node {
        Node::Element(element) if element.is_checkbox() => {
            Some(element.attr("checked").is_some())
        }
        _ => None,
    })
}

/// An item's own text is its leading inline run, or the first paragraph of a
/// loose item; everything after it becomes child blocks.
fn list_item(element: &Element) -> (ListItem, bool) {
    let children = &element.children;
    let split = children
        .iter()
        .position(|node| matches!(node, Node::Element(child) if is_block(&child.name)))
        .unwrap_or(children.len());

    let mut checkbox = checkbox_state(&children[..split]);
    let mut content = finish(inline_content(&children[..split]));
    let mut rest = &children[split..];

    if inline::is_blank(&content) {
        if let Some(Node::Element(first)) = rest.first() {
            if first.name == "p" {
                checkbox = checkbox.or_else(|| checkbox_state(&first.children));
                content = finish(inline_content(&first.children));
                rest = &rest[1..];
            }
        }
    }

    let item = ListItem::new(content)
        .with_children(blocks_from_nodes(rest))
        .with_checked(checkbox.unwrap_or(false));
    (item, checkbox.is_some())
}

fn inline_content<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Vec<Inline> {
    let mut out = Vec::new();
    for node in nodes {
        push_inline(node, &mut out);
    }
    out
}

fn push_inline(node: &Node, out: &mut Vec<Inline>) {
    let element = match node {
        Node::Text(text) => {
            out.push(Inline::Text(collapse_whitespace(text)));
            return;
        }
        Node::Element(element) => element,
    };
    match element.name.as_str() {
        "br" => out.push(Inline::LineBreak),
        "em" | "i" => out.push(Inline::Emphasis(inline_content(&element.children))),
        "strong" | "b" => out.push(Inline::Strong(inline_content(&element.children))),
        "del" | "s" | "strike" => out.push(Inline::Strike(inline_content(&element.children))),
        "code" | "kbd" | "samp" => {
            let mut text = String::new();
            push_raw_text(&element.children, &mut text);
            out.push(Inline::Code(text.replace('\n', " ")));
        }
        "a" => match element.attr("href") {
            Some(href) => out.push(Inline::link(href, inline_content(&element.children))),
            None => out.extend(inline_content(&element.children)),
        },
        "img" => out.push(Inline::Image {
            url: element.attr("src").unwrap_or_default().to_string(),
            alt: element.attr("alt").unwrap_or_default().to_string(),
        }),
        "input" | "script" | "style" | "meta" | "link" | "head" | "title" => {}
        name if is_block(name) => {
            // Block structure inside inline context flattens into lines.
            if out.last().is_some_and(|last| !matches!(last, Inline::LineBreak)) {
                out.push(Inline::LineBreak);
            }
            out.extend(inline_content(&element.children));
        }
        _ => out.extend(inline_content(&element.children)),
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Trims whitespace at line edges; a lone `<br>` is the empty-block marker.
fn finish(mut content: Vec<Inline>) -> Vec<Inline> {
    inline::normalize_inlines(&mut content);
    let len = content.len();
    for idx in 0..len {
        let starts_line = idx == 0 || matches!(content[idx - 1], Inline::LineBreak);
        let ends_line = idx + 1 == len || matches!(content[idx + 1], Inline::LineBreak);
        if let Inline::Text(text) = &mut content[idx] {
            if starts_line {
                *text = text.trim_start_matches(' ').to_string();
            }
            if ends_line {
                *text = text.trim_end_matches(' ').to_string();
            }
        }
    }
    inline::normalize_inlines(&mut content);
    if matches!(content.as_slice(), [Inline::LineBreak]) {
        content.clear();
    }
    inline::canonicalize(&mut content);
    content
}
