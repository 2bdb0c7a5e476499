use std::mem;

/// Inline content node. Offsets into an inline run count characters; a line
/// break and an image each occupy one position, a placeholder none.
#[derive(Clone, Debug, PartialEq)]
pub enum Inline {
    Text(String),
    Emphasis(Vec<Inline>),
    Strong(Vec<Inline>),
    Strike(Vec<Inline>),
    Code(String),
    Link { url: String, content: Vec<Inline> },
    Image { url: String, alt: String },
    LineBreak,
    /// Marker that keeps an otherwise empty block selectable; renders as `<br>`.
    Placeholder,
}

impl Inline {
    pub fn text(text: &str) -> Self {
        Inline::Text(text.to_string())
    }

    pub fn link(url: &str, content: Vec<Inline>) -> Self {
        Inline::Link {
            url: url.to_string(),
            content,
        }
    }

    fn children_mut(&mut self) -> Option<&mut Vec<Inline>> {
        match self {
            Inline::Emphasis(children)
            | Inline::Strong(children)
            | Inline::Strike(children)
            | Inline::Link {
                content: children, ..
            } => Some(children),
            _ => None,
        }
    }

    fn with_children(&self, children: Vec<Inline>) -> Inline {
        match self {
            Inline::Emphasis(_) => Inline::Emphasis(children),
            Inline::Strong(_) => Inline::Strong(children),
            Inline::Strike(_) => Inline::Strike(children),
            Inline::Link { url, .. } => Inline::Link {
                url: url.clone(),
                content: children,
            },
            other => other.clone(),
        }
    }
}

pub fn inline_len(inline: &Inline) -> usize {
    match inline {
        Inline::Text(text) | Inline::Code(text) => text.chars().count(),
        Inline::Emphasis(children)
        | Inline::Strong(children)
        | Inline::Strike(children)
        | Inline::Link {
            content: children, ..
        } => content_len(children),
        Inline::Image { .. } | Inline::LineBreak => 1,
        Inline::Placeholder => 0,
    }
}

pub fn content_len(content: &[Inline]) -> usize {
    content.iter().map(inline_len).sum()
}

pub fn is_blank(content: &[Inline]) -> bool {
    content_len(content) == 0
}

/// Text of the run with one character per offset position.
pub fn plain_text(content: &[Inline]) -> String {
    let mut out = String::new();
    push_plain_text(content, &mut out);
    out
}

fn push_plain_text(content: &[Inline], out: &mut String) {
    for inline in content {
        match inline {
            Inline::Text(text) | Inline::Code(text) => out.push_str(text),
            Inline::Emphasis(children)
            | Inline::Strong(children)
            | Inline::Strike(children)
            | Inline::Link {
                content: children, ..
            } => push_plain_text(children, out),
            Inline::Image { .. } => out.push('\u{FFFC}'),
            Inline::LineBreak => out.push('\n'),
            Inline::Placeholder => {}
        }
    }
}

pub fn char_to_byte_idx(text: &str, char_idx: usize) -> usize {
    text.char_indices()
        .nth(char_idx)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len())
}

/// Splits a run at a character offset. Wrappers straddling the offset are
/// duplicated on both sides; placeholders are dropped.
pub fn split_at(content: Vec<Inline>, offset: usize) -> (Vec<Inline>, Vec<Inline>) {
    let mut head = Vec::new();
    let mut tail = Vec::new();
    let mut remaining = offset;
    let mut in_tail = false;

    for inline in content {
        if matches!(inline, Inline::Placeholder) {
            continue;
        }
        if in_tail || remaining == 0 {
            in_tail = true;
            tail.push(inline);
            continue;
        }
        let len = inline_len(&inline);
        if len <= remaining {
            remaining -= len;
            head.push(inline);
            continue;
        }
        let (left, right) = split_inline(inline, remaining);
        head.push(left);
        tail.push(right);
        remaining = 0;
        in_tail = true;
    }

    (head, tail)
}

fn split_inline(inline: Inline, at: usize) -> (Inline, Inline) {
    match inline {
        Inline::Text(text) => {
            let idx = char_to_byte_idx(&text, at);
            let (a, b) = text.split_at(idx);
            (Inline::Text(a.to_string()), Inline::Text(b.to_string()))
        }
        Inline::Code(text) => {
            let idx = char_to_byte_idx(&text, at);
            let (a, b) = text.split_at(idx);
            (Inline::Code(a.to_string()), Inline::Code(b.to_string()))
        }
        mut wrapper => {
            let Some(children) = wrapper.children_mut() else {
                return (wrapper, Inline::Text(String::new()));
            };
            let (left, right) = split_at(mem::take(children), at);
            (wrapper.with_children(left), wrapper.with_children(right))
        }
    }
}

/// Copy of the characters in `[start, end)`.
pub fn slice(content: &[Inline], start: usize, end: usize) -> Vec<Inline> {
    let (_, rest) = split_at(content.to_vec(), start);
    let (middle, _) = split_at(rest, end.saturating_sub(start));
    middle
}

pub fn delete_range(content: &mut Vec<Inline>, start: usize, end: usize) {
    if end <= start {
        return;
    }
    let (mut head, rest) = split_at(mem::take(content), start);
    let (_, tail) = split_at(rest, end - start);
    head.extend(tail);
    *content = head;
    normalize_inlines(content);
}

/// Inserts plain text, extending the text leaf that touches the offset so
/// that typing at the end of a styled run continues the style.
pub fn insert_text(content: &mut Vec<Inline>, offset: usize, text: &str) {
    if text.is_empty() {
        return;
    }
    if !insert_into_leaf(content, offset, text) {
        let (mut head, tail) = split_at(mem::take(content), offset);
        head.push(Inline::text(text));
        head.extend(tail);
        *content = head;
    }
    normalize_inlines(content);
}

fn insert_into_leaf(content: &mut [Inline], offset: usize, text: &str) -> bool {
    let mut pos = 0;
    for inline in content.iter_mut() {
        let len = inline_len(inline);
        if offset >= pos && offset <= pos + len {
            let local = offset - pos;
            match inline {
                Inline::Text(existing) => {
                    let idx = char_to_byte_idx(existing, local);
                    existing.insert_str(idx, text);
                    return true;
                }
                Inline::Code(existing) if local > 0 && local < len => {
                    let idx = char_to_byte_idx(existing, local);
                    existing.insert_str(idx, text);
                    return true;
                }
                Inline::Link { content, .. } if local > 0 && local < len => {
                    if insert_into_leaf(content, local, text) {
                        return true;
                    }
                }
                Inline::Emphasis(children) | Inline::Strong(children) | Inline::Strike(children)
                    if len > 0 =>
                {
                    if insert_into_leaf(children, local, text) {
                        return true;
                    }
                }
                _ => {}
            }
        }
        pos += len;
    }
    false
}

pub fn insert_inlines(content: &mut Vec<Inline>, offset: usize, inserted: Vec<Inline>) {
    let (mut head, tail) = split_at(mem::take(content), offset);
    head.extend(inserted);
    head.extend(tail);
    *content = head;
    normalize_inlines(content);
}

/// Appends `other` to the end of `content`, dropping placeholders of both.
pub fn append(content: &mut Vec<Inline>, other: Vec<Inline>) {
    content.retain(|inline| !matches!(inline, Inline::Placeholder));
    content.extend(other);
    normalize_inlines(content);
}

/// Replaces `[start, end)` with `wrap(selected)`. Links inside the range are
/// unwrapped first so links never nest.
pub fn wrap_range<F>(content: &mut Vec<Inline>, start: usize, end: usize, wrap: F)
where
    F: FnOnce(Vec<Inline>) -> Inline,
{
    let (mut head, rest) = split_at(mem::take(content), start);
    let (middle, tail) = split_at(rest, end.saturating_sub(start));
    head.push(wrap(unwrap_links(middle)));
    head.extend(tail);
    *content = head;
    normalize_inlines(content);
}

fn unwrap_links(content: Vec<Inline>) -> Vec<Inline> {
    let mut out = Vec::with_capacity(content.len());
    for inline in content {
        match inline {
            Inline::Link { content, .. } => out.extend(unwrap_links(content)),
            mut other => {
                if let Some(children) = other.children_mut() {
                    let unwrapped = unwrap_links(mem::take(children));
                    *children = unwrapped;
                }
                out.push(other);
            }
        }
    }
    out
}

/// True when the offset lies strictly inside an inline code span.
pub fn is_inside_code(content: &[Inline], offset: usize) -> bool {
    let mut pos = 0;
    for inline in content {
        let len = inline_len(inline);
        if offset >= pos && offset <= pos + len {
            let local = offset - pos;
            match inline {
                Inline::Code(_) if local > 0 && local < len => return true,
                Inline::Emphasis(children)
                | Inline::Strong(children)
                | Inline::Strike(children)
                | Inline::Link {
                    content: children, ..
                } => {
                    if is_inside_code(children, local) {
                        return true;
                    }
                }
                _ => {}
            }
        }
        pos += len;
    }
    false
}

/// Merges adjacent text and identical wrappers, drops empty leaves and
/// placeholders. Character offsets are unchanged.
pub fn normalize_inlines(content: &mut Vec<Inline>) {
    let items = mem::take(content);
    let mut out: Vec<Inline> = Vec::with_capacity(items.len());
    for mut inline in items {
        match &mut inline {
            Inline::Text(text) | Inline::Code(text) if text.is_empty() => continue,
            Inline::Placeholder => continue,
            other => {
                if let Some(children) = other.children_mut() {
                    normalize_inlines(children);
                    if children.is_empty() {
                        continue;
                    }
                }
            }
        }
        let inline = emphasis_outermost(inline);
        let pending = match out.last_mut() {
            Some(previous) => merge_into(previous, inline),
            None => Some(inline),
        };
        if let Some(inline) = pending {
            out.push(inline);
        }
    }
    *content = out;
}

/// `***x***` reads back as emphasis around strong, so that nesting is the
/// canonical one.
fn emphasis_outermost(inline: Inline) -> Inline {
    match inline {
        Inline::Strong(mut children) if matches!(children.as_slice(), [Inline::Emphasis(_)]) => {
            match children.pop() {
                Some(Inline::Emphasis(inner)) => Inline::Emphasis(vec![Inline::Strong(inner)]),
                _ => Inline::Strong(children),
            }
        }
        other => other,
    }
}

fn merge_into(previous: &mut Inline, next: Inline) -> Option<Inline> {
    match (previous, next) {
        (Inline::Text(prev), Inline::Text(text)) => {
            prev.push_str(&text);
            None
        }
        (Inline::Emphasis(prev), Inline::Emphasis(children))
        | (Inline::Strong(prev), Inline::Strong(children))
        | (Inline::Strike(prev), Inline::Strike(children)) => {
            prev.extend(children);
            normalize_inlines(prev);
            None
        }
        (
            Inline::Link {
                url: prev_url,
                content: prev,
            },
            Inline::Link { url, content },
        ) if *prev_url == url => {
            prev.extend(content);
            normalize_inlines(prev);
            None
        }
        (_, next) => Some(next),
    }
}

/// Normalizes the run and applies the placeholder rule: blank runs hold
/// exactly one placeholder.
pub fn canonicalize(content: &mut Vec<Inline>) {
    normalize_inlines(content);
    if content.is_empty() {
        content.push(Inline::Placeholder);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn styled() -> Vec<Inline> {
        vec![
            Inline::text("Hello "),
            Inline::Strong(vec![Inline::text("World")]),
            Inline::text("!"),
        ]
    }

    #[test]
    fn split_duplicates_straddling_wrapper() {
        let (head, tail) = split_at(styled(), 8);
        assert_eq!(
            head,
            vec![
                Inline::text("Hello "),
                Inline::Strong(vec![Inline::text("Wo")])
            ]
        );
        assert_eq!(
            tail,
            vec![
                Inline::Strong(vec![Inline::text("rld")]),
                Inline::text("!")
            ]
        );
    }

    #[test]
    fn delete_range_merges_remaining_text() {
        let mut content = styled();
        delete_range(&mut content, 5, 12);
        assert_eq!(content, vec![Inline::text("Hello")]);
    }

    #[test]
    fn typing_at_end_of_strong_extends_it() {
        let mut content = styled();
        insert_text(&mut content, 11, " class");
        assert_eq!(plain_text(&content), "Hello World class!");
        assert_eq!(content[1], Inline::Strong(vec![Inline::text("World class")]));
    }

    #[test]
    fn insert_into_placeholder_replaces_it() {
        let mut content = vec![Inline::Placeholder];
        insert_text(&mut content, 0, "a");
        assert_eq!(content, vec![Inline::text("a")]);
    }

    #[test]
    fn wrap_range_handles_multibyte_text() {
        let mut content = vec![Inline::text("クリックここ")];
        wrap_range(&mut content, 4, 6, |inner| {
            Inline::link("https://example.com", inner)
        });
        assert_eq!(
            content,
            vec![
                Inline::text("クリック"),
                Inline::link("https://example.com", vec![Inline::text("ここ")]),
            ]
        );
    }

    #[test]
    fn offsets_count_breaks_and_images() {
        let content = vec![
            Inline::text("ab"),
            Inline::LineBreak,
            Inline::Image {
                url: "x.png".into(),
                alt: "x".into(),
            },
            Inline::Placeholder,
        ];
        assert_eq!(content_len(&content), 4);
        assert_eq!(plain_text(&content), "ab\n\u{FFFC}");
    }

    #[test]
    fn inside_code_excludes_edges() {
        let content = vec![Inline::text("a"), Inline::Code("xyz".into())];
        assert!(!is_inside_code(&content, 1));
        assert!(is_inside_code(&content, 2));
        assert!(!is_inside_code(&content, 4));
    }

    #[test]
    fn strong_emphasis_nests_emphasis_outside() {
        let mut content = vec![Inline::Strong(vec![Inline::Emphasis(vec![Inline::text(
            "x",
        )])])];
        normalize_inlines(&mut content);
        assert_eq!(
            content,
            vec![Inline::Emphasis(vec![Inline::Strong(vec![Inline::text(
                "x"
            )])])]
        );
    }

    #[test]
    fn canonicalize_keeps_single_placeholder() {
        let mut content = vec![
            Inline::Placeholder,
            Inline::Text(String::new()),
            Inline::Placeholder,
        ];
        canonicalize(&mut content);
        assert_eq!(content, vec![Inline::Placeholder]);
    }
}
