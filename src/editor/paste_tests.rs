use super::*;
use crate::cursor::line_text;
use crate::document::validate;

fn first_line(document: &Document) -> NodeId {
    collect_lines(document)[0].id
}

fn finish(document: &mut Document) {
    normalize(document);
    assert!(validate(document).is_ok(), "{document:?}");
}

fn cursor_text(document: &Document, cursor: Option<CursorPointer>) -> (String, usize) {
    let cursor = cursor.expect("cursor placed");
    (
        line_text(document, cursor.node).expect("cursor line"),
        cursor.offset,
    )
}

fn paste_into(source: &str, line: usize, offset: usize, payload: &ClipboardPayload) -> (Document, Option<CursorPointer>) {
    let mut document = markdown::decode(source);
    let id = collect_lines(&document)[line].id;
    let cursor = CursorPointer::new(id, offset);
    let literal = content::is_literal_context(&document, &cursor);
    let target = match classify(payload, literal, true).expect("payload classified") {
        Paste::Text(text) => content::insert_text(&mut document, &cursor, &text)
            .map(|len| CursorPointer::new(id, offset + len)),
        Paste::Link(url) => insert_link(&mut document, &cursor, &url),
        Paste::Fragment(fragment) => insert_fragment(&mut document, &cursor, fragment),
    };
    finish(&mut document);
    (document, target)
}

#[test]
fn bare_urls_are_recognized_on_a_single_line() {
    assert_eq!(bare_url("https://example.com"), Some("https://example.com"));
    assert_eq!(bare_url("  http://a.b/c?d=e  \n"), Some("http://a.b/c?d=e"));
    assert_eq!(bare_url("mailto:me@example.com"), Some("mailto:me@example.com"));
    assert_eq!(bare_url("see https://example.com"), None);
    assert_eq!(bare_url("https://a.com\nhttps://b.com"), None);
    assert_eq!(bare_url("example.com"), None);
}

#[test]
fn literal_context_wins_over_every_other_format() {
    let payload = ClipboardPayload::markdown("**x**").with_plain("x");
    assert_eq!(
        classify(&payload, true, true),
        Some(Paste::Text("x".to_string()))
    );
    let html_only = ClipboardPayload::html("<p>a</p><p>b</p>");
    assert_eq!(
        classify(&html_only, true, true),
        Some(Paste::Text("a\nb".to_string()))
    );
}

#[test]
fn markdown_is_preferred_then_urls_then_html() {
    let payload = ClipboardPayload {
        plain: Some("https://example.com".to_string()),
        markdown: Some("- a".to_string()),
        html: Some("<p>b</p>".to_string()),
    };
    assert!(matches!(classify(&payload, false, true), Some(Paste::Fragment(doc)) if markdown::encode(&doc) == "- a\n"));

    let without_markdown = ClipboardPayload {
        markdown: None,
        ..payload.clone()
    };
    assert_eq!(
        classify(&without_markdown, false, true),
        Some(Paste::Link("https://example.com".to_string()))
    );
    assert!(matches!(
        classify(&without_markdown, false, false),
        Some(Paste::Fragment(doc)) if markdown::encode(&doc) == "b\n"
    ));
}

#[test]
fn plain_text_splits_into_paragraphs_per_line() {
    assert_eq!(
        classify(&ClipboardPayload::plain("one line"), false, true),
        Some(Paste::Text("one line".to_string()))
    );
    let Some(Paste::Fragment(fragment)) = classify(&ClipboardPayload::plain("a\n\nb"), false, true)
    else {
        panic!("expected a fragment");
    };
    assert_eq!(fragment.blocks.len(), 3);
    assert!(fragment.blocks[1].is_empty_paragraph());
    assert!(classify(&ClipboardPayload::default(), false, true).is_none());
}

#[test]
fn url_into_empty_paragraph_becomes_a_link() {
    let mut document = Document::new().with_blocks(vec![Block::Paragraph(Paragraph::empty())]);
    let cursor = CursorPointer::start_of(first_line(&document));
    let target = insert_link(&mut document, &cursor, "https://example.com");
    finish(&mut document);
    assert_eq!(
        html::render(&document),
        "<p><a href=\"https://example.com\">https://example.com</a></p>"
    );
    assert_eq!(
        markdown::encode(&document),
        "[https://example.com](https://example.com)\n"
    );
    assert_eq!(target.map(|cursor| cursor.offset), Some(19));
}

#[test]
fn url_over_a_selection_links_only_the_selected_text() {
    let mut document = markdown::decode("クリックここ");
    let id = first_line(&document);
    assert!(link_range(&mut document, id, 4, 6, "https://example.com"));
    finish(&mut document);
    assert_eq!(
        html::render(&document),
        "<p>クリック<a href=\"https://example.com\">ここ</a></p>"
    );
    assert_eq!(line_text(&document, id).as_deref(), Some("クリックここ"));
}

#[test]
fn url_cannot_link_inside_code() {
    let mut document = markdown::decode("```\nx\n```");
    let id = first_line(&document);
    assert!(!link_range(&mut document, id, 0, 1, "https://example.com"));
}

#[test]
fn loose_html_list_pastes_tight_and_keeps_nesting() {
    let payload = ClipboardPayload::html(
        "<ul><li><p>one</p><ul><li><p>two</p></li></ul></li><li><p>three</p></li></ul>",
    );
    let (document, target) = paste_into("<br>", 0, 0, &payload);
    assert_eq!(markdown::encode(&document), "- one\n  - two\n- three\n");
    assert_eq!(cursor_text(&document, target), ("three".to_string(), 5));
}

#[test]
fn html_character_references_paste_as_their_characters() {
    let payload = ClipboardPayload::html("<p>a&mdash;b &ldquo;q&rdquo;&#0;</p>");
    let (document, target) = paste_into("<br>", 0, 0, &payload);
    assert_eq!(markdown::encode(&document), "a\u{2014}b \u{201c}q\u{201d}\u{fffd}\n");
    assert_eq!(
        cursor_text(&document, target),
        ("a\u{2014}b \u{201c}q\u{201d}\u{fffd}".to_string(), 8)
    );
}

#[test]
fn multi_line_plain_text_splits_the_current_paragraph() {
    let (document, target) = paste_into("ab", 0, 1, &ClipboardPayload::plain("x\ny"));
    assert_eq!(markdown::encode(&document), "ax\n\nyb\n");
    assert_eq!(cursor_text(&document, target), ("yb".to_string(), 1));
}

#[test]
fn blocks_land_between_head_and_tail() {
    let (document, target) = paste_into("ab", 0, 1, &ClipboardPayload::markdown("# T\n\n---"));
    assert_eq!(markdown::encode(&document), "a\n\n# T\n\n---\n\nb\n");
    assert_eq!(cursor_text(&document, target), ("b".to_string(), 0));
}

#[test]
fn code_blocks_take_pastes_literally() {
    let payload = ClipboardPayload::markdown("**x**\n- y");
    let (document, target) = paste_into("```\nz\n```", 0, 1, &payload);
    assert_eq!(markdown::encode(&document), "```\nz**x**\n- y\n```\n");
    assert_eq!(target.map(|cursor| cursor.offset), Some(10));
}

#[test]
fn paste_inside_inline_code_is_literal() {
    let payload = ClipboardPayload::markdown("*x*");
    let (document, _) = paste_into("`ab`", 0, 1, &payload);
    assert_eq!(markdown::encode(&document), "`a*x*b`\n");
}

#[test]
fn paste_into_a_list_item_adds_sibling_items() {
    let (document, target) = paste_into("- ab\n- c", 0, 1, &ClipboardPayload::markdown("x\n\ny"));
    assert_eq!(markdown::encode(&document), "- ax\n- yb\n- c\n");
    assert_eq!(cursor_text(&document, target), ("yb".to_string(), 1));
}

#[test]
fn pasted_items_keep_their_nesting_inside_a_list() {
    let payload = ClipboardPayload::markdown("- x\n  - y\n- z");
    let (document, target) = paste_into("- a\n  - a1", 0, 1, &payload);
    assert_eq!(markdown::encode(&document), "- ax\n  - y\n- z\n  - a1\n");
    assert_eq!(cursor_text(&document, target), ("z".to_string(), 1));
}

#[test]
fn checked_state_survives_only_in_task_lists() {
    let payload = ClipboardPayload::markdown("- [x] done\n- [ ] open");
    let (bullets, _) = paste_into("- a", 0, 1, &payload);
    assert_eq!(markdown::encode(&bullets), "- adone\n- open\n");
    let (tasks, _) = paste_into("- [ ] a", 0, 1, &payload);
    assert_eq!(markdown::encode(&tasks), "- [ ] adone\n- [ ] open\n");
}

#[test]
fn copy_within_a_line_keeps_inline_formatting() {
    let document = markdown::decode("say **hello** world");
    let id = first_line(&document);
    let selection = Selection::new(CursorPointer::new(id, 4), CursorPointer::new(id, 9));
    let payload = copy(&document, &selection).expect("payload");
    assert_eq!(payload.plain.as_deref(), Some("hello"));
    assert_eq!(payload.markdown.as_deref(), Some("**hello**\n"));
    assert_eq!(payload.html.as_deref(), Some("<p><strong>hello</strong></p>"));
}

#[test]
fn copy_across_lines_gives_one_paragraph_per_line() {
    let document = markdown::decode("# Title\n\n- a\n- bc");
    let lines = collect_lines(&document);
    let selection = Selection::new(
        CursorPointer::new(lines[2].id, 1),
        CursorPointer::new(lines[0].id, 2),
    );
    let payload = copy(&document, &selection).expect("payload");
    assert_eq!(payload.plain.as_deref(), Some("tle\na\nb"));
    assert_eq!(payload.markdown.as_deref(), Some("tle\n\na\n\nb\n"));
}

#[test]
fn copied_code_lines_stay_code_blocks() {
    let document = markdown::decode("x\n\n```rust\nfn\n```");
    let lines = collect_lines(&document);
    let selection = Selection::new(
        CursorPointer::start_of(lines[0].id),
        CursorPointer::new(lines[1].id, lines[1].len),
    );
    let payload = copy(&document, &selection).expect("payload");
    assert_eq!(payload.markdown.as_deref(), Some("x\n\n```rust\nfn\n```\n"));
    assert!(copy(&document, &Selection::collapsed(selection.anchor)).is_none());
}

fn copy_lines(source: &str, first: usize, last: usize) -> ClipboardPayload {
    let document = markdown::decode(source);
    let lines = collect_lines(&document);
    let selection = Selection::new(
        CursorPointer::start_of(lines[first].id),
        CursorPointer::new(lines[last].id, lines[last].len),
    );
    copy(&document, &selection).expect("payload")
}

#[test]
fn copying_whole_items_keeps_the_list_and_its_nesting() {
    let payload = copy_lines("- a\n  - b\n- c", 0, 2);
    assert_eq!(payload.markdown.as_deref(), Some("- a\n  - b\n- c\n"));
    assert_eq!(payload.plain.as_deref(), Some("a\nb\nc"));

    let (document, target) = paste_into("<br>", 0, 0, &payload);
    assert_eq!(markdown::encode(&document), "- a\n  - b\n- c\n");
    assert_eq!(cursor_text(&document, target), ("c".to_string(), 1));
}

#[test]
fn copying_whole_task_items_keeps_checked_state() {
    let payload = copy_lines("intro\n\n- [x] done\n- [ ] open\n\nafter", 1, 2);
    assert_eq!(payload.markdown.as_deref(), Some("- [x] done\n- [ ] open\n"));
}

#[test]
fn copying_from_a_nested_item_lifts_it_out_of_its_unselected_parent() {
    let payload = copy_lines("- a\n  - b\n- c\n\n---\n\nd", 1, 3);
    assert_eq!(payload.markdown.as_deref(), Some("- b\n- c\n\n---\n\nd\n"));
}
