use super::*;
use crate::cursor::line_text;
use crate::document::validate;

fn line_id(editor: &DocumentEditor, line: usize) -> crate::document::NodeId {
    collect_lines(editor.document())[line].id
}

fn editor_at(source: &str, line: usize, offset: usize) -> DocumentEditor {
    let mut editor = DocumentEditor::from_markdown(source);
    let id = line_id(&editor, line);
    let moved = editor.move_to_pointer(CursorPointer::new(id, offset));
    assert!(moved || (line, offset) == (0, 0));
    editor
}

fn select(editor: &mut DocumentEditor, from: (usize, usize), to: (usize, usize)) {
    let anchor = CursorPointer::new(line_id(editor, from.0), from.1);
    let focus = CursorPointer::new(line_id(editor, to.0), to.1);
    assert!(editor.set_selection(Selection::new(anchor, focus)));
}

fn caret(editor: &DocumentEditor) -> (String, usize) {
    let cursor = editor.cursor_pointer();
    (
        line_text(editor.document(), cursor.node).expect("cursor line"),
        cursor.offset,
    )
}

fn assert_valid(editor: &DocumentEditor) {
    assert!(validate(editor.document()).is_ok(), "{:?}", editor.document());
}

#[test]
fn backspace_twice_in_empty_nested_item_splits_then_merges() {
    let mut editor = DocumentEditor::new(html::parse(
        "<ul><li>ccc<ul><li>dd</li><li><br></li><li>fff</li></ul></li></ul>",
    ));
    let empty = line_id(&editor, 2);
    editor.move_to_pointer(CursorPointer::start_of(empty));

    assert!(editor.backspace());
    assert_eq!(
        editor.to_html(),
        "<ul><li>ccc<ul><li>dd</li></ul><p><br></p><ul><li>fff</li></ul></li></ul>"
    );
    assert_eq!(editor.cursor_pointer(), CursorPointer::start_of(empty));

    assert!(editor.backspace());
    assert_eq!(
        editor.to_html(),
        "<ul><li>ccc<ul><li>dd</li><li>fff</li></ul></li></ul>"
    );
    assert_eq!(caret(&editor), ("dd".to_string(), 2));
    assert_valid(&editor);
}

#[test]
fn tab_over_selection_nests_items() {
    let mut editor =
        DocumentEditor::new(html::parse("<ul><li>aaa</li><li>bbb</li><li>ccc</li><li>ddd</li></ul>"));
    select(&mut editor, (1, 0), (2, 3));
    assert!(editor.can_indent());
    assert!(editor.indent());
    assert_eq!(
        editor.to_html(),
        "<ul><li>aaa<ul><li>bbb</li><li>ccc</li></ul></li><li>ddd</li></ul>"
    );
    assert!(editor.outdent());
    assert_eq!(
        editor.to_html(),
        "<ul><li>aaa</li><li>bbb</li><li>ccc</li><li>ddd</li></ul>"
    );
}

#[test]
fn pasting_url_into_empty_paragraph_inserts_link() {
    let mut editor = DocumentEditor::from_markdown("");
    assert!(editor.paste(&ClipboardPayload::plain("https://example.com")));
    assert_eq!(
        editor.to_html(),
        "<p><a href=\"https://example.com\">https://example.com</a></p>"
    );
    assert_eq!(editor.to_markdown(), "[https://example.com](https://example.com)\n");
}

#[test]
fn pasting_url_over_selection_links_the_selected_text() {
    let mut editor = DocumentEditor::from_markdown("クリックここ");
    select(&mut editor, (0, 4), (0, 6));
    assert!(editor.paste(&ClipboardPayload::plain("https://example.com")));
    assert_eq!(
        editor.to_html(),
        "<p>クリック<a href=\"https://example.com\">ここ</a></p>"
    );
    assert_eq!(caret(&editor), ("クリックここ".to_string(), 6));
}

#[test]
fn autolink_can_be_switched_off() {
    let config = EditorConfig {
        autolink_pastes: false,
        ..EditorConfig::default()
    };
    let mut editor = DocumentEditor::with_config(markdown::decode(""), config);
    assert!(editor.paste(&ClipboardPayload::plain("https://example.com")));
    assert_eq!(editor.to_html(), "<p>https://example.com</p>");
}

#[test]
fn enter_splits_list_item_into_sibling() {
    let mut editor = editor_at("- ab", 0, 1);
    assert!(editor.insert_paragraph_break());
    assert_eq!(editor.to_markdown(), "- a\n- b\n");
    assert_eq!(caret(&editor), ("b".to_string(), 0));
}

#[test]
fn enter_moves_nested_lists_to_the_new_item() {
    let mut editor = editor_at("- ab\n  - c", 0, 1);
    assert!(editor.insert_paragraph_break());
    assert_eq!(editor.to_markdown(), "- a\n- b\n  - c\n");
}

#[test]
fn enter_in_task_item_starts_unchecked() {
    let mut editor = editor_at("- [x] ab", 0, 1);
    assert!(editor.insert_paragraph_break());
    assert_eq!(editor.to_markdown(), "- [x] a\n- [ ] b\n");
}

#[test]
fn enter_on_empty_item_outdents() {
    let mut top = editor_at("- a\n-", 1, 0);
    assert!(top.insert_paragraph_break());
    assert_eq!(top.to_markdown(), "- a\n\n<br>\n");

    let mut nested = editor_at("- a\n  -", 1, 0);
    assert!(nested.insert_paragraph_break());
    assert_eq!(nested.to_markdown(), "- a\n-\n");
}

#[test]
fn enter_in_heading_leaves_a_paragraph() {
    let mut middle = editor_at("# Title", 0, 2);
    assert!(middle.insert_paragraph_break());
    assert_eq!(middle.to_markdown(), "# Ti\n\ntle\n");

    let mut start = editor_at("# Title", 0, 0);
    assert!(start.insert_paragraph_break());
    assert_eq!(start.to_markdown(), "<br>\n\n# Title\n");
    assert_eq!(caret(&start), ("Title".to_string(), 0));
}

#[test]
fn enter_in_code_block_inserts_newline() {
    let mut editor = editor_at("```\nab\n```", 0, 1);
    assert!(editor.insert_paragraph_break());
    assert_eq!(editor.to_markdown(), "```\na\nb\n```\n");
    assert_eq!(editor.cursor_pointer().offset, 2);
}

#[test]
fn enter_in_paragraph_and_quote_splits_the_block() {
    let mut paragraph = editor_at("ab", 0, 1);
    assert!(paragraph.insert_paragraph_break());
    assert_eq!(paragraph.to_markdown(), "a\n\nb\n");

    let mut quote = editor_at("> ab", 0, 1);
    assert!(quote.insert_paragraph_break());
    assert_eq!(quote.to_markdown(), "> a\n\n> b\n");

    let mut empty = DocumentEditor::new(
        Document::new().with_blocks(vec![Block::Blockquote(Blockquote::new(vec![Inline::Placeholder]))]),
    );
    assert!(empty.insert_paragraph_break());
    assert_eq!(empty.to_html(), "<p><br></p>");
}

#[test]
fn shift_enter_inserts_line_break() {
    let mut editor = editor_at("ab", 0, 1);
    assert!(editor.insert_line_break());
    assert_eq!(editor.to_html(), "<p>a<br>b</p>");
    assert_eq!(editor.cursor_pointer().offset, 2);
}

#[test]
fn composition_suppresses_structural_gestures() {
    let mut editor = editor_at("- a\n- b", 1, 0);
    editor.begin_composition();
    assert!(editor.is_composing());
    assert!(!editor.backspace());
    assert!(!editor.indent());
    assert!(!editor.can_indent());
    assert!(!editor.insert_paragraph_break());
    assert_eq!(editor.to_markdown(), "- a\n- b\n");

    assert!(editor.insert_text("x"));
    assert!(editor.paste(&ClipboardPayload::markdown("**y**")));
    assert_eq!(caret(&editor), ("x**y**b".to_string(), 6));
    assert!(editor.backspace());
    assert_eq!(caret(&editor), ("x**y*b".to_string(), 5));

    editor.end_composition();
    editor.move_to_line_start();
    assert!(editor.indent());
    assert_eq!(editor.to_markdown(), "- a\n  - x\\*\\*y\\*b\n");
}

#[test]
fn toggle_task_flips_only_task_items() {
    let mut editor = DocumentEditor::from_markdown("- [ ] a");
    assert!(editor.toggle_task());
    assert_eq!(editor.to_markdown(), "- [x] a\n");
    assert!(editor.toggle_task());
    assert_eq!(editor.to_markdown(), "- [ ] a\n");

    let mut bullets = DocumentEditor::from_markdown("- a");
    assert!(!bullets.toggle_task());
}

#[test]
fn cursor_motion_crosses_lines() {
    let mut editor = DocumentEditor::from_markdown("ab\n\ncd");
    assert!(editor.move_right());
    assert!(editor.move_right());
    assert_eq!(caret(&editor), ("ab".to_string(), 2));
    assert!(editor.move_right());
    assert_eq!(caret(&editor), ("cd".to_string(), 0));
    assert!(editor.move_left());
    assert_eq!(caret(&editor), ("ab".to_string(), 2));

    assert!(editor.move_left());
    assert!(editor.move_down());
    assert_eq!(caret(&editor), ("cd".to_string(), 1));
    assert!(!editor.move_down());
    assert!(editor.move_up());
    assert_eq!(caret(&editor), ("ab".to_string(), 1));

    assert!(editor.move_to_line_end());
    assert_eq!(editor.cursor_pointer().offset, 2);
    assert!(editor.move_to_line_start());
    assert_eq!(editor.cursor_pointer().offset, 0);
    assert!(!editor.move_left());
}

#[test]
fn moving_collapses_a_selection_to_its_edge() {
    let mut editor = DocumentEditor::from_markdown("abc\n\ndef");
    select(&mut editor, (1, 2), (0, 1));
    assert!(editor.move_left());
    assert_eq!(caret(&editor), ("abc".to_string(), 1));
    select(&mut editor, (1, 2), (0, 1));
    assert!(editor.move_right());
    assert_eq!(caret(&editor), ("def".to_string(), 2));
}

#[test]
fn select_to_pointer_keeps_the_anchor() {
    let mut editor = DocumentEditor::from_markdown("abc");
    let id = line_id(&editor, 0);
    assert!(editor.select_to_pointer(CursorPointer::new(id, 10)));
    assert_eq!(
        editor.selection(),
        Selection::new(CursorPointer::start_of(id), CursorPointer::new(id, 3))
    );
}

#[test]
fn placeholder_survives_edits_around_it() {
    let mut editor = editor_at("- a\n-\n  - child\n- c", 3, 1);
    assert!(editor.insert_char('d'));
    assert!(editor.backspace());
    assert!(editor.backspace());
    assert!(editor.move_to_pointer(CursorPointer::new(line_id(&editor, 0), 1)));
    assert!(editor.insert_paragraph_break());
    assert!(editor.backspace());

    let rendered = editor.to_html();
    assert_eq!(rendered.matches("<li><br><ul><li>child</li></ul></li>").count(), 1);
    assert_valid(&editor);
}

#[test]
fn delete_joins_next_paragraph_or_sibling_item() {
    let mut paragraphs = editor_at("a\n\nb", 0, 1);
    assert!(paragraphs.delete());
    assert_eq!(paragraphs.to_markdown(), "ab\n");

    let mut items = editor_at("- a\n- b\n  - b1", 0, 1);
    assert!(items.delete());
    assert_eq!(items.to_markdown(), "- ab\n  - b1\n");
    assert_eq!(caret(&items), ("ab".to_string(), 1));

    let mut nested = editor_at("- a\n  - b", 0, 1);
    assert!(!nested.delete());

    let mut within = editor_at("abc", 0, 1);
    assert!(within.delete());
    assert_eq!(within.to_markdown(), "ac\n");
}

#[test]
fn selection_deletion_joins_the_end_line_into_the_start_line() {
    let mut editor = DocumentEditor::from_markdown("- one\n- two\n- three");
    select(&mut editor, (0, 1), (2, 2));
    assert!(editor.backspace());
    assert_eq!(editor.to_markdown(), "- oree\n");
    assert_eq!(caret(&editor), ("oree".to_string(), 1));
    assert_valid(&editor);
}

#[test]
fn typing_replaces_the_selection() {
    let mut editor = DocumentEditor::from_markdown("abc");
    select(&mut editor, (0, 1), (0, 2));
    assert!(editor.insert_char('x'));
    assert_eq!(editor.to_markdown(), "axc\n");
    assert_eq!(editor.cursor_pointer().offset, 2);
}

#[test]
fn copy_then_paste_round_trips_formatting() {
    let mut source = DocumentEditor::from_markdown("hello **world**");
    select(&mut source, (0, 6), (0, 11));
    let payload = source.copy_selection().expect("payload");

    let mut target = DocumentEditor::from_markdown("");
    assert!(target.paste(&payload));
    assert_eq!(target.to_markdown(), "**world**\n");
}

#[test]
fn loading_markdown_resets_the_cursor() {
    let mut editor = editor_at("a\n\nb", 1, 1);
    assert!(editor.load_markdown("x\n\ny"));
    assert_eq!(caret(&editor), ("x".to_string(), 0));
    assert_eq!(editor.current_line().map(|line| line.kind), Some(LineKind::Paragraph));
}

#[test]
fn document_without_lines_gets_an_editable_paragraph() {
    let editor = DocumentEditor::from_markdown("---");
    assert_eq!(editor.to_markdown(), "---\n\n<br>\n");
    assert!(editor.current_line().is_some());
}

#[test]
fn ordered_numbering_follows_the_config() {
    let config = EditorConfig {
        encode: EncodeOptions {
            ordered_numbering: markdown::OrderedNumbering::Repeated,
        },
        ..EditorConfig::default()
    };
    let editor = DocumentEditor::with_config(markdown::decode("1. a\n2. b"), config);
    assert_eq!(editor.to_markdown(), "1. a\n1. b\n");
}
