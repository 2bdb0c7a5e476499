use super::*;
use crate::cursor::CursorPointer;
use crate::document::{normalize, validate};
use crate::{html, markdown};

type Gesture = fn(&mut Document, &Selection) -> bool;

fn selection_over(document: &Document, from: usize, to: usize) -> Selection {
    let lines = collect_lines(document);
    Selection::new(
        CursorPointer::start_of(lines[from].id),
        CursorPointer::new(lines[to].id, lines[to].len),
    )
}

fn apply(mut document: Document, from: usize, to: usize, gesture: Gesture) -> (Document, bool) {
    let selection = selection_over(&document, from, to);
    let changed = gesture(&mut document, &selection);
    normalize(&mut document);
    assert!(validate(&document).is_ok(), "{document:?}");
    (document, changed)
}

fn on_markdown(source: &str, from: usize, to: usize, gesture: Gesture) -> (String, bool) {
    let (document, changed) = apply(markdown::decode(source), from, to, gesture);
    (markdown::encode(&document), changed)
}

fn texts(document: &Document) -> Vec<String> {
    document.outline().into_iter().map(|(_, text)| text).collect()
}

#[test]
fn tab_over_two_items_nests_them_under_the_previous_one() {
    let document = html::parse("<ul><li>aaa</li><li>bbb</li><li>ccc</li><li>ddd</li></ul>");
    let (document, changed) = apply(document, 1, 2, indent);
    assert!(changed);
    assert_eq!(
        html::render(&document),
        "<ul><li>aaa<ul><li>bbb</li><li>ccc</li></ul></li><li>ddd</li></ul>"
    );
}

#[test]
fn indent_single_item() {
    assert_eq!(
        on_markdown("- a\n- b", 1, 1, indent),
        ("- a\n  - b\n".to_string(), true)
    );
    assert_eq!(
        on_markdown("1. a\n2. b", 1, 1, indent),
        ("1. a\n   1. b\n".to_string(), true)
    );
}

#[test]
fn first_item_cannot_be_indented() {
    assert_eq!(
        on_markdown("- a\n- b", 0, 0, indent),
        ("- a\n- b\n".to_string(), false)
    );
    let document = markdown::decode("- a\n- b");
    assert!(!can_indent(&document, &selection_over(&document, 0, 0)));
    assert!(can_indent(&document, &selection_over(&document, 1, 1)));
}

#[test]
fn indent_appends_after_existing_nested_items() {
    assert_eq!(
        on_markdown("- a\n  - a1\n- b", 2, 2, indent).0,
        "- a\n  - a1\n  - b\n"
    );
}

#[test]
fn indent_under_a_different_kind_adds_a_sibling_list() {
    let (encoded, _) = on_markdown("- a\n  1. a1\n- b", 2, 2, indent);
    assert_eq!(encoded, "- a\n  1. a1\n  - b\n");
    let document = markdown::decode(&encoded);
    let a = &document.blocks[0].as_list().expect("list").items[0];
    let kinds: Vec<_> = a.children.iter().filter_map(Block::list_kind).collect();
    assert_eq!(kinds, vec![ListKind::Ordered, ListKind::Bullet]);
}

#[test]
fn selected_descendants_travel_with_their_ancestor() {
    assert_eq!(
        on_markdown("- x\n- a\n  - a1", 1, 2, indent).0,
        "- x\n  - a\n    - a1\n"
    );
}

#[test]
fn outdent_nested_item() {
    assert_eq!(
        on_markdown("- a\n  - b", 1, 1, outdent),
        ("- a\n- b\n".to_string(), true)
    );
}

#[test]
fn outdent_first_nested_item_keeps_followers_under_it() {
    assert_eq!(
        on_markdown("- a\n  - b\n  - c\n- d", 1, 1, outdent).0,
        "- a\n- b\n  - c\n- d\n"
    );
}

#[test]
fn outdent_carries_trailing_sibling_lists() {
    let source = "- a\n  - b\n  1. c\n- d";
    let before = texts(&markdown::decode(source));
    let (encoded, _) = on_markdown(source, 1, 1, outdent);
    assert_eq!(encoded, "- a\n- b\n  1. c\n- d\n");
    assert_eq!(texts(&markdown::decode(&encoded)), before);
}

#[test]
fn outdented_items_adopt_the_parent_kind() {
    assert_eq!(
        on_markdown("1. a\n   - b", 1, 1, outdent).0,
        "1. a\n2. b\n"
    );
}

#[test]
fn outdent_at_top_level_splits_the_list_in_place() {
    assert_eq!(
        on_markdown("- a\n- b\n- c", 1, 1, outdent).0,
        "- a\n\nb\n\n- c\n"
    );
    assert_eq!(
        on_markdown("- a\n- b\n- c", 0, 1, outdent).0,
        "a\n\nb\n\n- c\n"
    );
}

#[test]
fn outdent_needs_a_list_item() {
    let document = markdown::decode("plain");
    assert!(!can_outdent(&document, &selection_over(&document, 0, 0)));
    assert_eq!(on_markdown("plain", 0, 0, outdent), ("plain\n".to_string(), false));
}

#[test]
fn indent_and_outdent_preserve_line_order_for_every_kind_pair() {
    let markers = [
        (ListKind::Bullet, "- ", 2),
        (ListKind::Ordered, "1. ", 3),
        (ListKind::Task, "- [ ] ", 2),
    ];
    for (outer_kind, outer, column) in markers {
        for (inner_kind, inner, _) in markers {
            let pad = " ".repeat(column);
            let source = format!("{outer}a\n{pad}{inner}b\n{pad}{inner}c\n{outer}d\n{outer}e");
            let original = markdown::decode(&source);
            let expected = texts(&original);
            let line_count = collect_lines(&original).len();
            for from in 0..line_count {
                for to in from..line_count {
                    for gesture in [indent as Gesture, outdent as Gesture] {
                        let (document, _) = apply(original.clone(), from, to, gesture);
                        assert_eq!(
                            texts(&document),
                            expected,
                            "{outer_kind:?}/{inner_kind:?} lines {from}..={to}"
                        );
                    }
                }
            }
        }
    }
}
