use super::*;
use crate::markdown;

fn sample() -> Document {
    markdown::decode("# Title\n\n- one\n  - two\n\n> quote\n\n```\nfn x\n```\n\nend")
}

fn line_id(document: &Document, line: usize) -> NodeId {
    collect_lines(document)[line].id
}

#[test]
fn lines_follow_visual_order() {
    let document = sample();
    let lines = collect_lines(&document);
    let kinds: Vec<_> = lines.iter().map(|line| line.kind).collect();
    assert_eq!(
        kinds,
        vec![
            LineKind::Heading(1),
            LineKind::ListItem(ListKind::Bullet),
            LineKind::ListItem(ListKind::Bullet),
            LineKind::Blockquote,
            LineKind::CodeBlock,
            LineKind::Paragraph,
        ]
    );
    let depths: Vec<_> = lines.iter().map(|line| line.depth).collect();
    assert_eq!(depths, vec![0, 1, 2, 0, 0, 0]);
}

#[test]
fn resolve_clamps_column_and_locate_inverts_it() {
    let document = sample();
    let cursor = resolve(&document, LinePosition { line: 2, column: 99 }).expect("cursor");
    assert_eq!(cursor, CursorPointer::new(line_id(&document, 2), 3));
    assert_eq!(
        locate(&document, &cursor),
        Some(LinePosition { line: 2, column: 3 })
    );
    assert_eq!(resolve(&document, LinePosition { line: 40, column: 0 }), None);
}

#[test]
fn selection_orders_endpoints_and_collapses_to_focus() {
    let document = sample();
    let early = CursorPointer::new(line_id(&document, 1), 2);
    let late = CursorPointer::new(line_id(&document, 3), 1);
    let selection = Selection::new(late, early);
    assert!(!selection.is_collapsed());
    assert!(selection.spans_multiple_lines());
    assert_eq!(selection.ordered(&document), (early, late));
    assert_eq!(selection.collapse(), early);
    assert!(Selection::collapsed(early).is_collapsed());
}

#[test]
fn range_of_line_covers_the_whole_run() {
    let document = sample();
    let id = line_id(&document, 0);
    let (start, end) = range_of_line(&document, &CursorPointer::new(id, 2)).expect("range");
    assert_eq!(start, CursorPointer::new(id, 0));
    assert_eq!(end, CursorPointer::new(id, 5));
}

#[test]
fn line_edges() {
    let document = sample();
    let id = line_id(&document, 1);
    assert!(is_at_line_start(&document, &CursorPointer::new(id, 0)));
    assert!(!is_at_line_start(&document, &CursorPointer::new(id, 1)));
    assert!(is_at_line_end(&document, &CursorPointer::new(id, 3)));
    assert!(!is_at_line_end(&document, &CursorPointer::new(id, 2)));
    assert!(!is_at_line_start(&document, &CursorPointer::new(NodeId::fresh(), 0)));
}

#[test]
fn structural_boundaries_by_kind() {
    let document = sample();
    let item = CursorPointer::new(line_id(&document, 2), 0);
    let quote = CursorPointer::new(line_id(&document, 3), 0);
    let code = CursorPointer::new(line_id(&document, 4), 0);
    let paragraph = CursorPointer::new(line_id(&document, 5), 0);

    assert!(is_at_structural_boundary(&document, &item, BoundaryKind::ListItem));
    assert!(!is_at_structural_boundary(&document, &item, BoundaryKind::Blockquote));
    assert!(is_at_structural_boundary(&document, &quote, BoundaryKind::Blockquote));
    assert!(is_at_structural_boundary(&document, &code, BoundaryKind::CodeBlock));
    assert!(!is_at_structural_boundary(&document, &paragraph, BoundaryKind::ListItem));

    let inside = CursorPointer::new(item.node, 1);
    assert!(!is_at_structural_boundary(&document, &inside, BoundaryKind::ListItem));
}

#[test]
fn code_block_lines_count_newlines() {
    let document = markdown::decode("```\nab\ncd\n```");
    let id = line_id(&document, 0);
    assert_eq!(line_len(&document, id), Some(5));
    assert_eq!(line_text(&document, id).as_deref(), Some("ab\ncd"));
    assert_eq!(document_start(&document), Some(CursorPointer::start_of(id)));
}

#[test]
fn compare_orders_by_line_then_offset() {
    let document = sample();
    let a = CursorPointer::new(line_id(&document, 1), 3);
    let b = CursorPointer::new(line_id(&document, 2), 0);
    assert_eq!(compare(&document, &a, &b), Some(Ordering::Less));
    assert_eq!(compare(&document, &b, &a), Some(Ordering::Greater));
    assert_eq!(compare(&document, &a, &a), Some(Ordering::Equal));
}
