//! Tab / Shift+Tab over list items.
//!
//! Both directions work on runs: maximal groups of selected items that are
//! consecutive siblings of one list. An item whose ancestor item is selected
//! travels with that ancestor and never forms a run of its own. Runs are
//! recorded as node ids and re-resolved before each step, since earlier
//! steps move items around.

use std::collections::HashSet;

use tracing::debug;

use super::structure::{item_into_blocks, matching_run_len, split_list};
use crate::cursor::{Selection, collect_lines, line_index};
use crate::document::{
    Block, Document, List, ListItem, ListKind, NodeId, NodePath, PathStep,
    path::{item_mut, item_ref, list_mut, list_ref, path_of},
};

/// Runs covered by the selection, in document order.
pub(crate) fn selected_runs(document: &Document, selection: &Selection) -> Vec<Vec<NodeId>> {
    let lines = collect_lines(document);
    let (start, end) = selection.ordered(document);
    let (Some(first), Some(last)) = (line_index(&lines, start.node), line_index(&lines, end.node))
    else {
        return Vec::new();
    };

    let selected: Vec<&NodePath> = lines[first..=last]
        .iter()
        .filter(|line| line.path.points_to_item())
        .map(|line| &line.path)
        .collect();
    let ids: HashSet<NodeId> = lines[first..=last].iter().map(|line| line.id).collect();

    let mut runs: Vec<Vec<NodeId>> = Vec::new();
    let mut previous: Option<(NodePath, usize)> = None;
    for path in selected {
        if has_selected_ancestor(document, path, &ids) {
            continue;
        }
        let (Some(list_path), Some(idx), Some(item)) =
            (path.parent(), path.last_index(), item_ref(document, path))
        else {
            continue;
        };
        let continues = matches!(
            &previous,
            Some((prev_list, prev_idx)) if *prev_list == list_path && prev_idx + 1 == idx
        );
        match runs.last_mut() {
            Some(run) if continues => run.push(item.id),
            _ => runs.push(vec![item.id]),
        }
        previous = Some((list_path, idx));
    }
    runs
}

fn has_selected_ancestor(document: &Document, path: &NodePath, ids: &HashSet<NodeId>) -> bool {
    let steps = path.steps();
    (1..steps.len()).any(|len| {
        matches!(steps[len - 1], PathStep::Item(_))
            && item_ref(document, &NodePath::from_steps(steps[..len].to_vec()))
                .is_some_and(|item| ids.contains(&item.id))
    })
}

/// Position of a run's first item: its list and index.
fn locate_run(document: &Document, run: &[NodeId]) -> Option<(NodePath, usize, usize)> {
    let path = path_of(document, *run.first()?)?;
    let list_path = path.parent()?;
    let start = path.last_index()?;
    let len = matching_run_len(&list_ref(document, &list_path)?.items, start, run);
    (len > 0).then_some((list_path, start, len))
}

pub(crate) fn can_indent(document: &Document, selection: &Selection) -> bool {
    selected_runs(document, selection)
        .iter()
        .any(|run| locate_run(document, run).is_some_and(|(_, start, _)| start > 0))
}

pub(crate) fn can_outdent(document: &Document, selection: &Selection) -> bool {
    !selected_runs(document, selection).is_empty()
}

pub(crate) fn indent(document: &mut Document, selection: &Selection) -> bool {
    let mut changed = false;
    for run in selected_runs(document, selection) {
        changed |= indent_run(document, &run);
    }
    changed
}

pub(crate) fn outdent(document: &mut Document, selection: &Selection) -> bool {
    let mut changed = false;
    for run in selected_runs(document, selection) {
        changed |= outdent_run(document, &run);
    }
    changed
}

/// Moves the run under the preceding sibling, at the end of that sibling's
/// nested content: into its trailing list when the kinds match, otherwise
/// into a new list of the run's kind.
fn indent_run(document: &mut Document, run: &[NodeId]) -> bool {
    let Some((list_path, start, len)) = locate_run(document, run) else {
        return false;
    };
    if start == 0 {
        debug!(item = %run[0], "first item of a list cannot be indented");
        return false;
    }
    let Some(list) = list_mut(document, &list_path) else {
        return false;
    };
    let kind = list.kind;
    let moved: Vec<ListItem> = list.items.drain(start..start + len).collect();
    let host = &mut list.items[start - 1];
    debug!(host = %host.id, items = moved.len(), kind = kind.label(), "indenting run");

    let extends = matches!(host.children.last(), Some(Block::List(nested)) if nested.kind == kind);
    if extends {
        if let Some(Block::List(nested)) = host.children.last_mut() {
            nested.items.extend(moved);
        }
    } else {
        host.children.push(Block::List(List::new(kind, moved)));
    }
    true
}

fn outdent_run(document: &mut Document, run: &[NodeId]) -> bool {
    let Some((list_path, start, len)) = locate_run(document, run) else {
        return false;
    };
    let Some(parent_path) = list_path.container() else {
        return false;
    };
    if parent_path.is_empty() {
        debug!(items = len, "outdenting top-level run into paragraphs");
        return split_list(document, &list_path, start..start + len, |_, items| {
            items.into_iter().flat_map(item_into_blocks).collect()
        });
    }
    outdent_nested(document, &list_path, &parent_path, start, len).is_some()
}

/// Moves the run out of a nested list to just after the parent item. Items
/// that followed the run, and the blocks that followed the nested list inside
/// the parent, become children of the last moved item so that nothing jumps
/// ahead of the run.
fn outdent_nested(
    document: &mut Document,
    list_path: &NodePath,
    parent_path: &NodePath,
    start: usize,
    len: usize,
) -> Option<()> {
    let parent_list_path = parent_path.parent()?;
    let parent_idx = parent_path.last_index()?;
    let list_idx = list_path.last_index()?;
    let parent_kind = list_ref(document, &parent_list_path)?.kind;
    debug!(
        items = len,
        into = parent_kind.label(),
        "outdenting nested run"
    );

    let list = list_mut(document, list_path)?;
    let kind = list.kind;
    let followers = list.items.split_off(start + len);
    let mut moved = list.items.split_off(start);
    let trailing = item_mut(document, parent_path)?.children.split_off(list_idx + 1);

    if parent_kind != ListKind::Task {
        for item in &mut moved {
            item.checked = false;
        }
    }
    if let Some(last) = moved.last_mut() {
        if !followers.is_empty() {
            last.children.push(Block::List(List::new(kind, followers)));
        }
        last.children.extend(trailing);
    }
    let at = parent_idx + 1;
    list_mut(document, &parent_list_path)?
        .items
        .splice(at..at, moved);
    Some(())
}

#[cfg(test)]
#[path = "indent_tests.rs"]
mod indent_tests;
