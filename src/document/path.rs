use super::{Block, Document, List, ListItem, NodeId};

/// Address of a node: alternating block indices (within the document or an
/// item's children) and item indices (within a list).
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct NodePath {
    steps: Vec<PathStep>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathStep {
    Block(usize),
    Item(usize),
}

impl NodePath {
    pub fn root_block(idx: usize) -> Self {
        Self {
            steps: vec![PathStep::Block(idx)],
        }
    }

    pub fn from_steps(steps: Vec<PathStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn push_block(&mut self, idx: usize) {
        self.steps.push(PathStep::Block(idx));
    }

    pub fn push_item(&mut self, idx: usize) {
        self.steps.push(PathStep::Item(idx));
    }

    pub fn child_block(&self, idx: usize) -> Self {
        let mut path = self.clone();
        path.push_block(idx);
        path
    }

    pub fn child_item(&self, idx: usize) -> Self {
        let mut path = self.clone();
        path.push_item(idx);
        path
    }

    pub fn parent(&self) -> Option<NodePath> {
        let (_, prefix) = self.steps.split_last()?;
        Some(Self::from_steps(prefix.to_vec()))
    }

    pub fn last(&self) -> Option<PathStep> {
        self.steps.last().copied()
    }

    pub fn last_index(&self) -> Option<usize> {
        match self.last()? {
            PathStep::Block(idx) | PathStep::Item(idx) => Some(idx),
        }
    }

    pub fn points_to_item(&self) -> bool {
        matches!(self.last(), Some(PathStep::Item(_)))
    }

    /// Path of the container holding the addressed block: empty for the
    /// document root, otherwise the owning item.
    pub fn container(&self) -> Option<NodePath> {
        match self.last()? {
            PathStep::Block(_) => self.parent(),
            PathStep::Item(_) => None,
        }
    }

    /// Number of lists enclosing the addressed node.
    pub fn list_depth(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step, PathStep::Item(_)))
            .count()
    }

    pub fn with_last_index(&self, idx: usize) -> Self {
        let mut path = self.clone();
        match path.steps.last_mut() {
            Some(PathStep::Block(value)) | Some(PathStep::Item(value)) => *value = idx,
            None => {}
        }
        path
    }
}

pub fn container_ref<'a>(document: &'a Document, path: &NodePath) -> Option<&'a Vec<Block>> {
    if path.is_empty() {
        return Some(&document.blocks);
    }
    item_ref(document, path).map(|item| &item.children)
}

pub fn container_mut<'a>(document: &'a mut Document, path: &NodePath) -> Option<&'a mut Vec<Block>> {
    if path.is_empty() {
        return Some(&mut document.blocks);
    }
    item_mut(document, path).map(|item| &mut item.children)
}

pub fn block_ref<'a>(document: &'a Document, path: &NodePath) -> Option<&'a Block> {
    let mut blocks = &document.blocks;
    let mut current: Option<&'a Block> = None;
    for step in path.steps() {
        match *step {
            PathStep::Block(idx) => {
                current = Some(blocks.get(idx)?);
            }
            PathStep::Item(idx) => {
                let item = current?.as_list()?.items.get(idx)?;
                blocks = &item.children;
                current = None;
            }
        }
    }
    current
}

pub fn block_mut<'a>(document: &'a mut Document, path: &NodePath) -> Option<&'a mut Block> {
    let (last, prefix) = path.steps().split_last()?;
    let PathStep::Block(idx) = *last else {
        return None;
    };
    let container = container_mut(document, &NodePath::from_steps(prefix.to_vec()))?;
    container.get_mut(idx)
}

pub fn item_ref<'a>(document: &'a Document, path: &NodePath) -> Option<&'a ListItem> {
    let (last, prefix) = path.steps().split_last()?;
    let PathStep::Item(idx) = *last else {
        return None;
    };
    let list = block_ref(document, &NodePath::from_steps(prefix.to_vec()))?.as_list()?;
    list.items.get(idx)
}

pub fn item_mut<'a>(document: &'a mut Document, path: &NodePath) -> Option<&'a mut ListItem> {
    let (last, prefix) = path.steps().split_last()?;
    let PathStep::Item(idx) = *last else {
        return None;
    };
    let list = block_mut(document, &NodePath::from_steps(prefix.to_vec()))?.as_list_mut()?;
    list.items.get_mut(idx)
}

pub fn list_ref<'a>(document: &'a Document, path: &NodePath) -> Option<&'a List> {
    block_ref(document, path)?.as_list()
}

pub fn list_mut<'a>(document: &'a mut Document, path: &NodePath) -> Option<&'a mut List> {
    block_mut(document, path)?.as_list_mut()
}

/// Depth-first search for the node carrying `id`.
pub fn path_of(document: &Document, id: NodeId) -> Option<NodePath> {
    let mut path = NodePath::default();
    find_in_blocks(&document.blocks, id, &mut path).then_some(path)
}

fn find_in_blocks(blocks: &[Block], id: NodeId, path: &mut NodePath) -> bool {
    for (idx, block) in blocks.iter().enumerate() {
        path.push_block(idx);
        if block.id() == id {
            return true;
        }
        if let Block::List(list) = block {
            for (item_idx, item) in list.items.iter().enumerate() {
                path.push_item(item_idx);
                if item.id == id || find_in_blocks(&item.children, id, path) {
                    return true;
                }
                path.steps.pop();
            }
        }
        path.steps.pop();
    }
    false
}
