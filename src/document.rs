use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

pub mod inline;
mod normalize;
pub mod path;

pub use inline::Inline;
pub use normalize::{StructureViolation, normalize, validate};
pub use path::{NodePath, PathStep};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a structural node.
///
/// Identities survive re-parenting, so multi-step edits re-resolve positions
/// from them instead of caching indices across mutations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub fn fresh() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ListKind {
    Bullet,
    Ordered,
    Task,
}

impl ListKind {
    pub fn label(self) -> &'static str {
        match self {
            ListKind::Bullet => "bullet list",
            ListKind::Ordered => "ordered list",
            ListKind::Task => "task list",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Paragraph {
    pub id: NodeId,
    pub content: Vec<Inline>,
}

impl Paragraph {
    pub fn new(content: Vec<Inline>) -> Self {
        Self {
            id: NodeId::fresh(),
            content,
        }
    }

    pub fn empty() -> Self {
        Self::new(vec![Inline::Placeholder])
    }

    pub fn text(text: &str) -> Self {
        Self::new(vec![Inline::text(text)])
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Heading {
    pub id: NodeId,
    pub level: u8,
    pub content: Vec<Inline>,
}

impl Heading {
    pub fn new(level: u8, content: Vec<Inline>) -> Self {
        Self {
            id: NodeId::fresh(),
            level: level.clamp(1, 6),
            content,
        }
    }
}

/// A quotation whose lines are kept as one inline run separated by line breaks.
#[derive(Clone, Debug, PartialEq)]
pub struct Blockquote {
    pub id: NodeId,
    pub content: Vec<Inline>,
}

impl Blockquote {
    pub fn new(content: Vec<Inline>) -> Self {
        Self {
            id: NodeId::fresh(),
            content,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CodeBlock {
    pub id: NodeId,
    pub language: String,
    pub lines: Vec<String>,
}

impl CodeBlock {
    pub fn new(language: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            id: NodeId::fresh(),
            language: language.into(),
            lines,
        }
    }

    /// The editable text of the block; lines are joined by `\n`.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn set_text(&mut self, text: &str) {
        self.lines = text.split('\n').map(str::to_string).collect();
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct List {
    pub id: NodeId,
    pub kind: ListKind,
    pub items: Vec<ListItem>,
}

impl List {
    pub fn new(kind: ListKind, items: Vec<ListItem>) -> Self {
        Self {
            id: NodeId::fresh(),
            kind,
            items,
        }
    }
}

/// One entry of a list: its own inline run followed by nested blocks.
///
/// `children` holds nested lists and the paragraphs an item accumulates
/// (for example the paragraph left behind when a nested list is split).
#[derive(Clone, Debug, PartialEq)]
pub struct ListItem {
    pub id: NodeId,
    pub checked: bool,
    pub content: Vec<Inline>,
    pub children: Vec<Block>,
}

impl ListItem {
    pub fn new(content: Vec<Inline>) -> Self {
        Self {
            id: NodeId::fresh(),
            checked: false,
            content,
            children: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new(vec![Inline::Placeholder])
    }

    pub fn text(text: &str) -> Self {
        Self::new(vec![Inline::text(text)])
    }

    pub fn with_children(mut self, children: Vec<Block>) -> Self {
        self.children = children;
        self
    }

    pub fn with_checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    pub fn has_text(&self) -> bool {
        !inline::is_blank(&self.content)
    }

    pub fn nested_lists(&self) -> impl Iterator<Item = &List> {
        self.children.iter().filter_map(Block::as_list)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    Paragraph(Paragraph),
    Heading(Heading),
    Blockquote(Blockquote),
    CodeBlock(CodeBlock),
    List(List),
    Rule(NodeId),
}

impl Block {
    pub fn rule() -> Self {
        Block::Rule(NodeId::fresh())
    }

    pub fn id(&self) -> NodeId {
        match self {
            Block::Paragraph(p) => p.id,
            Block::Heading(h) => h.id,
            Block::Blockquote(q) => q.id,
            Block::CodeBlock(c) => c.id,
            Block::List(l) => l.id,
            Block::Rule(id) => *id,
        }
    }

    /// Inline run of text-bearing blocks. Code blocks and lists have none.
    pub fn content(&self) -> Option<&[Inline]> {
        match self {
            Block::Paragraph(p) => Some(&p.content),
            Block::Heading(h) => Some(&h.content),
            Block::Blockquote(q) => Some(&q.content),
            _ => None,
        }
    }

    pub fn content_mut(&mut self) -> Option<&mut Vec<Inline>> {
        match self {
            Block::Paragraph(p) => Some(&mut p.content),
            Block::Heading(h) => Some(&mut h.content),
            Block::Blockquote(q) => Some(&mut q.content),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Block::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut List> {
        match self {
            Block::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Block::List(_))
    }

    pub fn list_kind(&self) -> Option<ListKind> {
        self.as_list().map(|list| list.kind)
    }

    pub fn is_paragraph(&self) -> bool {
        matches!(self, Block::Paragraph(_))
    }

    /// True for a paragraph whose content is blank.
    pub fn is_empty_paragraph(&self) -> bool {
        match self {
            Block::Paragraph(p) => inline::is_blank(&p.content),
            _ => false,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Block::Paragraph(_) => "paragraph",
            Block::Heading(_) => "heading",
            Block::Blockquote(_) => "blockquote",
            Block::CodeBlock(_) => "code block",
            Block::List(list) => list.kind.label(),
            Block::Rule(_) => "horizontal rule",
        }
    }
}

impl From<Paragraph> for Block {
    fn from(value: Paragraph) -> Self {
        Block::Paragraph(value)
    }
}

impl From<List> for Block {
    fn from(value: List) -> Self {
        Block::List(value)
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct Document {
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blocks(mut self, blocks: Vec<Block>) -> Self {
        self.blocks = blocks;
        self
    }

    /// Equality of kinds, text and nesting, ignoring node identities.
    pub fn same_structure(&self, other: &Document) -> bool {
        blocks_match(&self.blocks, &other.blocks)
    }

    /// Leaf text of every line in visual order, each prefixed by its list depth.
    ///
    /// Indent and outdent must leave the text sequence unchanged.
    pub fn outline(&self) -> Vec<(usize, String)> {
        let mut result = Vec::new();
        collect_outline(&self.blocks, 0, &mut result);
        result
    }
}

fn blocks_match(a: &[Block], b: &[Block]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(a, b)| block_matches(a, b))
}

fn block_matches(a: &Block, b: &Block) -> bool {
    match (a, b) {
        (Block::Paragraph(a), Block::Paragraph(b)) => a.content == b.content,
        (Block::Heading(a), Block::Heading(b)) => a.level == b.level && a.content == b.content,
        (Block::Blockquote(a), Block::Blockquote(b)) => a.content == b.content,
        (Block::CodeBlock(a), Block::CodeBlock(b)) => {
            a.language == b.language && a.lines == b.lines
        }
        (Block::List(a), Block::List(b)) => {
            a.kind == b.kind
                && a.items.len() == b.items.len()
                && a.items.iter().zip(&b.items).all(|(a, b)| {
                    a.checked == b.checked
                        && a.content == b.content
                        && blocks_match(&a.children, &b.children)
                })
        }
        (Block::Rule(_), Block::Rule(_)) => true,
        _ => false,
    }
}

fn collect_outline(blocks: &[Block], depth: usize, out: &mut Vec<(usize, String)>) {
    for block in blocks {
        match block {
            Block::List(list) => {
                for item in &list.items {
                    out.push((depth + 1, inline::plain_text(&item.content)));
                    collect_outline(&item.children, depth + 1, out);
                }
            }
            Block::CodeBlock(code) => out.push((depth, code.text())),
            Block::Rule(_) => {}
            other => {
                if let Some(content) = other.content() {
                    out.push((depth, inline::plain_text(content)));
                }
            }
        }
    }
}
