//! # Rendered Document Model
//!
//! A [`RenderedDocument`] is the immutable output of one annotation pass: every
//! renderable block in document order, each tagged with the source lines that
//! produced it and an identifier that is unique within that pass.
//!
//! Documents are never patched. Every source edit produces a fresh document and
//! the identifiers of the previous one must be treated as invalid.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Inclusive, 1-based range of source lines a block was produced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn contains(self, line: u32) -> bool {
        self.start <= line && line <= self.end
    }
}

/// Kinds of renderable blocks that are traced back to the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockKind {
    Paragraph,
    Heading { level: u8 },
    Blockquote,
    ListItem,
    CodeBlock,
    Table,
    Rule,
}

impl BlockKind {
    /// Short lowercase name, also used to build ids for blocks without line info.
    pub fn name(self) -> &'static str {
        match self {
            BlockKind::Paragraph => "paragraph",
            BlockKind::Heading { .. } => "heading",
            BlockKind::Blockquote => "blockquote",
            BlockKind::ListItem => "listItem",
            BlockKind::CodeBlock => "codeBlock",
            BlockKind::Table => "table",
            BlockKind::Rule => "rule",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockKind::Heading { level } => write!(f, "heading{level}"),
            other => f.write_str(other.name()),
        }
    }
}

/// A renderable unit traceable to a contiguous range of source lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Source lines; `None` when the producer could not tell. Such blocks are
    /// rendered but unreachable by line lookup.
    pub lines: Option<LineRange>,
    /// Identifier unique within one annotation pass.
    pub id: String,
    pub kind: BlockKind,
}

impl Block {
    pub fn start_line(&self) -> Option<u32> {
        self.lines.map(|l| l.start)
    }
}

/// Ordered blocks of one annotation pass plus the lookup indexes over them.
#[derive(Debug, Clone, Default)]
pub struct RenderedDocument {
    blocks: Vec<Block>,
    /// Indices of blocks with line info, stable-sorted by start line.
    by_line: Vec<usize>,
    by_id: HashMap<String, usize>,
}

impl RenderedDocument {
    /// Build a document from blocks whose ids are already unique.
    ///
    /// Should an id repeat anyway, id lookup resolves to the later block.
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        let mut by_line: Vec<usize> = blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| b.lines.is_some())
            .map(|(i, _)| i)
            .collect();
        by_line.sort_by_key(|&i| blocks[i].start_line());

        let by_id = blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (b.id.clone(), i))
            .collect();

        Self {
            blocks,
            by_line,
            by_id,
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Look up a block by its id in this pass.
    pub fn block(&self, id: &str) -> Option<&Block> {
        self.by_id.get(id).map(|&i| &self.blocks[i])
    }

    /// Resolve a source line to the block that should represent it.
    ///
    /// An exact start-line match wins; otherwise the block with the greatest
    /// start line before `line` is chosen, never a following one. Blocks sharing
    /// a start line resolve to the first in document order. Lines before the
    /// first positioned block fall back to that block.
    ///
    /// Returns `None` only when no block carries line information.
    pub fn locate_block(&self, line: u32) -> Option<&Block> {
        let first = *self.by_line.first()?;
        let preceding = self
            .by_line
            .partition_point(|&i| self.start_of(i) <= line);

        if preceding == 0 {
            log::debug!(
                "line {line} precedes every block, falling back to '{}'",
                self.blocks[first].id
            );
            return Some(&self.blocks[first]);
        }

        let start = self.start_of(self.by_line[preceding - 1]);
        let first_with_start = self.by_line.partition_point(|&i| self.start_of(i) < start);
        Some(&self.blocks[self.by_line[first_with_start]])
    }

    fn start_of(&self, index: usize) -> u32 {
        self.blocks[index].start_line().unwrap_or(0)
    }
}
