use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::document::{Block, BlockKind, LineRange};

/// Suffix given to the earlier holder of a contested id.
pub const COLLISION_SUFFIX: &str = "-p";

static NON_SLUG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^a-z0-9]+").expect("static slug pattern is valid")
});

/// Turn heading text into an anchor slug: lowercase ASCII alphanumerics with
/// every other run collapsed to a single `-`.
pub fn slug(text: &str) -> String {
    let lower = text.to_lowercase();
    NON_SLUG
        .replace_all(&lower, "-")
        .trim_matches('-')
        .to_string()
}

/// A block as collected from the parser, before its id is settled.
#[derive(Debug, Clone)]
pub struct Draft {
    pub lines: Option<LineRange>,
    pub kind: BlockKind,
    /// Explicit `{#id}` attribute on a heading.
    pub explicit_id: Option<String>,
    /// Plain text of a heading.
    pub text: String,
}

impl Draft {
    pub fn new(lines: Option<LineRange>, kind: BlockKind) -> Self {
        Self {
            lines,
            kind,
            explicit_id: None,
            text: String::new(),
        }
    }

    /// The id this block would get if nothing else claimed it.
    pub fn natural_id(&self, ordinal: usize) -> String {
        if let BlockKind::Heading { .. } = self.kind {
            if let Some(id) = self.explicit_id.as_deref().filter(|id| !id.is_empty()) {
                return id.to_string();
            }
            let slug = slug(&self.text);
            if !slug.is_empty() {
                return slug;
            }
        }
        match self.lines {
            Some(lines) => format!("line-{}", lines.start),
            None => format!("{}-n{ordinal}", self.kind.name()),
        }
    }
}

/// Hands out ids for one annotation pass.
///
/// When an id is already held, the earlier holder moves to `id-p` and the new
/// block takes the bare id. If `id-p` is itself held, its holder moves on by the
/// same rule, so ids stay unique and the latest claimant keeps the bare name.
#[derive(Debug, Default)]
pub struct IdAssigner {
    owners: HashMap<String, usize>,
}

impl IdAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give `blocks[index]` the id `id`, displacing earlier holders.
    pub fn claim(&mut self, blocks: &mut [Block], index: usize, id: String) {
        let mut index = index;
        let mut id = id;
        while let Some(previous) = self.owners.insert(id.clone(), index) {
            blocks[index].id = id.clone();
            index = previous;
            id.push_str(COLLISION_SUFFIX);
        }
        blocks[index].id = id;
    }
}

/// Settle ids for drafts in production order.
pub fn assign_ids(drafts: Vec<Draft>) -> Vec<Block> {
    let naturals: Vec<String> = drafts
        .iter()
        .enumerate()
        .map(|(ordinal, d)| d.natural_id(ordinal))
        .collect();

    let mut blocks: Vec<Block> = drafts
        .into_iter()
        .map(|d| Block {
            lines: d.lines,
            id: String::new(),
            kind: d.kind,
        })
        .collect();

    let mut assigner = IdAssigner::new();
    for (index, natural) in naturals.into_iter().enumerate() {
        assigner.claim(&mut blocks, index, natural);
    }
    blocks
}
