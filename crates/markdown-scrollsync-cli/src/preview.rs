use std::collections::HashMap;
use std::sync::LazyLock;

use markdown_scrollsync_engine::{Block, BlockKind, Extent, LineRange, RenderedDocument};
use regex::Regex;

static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[-*+]|\d+[.)])\s+").expect("static list marker pattern is valid")
});
static HEADING_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*\{[^}]*\}\s*$").expect("static heading attribute pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Heading(u8),
    Text,
    Quote,
    Code,
    Rule,
    Blank,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub kind: RowKind,
    pub text: String,
}

/// Rendered rows plus the row extent of every positioned block.
#[derive(Debug, Default)]
pub struct Preview {
    pub rows: Vec<Row>,
    pub extents: HashMap<String, Extent>,
}

impl Preview {
    /// Lay `document` out one row per displayed line.
    ///
    /// Leaf blocks produce rows; a container spans the rows of the blocks
    /// nested inside it.
    pub fn layout(text: &str, document: &RenderedDocument) -> Self {
        let source: Vec<&str> = text.lines().collect();
        let positioned: Vec<(&Block, LineRange)> = document
            .blocks()
            .iter()
            .filter_map(|b| Some((b, b.lines?)))
            .collect();

        let mut preview = Preview::default();
        for (i, (block, lines)) in positioned.iter().enumerate() {
            if is_container(*lines, positioned.get(i + 1).map(|(_, next)| *next)) {
                continue;
            }
            let top = preview.rows.len();
            for line in lines.start..=lines.end {
                let raw = source.get(line as usize - 1).copied().unwrap_or_default();
                if let Some(row) = display_row(block.kind, raw) {
                    preview.rows.push(row);
                }
            }
            let height = preview.rows.len() - top;
            preview.extents.insert(
                block.id.clone(),
                Extent {
                    top: top as f32,
                    height: height as f32,
                },
            );
            preview.rows.push(Row {
                kind: RowKind::Blank,
                text: String::new(),
            });
        }

        for (i, (block, lines)) in positioned.iter().enumerate() {
            let spanned = positioned[i + 1..]
                .iter()
                .take_while(|(_, inner)| within(*inner, *lines))
                .filter_map(|(inner, _)| preview.extents.get(&inner.id).copied())
                .reduce(|a, b| {
                    let top = a.top.min(b.top);
                    Extent {
                        top,
                        height: a.bottom().max(b.bottom()) - top,
                    }
                });
            if let Some(extent) = spanned {
                preview.extents.insert(block.id.clone(), extent);
            }
        }
        preview
    }

    pub fn extent(&self, block_id: &str) -> Option<Extent> {
        self.extents.get(block_id).copied()
    }
}

fn within(inner: LineRange, outer: LineRange) -> bool {
    inner.start >= outer.start && inner.end <= outer.end
}

fn is_container(lines: LineRange, next: Option<LineRange>) -> bool {
    next.is_some_and(|next| within(next, lines))
}

fn display_row(kind: BlockKind, raw: &str) -> Option<Row> {
    if kind == BlockKind::CodeBlock {
        let trimmed = raw.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            return None;
        }
        return Some(Row {
            kind: RowKind::Code,
            text: raw.to_string(),
        });
    }

    let mut rest = raw.trim_start();
    let mut quoted = false;
    while let Some(inner) = rest.strip_prefix('>') {
        quoted = true;
        rest = inner.trim_start();
    }

    let row = match kind {
        BlockKind::Heading { level } => {
            // Setext underline
            if !rest.is_empty() && rest.chars().all(|c| c == '=' || c == '-') {
                return None;
            }
            let text = rest.trim_start_matches('#').trim();
            let text = HEADING_ATTRIBUTE.replace(text, "");
            Row {
                kind: RowKind::Heading(level),
                text: text.trim_end_matches('#').trim_end().to_string(),
            }
        }
        BlockKind::Rule => Row {
            kind: RowKind::Rule,
            text: "─".repeat(40),
        },
        _ => {
            let text = match LIST_MARKER.find(rest) {
                Some(marker) => format!("• {}", &rest[marker.end()..]),
                None => rest.to_string(),
            };
            Row {
                kind: if quoted { RowKind::Quote } else { RowKind::Text },
                text,
            }
        }
    };
    Some(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use markdown_scrollsync_engine::annotate;
    use pretty_assertions::assert_eq;

    fn texts(preview: &Preview) -> Vec<&str> {
        preview.rows.iter().map(|r| r.text.as_str()).collect()
    }

    #[test]
    fn headings_drop_markup() {
        let md = "# Intro\n\n### Setup {#install}\n\nTitle\n=====\n";
        let preview = Preview::layout(md, &annotate(md));

        assert_eq!(texts(&preview), vec!["Intro", "", "Setup", "", "Title", ""]);
        assert_eq!(preview.rows[2].kind, RowKind::Heading(3));
        assert_eq!(preview.extent("title"), Some(Extent { top: 4.0, height: 1.0 }));
    }

    #[test]
    fn code_fences_are_hidden() {
        let md = "```rust\nfn main() {}\n```\n";
        let doc = annotate(md);
        let preview = Preview::layout(md, &doc);

        assert_eq!(texts(&preview), vec!["fn main() {}", ""]);
        assert_eq!(preview.extent("line-1"), Some(Extent { top: 0.0, height: 1.0 }));
    }

    #[test]
    fn containers_span_their_children() {
        let md = "> first\n> second\n\n- one\n- two\n";
        let doc = annotate(md);
        let preview = Preview::layout(md, &doc);

        assert_eq!(texts(&preview), vec!["first", "second", "", "• one", "", "• two", ""]);
        assert_eq!(preview.rows[0].kind, RowKind::Quote);
        // The quote and its paragraph both start on line 1.
        let quote = doc.blocks().iter().find(|b| b.kind == BlockKind::Blockquote).unwrap();
        let paragraph = doc.blocks().iter().find(|b| b.kind == BlockKind::Paragraph).unwrap();
        assert_eq!(preview.extent(&quote.id), preview.extent(&paragraph.id));
        assert_eq!(preview.extent(&quote.id), Some(Extent { top: 0.0, height: 2.0 }));
    }

    #[test]
    fn every_positioned_block_gets_an_extent() {
        let md = include_str!("../../markdown-scrollsync-engine/tests/fixtures/mixed_blocks.md");
        let doc = annotate(md);
        let preview = Preview::layout(md, &doc);

        for block in doc.blocks().iter().filter(|b| b.lines.is_some()) {
            assert!(preview.extent(&block.id).is_some(), "no extent for {}", block.id);
        }
    }
}
