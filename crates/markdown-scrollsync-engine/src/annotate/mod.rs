//! # Block Annotation
//!
//! Maps every block-level markdown node back to the source lines that produced
//! it and gives it an id that is unique within the pass.
//!
//! ## Phases
//!
//! 1. **Collection**: walk pulldown-cmark's offset iterator and record a `Draft`
//!    for each block as its `Start` event arrives, so containers precede their
//!    children and document order is production order.
//! 2. **Id assignment** (`ids`): derive a natural id per draft and settle
//!    collisions. The earlier holder of a contested id is renamed `id-p`; the
//!    later block keeps the bare id.
//!
//! The collision map lives only for the duration of one [`annotate`] call.

pub mod ids;
pub mod lines;

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

use crate::document::{BlockKind, RenderedDocument};
use ids::{Draft, assign_ids};
use lines::LineIndex;

fn parser_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_HEADING_ATTRIBUTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
}

/// The annotated kind for a start tag, if it is a tracked block.
fn block_kind(tag: &Tag) -> Option<BlockKind> {
    match tag {
        Tag::Paragraph => Some(BlockKind::Paragraph),
        Tag::Heading { level, .. } => Some(BlockKind::Heading {
            level: *level as u8,
        }),
        Tag::BlockQuote(_) => Some(BlockKind::Blockquote),
        Tag::Item => Some(BlockKind::ListItem),
        Tag::CodeBlock(_) => Some(BlockKind::CodeBlock),
        Tag::Table(_) => Some(BlockKind::Table),
        _ => None,
    }
}

/// Annotate `source` into a fresh [`RenderedDocument`].
pub fn annotate(source: &str) -> RenderedDocument {
    let index = LineIndex::new(source);
    let mut drafts: Vec<Draft> = Vec::new();
    let mut open_heading: Option<usize> = None;

    for (event, range) in Parser::new_ext(source, parser_options()).into_offset_iter() {
        match event {
            Event::Start(tag) => {
                let Some(kind) = block_kind(&tag) else {
                    continue;
                };
                let mut draft = Draft::new(index.lines_of(range), kind);
                if let Tag::Heading { id, .. } = tag {
                    draft.explicit_id = id.map(|id| id.to_string());
                    open_heading = Some(drafts.len());
                }
                drafts.push(draft);
            }
            Event::End(TagEnd::Heading(_)) => open_heading = None,
            Event::Text(text) | Event::Code(text) => {
                if let Some(i) = open_heading {
                    drafts[i].text.push_str(&text);
                }
            }
            Event::Rule => drafts.push(Draft::new(index.lines_of(range), BlockKind::Rule)),
            _ => {}
        }
    }

    RenderedDocument::from_blocks(assign_ids(drafts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::LineRange;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn summary(doc: &RenderedDocument) -> Vec<(Option<LineRange>, String, String)> {
        doc.blocks()
            .iter()
            .map(|b| (b.lines, b.kind.to_string(), b.id.clone()))
            .collect()
    }

    #[test]
    fn empty_document() {
        assert!(annotate("").is_empty());
        assert!(annotate("\n\n\n").is_empty());
    }

    #[test]
    fn identical_headings_suffix_the_earlier_one() {
        let mut md = String::from("# Overview\n");
        md.push_str(&"\n".repeat(8));
        md.push_str("# Overview\n");

        let doc = annotate(&md);
        assert_eq!(
            summary(&doc),
            vec![
                (Some(LineRange::new(1, 1)), "heading1".into(), "overview-p".into()),
                (Some(LineRange::new(10, 10)), "heading1".into(), "overview".into()),
            ]
        );
    }

    #[test]
    fn paragraph_spans_all_its_lines() {
        let doc = annotate("first\nsecond\nthird\n\nnext\n");
        assert_eq!(doc.blocks()[0].lines, Some(LineRange::new(1, 3)));
        assert_eq!(doc.blocks()[1].lines, Some(LineRange::new(5, 5)));
    }

    #[test]
    fn container_sharing_a_line_with_its_child_is_suffixed() {
        let doc = annotate("> quoted\n");
        assert_eq!(
            summary(&doc),
            vec![
                (Some(LineRange::new(1, 1)), "blockquote".into(), "line-1-p".into()),
                (Some(LineRange::new(1, 1)), "paragraph".into(), "line-1".into()),
            ]
        );
    }

    #[test]
    fn heading_text_includes_inline_code() {
        let doc = annotate("## The `run` command\n");
        assert_eq!(doc.blocks()[0].id, "the-run-command");
        assert_eq!(doc.blocks()[0].kind, BlockKind::Heading { level: 2 });
    }

    #[test]
    fn heading_attribute_sets_id() {
        let doc = annotate("# Install {#setup}\n");
        assert_eq!(doc.blocks()[0].id, "setup");
    }

    #[test]
    fn ids_are_unique_across_a_busy_document() {
        let md = "# A\n\n# A\n\n- x\n- y\n\n> # A\n\n```\ncode\n```\n\n---\n\n# A\n";
        let doc = annotate(md);
        let unique: HashSet<&str> = doc.blocks().iter().map(|b| b.id.as_str()).collect();
        assert_eq!(unique.len(), doc.len());
        assert_eq!(doc.blocks().last().unwrap().id, "a");
    }

    #[test]
    fn annotation_is_deterministic() {
        let md = "# Title\n\ntext\n\n# Title\n";
        assert_eq!(summary(&annotate(md)), summary(&annotate(md)));
    }
}
