use std::ops::Range;

use crate::document::LineRange;

/// Maps byte offsets in a source text to 1-based line numbers.
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    text: &'a str,
    /// Byte offset at which each line starts.
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { text, starts }
    }

    /// 1-based line containing `offset`.
    pub fn line_of(&self, offset: usize) -> u32 {
        self.starts.partition_point(|&s| s <= offset) as u32
    }

    /// Lines covered by a byte range, ignoring trailing whitespace so that
    /// blank lines swallowed by a container do not stretch its end.
    ///
    /// Returns `None` for ranges with no visible content.
    pub fn lines_of(&self, range: Range<usize>) -> Option<LineRange> {
        let end = range.end.min(self.text.len());
        let trimmed = self.text.get(range.start..end)?.trim_end();
        if trimmed.is_empty() {
            return None;
        }
        let last = range.start + trimmed.len() - 1;
        Some(LineRange::new(self.line_of(range.start), self.line_of(last)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_map_to_one_based_lines() {
        let idx = LineIndex::new("ab\ncd\n\nef");
        assert_eq!(idx.line_of(0), 1);
        assert_eq!(idx.line_of(2), 1); // the newline belongs to its line
        assert_eq!(idx.line_of(3), 2);
        assert_eq!(idx.line_of(6), 3);
        assert_eq!(idx.line_of(7), 4);
    }

    #[test]
    fn trailing_blank_lines_do_not_extend_range() {
        let text = "- a\n- b\n\n\nnext";
        let idx = LineIndex::new(text);
        assert_eq!(idx.lines_of(0..10), Some(LineRange::new(1, 2)));
    }

    #[test]
    fn whitespace_only_range_has_no_lines() {
        let idx = LineIndex::new("a\n\n\nb");
        assert_eq!(idx.lines_of(1..4), None);
        assert_eq!(idx.lines_of(2..2), None);
    }
}
