//! # Visibility Observation
//!
//! The render side learns what the reader is looking at through a
//! [`VisibilityObserver`]. Any mechanism can back it: a native viewport
//! intersection API, or manual polling over known block geometry as done by
//! [`LayoutObserver`].
//!
//! Every rebind hands the observer a new [`Revision`]; reports stamped with an
//! older revision describe blocks of a previous render and are dropped.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Counter distinguishing successive bindings to rendered documents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Revision(pub u64);

impl Revision {
    pub fn next(self) -> Self {
        Revision(self.0 + 1)
    }
}

/// Visibility of one observed block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityEntry {
    pub block_id: String,
    /// Visible fraction of the block, `0.0..=1.0`.
    pub intersection_ratio: f32,
    /// Block top relative to the viewport top; negative when above it.
    pub bounding_top: f32,
}

/// A batch of visibility changes from one observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityReport {
    pub revision: Revision,
    /// Height of the viewport, in the same unit as `bounding_top`.
    pub viewport_height: f32,
    pub entries: Vec<VisibilityEntry>,
}

/// Capability the render surface provides for watching block visibility.
pub trait VisibilityObserver {
    /// Forget all observed blocks; later reports carry `revision`.
    fn reset(&mut self, revision: Revision);

    /// Start watching `block_id`.
    fn observe(&mut self, block_id: &str);

    /// Changes since the last call, if any.
    fn poll_visibility(&mut self) -> Option<VisibilityReport>;
}

/// Vertical placement of a block in the rendered layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub top: f32,
    pub height: f32,
}

impl Extent {
    pub fn bottom(self) -> f32 {
        self.top + self.height
    }
}

/// Polling observer computed from laid-out block extents and a scroll offset.
#[derive(Debug, Default)]
pub struct LayoutObserver {
    revision: Revision,
    observed: Vec<String>,
    extents: HashMap<String, Extent>,
    content_height: f32,
    scroll_top: f32,
    viewport_height: f32,
    dirty: bool,
}

impl LayoutObserver {
    pub fn new(viewport_height: f32) -> Self {
        Self {
            viewport_height,
            ..Self::default()
        }
    }

    /// Replace the layout of the current render.
    pub fn set_extents<I>(&mut self, extents: I)
    where
        I: IntoIterator<Item = (String, Extent)>,
    {
        self.extents = extents.into_iter().collect();
        self.content_height = self
            .extents
            .values()
            .map(|e| e.bottom())
            .fold(0.0, f32::max);
        self.scroll_to(self.scroll_top);
        self.dirty = true;
    }

    pub fn extent(&self, block_id: &str) -> Option<Extent> {
        self.extents.get(block_id).copied()
    }

    pub fn set_viewport_height(&mut self, height: f32) {
        if height != self.viewport_height {
            self.viewport_height = height;
            self.scroll_to(self.scroll_top);
            self.dirty = true;
        }
    }

    pub fn viewport_height(&self) -> f32 {
        self.viewport_height
    }

    pub fn scroll_top(&self) -> f32 {
        self.scroll_top
    }

    /// Scroll so the viewport starts at `top`, clamped to the content.
    pub fn scroll_to(&mut self, top: f32) {
        let max = (self.content_height - self.viewport_height).max(0.0);
        let top = top.clamp(0.0, max);
        if top != self.scroll_top {
            self.scroll_top = top;
            self.dirty = true;
        }
    }

    pub fn scroll_by(&mut self, delta: f32) {
        self.scroll_to(self.scroll_top + delta);
    }

    fn entry(&self, block_id: &str, extent: Extent) -> VisibilityEntry {
        let view_bottom = self.scroll_top + self.viewport_height;
        let visible = (extent.bottom().min(view_bottom) - extent.top.max(self.scroll_top)).max(0.0);
        let intersection_ratio = if extent.height > 0.0 {
            visible / extent.height
        } else if extent.top >= self.scroll_top && extent.top < view_bottom {
            1.0
        } else {
            0.0
        };
        VisibilityEntry {
            block_id: block_id.to_string(),
            intersection_ratio,
            bounding_top: extent.top - self.scroll_top,
        }
    }
}

impl VisibilityObserver for LayoutObserver {
    fn reset(&mut self, revision: Revision) {
        self.revision = revision;
        self.observed.clear();
        self.extents.clear();
        self.content_height = 0.0;
        self.dirty = false;
    }

    fn observe(&mut self, block_id: &str) {
        self.observed.push(block_id.to_string());
    }

    fn poll_visibility(&mut self) -> Option<VisibilityReport> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        let entries = self
            .observed
            .iter()
            .filter_map(|id| Some(self.entry(id, self.extent(id)?)))
            .collect();
        Some(VisibilityReport {
            revision: self.revision,
            viewport_height: self.viewport_height,
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observer() -> LayoutObserver {
        let mut o = LayoutObserver::new(10.0);
        o.reset(Revision(1));
        for id in ["a", "b", "c"] {
            o.observe(id);
        }
        o.set_extents([
            ("a".to_string(), Extent { top: 0.0, height: 4.0 }),
            ("b".to_string(), Extent { top: 5.0, height: 10.0 }),
            ("c".to_string(), Extent { top: 16.0, height: 4.0 }),
        ]);
        o
    }

    fn ratio(report: &VisibilityReport, id: &str) -> f32 {
        report
            .entries
            .iter()
            .find(|e| e.block_id == id)
            .map(|e| e.intersection_ratio)
            .unwrap()
    }

    #[test]
    fn reports_only_after_changes() {
        let mut o = observer();
        assert!(o.poll_visibility().is_some());
        assert!(o.poll_visibility().is_none());
        o.scroll_by(2.0);
        assert!(o.poll_visibility().is_some());
    }

    #[test]
    fn ratios_follow_scroll_position() {
        let mut o = observer();
        let report = o.poll_visibility().unwrap();
        assert_eq!(report.revision, Revision(1));
        assert_eq!(ratio(&report, "a"), 1.0);
        assert_eq!(ratio(&report, "b"), 0.5);
        assert_eq!(ratio(&report, "c"), 0.0);

        o.scroll_to(8.0);
        let report = o.poll_visibility().unwrap();
        assert_eq!(ratio(&report, "a"), 0.0);
        assert_eq!(ratio(&report, "c"), 0.5);
        let b = report.entries.iter().find(|e| e.block_id == "b").unwrap();
        assert_eq!(b.bounding_top, -3.0);
    }

    #[test]
    fn scroll_is_clamped_to_content() {
        let mut o = observer();
        o.scroll_to(100.0);
        assert_eq!(o.scroll_top(), 10.0);
        o.scroll_by(-50.0);
        assert_eq!(o.scroll_top(), 0.0);
    }

    #[test]
    fn reset_forgets_blocks() {
        let mut o = observer();
        o.reset(Revision(2));
        assert!(o.poll_visibility().is_none());
        assert!(o.extent("a").is_none());
    }
}
