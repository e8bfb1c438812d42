use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::document::{Block, RenderedDocument};
use crate::visibility::{Revision, VisibilityObserver, VisibilityReport};

use super::policy::{Admission, Origin, SyncPolicy};
use super::state::SyncState;

/// Tuning for picking the block the reader is looking at.
///
/// Band edges are fractions of the viewport height measured from its top.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusBand {
    /// Minimum intersection ratio for the primary pick.
    pub threshold: f32,
    /// Top edge of the focus band; blocks starting above it are leaving view.
    pub band_start: f32,
    /// Bottom edge of the focus band.
    pub band_end: f32,
    /// Upper portion scanned when no block clears the threshold.
    pub fallback_band_end: f32,
}

impl Default for FocusBand {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            band_start: 0.05,
            band_end: 0.5,
            fallback_band_end: 0.33,
        }
    }
}

impl FocusBand {
    fn in_band(&self, fraction: f32) -> bool {
        fraction >= self.band_start && fraction <= self.band_end
    }

    fn in_fallback(&self, fraction: f32) -> bool {
        fraction >= 0.0 && fraction <= self.fallback_band_end
    }
}

/// Instruction for the source side to move to a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetPosition {
    pub line: u32,
    /// Apply without taking input focus.
    pub silent: bool,
}

/// Where the render surface should scroll for a reveal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealTarget {
    pub block_id: String,
    pub line: Option<u32>,
}

#[derive(Debug, Clone, Copy)]
struct Observation {
    ratio: f32,
    top: f32,
}

/// Turns visibility observations on the render side into silent
/// set-position instructions for the source side.
#[derive(Debug)]
pub struct RenderToSource {
    policy: SyncPolicy,
    band: FocusBand,
    state: SyncState<u32>,
    document: Option<Arc<RenderedDocument>>,
    revision: Revision,
    observed: HashMap<String, Observation>,
    viewport_height: f32,
}

impl RenderToSource {
    pub fn new(policy: SyncPolicy, band: FocusBand) -> Self {
        Self {
            policy,
            band,
            state: SyncState::new(),
            document: None,
            revision: Revision::default(),
            observed: HashMap::new(),
            viewport_height: 0.0,
        }
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub fn document(&self) -> Option<&Arc<RenderedDocument>> {
        self.document.as_ref()
    }

    pub fn last_synced_line(&self) -> Option<u32> {
        self.state.last_synced_line()
    }

    pub fn has_pending(&self) -> bool {
        self.state.pending().is_some()
    }

    pub fn programmatic_scroll_active(&mut self, now: Instant) -> bool {
        self.state.programmatic_scroll_active(now)
    }

    /// Bind to a freshly rendered document and re-register every positioned
    /// block with `observer`. Reports from earlier revisions are dropped from
    /// here on; the last synced line is kept.
    ///
    /// Laying out the new render moves blocks without the reader scrolling, so
    /// the settle window is armed as for a reveal.
    pub fn rebind<O>(
        &mut self,
        document: Arc<RenderedDocument>,
        observer: &mut O,
        now: Instant,
    ) -> Revision
    where
        O: VisibilityObserver + ?Sized,
    {
        self.begin_reveal(now);
        self.revision = self.revision.next();
        self.observed.clear();
        observer.reset(self.revision);
        for block in document.blocks().iter().filter(|b| b.lines.is_some()) {
            observer.observe(&block.id);
        }
        self.document = Some(document);
        self.revision
    }

    /// A reveal arrived from the source side. Resolves `line` against the
    /// current document and starts the settle window before scrolling.
    pub fn on_reveal(&mut self, line: u32, now: Instant) -> Option<RevealTarget> {
        let block = self.document.as_deref()?.locate_block(line)?.clone();
        self.begin_reveal(now);
        if let Some(start) = block.start_line() {
            self.state.record_sync(start, now);
        }
        Some(RevealTarget {
            line: block.start_line(),
            block_id: block.id,
        })
    }

    /// The reader jumped to a block from within the render surface, e.g. by
    /// following an in-document link. The source follows once the scroll settles.
    pub fn reveal_block(&mut self, block_id: &str, now: Instant) -> Option<RevealTarget> {
        let block = self.document.as_deref()?.block(block_id)?.clone();
        self.begin_reveal(now);
        if let Some(start) = block.start_line()
            && self.state.last_synced_line() != Some(start)
        {
            self.state.schedule(now + self.policy.settle_delay, start);
        }
        Some(RevealTarget {
            line: block.start_line(),
            block_id: block.id,
        })
    }

    /// Feed one visibility report. Never emits directly: a changed position is
    /// debounced and released by [`poll`](Self::poll).
    pub fn on_visibility_changed(
        &mut self,
        report: &VisibilityReport,
        now: Instant,
    ) -> Option<SetPosition> {
        let document = self.document.clone()?;
        if report.revision != self.revision {
            log::debug!(
                "dropping visibility report for revision {} (current {})",
                report.revision.0,
                self.revision.0
            );
            return None;
        }

        // Geometry is recorded even while settling so later picks see current positions.
        self.viewport_height = report.viewport_height;
        for entry in &report.entries {
            if document.block(&entry.block_id).is_none() {
                log::debug!("dropping visibility entry for unknown block '{}'", entry.block_id);
                continue;
            }
            self.observed.insert(
                entry.block_id.clone(),
                Observation {
                    ratio: entry.intersection_ratio,
                    top: entry.bounding_top,
                },
            );
        }

        if self.state.programmatic_scroll_active(now) {
            return None;
        }

        let line = self.focused_line(&document)?;
        if self.state.last_synced_line() == Some(line) {
            self.state.cancel_pending();
            return None;
        }

        match self.policy.admit(self.state.last_sync_at(), now, Origin::Scroll) {
            Admission::Now => {
                self.state.cancel_pending();
                Some(self.emit(line, now))
            }
            Admission::At(due) => {
                self.state.schedule(due, line);
                None
            }
        }
    }

    /// Release the pending correction once due, unless a reveal is settling.
    pub fn poll(&mut self, now: Instant) -> Option<SetPosition> {
        if self.state.programmatic_scroll_active(now) {
            return None;
        }
        let pending = self.state.take_due(now)?;
        if self.state.last_synced_line() == Some(pending.payload) {
            return None;
        }
        Some(self.emit(pending.payload, now))
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.state.pending().map(|p| p.due)
    }

    fn begin_reveal(&mut self, now: Instant) {
        self.state.cancel_pending();
        self.state.begin_programmatic_scroll(now, self.policy.settle_delay);
    }

    fn emit(&mut self, line: u32, now: Instant) -> SetPosition {
        self.state.record_sync(line, now);
        SetPosition { line, silent: true }
    }

    /// Source line of the block the reader is focused on.
    ///
    /// Primary pick: the highest intersection ratio at or above the threshold
    /// whose top lies in the focus band. Fallback: the topmost block whose top
    /// lies in the upper portion of the viewport.
    fn focused_line(&self, document: &RenderedDocument) -> Option<u32> {
        let height = self.viewport_height.max(f32::EPSILON);
        let positioned: Vec<(u32, Observation)> = self
            .observed
            .iter()
            .filter_map(|(id, o)| Some((document.block(id).and_then(Block::start_line)?, *o)))
            .collect();

        let primary = positioned
            .iter()
            .filter(|(_, o)| o.ratio >= self.band.threshold && self.band.in_band(o.top / height))
            .max_by(|a, b| a.1.ratio.total_cmp(&b.1.ratio).then_with(|| b.0.cmp(&a.0)));

        primary
            .or_else(|| {
                positioned
                    .iter()
                    .filter(|(_, o)| self.band.in_fallback(o.top / height))
                    .min_by(|a, b| a.1.top.total_cmp(&b.1.top).then_with(|| a.0.cmp(&b.0)))
            })
            .map(|(line, _)| *line)
    }
}
