use std::sync::Arc;
use std::time::Instant;

use crate::document::RenderedDocument;
use crate::transport::SourceSignal;

use super::policy::{Admission, Origin, SyncPolicy};
use super::state::SyncState;

/// Instruction for the render surface to bring a source line into view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reveal {
    pub line: u32,
}

/// A source position waiting for its deadline; resolved again when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Requested {
    line: u32,
    origin: Origin,
}

/// Turns cursor and viewport changes on the source side into reveals.
#[derive(Debug)]
pub struct SourceToRender {
    policy: SyncPolicy,
    state: SyncState<Requested>,
    document: Option<Arc<RenderedDocument>>,
}

impl SourceToRender {
    pub fn new(policy: SyncPolicy) -> Self {
        Self {
            policy,
            state: SyncState::new(),
            document: None,
        }
    }

    pub fn policy(&self) -> &SyncPolicy {
        &self.policy
    }

    pub fn last_synced_line(&self) -> Option<u32> {
        self.state.last_synced_line()
    }

    pub fn has_pending(&self) -> bool {
        self.state.pending().is_some()
    }

    /// Swap in the document of a new annotation pass.
    ///
    /// The last synced line is kept. A pending instruction holds a line value,
    /// so it survives and is resolved against the new document when it fires.
    pub fn rebind(&mut self, document: Arc<RenderedDocument>) {
        self.document = Some(document);
    }

    pub fn on_signal(&mut self, signal: SourceSignal, now: Instant) -> Option<Reveal> {
        match signal {
            SourceSignal::Cursor { line } => {
                self.on_source_viewport_changed(line, Origin::Cursor, now)
            }
            SourceSignal::Viewport { top_line, .. } => {
                self.on_source_viewport_changed(top_line, Origin::Scroll, now)
            }
        }
    }

    /// Handle a cursor or viewport change at `line`.
    ///
    /// Returns a reveal when it may go out immediately; otherwise the change is
    /// held as the single pending instruction and released by [`poll`](Self::poll).
    pub fn on_source_viewport_changed(
        &mut self,
        line: u32,
        origin: Origin,
        now: Instant,
    ) -> Option<Reveal> {
        let target = self.resolve(line)?;
        let unchanged = self.state.last_synced_line() == Some(target);
        let cursor_pending = self
            .state
            .pending()
            .is_some_and(|p| p.payload.origin == Origin::Cursor);

        if unchanged && self.state.programmatic_scroll_active(now) {
            log::debug!("ignoring echo of applied position at line {target}");
            return None;
        }
        // A delayed cursor move is only ever replaced by a newer cursor move.
        if origin == Origin::Scroll && cursor_pending {
            log::debug!("keeping pending cursor move over viewport change to line {target}");
            return None;
        }
        if unchanged && origin == Origin::Scroll {
            self.state.cancel_pending();
            return None;
        }

        match self.policy.admit(self.state.last_sync_at(), now, origin) {
            Admission::Now => {
                self.state.cancel_pending();
                Some(self.emit(target, now))
            }
            Admission::At(due) => {
                self.state.schedule(due, Requested { line, origin });
                None
            }
        }
    }

    /// Release the pending instruction once its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<Reveal> {
        let pending = self.state.take_due(now)?;
        let target = self.resolve(pending.payload.line)?;
        Some(self.emit(target, now))
    }

    /// The source side moved to `line` on the render side's request.
    ///
    /// Any pending reveal is superseded, and source events landing on the same
    /// block while the move settles are treated as its echo.
    pub fn on_position_applied(&mut self, line: u32, now: Instant) {
        self.state.cancel_pending();
        let target = self.resolve(line).unwrap_or(line);
        self.state.record_sync(target, now);
        self.state.begin_programmatic_scroll(now, self.policy.settle_delay);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.state.pending().map(|p| p.due)
    }

    fn resolve(&self, line: u32) -> Option<u32> {
        let Some(document) = self.document.as_deref() else {
            log::debug!("no document bound, skipping sync for line {line}");
            return None;
        };
        match document.locate_block(line).and_then(|b| b.start_line()) {
            Some(start) => Some(start),
            None => {
                log::debug!("no positioned block for line {line}, skipping sync");
                None
            }
        }
    }

    fn emit(&mut self, line: u32, now: Instant) -> Reveal {
        self.state.record_sync(line, now);
        Reveal { line }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate;
    use std::time::Duration;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn controller(md: &str) -> SourceToRender {
        let mut c = SourceToRender::new(SyncPolicy::default());
        c.rebind(Arc::new(annotate(md)));
        c
    }

    fn paragraphs(count: usize) -> String {
        (1..=count).map(|i| format!("para {i}\n\n")).collect()
    }

    #[test]
    fn cursor_reveals_block_start() {
        let mut c = controller(&paragraphs(5));
        let t0 = Instant::now();
        // Line 4 is the blank after "para 2", which starts on line 3.
        assert_eq!(
            c.on_source_viewport_changed(4, Origin::Cursor, t0),
            Some(Reveal { line: 3 })
        );
        assert_eq!(c.last_synced_line(), Some(3));
    }

    #[test]
    fn cursor_inside_window_is_delayed_not_dropped() {
        let mut c = controller(&paragraphs(5));
        let t0 = Instant::now();
        assert!(c.on_source_viewport_changed(1, Origin::Cursor, t0).is_some());
        assert_eq!(c.on_source_viewport_changed(5, Origin::Cursor, t0 + ms(20)), None);

        assert_eq!(c.poll(t0 + ms(99)), None);
        assert_eq!(c.poll(t0 + ms(100)), Some(Reveal { line: 5 }));
    }

    #[test]
    fn newer_cursor_move_replaces_pending_one() {
        let mut c = controller(&paragraphs(5));
        let t0 = Instant::now();
        c.on_source_viewport_changed(1, Origin::Cursor, t0);
        c.on_source_viewport_changed(5, Origin::Cursor, t0 + ms(10));
        c.on_source_viewport_changed(7, Origin::Cursor, t0 + ms(20));

        assert_eq!(c.poll(t0 + ms(100)), Some(Reveal { line: 7 }));
        assert_eq!(c.poll(t0 + ms(500)), None);
    }

    #[test]
    fn nothing_happens_before_first_bind() {
        let mut c = SourceToRender::new(SyncPolicy::default());
        assert_eq!(c.on_source_viewport_changed(1, Origin::Cursor, Instant::now()), None);
    }

    #[test]
    fn scroll_to_already_synced_block_cancels_pending() {
        let mut c = controller(&paragraphs(5));
        let t0 = Instant::now();
        c.on_source_viewport_changed(3, Origin::Cursor, t0);
        c.on_source_viewport_changed(7, Origin::Scroll, t0 + ms(10));
        assert!(c.has_pending());

        c.on_source_viewport_changed(4, Origin::Scroll, t0 + ms(20));
        assert!(!c.has_pending());
    }

    #[test]
    fn viewport_on_synced_block_keeps_delayed_cursor_move() {
        let mut c = controller(&paragraphs(5));
        let t0 = Instant::now();
        assert!(c.on_source_viewport_changed(1, Origin::Cursor, t0).is_some());
        assert_eq!(c.on_source_viewport_changed(9, Origin::Cursor, t0 + ms(30)), None);

        // The editor reports its viewport before it scrolls to the new cursor.
        assert_eq!(c.on_source_viewport_changed(1, Origin::Scroll, t0 + ms(50)), None);
        assert!(c.has_pending());

        assert_eq!(c.poll(t0 + ms(100)), Some(Reveal { line: 9 }));
        assert_eq!(c.last_synced_line(), Some(9));
    }

    #[test]
    fn viewport_elsewhere_does_not_replace_delayed_cursor_move() {
        let mut c = controller(&paragraphs(5));
        let t0 = Instant::now();
        c.on_source_viewport_changed(1, Origin::Cursor, t0);
        c.on_source_viewport_changed(5, Origin::Cursor, t0 + ms(20));
        assert_eq!(c.on_source_viewport_changed(7, Origin::Scroll, t0 + ms(40)), None);

        assert_eq!(c.poll(t0 + ms(100)), Some(Reveal { line: 5 }));
        assert_eq!(c.poll(t0 + ms(500)), None);
    }

    #[test]
    fn applied_position_suppresses_its_echo() {
        let mut c = controller(&paragraphs(5));
        let t0 = Instant::now();
        c.on_position_applied(5, t0);

        assert_eq!(c.on_source_viewport_changed(5, Origin::Cursor, t0 + ms(120)), None);
        assert_eq!(c.poll(t0 + ms(400)), None);
        // After settling, a deliberate cursor move onto the same block is honoured.
        assert_eq!(
            c.on_source_viewport_changed(5, Origin::Cursor, t0 + ms(400)),
            Some(Reveal { line: 5 })
        );
    }

    #[test]
    fn pending_line_resolves_against_rebound_document() {
        let mut c = controller(&paragraphs(5));
        let t0 = Instant::now();
        c.on_source_viewport_changed(1, Origin::Cursor, t0);
        c.on_source_viewport_changed(6, Origin::Cursor, t0 + ms(10));

        // Re-render: line 6 now sits inside a paragraph starting on line 5.
        c.rebind(Arc::new(annotate("a\n\nb\n\nlong\nparagraph\n")));
        assert_eq!(c.last_synced_line(), Some(1));
        assert_eq!(c.poll(t0 + ms(100)), Some(Reveal { line: 5 }));
    }
}
