//! # Sides of a Synchronised Pair
//!
//! A [`SourceSide`] lives next to the source editor and a [`RenderSide`] next
//! to the render surface. Each owns its controller and its transport endpoint,
//! and translates traffic into commands for its host. Several pairs can run in
//! one process; each carries its own [`PairId`] and shares nothing.
//!
//! Nothing here is fatal: a failed send or an unresolvable position is logged
//! and that tick's sync is skipped.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::annotate::annotate;
use crate::document::RenderedDocument;
use crate::error::SyncError;
use crate::sync::{FocusBand, RenderToSource, SourceToRender, SyncPolicy};
use crate::transport::{SourceSignal, ToRender, ToSource, Transport};
use crate::visibility::VisibilityObserver;

/// Identifies one document/render pair in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairId(pub Uuid);

impl PairId {
    pub fn new() -> Self {
        PairId(Uuid::new_v4())
    }
}

impl Default for PairId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// What the source editor host should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorCommand {
    /// Move the cursor to `line`; when `silent`, without taking input focus.
    SetPosition { line: u32, silent: bool },
}

/// What the render surface host should do.
#[derive(Debug, Clone)]
pub enum SurfaceCommand {
    /// Replace the rendered content wholesale, then lay it out again.
    Render {
        text: String,
        document: Arc<RenderedDocument>,
    },
    /// Scroll so the block starts at the top of the viewport.
    ScrollTo { block_id: String, line: Option<u32> },
}

/// Source editor half of a pair.
pub struct SourceSide<T> {
    pair: PairId,
    controller: SourceToRender,
    transport: T,
}

impl<T> SourceSide<T>
where
    T: Transport<Outgoing = ToRender, Incoming = ToSource>,
{
    pub fn new(pair: PairId, policy: SyncPolicy, transport: T) -> Self {
        Self {
            pair,
            controller: SourceToRender::new(policy),
            transport,
        }
    }

    pub fn pair(&self) -> PairId {
        self.pair
    }

    pub fn controller(&self) -> &SourceToRender {
        &self.controller
    }

    /// The source text changed: re-annotate, rebind and ship the full text.
    pub fn content_changed(&mut self, text: &str) {
        let document = Arc::new(annotate(text));
        log::debug!("[{}] re-annotated {} blocks", self.pair, document.len());
        self.controller.rebind(document);
        self.send(ToRender::Content {
            text: text.to_string(),
        });
    }

    /// A cursor move or viewport scroll in the editor.
    pub fn signal(&mut self, signal: SourceSignal, now: Instant) {
        if let Some(reveal) = self.controller.on_signal(signal, now) {
            self.send(ToRender::Reveal { line: reveal.line });
        }
    }

    /// Fire due timers and apply messages from the render side.
    pub fn tick(&mut self, now: Instant) -> Vec<EditorCommand> {
        if let Some(reveal) = self.controller.poll(now) {
            self.send(ToRender::Reveal { line: reveal.line });
        }

        let mut commands = Vec::new();
        while let Some(message) = self.recv() {
            match message {
                ToSource::SetPosition { line, silent } => {
                    self.controller.on_position_applied(line, now);
                    commands.push(EditorCommand::SetPosition { line, silent });
                }
            }
        }
        commands
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.controller.next_deadline()
    }

    fn send(&self, message: ToRender) {
        if let Err(e) = self.transport.send(message) {
            log::warn!("[{}] skipping sync to render side: {e}", self.pair);
        }
    }

    fn recv(&self) -> Option<ToSource> {
        recv_logged(&self.transport, self.pair)
    }
}

/// Render surface half of a pair.
pub struct RenderSide<T, O> {
    pair: PairId,
    controller: RenderToSource,
    transport: T,
    observer: O,
}

impl<T, O> RenderSide<T, O>
where
    T: Transport<Outgoing = ToSource, Incoming = ToRender>,
    O: VisibilityObserver,
{
    pub fn new(pair: PairId, policy: SyncPolicy, band: FocusBand, transport: T, observer: O) -> Self {
        Self {
            pair,
            controller: RenderToSource::new(policy, band),
            transport,
            observer,
        }
    }

    pub fn pair(&self) -> PairId {
        self.pair
    }

    pub fn controller(&self) -> &RenderToSource {
        &self.controller
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// The host lays out and scrolls through the observer.
    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Apply source messages, feed observations and fire due timers.
    pub fn tick(&mut self, now: Instant) -> Vec<SurfaceCommand> {
        let mut commands = Vec::new();
        while let Some(message) = recv_logged(&self.transport, self.pair) {
            match message {
                ToRender::Content { text } => {
                    let document = Arc::new(annotate(&text));
                    let revision =
                        self.controller
                            .rebind(document.clone(), &mut self.observer, now);
                    log::debug!(
                        "[{}] rendered revision {} with {} blocks",
                        self.pair,
                        revision.0,
                        document.len()
                    );
                    commands.push(SurfaceCommand::Render { text, document });
                }
                ToRender::Reveal { line } => match self.controller.on_reveal(line, now) {
                    Some(target) => commands.push(SurfaceCommand::ScrollTo {
                        block_id: target.block_id,
                        line: target.line,
                    }),
                    None => log::debug!("[{}] nothing to reveal for line {line}", self.pair),
                },
            }
        }

        if let Some(position) = self.controller.poll(now) {
            self.send(position.line, position.silent);
        }

        while let Some(report) = self.observer.poll_visibility() {
            if let Some(position) = self.controller.on_visibility_changed(&report, now) {
                self.send(position.line, position.silent);
            }
        }
        commands
    }

    /// The reader followed a link to `block_id` inside the render surface.
    pub fn user_reveal(&mut self, block_id: &str, now: Instant) -> Option<SurfaceCommand> {
        let target = self.controller.reveal_block(block_id, now)?;
        Some(SurfaceCommand::ScrollTo {
            block_id: target.block_id,
            line: target.line,
        })
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.controller.next_deadline()
    }

    fn send(&self, line: u32, silent: bool) {
        if let Err(e) = self.transport.send(ToSource::SetPosition { line, silent }) {
            log::warn!("[{}] skipping sync to source side: {e}", self.pair);
        }
    }
}

fn recv_logged<T: Transport>(transport: &T, pair: PairId) -> Option<T::Incoming> {
    transport.try_recv().unwrap_or_else(|e: SyncError| {
        log::debug!("[{pair}] nothing received: {e}");
        None
    })
}
