use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

use anyhow::{Context, Result};
use crossterm::event::KeyCode;
use markdown_scrollsync_config::Config;
use markdown_scrollsync_engine::{
    BlockKind, ChannelEndpoint, EditorCommand, LayoutObserver, PairId, RenderSide, SourceSide,
    SourceSignal, SurfaceCommand, ToRender, ToSource, duplex,
};

use crate::preview::Preview;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Source,
    Render,
}

/// Editor-like view over the source lines. Lines are 1-based.
#[derive(Debug)]
pub struct SourcePane {
    pub lines: Vec<String>,
    pub cursor: u32,
    pub top: u32,
    pub height: u32,
}

impl Default for SourcePane {
    fn default() -> Self {
        Self {
            lines: Vec::new(),
            cursor: 1,
            top: 1,
            height: 1,
        }
    }
}

impl SourcePane {
    pub fn line_count(&self) -> u32 {
        (self.lines.len() as u32).max(1)
    }

    pub fn bottom(&self) -> u32 {
        (self.top + self.height - 1).min(self.line_count())
    }

    fn max_top(&self) -> u32 {
        self.line_count().saturating_sub(self.height) + 1
    }

    fn set_text(&mut self, text: &str) {
        self.lines = text.lines().map(str::to_string).collect();
        self.cursor = self.cursor.clamp(1, self.line_count());
        self.follow_cursor();
    }

    fn set_height(&mut self, height: u32) {
        self.height = height.max(1);
        self.follow_cursor();
    }

    fn move_cursor(&mut self, delta: i64) {
        self.cursor = (self.cursor as i64 + delta).clamp(1, self.line_count() as i64) as u32;
        self.follow_cursor();
    }

    /// Scroll by `delta` lines, dragging the cursor along when it leaves the view.
    fn scroll(&mut self, delta: i64) -> bool {
        let top = (self.top as i64 + delta).clamp(1, self.max_top() as i64) as u32;
        if top == self.top {
            return false;
        }
        self.top = top;
        self.cursor = self.cursor.clamp(self.top, self.bottom());
        true
    }

    /// Put `line` at the top of the view, as far as the text allows.
    fn jump_to(&mut self, line: u32) {
        self.cursor = line.clamp(1, self.line_count());
        self.top = self.cursor.min(self.max_top());
    }

    fn follow_cursor(&mut self) {
        if self.cursor < self.top {
            self.top = self.cursor;
        } else if self.cursor > self.top + self.height - 1 {
            self.top = self.cursor + 1 - self.height;
        }
        self.top = self.top.clamp(1, self.max_top());
    }
}

/// Both sides of one synchronised pair, hosted in a single terminal.
pub struct App {
    path: PathBuf,
    modified: Option<SystemTime>,
    pub focus: Pane,
    pub source_pane: SourcePane,
    pub preview: Preview,
    pub status: String,
    source: SourceSide<ChannelEndpoint<ToRender, ToSource>>,
    render: RenderSide<ChannelEndpoint<ToSource, ToRender>, LayoutObserver>,
}

impl App {
    pub fn new(path: PathBuf, config: &Config) -> Result<Self> {
        let (source_end, render_end) = duplex();
        let pair = PairId::new();
        log::info!("[{pair}] opening {}", path.display());

        let mut app = Self {
            path,
            modified: None,
            focus: Pane::Source,
            source_pane: SourcePane::default(),
            preview: Preview::default(),
            status: String::new(),
            source: SourceSide::new(pair, config.policy(), source_end),
            render: RenderSide::new(
                pair,
                config.policy(),
                config.focus_band(),
                render_end,
                LayoutObserver::new(1.0),
            ),
        };
        app.reload()?;
        Ok(app)
    }

    /// Re-read the file and ship it to the render side.
    pub fn reload(&mut self) -> Result<()> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        self.modified = modified_time(&self.path);
        self.source_pane.set_text(&text);
        self.source.content_changed(&text);
        self.status = format!("{} ({} lines)", self.path.display(), self.source_pane.lines.len());
        Ok(())
    }

    /// Reload when the file's modification time moved.
    pub fn reload_if_changed(&mut self) {
        let modified = modified_time(&self.path);
        if modified.is_none() || modified == self.modified {
            return;
        }
        if let Err(e) = self.reload() {
            log::warn!("reload failed: {e:#}");
            self.status = format!("{e:#}");
        }
    }

    /// Resize both viewports to the rows the panes can show.
    pub fn resize(&mut self, source_rows: u16, render_rows: u16) {
        self.source_pane.set_height(source_rows.into());
        self.render
            .observer_mut()
            .set_viewport_height(f32::from(render_rows.max(1)));
    }

    pub fn render_scroll(&self) -> usize {
        self.render.observer().scroll_top() as usize
    }

    /// Fire due timers on both sides and apply what they ask for.
    pub fn tick(&mut self, now: Instant) {
        self.apply_editor_commands(now);
        for command in self.render.tick(now) {
            self.apply_surface_command(command);
        }
        self.apply_editor_commands(now);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.source.next_deadline(), self.render.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Handle one key press; returns `false` when the app should quit.
    pub fn on_key(&mut self, code: KeyCode, now: Instant) -> bool {
        match (code, self.focus) {
            (KeyCode::Char('q'), _) => return false,
            (KeyCode::Tab, Pane::Source) => self.focus = Pane::Render,
            (KeyCode::Tab, Pane::Render) => self.focus = Pane::Source,
            (KeyCode::Char('r'), _) => {
                if let Err(e) = self.reload() {
                    self.status = format!("{e:#}");
                }
            }
            (KeyCode::Down | KeyCode::Char('j'), Pane::Source) => self.move_cursor(1, now),
            (KeyCode::Up | KeyCode::Char('k'), Pane::Source) => self.move_cursor(-1, now),
            (KeyCode::PageDown, Pane::Source) => self.scroll_source(1, now),
            (KeyCode::PageUp, Pane::Source) => self.scroll_source(-1, now),
            (KeyCode::Down | KeyCode::Char('j'), Pane::Render) => self.scroll_render(1.0),
            (KeyCode::Up | KeyCode::Char('k'), Pane::Render) => self.scroll_render(-1.0),
            (KeyCode::PageDown, Pane::Render) => {
                let page = self.render.observer().viewport_height();
                self.scroll_render(page);
            }
            (KeyCode::PageUp, Pane::Render) => {
                let page = self.render.observer().viewport_height();
                self.scroll_render(-page);
            }
            (KeyCode::Char('n'), Pane::Render) => self.jump_heading(true, now),
            (KeyCode::Char('N'), Pane::Render) => self.jump_heading(false, now),
            _ => {}
        }
        true
    }

    fn move_cursor(&mut self, delta: i64, now: Instant) {
        self.source_pane.move_cursor(delta);
        let line = self.source_pane.cursor;
        self.source.signal(SourceSignal::Cursor { line }, now);
    }

    fn scroll_source(&mut self, pages: i64, now: Instant) {
        let delta = pages * i64::from(self.source_pane.height);
        if self.source_pane.scroll(delta) {
            self.source.signal(
                SourceSignal::Viewport {
                    top_line: self.source_pane.top,
                    bottom_line: self.source_pane.bottom(),
                },
                now,
            );
        }
    }

    fn scroll_render(&mut self, delta: f32) {
        self.render.observer_mut().scroll_by(delta);
    }

    /// Follow the next (or previous) heading like an in-document link.
    fn jump_heading(&mut self, forward: bool, now: Instant) {
        let Some(document) = self.render.controller().document().cloned() else {
            return;
        };
        let top = self.render.observer().scroll_top();
        let headings = document
            .blocks()
            .iter()
            .filter(|b| matches!(b.kind, BlockKind::Heading { .. }))
            .filter_map(|b| Some((b.id.as_str(), self.preview.extent(&b.id)?.top)));
        let target = if forward {
            headings
                .filter(|(_, t)| *t > top)
                .min_by(|a, b| a.1.total_cmp(&b.1))
        } else {
            headings
                .filter(|(_, t)| *t < top)
                .max_by(|a, b| a.1.total_cmp(&b.1))
        };
        if let Some((id, _)) = target
            && let Some(command) = self.render.user_reveal(id, now)
        {
            self.apply_surface_command(command);
        }
    }

    fn apply_editor_commands(&mut self, now: Instant) {
        for command in self.source.tick(now) {
            match command {
                EditorCommand::SetPosition { line, silent } => {
                    self.source_pane.jump_to(line);
                    if !silent {
                        self.focus = Pane::Source;
                    }
                    // The pane reports its own cursor move like any other.
                    let line = self.source_pane.cursor;
                    self.source.signal(SourceSignal::Cursor { line }, now);
                }
            }
        }
    }

    fn apply_surface_command(&mut self, command: SurfaceCommand) {
        match command {
            SurfaceCommand::Render { text, document } => {
                self.preview = Preview::layout(&text, &document);
                self.render
                    .observer_mut()
                    .set_extents(self.preview.extents.clone());
            }
            SurfaceCommand::ScrollTo { block_id, .. } => match self.preview.extent(&block_id) {
                Some(extent) => self.render.observer_mut().scroll_to(extent.top),
                None => log::debug!("no layout for block '{block_id}'"),
            },
        }
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
