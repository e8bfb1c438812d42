mod app;
mod preview;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use markdown_scrollsync_config::Config;
use markdown_scrollsync_engine::annotate;
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use std::{
    env, fs,
    io::{Stdout, stdout},
    path::{Path, PathBuf},
    process,
    time::{Duration, Instant},
};

use app::{App, Pane};
use preview::{Row, RowKind};

/// Longest wait between loop turns; bounds how late a file change is noticed.
const IDLE_POLL: Duration = Duration::from_millis(250);

fn main() -> Result<()> {
    let mut args: Vec<String> = env::args().collect();
    let program = if args.is_empty() {
        "markdown-scrollsync-cli".to_string()
    } else {
        args.remove(0)
    };
    let annotate_only = take_flag(&mut args, "--annotate");
    let config_path = Config::config_path();

    let config = match Config::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            eprintln!("Error: Failed to load config file: {e}");
            process::exit(1);
        }
    };

    let document_path = match args.as_slice() {
        [path] => PathBuf::from(path),
        [] => match &config.document_path {
            Some(path) => path.clone(),
            None => {
                eprintln!("Error: No document provided and none configured");
                eprintln!("Usage: {program} [--annotate] <file.md>");
                eprintln!("Or set document_path in {}", config_path.display());
                process::exit(1);
            }
        },
        _ => {
            eprintln!("Usage: {program} [--annotate] [file.md]");
            process::exit(1);
        }
    };

    if annotate_only {
        return print_annotations(&document_path);
    }

    init_logging(&config)?;
    let mut app = App::new(document_path, &config)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }

    Ok(())
}

fn take_flag(args: &mut Vec<String>, flag: &str) -> bool {
    let before = args.len();
    args.retain(|a| a != flag);
    args.len() != before
}

/// stderr belongs to the terminal UI, so logs only go to a configured file.
fn init_logging(config: &Config) -> Result<()> {
    let Some(log_path) = &config.log_path else {
        return Ok(());
    };
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    log::info!("markdown-scrollsync starting up");
    Ok(())
}

fn print_annotations(path: &Path) -> Result<()> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    for block in annotate(&text).blocks() {
        let lines = match block.lines {
            Some(lines) => format!("{}-{}", lines.start, lines.end),
            None => "-".to_string(),
        };
        println!("{lines:>9}  {:<12} {}", block.kind.to_string(), block.id);
    }
    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        app.tick(Instant::now());
        terminal.draw(|f| ui(f, app))?;

        let timeout = app.next_deadline().map_or(IDLE_POLL, |due| {
            due.saturating_duration_since(Instant::now()).min(IDLE_POLL)
        });
        if event::poll(timeout)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
            && !app.on_key(key.code, Instant::now())
        {
            return Ok(());
        }
        app.reload_if_changed();
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)].as_ref())
        .split(f.area());
    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)].as_ref())
        .split(outer[0]);

    // Borders take a row above and below
    let source_rows = panes[0].height.saturating_sub(2);
    let render_rows = panes[1].height.saturating_sub(2);
    app.resize(source_rows, render_rows);

    // Source panel
    let pane = &app.source_pane;
    let width = pane.line_count().to_string().len();
    let source_lines: Vec<Line> = pane
        .lines
        .iter()
        .enumerate()
        .skip(pane.top as usize - 1)
        .take(source_rows as usize)
        .map(|(i, text)| {
            let number = i as u32 + 1;
            let style = if number == pane.cursor {
                Style::default().bg(Color::Yellow).fg(Color::Black)
            } else {
                Style::default()
            };
            Line::from(vec![
                Span::styled(format!("{number:>width$} "), Style::default().fg(Color::DarkGray)),
                Span::styled(text.clone(), style),
            ])
        })
        .collect();
    let source = Paragraph::new(source_lines).block(pane_block("Source", app.focus == Pane::Source));
    f.render_widget(source, panes[0]);

    // Preview panel; rows are never wrapped so they line up with the layout
    let preview_lines: Vec<Line> = app
        .preview
        .rows
        .iter()
        .skip(app.render_scroll())
        .take(render_rows as usize)
        .map(row_line)
        .collect();
    let preview =
        Paragraph::new(preview_lines).block(pane_block("Preview", app.focus == Pane::Render));
    f.render_widget(preview, panes[1]);

    let help = Line::from(vec![
        Span::raw("q: Quit | Tab: Switch pane | ↑/k ↓/j: Move | PgUp/PgDn: Page | "),
        Span::raw("n/N: Next/prev heading | r: Reload | "),
        Span::styled(app.status.clone(), Style::default().fg(Color::DarkGray)),
    ]);
    f.render_widget(Paragraph::new(help), outer[1]);
}

fn pane_block(title: &str, focused: bool) -> Block<'_> {
    let border = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(title)
}

fn row_line(row: &Row) -> Line<'_> {
    match row.kind {
        RowKind::Heading(level) => {
            let mut style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
            if level == 1 {
                style = style.add_modifier(Modifier::UNDERLINED);
            }
            Line::from(Span::styled(row.text.as_str(), style))
        }
        RowKind::Quote => Line::from(vec![
            Span::styled("▌ ", Style::default().fg(Color::Green)),
            Span::styled(row.text.as_str(), Style::default().add_modifier(Modifier::ITALIC)),
        ]),
        RowKind::Code => Line::from(Span::styled(
            format!("  {}", row.text),
            Style::default().fg(Color::Yellow),
        )),
        RowKind::Rule => Line::from(Span::styled(
            row.text.as_str(),
            Style::default().fg(Color::DarkGray),
        )),
        RowKind::Text | RowKind::Blank => Line::from(row.text.as_str()),
    }
}
