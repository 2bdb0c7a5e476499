use std::{
    env, fs, io,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use crossterm::{
    event::{
        self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Position},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use treemark::cursor::{LineKind, Selection, locate};
use treemark::document::ListKind;
use treemark::editor::{ClipboardPayload, DocumentEditor};
use treemark::render::{RenderResult, render_document};
use treemark::theme::Theme;

const STATUS_TIMEOUT: Duration = Duration::from_secs(4);
const LOG_FILE: &str = "treemark.log";

fn main() -> Result<()> {
    run()
}

fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let Some(path_arg) = args.next() else {
        eprintln!("Usage: treemark <file.md>");
        return Ok(());
    };
    let path = PathBuf::from(path_arg);
    let _log_guard = init_logging(&env::temp_dir());

    let (editor, initial_status) = load_document(&path)?;
    let mut app = App::new(editor, path, initial_status);

    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)
        .context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().ok();

    let res = run_app(&mut terminal, &mut app).context("application error");

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), DisableBracketedPaste, LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    res
}

/// The terminal belongs to the UI, so log records go to a file.
fn init_logging(dir: &Path) -> Option<WorkerGuard> {
    let appender = tracing_appender::rolling::never(dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("treemark=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .ok()
        .map(|_| guard)
}

fn load_document(path: &Path) -> Result<(DocumentEditor, Option<String>)> {
    if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        info!(path = %path.display(), bytes = content.len(), "loaded document");
        Ok((DocumentEditor::from_markdown(&content), None))
    } else {
        Ok((
            DocumentEditor::from_markdown(""),
            Some("New document".to_string()),
        ))
    }
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    while !app.should_quit() {
        terminal
            .draw(|frame| app.draw(frame))
            .context("failed to draw frame")?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if event::poll(timeout).context("event poll failed")? {
            let evt = event::read().context("failed to read event")?;
            app.handle_event(evt)?;
        }

        if last_tick.elapsed() >= tick_rate {
            app.on_tick();
            last_tick = Instant::now();
        }
    }

    Ok(())
}

struct App {
    editor: DocumentEditor,
    file_path: PathBuf,
    theme: Theme,
    scroll_top: usize,
    last_view_height: usize,
    should_quit: bool,
    dirty: bool,
    status_message: Option<(String, Instant)>,
    clipboard: Option<ClipboardPayload>,
}

impl App {
    fn new(editor: DocumentEditor, path: PathBuf, initial_status: Option<String>) -> Self {
        Self {
            editor,
            file_path: path,
            theme: Theme::default(),
            scroll_top: 0,
            last_view_height: 1,
            should_quit: false,
            dirty: false,
            status_message: initial_status.map(|msg| (msg, Instant::now())),
            clipboard: None,
        }
    }

    fn should_quit(&self) -> bool {
        self.should_quit
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        if area.height == 0 || area.width == 0 {
            return;
        }

        let status_height = if area.height > 1 { 2 } else { 1 };
        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(status_height)])
            .split(area);

        let editor_area = vertical[0];
        let status_area = vertical[1];

        let horizontal = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(editor_area);
        let text_area = horizontal[0];
        let scrollbar_area = horizontal[1];

        let render = render_document(
            self.editor.document(),
            text_area.width.max(1) as usize,
            &self.editor.selection(),
            &self.theme,
        );

        let viewport_height = text_area.height as usize;
        self.last_view_height = viewport_height.max(1);
        self.adjust_scroll(&render, viewport_height);

        let paragraph = Paragraph::new(Text::from(render.lines.clone()))
            .style(self.theme.pane_style())
            .block(Block::default().borders(Borders::NONE))
            .scroll((self.scroll_top as u16, 0));
        frame.render_widget(paragraph, text_area);

        let mut scrollbar_state = ScrollbarState::new(render.total_lines).position(self.scroll_top);
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .thumb_style(self.theme.scrollbar_thumb_style())
            .track_style(self.theme.scrollbar_track_style());
        frame.render_stateful_widget(scrollbar, scrollbar_area, &mut scrollbar_state);

        if let Some(cursor) = render.cursor {
            if cursor.line >= self.scroll_top
                && cursor.line < self.scroll_top + viewport_height
                && text_area.width > 0
            {
                let cursor_y = text_area.y + (cursor.line - self.scroll_top) as u16;
                let cursor_x = text_area.x + cursor.column.min(text_area.width - 1);
                frame.set_cursor_position(Position::new(cursor_x, cursor_y));
            }
        }

        let status_line = self.status_line(render.total_lines);
        let status_widget = Paragraph::new(status_line)
            .style(self.theme.status_style())
            .block(Block::default().borders(Borders::TOP));
        frame.render_widget(status_widget, status_area);
    }

    fn status_line(&mut self, total_lines: usize) -> Line<'static> {
        self.prune_status_message();
        let cursor_details = self.cursor_status_text();
        if let Some((message, _)) = &self.status_message {
            return Line::from(format!("{cursor_details} | {message}"));
        }

        let marker = if self.dirty { "*" } else { "" };
        Line::from(vec![
            Span::raw(format!("{cursor_details} | ")),
            Span::styled(
                format!("{}{marker}", self.file_path.display()),
                self.theme.file_name_style(),
            ),
            Span::raw(format!(
                " | Lines: {total_lines} | Ctrl-S save | Ctrl-Q quit"
            )),
        ])
    }

    fn prune_status_message(&mut self) {
        if let Some((_, instant)) = &self.status_message {
            if instant.elapsed() > STATUS_TIMEOUT {
                self.status_message = None;
            }
        }
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some((message.into(), Instant::now()));
    }

    fn adjust_scroll(&mut self, render: &RenderResult, viewport_height: usize) {
        let viewport = viewport_height.max(1);
        let max_scroll = render.total_lines.saturating_sub(viewport);
        if self.scroll_top > max_scroll {
            self.scroll_top = max_scroll;
        }
        if let Some(cursor) = &render.cursor {
            if cursor.line < self.scroll_top {
                self.scroll_top = cursor.line;
            } else if cursor.line >= self.scroll_top + viewport {
                let target = cursor.line.saturating_add(1);
                self.scroll_top = target.saturating_sub(viewport);
            }
        }
        if self.scroll_top > max_scroll {
            self.scroll_top = max_scroll;
        }
    }

    /// Runs a motion while keeping the selection anchor in place.
    fn extend_selection(&mut self, motion: fn(&mut DocumentEditor) -> bool) {
        let selection = self.editor.selection();
        self.editor.move_to_pointer(selection.focus);
        motion(&mut self.editor);
        let focus = self.editor.cursor_pointer();
        self.editor
            .set_selection(Selection::new(selection.anchor, focus));
    }

    fn handle_event(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Key(KeyEvent {
                code,
                modifiers,
                kind: KeyEventKind::Press,
                ..
            }) => self.handle_key(code, modifiers),
            Event::Paste(text) => {
                if self.editor.paste(&ClipboardPayload::plain(text)) {
                    self.mark_dirty();
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> Result<()> {
        let shift = modifiers.contains(KeyModifiers::SHIFT);
        match (code, modifiers) {
            (KeyCode::Char('q'), m) if m.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            (KeyCode::Char('s'), m) if m.contains(KeyModifiers::CONTROL) => {
                self.save()?;
            }
            (KeyCode::Char('c'), m) if m.contains(KeyModifiers::CONTROL) => {
                if let Some(payload) = self.editor.copy_selection() {
                    self.clipboard = Some(payload);
                    self.set_status("Copied");
                }
            }
            (KeyCode::Char('x'), m) if m.contains(KeyModifiers::CONTROL) => {
                if let Some(payload) = self.editor.copy_selection() {
                    self.clipboard = Some(payload);
                    if self.editor.backspace() {
                        self.mark_dirty();
                    }
                }
            }
            (KeyCode::Char('v'), m) if m.contains(KeyModifiers::CONTROL) => {
                let pasted = match &self.clipboard {
                    Some(payload) => self.editor.paste(payload),
                    None => false,
                };
                if pasted {
                    self.mark_dirty();
                }
            }
            (KeyCode::Char('t'), m) if m.contains(KeyModifiers::CONTROL) => {
                if self.editor.toggle_task() {
                    self.mark_dirty();
                }
            }
            (KeyCode::Left, _) if shift => self.extend_selection(DocumentEditor::move_left),
            (KeyCode::Right, _) if shift => self.extend_selection(DocumentEditor::move_right),
            (KeyCode::Up, _) if shift => self.extend_selection(DocumentEditor::move_up),
            (KeyCode::Down, _) if shift => self.extend_selection(DocumentEditor::move_down),
            (KeyCode::Home, _) if shift => {
                self.extend_selection(DocumentEditor::move_to_line_start);
            }
            (KeyCode::End, _) if shift => self.extend_selection(DocumentEditor::move_to_line_end),
            (KeyCode::Left, _) => {
                self.editor.move_left();
            }
            (KeyCode::Right, _) => {
                self.editor.move_right();
            }
            (KeyCode::Up, _) => {
                self.editor.move_up();
            }
            (KeyCode::Down, _) => {
                self.editor.move_down();
            }
            (KeyCode::Home, _) => {
                self.editor.move_to_line_start();
            }
            (KeyCode::End, _) => {
                self.editor.move_to_line_end();
            }
            (KeyCode::Char('a'), m) if m.contains(KeyModifiers::CONTROL) => {
                self.editor.move_to_line_start();
            }
            (KeyCode::Char('e'), m) if m.contains(KeyModifiers::CONTROL) => {
                self.editor.move_to_line_end();
            }
            (KeyCode::PageUp, _) => {
                self.scroll_top = self.scroll_top.saturating_sub(self.last_view_height);
            }
            (KeyCode::PageDown, _) => {
                self.scroll_top += self.last_view_height;
            }
            _ => {
                if self.edit(code, modifiers) {
                    self.mark_dirty();
                }
            }
        }
        Ok(())
    }

    fn edit(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
        match (code, modifiers) {
            (KeyCode::Backspace, _) => self.editor.backspace(),
            (KeyCode::Delete, _) => self.editor.delete(),
            (KeyCode::Enter, m) if m.intersects(KeyModifiers::SHIFT | KeyModifiers::CONTROL) => {
                self.editor.insert_line_break()
            }
            (KeyCode::Enter, _) => self.editor.insert_paragraph_break(),
            (KeyCode::Char('j'), m) if m.contains(KeyModifiers::CONTROL) => {
                self.editor.insert_line_break()
            }
            (KeyCode::Tab, _) => self.editor.indent(),
            (KeyCode::BackTab, _) => self.editor.outdent(),
            (KeyCode::Char(ch), m)
                if !m.contains(KeyModifiers::CONTROL) && !m.contains(KeyModifiers::ALT) =>
            {
                self.editor.insert_char(ch)
            }
            _ => false,
        }
    }

    fn on_tick(&mut self) {
        self.prune_status_message();
    }

    fn save(&mut self) -> Result<()> {
        let contents = self.editor.to_markdown();
        fs::write(&self.file_path, contents)
            .with_context(|| format!("failed to write {}", self.file_path.display()))?;
        info!(path = %self.file_path.display(), "saved document");

        self.dirty = false;
        self.set_status("Saved");
        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn cursor_status_text(&self) -> String {
        let cursor = self.editor.cursor_pointer();
        let position_text = match locate(self.editor.document(), &cursor) {
            Some(position) => format!("[{},{}]", position.line + 1, position.column + 1),
            None => {
                warn!(?cursor, "cursor does not resolve to a line");
                "[?,?]".to_string()
            }
        };
        match self.editor.current_line() {
            Some(line) => format!("{position_text} {}", line_label(line.kind, line.depth)),
            None => position_text,
        }
    }
}

fn line_label(kind: LineKind, depth: usize) -> String {
    let label = match kind {
        LineKind::Paragraph => "Paragraph".to_string(),
        LineKind::Heading(level) => format!("Heading {level}"),
        LineKind::Blockquote => "Quote".to_string(),
        LineKind::CodeBlock => "Code".to_string(),
        LineKind::ListItem(ListKind::Bullet) => "Bullet item".to_string(),
        LineKind::ListItem(ListKind::Ordered) => "Numbered item".to_string(),
        LineKind::ListItem(ListKind::Task) => "Task".to_string(),
    };
    if depth > 1 {
        format!("{label} (level {depth})")
    } else {
        label
    }
}
