use std::cell::Cell;
use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Padding, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use textwrap::{wrap, Options as WrapOptions};
use unicode_width::UnicodeWidthStr;

use crate::query::PostField;
use crate::render::{Feed, PostBlock};
use crate::sync::Synchronizer;
use crate::view::{ComposeField, ParamPanel, ViewState};

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
const COLOR_PANEL_FOCUSED_BG: Color = Color::Rgb(49, 50, 68);
const COLOR_PANEL_SELECTED_BG: Color = Color::Rgb(69, 71, 90);
const COLOR_BORDER_IDLE: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_FOCUSED: Color = Color::Rgb(137, 180, 250);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_SUCCESS: Color = Color::Rgb(166, 227, 161);
const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const ICON_LIKES: &str = "👍";
const ICON_COMMENTS: &str = "💬";
const CURSOR: &str = "▏";
const COMPOSE_HEIGHT: u16 = 10;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Pane {
    Settings,
    Posts,
    Compose,
}

impl Pane {
    fn title(self) -> &'static str {
        match self {
            Pane::Settings => "Settings",
            Pane::Posts => "Posts",
            Pane::Compose => "New post",
        }
    }

    fn next(self) -> Self {
        match self {
            Pane::Settings => Pane::Posts,
            Pane::Posts => Pane::Compose,
            Pane::Compose => Pane::Settings,
        }
    }

    fn previous(self) -> Self {
        match self {
            Pane::Settings => Pane::Compose,
            Pane::Posts => Pane::Settings,
            Pane::Compose => Pane::Posts,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum SettingsRow {
    BaseUrl,
    Mode(ParamPanel),
    SortField(PostField),
    Descending,
    SearchField(PostField),
    Load,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum ComposeRow {
    Field(ComposeField),
    Submit,
}

const COMPOSE_ROWS: [ComposeRow; 4] = [
    ComposeRow::Field(ComposeField::Title),
    ComposeRow::Field(ComposeField::Author),
    ComposeRow::Field(ComposeField::Content),
    ComposeRow::Submit,
];

/// Text input currently receiving keystrokes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum EditTarget {
    BaseUrl,
    SearchValue(PostField),
    Compose(ComposeField),
    CommentDraft(i64),
}

struct Spinner {
    index: usize,
    last_tick: Instant,
}

impl Spinner {
    fn new() -> Self {
        Self {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self) -> bool {
        if self.last_tick.elapsed() >= Duration::from_millis(80) {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = Instant::now();
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.last_tick = Instant::now();
    }
}

pub struct Options {
    pub status_message: String,
    pub view: ViewState,
    pub synchronizer: Synchronizer,
    /// Fetch immediately, e.g. when a stored base address was restored.
    pub initial_fetch: bool,
    pub config_path: String,
}

pub struct Model {
    status_message: String,
    view: ViewState,
    feed: Feed,
    sync: Synchronizer,
    focused_pane: Pane,
    settings_index: usize,
    compose_index: usize,
    selected_post: usize,
    post_offset: Cell<usize>,
    editing: Option<EditTarget>,
    feed_revision: u64,
    needs_redraw: bool,
    spinner: Spinner,
    config_path: String,
}

impl Model {
    pub fn new(opts: Options) -> Self {
        let mut model = Self {
            status_message: opts.status_message,
            view: opts.view,
            feed: Feed::default(),
            sync: opts.synchronizer,
            focused_pane: Pane::Settings,
            settings_index: 0,
            compose_index: 0,
            selected_post: 0,
            post_offset: Cell::new(0),
            editing: None,
            feed_revision: 0,
            needs_redraw: true,
            spinner: Spinner::new(),
            config_path: opts.config_path,
        };
        if opts.initial_fetch {
            model.reload_posts();
            model.focused_pane = Pane::Posts;
        }
        model
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        let tick_rate = Duration::from_millis(120);

        loop {
            if self.poll_async() {
                self.mark_dirty();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        match self.handle_key(key) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                tracing::error!("Error: {err:#}");
                                self.status_message = format!("Error: {}", err);
                                self.mark_dirty();
                            }
                        }
                    }
                    Event::Resize(_, _) => self.mark_dirty(),
                    _ => {}
                }
            }

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
                if self.sync.is_loading() {
                    if self.spinner.advance() {
                        self.mark_dirty();
                    }
                } else {
                    self.spinner.reset();
                }
            }
        }

        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn poll_async(&mut self) -> bool {
        let mut changed = false;
        while let Some(event) = self.sync.try_next() {
            if let Some(message) = self.sync.handle(event, &self.view, &mut self.feed) {
                self.status_message = message;
            }
            changed = true;
        }
        if changed {
            self.after_feed_change();
        }
        changed
    }

    fn after_feed_change(&mut self) {
        if self.feed.revision() == self.feed_revision {
            return;
        }
        self.feed_revision = self.feed.revision();
        if self.selected_post >= self.feed.len() {
            self.selected_post = self.feed.len().saturating_sub(1);
        }
        if let Some(EditTarget::CommentDraft(_)) = self.editing {
            self.editing = None;
            self.status_message = "Posts reloaded; the comment form was reset.".to_string();
        }
    }

    fn focus_status_for(pane: Pane) -> String {
        match pane {
            Pane::Settings => "Settings: Enter edits or toggles, L loads posts.".to_string(),
            Pane::Posts => "Posts: j/k move, x delete, l like, c comments, i write a comment."
                .to_string(),
            Pane::Compose => "New post: Enter edits a field, Ctrl-S publishes.".to_string(),
        }
    }

    fn settings_rows(&self) -> Vec<SettingsRow> {
        let mut rows = vec![
            SettingsRow::BaseUrl,
            SettingsRow::Mode(ParamPanel::Sort),
            SettingsRow::Mode(ParamPanel::Search),
        ];
        match self.view.visible_panel {
            Some(ParamPanel::Sort) => {
                rows.extend(PostField::ALL.into_iter().map(SettingsRow::SortField));
                rows.push(SettingsRow::Descending);
            }
            Some(ParamPanel::Search) => {
                rows.extend(
                    self.view
                        .search
                        .fields
                        .iter()
                        .map(|entry| SettingsRow::SearchField(entry.field)),
                );
            }
            None => {}
        }
        rows.push(SettingsRow::Load);
        rows
    }

    fn selected_block(&self) -> Option<&PostBlock> {
        self.feed.get(self.selected_post)
    }

    fn reload_posts(&mut self) {
        if self.view.base_url.trim().is_empty() {
            tracing::warn!("reload requested without a base address");
            self.status_message = "Enter the API base address first.".to_string();
            return;
        }
        let generation = self.sync.reload(&self.view);
        self.status_message = format!("Loading posts from {} (#{generation})…", self.view.base_url);
        self.spinner.reset();
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        if let Some(target) = self.editing {
            let quit = self.handle_edit_key(target, key);
            self.mark_dirty();
            return Ok(quit);
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => return Ok(true),
                KeyCode::Char('s') => {
                    self.submit_compose();
                    self.mark_dirty();
                }
                _ => {}
            }
            return Ok(false);
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Tab => {
                self.focused_pane = self.focused_pane.next();
                self.status_message = Self::focus_status_for(self.focused_pane);
            }
            KeyCode::BackTab => {
                self.focused_pane = self.focused_pane.previous();
                self.status_message = Self::focus_status_for(self.focused_pane);
            }
            KeyCode::Char('r') | KeyCode::Char('L') => self.reload_posts(),
            code => match self.focused_pane {
                Pane::Settings => self.handle_settings_key(code),
                Pane::Posts => self.handle_posts_key(code),
                Pane::Compose => self.handle_compose_key(code),
            },
        }
        self.mark_dirty();
        Ok(false)
    }

    fn edit_buffer_mut(&mut self, target: EditTarget) -> Option<&mut String> {
        match target {
            EditTarget::BaseUrl => Some(&mut self.view.base_url),
            EditTarget::SearchValue(field) => self
                .view
                .search
                .field_mut(field)
                .map(|entry| &mut entry.value),
            EditTarget::Compose(field) => Some(self.view.compose.value_mut(field)),
            EditTarget::CommentDraft(id) => self.feed.draft_mut(id),
        }
    }

    fn start_editing(&mut self, target: EditTarget) {
        self.editing = Some(target);
        self.status_message = match target {
            EditTarget::BaseUrl => "Type the API base address, Enter to load, Esc to stop.",
            EditTarget::SearchValue(_) => "Type the search value, Enter or Esc to stop.",
            EditTarget::Compose(_) => "Type, then Enter or Esc to stop editing.",
            EditTarget::CommentDraft(_) => "Write a comment, Enter to submit, Esc to stop.",
        }
        .to_string();
    }

    /// Returns true when the key quits the application.
    fn handle_edit_key(&mut self, target: EditTarget, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => {
                    self.editing = None;
                    return true;
                }
                KeyCode::Char('s') => {
                    self.editing = None;
                    self.submit_compose();
                }
                _ => {}
            }
            return false;
        }
        match key.code {
            KeyCode::Esc => {
                self.editing = None;
                self.status_message = Self::focus_status_for(self.focused_pane);
            }
            KeyCode::Enter => {
                self.editing = None;
                match target {
                    EditTarget::BaseUrl => self.reload_posts(),
                    EditTarget::CommentDraft(id) => self.submit_comment(id),
                    EditTarget::SearchValue(_) | EditTarget::Compose(_) => {
                        self.status_message = Self::focus_status_for(self.focused_pane);
                    }
                }
            }
            KeyCode::Backspace => {
                if let Some(buffer) = self.edit_buffer_mut(target) {
                    buffer.pop();
                }
            }
            KeyCode::Char(ch) if !ch.is_control() => match self.edit_buffer_mut(target) {
                Some(buffer) => buffer.push(ch),
                None => {
                    self.editing = None;
                    self.status_message = "That form is gone; posts were reloaded.".to_string();
                }
            },
            _ => {}
        }
        false
    }

    fn handle_settings_key(&mut self, code: KeyCode) {
        let rows = self.settings_rows();
        self.settings_index = self.settings_index.min(rows.len().saturating_sub(1));
        match code {
            KeyCode::Char('j') | KeyCode::Down => {
                if self.settings_index + 1 < rows.len() {
                    self.settings_index += 1;
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.settings_index = self.settings_index.saturating_sub(1);
            }
            KeyCode::Char(' ') => {
                if let Some(SettingsRow::SearchField(field)) = rows.get(self.settings_index) {
                    if let Some(entry) = self.view.search.field_mut(*field) {
                        entry.checked = !entry.checked;
                    }
                } else if let Some(row) = rows.get(self.settings_index).copied() {
                    self.activate_setting(row);
                }
            }
            KeyCode::Enter => {
                if let Some(row) = rows.get(self.settings_index).copied() {
                    self.activate_setting(row);
                }
            }
            _ => {}
        }
    }

    fn activate_setting(&mut self, row: SettingsRow) {
        match row {
            SettingsRow::BaseUrl => self.start_editing(EditTarget::BaseUrl),
            SettingsRow::Mode(panel) => {
                self.view.toggle_mode(panel);
                self.status_message = if self.view.is_active(panel) {
                    format!("{} mode on. Press L to load posts.", panel.title())
                } else {
                    format!("{} mode off. Press L to load all posts.", panel.title())
                };
            }
            SettingsRow::SortField(field) => self.view.sort.select(field),
            SettingsRow::Descending => self.view.sort.descending = !self.view.sort.descending,
            SettingsRow::SearchField(field) => self.start_editing(EditTarget::SearchValue(field)),
            SettingsRow::Load => self.reload_posts(),
        }
    }

    fn handle_posts_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('j') | KeyCode::Down => {
                if self.selected_post + 1 < self.feed.len() {
                    self.selected_post += 1;
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.selected_post = self.selected_post.saturating_sub(1);
            }
            KeyCode::Char('x') | KeyCode::Delete => {
                if let Some(id) = self.selected_block().map(|block| block.id) {
                    self.sync.delete(&self.view, id);
                    self.status_message = format!("Deleting post {id}…");
                }
            }
            KeyCode::Char('l') | KeyCode::Char('+') => {
                if let Some(id) = self.selected_block().map(|block| block.id) {
                    self.sync.like(&self.view, id);
                    self.status_message = format!("Liking post {id}…");
                }
            }
            KeyCode::Char('c') | KeyCode::Enter => {
                if let Some(id) = self.selected_block().map(|block| block.id) {
                    self.feed.toggle_comments(id);
                }
            }
            KeyCode::Char('i') => {
                if let Some(id) = self.selected_block().map(|block| block.id) {
                    self.feed.show_comments(id);
                    self.start_editing(EditTarget::CommentDraft(id));
                }
            }
            _ => {}
        }
    }

    fn handle_compose_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('j') | KeyCode::Down => {
                if self.compose_index + 1 < COMPOSE_ROWS.len() {
                    self.compose_index += 1;
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.compose_index = self.compose_index.saturating_sub(1);
            }
            KeyCode::Enter => match COMPOSE_ROWS[self.compose_index.min(COMPOSE_ROWS.len() - 1)] {
                ComposeRow::Field(field) => self.start_editing(EditTarget::Compose(field)),
                ComposeRow::Submit => self.submit_compose(),
            },
            _ => {}
        }
    }

    fn submit_compose(&mut self) {
        if self.view.base_url.trim().is_empty() {
            self.status_message = "Enter the API base address first.".to_string();
            return;
        }
        self.sync.create(&mut self.view);
        self.compose_index = 0;
        self.status_message = "Publishing post…".to_string();
    }

    fn submit_comment(&mut self, id: i64) {
        let text = self.feed.draft(id).unwrap_or_default().to_string();
        self.sync.comment(&self.view, id, text);
        self.status_message = format!("Sending comment on post {id}…");
    }

    fn draw(&self, frame: &mut Frame<'_>) {
        let full = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), full);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        let status_text = if self.sync.is_loading() {
            format!("{} {}", self.spinner.frame(), self.status_message)
        } else {
            self.status_message.clone()
        };
        let status_color = if self.status_message.starts_with("Failed") {
            COLOR_ERROR
        } else {
            COLOR_TEXT_PRIMARY
        };
        let status_line = Paragraph::new(status_text).style(
            Style::default()
                .fg(status_color)
                .bg(COLOR_PANEL_FOCUSED_BG)
                .add_modifier(Modifier::BOLD),
        );
        frame.render_widget(status_line, layout[0]);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(36), Constraint::Percentage(64)])
            .split(layout[1]);
        let left = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(COMPOSE_HEIGHT)])
            .split(columns[0]);

        self.draw_settings(frame, left[0]);
        self.draw_compose(frame, left[1]);
        self.draw_posts(frame, columns[1]);

        let footer = Paragraph::new(self.footer_text())
            .style(
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .bg(COLOR_PANEL_BG)
                    .add_modifier(Modifier::ITALIC),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(footer, layout[2]);
    }

    fn pane_block(&self, pane: Pane) -> Block<'static> {
        let focused = self.focused_pane == pane;
        let border_style = if focused {
            Style::default().fg(COLOR_BORDER_FOCUSED)
        } else {
            Style::default().fg(COLOR_BORDER_IDLE)
        };
        let title_style = if focused {
            Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(COLOR_TEXT_SECONDARY)
        };
        Block::default()
            .title(Span::styled(pane.title(), title_style))
            .borders(Borders::ALL)
            .border_style(border_style)
            .style(Style::default().bg(COLOR_PANEL_BG))
            .padding(Padding::horizontal(1))
    }

    fn field_text(&self, target: EditTarget, value: &str) -> String {
        if self.editing == Some(target) {
            format!("{value}{CURSOR}")
        } else if value.is_empty() {
            "(empty)".to_string()
        } else {
            value.to_string()
        }
    }

    fn draw_settings(&self, frame: &mut Frame<'_>, area: Rect) {
        let block = self.pane_block(Pane::Settings);
        let focused = self.focused_pane == Pane::Settings;
        let rows = self.settings_rows();
        let selected = self.settings_index.min(rows.len().saturating_sub(1));

        let mut lines: Vec<Line<'static>> = Vec::with_capacity(rows.len() + 2);
        for (index, row) in rows.iter().enumerate() {
            let active = focused && index == selected;
            let marker_style = if active {
                Style::default()
                    .fg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(COLOR_TEXT_SECONDARY)
            };
            let label_style = if active {
                Style::default()
                    .fg(COLOR_TEXT_PRIMARY)
                    .bg(COLOR_PANEL_SELECTED_BG)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(COLOR_TEXT_PRIMARY)
            };
            let label = match row {
                SettingsRow::BaseUrl => format!(
                    "API: {}",
                    self.field_text(EditTarget::BaseUrl, &self.view.base_url)
                ),
                SettingsRow::Mode(panel) => format!(
                    "{} {}",
                    checkbox(self.view.is_active(*panel)),
                    panel.title()
                ),
                SettingsRow::SortField(field) => format!(
                    "  {} {}",
                    radio(self.view.sort.selected() == Some(*field)),
                    field.display_name()
                ),
                SettingsRow::Descending => {
                    format!("  {} Descending", checkbox(self.view.sort.descending))
                }
                SettingsRow::SearchField(field) => {
                    let (checked, value) = self
                        .view
                        .search
                        .fields
                        .iter()
                        .find(|entry| entry.field == *field)
                        .map(|entry| (entry.checked, entry.value.as_str()))
                        .unwrap_or((false, ""));
                    format!(
                        "  {} {}: {}",
                        checkbox(checked),
                        field.display_name(),
                        self.field_text(EditTarget::SearchValue(*field), value)
                    )
                }
                SettingsRow::Load => "[ Load posts ]".to_string(),
            };
            if matches!(row, SettingsRow::Load | SettingsRow::Mode(ParamPanel::Sort)) {
                lines.push(Line::default());
            }
            lines.push(Line::from(vec![
                Span::styled(if active { "> " } else { "  " }, marker_style),
                Span::styled(label, label_style),
            ]));
        }

        let paragraph = Paragraph::new(Text::from(lines))
            .block(block)
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }

    fn draw_compose(&self, frame: &mut Frame<'_>, area: Rect) {
        let block = self.pane_block(Pane::Compose);
        let focused = self.focused_pane == Pane::Compose;
        let selected = self.compose_index.min(COMPOSE_ROWS.len() - 1);

        let mut lines: Vec<Line<'static>> = Vec::with_capacity(COMPOSE_ROWS.len() + 1);
        for (index, row) in COMPOSE_ROWS.iter().enumerate() {
            let active = focused && index == selected;
            let style = if active {
                Style::default()
                    .fg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(COLOR_TEXT_PRIMARY)
            };
            let indicator = if active { "> " } else { "  " };
            match row {
                ComposeRow::Field(field) => {
                    let value = self.field_text(
                        EditTarget::Compose(*field),
                        self.view.compose.value(*field),
                    );
                    lines.push(Line::from(vec![
                        Span::styled(indicator, style),
                        Span::styled(format!("{}: ", field.title()), style),
                        Span::styled(value, Style::default().fg(COLOR_TEXT_SECONDARY)),
                    ]));
                }
                ComposeRow::Submit => {
                    let button_style = if active {
                        style.add_modifier(Modifier::REVERSED)
                    } else {
                        Style::default().fg(COLOR_SUCCESS)
                    };
                    lines.push(Line::default());
                    lines.push(Line::from(vec![
                        Span::styled(indicator, style),
                        Span::styled("[ Publish ]", button_style),
                    ]));
                }
            }
        }

        let paragraph = Paragraph::new(Text::from(lines))
            .block(block)
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }

    fn draw_posts(&self, frame: &mut Frame<'_>, area: Rect) {
        let block = self.pane_block(Pane::Posts);
        let inner = block.inner(area);
        let width = inner.width.max(1) as usize;
        let focused = self.focused_pane == Pane::Posts;

        if self.feed.is_empty() {
            let message = if self.view.base_url.trim().is_empty() {
                "No API address yet. Set one under Settings and press Enter."
            } else {
                "No posts to show. Press r to reload."
            };
            let paragraph = Paragraph::new(message)
                .style(Style::default().fg(COLOR_TEXT_SECONDARY))
                .block(block)
                .wrap(Wrap { trim: true });
            frame.render_widget(paragraph, area);
            return;
        }

        let rendered: Vec<Vec<Line<'static>>> = self
            .feed
            .blocks()
            .iter()
            .enumerate()
            .map(|(index, post)| {
                let selected = index == self.selected_post;
                let editing = self.editing == Some(EditTarget::CommentDraft(post.id));
                let mut lines = post_block_lines(post, width, selected && focused, editing);
                pad_lines_to_width(&mut lines, inner.width);
                lines
            })
            .collect();
        let heights: Vec<usize> = rendered.iter().map(Vec::len).collect();
        let offset = scroll_offset(
            self.post_offset.get(),
            self.selected_post,
            &heights,
            inner.height as usize,
        );
        self.post_offset.set(offset);

        let lines: Vec<Line<'static>> = rendered.into_iter().skip(offset).flatten().collect();
        let paragraph = Paragraph::new(Text::from(lines)).block(block);
        frame.render_widget(paragraph, area);
    }

    fn footer_text(&self) -> String {
        if self.editing.is_some() {
            return "Editing: type to insert · Backspace delete · Enter confirm · Esc stop"
                .to_string();
        }
        let mut parts: Vec<String> = vec!["Tab switch pane".to_string()];
        match self.focused_pane {
            Pane::Settings => {
                parts.push("j/k move".to_string());
                parts.push("Enter edit/toggle".to_string());
                parts.push("Space check search field".to_string());
            }
            Pane::Posts => {
                parts.push("j/k move".to_string());
                parts.push("x delete · l like · c comments · i comment".to_string());
            }
            Pane::Compose => {
                parts.push("Enter edit".to_string());
                parts.push("Ctrl-S publish".to_string());
            }
        }
        parts.push("r reload".to_string());
        parts.push(format!("config {}", self.config_path));
        parts.push("q quit".to_string());
        parts.join(" · ")
    }
}

fn checkbox(checked: bool) -> &'static str {
    if checked {
        "[x]"
    } else {
        "[ ]"
    }
}

fn radio(checked: bool) -> &'static str {
    if checked {
        "(•)"
    } else {
        "( )"
    }
}

/// Lines for one post block followed by its comment panel when visible.
fn post_block_lines(
    post: &PostBlock,
    width: usize,
    highlight: bool,
    editing_draft: bool,
) -> Vec<Line<'static>> {
    let background = if highlight {
        COLOR_PANEL_SELECTED_BG
    } else {
        COLOR_PANEL_BG
    };
    let title_style = Style::default()
        .fg(COLOR_ACCENT)
        .bg(background)
        .add_modifier(Modifier::BOLD);
    let meta_style = Style::default()
        .fg(COLOR_TEXT_SECONDARY)
        .bg(background)
        .add_modifier(Modifier::ITALIC);
    let body_style = Style::default().fg(COLOR_TEXT_PRIMARY).bg(background);
    let action_style = Style::default().fg(COLOR_SUCCESS).bg(background);

    let mut lines = wrap_plain(&format!("#{} {}", post.id, post.title), width, title_style);
    lines.extend(wrap_plain(&format!("Author: {}", post.author), width, meta_style));
    lines.extend(wrap_plain(&format!("Publish date: {}", post.date), width, meta_style));
    lines.extend(wrap_plain(&post.content, width, body_style));
    lines.push(Line::from(vec![
        Span::styled("[x] Delete   ", action_style),
        Span::styled(format!("{} {ICON_LIKES} ", post.likes), action_style),
        Span::styled("(l)   ", meta_style),
        Span::styled(format!("{} {ICON_COMMENTS} ", post.comment_count), action_style),
        Span::styled("(c)", meta_style),
    ]));

    if !post.panel.hidden {
        let comment_style = Style::default().fg(COLOR_TEXT_SECONDARY).bg(background);
        for comment in &post.panel.comments {
            lines.extend(wrap_with_prefixes(comment, width, "  │ ", "  │ ", comment_style));
        }
        let draft = if editing_draft {
            format!("{}{CURSOR}", post.panel.form.draft)
        } else if post.panel.form.draft.is_empty() {
            "Enter your comment (i)".to_string()
        } else {
            post.panel.form.draft.clone()
        };
        lines.extend(wrap_with_prefixes(&draft, width, "  ✎ ", "    ", body_style));
        lines.push(Line::from(Span::styled("    [ Submit comment ]", action_style)));
    }

    lines.push(Line::from(Span::styled(String::new(), Style::default().bg(COLOR_PANEL_BG))));
    lines
}

/// First block to draw so that `selected` fits in `view_height` rows.
fn scroll_offset(current: usize, selected: usize, heights: &[usize], view_height: usize) -> usize {
    if heights.is_empty() {
        return 0;
    }
    let selected = selected.min(heights.len() - 1);
    let mut offset = current.min(selected);
    if view_height == 0 {
        return selected;
    }
    while offset < selected && heights[offset..=selected].iter().sum::<usize>() > view_height {
        offset += 1;
    }
    offset
}

fn wrap_with_prefixes(
    text: &str,
    width: usize,
    first_prefix: &str,
    rest_prefix: &str,
    style: Style,
) -> Vec<Line<'static>> {
    if text.trim().is_empty() {
        return vec![Line::from(Span::styled(first_prefix.to_string(), style))];
    }

    let min_width = first_prefix
        .chars()
        .count()
        .max(rest_prefix.chars().count())
        .saturating_add(1);
    let wrap_width = width.max(min_width);
    let options = WrapOptions::new(wrap_width)
        .break_words(true)
        .initial_indent(first_prefix)
        .subsequent_indent(rest_prefix);

    wrap(text, options)
        .into_iter()
        .map(|cow| Line::from(Span::styled(cow.into_owned(), style)))
        .collect()
}

fn wrap_plain(text: &str, width: usize, style: Style) -> Vec<Line<'static>> {
    wrap_with_prefixes(text, width, "", "", style)
}

fn pad_lines_to_width(lines: &mut [Line<'static>], width: u16) {
    let width = width as usize;
    if width == 0 {
        return;
    }

    for line in lines {
        let current_width: usize = line
            .spans
            .iter()
            .map(|span| UnicodeWidthStr::width(span.content.as_ref()))
            .sum();
        if current_width >= width {
            continue;
        }
        let pad_style = line.spans.last().map(|span| span.style).unwrap_or_default();
        let padding = " ".repeat(width - current_width);
        line.spans.push(Span::styled(padding, pad_style));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::blog::{NewPost, Post};
    use crate::data::{MutationService, PostService};

    #[derive(Default)]
    struct Offline {
        lists: Mutex<Vec<String>>,
    }

    impl PostService for Offline {
        fn list_posts(&self, base: &str, query: &str) -> Result<Vec<Post>> {
            self.lists.lock().push(format!("{base}/posts{query}"));
            Ok(Vec::new())
        }
    }

    impl MutationService for Offline {
        fn create_post(&self, _base: &str, _post: &NewPost) -> Result<Post> {
            Ok(Post::default())
        }

        fn delete_post(&self, _base: &str, _id: i64) -> Result<()> {
            Ok(())
        }

        fn like_post(&self, _base: &str, _id: i64) -> Result<()> {
            Ok(())
        }

        fn add_comment(&self, _base: &str, _id: i64, _comment: &str) -> Result<Post> {
            Ok(Post::default())
        }
    }

    fn model_with(service: &Arc<Offline>, base_url: &str, initial_fetch: bool) -> Model {
        Model::new(Options {
            status_message: String::new(),
            view: ViewState::with_base_url(base_url),
            synchronizer: Synchronizer::new(service.clone(), service.clone(), None),
            initial_fetch,
            config_path: "~/.config/blog-tui/config.yaml".into(),
        })
    }

    fn model(base_url: &str) -> Model {
        model_with(&Arc::new(Offline::default()), base_url, false)
    }

    fn press(model: &mut Model, code: KeyCode) -> bool {
        model
            .handle_key(KeyEvent::new(code, KeyModifiers::NONE))
            .unwrap()
    }

    fn type_text(model: &mut Model, text: &str) {
        for ch in text.chars() {
            press(model, KeyCode::Char(ch));
        }
    }

    fn text_of(lines: &[Line<'_>]) -> String {
        lines
            .iter()
            .map(|line| {
                line.spans
                    .iter()
                    .map(|span| span.content.as_ref())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn sample_post(id: i64) -> Post {
        Post {
            id,
            title: "Hello".into(),
            author: "Jane".into(),
            date: "2024-09-05".into(),
            content: "Body text".into(),
            likes: None,
            comments: None,
        }
    }

    #[test]
    fn pad_lines_extends_to_width() {
        let mut lines = vec![Line::from(vec![Span::raw("abc")])];
        pad_lines_to_width(&mut lines, 6);
        assert_eq!(lines[0].spans.len(), 2);
        assert_eq!(lines[0].spans[1].content.as_ref(), "   ");
    }

    #[test]
    fn pad_lines_does_not_shorten() {
        let mut lines = vec![Line::from(vec![Span::raw("abcdef")])];
        pad_lines_to_width(&mut lines, 4);
        assert_eq!(lines[0].spans.len(), 1);
    }

    #[test]
    fn scroll_offset_keeps_selection_in_view() {
        let heights = [4, 4, 4, 4];
        assert_eq!(scroll_offset(0, 0, &heights, 10), 0);
        assert_eq!(scroll_offset(0, 3, &heights, 10), 2);
        assert_eq!(scroll_offset(3, 1, &heights, 10), 1);
        assert_eq!(scroll_offset(0, 0, &[], 10), 0);
    }

    #[test]
    fn block_shows_zero_counts_and_hides_panel() {
        let mut feed = Feed::default();
        feed.replace(vec![sample_post(4)]);
        let block = feed.get(0).unwrap();
        let text = text_of(&post_block_lines(block, 60, false, false));
        assert!(text.contains("#4 Hello"));
        assert!(text.contains("Author: Jane"));
        assert!(text.contains(&format!("0 {ICON_LIKES}")));
        assert!(text.contains(&format!("0 {ICON_COMMENTS}")));
        assert!(!text.contains("Submit comment"));
    }

    #[test]
    fn open_panel_lists_comments_then_form() {
        let mut post = sample_post(4);
        post.comments = Some(vec!["first!".into()]);
        let mut feed = Feed::default();
        feed.replace(vec![post]);
        feed.toggle_comments(4);
        let text = text_of(&post_block_lines(feed.get(0).unwrap(), 60, false, false));
        let comment_at = text.find("│ first!").unwrap();
        let form_at = text.find("Submit comment").unwrap();
        assert!(comment_at < form_at);
    }

    #[test]
    fn compose_submit_clears_fields() {
        let mut model = model("http://api");
        press(&mut model, KeyCode::BackTab);
        assert_eq!(model.focused_pane, Pane::Compose);

        press(&mut model, KeyCode::Enter);
        type_text(&mut model, "Hello");
        press(&mut model, KeyCode::Enter);
        press(&mut model, KeyCode::Down);
        press(&mut model, KeyCode::Enter);
        type_text(&mut model, "Jane");
        press(&mut model, KeyCode::Enter);
        assert_eq!(model.view.compose.title, "Hello");
        assert_eq!(model.view.compose.author, "Jane");

        model
            .handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL))
            .unwrap();
        assert!(model.view.compose.is_empty());
        assert!(model.sync.is_loading());
    }

    #[test]
    fn comment_toggle_pair_restores_panel() {
        let mut model = model("http://api");
        model.feed.replace(vec![sample_post(1), sample_post(2)]);
        model.focused_pane = Pane::Posts;
        press(&mut model, KeyCode::Char('j'));
        press(&mut model, KeyCode::Char('c'));
        assert!(!model.feed.find(2).unwrap().panel.hidden);
        press(&mut model, KeyCode::Char('c'));
        assert!(model.feed.find(2).unwrap().panel.hidden);
        assert!(model.feed.find(1).unwrap().panel.hidden);
    }

    #[test]
    fn comment_draft_is_scoped_to_post() {
        let mut model = model("http://api");
        model.feed.replace(vec![sample_post(1), sample_post(2)]);
        model.focused_pane = Pane::Posts;
        press(&mut model, KeyCode::Char('i'));
        type_text(&mut model, "nice");
        assert_eq!(model.editing, Some(EditTarget::CommentDraft(1)));
        assert_eq!(model.feed.draft(1), Some("nice"));
        assert_eq!(model.feed.draft(2), Some(""));
        press(&mut model, KeyCode::Esc);
        assert_eq!(model.editing, None);
    }

    #[test]
    fn settings_toggle_shows_matching_panel() {
        let mut model = model("http://api");
        press(&mut model, KeyCode::Down);
        press(&mut model, KeyCode::Enter);
        assert!(model.view.is_active(ParamPanel::Sort));
        assert!(model.settings_rows().contains(&SettingsRow::Descending));

        press(&mut model, KeyCode::Down);
        press(&mut model, KeyCode::Enter);
        assert!(model.view.is_active(ParamPanel::Search));
        let rows = model.settings_rows();
        assert!(!rows.contains(&SettingsRow::Descending));
        assert!(rows.contains(&SettingsRow::SearchField(PostField::Author)));
    }

    #[test]
    fn empty_base_address_does_not_fetch() {
        let mut model = model("");
        press(&mut model, KeyCode::Char('r'));
        assert!(!model.sync.is_loading());
        assert_eq!(model.sync.generation(), 0);
        assert!(model.status_message.contains("base address"));
    }

    #[test]
    fn restored_address_triggers_one_initial_fetch() {
        let service = Arc::new(Offline::default());
        let mut model = model_with(&service, "http://localhost:5002/api", true);
        assert_eq!(model.sync.generation(), 1);
        assert!(model.sync.is_loading());
        assert_eq!(model.focused_pane, Pane::Posts);
        assert_eq!(model.view.base_url, "http://localhost:5002/api");

        let event = model
            .sync
            .next_timeout(Duration::from_secs(5))
            .expect("initial fetch result");
        model.sync.handle(event, &model.view, &mut model.feed);
        assert!(!model.sync.is_loading());
        assert_eq!(
            *service.lists.lock(),
            vec!["http://localhost:5002/api/posts".to_string()]
        );
    }

    #[test]
    fn no_initial_fetch_without_flag() {
        let service = Arc::new(Offline::default());
        let model = model_with(&service, "http://localhost:5002/api", false);
        assert_eq!(model.sync.generation(), 0);
        assert!(!model.sync.is_loading());
        assert_eq!(model.focused_pane, Pane::Settings);
    }

    #[test]
    fn ctrl_c_quits_while_editing() {
        let mut model = model("http://api");
        press(&mut model, KeyCode::Enter);
        assert_eq!(model.editing, Some(EditTarget::BaseUrl));
        let quit = model
            .handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL))
            .unwrap();
        assert!(quit);
        assert_eq!(model.editing, None);
        assert_eq!(model.view.base_url, "http://api");
    }

    #[test]
    fn search_rows_follow_search_input_order() {
        let mut model = model("http://api");
        model.view.toggle_mode(ParamPanel::Search);
        let fields: Vec<PostField> = model
            .settings_rows()
            .into_iter()
            .filter_map(|row| match row {
                SettingsRow::SearchField(field) => Some(field),
                _ => None,
            })
            .collect();
        assert_eq!(fields, PostField::SEARCH_ORDER.to_vec());
    }

    #[test]
    fn quit_keys() {
        let mut model = model("http://api");
        assert!(press(&mut model, KeyCode::Char('q')));
        assert!(model
            .handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL))
            .unwrap());
    }
}
