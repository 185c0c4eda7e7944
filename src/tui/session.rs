//! Session - the view stack controller
//!
//! Owns the single main view, the overlay stack, the header legend and the
//! command bar. Every method here runs on the render thread; other threads
//! reach the session only through the [`Dispatcher`].
//!
//! ```text
//! ┌ header: info │ key bindings ───────────────┐
//! │ main view content                          │
//! │        ┌ overlays (modal, message, alert) ┐│
//! │        └──────────────────────────────────┘│
//! └ command bar ───────────────────────────────┘
//! ```
//!
//! Overlays are kept in insertion order; the last one is on top and receives
//! all input. There is at most one modal: showing a second replaces the first.
//!
//! Contents receive `&mut Session` while handling keys. To allow that, a
//! content is taken out of its slot for the duration of the call and put back
//! afterwards, unless the slot was replaced or closed in between.

use std::panic::{self, AssertUnwindSafe};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Layout, Position, Rect},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::dispatch::{Callback, Dispatcher, OverlayId};
use super::events::{global_action, plain_char, Action};
use super::theme::Theme;
use super::view::{Content, Info, KeyBinding, Scope, Slot, View};
use super::widgets::utils::{centered_fixed, centered_rect, text_width};
use crate::config::Config;
use crate::error::CsqlError;

/// Maximum legend rows in the header
const MAX_LEGEND_ROWS: usize = 5;
const LEGEND_COLUMN_WIDTH: u16 = 28;

/// Which part of the main screen receives keys when no overlay is open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Content,
    CommandBar,
}

/// Header state, rebuilt from the main view
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    pub info: Vec<Info>,
    pub key_bindings: Vec<KeyBinding>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    Modal,
    Message,
    Alert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertButton {
    Confirm,
    Cancel,
}

impl AlertButton {
    fn toggle(self) -> Self {
        match self {
            AlertButton::Confirm => AlertButton::Cancel,
            AlertButton::Cancel => AlertButton::Confirm,
        }
    }
}

/// Focus and shortcut state saved while a modal is open
#[derive(Debug, Clone, Copy)]
struct SavedInput {
    focus: Focus,
    global_capture: bool,
}

struct MainView {
    id: u64,
    title: String,
    view: Option<Box<dyn View>>,
    content: Option<Box<dyn Content>>,
    token: CancellationToken,
}

struct Modal {
    id: OverlayId,
    title: String,
    key_bindings: Vec<KeyBinding>,
    view: Option<Box<dyn View>>,
    content: Option<Box<dyn Content>>,
    token: CancellationToken,
    saved: SavedInput,
}

struct Alert {
    id: OverlayId,
    text: String,
    on_confirm: Callback,
    on_cancel: Callback,
    selected: AlertButton,
}

enum Overlay {
    Modal(Modal),
    Message { id: OverlayId, text: String, wait: bool },
    Alert(Alert),
}

impl Overlay {
    fn id(&self) -> OverlayId {
        match self {
            Overlay::Modal(modal) => modal.id,
            Overlay::Message { id, .. } => *id,
            Overlay::Alert(alert) => alert.id,
        }
    }

    fn kind(&self) -> OverlayKind {
        match self {
            Overlay::Modal(_) => OverlayKind::Modal,
            Overlay::Message { .. } => OverlayKind::Message,
            Overlay::Alert(_) => OverlayKind::Alert,
        }
    }
}

#[derive(Debug, Default)]
struct CommandBar {
    input: String,
}

pub struct Session {
    /// Persisted configuration, handed to views explicitly
    pub config: Config,
    dispatcher: Dispatcher,
    main: Option<MainView>,
    next_main_id: u64,
    overlays: Vec<Overlay>,
    header: Header,
    command_bar: CommandBar,
    focus: Focus,
    global_capture: bool,
    should_quit: bool,
}

impl Session {
    pub fn new(config: Config, dispatcher: Dispatcher) -> Self {
        Self {
            config,
            dispatcher,
            main: None,
            next_main_id: 1,
            overlays: Vec::new(),
            header: Header::default(),
            command_bar: CommandBar::default(),
            focus: Focus::Content,
            global_capture: true,
            should_quit: false,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    // ─────────────────────────────────────────────────────────────────────
    // Main view
    // ─────────────────────────────────────────────────────────────────────

    /// Replace the main view.
    ///
    /// Cancels the previous view's scope, rebuilds the header, builds the
    /// new content exactly once and focuses it.
    pub fn set_view(&mut self, mut view: Box<dyn View>) {
        if let Some(previous) = self.main.take() {
            previous.token.cancel();
            debug!(title = %previous.title, "leaving view");
        }

        let id = self.next_main_id;
        self.next_main_id += 1;
        let token = CancellationToken::new();
        let title = view.title();
        info!(%title, "entering view");

        self.header = Header {
            info: view.info(),
            key_bindings: view.key_bindings(),
        };
        self.main = Some(MainView {
            id,
            title,
            view: None,
            content: None,
            token: token.clone(),
        });
        self.command_bar.input.clear();
        if !self.has_modal() {
            self.focus = Focus::Content;
        }

        let scope = Scope::new(Slot::Main(id), token, self.dispatcher.clone());
        let content = view.content(self, &scope);

        match self.main.as_mut().filter(|m| m.id == id) {
            Some(main) => {
                main.view = Some(view);
                main.content = Some(content);
            }
            // content() replaced the view itself
            None => debug!("view replaced while building its content"),
        }
    }

    pub fn main_title(&self) -> Option<&str> {
        self.main.as_ref().map(|m| m.title.as_str())
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Re-read info and key bindings from the main view
    pub fn refresh_header(&mut self) {
        if let Some(view) = self.main.as_ref().and_then(|m| m.view.as_ref()) {
            self.header = Header {
                info: view.info(),
                key_bindings: view.key_bindings(),
            };
        }
    }

    /// Forward command bar text to the main view
    pub fn execute_command(&mut self, command: &str) {
        let command = command.trim();
        if command.is_empty() {
            return;
        }
        let Some(main) = self.main.as_mut() else {
            return;
        };
        let id = main.id;
        let Some(mut view) = main.view.take() else {
            return;
        };

        debug!(%command, "executing command");
        let result = view.execute_command(self, command);

        if let Some(main) = self.main.as_mut().filter(|m| m.id == id) {
            main.view = Some(view);
        }
        if let Err(err) = result {
            self.show_error(&err);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Modal
    // ─────────────────────────────────────────────────────────────────────

    /// Show `view` in a centered overlay, replacing any open modal
    pub fn show_modal(&mut self, mut view: Box<dyn View>) -> OverlayId {
        let saved = match self.take_modal() {
            Some(previous) => {
                previous.token.cancel();
                previous.saved
            }
            None => SavedInput {
                focus: self.focus,
                global_capture: self.global_capture,
            },
        };

        let id = self.dispatcher.next_overlay_id();
        let token = CancellationToken::new();
        let mut key_bindings = view.key_bindings();
        key_bindings.push(KeyBinding::new("<esc>", "Close"));

        self.focus = Focus::Content;
        self.global_capture = false;
        self.overlays.push(Overlay::Modal(Modal {
            id,
            title: view.title(),
            key_bindings,
            view: None,
            content: None,
            token: token.clone(),
            saved,
        }));

        let scope = Scope::new(Slot::Overlay(id), token, self.dispatcher.clone());
        let content = view.content(self, &scope);
        match self.modal_mut(id) {
            Some(modal) => {
                modal.view = Some(view);
                modal.content = Some(content);
            }
            None => debug!(%id, "modal closed while building its content"),
        }
        id
    }

    /// Close the modal and restore the input state saved when it opened.
    /// No-op without a modal.
    pub fn close_modal(&mut self) {
        if let Some(modal) = self.take_modal() {
            modal.token.cancel();
            self.focus = modal.saved.focus;
            self.global_capture = modal.saved.global_capture;
            debug!(id = %modal.id, title = %modal.title, "modal closed");
        }
    }

    pub fn has_modal(&self) -> bool {
        self.overlays.iter().any(|o| matches!(o, Overlay::Modal(_)))
    }

    pub fn modal_title(&self) -> Option<&str> {
        self.overlays.iter().find_map(|o| match o {
            Overlay::Modal(modal) => Some(modal.title.as_str()),
            _ => None,
        })
    }

    fn take_modal(&mut self) -> Option<Modal> {
        let index = self
            .overlays
            .iter()
            .position(|o| matches!(o, Overlay::Modal(_)))?;
        match self.overlays.remove(index) {
            Overlay::Modal(modal) => Some(modal),
            _ => None,
        }
    }

    fn modal_mut(&mut self, id: OverlayId) -> Option<&mut Modal> {
        self.overlays.iter_mut().find_map(|o| match o {
            Overlay::Modal(modal) if modal.id == id => Some(modal),
            _ => None,
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Messages and alerts
    // ─────────────────────────────────────────────────────────────────────

    /// Show a message. With `wait` it has an OK button and Enter or Escape
    /// dismisses it; otherwise it swallows input until closed by id.
    pub fn show_message(&mut self, text: impl Into<String>, wait: bool) -> OverlayId {
        let id = self.dispatcher.next_overlay_id();
        self.insert_message(id, text.into(), wait);
        id
    }

    /// Thread-safe variant, see [`Dispatcher::show_message_async`]
    pub fn show_message_async(&self, text: impl Into<String>, wait: bool) -> OverlayId {
        self.dispatcher.show_message_async(text, wait)
    }

    pub(crate) fn insert_message(&mut self, id: OverlayId, text: String, wait: bool) {
        debug!(%id, wait, "show message");
        self.overlays.push(Overlay::Message { id, text, wait });
    }

    /// Remove the addressed message. Unknown or closed ids are ignored.
    pub fn close_message(&mut self, id: OverlayId) {
        self.overlays
            .retain(|o| !matches!(o, Overlay::Message { id: mid, .. } if *mid == id));
    }

    pub fn close_message_async(&self, id: OverlayId) {
        self.dispatcher.close_message_async(id);
    }

    /// Show a blocking error message
    pub fn show_error(&mut self, err: &CsqlError) {
        warn!(error = %err, "showing error");
        self.show_message(err.to_string(), true);
    }

    /// Ask for confirmation. Exactly one callback fires, after the alert has
    /// been removed.
    pub fn show_alert<C, X>(&mut self, text: impl Into<String>, on_confirm: C, on_cancel: X) -> OverlayId
    where
        C: FnOnce(&mut Session) + Send + 'static,
        X: FnOnce(&mut Session) + Send + 'static,
    {
        let id = self.dispatcher.next_overlay_id();
        self.insert_alert(id, text.into(), Box::new(on_confirm), Box::new(on_cancel));
        id
    }

    pub fn show_alert_async<C, X>(&self, text: impl Into<String>, on_confirm: C, on_cancel: X) -> OverlayId
    where
        C: FnOnce(&mut Session) + Send + 'static,
        X: FnOnce(&mut Session) + Send + 'static,
    {
        self.dispatcher.show_alert_async(text, on_confirm, on_cancel)
    }

    pub(crate) fn insert_alert(
        &mut self,
        id: OverlayId,
        text: String,
        on_confirm: Callback,
        on_cancel: Callback,
    ) {
        debug!(%id, "show alert");
        self.overlays.push(Overlay::Alert(Alert {
            id,
            text,
            on_confirm,
            on_cancel,
            selected: AlertButton::Confirm,
        }));
    }

    fn resolve_alert(&mut self, id: OverlayId, button: AlertButton) {
        let Some(index) = self.overlays.iter().position(|o| o.id() == id) else {
            return;
        };
        if let Overlay::Alert(alert) = self.overlays.remove(index) {
            debug!(%id, ?button, "alert resolved");
            match button {
                AlertButton::Confirm => (alert.on_confirm)(self),
                AlertButton::Cancel => (alert.on_cancel)(self),
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Overlay introspection
    // ─────────────────────────────────────────────────────────────────────

    pub fn overlay_count(&self) -> usize {
        self.overlays.len()
    }

    pub fn has_overlay(&self, id: OverlayId) -> bool {
        self.overlays.iter().any(|o| o.id() == id)
    }

    pub fn overlay_kind(&self, id: OverlayId) -> Option<OverlayKind> {
        self.overlays.iter().find(|o| o.id() == id).map(Overlay::kind)
    }

    /// The overlay receiving input
    pub fn top_overlay(&self) -> Option<(OverlayId, OverlayKind)> {
        self.overlays.last().map(|o| (o.id(), o.kind()))
    }

    /// Text of a message or alert overlay
    pub fn overlay_text(&self, id: OverlayId) -> Option<&str> {
        self.overlays.iter().find_map(|o| match o {
            Overlay::Message { id: mid, text, .. } if *mid == id => Some(text.as_str()),
            Overlay::Alert(alert) if alert.id == id => Some(alert.text.as_str()),
            _ => None,
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Content access
    // ─────────────────────────────────────────────────────────────────────

    /// Run `f` with the content in `slot` taken out of the session. The
    /// content goes back into its slot even if `f` panics; the panic then
    /// continues to the caller.
    fn with_dyn_content<R>(
        &mut self,
        slot: Slot,
        f: impl FnOnce(&mut dyn Content, &mut Session) -> R,
    ) -> Option<R> {
        let mut content = self.take_content(slot)?;
        let result = panic::catch_unwind(AssertUnwindSafe(|| f(content.as_mut(), self)));
        self.restore_content(slot, content);
        match result {
            Ok(result) => Some(result),
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Run `f` against the content in `slot` if it is a `C`.
    /// Returns false if the slot is gone or holds another type.
    pub fn with_content<C, F>(&mut self, slot: Slot, f: F) -> bool
    where
        C: Content,
        F: FnOnce(&mut C, &mut Session),
    {
        self.with_dyn_content(slot, |content, session| {
            match content.as_any_mut().downcast_mut::<C>() {
                Some(content) => {
                    f(content, session);
                    true
                }
                None => false,
            }
        })
        .unwrap_or(false)
    }

    /// Main content downcast to `C`
    pub fn main_content_mut<C: Content>(&mut self) -> Option<&mut C> {
        self.main
            .as_mut()?
            .content
            .as_mut()?
            .as_any_mut()
            .downcast_mut::<C>()
    }

    /// Modal content downcast to `C`
    pub fn modal_content_mut<C: Content>(&mut self) -> Option<&mut C> {
        self.overlays.iter_mut().find_map(|o| match o {
            Overlay::Modal(modal) => modal.content.as_mut()?.as_any_mut().downcast_mut::<C>(),
            _ => None,
        })
    }

    fn take_content(&mut self, slot: Slot) -> Option<Box<dyn Content>> {
        match slot {
            Slot::Main(id) => self.main.as_mut().filter(|m| m.id == id)?.content.take(),
            Slot::Overlay(id) => self.modal_mut(id)?.content.take(),
        }
    }

    fn restore_content(&mut self, slot: Slot, content: Box<dyn Content>) {
        let target = match slot {
            Slot::Main(id) => self
                .main
                .as_mut()
                .filter(|m| m.id == id)
                .map(|m| &mut m.content),
            Slot::Overlay(id) => self.modal_mut(id).map(|m| &mut m.content),
        };
        match target {
            Some(target) if target.is_none() => *target = Some(content),
            // The slot was replaced or closed meanwhile; drop the content.
            _ => debug!(?slot, "dropping detached content"),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Input
    // ─────────────────────────────────────────────────────────────────────

    pub fn focus(&self) -> Focus {
        self.focus
    }

    /// Whether session-wide shortcuts are active
    pub fn global_capture(&self) -> bool {
        self.global_capture
    }

    pub fn command_input(&self) -> &str {
        &self.command_bar.input
    }

    pub fn quit(&mut self) {
        info!("quit requested");
        self.should_quit = true;
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Route a key press to the top overlay, the command bar, the global
    /// shortcuts or the main content, in that order.
    pub fn handle_key(&mut self, key: KeyEvent) {
        match self.overlays.last_mut() {
            Some(Overlay::Message { id, wait, .. }) => {
                if *wait && matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
                    let id = *id;
                    self.close_message(id);
                }
                return;
            }
            Some(Overlay::Alert(alert)) => {
                match key.code {
                    KeyCode::Left | KeyCode::Right | KeyCode::Tab | KeyCode::BackTab => {
                        alert.selected = alert.selected.toggle();
                    }
                    KeyCode::Enter => {
                        let (id, button) = (alert.id, alert.selected);
                        self.resolve_alert(id, button);
                    }
                    KeyCode::Esc => {
                        let id = alert.id;
                        self.resolve_alert(id, AlertButton::Cancel);
                    }
                    _ => {}
                }
                return;
            }
            Some(Overlay::Modal(modal)) => {
                if key.code == KeyCode::Esc {
                    self.close_modal();
                } else {
                    let slot = Slot::Overlay(modal.id);
                    self.with_dyn_content(slot, |content, session| {
                        content.handle_key(key, session)
                    });
                }
                return;
            }
            None => {}
        }

        if self.focus == Focus::CommandBar {
            self.handle_command_bar_key(key);
            return;
        }

        let Some(slot) = self.main.as_ref().map(|m| Slot::Main(m.id)) else {
            if global_action(key) == Action::Quit {
                self.quit();
            }
            return;
        };

        let captures = self
            .main
            .as_ref()
            .and_then(|m| m.content.as_ref())
            .is_some_and(|c| c.captures_all_input());
        if self.global_capture && !captures {
            match global_action(key) {
                Action::Quit => return self.quit(),
                Action::FocusCommandBar => {
                    self.focus = Focus::CommandBar;
                    return;
                }
                Action::None => {}
            }
        }

        self.with_dyn_content(slot, |content, session| content.handle_key(key, session));
    }

    fn handle_command_bar_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.command_bar.input.clear();
                self.focus = Focus::Content;
            }
            KeyCode::Enter => {
                let command = std::mem::take(&mut self.command_bar.input);
                self.focus = Focus::Content;
                self.execute_command(&command);
            }
            KeyCode::Backspace => {
                self.command_bar.input.pop();
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.command_bar.input.clear();
                self.focus = Focus::Content;
            }
            _ => {
                if let Some(c) = plain_char(&key) {
                    self.command_bar.input.push(c);
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Rendering
    // ─────────────────────────────────────────────────────────────────────

    pub fn render(&mut self, frame: &mut Frame, theme: &Theme) {
        let legend_rows = self.header.key_bindings.len().min(MAX_LEGEND_ROWS);
        let header_height = self.header.info.len().max(legend_rows).max(1) as u16 + 2;

        let [header_area, main_area, command_area] = Layout::vertical([
            Constraint::Length(header_height),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        self.render_header(frame, header_area, theme);
        self.render_main(frame, main_area, theme);
        self.render_command_bar(frame, command_area, theme);

        let area = frame.area();
        for overlay in &mut self.overlays {
            match overlay {
                Overlay::Modal(modal) => render_modal(frame, area, modal, theme),
                Overlay::Message { text, wait, .. } => render_message(frame, area, text, *wait, theme),
                Overlay::Alert(alert) => render_alert(frame, area, alert, theme),
            }
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme.border())
            .title(Span::styled(" csql ", theme.header()));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let info_width = self
            .header
            .info
            .iter()
            .map(|i| i.key.chars().count() + i.value.chars().count() + 4)
            .max()
            .unwrap_or(0) as u16;
        let [info_area, legend_area] =
            Layout::horizontal([Constraint::Length(info_width.max(24)), Constraint::Min(0)])
                .areas(inner);

        let info_lines: Vec<Line> = self
            .header
            .info
            .iter()
            .map(|i| {
                Line::from(vec![
                    Span::styled(format!("{}: ", i.key), theme.accent()),
                    Span::styled(i.value.clone(), theme.text()),
                ])
            })
            .collect();
        frame.render_widget(Paragraph::new(info_lines), info_area);

        let rows = MAX_LEGEND_ROWS.min(self.header.key_bindings.len()).max(1);
        for (column, chunk) in self.header.key_bindings.chunks(rows).enumerate() {
            let x = legend_area.x + column as u16 * LEGEND_COLUMN_WIDTH;
            if x >= legend_area.right() {
                break;
            }
            let column_area = Rect {
                x,
                width: LEGEND_COLUMN_WIDTH.min(legend_area.right() - x),
                ..legend_area
            };
            frame.render_widget(Paragraph::new(legend_lines(chunk, theme)), column_area);
        }
    }

    fn render_main(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let Some(main) = self.main.as_mut() else {
            return;
        };
        let focused = self.focus == Focus::Content && self.overlays.is_empty();
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme.border_for(focused))
            .title(Span::styled(format!(" {} ", main.title), theme.header()));
        let inner = block.inner(area);
        frame.render_widget(block, area);
        if let Some(content) = main.content.as_mut() {
            content.render(frame, inner, theme);
        }
    }

    fn render_command_bar(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let line = if self.focus == Focus::CommandBar {
            frame.set_cursor_position(Position::new(
                area.x + 1 + self.command_bar.input.chars().count() as u16,
                area.y,
            ));
            Line::from(vec![
                Span::styled("/", theme.accent()),
                Span::styled(self.command_bar.input.clone(), theme.text()),
            ])
        } else {
            Line::from(Span::styled(
                "Press / to enter a command, q to quit",
                theme.dimmed(),
            ))
        };
        frame.render_widget(Paragraph::new(line), area);
    }
}

fn legend_lines<'a>(bindings: &'a [KeyBinding], theme: &Theme) -> Vec<Line<'a>> {
    bindings
        .iter()
        .map(|k| {
            Line::from(vec![
                Span::styled(format!("{} ", k.hint), theme.accent()),
                Span::styled(k.description.as_str(), theme.dimmed()),
            ])
        })
        .collect()
}

fn overlay_block<'a>(title: impl Into<Line<'a>>, theme: &Theme) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(theme.overlay_border())
        .title(title)
}

fn render_modal(frame: &mut Frame, area: Rect, modal: &mut Modal, theme: &Theme) {
    let rect = centered_rect(70, 70, area);
    frame.render_widget(Clear, rect);
    let block = overlay_block(Span::styled(format!(" {} ", modal.title), theme.header()), theme);
    let inner = block.inner(rect);
    frame.render_widget(block, rect);

    let [content_area, legend_area] =
        Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(inner);
    if let Some(content) = modal.content.as_mut() {
        content.render(frame, content_area, theme);
    }
    let legend: Vec<Span> = modal
        .key_bindings
        .iter()
        .flat_map(|k| {
            [
                Span::styled(format!("{} ", k.hint), theme.accent()),
                Span::styled(format!("{}  ", k.description), theme.dimmed()),
            ]
        })
        .collect();
    frame.render_widget(Paragraph::new(Line::from(legend)), legend_area);
}

fn message_rect(area: Rect, text: &str, extra_lines: u16) -> Rect {
    let width = (text_width(text) as u16 + 4).clamp(24, area.width.saturating_sub(4).max(24));
    let inner_width = width.saturating_sub(2).max(1) as usize;
    let wrapped: usize = text
        .lines()
        .map(|l| l.chars().count().div_ceil(inner_width).max(1))
        .sum();
    centered_fixed(width, wrapped.max(1) as u16 + 2 + extra_lines, area)
}

fn render_message(frame: &mut Frame, area: Rect, text: &str, wait: bool, theme: &Theme) {
    let rect = message_rect(area, text, if wait { 2 } else { 0 });
    frame.render_widget(Clear, rect);
    let block = overlay_block(Span::styled(" Message ", theme.header()), theme);
    let inner = block.inner(rect);
    frame.render_widget(block, rect);

    let mut lines: Vec<Line> = text.lines().map(|l| Line::from(l.to_string())).collect();
    if wait {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(" OK ", theme.selected())).centered());
    }
    frame.render_widget(
        Paragraph::new(lines).style(theme.text()).wrap(Wrap { trim: false }),
        inner,
    );
}

fn render_alert(frame: &mut Frame, area: Rect, alert: &Alert, theme: &Theme) {
    let rect = message_rect(area, &alert.text, 2);
    frame.render_widget(Clear, rect);
    let block = overlay_block(Span::styled(" Confirm ", theme.warning()), theme);
    let inner = block.inner(rect);
    frame.render_widget(block, rect);

    let button = |label: &'static str, which: AlertButton| {
        let style = if alert.selected == which {
            theme.selected()
        } else {
            theme.accent()
        };
        Span::styled(label, style)
    };
    let mut lines: Vec<Line> = alert.text.lines().map(|l| Line::from(l.to_string())).collect();
    lines.push(Line::default());
    lines.push(
        Line::from(vec![
            button(" Confirm ", AlertButton::Confirm),
            Span::raw("   "),
            button(" Cancel ", AlertButton::Cancel),
        ])
        .centered(),
    );
    frame.render_widget(
        Paragraph::new(lines).style(theme.text()).wrap(Wrap { trim: false }),
        inner,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::dispatch::{channel, DispatchQueue};
    use ratatui::{backend::TestBackend, Terminal};
    use std::any::Any;

    struct Label(String);

    impl Content for Label {
        fn render(&mut self, frame: &mut Frame, area: Rect, _theme: &Theme) {
            frame.render_widget(Paragraph::new(self.0.as_str()), area);
        }

        fn handle_key(&mut self, key: KeyEvent, _session: &mut Session) {
            if let KeyCode::Char(c) = key.code {
                self.0.push(c);
            }
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    struct Page(&'static str);

    impl View for Page {
        fn title(&self) -> String {
            self.0.to_string()
        }

        fn content(&mut self, _session: &mut Session, _scope: &Scope) -> Box<dyn Content> {
            Box::new(Label(format!("{} body", self.0)))
        }

        fn info(&self) -> Vec<Info> {
            vec![Info::new("Page", self.0)]
        }
    }

    fn session() -> (Session, DispatchQueue) {
        let (dispatcher, queue) = channel();
        (Session::new(Config::default(), dispatcher), queue)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn screen(session: &mut Session) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|f| session.render(f, &Theme::new())).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn test_keys_reach_main_content() {
        let (mut session, _queue) = session();
        session.set_view(Box::new(Page("one")));
        session.handle_key(key(KeyCode::Char('x')));
        assert_eq!(session.main_content_mut::<Label>().unwrap().0, "one bodyx");
    }

    #[test]
    fn test_q_quits_only_without_overlay() {
        let (mut session, _queue) = session();
        session.set_view(Box::new(Page("one")));
        session.show_message("hold on", false);
        session.handle_key(key(KeyCode::Char('q')));
        assert!(!session.should_quit());
        session.handle_key(key(KeyCode::Enter));
        assert_eq!(session.overlay_count(), 1);
    }

    #[test]
    fn test_command_bar_forwards_to_view() {
        let (mut session, _queue) = session();
        session.set_view(Box::new(Page("one")));
        session.handle_key(key(KeyCode::Char('/')));
        assert_eq!(session.focus(), Focus::CommandBar);
        for c in "nope".chars() {
            session.handle_key(key(KeyCode::Char(c)));
        }
        assert_eq!(session.command_input(), "nope");
        session.handle_key(key(KeyCode::Enter));
        assert_eq!(session.focus(), Focus::Content);
        // Default execute_command reports an unknown command
        let (id, kind) = session.top_overlay().unwrap();
        assert_eq!(kind, OverlayKind::Message);
        assert!(session.overlay_text(id).unwrap().contains("nope"));
    }

    #[test]
    fn test_second_modal_replaces_first() {
        let (mut session, _queue) = session();
        session.set_view(Box::new(Page("main")));
        let first = session.show_modal(Box::new(Page("first")));
        let second = session.show_modal(Box::new(Page("second")));
        assert!(!session.has_overlay(first));
        assert!(session.has_overlay(second));
        assert_eq!(session.modal_title(), Some("second"));
        session.close_modal();
        assert!(session.global_capture());
        assert!(!session.has_modal());
    }

    #[test]
    fn test_escape_closes_modal() {
        let (mut session, _queue) = session();
        session.set_view(Box::new(Page("main")));
        session.show_modal(Box::new(Page("modal")));
        session.handle_key(key(KeyCode::Char('z')));
        assert_eq!(session.modal_content_mut::<Label>().unwrap().0, "modal bodyz");
        session.handle_key(key(KeyCode::Esc));
        assert!(!session.has_modal());
        assert_eq!(session.main_content_mut::<Label>().unwrap().0, "main body");
    }

    #[test]
    fn test_render_layers() {
        let (mut session, _queue) = session();
        session.set_view(Box::new(Page("tables")));
        session.show_modal(Box::new(Page("users")));
        session.show_message("Connecting", true);
        let text = screen(&mut session);
        assert!(text.contains("tables body"));
        assert!(text.contains("users"));
        assert!(text.contains("<esc> Close"));
        assert!(text.contains("Connecting"));
        assert!(text.contains("Page: tables"));
    }

    #[test]
    fn test_with_content_wrong_type() {
        let (mut session, _queue) = session();
        session.set_view(Box::new(Page("one")));
        struct Other;
        impl Content for Other {
            fn render(&mut self, _: &mut Frame, _: Rect, _: &Theme) {}
            fn handle_key(&mut self, _: KeyEvent, _: &mut Session) {}
            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }
        }
        assert!(!session.with_content::<Other, _>(Slot::Main(1), |_, _| {}));
        assert!(session.with_content::<Label, _>(Slot::Main(1), |_, _| {}));
        // Still installed after the round trip
        assert!(session.main_content_mut::<Label>().is_some());
    }

    #[test]
    fn test_content_survives_panicking_task() {
        let (mut session, mut queue) = session();
        session.set_view(Box::new(Page("one")));
        session.dispatcher().enqueue(|session| {
            session.with_content::<Label, _>(Slot::Main(1), |label, _| {
                label.0.push('!');
                panic!("boom");
            });
        });
        queue.drain(&mut session);

        let (id, kind) = session.top_overlay().unwrap();
        assert_eq!(kind, OverlayKind::Message);
        assert_eq!(session.overlay_text(id), Some("Internal error: boom"));
        assert_eq!(session.main_content_mut::<Label>().unwrap().0, "one body!");

        session.handle_key(key(KeyCode::Esc));
        assert_eq!(session.overlay_count(), 0);
        session.handle_key(key(KeyCode::Char('x')));
        assert_eq!(session.main_content_mut::<Label>().unwrap().0, "one body!x");
        assert!(screen(&mut session).contains("one body!x"));
    }
}
