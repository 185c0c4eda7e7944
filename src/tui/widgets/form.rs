//! Form - text inputs, selects and buttons with keyboard focus
//!
//! Tab / Down move forward, Shift-Tab / Up move back, Left / Right cycle a
//! focused select, Enter presses a focused button (or advances from an input).

use std::collections::BTreeMap;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Position, Rect},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::tui::events::plain_char;
use crate::tui::theme::Theme;

const LABEL_WIDTH: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub enum FormItem {
    Text {
        label: String,
        value: String,
        masked: bool,
    },
    Select {
        label: String,
        options: Vec<String>,
        selected: usize,
    },
    Button {
        label: String,
    },
}

impl FormItem {
    pub fn label(&self) -> &str {
        match self {
            FormItem::Text { label, .. }
            | FormItem::Select { label, .. }
            | FormItem::Button { label } => label,
        }
    }
}

/// Result of feeding a key to the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
    None,
    /// A select changed to the option at `index`
    SelectChanged { label: String, index: usize },
    Pressed(String),
}

#[derive(Debug, Clone, Default)]
pub struct Form {
    items: Vec<FormItem>,
    focus: usize,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, label: impl Into<String>, default: impl Into<String>) -> Self {
        self.push(FormItem::Text {
            label: label.into(),
            value: default.into(),
            masked: false,
        });
        self
    }

    pub fn select<S: Into<String>>(
        mut self,
        label: impl Into<String>,
        options: impl IntoIterator<Item = S>,
    ) -> Self {
        self.push(FormItem::Select {
            label: label.into(),
            options: options.into_iter().map(Into::into).collect(),
            selected: 0,
        });
        self
    }

    pub fn button(mut self, label: impl Into<String>) -> Self {
        self.push(FormItem::Button {
            label: label.into(),
        });
        self
    }

    pub fn push(&mut self, item: FormItem) {
        self.items.push(item);
    }

    /// Keep only the first `len` items
    pub fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
        self.focus = self.focus.min(self.items.len().saturating_sub(1));
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[FormItem] {
        &self.items
    }

    pub fn focused_label(&self) -> Option<&str> {
        self.items.get(self.focus).map(FormItem::label)
    }

    /// Current value of a text input, or the chosen option of a select
    pub fn value(&self, label: &str) -> Option<&str> {
        self.items.iter().find_map(|item| match item {
            FormItem::Text { label: l, value, .. } if l == label => Some(value.as_str()),
            FormItem::Select {
                label: l,
                options,
                selected,
            } if l == label => options.get(*selected).map(String::as_str),
            _ => None,
        })
    }

    /// All text and select values keyed by label
    pub fn values(&self) -> BTreeMap<String, String> {
        self.items
            .iter()
            .filter(|item| !matches!(item, FormItem::Button { .. }))
            .filter_map(|item| {
                self.value(item.label())
                    .map(|v| (item.label().to_string(), v.to_string()))
            })
            .collect()
    }

    /// Set a text input, or choose the select option with that text
    pub fn set_value(&mut self, label: &str, new_value: &str) {
        for item in &mut self.items {
            match item {
                FormItem::Text { label: l, value, .. } if l == label => {
                    *value = new_value.to_string();
                }
                FormItem::Select {
                    label: l,
                    options,
                    selected,
                } if l == label => {
                    if let Some(index) = options.iter().position(|o| o == new_value) {
                        *selected = index;
                    }
                }
                _ => {}
            }
        }
    }

    pub fn focus_next(&mut self) {
        if !self.items.is_empty() {
            self.focus = (self.focus + 1) % self.items.len();
        }
    }

    pub fn focus_prev(&mut self) {
        if !self.items.is_empty() {
            self.focus = (self.focus + self.items.len() - 1) % self.items.len();
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> FormEvent {
        match key.code {
            KeyCode::Tab | KeyCode::Down => {
                self.focus_next();
                return FormEvent::None;
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.focus_prev();
                return FormEvent::None;
            }
            _ => {}
        }

        let Some(item) = self.items.get_mut(self.focus) else {
            return FormEvent::None;
        };
        match item {
            FormItem::Button { label } if key.code == KeyCode::Enter => {
                FormEvent::Pressed(label.clone())
            }
            // Enter on an input or select advances
            _ if key.code == KeyCode::Enter => {
                self.focus_next();
                FormEvent::None
            }
            FormItem::Text { value, .. } => {
                if key.code == KeyCode::Backspace {
                    value.pop();
                } else if let Some(c) = plain_char(&key) {
                    value.push(c);
                }
                FormEvent::None
            }
            FormItem::Select {
                label,
                options,
                selected,
            } if !options.is_empty() => {
                let len = options.len();
                let next = match key.code {
                    KeyCode::Left => (*selected + len - 1) % len,
                    KeyCode::Right | KeyCode::Char(' ') => (*selected + 1) % len,
                    _ => *selected,
                };
                if next == *selected {
                    FormEvent::None
                } else {
                    *selected = next;
                    FormEvent::SelectChanged {
                        label: label.clone(),
                        index: next,
                    }
                }
            }
            _ => FormEvent::None,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let mut lines = Vec::with_capacity(self.items.len() * 2);
        let mut buttons = Vec::new();
        let mut cursor = None;

        for (i, item) in self.items.iter().enumerate() {
            let focused = i == self.focus;
            let label_style = if focused { theme.highlight() } else { theme.text() };
            match item {
                FormItem::Text {
                    label,
                    value,
                    masked,
                } => {
                    let shown = if *masked {
                        "*".repeat(value.chars().count())
                    } else {
                        value.clone()
                    };
                    if focused {
                        cursor = Some(Position::new(
                            area.x + (LABEL_WIDTH + 1 + shown.chars().count()) as u16,
                            area.y + lines.len() as u16,
                        ));
                    }
                    lines.push(Line::from(vec![
                        Span::styled(format!("{:<width$} ", label, width = LABEL_WIDTH), label_style),
                        Span::styled(format!("{:<30}", shown), theme.input()),
                    ]));
                    lines.push(Line::default());
                }
                FormItem::Select {
                    label,
                    options,
                    selected,
                } => {
                    let option = options.get(*selected).map(String::as_str).unwrap_or("");
                    lines.push(Line::from(vec![
                        Span::styled(format!("{:<width$} ", label, width = LABEL_WIDTH), label_style),
                        Span::styled(format!("◀ {} ▶", option), theme.input()),
                    ]));
                    lines.push(Line::default());
                }
                FormItem::Button { label } => {
                    let style = if focused { theme.selected() } else { theme.accent() };
                    buttons.push(Span::styled(format!(" {} ", label), style));
                    buttons.push(Span::raw("  "));
                }
            }
        }
        if !buttons.is_empty() {
            lines.push(Line::from(buttons));
        }

        frame.render_widget(Paragraph::new(lines), area);
        if let Some(position) = cursor.filter(|p| p.x < area.right() && p.y < area.bottom()) {
            frame.set_cursor_position(position);
        }
    }
}
