//! Selectable table with a loading placeholder

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Constraint, Rect},
    text::Text,
    widgets::{Cell, Row, Table, TableState},
    Frame,
};

use crate::tui::theme::Theme;

const PAGE: usize = 10;

/// Rows of text cells with a selected row
#[derive(Debug, Clone)]
pub struct SelectableTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    state: TableState,
    placeholder: Option<String>,
}

impl SelectableTable {
    /// An empty table showing `Loading ...` until rows arrive
    pub fn loading<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
            state: TableState::default(),
            placeholder: Some("Loading ...".to_string()),
        }
    }

    pub fn new<S: Into<String>>(
        headers: impl IntoIterator<Item = S>,
        rows: Vec<Vec<String>>,
    ) -> Self {
        let mut table = Self::loading(headers);
        table.set_rows(rows);
        table
    }

    /// Replace all rows, clamping the selection
    pub fn set_rows(&mut self, rows: Vec<Vec<String>>) {
        self.rows = rows;
        self.placeholder = None;
        let selected = match self.state.selected() {
            _ if self.rows.is_empty() => None,
            Some(i) => Some(i.min(self.rows.len() - 1)),
            None => Some(0),
        };
        self.state.select(selected);
    }

    /// Replace the headers and rows, e.g. with a query result
    pub fn set_result(&mut self, headers: Vec<String>, rows: Vec<Vec<String>>) {
        self.headers = headers;
        self.state.select(None);
        self.set_rows(rows);
    }

    /// Show a single placeholder row such as an error note
    pub fn set_placeholder(&mut self, text: impl Into<String>) {
        self.rows.clear();
        self.state.select(None);
        self.placeholder = Some(text.into());
    }

    pub fn is_loading(&self) -> bool {
        self.placeholder.is_some()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.state.selected().filter(|i| *i < self.rows.len())
    }

    pub fn selected_row(&self) -> Option<&[String]> {
        self.selected_index().map(|i| self.rows[i].as_slice())
    }

    /// Cell `column` of the selected row
    pub fn selected_cell(&self, column: usize) -> Option<&str> {
        self.selected_row()
            .and_then(|row| row.get(column))
            .map(String::as_str)
    }

    /// Move the selection. Returns false for keys it does not handle.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.rows.is_empty() {
            return matches!(
                key.code,
                KeyCode::Up | KeyCode::Down | KeyCode::PageUp | KeyCode::PageDown
            );
        }
        let last = self.rows.len() - 1;
        let current = self.state.selected().unwrap_or(0);
        let next = match key.code {
            KeyCode::Up | KeyCode::Char('k') => current.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => (current + 1).min(last),
            KeyCode::PageUp => current.saturating_sub(PAGE),
            KeyCode::PageDown => (current + PAGE).min(last),
            KeyCode::Home | KeyCode::Char('g') => 0,
            KeyCode::End | KeyCode::Char('G') => last,
            _ => return false,
        };
        self.state.select(Some(next));
        true
    }

    pub fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let header = Row::new(self.headers.iter().map(|h| Cell::from(h.as_str())))
            .style(theme.header())
            .bottom_margin(1);

        let rows: Vec<Row> = match &self.placeholder {
            Some(text) => vec![Row::new([Cell::from(text.as_str())]).style(theme.dimmed())],
            None => self
                .rows
                .iter()
                .map(|row| {
                    let cells = row.iter().map(|c| Cell::from(Text::from(c.as_str())));
                    let height = row.iter().map(|c| c.lines().count()).max().unwrap_or(1);
                    Row::new(cells).height(height.max(1) as u16)
                })
                .collect(),
        };

        let columns = self.headers.len().max(1);
        let widths = vec![Constraint::Ratio(1, columns as u32); columns];
        let table = Table::new(rows, widths)
            .header(header)
            .style(theme.text())
            .row_highlight_style(theme.selected())
            .highlight_symbol("▶ ");

        frame.render_stateful_widget(table, area, &mut self.state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use ratatui::{backend::TestBackend, Terminal};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn rows(n: usize) -> Vec<Vec<String>> {
        (0..n).map(|i| vec![format!("row{}", i)]).collect()
    }

    #[test]
    fn test_loading_until_rows_arrive() {
        let mut table = SelectableTable::loading(["Name"]);
        assert!(table.is_loading());
        assert_eq!(table.selected_row(), None);
        table.set_rows(rows(2));
        assert!(!table.is_loading());
        assert_eq!(table.selected_cell(0), Some("row0"));
    }

    #[test]
    fn test_navigation_is_clamped() {
        let mut table = SelectableTable::new(["Name"], rows(3));
        assert!(table.handle_key(key(KeyCode::Up)));
        assert_eq!(table.selected_index(), Some(0));
        table.handle_key(key(KeyCode::End));
        table.handle_key(key(KeyCode::Down));
        assert_eq!(table.selected_index(), Some(2));
        assert!(!table.handle_key(key(KeyCode::Enter)));
    }

    #[test]
    fn test_set_rows_clamps_selection() {
        let mut table = SelectableTable::new(["Name"], rows(5));
        table.handle_key(key(KeyCode::End));
        table.set_rows(rows(2));
        assert_eq!(table.selected_index(), Some(1));
        table.set_rows(Vec::new());
        assert_eq!(table.selected_index(), None);
    }

    #[test]
    fn test_render_shows_placeholder() {
        let mut terminal = Terminal::new(TestBackend::new(30, 5)).unwrap();
        let mut table = SelectableTable::loading(["Name", "Owner"]);
        terminal
            .draw(|f| {
                let area = f.area();
                table.render(f, area, &Theme::new());
            })
            .unwrap();
        let buffer = terminal.backend().buffer().clone();
        let text: String = buffer.content().iter().map(|c| c.symbol()).collect();
        assert!(text.contains("Loading ..."));
        assert!(text.contains("Owner"));
    }
}
