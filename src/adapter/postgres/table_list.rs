//! Tables of the current database

use std::any::Any;
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{layout::Rect, Frame};

use super::{
    load_into, shell_view, ChangeDatabaseView, DatabaseListView, PostgresAdapter,
    QueryEditorView, ResultTable, TableQueryView, TABLE_HEADERS,
};
use crate::error::{CsqlError, Result};
use crate::tui::session::Session;
use crate::tui::theme::Theme;
use crate::tui::view::{Content, Info, KeyBinding, Scope, View};
use crate::tui::widgets::SelectableTable;

pub struct TableListView {
    adapter: Arc<PostgresAdapter>,
}

impl TableListView {
    pub fn new(adapter: Arc<PostgresAdapter>) -> Self {
        Self { adapter }
    }
}

impl View for TableListView {
    fn title(&self) -> String {
        "Tables".to_string()
    }

    fn content(&mut self, _session: &mut Session, scope: &Scope) -> Box<dyn Content> {
        let adapter = Arc::clone(&self.adapter);
        load_into::<TableListContent, _>(scope, None, async move { adapter.list_tables().await });
        Box::new(TableListContent {
            adapter: Arc::clone(&self.adapter),
            table: SelectableTable::loading(TABLE_HEADERS),
        })
    }

    fn info(&self) -> Vec<Info> {
        self.adapter.info()
    }

    fn key_bindings(&self) -> Vec<KeyBinding> {
        let mut bindings = vec![
            KeyBinding::new("<enter>", "Show table records"),
            KeyBinding::new("[e]", "Query editor"),
            KeyBinding::new("[s]", "psql shell"),
            KeyBinding::new("<esc>", "Databases"),
        ];
        bindings.extend(self.adapter.key_bindings());
        bindings
    }

    fn execute_command(&mut self, session: &mut Session, command: &str) -> Result<()> {
        self.adapter.execute_command(session, command)
    }
}

pub struct TableListContent {
    adapter: Arc<PostgresAdapter>,
    table: SelectableTable,
}

impl ResultTable for TableListContent {
    fn table_mut(&mut self) -> &mut SelectableTable {
        &mut self.table
    }
}

impl Content for TableListContent {
    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        self.table.render(frame, area, theme);
    }

    fn handle_key(&mut self, key: KeyEvent, session: &mut Session) {
        if self.table.handle_key(key) {
            return;
        }
        let adapter = Arc::clone(&self.adapter);
        match key.code {
            KeyCode::Enter => {
                let selected = self
                    .table
                    .selected_cell(0)
                    .zip(self.table.selected_cell(1))
                    .map(|(schema, name)| (schema.to_string(), name.to_string()));
                match selected {
                    Some((schema, name)) => {
                        session.set_view(Box::new(TableQueryView::new(adapter, schema, name)))
                    }
                    None => session.show_error(&CsqlError::NoSelection),
                }
            }
            KeyCode::Char('d') => {
                session.show_modal(Box::new(ChangeDatabaseView::new(adapter)));
            }
            KeyCode::Char('e') => {
                session.set_view(Box::new(QueryEditorView::new(adapter, String::new())))
            }
            KeyCode::Char('s') => session.set_view(Box::new(shell_view(adapter))),
            KeyCode::Esc => session.set_view(Box::new(DatabaseListView::new(adapter))),
            _ => {}
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
