//! Roles of the instance

use std::any::Any;
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{layout::Rect, Frame};

use super::{load_into, PostgresAdapter, ResultTable, TableListView, ROLE_HEADERS};
use crate::error::Result;
use crate::tui::session::Session;
use crate::tui::theme::Theme;
use crate::tui::view::{Content, Info, KeyBinding, Scope, View};
use crate::tui::widgets::SelectableTable;

pub struct RoleListView {
    adapter: Arc<PostgresAdapter>,
}

impl RoleListView {
    pub fn new(adapter: Arc<PostgresAdapter>) -> Self {
        Self { adapter }
    }
}

impl View for RoleListView {
    fn title(&self) -> String {
        "Roles".to_string()
    }

    fn content(&mut self, session: &mut Session, scope: &Scope) -> Box<dyn Content> {
        let loading = session.show_message("Loading roles", false);
        let adapter = Arc::clone(&self.adapter);
        load_into::<RoleListContent, _>(scope, Some(loading), async move {
            adapter.list_roles().await
        });
        Box::new(RoleListContent {
            adapter: Arc::clone(&self.adapter),
            table: SelectableTable::loading(ROLE_HEADERS),
        })
    }

    fn info(&self) -> Vec<Info> {
        self.adapter.info()
    }

    fn key_bindings(&self) -> Vec<KeyBinding> {
        vec![KeyBinding::new("<esc>", "Go back to table list")]
    }

    fn execute_command(&mut self, session: &mut Session, command: &str) -> Result<()> {
        self.adapter.execute_command(session, command)
    }
}

pub struct RoleListContent {
    adapter: Arc<PostgresAdapter>,
    table: SelectableTable,
}

impl ResultTable for RoleListContent {
    fn table_mut(&mut self) -> &mut SelectableTable {
        &mut self.table
    }
}

impl Content for RoleListContent {
    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        self.table.render(frame, area, theme);
    }

    fn handle_key(&mut self, key: KeyEvent, session: &mut Session) {
        if !self.table.handle_key(key) && key.code == KeyCode::Esc {
            session.set_view(Box::new(TableListView::new(Arc::clone(&self.adapter))));
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
