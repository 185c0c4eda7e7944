//! Databases of the instance, as a main view or as the change-database modal

use std::any::Any;
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{layout::Rect, Frame};
use tracing::warn;

use super::{load_into, switch_database, PostgresAdapter, ResultTable, DATABASE_HEADERS};
use crate::adapter::DbAdapter;
use crate::error::{CsqlError, Result};
use crate::tui::session::Session;
use crate::tui::theme::Theme;
use crate::tui::view::{Content, Info, KeyBinding, Scope, View};
use crate::tui::views::InstanceListView;
use crate::tui::widgets::SelectableTable;

pub struct DatabaseListView {
    adapter: Arc<PostgresAdapter>,
}

impl DatabaseListView {
    pub fn new(adapter: Arc<PostgresAdapter>) -> Self {
        Self { adapter }
    }
}

impl View for DatabaseListView {
    fn title(&self) -> String {
        "Databases".to_string()
    }

    fn content(&mut self, _session: &mut Session, scope: &Scope) -> Box<dyn Content> {
        Box::new(DatabaseListContent::start(&self.adapter, scope, false))
    }

    fn info(&self) -> Vec<Info> {
        self.adapter.info()
    }

    fn key_bindings(&self) -> Vec<KeyBinding> {
        vec![
            KeyBinding::new("<enter>", "Use database"),
            KeyBinding::new("<esc>", "Disconnect"),
        ]
    }

    fn execute_command(&mut self, session: &mut Session, command: &str) -> Result<()> {
        self.adapter.execute_command(session, command)
    }
}

/// Modal variant: pick a database without leaving the current view
pub struct ChangeDatabaseView {
    adapter: Arc<PostgresAdapter>,
}

impl ChangeDatabaseView {
    pub fn new(adapter: Arc<PostgresAdapter>) -> Self {
        Self { adapter }
    }
}

impl View for ChangeDatabaseView {
    fn title(&self) -> String {
        "Select a database".to_string()
    }

    fn content(&mut self, _session: &mut Session, scope: &Scope) -> Box<dyn Content> {
        Box::new(DatabaseListContent::start(&self.adapter, scope, true))
    }

    fn key_bindings(&self) -> Vec<KeyBinding> {
        vec![KeyBinding::new("<enter>", "Use database")]
    }
}

pub struct DatabaseListContent {
    adapter: Arc<PostgresAdapter>,
    table: SelectableTable,
    in_modal: bool,
}

impl DatabaseListContent {
    fn start(adapter: &Arc<PostgresAdapter>, scope: &Scope, in_modal: bool) -> Self {
        let worker = Arc::clone(adapter);
        load_into::<Self, _>(scope, None, async move { worker.list_databases().await });
        Self {
            adapter: Arc::clone(adapter),
            table: SelectableTable::loading(DATABASE_HEADERS),
            in_modal,
        }
    }
}

impl ResultTable for DatabaseListContent {
    fn table_mut(&mut self) -> &mut SelectableTable {
        &mut self.table
    }
}

impl Content for DatabaseListContent {
    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        self.table.render(frame, area, theme);
    }

    fn handle_key(&mut self, key: KeyEvent, session: &mut Session) {
        if self.table.handle_key(key) {
            return;
        }
        match key.code {
            KeyCode::Enter => {
                let Some(name) = self.table.selected_cell(0).map(str::to_string) else {
                    session.show_error(&CsqlError::NoSelection);
                    return;
                };
                if self.in_modal {
                    session.close_modal();
                }
                switch_database(session, Arc::clone(&self.adapter), name);
            }
            // The modal handles Escape itself
            KeyCode::Esc if !self.in_modal => {
                let adapter = Arc::clone(&self.adapter);
                tokio::spawn(async move {
                    if let Err(err) = adapter.close().await {
                        warn!(error = %err, "failed to close connection");
                    }
                });
                session.set_view(Box::new(InstanceListView::new()));
            }
            _ => {}
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, InstanceConfig, Settings, UserConfig};
    use crate::tui::dispatch::channel;
    use crossterm::event::KeyModifiers;

    fn adapter() -> Arc<PostgresAdapter> {
        Arc::new(PostgresAdapter::new(
            InstanceConfig::default(),
            UserConfig::default(),
            Settings::default(),
        ))
    }

    #[tokio::test]
    async fn test_escape_returns_to_instance_list() {
        let (dispatcher, _queue) = channel();
        let mut session = Session::new(Config::default(), dispatcher);
        session.set_view(Box::new(DatabaseListView::new(adapter())));
        assert!(session.main_content_mut::<DatabaseListContent>().unwrap().table.is_loading());
        session.handle_key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE));
        assert_eq!(session.main_title(), Some("Instances"));
    }

    #[tokio::test]
    async fn test_load_failure_is_reported() {
        let (dispatcher, mut queue) = channel();
        let mut session = Session::new(Config::default(), dispatcher);
        session.set_view(Box::new(DatabaseListView::new(adapter())));

        // Not connected: the load fails and the error is shown
        for _ in 0..200 {
            queue.drain(&mut session);
            if session.overlay_count() > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        let (id, _) = session.top_overlay().unwrap();
        assert_eq!(session.overlay_text(id), Some("Not connected"));
        let content = session.main_content_mut::<DatabaseListContent>().unwrap();
        assert!(content.table.rows().is_empty());
    }
}
