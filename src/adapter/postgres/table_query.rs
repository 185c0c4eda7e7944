//! First rows of a table

use std::any::Any;
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{layout::Rect, Frame};

use super::{
    load_into, preview_query, ChangeDatabaseView, PostgresAdapter, QueryEditorView, ResultTable,
    TableListView,
};
use crate::error::Result;
use crate::tui::session::Session;
use crate::tui::theme::Theme;
use crate::tui::view::{Content, Info, KeyBinding, Scope, View};
use crate::tui::widgets::SelectableTable;

pub struct TableQueryView {
    adapter: Arc<PostgresAdapter>,
    schema: String,
    table: String,
}

impl TableQueryView {
    pub fn new(adapter: Arc<PostgresAdapter>, schema: String, table: String) -> Self {
        Self {
            adapter,
            schema,
            table,
        }
    }
}

impl View for TableQueryView {
    fn title(&self) -> String {
        format!("Query Result - {}.{}", self.schema, self.table)
    }

    fn content(&mut self, session: &mut Session, scope: &Scope) -> Box<dyn Content> {
        let loading = session.show_message(format!("Loading {}", self.table), false);
        let (adapter, schema, table) = (
            Arc::clone(&self.adapter),
            self.schema.clone(),
            self.table.clone(),
        );
        load_into::<TableQueryContent, _>(scope, Some(loading), async move {
            adapter.preview_table(&schema, &table).await
        });
        Box::new(TableQueryContent {
            adapter: Arc::clone(&self.adapter),
            query: preview_query(&self.schema, &self.table),
            table: SelectableTable::loading([self.table.as_str()]),
        })
    }

    fn info(&self) -> Vec<Info> {
        let mut info = self.adapter.info();
        info.push(Info::new("Table", format!("{}.{}", self.schema, self.table)));
        info
    }

    fn key_bindings(&self) -> Vec<KeyBinding> {
        let mut bindings = vec![
            KeyBinding::new("[e]", "Edit query"),
            KeyBinding::new("<esc>", "Go back to table list"),
        ];
        bindings.extend(self.adapter.key_bindings());
        bindings
    }

    fn execute_command(&mut self, session: &mut Session, command: &str) -> Result<()> {
        self.adapter.execute_command(session, command)
    }
}

pub struct TableQueryContent {
    adapter: Arc<PostgresAdapter>,
    query: String,
    table: SelectableTable,
}

impl ResultTable for TableQueryContent {
    fn table_mut(&mut self) -> &mut SelectableTable {
        &mut self.table
    }
}

impl Content for TableQueryContent {
    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        self.table.render(frame, area, theme);
    }

    fn handle_key(&mut self, key: KeyEvent, session: &mut Session) {
        if self.table.handle_key(key) {
            return;
        }
        let adapter = Arc::clone(&self.adapter);
        match key.code {
            KeyCode::Esc => session.set_view(Box::new(TableListView::new(adapter))),
            KeyCode::Char('e') => {
                session.set_view(Box::new(QueryEditorView::new(adapter, self.query.clone())))
            }
            KeyCode::Char('d') => {
                session.show_modal(Box::new(ChangeDatabaseView::new(adapter)));
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

    #[tokio::test]
    async fn test_edit_opens_editor_with_preview_query() {
        let (dispatcher, _queue) = channel();
        let mut session = Session::new(Config::default(), dispatcher);
        let adapter = Arc::new(PostgresAdapter::new(
            InstanceConfig::default(),
            UserConfig::default(),
            Settings::default(),
        ));
        let view = TableQueryView::new(adapter, "public".to_string(), "users".to_string());
        assert_eq!(view.info().last().unwrap().value, "public.users");
        session.set_view(Box::new(view));
        assert_eq!(session.main_title(), Some("Query Result - public.users"));

        let content = session.main_content_mut::<TableQueryContent>().unwrap();
        assert_eq!(content.query, "SELECT * FROM \"public\".\"users\" LIMIT 100");
    }
}
