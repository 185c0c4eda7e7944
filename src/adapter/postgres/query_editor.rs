//! Free-form SQL editor with a result table

use std::any::Any;
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    widgets::{Block, BorderType, Borders},
    Frame,
};
use tui_textarea::TextArea;

use super::{PostgresAdapter, TableListView};
use crate::error::{CsqlError, Result};
use crate::tui::session::Session;
use crate::tui::theme::Theme;
use crate::tui::view::{Content, Info, KeyBinding, Scope, View};
use crate::tui::widgets::SelectableTable;

pub struct QueryEditorView {
    adapter: Arc<PostgresAdapter>,
    query: String,
}

impl QueryEditorView {
    pub fn new(adapter: Arc<PostgresAdapter>, query: String) -> Self {
        Self { adapter, query }
    }
}

impl View for QueryEditorView {
    fn title(&self) -> String {
        "Query".to_string()
    }

    fn content(&mut self, _session: &mut Session, scope: &Scope) -> Box<dyn Content> {
        let lines = if self.query.is_empty() {
            vec![String::new()]
        } else {
            self.query.lines().map(str::to_string).collect()
        };
        let mut editor = TextArea::new(lines);
        editor.set_placeholder_text("SELECT ...");

        let mut result = SelectableTable::new(["Result"], Vec::new());
        result.set_placeholder("Press Ctrl-X to execute");

        Box::new(QueryEditorContent {
            adapter: Arc::clone(&self.adapter),
            scope: scope.clone(),
            editor,
            result,
            pane: Pane::Editor,
        })
    }

    fn info(&self) -> Vec<Info> {
        self.adapter.info()
    }

    fn key_bindings(&self) -> Vec<KeyBinding> {
        vec![
            KeyBinding::new("<ctrl-x>", "Execute query"),
            KeyBinding::new("<tab>", "Switch focus"),
            KeyBinding::new("<esc>", "Go back to table list"),
        ]
    }

    fn execute_command(&mut self, session: &mut Session, command: &str) -> Result<()> {
        self.adapter.execute_command(session, command)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pane {
    Editor,
    Result,
}

pub struct QueryEditorContent {
    adapter: Arc<PostgresAdapter>,
    scope: Scope,
    editor: TextArea<'static>,
    result: SelectableTable,
    pane: Pane,
}

impl QueryEditorContent {
    pub fn query(&self) -> String {
        self.editor.lines().join("\n")
    }

    fn execute(&mut self, session: &mut Session) {
        let sql = self.query();
        if sql.trim().is_empty() {
            session.show_error(&CsqlError::invalid_field("Query", "is required"));
            return;
        }
        self.result.set_placeholder("Running ...");

        let adapter = Arc::clone(&self.adapter);
        let worker = self.scope.clone();
        self.scope.spawn(async move {
            let result = adapter.execute_query(&sql).await;
            worker.update::<QueryEditorContent, _>(move |content, session| match result {
                Ok(result) if result.columns.is_empty() => content
                    .result
                    .set_result(vec!["Status".to_string()], vec![vec![result.status()]]),
                Ok(result) => content.result.set_result(result.columns, result.rows),
                Err(err) => {
                    content.result.set_placeholder("Query failed");
                    session.show_error(&err);
                }
            });
        });
    }
}

impl Content for QueryEditorContent {
    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let [editor_area, result_area] =
            Layout::vertical([Constraint::Percentage(30), Constraint::Min(3)]).areas(area);

        self.editor.set_block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(theme.border_for(self.pane == Pane::Editor))
                .title(" SQL "),
        );
        self.editor.set_style(theme.input());
        frame.render_widget(&self.editor, editor_area);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme.border_for(self.pane == Pane::Result))
            .title(" Result ");
        let inner = block.inner(result_area);
        frame.render_widget(block, result_area);
        self.result.render(frame, inner, theme);
    }

    fn handle_key(&mut self, key: KeyEvent, session: &mut Session) {
        match (key.modifiers, key.code) {
            (_, KeyCode::Esc) => {
                session.set_view(Box::new(TableListView::new(Arc::clone(&self.adapter))));
            }
            (_, KeyCode::Tab) => {
                self.pane = match self.pane {
                    Pane::Editor => Pane::Result,
                    Pane::Result => Pane::Editor,
                };
            }
            (KeyModifiers::CONTROL, KeyCode::Char('x')) => self.execute(session),
            _ => match self.pane {
                Pane::Editor => {
                    self.editor.input(key);
                }
                Pane::Result => {
                    self.result.handle_key(key);
                }
            },
        }
    }

    /// Typing in the editor must not trigger `q` or `/`
    fn captures_all_input(&self) -> bool {
        self.pane == Pane::Editor
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
