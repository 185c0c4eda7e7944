//! Instance list - the main view on startup

use std::any::Any;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{layout::Rect, Frame};
use tracing::info;

use super::{persist_config, DiscoverView, UserListView};
use crate::config::Config;
use crate::error::CsqlError;
use crate::tui::session::Session;
use crate::tui::theme::Theme;
use crate::tui::view::{Content, KeyBinding, Scope, View};
use crate::tui::widgets::SelectableTable;

const HEADERS: [&str; 5] = ["Name", "Type", "Host", "Port", "Source"];

#[derive(Debug, Default)]
pub struct InstanceListView;

impl InstanceListView {
    pub fn new() -> Self {
        Self
    }
}

/// One row per configured instance, sorted by name
fn instance_rows(config: &Config) -> Vec<Vec<String>> {
    config
        .instances
        .values()
        .map(|instance| {
            vec![
                instance.name.clone(),
                instance.db_type.clone(),
                instance.host.clone(),
                instance.port.to_string(),
                instance.source.clone(),
            ]
        })
        .collect()
}

/// Reload the instance list if it is the main view
pub(crate) fn refresh_instance_list(session: &mut Session) {
    let rows = instance_rows(&session.config);
    if let Some(list) = session.main_content_mut::<InstanceListContent>() {
        list.table.set_rows(rows);
    }
}

impl View for InstanceListView {
    fn title(&self) -> String {
        "Instances".to_string()
    }

    fn content(&mut self, session: &mut Session, _scope: &Scope) -> Box<dyn Content> {
        Box::new(InstanceListContent {
            table: SelectableTable::new(HEADERS, instance_rows(&session.config)),
        })
    }

    fn key_bindings(&self) -> Vec<KeyBinding> {
        vec![
            KeyBinding::new("<enter>", "Select instance"),
            KeyBinding::new("[a]", "Add new instance"),
            KeyBinding::new("[x]", "Remove instance"),
        ]
    }
}

pub struct InstanceListContent {
    table: SelectableTable,
}

impl InstanceListContent {
    pub fn table(&self) -> &SelectableTable {
        &self.table
    }

    fn selected_name(&self, session: &mut Session) -> Option<String> {
        let name = self.table.selected_cell(0).map(str::to_string);
        if name.is_none() {
            session.show_error(&CsqlError::NoSelection);
        }
        name
    }
}

impl Content for InstanceListContent {
    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        self.table.render(frame, area, theme);
    }

    fn handle_key(&mut self, key: KeyEvent, session: &mut Session) {
        if self.table.handle_key(key) {
            return;
        }
        match key.code {
            KeyCode::Enter => {
                let Some(name) = self.selected_name(session) else {
                    return;
                };
                match session.config.instance(&name) {
                    Ok(instance) => {
                        let view = UserListView::new(instance.clone());
                        session.show_modal(Box::new(view));
                    }
                    Err(err) => session.show_error(&err),
                }
            }
            KeyCode::Char('a') => {
                session.show_modal(Box::new(DiscoverView::new()));
            }
            KeyCode::Char('x') => {
                let Some(name) = self.selected_name(session) else {
                    return;
                };
                session.show_alert(
                    format!("Remove instance {}?", name),
                    move |session| match session.config.remove_instance(&name) {
                        Ok(_) => {
                            info!(instance = %name, "instance removed");
                            persist_config(session);
                            refresh_instance_list(session);
                        }
                        Err(err) => session.show_error(&err),
                    },
                    |_| {},
                );
            }
            _ => {}
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
