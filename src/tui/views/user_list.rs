//! Users of one instance, shown as a modal over the instance list

use std::any::Any;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{layout::Rect, Frame};
use tracing::info;

use super::{persist_config, AddUserView};
use crate::adapter;
use crate::config::InstanceConfig;
use crate::error::CsqlError;
use crate::tui::session::Session;
use crate::tui::theme::Theme;
use crate::tui::view::{Content, KeyBinding, Scope, View};
use crate::tui::widgets::SelectableTable;

pub struct UserListView {
    instance: InstanceConfig,
}

impl UserListView {
    pub fn new(instance: InstanceConfig) -> Self {
        Self { instance }
    }
}

fn user_rows(instance: &InstanceConfig) -> Vec<Vec<String>> {
    instance
        .users
        .iter()
        .map(|user| vec![user.username.clone(), format!("[auth={}]", user.auth_type)])
        .collect()
}

impl View for UserListView {
    fn title(&self) -> String {
        "Select a user".to_string()
    }

    fn content(&mut self, _session: &mut Session, _scope: &Scope) -> Box<dyn Content> {
        Box::new(UserListContent {
            instance: self.instance.clone(),
            table: SelectableTable::new(["Username", "Auth"], user_rows(&self.instance)),
        })
    }

    fn key_bindings(&self) -> Vec<KeyBinding> {
        vec![
            KeyBinding::new("<enter>", "Connect"),
            KeyBinding::new("[a]", "Add user"),
            KeyBinding::new("[x]", "Remove user"),
        ]
    }
}

pub struct UserListContent {
    instance: InstanceConfig,
    table: SelectableTable,
}

impl UserListContent {
    pub fn table(&self) -> &SelectableTable {
        &self.table
    }

    fn selected_user(&self, session: &mut Session) -> Option<String> {
        let username = self.table.selected_cell(0).map(str::to_string);
        if username.is_none() {
            session.show_error(&CsqlError::NoSelection);
        }
        username
    }

    fn reload(&mut self, instance: InstanceConfig) {
        self.table.set_rows(user_rows(&instance));
        self.instance = instance;
    }

    /// Connect on a worker behind a "Connecting" message; the adapter's
    /// first view replaces the main view on success.
    fn connect(&self, username: &str, session: &mut Session) {
        let adapter = match self
            .instance
            .user(username)
            .and_then(|user| adapter::adapter_for(&self.instance, user, &session.config.settings))
        {
            Ok(adapter) => adapter,
            Err(err) => return session.show_error(&err),
        };

        let message = session.show_message("Connecting", false);
        session.close_modal();
        let dispatcher = session.dispatcher().clone();
        tokio::spawn(async move {
            let result = adapter::open(adapter, None).await;
            dispatcher.close_message_async(message);
            match result {
                Ok(view) => dispatcher.enqueue(move |session| session.set_view(view)),
                Err(err) => dispatcher.show_error_async(&err),
            }
        });
    }
}

impl Content for UserListContent {
    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        self.table.render(frame, area, theme);
    }

    fn handle_key(&mut self, key: KeyEvent, session: &mut Session) {
        if self.table.handle_key(key) {
            return;
        }
        match key.code {
            KeyCode::Enter => {
                if let Some(username) = self.selected_user(session) {
                    self.connect(&username, session);
                }
            }
            KeyCode::Char('a') => {
                session.show_modal(Box::new(AddUserView::new(self.instance.name.clone())));
            }
            KeyCode::Char('x') => {
                let Some(username) = self.selected_user(session) else {
                    return;
                };
                let instance = self.instance.name.clone();
                session.show_alert(
                    format!("Remove user {} from instance {}?", username, instance),
                    move |session| {
                        if let Err(err) = session.config.remove_instance_user(&instance, &username) {
                            return session.show_error(&err);
                        }
                        info!(%instance, user = %username, "user removed");
                        persist_config(session);
                        let updated = session.config.instance(&instance).cloned();
                        if let (Ok(updated), Some(list)) =
                            (updated, session.modal_content_mut::<UserListContent>())
                        {
                            list.reload(updated);
                        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, UserConfig};
    use crate::tui::dispatch::channel;
    use crate::tui::views::InstanceListView;
    use crossterm::event::KeyModifiers;
    use std::time::Duration;
    use tempfile::TempDir;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn instance(db_type: &str) -> InstanceConfig {
        InstanceConfig {
            name: "db".to_string(),
            db_type: db_type.to_string(),
            host: "127.0.0.1".to_string(),
            port: 1,
            users: vec![
                UserConfig {
                    username: "app".to_string(),
                    auth_type: "Local".to_string(),
                    ..Default::default()
                },
                UserConfig {
                    username: "admin".to_string(),
                    auth_type: "Vault".to_string(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    fn session_with(instance: InstanceConfig, dir: &TempDir) -> (Session, crate::tui::dispatch::DispatchQueue) {
        let (dispatcher, queue) = channel();
        let mut config = Config::load(&dir.path().join("config.toml")).unwrap();
        config.add_instance(instance.clone());
        let mut session = Session::new(config, dispatcher);
        session.set_view(Box::new(InstanceListView::new()));
        session.show_modal(Box::new(UserListView::new(instance)));
        (session, queue)
    }

    #[test]
    fn test_rows_show_auth_type() {
        let rows = user_rows(&instance("PostgreSQL"));
        assert_eq!(rows[1], vec!["admin", "[auth=Vault]"]);
    }

    #[tokio::test]
    async fn test_unsupported_type_reports_error_and_keeps_modal() {
        let dir = TempDir::new().unwrap();
        let (mut session, _queue) = session_with(instance("MySQL"), &dir);
        session.handle_key(key(KeyCode::Enter));
        assert!(session.has_modal());
        let (id, _) = session.top_overlay().unwrap();
        assert_eq!(session.overlay_text(id), Some("Unsupported database type 'MySQL'"));
    }

    #[tokio::test]
    async fn test_failed_connect_closes_message_and_shows_error() {
        let dir = TempDir::new().unwrap();
        let (mut session, mut queue) = session_with(instance("PostgreSQL"), &dir);
        session.handle_key(key(KeyCode::Enter));
        assert!(!session.has_modal());
        let (connecting, _) = session.top_overlay().unwrap();
        assert_eq!(session.overlay_text(connecting), Some("Connecting"));

        for _ in 0..1000 {
            queue.drain(&mut session);
            if !session.has_overlay(connecting) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        queue.drain(&mut session);
        assert!(!session.has_overlay(connecting));
        let (error, _) = session.top_overlay().unwrap();
        assert!(session.overlay_text(error).unwrap().starts_with("Connection error"));
        assert_eq!(session.main_title(), Some("Instances"));
    }

    #[tokio::test]
    async fn test_remove_user_reloads_modal() {
        let dir = TempDir::new().unwrap();
        let (mut session, _queue) = session_with(instance("PostgreSQL"), &dir);
        session.handle_key(key(KeyCode::Char('x')));
        session.handle_key(key(KeyCode::Enter));
        let list = session.modal_content_mut::<UserListContent>().unwrap();
        assert_eq!(list.table().rows().len(), 1);
        assert_eq!(session.config.instance("db").unwrap().users[0].username, "admin");
    }
}
