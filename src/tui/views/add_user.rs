//! Add-user form

use std::any::Any;
use std::collections::BTreeMap;

use crossterm::event::KeyEvent;
use ratatui::{layout::Rect, Frame};
use tracing::info;

use super::{persist_config, UserListView};
use crate::auth::AuthType;
use crate::config::UserConfig;
use crate::error::{CsqlError, Result};
use crate::tui::session::Session;
use crate::tui::theme::Theme;
use crate::tui::view::{Content, KeyBinding, Scope, View};
use crate::tui::widgets::{Form, FormEvent, FormItem};

const USERNAME: &str = "Username";
const AUTH_TYPE: &str = "Auth Type";
const ADD: &str = "Add";
const CANCEL: &str = "Cancel";

/// Username and the auth type select stay put when the type changes
const FIXED_ITEMS: usize = 2;

pub struct AddUserView {
    instance: String,
}

impl AddUserView {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }
}

impl View for AddUserView {
    fn title(&self) -> String {
        "Add New User".to_string()
    }

    fn content(&mut self, _session: &mut Session, _scope: &Scope) -> Box<dyn Content> {
        let mut form = Form::new()
            .text(USERNAME, "")
            .select(AUTH_TYPE, AuthType::ALL.map(|t| t.as_str()));
        push_auth_fields(&mut form, AuthType::Local);
        Box::new(AddUserContent {
            instance: self.instance.clone(),
            form,
        })
    }

    fn key_bindings(&self) -> Vec<KeyBinding> {
        vec![
            KeyBinding::new("<tab>", "Next field"),
            KeyBinding::new("<left>/<right>", "Change auth type"),
            KeyBinding::new("<enter>", "Press button"),
        ]
    }
}

fn push_auth_fields(form: &mut Form, auth_type: AuthType) {
    form.truncate(FIXED_ITEMS);
    for field in auth_type.fields() {
        form.push(FormItem::Text {
            label: field.label.to_string(),
            value: String::new(),
            masked: field.masked,
        });
    }
    form.push(FormItem::Button {
        label: ADD.to_string(),
    });
    form.push(FormItem::Button {
        label: CANCEL.to_string(),
    });
}

pub struct AddUserContent {
    instance: String,
    form: Form,
}

impl AddUserContent {
    pub fn form(&self) -> &Form {
        &self.form
    }

    /// Build the user from the form. Vault users need every field; a
    /// local password may be left empty.
    fn user(&self) -> Result<UserConfig> {
        let username = self.form.value(USERNAME).unwrap_or_default().trim();
        if username.is_empty() {
            return Err(CsqlError::invalid_field(USERNAME, "is required"));
        }
        let auth_type = AuthType::parse(self.form.value(AUTH_TYPE).unwrap_or_default())?;

        let mut params = BTreeMap::new();
        for field in auth_type.fields() {
            let value = self.form.value(field.label).unwrap_or_default();
            if auth_type == AuthType::Vault && value.trim().is_empty() {
                return Err(CsqlError::invalid_field(field.label, "is required"));
            }
            params.insert(field.key.to_string(), value.to_string());
        }

        Ok(UserConfig {
            username: username.to_string(),
            auth_type: auth_type.to_string(),
            params,
        })
    }

    fn submit(&self, session: &mut Session) {
        let user = match self.user() {
            Ok(user) => user,
            Err(err) => return session.show_error(&err),
        };
        let username = user.username.clone();
        if let Err(err) = session.config.add_instance_user(&self.instance, user) {
            return session.show_error(&err);
        }
        info!(instance = %self.instance, user = %username, "user added");
        persist_config(session);
        self.back_to_users(session);
    }

    fn back_to_users(&self, session: &mut Session) {
        match session.config.instance(&self.instance) {
            Ok(instance) => {
                let view = UserListView::new(instance.clone());
                session.show_modal(Box::new(view));
            }
            Err(err) => {
                session.close_modal();
                session.show_error(&err);
            }
        }
    }
}

impl Content for AddUserContent {
    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        self.form.render(frame, area, theme);
    }

    fn handle_key(&mut self, key: KeyEvent, session: &mut Session) {
        match self.form.handle_key(key) {
            FormEvent::SelectChanged { label, index } if label == AUTH_TYPE => {
                if let Some(auth_type) = AuthType::ALL.get(index) {
                    push_auth_fields(&mut self.form, *auth_type);
                }
            }
            FormEvent::Pressed(button) if button == ADD => self.submit(session),
            FormEvent::Pressed(button) if button == CANCEL => self.back_to_users(session),
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
    use crate::config::{Config, InstanceConfig};
    use crate::tui::dispatch::channel;
    use crate::tui::views::{InstanceListView, UserListContent};
    use crossterm::event::{KeyCode, KeyModifiers};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(session: &mut Session, text: &str) {
        for c in text.chars() {
            session.handle_key(key(KeyCode::Char(c)));
        }
    }

    fn session(dir: &TempDir) -> (Session, crate::tui::dispatch::DispatchQueue) {
        let (dispatcher, queue) = channel();
        let mut config = Config::load(&dir.path().join("config.toml")).unwrap();
        config.add_instance(InstanceConfig {
            name: "db".to_string(),
            db_type: "PostgreSQL".to_string(),
            host: "localhost".to_string(),
            port: 5432,
            ..Default::default()
        });
        let mut session = Session::new(config, dispatcher);
        session.set_view(Box::new(InstanceListView::new()));
        session.show_modal(Box::new(AddUserView::new("db")));
        (session, queue)
    }

    fn labels(session: &mut Session) -> Vec<String> {
        session
            .modal_content_mut::<AddUserContent>()
            .unwrap()
            .form()
            .items()
            .iter()
            .map(|item| item.label().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_auth_type_switch_rebuilds_fields() {
        let dir = TempDir::new().unwrap();
        let (mut session, _queue) = session(&dir);
        assert_eq!(labels(&mut session), vec!["Username", "Auth Type", "Password", "Add", "Cancel"]);

        session.handle_key(key(KeyCode::Tab));
        session.handle_key(key(KeyCode::Right));
        assert_eq!(
            labels(&mut session),
            vec![
                "Username",
                "Auth Type",
                "Vault Address",
                "Vault Mount Path",
                "Vault Secret Path",
                "Vault Secret Key",
                "Add",
                "Cancel"
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_username_is_rejected() {
        let dir = TempDir::new().unwrap();
        let (mut session, _queue) = session(&dir);
        // Username, Auth Type, Password, then Add
        for _ in 0..3 {
            session.handle_key(key(KeyCode::Tab));
        }
        session.handle_key(key(KeyCode::Enter));
        let (id, _) = session.top_overlay().unwrap();
        assert_eq!(session.overlay_text(id), Some("Field 'Username' is required"));
        assert_eq!(session.modal_title(), Some("Add New User"));
    }

    #[tokio::test]
    async fn test_add_local_user_returns_to_user_list() {
        let dir = TempDir::new().unwrap();
        let (mut session, _queue) = session(&dir);
        type_text(&mut session, "reporter");
        session.handle_key(key(KeyCode::Tab));
        session.handle_key(key(KeyCode::Tab));
        type_text(&mut session, "s3cret");
        session.handle_key(key(KeyCode::Tab));
        session.handle_key(key(KeyCode::Enter));

        let user = session.config.instance("db").unwrap().user("reporter").unwrap();
        assert_eq!(user.auth_type, "Local");
        assert_eq!(user.params.get("password").map(String::as_str), Some("s3cret"));
        assert_eq!(session.modal_title(), Some("Select a user"));
        let list = session.modal_content_mut::<UserListContent>().unwrap();
        assert_eq!(list.table().rows()[0], vec!["reporter", "[auth=Local]"]);
    }

    #[tokio::test]
    async fn test_vault_user_needs_every_field() {
        let dir = TempDir::new().unwrap();
        let (mut session, _queue) = session(&dir);
        type_text(&mut session, "ops");
        session.handle_key(key(KeyCode::Tab));
        session.handle_key(key(KeyCode::Right));
        // Skip the vault inputs and press Add
        for _ in 0..5 {
            session.handle_key(key(KeyCode::Tab));
        }
        session.handle_key(key(KeyCode::Enter));
        let (id, _) = session.top_overlay().unwrap();
        assert_eq!(session.overlay_text(id), Some("Field 'Vault Address' is required"));
        assert!(session.config.instance("db").unwrap().users.is_empty());
    }
}
