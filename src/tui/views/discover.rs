//! Discovery: pick a strategy, fill its form, confirm the found instances

use std::any::Any;
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{layout::Rect, Frame};
use tracing::{info, warn};

use super::instance_list::refresh_instance_list;
use super::persist_config;
use crate::config::InstanceConfig;
use crate::discovery::{self, Discovery, InputSpec};
use crate::error::CsqlError;
use crate::tui::session::Session;
use crate::tui::theme::Theme;
use crate::tui::view::{Content, KeyBinding, Scope, View};
use crate::tui::widgets::{Form, FormEvent, SelectableTable};

const ADD: &str = "Add";
const CANCEL: &str = "Cancel";

// ─────────────────────────────────────────────────────────────────────────────
// Strategy list
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct DiscoverView;

impl DiscoverView {
    pub fn new() -> Self {
        Self
    }
}

impl View for DiscoverView {
    fn title(&self) -> String {
        "Discover Instances".to_string()
    }

    fn content(&mut self, _session: &mut Session, _scope: &Scope) -> Box<dyn Content> {
        let strategies = discovery::all();
        let rows = strategies
            .iter()
            .map(|s| vec![s.label().to_string()])
            .collect();
        Box::new(DiscoverContent {
            strategies,
            table: SelectableTable::new(["Method"], rows),
        })
    }

    fn key_bindings(&self) -> Vec<KeyBinding> {
        vec![KeyBinding::new("<enter>", "Select method")]
    }
}

struct DiscoverContent {
    strategies: Vec<Arc<dyn Discovery>>,
    table: SelectableTable,
}

impl Content for DiscoverContent {
    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        self.table.render(frame, area, theme);
    }

    fn handle_key(&mut self, key: KeyEvent, session: &mut Session) {
        if self.table.handle_key(key) || key.code != KeyCode::Enter {
            return;
        }
        match self
            .table
            .selected_index()
            .and_then(|i| self.strategies.get(i))
        {
            Some(strategy) => {
                let view = DiscoverDetailView::new(Arc::clone(strategy));
                session.show_modal(Box::new(view));
            }
            None => session.show_error(&CsqlError::NoSelection),
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Strategy form
// ─────────────────────────────────────────────────────────────────────────────

pub struct DiscoverDetailView {
    strategy: Arc<dyn Discovery>,
}

impl DiscoverDetailView {
    pub fn new(strategy: Arc<dyn Discovery>) -> Self {
        Self { strategy }
    }
}

impl View for DiscoverDetailView {
    fn title(&self) -> String {
        format!("Discover Instances - {}", self.strategy.label())
    }

    fn content(&mut self, _session: &mut Session, _scope: &Scope) -> Box<dyn Content> {
        let inputs = self.strategy.inputs();
        let mut form = Form::new();
        for input in &inputs {
            form = match input {
                InputSpec::Text { label, default } => form.text(*label, default.clone()),
                InputSpec::Select { label, options } => {
                    form.select(*label, options.iter().map(|o| o.label.clone()))
                }
            };
        }
        let form = form.button(ADD).button(CANCEL);
        Box::new(DiscoverDetailContent {
            strategy: Arc::clone(&self.strategy),
            inputs,
            form,
        })
    }

    fn key_bindings(&self) -> Vec<KeyBinding> {
        vec![
            KeyBinding::new("<tab>", "Next field"),
            KeyBinding::new("<enter>", "Press button"),
        ]
    }
}

pub struct DiscoverDetailContent {
    strategy: Arc<dyn Discovery>,
    inputs: Vec<InputSpec>,
    form: Form,
}

impl DiscoverDetailContent {
    pub fn form(&self) -> &Form {
        &self.form
    }

    /// Copy the chosen option's presets into the other inputs
    fn apply_presets(&mut self, label: &str, index: usize) {
        let presets = self.inputs.iter().find_map(|input| match input {
            InputSpec::Select { label: l, options } if *l == label => {
                options.get(index).map(|o| o.presets.clone())
            }
            _ => None,
        });
        for (field, value) in presets.unwrap_or_default() {
            self.form.set_value(field, &value);
        }
    }

    /// Run the strategy on a worker. The modal is gone by the time results
    /// arrive, so everything after goes through the unscoped dispatcher.
    fn submit(&self, session: &mut Session) {
        let values = self.form.values();
        let strategy = Arc::clone(&self.strategy);
        session.close_modal();
        let message = session.show_message("Discovering instance(s)", false);
        let dispatcher = session.dispatcher().clone();

        tokio::spawn(async move {
            let result = strategy.discover(&values).await;
            dispatcher.close_message_async(message);
            match result {
                Ok(found) if found.is_empty() => {
                    dispatcher.show_message_async("No instances discovered", true);
                }
                Ok(found) => {
                    info!(strategy = strategy.kind(), count = found.len(), "instances discovered");
                    dispatcher.show_alert_async(confirm_text(&found), move |session| merge(session, found), |_| {});
                }
                Err(err) => {
                    warn!(strategy = strategy.kind(), error = %err, "discovery failed");
                    dispatcher.show_error_async(&err);
                }
            }
        });
    }
}

fn confirm_text(found: &[InstanceConfig]) -> String {
    let names: Vec<&str> = found.iter().map(|i| i.name.as_str()).collect();
    format!(
        "These new instances will be added to config:\n\n{}",
        names.join("\n")
    )
}

fn merge(session: &mut Session, found: Vec<InstanceConfig>) {
    for instance in found {
        session.config.add_instance(instance);
    }
    persist_config(session);
    refresh_instance_list(session);
}

impl Content for DiscoverDetailContent {
    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        self.form.render(frame, area, theme);
    }

    fn handle_key(&mut self, key: KeyEvent, session: &mut Session) {
        match self.form.handle_key(key) {
            FormEvent::SelectChanged { label, index } => self.apply_presets(&label, index),
            FormEvent::Pressed(button) if button == ADD => self.submit(session),
            FormEvent::Pressed(button) if button == CANCEL => {
                session.show_modal(Box::new(DiscoverView::new()));
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
    use crate::config::Config;
    use crate::discovery::ManualDiscovery;
    use crate::tui::dispatch::{channel, DispatchQueue};
    use crate::tui::session::OverlayKind;
    use crate::tui::views::{InstanceListContent, InstanceListView};
    use crossterm::event::KeyModifiers;
    use std::time::Duration;
    use tempfile::TempDir;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(session: &mut Session, text: &str) {
        for c in text.chars() {
            session.handle_key(key(KeyCode::Char(c)));
        }
    }

    fn manual_session(dir: &TempDir) -> (Session, DispatchQueue) {
        let (dispatcher, queue) = channel();
        let config = Config::load(&dir.path().join("config.toml")).unwrap();
        let mut session = Session::new(config, dispatcher);
        session.set_view(Box::new(InstanceListView::new()));
        session.handle_key(key(KeyCode::Char('a')));
        assert_eq!(session.modal_title(), Some("Discover Instances"));
        session.handle_key(key(KeyCode::Enter));
        assert_eq!(session.modal_title(), Some("Discover Instances - Manual"));
        (session, queue)
    }

    async fn drain_until(session: &mut Session, queue: &mut DispatchQueue, done: impl Fn(&Session) -> bool) {
        for _ in 0..200 {
            queue.drain(session);
            if done(session) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[test]
    fn test_confirm_text_lists_names() {
        let found = vec![
            InstanceConfig {
                name: "a".to_string(),
                ..Default::default()
            },
            InstanceConfig {
                name: "b".to_string(),
                ..Default::default()
            },
        ];
        assert_eq!(
            confirm_text(&found),
            "These new instances will be added to config:\n\na\nb"
        );
    }

    #[tokio::test]
    async fn test_select_applies_port_preset() {
        let dir = TempDir::new().unwrap();
        let (mut session, _queue) = manual_session(&dir);
        session.handle_key(key(KeyCode::Right));
        let form = session.modal_content_mut::<DiscoverDetailContent>().unwrap().form();
        assert_eq!(form.value("Database Type"), Some("MySQL"));
        assert_eq!(form.value("Port"), Some("3306"));
    }

    #[tokio::test]
    async fn test_manual_discovery_merges_after_confirm() {
        let dir = TempDir::new().unwrap();
        let (mut session, mut queue) = manual_session(&dir);
        // Database Type, Name, Host, Port, Add
        session.handle_key(key(KeyCode::Tab));
        type_text(&mut session, "billing");
        session.handle_key(key(KeyCode::Tab));
        type_text(&mut session, "10.0.0.5");
        session.handle_key(key(KeyCode::Tab));
        session.handle_key(key(KeyCode::Tab));
        session.handle_key(key(KeyCode::Enter));

        assert!(!session.has_modal());
        let (discovering, _) = session.top_overlay().unwrap();
        assert_eq!(session.overlay_text(discovering), Some("Discovering instance(s)"));

        drain_until(&mut session, &mut queue, |s| {
            matches!(s.top_overlay(), Some((_, OverlayKind::Alert)))
        })
        .await;
        assert!(!session.has_overlay(discovering));
        let (alert, _) = session.top_overlay().unwrap();
        assert_eq!(
            session.overlay_text(alert),
            Some("These new instances will be added to config:\n\nbilling")
        );

        session.handle_key(key(KeyCode::Enter));
        let instance = session.config.instance("billing").unwrap();
        assert_eq!(instance.host, "10.0.0.5");
        assert_eq!(instance.source, ManualDiscovery::new().kind());
        let list = session.main_content_mut::<InstanceListContent>().unwrap();
        assert_eq!(list.table().rows().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_discovery_shows_error() {
        let dir = TempDir::new().unwrap();
        let (mut session, mut queue) = manual_session(&dir);
        // Submit without a name
        for _ in 0..4 {
            session.handle_key(key(KeyCode::Tab));
        }
        session.handle_key(key(KeyCode::Enter));

        drain_until(&mut session, &mut queue, |s| s.overlay_count() == 1 && {
            let (id, _) = s.top_overlay().unwrap();
            s.overlay_text(id) != Some("Discovering instance(s)")
        })
        .await;
        let (id, _) = session.top_overlay().unwrap();
        assert_eq!(session.overlay_text(id), Some("Field 'Name' is required"));
        assert!(session.config.instances.is_empty());
    }
}
