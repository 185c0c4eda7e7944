//! View contract - the capability bundle every screen implements

use std::any::Any;
use std::future::Future;

use crossterm::event::KeyEvent;
use ratatui::{layout::Rect, Frame};
use tokio_util::sync::CancellationToken;

use super::dispatch::{Dispatcher, OverlayId};
use super::session::Session;
use super::theme::Theme;
use crate::error::{CsqlError, Result};

/// Legend entry shown in the header, display only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBinding {
    pub hint: String,
    pub description: String,
}

impl KeyBinding {
    pub fn new(hint: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            hint: hint.into(),
            description: description.into(),
        }
    }
}

/// Read-only context shown in the header (instance, user, database)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Info {
    pub key: String,
    pub value: String,
}

impl Info {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A screen. Views are built anywhere (often on a worker, from a backend
/// result) and installed on the render thread via the session.
pub trait View: Send {
    fn title(&self) -> String;

    /// Build the interactive content. Called exactly once per installation.
    fn content(&mut self, session: &mut Session, scope: &Scope) -> Box<dyn Content>;

    fn info(&self) -> Vec<Info> {
        Vec::new()
    }

    fn key_bindings(&self) -> Vec<KeyBinding> {
        Vec::new()
    }

    /// Handle text submitted from the command bar
    fn execute_command(&mut self, _session: &mut Session, command: &str) -> Result<()> {
        Err(CsqlError::UnknownCommand {
            command: command.to_string(),
        })
    }
}

/// The live, render-thread half of a view
pub trait Content: 'static {
    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme);

    fn handle_key(&mut self, key: KeyEvent, session: &mut Session);

    /// When true the global `/`, `q` and Ctrl-C shortcuts are not intercepted
    fn captures_all_input(&self) -> bool {
        false
    }

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Where a content lives inside the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Main(u64),
    Overlay(OverlayId),
}

/// Handle given to a content at construction: its slot address, the
/// cancellation token of its lifetime, and the dispatcher.
#[derive(Clone)]
pub struct Scope {
    slot: Slot,
    token: CancellationToken,
    dispatcher: Dispatcher,
}

impl Scope {
    pub(crate) fn new(slot: Slot, token: CancellationToken, dispatcher: Dispatcher) -> Self {
        Self {
            slot,
            token,
            dispatcher,
        }
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Run `f` on the render thread unless this scope has been left
    pub fn dispatch<F>(&self, f: F)
    where
        F: FnOnce(&mut Session) + Send + 'static,
    {
        self.dispatcher.enqueue_scoped(self.token.clone(), f);
    }

    /// Run `f` against this scope's content, which must be a `C`
    pub fn update<C, F>(&self, f: F)
    where
        C: Content,
        F: FnOnce(&mut C, &mut Session) + Send + 'static,
    {
        let slot = self.slot;
        self.dispatch(move |session| {
            session.with_content::<C, _>(slot, f);
        });
    }

    /// Spawn background work on the tokio runtime.
    ///
    /// The future always runs to completion; only its scoped dispatches are
    /// dropped once the scope is left.
    pub fn spawn<F>(&self, future: F) -> tokio::task::JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(future)
    }
}
