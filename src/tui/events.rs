//! Event Handling - terminal input polling and global shortcuts

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Duration;

/// Session-wide actions bound to keys outside any view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    FocusCommandBar,
    None,
}

/// Terminal events the render loop reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize,
}

/// Map a key to a global action
pub fn global_action(key: KeyEvent) -> Action {
    match (key.modifiers, key.code) {
        // Quit: q or Ctrl+C
        (KeyModifiers::NONE, KeyCode::Char('q')) => Action::Quit,
        (KeyModifiers::CONTROL, KeyCode::Char('c')) => Action::Quit,

        (KeyModifiers::NONE, KeyCode::Char('/')) => Action::FocusCommandBar,

        _ => Action::None,
    }
}

/// Poll for input with timeout
pub fn poll_event(timeout: Duration) -> std::io::Result<Option<AppEvent>> {
    if event::poll(timeout)? {
        match event::read()? {
            // Release/repeat events are reported on some platforms
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                return Ok(Some(AppEvent::Key(key)))
            }
            Event::Resize(_, _) => return Ok(Some(AppEvent::Resize)),
            _ => {}
        }
    }
    Ok(None)
}

/// Whether `key` is a plain character without Ctrl/Alt
pub fn plain_char(key: &KeyEvent) -> Option<char> {
    match key.code {
        KeyCode::Char(c)
            if !key
                .modifiers
                .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
        {
            Some(c)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quit_action() {
        let key = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        assert_eq!(global_action(key), Action::Quit);
    }

    #[test]
    fn test_ctrl_c_quit() {
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(global_action(key), Action::Quit);
    }

    #[test]
    fn test_slash_focuses_command_bar() {
        let key = KeyEvent::new(KeyCode::Char('/'), KeyModifiers::NONE);
        assert_eq!(global_action(key), Action::FocusCommandBar);
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE);
        assert_eq!(global_action(key), Action::None);
    }

    #[test]
    fn test_plain_char() {
        assert_eq!(
            plain_char(&KeyEvent::new(KeyCode::Char('A'), KeyModifiers::SHIFT)),
            Some('A')
        );
        assert_eq!(
            plain_char(&KeyEvent::new(KeyCode::Char('x'), KeyModifiers::CONTROL)),
            None
        );
        assert_eq!(plain_char(&KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)), None);
    }
}
