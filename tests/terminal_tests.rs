//! Terminal bridge against real child processes
#![cfg(unix)]

use std::any::Any;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use nix::sys::signal::kill;
use nix::unistd::Pid;
use ratatui::{layout::Rect, Frame};

use csql::config::Config;
use csql::error::CsqlError;
use csql::tui::dispatch::{channel, DispatchQueue};
use csql::tui::session::OverlayKind;
use csql::tui::terminal::{ShellCommand, TerminalContent, TerminalState, TerminalView};
use csql::tui::theme::Theme;
use csql::tui::view::Scope;
use csql::tui::{Content, Session, View};

struct Tables;

struct Empty;

impl Content for Empty {
    fn render(&mut self, _frame: &mut Frame, _area: Rect, _theme: &Theme) {}
    fn handle_key(&mut self, _key: KeyEvent, _session: &mut Session) {}
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl View for Tables {
    fn title(&self) -> String {
        "Tables".to_string()
    }

    fn content(&mut self, _session: &mut Session, _scope: &Scope) -> Box<dyn Content> {
        Box::new(Empty)
    }
}

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

fn ctrl(c: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
}

fn sh(script: &str) -> ShellCommand {
    ShellCommand::new("sh").arg("-c").arg(script)
}

fn pid(session: &mut Session) -> i32 {
    session
        .main_content_mut::<TerminalContent>()
        .and_then(|t| t.pid())
        .unwrap() as i32
}

fn terminal(command: ShellCommand) -> TerminalView {
    TerminalView::new(
        "psql",
        Vec::new(),
        async move { Ok::<_, CsqlError>(command) },
        || Box::new(Tables) as Box<dyn View>,
    )
}

fn session() -> (Session, DispatchQueue) {
    let (dispatcher, queue) = channel();
    (Session::new(Config::default(), dispatcher), queue)
}

async fn drain_until(session: &mut Session, queue: &mut DispatchQueue, done: impl Fn(&mut Session) -> bool) {
    for _ in 0..400 {
        queue.drain(session);
        if done(session) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

fn state(session: &mut Session) -> Option<TerminalState> {
    session.main_content_mut::<TerminalContent>().map(|t| t.state())
}

fn output(session: &mut Session) -> String {
    session
        .main_content_mut::<TerminalContent>()
        .map(|t| t.scrollback().text_lines().join("\n"))
        .unwrap_or_default()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_escape_kills_child_and_returns() {
    let (mut session, mut queue) = session();
    session.set_view(Box::new(terminal(ShellCommand::new("cat"))));
    assert_eq!(state(&mut session), Some(TerminalState::Starting));

    drain_until(&mut session, &mut queue, |s| state(s) == Some(TerminalState::Running)).await;
    let pid = pid(&mut session);

    // q and / go to the child, not the session
    for c in "q/hello".chars() {
        session.handle_key(key(KeyCode::Char(c)));
    }
    session.handle_key(key(KeyCode::Enter));
    assert!(!session.should_quit());
    drain_until(&mut session, &mut queue, |s| output(s).contains("q/hello")).await;

    session.handle_key(key(KeyCode::Esc));
    assert_eq!(session.main_title(), Some("Tables"));
    assert!(kill(Pid::from_raw(pid), None).is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_child_exit_is_reported_in_scrollback() {
    let (mut session, mut queue) = session();
    session.set_view(Box::new(terminal(ShellCommand::new("echo").arg("bye"))));

    drain_until(&mut session, &mut queue, |s| state(s) == Some(TerminalState::Closed)).await;
    let text = output(&mut session);
    assert!(text.contains("bye"));
    assert!(text.contains("[process exited]"));

    session.handle_key(key(KeyCode::Esc));
    assert_eq!(session.main_title(), Some("Tables"));
}

#[tokio::test]
async fn test_missing_program_reports_error() {
    let (mut session, mut queue) = session();
    session.set_view(Box::new(terminal(ShellCommand::new("/nonexistent/psql"))));

    drain_until(&mut session, &mut queue, |s| state(s) == Some(TerminalState::Closed)).await;
    let (id, kind) = session.top_overlay().unwrap();
    assert_eq!(kind, OverlayKind::Message);
    assert!(session
        .overlay_text(id)
        .unwrap()
        .starts_with("Error starting shell '/nonexistent/psql'"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ctrl_c_interrupts_without_killing() {
    let (mut session, mut queue) = session();
    let script = r#"trap "echo got-int" INT; echo ready; while :; do sleep 0.1; done"#;
    session.set_view(Box::new(terminal(sh(script))));
    drain_until(&mut session, &mut queue, |s| output(s).contains("ready")).await;
    let pid = pid(&mut session);

    session.handle_key(ctrl('c'));
    drain_until(&mut session, &mut queue, |s| output(s).contains("got-int")).await;
    assert_eq!(state(&mut session), Some(TerminalState::Running));
    assert!(kill(Pid::from_raw(pid), None).is_ok());
    assert!(session.top_overlay().is_none());

    session.handle_key(key(KeyCode::Esc));
    assert!(kill(Pid::from_raw(pid), None).is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_keys_reach_child_as_terminal_bytes() {
    let (mut session, mut queue) = session();
    // Raw mode: the child sees every byte unchanged, one line of hex per 16
    let script = "stty raw -echo; echo ready; head -c 16 | od -An -tx1";
    session.set_view(Box::new(terminal(sh(script))));
    drain_until(&mut session, &mut queue, |s| output(s).contains("ready")).await;

    for event in [
        key(KeyCode::Backspace),
        ctrl('d'),
        key(KeyCode::Up),
        key(KeyCode::Down),
        key(KeyCode::Right),
        key(KeyCode::Left),
        key(KeyCode::Enter),
        key(KeyCode::Tab),
    ] {
        session.handle_key(event);
    }
    drain_until(&mut session, &mut queue, |s| state(s) == Some(TerminalState::Closed)).await;

    let hex = output(&mut session).split_whitespace().collect::<Vec<_>>().join(" ");
    assert!(
        hex.contains("7f 04 1b 5b 41 1b 5b 42 1b 5b 43 1b 5b 44 0a 09"),
        "unexpected child input: {hex}"
    );
}
