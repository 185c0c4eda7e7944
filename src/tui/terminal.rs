//! Terminal Bridge - an interactive subprocess embedded in a view
//!
//! ```text
//!            ┌──────── worker ────────┐
//! Starting ──┤ launch (credentials)   ├──► Running ──► Closing ──► Closed
//!            │ spawn on pty 24x80     │      │  ▲
//!            └────────────────────────┘      │  │ reader thread: 4096-byte
//!                  failure ──► Closed        │  │ chunks via scoped dispatch
//!                                            ▼  │
//!                                     keys ──► pty master
//! ```
//!
//! The [`PtyProcess`] is owned by the content. Dropping it (view left, scoped
//! task discarded, or explicit close) kills the child's process group and
//! reaps the child. Once running, the pty follows the size of the pane it is
//! rendered into and output wraps at that width.

use std::future::Future;
use std::io::{Read, Write};
use std::pin::Pin;
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use tracing::{debug, info, warn};

use super::ansi::{AnsiDecoder, Scrollback, DEFAULT_MAX_LINES};
use super::events::plain_char;
use super::session::Session;
use super::theme::Theme;
use super::view::{Content, Info, KeyBinding, Scope, View};
use crate::error::{CsqlError, Result};

/// Bytes read from the pty master per chunk
pub const READ_CHUNK: usize = 4096;

pub const DEFAULT_ROWS: u16 = 24;
pub const DEFAULT_COLS: u16 = 80;

/// Program and arguments run inside the pty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ShellCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Resolves the command to run; may be slow (credentials)
pub type Launch = Pin<Box<dyn Future<Output = Result<ShellCommand>> + Send>>;

/// Builds the view to return to when the terminal is left
pub type ReturnTo = Arc<dyn Fn() -> Box<dyn View> + Send + Sync>;

// ─────────────────────────────────────────────────────────────────────────────
// PTY process
// ─────────────────────────────────────────────────────────────────────────────

/// A child process attached to a pseudo-terminal
pub struct PtyProcess {
    child: Box<dyn Child + Send + Sync>,
    master: Option<Box<dyn MasterPty + Send>>,
    writer: Option<Box<dyn Write + Send>>,
    closed: bool,
}

fn pty_error(err: impl std::fmt::Display) -> CsqlError {
    CsqlError::Pty(err.to_string())
}

impl PtyProcess {
    /// Spawn `command` on a fresh pty pair. Returns the process and a reader
    /// for the master side.
    pub fn spawn(command: &ShellCommand, rows: u16, cols: u16) -> Result<(Self, Box<dyn Read + Send>)> {
        let pair = native_pty_system()
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(pty_error)?;

        let mut cmd = CommandBuilder::new(&command.program);
        cmd.args(&command.args);
        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| CsqlError::Spawn {
                program: command.program.clone(),
                details: e.to_string(),
            })?;
        // Only the child keeps the slave open, so reads see EOF once it exits
        drop(pair.slave);

        let reader = pair.master.try_clone_reader().map_err(pty_error)?;
        let writer = pair.master.take_writer().map_err(pty_error)?;
        info!(program = %command.program, pid = ?child.process_id(), "spawned pty process");

        Ok((
            Self {
                child,
                master: Some(pair.master),
                writer: Some(writer),
                closed: false,
            },
            reader,
        ))
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.process_id()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| pty_error("terminal is closed"))?;
        writer.write_all(bytes).map_err(pty_error)?;
        writer.flush().map_err(pty_error)
    }

    /// Tell the child its terminal is now `rows` x `cols`
    pub fn resize(&mut self, rows: u16, cols: u16) -> Result<()> {
        let master = self.master.as_ref().ok_or_else(|| pty_error("terminal is closed"))?;
        master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(pty_error)
    }

    /// Deliver SIGINT to the child
    #[cfg(unix)]
    pub fn interrupt(&mut self) -> Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let pid = self.pid().ok_or_else(|| pty_error("child has no pid"))?;
        kill(Pid::from_raw(pid as i32), Signal::SIGINT).map_err(pty_error)
    }

    #[cfg(not(unix))]
    pub fn interrupt(&mut self) -> Result<()> {
        self.write(&[0x03])
    }

    /// Release the pty, kill the child's process group and reap the child.
    /// Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.writer.take();
        self.master.take();
        // Before reaping, while the group id cannot be reused. A pager
        // started by the child holds the slave open too.
        self.kill_group();

        match self.child.try_wait() {
            Ok(Some(status)) => debug!(?status, "pty child already exited"),
            _ => {
                if let Err(err) = self.child.kill() {
                    debug!(error = %err, "kill pty child");
                }
                match self.child.wait() {
                    Ok(status) => debug!(?status, "pty child reaped"),
                    Err(err) => warn!(error = %err, "failed to reap pty child"),
                }
            }
        }
    }
}

impl PtyProcess {
    /// The child leads its own session, so its pid is also its group id
    #[cfg(unix)]
    fn kill_group(&self) {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = self.pid() {
            if let Err(err) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                debug!(error = %err, "kill pty process group");
            }
        }
    }

    #[cfg(not(unix))]
    fn kill_group(&self) {}
}

impl Drop for PtyProcess {
    fn drop(&mut self) {
        self.close();
    }
}

fn spawn_reader(mut reader: Box<dyn Read + Send>, scope: Scope) -> Result<()> {
    std::thread::Builder::new()
        .name("pty-reader".to_string())
        .spawn(move || {
            let mut buf = [0u8; READ_CHUNK];
            loop {
                if scope.is_cancelled() {
                    break;
                }
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        let chunk = buf[..n].to_vec();
                        scope.update::<TerminalContent, _>(move |terminal, _| terminal.feed(&chunk));
                    }
                    Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(err) => {
                        // EIO once the child side is gone
                        debug!(error = %err, "pty read ended");
                        break;
                    }
                }
            }
            scope.update::<TerminalContent, _>(|terminal, _| terminal.on_exit());
        })
        .map(|_| ())
        .map_err(pty_error)
}

// ─────────────────────────────────────────────────────────────────────────────
// View
// ─────────────────────────────────────────────────────────────────────────────

pub struct TerminalView {
    title: String,
    info: Vec<Info>,
    launch: Option<Launch>,
    return_to: ReturnTo,
    rows: u16,
    cols: u16,
}

impl TerminalView {
    pub fn new<L, R>(title: impl Into<String>, info: Vec<Info>, launch: L, return_to: R) -> Self
    where
        L: Future<Output = Result<ShellCommand>> + Send + 'static,
        R: Fn() -> Box<dyn View> + Send + Sync + 'static,
    {
        Self {
            title: title.into(),
            info,
            launch: Some(Box::pin(launch)),
            return_to: Arc::new(return_to),
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
        }
    }
}

impl View for TerminalView {
    fn title(&self) -> String {
        self.title.clone()
    }

    fn content(&mut self, _session: &mut Session, scope: &Scope) -> Box<dyn Content> {
        let mut content = TerminalContent::new(Arc::clone(&self.return_to), self.rows, self.cols);
        let Some(launch) = self.launch.take() else {
            content.state = TerminalState::Closed;
            return Box::new(content);
        };

        let (rows, cols) = (self.rows, self.cols);
        let worker = scope.clone();
        scope.spawn(async move {
            let scope = worker;
            let spawned = match launch.await {
                Ok(command) => {
                    tokio::task::spawn_blocking(move || PtyProcess::spawn(&command, rows, cols))
                        .await
                        .map_err(pty_error)
                        .and_then(|r| r)
                }
                Err(err) => Err(err),
            };

            match spawned {
                Ok((process, reader)) => {
                    let reader_scope = scope.clone();
                    // Dropped with the process if the view was left meanwhile
                    scope.update::<TerminalContent, _>(move |terminal, session| {
                        terminal.attach(process, reader, reader_scope, session)
                    });
                }
                Err(err) => {
                    warn!(error = %err, "terminal failed to start");
                    let slot = scope.slot();
                    scope.dispatch(move |session| {
                        session.with_content::<TerminalContent, _>(slot, |terminal, _| {
                            terminal.state = TerminalState::Closed;
                        });
                        session.show_error(&err);
                    });
                }
            }
        });

        Box::new(content)
    }

    fn info(&self) -> Vec<Info> {
        self.info.clone()
    }

    fn key_bindings(&self) -> Vec<KeyBinding> {
        vec![
            KeyBinding::new("<esc>", "Go back"),
            KeyBinding::new("<ctrl-c>", "Interrupt"),
            KeyBinding::new("<ctrl-d>", "End of input"),
        ]
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Content
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalState {
    Starting,
    Running,
    Closing,
    Closed,
}

pub struct TerminalContent {
    state: TerminalState,
    scrollback: Scrollback,
    decoder: AnsiDecoder,
    process: Option<PtyProcess>,
    return_to: ReturnTo,
    /// Rows and columns the child was last told about
    size: (u16, u16),
}

impl TerminalContent {
    fn new(return_to: ReturnTo, rows: u16, cols: u16) -> Self {
        Self {
            state: TerminalState::Starting,
            scrollback: Scrollback::new(DEFAULT_MAX_LINES, cols as usize),
            decoder: AnsiDecoder::new(),
            process: None,
            return_to,
            size: (rows, cols),
        }
    }

    pub fn state(&self) -> TerminalState {
        self.state
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(PtyProcess::pid)
    }

    pub fn scrollback(&self) -> &Scrollback {
        &self.scrollback
    }

    fn attach(
        &mut self,
        process: PtyProcess,
        reader: Box<dyn Read + Send>,
        scope: Scope,
        session: &mut Session,
    ) {
        if self.state != TerminalState::Starting {
            return;
        }
        self.process = Some(process);
        match spawn_reader(reader, scope) {
            Ok(()) => self.state = TerminalState::Running,
            Err(err) => {
                self.close();
                session.show_error(&err);
            }
        }
    }

    /// Follow the pane size. Lines already written keep their width.
    pub fn resize(&mut self, rows: u16, cols: u16) {
        if rows == 0 || cols == 0 || self.size == (rows, cols) {
            return;
        }
        let Some(process) = self.process.as_mut() else {
            return;
        };
        match process.resize(rows, cols) {
            Ok(()) => {
                debug!(rows, cols, "pty resized");
                self.size = (rows, cols);
                self.scrollback.set_cols(cols as usize);
            }
            Err(err) => warn!(error = %err, "failed to resize pty"),
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.decoder.feed(bytes, &mut self.scrollback);
    }

    fn on_exit(&mut self) {
        if self.state == TerminalState::Running {
            self.close();
            self.scrollback.push_note("[process exited]");
        }
    }

    /// Close the pty and terminate the child. Idempotent.
    pub fn close(&mut self) {
        if matches!(self.state, TerminalState::Closing | TerminalState::Closed) {
            return;
        }
        self.state = TerminalState::Closing;
        if let Some(mut process) = self.process.take() {
            process.close();
        }
        self.state = TerminalState::Closed;
    }

    fn send(&mut self, bytes: &[u8], session: &mut Session) {
        let Some(process) = self.process.as_mut() else {
            return;
        };
        if let Err(err) = process.write(bytes) {
            self.close();
            session.show_error(&err);
        }
    }
}

impl Content for TerminalContent {
    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        if self.state == TerminalState::Running {
            self.resize(area.height, area.width);
        }
        let lines = if self.state == TerminalState::Starting && self.scrollback.is_empty() {
            vec![Line::from(Span::styled("Starting ...", theme.dimmed()))]
        } else {
            self.scrollback.lines()
        };
        // Follow the end of the output
        let offset = lines.len().saturating_sub(area.height as usize);
        let scroll = u16::try_from(offset).unwrap_or(u16::MAX);
        frame.render_widget(
            Paragraph::new(lines).style(theme.text()).scroll((scroll, 0)),
            area,
        );
    }

    fn handle_key(&mut self, key: KeyEvent, session: &mut Session) {
        match (key.modifiers, key.code) {
            (_, KeyCode::Esc) => {
                self.close();
                session.set_view((self.return_to)());
            }
            (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                if let Some(process) = self.process.as_mut() {
                    if let Err(err) = process.interrupt() {
                        session.show_error(&err);
                    }
                }
            }
            (KeyModifiers::CONTROL, KeyCode::Char('d')) => self.send(&[0x04], session),
            (_, KeyCode::Enter) => self.send(b"\n", session),
            (_, KeyCode::Tab) => self.send(b"\t", session),
            (_, KeyCode::Backspace) => self.send(&[0x7f], session),
            (_, KeyCode::Up) => self.send(b"\x1b[A", session),
            (_, KeyCode::Down) => self.send(b"\x1b[B", session),
            (_, KeyCode::Right) => self.send(b"\x1b[C", session),
            (_, KeyCode::Left) => self.send(b"\x1b[D", session),
            _ => {
                if let Some(c) = plain_char(&key) {
                    let mut buf = [0u8; 4];
                    self.send(c.encode_utf8(&mut buf).as_bytes(), session);
                }
            }
        }
    }

    fn captures_all_input(&self) -> bool {
        true
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Back;

    impl View for Back {
        fn title(&self) -> String {
            "back".to_string()
        }

        fn content(&mut self, _session: &mut Session, _scope: &Scope) -> Box<dyn Content> {
            Box::new(content())
        }
    }

    fn content() -> TerminalContent {
        TerminalContent::new(Arc::new(|| Box::new(Back) as Box<dyn View>), DEFAULT_ROWS, DEFAULT_COLS)
    }

    #[test]
    fn test_close_is_idempotent_without_process() {
        let mut content = content();
        content.close();
        assert_eq!(content.state(), TerminalState::Closed);
        content.close();
        assert_eq!(content.state(), TerminalState::Closed);
    }

    #[test]
    fn test_exit_note_only_when_running() {
        let mut content = content();
        content.on_exit();
        assert!(content.scrollback().is_empty());
        content.state = TerminalState::Running;
        content.feed(b"bye\r\n");
        content.on_exit();
        assert_eq!(content.state(), TerminalState::Closed);
        assert!(content.scrollback().text_lines().contains(&"[process exited]".to_string()));
    }

    #[test]
    fn test_shell_command_builder() {
        let cmd = ShellCommand::new("psql").arg("postgresql://u@h:5432/db");
        assert_eq!(cmd.program, "psql");
        assert_eq!(cmd.args, vec!["postgresql://u@h:5432/db"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_pty_process_close_reaps_child() {
        let (mut process, _reader) =
            PtyProcess::spawn(&ShellCommand::new("sleep").arg("30"), DEFAULT_ROWS, DEFAULT_COLS)
                .unwrap();
        let pid = process.pid().unwrap() as i32;
        process.close();
        process.close();
        assert!(process.is_closed());
        let alive = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok();
        assert!(!alive);
    }

    #[cfg(unix)]
    #[test]
    fn test_close_kills_background_children() {
        use std::sync::mpsc;
        use std::time::Duration;

        // The background sleep keeps the slave open after sh is killed
        let command = ShellCommand::new("sh").arg("-c").arg("sleep 30 & echo started; wait");
        let (mut process, mut reader) = PtyProcess::spawn(&command, DEFAULT_ROWS, DEFAULT_COLS).unwrap();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut buf = [0u8; READ_CHUNK];
            let mut seen = String::new();
            loop {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        seen.push_str(&String::from_utf8_lossy(&buf[..n]));
                        if seen.contains("started") {
                            let _ = tx.send("started");
                        }
                    }
                }
            }
            let _ = tx.send("eof");
        });
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok("started"));

        process.close();
        let ended = loop {
            match rx.recv_timeout(Duration::from_secs(5)) {
                Ok("eof") => break true,
                Ok(_) => continue,
                Err(_) => break false,
            }
        };
        assert!(ended, "pty reader still blocked after close");
    }

    #[cfg(unix)]
    #[test]
    fn test_render_resizes_running_pty() {
        use ratatui::{backend::TestBackend, Terminal};

        let (process, _reader) = PtyProcess::spawn(&ShellCommand::new("cat"), DEFAULT_ROWS, DEFAULT_COLS).unwrap();
        let mut content = content();
        content.process = Some(process);
        content.state = TerminalState::Running;

        let mut terminal = Terminal::new(TestBackend::new(40, 10)).unwrap();
        terminal
            .draw(|f| {
                let area = f.area();
                content.render(f, area, &Theme::new());
            })
            .unwrap();
        assert_eq!(content.size, (10, 40));
        assert_eq!(content.scrollback().cols(), 40);

        content.feed("x".repeat(50).as_bytes());
        assert_eq!(content.scrollback().text_lines(), vec!["x".repeat(40), "x".repeat(10)]);

        // A zero-sized pane leaves the pty alone
        content.resize(0, 0);
        assert_eq!(content.size, (10, 40));
        content.close();
    }

    #[test]
    fn test_resize_without_process_keeps_size() {
        let mut content = content();
        content.resize(10, 40);
        assert_eq!(content.size, (DEFAULT_ROWS, DEFAULT_COLS));
        assert_eq!(content.scrollback().cols(), DEFAULT_COLS as usize);
    }

    #[test]
    fn test_spawn_missing_program_fails() {
        let result = PtyProcess::spawn(
            &ShellCommand::new("/nonexistent/csql-test-binary"),
            DEFAULT_ROWS,
            DEFAULT_COLS,
        );
        assert!(result.is_err());
    }
}
