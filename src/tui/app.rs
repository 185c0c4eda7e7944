//! TUI Application - terminal setup and the render loop

use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{error, info};

use super::dispatch::{channel, DispatchQueue};
use super::events::{poll_event, AppEvent};
use super::session::Session;
use super::theme::Theme;
use super::views::InstanceListView;
use crate::config::Config;

/// ~60fps
const TICK_RATE: Duration = Duration::from_millis(16);

/// TUI Application
pub struct TuiApp {
    session: Session,
    queue: DispatchQueue,
    theme: Theme,
}

impl TuiApp {
    /// Create the session with the instance list as its main view.
    /// Must be called inside a tokio runtime.
    pub fn new(config: Config) -> Self {
        let (dispatcher, queue) = channel();
        let mut session = Session::new(config, dispatcher);
        session.set_view(Box::new(InstanceListView::new()));
        Self {
            session,
            queue,
            theme: Theme::new(),
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut terminal = setup_terminal()?;
        install_panic_hook();
        info!("tui started");

        let result = self.main_loop(&mut terminal);

        restore_terminal(&mut terminal)?;
        info!("tui stopped");
        result
    }

    /// Drain the dispatch queue, redraw when something changed, then wait
    /// up to one tick for input. All session mutation happens here.
    fn main_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
        let mut dirty = true;
        loop {
            self.queue.drain(&mut self.session);
            if self.session.should_quit() {
                break;
            }

            if self.queue.take_redraw() || dirty {
                terminal.draw(|frame| self.session.render(frame, &self.theme))?;
                dirty = false;
            }

            match poll_event(TICK_RATE)? {
                Some(AppEvent::Key(key)) => {
                    self.session.handle_key(key);
                    dirty = true;
                }
                Some(AppEvent::Resize) => dirty = true,
                None => {}
            }
        }
        Ok(())
    }
}

fn setup_terminal() -> anyhow::Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Leave raw mode before the default hook prints, so the report is readable
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        error!(%panic_info, "panic");
        default_hook(panic_info);
    }));
}
