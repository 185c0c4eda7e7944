//! TUI Module - session controller, views and the terminal bridge
//!
//! Architecture:
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                  RENDER LOOP (app.rs, one thread)                   │
//! │  drain dispatch queue → draw session → poll input → handle key      │
//! └─────────────────────────────────────────────────────────────────────┘
//!                               ▲
//!                               │ Dispatcher (FIFO closures, scoped)
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                 WORKERS (tokio tasks, pty readers)                  │
//! │  queries, discovery, credential lookups, shell output               │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Workers never touch the [`Session`](session::Session) directly; they
//! enqueue closures that run on the render thread before the next redraw.

mod app;

pub mod ansi;
pub mod dispatch;
pub mod events;
pub mod session;
pub mod terminal;
pub mod theme;
pub mod view;
pub mod views;
pub mod widgets;

pub use app::TuiApp;
pub use session::Session;
pub use view::{Content, View};

use crate::config::Config;

/// Run the interactive session until the user quits
pub async fn run(config: Config) -> anyhow::Result<()> {
    TuiApp::new(config).run().await
}
