//! psql embedded through the terminal bridge

use std::sync::Arc;

use super::{PostgresAdapter, TableListView};
use crate::tui::terminal::TerminalView;

/// `<psql_binary> <connection-uri>` for the adapter's current database.
/// Escape returns to the table list.
pub fn shell_view(adapter: Arc<PostgresAdapter>) -> TerminalView {
    let launcher = Arc::clone(&adapter);
    let info = adapter.info();
    TerminalView::new(
        "psql",
        info,
        async move { launcher.shell_command().await },
        move || Box::new(TableListView::new(Arc::clone(&adapter))),
    )
}
