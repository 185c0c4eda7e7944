//! Views over the configuration: instances, users, discovery

mod add_user;
mod discover;
mod instance_list;
mod user_list;

pub use add_user::AddUserView;
pub use discover::{DiscoverDetailView, DiscoverView};
pub use instance_list::{InstanceListContent, InstanceListView};
pub use user_list::{UserListContent, UserListView};

use tracing::warn;

use super::session::Session;
use crate::error::CsqlError;

/// Save the session's config off the render thread; failures are shown
/// in a message overlay.
pub(crate) fn persist_config(session: &Session) {
    let handle = session.config.save_in_background();
    let dispatcher = session.dispatcher().clone();
    tokio::spawn(async move {
        let result = match handle.await {
            Ok(result) => result,
            Err(join) => Err(CsqlError::Io(std::io::Error::other(join.to_string()))),
        };
        if let Err(err) = result {
            warn!(error = %err, "failed to save config");
            dispatcher.show_error_async(&err);
        }
    });
}
