//! # Database Adapters
//!
//! An adapter owns one backend connection for a chosen instance and user,
//! and produces the views used to browse it. PostgreSQL is the only backend.

pub mod postgres;

pub use postgres::PostgresAdapter;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{InstanceConfig, Settings, UserConfig, POSTGRESQL};
use crate::error::{CsqlError, Result};
use crate::tui::view::View;

#[async_trait]
pub trait DbAdapter: Send + Sync {
    /// Resolve credentials and open the connection, to `database` or the
    /// backend's default one
    async fn connect(&self, database: Option<String>) -> Result<()>;

    /// The first view shown after a successful connect
    fn root_view(self: Arc<Self>) -> Box<dyn View>;

    async fn close(&self) -> Result<()>;
}

/// Build the adapter for an instance's database type
pub fn adapter_for(
    instance: &InstanceConfig,
    user: &UserConfig,
    settings: &Settings,
) -> Result<Arc<dyn DbAdapter>> {
    match instance.db_type.as_str() {
        POSTGRESQL => Ok(Arc::new(PostgresAdapter::new(
            instance.clone(),
            user.clone(),
            settings.clone(),
        ))),
        other => Err(CsqlError::UnsupportedDatabase {
            db_type: other.to_string(),
        }),
    }
}

/// Connect `adapter` and build its root view
pub async fn open(adapter: Arc<dyn DbAdapter>, database: Option<String>) -> Result<Box<dyn View>> {
    adapter.connect(database).await?;
    Ok(adapter.root_view())
}
