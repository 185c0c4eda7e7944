//! csql - terminal session manager for database instances

pub mod adapter;
pub mod auth;
pub mod config;
pub mod discovery;
pub mod error;
pub mod tui;

pub use adapter::{DbAdapter, PostgresAdapter};
pub use config::{Config, InstanceConfig, Settings, UserConfig};
pub use error::{CsqlError, FixSuggestion};
