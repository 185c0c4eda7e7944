//! Error types with fix suggestions

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

pub type Result<T, E = CsqlError> = std::result::Result<T, E>;

/// All errors surfaced by csql.
///
/// Collaborator failures (credentials, connections, queries, pty) are returned
/// as values and rendered in a message overlay; none of them abort the session.
#[derive(Error, Debug)]
pub enum CsqlError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ─────────────────────────────────────────────────────────────
    // Configuration
    // ─────────────────────────────────────────────────────────────
    #[error("Config parse error in {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Cannot determine config directory")]
    NoConfigDir,

    #[error("Instance '{name}' not found")]
    InstanceNotFound { name: String },

    #[error("User '{username}' not found on instance '{instance}'")]
    UserNotFound { instance: String, username: String },

    // ─────────────────────────────────────────────────────────────
    // Credentials
    // ─────────────────────────────────────────────────────────────
    #[error("Unknown auth type '{auth_type}'")]
    UnknownAuthType { auth_type: String },

    #[error("Invalid auth params for '{auth_type}': {details}")]
    InvalidAuthParams { auth_type: String, details: String },

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // ─────────────────────────────────────────────────────────────
    // Backend
    // ─────────────────────────────────────────────────────────────
    #[error("Unsupported database type '{db_type}'")]
    UnsupportedDatabase { db_type: String },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    // ─────────────────────────────────────────────────────────────
    // Terminal bridge
    // ─────────────────────────────────────────────────────────────
    #[error("Error starting shell '{program}': {details}")]
    Spawn { program: String, details: String },

    #[error("Terminal I/O error: {0}")]
    Pty(String),

    // ─────────────────────────────────────────────────────────────
    // Discovery
    // ─────────────────────────────────────────────────────────────
    #[error("Discovery error: {0}")]
    Discovery(String),

    // ─────────────────────────────────────────────────────────────
    // Input and invariants (recoverable)
    // ─────────────────────────────────────────────────────────────
    #[error("Field '{field}' {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Nothing selected")]
    NoSelection,

    #[error("Unknown command '{command}'")]
    UnknownCommand { command: String },

    #[error("Not a terminal: csql must run in an interactive terminal")]
    NotATerminal,
}

impl CsqlError {
    /// Shorthand for form validation errors.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl FixSuggestion for CsqlError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            CsqlError::Io(_) => Some("Check file path and permissions"),
            CsqlError::ConfigParse { .. } => Some("Check TOML syntax in the config file"),
            CsqlError::ConfigSerialize(_) => None,
            CsqlError::NoConfigDir => Some("Pass --config <path> explicitly"),
            CsqlError::InstanceNotFound { .. } => Some("Run `csql list` to see configured instances"),
            CsqlError::UserNotFound { .. } => Some("Add the user from the instance's user list"),
            CsqlError::UnknownAuthType { .. } => Some("Use auth_type = \"Local\" or \"Vault\""),
            CsqlError::InvalidAuthParams { .. } => {
                Some("Re-create the user so its auth params are complete")
            }
            CsqlError::Credential(_) => Some("Check the credential source is reachable"),
            CsqlError::Http(_) => Some("Check network access and the service address"),
            CsqlError::UnsupportedDatabase { .. } => Some("Only PostgreSQL instances can be opened"),
            CsqlError::Connection(_) => Some("Check host, port and credentials of the instance"),
            CsqlError::NotConnected => Some("Reconnect from the instance list"),
            CsqlError::Query(_) => Some("Check the SQL statement and your privileges"),
            CsqlError::Spawn { .. } => Some("Install psql or set settings.psql_binary in the config"),
            CsqlError::Pty(_) => None,
            CsqlError::Discovery(_) => Some("Check the discovery inputs and provider credentials"),
            CsqlError::InvalidField { .. } => Some("Fill in the field and submit again"),
            CsqlError::NoSelection => Some("Select a row first"),
            CsqlError::UnknownCommand { .. } => {
                Some("Available commands: table, database, role, query, shell")
            }
            CsqlError::NotATerminal => Some("Run csql directly in a terminal, not through a pipe"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_field_message() {
        let err = CsqlError::invalid_field("Username", "is required");
        assert_eq!(err.to_string(), "Field 'Username' is required");
        assert!(err.fix_suggestion().is_some());
    }

    #[test]
    fn test_unknown_command_suggestion_lists_commands() {
        let err = CsqlError::UnknownCommand {
            command: "foo".to_string(),
        };
        assert!(err.fix_suggestion().unwrap().contains("table"));
    }
}
