//! # Instance Discovery
//!
//! Pluggable strategies that produce [`InstanceConfig`] records to merge into
//! the configuration:
//!
//! - [`ManualDiscovery`] - a single instance typed into a form
//! - [`GcpDiscovery`] - Cloud SQL instances listed from a GCP project
//!
//! Each strategy describes the form inputs it needs ([`InputSpec`]); the TUI
//! builds the form, collects [`FormValues`] and awaits [`Discovery::discover`]
//! on a worker. Nothing is written to the config until the user confirms.

mod gcp;
mod manual;

pub use gcp::GcpDiscovery;
pub use manual::ManualDiscovery;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::InstanceConfig;
use crate::error::{CsqlError, Result};

/// Form values keyed by input label
pub type FormValues = BTreeMap<String, String>;

/// A form input a discovery strategy needs
#[derive(Debug, Clone, PartialEq)]
pub enum InputSpec {
    Text {
        label: &'static str,
        default: String,
    },
    Select {
        label: &'static str,
        options: Vec<SelectOption>,
    },
}

/// One option of a select input. Choosing it pre-fills other inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectOption {
    pub label: String,
    pub presets: Vec<(&'static str, String)>,
}

impl SelectOption {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            presets: Vec::new(),
        }
    }

    pub fn preset(mut self, field: &'static str, value: impl Into<String>) -> Self {
        self.presets.push((field, value.into()));
        self
    }
}

#[async_trait]
pub trait Discovery: Send + Sync {
    /// Human label shown in the strategy list
    fn label(&self) -> &'static str;

    /// Value stored in `InstanceConfig::source`
    fn kind(&self) -> &'static str;

    fn inputs(&self) -> Vec<InputSpec>;

    async fn discover(&self, values: &FormValues) -> Result<Vec<InstanceConfig>>;
}

/// All available strategies, in display order
pub fn all() -> Vec<Arc<dyn Discovery>> {
    vec![Arc::new(ManualDiscovery::new()), Arc::new(GcpDiscovery::new())]
}

/// Fetch a required, non-blank value from a submitted form
pub(crate) fn required<'a>(values: &'a FormValues, label: &str) -> Result<&'a str> {
    values
        .get(label)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CsqlError::invalid_field(label, "is required"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_strategies_have_distinct_kinds() {
        let strategies = all();
        assert_eq!(strategies.len(), 2);
        assert_ne!(strategies[0].kind(), strategies[1].kind());
        assert_eq!(strategies[0].label(), "Manual");
    }

    #[test]
    fn test_required_rejects_blank() {
        let values = FormValues::from([("Host".to_string(), "   ".to_string())]);
        assert!(required(&values, "Host").is_err());
        assert!(required(&values, "Port").is_err());
    }
}
