//! Manual discovery - one instance entered by hand

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{required, Discovery, FormValues, InputSpec, SelectOption};
use crate::config::{InstanceConfig, MYSQL, POSTGRESQL};
use crate::error::{CsqlError, Result};

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("valid regex"));

pub const KIND: &str = "manual";

#[derive(Debug, Default)]
pub struct ManualDiscovery;

impl ManualDiscovery {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Discovery for ManualDiscovery {
    fn label(&self) -> &'static str {
        "Manual"
    }

    fn kind(&self) -> &'static str {
        KIND
    }

    fn inputs(&self) -> Vec<InputSpec> {
        vec![
            InputSpec::Select {
                label: "Database Type",
                options: vec![
                    SelectOption::new(POSTGRESQL).preset("Port", "5432"),
                    SelectOption::new(MYSQL).preset("Port", "3306"),
                ],
            },
            InputSpec::Text {
                label: "Name",
                default: String::new(),
            },
            InputSpec::Text {
                label: "Host",
                default: String::new(),
            },
            InputSpec::Text {
                label: "Port",
                default: "5432".to_string(),
            },
        ]
    }

    async fn discover(&self, values: &FormValues) -> Result<Vec<InstanceConfig>> {
        let db_type = required(values, "Database Type")?;
        let name = required(values, "Name")?;
        if !NAME_RE.is_match(name) {
            return Err(CsqlError::invalid_field(
                "Name",
                "may only contain letters, digits, '.', '_' and '-'",
            ));
        }
        let host = required(values, "Host")?;
        let port = required(values, "Port")?
            .parse::<u16>()
            .map_err(|_| CsqlError::invalid_field("Port", "must be a number between 0 and 65535"))?;

        Ok(vec![InstanceConfig {
            name: name.to_string(),
            db_type: db_type.to_string(),
            host: host.to_string(),
            port,
            source: KIND.to_string(),
            ..InstanceConfig::default()
        }])
    }
}
