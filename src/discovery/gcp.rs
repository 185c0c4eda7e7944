//! GCP discovery - Cloud SQL instances of a project
//!
//! Lists instances through the Cloud SQL Admin REST API. The access token is
//! taken from `GOOGLE_OAUTH_ACCESS_TOKEN` when set, otherwise from
//! `gcloud auth print-access-token`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{required, Discovery, FormValues, InputSpec};
use crate::config::{InstanceConfig, MYSQL, POSTGRESQL};
use crate::error::{CsqlError, Result};

pub const KIND: &str = "gcp";

/// Environment variable that short-circuits the gcloud token lookup
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

const SQLADMIN_API_URL: &str = "https://sqladmin.googleapis.com/v1beta4";

pub struct GcpDiscovery {
    client: reqwest::Client,
    api_url: String,
}

impl GcpDiscovery {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: SQLADMIN_API_URL.to_string(),
        }
    }

    async fn access_token(&self) -> Result<String> {
        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            if !token.trim().is_empty() {
                return Ok(token.trim().to_string());
            }
        }

        let output = Command::new("gcloud")
            .args(["auth", "print-access-token"])
            .output()
            .await
            .map_err(|e| CsqlError::Discovery(format!("failed to run gcloud: {}", e)))?;
        if !output.status.success() {
            return Err(CsqlError::Discovery(format!(
                "gcloud auth print-access-token failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Default for GcpDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// API types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct InstancesListResponse {
    #[serde(default)]
    items: Vec<DatabaseInstance>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatabaseInstance {
    name: String,
    #[serde(default)]
    database_version: String,
    #[serde(default)]
    ip_addresses: Vec<IpMapping>,
    #[serde(default)]
    settings: Option<InstanceSettings>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IpMapping {
    ip_address: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceSettings {
    #[serde(default)]
    user_labels: BTreeMap<String, String>,
}

/// Map a Cloud SQL instance to config, skipping engines csql does not know
fn to_instance_config(project_id: &str, instance: DatabaseInstance) -> Option<InstanceConfig> {
    let (db_type, port) = if instance.database_version.starts_with("POSTGRES") {
        (POSTGRESQL, 5432)
    } else if instance.database_version.starts_with("MYSQL") {
        (MYSQL, 3306)
    } else {
        warn!(
            instance = %instance.name,
            version = %instance.database_version,
            "skipping instance with unsupported database version"
        );
        return None;
    };

    let Some(ip) = instance.ip_addresses.first() else {
        warn!(instance = %instance.name, "skipping instance without ip address");
        return None;
    };

    let mut params = BTreeMap::new();
    params.insert(
        "Project ID".to_string(),
        toml::Value::String(project_id.to_string()),
    );
    if let Some(settings) = instance.settings {
        for (k, v) in settings.user_labels {
            params.insert(k, toml::Value::String(v));
        }
    }

    Some(InstanceConfig {
        name: instance.name,
        db_type: db_type.to_string(),
        host: ip.ip_address.clone(),
        port,
        source: KIND.to_string(),
        params,
        users: Vec::new(),
    })
}

#[async_trait]
impl Discovery for GcpDiscovery {
    fn label(&self) -> &'static str {
        "GCP (Auto Discovery)"
    }

    fn kind(&self) -> &'static str {
        KIND
    }

    fn inputs(&self) -> Vec<InputSpec> {
        vec![InputSpec::Text {
            label: "Project ID",
            default: String::new(),
        }]
    }

    async fn discover(&self, values: &FormValues) -> Result<Vec<InstanceConfig>> {
        let project_id = required(values, "Project ID")?;
        let token = self.access_token().await?;

        let url = format!("{}/projects/{}/instances", self.api_url, project_id);
        debug!(%url, "listing cloud sql instances");

        let response: InstancesListResponse = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .items
            .into_iter()
            .filter_map(|instance| to_instance_config(project_id, instance))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Vec<InstanceConfig> {
        let response: InstancesListResponse = serde_json::from_str(json).unwrap();
        response
            .items
            .into_iter()
            .filter_map(|i| to_instance_config("acme", i))
            .collect()
    }

    #[test]
    fn test_maps_postgres_and_mysql() {
        let found = parse(
            r#"{"items": [
                {"name": "pg", "databaseVersion": "POSTGRES_15",
                 "ipAddresses": [{"ipAddress": "10.1.0.2", "type": "PRIVATE"}],
                 "settings": {"userLabels": {"team": "core"}}},
                {"name": "my", "databaseVersion": "MYSQL_8_0",
                 "ipAddresses": [{"ipAddress": "10.1.0.3"}]}
            ]}"#,
        );
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].db_type, POSTGRESQL);
        assert_eq!(found[0].port, 5432);
        assert_eq!(found[0].host, "10.1.0.2");
        assert_eq!(found[0].source, "gcp");
        assert_eq!(found[0].params_summary(), "Project ID=acme, team=core");
        assert_eq!(found[1].db_type, MYSQL);
        assert_eq!(found[1].port, 3306);
    }

    #[test]
    fn test_skips_unknown_engine_and_missing_ip() {
        let found = parse(
            r#"{"items": [
                {"name": "ss", "databaseVersion": "SQLSERVER_2019_STANDARD",
                 "ipAddresses": [{"ipAddress": "10.1.0.4"}]},
                {"name": "noip", "databaseVersion": "POSTGRES_14"}
            ]}"#,
        );
        assert!(found.is_empty());
    }

    #[test]
    fn test_empty_project_listing() {
        assert!(parse("{}").is_empty());
    }

    #[tokio::test]
    async fn test_project_id_required() {
        let err = GcpDiscovery::new().discover(&FormValues::new()).await.unwrap_err();
        assert!(matches!(err, CsqlError::InvalidField { ref field, .. } if field == "Project ID"));
    }
}
