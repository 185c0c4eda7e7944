//! Credential resolution
//!
//! A user's `auth_type` + `params` resolve to a [`Credential`] that yields the
//! plaintext password. Resolution can be slow (network) and fallible, so it is
//! always awaited off the render thread.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{CsqlError, Result};

/// Environment variable holding the Vault token
pub const VAULT_TOKEN_ENV: &str = "VAULT_TOKEN";

const VAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait Credential: Send + Sync {
    async fn get_credential(&self) -> Result<String>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    Local,
    Vault,
}

/// A form input an auth type needs from the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub label: &'static str,
    pub key: &'static str,
    pub masked: bool,
}

impl AuthType {
    pub const ALL: [AuthType; 2] = [AuthType::Local, AuthType::Vault];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::Local => "Local",
            AuthType::Vault => "Vault",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| CsqlError::UnknownAuthType {
                auth_type: value.to_string(),
            })
    }

    /// Inputs shown in the add-user form for this type
    pub fn fields(&self) -> &'static [FieldSpec] {
        match self {
            AuthType::Local => &[FieldSpec {
                label: "Password",
                key: "password",
                masked: true,
            }],
            AuthType::Vault => &[
                FieldSpec {
                    label: "Vault Address",
                    key: "address",
                    masked: false,
                },
                FieldSpec {
                    label: "Vault Mount Path",
                    key: "mount_path",
                    masked: false,
                },
                FieldSpec {
                    label: "Vault Secret Path",
                    key: "secret_path",
                    masked: false,
                },
                FieldSpec {
                    label: "Vault Secret Key",
                    key: "secret_key",
                    masked: false,
                },
            ],
        }
    }
}

impl std::fmt::Display for AuthType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolve a configured auth scheme into a credential source
pub fn resolve(auth_type: &str, params: &BTreeMap<String, String>) -> Result<Box<dyn Credential>> {
    match AuthType::parse(auth_type)? {
        AuthType::Local => Ok(Box::new(LocalAuth {
            password: params.get("password").cloned().unwrap_or_default(),
        })),
        AuthType::Vault => {
            let get = |key: &str| {
                params
                    .get(key)
                    .filter(|v| !v.is_empty())
                    .cloned()
                    .ok_or_else(|| CsqlError::InvalidAuthParams {
                        auth_type: AuthType::Vault.to_string(),
                        details: format!("missing '{}'", key),
                    })
            };
            Ok(Box::new(VaultAuth {
                address: get("address")?,
                mount_path: get("mount_path")?,
                secret_path: get("secret_path")?,
                secret_key: get("secret_key")?,
            }))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Local
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LocalAuth {
    password: String,
}

#[async_trait]
impl Credential for LocalAuth {
    async fn get_credential(&self) -> Result<String> {
        Ok(self.password.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Vault (KV v2)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct VaultAuth {
    address: String,
    mount_path: String,
    secret_path: String,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct KvV2Response {
    data: KvV2Data,
}

#[derive(Debug, Deserialize)]
struct KvV2Data {
    data: BTreeMap<String, serde_json::Value>,
}

impl VaultAuth {
    fn secret_url(&self) -> String {
        format!(
            "{}/v1/{}/data/{}",
            self.address.trim_end_matches('/'),
            self.mount_path.trim_matches('/'),
            self.secret_path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl Credential for VaultAuth {
    async fn get_credential(&self) -> Result<String> {
        let token = std::env::var(VAULT_TOKEN_ENV)
            .map_err(|_| CsqlError::Credential(format!("{} is not set", VAULT_TOKEN_ENV)))?;

        let url = self.secret_url();
        debug!(%url, "fetching secret from vault");

        let client = reqwest::Client::builder().timeout(VAULT_TIMEOUT).build()?;
        let response = client
            .get(&url)
            .header("X-Vault-Token", token)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CsqlError::Credential(format!(
                "no secret found at path: {}",
                self.secret_path
            )));
        }
        let body: KvV2Response = response.error_for_status()?.json().await?;

        match body.data.data.get(&self.secret_key) {
            Some(serde_json::Value::String(password)) => Ok(password.clone()),
            _ => Err(CsqlError::Credential(format!(
                "key '{}' not found in secret data",
                self.secret_key
            ))),
        }
    }
}
