//! Configuration - instances, users and settings persisted as TOML
//!
//! The loaded [`Config`] is owned by the TUI session and handed to views
//! explicitly. Saving from the TUI goes through [`Config::save_in_background`]
//! so the render thread never touches the filesystem.
//!
//! Background saves are numbered when requested. A snapshot older than the
//! one last written to the same path is skipped, so the most recent edit wins
//! however the blocking pool schedules the writes. Every write goes to a
//! temporary file next to the config and is renamed over it.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CsqlError, Result};

/// Default shell binary for PostgreSQL instances
pub const DEFAULT_PSQL_BINARY: &str = "psql";

/// Database type name for PostgreSQL instances
pub const POSTGRESQL: &str = "PostgreSQL";

/// Database type name for MySQL instances (discoverable, not browsable)
pub const MYSQL: &str = "MySQL";

/// Next background save number
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Last save number written per config path. Held while writing.
static WRITTEN: Lazy<Mutex<HashMap<PathBuf, u64>>> = Lazy::new(|| Mutex::new(HashMap::new()));

// ─────────────────────────────────────────────────────────────────────────────
// Config
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,

    #[serde(default)]
    pub instances: BTreeMap<String, InstanceConfig>,

    /// Where this config was loaded from / will be written to
    #[serde(skip)]
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Binary launched by the terminal bridge for PostgreSQL instances
    #[serde(default = "default_psql_binary")]
    pub psql_binary: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            psql_binary: default_psql_binary(),
        }
    }
}

fn default_psql_binary() -> String {
    DEFAULT_PSQL_BINARY.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub db_type: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub params: BTreeMap<String, toml::Value>,
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    pub username: String,
    pub auth_type: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

impl InstanceConfig {
    /// Look up a user by name
    pub fn user(&self, username: &str) -> Result<&UserConfig> {
        self.users
            .iter()
            .find(|u| u.username == username)
            .ok_or_else(|| CsqlError::UserNotFound {
                instance: self.name.clone(),
                username: username.to_string(),
            })
    }

    /// Render params as a compact `k=v` list for tables
    pub fn params_summary(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| match v {
                toml::Value::String(s) => format!("{}={}", k, s),
                other => format!("{}={}", k, other),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Config {
    /// Default config location: `<config dir>/csql/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("csql").join("config.toml"))
            .ok_or(CsqlError::NoConfigDir)
    }

    /// Load config from `path`. A missing file yields an empty config bound to
    /// that path; it is created on the first save.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let text = fs::read_to_string(path)?;
            toml::from_str::<Config>(&text).map_err(|source| CsqlError::ConfigParse {
                path: path.display().to_string(),
                source,
            })?
        } else {
            debug!(path = %path.display(), "config file missing, starting empty");
            Config::default()
        };
        config.path = path.to_path_buf();
        Ok(config)
    }

    /// Write config to its path, creating parent directories
    pub fn save(&self) -> Result<()> {
        let text = toml::to_string_pretty(self)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.temp_path();
        let written = File::create(&tmp)
            .and_then(|mut file| {
                file.write_all(text.as_bytes())?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&tmp, &self.path));
        if let Err(err) = written {
            let _ = fs::remove_file(&tmp);
            return Err(err.into());
        }
        info!(path = %self.path.display(), instances = self.instances.len(), "config saved");
        Ok(())
    }

    /// Save a snapshot of the config on the blocking pool. The snapshot is
    /// dropped if a later one was already written.
    pub fn save_in_background(&self) -> tokio::task::JoinHandle<Result<()>> {
        let snapshot = self.clone();
        let generation = next_generation();
        tokio::task::spawn_blocking(move || snapshot.save_generation(generation).map(|_| ()))
    }

    /// Write unless a save numbered `generation` or later already reached
    /// this path. Returns whether the file was written.
    fn save_generation(&self, generation: u64) -> Result<bool> {
        let mut written = WRITTEN.lock();
        let last = written.get(&self.path).copied().unwrap_or(0);
        if last >= generation {
            debug!(path = %self.path.display(), generation, last, "skipping stale config snapshot");
            return Ok(false);
        }
        self.save()?;
        written.insert(self.path.clone(), generation);
        Ok(true)
    }

    /// `<dir>/.<file name>.tmp`, on the same filesystem as the config
    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "config.toml".to_string());
        self.path.with_file_name(format!(".{}.tmp", name))
    }

    /// Insert or replace an instance, keyed by its name
    pub fn add_instance(&mut self, instance: InstanceConfig) {
        self.instances.insert(instance.name.clone(), instance);
    }

    pub fn remove_instance(&mut self, name: &str) -> Result<InstanceConfig> {
        self.instances
            .remove(name)
            .ok_or_else(|| CsqlError::InstanceNotFound {
                name: name.to_string(),
            })
    }

    pub fn instance(&self, name: &str) -> Result<&InstanceConfig> {
        self.instances
            .get(name)
            .ok_or_else(|| CsqlError::InstanceNotFound {
                name: name.to_string(),
            })
    }

    /// Append a user to an instance, replacing any user with the same name
    pub fn add_instance_user(&mut self, instance: &str, user: UserConfig) -> Result<()> {
        let entry = self
            .instances
            .get_mut(instance)
            .ok_or_else(|| CsqlError::InstanceNotFound {
                name: instance.to_string(),
            })?;
        entry.users.retain(|u| u.username != user.username);
        entry.users.push(user);
        Ok(())
    }

    pub fn remove_instance_user(&mut self, instance: &str, username: &str) -> Result<()> {
        let entry = self
            .instances
            .get_mut(instance)
            .ok_or_else(|| CsqlError::InstanceNotFound {
                name: instance.to_string(),
            })?;
        let before = entry.users.len();
        entry.users.retain(|u| u.username != username);
        if entry.users.len() == before {
            return Err(CsqlError::UserNotFound {
                instance: instance.to_string(),
                username: username.to_string(),
            });
        }
        Ok(())
    }
}
