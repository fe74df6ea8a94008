use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A validation error in the configuration
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]: {}", self.field, self.message)
    }
}

/// Where the two JSON documents live
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default = "default_users_file")]
    pub users_file: String,
    #[serde(default = "default_sites_file")]
    pub sites_file: String,
}

fn default_users_file() -> String {
    "users.json".to_string()
}

fn default_sites_file() -> String {
    "sites.json".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            users_file: default_users_file(),
            sites_file: default_sites_file(),
        }
    }
}

impl StorageConfig {
    /// Data directory, falling back to the working directory
    pub fn resolve_data_dir(&self, root: &Path) -> PathBuf {
        match &self.data_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => root.join(dir),
            None => root.to_path_buf(),
        }
    }
}

/// The single administrator identity. Not part of the user collection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin")]
    pub username: String,
    #[serde(default = "default_admin")]
    pub password: String,
}

fn default_admin() -> String {
    "admin".to_string()
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: default_admin(),
            password: default_admin(),
        }
    }
}

/// JSONL audit log settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

/// Main configuration structure, fully resolved
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

/// One config file as written. Anything left out keeps the value from the
/// layer below it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigLayer {
    #[serde(default)]
    pub storage: StorageLayer,
    #[serde(default)]
    pub admin: AdminLayer,
    #[serde(default)]
    pub audit: AuditLayer,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageLayer {
    pub data_dir: Option<PathBuf>,
    pub users_file: Option<String>,
    pub sites_file: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminLayer {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditLayer {
    pub enabled: Option<bool>,
    pub dir: Option<PathBuf>,
}

impl ConfigLayer {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let layer: ConfigLayer = toml::from_str(&content)?;
        Ok(layer)
    }
}

impl Config {
    /// Load configuration from default paths
    /// Priority: local (.vfarm/config.local.toml) > project (.vfarm/config.toml) > user (~/.vfarm/config.toml)
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".vfarm").join("config.toml");
            if user_config.exists() {
                config.merge(ConfigLayer::load(&user_config)?);
            }
        }

        let project_config = Path::new(".vfarm").join("config.toml");
        if project_config.exists() {
            config.merge(ConfigLayer::load(&project_config)?);
        }

        // Machine-specific overrides, should be gitignored
        let local_config = Path::new(".vfarm").join("config.local.toml");
        if local_config.exists() {
            config.merge(ConfigLayer::load(&local_config)?);
        }

        Ok(config)
    }

    /// Load configuration from a specific path, on top of the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::default();
        config.merge(ConfigLayer::load(path)?);
        Ok(config)
    }

    /// Apply a higher-priority layer. Only values the layer sets override.
    pub fn merge(&mut self, layer: ConfigLayer) {
        if let Some(dir) = layer.storage.data_dir {
            self.storage.data_dir = Some(dir);
        }
        if let Some(name) = layer.storage.users_file {
            self.storage.users_file = name;
        }
        if let Some(name) = layer.storage.sites_file {
            self.storage.sites_file = name;
        }

        if let Some(username) = layer.admin.username {
            self.admin.username = username;
        }
        if let Some(password) = layer.admin.password {
            self.admin.password = password;
        }

        if let Some(enabled) = layer.audit.enabled {
            self.audit.enabled = enabled;
        }
        if let Some(dir) = layer.audit.dir {
            self.audit.dir = Some(dir);
        }
    }

    /// Validate configuration and return any errors found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        for (field, value) in [
            ("storage.users_file", &self.storage.users_file),
            ("storage.sites_file", &self.storage.sites_file),
        ] {
            if value.trim().is_empty() {
                errors.push(ValidationError {
                    field: field.to_string(),
                    message: "File name must not be empty".to_string(),
                });
            } else if value.contains('/') || value.contains('\\') {
                errors.push(ValidationError {
                    field: field.to_string(),
                    message: format!(
                        "Expected a bare file name, got '{}' (use storage.data_dir for the directory)",
                        value
                    ),
                });
            }
        }

        if self.storage.users_file == self.storage.sites_file {
            errors.push(ValidationError {
                field: "storage.sites_file".to_string(),
                message: format!(
                    "Users and sites cannot share the same file '{}'",
                    self.storage.sites_file
                ),
            });
        }

        if self.admin.username.trim().is_empty() {
            errors.push(ValidationError {
                field: "admin.username".to_string(),
                message: "Must not be empty".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
