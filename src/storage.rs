//! JSON document storage for the user and site collections.
//!
//! Both collections live in their own file under the data directory and are
//! rewritten together after every change. Writes go straight to the target
//! file, so a crash mid-write can leave a truncated document behind; the next
//! load treats it as malformed and starts that collection empty.

use crate::records::{SiteMap, UserMap, UserRecord};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Collections read from disk, plus any non-fatal problems found
#[derive(Debug, Default)]
pub struct Loaded {
    pub users: UserMap,
    pub sites: SiteMap,
    pub warnings: Vec<String>,
}

/// Locations of the two documents
#[derive(Debug, Clone)]
pub struct Storage {
    users_path: PathBuf,
    sites_path: PathBuf,
}

impl Storage {
    pub fn new(data_dir: &Path, users_file: &str, sites_file: &str) -> Self {
        Self {
            users_path: data_dir.join(users_file),
            sites_path: data_dir.join(sites_file),
        }
    }

    pub fn users_path(&self) -> &Path {
        &self.users_path
    }

    pub fn sites_path(&self) -> &Path {
        &self.sites_path
    }

    /// Read both documents. Missing or malformed files yield empty collections.
    pub fn load(&self) -> Loaded {
        let mut loaded = Loaded::default();

        match read_document::<BTreeMap<String, serde_json::Value>>(&self.users_path) {
            Ok(Some(raw)) => {
                for (username, value) in raw {
                    match serde_json::from_value::<UserRecord>(value) {
                        Ok(user) => {
                            loaded.users.insert(username, user);
                        }
                        Err(e) => loaded.warnings.push(format!(
                            "Skipping user '{}' in {}: {}. The record will be dropped on the next save.",
                            username,
                            self.users_path.display(),
                            e
                        )),
                    }
                }
            }
            Ok(None) => {}
            Err(e) => loaded.warnings.push(format!(
                "Could not read the users file {}; it may be corrupted ({:#}). Starting with no users.",
                self.users_path.display(),
                e
            )),
        }

        match read_document::<SiteMap>(&self.sites_path) {
            Ok(Some(sites)) => loaded.sites = sites,
            Ok(None) => {}
            Err(e) => loaded.warnings.push(format!(
                "Could not read the sites file {}; it may be corrupted ({:#}). Starting with no sites.",
                self.sites_path.display(),
                e
            )),
        }

        loaded
    }

    /// Overwrite both documents
    pub fn save(&self, users: &UserMap, sites: &SiteMap) -> Result<()> {
        write_document(&self.users_path, users)?;
        write_document(&self.sites_path, sites)?;
        Ok(())
    }
}

fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value = serde_json::from_str(&content)?;
    Ok(Some(value))
}

/// Pretty-print with a four-space indent; non-ASCII text is written as-is
fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;

    std::fs::write(path, buf).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
