//! Durable storage for the registry configuration.
//!
//! The whole record is rewritten after every mutating registry operation.
//! Writes go to a temporary file in the same directory which is then renamed
//! over the target, so a crash mid-write never leaves a truncated config.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::errors::{DaemonError, Result};

/// Default location of the registry file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// On-disk form of the registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRegistry {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub groups: BTreeMap<String, Vec<String>>,
    /// System-wide services when true, otherwise per-user
    #[serde(default)]
    pub global: bool,
    /// No users means no login
    #[serde(default)]
    pub users: BTreeMap<String, String>,
}

impl PersistedRegistry {
    /// Record written on first start when no config exists yet
    pub fn initial() -> Self {
        Self {
            users: BTreeMap::from([("root".to_string(), "root".to_string())]),
            ..Default::default()
        }
    }
}

/// Reads and atomically rewrites the registry file
#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: PathBuf,
}

impl RegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the registry, creating the initial record when the file is missing
    pub fn load_or_init(&self) -> Result<PersistedRegistry> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let registry: PersistedRegistry =
                    serde_json::from_str(&content).map_err(|e| DaemonError::Load {
                        path: self.path.clone(),
                        message: e.to_string(),
                    })?;
                info!(
                    "Loaded {} services from {}",
                    registry.services.len(),
                    self.path.display()
                );
                Ok(registry)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let registry = PersistedRegistry::initial();
                self.save(&registry)?;
                info!("Created default registry at {}", self.path.display());
                Ok(registry)
            }
            Err(e) => Err(DaemonError::Load {
                path: self.path.clone(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist the full record
    pub fn save(&self, registry: &PersistedRegistry) -> Result<()> {
        let content = serde_json::to_string_pretty(registry)
            .map_err(|e| self.persist_error(format!("Failed to serialize registry: {}", e)))?;
        self.write_atomic(content.as_bytes())?;
        debug!("Saved registry to {:?}", self.path);
        Ok(())
    }

    fn persist_error(&self, message: String) -> DaemonError {
        DaemonError::Persist {
            path: self.path.clone(),
            message,
        }
    }

    /// Write the file atomically with owner-only permissions (0o600 on Unix).
    fn write_atomic(&self, content: &[u8]) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| {
            self.persist_error(format!(
                "Failed to create temp file in '{}': {}",
                parent.display(),
                e
            ))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o600))
                .map_err(|e| {
                    self.persist_error(format!("Failed to set permissions on temp file: {}", e))
                })?;
        }

        tmp.write_all(content)
            .map_err(|e| self.persist_error(format!("Failed to write temp file: {}", e)))?;

        tmp.persist(&self.path)
            .map_err(|e| self.persist_error(format!("Failed to persist: {}", e)))?;

        Ok(())
    }
}
