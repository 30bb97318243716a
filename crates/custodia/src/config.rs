//! Configuration for the compliance subsystem.
//!
//! ```toml
//! [permissions.rules]
//! CONTROL_ROOM_ACCESS = ["DIRETOR", "CORREGEDORIA"]
//!
//! [signing]
//! sign_timeout_ms = 30000
//! discover_timeout_ms = 10000
//!
//! [store]
//! backend = "sqlite"
//! path = "/var/lib/custodia/audit.db"
//! ```
//!
//! Every section is optional. Without `[permissions]` the built-in rule set
//! applies.

use std::path::{Path, PathBuf};
use std::time::Duration;

use custodia_perms::{PermissionRules, PermissionTable};
use custodia_signing::SigningConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ComplianceError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceConfig {
    /// Permission rules. `None` selects the built-in table.
    pub permissions: Option<PermissionRules>,
    pub signing: SigningSettings,
    pub store: StoreSettings,
}

/// Signing timeouts in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningSettings {
    pub sign_timeout_ms: u64,
    pub discover_timeout_ms: u64,
}

impl Default for SigningSettings {
    fn default() -> Self {
        let defaults = SigningConfig::default();
        Self {
            sign_timeout_ms: defaults.sign_timeout.as_millis() as u64,
            discover_timeout_ms: defaults.discover_timeout.as_millis() as u64,
        }
    }
}

impl From<SigningSettings> for SigningConfig {
    fn from(settings: SigningSettings) -> Self {
        Self {
            sign_timeout: Duration::from_millis(settings.sign_timeout_ms),
            discover_timeout: Duration::from_millis(settings.discover_timeout_ms),
        }
    }
}

/// Which chain backend to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Memory,
    Sqlite,
}

/// Audit store settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: BackendKind,
    /// Database file. Required for `sqlite`.
    pub path: Option<PathBuf>,
}

impl ComplianceConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| ComplianceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(s).map_err(|e| ComplianceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file, choosing the format by extension (`.json` or TOML).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ComplianceError::Config(format!("{}: {}", path.display(), e)))?;

        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&text)?,
            _ => Self::from_toml_str(&text)?,
        };
        tracing::info!(path = %path.display(), "compliance configuration loaded");
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.store.backend == BackendKind::Sqlite && self.store.path.is_none() {
            return Err(ComplianceError::Config(
                "store.backend = \"sqlite\" requires store.path".into(),
            ));
        }
        if self.signing.sign_timeout_ms == 0 || self.signing.discover_timeout_ms == 0 {
            return Err(ComplianceError::Config("signing timeouts must be non-zero".into()));
        }
        Ok(())
    }

    /// The permission table this configuration selects.
    pub fn permission_table(&self) -> Result<PermissionTable> {
        match &self.permissions {
            Some(rules) => Ok(PermissionTable::from_serialized(rules)?),
            None => Ok(PermissionTable::builtin()),
        }
    }

    pub fn signing_config(&self) -> SigningConfig {
        self.signing.into()
    }
}
