//! Banking service catalog.
//!
//! Each entry names a bank's homepage and the installer packages its site
//! needs. Package order is install order: later installers may depend on
//! earlier ones.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, SandboxError};

/// One installer package required by a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Package identifier, shown in the startup script comment.
    pub name: String,
    /// Absolute download URL.
    pub url: String,
}

/// One banking service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCatalogEntry {
    pub id: String,
    pub display_name: String,
    pub homepage_url: String,
    #[serde(default)]
    pub category: Option<String>,
    /// Ordered; installed first to last.
    #[serde(default)]
    pub packages: Vec<Package>,
}

impl ServiceCatalogEntry {
    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(SandboxError::Catalog("service with empty id".into()));
        }
        require_absolute_url(&self.homepage_url).map_err(|message| {
            SandboxError::Catalog(format!("service '{}' homepage: {}", self.id, message))
        })?;
        for package in &self.packages {
            require_absolute_url(&package.url).map_err(|message| {
                SandboxError::Catalog(format!(
                    "service '{}' package '{}': {}",
                    self.id, package.name, message
                ))
            })?;
        }
        Ok(())
    }
}

fn require_absolute_url(raw: &str) -> std::result::Result<(), String> {
    match Url::parse(raw) {
        Ok(url) if url.has_host() => Ok(()),
        Ok(_) => Err(format!("'{raw}' has no host")),
        Err(e) => Err(format!("'{raw}' is not an absolute URL ({e})")),
    }
}

/// The full list of known services, loaded once and read-only afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub services: Vec<ServiceCatalogEntry>,
}

impl Catalog {
    /// Load and validate a catalog from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SandboxError::io(path, e))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let catalog: Catalog = toml::from_str(content)?;
        let mut seen = HashSet::new();
        for service in &catalog.services {
            service.validate()?;
            if !seen.insert(service.id.to_lowercase()) {
                return Err(SandboxError::Catalog(format!(
                    "duplicate service id '{}'",
                    service.id
                )));
            }
        }
        tracing::debug!(services = catalog.services.len(), "catalog loaded");
        Ok(catalog)
    }

    /// Look up a service by id, ignoring case.
    pub fn find(&self, id: &str) -> Option<&ServiceCatalogEntry> {
        self.services
            .iter()
            .find(|s| s.id.eq_ignore_ascii_case(id))
    }
}
