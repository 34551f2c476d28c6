use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SandboxError};

/// Top-level configuration from `.banksandbox.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Certificate discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Searched after the well-known candidate directories.
    #[serde(default)]
    pub extra_directories: Vec<PathBuf>,
    /// Maximum directory depth walked below each candidate.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_max_depth() -> usize {
    8
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            extra_directories: Vec::new(),
            max_depth: default_max_depth(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Where sandbox profiles are written when `--output` is not given.
    pub directory: Option<PathBuf>,
    /// Catalog used when `--catalog` is not given.
    pub catalog: Option<PathBuf>,
}

impl Config {
    /// Load config from a TOML file. Returns default if file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| SandboxError::io(path, e))?;
        let config: Config = toml::from_str(&content)?;
        if config.scanner.max_depth == 0 {
            return Err(SandboxError::Config(
                "scanner.max_depth must be at least 1".into(),
            ));
        }
        Ok(config)
    }

    /// Generate a starter config file.
    pub fn starter_toml() -> &'static str {
        r#"# BankSandbox configuration

[scanner]
# Extra folders searched for NPKI certificate pairs, after the usual locations.
# extra_directories = ["D:/backup/NPKI"]

# How deep to walk below each folder.
max_depth = 8

[output]
# Default folder for generated sandbox profiles.
# directory = "C:/Users/me/BankSandbox"

# Default service catalog.
# catalog = "catalog.toml"
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join(".banksandbox.toml")).unwrap();
        assert_eq!(config.scanner.max_depth, 8);
        assert!(config.scanner.extra_directories.is_empty());
        assert!(config.output.directory.is_none());
    }

    #[test]
    fn starter_toml_parses() {
        let config: Config = toml::from_str(Config::starter_toml()).unwrap();
        assert_eq!(config.scanner.max_depth, 8);
    }

    #[test]
    fn zero_depth_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".banksandbox.toml");
        std::fs::write(&path, "[scanner]\nmax_depth = 0\n").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, SandboxError::Config(_)));
    }

    #[test]
    fn extra_directories_are_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".banksandbox.toml");
        std::fs::write(
            &path,
            "[scanner]\nextra_directories = [\"/mnt/usb/NPKI\"]\n\n[output]\ncatalog = \"catalog.toml\"\n",
        )
        .unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.scanner.extra_directories,
            vec![PathBuf::from("/mnt/usb/NPKI")]
        );
        assert_eq!(config.output.catalog, Some(PathBuf::from("catalog.toml")));
    }
}
