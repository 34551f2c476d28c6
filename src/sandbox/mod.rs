//! Sandbox profile generation.
//!
//! A profile is two artifacts that only work together: a `.wsb` manifest
//! that maps host folders into the guest and runs a logon command, and the
//! startup script that logon command points at.

pub mod generator;
pub mod manifest;
pub mod script;

use std::fmt;

use crate::catalog::ServiceCatalogEntry;
use crate::cert::CertPair;
use crate::error::{Result, SandboxError};

pub use generator::{GenerationReport, SandboxProvisioningGenerator};
pub use manifest::{LogonCommand, MappedFolder, SandboxManifest};

/// Manifest file written directly inside the output directory.
pub const MANIFEST_FILE_NAME: &str = "InternetBankingSandbox.wsb";
/// Host subdirectory mapped read-only into the guest.
pub const ASSETS_DIR_NAME: &str = "assets";
/// Startup script file inside the assets directory.
pub const STARTUP_SCRIPT_FILE_NAME: &str = "StartupScript.cmd";
/// Staged certificate subdirectory inside the assets directory.
pub const CERTS_DIR_NAME: &str = "certs";

/// Guest folder the assets directory appears at.
pub const GUEST_ASSETS_DIR: &str = r"C:\assets";
/// Guest account profile inside Windows Sandbox.
pub const GUEST_PROFILE_ROOT: &str = r"C:\Users\WDAGUtilityAccount";
/// Below the profile root, where banking clients look for NPKI stores.
pub const GUEST_NPKI_SEGMENTS: [&str; 3] = ["AppData", "LocalLow", "NPKI"];
/// Personal certificates live one level deeper, under this folder.
pub const GUEST_PERSONAL_SEGMENT: &str = "USER";

/// A path inside the Windows guest. Always joined with `\`, whatever the
/// host's separator is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GuestPath(String);

impl GuestPath {
    pub fn new(root: impl Into<String>) -> Self {
        Self(root.into())
    }

    pub fn join(mut self, segment: &str) -> Self {
        while self.0.ends_with('\\') {
            self.0.pop();
        }
        self.0.push('\\');
        self.0.push_str(segment.trim_matches('\\'));
        self
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Guest path of the startup script.
    pub fn startup_script() -> Self {
        Self::new(GUEST_ASSETS_DIR).join(STARTUP_SCRIPT_FILE_NAME)
    }

    /// Guest certificate store folder for a pair:
    /// `<profile>\AppData\LocalLow\NPKI\<org>` and, for personal
    /// certificates, `\USER\<subject>` below that.
    pub fn cert_store(cert: &CertPair) -> Self {
        let mut path = GUEST_NPKI_SEGMENTS
            .iter()
            .fold(Self::new(GUEST_PROFILE_ROOT), |path, segment| path.join(segment))
            .join(&cert.subject_organization);
        if cert.is_personal_cert {
            path = path
                .join(GUEST_PERSONAL_SEGMENT)
                .join(&cert.subject_name_for_npki_app);
        }
        path
    }
}

impl fmt::Display for GuestPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything one generation run needs. Service and certificate choices
/// are independent; either may be absent.
#[derive(Debug, Clone, Default)]
pub struct SandboxConfiguration {
    /// Absent means no packages are installed and no homepage is opened.
    pub selected_service: Option<ServiceCatalogEntry>,
    /// Absent means no certificate store is mapped.
    pub cert_pair: Option<CertPair>,
}

impl SandboxConfiguration {
    pub fn new(selected_service: Option<ServiceCatalogEntry>, cert_pair: Option<CertPair>) -> Self {
        Self {
            selected_service,
            cert_pair,
        }
    }

    /// Check the certificate identity can be used as guest folder names.
    pub fn validate(&self) -> Result<()> {
        let Some(cert) = &self.cert_pair else {
            return Ok(());
        };
        check_segment("subject organization", &cert.subject_organization)?;
        if cert.is_personal_cert {
            check_segment("subject name", &cert.subject_name_for_npki_app)?;
        }
        for (label, path) in [("certificate", &cert.der_file_path), ("key", &cert.key_file_path)] {
            if path.file_name().is_none() {
                return Err(SandboxError::InvalidConfiguration(format!(
                    "{label} path '{}' has no file name",
                    path.display()
                )));
            }
        }
        // Both files land in one staging folder; a shared name would let the
        // key overwrite the certificate. Windows hosts compare names without case.
        let der_name = cert.der_file_path.file_name().map(|n| n.to_string_lossy());
        let key_name = cert.key_file_path.file_name().map(|n| n.to_string_lossy());
        if let (Some(der_name), Some(key_name)) = (der_name, key_name) {
            if der_name.eq_ignore_ascii_case(&key_name) {
                return Err(SandboxError::InvalidConfiguration(format!(
                    "certificate and key share the file name '{der_name}'"
                )));
            }
        }
        Ok(())
    }
}

/// A single Windows path component: non-empty, not `.`/`..`, and free of
/// characters Windows rejects in file names.
fn check_segment(label: &str, value: &str) -> Result<()> {
    const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        return Err(SandboxError::InvalidConfiguration(format!(
            "{label} '{value}' is not a usable folder name"
        )));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| FORBIDDEN.contains(c) || c.is_control())
    {
        return Err(SandboxError::InvalidConfiguration(format!(
            "{label} '{value}' contains '{}'",
            bad.escape_default()
        )));
    }
    Ok(())
}
