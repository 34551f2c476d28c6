//! NPKI certificate pairs: a DER-encoded public certificate plus its
//! private key file, with the subject identity needed to place them in the
//! guest's certificate store.

pub mod scanner;
pub mod subject;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SandboxError};

pub use scanner::CertPairScanner;
pub use subject::SubjectIdentity;

/// A located certificate/key pair. Immutable once scanned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertPair {
    pub der_file_path: PathBuf,
    pub key_file_path: PathBuf,
    /// First `O` attribute of the subject, e.g. `yessign`.
    pub subject_organization: String,
    /// Subject DN in NPKI folder form, e.g. `cn=...,ou=personal4IB,o=yessign,c=kr`.
    pub subject_name_for_npki_app: String,
    pub is_personal_cert: bool,
    pub subject_common_name: Option<String>,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
}

impl CertPair {
    pub fn new(der_file_path: PathBuf, key_file_path: PathBuf, identity: SubjectIdentity) -> Self {
        Self {
            der_file_path,
            key_file_path,
            subject_organization: identity.organization,
            subject_name_for_npki_app: identity.npki_name,
            is_personal_cert: identity.is_personal,
            subject_common_name: identity.common_name,
            not_before: identity.not_before,
            not_after: identity.not_after,
        }
    }

    /// Build a pair from explicitly chosen files.
    pub fn from_files(der_file_path: &Path, key_file_path: &Path) -> Result<Self> {
        let der = std::fs::read(der_file_path).map_err(|e| SandboxError::io(der_file_path, e))?;
        if !key_file_path.is_file() {
            return Err(SandboxError::io(
                key_file_path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "private key file not found"),
            ));
        }
        let identity =
            SubjectIdentity::from_der(&der).map_err(|message| SandboxError::Certificate {
                path: der_file_path.to_path_buf(),
                message,
            })?;
        Ok(Self::new(
            der_file_path.to_path_buf(),
            key_file_path.to_path_buf(),
            identity,
        ))
    }

    /// Name shown in listings: the common name, or the NPKI subject string.
    pub fn display_name(&self) -> &str {
        self.subject_common_name
            .as_deref()
            .unwrap_or(&self.subject_name_for_npki_app)
    }
}

/// Auto-selection rule: a scan with exactly one candidate selects it.
pub fn select_single(pairs: &[CertPair]) -> Option<&CertPair> {
    match pairs {
        [only] => Some(only),
        _ => None,
    }
}
