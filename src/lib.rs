//! BankSandbox: disposable Windows Sandbox profiles for Korean internet banking.
//!
//! Picks a banking service from a catalog and, optionally, an NPKI
//! certificate pair found on the host, then writes a `.wsb` manifest and a
//! logon script that installs the bank's security packages inside the
//! sandbox and maps the certificate into the guest's store.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::{Path, PathBuf};
//! use banksandbox::{generate, CertSelection, GenerateOptions};
//! use banksandbox::catalog::Catalog;
//! use banksandbox::cert::CertPairScanner;
//!
//! let catalog = Catalog::load(Path::new("catalog.toml")).unwrap();
//! let options = GenerateOptions {
//!     output_dir: PathBuf::from("./sandbox"),
//!     service_id: Some("ExampleBank".into()),
//!     cert: CertSelection::Auto,
//! };
//! let report = generate(&catalog, &CertPairScanner::default(), &options).unwrap();
//! println!("Open {}", report.manifest_path.display());
//! ```

pub mod catalog;
pub mod cert;
pub mod config;
pub mod error;
pub mod output;
pub mod sandbox;

use std::path::PathBuf;

use catalog::Catalog;
use cert::{CertPair, CertPairScanner};
use error::{Result, SandboxError};
use sandbox::{GenerationReport, SandboxConfiguration, SandboxProvisioningGenerator};

/// How the certificate pair for a run is chosen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CertSelection {
    /// No certificate mapping.
    None,
    /// Scan, and use the result only if exactly one pair is found.
    #[default]
    Auto,
    /// 1-based position in the scan result.
    Index(usize),
    /// Explicit files, bypassing the scan.
    Files { der: PathBuf, key: PathBuf },
}

/// Options for a generate invocation.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub output_dir: PathBuf,
    /// Catalog id; `None` provisions no packages and no homepage.
    pub service_id: Option<String>,
    pub cert: CertSelection,
}

/// Resolve a [`CertSelection`] into at most one pair.
pub fn select_cert(selection: &CertSelection, scanner: &CertPairScanner) -> Result<Option<CertPair>> {
    match selection {
        CertSelection::None => Ok(None),
        CertSelection::Auto => {
            let pairs: Vec<CertPair> = scanner.scan().collect();
            let selected = cert::select_single(&pairs).cloned();
            if selected.is_none() && !pairs.is_empty() {
                tracing::warn!(
                    found = pairs.len(),
                    "several certificate pairs found, none selected; pass --cert"
                );
            }
            Ok(selected)
        }
        CertSelection::Index(index) => {
            let pairs: Vec<CertPair> = scanner.scan().collect();
            index
                .checked_sub(1)
                .and_then(|i| pairs.into_iter().nth(i))
                .map(Some)
                .ok_or_else(|| {
                    SandboxError::InvalidConfiguration(format!(
                        "no certificate pair number {index}; run scan-certs to list them"
                    ))
                })
        }
        CertSelection::Files { der, key } => CertPair::from_files(der, key).map(Some),
    }
}

/// Run a complete generation: look up the service, pick the certificate,
/// write the profile.
pub fn generate(
    catalog: &Catalog,
    scanner: &CertPairScanner,
    options: &GenerateOptions,
) -> Result<GenerationReport> {
    let selected_service = match &options.service_id {
        Some(id) => Some(
            catalog
                .find(id)
                .cloned()
                .ok_or_else(|| SandboxError::Catalog(format!("unknown service '{id}'")))?,
        ),
        None => None,
    };

    let cert_pair = select_cert(&options.cert, scanner)?;
    let config = SandboxConfiguration::new(selected_service, cert_pair);

    SandboxProvisioningGenerator::new().materialize(&options.output_dir, &config)
}
