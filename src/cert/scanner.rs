use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use super::{CertPair, SubjectIdentity};
use crate::config::ScannerConfig;

/// Discovers NPKI certificate pairs in the places users usually keep them.
///
/// Scanning is best-effort discovery: missing folders, unreadable entries
/// and certificates that fail to parse are skipped, never reported as
/// errors. Host files are only ever read.
#[derive(Debug, Clone)]
pub struct CertPairScanner {
    max_depth: usize,
    extra_directories: Vec<PathBuf>,
    only_directories: Option<Vec<PathBuf>>,
}

impl Default for CertPairScanner {
    fn default() -> Self {
        Self::new(&ScannerConfig::default())
    }
}

impl CertPairScanner {
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            max_depth: config.max_depth.max(1),
            extra_directories: config.extra_directories.clone(),
            only_directories: None,
        }
    }

    /// Make [`scan`](Self::scan) search `directories` instead of the usual
    /// locations. An empty list leaves the scanner unchanged.
    pub fn restricted_to(mut self, directories: Vec<PathBuf>) -> Self {
        if !directories.is_empty() {
            self.only_directories = Some(directories);
        }
        self
    }

    /// Well-known certificate store locations, in search order. Entries
    /// may not exist.
    pub fn candidate_directories(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join("AppData").join("LocalLow").join("NPKI"));
            candidates.push(home.join("NPKI"));
        }
        if let Some(documents) = dirs::document_dir() {
            candidates.push(documents.join("NPKI"));
        }
        if let Some(desktop) = dirs::desktop_dir() {
            candidates.push(desktop.join("NPKI"));
        }

        // Removable media keep the store at the drive root.
        #[cfg(windows)]
        for letter in b'D'..=b'Z' {
            candidates.push(PathBuf::from(format!("{}:\\NPKI", letter as char)));
        }

        candidates.extend(self.extra_directories.iter().cloned());

        let mut unique = Vec::with_capacity(candidates.len());
        for dir in candidates {
            if !unique.contains(&dir) {
                unique.push(dir);
            }
        }
        unique
    }

    /// Lazily walk `directories` and yield every parseable pair.
    ///
    /// Directories are visited in the given order and entries within each
    /// by file name, so numbering is stable across runs. The walk happens as the
    /// iterator is consumed, so callers see early results before a deep
    /// tree has been fully read.
    pub fn scan_x509_pairs<I>(&self, directories: I) -> impl Iterator<Item = CertPair>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let max_depth = self.max_depth;
        directories
            .into_iter()
            .filter(|dir| dir.is_dir())
            .flat_map(move |dir| {
                tracing::debug!(dir = %dir.display(), "scanning for certificate pairs");
                WalkDir::new(dir)
                    .max_depth(max_depth)
                    .follow_links(false)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(readable_entry)
            })
            .filter(|entry| entry.file_type().is_file() && has_der_extension(entry.path()))
            .filter_map(|entry| pair_for(entry.path()))
    }

    /// Scan the candidate directories.
    pub fn scan(&self) -> impl Iterator<Item = CertPair> {
        let directories = match &self.only_directories {
            Some(only) => only.clone(),
            None => self.candidate_directories(),
        };
        self.scan_x509_pairs(directories)
    }
}

fn readable_entry(entry: walkdir::Result<DirEntry>) -> Option<DirEntry> {
    match entry {
        Ok(entry) => Some(entry),
        Err(e) => {
            tracing::warn!(error = %e, "skipping unreadable entry");
            None
        }
    }
}

fn has_der_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("der"))
}

/// Sibling key for a certificate: `<stem>.key`, or `signPri.key` next to
/// `signCert.der`.
fn key_path_for(der_path: &Path) -> Option<PathBuf> {
    let stem = der_path.file_stem()?.to_str()?;
    let dir = der_path.parent()?;

    let mut candidates = vec![dir.join(format!("{stem}.key"))];
    if stem.eq_ignore_ascii_case("signCert") {
        candidates.push(dir.join("signPri.key"));
    }
    candidates.into_iter().find(|p| p.is_file())
}

fn pair_for(der_path: &Path) -> Option<CertPair> {
    let key_path = key_path_for(der_path)?;

    let bytes = match std::fs::read(der_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(path = %der_path.display(), error = %e, "certificate unreadable, skipping");
            return None;
        }
    };

    match SubjectIdentity::from_der(&bytes) {
        Ok(identity) => {
            tracing::debug!(path = %der_path.display(), org = %identity.organization, "found certificate pair");
            Some(CertPair::new(der_path.to_path_buf(), key_path, identity))
        }
        Err(reason) => {
            tracing::debug!(path = %der_path.display(), %reason, "certificate unparseable, skipping");
            None
        }
    }
}
