use std::path::{Path, PathBuf};

use serde::Serialize;

use super::manifest::{LogonCommand, MappedFolder, SandboxManifest};
use super::{
    script, GuestPath, SandboxConfiguration, ASSETS_DIR_NAME, CERTS_DIR_NAME, GUEST_ASSETS_DIR,
    MANIFEST_FILE_NAME, STARTUP_SCRIPT_FILE_NAME,
};
use crate::cert::CertPair;
use crate::error::{Result, SandboxError};

/// Files written by [`SandboxProvisioningGenerator::materialize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    /// Absolute path of the `.wsb` file; open it to start the sandbox.
    pub manifest_path: PathBuf,
    pub script_path: PathBuf,
    pub staged_certificates: Vec<PathBuf>,
}

/// Turns a [`SandboxConfiguration`] into a startup script plus manifest.
///
/// Stateless: one instance can serve any number of runs. Runs targeting
/// the same output directory must not overlap.
#[derive(Debug, Clone, Copy, Default)]
pub struct SandboxProvisioningGenerator;

impl SandboxProvisioningGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate_startup_script(&self, config: &SandboxConfiguration) -> String {
        script::generate_startup_script(config)
    }

    /// Build the manifest for `assets_dir`.
    ///
    /// When a certificate pair is selected, its files are copied into
    /// `<assets_dir>/certs` first, and that folder is mapped read-write
    /// onto the guest certificate store.
    pub fn generate_manifest_document(
        &self,
        config: &SandboxConfiguration,
        assets_dir: &Path,
    ) -> Result<SandboxManifest> {
        config.validate()?;
        let assets_dir = utf8_host_folder(assets_dir)?;

        let assets = MappedFolder {
            host_folder: assets_dir.to_path_buf(),
            sandbox_folder: GuestPath::new(GUEST_ASSETS_DIR),
            read_only: true,
        };

        let cert_store = match &config.cert_pair {
            Some(cert) => {
                let certs_dir = assets_dir.join(CERTS_DIR_NAME);
                stage_certificates(cert, &certs_dir)?;
                Some(MappedFolder {
                    host_folder: certs_dir,
                    sandbox_folder: GuestPath::cert_store(cert),
                    read_only: false,
                })
            }
            None => None,
        };

        Ok(SandboxManifest {
            assets,
            cert_store,
            logon_command: LogonCommand {
                command: GuestPath::startup_script(),
            },
        })
    }

    /// Write the whole profile under `output_dir`:
    /// `assets/StartupScript.cmd`, optional `assets/certs/*`, and
    /// `InternetBankingSandbox.wsb`. Safe to repeat; files are overwritten.
    pub fn materialize(
        &self,
        output_dir: &Path,
        config: &SandboxConfiguration,
    ) -> Result<GenerationReport> {
        config.validate()?;

        let output_dir =
            std::path::absolute(output_dir).map_err(|e| SandboxError::io(output_dir, e))?;
        utf8_host_folder(&output_dir)?;
        let assets_dir = output_dir.join(ASSETS_DIR_NAME);
        create_dir(&assets_dir)?;

        let script_path = assets_dir.join(STARTUP_SCRIPT_FILE_NAME);
        let script = self.generate_startup_script(config);
        std::fs::write(&script_path, script.as_bytes())
            .map_err(|e| SandboxError::io(&script_path, e))?;

        let manifest = self.generate_manifest_document(config, &assets_dir)?;
        let manifest_path = output_dir.join(MANIFEST_FILE_NAME);
        std::fs::write(&manifest_path, manifest.to_xml())
            .map_err(|e| SandboxError::io(&manifest_path, e))?;

        let certs_dir = assets_dir.join(CERTS_DIR_NAME);
        let staged_certificates = match &config.cert_pair {
            Some(cert) => staged_paths(cert, &certs_dir),
            None => {
                clear_staged_certificates(&certs_dir)?;
                Vec::new()
            }
        };

        tracing::info!(
            manifest = %manifest_path.display(),
            service = config.selected_service.as_ref().map(|s| s.id.as_str()).unwrap_or("-"),
            certificate = config.cert_pair.is_some(),
            "sandbox profile written"
        );

        Ok(GenerationReport {
            manifest_path,
            script_path,
            staged_certificates,
        })
    }
}

/// Host folders are written into the manifest as text, so they must be
/// valid UTF-8.
fn utf8_host_folder(path: &Path) -> Result<&Path> {
    match path.to_str() {
        Some(_) => Ok(path),
        None => Err(SandboxError::InvalidConfiguration(format!(
            "host folder '{}' is not valid UTF-8",
            path.display()
        ))),
    }
}

/// The certs folder sits inside the read-only assets mapping, so a run
/// without a certificate must not leave an earlier pair behind.
fn clear_staged_certificates(certs_dir: &Path) -> Result<()> {
    if !certs_dir.is_dir() {
        return Ok(());
    }
    std::fs::remove_dir_all(certs_dir).map_err(|e| SandboxError::io(certs_dir, e))?;
    tracing::debug!(path = %certs_dir.display(), "removed staged certificates");
    Ok(())
}

fn create_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| SandboxError::io(path, e))
}

fn staged_paths(cert: &CertPair, certs_dir: &Path) -> Vec<PathBuf> {
    [&cert.der_file_path, &cert.key_file_path]
        .into_iter()
        .filter_map(|p| p.file_name())
        .map(|name| certs_dir.join(name))
        .collect()
}

/// Copy the pair into `certs_dir`, overwriting earlier copies, and drop any
/// other files left there by a previous selection.
fn stage_certificates(cert: &CertPair, certs_dir: &Path) -> Result<()> {
    create_dir(certs_dir)?;

    let destinations = staged_paths(cert, certs_dir);
    for (source, dest) in [&cert.der_file_path, &cert.key_file_path]
        .into_iter()
        .zip(&destinations)
    {
        if same_file(source, dest) {
            continue;
        }
        std::fs::copy(source, dest).map_err(|e| SandboxError::io(source, e))?;
        tracing::debug!(from = %source.display(), to = %dest.display(), "staged certificate file");
    }

    let entries = std::fs::read_dir(certs_dir).map_err(|e| SandboxError::io(certs_dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| SandboxError::io(certs_dir, e))?.path();
        if path.is_file() && !destinations.contains(&path) {
            std::fs::remove_file(&path).map_err(|e| SandboxError::io(&path, e))?;
            tracing::debug!(path = %path.display(), "removed stale staged file");
        }
    }
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::test_support::write_npki_pair;
    use crate::error::ErrorKind;
    use crate::sandbox::test_support::{cert, service};
    use pretty_assertions::assert_eq;

    fn host_pair(root: &Path) -> CertPair {
        let user = root.join("host").join("NPKI").join("yessign").join("USER").join("me");
        let (der, key) = write_npki_pair(&user, "yessign", "personal4IB", "hong()0001");
        CertPair::from_files(&der, &key).unwrap()
    }

    #[test]
    fn manifest_without_cert_has_single_read_only_mapping() {
        let out = tempfile::tempdir().unwrap();
        let config = SandboxConfiguration::new(Some(service(&[])), None);
        let manifest = SandboxProvisioningGenerator
            .generate_manifest_document(&config, out.path())
            .unwrap();

        let folders: Vec<&MappedFolder> = manifest.mapped_folders().collect();
        assert_eq!(folders.len(), 1);
        assert!(folders[0].read_only);
        assert_eq!(folders[0].sandbox_folder.as_str(), r"C:\assets");
        assert_eq!(manifest.logon_command.command.as_str(), r"C:\assets\StartupScript.cmd");
        assert!(!out.path().join(CERTS_DIR_NAME).exists());
    }

    #[test]
    fn manifest_with_cert_stages_and_maps_read_write() {
        let root = tempfile::tempdir().unwrap();
        let pair = host_pair(root.path());
        let assets = root.path().join("assets");
        std::fs::create_dir_all(&assets).unwrap();

        let config = SandboxConfiguration::new(None, Some(pair.clone()));
        let manifest = SandboxProvisioningGenerator
            .generate_manifest_document(&config, &assets)
            .unwrap();

        let store = manifest.cert_store.as_ref().unwrap();
        assert!(!store.read_only);
        assert_eq!(store.host_folder, assets.join("certs"));
        assert_eq!(
            store.sandbox_folder.as_str(),
            format!(
                r"C:\Users\WDAGUtilityAccount\AppData\LocalLow\NPKI\yessign\USER\{}",
                pair.subject_name_for_npki_app
            )
        );
        assert_eq!(
            std::fs::read(assets.join("certs").join("signCert.der")).unwrap(),
            std::fs::read(&pair.der_file_path).unwrap()
        );
        assert!(assets.join("certs").join("signPri.key").is_file());
    }

    #[test]
    fn missing_cert_file_is_io_failure() {
        let out = tempfile::tempdir().unwrap();
        let config = SandboxConfiguration::new(None, Some(cert("yessign", "cn=ghost", true)));
        let err = SandboxProvisioningGenerator
            .materialize(out.path(), &config)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoFailure);
    }

    #[test]
    fn invalid_identity_is_rejected_before_writing() {
        let out = tempfile::tempdir().unwrap();
        let target = out.path().join("profile");
        let config = SandboxConfiguration::new(None, Some(cert("", "cn=x", true)));
        let err = SandboxProvisioningGenerator
            .materialize(&target, &config)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
        assert!(!target.exists());
    }

    #[test]
    fn materialize_writes_expected_layout() {
        let out = tempfile::tempdir().unwrap();
        let target = out.path().join("nested").join("profile");
        let config = SandboxConfiguration::new(
            Some(service(&[("SecureClient", "https://cdn.example.com/pkg/setup1.exe")])),
            None,
        );

        let report = SandboxProvisioningGenerator
            .materialize(&target, &config)
            .unwrap();

        assert!(report.manifest_path.is_absolute());
        assert_eq!(report.manifest_path, target.join("InternetBankingSandbox.wsb"));
        assert_eq!(report.script_path, target.join("assets").join("StartupScript.cmd"));
        assert!(report.staged_certificates.is_empty());

        let script = std::fs::read_to_string(&report.script_path).unwrap();
        assert!(script.contains("REM Run SecureClient Setup"));
        assert!(script.contains("setup1.exe"));
        assert!(script.contains(r"%temp%\setup1.exe"));
        assert_eq!(
            script.lines().last(),
            Some("start \"\" \"https://bank.example.com\"")
        );

        let manifest = std::fs::read_to_string(&report.manifest_path).unwrap();
        assert_eq!(manifest.matches("<MappedFolder>").count(), 1);
        assert!(manifest.contains("<ReadOnly>True</ReadOnly>"));
        assert!(manifest.contains(r"<Command>C:\assets\StartupScript.cmd</Command>"));
    }

    #[test]
    fn materialize_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let pair = host_pair(root.path());
        let target = root.path().join("profile");
        let config = SandboxConfiguration::new(
            Some(service(&[("Broken", "not a url"), ("Ok", "https://cdn.example.com/a.exe")])),
            Some(pair),
        );
        let generator = SandboxProvisioningGenerator::new();

        let first = generator.materialize(&target, &config).unwrap();
        let script = std::fs::read(&first.script_path).unwrap();
        let manifest = std::fs::read(&first.manifest_path).unwrap();

        let second = generator.materialize(&target, &config).unwrap();
        assert_eq!(first, second);
        assert_eq!(script, std::fs::read(&second.script_path).unwrap());
        assert_eq!(manifest, std::fs::read(&second.manifest_path).unwrap());

        let mut staged: Vec<String> = std::fs::read_dir(target.join("assets").join("certs"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        staged.sort();
        assert_eq!(staged, vec!["signCert.der", "signPri.key"]);
    }

    #[test]
    fn host_folders_exist_after_materialize() {
        let root = tempfile::tempdir().unwrap();
        let pair = host_pair(root.path());
        let target = root.path().join("profile");
        let config = SandboxConfiguration::new(None, Some(pair));

        let report = SandboxProvisioningGenerator
            .materialize(&target, &config)
            .unwrap();
        let xml = std::fs::read_to_string(&report.manifest_path).unwrap();

        let hosts: Vec<&str> = xml
            .lines()
            .filter_map(|l| {
                l.trim()
                    .strip_prefix("<HostFolder>")?
                    .strip_suffix("</HostFolder>")
            })
            .collect();
        assert_eq!(hosts.len(), 2);
        for host in hosts {
            assert!(Path::new(host).is_dir(), "{host} missing");
        }
    }

    #[test]
    fn run_without_cert_removes_previously_staged_pair() {
        let root = tempfile::tempdir().unwrap();
        let pair = host_pair(root.path());
        let target = root.path().join("profile");
        let generator = SandboxProvisioningGenerator;

        generator
            .materialize(&target, &SandboxConfiguration::new(None, Some(pair)))
            .unwrap();
        let certs = target.join("assets").join("certs");
        assert!(certs.join("signPri.key").is_file());

        let report = generator
            .materialize(&target, &SandboxConfiguration::new(Some(service(&[])), None))
            .unwrap();

        assert!(report.staged_certificates.is_empty());
        assert!(!certs.exists());
        let xml = std::fs::read_to_string(&report.manifest_path).unwrap();
        assert_eq!(xml.matches("<MappedFolder>").count(), 1);
    }

    #[test]
    fn shared_file_name_is_rejected_before_staging() {
        let root = tempfile::tempdir().unwrap();
        let (der, _) = write_npki_pair(&root.path().join("a"), "yessign", "personal4IB", "hong");
        let other = root.path().join("b");
        std::fs::create_dir_all(&other).unwrap();
        let key = other.join("signCert.der");
        std::fs::write(&key, b"encrypted-private-key").unwrap();

        let mut pair = CertPair::from_files(&der, &der).unwrap();
        pair.key_file_path = key;
        let target = root.path().join("profile");
        let err = SandboxProvisioningGenerator
            .materialize(&target, &SandboxConfiguration::new(None, Some(pair)))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
        assert!(!target.join("assets").join("certs").exists());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_host_folder_is_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let root = tempfile::tempdir().unwrap();
        let assets = root.path().join(OsStr::from_bytes(b"assets-\xff"));
        let err = SandboxProvisioningGenerator
            .generate_manifest_document(&SandboxConfiguration::default(), &assets)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);

        let output = root.path().join(OsStr::from_bytes(b"out-\xfe"));
        let err = SandboxProvisioningGenerator
            .materialize(&output, &SandboxConfiguration::default())
            .unwrap_err();
        assert!(!output.exists());
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    }

    #[test]
    fn switching_certificates_drops_stale_copies() {
        let root = tempfile::tempdir().unwrap();
        let first = host_pair(root.path());
        let other_dir = root.path().join("backup");
        std::fs::create_dir_all(&other_dir).unwrap();
        std::fs::write(
            other_dir.join("corp.der"),
            crate::cert::test_support::mint_der("SignKorea", "corporation4EC", "acme"),
        )
        .unwrap();
        std::fs::write(other_dir.join("corp.key"), b"k").unwrap();
        let second =
            CertPair::from_files(&other_dir.join("corp.der"), &other_dir.join("corp.key")).unwrap();

        let target = root.path().join("profile");
        let generator = SandboxProvisioningGenerator;
        generator
            .materialize(&target, &SandboxConfiguration::new(None, Some(first)))
            .unwrap();
        let report = generator
            .materialize(&target, &SandboxConfiguration::new(None, Some(second)))
            .unwrap();

        let certs = target.join("assets").join("certs");
        assert!(!certs.join("signCert.der").exists());
        assert_eq!(
            report.staged_certificates,
            vec![certs.join("corp.der"), certs.join("corp.key")]
        );
        let xml = std::fs::read_to_string(&report.manifest_path).unwrap();
        assert!(xml.contains(r"AppData\LocalLow\NPKI\SignKorea</SandboxFolder>"));
    }
}
