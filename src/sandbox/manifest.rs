use std::path::PathBuf;

use super::GuestPath;
use crate::output::xml::{render_document, Element};

/// A host folder exposed inside the guest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedFolder {
    pub host_folder: PathBuf,
    pub sandbox_folder: GuestPath,
    pub read_only: bool,
}

impl MappedFolder {
    fn to_element(&self) -> Element {
        Element::new("MappedFolder")
            .child(Element::text(
                "HostFolder",
                self.host_folder.display().to_string(),
            ))
            .child(Element::text("SandboxFolder", self.sandbox_folder.as_str()))
            .child(Element::text("ReadOnly", bool_text(self.read_only)))
    }
}

/// Command run once the guest account logs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogonCommand {
    pub command: GuestPath,
}

/// A Windows Sandbox `.wsb` document.
///
/// The assets mapping and the logon command are always present; the
/// certificate store mapping is optional. Rendering order is fixed by
/// [`SandboxManifest::to_element`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxManifest {
    pub assets: MappedFolder,
    pub cert_store: Option<MappedFolder>,
    pub logon_command: LogonCommand,
}

impl SandboxManifest {
    /// Mapped folders in document order.
    pub fn mapped_folders(&self) -> impl Iterator<Item = &MappedFolder> {
        std::iter::once(&self.assets).chain(self.cert_store.as_ref())
    }

    pub fn to_element(&self) -> Element {
        Element::new("Configuration")
            .child(
                Element::new("MappedFolders")
                    .children(self.mapped_folders().map(MappedFolder::to_element)),
            )
            .child(
                Element::new("LogonCommand")
                    .child(Element::text("Command", self.logon_command.command.as_str())),
            )
    }

    pub fn to_xml(&self) -> String {
        render_document(&self.to_element())
    }
}

fn bool_text(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn assets_only() -> SandboxManifest {
        SandboxManifest {
            assets: MappedFolder {
                host_folder: PathBuf::from("/out/assets"),
                sandbox_folder: GuestPath::new(r"C:\assets"),
                read_only: true,
            },
            cert_store: None,
            logon_command: LogonCommand {
                command: GuestPath::startup_script(),
            },
        }
    }

    #[test]
    fn renders_wsb_layout() {
        assert_eq!(
            assets_only().to_xml(),
            r#"<?xml version="1.0" encoding="utf-8"?>
<Configuration>
  <MappedFolders>
    <MappedFolder>
      <HostFolder>/out/assets</HostFolder>
      <SandboxFolder>C:\assets</SandboxFolder>
      <ReadOnly>True</ReadOnly>
    </MappedFolder>
  </MappedFolders>
  <LogonCommand>
    <Command>C:\assets\StartupScript.cmd</Command>
  </LogonCommand>
</Configuration>
"#
        );
    }

    #[test]
    fn cert_store_follows_assets() {
        let mut manifest = assets_only();
        manifest.cert_store = Some(MappedFolder {
            host_folder: PathBuf::from("/out/assets/certs"),
            sandbox_folder: GuestPath::new(r"C:\store"),
            read_only: false,
        });

        let root = manifest.to_element();
        let folders: Vec<&Element> = root
            .children_named("MappedFolders")
            .flat_map(|f| f.children_named("MappedFolder"))
            .collect();
        assert_eq!(folders.len(), 2);
        assert_eq!(folders[0].child_text("ReadOnly"), Some("True"));
        assert_eq!(folders[1].child_text("SandboxFolder"), Some(r"C:\store"));
        assert_eq!(folders[1].child_text("ReadOnly"), Some("False"));
    }
}
