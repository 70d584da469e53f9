use std::path::PathBuf;

use crate::backend::{DirectoryShare, HostArch, ShareSource};
use crate::builder::{assert_path_set, Builder, BuilderError};

/// Tag used when a Rosetta share does not name one
pub const DEFAULT_ROSETTA_TAG: &str = "rosetta";

/// Builds a virtio-fs share of a host directory. The mount tag defaults to
/// the base name of the shared directory.
#[derive(Debug, Default)]
pub struct DirectoryShareBuilder {
    shared_dir: Option<PathBuf>,
    mount_tag: Option<String>,
    read_only: bool,
}

impl DirectoryShareBuilder {
    pub fn new() -> DirectoryShareBuilder {
        DirectoryShareBuilder::default()
    }

    pub fn with_shared_dir(mut self, shared_dir: PathBuf) -> DirectoryShareBuilder {
        self.shared_dir = Some(shared_dir);
        self
    }

    pub fn with_mount_tag(mut self, mount_tag: String) -> DirectoryShareBuilder {
        self.mount_tag = Some(mount_tag);
        self
    }

    pub fn as_read_only(mut self) -> DirectoryShareBuilder {
        self.read_only = true;
        self
    }
}

impl Builder<DirectoryShare> for DirectoryShareBuilder {
    fn try_build(self) -> Result<DirectoryShare, BuilderError> {
        assert_path_set("sharedDir", &self.shared_dir)?;
        let path = self.shared_dir.unwrap_or_default();
        let tag = match self.mount_tag.filter(|tag| !tag.is_empty()) {
            Some(tag) => tag,
            None => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    BuilderError::InvalidField(
                        "sharedDir".to_string(),
                        format!("cannot derive a mount tag from {}", path.display()),
                    )
                })?,
        };
        Ok(DirectoryShare {
            tag,
            source: ShareSource::Directory {
                path,
                read_only: self.read_only,
            },
        })
    }
}

/// Builds the share exposing the host Rosetta runtime. Apple silicon only.
#[derive(Debug)]
pub struct RosettaShareBuilder {
    host_arch: HostArch,
    mount_tag: Option<String>,
    install: bool,
}

impl RosettaShareBuilder {
    pub fn new(host_arch: HostArch) -> RosettaShareBuilder {
        RosettaShareBuilder {
            host_arch,
            mount_tag: None,
            install: false,
        }
    }

    pub fn with_mount_tag(mut self, mount_tag: String) -> RosettaShareBuilder {
        self.mount_tag = Some(mount_tag);
        self
    }

    pub fn with_install(mut self, install: bool) -> RosettaShareBuilder {
        self.install = install;
        self
    }
}

impl Builder<DirectoryShare> for RosettaShareBuilder {
    fn try_build(self) -> Result<DirectoryShare, BuilderError> {
        if self.host_arch != HostArch::Aarch64 {
            return Err(BuilderError::InvalidField(
                "kind".to_string(),
                format!("Rosetta is not available on {} hosts", self.host_arch),
            ));
        }
        Ok(DirectoryShare {
            tag: self
                .mount_tag
                .filter(|tag| !tag.is_empty())
                .unwrap_or_else(|| DEFAULT_ROSETTA_TAG.to_string()),
            source: ShareSource::Rosetta {
                install: self.install,
            },
        })
    }
}
