use std::path::PathBuf;

/// virtio-fs share of a host directory.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VirtioFs {
    /// Host directory to expose
    #[serde(rename = "sharedDir", default)]
    pub shared_dir: PathBuf,
    /// Tag used by the guest to mount the share, defaults to the base name
    /// of `sharedDir`
    #[serde(rename = "mountTag", default, skip_serializing_if = "Option::is_none")]
    pub mount_tag: Option<String>,
}

impl VirtioFs {
    pub fn new(shared_dir: PathBuf, mount_tag: Option<String>) -> VirtioFs {
        VirtioFs {
            shared_dir,
            mount_tag,
        }
    }
}

/// Share exposing the host Rosetta runtime to a Linux guest.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RosettaShare {
    #[serde(rename = "mountTag", default)]
    pub mount_tag: String,
    /// Ask the host to install Rosetta when it is missing
    #[serde(
        rename = "installRosetta",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub install_rosetta: bool,
}

impl RosettaShare {
    pub fn new(mount_tag: String) -> RosettaShare {
        RosettaShare {
            mount_tag,
            install_rosetta: false,
        }
    }
}
