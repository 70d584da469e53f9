use std::path::PathBuf;

/// virtio-blk disk backed by a raw image file.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VirtioBlk {
    /// Host path to the disk image
    #[serde(rename = "imagePath", default)]
    pub image_path: PathBuf,
    #[serde(rename = "readOnly", default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
    /// Serial reported to the guest, stable across boots
    #[serde(
        rename = "deviceIdentifier",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub device_identifier: Option<String>,
}

impl VirtioBlk {
    pub fn new(image_path: PathBuf) -> VirtioBlk {
        VirtioBlk {
            image_path,
            read_only: false,
            device_identifier: None,
        }
    }
}

/// NVM Express controller backed by a raw image file.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NvmExpressController {
    #[serde(rename = "imagePath", default)]
    pub image_path: PathBuf,
    #[serde(rename = "readOnly", default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
}

impl NvmExpressController {
    pub fn new(image_path: PathBuf) -> NvmExpressController {
        NvmExpressController {
            image_path,
            read_only: false,
        }
    }
}

/// USB mass storage device, typically used for installer and cloud-init
/// images.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UsbMassStorage {
    #[serde(rename = "imagePath", default)]
    pub image_path: PathBuf,
    #[serde(rename = "readOnly", default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
}

impl UsbMassStorage {
    pub fn new(image_path: PathBuf, read_only: bool) -> UsbMassStorage {
        UsbMassStorage {
            image_path,
            read_only,
        }
    }
}
