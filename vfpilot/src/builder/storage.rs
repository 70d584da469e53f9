use std::path::PathBuf;

use crate::backend::{StorageBus, StorageDevice};
use crate::builder::{assert_path_set, Builder, BuilderError};

#[derive(Debug)]
pub struct StorageDeviceBuilder {
    bus: StorageBus,
    image_path: Option<PathBuf>,
    read_only: bool,
    identifier: Option<String>,
}

impl StorageDeviceBuilder {
    pub fn new(bus: StorageBus) -> StorageDeviceBuilder {
        StorageDeviceBuilder {
            bus,
            image_path: None,
            read_only: false,
            identifier: None,
        }
    }

    pub fn virtio_block() -> StorageDeviceBuilder {
        Self::new(StorageBus::VirtioBlock)
    }

    pub fn nvme() -> StorageDeviceBuilder {
        Self::new(StorageBus::Nvme)
    }

    pub fn usb_mass_storage() -> StorageDeviceBuilder {
        Self::new(StorageBus::UsbMassStorage)
    }

    pub fn with_image_path(mut self, image_path: PathBuf) -> StorageDeviceBuilder {
        self.image_path = Some(image_path);
        self
    }

    pub fn as_read_only(mut self) -> StorageDeviceBuilder {
        self.read_only = true;
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> StorageDeviceBuilder {
        self.read_only = read_only;
        self
    }

    pub fn with_identifier(mut self, identifier: String) -> StorageDeviceBuilder {
        self.identifier = Some(identifier);
        self
    }
}

impl Builder<StorageDevice> for StorageDeviceBuilder {
    fn try_build(self) -> Result<StorageDevice, BuilderError> {
        assert_path_set("imagePath", &self.image_path)?;
        if self.identifier.is_some() && self.bus != StorageBus::VirtioBlock {
            return Err(BuilderError::InvalidField(
                "deviceIdentifier".to_string(),
                "only virtio-blk devices carry an identifier".to_string(),
            ));
        }
        if let Some(identifier) = &self.identifier {
            // virtio-blk serials are limited to 20 bytes
            if identifier.len() > 20 {
                return Err(BuilderError::InvalidField(
                    "deviceIdentifier".to_string(),
                    format!("'{identifier}' is longer than 20 bytes"),
                ));
            }
        }
        Ok(StorageDevice {
            bus: self.bus,
            image_path: self.image_path.unwrap_or_default(),
            read_only: self.read_only,
            identifier: self.identifier.filter(|id| !id.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_full() {
        let disk = StorageDeviceBuilder::virtio_block()
            .with_image_path("/path/to/rootfs".into())
            .as_read_only()
            .with_identifier("rootfs".to_string())
            .try_build()
            .unwrap();
        assert_eq!(disk.bus, StorageBus::VirtioBlock);
        assert!(disk.read_only);
        assert_eq!(disk.identifier.as_deref(), Some("rootfs"));
    }

    #[test]
    fn storage_incomplete_image_path() {
        let disk = StorageDeviceBuilder::nvme().try_build();
        assert_eq!(
            disk.err().unwrap(),
            BuilderError::MissingRequiredField("imagePath".to_string())
        );
    }

    #[test]
    fn storage_empty_image_path() {
        let disk = StorageDeviceBuilder::usb_mass_storage()
            .with_image_path(PathBuf::new())
            .try_build();
        assert!(disk.is_err());
    }

    #[test]
    fn identifier_only_on_virtio_block() {
        let disk = StorageDeviceBuilder::nvme()
            .with_image_path("/nvme.img".into())
            .with_identifier("nvme0".to_string())
            .try_build();
        assert!(matches!(disk, Err(BuilderError::InvalidField(ref f, _)) if f == "deviceIdentifier"));
    }

    #[test]
    fn identifier_too_long() {
        let disk = StorageDeviceBuilder::virtio_block()
            .with_image_path("/disk.img".into())
            .with_identifier("a".repeat(21))
            .try_build();
        assert!(disk.is_err());
    }
}
