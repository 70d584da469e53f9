use std::path::PathBuf;

use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::kind::{peek_kind, with_kind, Kind};
use crate::DecodeError;

/// Boots the guest through UEFI firmware.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EfiBootloader {
    /// Path to the file holding the EFI variables
    #[serde(rename = "efiVariableStorePath", default)]
    pub efi_variable_store_path: PathBuf,
    /// Create the variable store file instead of opening an existing one
    #[serde(rename = "createVariableStore", default)]
    pub create_variable_store: bool,
}

impl EfiBootloader {
    pub fn new(efi_variable_store_path: PathBuf, create_variable_store: bool) -> EfiBootloader {
        EfiBootloader {
            efi_variable_store_path,
            create_variable_store,
        }
    }
}

/// Boots a Linux kernel directly.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LinuxBootloader {
    /// Host path to the uncompressed kernel image
    #[serde(rename = "vmlinuzPath", default)]
    pub vmlinuz_path: PathBuf,
    /// Kernel command line
    #[serde(rename = "kernelCmdLine", default)]
    pub kernel_cmd_line: String,
    /// Host path to the initial ramdisk
    #[serde(
        rename = "initrdPath",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub initrd_path: Option<PathBuf>,
}

impl LinuxBootloader {
    pub fn new(vmlinuz_path: PathBuf, kernel_cmd_line: String) -> LinuxBootloader {
        LinuxBootloader {
            vmlinuz_path,
            kernel_cmd_line,
            initrd_path: None,
        }
    }
}

/// Boots a macOS guest. Only usable on Apple silicon hosts.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MacOsBootloader {
    #[serde(rename = "machineIdentifierPath", default)]
    pub machine_identifier_path: PathBuf,
    #[serde(rename = "hardwareModelPath", default)]
    pub hardware_model_path: PathBuf,
    #[serde(rename = "auxImagePath", default)]
    pub aux_image_path: PathBuf,
}

impl MacOsBootloader {
    pub fn new(
        machine_identifier_path: PathBuf,
        hardware_model_path: PathBuf,
        aux_image_path: PathBuf,
    ) -> MacOsBootloader {
        MacOsBootloader {
            machine_identifier_path,
            hardware_model_path,
            aux_image_path,
        }
    }
}

/// The guest boot method. Exactly one per virtual machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Bootloader {
    Efi(EfiBootloader),
    Linux(LinuxBootloader),
    MacOs(MacOsBootloader),
}

impl Bootloader {
    pub fn kind(&self) -> Kind {
        match self {
            Bootloader::Efi(_) => Kind::EfiBootloader,
            Bootloader::Linux(_) => Kind::LinuxBootloader,
            Bootloader::MacOs(_) => Kind::MacOsBootloader,
        }
    }

    /// Decodes a kind-tagged bootloader document.
    pub fn from_value(value: serde_json::Value) -> Result<Bootloader, DecodeError> {
        let kind = peek_kind(&value)?;
        let payload = |source| DecodeError::Payload { kind, source };
        match kind {
            Kind::EfiBootloader => serde_json::from_value(value)
                .map(Bootloader::Efi)
                .map_err(payload),
            Kind::LinuxBootloader => serde_json::from_value(value)
                .map(Bootloader::Linux)
                .map_err(payload),
            Kind::MacOsBootloader => serde_json::from_value(value)
                .map(Bootloader::MacOs)
                .map_err(payload),
            other => Err(DecodeError::WrongCategory(other, "device", "bootloader")),
        }
    }

    /// Encodes the bootloader with its `kind` field attached.
    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Bootloader::Efi(efi) => with_kind(self.kind(), efi),
            Bootloader::Linux(linux) => with_kind(self.kind(), linux),
            Bootloader::MacOs(macos) => with_kind(self.kind(), macos),
        }
    }
}

impl Serialize for Bootloader {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value()
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Bootloader {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Bootloader::from_value(value).map_err(D::Error::custom)
    }
}

impl From<EfiBootloader> for Bootloader {
    fn from(efi: EfiBootloader) -> Self {
        Bootloader::Efi(efi)
    }
}

impl From<LinuxBootloader> for Bootloader {
    fn from(linux: LinuxBootloader) -> Self {
        Bootloader::Linux(linux)
    }
}

impl From<MacOsBootloader> for Bootloader {
    fn from(macos: MacOsBootloader) -> Self {
        Bootloader::MacOs(macos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn linux_bootloader_document() {
        let value = json!({
            "kind": "linuxBootloader",
            "vmlinuzPath": "/vmlinuz",
            "kernelCmdLine": "console=hvc0",
            "initrdPath": "/initrd",
        });
        let bootloader = Bootloader::from_value(value.clone()).unwrap();
        assert_eq!(
            bootloader,
            Bootloader::Linux(LinuxBootloader {
                vmlinuz_path: "/vmlinuz".into(),
                kernel_cmd_line: "console=hvc0".to_string(),
                initrd_path: Some("/initrd".into()),
            })
        );
        assert_eq!(bootloader.to_value().unwrap(), value);
    }

    #[test]
    fn efi_bootloader_keeps_kind_when_encoded() {
        let efi = Bootloader::from(EfiBootloader::new("/vars".into(), true));
        let value = efi.to_value().unwrap();
        assert_eq!(value["kind"], "efiBootloader");
        assert_eq!(value["createVariableStore"], true);
        assert_eq!(Bootloader::from_value(value).unwrap(), efi);
    }

    #[test]
    fn unknown_bootloader_kind() {
        let err = Bootloader::from_value(json!({"kind": "biosBootloader"})).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownKind(ref k) if k == "biosBootloader"));
    }

    #[test]
    fn device_kind_is_not_a_bootloader() {
        let err = Bootloader::from_value(json!({"kind": "virtiorng"})).unwrap_err();
        assert!(matches!(err, DecodeError::WrongCategory(Kind::VirtioRng, _, _)));
    }
}
