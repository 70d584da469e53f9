use std::path::Path;

use super::{Bootloader, Device, TimeSync};
use crate::DecodeError;

/// Declarative description of a virtual machine.
///
/// The document is only data: nothing here touches the host. A spec with
/// no devices is legal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualMachine {
    /// Number of virtual CPUs, at least 1
    #[serde(rename = "vcpus")]
    pub vcpus: u32,
    /// Guest memory in bytes, at least 1
    #[serde(rename = "memoryBytes")]
    pub memory_bytes: u64,
    #[serde(rename = "bootloader")]
    pub bootloader: Bootloader,
    #[serde(rename = "timesync", default, skip_serializing_if = "Option::is_none")]
    pub timesync: Option<TimeSync>,
    /// Devices in declaration order
    #[serde(rename = "devices", default)]
    pub devices: Vec<Device>,
}

impl VirtualMachine {
    pub fn new(vcpus: u32, memory_bytes: u64, bootloader: Bootloader) -> VirtualMachine {
        VirtualMachine {
            vcpus,
            memory_bytes,
            bootloader,
            timesync: None,
            devices: Vec::new(),
        }
    }

    pub fn with_device(mut self, device: impl Into<Device>) -> VirtualMachine {
        self.devices.push(device.into());
        self
    }

    pub fn with_timesync(mut self, timesync: TimeSync) -> VirtualMachine {
        self.timesync = Some(timesync);
        self
    }

    pub fn from_json(document: &str) -> Result<VirtualMachine, DecodeError> {
        serde_json::from_str(document).map_err(DecodeError::Malformed)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<VirtualMachine, DecodeError> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|source| DecodeError::Io {
            path: path.display().to_string(),
            source,
        })?;
        VirtualMachine::from_json(&document)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LinuxBootloader, VirtioBlk, VirtioRng, VirtioSerial};
    use pretty_assertions::assert_eq;

    const DOCUMENT: &str = r#"{
        "vcpus": 2,
        "memoryBytes": 2147483648,
        "bootloader": {
            "kind": "linuxBootloader",
            "vmlinuzPath": "/boot/vmlinuz",
            "kernelCmdLine": "console=hvc0 root=/dev/vda",
            "initrdPath": "/boot/initrd"
        },
        "timesync": {"vsockPort": 1234},
        "devices": [
            {"kind": "virtioblk", "imagePath": "/disk.img"},
            {"kind": "virtiorng"},
            {"kind": "virtioserial", "logFile": "/tmp/console.log"}
        ]
    }"#;

    #[test]
    fn decode_full_document() {
        let vm = VirtualMachine::from_json(DOCUMENT).unwrap();
        let mut bootloader = LinuxBootloader::new(
            "/boot/vmlinuz".into(),
            "console=hvc0 root=/dev/vda".to_string(),
        );
        bootloader.initrd_path = Some("/boot/initrd".into());
        let expected = VirtualMachine::new(2, 2 * 1024 * 1024 * 1024, bootloader.into())
            .with_timesync(TimeSync::new(1234))
            .with_device(VirtioBlk::new("/disk.img".into()))
            .with_device(VirtioRng::new())
            .with_device(VirtioSerial::log_file("/tmp/console.log".into()));
        assert_eq!(vm, expected);
    }

    #[test]
    fn document_survives_encoding() {
        let vm = VirtualMachine::from_json(DOCUMENT).unwrap();
        let encoded = vm.to_json().unwrap();
        assert_eq!(VirtualMachine::from_json(&encoded).unwrap(), vm);
    }

    #[test]
    fn devices_default_to_empty() {
        let vm = VirtualMachine::from_json(
            r#"{"vcpus": 1, "memoryBytes": 268435456,
                "bootloader": {"kind": "efiBootloader", "efiVariableStorePath": "/vars"}}"#,
        )
        .unwrap();
        assert!(vm.devices.is_empty());
        assert!(vm.timesync.is_none());
    }

    #[test]
    fn unknown_kind_inside_devices_names_the_kind() {
        let err = VirtualMachine::from_json(
            r#"{"vcpus": 1, "memoryBytes": 1,
                "bootloader": {"kind": "efiBootloader", "efiVariableStorePath": "/vars"},
                "devices": [{"kind": "virtiofloppy"}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("virtiofloppy"));
    }

    #[test]
    fn unknown_bootloader_kind_names_the_kind() {
        let err = VirtualMachine::from_json(
            r#"{"vcpus": 1, "memoryBytes": 1, "bootloader": {"kind": "coreboot"}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("coreboot"));
    }

    #[test]
    fn read_from_missing_file() {
        let err = VirtualMachine::from_file("/nonexistent/vm.json").unwrap_err();
        assert!(matches!(err, DecodeError::Io { .. }));
    }
}
