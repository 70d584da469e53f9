use std::fmt;
use std::str::FromStr;

use crate::DecodeError;

/// Name of the discriminant field carried by every bootloader and device
/// document.
pub const KIND_FIELD: &str = "kind";

/// Discriminant of every bootloader and device variant.
///
/// The string form is the wire contract: a literal must never change once
/// published, otherwise existing documents stop decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    EfiBootloader,
    LinuxBootloader,
    MacOsBootloader,
    VirtioNet,
    VirtioVsock,
    VirtioBlk,
    VirtioFs,
    VirtioRng,
    VirtioSerial,
    VirtioGpu,
    VirtioInput,
    UsbMassStorage,
    Nvme,
    Rosetta,
}

impl Kind {
    pub const BOOTLOADERS: [Kind; 3] = [
        Kind::EfiBootloader,
        Kind::LinuxBootloader,
        Kind::MacOsBootloader,
    ];

    pub const DEVICES: [Kind; 11] = [
        Kind::VirtioNet,
        Kind::VirtioVsock,
        Kind::VirtioBlk,
        Kind::VirtioFs,
        Kind::VirtioRng,
        Kind::VirtioSerial,
        Kind::VirtioGpu,
        Kind::VirtioInput,
        Kind::UsbMassStorage,
        Kind::Nvme,
        Kind::Rosetta,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::EfiBootloader => "efiBootloader",
            Kind::LinuxBootloader => "linuxBootloader",
            Kind::MacOsBootloader => "macosBootloader",
            Kind::VirtioNet => "virtionet",
            Kind::VirtioVsock => "virtiosock",
            Kind::VirtioBlk => "virtioblk",
            Kind::VirtioFs => "virtiofs",
            Kind::VirtioRng => "virtiorng",
            Kind::VirtioSerial => "virtioserial",
            Kind::VirtioGpu => "virtiogpu",
            Kind::VirtioInput => "virtioinput",
            Kind::UsbMassStorage => "usbmassstorage",
            Kind::Nvme => "nvme",
            Kind::Rosetta => "rosetta",
        }
    }

    pub fn is_bootloader(&self) -> bool {
        Kind::BOOTLOADERS.contains(self)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kind::BOOTLOADERS
            .iter()
            .chain(Kind::DEVICES.iter())
            .find(|kind| kind.as_str() == s)
            .copied()
            .ok_or_else(|| DecodeError::UnknownKind(s.to_string()))
    }
}

/// Reads the discriminant of a document without looking at any other field.
pub(crate) fn peek_kind(value: &serde_json::Value) -> Result<Kind, DecodeError> {
    let object = value.as_object().ok_or(DecodeError::NotAnObject)?;
    match object.get(KIND_FIELD) {
        Some(serde_json::Value::String(kind)) => kind.parse(),
        Some(other) => Err(DecodeError::UnknownKind(other.to_string())),
        None => Err(DecodeError::MissingKind),
    }
}

/// Serializes `payload` and re-attaches the discriminant so the output is
/// self-describing.
pub(crate) fn with_kind<T: serde::Serialize>(
    kind: Kind,
    payload: &T,
) -> Result<serde_json::Value, serde_json::Error> {
    let mut value = serde_json::to_value(payload)?;
    if let serde_json::Value::Object(object) = &mut value {
        object.insert(
            KIND_FIELD.to_string(),
            serde_json::Value::String(kind.as_str().to_string()),
        );
    }
    Ok(value)
}
