use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::kind::{peek_kind, with_kind, Kind};
use super::virtio_net::VirtioNetDocument;
use super::{
    NvmExpressController, RosettaShare, UsbMassStorage, VirtioBlk, VirtioFs, VirtioGpu,
    VirtioInput, VirtioNet, VirtioRng, VirtioSerial, VirtioVsock,
};
use crate::DecodeError;

/// Every device a virtual machine document can declare.
///
/// Decoding and encoding go through [`Device::from_value`] and
/// [`Device::to_value`]: the `kind` field is read first, then the rest of
/// the document is decoded as the payload type bound to that kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Device {
    VirtioNet(VirtioNet),
    VirtioVsock(VirtioVsock),
    VirtioBlk(VirtioBlk),
    VirtioFs(VirtioFs),
    VirtioRng(VirtioRng),
    VirtioSerial(VirtioSerial),
    VirtioGpu(VirtioGpu),
    VirtioInput(VirtioInput),
    UsbMassStorage(UsbMassStorage),
    Nvme(NvmExpressController),
    Rosetta(RosettaShare),
}

type Decoder = fn(serde_json::Value) -> Result<Device, DecodeError>;

fn payload<T>(kind: Kind, value: serde_json::Value) -> Result<T, DecodeError>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_value(value).map_err(|source| DecodeError::Payload { kind, source })
}

fn decode_virtio_net(value: serde_json::Value) -> Result<Device, DecodeError> {
    let doc: VirtioNetDocument = payload(Kind::VirtioNet, value)?;
    VirtioNet::try_from(doc).map(Device::VirtioNet)
}

/// Dispatch table from a device kind to its payload decoder.
fn decoder(kind: Kind) -> Option<Decoder> {
    let decoder: Decoder = match kind {
        Kind::VirtioNet => decode_virtio_net,
        Kind::VirtioVsock => |v| payload(Kind::VirtioVsock, v).map(Device::VirtioVsock),
        Kind::VirtioBlk => |v| payload(Kind::VirtioBlk, v).map(Device::VirtioBlk),
        Kind::VirtioFs => |v| payload(Kind::VirtioFs, v).map(Device::VirtioFs),
        Kind::VirtioRng => |v| payload(Kind::VirtioRng, v).map(Device::VirtioRng),
        Kind::VirtioSerial => |v| payload(Kind::VirtioSerial, v).map(Device::VirtioSerial),
        Kind::VirtioGpu => |v| payload(Kind::VirtioGpu, v).map(Device::VirtioGpu),
        Kind::VirtioInput => |v| payload(Kind::VirtioInput, v).map(Device::VirtioInput),
        Kind::UsbMassStorage => {
            |v| payload(Kind::UsbMassStorage, v).map(Device::UsbMassStorage)
        }
        Kind::Nvme => |v| payload(Kind::Nvme, v).map(Device::Nvme),
        Kind::Rosetta => |v| payload(Kind::Rosetta, v).map(Device::Rosetta),
        Kind::EfiBootloader | Kind::LinuxBootloader | Kind::MacOsBootloader => return None,
    };
    Some(decoder)
}

impl Device {
    pub fn kind(&self) -> Kind {
        match self {
            Device::VirtioNet(_) => Kind::VirtioNet,
            Device::VirtioVsock(_) => Kind::VirtioVsock,
            Device::VirtioBlk(_) => Kind::VirtioBlk,
            Device::VirtioFs(_) => Kind::VirtioFs,
            Device::VirtioRng(_) => Kind::VirtioRng,
            Device::VirtioSerial(_) => Kind::VirtioSerial,
            Device::VirtioGpu(_) => Kind::VirtioGpu,
            Device::VirtioInput(_) => Kind::VirtioInput,
            Device::UsbMassStorage(_) => Kind::UsbMassStorage,
            Device::Nvme(_) => Kind::Nvme,
            Device::Rosetta(_) => Kind::Rosetta,
        }
    }

    /// Decodes a kind-tagged device document.
    pub fn from_value(value: serde_json::Value) -> Result<Device, DecodeError> {
        let kind = peek_kind(&value)?;
        let decode = decoder(kind)
            .ok_or(DecodeError::WrongCategory(kind, "bootloader", "device"))?;
        decode(value)
    }

    /// Encodes the device with its `kind` field attached.
    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        let kind = self.kind();
        match self {
            Device::VirtioNet(dev) => with_kind(kind, &VirtioNetDocument::from(dev)),
            Device::VirtioVsock(dev) => with_kind(kind, dev),
            Device::VirtioBlk(dev) => with_kind(kind, dev),
            Device::VirtioFs(dev) => with_kind(kind, dev),
            Device::VirtioRng(dev) => with_kind(kind, dev),
            Device::VirtioSerial(dev) => with_kind(kind, dev),
            Device::VirtioGpu(dev) => with_kind(kind, dev),
            Device::VirtioInput(dev) => with_kind(kind, dev),
            Device::UsbMassStorage(dev) => with_kind(kind, dev),
            Device::Nvme(dev) => with_kind(kind, dev),
            Device::Rosetta(dev) => with_kind(kind, dev),
        }
    }
}

impl Serialize for Device {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value()
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Device {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Device::from_value(value).map_err(D::Error::custom)
    }
}

macro_rules! impl_from_device {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Device {
                fn from(dev: $ty) -> Self {
                    Device::$variant(dev)
                }
            }
        )*
    };
}

impl_from_device!(
    VirtioNet(VirtioNet),
    VirtioVsock(VirtioVsock),
    VirtioBlk(VirtioBlk),
    VirtioFs(VirtioFs),
    VirtioRng(VirtioRng),
    VirtioSerial(VirtioSerial),
    VirtioGpu(VirtioGpu),
    VirtioInput(VirtioInput),
    UsbMassStorage(UsbMassStorage),
    Nvme(NvmExpressController),
    Rosetta(RosettaShare),
);
