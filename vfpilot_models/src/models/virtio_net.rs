use std::path::PathBuf;

use super::MacAddress;
use crate::DecodeError;

/// Paravirtualized network device.
///
/// The attachment is one of NAT, a host bridge interface or a unix datagram
/// socket. Which one is legal is checked when the device is translated, not
/// when it is decoded.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct VirtioNet {
    pub nat: bool,
    pub mac_address: Option<MacAddress>,
    pub unix_socket_path: Option<PathBuf>,
    pub bridge_interface: Option<String>,
}

impl VirtioNet {
    pub fn new_nat(mac_address: Option<MacAddress>) -> VirtioNet {
        VirtioNet {
            nat: true,
            mac_address,
            ..VirtioNet::default()
        }
    }
}

/// Document form of [`VirtioNet`]: the hardware address travels as text, so
/// it gets its own encode/decode path instead of deriving one.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct VirtioNetDocument {
    #[serde(rename = "nat", default)]
    nat: bool,
    #[serde(rename = "macAddress", default, skip_serializing_if = "String::is_empty")]
    mac_address: String,
    #[serde(
        rename = "unixSocketPath",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    unix_socket_path: Option<PathBuf>,
    #[serde(
        rename = "bridgeInterface",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    bridge_interface: Option<String>,
}

impl From<&VirtioNet> for VirtioNetDocument {
    fn from(dev: &VirtioNet) -> Self {
        VirtioNetDocument {
            nat: dev.nat,
            mac_address: dev.mac_address.map(|mac| mac.to_string()).unwrap_or_default(),
            unix_socket_path: dev.unix_socket_path.clone(),
            bridge_interface: dev.bridge_interface.clone(),
        }
    }
}

impl TryFrom<VirtioNetDocument> for VirtioNet {
    type Error = DecodeError;

    fn try_from(doc: VirtioNetDocument) -> Result<Self, Self::Error> {
        let mac_address = match doc.mac_address.as_str() {
            "" => None,
            text => Some(text.parse()?),
        };
        Ok(VirtioNet {
            nat: doc.nat,
            mac_address,
            unix_socket_path: doc.unix_socket_path,
            bridge_interface: doc.bridge_interface,
        })
    }
}
