use std::path::PathBuf;

use vfpilot_models::models::MacAddress;

use crate::backend::{NetworkAttachment, NetworkDevice};
use crate::builder::{Builder, BuilderError};

#[derive(Debug, Default)]
pub struct NetworkDeviceBuilder {
    mac_address: Option<MacAddress>,
    nat: bool,
    unix_socket_path: Option<PathBuf>,
    bridge_interface: Option<String>,
}

impl NetworkDeviceBuilder {
    pub fn new() -> NetworkDeviceBuilder {
        NetworkDeviceBuilder::default()
    }

    pub fn with_mac_address(mut self, mac_address: MacAddress) -> NetworkDeviceBuilder {
        self.mac_address = Some(mac_address);
        self
    }

    pub fn with_nat(mut self) -> NetworkDeviceBuilder {
        self.nat = true;
        self
    }

    pub fn with_unix_socket_path(mut self, path: PathBuf) -> NetworkDeviceBuilder {
        self.unix_socket_path = Some(path);
        self
    }

    pub fn with_bridge_interface(mut self, interface: String) -> NetworkDeviceBuilder {
        self.bridge_interface = Some(interface);
        self
    }
}

impl Builder<NetworkDevice> for NetworkDeviceBuilder {
    fn try_build(self) -> Result<NetworkDevice, BuilderError> {
        let socket = self
            .unix_socket_path
            .filter(|path| !path.as_os_str().is_empty());
        let bridge = self.bridge_interface.filter(|name| !name.is_empty());

        let attachment = match (self.nat, socket, bridge) {
            (true, None, None) => NetworkAttachment::Nat,
            (false, Some(path), None) => NetworkAttachment::UnixSocket(path),
            (false, None, Some(name)) => NetworkAttachment::Bridge(name),
            _ => {
                return Err(BuilderError::ExclusiveFields(
                    "'nat', 'unixSocketPath', 'bridgeInterface'".to_string(),
                ))
            }
        };
        Ok(NetworkDevice {
            mac_address: self.mac_address,
            attachment,
        })
    }
}
