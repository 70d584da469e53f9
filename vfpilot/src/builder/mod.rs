//! # Backend configuration builders
//!
//! Each backend-native configuration has a builder. All fields are optional
//! on the builder and validated once you run [`Builder::try_build`]; a
//! successful build can be handed to a backend as is.
//!
//! [`Configuration`] accumulates the built objects per category while a
//! virtual machine document is being compiled, then applies every list to a
//! [`VmBuilder`] in one go.
//!
//! ## Example
//!
//! ```rust
//! use vfpilot::backend::HostArch;
//! use vfpilot::builder::{Builder, Configuration};
//! use vfpilot::builder::storage::StorageDeviceBuilder;
//!
//! let disk = StorageDeviceBuilder::virtio_block()
//!     .with_image_path("/var/lib/vms/root.img".into())
//!     .as_read_only()
//!     .try_build()
//!     .unwrap();
//!
//! let mut config = Configuration::new(HostArch::current());
//! config.storage.push(disk);
//! assert_eq!(config.storage.len(), 1);
//! ```
use std::os::fd::OwnedFd;
use std::path::PathBuf;
use std::sync::Arc;

use crate::backend::{
    DirectoryShare, EntropyDevice, GraphicsDevice, HostArch, Keyboard, NetworkDevice,
    PointingDevice, SerialPort, SocketDevice, StorageDevice, VmBuilder,
};

pub mod bootloader;
pub mod graphics;
pub mod network;
pub mod serial;
pub mod share;
pub mod storage;
pub mod vsock;

fn assert_not_none<T>(key: &str, value: &Option<T>) -> Result<(), BuilderError> {
    match value {
        Some(_) => Ok(()),
        None => Err(BuilderError::MissingRequiredField(key.to_string())),
    }
}

/// Paths coming from a document default to empty, which counts as missing.
fn assert_path_set(key: &str, value: &Option<PathBuf>) -> Result<(), BuilderError> {
    match value {
        Some(path) if !path.as_os_str().is_empty() => Ok(()),
        _ => Err(BuilderError::MissingRequiredField(key.to_string())),
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum BuilderError {
    /// The field is required but was not provided in the builder object
    #[error("missing mandatory '{0}' option")]
    MissingRequiredField(String),
    /// The field was provided but its value cannot be used
    #[error("invalid '{0}' option: {1}")]
    InvalidField(String, String),
    /// Mutually exclusive options were combined, or none of them was picked
    #[error("exactly one of {0} must be set")]
    ExclusiveFields(String),
}

/// Generic trait which all builder components must implement in order to be
/// part of [Configuration]
pub trait Builder<T> {
    /// Validate all the fields from the builder object and apply it to the
    /// final object
    ///
    /// ## Example
    ///
    /// ```rust
    /// use vfpilot::builder::Builder;
    /// use vfpilot::builder::vsock::SocketDeviceBuilder;
    ///
    /// SocketDeviceBuilder::new()
    ///     .with_port(1024)
    ///     .try_build()
    ///     .unwrap();
    /// ```
    fn try_build(self) -> Result<T, BuilderError>;
}

/// Per-category accumulator filled by device translators.
///
/// Within a category, order follows declaration order.
#[derive(Debug)]
pub struct Configuration {
    pub host_arch: HostArch,
    pub storage: Vec<StorageDevice>,
    pub directory_shares: Vec<DirectoryShare>,
    pub pointing_devices: Vec<PointingDevice>,
    pub keyboards: Vec<Keyboard>,
    pub graphics: Vec<GraphicsDevice>,
    pub network: Vec<NetworkDevice>,
    pub entropy: Vec<EntropyDevice>,
    pub serial_ports: Vec<SerialPort>,
    pub sockets: Vec<SocketDevice>,
    /// Pseudo-terminal masters that must stay open as long as the machine
    pub pty_handles: Vec<Arc<OwnedFd>>,
}

impl Configuration {
    pub fn new(host_arch: HostArch) -> Configuration {
        Configuration {
            host_arch,
            storage: Vec::new(),
            directory_shares: Vec::new(),
            pointing_devices: Vec::new(),
            keyboards: Vec::new(),
            graphics: Vec::new(),
            network: Vec::new(),
            entropy: Vec::new(),
            serial_ports: Vec::new(),
            sockets: Vec::new(),
            pty_handles: Vec::new(),
        }
    }

    /// Adds the socket device unless one is already present. Returns whether
    /// the device was added.
    pub fn add_socket(&mut self, socket: SocketDevice) -> bool {
        if !self.sockets.is_empty() {
            return false;
        }
        self.sockets.push(socket);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
            && self.directory_shares.is_empty()
            && self.pointing_devices.is_empty()
            && self.keyboards.is_empty()
            && self.graphics.is_empty()
            && self.network.is_empty()
            && self.entropy.is_empty()
            && self.serial_ports.is_empty()
            && self.sockets.is_empty()
    }

    /// Hands every category list to the builder and returns the handles the
    /// caller has to keep alive.
    pub fn apply_to<B: VmBuilder>(self, builder: &mut B) -> Vec<Arc<OwnedFd>> {
        builder.set_storage_devices(self.storage);
        builder.set_directory_sharing_devices(self.directory_shares);
        builder.set_pointing_devices(self.pointing_devices);
        builder.set_keyboards(self.keyboards);
        builder.set_graphics_devices(self.graphics);
        builder.set_network_devices(self.network);
        builder.set_entropy_devices(self.entropy);
        builder.set_serial_ports(self.serial_ports);
        builder.set_socket_devices(self.sockets);
        self.pty_handles
    }
}
