//! Backend-native device configurations.
//!
//! These are what translators hand to a [`VmBuilder`](super::VmBuilder):
//! fully validated, with every default already derived. A backend only has
//! to map them onto its own objects.
use std::os::fd::OwnedFd;
use std::path::PathBuf;
use std::sync::Arc;

use url::Url;
use vfpilot_models::models::MacAddress;

/// Boot configuration handed to [`Backend::new_bootloader`](super::Backend::new_bootloader)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BootSource {
    Efi {
        variable_store: PathBuf,
        create_variable_store: bool,
    },
    Linux {
        kernel_image_path: PathBuf,
        initrd_path: Option<PathBuf>,
        command_line: String,
    },
    MacOs {
        machine_identifier_path: PathBuf,
        hardware_model_path: PathBuf,
        aux_image_path: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBus {
    VirtioBlock,
    Nvme,
    UsbMassStorage,
}

/// Disk image attachment. Backends are expected to open images cached with
/// fsync synchronization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageDevice {
    pub bus: StorageBus,
    pub image_path: PathBuf,
    pub read_only: bool,
    pub identifier: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkAttachment {
    Nat,
    UnixSocket(PathBuf),
    Bridge(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkDevice {
    pub mac_address: Option<MacAddress>,
    pub attachment: NetworkAttachment,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShareSource {
    Directory { path: PathBuf, read_only: bool },
    Rosetta { install: bool },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryShare {
    pub tag: String,
    pub source: ShareSource,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PointingDevice;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Keyboard;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GraphicsDevice {
    pub width: u32,
    pub height: u32,
    pub uses_gui: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntropyDevice;

#[derive(Clone, Debug)]
pub enum SerialAttachment {
    /// Host standard input/output, stdin already in raw mode
    Stdio,
    /// Read and write ends of an already open file, e.g. a pseudo-terminal
    /// master
    FileHandle { read: Arc<OwnedFd>, write: Arc<OwnedFd> },
    /// Guest output appended to a plain file
    LogFile(PathBuf),
}

#[derive(Clone, Debug)]
pub struct SerialPort {
    pub attachment: SerialAttachment,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SocketDevice {
    pub port: u32,
    pub listen: bool,
    pub socket_url: Option<Url>,
}
