//! # Hypervisor backend boundary
//!
//! The compiler never talks to a hypervisor directly. It goes through the
//! [`Backend`] trait, which creates a boot loader and a [`VmBuilder`], takes
//! the per-category device lists, validates the result and finally hands
//! back an opaque virtual machine handle.
//!
//! Implementations live outside of this crate because they are bound to a
//! host framework (Virtualization.framework, KVM, ...). Tests use an
//! in-memory recording backend.
use std::fmt;
use std::future::Future;
use std::io;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;

pub mod config;

pub use self::config::*;

#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    #[error("Could not create boot loader, reason: {0}")]
    Bootloader(String),
    #[error("Could not create virtual machine configuration, reason: {0}")]
    Configuration(String),
    #[error("Virtual machine configuration was rejected, reason: {0}")]
    Validation(String),
    #[error("Could not {action} the virtual machine, reason: {reason}")]
    Lifecycle { action: &'static str, reason: String },
}

/// CPU architecture of the host running the backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostArch {
    Aarch64,
    X86_64,
    Other,
}

impl HostArch {
    pub fn current() -> HostArch {
        match std::env::consts::ARCH {
            "aarch64" => HostArch::Aarch64,
            "x86_64" => HostArch::X86_64,
            _ => HostArch::Other,
        }
    }
}

impl fmt::Display for HostArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostArch::Aarch64 => f.write_str("aarch64"),
            HostArch::X86_64 => f.write_str("x86_64"),
            HostArch::Other => f.write_str(std::env::consts::ARCH),
        }
    }
}

/// Lifecycle state reported by a backend for a running handle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum VmState {
    Stopped,
    Starting,
    Running,
    Paused,
    Stopping,
    Error,
}

/// Receives the per-category device lists. Setting an empty list is legal.
pub trait VmBuilder {
    fn set_storage_devices(&mut self, devices: Vec<StorageDevice>);
    fn set_directory_sharing_devices(&mut self, devices: Vec<DirectoryShare>);
    fn set_pointing_devices(&mut self, devices: Vec<PointingDevice>);
    fn set_keyboards(&mut self, devices: Vec<Keyboard>);
    fn set_graphics_devices(&mut self, devices: Vec<GraphicsDevice>);
    fn set_network_devices(&mut self, devices: Vec<NetworkDevice>);
    fn set_entropy_devices(&mut self, devices: Vec<EntropyDevice>);
    fn set_serial_ports(&mut self, ports: Vec<SerialPort>);
    /// The list holds at most one device
    fn set_socket_devices(&mut self, devices: Vec<SocketDevice>);
}

/// Host hypervisor able to turn a populated [`VmBuilder`] into a virtual
/// machine and drive its lifecycle.
pub trait Backend {
    type Bootloader;
    type Builder: VmBuilder;
    type Vm;
    type Connector: VsockConnect;
    type Monitor: StateMonitor;

    fn new_bootloader(&self, boot: &BootSource) -> Result<Self::Bootloader, BackendError>;

    fn new_vm(
        &self,
        bootloader: Self::Bootloader,
        vcpus: u32,
        memory_bytes: u64,
    ) -> Result<Self::Builder, BackendError>;

    /// Whole-configuration check, `Ok(false)` means the configuration is
    /// invalid without more detail.
    fn validate(&self, builder: &Self::Builder) -> Result<bool, BackendError>;

    fn build(&self, builder: Self::Builder) -> Result<Self::Vm, BackendError>;

    fn start(&self, vm: &mut Self::Vm) -> Result<(), BackendError>;

    fn request_stop(&self, vm: &mut Self::Vm) -> Result<(), BackendError>;

    fn state(&self, vm: &Self::Vm) -> VmState;

    /// Handle answering [`Backend::state`] for `vm` from any task, including
    /// changes the guest makes on its own such as powering off.
    fn state_monitor(&self, vm: &Self::Vm) -> Self::Monitor;

    /// Opens byte streams to the guest over vsock, `None` when the virtual
    /// machine has no socket device.
    fn vsock_connector(&self, vm: &Self::Vm) -> Option<Self::Connector>;
}

/// Connects to a guest vsock port.
pub trait VsockConnect: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn connect(&self, port: u32) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Reads the current state of a virtual machine.
pub trait StateMonitor: Send + Sync + 'static {
    fn state(&self) -> VmState;
}

impl StateMonitor for watch::Receiver<VmState> {
    fn state(&self) -> VmState {
        *self.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_arch_matches_target() {
        let arch = HostArch::current();
        if cfg!(target_arch = "aarch64") {
            assert_eq!(arch, HostArch::Aarch64);
        } else if cfg!(target_arch = "x86_64") {
            assert_eq!(arch, HostArch::X86_64);
        } else {
            assert_eq!(arch, HostArch::Other);
        }
        assert_eq!(arch.to_string(), std::env::consts::ARCH);
    }

    #[test]
    fn vm_state_serializes_as_name() {
        assert_eq!(
            serde_json::to_string(&VmState::Running).unwrap(),
            "\"Running\""
        );
    }

    #[test]
    fn watch_receiver_reports_last_state() {
        let (tx, rx) = watch::channel(VmState::Starting);
        assert_eq!(StateMonitor::state(&rx), VmState::Starting);
        tx.send_replace(VmState::Paused);
        assert_eq!(StateMonitor::state(&rx), VmState::Paused);
    }
}
