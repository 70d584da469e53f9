//! # Virtual machine configuration compiler
//!
//! Turns a declarative [`VirtualMachine`] document into a backend virtual
//! machine handle:
//!
//! 1. check the machine-wide fields and refuse output-only fields
//! 2. translate the bootloader and ask the backend for a builder
//! 3. normalize the device list (implicit time-sync socket)
//! 4. translate every device into the per-category lists
//! 5. apply the lists to the builder, validate and build
//!
//! The input document is never modified. Values only known once the
//! devices exist, such as allocated pseudo-terminal paths, are written to
//! the runtime view returned in [`CompiledVm`].
//!
//! ## Example
//!
//! ```ignore
//! use vfpilot::compiler::Compiler;
//! use vfpilot_models::models::VirtualMachine;
//!
//! let spec = VirtualMachine::from_file("vm.json")?;
//! let compiled = Compiler::new(&backend).compile(&spec)?;
//! println!("{}", compiled.runtime.to_json()?);
//! ```
use std::os::fd::OwnedFd;
use std::sync::Arc;

use tracing::{debug, info, instrument};
use uuid::Uuid;
use vfpilot_models::models::{Device, Kind, VirtioVsock, VirtualMachine};

use crate::backend::{Backend, BackendError, HostArch};
use crate::builder::Configuration;
use crate::registry::{self, Translate, TranslateError};

#[derive(thiserror::Error, Debug)]
pub enum CompileError {
    #[error("invalid virtual machine: {0}")]
    Validation(String),
    #[error("{kind} is not supported on {arch} hosts")]
    UnsupportedBootloader { kind: Kind, arch: HostArch },
    #[error("Could not configure {kind} bootloader, reason: {source}")]
    Bootloader {
        kind: Kind,
        #[source]
        source: TranslateError,
    },
    #[error("Could not add device #{index} ({kind}), reason: {source}")]
    Device {
        index: usize,
        kind: Kind,
        #[source]
        source: TranslateError,
    },
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("virtual machine configuration is not valid")]
    Invalid,
}

/// Output of a successful compilation.
///
/// Owns the backend handle and every pseudo-terminal master allocated for
/// it; dropping the value closes them.
#[derive(Debug)]
pub struct CompiledVm<V> {
    pub id: Uuid,
    pub vm: V,
    /// The input document with runtime-only fields filled in
    pub runtime: VirtualMachine,
    pub pty_handles: Vec<Arc<OwnedFd>>,
}

/// Returns the devices to translate: the declared ones in order, followed by
/// the implicit socket the time-sync channel needs.
///
/// The implicit socket never replaces a declared one. When the document
/// already declares a socket, translating the extra entry is a no-op.
pub fn normalize_devices(spec: &VirtualMachine) -> Vec<Device> {
    let mut devices = spec.devices.clone();
    if let Some(timesync) = spec.timesync.as_ref().filter(|t| t.vsock_port != 0) {
        debug!(
            "Adding implicit virtio-vsock device for time sync (port: {})",
            timesync.vsock_port
        );
        devices.push(Device::VirtioVsock(VirtioVsock::new(
            timesync.vsock_port,
            false,
        )));
    }
    devices
}

fn check_spec(spec: &VirtualMachine) -> Result<(), CompileError> {
    if spec.vcpus == 0 {
        return Err(CompileError::Validation(
            "'vcpus' must be at least 1".to_string(),
        ));
    }
    if spec.memory_bytes == 0 {
        return Err(CompileError::Validation(
            "'memoryBytes' must be at least 1".to_string(),
        ));
    }
    for (index, device) in spec.devices.iter().enumerate() {
        if let Device::VirtioSerial(serial) = device {
            if let Some(name) = serial.pty_name.as_ref().filter(|n| !n.as_os_str().is_empty()) {
                return Err(CompileError::Device {
                    index,
                    kind: device.kind(),
                    source: TranslateError::PtyNameSet(name.display().to_string()),
                });
            }
        }
    }
    Ok(())
}

#[derive(Debug)]
pub struct Compiler<'a, B: Backend> {
    backend: &'a B,
    host_arch: HostArch,
}

impl<'a, B: Backend> Compiler<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Compiler {
            backend,
            host_arch: HostArch::current(),
        }
    }

    /// Compile as if running on another host architecture
    pub fn with_host_arch(mut self, host_arch: HostArch) -> Self {
        self.host_arch = host_arch;
        self
    }

    /// Compiles the document under a fresh machine identifier.
    pub fn compile(&self, spec: &VirtualMachine) -> Result<CompiledVm<B::Vm>, CompileError> {
        self.compile_as(Uuid::new_v4(), spec)
    }

    #[instrument(skip(self, spec), fields(id = %id))]
    pub fn compile_as(
        &self,
        id: Uuid,
        spec: &VirtualMachine,
    ) -> Result<CompiledVm<B::Vm>, CompileError> {
        check_spec(spec)?;

        let kind = spec.bootloader.kind();
        let boot = registry::boot_source(&spec.bootloader, self.host_arch).map_err(|e| match e {
            TranslateError::UnsupportedBootloader { kind, arch } => {
                CompileError::UnsupportedBootloader { kind, arch }
            }
            source => CompileError::Bootloader { kind, source },
        })?;
        let bootloader = self.backend.new_bootloader(&boot)?;
        let mut builder = self
            .backend
            .new_vm(bootloader, spec.vcpus, spec.memory_bytes)?;
        info!(
            "Configuring virtual machine ({} vCPUs, {} bytes, {})",
            spec.vcpus, spec.memory_bytes, kind
        );

        let mut config = Configuration::new(self.host_arch);
        let declared = spec.devices.len();
        let mut runtime_devices = Vec::with_capacity(declared);
        for (index, device) in normalize_devices(spec).iter().enumerate() {
            let runtime = device
                .translate(&mut config)
                .map_err(|source| CompileError::Device {
                    index,
                    kind: device.kind(),
                    source,
                })?;
            if index < declared {
                runtime_devices.push(runtime);
            }
        }

        let pty_handles = config.apply_to(&mut builder);
        if !self.backend.validate(&builder)? {
            return Err(CompileError::Invalid);
        }
        let vm = self.backend.build(builder)?;
        info!("Virtual machine configuration compiled");

        let mut runtime = spec.clone();
        runtime.devices = runtime_devices;
        Ok(CompiledVm {
            id,
            vm,
            runtime,
            pty_handles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfpilot_models::models::{
        Bootloader, EfiBootloader, TimeSync, VirtioRng, VirtioSerial,
    };

    fn spec() -> VirtualMachine {
        VirtualMachine::new(
            1,
            268435456,
            Bootloader::from(EfiBootloader::new("/vm/vars".into(), true)),
        )
    }

    #[test]
    fn normalize_without_timesync_keeps_devices() {
        let spec = spec().with_device(VirtioRng::new());
        assert_eq!(normalize_devices(&spec), spec.devices);
    }

    #[test]
    fn normalize_appends_implicit_socket() {
        let spec = spec()
            .with_device(VirtioRng::new())
            .with_timesync(TimeSync::new(1234));
        let devices = normalize_devices(&spec);
        assert_eq!(devices.len(), 2);
        assert_eq!(
            devices[1],
            Device::VirtioVsock(VirtioVsock::new(1234, false))
        );
    }

    #[test]
    fn normalize_ignores_port_zero() {
        let spec = spec().with_timesync(TimeSync::new(0));
        assert!(normalize_devices(&spec).is_empty());
    }

    #[test]
    fn zero_vcpus_is_rejected() {
        let mut spec = spec();
        spec.vcpus = 0;
        assert!(matches!(
            check_spec(&spec),
            Err(CompileError::Validation(ref msg)) if msg.contains("vcpus")
        ));
    }

    #[test]
    fn zero_memory_is_rejected() {
        let mut spec = spec();
        spec.memory_bytes = 0;
        assert!(matches!(
            check_spec(&spec),
            Err(CompileError::Validation(ref msg)) if msg.contains("memoryBytes")
        ));
    }

    #[test]
    fn pty_name_on_input_points_at_device() {
        let mut serial = VirtioSerial::pty();
        serial.pty_name = Some("/dev/ttys001".into());
        let spec = spec().with_device(VirtioRng::new()).with_device(serial);
        match check_spec(&spec) {
            Err(CompileError::Device { index, kind, source }) => {
                assert_eq!(index, 1);
                assert_eq!(kind, Kind::VirtioSerial);
                assert!(matches!(source, TranslateError::PtyNameSet(_)));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn empty_pty_name_is_accepted() {
        let mut serial = VirtioSerial::pty();
        serial.pty_name = Some("".into());
        assert!(check_spec(&spec().with_device(serial)).is_ok());
    }
}
