//! # Device registry
//!
//! Every device kind decoded by `vfpilot_models` has exactly one translator
//! here. The [`Translate`] impl of [`Device`] dispatches with an exhaustive
//! `match`, so a kind added to the model without a translator does not
//! compile.
//!
//! A translator validates the kind-specific fields, derives defaults, builds
//! the backend-native configuration and appends it to the right category
//! of the [`Configuration`]. It returns the runtime form of the device,
//! which differs from its input only for pseudo-terminal consoles.
use tracing::{debug, info};
use vfpilot_models::models::{
    Bootloader, Device, InputType, Kind, NvmExpressController, RosettaShare, UsbMassStorage,
    VirtioBlk, VirtioFs, VirtioGpu, VirtioInput, VirtioNet, VirtioRng, VirtioSerial,
    VirtioVsock,
};

use crate::backend::{
    BootSource, EntropyDevice, HostArch, Keyboard, PointingDevice, SerialAttachment, SerialPort,
};
use crate::builder::bootloader::{EfiBuilder, KernelBuilder, MacOsBuilder};
use crate::builder::graphics::GraphicsDeviceBuilder;
use crate::builder::network::NetworkDeviceBuilder;
use crate::builder::serial::{SerialMode, SerialModeBuilder};
use crate::builder::share::{DirectoryShareBuilder, RosettaShareBuilder};
use crate::builder::storage::StorageDeviceBuilder;
use crate::builder::vsock::SocketDeviceBuilder;
use crate::builder::{Builder, BuilderError, Configuration};
use crate::terminal;

#[derive(thiserror::Error, Debug)]
pub enum TranslateError {
    #[error(transparent)]
    Builder(#[from] BuilderError),
    #[error("'ptyName' is assigned at runtime and must be empty (current value: {0})")]
    PtyNameSet(String),
    #[error("terminal setup failed: {0}")]
    Terminal(#[from] nix::Error),
    #[error("{kind} boot is not supported on {arch} hosts")]
    UnsupportedBootloader { kind: Kind, arch: HostArch },
}

/// Applies one declared device to a [`Configuration`].
pub trait Translate: Sized {
    /// Returns the runtime form of the device
    fn translate(&self, config: &mut Configuration) -> Result<Self, TranslateError>;
}

impl Translate for Device {
    fn translate(&self, config: &mut Configuration) -> Result<Device, TranslateError> {
        Ok(match self {
            Device::VirtioNet(dev) => Device::VirtioNet(dev.translate(config)?),
            Device::VirtioVsock(dev) => Device::VirtioVsock(dev.translate(config)?),
            Device::VirtioBlk(dev) => Device::VirtioBlk(dev.translate(config)?),
            Device::VirtioFs(dev) => Device::VirtioFs(dev.translate(config)?),
            Device::VirtioRng(dev) => Device::VirtioRng(dev.translate(config)?),
            Device::VirtioSerial(dev) => Device::VirtioSerial(dev.translate(config)?),
            Device::VirtioGpu(dev) => Device::VirtioGpu(dev.translate(config)?),
            Device::VirtioInput(dev) => Device::VirtioInput(dev.translate(config)?),
            Device::UsbMassStorage(dev) => Device::UsbMassStorage(dev.translate(config)?),
            Device::Nvme(dev) => Device::Nvme(dev.translate(config)?),
            Device::Rosetta(dev) => Device::Rosetta(dev.translate(config)?),
        })
    }
}

impl Translate for VirtioNet {
    fn translate(&self, config: &mut Configuration) -> Result<Self, TranslateError> {
        let mut builder = NetworkDeviceBuilder::new();
        if self.nat {
            builder = builder.with_nat();
        }
        if let Some(mac) = self.mac_address {
            builder = builder.with_mac_address(mac);
        }
        if let Some(path) = &self.unix_socket_path {
            builder = builder.with_unix_socket_path(path.clone());
        }
        if let Some(interface) = &self.bridge_interface {
            builder = builder.with_bridge_interface(interface.clone());
        }
        let device = builder.try_build()?;
        info!("Adding virtio-net device ({:?})", device.attachment);
        config.network.push(device);
        Ok(self.clone())
    }
}

impl Translate for VirtioVsock {
    fn translate(&self, config: &mut Configuration) -> Result<Self, TranslateError> {
        let mut builder = SocketDeviceBuilder::new()
            .with_port(self.port)
            .with_listen(self.listen);
        if let Some(url) = &self.socket_url {
            builder = builder.with_socket_url(url.clone());
        }
        let socket = builder.try_build()?;
        if config.add_socket(socket) {
            info!("Adding virtio-vsock device (port: {})", self.port);
        } else {
            debug!("virtio-vsock device already present, not adding a second one");
        }
        Ok(self.clone())
    }
}

impl Translate for VirtioBlk {
    fn translate(&self, config: &mut Configuration) -> Result<Self, TranslateError> {
        let mut builder = StorageDeviceBuilder::virtio_block()
            .with_image_path(self.image_path.clone())
            .with_read_only(self.read_only);
        if let Some(identifier) = &self.device_identifier {
            builder = builder.with_identifier(identifier.clone());
        }
        let disk = builder.try_build()?;
        info!(
            "Adding virtio-blk device (imagePath: {})",
            self.image_path.display()
        );
        config.storage.push(disk);
        Ok(self.clone())
    }
}

impl Translate for NvmExpressController {
    fn translate(&self, config: &mut Configuration) -> Result<Self, TranslateError> {
        let disk = StorageDeviceBuilder::nvme()
            .with_image_path(self.image_path.clone())
            .with_read_only(self.read_only)
            .try_build()?;
        info!(
            "Adding nvme device (imagePath: {})",
            self.image_path.display()
        );
        config.storage.push(disk);
        Ok(self.clone())
    }
}

impl Translate for UsbMassStorage {
    fn translate(&self, config: &mut Configuration) -> Result<Self, TranslateError> {
        let disk = StorageDeviceBuilder::usb_mass_storage()
            .with_image_path(self.image_path.clone())
            .with_read_only(self.read_only)
            .try_build()?;
        info!(
            "Adding USB mass storage device (imagePath: {})",
            self.image_path.display()
        );
        config.storage.push(disk);
        Ok(self.clone())
    }
}

impl Translate for VirtioFs {
    fn translate(&self, config: &mut Configuration) -> Result<Self, TranslateError> {
        let mut builder = DirectoryShareBuilder::new().with_shared_dir(self.shared_dir.clone());
        if let Some(tag) = &self.mount_tag {
            builder = builder.with_mount_tag(tag.clone());
        }
        let share = builder.try_build()?;
        info!("Adding virtio-fs device (tag: {})", share.tag);
        config.directory_shares.push(share);
        Ok(self.clone())
    }
}

impl Translate for RosettaShare {
    fn translate(&self, config: &mut Configuration) -> Result<Self, TranslateError> {
        let share = RosettaShareBuilder::new(config.host_arch)
            .with_mount_tag(self.mount_tag.clone())
            .with_install(self.install_rosetta)
            .try_build()?;
        info!("Adding rosetta share (tag: {})", share.tag);
        config.directory_shares.push(share);
        Ok(self.clone())
    }
}

impl Translate for VirtioRng {
    fn translate(&self, config: &mut Configuration) -> Result<Self, TranslateError> {
        info!("Adding virtio-rng device");
        config.entropy.push(EntropyDevice);
        Ok(self.clone())
    }
}

impl Translate for VirtioInput {
    fn translate(&self, config: &mut Configuration) -> Result<Self, TranslateError> {
        match self.input_type {
            InputType::Pointing => {
                info!("Adding virtio-input pointing device");
                config.pointing_devices.push(PointingDevice);
            }
            InputType::Keyboard => {
                info!("Adding virtio-input keyboard device");
                config.keyboards.push(Keyboard);
            }
        }
        Ok(self.clone())
    }
}

impl Translate for VirtioGpu {
    fn translate(&self, config: &mut Configuration) -> Result<Self, TranslateError> {
        let gpu = GraphicsDeviceBuilder::new(self.width, self.height)
            .with_gui(self.uses_gui)
            .try_build()?;
        info!("Adding virtio-gpu device ({}x{})", gpu.width, gpu.height);
        config.graphics.push(gpu);
        Ok(self.clone())
    }
}

impl Translate for VirtioSerial {
    fn translate(&self, config: &mut Configuration) -> Result<Self, TranslateError> {
        if let Some(name) = self.pty_name.as_ref().filter(|n| !n.as_os_str().is_empty()) {
            return Err(TranslateError::PtyNameSet(name.display().to_string()));
        }
        let mut builder = SerialModeBuilder::new()
            .with_stdio(self.uses_stdio)
            .with_pty(self.uses_pty);
        if let Some(path) = &self.log_file {
            builder = builder.with_log_file(path.clone());
        }

        let mut runtime = self.clone();
        let attachment = match builder.try_build()? {
            SerialMode::Stdio => {
                info!("Adding stdio console");
                terminal::set_raw_mode(std::io::stdin())?;
                SerialAttachment::Stdio
            }
            SerialMode::Pty => {
                let pty = terminal::open_pty()?;
                info!("Using PTY (pty path: {})", pty.path.display());
                config.pty_handles.push(pty.master.clone());
                runtime.pty_name = Some(pty.path);
                SerialAttachment::FileHandle {
                    read: pty.master.clone(),
                    write: pty.master,
                }
            }
            SerialMode::LogFile(path) => {
                info!("Adding virtio-serial device (logFile: {})", path.display());
                SerialAttachment::LogFile(path)
            }
        };
        config.serial_ports.push(SerialPort { attachment });
        Ok(runtime)
    }
}

/// Turns the bootloader variant into a backend boot configuration.
///
/// macOS guests need Apple silicon; asking for one elsewhere fails before
/// any device is looked at.
pub fn boot_source(bootloader: &Bootloader, arch: HostArch) -> Result<BootSource, TranslateError> {
    let boot = match bootloader {
        Bootloader::Efi(efi) => EfiBuilder::new()
            .with_variable_store(efi.efi_variable_store_path.clone())
            .create_variable_store(efi.create_variable_store)
            .try_build()?,
        Bootloader::Linux(linux) => {
            let mut builder = KernelBuilder::new()
                .with_kernel_image_path(linux.vmlinuz_path.clone())
                .with_command_line(linux.kernel_cmd_line.clone());
            if let Some(initrd) = &linux.initrd_path {
                builder = builder.with_initrd_path(initrd.clone());
            }
            builder.try_build()?
        }
        Bootloader::MacOs(macos) => {
            if arch != HostArch::Aarch64 {
                return Err(TranslateError::UnsupportedBootloader {
                    kind: bootloader.kind(),
                    arch,
                });
            }
            MacOsBuilder::new()
                .with_machine_identifier_path(macos.machine_identifier_path.clone())
                .with_hardware_model_path(macos.hardware_model_path.clone())
                .with_aux_image_path(macos.aux_image_path.clone())
                .try_build()?
        }
    };
    Ok(boot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{NetworkAttachment, ShareSource, StorageBus};
    use vfpilot_models::models::{EfiBootloader, MacOsBootloader};

    fn config() -> Configuration {
        Configuration::new(HostArch::current())
    }

    #[test]
    fn storage_kinds_share_one_category() {
        let mut config = config();
        Device::from(VirtioBlk::new("/a.img".into()))
            .translate(&mut config)
            .unwrap();
        Device::from(NvmExpressController::new("/b.img".into()))
            .translate(&mut config)
            .unwrap();
        Device::from(UsbMassStorage::new("/c.iso".into(), true))
            .translate(&mut config)
            .unwrap();

        let buses: Vec<StorageBus> = config.storage.iter().map(|d| d.bus).collect();
        assert_eq!(
            buses,
            vec![
                StorageBus::VirtioBlock,
                StorageBus::Nvme,
                StorageBus::UsbMassStorage
            ]
        );
        assert!(config.storage[2].read_only);
    }

    #[test]
    fn block_device_without_image_path() {
        let mut config = config();
        let err = Device::from(VirtioBlk::default())
            .translate(&mut config)
            .unwrap_err();
        assert!(matches!(
            err,
            TranslateError::Builder(BuilderError::MissingRequiredField(ref f)) if f == "imagePath"
        ));
        assert!(config.is_empty());
    }

    #[test]
    fn filesystem_share_defaults_mount_tag() {
        let mut config = config();
        Device::from(VirtioFs::new("/srv/data".into(), None))
            .translate(&mut config)
            .unwrap();
        assert_eq!(config.directory_shares[0].tag, "data");
        assert_eq!(
            config.directory_shares[0].source,
            ShareSource::Directory {
                path: "/srv/data".into(),
                read_only: false
            }
        );
    }

    #[test]
    fn filesystem_share_without_directory() {
        let err = Device::from(VirtioFs::new("".into(), Some("tag".to_string())))
            .translate(&mut config())
            .unwrap_err();
        assert_eq!(err.to_string(), "missing mandatory 'sharedDir' option");
    }

    #[test]
    fn second_socket_is_a_no_op() {
        let mut config = config();
        Device::from(VirtioVsock::new(1024, true))
            .translate(&mut config)
            .unwrap();
        Device::from(VirtioVsock::new(2048, false))
            .translate(&mut config)
            .unwrap();
        assert_eq!(config.sockets.len(), 1);
        assert_eq!(config.sockets[0].port, 1024);
    }

    #[test]
    fn input_devices_split_by_type() {
        let mut config = config();
        for input_type in [InputType::Pointing, InputType::Keyboard, InputType::Keyboard] {
            Device::from(VirtioInput::new(input_type))
                .translate(&mut config)
                .unwrap();
        }
        assert_eq!(config.pointing_devices.len(), 1);
        assert_eq!(config.keyboards.len(), 2);
    }

    #[test]
    fn network_device_keeps_mac() {
        let mut config = config();
        let mac = "52:54:00:00:00:01".parse().unwrap();
        Device::from(VirtioNet::new_nat(Some(mac)))
            .translate(&mut config)
            .unwrap();
        assert_eq!(config.network[0].attachment, NetworkAttachment::Nat);
        assert_eq!(config.network[0].mac_address, Some(mac));
    }

    #[test]
    fn entropy_and_graphics() {
        let mut config = config();
        Device::from(VirtioRng::new()).translate(&mut config).unwrap();
        Device::from(VirtioGpu::new(1024, 768))
            .translate(&mut config)
            .unwrap();
        assert_eq!(config.entropy.len(), 1);
        assert_eq!(config.graphics[0].width, 1024);
    }

    #[test]
    fn log_file_serial() {
        let mut config = config();
        let runtime = Device::from(VirtioSerial::log_file("/tmp/console.log".into()))
            .translate(&mut config)
            .unwrap();
        assert!(matches!(
            config.serial_ports[0].attachment,
            SerialAttachment::LogFile(ref p) if p.as_os_str() == "/tmp/console.log"
        ));
        assert_eq!(
            runtime,
            Device::from(VirtioSerial::log_file("/tmp/console.log".into()))
        );
    }

    #[test]
    fn pty_serial_records_name_in_runtime_form() {
        let mut config = config();
        let runtime = VirtioSerial::pty().translate(&mut config).unwrap();
        let name = runtime.pty_name.expect("pty name recorded");
        assert!(!name.as_os_str().is_empty());
        assert_eq!(config.pty_handles.len(), 1);
        assert!(matches!(
            config.serial_ports[0].attachment,
            SerialAttachment::FileHandle { .. }
        ));
    }

    #[test]
    fn pty_name_on_input_is_rejected() {
        let mut serial = VirtioSerial::pty();
        serial.pty_name = Some("/dev/ttys004".into());
        let mut config = config();
        let err = serial.translate(&mut config).unwrap_err();
        assert!(matches!(err, TranslateError::PtyNameSet(_)));
        assert!(config.pty_handles.is_empty());
    }

    #[test]
    fn rosetta_on_intel() {
        let mut config = Configuration::new(HostArch::X86_64);
        let err = Device::from(RosettaShare::new("rosetta".to_string()))
            .translate(&mut config)
            .unwrap_err();
        assert!(err.to_string().contains("Rosetta"));
    }

    #[test]
    fn macos_boot_needs_apple_silicon() {
        let macos = Bootloader::from(MacOsBootloader::new(
            "/vm/id".into(),
            "/vm/model".into(),
            "/vm/aux".into(),
        ));
        let err = boot_source(&macos, HostArch::X86_64).unwrap_err();
        assert!(matches!(
            err,
            TranslateError::UnsupportedBootloader {
                kind: Kind::MacOsBootloader,
                arch: HostArch::X86_64
            }
        ));
        assert!(boot_source(&macos, HostArch::Aarch64).is_ok());
    }

    #[test]
    fn efi_boot_source() {
        let efi = Bootloader::from(EfiBootloader::new("/vm/vars".into(), true));
        assert_eq!(
            boot_source(&efi, HostArch::current()).unwrap(),
            BootSource::Efi {
                variable_store: "/vm/vars".into(),
                create_variable_store: true
            }
        );
    }
}
