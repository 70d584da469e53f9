//! In-memory backend recording what the compiler hands over.
#![allow(dead_code)]

use std::cell::RefCell;
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use vfpilot::backend::*;
use vfpilot_models::models::{Bootloader, EfiBootloader, LinuxBootloader, VirtualMachine};

pub const TEST_MEMORY_BYTES: u64 = 268435456;
pub const TEST_KERNEL_PATH: &str = "/vms/test/vmlinuz";
pub const TEST_FIXTURES_DIR_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn efi_vm() -> VirtualMachine {
    VirtualMachine::new(
        1,
        TEST_MEMORY_BYTES,
        Bootloader::from(EfiBootloader::new("/vms/test/efi-vars".into(), true)),
    )
}

pub fn linux_vm() -> VirtualMachine {
    VirtualMachine::new(
        2,
        TEST_MEMORY_BYTES,
        Bootloader::from(LinuxBootloader::new(
            TEST_KERNEL_PATH.into(),
            "console=hvc0".to_string(),
        )),
    )
}

/// Builder and virtual machine handle at once: every list the compiler set
#[derive(Debug)]
pub struct RecordedVm {
    pub boot: BootSource,
    pub vcpus: u32,
    pub memory_bytes: u64,
    pub storage: Vec<StorageDevice>,
    pub directory_shares: Vec<DirectoryShare>,
    pub pointing_devices: Vec<PointingDevice>,
    pub keyboards: Vec<Keyboard>,
    pub graphics: Vec<GraphicsDevice>,
    pub network: Vec<NetworkDevice>,
    pub entropy: Vec<EntropyDevice>,
    pub serial_ports: Vec<SerialPort>,
    pub sockets: Vec<SocketDevice>,
}

impl RecordedVm {
    pub fn has_no_devices(&self) -> bool {
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
}

impl VmBuilder for RecordedVm {
    fn set_storage_devices(&mut self, devices: Vec<StorageDevice>) {
        self.storage = devices;
    }
    fn set_directory_sharing_devices(&mut self, devices: Vec<DirectoryShare>) {
        self.directory_shares = devices;
    }
    fn set_pointing_devices(&mut self, devices: Vec<PointingDevice>) {
        self.pointing_devices = devices;
    }
    fn set_keyboards(&mut self, devices: Vec<Keyboard>) {
        self.keyboards = devices;
    }
    fn set_graphics_devices(&mut self, devices: Vec<GraphicsDevice>) {
        self.graphics = devices;
    }
    fn set_network_devices(&mut self, devices: Vec<NetworkDevice>) {
        self.network = devices;
    }
    fn set_entropy_devices(&mut self, devices: Vec<EntropyDevice>) {
        self.entropy = devices;
    }
    fn set_serial_ports(&mut self, ports: Vec<SerialPort>) {
        self.serial_ports = ports;
    }
    fn set_socket_devices(&mut self, devices: Vec<SocketDevice>) {
        self.sockets = devices;
    }
}

/// Guest agent that acknowledges every `guest-set-time` request
#[derive(Clone, Debug, Default)]
pub struct FakeAgent {
    pub connects: Arc<AtomicUsize>,
    pub syncs: Arc<AtomicUsize>,
}

impl VsockConnect for FakeAgent {
    type Stream = DuplexStream;

    fn connect(&self, _port: u32) -> impl Future<Output = io::Result<DuplexStream>> + Send {
        let agent = self.clone();
        async move {
            agent.connects.fetch_add(1, Ordering::SeqCst);
            let (host, guest) = duplex(4096);
            tokio::spawn(async move {
                let mut guest = BufReader::new(guest);
                let mut line = String::new();
                while guest.read_line(&mut line).await.unwrap_or(0) > 0 {
                    if line.contains("guest-set-time") {
                        agent.syncs.fetch_add(1, Ordering::SeqCst);
                    }
                    line.clear();
                    if guest.get_mut().write_all(b"{\"return\": {}}\n").await.is_err() {
                        break;
                    }
                }
            });
            Ok(host)
        }
    }
}

/// Power state of the recorded guest, shared with every monitor
#[derive(Clone, Debug)]
pub struct PowerMonitor(Arc<Mutex<VmState>>);

impl PowerMonitor {
    pub fn set(&self, state: VmState) {
        *self.0.lock().unwrap() = state;
    }
}

impl StateMonitor for PowerMonitor {
    fn state(&self) -> VmState {
        *self.0.lock().unwrap()
    }
}

#[derive(Debug)]
pub struct RecordingBackend {
    /// Answer of [`Backend::validate`]
    pub valid: bool,
    pub fail_start: bool,
    pub agent: FakeAgent,
    /// Guest power state, can be changed behind the machine's back
    pub power: PowerMonitor,
    /// Backend calls in order
    pub calls: RefCell<Vec<&'static str>>,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        RecordingBackend {
            valid: true,
            fail_start: false,
            agent: FakeAgent::default(),
            power: PowerMonitor(Arc::new(Mutex::new(VmState::Stopped))),
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl RecordingBackend {
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.borrow_mut().push(call);
    }
}

impl Backend for RecordingBackend {
    type Bootloader = BootSource;
    type Builder = RecordedVm;
    type Vm = RecordedVm;
    type Connector = FakeAgent;
    type Monitor = PowerMonitor;

    fn new_bootloader(&self, boot: &BootSource) -> Result<BootSource, BackendError> {
        self.record("new_bootloader");
        Ok(boot.clone())
    }

    fn new_vm(
        &self,
        bootloader: BootSource,
        vcpus: u32,
        memory_bytes: u64,
    ) -> Result<RecordedVm, BackendError> {
        self.record("new_vm");
        Ok(RecordedVm {
            boot: bootloader,
            vcpus,
            memory_bytes,
            storage: Vec::new(),
            directory_shares: Vec::new(),
            pointing_devices: Vec::new(),
            keyboards: Vec::new(),
            graphics: Vec::new(),
            network: Vec::new(),
            entropy: Vec::new(),
            serial_ports: Vec::new(),
            sockets: Vec::new(),
        })
    }

    fn validate(&self, _builder: &RecordedVm) -> Result<bool, BackendError> {
        self.record("validate");
        Ok(self.valid)
    }

    fn build(&self, builder: RecordedVm) -> Result<RecordedVm, BackendError> {
        self.record("build");
        Ok(builder)
    }

    fn start(&self, _vm: &mut RecordedVm) -> Result<(), BackendError> {
        self.record("start");
        if self.fail_start {
            return Err(BackendError::Lifecycle {
                action: "start",
                reason: "no more memory".to_string(),
            });
        }
        self.power.set(VmState::Running);
        Ok(())
    }

    fn request_stop(&self, _vm: &mut RecordedVm) -> Result<(), BackendError> {
        self.record("request_stop");
        self.power.set(VmState::Stopped);
        Ok(())
    }

    fn state(&self, _vm: &RecordedVm) -> VmState {
        self.power.state()
    }

    fn state_monitor(&self, _vm: &RecordedVm) -> PowerMonitor {
        self.power.clone()
    }

    fn vsock_connector(&self, vm: &RecordedVm) -> Option<FakeAgent> {
        if vm.sockets.is_empty() {
            None
        } else {
            Some(self.agent.clone())
        }
    }
}
