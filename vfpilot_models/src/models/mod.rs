mod bootloader;
pub use self::bootloader::{Bootloader, EfiBootloader, LinuxBootloader, MacOsBootloader};
mod device;
pub use self::device::Device;
mod kind;
pub use self::kind::{Kind, KIND_FIELD};
mod mac_address;
pub use self::mac_address::MacAddress;
mod share;
pub use self::share::{RosettaShare, VirtioFs};
mod storage;
pub use self::storage::{NvmExpressController, UsbMassStorage, VirtioBlk};
mod time_sync;
pub use self::time_sync::TimeSync;
mod virtio_gpu;
pub use self::virtio_gpu::VirtioGpu;
mod virtio_input;
pub use self::virtio_input::{InputType, VirtioInput};
mod virtio_net;
pub use self::virtio_net::VirtioNet;
mod virtio_rng;
pub use self::virtio_rng::VirtioRng;
mod virtio_serial;
pub use self::virtio_serial::VirtioSerial;
mod virtio_vsock;
pub use self::virtio_vsock::VirtioVsock;
mod virtual_machine;
pub use self::virtual_machine::VirtualMachine;
