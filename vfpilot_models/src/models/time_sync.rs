/// Host to guest clock synchronization over vsock.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeSync {
    /// Guest port where qemu-guest-agent listens
    #[serde(rename = "vsockPort")]
    pub vsock_port: u32,
}

impl TimeSync {
    pub fn new(vsock_port: u32) -> TimeSync {
        TimeSync { vsock_port }
    }
}
