use url::Url;

/// virtio-vsock device. A virtual machine carries at most one of them; the
/// port is the guest port the host connects to (or listens for when
/// `listen` is set).
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VirtioVsock {
    /// Guest vsock port
    #[serde(rename = "port", default)]
    pub port: u32,
    /// Host endpoint (usually `unix:///path/to.sock`) bridged to the port
    #[serde(rename = "socketURL", default, skip_serializing_if = "Option::is_none")]
    pub socket_url: Option<Url>,
    /// The guest connects to the host instead of the other way around
    #[serde(rename = "listen", default, skip_serializing_if = "std::ops::Not::not")]
    pub listen: bool,
}

impl VirtioVsock {
    pub fn new(port: u32, listen: bool) -> VirtioVsock {
        VirtioVsock {
            port,
            socket_url: None,
            listen,
        }
    }
}
