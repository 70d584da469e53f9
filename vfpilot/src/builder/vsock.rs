use url::Url;

use crate::backend::SocketDevice;
use crate::builder::{assert_not_none, Builder, BuilderError};

#[derive(Debug, Default)]
pub struct SocketDeviceBuilder {
    pub port: Option<u32>,
    pub listen: bool,
    pub socket_url: Option<Url>,
}

impl SocketDeviceBuilder {
    pub fn new() -> SocketDeviceBuilder {
        SocketDeviceBuilder::default()
    }

    pub fn with_port(mut self, port: u32) -> SocketDeviceBuilder {
        self.port = Some(port);
        self
    }

    pub fn with_listen(mut self, listen: bool) -> SocketDeviceBuilder {
        self.listen = listen;
        self
    }

    pub fn with_socket_url(mut self, socket_url: Url) -> SocketDeviceBuilder {
        self.socket_url = Some(socket_url);
        self
    }
}

impl Builder<SocketDevice> for SocketDeviceBuilder {
    fn try_build(self) -> Result<SocketDevice, BuilderError> {
        assert_not_none("port", &self.port)?;
        let port = self.port.unwrap_or_default();
        if port == 0 {
            return Err(BuilderError::InvalidField(
                "port".to_string(),
                "vsock port must be nonzero".to_string(),
            ));
        }
        if let Some(url) = &self.socket_url {
            if url.scheme() != "unix" {
                return Err(BuilderError::InvalidField(
                    "socketURL".to_string(),
                    format!("unsupported scheme '{}', expected 'unix'", url.scheme()),
                ));
            }
        }
        Ok(SocketDevice {
            port,
            listen: self.listen,
            socket_url: self.socket_url,
        })
    }
}
