use std::path::PathBuf;

/// virtio-serial console.
///
/// Exactly one attachment is picked: the host standard streams, a freshly
/// allocated pseudo-terminal or a log file. `ptyName` is never part of an
/// input document; it only shows up in the runtime view once a
/// pseudo-terminal has been allocated.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VirtioSerial {
    #[serde(rename = "logFile", default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    #[serde(rename = "usesStdio", default, skip_serializing_if = "std::ops::Not::not")]
    pub uses_stdio: bool,
    #[serde(rename = "usesPty", default, skip_serializing_if = "std::ops::Not::not")]
    pub uses_pty: bool,
    #[serde(rename = "ptyName", default, skip_serializing_if = "Option::is_none")]
    pub pty_name: Option<PathBuf>,
}

impl VirtioSerial {
    pub fn stdio() -> VirtioSerial {
        VirtioSerial {
            uses_stdio: true,
            ..VirtioSerial::default()
        }
    }

    pub fn pty() -> VirtioSerial {
        VirtioSerial {
            uses_pty: true,
            ..VirtioSerial::default()
        }
    }

    pub fn log_file(path: PathBuf) -> VirtioSerial {
        VirtioSerial {
            log_file: Some(path),
            ..VirtioSerial::default()
        }
    }
}
