/// virtio-gpu device with a single scanout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtioGpu {
    /// Open a window on the host showing the scanout
    #[serde(rename = "usesGUI", default)]
    pub uses_gui: bool,
    #[serde(rename = "width", default = "default_width")]
    pub width: u32,
    #[serde(rename = "height", default = "default_height")]
    pub height: u32,
}

fn default_width() -> u32 {
    800
}

fn default_height() -> u32 {
    600
}

impl Default for VirtioGpu {
    fn default() -> Self {
        VirtioGpu {
            uses_gui: false,
            width: default_width(),
            height: default_height(),
        }
    }
}

impl VirtioGpu {
    pub fn new(width: u32, height: u32) -> VirtioGpu {
        VirtioGpu {
            uses_gui: false,
            width,
            height,
        }
    }
}
