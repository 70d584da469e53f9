use crate::backend::GraphicsDevice;
use crate::builder::{Builder, BuilderError};

#[derive(Debug)]
pub struct GraphicsDeviceBuilder {
    width: u32,
    height: u32,
    uses_gui: bool,
}

impl GraphicsDeviceBuilder {
    pub fn new(width: u32, height: u32) -> GraphicsDeviceBuilder {
        GraphicsDeviceBuilder {
            width,
            height,
            uses_gui: false,
        }
    }

    pub fn with_gui(mut self, uses_gui: bool) -> GraphicsDeviceBuilder {
        self.uses_gui = uses_gui;
        self
    }
}

impl Builder<GraphicsDevice> for GraphicsDeviceBuilder {
    fn try_build(self) -> Result<GraphicsDevice, BuilderError> {
        if self.width == 0 || self.height == 0 {
            return Err(BuilderError::InvalidField(
                "width/height".to_string(),
                format!("{}x{} is not a usable scanout", self.width, self.height),
            ));
        }
        Ok(GraphicsDevice {
            width: self.width,
            height: self.height,
            uses_gui: self.uses_gui,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scanout() {
        let gpu = GraphicsDeviceBuilder::new(1920, 1080)
            .with_gui(true)
            .try_build()
            .unwrap();
        assert_eq!((gpu.width, gpu.height, gpu.uses_gui), (1920, 1080, true));
    }

    #[test]
    fn empty_scanout() {
        assert!(GraphicsDeviceBuilder::new(0, 600).try_build().is_err());
    }
}
