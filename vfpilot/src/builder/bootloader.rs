use std::path::PathBuf;

use crate::backend::BootSource;
use crate::builder::{assert_path_set, Builder, BuilderError};

/// Direct kernel boot
#[derive(Debug, Default)]
pub struct KernelBuilder {
    pub command_line: Option<String>,
    pub initrd_path: Option<PathBuf>,
    pub kernel_image_path: Option<PathBuf>,
}

impl KernelBuilder {
    pub fn new() -> KernelBuilder {
        KernelBuilder::default()
    }

    pub fn with_command_line(mut self, command_line: String) -> KernelBuilder {
        self.command_line = Some(command_line);
        self
    }

    pub fn with_initrd_path(mut self, initrd_path: PathBuf) -> KernelBuilder {
        self.initrd_path = Some(initrd_path);
        self
    }

    pub fn with_kernel_image_path(mut self, kernel_image_path: PathBuf) -> KernelBuilder {
        self.kernel_image_path = Some(kernel_image_path);
        self
    }
}

impl Builder<BootSource> for KernelBuilder {
    fn try_build(self) -> Result<BootSource, BuilderError> {
        assert_path_set("vmlinuzPath", &self.kernel_image_path)?;
        Ok(BootSource::Linux {
            kernel_image_path: self.kernel_image_path.unwrap_or_default(),
            initrd_path: self.initrd_path.filter(|p| !p.as_os_str().is_empty()),
            command_line: self.command_line.unwrap_or_default(),
        })
    }
}

/// UEFI firmware boot
#[derive(Debug, Default)]
pub struct EfiBuilder {
    pub variable_store: Option<PathBuf>,
    pub create_variable_store: bool,
}

impl EfiBuilder {
    pub fn new() -> EfiBuilder {
        EfiBuilder::default()
    }

    pub fn with_variable_store(mut self, variable_store: PathBuf) -> EfiBuilder {
        self.variable_store = Some(variable_store);
        self
    }

    pub fn create_variable_store(mut self, create: bool) -> EfiBuilder {
        self.create_variable_store = create;
        self
    }
}

impl Builder<BootSource> for EfiBuilder {
    fn try_build(self) -> Result<BootSource, BuilderError> {
        assert_path_set("efiVariableStorePath", &self.variable_store)?;
        Ok(BootSource::Efi {
            variable_store: self.variable_store.unwrap_or_default(),
            create_variable_store: self.create_variable_store,
        })
    }
}

/// macOS guest boot, every path is mandatory
#[derive(Debug, Default)]
pub struct MacOsBuilder {
    pub machine_identifier_path: Option<PathBuf>,
    pub hardware_model_path: Option<PathBuf>,
    pub aux_image_path: Option<PathBuf>,
}

impl MacOsBuilder {
    pub fn new() -> MacOsBuilder {
        MacOsBuilder::default()
    }

    pub fn with_machine_identifier_path(mut self, path: PathBuf) -> MacOsBuilder {
        self.machine_identifier_path = Some(path);
        self
    }

    pub fn with_hardware_model_path(mut self, path: PathBuf) -> MacOsBuilder {
        self.hardware_model_path = Some(path);
        self
    }

    pub fn with_aux_image_path(mut self, path: PathBuf) -> MacOsBuilder {
        self.aux_image_path = Some(path);
        self
    }
}

impl Builder<BootSource> for MacOsBuilder {
    fn try_build(self) -> Result<BootSource, BuilderError> {
        assert_path_set("machineIdentifierPath", &self.machine_identifier_path)?;
        assert_path_set("hardwareModelPath", &self.hardware_model_path)?;
        assert_path_set("auxImagePath", &self.aux_image_path)?;
        Ok(BootSource::MacOs {
            machine_identifier_path: self.machine_identifier_path.unwrap_or_default(),
            hardware_model_path: self.hardware_model_path.unwrap_or_default(),
            aux_image_path: self.aux_image_path.unwrap_or_default(),
        })
    }
}
