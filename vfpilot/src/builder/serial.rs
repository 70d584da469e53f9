use std::path::PathBuf;

use crate::builder::{Builder, BuilderError};

/// Where a serial console is attached on the host side
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SerialMode {
    Stdio,
    Pty,
    LogFile(PathBuf),
}

/// Picks the attachment of a serial console. Exactly one mode must be
/// requested.
#[derive(Debug, Default)]
pub struct SerialModeBuilder {
    uses_stdio: bool,
    uses_pty: bool,
    log_file: Option<PathBuf>,
}

impl SerialModeBuilder {
    pub fn new() -> SerialModeBuilder {
        SerialModeBuilder::default()
    }

    pub fn with_stdio(mut self, uses_stdio: bool) -> SerialModeBuilder {
        self.uses_stdio = uses_stdio;
        self
    }

    pub fn with_pty(mut self, uses_pty: bool) -> SerialModeBuilder {
        self.uses_pty = uses_pty;
        self
    }

    pub fn with_log_file(mut self, log_file: PathBuf) -> SerialModeBuilder {
        self.log_file = Some(log_file);
        self
    }
}

impl Builder<SerialMode> for SerialModeBuilder {
    fn try_build(self) -> Result<SerialMode, BuilderError> {
        let log_file = self.log_file.filter(|path| !path.as_os_str().is_empty());
        match (self.uses_stdio, self.uses_pty, log_file) {
            (true, false, None) => Ok(SerialMode::Stdio),
            (false, true, None) => Ok(SerialMode::Pty),
            (false, false, Some(path)) => Ok(SerialMode::LogFile(path)),
            _ => Err(BuilderError::ExclusiveFields(
                "'usesStdio', 'usesPty', 'logFile'".to_string(),
            )),
        }
    }
}
