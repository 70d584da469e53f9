//! # Cloud-init seed images
//!
//! cloud-init's NoCloud source reads a `user-data` and a `meta-data` file
//! from a volume labelled `cidata`. Both must exist, even empty.
//!
//! ISO 9660 encoding is left to an [`IsoWriter`]; this module selects the
//! files, fills in the missing one and builds the device that attaches the
//! resulting image.
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use vfpilot_models::models::{Device, UsbMassStorage};

pub const USER_DATA: &str = "user-data";
pub const META_DATA: &str = "meta-data";
pub const VOLUME_LABEL: &str = "cidata";

#[derive(thiserror::Error, Debug)]
pub enum CloudInitError {
    #[error("cloud-init needs 'user-data' and 'meta-data' files to work")]
    MissingConfig,
    #[error("Could not read cloud-init file {path:?}, reason: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Could not write cloud-init image, reason: {0}")]
    Iso(#[source] io::Error),
}

/// Encodes named files into an ISO 9660 image and returns its path.
pub trait IsoWriter {
    fn write_iso(&self, files: &BTreeMap<String, Vec<u8>>, volume_label: &str)
        -> io::Result<PathBuf>;
}

/// Content of the two NoCloud files. `None` is written as an empty file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CloudInitFiles {
    pub user_data: Option<Vec<u8>>,
    pub meta_data: Option<Vec<u8>>,
}

impl CloudInitFiles {
    /// Reads the files among `paths` named `user-data` or `meta-data`.
    /// Other names and empty entries are skipped. At least one of the two
    /// files must be present.
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<CloudInitFiles, CloudInitError> {
        let mut files = CloudInitFiles::default();
        for path in paths {
            let path: &Path = path.as_ref();
            if path.as_os_str().is_empty() {
                continue;
            }
            let slot = match path.file_name().and_then(|n| n.to_str()) {
                Some(USER_DATA) => &mut files.user_data,
                Some(META_DATA) => &mut files.meta_data,
                _ => {
                    debug!("Ignoring {}, not a cloud-init file", path.display());
                    continue;
                }
            };
            let content = fs::read(path).map_err(|source| CloudInitError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            *slot = Some(content);
        }
        if files.user_data.is_none() && files.meta_data.is_none() {
            return Err(CloudInitError::MissingConfig);
        }
        Ok(files)
    }

    /// The file map handed to the ISO writer, missing files as empty content
    pub fn entries(&self) -> BTreeMap<String, Vec<u8>> {
        BTreeMap::from([
            (
                USER_DATA.to_string(),
                self.user_data.clone().unwrap_or_default(),
            ),
            (
                META_DATA.to_string(),
                self.meta_data.clone().unwrap_or_default(),
            ),
        ])
    }

    pub fn build<W: IsoWriter>(&self, writer: &W) -> Result<PathBuf, CloudInitError> {
        let iso = writer
            .write_iso(&self.entries(), VOLUME_LABEL)
            .map_err(CloudInitError::Iso)?;
        info!("Created cloud-init image {}", iso.display());
        Ok(iso)
    }
}

/// Read-only USB mass storage device attaching a seed image
pub fn cloud_init_device<P: AsRef<Path>>(iso_path: P) -> Device {
    Device::UsbMassStorage(UsbMassStorage::new(iso_path.as_ref().to_path_buf(), true))
}
