//! Disk image helpers for the storage devices.
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

#[derive(thiserror::Error, Debug)]
pub enum DiskError {
    #[error("disk image {0:?} already exists")]
    AlreadyExists(PathBuf),
    #[error("Could not {action} disk image {path:?}, reason: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn io_error<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> DiskError + 'a {
    move |source| DiskError::Io {
        action,
        path: path.to_path_buf(),
        source,
    }
}

/// Creates a sparse raw image of `size` bytes with unix permissions `mode`.
/// An existing file is never overwritten.
pub fn create_disk_image<P: AsRef<Path>>(path: P, size: u64, mode: u32) -> Result<(), DiskError> {
    let path = path.as_ref();
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(mode)
        .open(path)
        .map_err(|source| match source.kind() {
            io::ErrorKind::AlreadyExists => DiskError::AlreadyExists(path.to_path_buf()),
            _ => io_error("create", path)(source),
        })?;
    file.set_len(size).map_err(io_error("create", path))?;
    info!("Created disk image {} ({} bytes)", path.display(), size);
    Ok(())
}

/// Grows or shrinks the image to `size` bytes. New space stays sparse.
pub fn resize_disk_image<P: AsRef<Path>>(path: P, size: u64) -> Result<(), DiskError> {
    let path = path.as_ref();
    OpenOptions::new()
        .write(true)
        .open(path)
        .and_then(|file| file.set_len(size))
        .map_err(io_error("resize", path))?;
    debug!("Resized disk image {} to {} bytes", path.display(), size);
    Ok(())
}

/// Creates `path` with the content of `backing`. Writes to the new image do
/// not reach the backing file. The image is a copy-on-write clone where the
/// filesystem supports it, a plain copy otherwise. An existing file is never
/// overwritten.
pub fn clone_disk_image<P, Q>(path: P, backing: Q) -> Result<(), DiskError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let (path, backing) = (path.as_ref(), backing.as_ref());
    let already_exists = |source: io::Error| match source.kind() {
        io::ErrorKind::AlreadyExists => DiskError::AlreadyExists(path.to_path_buf()),
        _ => io_error("clone", path)(source),
    };

    match reflink::reflink(backing, path) {
        Ok(()) => {
            info!(
                "Cloned disk image {} from {}",
                path.display(),
                backing.display()
            );
            return Ok(());
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Err(already_exists(e)),
        Err(e) => debug!("Could not reflink {}, copying: {}", backing.display(), e),
    }

    let mut source = File::open(backing).map_err(io_error("open backing", backing))?;
    let mut target = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(already_exists)?;
    io::copy(&mut source, &mut target).map_err(io_error("clone", path))?;
    info!(
        "Copied disk image {} from {}",
        path.display(),
        backing.display()
    );
    Ok(())
}
