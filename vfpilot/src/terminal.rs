//! Host terminal plumbing for serial consoles: raw mode and pseudo-terminal
//! allocation.
use std::os::fd::{AsFd, OwnedFd};
use std::path::PathBuf;
use std::sync::Arc;

use nix::pty::openpty;
use nix::sys::termios::{
    tcgetattr, tcsetattr, ControlFlags, InputFlags, LocalFlags, OutputFlags, SetArg,
    SpecialCharacterIndices,
};
use tracing::debug;

/// Puts a terminal in raw mode, the way QEMU sets up its pty character
/// devices: no line editing, no echo, no CR/NL translation, no signals,
/// 8-bit characters. Output post-processing stays enabled.
pub fn set_raw_mode<Fd: AsFd>(fd: Fd) -> nix::Result<()> {
    let fd = fd.as_fd();
    let mut attrs = tcgetattr(fd)?;

    attrs.input_flags &= !(InputFlags::IGNBRK
        | InputFlags::BRKINT
        | InputFlags::PARMRK
        | InputFlags::INLCR
        | InputFlags::IGNCR
        | InputFlags::ICRNL
        | InputFlags::ISTRIP
        | InputFlags::IXON);
    attrs.output_flags |= OutputFlags::OPOST;
    attrs.control_flags &= !(ControlFlags::CSIZE | ControlFlags::PARENB);
    attrs.control_flags |= ControlFlags::CS8;
    attrs.local_flags &= !(LocalFlags::ECHO
        | LocalFlags::ECHONL
        | LocalFlags::ICANON
        | LocalFlags::IEXTEN
        | LocalFlags::ISIG);
    attrs.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
    attrs.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;

    tcsetattr(fd, SetArg::TCSANOW, &attrs)
}

/// Master side of an allocated pseudo-terminal.
#[derive(Debug)]
pub struct Pty {
    /// Kept open for as long as the virtual machine lives
    pub master: Arc<OwnedFd>,
    /// Device node users open with screen/minicom to reach the console
    pub path: PathBuf,
}

/// Allocates a pseudo-terminal pair and keeps only the master.
///
/// The peer is put in raw mode, its name recorded, and closed on return:
/// nothing in this process reads it, users open the device node later.
pub fn open_pty() -> nix::Result<Pty> {
    let pair = openpty(None, None)?;
    set_raw_mode(&pair.slave)?;
    let path = nix::unistd::ttyname(&pair.slave)?;
    debug!("Allocated pseudo-terminal {}", path.display());
    drop(pair.slave);

    Ok(Pty {
        master: Arc::new(pair.master),
        path,
    })
}
