use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::OwnedFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use input::LibinputInterface;
use libc::{O_ACCMODE, O_RDONLY, O_RDWR, O_WRONLY};

/// Device-node access capability injected into [`EventSource`].
///
/// The input backend never opens device files itself; it requests every
/// descriptor through this interface, which keeps privilege handling in one
/// place and lets tests substitute their own devices.
///
/// [`EventSource`]: crate::EventSource
pub trait DeviceAccess {
    /// Open the device node at `path` with the backend-requested `flags`.
    fn open(&mut self, path: &Path, flags: i32) -> io::Result<OwnedFd>;

    /// Close a descriptor previously handed out by [`open`](Self::open).
    fn close(&mut self, fd: OwnedFd);
}

/// Opens device nodes directly with the requested flags.
///
/// Requires read access to `/dev/input`, so the process must run as root or
/// as a member of the `input` group.
#[derive(Debug, Default)]
pub struct DirectAccess;

impl DeviceAccess for DirectAccess {
    fn open(&mut self, path: &Path, flags: i32) -> io::Result<OwnedFd> {
        let mode = flags & O_ACCMODE;

        OpenOptions::new()
            .custom_flags(flags)
            .read(mode == O_RDONLY || mode == O_RDWR)
            .write(mode == O_WRONLY || mode == O_RDWR)
            .open(path)
            .map(OwnedFd::from)
    }

    fn close(&mut self, fd: OwnedFd) {
        drop(File::from(fd));
    }
}

/// Adapts a [`DeviceAccess`] to the open/close-restricted interface the
/// backend expects, translating errors to its errno convention.
pub(crate) struct AccessBridge<A>(pub(crate) A);

impl<A: DeviceAccess> LibinputInterface for AccessBridge<A> {
    fn open_restricted(&mut self, path: &Path, flags: i32) -> Result<OwnedFd, i32> {
        self.0
            .open(path, flags)
            .map_err(|err| err.raw_os_error().unwrap_or(libc::EIO))
    }

    fn close_restricted(&mut self, fd: OwnedFd) {
        self.0.close(fd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn direct_access_opens_readable_nodes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"\x00").unwrap();

        let mut access = DirectAccess;
        let fd = access.open(file.path(), O_RDONLY).unwrap();
        access.close(fd);
    }

    #[test]
    fn direct_access_reports_missing_nodes() {
        let mut access = DirectAccess;

        let err = access
            .open(Path::new("/nonexistent/input/event0"), O_RDONLY)
            .unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn access_bridge_reports_errno() {
        let mut bridge = AccessBridge(DirectAccess);

        let errno = bridge
            .open_restricted(Path::new("/nonexistent/input/event0"), O_RDONLY)
            .unwrap_err();

        assert_eq!(errno, libc::ENOENT);
    }
}
