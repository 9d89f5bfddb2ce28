//! Kernel packet-tap access.
//!
//! The tap is strictly byte-oriented: one `read` yields one *batch* of
//! zero or more capture records, and there is never a 1:1 mapping
//! between reads and packets. Batch structure is the walker's concern
//! (`netspan_core::capture`); this module only moves bytes out of the
//! kernel.

use std::{
    ffi::CString,
    io,
    os::fd::{AsRawFd, FromRawFd, OwnedFd},
};

use tracing::info;

/// A source of capture batches.
///
/// The blocking `next_batch` is intended to run on a dedicated capture
/// thread; the kernel parks the thread until traffic arrives.
pub trait Tap {
    /// Block until the kernel delivers the next batch.
    fn next_batch(&mut self) -> io::Result<&[u8]>;
}

// BPF ioctls (BIOCSETIF / BIOCIMMEDIATE / BIOCGBLEN).
const BIOCSETIF: libc::c_ulong = 0x8020_426C;
const BIOCIMMEDIATE: libc::c_ulong = 0x8004_4270;
const BIOCGBLEN: libc::c_ulong = 0x4004_4266;

/// Interface request passed to `BIOCSETIF`; only the name matters here.
#[repr(C)]
struct IfReq {
    ifr_name: [libc::c_char; 16],
    ifr_ifru: [u8; 16],
}

/// A BPF packet-tap device bound to one interface.
///
/// Probes `/dev/bpf0..99` for a free device, binds it to the interface,
/// enables immediate mode, and sizes the batch buffer to the kernel's
/// preferred length. Each tap owns its device exclusively.
pub struct BpfTap {
    fd: OwnedFd,
    buf: Vec<u8>,
}

impl BpfTap {
    /// Open a free BPF device and attach it to `interface`.
    ///
    /// # Errors
    ///
    /// Fails if no BPF device is free, the interface does not exist, or
    /// the caller lacks the privileges the tap device requires.
    pub fn open(interface: &str) -> io::Result<Self> {
        let fd = Self::open_device()?;
        let buf_len = Self::configure(&fd, interface)?;
        info!(interface, buf_len, "capture tap attached");
        Ok(Self { fd, buf: vec![0u8; buf_len] })
    }

    fn open_device() -> io::Result<OwnedFd> {
        for i in 0..100 {
            let path = CString::new(format!("/dev/bpf{i}")).map_err(io::Error::other)?;
            let raw = unsafe { libc::open(path.as_ptr(), libc::O_RDWR) };
            if raw >= 0 {
                return Ok(unsafe { OwnedFd::from_raw_fd(raw) });
            }
        }
        Err(io::Error::new(io::ErrorKind::NotFound, "no free BPF device"))
    }

    fn configure(fd: &OwnedFd, interface: &str) -> io::Result<usize> {
        let mut req = IfReq { ifr_name: [0; 16], ifr_ifru: [0; 16] };
        let name = interface.as_bytes();
        if name.len() >= req.ifr_name.len() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "interface name too long"));
        }
        for (dst, &src) in req.ifr_name.iter_mut().zip(name) {
            *dst = src as libc::c_char;
        }

        if unsafe { libc::ioctl(fd.as_raw_fd(), BIOCSETIF, &req) } == -1 {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("failed to bind to interface {interface}"),
            ));
        }

        let enable: libc::c_uint = 1;
        if unsafe { libc::ioctl(fd.as_raw_fd(), BIOCIMMEDIATE, &enable) } == -1 {
            return Err(io::Error::last_os_error());
        }

        let mut buf_len: libc::c_uint = 0;
        if unsafe { libc::ioctl(fd.as_raw_fd(), BIOCGBLEN, &mut buf_len) } == -1 {
            return Err(io::Error::last_os_error());
        }

        Ok(buf_len as usize)
    }
}

impl Tap for BpfTap {
    fn next_batch(&mut self) -> io::Result<&[u8]> {
        loop {
            let n = unsafe {
                libc::read(self.fd.as_raw_fd(), self.buf.as_mut_ptr().cast(), self.buf.len())
            };
            if n < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }
            #[allow(clippy::cast_sign_loss)] // n >= 0 checked above
            return Ok(&self.buf[..n as usize]);
        }
    }
}
