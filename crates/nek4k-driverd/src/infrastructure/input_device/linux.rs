//! Linux evdev device access.
//!
//! # What is evdev? (for beginners)
//!
//! Every input device the kernel knows about gets a character device under
//! `/dev/input/event<N>`.  Reading from it yields a stream of fixed-size
//! `struct input_event` records (see `nek4k_core::protocol::record`).
//! Metadata is obtained with `ioctl(2)` requests:
//!
//! | Request            | Returns                                         |
//! |--------------------|-------------------------------------------------|
//! | `EVIOCGID`         | `struct input_id` (bus, vendor, product, version)|
//! | `EVIOCGNAME(len)`  | NUL-terminated device name                      |
//! | `EVIOCGBIT(0, len)`| bitfield of supported event types               |
//!
//! The ioctl wrappers are generated with the `nix` ioctl macros, which encode
//! the direction, size and request number the same way the kernel headers do.
//!
//! # Permissions
//!
//! Event nodes are normally `root:input 0660`.  The daemon must run as root or
//! as a member of the `input` group, otherwise every open fails and autoscan
//! reports no matching device.

use std::fs::{self, File};
use std::io::{self, Read};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nek4k_core::protocol::event_type::EV_CNT;
use nek4k_core::{CapabilityMask, RawEventRecord, RecordLayout};
use nix::{ioctl_read, ioctl_read_buf};
use tracing::debug;

use crate::application::locate_device::{DeviceId, DeviceProbe};
use crate::application::run_daemon::EventSource;

/// Buffer size for `EVIOCGNAME`.
const NAME_BUF_LEN: usize = 1024;

// ── ioctl definitions ─────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct InputId {
    bustype: u16,
    vendor: u16,
    product: u16,
    version: u16,
}

ioctl_read!(eviocgid, b'E', 0x02, InputId);
ioctl_read_buf!(eviocgname, b'E', 0x06, u8);
ioctl_read_buf!(eviocgbit_ev, b'E', 0x20, libc::c_ulong);

/// Bits per `unsigned long` in the `EVIOCGBIT` result.
const LONG_BITS: usize = libc::c_ulong::BITS as usize;

/// `unsigned long`s needed to hold `EV_CNT` bits.
const EV_WORDS: usize = (EV_CNT + LONG_BITS - 1) / LONG_BITS;

/// Decodes the kernel's `unsigned long` bitfield: bit `n` is bit `n % LONG_BITS`
/// of word `n / LONG_BITS`, whatever the host byte order.
fn mask_from_words(words: &[libc::c_ulong]) -> CapabilityMask {
    let bits = (0..EV_CNT)
        .filter(|n| {
            words
                .get(n / LONG_BITS)
                .is_some_and(|word| (word >> (n % LONG_BITS)) & 1 != 0)
        })
        .fold(0u32, |acc, n| acc | 1 << n);
    CapabilityMask::from_bits(bits)
}

// ── EvdevDevice ───────────────────────────────────────────────────────────────

/// An open event device node.
///
/// Owns the file descriptor (closed on drop) and the readiness bits of the
/// most recent `poll(2)`.
#[derive(Debug)]
pub struct EvdevDevice {
    path: PathBuf,
    file: File,
    layout: RecordLayout,
    last_revents: libc::c_short,
}

impl EvdevDevice {
    /// Opens `path` read-only.
    ///
    /// # Errors
    ///
    /// Returns the OS error from `open(2)`.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            layout: RecordLayout::NATIVE,
            last_revents: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Vendor and product ID (`EVIOCGID`).
    pub fn id(&self) -> io::Result<DeviceId> {
        let mut id = InputId::default();
        // SAFETY: `id` is a properly sized, writable `struct input_id`.
        unsafe { eviocgid(self.file.as_raw_fd(), &mut id) }.map_err(io::Error::from)?;
        Ok(DeviceId {
            vendor: id.vendor,
            product: id.product,
        })
    }

    /// Human-readable device name (`EVIOCGNAME`).
    pub fn name(&self) -> io::Result<String> {
        let mut buf = [0u8; NAME_BUF_LEN];
        // SAFETY: the kernel writes at most `buf.len()` bytes.
        let len = unsafe { eviocgname(self.file.as_raw_fd(), &mut buf) }
            .map_err(io::Error::from)?;
        let len = usize::try_from(len).unwrap_or(0).min(buf.len());
        let end = buf[..len].iter().position(|&b| b == 0).unwrap_or(len);
        Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
    }

    /// Supported event types (`EVIOCGBIT(0, ...)`).
    pub fn capabilities(&self) -> io::Result<CapabilityMask> {
        let mut words: [libc::c_ulong; EV_WORDS] = [0; EV_WORDS];
        // SAFETY: the kernel writes at most `size_of_val(&words)` bytes.
        unsafe { eviocgbit_ev(self.file.as_raw_fd(), &mut words) }.map_err(io::Error::from)?;
        Ok(mask_from_words(&words))
    }

    fn read_record(&mut self) -> Option<RawEventRecord> {
        let mut buf = [0u8; 32];
        let buf = &mut buf[..self.layout.size()];
        match self.file.read(buf) {
            Ok(n) if n == buf.len() => RawEventRecord::decode(self.layout, buf).ok(),
            Ok(n) => {
                if n > 0 {
                    debug!("short read of {n} bytes from {}", self.path.display());
                }
                None
            }
            Err(e) => {
                debug!("read from {} failed: {e}", self.path.display());
                None
            }
        }
    }
}

impl EventSource for EvdevDevice {
    fn wait_readable(&mut self, timeout: Duration) -> bool {
        let timeout_ms = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);
        let mut pfd = libc::pollfd {
            fd: self.file.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        // SAFETY: `pfd` is a single valid pollfd for the duration of the call.
        let ret = unsafe { libc::poll(&mut pfd as *mut libc::pollfd, 1, timeout_ms) };
        if ret < 0 {
            // EINTR from a signal lands here; the loop checks its flags next.
            self.last_revents = 0;
            return false;
        }
        self.last_revents = pfd.revents;
        // POLLHUP/POLLERR also count: the read will report the condition.
        ret > 0 && pfd.revents != 0
    }

    fn read_event(&mut self) -> Option<RawEventRecord> {
        self.last_revents = 0;
        self.read_record()
    }

    fn read_event_nonblocking(&mut self) -> Option<RawEventRecord> {
        if self.last_revents & libc::POLLIN == 0 {
            return None;
        }
        self.last_revents = 0;
        self.read_record()
    }
}

// ── EvdevProbe ────────────────────────────────────────────────────────────────

/// [`DeviceProbe`] backed by the real filesystem and evdev ioctls.
#[derive(Debug, Default, Clone, Copy)]
pub struct EvdevProbe;

impl DeviceProbe for EvdevProbe {
    type Device = EvdevDevice;

    fn list_dir(&self, dir: &Path) -> io::Result<Vec<io::Result<PathBuf>>> {
        Ok(fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect())
    }

    fn open(&self, path: &Path) -> io::Result<EvdevDevice> {
        EvdevDevice::open(path)
    }

    fn query_id(&self, device: &EvdevDevice) -> io::Result<DeviceId> {
        device.id()
    }

    fn query_name(&self, device: &EvdevDevice) -> io::Result<String> {
        device.name()
    }

    fn query_capabilities(&self, device: &EvdevDevice) -> io::Result<CapabilityMask> {
        device.capabilities()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
