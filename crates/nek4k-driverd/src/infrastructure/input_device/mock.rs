//! Scripted input devices for unit and integration testing.
//!
//! # Why mock devices?
//!
//! The real evdev code needs `/dev/input` nodes, read permission on them, and
//! a specific keyboard plugged in.  None of that exists on a build machine.
//!
//! - [`MockDeviceProbe`] holds a list of [`MockNode`]s describing what each
//!   "device" answers to the identity, name and capability queries, plus
//!   switches to make any query fail.  It records every open and close so
//!   tests can check that rejected candidates are released.
//!
//! - [`MockEventSource`] replays a script of timeouts, read misses and
//!   records to the daemon loop.
//!
//! # Usage in tests
//!
//! ```ignore
//! let probe = MockDeviceProbe::new().with_node(
//!     MockNode::new("/dev/input/event4")
//!         .with_id(0x045E, 0x00DB)
//!         .with_capabilities(mask),
//! );
//! let device = DeviceLocator::new(probe).locate("auto", &identity)?;
//! assert_eq!(device.path, PathBuf::from("/dev/input/event4"));
//! ```

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use nek4k_core::{CapabilityMask, RawEventRecord};

use crate::application::locate_device::{DeviceId, DeviceProbe};
use crate::application::run_daemon::EventSource;

// ── MockDeviceProbe ───────────────────────────────────────────────────────────

/// Description of one scripted device node.
#[derive(Debug, Clone)]
pub struct MockNode {
    pub path: PathBuf,
    pub id: Option<DeviceId>,
    pub name: Option<String>,
    pub capabilities: Option<CapabilityMask>,
    pub open_fails: bool,
}

impl MockNode {
    /// A node that opens, reports ID 0000:0000, an empty name and no
    /// capability bits.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            id: Some(DeviceId::default()),
            name: Some(String::new()),
            capabilities: Some(CapabilityMask::default()),
            open_fails: false,
        }
    }

    pub fn with_id(mut self, vendor: u16, product: u16) -> Self {
        self.id = Some(DeviceId { vendor, product });
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_capabilities(mut self, mask: CapabilityMask) -> Self {
        self.capabilities = Some(mask);
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.open_fails = true;
        self
    }

    pub fn failing_id(mut self) -> Self {
        self.id = None;
        self
    }

    pub fn failing_name(mut self) -> Self {
        self.name = None;
        self
    }

    pub fn failing_capabilities(mut self) -> Self {
        self.capabilities = None;
        self
    }
}

/// An "open" scripted node.  Dropping it records the close.
#[derive(Debug)]
pub struct MockDevice {
    pub path: PathBuf,
    node: MockNode,
    closed: Arc<Mutex<Vec<PathBuf>>>,
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        if let Ok(mut closed) = self.closed.lock() {
            closed.push(self.path.clone());
        }
    }
}

/// A [`DeviceProbe`] over scripted nodes.
#[derive(Debug, Default)]
pub struct MockDeviceProbe {
    nodes: Vec<MockNode>,
    bad_entries: usize,
    list_fails: bool,
    opened: Arc<Mutex<Vec<PathBuf>>>,
    closed: Arc<Mutex<Vec<PathBuf>>>,
}

impl MockDeviceProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node; nodes are listed in insertion order.
    pub fn with_node(mut self, node: MockNode) -> Self {
        self.nodes.push(node);
        self
    }

    /// Adds a directory entry that fails to read.
    pub fn with_bad_entry(mut self) -> Self {
        self.bad_entries += 1;
        self
    }

    /// Makes listing the directory fail.
    pub fn failing_list(mut self) -> Self {
        self.list_fails = true;
        self
    }

    /// Paths successfully opened, in order.
    pub fn opened_log(&self) -> Arc<Mutex<Vec<PathBuf>>> {
        Arc::clone(&self.opened)
    }

    /// Paths closed, in order.
    pub fn closed_log(&self) -> Arc<Mutex<Vec<PathBuf>>> {
        Arc::clone(&self.closed)
    }
}

fn unsupported(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, format!("mock {what} failure"))
}

impl DeviceProbe for MockDeviceProbe {
    type Device = MockDevice;

    fn list_dir(&self, _dir: &Path) -> io::Result<Vec<io::Result<PathBuf>>> {
        if self.list_fails {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "mock list failure",
            ));
        }
        let mut entries: Vec<io::Result<PathBuf>> =
            (0..self.bad_entries).map(|_| Err(unsupported("entry"))).collect();
        entries.extend(self.nodes.iter().map(|n| Ok(n.path.clone())));
        Ok(entries)
    }

    fn open(&self, path: &Path) -> io::Result<MockDevice> {
        let node = self
            .nodes
            .iter()
            .find(|n| n.path == path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such mock node"))?;
        if node.open_fails {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "mock open failure",
            ));
        }
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(path.to_path_buf());
        }
        Ok(MockDevice {
            path: path.to_path_buf(),
            node: node.clone(),
            closed: Arc::clone(&self.closed),
        })
    }

    fn query_id(&self, device: &MockDevice) -> io::Result<DeviceId> {
        device.node.id.ok_or_else(|| unsupported("EVIOCGID"))
    }

    fn query_name(&self, device: &MockDevice) -> io::Result<String> {
        device.node.name.clone().ok_or_else(|| unsupported("EVIOCGNAME"))
    }

    fn query_capabilities(&self, device: &MockDevice) -> io::Result<CapabilityMask> {
        device
            .node
            .capabilities
            .ok_or_else(|| unsupported("EVIOCGBIT"))
    }
}

// ── MockEventSource ───────────────────────────────────────────────────────────

/// One scripted answer to a readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptStep {
    /// The wait times out.
    Timeout,
    /// The wait reports data but the read comes back short.
    Miss,
    /// The wait reports data and the read returns this record.
    Event(RawEventRecord),
}

/// Replays a script of [`ScriptStep`]s.
///
/// Once the script is exhausted every wait times out.  When built with
/// [`MockEventSource::stop_when_drained`] the first wait past the end also
/// sets the given `shutdown` flag, so a daemon loop run to completion
/// terminates.
#[derive(Debug, Default)]
pub struct MockEventSource {
    script: VecDeque<ScriptStep>,
    pending: Option<ScriptStep>,
    stop_flag: Option<Arc<AtomicBool>>,
    /// Timeouts passed to `wait_readable`, in order.
    pub waits: Vec<Duration>,
}

impl MockEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_timeout(mut self) -> Self {
        self.script.push_back(ScriptStep::Timeout);
        self
    }

    pub fn then_miss(mut self) -> Self {
        self.script.push_back(ScriptStep::Miss);
        self
    }

    pub fn then_event(mut self, record: RawEventRecord) -> Self {
        self.script.push_back(ScriptStep::Event(record));
        self
    }

    pub fn then_events<I>(mut self, records: I) -> Self
    where
        I: IntoIterator<Item = RawEventRecord>,
    {
        self.script
            .extend(records.into_iter().map(ScriptStep::Event));
        self
    }

    pub fn stop_when_drained(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.stop_flag = Some(shutdown);
        self
    }
}

impl EventSource for MockEventSource {
    fn wait_readable(&mut self, timeout: Duration) -> bool {
        self.waits.push(timeout);
        match self.script.pop_front() {
            Some(ScriptStep::Timeout) => {
                self.pending = None;
                false
            }
            Some(step) => {
                self.pending = Some(step);
                true
            }
            None => {
                self.pending = None;
                if let Some(flag) = &self.stop_flag {
                    flag.store(true, Ordering::SeqCst);
                }
                false
            }
        }
    }

    fn read_event(&mut self) -> Option<RawEventRecord> {
        let step = self.pending.take().or_else(|| self.script.pop_front());
        match step {
            Some(ScriptStep::Event(record)) => Some(record),
            _ => None,
        }
    }

    fn read_event_nonblocking(&mut self) -> Option<RawEventRecord> {
        match self.pending.take() {
            Some(ScriptStep::Event(record)) => Some(record),
            _ => None,
        }
    }
}
