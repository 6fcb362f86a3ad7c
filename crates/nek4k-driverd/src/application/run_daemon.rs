//! The daemon's main loop.
//!
//! # State machine
//!
//! ```text
//!            ┌──────────────────────────────────────────┐
//!            ▼                                          │
//!   WaitingForEvent ──timeout / read miss──► Idle ──────┤
//!            │                              (sleep)     │
//!            │ readable                                 │
//!            ▼                                          │
//!       Translating ────────────────────────────────────┘
//! ```
//!
//! Every iteration:
//!
//! 1. Stop if the `shutdown` flag was set (SIGINT/SIGTERM).
//! 2. Wait up to `poll_timeout` for the device to become readable.
//! 3. **Reload checkpoint**: if the `reload` flag was set (SIGHUP), clear it
//!    and re-read the mapping table.  This is the only place the table is
//!    replaced, so the translator never sees a half-updated table.
//! 4. Read one record (or go idle on a miss) and translate it.
//!
//! # Why flags instead of doing the work in the signal handler? (for beginners)
//!
//! A signal handler interrupts the program at an arbitrary instruction.
//! Almost nothing is safe to do there: no allocation, no locks, no file I/O.
//! Setting an `AtomicBool` is safe, so the handlers only do that and the loop
//! picks the request up at its next checkpoint.

use std::fmt::Display;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use nek4k_core::{MappingTable, RawEventRecord};
use tracing::{debug, error, info, trace};

use crate::application::translate_event::{translate, Outcome, OutputSink};

/// A readable, pollable stream of kernel input records.
pub trait EventSource {
    /// Waits up to `timeout` for data.  Returns `true` when a read will not
    /// block.
    fn wait_readable(&mut self, timeout: Duration) -> bool;

    /// Blocking read of one record; `None` on a short or failed read.
    fn read_event(&mut self) -> Option<RawEventRecord>;

    /// Reads one record only if the last [`EventSource::wait_readable`]
    /// reported data; `None` otherwise.
    fn read_event_nonblocking(&mut self) -> Option<RawEventRecord>;
}

/// Produces a fresh mapping table on reload.
pub trait MappingSource {
    type Error: Display;

    fn load_mappings(&mut self) -> Result<MappingTable, Self::Error>;
}

/// Shutdown and reload requests shared with the signal handlers.
#[derive(Debug, Clone)]
pub struct LoopSignals {
    /// Set to stop the loop.
    pub shutdown: Arc<AtomicBool>,
    /// Set to request a mapping reload.
    pub reload: Arc<AtomicBool>,
}

impl Default for LoopSignals {
    fn default() -> Self {
        Self {
            shutdown: Arc::new(AtomicBool::new(false)),
            reload: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Timing parameters of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    /// Upper bound on one readiness wait.
    pub poll_timeout: Duration,
    /// Sleep after a timeout or a read miss.
    pub idle_interval: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(1000),
            idle_interval: Duration::from_millis(250),
        }
    }
}

/// Counters reported when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub delivered: u64,
    pub ignored: u64,
    pub delivery_failures: u64,
    pub idle_waits: u64,
    pub reloads: u64,
    pub reload_failures: u64,
}

/// What one call to [`DaemonLoop::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The shutdown flag was set; the loop must exit.
    Stopped,
    /// No data; the loop slept for the idle interval.
    Idle,
    /// One record was translated.
    Translated(Outcome),
}

/// Ties an [`EventSource`], an [`OutputSink`] and a [`MappingSource`]
/// together.  Owns all three exclusively for its lifetime.
pub struct DaemonLoop<E, S, M> {
    source: E,
    sink: S,
    mappings: M,
    table: MappingTable,
    signals: LoopSignals,
    settings: LoopSettings,
    stats: LoopStats,
}

impl<E, S, M> DaemonLoop<E, S, M>
where
    E: EventSource,
    S: OutputSink,
    M: MappingSource,
{
    /// Creates a loop that starts translating with `table`.
    pub fn new(
        source: E,
        sink: S,
        mappings: M,
        table: MappingTable,
        signals: LoopSignals,
        settings: LoopSettings,
    ) -> Self {
        Self {
            source,
            sink,
            mappings,
            table,
            signals,
            settings,
            stats: LoopStats::default(),
        }
    }

    /// Runs until the shutdown flag is set.
    pub fn run(&mut self) -> LoopStats {
        info!("entering event loop with {} mapping(s)", self.table.len());
        while self.step() != Step::Stopped {}
        info!("event loop stopped: {:?}", self.stats);
        self.stats
    }

    /// Performs one iteration.
    pub fn step(&mut self) -> Step {
        if self.signals.shutdown.load(Ordering::SeqCst) {
            return Step::Stopped;
        }

        let readable = self.source.wait_readable(self.settings.poll_timeout);

        if self.signals.reload.swap(false, Ordering::SeqCst) {
            self.reload();
        }

        let record = if readable {
            self.source.read_event_nonblocking()
        } else {
            None
        };

        let Some(record) = record else {
            self.stats.idle_waits += 1;
            if !self.settings.idle_interval.is_zero() {
                std::thread::sleep(self.settings.idle_interval);
            }
            return Step::Idle;
        };

        trace!(
            "event type={:#x} code={:#x} value={}",
            record.event_type,
            record.code,
            record.value
        );
        let outcome = translate(&record, &self.table, &mut self.sink);
        match outcome {
            Outcome::Delivered => self.stats.delivered += 1,
            Outcome::Ignored => self.stats.ignored += 1,
            Outcome::DeliveryFailed => self.stats.delivery_failures += 1,
        }
        Step::Translated(outcome)
    }

    fn reload(&mut self) {
        info!("reload requested; re-reading mappings");
        match self.mappings.load_mappings() {
            Ok(table) => {
                debug!("loaded {} mapping(s)", table.len());
                self.table = table;
                self.stats.reloads += 1;
            }
            Err(e) => {
                error!("reload failed, keeping previous mappings: {e}");
                self.stats.reload_failures += 1;
            }
        }
    }

    /// The mappings currently in effect.
    pub fn table(&self) -> &MappingTable {
        &self.table
    }

    pub fn source(&self) -> &E {
        &self.source
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
