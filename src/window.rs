//! Per-source-address statistics for the current evaluation window.
//!
//! The accumulator is the only shared mutable state in the engine. All of it
//! lives behind a single mutex: `record` and the rollover path serialize
//! against each other, so no increment is lost across a reset and at most
//! one caller per window performs the snapshot.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::models::{PacketDescriptor, TransportProtocol};

/// Owned copy of one window's statistics, taken at rollover.
#[derive(Debug, Default)]
pub struct WindowSnapshot {
    /// Packets observed per source address.
    pub packet_counts: HashMap<IpAddr, u64>,
    /// Distinct TCP destination ports contacted per source address.
    pub scanned_ports: HashMap<IpAddr, HashSet<u16>>,
}

struct WindowState {
    packet_counts: HashMap<IpAddr, u64>,
    scanned_ports: HashMap<IpAddr, HashSet<u16>>,
    window_start: Instant,
}

impl WindowState {
    fn take_snapshot(&mut self) -> WindowSnapshot {
        self.window_start = Instant::now();
        WindowSnapshot {
            packet_counts: std::mem::take(&mut self.packet_counts),
            scanned_ports: std::mem::take(&mut self.scanned_ports),
        }
    }
}

/// Mutex-owned per-address counters for the current window.
pub struct WindowAccumulator {
    state: Mutex<WindowState>,
}

impl WindowAccumulator {
    /// Opens the first window at the moment of construction.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(WindowState {
                packet_counts: HashMap::new(),
                scanned_ports: HashMap::new(),
                window_start: Instant::now(),
            }),
        }
    }

    /// Folds one descriptor into the current window: the per-address packet
    /// count always increments; the port set grows only for TCP descriptors
    /// that actually carry a destination port.
    pub fn record(&self, descriptor: &PacketDescriptor) {
        let mut state = self.state.lock().expect("window state lock poisoned");

        *state
            .packet_counts
            .entry(descriptor.source_address)
            .or_insert(0) += 1;

        if descriptor.transport_protocol == TransportProtocol::Tcp {
            if let Some(port) = descriptor.destination_port {
                state
                    .scanned_ports
                    .entry(descriptor.source_address)
                    .or_default()
                    .insert(port);
            }
        }
    }

    /// Atomically takes ownership of both maps, leaves them empty, and opens
    /// a new window. Concurrent `record` calls land entirely in one window
    /// or the other, never split.
    pub fn snapshot_and_reset(&self) -> WindowSnapshot {
        self.state
            .lock()
            .expect("window state lock poisoned")
            .take_snapshot()
    }

    /// Rollover guard: snapshots and resets only if the current window has
    /// been open for at least `window_len`. The check and the reset happen
    /// under one lock acquisition, so of any number of concurrent callers
    /// exactly one observes `Some` per expired window.
    pub fn rollover_if_due(&self, window_len: Duration) -> Option<WindowSnapshot> {
        let mut state = self.state.lock().expect("window state lock poisoned");
        if state.window_start.elapsed() >= window_len {
            Some(state.take_snapshot())
        } else {
            None
        }
    }

    /// Number of source addresses tracked in the current window.
    pub fn tracked_addresses(&self) -> usize {
        self.state
            .lock()
            .expect("window state lock poisoned")
            .packet_counts
            .len()
    }

    /// Rewinds the current window's start so a rollover becomes due without
    /// sleeping. Test hook only.
    #[cfg(test)]
    pub(crate) fn backdate_window_start(&self, by: Duration) {
        let mut state = self.state.lock().expect("window state lock poisoned");
        state.window_start -= by;
    }
}

impl Default for WindowAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
