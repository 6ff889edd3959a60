//! Window-boundary threshold evaluation.
//!
//! Two fixed rules run independently per source address, over a snapshot and
//! never per-packet:
//! - **Volume rule**: packet count strictly above `dos_threshold` fires a
//!   critical "DoS Attack Detected" alert.
//! - **Scan rule**: distinct TCP destination ports strictly above
//!   `port_scan_threshold` fires a high "Port Scanning Detected" alert.
//!
//! Both rules can fire for the same address in one window. Emission order
//! follows map iteration order and carries no meaning.

use std::collections::HashSet;
use std::net::IpAddr;

use crate::config::DetectionConfig;
use crate::models::{AlertRecord, Classification, Severity};
use crate::window::WindowSnapshot;

/// Outcome of evaluating one window: the alerts to emit plus the violator
/// sets the classification tagger consults.
#[derive(Debug, Default)]
pub struct WindowVerdict {
    pub alerts: Vec<AlertRecord>,
    volume_violators: HashSet<IpAddr>,
    scan_violators: HashSet<IpAddr>,
}

impl WindowVerdict {
    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    /// Classification for a record whose packet triggered this rollover.
    /// The volume rule outranks the scan rule when both implicate the
    /// address; anything unimplicated stays normal.
    pub fn classification_for(&self, address: IpAddr) -> Classification {
        if self.volume_violators.contains(&address) {
            Classification::Malicious
        } else if self.scan_violators.contains(&address) {
            Classification::Suspicious
        } else {
            Classification::Normal
        }
    }
}

/// Scans a window snapshot and produces the verdict for that window.
pub fn evaluate_window(
    snapshot: &WindowSnapshot,
    detection: &DetectionConfig,
    tenant_id: &str,
) -> WindowVerdict {
    let mut verdict = WindowVerdict::default();

    for (address, count) in &snapshot.packet_counts {
        if *count > detection.dos_threshold {
            verdict.volume_violators.insert(*address);
            verdict.alerts.push(AlertRecord::new(
                Severity::Critical,
                "DoS Attack Detected",
                *address,
                *count,
                format!("High traffic volume: {} packets/sec", count),
                tenant_id,
            ));
        }
    }

    for (address, ports) in &snapshot.scanned_ports {
        if ports.len() > detection.port_scan_threshold {
            verdict.scan_violators.insert(*address);
            verdict.alerts.push(AlertRecord::new(
                Severity::High,
                "Port Scanning Detected",
                *address,
                ports.len() as u64,
                format!("Scanned {} unique ports", ports.len()),
                tenant_id,
            ));
        }
    }

    verdict
}
