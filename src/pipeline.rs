use crate::config::DetectionConfig;
use crate::models::{AlertRecord, PacketDescriptor, TrafficRecord};
use crate::rules::evaluate_window;
use crate::window::WindowAccumulator;

/// Everything one descriptor produced: its traffic record (possibly
/// re-tagged at rollover) and any alerts the closed window raised.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub record: TrafficRecord,
    pub alerts: Vec<AlertRecord>,
}

/// Per-descriptor orchestration: accumulate, check rollover, evaluate,
/// classify. The dispatcher owns the window accumulator; delivery belongs
/// to the engine loop.
pub struct Dispatcher {
    accumulator: WindowAccumulator,
    detection: DetectionConfig,
    tenant_id: String,
}

impl Dispatcher {
    pub fn new(detection: DetectionConfig, tenant_id: String) -> Self {
        Self {
            accumulator: WindowAccumulator::new(),
            detection,
            tenant_id,
        }
    }

    /// Processes one descriptor.
    ///
    /// The record starts classified `normal`. The descriptor is folded into
    /// the current window before the rollover check, so the packet that trips
    /// the rollover is counted in the window it closes. If this descriptor is
    /// the one that finds the window expired, the snapshot is evaluated and
    /// the in-flight record is upgraded when its own source address violated
    /// a rule. Packets from the same flood processed earlier in the window
    /// have already gone out tagged `normal`; that asymmetry is deliberate
    /// and covered by tests.
    pub fn ingest(&self, descriptor: &PacketDescriptor) -> DispatchOutcome {
        let mut record = TrafficRecord::normal(descriptor, &self.tenant_id);

        self.accumulator.record(descriptor);

        let mut alerts = Vec::new();
        if let Some(snapshot) = self.accumulator.rollover_if_due(self.detection.window()) {
            let verdict = evaluate_window(&snapshot, &self.detection, &self.tenant_id);
            record.status = verdict.classification_for(descriptor.source_address);
            alerts = verdict.alerts;
        }

        DispatchOutcome { record, alerts }
    }

    /// Source addresses tracked in the currently open window.
    pub fn tracked_addresses(&self) -> usize {
        self.accumulator.tracked_addresses()
    }

    #[cfg(test)]
    pub(crate) fn accumulator(&self) -> &WindowAccumulator {
        &self.accumulator
    }
}
