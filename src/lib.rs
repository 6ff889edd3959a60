pub mod config;
pub mod models;
pub mod pipeline;
pub mod rules;
pub mod sink;
pub mod source;
pub mod window;

use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use config::Config;
use models::PacketDescriptor;
use pipeline::Dispatcher;
use sink::EventSink;

/// Session counters, shared between the engine and whoever prints the
/// shutdown summary.
#[derive(Debug, Default)]
pub struct EngineStats {
    pub packets_processed: AtomicU64,
    pub records_delivered: AtomicU64,
    pub alerts_emitted: AtomicU64,
    pub delivery_failures: AtomicU64,
}

/// Core engine: owns the dispatch pipeline and the event sink, consumes
/// descriptors from a channel until the source closes it.
pub struct Engine {
    config: Config,
    dispatcher: Dispatcher,
    sink: EventSink,
    stats: Arc<EngineStats>,
}

impl Engine {
    /// Validates configuration and wires up the pipeline. Fails before any
    /// descriptor is processed when the tenant identifier is missing.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let sink = EventSink::new(&config.sink)?;
        let dispatcher = Dispatcher::new(config.detection.clone(), config.tenant_id.clone());

        Ok(Self {
            config,
            dispatcher,
            sink,
            stats: Arc::new(EngineStats::default()),
        })
    }

    pub fn stats(&self) -> Arc<EngineStats> {
        Arc::clone(&self.stats)
    }

    /// Consumes descriptors until the channel closes. Whatever accumulated
    /// in the window still open at that point is discarded without a final
    /// evaluation.
    pub async fn run(&self, mut rx: mpsc::Receiver<PacketDescriptor>) -> Result<()> {
        let host = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        info!("netshield engine started on {}", host);
        info!("event sink: {}", self.sink.endpoint());
        info!("tenant: {}", self.config.tenant_id);
        info!(
            "thresholds: {} packets, {} ports per {}ms window",
            self.config.detection.dos_threshold,
            self.config.detection.port_scan_threshold,
            self.config.detection.window_ms
        );

        while let Some(descriptor) = rx.recv().await {
            self.process(descriptor).await;
        }

        info!("descriptor stream ended; discarding partial window");
        self.log_summary();
        Ok(())
    }

    /// Full per-descriptor handling: dispatch, then forward alerts and the
    /// traffic record to the sink. Delivery failures are logged and dropped;
    /// they never stall the stream.
    async fn process(&self, descriptor: PacketDescriptor) {
        let outcome = self.dispatcher.ingest(&descriptor);
        self.stats.packets_processed.fetch_add(1, Ordering::Relaxed);

        for alert in &outcome.alerts {
            self.stats.alerts_emitted.fetch_add(1, Ordering::Relaxed);
            info!(
                "{}: {} from {} ({} observed)",
                alert.severity.to_string().to_uppercase(),
                alert.threat_type,
                alert.src_ip,
                alert.packet_count
            );

            if let Err(e) = self.sink.deliver_alert(alert).await {
                self.stats.delivery_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "failed to deliver alert {} ({} from {}): {:#}",
                    alert.event_id, alert.threat_type, alert.src_ip, e
                );
            }
        }

        match self.sink.deliver_traffic(&outcome.record).await {
            Ok(()) => {
                self.stats.records_delivered.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "logged {} packet {} -> {}",
                    outcome.record.status, outcome.record.src_ip, outcome.record.dest_ip
                );
            }
            Err(e) => {
                self.stats.delivery_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "failed to deliver traffic record {} -> {}: {:#}",
                    outcome.record.src_ip, outcome.record.dest_ip, e
                );
            }
        }
    }

    /// Logs the session summary. Called on end-of-stream and on interrupt.
    pub fn log_summary(&self) {
        info!(
            "session summary: {} packets processed, {} records delivered, {} alerts, {} delivery failures, {} addresses in open window",
            self.stats.packets_processed.load(Ordering::Relaxed),
            self.stats.records_delivered.load(Ordering::Relaxed),
            self.stats.alerts_emitted.load(Ordering::Relaxed),
            self.stats.delivery_failures.load(Ordering::Relaxed),
            self.dispatcher.tracked_addresses()
        );
    }
}
