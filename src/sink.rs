//! Event sink: delivery of traffic records and alerts to the backend API.
//!
//! Delivery is fire-and-forget. Every call is bounded by the client timeout;
//! transport errors, timeouts, and non-2xx acknowledgements all surface as
//! `Err` for the caller to log and drop. Nothing is retried or queued, and a
//! failed delivery never blocks the next one.

use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::config::SinkConfig;
use crate::models::{AlertRecord, TrafficRecord};

/// HTTP client for the backend API, with an optional stdout mirror that
/// prints every payload as a JSON line (useful without a backend).
pub struct EventSink {
    client: reqwest::Client,
    endpoint: String,
    mirror_stdout: bool,
}

impl EventSink {
    pub fn new(config: &SinkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client for event sink")?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            mirror_stdout: config.mirror_stdout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Posts one traffic log entry to `/api/logs`.
    pub async fn deliver_traffic(&self, record: &TrafficRecord) -> Result<()> {
        self.post("api/logs", record).await
    }

    /// Posts one alert to `/api/alerts`.
    pub async fn deliver_alert(&self, alert: &AlertRecord) -> Result<()> {
        self.post("api/alerts", alert).await
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<()> {
        if self.mirror_stdout {
            println!(
                "{}",
                serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string())
            );
        }

        let url = format!("{}/{}", self.endpoint, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {} failed", url))?;

        // The backend acknowledges stored records with 201 Created.
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("sink returned non-success status {} for {}", status, url);
        }

        debug!("delivered payload to {} ({})", url, status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PacketDescriptor, Severity};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn sink_config(endpoint: &str) -> SinkConfig {
        SinkConfig {
            endpoint: endpoint.to_string(),
            timeout_secs: 2,
            mirror_stdout: false,
        }
    }

    #[test]
    fn trailing_slash_is_normalized() {
        let sink = EventSink::new(&sink_config("http://localhost:5000/")).unwrap();
        assert_eq!(sink.endpoint(), "http://localhost:5000");
    }

    // One-shot HTTP responder: accepts a single connection, reads the
    // request, answers 201 Created.
    async fn spawn_backend() -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = vec![0u8; 8192];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 201 Created\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                    )
                    .await;
            }
        });
        addr
    }

    #[tokio::test]
    async fn delivery_succeeds_against_acknowledging_backend() {
        let addr = spawn_backend().await;
        let sink = EventSink::new(&sink_config(&format!("http://{}", addr))).unwrap();

        let descriptor: PacketDescriptor = serde_json::from_str(
            r#"{"src_ip":"10.0.0.5","dest_ip":"192.168.1.1","protocol":"UDP","packet_size":64}"#,
        )
        .unwrap();
        let record = TrafficRecord::normal(&descriptor, "tenant-1");

        sink.deliver_traffic(&record).await.unwrap();
    }

    #[tokio::test]
    async fn delivery_failure_is_an_error_not_a_panic() {
        // Bind a port, then drop the listener so connections are refused.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let sink = EventSink::new(&sink_config(&format!("http://{}", addr))).unwrap();
        let alert = AlertRecord::new(
            Severity::High,
            "Port Scanning Detected",
            "10.0.0.9".parse().unwrap(),
            21,
            "Scanned 21 unique ports".to_string(),
            "tenant-1",
        );

        assert!(sink.deliver_alert(&alert).await.is_err());
    }
}
