use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Transport protocol of an observed packet, as far as the descriptor
/// distinguishes it. Anything that is neither TCP nor UDP collapses to
/// [`TransportProtocol::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportProtocol {
    #[serde(rename = "TCP")]
    Tcp,
    #[serde(rename = "UDP")]
    Udp,
    Other,
}

impl std::fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportProtocol::Tcp => write!(f, "TCP"),
            TransportProtocol::Udp => write!(f, "UDP"),
            TransportProtocol::Other => write!(f, "Other"),
        }
    }
}

/// A minimally-parsed packet descriptor handed to the engine by the
/// packet source. One descriptor per observed packet; the engine never
/// touches raw frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketDescriptor {
    #[serde(rename = "src_ip")]
    pub source_address: IpAddr,

    #[serde(rename = "dest_ip")]
    pub destination_address: IpAddr,

    #[serde(rename = "protocol")]
    pub transport_protocol: TransportProtocol,

    /// Destination port, present only when the source could extract one.
    /// Port-scan tracking only looks at this for TCP descriptors.
    #[serde(rename = "dest_port", default, skip_serializing_if = "Option::is_none")]
    pub destination_port: Option<u16>,

    #[serde(rename = "packet_size")]
    pub byte_length: u64,

    /// Arrival timestamp. Defaults to now when replayed descriptors omit it.
    #[serde(rename = "timestamp", default = "Utc::now")]
    pub observed_at: DateTime<Utc>,
}

/// Classification assigned to a single traffic record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    #[default]
    Normal,
    Suspicious,
    Malicious,
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Classification::Normal => write!(f, "normal"),
            Classification::Suspicious => write!(f, "suspicious"),
            Classification::Malicious => write!(f, "malicious"),
        }
    }
}

/// Alert severity. Declared low-to-high so `Ord` matches escalation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Workflow status of an alert. The engine only ever emits
/// [`AlertStatus::Unresolved`]; the other states belong to the backend's
/// triage workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    #[default]
    Unresolved,
    Investigating,
    Resolved,
}

/// One traffic log entry per processed packet, shaped for the backend's
/// `/api/logs` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct TrafficRecord {
    pub src_ip: IpAddr,
    pub dest_ip: IpAddr,
    pub protocol: TransportProtocol,
    pub packet_size: u64,
    pub status: Classification,
    pub user_id: String,
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl TrafficRecord {
    /// Builds the default record for a descriptor: classification `normal`,
    /// empty details. Re-tagging, if any, happens at window rollover.
    pub fn normal(descriptor: &PacketDescriptor, tenant_id: &str) -> Self {
        Self {
            src_ip: descriptor.source_address,
            dest_ip: descriptor.destination_address,
            protocol: descriptor.transport_protocol,
            packet_size: descriptor.byte_length,
            status: Classification::Normal,
            user_id: tenant_id.to_string(),
            details: serde_json::Map::new(),
        }
    }
}

/// A threshold-violation alert, shaped for the backend's `/api/alerts`
/// endpoint. `dest_ip` is the literal `"Network"`: the violation is about
/// aggregate behaviour of a source, not a single destination.
#[derive(Debug, Clone, Serialize)]
pub struct AlertRecord {
    pub severity: Severity,
    pub threat_type: String,
    pub src_ip: IpAddr,
    pub dest_ip: String,
    /// Observed metric for the violated rule: packet count for the volume
    /// rule, distinct-port count for the scan rule.
    pub packet_count: u64,
    pub details: String,
    pub status: AlertStatus,
    pub user_id: String,
    /// Correlation id carried through delivery logs.
    pub event_id: uuid::Uuid,
}

impl AlertRecord {
    pub fn new(
        severity: Severity,
        threat_type: impl Into<String>,
        src_ip: IpAddr,
        packet_count: u64,
        details: String,
        tenant_id: &str,
    ) -> Self {
        Self {
            severity,
            threat_type: threat_type.into(),
            src_ip,
            dest_ip: "Network".to_string(),
            packet_count,
            details,
            status: AlertStatus::Unresolved,
            user_id: tenant_id.to_string(),
            event_id: uuid::Uuid::new_v4(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn descriptor_wire_shape() {
        let line = r#"{"src_ip":"10.0.0.5","dest_ip":"192.168.1.1","protocol":"TCP","dest_port":443,"packet_size":1500}"#;
        let d: PacketDescriptor = serde_json::from_str(line).unwrap();
        assert_eq!(d.source_address.to_string(), "10.0.0.5");
        assert_eq!(d.transport_protocol, TransportProtocol::Tcp);
        assert_eq!(d.destination_port, Some(443));
        assert_eq!(d.byte_length, 1500);
    }

    #[test]
    fn descriptor_port_is_optional() {
        let line = r#"{"src_ip":"10.0.0.5","dest_ip":"192.168.1.1","protocol":"UDP","packet_size":60}"#;
        let d: PacketDescriptor = serde_json::from_str(line).unwrap();
        assert_eq!(d.destination_port, None);
        assert_eq!(d.transport_protocol, TransportProtocol::Udp);
    }

    #[test]
    fn traffic_record_wire_shape() {
        let d: PacketDescriptor = serde_json::from_str(
            r#"{"src_ip":"10.0.0.5","dest_ip":"192.168.1.1","protocol":"Other","packet_size":42}"#,
        )
        .unwrap();
        let record = TrafficRecord::normal(&d, "tenant-1");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["src_ip"], "10.0.0.5");
        assert_eq!(json["dest_ip"], "192.168.1.1");
        assert_eq!(json["protocol"], "Other");
        assert_eq!(json["packet_size"], 42);
        assert_eq!(json["status"], "normal");
        assert_eq!(json["user_id"], "tenant-1");
        assert!(json["details"].as_object().unwrap().is_empty());
    }

    #[test]
    fn alert_record_wire_shape() {
        let alert = AlertRecord::new(
            Severity::Critical,
            "DoS Attack Detected",
            "10.0.0.5".parse().unwrap(),
            101,
            "High traffic volume: 101 packets/sec".to_string(),
            "tenant-1",
        );
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["severity"], "critical");
        assert_eq!(json["threat_type"], "DoS Attack Detected");
        assert_eq!(json["src_ip"], "10.0.0.5");
        assert_eq!(json["dest_ip"], "Network");
        assert_eq!(json["packet_count"], 101);
        assert_eq!(json["status"], "unresolved");
        assert_eq!(json["user_id"], "tenant-1");
    }
}
