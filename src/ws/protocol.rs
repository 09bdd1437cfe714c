use crate::discovery::{DiscoveryRequest, DiscoveryStatus};
use crate::repositories::devices::TemperatureDevice;
use crate::repositories::readings::CurrentReading;
use serde::{Deserialize, Serialize};

/// Calls from dashboard clients.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    GetCurrentReadings,
    GetDiscoveryStatus,
    SetupDiscovery { request: DiscoveryRequest },
    TeardownDiscovery,
    Ping,
}

/// Events pushed to dashboard clients. Broadcast variants are fire-and-forget;
/// clients re-fetch state on reconnect.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    NewDiscoveryMessage { device: TemperatureDevice },
    UpdateCurrentReadings,
    UpdateCategories,
    UpdateDiscoveryStatus { status: DiscoveryStatus },
    CurrentReadings { readings: Vec<CurrentReading> },
    DiscoveryStatus { status: DiscoveryStatus },
    Error { message: String, code: String },
    Pong,
}

impl ServerMessage {
    pub fn error(message: impl Into<String>, code: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
            code: code.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn client_get_current_readings_deserializes() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"getCurrentReadings"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::GetCurrentReadings));
    }

    #[test]
    fn client_setup_discovery_deserializes() {
        let json = r#"{
            "type": "setupDiscovery",
            "request": {"host": "broker.local", "port": 1883, "topic_filter": "rtl_433/#"}
        }"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::SetupDiscovery { request } => {
                assert_eq!(request.host, "broker.local");
                assert_eq!(request.port, 1883);
                assert_eq!(request.topic_filter, "rtl_433/#");
            }
            other => panic!("expected setupDiscovery, got {:?}", other),
        }
    }

    #[test]
    fn unknown_client_message_is_an_error() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"reboot"}"#).is_err());
    }

    #[test]
    fn status_event_serializes_with_camel_case_tag() {
        let json = serde_json::to_string(&ServerMessage::UpdateDiscoveryStatus {
            status: DiscoveryStatus::Subscribed,
        })
        .unwrap();
        assert!(json.contains(r#""type":"updateDiscoveryStatus"#));
        assert!(json.contains(r#""status":"subscribed"#));
    }

    #[test]
    fn error_event_serializes() {
        let json =
            serde_json::to_string(&ServerMessage::error("already active", "conflict")).unwrap();
        assert!(json.contains(r#""type":"error"#));
        assert!(json.contains(r#""message":"already active"#));
        assert!(json.contains(r#""code":"conflict"#));
    }
}
