/// Wire frames for the hub's WebSocket protocol
///
/// Requests carry a monotonic `id` injected by the connector at send time;
/// the auth handshake frame is the one exception and is sent without an id.
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outbound request frames (before id injection)
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpstreamRequest {
    Ping,
    SubscribeEntities {
        entity_ids: Vec<String>,
    },
    SubscribeEvents {
        event_type: String,
    },
    UnsubscribeEvents {
        subscription: u64,
    },
    CallService {
        domain: String,
        service: String,
        target: ServiceTarget,
        service_data: Value,
    },
    FireEvent {
        event_type: String,
        event_data: Value,
    },
    #[serde(rename = "recorder/statistics_during_period")]
    StatisticsDuringPeriod {
        start_time: String,
        period: String,
        types: Vec<String>,
        statistic_ids: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceTarget {
    pub entity_id: String,
}

/// The auth handshake frame, sent verbatim (no request id)
pub fn auth_frame(access_token: &str) -> String {
    serde_json::json!({
        "type": "auth",
        "access_token": access_token,
    })
    .to_string()
}

/// Inbound frames
///
/// `auth_*` and pong frames are protocol-internal and consumed by the
/// connector; `event` and `result` are broadcast to subscribers. Anything
/// that fails to decode is discarded without tearing the connection down.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    AuthRequired {
        #[serde(default)]
        ha_version: Option<String>,
    },
    AuthOk {
        #[serde(default)]
        ha_version: Option<String>,
    },
    AuthInvalid {
        #[serde(default)]
        message: Option<String>,
    },
    Pong {
        #[serde(default)]
        id: Option<u64>,
    },
    Event {
        id: u64,
        event: Value,
    },
    Result {
        id: u64,
        #[serde(default)]
        result: Option<Value>,
    },
}

/// Typed event stream the connector exposes to its subscribers
#[derive(Debug, Clone)]
pub enum UpstreamEvent {
    /// The session (re-)authenticated; prior request ids are now dead
    Authenticated,
    /// A decoded frame that was not consumed by protocol handling
    Frame(InboundFrame),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_entities_shape() {
        let json = serde_json::to_value(UpstreamRequest::SubscribeEntities {
            entity_ids: vec!["sensor.hallway".to_string()],
        })
        .unwrap();
        assert_eq!(json["type"], "subscribe_entities");
        assert_eq!(json["entity_ids"][0], "sensor.hallway");
    }

    #[test]
    fn test_statistics_request_type_string() {
        let json = serde_json::to_value(UpstreamRequest::StatisticsDuringPeriod {
            start_time: "2024-01-01T00:00:00Z".to_string(),
            period: "hour".to_string(),
            types: vec!["mean".to_string()],
            statistic_ids: vec!["sensor.power".to_string()],
        })
        .unwrap();
        assert_eq!(json["type"], "recorder/statistics_during_period");
        assert_eq!(json["period"], "hour");
    }

    #[test]
    fn test_auth_frame_has_no_id() {
        let frame: Value = serde_json::from_str(&auth_frame("token123")).unwrap();
        assert_eq!(frame["type"], "auth");
        assert_eq!(frame["access_token"], "token123");
        assert!(frame.get("id").is_none());
    }

    #[test]
    fn test_inbound_auth_ok_tolerates_extra_fields() {
        let frame: InboundFrame =
            serde_json::from_str(r#"{"type":"auth_ok","ha_version":"2024.1"}"#).unwrap();
        assert!(matches!(frame, InboundFrame::AuthOk { .. }));
    }

    #[test]
    fn test_inbound_event_parse() {
        let frame: InboundFrame =
            serde_json::from_str(r#"{"type":"event","id":7,"event":{"a":{}}}"#).unwrap();
        match frame {
            InboundFrame::Event { id, event } => {
                assert_eq!(id, 7);
                assert!(event.get("a").is_some());
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_frame_type_fails_decode() {
        assert!(serde_json::from_str::<InboundFrame>(r#"{"type":"mystery"}"#).is_err());
    }
}
