/// Downstream display protocol
///
/// One JSON text frame per message, `type`-discriminated. Field names stay
/// camelCase for wire compatibility with the deployed display clients.
/// The liveness exchange (literal `ping`/`pong` text) happens before JSON
/// parsing and is not part of these enums.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Service domain applied when a client omits one
pub const DEFAULT_SERVICE_DOMAIN: &str = "homeassistant";

/// Client → server requests
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientRequest {
    /// Declare the entity ids and event names this client wants
    Init {
        #[serde(default)]
        subscribe_entities: Vec<String>,
        #[serde(default)]
        subscribe_events: Vec<String>,
    },

    /// Fire-and-forget service invocation
    CallService {
        #[serde(default)]
        domain: Option<String>,
        service: String,
        entity_id: String,
        #[serde(default)]
        data: Value,
    },

    /// Fire-and-forget event on the hub's bus
    FireEvent {
        name: String,
        #[serde(default)]
        data: Value,
    },

    /// Hourly statistics for one entity; `days` counts hours (default 24)
    FetchHistory {
        entity_id: String,
        #[serde(default)]
        days: Option<i64>,
    },

    /// Upcoming events from the named calendars (default window: 7 days)
    FetchCalendars {
        calendars: Vec<String>,
        #[serde(default)]
        days: Option<i64>,
    },
}

/// Server → client frames
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerFrame {
    StateChange {
        states: Map<String, Value>,
        first_update: bool,
    },
    Event {
        name: String,
        data: Value,
    },
    History {
        history: Map<String, Value>,
    },
    Calendars {
        events: Vec<Value>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_parse_camel_case() {
        let request: ClientRequest = serde_json::from_str(
            r#"{"type":"init","subscribeEntities":["sensor.a"],"subscribeEvents":["refresh"]}"#,
        )
        .unwrap();
        match request {
            ClientRequest::Init {
                subscribe_entities,
                subscribe_events,
            } => {
                assert_eq!(subscribe_entities, vec!["sensor.a"]);
                assert_eq!(subscribe_events, vec!["refresh"]);
            }
            other => panic!("unexpected request: {:?}", other),
        }
    }

    #[test]
    fn test_call_service_optional_domain() {
        let request: ClientRequest = serde_json::from_str(
            r#"{"type":"call_service","service":"toggle","entityId":"switch.desk","data":{}}"#,
        )
        .unwrap();
        match request {
            ClientRequest::CallService {
                domain, entity_id, ..
            } => {
                assert!(domain.is_none());
                assert_eq!(entity_id, "switch.desk");
            }
            other => panic!("unexpected request: {:?}", other),
        }
    }

    #[test]
    fn test_fetch_history_defaults() {
        let request: ClientRequest =
            serde_json::from_str(r#"{"type":"fetch_history","entityId":"sensor.power"}"#).unwrap();
        match request {
            ClientRequest::FetchHistory { entity_id, days } => {
                assert_eq!(entity_id, "sensor.power");
                assert!(days.is_none());
            }
            other => panic!("unexpected request: {:?}", other),
        }
    }

    #[test]
    fn test_state_change_serialization() {
        let mut states = Map::new();
        states.insert("sensor.a".to_string(), serde_json::json!({"s": "on"}));
        let json = serde_json::to_value(ServerFrame::StateChange {
            states,
            first_update: true,
        })
        .unwrap();
        assert_eq!(json["type"], "state_change");
        assert_eq!(json["firstUpdate"], true);
        assert_eq!(json["states"]["sensor.a"]["s"], "on");
    }
}
