/// Per-client WebSocket connection handling
///
/// One task per accepted socket. The select loop multiplexes three sources:
/// frames queued by the hub for this client, frames arriving from the
/// client, and the passive liveness check. The client proves liveness by
/// sending the literal text `ping` inside each window; the server answers
/// `pong` immediately and closes clients that stay silent.
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant};

use crate::arguments::is_debug_relay_enabled;
use crate::config;
use crate::logger::{self, LogTag};
use crate::relay::calendar;
use crate::relay::hub::{ClientHandle, DisplayHub, PendingRequest, RequestKind};
use crate::relay::protocol::{ClientRequest, ServerFrame, DEFAULT_SERVICE_DOMAIN};
use crate::upstream::{ServiceTarget, UpstreamRequest};
use chrono::{SecondsFormat, Utc};

pub async fn handle_connection(socket: WebSocket, remote: String, hub: Arc<DisplayHub>) {
    let (conn_id, handle, mut outbound) = hub.register(remote.clone()).await;
    logger::info(LogTag::Relay, &format!("Connection from {}", remote));

    let (mut ws_tx, mut ws_rx) = socket.split();
    let window =
        Duration::from_secs(config::with_config(|c| c.display.client_timeout_secs).max(1));
    let mut liveness = interval_at(Instant::now() + window, window);

    loop {
        tokio::select! {
            biased;

            // Frames the hub queued for this client
            Some(text) = outbound.recv() => {
                if ws_tx.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }

            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if text == "ping" {
                            handle_keepalive(&handle);
                            if ws_tx.send(Message::Text("pong".to_string())).await.is_err() {
                                break;
                            }
                            continue;
                        }
                        handle_client_request(&hub, &handle, &text);
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // transport-level ping/pong, binary
                    Some(Err(e)) => {
                        logger::warning(
                            LogTag::Relay,
                            &format!("Client {}: websocket error: {}", remote, e),
                        );
                        break;
                    }
                }
            }

            _ = liveness.tick() => {
                let alive = {
                    let mut state = handle.state.lock().unwrap_or_else(|p| p.into_inner());
                    std::mem::replace(&mut state.received_ping, false)
                };
                if !alive {
                    logger::info(LogTag::Relay, &format!("Client {} timed out", remote));
                    break;
                }
            }
        }
    }

    hub.unregister(conn_id).await;
    logger::info(LogTag::Relay, &format!("Client {} disconnected", remote));
}

fn handle_keepalive(handle: &ClientHandle) {
    let mut state = handle.state.lock().unwrap_or_else(|p| p.into_inner());
    state.received_ping = true;
}

/// Decode and dispatch one client JSON frame
fn handle_client_request(hub: &Arc<DisplayHub>, handle: &Arc<ClientHandle>, text: &str) {
    let request = match serde_json::from_str::<ClientRequest>(text) {
        Ok(request) => request,
        Err(e) => {
            // Malformed frame: discard, keep the connection
            if is_debug_relay_enabled() {
                logger::debug(
                    LogTag::Relay,
                    &format!("Discarding invalid client frame: {} ({})", text, e),
                );
            }
            return;
        }
    };

    match request {
        ClientRequest::Init {
            subscribe_entities,
            subscribe_events,
        } => {
            if is_debug_relay_enabled() {
                logger::debug(
                    LogTag::Relay,
                    &format!(
                        "Client {} init ({} entities, {} events)",
                        handle.remote,
                        subscribe_entities.len(),
                        subscribe_events.len()
                    ),
                );
            }
            hub.handle_init(handle, subscribe_entities, subscribe_events);
        }

        ClientRequest::CallService {
            domain,
            service,
            entity_id,
            data,
        } => {
            hub.upstream().send(UpstreamRequest::CallService {
                domain: domain.unwrap_or_else(|| DEFAULT_SERVICE_DOMAIN.to_string()),
                service,
                target: ServiceTarget { entity_id },
                service_data: data,
            });
        }

        ClientRequest::FireEvent { name, data } => {
            hub.upstream().send(UpstreamRequest::FireEvent {
                event_type: name,
                event_data: data,
            });
        }

        ClientRequest::FetchHistory { entity_id, days } => {
            // The wire field is named "days" but counts hours (display
            // compatibility); default window is the last 24 hours.
            let start = Utc::now() - chrono::Duration::hours(days.unwrap_or(24));
            let id = hub.upstream().send(UpstreamRequest::StatisticsDuringPeriod {
                start_time: start.to_rfc3339_opts(SecondsFormat::Millis, true),
                period: "hour".to_string(),
                types: vec!["mean".to_string()],
                statistic_ids: vec![entity_id],
            });

            let mut state = handle.state.lock().unwrap_or_else(|p| p.into_inner());
            state.pending_requests.push(PendingRequest {
                id,
                kind: RequestKind::History,
            });
        }

        ClientRequest::FetchCalendars { calendars, days } => {
            // Runs on its own task so a slow hub cannot stall the
            // connection's liveness window
            let upstream = hub.upstream().clone();
            let handle = handle.clone();
            tokio::spawn(async move {
                match calendar::fetch_calendar_events(&upstream, &calendars, days.unwrap_or(7))
                    .await
                {
                    Ok(events) => handle.push_frame(&ServerFrame::Calendars { events }),
                    Err(e) => logger::error(
                        LogTag::Relay,
                        &format!("Error updating calendars: {}", e),
                    ),
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubConfig;
    use crate::upstream::UpstreamConnector;
    use serde_json::Value;
    use tokio::sync::mpsc;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    fn test_hub() -> (Arc<DisplayHub>, mpsc::UnboundedReceiver<WsMessage>) {
        let connector = Arc::new(
            UpstreamConnector::new(HubConfig {
                url: "http://hub.local:8123".to_string(),
                access_token: Some("token".to_string()),
                ..HubConfig::default()
            })
            .unwrap(),
        );
        let (tx, rx) = mpsc::unbounded_channel();
        connector.install_session(tx);
        (DisplayHub::new(connector), rx)
    }

    fn sent_frames(rx: &mut mpsc::UnboundedReceiver<WsMessage>) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(WsMessage::Text(text)) = rx.try_recv() {
            frames.push(serde_json::from_str(&text).unwrap());
        }
        frames
    }

    #[tokio::test]
    async fn test_init_request_populates_state() {
        let (hub, mut sent) = test_hub();
        let (_id, handle, _rx) = hub.register("test".to_string()).await;

        handle_client_request(
            &hub,
            &handle,
            r#"{"type":"init","subscribeEntities":["sensor.a"],"subscribeEvents":["refresh"]}"#,
        );

        let state = handle.state.lock().unwrap();
        assert!(state.entity_subscription_id.is_some());
        assert!(state.subscribed_events.contains_key("refresh"));
        assert_eq!(sent_frames(&mut sent).len(), 2);
    }

    #[tokio::test]
    async fn test_call_service_applies_default_domain() {
        let (hub, mut sent) = test_hub();
        let (_id, handle, _rx) = hub.register("test".to_string()).await;

        handle_client_request(
            &hub,
            &handle,
            r#"{"type":"call_service","service":"toggle","entityId":"switch.desk","data":{"x":1}}"#,
        );

        let frames = sent_frames(&mut sent);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "call_service");
        assert_eq!(frames[0]["domain"], "homeassistant");
        assert_eq!(frames[0]["target"]["entity_id"], "switch.desk");
        assert_eq!(frames[0]["service_data"]["x"], 1);
    }

    #[tokio::test]
    async fn test_fire_event_remaps_fields() {
        let (hub, mut sent) = test_hub();
        let (_id, handle, _rx) = hub.register("test".to_string()).await;

        handle_client_request(
            &hub,
            &handle,
            r#"{"type":"fire_event","name":"display_sleep","data":{"screen":1}}"#,
        );

        let frames = sent_frames(&mut sent);
        assert_eq!(frames[0]["type"], "fire_event");
        assert_eq!(frames[0]["event_type"], "display_sleep");
        assert_eq!(frames[0]["event_data"]["screen"], 1);
    }

    #[tokio::test]
    async fn test_fetch_history_records_pending_request() {
        let (hub, mut sent) = test_hub();
        let (_id, handle, _rx) = hub.register("test".to_string()).await;

        handle_client_request(
            &hub,
            &handle,
            r#"{"type":"fetch_history","entityId":"sensor.power"}"#,
        );

        let frames = sent_frames(&mut sent);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "recorder/statistics_during_period");
        assert_eq!(frames[0]["period"], "hour");
        assert_eq!(frames[0]["statistic_ids"][0], "sensor.power");

        let state = handle.state.lock().unwrap();
        assert_eq!(state.pending_requests.len(), 1);
        assert_eq!(state.pending_requests[0].kind, RequestKind::History);
        assert_eq!(frames[0]["id"].as_u64(), Some(state.pending_requests[0].id));
    }

    #[tokio::test]
    async fn test_malformed_request_discarded() {
        let (hub, mut sent) = test_hub();
        let (_id, handle, _rx) = hub.register("test".to_string()).await;

        handle_client_request(&hub, &handle, "{not json");
        handle_client_request(&hub, &handle, r#"{"type":"unknown_request"}"#);

        assert!(sent_frames(&mut sent).is_empty());
        assert!(handle.state.lock().unwrap().pending_requests.is_empty());
    }
}
