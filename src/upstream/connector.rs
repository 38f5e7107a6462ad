/// The single upstream hub connection
///
/// Owns the WebSocket session to the hub: auth handshake, heartbeat with
/// pong-timeout detection, fixed-delay reconnect and monotonic request-id
/// issuance. Inbound frames that survive protocol handling are broadcast
/// to subscribers as typed `UpstreamEvent`s.
///
/// `send()` transmits only while a session is open and silently drops
/// otherwise; there is no queueing. Callers that need delivery re-issue
/// their requests when `UpstreamEvent::Authenticated` arrives.
use crate::arguments::is_debug_upstream_enabled;
use crate::config::HubConfig;
use crate::logger::{self, LogTag};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::message::{auth_frame, InboundFrame, UpstreamEvent, UpstreamRequest};

/// Broadcast buffer for inbound frames; slow subscribers see a lag error
/// rather than blocking the session.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
pub struct UpstreamConnector {
    config: HubConfig,
    ws_url: String,

    /// Shared monotonic request-id counter; survives reconnects
    message_id: AtomicU64,

    /// Writer handle of the currently open session, if any
    session: Mutex<Option<mpsc::UnboundedSender<Message>>>,

    authenticated: AtomicBool,
    received_pong: AtomicBool,

    /// Latched on a failed auth handshake; no further reconnect attempts
    auth_failed: AtomicBool,

    /// Guards against a second concurrent connect loop
    connecting: AtomicBool,

    events: broadcast::Sender<UpstreamEvent>,
    http: reqwest::Client,
}

impl UpstreamConnector {
    pub fn new(config: HubConfig) -> Result<Self, String> {
        if config.url.is_empty() {
            return Err("WebSocket url not specified".to_string());
        }
        let ws_url = derive_ws_url(&config.url)?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            config,
            ws_url,
            message_id: AtomicU64::new(1),
            session: Mutex::new(None),
            authenticated: AtomicBool::new(false),
            received_pong: AtomicBool::new(false),
            auth_failed: AtomicBool::new(false),
            connecting: AtomicBool::new(false),
            events,
            http: reqwest::Client::new(),
        })
    }

    /// Establish the connection and keep it alive
    ///
    /// Idempotent: calling while a connect loop is already active does
    /// nothing. After an auth failure the connector stays down (a retry
    /// cannot succeed without a configuration change).
    pub fn connect(self: &Arc<Self>) {
        if self.auth_failed.load(Ordering::SeqCst) {
            logger::warning(
                LogTag::Upstream,
                "Not reconnecting after authentication failure",
            );
            return;
        }
        if !self.try_begin_connect() {
            logger::debug(LogTag::Upstream, "Connection attempt already active");
            return;
        }

        let connector = self.clone();
        tokio::spawn(async move {
            connector.run_loop().await;
        });
    }

    /// Claim the single connect slot. Returns false when a loop is active.
    pub(crate) fn try_begin_connect(&self) -> bool {
        !self.connecting.swap(true, Ordering::SeqCst)
    }

    async fn run_loop(&self) {
        loop {
            match self.run_session().await {
                Ok(()) => logger::info(LogTag::Upstream, "Connection closed"),
                Err(e) => logger::error(LogTag::Upstream, &format!("Connection error: {}", e)),
            }
            self.clear_session();

            if self.auth_failed.load(Ordering::SeqCst) {
                logger::error(
                    LogTag::Upstream,
                    "Giving up: authentication cannot succeed without a configuration change",
                );
                break;
            }

            tokio::time::sleep(Duration::from_secs(self.config.reconnect_delay_secs)).await;
        }
        self.connecting.store(false, Ordering::SeqCst);
    }

    /// One connection lifetime: connect, pump frames, heartbeat
    async fn run_session(&self) -> Result<(), String> {
        let (ws_stream, _) = connect_async(self.ws_url.as_str())
            .await
            .map_err(|e| format!("Failed to connect to {}: {}", self.ws_url, e))?;
        logger::info(
            LogTag::Upstream,
            &format!("Connecting to {}", self.ws_url),
        );

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        self.install_session(out_tx);

        let mut heartbeat =
            tokio::time::interval(Duration::from_secs(self.config.heartbeat_secs));
        heartbeat.tick().await; // first tick completes immediately

        loop {
            tokio::select! {
                Some(outgoing) = out_rx.recv() => {
                    if let Err(e) = ws_tx.send(outgoing).await {
                        return Err(format!("Send failed: {}", e));
                    }
                }

                incoming = ws_rx.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => self.handle_text(&text)?,
                        Some(Ok(Message::Close(_))) | None => return Ok(()),
                        Some(Ok(_)) => {} // binary and transport ping/pong
                        Some(Err(e)) => return Err(format!("WebSocket error: {}", e)),
                    }
                }

                _ = heartbeat.tick() => {
                    if self.authenticated.load(Ordering::SeqCst) {
                        if !self.received_pong.swap(false, Ordering::SeqCst) {
                            return Err("WebSocket connection timed out".to_string());
                        }
                        self.send(UpstreamRequest::Ping);
                    }
                }
            }
        }
    }

    /// Decode one inbound text frame. An Err return ends the session.
    fn handle_text(&self, text: &str) -> Result<(), String> {
        // The hub may answer pings with a bare text pong
        if text == "pong" {
            self.received_pong.store(true, Ordering::SeqCst);
            return Ok(());
        }

        let frame = match serde_json::from_str::<InboundFrame>(text) {
            Ok(frame) => frame,
            Err(_) => {
                if is_debug_upstream_enabled() {
                    logger::debug(
                        LogTag::Upstream,
                        &format!("Discarding undecodable frame: {}", text),
                    );
                }
                return Ok(());
            }
        };

        match frame {
            InboundFrame::AuthRequired { .. } => match &self.config.access_token {
                Some(token) => {
                    self.send_raw(auth_frame(token));
                    Ok(())
                }
                None => {
                    self.auth_failed.store(true, Ordering::SeqCst);
                    Err("Auth required, but no access token configured".to_string())
                }
            },
            InboundFrame::AuthInvalid { message } => {
                self.auth_failed.store(true, Ordering::SeqCst);
                Err(format!(
                    "Authentication rejected: {}",
                    message.unwrap_or_else(|| "no reason given".to_string())
                ))
            }
            InboundFrame::AuthOk { .. } => {
                self.authenticated.store(true, Ordering::SeqCst);
                self.received_pong.store(true, Ordering::SeqCst);
                logger::info(LogTag::Upstream, "Successfully authenticated");
                let _ = self.events.send(UpstreamEvent::Authenticated);
                Ok(())
            }
            InboundFrame::Pong { .. } => {
                self.received_pong.store(true, Ordering::SeqCst);
                Ok(())
            }
            frame @ (InboundFrame::Event { .. } | InboundFrame::Result { .. }) => {
                let _ = self.events.send(UpstreamEvent::Frame(frame));
                Ok(())
            }
        }
    }

    /// Issue the next request id, attach it and transmit
    ///
    /// The id is issued and returned even when the socket is closed; the
    /// frame itself is dropped in that case.
    pub fn send(&self, request: UpstreamRequest) -> u64 {
        let id = self.message_id.fetch_add(1, Ordering::SeqCst);

        let mut value = match serde_json::to_value(&request) {
            Ok(value) => value,
            Err(e) => {
                logger::error(
                    LogTag::Upstream,
                    &format!("Failed to serialize request: {}", e),
                );
                return id;
            }
        };
        if let serde_json::Value::Object(map) = &mut value {
            map.insert("id".to_string(), serde_json::json!(id));
        }

        self.send_raw(value.to_string());
        id
    }

    fn send_raw(&self, text: String) {
        let session = match self.session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match session.as_ref() {
            Some(tx) => {
                if is_debug_upstream_enabled() {
                    logger::debug(LogTag::Upstream, &format!("-> {}", text));
                }
                let _ = tx.send(Message::Text(text));
            }
            None => {
                if is_debug_upstream_enabled() {
                    logger::debug(
                        LogTag::Upstream,
                        "Dropping outbound frame, socket not open",
                    );
                }
            }
        }
    }

    /// Subscribe to the typed event stream; drop the receiver to unsubscribe
    pub fn subscribe(&self) -> broadcast::Receiver<UpstreamEvent> {
        self.events.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    pub(crate) fn install_session(&self, tx: mpsc::UnboundedSender<Message>) {
        match self.session.lock() {
            Ok(mut guard) => *guard = Some(tx),
            Err(poisoned) => *poisoned.into_inner() = Some(tx),
        }
    }

    pub(crate) fn clear_session(&self) {
        self.authenticated.store(false, Ordering::SeqCst);
        match self.session.lock() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }

    pub(crate) fn hub_config(&self) -> &HubConfig {
        &self.config
    }

    pub(crate) fn http_client(&self) -> &reqwest::Client {
        &self.http
    }
}

/// Derive the WebSocket endpoint from the configured base url
fn derive_ws_url(base: &str) -> Result<String, String> {
    let mut url =
        url::Url::parse(base).map_err(|e| format!("Invalid hub url '{}': {}", base, e))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(format!("Unsupported hub url scheme '{}'", other)),
    };
    url.set_scheme(scheme)
        .map_err(|_| format!("Invalid hub url '{}'", base))?;
    Ok(format!(
        "{}/api/websocket",
        url.as_str().trim_end_matches('/')
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_connector() -> UpstreamConnector {
        UpstreamConnector::new(HubConfig {
            url: "http://hub.local:8123".to_string(),
            access_token: Some("token".to_string()),
            ..HubConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_missing_url_rejected() {
        let err = UpstreamConnector::new(HubConfig::default()).unwrap_err();
        assert!(err.contains("url"));
    }

    #[test]
    fn test_ws_url_derivation() {
        assert_eq!(
            derive_ws_url("http://hub.local:8123").unwrap(),
            "ws://hub.local:8123/api/websocket"
        );
        assert_eq!(
            derive_ws_url("https://hub.example/").unwrap(),
            "wss://hub.example/api/websocket"
        );
        assert!(derive_ws_url("ftp://hub.local").is_err());
    }

    #[test]
    fn test_ids_monotonic_across_sessions() {
        let connector = test_connector();

        // No session: frames drop, ids still advance
        let first = connector.send(UpstreamRequest::Ping);
        let second = connector.send(UpstreamRequest::Ping);
        assert!(second > first);

        // Session replacement does not reset the counter
        let (tx, _rx) = mpsc::unbounded_channel();
        connector.install_session(tx);
        let third = connector.send(UpstreamRequest::Ping);
        connector.clear_session();
        let fourth = connector.send(UpstreamRequest::Ping);
        assert!(third > second);
        assert!(fourth > third);
    }

    #[test]
    fn test_send_injects_id_and_transmits() {
        let connector = test_connector();
        let (tx, mut rx) = mpsc::unbounded_channel();
        connector.install_session(tx);

        let id = connector.send(UpstreamRequest::SubscribeEvents {
            event_type: "display_update".to_string(),
        });

        let sent = match rx.try_recv().unwrap() {
            Message::Text(text) => serde_json::from_str::<serde_json::Value>(&text).unwrap(),
            other => panic!("unexpected message: {:?}", other),
        };
        assert_eq!(sent["type"], "subscribe_events");
        assert_eq!(sent["id"], id);
    }

    #[test]
    fn test_connect_guard_single_attempt() {
        let connector = test_connector();
        assert!(connector.try_begin_connect());
        assert!(!connector.try_begin_connect());
    }

    #[test]
    fn test_auth_required_without_token_is_fatal() {
        let connector = UpstreamConnector::new(HubConfig {
            url: "http://hub.local:8123".to_string(),
            access_token: None,
            ..HubConfig::default()
        })
        .unwrap();

        let err = connector
            .handle_text(r#"{"type":"auth_required"}"#)
            .unwrap_err();
        assert!(err.contains("no access token"));
        assert!(connector.auth_failed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_auth_flow_broadcasts_authenticated() {
        let connector = test_connector();
        let (tx, mut out) = mpsc::unbounded_channel();
        connector.install_session(tx);
        let mut events = connector.subscribe();

        connector.handle_text(r#"{"type":"auth_required"}"#).unwrap();
        let auth = match out.try_recv().unwrap() {
            Message::Text(text) => serde_json::from_str::<serde_json::Value>(&text).unwrap(),
            other => panic!("unexpected message: {:?}", other),
        };
        assert_eq!(auth["type"], "auth");
        assert_eq!(auth["access_token"], "token");

        connector.handle_text(r#"{"type":"auth_ok"}"#).unwrap();
        assert!(connector.is_authenticated());
        assert!(matches!(
            events.try_recv().unwrap(),
            UpstreamEvent::Authenticated
        ));
    }

    #[test]
    fn test_pong_variants_consumed() {
        let connector = test_connector();
        let mut events = connector.subscribe();

        connector.received_pong.store(false, Ordering::SeqCst);
        connector.handle_text("pong").unwrap();
        assert!(connector.received_pong.load(Ordering::SeqCst));

        connector.received_pong.store(false, Ordering::SeqCst);
        connector.handle_text(r#"{"type":"pong","id":3}"#).unwrap();
        assert!(connector.received_pong.load(Ordering::SeqCst));

        // Neither form reaches subscribers
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_undecodable_frame_discarded() {
        let connector = test_connector();
        let mut events = connector.subscribe();
        connector.handle_text("{not json").unwrap();
        connector.handle_text(r#"{"type":"mystery"}"#).unwrap();
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_event_frames_reach_subscribers() {
        let connector = test_connector();
        let mut events = connector.subscribe();
        connector
            .handle_text(r#"{"type":"event","id":42,"event":{"c":{}}}"#)
            .unwrap();
        match events.try_recv().unwrap() {
            UpstreamEvent::Frame(InboundFrame::Event { id, .. }) => assert_eq!(id, 42),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
