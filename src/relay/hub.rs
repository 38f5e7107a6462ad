/// Display hub - connection registry and upstream correlation
///
/// Tracks every connected display client together with the upstream request
/// ids backing its subscriptions, and routes inbound hub traffic:
/// - `event` frames fan out to each connection whose entity or event-name
///   subscription id matches
/// - `result` frames answer pending history requests
/// - a re-authentication re-issues every connection's subscriptions, since
///   ids from the previous session are dead
///
/// Subscriptions are intentionally not de-duplicated across clients: two
/// displays watching the same event each hold their own upstream id.
use crate::logger::{self, LogTag};
use crate::upstream::{InboundFrame, UpstreamConnector, UpstreamEvent, UpstreamRequest};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc, RwLock};

use super::history::fill_history_gaps;
use super::protocol::ServerFrame;

pub type ConnectionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    History,
}

#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub id: u64,
    pub kind: RequestKind,
}

/// Per-client subscription and liveness state
///
/// Mutated only by the owning connection's task and the hub's upstream
/// task, always behind the handle's lock.
#[derive(Debug, Default)]
pub struct ClientState {
    pub entity_subscription_id: Option<u64>,
    pub subscribed_entities: Vec<String>,
    pub subscribed_events: HashMap<String, u64>,
    pub pending_requests: Vec<PendingRequest>,
    pub received_ping: bool,
}

/// Shared handle to one connected client
pub struct ClientHandle {
    sender: mpsc::UnboundedSender<String>,
    pub state: Mutex<ClientState>,
    pub remote: String,
}

impl ClientHandle {
    /// Queue a protocol frame for delivery to this client
    pub fn push_frame(&self, frame: &ServerFrame) {
        match serde_json::to_string(frame) {
            Ok(text) => {
                let _ = self.sender.send(text);
            }
            Err(e) => {
                logger::error(LogTag::Relay, &format!("Failed to serialize frame: {}", e));
            }
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ClientState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

pub struct DisplayHub {
    upstream: Arc<UpstreamConnector>,
    connections: RwLock<HashMap<ConnectionId, Arc<ClientHandle>>>,
    next_conn_id: AtomicU64,
}

impl DisplayHub {
    pub fn new(upstream: Arc<UpstreamConnector>) -> Arc<Self> {
        Arc::new(Self {
            upstream,
            connections: RwLock::new(HashMap::new()),
            next_conn_id: AtomicU64::new(1),
        })
    }

    pub fn upstream(&self) -> &Arc<UpstreamConnector> {
        &self.upstream
    }

    /// Register a new client connection
    pub async fn register(
        &self,
        remote: String,
    ) -> (ConnectionId, Arc<ClientHandle>, mpsc::UnboundedReceiver<String>) {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = Arc::new(ClientHandle {
            sender: tx,
            state: Mutex::new(ClientState {
                received_ping: true,
                ..ClientState::default()
            }),
            remote,
        });

        self.connections.write().await.insert(conn_id, handle.clone());
        (conn_id, handle, rx)
    }

    /// Drop a client and release every upstream subscription it held
    pub async fn unregister(&self, conn_id: ConnectionId) {
        let handle = self.connections.write().await.remove(&conn_id);
        let Some(handle) = handle else {
            return;
        };

        let (entity_sub, event_subs) = {
            let state = handle.lock_state();
            (
                state.entity_subscription_id,
                state.subscribed_events.values().copied().collect::<Vec<_>>(),
            )
        };

        if let Some(subscription) = entity_sub {
            self.upstream
                .send(UpstreamRequest::UnsubscribeEvents { subscription });
        }
        for subscription in event_subs {
            self.upstream
                .send(UpstreamRequest::UnsubscribeEvents { subscription });
        }
    }

    /// Apply a client's `init` declaration: one subscribe call per entity
    /// set, one per event name, ids recorded against the connection
    pub fn handle_init(
        &self,
        handle: &ClientHandle,
        entities: Vec<String>,
        events: Vec<String>,
    ) {
        let entity_subscription = if entities.is_empty() {
            None
        } else {
            Some(self.upstream.send(UpstreamRequest::SubscribeEntities {
                entity_ids: entities.clone(),
            }))
        };

        let mut subscribed_events = HashMap::new();
        for event in events {
            let id = self.upstream.send(UpstreamRequest::SubscribeEvents {
                event_type: event.clone(),
            });
            subscribed_events.insert(event, id);
        }

        let mut state = handle.lock_state();
        state.entity_subscription_id = entity_subscription;
        state.subscribed_entities = entities;
        state.subscribed_events = subscribed_events;
    }

    /// Re-issue every connection's subscriptions after a reconnect;
    /// ids from the previous session are overwritten, never reused
    pub async fn resubscribe_all(&self) {
        let connections = self.connections.read().await;
        for handle in connections.values() {
            let (entities, event_names) = {
                let state = handle.lock_state();
                (
                    state.subscribed_entities.clone(),
                    state.subscribed_events.keys().cloned().collect::<Vec<_>>(),
                )
            };

            let entity_subscription = if entities.is_empty() {
                None
            } else {
                Some(
                    self.upstream
                        .send(UpstreamRequest::SubscribeEntities { entity_ids: entities }),
                )
            };

            let mut fresh_events = HashMap::new();
            for name in event_names {
                let id = self.upstream.send(UpstreamRequest::SubscribeEvents {
                    event_type: name.clone(),
                });
                fresh_events.insert(name, id);
            }

            let mut state = handle.lock_state();
            if entity_subscription.is_some() {
                state.entity_subscription_id = entity_subscription;
            }
            state.subscribed_events = fresh_events;
        }

        if !connections.is_empty() {
            logger::info(
                LogTag::Relay,
                &format!("Restored subscriptions for {} client(s)", connections.len()),
            );
        }
    }

    /// Fan an inbound event frame out to every matching connection
    pub async fn dispatch_event(&self, id: u64, event: &Value) {
        let connections = self.connections.read().await;
        for handle in connections.values() {
            let (entity_match, event_name) = {
                let state = handle.lock_state();
                (
                    state.entity_subscription_id == Some(id),
                    state
                        .subscribed_events
                        .iter()
                        .find(|(_, sub)| **sub == id)
                        .map(|(name, _)| name.clone()),
                )
            };

            if entity_match {
                if let Some((states, first_update)) = extract_state_changes(event) {
                    handle.push_frame(&ServerFrame::StateChange {
                        states,
                        first_update,
                    });
                }
            }

            if let Some(name) = event_name {
                handle.push_frame(&ServerFrame::Event {
                    name,
                    data: event.get("data").cloned().unwrap_or(Value::Null),
                });
            }
        }
    }

    /// Route a result frame to every client holding a matching pending
    /// request. History results are gap-filled once and shared.
    pub async fn dispatch_result(&self, id: u64, result: &Value) {
        let connections = self.connections.read().await;
        let mut padded: Option<Map<String, Value>> = None;

        for handle in connections.values() {
            let matched = {
                let mut state = handle.lock_state();
                match state
                    .pending_requests
                    .iter()
                    .position(|p| p.id == id && p.kind == RequestKind::History)
                {
                    Some(position) => {
                        state.pending_requests.remove(position);
                        true
                    }
                    None => false,
                }
            };

            if matched {
                let history = padded
                    .get_or_insert_with(|| fill_history_gaps(result))
                    .clone();
                handle.push_frame(&ServerFrame::History { history });
            }
        }
        // A result matching no pending request is an expected race
        // (the client disconnected first) and is dropped silently.
    }

    /// Pump the upstream event stream into the hub
    pub fn spawn_upstream_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let hub = self.clone();
        tokio::spawn(async move {
            let mut events = hub.upstream.subscribe();
            loop {
                match events.recv().await {
                    Ok(UpstreamEvent::Authenticated) => hub.resubscribe_all().await,
                    Ok(UpstreamEvent::Frame(InboundFrame::Event { id, event })) => {
                        hub.dispatch_event(id, &event).await;
                    }
                    Ok(UpstreamEvent::Frame(InboundFrame::Result { id, result })) => {
                        if let Some(result) = result {
                            hub.dispatch_result(id, &result).await;
                        }
                    }
                    Ok(UpstreamEvent::Frame(_)) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        logger::warning(
                            LogTag::Relay,
                            &format!("Upstream event stream lagged, {} frame(s) skipped", skipped),
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    pub async fn active_connections(&self) -> usize {
        self.connections.read().await.len()
    }
}

/// Normalize an entity event payload to `entity_id -> latest state`
///
/// `a` carries a full snapshot, `c` an incremental change map whose values
/// may be wrapped under a `+` key. Entries with a falsy state are dropped
/// unless the entity id has the always-forward `automation` prefix.
/// Returns None when nothing survives filtering.
fn extract_state_changes(event: &Value) -> Option<(Map<String, Value>, bool)> {
    let (map, first_update) = match (event.get("a"), event.get("c")) {
        (Some(Value::Object(full)), _) => (full, true),
        (None, Some(Value::Object(changes))) => (changes, false),
        _ => return None,
    };

    let mut states = Map::new();
    for (entity_id, state) in map {
        let state = state.get("+").unwrap_or(state);
        if is_truthy(state.get("s")) || entity_id.starts_with("automation") {
            states.insert(entity_id.clone(), state.clone());
        }
    }

    if states.is_empty() {
        None
    } else {
        Some((states, first_update))
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(_) => true,
    }
}
