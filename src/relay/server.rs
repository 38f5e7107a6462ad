/// Axum server for display client connections
///
/// Serves WebSocket upgrades only. When an access token is configured,
/// upgrade requests must carry `?accessToken=<token>` and anything else is
/// rejected with 401 before the handshake.
use axum::{
    extract::{
        ws::WebSocketUpgrade,
        ConnectInfo, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use crate::config::DisplayConfig;
use crate::logger::{self, LogTag};
use crate::relay::connection::handle_connection;
use crate::relay::hub::DisplayHub;

/// Global shutdown notifier
static SHUTDOWN_NOTIFY: Lazy<Arc<Notify>> = Lazy::new(|| Arc::new(Notify::new()));

/// Trigger server shutdown
pub fn shutdown() {
    SHUTDOWN_NOTIFY.notify_one();
}

#[derive(Clone)]
struct AppState {
    hub: Arc<DisplayHub>,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthQuery {
    #[serde(rename = "accessToken", default)]
    access_token: Option<String>,
}

/// Bind the listen socket; a failure here is a module start error
pub async fn bind(config: &DisplayConfig) -> Result<TcpListener, String> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid bind address: {}", e))?;
    TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))
}

/// Serve display connections until shutdown is triggered
pub async fn serve(
    listener: TcpListener,
    hub: Arc<DisplayHub>,
    access_token: Option<String>,
) -> Result<(), String> {
    let state = AppState { hub, access_token };
    let app = Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let shutdown_signal = async {
        SHUTDOWN_NOTIFY.notified().await;
        logger::debug(LogTag::Relay, "Received shutdown signal, stopping server");
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await
    .map_err(|e| format!("Server error: {}", e))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<AuthQuery>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    if let Some(expected) = &state.access_token {
        if query.access_token.as_deref() != Some(expected.as_str()) {
            logger::warning(
                LogTag::Relay,
                &format!("Rejected unauthorized connection from {}", remote),
            );
            return (StatusCode::UNAUTHORIZED, "401 Unauthorized").into_response();
        }
    }

    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| handle_connection(socket, remote.to_string(), hub))
}
