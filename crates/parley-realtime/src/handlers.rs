use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use parley_core::WidgetSession;
use tokio::sync::broadcast;
use tracing::warn;

use crate::events::ChatEvent;
use crate::notifier::ChannelNotifier;

pub struct AppState {
    pub notifier: Arc<ChannelNotifier>,
}

/// Dashboard stream of all chat events for a tenant
async fn tenant_stream(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<i32>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let rx = state.notifier.subscribe_tenant(tenant_id);
    ws.on_upgrade(move |socket| forward_events(socket, rx))
}

/// Direct assignment alerts for one agent
async fn agent_stream(
    State(state): State<Arc<AppState>>,
    Path((tenant_id, agent_id)): Path<(i32, i32)>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let rx = state.notifier.subscribe_agent(tenant_id, agent_id);
    ws.on_upgrade(move |socket| forward_events(socket, rx))
}

/// Widget-side stream, authenticated by the widget session token
/// (passed as a `token` query parameter on the upgrade request)
async fn widget_stream(
    State(state): State<Arc<AppState>>,
    WidgetSession(claims): WidgetSession,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let rx = state
        .notifier
        .subscribe_visitor(claims.tenant_id, &claims.visitor_id);
    ws.on_upgrade(move |socket| forward_events(socket, rx))
}

/// Serialize events onto the socket until either side goes away.
/// A lagged receiver skips ahead; clients re-fetch state on reconnect.
async fn forward_events(mut socket: WebSocket, mut rx: broadcast::Receiver<ChatEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                let Ok(text) = serde_json::to_string(&event) else {
                    continue;
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("realtime subscriber lagged, skipped {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

pub fn configure_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/realtime/tenants/{tenant_id}/ws", get(tenant_stream))
        .route(
            "/realtime/tenants/{tenant_id}/agents/{agent_id}/ws",
            get(agent_stream),
        )
        .route("/widget/realtime/ws", get(widget_stream))
}
