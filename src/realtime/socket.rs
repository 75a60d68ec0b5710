// WebSocket endpoint streaming live events to dashboards.

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::api::extract::ApiQuery;
use crate::app::AppState;
use crate::auth::middleware::authenticate_token;
use crate::error::AppError;
use crate::realtime::hub::LiveEvent;
use crate::tenant::{resolve_scope, SiteScope};

/// Query string of `GET /api/live`. Browsers cannot set headers on a
/// WebSocket handshake, so the bearer token travels here.
#[derive(Debug, Deserialize)]
pub struct LiveQuery {
    pub token: String,
    #[serde(default)]
    pub site_id: Option<String>,
}

/// `GET /api/live`: authenticate, resolve scope once, then upgrade.
///
/// Credentials and scope are checked before the handshake.
pub async fn live_handler(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<LiveQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, AppError> {
    let user = authenticate_token(&state, &query.token).await?;
    let scope = resolve_scope(state.sites.as_ref(), &user, query.site_id.as_deref()).await?;
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };
    let events = state.hub.subscribe();

    info!(
        user_id = %user.user_id,
        subscribers = state.hub.subscriber_count(),
        "Live connection opened"
    );
    Ok(ws.on_upgrade(move |socket| serve_socket(socket, events, scope, user.user_id)))
}

/// Serialize `event` for a subscriber, or `None` if it is outside the scope.
pub fn encode_for(scope: &SiteScope, event: &LiveEvent) -> Option<String> {
    if !event.is_visible_to(scope) {
        return None;
    }
    match serde_json::to_string(event) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!("Failed to serialize live event: {e}");
            None
        }
    }
}

async fn serve_socket(
    socket: WebSocket,
    mut events: broadcast::Receiver<LiveEvent>,
    scope: SiteScope,
    user_id: String,
) {
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    warn!("WebSocket error for {user_id}: {e}");
                    break;
                }
                // Clients only listen; pings are answered by axum.
                Some(Ok(_)) => {}
            },
            received = events.recv() => match received {
                Ok(event) => {
                    let Some(text) = encode_for(&scope, &event) else {
                        continue;
                    };
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Live subscriber {user_id} lagged, skipped {skipped} events");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    debug!("Live connection closed for {user_id}");
}
