//! Realtime push over WebSocket.
//!
//! `GET /api/v1/ws` with a bearer token in the `Authorization` header or the
//! `token` query parameter (browsers cannot set headers on WebSocket
//! requests). The socket joins `user-<id>`, and admins also join `admin`.
//! Every frame is a JSON [`RealtimeMessage`].

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;
use tokio::time::Duration;

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::notifications::{user_room, RealtimeHub, RealtimeMessage, ADMIN_ROOM};
use crate::AppState;

const PING_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Default, Deserialize)]
pub struct WsAuthQuery {
    token: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/ws", get(realtime_ws))
}

fn request_token(headers: &HeaderMap, query: &WsAuthQuery) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .or_else(|| query.token.clone().filter(|token| !token.is_empty()))
}

/// Rooms a caller joins on connect
pub fn rooms_for(user: &AuthUser) -> Vec<String> {
    let mut rooms = vec![user_room(user.user_id)];
    if user.is_admin() {
        rooms.push(ADMIN_ROOM.to_string());
    }
    rooms
}

pub async fn realtime_ws(
    State(state): State<AppState>,
    Query(query): Query<WsAuthQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ServiceError> {
    let token = request_token(&headers, &query)
        .ok_or_else(|| ServiceError::Unauthorized("Missing bearer token".to_string()))?;
    let user = state.jwt_keys.verify(&token).map_err(|e| {
        tracing::debug!(error = %e, "WebSocket token rejected");
        e
    })?;

    let hub = state.hub.clone();
    Ok(ws.on_upgrade(move |socket| realtime_session(socket, hub, user)))
}

/// Waits on an optional room subscription; never resolves without one
async fn recv_room(
    rx: &mut Option<broadcast::Receiver<RealtimeMessage>>,
) -> Result<RealtimeMessage, broadcast::error::RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn send_message(
    sink: &mut SplitSink<WebSocket, Message>,
    message: &RealtimeMessage,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(message).map_err(axum::Error::new)?;
    sink.send(Message::Text(text)).await
}

async fn realtime_session(socket: WebSocket, hub: RealtimeHub, user: AuthUser) {
    let (mut sink, mut stream) = socket.split();
    let rooms = rooms_for(&user);

    let mut user_rx = hub.subscribe(&user_room(user.user_id));
    let mut admin_rx = user.is_admin().then(|| hub.subscribe(ADMIN_ROOM));

    tracing::info!(user_id = user.user_id, ?rooms, "Realtime socket connected");
    metrics::counter!("school_store_realtime_connections", 1);

    let ready = RealtimeMessage::new("ready", json!({ "user_id": user.user_id, "rooms": rooms }));
    if send_message(&mut sink, &ready).await.is_err() {
        return;
    }

    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.tick().await;

    loop {
        let delivery = tokio::select! {
            _ = ping_interval.tick() => {
                if sink.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
                continue;
            }
            received = user_rx.recv() => received,
            received = recv_room(&mut admin_rx) => received,
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    _ => continue,
                }
            }
        };

        match delivery {
            Ok(message) => {
                if send_message(&mut sink, &message).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(user_id = user.user_id, skipped, "Realtime subscriber lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    drop(user_rx);
    drop(admin_rx);
    let pruned = hub.prune();
    tracing::info!(user_id = user.user_id, pruned, "Realtime socket disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use axum::http::HeaderValue;

    #[test]
    fn admins_join_their_own_room_and_the_admin_room() {
        let customer = AuthUser {
            user_id: 7,
            role: Role::Customer,
        };
        assert_eq!(rooms_for(&customer), vec!["user-7".to_string()]);

        let admin = AuthUser {
            user_id: 1,
            role: Role::Admin,
        };
        assert_eq!(
            rooms_for(&admin),
            vec!["user-1".to_string(), "admin".to_string()]
        );
    }

    #[test]
    fn header_token_wins_over_query_token() {
        let mut headers = HeaderMap::new();
        let query = WsAuthQuery {
            token: Some("from-query".to_string()),
        };
        assert_eq!(
            request_token(&headers, &query).as_deref(),
            Some("from-query")
        );

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-header"),
        );
        assert_eq!(
            request_token(&headers, &query).as_deref(),
            Some("from-header")
        );

        assert!(request_token(&HeaderMap::new(), &WsAuthQuery::default()).is_none());
    }
}
