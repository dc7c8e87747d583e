use crate::error::AppError;
use crate::services::notification::NotificationService;
use crate::utils::jwt::{decode_jwt, is_access_token};
use crate::websocket::hub::NotificationHub;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, WebSocketUpgrade,
    },
    response::IntoResponse,
    Extension,
};
use futures_util::{SinkExt, StreamExt};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct WsQuery {
    pub token: String,
}

/// Upgrades to a socket that receives unread-count updates.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    Extension(db): Extension<DatabaseConnection>,
    Extension(hub): Extension<NotificationHub>,
) -> Result<impl IntoResponse, AppError> {
    let claims = decode_jwt(&query.token).map_err(|_| AppError::Unauthorized)?;
    if !is_access_token(&claims) {
        return Err(AppError::Unauthorized);
    }
    let user_id: i32 = claims.sub.parse().map_err(|_| AppError::Unauthorized)?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, user_id, db, hub)))
}

async fn handle_socket(socket: WebSocket, user_id: i32, db: DatabaseConnection, hub: NotificationHub) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (conn_id, mut rx) = hub.subscribe(user_id);

    tracing::info!("WebSocket connected for user {}", user_id);

    // Initial count so the client does not wait for the next fan-out.
    let service = NotificationService::new(db, hub.clone());
    if let Err(e) = service.push_unread_count(user_id).await {
        tracing::warn!("Failed to load unread count for user {}: {}", user_id, e);
    }

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    hub.unsubscribe(user_id, conn_id);
    tracing::info!("WebSocket disconnected for user {}", user_id);
}
