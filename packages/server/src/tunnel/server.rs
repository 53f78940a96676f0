//! WebSocket endpoint for agent tunnels.
//!
//! The socket is anonymous until the first frame authenticates it; anything
//! else closes the connection with code 1008. After `auth_ok` the session
//! runs a writer task draining the bounded outbound channel, a heartbeat
//! task, and the reader loop handling acks and pongs.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    Extension,
};
use chrono::Utc;
use common::auth::hash_api_key;
use common::tunnel::{
    ClientMessage, ServerMessage, CLOSE_HEARTBEAT_TIMEOUT, CLOSE_POLICY_VIOLATION, MAX_FRAME_BYTES,
};
use common::types::{ApiKeyOwner, ApiKeyStatus};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::entity::{agent_connection, api_key, subscriber};
use crate::middleware::request_id::RequestId;
use crate::state::AppState;
use crate::tunnel::registry::{AgentHandle, CloseReason};

pub async fn tunnel_ws(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.max_message_size(MAX_FRAME_BYTES)
        .on_upgrade(move |socket| handle_socket(state, socket, request_id))
}

async fn handle_socket(state: AppState, socket: WebSocket, request_id: RequestId) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let handshake_deadline = Duration::from_secs(state.config.tunnel.handshake_timeout_secs);
    let first = tokio::time::timeout(handshake_deadline, ws_receiver.next()).await;

    let token = match parse_first_frame(first) {
        FirstFrame::Auth(token) => token,
        FirstFrame::Invalid(detail) => {
            debug!(request_id = %request_id.0, detail, "tunnel handshake rejected");
            let _ = ws_sender
                .send(close_frame(CLOSE_POLICY_VIOLATION, "auth required"))
                .await;
            return;
        }
    };

    let subscriber_id = match authenticate(&state, &token).await {
        Ok(id) => id,
        Err(message) => {
            let _ = send_json(&mut ws_sender, &ServerMessage::AuthError { message }).await;
            let _ = ws_sender
                .send(close_frame(CLOSE_POLICY_VIOLATION, "auth failed"))
                .await;
            return;
        }
    };

    let connection_id = common::ids::generate("conn");
    let (handle, outbound_rx, close_rx) = AgentHandle::new(
        connection_id.clone(),
        subscriber_id.clone(),
        state.config.tunnel.queue_capacity,
    );

    let writer = tokio::spawn(run_writer(ws_sender, outbound_rx, close_rx));

    if let Some(displaced) = state.registry.register(handle.clone()).await {
        info!(
            subscriber_id = %subscriber_id,
            old_connection_id = %displaced.connection_id,
            new_connection_id = %connection_id,
            "tunnel connection displaced"
        );
        record_disconnect(&state, &displaced.connection_id, CloseReason::Displaced).await;
        displaced.close(1000, CloseReason::Displaced.as_str());
    }

    if let Err(e) = record_connect(&state, &connection_id, &subscriber_id).await {
        error!(error = %e, subscriber_id = %subscriber_id, "failed to record tunnel session");
        state.registry.remove_if(&subscriber_id, &connection_id).await;
        handle.close(CLOSE_POLICY_VIOLATION, "internal error");
        let _ = writer.await;
        return;
    }

    if let Err(e) = state.router.announce(&subscriber_id).await {
        warn!(error = %e, subscriber_id = %subscriber_id, "failed to announce tunnel route");
    }

    let _ = handle.try_push(ServerMessage::AuthOk {
        connection_id: connection_id.clone(),
        subscriber_id: subscriber_id.clone(),
    });

    info!(
        subscriber_id = %subscriber_id,
        connection_id = %connection_id,
        "tunnel connected"
    );

    let heartbeat = tokio::spawn(run_heartbeat(
        state.clone(),
        handle.clone(),
        Duration::from_secs(state.config.tunnel.heartbeat_secs),
    ));

    while let Some(message) = ws_receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                handle_client_frame(&state, &handle, text.as_str()).await;
            }
            Ok(Message::Binary(bytes)) => {
                if let Ok(text) = std::str::from_utf8(&bytes) {
                    handle_client_frame(&state, &handle, text).await;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Err(e) => {
                debug!(connection_id = %connection_id, error = %e, "tunnel receive error");
                break;
            }
        }
    }

    heartbeat.abort();

    if state.registry.remove_if(&subscriber_id, &connection_id).await {
        if let Err(e) = state.router.retract(&subscriber_id).await {
            warn!(error = %e, subscriber_id = %subscriber_id, "failed to retract tunnel route");
        }
    }
    record_disconnect(&state, &connection_id, CloseReason::Disconnected).await;

    drop(handle);
    let _ = writer.await;

    info!(
        subscriber_id = %subscriber_id,
        connection_id = %connection_id,
        "tunnel disconnected"
    );
}

enum FirstFrame {
    Auth(String),
    Invalid(&'static str),
}

fn parse_first_frame(
    first: Result<Option<Result<Message, axum::Error>>, tokio::time::error::Elapsed>,
) -> FirstFrame {
    let message = match first {
        Err(_) => return FirstFrame::Invalid("handshake deadline elapsed"),
        Ok(None) => return FirstFrame::Invalid("socket closed before auth"),
        Ok(Some(Err(_))) => return FirstFrame::Invalid("socket error before auth"),
        Ok(Some(Ok(message))) => message,
    };

    let parsed = match &message {
        Message::Text(text) => serde_json::from_str::<ClientMessage>(text.as_str()).ok(),
        Message::Binary(bytes) => serde_json::from_slice::<ClientMessage>(bytes).ok(),
        _ => None,
    };

    match parsed {
        Some(ClientMessage::Auth { token }) => FirstFrame::Auth(token),
        Some(_) => FirstFrame::Invalid("first frame was not auth"),
        None => FirstFrame::Invalid("unparseable first frame"),
    }
}

async fn authenticate(state: &AppState, token: &str) -> Result<String, String> {
    if token.is_empty() {
        return Err("missing token".to_string());
    }

    let hash = hash_api_key(token);
    let record = api_key::Entity::find()
        .filter(api_key::Column::KeyHash.eq(hash))
        .filter(api_key::Column::Status.eq(ApiKeyStatus::Active))
        .one(&state.db)
        .await
        .map_err(|e| {
            error!(error = %e, "tunnel auth lookup failed");
            "internal auth error".to_string()
        })?
        .ok_or_else(|| "invalid token".to_string())?;

    if record.owner_type != ApiKeyOwner::Subscriber {
        return Err("subscriber token required".to_string());
    }

    Ok(record.owner_id)
}

/// Writer task: drains the outbound channel onto the socket. A close
/// request preempts queued frames.
async fn run_writer(
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<ServerMessage>,
    mut close_rx: mpsc::Receiver<(u16, &'static str)>,
) {
    loop {
        tokio::select! {
            biased;

            close = close_rx.recv() => {
                if let Some((code, reason)) = close {
                    let _ = ws_sender.send(close_frame(code, reason)).await;
                }
                break;
            }
            frame = outbound_rx.recv() => {
                match frame {
                    Some(message) => {
                        if send_json(&mut ws_sender, &message).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }
}

async fn run_heartbeat(state: AppState, handle: Arc<AgentHandle>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    // First tick fires immediately; skip it so the grace math starts after
    // one full interval.
    ticker.tick().await;

    // One probe of grace: a ping left unanswered by the following tick
    // closes the socket.
    let grace = interval + interval / 2;

    loop {
        ticker.tick().await;

        if handle.pong_age() > grace {
            warn!(
                subscriber_id = %handle.subscriber_id,
                connection_id = %handle.connection_id,
                "tunnel heartbeat timed out"
            );
            record_disconnect(&state, &handle.connection_id, CloseReason::HeartbeatTimeout).await;
            handle.close(CLOSE_HEARTBEAT_TIMEOUT, CloseReason::HeartbeatTimeout.as_str());
            break;
        }

        if handle.try_push(ServerMessage::Ping).is_err() {
            break;
        }
    }
}

async fn handle_client_frame(state: &AppState, handle: &Arc<AgentHandle>, text: &str) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(_) => {
            warn!(
                subscriber_id = %handle.subscriber_id,
                "invalid tunnel client frame"
            );
            return;
        }
    };

    match message {
        ClientMessage::Pong => handle.note_pong(),
        ClientMessage::Ack {
            delivery_id,
            error: None,
        } => {
            debug!(
                subscriber_id = %handle.subscriber_id,
                delivery_id = %delivery_id,
                "tunnel delivery acknowledged"
            );
            record_ack(state, &handle.connection_id).await;
        }
        ClientMessage::Ack {
            delivery_id,
            error: Some(reason),
        } => {
            info!(
                subscriber_id = %handle.subscriber_id,
                delivery_id = %delivery_id,
                reason = %reason,
                "tunnel delivery negatively acknowledged"
            );
            if let Err(e) =
                crate::delivery::handle_negative_ack(state, &delivery_id, &reason).await
            {
                error!(
                    delivery_id = %delivery_id,
                    error = %e,
                    "failed to process negative ack"
                );
            }
        }
        ClientMessage::Auth { .. } => {
            warn!(
                subscriber_id = %handle.subscriber_id,
                "unexpected auth frame on established tunnel"
            );
        }
    }
}

async fn record_connect(
    state: &AppState,
    connection_id: &str,
    subscriber_id: &str,
) -> Result<(), sea_orm::DbErr> {
    let now = Utc::now();

    agent_connection::ActiveModel {
        id: Set(connection_id.to_string()),
        subscriber_id: Set(subscriber_id.to_string()),
        server_id: Set(state.config.server.id.clone()),
        connected_at: Set(now),
        disconnected_at: Set(None),
        disconnect_reason: Set(None),
        signals_delivered: Set(0),
    }
    .insert(&state.db)
    .await?;

    subscriber::Entity::update_many()
        .col_expr(
            subscriber::Column::AgentLastConnectedAt,
            Expr::value(Some(now)),
        )
        .filter(subscriber::Column::Id.eq(subscriber_id))
        .exec(&state.db)
        .await?;

    Ok(())
}

/// Close out the session row. The first writer wins so a heartbeat timeout
/// or displacement reason is not overwritten by the generic disconnect.
async fn record_disconnect(state: &AppState, connection_id: &str, reason: CloseReason) {
    let result = agent_connection::Entity::update_many()
        .col_expr(
            agent_connection::Column::DisconnectedAt,
            Expr::value(Some(Utc::now())),
        )
        .col_expr(
            agent_connection::Column::DisconnectReason,
            Expr::value(Some(reason.as_str().to_string())),
        )
        .filter(agent_connection::Column::Id.eq(connection_id))
        .filter(agent_connection::Column::DisconnectReason.is_null())
        .exec(&state.db)
        .await;

    if let Err(e) = result {
        warn!(connection_id = %connection_id, error = %e, "failed to record tunnel disconnect");
    }
}

async fn record_ack(state: &AppState, connection_id: &str) {
    let result = agent_connection::Entity::update_many()
        .col_expr(
            agent_connection::Column::SignalsDelivered,
            Expr::col(agent_connection::Column::SignalsDelivered).add(1),
        )
        .filter(agent_connection::Column::Id.eq(connection_id))
        .exec(&state.db)
        .await;

    if let Err(e) = result {
        warn!(connection_id = %connection_id, error = %e, "failed to count tunnel ack");
    }
}

async fn send_json(
    ws_sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "failed to serialize tunnel frame");
            return Ok(());
        }
    };
    ws_sender.send(Message::Text(text.into())).await
}

fn close_frame(code: u16, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }))
}
