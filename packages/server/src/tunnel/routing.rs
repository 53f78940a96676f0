//! Cross-server tunnel routing over the shared Redis store.
//!
//! Each server announces `subscriber_id -> server_id` on connect and
//! retracts it on clean disconnect. A worker whose local registry misses
//! consults the map and forwards the push over the owning server's pub/sub
//! channel. A publish nobody receives means no server claims the agent.

use std::time::Duration;

use redis::{AsyncCommands, Script};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use common::tunnel::ServerMessage;

use crate::state::AppState;

const ROUTE_KEY_PREFIX: &str = "tunnel:route:";
const PUSH_CHANNEL_PREFIX: &str = "tunnel:push:";

/// A push relayed to the server holding the subscriber's socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardedPush {
    pub subscriber_id: String,
    pub delivery_id: String,
    pub message: ServerMessage,
}

#[derive(Clone)]
pub struct TunnelRouter {
    client: redis::Client,
    server_id: String,
}

impl TunnelRouter {
    pub fn new(client: redis::Client, server_id: String) -> Self {
        Self { client, server_id }
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Claim the subscriber's route for this server.
    pub async fn announce(&self, subscriber_id: &str) -> redis::RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set::<_, _, ()>(route_key(subscriber_id), &self.server_id)
            .await
    }

    /// Drop the route, but only while it still points at this server. A
    /// displaced connection retracting late must not erase the route its
    /// replacement announced elsewhere.
    pub async fn retract(&self, subscriber_id: &str) -> redis::RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let script = Script::new(
            r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('DEL', KEYS[1])
end
return 0
"#,
        );
        let _deleted: i32 = script
            .key(route_key(subscriber_id))
            .arg(&self.server_id)
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }

    /// Which server, if any, claims the subscriber's tunnel.
    pub async fn locate(&self, subscriber_id: &str) -> redis::RedisResult<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.get(route_key(subscriber_id)).await
    }

    /// Relay a push to the owning server. Returns `false` when no server is
    /// listening, which callers treat as tunnel-unavailable.
    pub async fn forward(
        &self,
        home_server: &str,
        push: &ForwardedPush,
    ) -> redis::RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = match serde_json::to_string(push) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "failed to serialize forwarded push");
                return Ok(false);
            }
        };
        let receivers: i64 = conn
            .publish(format!("{}{}", PUSH_CHANNEL_PREFIX, home_server), payload)
            .await?;
        Ok(receivers > 0)
    }
}

fn route_key(subscriber_id: &str) -> String {
    format!("{}{}", ROUTE_KEY_PREFIX, subscriber_id)
}

/// Listen for pushes forwarded to this server and hand them to the local
/// registry. Runs until process exit, reconnecting on Redis errors.
pub async fn run_forward_listener(state: AppState) {
    let channel = format!("{}{}", PUSH_CHANNEL_PREFIX, state.config.server.id);
    info!(channel = %channel, "starting tunnel forward listener");

    loop {
        match listen(&state, &channel).await {
            Ok(()) => warn!("tunnel forward subscription ended, resubscribing"),
            Err(e) => error!(error = %e, "tunnel forward listener error"),
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

async fn listen(state: &AppState, channel: &str) -> redis::RedisResult<()> {
    let mut pubsub = state.router.client.get_async_pubsub().await?;
    pubsub.subscribe(channel).await?;

    use futures_util::StreamExt;
    let mut stream = pubsub.on_message();

    while let Some(msg) = stream.next().await {
        let payload: String = match msg.get_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "unreadable forwarded push payload");
                continue;
            }
        };
        let push: ForwardedPush = match serde_json::from_str(&payload) {
            Ok(push) => push,
            Err(e) => {
                warn!(error = %e, "malformed forwarded push");
                continue;
            }
        };

        deliver_local(state, push).await;
    }

    Ok(())
}

/// Enqueue a forwarded push on the local connection. The sending worker
/// already recorded success, so a local miss or saturation is surfaced as a
/// negative ack to re-enter the retry ladder.
async fn deliver_local(state: &AppState, push: ForwardedPush) {
    let outcome = match state.registry.get(&push.subscriber_id).await {
        Some(handle) => handle.try_push(push.message).err(),
        None => {
            warn!(
                subscriber_id = %push.subscriber_id,
                "forwarded push for unknown local agent"
            );
            Some(crate::tunnel::registry::PushError::Closed)
        }
    };

    if let Some(err) = outcome {
        let reason = match err {
            crate::tunnel::registry::PushError::Saturated => "tunnel channel saturated",
            crate::tunnel::registry::PushError::Closed => "agent not connected",
        };
        if let Err(e) =
            crate::delivery::handle_negative_ack(state, &push.delivery_id, reason).await
        {
            error!(
                delivery_id = %push.delivery_id,
                error = %e,
                "failed to downgrade forwarded delivery"
            );
        }
    }
}
