//! Outbound tunnel connection with reconnect.
//!
//! Connects, authenticates with the first frame, then pumps signals to the
//! local forwarder, answering heartbeats inline. Reconnects with jittered
//! exponential backoff, reset after each successful `auth_ok`.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{error, info, warn};

use common::retry::reconnect_delay;
use common::tunnel::{ClientMessage, ServerMessage};

use crate::config::AgentConfig;
use crate::forward::Forwarder;

type WsSink = futures_util::stream::SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Run the tunnel until the process is stopped.
pub async fn run_tunnel(config: AgentConfig) -> anyhow::Result<()> {
    let forwarder = Forwarder::new(config.forward_url.clone(), config.local_token.clone())?;
    let mut failed_connects: u32 = 0;

    loop {
        match connect_and_pump(&config, &forwarder, &mut failed_connects).await {
            Ok(()) => {
                info!("tunnel disconnected");
            }
            Err(e) => {
                failed_connects = failed_connects.saturating_add(1);
                error!(error = %e, "tunnel error");
            }
        }

        let delay = reconnect_delay(failed_connects.max(1));
        info!(delay_ms = delay.as_millis() as u64, "reconnecting");
        tokio::time::sleep(delay).await;
    }
}

async fn connect_and_pump(
    config: &AgentConfig,
    forwarder: &Forwarder,
    failed_connects: &mut u32,
) -> anyhow::Result<()> {
    let (stream, _) = tokio_tungstenite::connect_async(&config.herald_url).await?;
    let (mut write, mut read) = stream.split();

    let auth = ClientMessage::Auth {
        token: config.token.clone(),
    };
    send_frame(&mut write, &auth).await?;

    while let Some(message) = read.next().await {
        match message? {
            Message::Text(text) => {
                handle_server_frame(forwarder, &mut write, text.as_str(), failed_connects).await?;
            }
            Message::Binary(bytes) => {
                if let Ok(text) = std::str::from_utf8(&bytes) {
                    handle_server_frame(forwarder, &mut write, text, failed_connects).await?;
                }
            }
            Message::Ping(payload) => {
                let _ = write.send(Message::Pong(payload)).await;
            }
            Message::Close(frame) => {
                info!(frame = ?frame, "server closed tunnel");
                break;
            }
            _ => {}
        }
    }

    Ok(())
}

async fn handle_server_frame(
    forwarder: &Forwarder,
    write: &mut WsSink,
    text: &str,
    failed_connects: &mut u32,
) -> anyhow::Result<()> {
    let message: ServerMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "unparseable server frame");
            return Ok(());
        }
    };

    match message {
        ServerMessage::AuthOk {
            connection_id,
            subscriber_id,
        } => {
            info!(%connection_id, %subscriber_id, "tunnel authenticated");
            *failed_connects = 0;
        }
        ServerMessage::AuthError { message } => {
            return Err(anyhow::anyhow!("auth rejected: {}", message));
        }
        ServerMessage::Ping => {
            send_frame(write, &ClientMessage::Pong).await?;
        }
        ServerMessage::Signal {
            delivery_id,
            channel_id,
            channel_slug,
            signal,
        } => {
            let ack = match forwarder
                .deliver_signal(&delivery_id, &channel_id, &channel_slug, &signal)
                .await
            {
                Ok(()) => ClientMessage::Ack {
                    delivery_id,
                    error: None,
                },
                Err(e) => {
                    warn!(error = %e, signal_id = %signal.id, "local forward failed");
                    ClientMessage::Ack {
                        delivery_id,
                        error: Some(e.to_string()),
                    }
                }
            };
            send_frame(write, &ack).await?;
        }
    }

    Ok(())
}

async fn send_frame(write: &mut WsSink, message: &ClientMessage) -> anyhow::Result<()> {
    let text = serde_json::to_string(message)?;
    write.send(Message::Text(text.into())).await?;
    Ok(())
}
