//! Tunnel wire protocol.
//!
//! One JSON object per WebSocket text frame, discriminated by `type`.
//! Both the relay and the agent binary speak this module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::SignalUrgency;

/// Maximum size of a single tunnel frame in bytes.
pub const MAX_FRAME_BYTES: usize = 1_048_576;

/// Close code sent when a connection misbehaves before authenticating.
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;

/// Close code sent when the heartbeat grace period elapses.
pub const CLOSE_HEARTBEAT_TIMEOUT: u16 = 1011;

/// Messages sent by the agent to the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Must be the first frame on the connection.
    Auth { token: String },
    /// Acknowledges a pushed signal. An `error` turns this into a negative
    /// ack, which re-enters the delivery retry ladder upstream.
    Ack {
        delivery_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Heartbeat response.
    Pong,
}

/// Messages sent by the relay to the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    AuthOk {
        connection_id: String,
        subscriber_id: String,
    },
    AuthError {
        message: String,
    },
    Signal {
        delivery_id: String,
        channel_id: String,
        channel_slug: String,
        signal: TunnelSignal,
    },
    /// Heartbeat probe; the agent must answer with `pong`.
    Ping,
}

/// The signal payload pushed through the tunnel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunnelSignal {
    pub id: String,
    pub title: String,
    pub body: String,
    pub urgency: SignalUrgency,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_frame_shape() {
        let msg = ClientMessage::Auth {
            token: "hld_sub_abc".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"auth","token":"hld_sub_abc"}"#);
    }

    #[test]
    fn test_ack_omits_absent_error() {
        let msg = ClientMessage::Ack {
            delivery_id: "del_1".into(),
            error: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("error"));

        let parsed: ClientMessage = serde_json::from_str(&json).unwrap();
        match parsed {
            ClientMessage::Ack { delivery_id, error } => {
                assert_eq!(delivery_id, "del_1");
                assert!(error.is_none());
            }
            other => panic!("expected ack, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_ack_carries_error() {
        let json = r#"{"type":"ack","delivery_id":"del_2","error":"local POST failed"}"#;
        match serde_json::from_str::<ClientMessage>(json).unwrap() {
            ClientMessage::Ack { error, .. } => {
                assert_eq!(error.as_deref(), Some("local POST failed"));
            }
            other => panic!("expected ack, got {:?}", other),
        }
    }

    #[test]
    fn test_ping_pong_frames() {
        assert_eq!(
            serde_json::to_string(&ServerMessage::Ping).unwrap(),
            r#"{"type":"ping"}"#
        );
        assert_eq!(
            serde_json::to_string(&ClientMessage::Pong).unwrap(),
            r#"{"type":"pong"}"#
        );
    }

    #[test]
    fn test_signal_frame_roundtrip() {
        let msg = ServerMessage::Signal {
            delivery_id: "del_3".into(),
            channel_id: "ch_1".into(),
            channel_slug: "alerts".into(),
            signal: TunnelSignal {
                id: "sig_1".into(),
                title: "t".into(),
                body: "b".into(),
                urgency: SignalUrgency::Critical,
                metadata: serde_json::json!({"k": "v"}),
                created_at: Utc::now(),
            },
        };

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"signal""#));
        assert!(json.contains(r#""urgency":"critical""#));

        match serde_json::from_str::<ServerMessage>(&json).unwrap() {
            ServerMessage::Signal { signal, .. } => {
                assert_eq!(signal.id, "sig_1");
                assert_eq!(signal.metadata["k"], "v");
            }
            other => panic!("expected signal, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"subscribe"}"#).is_err());
    }
}
