//! Registry behavior under connection churn: displacement, conditional
//! removal, and channel saturation, exercised through the public API.

use common::tunnel::ServerMessage;
use server::tunnel::registry::{AgentHandle, AgentRegistry, PushError};

#[tokio::test]
async fn test_displacement_keeps_newest_connection() {
    let registry = AgentRegistry::new();

    let (first, _rx1, mut close1) = AgentHandle::new("conn_1".into(), "sub_x".into(), 64);
    let (second, _rx2, _close2) = AgentHandle::new("conn_2".into(), "sub_x".into(), 64);

    assert!(registry.register(first).await.is_none());
    let displaced = registry.register(second).await.expect("first displaced");

    // The displacing path closes the old connection with a reason.
    displaced.close(1000, "displaced");
    assert_eq!(close1.recv().await, Some((1000, "displaced")));

    // The stale connection's teardown must not remove the replacement.
    assert!(!registry.remove_if("sub_x", "conn_1").await);
    assert_eq!(
        registry.get("sub_x").await.unwrap().connection_id,
        "conn_2"
    );
}

#[tokio::test]
async fn test_slow_consumer_saturates_bounded_channel() {
    let capacity = 64;
    let (handle, _rx, _close) = AgentHandle::new("conn_1".into(), "sub_x".into(), capacity);

    for _ in 0..capacity {
        assert!(handle.try_push(ServerMessage::Ping).is_ok());
    }
    // Push 65 is rejected without blocking: saturation is an immediate
    // failed attempt, not a stall.
    assert_eq!(
        handle.try_push(ServerMessage::Ping),
        Err(PushError::Saturated)
    );
}

#[tokio::test]
async fn test_queued_frames_drain_in_order() {
    let (handle, mut rx, _close) = AgentHandle::new("conn_1".into(), "sub_x".into(), 8);

    for i in 0..3 {
        handle
            .try_push(ServerMessage::Signal {
                delivery_id: format!("del_{}", i),
                channel_id: "ch_1".into(),
                channel_slug: "alerts".into(),
                signal: common::tunnel::TunnelSignal {
                    id: format!("sig_{}", i),
                    title: "t".into(),
                    body: "b".into(),
                    urgency: common::types::SignalUrgency::Normal,
                    metadata: serde_json::json!({}),
                    created_at: chrono::Utc::now(),
                },
            })
            .unwrap();
    }

    for i in 0..3 {
        match rx.recv().await.unwrap() {
            ServerMessage::Signal { delivery_id, .. } => {
                assert_eq!(delivery_id, format!("del_{}", i));
            }
            other => panic!("expected signal, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_registry_tracks_multiple_subscribers() {
    let registry = AgentRegistry::new();
    assert!(registry.is_empty().await);

    let (a, _rx_a, _close_a) = AgentHandle::new("conn_a".into(), "sub_a".into(), 4);
    let (b, _rx_b, _close_b) = AgentHandle::new("conn_b".into(), "sub_b".into(), 4);
    registry.register(a).await;
    registry.register(b).await;

    assert_eq!(registry.len().await, 2);
    assert!(registry.get("sub_a").await.is_some());
    assert!(registry.get("sub_b").await.is_some());

    assert!(registry.remove_if("sub_a", "conn_a").await);
    assert_eq!(registry.len().await, 1);
    assert!(registry.get("sub_a").await.is_none());
}
