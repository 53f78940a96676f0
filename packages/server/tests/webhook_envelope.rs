//! Checks the webhook envelope and its signature against the documented
//! wire contract, end to end from entity rows to verified HMAC.

use chrono::Utc;
use common::auth::{sign_payload, verify_signature};
use common::types::{ChannelStatus, SignalStatus, SignalUrgency};
use server::delivery::{build_signal_payload, to_tunnel_signal};
use server::entity::{channel, signal};

fn test_channel() -> channel::Model {
    channel::Model {
        id: "ch_test01".into(),
        publisher_id: "pub_test01".into(),
        slug: "infra-alerts".into(),
        display_name: "Infra Alerts".into(),
        description: None,
        status: ChannelStatus::Active,
        signal_count: 0,
        subscriber_count: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn test_signal(urgency: SignalUrgency) -> signal::Model {
    signal::Model {
        id: "sig_test01".into(),
        channel_id: "ch_test01".into(),
        title: "disk almost full".into(),
        body: "volume /data at 92%".into(),
        urgency,
        metadata: serde_json::json!({"host": "db-3"}),
        delivery_count: 0,
        delivered_count: 0,
        failed_count: 0,
        status: SignalStatus::Active,
        created_at: Utc::now(),
    }
}

#[test]
fn test_envelope_shape() {
    let payload = build_signal_payload(&test_channel(), &test_signal(SignalUrgency::High));

    assert_eq!(payload["event"], "signal");
    assert_eq!(payload["channel"]["id"], "ch_test01");
    assert_eq!(payload["channel"]["slug"], "infra-alerts");
    assert_eq!(payload["channel"]["displayName"], "Infra Alerts");
    assert_eq!(payload["signal"]["id"], "sig_test01");
    assert_eq!(payload["signal"]["title"], "disk almost full");
    assert_eq!(payload["signal"]["urgency"], "high");
    assert_eq!(payload["signal"]["metadata"]["host"], "db-3");
    // created_at serializes as an RFC3339 timestamp
    let created_at = payload["signal"]["created_at"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(created_at).is_ok());
}

#[test]
fn test_signature_covers_exact_body_bytes() {
    let payload = build_signal_payload(&test_channel(), &test_signal(SignalUrgency::Normal));
    let body = serde_json::to_string(&payload).unwrap();

    let now = Utc::now().timestamp();
    let signature = sign_payload("s3cret", now, &body);

    assert!(verify_signature(&signature, "s3cret", now, &body, now));

    // A single changed byte in the delivered body invalidates it.
    let mut tampered = body.clone();
    tampered.push(' ');
    assert!(!verify_signature(&signature, "s3cret", now, &tampered, now));
}

#[test]
fn test_tunnel_signal_preserves_fields() {
    let row = test_signal(SignalUrgency::Critical);
    let tunnel_signal = to_tunnel_signal(&row);

    assert_eq!(tunnel_signal.id, row.id);
    assert_eq!(tunnel_signal.title, row.title);
    assert_eq!(tunnel_signal.body, row.body);
    assert_eq!(tunnel_signal.urgency, SignalUrgency::Critical);
    assert_eq!(tunnel_signal.metadata, row.metadata);
    assert_eq!(tunnel_signal.created_at, row.created_at);
}
