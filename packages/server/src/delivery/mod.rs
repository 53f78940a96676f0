//! Delivery pipeline: outcome recording, retry ladder, dead-lettering.

pub mod webhook;
pub mod worker;

use anyhow::Context;
use chrono::Utc;
use common::retry::{is_final_attempt, ladder_delay};
use common::tunnel::TunnelSignal;
use common::types::DeliveryStatus;
use queue::{DeliveryJob, JobQueue, Lane};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde_json::json;
use tracing::{info, warn};

use crate::entity::{channel, dead_letter_entry, delivery, signal};
use crate::state::AppState;

/// Webhook envelope and DLQ frozen payload for one (channel, signal) pair.
pub fn build_signal_payload(channel: &channel::Model, signal: &signal::Model) -> serde_json::Value {
    json!({
        "event": "signal",
        "channel": {
            "id": channel.id,
            "slug": channel.slug,
            "displayName": channel.display_name,
        },
        "signal": {
            "id": signal.id,
            "title": signal.title,
            "body": signal.body,
            "urgency": signal.urgency,
            "metadata": signal.metadata,
            "created_at": signal.created_at,
        },
    })
}

pub fn to_tunnel_signal(signal: &signal::Model) -> TunnelSignal {
    TunnelSignal {
        id: signal.id.clone(),
        title: signal.title.clone(),
        body: signal.body.clone(),
        urgency: signal.urgency,
        metadata: signal.metadata.clone(),
        created_at: signal.created_at,
    }
}

/// Move a delivery row to a terminal status.
pub async fn update_delivery_status(
    state: &AppState,
    delivery_id: &str,
    status: DeliveryStatus,
    status_code: Option<i32>,
    error_message: Option<&str>,
    latency_ms: Option<i32>,
) -> Result<(), sea_orm::DbErr> {
    let update = delivery::ActiveModel {
        id: Set(delivery_id.to_string()),
        status: Set(status),
        status_code: Set(status_code),
        error_message: Set(error_message.map(|s| s.to_string())),
        latency_ms: Set(latency_ms),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };
    delivery::Entity::update(update).exec(&state.db).await?;
    Ok(())
}

/// Handle a failed attempt that has already been recorded on its delivery
/// row: enqueue the next rung of the ladder, or dead-letter the pair after
/// the final attempt.
#[allow(clippy::too_many_arguments)]
pub async fn reschedule_or_dead_letter(
    state: &AppState,
    signal: &signal::Model,
    subscription_id: &str,
    webhook_id: Option<String>,
    delivery_id: &str,
    attempt: i32,
    lane: Lane,
) -> anyhow::Result<()> {
    if is_final_attempt(attempt) {
        create_dead_letter_entry(state, signal, subscription_id, delivery_id).await?;
        return Ok(());
    }

    let next = DeliveryJob {
        signal_id: signal.id.clone(),
        subscription_id: subscription_id.to_string(),
        webhook_id,
        attempt: attempt + 1,
    };
    let delay = ladder_delay(attempt + 1);

    JobQueue::enqueue(&state.db, lane, next, delay)
        .await
        .context("failed to enqueue retry job")?;

    info!(
        signal_id = %signal.id,
        subscription_id = %subscription_id,
        next_attempt = attempt + 1,
        delay_secs = delay.as_secs(),
        lane = %lane,
        "delivery attempt rescheduled"
    );

    Ok(())
}

/// Freeze the payload and the per-attempt error history into a DLQ entry.
/// A pair that already has an unresolved entry is left alone.
async fn create_dead_letter_entry(
    state: &AppState,
    signal: &signal::Model,
    subscription_id: &str,
    delivery_id: &str,
) -> anyhow::Result<()> {
    let existing = dead_letter_entry::Entity::find()
        .filter(dead_letter_entry::Column::SignalId.eq(&signal.id))
        .filter(dead_letter_entry::Column::SubscriptionId.eq(subscription_id))
        .filter(dead_letter_entry::Column::ResolvedAt.is_null())
        .one(&state.db)
        .await?;

    if existing.is_some() {
        warn!(
            signal_id = %signal.id,
            subscription_id = %subscription_id,
            "pair already dead-lettered, skipping"
        );
        return Ok(());
    }

    let channel_row = channel::Entity::find_by_id(&signal.channel_id)
        .one(&state.db)
        .await?
        .context("channel missing for dead-lettered signal")?;

    let failed = delivery::Entity::find()
        .filter(delivery::Column::SignalId.eq(&signal.id))
        .filter(delivery::Column::SubscriptionId.eq(subscription_id))
        .filter(delivery::Column::Status.eq(DeliveryStatus::Failed))
        .order_by_asc(delivery::Column::Attempt)
        .all(&state.db)
        .await?;

    let error_history: Vec<serde_json::Value> = failed
        .iter()
        .map(|d| {
            json!({
                "attempt": d.attempt,
                "timestamp": d.updated_at,
                "code": d.status_code,
                "message": d.error_message,
            })
        })
        .collect();

    let entry_id = common::ids::generate("dlq");
    dead_letter_entry::ActiveModel {
        id: Set(entry_id.clone()),
        delivery_id: Set(delivery_id.to_string()),
        signal_id: Set(signal.id.clone()),
        subscription_id: Set(subscription_id.to_string()),
        payload: Set(build_signal_payload(&channel_row, signal)),
        error_history: Set(serde_json::Value::Array(error_history)),
        resolved_at: Set(None),
        created_at: Set(Utc::now()),
    }
    .insert(&state.db)
    .await?;

    info!(
        dlq_id = %entry_id,
        signal_id = %signal.id,
        subscription_id = %subscription_id,
        "delivery dead-lettered after final attempt"
    );

    Ok(())
}

/// Downgrade a delivery a remote agent negatively acknowledged.
///
/// The worker recorded success at the socket-write boundary; an `ack` with
/// an error arrives later and re-enters the ladder with the same attempt
/// budget. Deliveries already failed are left untouched.
pub async fn handle_negative_ack(
    state: &AppState,
    delivery_id: &str,
    reason: &str,
) -> anyhow::Result<()> {
    let Some(row) = delivery::Entity::find_by_id(delivery_id)
        .one(&state.db)
        .await?
    else {
        warn!(delivery_id = %delivery_id, "negative ack for unknown delivery");
        return Ok(());
    };

    if row.status == DeliveryStatus::Failed {
        return Ok(());
    }

    let signal_row = signal::Entity::find_by_id(&row.signal_id)
        .one(&state.db)
        .await?
        .context("signal missing for negative ack")?;

    update_delivery_status(
        state,
        delivery_id,
        DeliveryStatus::Failed,
        None,
        Some(reason),
        row.latency_ms,
    )
    .await?;

    reschedule_or_dead_letter(
        state,
        &signal_row,
        &row.subscription_id,
        row.webhook_id.clone(),
        delivery_id,
        row.attempt,
        Lane::for_urgency(signal_row.urgency),
    )
    .await
}
