//! Delivery worker pool.
//!
//! Workers consume both priority lanes with the high lane favored, bounded
//! by a fairness guard: after `high_lane_burst` consecutive high-lane jobs
//! the next poll drains one normal-lane job first.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::Utc;
use common::types::{DeliveryMode, DeliveryStatus, SignalStatus, SubscriptionStatus, WebhookStatus};
use queue::{ClaimedJob, Lane};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use tracing::{debug, error, info, warn};

use crate::entity::{channel, delivery, signal, subscriber, subscription, webhook};
use crate::state::AppState;
use crate::tunnel::registry::{AgentHandle, PushError};
use crate::tunnel::routing::ForwardedPush;

use super::webhook as webhook_transport;
use super::{
    build_signal_payload, reschedule_or_dead_letter, to_tunnel_signal, update_delivery_status,
};

/// Spawn the configured number of worker tasks. They run until process
/// exit.
pub fn spawn_workers(state: &AppState) {
    for slot in 0..state.config.worker.concurrency {
        let state = state.clone();
        let worker_id = format!("{}-w{}", state.config.server.id, slot);
        tokio::spawn(async move {
            run_worker(state, worker_id).await;
        });
    }
}

async fn run_worker(state: AppState, worker_id: String) {
    info!(worker_id = %worker_id, "delivery worker started");

    let poll_interval = Duration::from_millis(state.config.worker.poll_interval_ms);
    let burst = state.config.worker.high_lane_burst;
    let mut high_streak: u32 = 0;

    loop {
        let lanes = lane_order(high_streak, burst);

        let mut claimed = None;
        for lane in lanes {
            match state.queue.dequeue(lane, &worker_id).await {
                Ok(Some(job)) => {
                    claimed = Some(job);
                    break;
                }
                Ok(None) => {}
                Err(e) => {
                    error!(worker_id = %worker_id, error = %e, "queue dequeue failed");
                    tokio::time::sleep(poll_interval).await;
                }
            }
        }

        let Some(claimed) = claimed else {
            high_streak = 0;
            tokio::time::sleep(poll_interval).await;
            continue;
        };

        high_streak = match claimed.lane {
            Lane::High => high_streak + 1,
            Lane::Normal => 0,
        };

        match process_job(&state, &claimed).await {
            Ok(()) => {
                if let Err(e) = state.queue.complete(claimed.id).await {
                    error!(job_id = claimed.id, error = %e, "failed to complete job");
                }
            }
            Err(e) => {
                // Internal error before an outcome was recorded: release the
                // claim so another worker retries after the visibility
                // timeout, preserving the attempt budget.
                error!(
                    job_id = claimed.id,
                    signal_id = %claimed.job.signal_id,
                    error = %e,
                    "job processing failed, releasing claim"
                );
                if let Err(release_err) = state.queue.release(claimed.id).await {
                    error!(job_id = claimed.id, error = %release_err, "failed to release job");
                }
            }
        }
    }
}

/// Poll order for this iteration: strict high-lane priority until the
/// starvation guard trips, then one normal-lane drain.
fn lane_order(high_streak: u32, burst: u32) -> [Lane; 2] {
    if high_streak >= burst {
        [Lane::Normal, Lane::High]
    } else {
        [Lane::High, Lane::Normal]
    }
}

/// The transport resolved for one attempt.
enum Transport {
    TunnelLocal(Arc<AgentHandle>),
    TunnelRemote(String),
    Webhook(webhook::Model),
    None,
}

async fn process_job(state: &AppState, claimed: &ClaimedJob) -> anyhow::Result<()> {
    let job = &claimed.job;

    let Some(signal_row) = signal::Entity::find_by_id(&job.signal_id)
        .one(&state.db)
        .await?
    else {
        warn!(signal_id = %job.signal_id, "job for missing signal dropped");
        return Ok(());
    };
    if signal_row.status != SignalStatus::Active {
        return Ok(());
    }

    let Some(subscription_row) = subscription::Entity::find_by_id(&job.subscription_id)
        .one(&state.db)
        .await?
    else {
        warn!(subscription_id = %job.subscription_id, "job for missing subscription dropped");
        return Ok(());
    };

    // Canceled or paused after fan-out: complete without delivery.
    if subscription_row.status != SubscriptionStatus::Active {
        debug!(
            subscription_id = %subscription_row.id,
            status = ?subscription_row.status,
            "subscription no longer active, dropping job"
        );
        return Ok(());
    }

    let channel_row = channel::Entity::find_by_id(&signal_row.channel_id)
        .one(&state.db)
        .await?
        .context("channel missing for signal")?;

    let subscriber_row = subscriber::Entity::find_by_id(&subscription_row.subscriber_id)
        .one(&state.db)
        .await?
        .context("subscriber missing for subscription")?;

    let transport = resolve_transport(state, job, &subscription_row, &subscriber_row).await?;

    let mode = match &transport {
        Transport::TunnelLocal(_) | Transport::TunnelRemote(_) => DeliveryMode::Agent,
        Transport::Webhook(_) => DeliveryMode::Webhook,
        Transport::None => subscriber_row.delivery_mode,
    };
    let webhook_id = match &transport {
        Transport::Webhook(w) => Some(w.id.clone()),
        _ => None,
    };

    // The row exists before any side effect, so a crash mid-attempt leaves
    // a pending row for the reclaimed job to supersede.
    let delivery_id = common::ids::generate("del");
    delivery::ActiveModel {
        id: Set(delivery_id.clone()),
        signal_id: Set(signal_row.id.clone()),
        subscription_id: Set(subscription_row.id.clone()),
        webhook_id: Set(webhook_id.clone()),
        mode: Set(mode),
        attempt: Set(job.attempt),
        status: Set(DeliveryStatus::Pending),
        status_code: Set(None),
        error_message: Set(None),
        latency_ms: Set(None),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
    }
    .insert(&state.db)
    .await?;

    let started = Instant::now();
    let budget = Duration::from_secs(state.config.worker.job_timeout_secs);

    let outcome = match tokio::time::timeout(
        budget,
        attempt_transport(state, &transport, &delivery_id, &signal_row, &channel_row, &subscriber_row),
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(_) => AttemptOutcome::failure(None, "timeout"),
    };

    let latency_ms = started.elapsed().as_millis() as i32;

    match outcome {
        AttemptOutcome::Success { status_code } => {
            update_delivery_status(
                state,
                &delivery_id,
                DeliveryStatus::Success,
                status_code,
                None,
                Some(latency_ms),
            )
            .await?;

            if let Some(webhook_id) = &webhook_id {
                webhook_transport::mark_success(state, webhook_id).await;
            }

            debug!(
                delivery_id = %delivery_id,
                signal_id = %signal_row.id,
                mode = ?mode,
                attempt = job.attempt,
                latency_ms,
                "delivery succeeded"
            );
            Ok(())
        }
        AttemptOutcome::Failure { status_code, error } => {
            update_delivery_status(
                state,
                &delivery_id,
                DeliveryStatus::Failed,
                status_code,
                Some(&error),
                Some(latency_ms),
            )
            .await?;

            if let Some(webhook_id) = &webhook_id {
                webhook_transport::mark_failure(state, webhook_id).await;
            }

            info!(
                delivery_id = %delivery_id,
                signal_id = %signal_row.id,
                attempt = job.attempt,
                error = %error,
                "delivery attempt failed"
            );

            reschedule_or_dead_letter(
                state,
                &signal_row,
                &subscription_row.id,
                job.webhook_id.clone(),
                &delivery_id,
                job.attempt,
                claimed.lane,
            )
            .await
        }
    }
}

enum AttemptOutcome {
    Success { status_code: Option<i32> },
    Failure { status_code: Option<i32>, error: String },
}

impl AttemptOutcome {
    fn failure(status_code: Option<i32>, error: &str) -> Self {
        AttemptOutcome::Failure {
            status_code,
            error: error.to_string(),
        }
    }
}

/// Pick the transport for this attempt. Agent mode wins when a live route
/// exists anywhere; otherwise the pinned webhook, then the subscriber's
/// sole active webhook.
async fn resolve_transport(
    state: &AppState,
    job: &queue::DeliveryJob,
    subscription_row: &subscription::Model,
    subscriber_row: &subscriber::Model,
) -> anyhow::Result<Transport> {
    if subscriber_row.delivery_mode == DeliveryMode::Agent {
        if let Some(handle) = state.registry.get(&subscriber_row.id).await {
            return Ok(Transport::TunnelLocal(handle));
        }
        match state.router.locate(&subscriber_row.id).await {
            Ok(Some(server)) if server != state.config.server.id => {
                return Ok(Transport::TunnelRemote(server));
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, subscriber_id = %subscriber_row.id, "tunnel route lookup failed");
            }
        }
    }

    let pinned = job
        .webhook_id
        .as_deref()
        .or(subscription_row.webhook_id.as_deref());

    let endpoint = match pinned {
        Some(id) => webhook::Entity::find_by_id(id).one(&state.db).await?,
        None => {
            webhook::Entity::find()
                .filter(webhook::Column::SubscriberId.eq(&subscriber_row.id))
                .filter(webhook::Column::Status.eq(WebhookStatus::Active))
                .order_by_desc(webhook::Column::CreatedAt)
                .one(&state.db)
                .await?
        }
    };

    match endpoint {
        Some(w) if w.status == WebhookStatus::Active => Ok(Transport::Webhook(w)),
        _ => Ok(Transport::None),
    }
}

async fn attempt_transport(
    state: &AppState,
    transport: &Transport,
    delivery_id: &str,
    signal_row: &signal::Model,
    channel_row: &channel::Model,
    subscriber_row: &subscriber::Model,
) -> AttemptOutcome {
    match transport {
        Transport::TunnelLocal(handle) => {
            let message = common::tunnel::ServerMessage::Signal {
                delivery_id: delivery_id.to_string(),
                channel_id: channel_row.id.clone(),
                channel_slug: channel_row.slug.clone(),
                signal: to_tunnel_signal(signal_row),
            };
            // Success is the hand-off to the socket write buffer; a later
            // negative ack can still downgrade it.
            match handle.try_push(message) {
                Ok(()) => AttemptOutcome::Success { status_code: None },
                Err(PushError::Saturated) => {
                    AttemptOutcome::failure(None, "tunnel channel saturated")
                }
                Err(PushError::Closed) => AttemptOutcome::failure(None, "agent disconnected"),
            }
        }
        Transport::TunnelRemote(server) => {
            let push = ForwardedPush {
                subscriber_id: subscriber_row.id.clone(),
                delivery_id: delivery_id.to_string(),
                message: common::tunnel::ServerMessage::Signal {
                    delivery_id: delivery_id.to_string(),
                    channel_id: channel_row.id.clone(),
                    channel_slug: channel_row.slug.clone(),
                    signal: to_tunnel_signal(signal_row),
                },
            };
            match state.router.forward(server, &push).await {
                Ok(true) => AttemptOutcome::Success { status_code: None },
                Ok(false) => AttemptOutcome::failure(None, "no server claims subscriber tunnel"),
                Err(e) => AttemptOutcome::failure(None, &format!("tunnel forward failed: {}", e)),
            }
        }
        Transport::Webhook(endpoint) => {
            let payload = build_signal_payload(channel_row, signal_row);
            let secret = if subscriber_row.webhook_secret.is_empty() {
                state.config.auth.hmac_secret.as_str()
            } else {
                subscriber_row.webhook_secret.as_str()
            };
            let result =
                webhook_transport::deliver(state, endpoint, delivery_id, secret, &payload).await;
            if result.success {
                AttemptOutcome::Success {
                    status_code: result.status_code,
                }
            } else {
                AttemptOutcome::Failure {
                    status_code: result.status_code,
                    error: result
                        .error
                        .unwrap_or_else(|| "webhook delivery failed".to_string()),
                }
            }
        }
        Transport::None => AttemptOutcome::failure(None, "no_transport"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lane_order_prefers_high() {
        assert_eq!(lane_order(0, 32), [Lane::High, Lane::Normal]);
        assert_eq!(lane_order(31, 32), [Lane::High, Lane::Normal]);
    }

    #[test]
    fn test_lane_order_drains_normal_after_burst() {
        assert_eq!(lane_order(32, 32), [Lane::Normal, Lane::High]);
        assert_eq!(lane_order(100, 32), [Lane::Normal, Lane::High]);
    }
}
