use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde_json::Value;
use tokio::time::sleep;

use crate::{
    bridge::{BridgeClient, BridgeOutcome},
    dispatch::now_ts,
    error::AppError,
    models::core::Instance,
    models::dispatch::QueueItem,
    AppState,
};

fn random_delay_seconds(min: i32, max: i32) -> i32 {
    if max <= min {
        return min.max(0);
    }
    rand::thread_rng().gen_range(min..=max)
}

/// Sends a single QueueItem, self-healing the instance token once on an auth-denied
/// response before retrying (spec §4.H worker step 3, mirrors the chatbot engine's
/// own retry policy).
async fn send_item(state: &Arc<AppState>, instance: &Instance, token: &str, jid: &str, item: &QueueItem) -> BridgeOutcome {
    let attempt = |token: String| {
        let state = state.clone();
        let jid = jid.to_string();
        let item = item.clone();
        async move {
            if let Some(media_file_id) = item.media_file_id {
                if let Ok(Some(file)) = state.media_files.find(media_file_id) {
                    if let Ok(bytes) = tokio::fs::read(&file.storage_path).await {
                        let file_name = std::path::Path::new(&file.storage_path)
                            .file_name()
                            .and_then(|s| s.to_str())
                            .unwrap_or("media")
                            .to_string();
                        return state.bridge.send_media_with_status(&token, &jid, bytes, &file_name, Some(&item.rendered_body)).await;
                    }
                }
            }
            state.bridge.send_text_with_status(&token, &jid, &item.rendered_body, None).await
        }
    };

    let (status, body) = attempt(token.to_string()).await;
    if status.is_success() || !BridgeClient::is_auth_denied(status, &body) {
        return (status.is_success(), body);
    }
    let _ = state.session_manager.self_heal_token(&instance.session_id).await;
    let fresh_token = state
        .instances
        .find_by_session_id(&instance.session_id)
        .ok()
        .flatten()
        .and_then(|i| i.token)
        .unwrap_or_else(|| token.to_string());
    let (status, body) = attempt(fresh_token).await;
    (status.is_success(), body)
}

/// One worker tick (spec §4.H "Worker loop"): activates due SCHEDULED campaigns,
/// then for each Instance whose pacing has elapsed, claims and sends at most one
/// due QueueItem before re-pacing that Instance.
pub async fn run_tick(state: &Arc<AppState>, max_items_per_instance: i64) -> Result<(), AppError> {
    let now = now_ts();
    state.dispatch_store.activate_scheduled_campaigns(now)?;

    let instance_ids = state.dispatch_store.instances_with_due_work(now)?;
    for instance_id in instance_ids {
        if state.dispatch_store.next_available_at(instance_id)? > now {
            continue;
        }
        let Some(instance) = state.instances.find(instance_id)? else { continue };
        let Some(token) = instance.token.clone() else { continue };

        let items = state.dispatch_store.due_items_for_instance(instance_id, now, max_items_per_instance)?;
        let Some(item) = items.into_iter().next() else { continue };
        if !state.dispatch_store.try_claim(item.id)? {
            continue;
        }
        let Some(campaign) = state.dispatch_store.find_campaign(item.campaign_id)? else { continue };
        let Some(recipient) = state.dispatch_store.find_recipient(item.recipient_id)? else { continue };

        let (ok, body) = send_item(state, &instance, &token, &recipient.jid, &item).await;
        if ok {
            let wamid = body.get("id").and_then(Value::as_str).map(|s| s.to_string());
            state.dispatch_store.mark_sent(item.id, wamid.as_deref())?;
            state.dispatch_store.increment_campaign_counter(campaign.id, "sent")?;
        } else {
            let error = body.get("error").and_then(Value::as_str).unwrap_or("bridge send failed").to_string();
            state.dispatch_store.mark_failed(item.id, &error)?;
            state.dispatch_store.increment_campaign_counter(campaign.id, "failed")?;
        }

        let next_at = now_ts() + random_delay_seconds(campaign.min_delay_seconds, campaign.max_delay_seconds);
        state.dispatch_store.set_next_available_at(instance_id, next_at)?;
    }

    state.dispatch_store.complete_finished_campaigns()?;
    Ok(())
}

/// Continuous worker loop driving the `dispatcher` CLI command.
pub async fn run_loop(state: &Arc<AppState>, max_items_per_instance: i64, sleep_between_ticks: Duration) -> Result<(), AppError> {
    loop {
        run_tick(state, max_items_per_instance).await?;
        sleep(sleep_between_ticks).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_delay_clamps_to_min_when_max_not_greater() {
        assert_eq!(random_delay_seconds(20, 20), 20);
        assert_eq!(random_delay_seconds(20, 10), 20);
    }

    #[test]
    fn random_delay_stays_in_bounds() {
        for _ in 0..50 {
            let d = random_delay_seconds(5, 15);
            assert!(d >= 5 && d <= 15);
        }
    }
}
